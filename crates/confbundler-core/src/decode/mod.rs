//! Table-driven decoding of document nodes into typed records.

pub mod decoder;
pub mod identity;
pub mod node;
pub mod spec;
pub mod value;

pub use decoder::Decoder;
pub use identity::Identity;
pub use node::{Mark, Node, NodeKind, Scalar};
pub use spec::{Record, RecordKind, TypeSpec, FILES, PACKAGES, USERS};
pub use value::{Constructor, FieldValue, RawValue};
