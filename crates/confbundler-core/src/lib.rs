//! Compile declarative bundles of files, packages and users into a tar archive.
//!
//! Documents are decoded into typed records ([`decode`]), folded into a
//! [`Bundle`], flattened and typed against the host ([`resolve`]) and written
//! out as a PAX tar stream ([`archive`]).

pub mod archive;
pub mod bundle;
pub mod decode;
pub mod errors;
pub mod model;
pub mod plan;
pub mod resolve;

pub use archive::{encode, ArchiveWriter, BuildOptions, Compression, Summary};
pub use bundle::{load_path, load_str, Bundle};
pub use errors::{DecodeError, Diagnostic, Diagnostics, EncodeError, LoadError, ResolveError};
pub use plan::Plan;
pub use resolve::{resolve, Resolved, ResolvedFiles};

use std::io::Write;

/// Resolve `bundle` against the host and write its archive to `writer`.
pub fn build<W: Write>(
    bundle: &Bundle,
    writer: W,
    options: &BuildOptions,
    diags: &mut Diagnostics,
) -> Result<(Summary, W), EncodeError> {
    let entries = resolve(bundle, diags);
    encode(entries, writer, options, diags)
}
