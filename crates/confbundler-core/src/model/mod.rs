//! Resource model: declared filesystem entries, packages and users.

pub mod account;
pub mod filesystem;

pub use account::{Package, Principal, User};
pub use filesystem::{
    BundledEntry, Device, DeviceKind, Directory, Entry, InlineFile, Metadata, Pipe, RemoteEntry,
    SymbolicLink, Timespec, DEFAULT_DIRECTORY_MODE, DEFAULT_MODE,
};

use serde::Serialize;

/// A declaration that is either present or a tombstone.
///
/// `Absent` is the absent-resource marker: the resource must not exist in the
/// output. It carries no metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Declared<T> {
    Present(T),
    Absent,
}

impl<T> Declared<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Declared::Absent)
    }

    pub fn as_present(&self) -> Option<&T> {
        match self {
            Declared::Present(value) => Some(value),
            Declared::Absent => None,
        }
    }
}
