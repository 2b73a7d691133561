//! Filesystem entry declarations.

use super::account::Principal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_MODE: u32 = 0o644;
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timespec {
    pub secs: i64,
    pub nanos: u32,
}

impl Timespec {
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }
}

/// PAX rendering: `<seconds>.<nanoseconds>`.
impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

/// Ownership, permissions, timestamps and extended attributes of an entry.
///
/// `None` means "not declared": the field takes its default at encoding time,
/// or is discovered on the host for bundled entries. Declared values always
/// win over discovered ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atime: Option<Timespec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<Timespec>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub xattrs: BTreeMap<String, String>,
}

impl Metadata {
    pub fn owner(&self) -> Principal {
        self.owner.clone().unwrap_or_default()
    }

    pub fn group(&self) -> Principal {
        self.group.clone().unwrap_or_default()
    }

    pub fn mode_or(&self, default: u32) -> u32 {
        self.mode.unwrap_or(default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Block,
    Character,
}

impl DeviceKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "b" | "block" => Some(Self::Block),
            "c" | "char" | "character" => Some(Self::Character),
            _ => None,
        }
    }
}

/// An entry copied from the authoring host. Its concrete type is only known
/// once the host path is inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundledEntry {
    pub source: PathBuf,
    #[serde(flatten)]
    pub meta: Metadata,
}

/// An entry expected to exist on, or be fetched for, the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub source: PathBuf,
    #[serde(flatten)]
    pub meta: Metadata,
}

/// A regular file whose content is declared inline in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineFile {
    #[serde(rename = "length", serialize_with = "serialize_len")]
    pub content: Vec<u8>,
    #[serde(flatten)]
    pub meta: Metadata,
}

fn serialize_len<S: serde::Serializer>(content: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(content.len() as u64)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Directory {
    #[serde(flatten)]
    pub meta: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pipe {
    #[serde(flatten)]
    pub meta: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub kind: DeviceKind,
    pub major: u32,
    pub minor: u32,
    #[serde(flatten)]
    pub meta: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolicLink {
    pub destination: PathBuf,
    #[serde(flatten)]
    pub meta: Metadata,
}

/// A present filesystem entry declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Bundled(BundledEntry),
    Remote(RemoteEntry),
    File(InlineFile),
    Directory(Directory),
    Pipe(Pipe),
    Device(Device),
    Symlink(SymbolicLink),
}

impl Entry {
    pub fn metadata(&self) -> &Metadata {
        match self {
            Entry::Bundled(e) => &e.meta,
            Entry::Remote(e) => &e.meta,
            Entry::File(e) => &e.meta,
            Entry::Directory(e) => &e.meta,
            Entry::Pipe(e) => &e.meta,
            Entry::Device(e) => &e.meta,
            Entry::Symlink(e) => &e.meta,
        }
    }

    /// The `state` value that declares this kind of entry.
    pub fn state(&self) -> &'static str {
        match self {
            Entry::Bundled(_) => "from-host",
            Entry::Remote(_) => "from-target",
            Entry::File(_) => "file",
            Entry::Directory(_) => "directory",
            Entry::Pipe(_) => "pipe",
            Entry::Device(d) => match d.kind {
                DeviceKind::Block => "block-device",
                DeviceKind::Character => "character-device",
            },
            Entry::Symlink(_) => "symbolic-link",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespec_renders_padded_nanoseconds() {
        assert_eq!(Timespec::new(1700000000, 5).to_string(), "1700000000.000000005");
        assert_eq!(Timespec::new(0, 0).to_string(), "0.000000000");
    }

    #[test]
    fn metadata_defaults_to_root() {
        let meta = Metadata::default();
        assert_eq!(meta.owner(), Principal::new("root", 0));
        assert_eq!(meta.group(), Principal::new("root", 0));
        assert_eq!(meta.mode_or(DEFAULT_MODE), 0o644);
        assert_eq!(meta.mode_or(DEFAULT_DIRECTORY_MODE), 0o755);
    }

    #[test]
    fn device_kind_aliases() {
        assert_eq!(DeviceKind::parse("b"), Some(DeviceKind::Block));
        assert_eq!(DeviceKind::parse("character"), Some(DeviceKind::Character));
        assert_eq!(DeviceKind::parse("x"), None);
    }
}
