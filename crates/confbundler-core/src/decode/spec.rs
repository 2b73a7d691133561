//! Declarative type specifications for `files`, `packages` and `users`.
//!
//! A [`TypeSpec`] selects a [`RecordKind`] from the `state` discriminator and
//! lists, per type class, the properties that kind accepts. The tables are
//! plain data; [`crate::decode::Decoder`] interprets them.

use super::identity::Identity;
use super::node::{Mark, Node, Scalar};
use super::value::{Constructor, FieldValue};
use crate::errors::DecodeError;
use crate::model::{
    BundledEntry, Device, DeviceKind, Directory, Entry, InlineFile, Metadata, Package, Pipe,
    Principal, RemoteEntry, SymbolicLink, Timespec, User,
};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Concrete record a node decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Bundled,
    Remote,
    File,
    Directory,
    CharacterDevice,
    BlockDevice,
    Symlink,
    Pipe,
    Package,
    User,
    Absent,
}

impl RecordKind {
    fn is_entry(self) -> bool {
        !matches!(
            self,
            RecordKind::Package | RecordKind::User | RecordKind::Absent
        )
    }
}

/// A kind or a family of kinds in a validation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Exact(RecordKind),
    /// Both device kinds.
    Device,
    /// Every present filesystem entry.
    Entry,
}

impl TypeClass {
    pub fn covers(self, kind: RecordKind) -> bool {
        match self {
            TypeClass::Exact(k) => k == kind,
            TypeClass::Device => {
                matches!(kind, RecordKind::CharacterDevice | RecordKind::BlockDevice)
            }
            TypeClass::Entry => kind.is_entry(),
        }
    }
}

/// Default strategies for absent properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Feed a constant scalar through the property's constructor.
    Constant(&'static str),
    /// The document root joined with the identity made relative to `/`;
    /// the document root itself for patterns.
    RootJoinedIdentity,
    /// The identity itself.
    Identity,
}

impl Fallback {
    pub fn apply(
        self,
        property: &ExpectedProperty,
        identity: &Identity,
        root: &Path,
        mark: &Mark,
    ) -> Result<FieldValue, DecodeError> {
        match self {
            Fallback::Constant(value) => {
                let node = Node::scalar(Scalar::String(value.to_string()), mark.clone());
                property.constructor.construct(property.name, &node, root)
            }
            Fallback::RootJoinedIdentity => Ok(FieldValue::Path(match identity {
                Identity::Path(path) => root.join(path.strip_prefix("/").unwrap_or(path)),
                Identity::Pattern(_) => root.to_path_buf(),
                Identity::Name(name) => root.join(name),
            })),
            Fallback::Identity => Ok(match identity {
                Identity::Path(path) => FieldValue::Path(path.clone()),
                Identity::Pattern(pattern) => FieldValue::Path(PathBuf::from(pattern)),
                Identity::Name(name) => FieldValue::Text(name.clone()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
    Fallback(Fallback),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedProperty {
    pub name: &'static str,
    pub constructor: Constructor,
    pub requirement: Requirement,
}

const fn prop(
    name: &'static str,
    constructor: Constructor,
    requirement: Requirement,
) -> ExpectedProperty {
    ExpectedProperty {
        name,
        constructor,
        requirement,
    }
}

/// How the key of an element is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRule {
    Path,
    Name,
}

#[derive(Debug)]
pub struct TypeSpec {
    pub section: &'static str,
    pub identity: IdentityRule,
    pub default: RecordKind,
    pub states: &'static [(&'static str, RecordKind)],
    pub properties: &'static [(TypeClass, &'static [ExpectedProperty])],
}

impl TypeSpec {
    pub fn state(&self, value: &str) -> Option<RecordKind> {
        self.states
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, kind)| *kind)
    }
}

use Requirement::{Optional, Required};

pub static FILES: TypeSpec = TypeSpec {
    section: "files",
    identity: IdentityRule::Path,
    default: RecordKind::Bundled,
    states: &[
        ("from-host", RecordKind::Bundled),
        ("from-target", RecordKind::Remote),
        ("file", RecordKind::File),
        ("directory", RecordKind::Directory),
        ("character-device", RecordKind::CharacterDevice),
        ("block-device", RecordKind::BlockDevice),
        ("symbolic-link", RecordKind::Symlink),
        ("pipe", RecordKind::Pipe),
        ("absent", RecordKind::Absent),
    ],
    properties: &[
        (
            TypeClass::Exact(RecordKind::Bundled),
            &[prop(
                "source",
                Constructor::HostPath,
                Requirement::Fallback(Fallback::RootJoinedIdentity),
            )],
        ),
        (
            TypeClass::Exact(RecordKind::Remote),
            &[prop(
                "source",
                Constructor::TargetPath,
                Requirement::Fallback(Fallback::Identity),
            )],
        ),
        (
            TypeClass::Exact(RecordKind::File),
            &[prop("content", Constructor::Content, Required)],
        ),
        (
            TypeClass::Exact(RecordKind::CharacterDevice),
            &[prop(
                "kind",
                Constructor::DeviceKind,
                Requirement::Fallback(Fallback::Constant("c")),
            )],
        ),
        (
            TypeClass::Exact(RecordKind::BlockDevice),
            &[prop(
                "kind",
                Constructor::DeviceKind,
                Requirement::Fallback(Fallback::Constant("b")),
            )],
        ),
        (
            TypeClass::Device,
            &[
                prop("minor", Constructor::Number, Required),
                prop("major", Constructor::Number, Required),
            ],
        ),
        (
            TypeClass::Exact(RecordKind::Symlink),
            &[prop("destination", Constructor::TargetPath, Required)],
        ),
        (
            TypeClass::Entry,
            &[
                prop("owner", Constructor::Principal, Optional),
                prop("group", Constructor::Principal, Optional),
                prop("mode", Constructor::Mode, Optional),
                prop("atime", Constructor::Timestamp, Optional),
                prop("mtime", Constructor::Timestamp, Optional),
                prop("xattrs", Constructor::Xattrs, Optional),
            ],
        ),
    ],
};

pub static PACKAGES: TypeSpec = TypeSpec {
    section: "packages",
    identity: IdentityRule::Name,
    default: RecordKind::Package,
    states: &[
        ("installed", RecordKind::Package),
        ("present", RecordKind::Package),
        ("absent", RecordKind::Absent),
    ],
    properties: &[(
        TypeClass::Exact(RecordKind::Package),
        &[prop(
            "name",
            Constructor::Name,
            Requirement::Fallback(Fallback::Identity),
        )],
    )],
};

pub static USERS: TypeSpec = TypeSpec {
    section: "users",
    identity: IdentityRule::Name,
    default: RecordKind::User,
    states: &[("present", RecordKind::User), ("absent", RecordKind::Absent)],
    properties: &[(
        TypeClass::Exact(RecordKind::User),
        &[
            prop(
                "name",
                Constructor::Name,
                Requirement::Fallback(Fallback::Identity),
            ),
            prop("id", Constructor::Number, Optional),
            prop("groups", Constructor::Principals, Optional),
        ],
    )],
};

/// A decoded record of any family.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Entry(Entry),
    Package(Package),
    User(User),
    Absent,
}

/// Constructed property values, keyed by property name.
#[derive(Debug, Default)]
pub struct Fields {
    values: IndexMap<&'static str, FieldValue>,
    mark: Mark,
}

impl Fields {
    pub fn new(mark: Mark) -> Self {
        Self {
            values: IndexMap::new(),
            mark,
        }
    }

    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.values.insert(name, value);
    }

    fn take(&mut self, name: &'static str) -> Option<FieldValue> {
        self.values.shift_remove(name)
    }

    fn missing(&self, name: &'static str) -> DecodeError {
        DecodeError::MissingProperty {
            name,
            mark: self.mark.clone(),
        }
    }

    fn path(&mut self, name: &'static str) -> Result<PathBuf, DecodeError> {
        match self.take(name) {
            Some(FieldValue::Path(path)) => Ok(path),
            _ => Err(self.missing(name)),
        }
    }

    fn number(&mut self, name: &'static str) -> Option<u32> {
        match self.take(name) {
            Some(FieldValue::Number(n)) => Some(n),
            _ => None,
        }
    }

    fn text(&mut self, name: &'static str) -> Result<String, DecodeError> {
        match self.take(name) {
            Some(FieldValue::Text(text)) => Ok(text),
            _ => Err(self.missing(name)),
        }
    }

    fn principal(&mut self, name: &'static str) -> Option<Principal> {
        match self.take(name) {
            Some(FieldValue::Principal(p)) => Some(p),
            _ => None,
        }
    }

    fn timestamp(&mut self, name: &'static str) -> Option<Timespec> {
        match self.take(name) {
            Some(FieldValue::Timestamp(t)) => Some(t),
            _ => None,
        }
    }

    fn metadata(&mut self) -> Metadata {
        Metadata {
            owner: self.principal("owner"),
            group: self.principal("group"),
            mode: match self.take("mode") {
                Some(FieldValue::Mode(mode)) => Some(mode),
                _ => None,
            },
            atime: self.timestamp("atime"),
            mtime: self.timestamp("mtime"),
            xattrs: match self.take("xattrs") {
                Some(FieldValue::Xattrs(map)) => map,
                _ => BTreeMap::new(),
            },
        }
    }

    fn device(&mut self, expected: DeviceKind, state: &str) -> Result<Device, DecodeError> {
        let kind = match self.take("kind") {
            Some(FieldValue::DeviceKind(kind)) => kind,
            _ => return Err(self.missing("kind")),
        };
        if kind != expected {
            return Err(DecodeError::invalid(
                "kind",
                format!("{:?} device conflicts with state `{}'", kind, state),
                &self.mark,
            ));
        }
        let major = self.number("major").ok_or_else(|| self.missing("major"))?;
        let minor = self.number("minor").ok_or_else(|| self.missing("minor"))?;
        Ok(Device {
            kind,
            major,
            minor,
            meta: self.metadata(),
        })
    }
}

impl RecordKind {
    /// Build the record from its constructed fields.
    pub fn build(self, mut fields: Fields) -> Result<Record, DecodeError> {
        let entry = match self {
            RecordKind::Absent => return Ok(Record::Absent),
            RecordKind::Package => {
                return Ok(Record::Package(Package {
                    name: fields.text("name")?,
                }))
            }
            RecordKind::User => {
                return Ok(Record::User(User {
                    name: fields.text("name")?,
                    id: fields.number("id"),
                    groups: match fields.take("groups") {
                        Some(FieldValue::Principals(groups)) => groups,
                        _ => Vec::new(),
                    },
                }))
            }
            RecordKind::Bundled => Entry::Bundled(BundledEntry {
                source: fields.path("source")?,
                meta: fields.metadata(),
            }),
            RecordKind::Remote => Entry::Remote(RemoteEntry {
                source: fields.path("source")?,
                meta: fields.metadata(),
            }),
            RecordKind::File => {
                let content = match fields.take("content") {
                    Some(FieldValue::Bytes(bytes)) => bytes,
                    _ => return Err(fields.missing("content")),
                };
                Entry::File(InlineFile {
                    content,
                    meta: fields.metadata(),
                })
            }
            RecordKind::Directory => Entry::Directory(Directory {
                meta: fields.metadata(),
            }),
            RecordKind::Pipe => Entry::Pipe(Pipe {
                meta: fields.metadata(),
            }),
            RecordKind::CharacterDevice => {
                Entry::Device(fields.device(DeviceKind::Character, "character-device")?)
            }
            RecordKind::BlockDevice => {
                Entry::Device(fields.device(DeviceKind::Block, "block-device")?)
            }
            RecordKind::Symlink => Entry::Symlink(SymbolicLink {
                destination: fields.path("destination")?,
                meta: fields.metadata(),
            }),
        };
        Ok(Record::Entry(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_classes_cover_subtypes() {
        assert!(TypeClass::Entry.covers(RecordKind::Bundled));
        assert!(TypeClass::Entry.covers(RecordKind::BlockDevice));
        assert!(!TypeClass::Entry.covers(RecordKind::Absent));
        assert!(!TypeClass::Entry.covers(RecordKind::Package));
        assert!(TypeClass::Device.covers(RecordKind::CharacterDevice));
        assert!(!TypeClass::Device.covers(RecordKind::Pipe));
        assert!(TypeClass::Exact(RecordKind::File).covers(RecordKind::File));
    }

    #[test]
    fn every_state_is_unique() {
        for spec in [&FILES, &PACKAGES, &USERS] {
            for (i, (name, _)) in spec.states.iter().enumerate() {
                assert!(
                    spec.states[i + 1..].iter().all(|(other, _)| other != name),
                    "duplicate state {} in {}",
                    name,
                    spec.section
                );
            }
        }
    }

    #[test]
    fn fallbacks_derive_from_identity() {
        let source = ExpectedProperty {
            name: "source",
            constructor: Constructor::HostPath,
            requirement: Requirement::Fallback(Fallback::RootJoinedIdentity),
        };
        let root = Path::new("/srv/bundle");
        let mark = Mark::default();

        assert_eq!(
            Fallback::RootJoinedIdentity
                .apply(&source, &Identity::Path("/etc/motd".into()), root, &mark)
                .unwrap(),
            FieldValue::Path("/srv/bundle/etc/motd".into())
        );
        assert_eq!(
            Fallback::RootJoinedIdentity
                .apply(&source, &Identity::Pattern("/etc/*".into()), root, &mark)
                .unwrap(),
            FieldValue::Path("/srv/bundle".into())
        );
        assert_eq!(
            Fallback::Identity
                .apply(&source, &Identity::Name("nginx".into()), root, &mark)
                .unwrap(),
            FieldValue::Text("nginx".into())
        );
    }

    #[test]
    fn constant_fallback_runs_through_constructor() {
        let kind = ExpectedProperty {
            name: "kind",
            constructor: Constructor::DeviceKind,
            requirement: Requirement::Fallback(Fallback::Constant("b")),
        };
        assert_eq!(
            Fallback::Constant("b")
                .apply(&kind, &Identity::Path("/dev/sda".into()), Path::new("/"), &Mark::default())
                .unwrap(),
            FieldValue::DeviceKind(DeviceKind::Block)
        );
    }
}
