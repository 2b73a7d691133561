use super::identity::{self, Identity};
use super::node::{Mark, Node, NodeKind, Scalar};
use super::spec::{Fields, IdentityRule, Record, Requirement, TypeSpec};
use crate::errors::{codes, DecodeError, Diagnostic, Diagnostics};
use indexmap::IndexMap;
use std::path::PathBuf;

const STATE: &str = "state";

/// Interprets [`TypeSpec`] tables against document nodes.
///
/// The decoder only carries the document root, used to resolve relative host
/// paths and to synthesize default sources.
#[derive(Debug, Clone)]
pub struct Decoder {
    root: PathBuf,
}

impl Decoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Decode one section element into its identity and record.
    pub fn decode(
        &self,
        spec: &TypeSpec,
        node: &Node,
        diags: &mut Diagnostics,
    ) -> Result<(Identity, Record), DecodeError> {
        let (key, properties) = unpack(node, diags)?;

        let identity = match spec.identity {
            IdentityRule::Path => identity::parse_path(key, diags)?,
            IdentityRule::Name => identity::parse_name(key)?,
        };

        let record = self.construct(spec, &identity, properties, &node.mark, diags)?;
        Ok((identity, record))
    }

    fn construct(
        &self,
        spec: &TypeSpec,
        identity: &Identity,
        properties: Option<&[(Node, Node)]>,
        mark: &Mark,
        diags: &mut Diagnostics,
    ) -> Result<Record, DecodeError> {
        let mut table: IndexMap<&str, &Node> = IndexMap::new();
        for (key, value) in properties.unwrap_or_default() {
            let name = key
                .as_scalar()
                .and_then(Scalar::as_str)
                .ok_or_else(|| DecodeError::shape("a property name", key.id(), &value.mark))?;
            table.insert(name, value);
        }

        let kind = match table.shift_remove(STATE) {
            None => spec.default,
            Some(node) => {
                let value = node
                    .as_scalar()
                    .and_then(Scalar::as_str)
                    .ok_or_else(|| DecodeError::UnknownState {
                        value: node
                            .as_scalar()
                            .map(Scalar::render)
                            .unwrap_or_else(|| node.id().to_string()),
                        mark: node.mark.clone(),
                    })?;
                spec.state(value).ok_or_else(|| DecodeError::UnknownState {
                    value: value.to_string(),
                    mark: node.mark.clone(),
                })?
            }
        };

        let mut fields = Fields::new(mark.clone());
        for (class, expected) in spec.properties {
            if !class.covers(kind) {
                continue;
            }
            for property in expected.iter() {
                if let Some(node) = table.shift_remove(property.name) {
                    let value = property.constructor.construct(property.name, node, &self.root)?;
                    fields.insert(property.name, value);
                    continue;
                }
                match property.requirement {
                    Requirement::Required => {
                        return Err(DecodeError::MissingProperty {
                            name: property.name,
                            mark: mark.clone(),
                        })
                    }
                    Requirement::Optional => {}
                    Requirement::Fallback(fallback) => {
                        let value = fallback.apply(property, identity, &self.root, mark)?;
                        fields.insert(property.name, value);
                    }
                }
            }
        }

        for (name, node) in table {
            diags.push(
                Diagnostic::new(
                    codes::W_UNRECOGNIZED_PROPERTY,
                    format!("unrecognized property `{}' for {}", name, identity),
                )
                .with_mark(&node.mark),
            );
        }

        kind.build(fields)
    }
}

/// Split an element into its key node and optional property list.
fn unpack<'n>(
    node: &'n Node,
    diags: &mut Diagnostics,
) -> Result<(&'n Node, Option<&'n [(Node, Node)]>), DecodeError> {
    match &node.kind {
        NodeKind::Scalar(Scalar::Null) => Err(DecodeError::EmptyNode {
            mark: node.mark.clone(),
        }),
        NodeKind::Scalar(_) => Ok((node, None)),
        NodeKind::Mapping(entries) => {
            let Some((key, value)) = entries.first() else {
                return Err(DecodeError::EmptyNode {
                    mark: node.mark.clone(),
                });
            };
            for (extra, _) in &entries[1..] {
                diags.push(
                    Diagnostic::new(
                        codes::W_EXTRA_KEY,
                        format!(
                            "ignoring extra key `{}'; an element declares one resource",
                            extra
                                .as_scalar()
                                .map(Scalar::render)
                                .unwrap_or_else(|| extra.id().to_string())
                        ),
                    )
                    .with_mark(&node.mark),
                );
            }
            match &value.kind {
                NodeKind::Mapping(properties) => Ok((key, Some(properties.as_slice()))),
                NodeKind::Scalar(Scalar::Null) => Ok((key, None)),
                _ => Err(DecodeError::shape("a property mapping", value.id(), &value.mark)),
            }
        }
        NodeKind::Sequence(_) => Err(DecodeError::shape(
            "a scalar or mapping",
            node.id(),
            &node.mark,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::spec::{FILES, PACKAGES, USERS};
    use crate::model::{
        BundledEntry, Device, DeviceKind, Entry, Metadata, Package, Principal, RemoteEntry,
        SymbolicLink, Timespec, User,
    };

    fn element(yaml: &str) -> Node {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        Node::from_yaml(&value, Mark::root(Some("test.yaml".into()), 0).key("files").index(0))
    }

    fn decode(spec: &TypeSpec, yaml: &str) -> (Result<(Identity, Record), DecodeError>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let result = Decoder::new("/bundle").decode(spec, &element(yaml), &mut diags);
        (result, diags)
    }

    #[test]
    fn bare_path_is_bundled_from_root() {
        let (result, diags) = decode(&FILES, "/etc/motd");
        let (identity, record) = result.unwrap();
        assert_eq!(identity, Identity::Path("/etc/motd".into()));
        assert_eq!(
            record,
            Record::Entry(Entry::Bundled(BundledEntry {
                source: "/bundle/etc/motd".into(),
                meta: Metadata::default(),
            }))
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn null_properties_behave_like_bare_scalar() {
        let (bare, _) = decode(&FILES, "/etc/motd");
        let (null, _) = decode(&FILES, "/etc/motd: ~");
        assert_eq!(bare.unwrap(), null.unwrap());
    }

    #[test]
    fn decoding_is_deterministic() {
        let yaml = "/etc/app.conf: {owner: [app, 100], mode: '0640', mtime: [5, 6], source: conf/app}";
        let (first, _) = decode(&FILES, yaml);
        let (second, _) = decode(&FILES, yaml);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn common_properties_apply_to_every_entry() {
        let (result, _) = decode(
            &FILES,
            "/etc/app.conf: {owner: [app, 100], group: app, mode: '0640', mtime: [5, 6], source: conf/app}",
        );
        let (_, record) = result.unwrap();
        let Record::Entry(Entry::Bundled(entry)) = record else {
            panic!("expected bundled entry");
        };
        assert_eq!(entry.source, PathBuf::from("/bundle/conf/app"));
        assert_eq!(entry.meta.owner, Some(Principal::new("app", 100)));
        assert_eq!(entry.meta.group, Some(Principal::new("app", 0)));
        assert_eq!(entry.meta.mode, Some(0o640));
        assert_eq!(entry.meta.mtime, Some(Timespec::new(5, 6)));
        assert_eq!(entry.meta.atime, None);
    }

    #[test]
    fn missing_content_names_the_property() {
        let (result, _) = decode(&FILES, "/etc/motd: {state: file}");
        match result.unwrap_err() {
            DecodeError::MissingProperty { name, mark } => {
                assert_eq!(name, "content");
                assert_eq!(mark.path, "files[0]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_state_is_fatal() {
        let (result, _) = decode(&FILES, "/etc/motd: {state: hardlink}");
        assert!(matches!(
            result.unwrap_err(),
            DecodeError::UnknownState { ref value, .. } if value == "hardlink"
        ));
    }

    #[test]
    fn unrecognized_properties_are_reported_not_fatal() {
        let (result, diags) = decode(&FILES, "/tmp: {state: directory, colour: blue}");
        assert!(result.is_ok());
        assert_eq!(diags.codes(), vec![codes::W_UNRECOGNIZED_PROPERTY]);
        let diag = diags.iter().next().unwrap();
        assert!(diag.message.contains("colour"));
        assert_eq!(
            diag.mark.as_ref().map(|m| m.path.as_str()),
            Some("files[0]./tmp.colour")
        );
    }

    #[test]
    fn property_of_other_state_is_unrecognized() {
        let (result, diags) = decode(&FILES, "/tmp: {state: directory, content: x}");
        assert!(result.is_ok());
        assert_eq!(diags.codes(), vec![codes::W_UNRECOGNIZED_PROPERTY]);
    }

    #[test]
    fn remote_source_defaults_to_identity() {
        let (result, _) = decode(&FILES, "/opt/data: {state: from-target}");
        assert_eq!(
            result.unwrap().1,
            Record::Entry(Entry::Remote(RemoteEntry {
                source: "/opt/data".into(),
                meta: Metadata::default(),
            }))
        );
    }

    #[test]
    fn glob_template_source_defaults_to_root() {
        let (result, _) = decode(&FILES, "/etc/*.conf: {mode: 0o600}");
        let (identity, record) = result.unwrap();
        assert_eq!(identity, Identity::Pattern("/etc/*.conf".into()));
        let Record::Entry(Entry::Bundled(entry)) = record else {
            panic!("expected bundled entry");
        };
        assert_eq!(entry.source, PathBuf::from("/bundle"));
    }

    #[test]
    fn devices_default_kind_from_state() {
        let (result, _) = decode(&FILES, "/dev/null: {state: character-device, major: 1, minor: 3}");
        assert_eq!(
            result.unwrap().1,
            Record::Entry(Entry::Device(Device {
                kind: DeviceKind::Character,
                major: 1,
                minor: 3,
                meta: Metadata::default(),
            }))
        );

        let (result, _) = decode(&FILES, "/dev/sda: {state: block-device, minor: 0}");
        assert!(matches!(
            result.unwrap_err(),
            DecodeError::MissingProperty { name: "major", .. }
        ));
    }

    #[test]
    fn conflicting_device_kind_is_rejected() {
        let (result, _) = decode(
            &FILES,
            "/dev/sda: {state: block-device, kind: c, major: 8, minor: 0}",
        );
        assert!(matches!(
            result.unwrap_err(),
            DecodeError::InvalidValue { property: "kind", .. }
        ));
    }

    #[test]
    fn symlink_requires_destination() {
        let (result, _) = decode(&FILES, "/bin/sh: {state: symbolic-link}");
        assert!(matches!(
            result.unwrap_err(),
            DecodeError::MissingProperty { name: "destination", .. }
        ));

        let (result, _) = decode(&FILES, "/bin/sh: {state: symbolic-link, destination: dash}");
        assert_eq!(
            result.unwrap().1,
            Record::Entry(Entry::Symlink(SymbolicLink {
                destination: "dash".into(),
                meta: Metadata::default(),
            }))
        );
    }

    #[test]
    fn absent_discards_properties() {
        let (result, diags) = decode(&FILES, "/etc/passwd: {state: absent, mode: 0o600}");
        assert_eq!(result.unwrap().1, Record::Absent);
        assert_eq!(diags.codes(), vec![codes::W_UNRECOGNIZED_PROPERTY]);
    }

    #[test]
    fn extra_keys_are_reported() {
        let (result, diags) = decode(&FILES, "{/etc/a: ~, /etc/b: ~}");
        assert_eq!(result.unwrap().0, Identity::Path("/etc/a".into()));
        assert_eq!(diags.codes(), vec![codes::W_EXTRA_KEY]);
    }

    #[test]
    fn sequences_and_empty_nodes_are_rejected() {
        let (result, _) = decode(&FILES, "[/etc/a]");
        assert!(matches!(result.unwrap_err(), DecodeError::UnexpectedShape { .. }));
        let (result, _) = decode(&FILES, "~");
        assert!(matches!(result.unwrap_err(), DecodeError::EmptyNode { .. }));
        let (result, _) = decode(&FILES, "/etc/a: [1]");
        assert!(matches!(result.unwrap_err(), DecodeError::UnexpectedShape { .. }));
    }

    #[test]
    fn packages_and_users() {
        let (result, _) = decode(&PACKAGES, "nginx");
        assert_eq!(
            result.unwrap(),
            (
                Identity::Name("nginx".into()),
                Record::Package(Package {
                    name: "nginx".into()
                })
            )
        );

        let (result, _) = decode(&PACKAGES, "telnet: {state: absent}");
        assert_eq!(result.unwrap().1, Record::Absent);

        let (result, _) = decode(&USERS, "deploy: {id: 1001, groups: [[wheel, 10], docker]}");
        assert_eq!(
            result.unwrap().1,
            Record::User(User {
                name: "deploy".into(),
                id: Some(1001),
                groups: vec![Principal::new("wheel", 10), Principal::new("docker", 0)],
            })
        );

        let (result, _) = decode(&USERS, "deploy: {state: installed}");
        assert!(matches!(result.unwrap_err(), DecodeError::UnknownState { .. }));
    }
}
