//! Property value construction.
//!
//! A property node is first decoded into a [`RawValue`] (mapping, sequence or
//! scalar). Each [`Constructor`] then maps the three shapes onto its typed
//! output: mappings bind arguments by keyword, sequences bind them by
//! position and scalars are passed as the single argument.

use super::node::{Mark, Node, NodeKind, Scalar};
use crate::errors::DecodeError;
use crate::model::{DeviceKind, Principal, Timespec};
use base64::Engine as _;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const MAX_MODE: i64 = 0o7777;

/// A decoded property value, before any typed construction.
#[derive(Debug, Clone, Copy)]
pub enum RawValue<'n> {
    Mapping(&'n [(Node, Node)]),
    Sequence(&'n [Node]),
    Scalar(&'n Scalar),
}

impl<'n> RawValue<'n> {
    pub fn of(node: &'n Node) -> Self {
        match &node.kind {
            NodeKind::Mapping(entries) => RawValue::Mapping(entries),
            NodeKind::Sequence(items) => RawValue::Sequence(items),
            NodeKind::Scalar(scalar) => RawValue::Scalar(scalar),
        }
    }
}

/// Closed set of value constructors referenced by the type specifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constructor {
    /// A path on the authoring host, relative values joined to the document root.
    HostPath,
    /// A path on the target, taken verbatim.
    TargetPath,
    /// Inline file content: a string, `{text}`, `{base64}` or a `!binary` scalar.
    Content,
    DeviceKind,
    /// A non-negative 32-bit integer.
    Number,
    /// Permission bits, as an integer or an octal string.
    Mode,
    /// `{name, id}`, `[name, id]` or `name`.
    Principal,
    /// A sequence of principals.
    Principals,
    /// `{seconds, nanoseconds}`, `[seconds, nanoseconds]`, seconds or RFC 3339.
    Timestamp,
    /// Mapping of attribute names to scalar values.
    Xattrs,
    /// A plain string.
    Name,
}

/// Typed output of a [`Constructor`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Path(PathBuf),
    Bytes(Vec<u8>),
    DeviceKind(DeviceKind),
    Number(u32),
    Mode(u32),
    Principal(Principal),
    Principals(Vec<Principal>),
    Timestamp(Timespec),
    Xattrs(BTreeMap<String, String>),
    Text(String),
}

impl Constructor {
    pub fn construct(
        self,
        property: &'static str,
        node: &Node,
        root: &Path,
    ) -> Result<FieldValue, DecodeError> {
        let mark = &node.mark;
        let raw = RawValue::of(node);

        match self {
            Constructor::HostPath => {
                let value = string_arg(property, raw, mark)?;
                Ok(FieldValue::Path(root.join(value)))
            }
            Constructor::TargetPath => {
                let value = string_arg(property, raw, mark)?;
                Ok(FieldValue::Path(PathBuf::from(value)))
            }
            Constructor::Content => content(property, raw, mark).map(FieldValue::Bytes),
            Constructor::DeviceKind => {
                let value = string_arg(property, raw, mark)?;
                DeviceKind::parse(value)
                    .map(FieldValue::DeviceKind)
                    .ok_or_else(|| {
                        DecodeError::invalid(
                            property,
                            format!("unknown device kind `{}'", value),
                            mark,
                        )
                    })
            }
            Constructor::Number => match raw {
                RawValue::Scalar(scalar) => number(property, scalar, mark).map(FieldValue::Number),
                _ => Err(DecodeError::shape("an integer", node.id(), mark)),
            },
            Constructor::Mode => match raw {
                RawValue::Scalar(scalar) => mode(property, scalar, mark).map(FieldValue::Mode),
                _ => Err(DecodeError::shape("a mode", node.id(), mark)),
            },
            Constructor::Principal => principal(property, raw, mark).map(FieldValue::Principal),
            Constructor::Principals => match raw {
                RawValue::Sequence(items) => items
                    .iter()
                    .map(|item| principal(property, RawValue::of(item), &item.mark))
                    .collect::<Result<Vec<_>, _>>()
                    .map(FieldValue::Principals),
                _ => Err(DecodeError::shape("a sequence", node.id(), mark)),
            },
            Constructor::Timestamp => timestamp(property, raw, mark).map(FieldValue::Timestamp),
            Constructor::Xattrs => xattrs(property, raw, node).map(FieldValue::Xattrs),
            Constructor::Name => string_arg(property, raw, mark).map(|s| FieldValue::Text(s.into())),
        }
    }
}

/// Bind keyword (mapping) or positional (sequence) arguments to `params`.
/// A scalar binds to the first parameter.
fn bind<'n>(
    property: &'static str,
    params: &[&'static str],
    raw: RawValue<'n>,
    mark: &'n Mark,
) -> Result<Vec<Option<(&'n Scalar, &'n Mark)>>, DecodeError> {
    let mut bound = vec![None; params.len()];

    match raw {
        RawValue::Scalar(scalar) => bound[0] = Some((scalar, mark)),
        RawValue::Sequence(items) => {
            if items.len() > params.len() {
                return Err(DecodeError::UnexpectedArgument {
                    property,
                    argument: format!("#{}", params.len() + 1),
                    mark: items[params.len()].mark.clone(),
                });
            }
            for (slot, item) in bound.iter_mut().zip(items) {
                let scalar = item
                    .as_scalar()
                    .ok_or_else(|| DecodeError::shape("a scalar", item.id(), &item.mark))?;
                *slot = Some((scalar, &item.mark));
            }
        }
        RawValue::Mapping(entries) => {
            for (key, value) in entries {
                let name = key
                    .as_scalar()
                    .and_then(Scalar::as_str)
                    .ok_or_else(|| DecodeError::shape("a string key", key.id(), &value.mark))?;
                let index = params.iter().position(|p| *p == name).ok_or_else(|| {
                    DecodeError::UnexpectedArgument {
                        property,
                        argument: name.to_string(),
                        mark: value.mark.clone(),
                    }
                })?;
                let scalar = value
                    .as_scalar()
                    .ok_or_else(|| DecodeError::shape("a scalar", value.id(), &value.mark))?;
                bound[index] = Some((scalar, &value.mark));
            }
        }
    }

    Ok(bound)
}

fn string_arg<'n>(
    property: &'static str,
    raw: RawValue<'n>,
    mark: &Mark,
) -> Result<&'n str, DecodeError> {
    match raw {
        RawValue::Scalar(Scalar::String(s)) => Ok(s.as_str()),
        RawValue::Scalar(other) => Err(DecodeError::invalid(
            property,
            format!("expected a string, found `{}'", other.render()),
            mark,
        )),
        RawValue::Mapping(_) => Err(DecodeError::shape("a string", "mapping", mark)),
        RawValue::Sequence(_) => Err(DecodeError::shape("a string", "sequence", mark)),
    }
}

fn number(property: &'static str, scalar: &Scalar, mark: &Mark) -> Result<u32, DecodeError> {
    match scalar {
        Scalar::Integer(i) => u32::try_from(*i)
            .map_err(|_| DecodeError::invalid(property, format!("{} is out of range", i), mark)),
        other => Err(DecodeError::invalid(
            property,
            format!("expected an integer, found `{}'", other.render()),
            mark,
        )),
    }
}

fn mode(property: &'static str, scalar: &Scalar, mark: &Mark) -> Result<u32, DecodeError> {
    let bits = match scalar {
        Scalar::Integer(i) => *i,
        Scalar::String(s) => {
            let digits = s.strip_prefix("0o").unwrap_or(s);
            i64::from_str_radix(digits, 8).map_err(|_| {
                DecodeError::invalid(property, format!("`{}' is not an octal mode", s), mark)
            })?
        }
        other => {
            return Err(DecodeError::invalid(
                property,
                format!("expected a mode, found `{}'", other.render()),
                mark,
            ))
        }
    };

    if !(0..=MAX_MODE).contains(&bits) {
        return Err(DecodeError::invalid(
            property,
            format!("mode {:o} is out of range", bits),
            mark,
        ));
    }
    Ok(bits as u32)
}

fn principal(
    property: &'static str,
    raw: RawValue<'_>,
    mark: &Mark,
) -> Result<Principal, DecodeError> {
    let args = bind(property, &["name", "id"], raw, mark)?;

    let name = match args[0] {
        Some((Scalar::String(s), _)) => s.clone(),
        Some((other, at)) => {
            return Err(DecodeError::invalid(
                property,
                format!("expected a name, found `{}'", other.render()),
                at,
            ))
        }
        None => {
            return Err(DecodeError::invalid(
                property,
                "missing argument `name'",
                mark,
            ))
        }
    };
    let id = match args[1] {
        Some((scalar, at)) => number(property, scalar, at)?,
        None => 0,
    };

    Ok(Principal { name, id })
}

fn timestamp(
    property: &'static str,
    raw: RawValue<'_>,
    mark: &Mark,
) -> Result<Timespec, DecodeError> {
    if let RawValue::Scalar(Scalar::String(s)) = raw {
        let parsed = chrono::DateTime::parse_from_rfc3339(s).map_err(|e| {
            DecodeError::invalid(property, format!("`{}' is not a timestamp: {}", s, e), mark)
        })?;
        return Ok(Timespec::new(
            parsed.timestamp(),
            parsed.timestamp_subsec_nanos(),
        ));
    }

    let args = bind(property, &["seconds", "nanoseconds"], raw, mark)?;
    let secs = match args[0] {
        Some((Scalar::Integer(i), _)) => *i,
        Some((other, at)) => {
            return Err(DecodeError::invalid(
                property,
                format!("expected seconds, found `{}'", other.render()),
                at,
            ))
        }
        None => {
            return Err(DecodeError::invalid(
                property,
                "missing argument `seconds'",
                mark,
            ))
        }
    };
    let nanos = match args[1] {
        Some((Scalar::Integer(i), _)) if (0..NANOS_PER_SEC).contains(i) => *i as u32,
        Some((other, at)) => {
            return Err(DecodeError::invalid(
                property,
                format!("invalid nanoseconds `{}'", other.render()),
                at,
            ))
        }
        None => 0,
    };

    Ok(Timespec::new(secs, nanos))
}

fn xattrs(
    property: &'static str,
    raw: RawValue<'_>,
    node: &Node,
) -> Result<BTreeMap<String, String>, DecodeError> {
    let RawValue::Mapping(entries) = raw else {
        return Err(DecodeError::shape("a mapping", node.id(), &node.mark));
    };

    let mut out = BTreeMap::new();
    for (key, value) in entries {
        let name = key
            .as_scalar()
            .and_then(Scalar::as_str)
            .ok_or_else(|| DecodeError::shape("a string key", key.id(), &value.mark))?;
        let rendered = match value.as_scalar() {
            Some(Scalar::Null) | None => {
                return Err(DecodeError::invalid(
                    property,
                    format!("attribute `{}' needs a scalar value", name),
                    &value.mark,
                ))
            }
            Some(Scalar::Tagged { value, .. }) => value.clone(),
            Some(scalar) => scalar.render(),
        };
        out.insert(name.to_string(), rendered);
    }
    Ok(out)
}

fn content(property: &'static str, raw: RawValue<'_>, mark: &Mark) -> Result<Vec<u8>, DecodeError> {
    match raw {
        RawValue::Scalar(Scalar::String(s)) => Ok(s.as_bytes().to_vec()),
        RawValue::Scalar(Scalar::Null) => Ok(Vec::new()),
        RawValue::Scalar(Scalar::Tagged { tag, value }) if tag.ends_with("binary") => {
            from_base64(property, value, mark)
        }
        RawValue::Scalar(other) => Err(DecodeError::invalid(
            property,
            format!("expected file content, found `{}'", other.render()),
            mark,
        )),
        RawValue::Mapping(_) => {
            match bind(property, &["text", "base64"], raw, mark)?.as_slice() {
                [Some((Scalar::String(text), _)), None] => Ok(text.as_bytes().to_vec()),
                [None, Some((Scalar::String(encoded), at))] => from_base64(property, encoded, at),
                [None, None] => Err(DecodeError::invalid(
                    property,
                    "expected one of `text' or `base64'",
                    mark,
                )),
                [Some(_), Some(_)] => Err(DecodeError::invalid(
                    property,
                    "`text' and `base64' are mutually exclusive",
                    mark,
                )),
                [Some((other, at)), None] | [None, Some((other, at))] => {
                    Err(DecodeError::invalid(
                        property,
                        format!("expected a string, found `{}'", other.render()),
                        at,
                    ))
                }
                _ => Err(DecodeError::shape("file content", "mapping", mark)),
            }
        }
        RawValue::Sequence(_) => Err(DecodeError::shape("file content", "sequence", mark)),
    }
}

/// `serde_yaml` drops the core `!!binary` tag, so base64 content is spelled
/// `{base64: ...}` or with the local `!binary` tag.
fn from_base64(property: &'static str, encoded: &str, mark: &Mark) -> Result<Vec<u8>, DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| DecodeError::invalid(property, format!("invalid base64: {}", e), mark))
}
