//! Record identities: literal paths, glob patterns and plain names.

use super::node::{Node, Scalar};
use crate::errors::{codes, DecodeError, Diagnostic, Diagnostics};
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};

const GLOB_METACHARACTERS: [char; 3] = ['*', '?', '['];

/// The key a decoded record is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Identity {
    /// An absolute, normalized filesystem path.
    Path(PathBuf),
    /// A glob pattern, always starting with `/`.
    Pattern(String),
    /// A package or user name.
    Name(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Path(p) => write!(f, "{}", p.display()),
            Identity::Pattern(s) | Identity::Name(s) => f.write_str(s),
        }
    }
}

pub fn is_pattern(value: &str) -> bool {
    value.contains(GLOB_METACHARACTERS)
}

/// Parse a `files` key into a pattern or an absolute literal path.
///
/// Relative keys are accepted with a [`codes::W_RELATIVE_PATH`] diagnostic and
/// re-rooted at `/`.
pub fn parse_path(node: &Node, diags: &mut Diagnostics) -> Result<Identity, DecodeError> {
    let value = match node.as_scalar() {
        Some(Scalar::String(s)) => s.as_str(),
        Some(other) => {
            return Err(DecodeError::shape(
                "a string",
                other.render(),
                &node.mark,
            ))
        }
        None => return Err(DecodeError::shape("a string", node.id(), &node.mark)),
    };

    let absolute = value.starts_with('/');
    if !absolute {
        diags.push(
            Diagnostic::new(
                codes::W_RELATIVE_PATH,
                format!("path {} is not absolute", value),
            )
            .with_mark(&node.mark),
        );
    }

    if is_pattern(value) {
        return Ok(Identity::Pattern(if absolute {
            value.to_string()
        } else {
            format!("/{}", value)
        }));
    }

    normalize(value)
        .map(Identity::Path)
        .ok_or_else(|| DecodeError::ParentComponent {
            path: value.to_string(),
            mark: node.mark.clone(),
        })
}

/// Parse a package or user key.
pub fn parse_name(node: &Node) -> Result<Identity, DecodeError> {
    match node.as_scalar() {
        Some(Scalar::String(s)) => Ok(Identity::Name(s.clone())),
        Some(other) => Err(DecodeError::shape("a string", other.render(), &node.mark)),
        None => Err(DecodeError::shape("a string", node.id(), &node.mark)),
    }
}

/// Lexically normalize `value` into an absolute path. Returns `None` when a
/// `..` component is present.
fn normalize(value: &str) -> Option<PathBuf> {
    let mut out = PathBuf::from("/");
    for component in Path::new(value).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => return None,
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    Some(out)
}
