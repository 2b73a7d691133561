//! Error types for each pipeline stage.
//!
//! Decode errors are fatal for the element being decoded only; document
//! assembly downgrades them to [`codes::W_ENTRY_OMITTED`] diagnostics. Load,
//! resolve and encode errors abort the run.

pub mod diagnostic;

pub use diagnostic::{codes, Diagnostic, Diagnostics, Severity};

use crate::decode::Mark;
use std::path::PathBuf;

/// Fatal problem while decoding a single node.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported state `{value}' ({mark})")]
    UnknownState { value: String, mark: Mark },

    #[error("required property `{name}' not found ({mark})")]
    MissingProperty { name: &'static str, mark: Mark },

    #[error("expected {expected}, but found {found} ({mark})")]
    UnexpectedShape {
        expected: &'static str,
        found: String,
        mark: Mark,
    },

    #[error("found an empty node ({mark})")]
    EmptyNode { mark: Mark },

    #[error("invalid value for `{property}': {message} ({mark})")]
    InvalidValue {
        property: &'static str,
        message: String,
        mark: Mark,
    },

    #[error("unexpected argument `{argument}' for `{property}' ({mark})")]
    UnexpectedArgument {
        property: &'static str,
        argument: String,
        mark: Mark,
    },

    #[error("path `{path}' must not contain `..' ({mark})")]
    ParentComponent { path: String, mark: Mark },
}

impl DecodeError {
    pub fn mark(&self) -> &Mark {
        match self {
            Self::UnknownState { mark, .. }
            | Self::MissingProperty { mark, .. }
            | Self::UnexpectedShape { mark, .. }
            | Self::EmptyNode { mark }
            | Self::InvalidValue { mark, .. }
            | Self::UnexpectedArgument { mark, .. }
            | Self::ParentComponent { mark, .. } => mark,
        }
    }

    pub(crate) fn shape(expected: &'static str, found: impl Into<String>, mark: &Mark) -> Self {
        Self::UnexpectedShape {
            expected,
            found: found.into(),
            mark: mark.clone(),
        }
    }

    pub(crate) fn invalid(property: &'static str, message: impl Into<String>, mark: &Mark) -> Self {
        Self::InvalidValue {
            property,
            message: message.into(),
            mark: mark.clone(),
        }
    }
}

/// Fatal problem while reading a bundle source.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {source_name}: {source}")]
    Yaml {
        source_name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("expected a bundle mapping, but found {found} ({mark})")]
    NotABundle { found: &'static str, mark: Mark },
}

/// Fatal problem while resolving an entry against the host filesystem.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: failed to open: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: failed to read link: {source}", path.display())]
    ReadLink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: unsupported file type", path.display())]
    UnsupportedKind { path: PathBuf },
}

/// Fatal problem while writing the archive.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{}: failed to write archive entry: {source}", path.display())]
    Entry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: content ended after {written} of {declared} bytes", path.display())]
    ShortContent {
        path: PathBuf,
        written: u64,
        declared: u64,
    },

    #[error("failed to finish archive: {0}")]
    Finish(#[source] std::io::Error),
}
