use crate::decode::Mark;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Info,
}

/// A non-fatal problem found while building a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip)]
    pub mark: Option<Mark>,
}

impl Diagnostic {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warn,
            message: message.into(),
            location: None,
            mark: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_mark(mut self, mark: &Mark) -> Self {
        self.location = Some(mark.to_string());
        self.mark = Some(mark.clone());
        self
    }

    pub fn format_terminal(&self) -> String {
        match &self.location {
            Some(location) => format!("[{}] {} ({})", self.code, self.message, location),
            None => format!("[{}] {}", self.code, self.message),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_terminal())
    }
}

/// Accumulates diagnostics and forwards each one to `tracing`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warn => tracing::warn!(
                code = diagnostic.code,
                location = diagnostic.location.as_deref().unwrap_or("-"),
                "{}",
                diagnostic.message
            ),
            Severity::Info => tracing::info!(
                code = diagnostic.code,
                location = diagnostic.location.as_deref().unwrap_or("-"),
                "{}",
                diagnostic.message
            ),
        }
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warnings(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warn)
            .count()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.items.iter().map(|d| d.code).collect()
    }
}

// Stable diagnostic codes
pub mod codes {
    // Decoding
    pub const W_UNRECOGNIZED_PROPERTY: &str = "W_UNRECOGNIZED_PROPERTY";
    pub const W_RELATIVE_PATH: &str = "W_RELATIVE_PATH";
    pub const W_EXTRA_KEY: &str = "W_EXTRA_KEY";

    // Document assembly
    pub const W_UNRECOGNIZED_SECTION: &str = "W_UNRECOGNIZED_SECTION";
    pub const W_SECTION_NOT_SEQUENCE: &str = "W_SECTION_NOT_SEQUENCE";
    pub const W_ENTRY_OMITTED: &str = "W_ENTRY_OMITTED";
    pub const W_GLOB_LITERAL: &str = "W_GLOB_LITERAL";

    // Resolution
    pub const W_GLOB_FAILED: &str = "W_GLOB_FAILED";
    pub const W_REMOTE_UNRESOLVED: &str = "W_REMOTE_UNRESOLVED";

    // Encoding
    pub const W_ABSENT_SKIPPED: &str = "W_ABSENT_SKIPPED";
    pub const W_REMOTE_SKIPPED: &str = "W_REMOTE_SKIPPED";
}
