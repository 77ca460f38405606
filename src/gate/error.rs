// ABOUTME: Error type for the access gate.
// ABOUTME: Authorization, persistence, and rule-compilation failures.

use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by gate construction and administrative mutations.
///
/// Denials are not errors: they come back as `false` or [`Verdict::Deny`](super::Verdict).
#[derive(Debug, Error)]
pub enum GateError {
    /// The caller lacks the administrator capability.
    #[error("forbidden")]
    Forbidden,
    /// A backing file could not be read or written.
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A rule's path pattern is not a valid regular expression.
    #[error("malformed path pattern {pattern:?}: {source}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// A rule's operation matcher is not a valid glob.
    #[error("malformed operation pattern {pattern:?}: {source}")]
    MalformedOperation {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl GateError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GateError::Persistence {
            path: path.into(),
            source,
        }
    }
}
