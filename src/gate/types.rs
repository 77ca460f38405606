// ABOUTME: Core types for the access gate.
// ABOUTME: Verdict, callable subjects, call context, rejection records, and persistence modes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of evaluating a file-access rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn from_allow(allow: bool) -> Self {
        if allow { Verdict::Allow } else { Verdict::Deny }
    }

    pub fn is_allowed(self) -> bool {
        self == Verdict::Allow
    }
}

/// A unit of remotely supplied code whose type identity is subject to whitelisting.
///
/// Whitelist entries are keyed on [`type_name`](Self::type_name), so it must
/// be stable across builds and toolchains. Return the name carried on the
/// wire or a hand-written constant; `std::any::type_name` is not stable
/// between compiler versions and must not be used here.
pub trait CallableSubject {
    /// Fully qualified, build-independent name of the callable type.
    fn type_name(&self) -> &str;
}

/// Who asked for a callable to run. Used only for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub peer: String,
}

impl CallContext {
    pub fn new(peer: impl Into<String>) -> Self {
        Self { peer: peer.into() }
    }
}

/// A callable type that was refused because it was not whitelisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Qualified type name of the refused callable.
    pub name: String,
    /// When the type was first refused by this process.
    pub first_seen: DateTime<Utc>,
    /// How many refusals have been observed since `first_seen`.
    pub attempts: u64,
}

/// Whether rejected callables survive a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPersistence {
    /// Kept in memory only; the pending list starts empty on every start.
    #[default]
    Memory,
    /// Mirrored to `rejected-callables.txt` and read back at startup.
    File,
}
