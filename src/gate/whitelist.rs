// ABOUTME: Whitelist of callable type names approved by an administrator.
// ABOUTME: Thin wrapper over PersistentLineSet that logs every mutation.

use std::path::{Path, PathBuf};

use tracing::info;

use super::error::GateError;
use super::lines::PersistentLineSet;

/// File name of the whitelist inside the secrets directory.
pub const WHITELIST_FILE: &str = "whitelisted-callables.txt";

/// Bring a callable name into the form the whitelist stores: trimmed, non-empty,
/// and on a single line. Names that cannot be stored come back as `None`.
pub fn normalize_name(name: &str) -> Option<&str> {
    let name = name.trim();
    if name.is_empty() || name.contains(['\n', '\r']) {
        None
    } else {
        Some(name)
    }
}

/// Approved callable type names, one per line.
///
/// Names are not validated. A misspelled entry never matches a real type
/// and is therefore inert.
#[derive(Debug)]
pub struct WhitelistStore {
    lines: PersistentLineSet,
}

impl WhitelistStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            lines: PersistentLineSet::open(path),
        }
    }

    /// Open `whitelisted-callables.txt` under `secrets_dir`.
    pub fn in_dir(secrets_dir: &Path) -> Self {
        Self::open(secrets_dir.join(WHITELIST_FILE))
    }

    pub fn path(&self) -> &Path {
        self.lines.path()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lines.contains(name)
    }

    /// Current entries in file order.
    pub fn entries(&self) -> Vec<String> {
        self.lines.snapshot().entries()
    }

    /// Raw file text as last written or loaded.
    pub fn text(&self) -> String {
        self.lines.snapshot().text().to_string()
    }

    pub fn replace(&self, text: &str) -> Result<(), GateError> {
        self.lines.replace(text)?;
        info!(entries = self.lines.snapshot().len(), "whitelist replaced");
        Ok(())
    }

    pub fn append(&self, text: &str) -> Result<(), GateError> {
        self.lines.append(text)?;
        info!(added = %text.trim(), "whitelist extended");
        Ok(())
    }

    pub fn reload(&self) -> Result<(), GateError> {
        self.lines.reload()
    }
}
