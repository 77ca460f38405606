// ABOUTME: Log of callable types refused because they were not whitelisted.
// ABOUTME: Filters against the whitelist on read, approves pending entries, optionally mirrors to disk.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::error::GateError;
use super::lines::PersistentLineSet;
use super::types::{Rejection, RejectionPersistence};
use super::whitelist::{WhitelistStore, normalize_name};

/// File name of the rejection mirror inside the secrets directory.
pub const REJECTED_FILE: &str = "rejected-callables.txt";

/// Types that were refused and are still waiting for an administrator.
#[derive(Debug)]
pub struct RejectionLog {
    whitelist: Arc<WhitelistStore>,
    seen: Mutex<BTreeMap<String, Rejection>>,
    mirror: Option<PersistentLineSet>,
}

impl RejectionLog {
    /// In-memory log; nothing survives a restart.
    pub fn new(whitelist: Arc<WhitelistStore>) -> Self {
        Self {
            whitelist,
            seen: Mutex::new(BTreeMap::new()),
            mirror: None,
        }
    }

    /// Log backed by `rejected-callables.txt` in `secrets_dir`, seeded from its
    /// current content minus anything already whitelisted.
    pub fn persistent(whitelist: Arc<WhitelistStore>, secrets_dir: &Path) -> Self {
        let mirror = PersistentLineSet::open(secrets_dir.join(REJECTED_FILE));
        let now = Utc::now();
        let seen = mirror
            .snapshot()
            .entries()
            .into_iter()
            .filter(|name| !whitelist.contains(name))
            .map(|name| {
                let rejection = Rejection {
                    name: name.clone(),
                    first_seen: now,
                    attempts: 1,
                };
                (name, rejection)
            })
            .collect();
        Self {
            whitelist,
            seen: Mutex::new(seen),
            mirror: Some(mirror),
        }
    }

    pub fn with_persistence(
        whitelist: Arc<WhitelistStore>,
        secrets_dir: &Path,
        persistence: RejectionPersistence,
    ) -> Self {
        match persistence {
            RejectionPersistence::Memory => Self::new(whitelist),
            RejectionPersistence::File => Self::persistent(whitelist, secrets_dir),
        }
    }

    /// Record that `name` was refused. Returns true the first time a name is seen.
    ///
    /// The name is stored trimmed, exactly as the whitelist would hold it.
    /// Blank or multi-line names are ignored, as are names that are
    /// whitelisted by the time this runs.
    pub fn report(&self, name: &str) -> bool {
        let Some(name) = normalize_name(name) else {
            return false;
        };
        if self.whitelist.contains(name) {
            return false;
        }

        let mut seen = self.seen.lock();
        if let Some(existing) = seen.get_mut(name) {
            existing.attempts += 1;
            return false;
        }
        seen.insert(
            name.to_string(),
            Rejection {
                name: name.to_string(),
                first_seen: Utc::now(),
                attempts: 1,
            },
        );

        // The mirror is advisory; a failed write must not turn a denial into an error.
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.append(name) {
                warn!(name, error = %e, "failed to record rejection on disk");
            }
        }
        true
    }

    /// Names of refused types that are not whitelisted, sorted.
    pub fn get(&self) -> Vec<String> {
        self.seen
            .lock()
            .keys()
            .filter(|name| !self.whitelist.contains(name))
            .cloned()
            .collect()
    }

    /// Same as [`get`](Self::get) with the full records.
    pub fn pending(&self) -> Vec<Rejection> {
        self.seen
            .lock()
            .values()
            .filter(|rejection| !self.whitelist.contains(&rejection.name))
            .cloned()
            .collect()
    }

    /// Whitelist every pending type in a single append. Returns the approved names.
    pub fn approve_all(&self) -> Result<Vec<String>, GateError> {
        let names = self.get();
        if names.is_empty() {
            return Ok(names);
        }
        let mut block = names.join("\n");
        block.push('\n');
        self.whitelist.append(&block)?;
        info!(count = names.len(), "approved all pending callables");
        self.compact();
        Ok(names)
    }

    /// Whitelist a single name, which need not have been observed.
    pub fn approve(&self, name: &str) -> Result<(), GateError> {
        self.whitelist.append(name)?;
        self.compact();
        Ok(())
    }

    /// Drop entries that have since been whitelisted, in memory and in the mirror.
    pub fn compact(&self) {
        let mut seen = self.seen.lock();
        seen.retain(|name, _| !self.whitelist.contains(name));

        if let Some(mirror) = &self.mirror {
            let remaining: String = seen.keys().map(|name| format!("{name}\n")).collect();
            if let Err(e) = mirror.replace(&remaining) {
                warn!(error = %e, "failed to compact rejection file");
            }
        }
    }
}
