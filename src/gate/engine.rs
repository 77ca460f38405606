// ABOUTME: AdminGate — the façade enforcement points and the admin surface talk to.
// ABOUTME: Publishes rule-set snapshots, answers file/callable checks, and applies whitelist changes.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::{Config, GateConfig};

use super::{
    error::GateError,
    rejection::RejectionLog,
    rules::PathRuleSet,
    types::{CallContext, CallableSubject},
    whitelist::{WhitelistStore, normalize_name},
};

/// Decides file accesses and callable executions requested by remote peers.
///
/// Constructed once at startup and shared by reference (or `Arc`) with every
/// enforcement point.
#[derive(Debug)]
pub struct AdminGate {
    rules: RwLock<Arc<PathRuleSet>>,
    whitelist: Arc<WhitelistStore>,
    rejected: RejectionLog,
}

impl AdminGate {
    /// Open the secrets files named by `config` with an empty rule set.
    pub fn new(config: &GateConfig) -> Self {
        Self::with_rules(config, PathRuleSet::default())
    }

    pub fn with_rules(config: &GateConfig, rules: PathRuleSet) -> Self {
        let whitelist = Arc::new(WhitelistStore::in_dir(&config.secrets_dir));
        let rejected = RejectionLog::with_persistence(
            Arc::clone(&whitelist),
            &config.secrets_dir,
            config.rejections,
        );
        Self {
            rules: RwLock::new(Arc::new(rules)),
            whitelist,
            rejected,
        }
    }

    /// Build a gate from a full configuration, compiling its file rules.
    pub fn from_config(config: &Config) -> Result<Self, GateError> {
        let rules = PathRuleSet::from_specs(&config.rules)?;
        Ok(Self::with_rules(&config.gate, rules))
    }

    /// Publish a new rule set. Checks already running finish against the old one.
    pub fn install_rules(&self, rules: PathRuleSet) {
        let count = rules.len();
        *self.rules.write() = Arc::new(rules);
        info!(rules = count, "file access rules installed");
    }

    /// The rule set currently in force.
    pub fn rules(&self) -> Arc<PathRuleSet> {
        Arc::clone(&self.rules.read())
    }

    /// Whether `op` on `path` is allowed by the current rules. No match denies.
    pub fn check_file_access(&self, op: &str, path: impl AsRef<Path>) -> bool {
        self.rules().evaluate(op, path.as_ref()).is_allowed()
    }

    /// Whether `subject` may run. A refusal is recorded for later review.
    pub fn is_whitelisted<S>(&self, subject: &S, context: &CallContext) -> bool
    where
        S: CallableSubject + ?Sized,
    {
        self.is_name_whitelisted(subject.type_name(), context)
    }

    /// [`is_whitelisted`](Self::is_whitelisted) for a type name already in hand.
    pub fn is_name_whitelisted(&self, name: &str, context: &CallContext) -> bool {
        let Some(name) = normalize_name(name) else {
            debug!(name, peer = %context.peer, "refused callable with unusable name");
            return false;
        };
        if self.whitelist.contains(name) {
            return true;
        }
        if self.rejected.report(name) {
            info!(name, peer = %context.peer, "rejected callable not on whitelist");
        } else {
            debug!(name, peer = %context.peer, "rejected callable again");
        }
        false
    }

    pub fn whitelist(&self) -> &WhitelistStore {
        &self.whitelist
    }

    pub fn rejections(&self) -> &RejectionLog {
        &self.rejected
    }

    /// Replace the whole whitelist.
    pub fn replace_whitelist(&self, text: &str) -> Result<(), GateError> {
        self.whitelist.replace(text)?;
        self.rejected.compact();
        Ok(())
    }

    /// Whitelist every pending rejection.
    pub fn approve_all(&self) -> Result<Vec<String>, GateError> {
        self.rejected.approve_all()
    }

    /// Whitelist one name as supplied by an administrator.
    pub fn approve(&self, name: &str) -> Result<(), GateError> {
        self.rejected.approve(name)
    }
}
