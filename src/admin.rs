// ABOUTME: Administrative surface over the gate — submit whitelist, approve all, approve one.
// ABOUTME: Every entry point re-checks the caller's admin capability through an injected Authorizer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AdminConfig;
use crate::gate::{AdminGate, GateError, Rejection};

/// Parameter-name prefix that marks an individually selected class on submit.
pub const CLASS_PARAM_PREFIX: &str = "class:";

/// Identity of whoever is calling the admin surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub principal: String,
}

impl CallerContext {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }
}

/// Decides whether a caller holds the administrator capability.
pub trait Authorizer: Send + Sync {
    /// Succeed for administrators, fail with [`GateError::Forbidden`] otherwise.
    fn require_admin(&self, caller: &CallerContext) -> Result<(), GateError>;
}

/// Grants callers whose principal is in a fixed list.
#[derive(Debug, Clone, Default)]
pub struct AdminPrincipals {
    principals: Vec<String>,
}

impl AdminPrincipals {
    pub fn new(principals: Vec<String>) -> Self {
        Self { principals }
    }
}

impl From<&AdminConfig> for AdminPrincipals {
    fn from(config: &AdminConfig) -> Self {
        Self::new(config.principals.clone())
    }
}

impl Authorizer for AdminPrincipals {
    fn require_admin(&self, caller: &CallerContext) -> Result<(), GateError> {
        if self.principals.iter().any(|p| p == &caller.principal) {
            Ok(())
        } else {
            Err(GateError::Forbidden)
        }
    }
}

/// Request/response adapter between an outer admin interface and the gate.
pub struct AdminAdapter<A> {
    gate: Arc<AdminGate>,
    authorizer: A,
}

impl<A: Authorizer> AdminAdapter<A> {
    pub fn new(gate: Arc<AdminGate>, authorizer: A) -> Self {
        Self { gate, authorizer }
    }

    pub fn gate(&self) -> &AdminGate {
        &self.gate
    }

    /// Replace the whitelist with `whitelist` plus every `class:<name>` parameter.
    ///
    /// `params` are the names of the submitted form parameters; anything not
    /// carrying the class prefix is ignored.
    pub fn submit_whitelist<I, P>(
        &self,
        caller: &CallerContext,
        whitelist: Option<&str>,
        params: I,
    ) -> Result<(), GateError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.authorize(caller, "submit")?;
        let text = merge_submission(whitelist, params);
        self.gate.replace_whitelist(&text)?;
        info!(principal = %caller.principal, "whitelist submitted");
        Ok(())
    }

    /// Approve every pending rejection. Returns the names approved.
    pub fn approve_all(&self, caller: &CallerContext) -> Result<Vec<String>, GateError> {
        self.authorize(caller, "approve-all")?;
        let approved = self.gate.approve_all()?;
        info!(principal = %caller.principal, count = approved.len(), "approved all");
        Ok(approved)
    }

    /// Approve one callable by name.
    pub fn approve(&self, caller: &CallerContext, name: &str) -> Result<(), GateError> {
        self.authorize(caller, "approve")?;
        self.gate.approve(name)?;
        info!(principal = %caller.principal, name, "approved callable");
        Ok(())
    }

    /// Rejections still waiting for review.
    pub fn pending(&self, caller: &CallerContext) -> Result<Vec<Rejection>, GateError> {
        self.authorize(caller, "pending")?;
        Ok(self.gate.rejections().pending())
    }

    fn authorize(&self, caller: &CallerContext, action: &str) -> Result<(), GateError> {
        self.authorizer.require_admin(caller).inspect_err(|_| {
            warn!(principal = %caller.principal, action, "admin action forbidden");
        })
    }
}

/// Build the submitted whitelist text: the raw text newline-terminated,
/// followed by one line per `class:<name>` parameter.
pub fn merge_submission<I, P>(whitelist: Option<&str>, params: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let mut text = whitelist.unwrap_or_default().to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    for param in params {
        if let Some(name) = param.as_ref().strip_prefix(CLASS_PARAM_PREFIX) {
            text.push_str(name);
            text.push('\n');
        }
    }
    text
}
