// ABOUTME: Ordered file-access rules — operation glob, anchored path regex, and a verdict.
// ABOUTME: First matching rule wins; no match denies. Paths are matched exactly as presented.

use std::borrow::Cow;
use std::path::Path;

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::GateError;
use super::types::Verdict;

/// Uncompiled rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Glob over operation names; `*` matches every operation.
    #[serde(default = "default_op")]
    pub op: String,
    /// Regular expression that must match the whole path string.
    pub path: String,
    /// Verdict when both matchers match.
    pub allow: bool,
}

fn default_op() -> String {
    "*".to_string()
}

impl RuleSpec {
    pub fn new(op: &str, path: &str, allow: bool) -> Self {
        Self {
            op: op.to_string(),
            path: path.to_string(),
            allow,
        }
    }
}

/// Matches operation names such as `read`, `write`, `delete`, or `mkdir`.
#[derive(Debug, Clone)]
pub enum OpMatcher {
    Any,
    Glob(Pattern),
}

impl OpMatcher {
    pub fn parse(pattern: &str) -> Result<Self, GateError> {
        if pattern == "*" {
            return Ok(OpMatcher::Any);
        }
        Pattern::new(pattern)
            .map(OpMatcher::Glob)
            .map_err(|source| GateError::MalformedOperation {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn matches(&self, op: &str) -> bool {
        match self {
            OpMatcher::Any => true,
            OpMatcher::Glob(pattern) => pattern.matches(op),
        }
    }
}

/// A single immutable rule.
#[derive(Debug, Clone)]
pub struct PathRule {
    op: OpMatcher,
    path: Regex,
    pattern: String,
    allow: bool,
}

impl PathRule {
    /// Compile a rule. The path pattern is anchored so it must match the entire path.
    ///
    /// The pattern is validated on its own before anchoring: a stray `)`
    /// could otherwise pair with the wrapper group and leave a branch unanchored.
    pub fn new(op: &str, path_pattern: &str, allow: bool) -> Result<Self, GateError> {
        let op = OpMatcher::parse(op)?;
        let malformed = |source| GateError::MalformedPattern {
            pattern: path_pattern.to_string(),
            source,
        };
        Regex::new(path_pattern).map_err(malformed)?;
        let path = Regex::new(&format!("^(?:{path_pattern})$")).map_err(malformed)?;
        Ok(Self {
            op,
            path,
            pattern: path_pattern.to_string(),
            allow,
        })
    }

    pub fn allow(&self) -> bool {
        self.allow
    }

    /// The path pattern as it was written, without anchors.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches_op(&self, op: &str) -> bool {
        self.op.matches(op)
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.path.is_match(path)
    }
}

impl TryFrom<&RuleSpec> for PathRule {
    type Error = GateError;

    fn try_from(spec: &RuleSpec) -> Result<Self, Self::Error> {
        PathRule::new(&spec.op, &spec.path, spec.allow)
    }
}

/// Rules evaluated top to bottom.
///
/// A deny here only ends evaluation of this set. Other filters further down
/// the enforcement chain may still grant access, so it is returned as a
/// value rather than raised.
#[derive(Debug, Clone, Default)]
pub struct PathRuleSet {
    rules: Vec<PathRule>,
}

impl PathRuleSet {
    pub fn new(rules: Vec<PathRule>) -> Self {
        Self { rules }
    }

    /// Compile every spec, failing the whole set on the first bad pattern.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, GateError> {
        let rules = specs
            .iter()
            .map(PathRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide `op` on `path`.
    ///
    /// The path is neither canonicalized nor absolutized: a root that spans
    /// several volumes through symlinks must look like one tree to the rules.
    pub fn evaluate(&self, op: &str, path: &Path) -> Verdict {
        let mut path_str: Option<Cow<'_, str>> = None;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matches_op(op) {
                continue;
            }
            let path_str = path_str.get_or_insert_with(|| path.to_string_lossy());
            if rule.matches_path(path_str) {
                debug!(op, path = %path_str, rule = index, allow = rule.allow, "file rule matched");
                return Verdict::from_allow(rule.allow);
            }
        }

        Verdict::Deny
    }
}
