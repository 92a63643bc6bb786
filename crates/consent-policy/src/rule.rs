//! Consent rule types and configuration schema.
//!
//! A `PolicyConfig` is deserialized from TOML.  It names the target markers
//! that make data protected and holds an ordered list of `ConsentRule`s.
//! Rules are evaluated in declaration order; the first matching rule wins.
//! If no rule matches, protected targets require granted consent and
//! everything else is permitted.

use serde::{Deserialize, Serialize};

/// The decision a rule produces when it matches an incoming request.
///
/// Expressed as a kebab-case string in TOML:
/// ```toml
/// verdict = "require-consent"
/// verdict = "exempt"
/// verdict = "block"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleVerdict {
    /// Permit only when consent is granted.
    RequireConsent,
    /// Permit regardless of consent.
    Exempt,
    /// Block regardless of consent.
    Block,
}

/// A single consent rule loaded from TOML.
///
/// Both `action` and `target` support the wildcard value `"*"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRule {
    /// Stable identifier used in log fields and default block reasons.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Pattern matched against `AccessRequest::action`.
    #[serde(default = "wildcard")]
    pub action: String,

    /// Pattern matched against `AccessRequest::target`.
    #[serde(default = "wildcard")]
    pub target: String,

    pub verdict: RuleVerdict,

    /// Explanation recorded when this rule blocks a request.
    pub reason: Option<String>,
}

impl ConsentRule {
    /// Exact, case-sensitive match unless the pattern is `"*"`.
    pub fn matches(&self, action: &str, target: &str) -> bool {
        let action_matches = self.action == "*" || self.action == action;
        let target_matches = self.target == "*" || self.target == target;
        action_matches && target_matches
    }
}

fn wildcard() -> String {
    "*".to_string()
}

fn default_protected_markers() -> Vec<String> {
    vec!["private".to_string(), "personal".to_string()]
}

/// The top-level structure deserialized from a TOML policy file.
///
/// Example:
/// ```toml
/// protected_markers = ["private", "personal", "health"]
///
/// [[rules]]
/// id = "public-stats"
/// description = "Aggregate statistics never need consent"
/// target = "aggregate_stats"
/// verdict = "exempt"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Substrings that mark a target as protected, matched case-insensitively.
    #[serde(default = "default_protected_markers")]
    pub protected_markers: Vec<String>,

    /// Ordered list of rules.  First match wins.
    #[serde(default)]
    pub rules: Vec<ConsentRule>,
}

impl PolicyConfig {
    /// True if `target` contains any protected marker, ignoring case.
    pub fn is_protected(&self, target: &str) -> bool {
        let target = target.to_lowercase();
        self.protected_markers
            .iter()
            .any(|marker| target.contains(&marker.to_lowercase()))
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            protected_markers: default_protected_markers(),
            rules: Vec::new(),
        }
    }
}
