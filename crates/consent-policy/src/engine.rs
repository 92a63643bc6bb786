//! TOML-driven consent policy implementation.
//!
//! `TomlConsentPolicy` loads a `PolicyConfig` from a TOML string or file and
//! implements the `ConsentPolicy` trait from consent-core.
//!
//! Evaluation algorithm:
//!
//! 1. Iterate rules in declaration order.
//! 2. For the first rule whose `action` and `target` patterns match:
//!    - `exempt` → `Permit`
//!    - `block` → `Block` ("blocked_by_rule")
//!    - `require-consent` → `Permit` if consent is granted, else `Block`
//!      ("access_without_consent")
//! 3. If no rule matched: a protected target without granted consent is
//!    blocked; anything else is permitted.

use std::path::Path;

use tracing::{debug, warn};

use consent_contracts::{AccessRequest, ConsentDecision, ConsentError, ConsentResult};
use consent_core::traits::ConsentPolicy;

use crate::rule::{PolicyConfig, RuleVerdict};

/// Violation type recorded when consent was required but not granted.
pub const ACCESS_WITHOUT_CONSENT: &str = "access_without_consent";

/// Violation type recorded when a `block` rule matched.
pub const BLOCKED_BY_RULE: &str = "blocked_by_rule";

/// A `ConsentPolicy` that reads its markers and rules from a TOML document.
///
/// `TomlConsentPolicy::default()` protects targets mentioning "private" or
/// "personal" and has no rules.
#[derive(Debug, Default)]
pub struct TomlConsentPolicy {
    config: PolicyConfig,
}

impl TomlConsentPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Parse `s` as TOML and build a `TomlConsentPolicy`.
    ///
    /// Returns `ConsentError::ConfigError` if the TOML is malformed or does
    /// not match the `PolicyConfig` schema.
    pub fn from_toml_str(s: &str) -> ConsentResult<Self> {
        let config: PolicyConfig = toml::from_str(s).map_err(|e| ConsentError::ConfigError {
            reason: format!("failed to parse policy TOML: {}", e),
        })?;
        Ok(Self { config })
    }

    /// Read the file at `path` and parse it as TOML policy configuration.
    pub fn from_file(path: &Path) -> ConsentResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConsentError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn without_consent(request: &AccessRequest, reason: String) -> ConsentDecision {
        if request.consent_status.is_granted() {
            ConsentDecision::Permit
        } else {
            ConsentDecision::Block {
                violation_type: ACCESS_WITHOUT_CONSENT.to_string(),
                reason,
            }
        }
    }
}

impl ConsentPolicy for TomlConsentPolicy {
    fn evaluate(&self, request: &AccessRequest) -> ConsentResult<ConsentDecision> {
        debug!(
            actor = %request.actor,
            action = %request.action,
            target = %request.target,
            "evaluating consent policy"
        );

        if let Some(rule) = self
            .config
            .rules
            .iter()
            .find(|rule| rule.matches(&request.action, &request.target))
        {
            debug!(rule_id = %rule.id, "rule matched");

            let decision = match rule.verdict {
                RuleVerdict::Exempt => ConsentDecision::Permit,
                RuleVerdict::Block => ConsentDecision::Block {
                    violation_type: BLOCKED_BY_RULE.to_string(),
                    reason: rule
                        .reason
                        .clone()
                        .unwrap_or_else(|| format!("blocked by rule '{}'", rule.id)),
                },
                RuleVerdict::RequireConsent => Self::without_consent(
                    request,
                    rule.reason
                        .clone()
                        .unwrap_or_else(|| format!("rule '{}' requires granted consent", rule.id)),
                ),
            };
            return Ok(decision);
        }

        if self.config.is_protected(&request.target) {
            let decision = Self::without_consent(
                request,
                format!(
                    "target '{}' is protected and consent is not granted",
                    request.target
                ),
            );
            if !decision.is_permit() {
                warn!(
                    actor = %request.actor,
                    target = %request.target,
                    "protected target requested without consent"
                );
            }
            return Ok(decision);
        }

        Ok(ConsentDecision::Permit)
    }
}
