//! # consent-policy
//!
//! A TOML-driven consent policy engine.
//!
//! ## Overview
//!
//! This crate provides [`TomlConsentPolicy`], which implements the
//! [`ConsentPolicy`](consent_core::traits::ConsentPolicy) trait.  Targets whose
//! name contains a protected marker ("private" and "personal" by default)
//! may only be accessed with granted consent.  Explicit rules, evaluated in
//! order with the first match winning, can exempt or block specific
//! action/target pairs.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use consent_policy::TomlConsentPolicy;
//!
//! let policy = TomlConsentPolicy::from_file(Path::new("policies/consent.toml"))?;
//! // Pass `policy` to `consent_core::ConsentValidator::new(...)`.
//! ```

use std::sync::Arc;

use consent_contracts::{AccessRequest, ConsentResult};
use consent_core::{traits::ConsentLedger, ConsentValidator};

pub mod engine;
pub mod rule;

pub use engine::TomlConsentPolicy;
pub use rule::{ConsentRule, PolicyConfig, RuleVerdict};

/// Validate a single request with the default policy, recording the outcome
/// in `ledger`.
pub fn validate_data_access_request(
    ledger: Arc<dyn ConsentLedger>,
    request: &AccessRequest,
) -> ConsentResult<()> {
    ConsentValidator::new(Box::new(TomlConsentPolicy::default()), ledger).validate(request)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
