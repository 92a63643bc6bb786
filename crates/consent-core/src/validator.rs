//! The consent validator: checks a request against policy and records the
//! outcome in the ledger.
//!
//!   Request → Policy → Ledger append → Permit / ConsentViolation
//!
//! Every evaluated request produces exactly one ledger event, whether it is
//! permitted or blocked. If the append fails the validation fails with it:
//! an unrecorded decision is never handed back to the caller.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use consent_contracts::{AccessRequest, ConsentDecision, ConsentError, ConsentResult, ConsentStatus};

use crate::traits::{ConsentLedger, ConsentPolicy};

/// Ledger action recorded when a request is permitted.
pub const ACTION_VALIDATION_PASSED: &str = "consent_validation_passed";

/// Ledger action recorded when a request is blocked.
pub const ACTION_VIOLATION_DETECTED: &str = "consent_violation_detected";

/// Validates data access requests and records every outcome.
///
/// One validator may be shared across threads; the violation counter is atomic
/// and the ledger serializes its own appends.
pub struct ConsentValidator {
    policy: Box<dyn ConsentPolicy>,
    ledger: Arc<dyn ConsentLedger>,
    violations: AtomicU64,
}

impl ConsentValidator {
    pub fn new(policy: Box<dyn ConsentPolicy>, ledger: Arc<dyn ConsentLedger>) -> Self {
        Self {
            policy,
            ledger,
            violations: AtomicU64::new(0),
        }
    }

    /// Validate one request.
    ///
    /// Returns `Ok(())` when the policy permits it. Returns
    /// `ConsentError::ConsentViolation` when the policy blocks it; the
    /// violation is already in the ledger at that point. Policy and ledger
    /// errors propagate unchanged.
    pub fn validate(&self, request: &AccessRequest) -> ConsentResult<()> {
        debug!(
            actor = %request.actor,
            action = %request.action,
            target = %request.target,
            "validating access request"
        );

        let decision = self.policy.evaluate(request)?;
        let mut payload = request.audit_fields();
        payload.insert("timestamp".into(), Value::String(now_rfc3339()));

        match decision {
            ConsentDecision::Block {
                violation_type,
                reason,
            } => {
                payload.insert("violation_type".into(), Value::String(violation_type.clone()));
                payload.insert("blocked".into(), Value::Bool(true));

                // Counted on detection, so a violation whose record fails still counts.
                let total = self.violations.fetch_add(1, Ordering::SeqCst) + 1;
                let hash = self.ledger.append(
                    &request.actor,
                    ACTION_VIOLATION_DETECTED,
                    &Value::Object(payload),
                    request.consent_reference.as_deref(),
                )?;

                warn!(
                    actor = %request.actor,
                    action = %request.action,
                    target = %request.target,
                    violation_type = %violation_type,
                    reason = %reason,
                    sequence_hash = %hash,
                    total_violations = total,
                    "consent violation blocked"
                );

                Err(ConsentError::ConsentViolation {
                    action: request.action.clone(),
                    target: request.target.clone(),
                    purpose: request.purpose.clone(),
                    potential_harm: request.potential_harm.clone(),
                })
            }

            ConsentDecision::Permit => {
                payload.insert("validated".into(), Value::Bool(true));

                let hash = self.ledger.append(
                    &request.actor,
                    ACTION_VALIDATION_PASSED,
                    &Value::Object(payload),
                    request.consent_reference.as_deref(),
                )?;

                info!(
                    actor = %request.actor,
                    action = %request.action,
                    target = %request.target,
                    sequence_hash = %hash,
                    "access request permitted"
                );
                Ok(())
            }
        }
    }

    /// True if `label` denotes granted consent.
    pub fn check_consent_status(&self, label: &str) -> bool {
        ConsentStatus::from_label(label).is_granted()
    }

    /// Number of violations this validator has recorded.
    pub fn violation_count(&self) -> u64 {
        self.violations.load(Ordering::SeqCst)
    }

    /// The ledger this validator records into.
    pub fn ledger(&self) -> &Arc<dyn ConsentLedger> {
        &self.ledger
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::Value;

    use consent_contracts::{
        AccessRequest, ConsentDecision, ConsentError, ConsentResult, ConsentStatus,
    };

    use crate::traits::{ConsentLedger, ConsentPolicy, GENESIS_HASH};

    use super::*;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// A policy that always returns a pre-configured decision.
    struct MockPolicy {
        decision: ConsentDecision,
    }

    impl ConsentPolicy for MockPolicy {
        fn evaluate(&self, _request: &AccessRequest) -> ConsentResult<ConsentDecision> {
            Ok(self.decision.clone())
        }
    }

    /// A recorded call to `MockLedger::append`.
    #[derive(Debug, Clone)]
    struct Appended {
        actor: String,
        action: String,
        payload: Value,
        consent_reference: Option<String>,
    }

    /// A ledger that records every append for later inspection.
    #[derive(Default)]
    struct MockLedger {
        appended: Mutex<Vec<Appended>>,
        fail: bool,
    }

    impl MockLedger {
        fn failing() -> Self {
            Self {
                appended: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn appended(&self) -> Vec<Appended> {
            self.appended.lock().unwrap().clone()
        }
    }

    impl ConsentLedger for MockLedger {
        fn append(
            &self,
            actor: &str,
            action: &str,
            payload: &Value,
            consent_reference: Option<&str>,
        ) -> ConsentResult<String> {
            if self.fail {
                return Err(ConsentError::LedgerUnavailable {
                    reason: "disk full".to_string(),
                });
            }
            let mut appended = self.appended.lock().unwrap();
            appended.push(Appended {
                actor: actor.to_string(),
                action: action.to_string(),
                payload: payload.clone(),
                consent_reference: consent_reference.map(str::to_string),
            });
            Ok(format!("{:064x}", appended.len()))
        }

        fn last_hash(&self) -> String {
            let len = self.appended.lock().unwrap().len();
            if len == 0 {
                GENESIS_HASH.to_string()
            } else {
                format!("{:064x}", len)
            }
        }

        fn verify_chain(&self) -> bool {
            true
        }
    }

    fn block() -> ConsentDecision {
        ConsentDecision::Block {
            violation_type: "access_without_consent".to_string(),
            reason: "private data without consent".to_string(),
        }
    }

    fn marketing_request() -> AccessRequest {
        AccessRequest::new("access_user_data", "private_data", "marketing")
            .with_actor("marketing_system")
            .with_potential_harm("privacy_violation")
    }

    fn validator(decision: ConsentDecision, ledger: Arc<MockLedger>) -> ConsentValidator {
        ConsentValidator::new(Box::new(MockPolicy { decision }), ledger)
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn blocked_request_is_recorded_then_rejected() {
        let ledger = Arc::new(MockLedger::default());
        let validator = validator(block(), ledger.clone());

        let err = validator.validate(&marketing_request()).unwrap_err();
        match err {
            ConsentError::ConsentViolation {
                action,
                target,
                purpose,
                potential_harm,
            } => {
                assert_eq!(action, "access_user_data");
                assert_eq!(target, "private_data");
                assert_eq!(purpose, "marketing");
                assert_eq!(potential_harm, "privacy_violation");
            }
            other => panic!("expected ConsentViolation, got {:?}", other),
        }

        let appended = ledger.appended();
        assert_eq!(appended.len(), 1, "the violation must be recorded exactly once");
        let event = &appended[0];
        assert_eq!(event.actor, "marketing_system");
        assert_eq!(event.action, ACTION_VIOLATION_DETECTED);
        assert_eq!(event.payload["violation_type"], "access_without_consent");
        assert_eq!(event.payload["blocked"], true);
        assert_eq!(event.payload["target"], "private_data");
        assert_eq!(event.payload["consent_status"], "not_granted");
        assert!(event.payload["timestamp"].is_string());
        assert_eq!(validator.violation_count(), 1);
    }

    #[test]
    fn permitted_request_is_recorded_as_passed() {
        let ledger = Arc::new(MockLedger::default());
        let validator = validator(ConsentDecision::Permit, ledger.clone());

        let request = AccessRequest::new("access_user_data", "private_data", "service_provision")
            .with_actor("service_system")
            .with_consent(ConsentStatus::Granted)
            .with_consent_reference("token-123");
        validator.validate(&request).unwrap();

        let appended = ledger.appended();
        assert_eq!(appended.len(), 1);
        let event = &appended[0];
        assert_eq!(event.action, ACTION_VALIDATION_PASSED);
        assert_eq!(event.payload["validated"], true);
        assert!(event.payload.get("blocked").is_none());
        assert_eq!(event.consent_reference.as_deref(), Some("token-123"));
        assert_eq!(validator.violation_count(), 0);
    }

    #[test]
    fn violation_count_accumulates() {
        let ledger = Arc::new(MockLedger::default());
        let validator = validator(block(), ledger.clone());

        for _ in 0..3 {
            assert!(validator.validate(&marketing_request()).is_err());
        }
        assert_eq!(validator.violation_count(), 3);
        assert_eq!(ledger.appended().len(), 3);
    }

    #[test]
    fn ledger_failure_aborts_validation_but_still_counts() {
        let ledger = Arc::new(MockLedger::failing());
        let validator = validator(block(), ledger);

        match validator.validate(&marketing_request()) {
            Err(ConsentError::LedgerUnavailable { reason }) => assert_eq!(reason, "disk full"),
            other => panic!("expected LedgerUnavailable, got {:?}", other),
        }
        // The violation was detected even though recording it failed.
        assert_eq!(validator.violation_count(), 1);
    }

    #[test]
    fn ledger_failure_fails_a_permitted_request() {
        let validator = validator(ConsentDecision::Permit, Arc::new(MockLedger::failing()));
        assert!(validator.validate(&marketing_request()).is_err());
    }

    #[test]
    fn check_consent_status_labels() {
        let validator = validator(ConsentDecision::Permit, Arc::new(MockLedger::default()));
        assert!(validator.check_consent_status("granted"));
        assert!(!validator.check_consent_status("not_granted"));
        assert!(!validator.check_consent_status("pending"));
    }
}
