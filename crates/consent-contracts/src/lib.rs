//! # consent-contracts
//!
//! Shared types and error definitions for the consent ledger workspace.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod error;
pub mod request;
pub mod snapshot;

pub use error::{ConsentError, ConsentResult};
pub use request::{AccessRequest, ConsentDecision, ConsentStatus};
pub use snapshot::LedgerSnapshot;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ── ConsentStatus ────────────────────────────────────────────────────────

    #[test]
    fn consent_status_only_exact_granted_label_counts() {
        assert_eq!(ConsentStatus::from_label("granted"), ConsentStatus::Granted);
        assert_eq!(ConsentStatus::from_label("not_granted"), ConsentStatus::NotGranted);
        assert_eq!(ConsentStatus::from_label("Granted"), ConsentStatus::NotGranted);
        assert_eq!(ConsentStatus::from_label(""), ConsentStatus::NotGranted);
        assert!(ConsentStatus::Granted.is_granted());
        assert!(!ConsentStatus::NotGranted.is_granted());
    }

    #[test]
    fn consent_status_serializes_as_snake_case_label() {
        let json = serde_json::to_string(&ConsentStatus::NotGranted).unwrap();
        assert_eq!(json, "\"not_granted\"");
        assert_eq!(ConsentStatus::NotGranted.as_str(), "not_granted");
    }

    // ── AccessRequest ────────────────────────────────────────────────────────

    #[test]
    fn access_request_defaults_when_fields_are_missing() {
        let request: AccessRequest = serde_json::from_value(json!({
            "action": "access_user_data",
            "target": "private_data",
            "purpose": "marketing"
        }))
        .unwrap();

        assert_eq!(request.actor, "unknown");
        assert_eq!(request.urgency, "none");
        assert_eq!(request.consent_status, ConsentStatus::NotGranted);
        assert!(request.consent_reference.is_none());
        assert_eq!(request, AccessRequest::new("access_user_data", "private_data", "marketing"));
    }

    #[test]
    fn access_request_audit_fields_carry_request_detail() {
        let request = AccessRequest::new("access_user_data", "private_data", "service_provision")
            .with_consent(ConsentStatus::Granted)
            .with_urgency("normal")
            .with_potential_harm("none");

        let fields = request.audit_fields();
        assert_eq!(fields["action"], "access_user_data");
        assert_eq!(fields["target"], "private_data");
        assert_eq!(fields["purpose"], "service_provision");
        assert_eq!(fields["consent_status"], "granted");
        assert_eq!(fields["urgency"], "normal");
        assert_eq!(fields["potential_harm"], "none");
        // The actor is recorded on the event itself, not in the payload.
        assert!(!fields.contains_key("actor"));
    }

    // ── LedgerSnapshot ───────────────────────────────────────────────────────

    #[test]
    fn snapshot_counts_its_events() {
        let snapshot = LedgerSnapshot::new(vec![json!({"a": 1}), json!({"b": 2})]);
        assert_eq!(snapshot.status, "ok");
        assert_eq!(snapshot.count, 2);

        let empty = LedgerSnapshot::new(Vec::new());
        assert_eq!(empty.count, 0);
    }

    // ── ConsentError display messages ────────────────────────────────────────

    #[test]
    fn error_consent_violation_display() {
        let err = ConsentError::ConsentViolation {
            action: "access_user_data".to_string(),
            target: "private_data".to_string(),
            purpose: "marketing".to_string(),
            potential_harm: "privacy_violation".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("consent violation"));
        assert!(msg.contains("access_user_data"));
        assert!(msg.contains("private_data"));
        assert!(msg.contains("marketing"));
        assert!(msg.contains("privacy_violation"));
    }

    #[test]
    fn error_io_display_names_path() {
        let err = ConsentError::io(
            "/var/lib/consent/ledger.jsonl",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("ledger I/O error"));
        assert!(msg.contains("/var/lib/consent/ledger.jsonl"));
    }

    #[test]
    fn error_torn_tail_display() {
        let err = ConsentError::TornTail {
            path: "ledger.jsonl".into(),
            line: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("torn write"));
        assert!(msg.contains("line 7"));
    }

    #[test]
    fn serde_json_error_converts_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ConsentError = json_err.into();
        assert!(matches!(err, ConsentError::Serialization { .. }));
        assert!(err.to_string().contains("serialization error"));
    }
}
