//! Consent event types.
//!
//! `ConsentEvent` is a single entry in the hash chain.  `EventDraft` is the
//! caller-supplied part of an event, validated before anything touches
//! storage; sealing a draft against the current chain tail produces the
//! stored event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use consent_contracts::{ConsentError, ConsentResult};

use crate::chain::hash_event;

/// JSON field holding an event's own digest.
pub const SEQUENCE_HASH_FIELD: &str = "sequence_hash";

/// JSON field holding the predecessor's digest.
pub const PREVIOUS_HASH_FIELD: &str = "previous_hash";

/// A single entry in the SHA-256 hash chain.
///
/// Each event commits to its predecessor via `previous_hash`.  Modifying any
/// field, including anything nested inside `payload`, invalidates
/// `sequence_hash` and every later `previous_hash`, which verification
/// detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentEvent {
    /// When the event was created (UTC).  Not guaranteed monotonic.
    pub timestamp: DateTime<Utc>,

    /// Random per-event identifier.  Descriptive only.
    pub identifier: Uuid,

    /// The entity that produced the event.
    pub actor: String,

    /// What happened (e.g. "consent_validation_passed").
    pub action: String,

    /// Action-specific detail.
    pub payload: Map<String, Value>,

    /// Token identifier of the related consent grant; `None` for system events.
    pub consent_reference: Option<String>,

    /// `sequence_hash` of the previous event, or `GENESIS_HASH` for the first.
    pub previous_hash: String,

    /// SHA-256 (hex) of every other field in canonical form.
    pub sequence_hash: String,
}

impl ConsentEvent {
    /// The sentinel `previous_hash` used for the first event in every chain.
    pub const GENESIS_HASH: &'static str = consent_core::GENESIS_HASH;
}

/// The caller-supplied fields of an event, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub actor: String,
    pub action: String,
    pub payload: Map<String, Value>,
    pub consent_reference: Option<String>,
}

impl EventDraft {
    /// Validate the fields of a new event.
    ///
    /// Fails with `InvalidInput` if `actor` or `action` is blank or if
    /// `payload` is not a JSON object.
    pub fn new(
        actor: &str,
        action: &str,
        payload: &Value,
        consent_reference: Option<&str>,
    ) -> ConsentResult<Self> {
        if actor.trim().is_empty() {
            return Err(ConsentError::InvalidInput {
                reason: "actor must be a non-empty string".to_string(),
            });
        }
        if action.trim().is_empty() {
            return Err(ConsentError::InvalidInput {
                reason: "action must be a non-empty string".to_string(),
            });
        }
        let Value::Object(payload) = payload else {
            return Err(ConsentError::InvalidInput {
                reason: format!("payload must be a JSON object, got {}", kind_of(payload)),
            });
        };

        Ok(Self {
            actor: actor.to_string(),
            action: action.to_string(),
            payload: payload.clone(),
            consent_reference: consent_reference.map(str::to_string),
        })
    }

    /// Like `new`, for any serializable payload.
    ///
    /// A payload serde cannot represent as JSON fails with `Serialization`.
    pub fn from_serializable<P: Serialize + ?Sized>(
        actor: &str,
        action: &str,
        payload: &P,
        consent_reference: Option<&str>,
    ) -> ConsentResult<Self> {
        let payload = serde_json::to_value(payload).map_err(|e| ConsentError::Serialization {
            reason: format!("payload is not representable as JSON: {}", e),
        })?;
        Self::new(actor, action, &payload, consent_reference)
    }

    /// Link the draft to `previous_hash` and compute its digest.
    pub fn seal(self, timestamp: DateTime<Utc>, previous_hash: String) -> ConsentResult<ConsentEvent> {
        let mut event = ConsentEvent {
            timestamp,
            identifier: Uuid::new_v4(),
            actor: self.actor,
            action: self.action,
            payload: self.payload,
            consent_reference: self.consent_reference,
            previous_hash,
            sequence_hash: String::new(),
        };
        event.sequence_hash = hash_event(&event)?;
        Ok(event)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
