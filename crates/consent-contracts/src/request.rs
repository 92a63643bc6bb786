//! Data access requests and the decisions a consent policy returns for them.

use serde::{Deserialize, Serialize};

/// Whether the data subject has granted consent for the requested use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Granted,
    #[default]
    NotGranted,
}

impl ConsentStatus {
    /// Interpret a free-text status label.
    ///
    /// Only the exact label `"granted"` counts as consent; anything else,
    /// including unknown or misspelled labels, is `NotGranted`.
    pub fn from_label(label: &str) -> Self {
        if label == "granted" {
            Self::Granted
        } else {
            Self::NotGranted
        }
    }

    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::NotGranted => "not_granted",
        }
    }
}

fn default_actor() -> String {
    "unknown".to_string()
}

fn default_urgency() -> String {
    "none".to_string()
}

/// A request to act on some data, checked against consent before it runs.
///
/// Only `action`, `target`, and `purpose` are mandatory; the rest default the
/// way an anonymous, non-urgent request would.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// The entity asking for access.
    #[serde(default = "default_actor")]
    pub actor: String,
    /// What the actor wants to do (e.g. "access_user_data").
    pub action: String,
    /// What the action touches (e.g. "private_data").
    pub target: String,
    /// Why the actor wants to do it (e.g. "marketing").
    pub purpose: String,
    #[serde(default)]
    pub consent_status: ConsentStatus,
    #[serde(default = "default_urgency")]
    pub urgency: String,
    /// Free-text description of what could go wrong.
    #[serde(default)]
    pub potential_harm: String,
    /// Token identifier of the consent grant this request relies on, if any.
    #[serde(default)]
    pub consent_reference: Option<String>,
}

impl AccessRequest {
    pub fn new(
        action: impl Into<String>,
        target: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            actor: default_actor(),
            action: action.into(),
            target: target.into(),
            purpose: purpose.into(),
            consent_status: ConsentStatus::NotGranted,
            urgency: default_urgency(),
            potential_harm: String::new(),
            consent_reference: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_consent(mut self, status: ConsentStatus) -> Self {
        self.consent_status = status;
        self
    }

    pub fn with_urgency(mut self, urgency: impl Into<String>) -> Self {
        self.urgency = urgency.into();
        self
    }

    pub fn with_potential_harm(mut self, harm: impl Into<String>) -> Self {
        self.potential_harm = harm.into();
        self
    }

    pub fn with_consent_reference(mut self, reference: impl Into<String>) -> Self {
        self.consent_reference = Some(reference.into());
        self
    }

    /// The request fields recorded in every ledger payload for this request.
    pub fn audit_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        fields.insert("action".into(), self.action.clone().into());
        fields.insert("target".into(), self.target.clone().into());
        fields.insert("purpose".into(), self.purpose.clone().into());
        fields.insert(
            "consent_status".into(),
            self.consent_status.as_str().into(),
        );
        fields.insert("urgency".into(), self.urgency.clone().into());
        fields.insert("potential_harm".into(), self.potential_harm.clone().into());
        fields
    }
}

/// The outcome of evaluating an `AccessRequest` against a consent policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentDecision {
    /// The request may proceed.
    Permit,

    /// The request must not proceed.
    Block {
        /// Machine-readable category written to the ledger
        /// (e.g. "access_without_consent").
        violation_type: String,
        /// Human-readable explanation.
        reason: String,
    },
}

impl ConsentDecision {
    pub fn is_permit(&self) -> bool {
        matches!(self, Self::Permit)
    }
}
