//! In-memory implementation of `ConsentLedger`.
//!
//! `InMemoryLedger` keeps all events in a `Vec` protected by a `Mutex`.  It
//! uses the same sealing and verification code as `FileLedger`, so tests and
//! demos that run without a backing file still exercise the real chain.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use consent_contracts::{ConsentError, ConsentResult, LedgerSnapshot};
use consent_core::traits::ConsentLedger;

use crate::{
    chain::verify_events,
    event::{ConsentEvent, EventDraft},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    /// All events appended so far, in append order.
    pub(crate) events: Vec<ConsentEvent>,

    /// The `sequence_hash` of the last event, or `GENESIS_HASH` before any
    /// event has been appended.
    pub(crate) last_hash: String,
}

// ── Public ledger ─────────────────────────────────────────────────────────────

/// An in-memory, append-only consent ledger backed by a SHA-256 hash chain.
pub struct InMemoryLedger {
    pub(crate) state: Mutex<InMemoryState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InMemoryState {
                events: Vec::new(),
                last_hash: ConsentEvent::GENESIS_HASH.to_string(),
            }),
        }
    }

    /// A copy of every event, oldest first.
    pub fn events(&self) -> Vec<ConsentEvent> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        verify_events(&state.events)
    }

    /// The read-side projection of this ledger.
    pub fn export(&self) -> ConsentResult<LedgerSnapshot> {
        let events = self
            .events()
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LedgerSnapshot::new(events))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

// ── ConsentLedger impl ────────────────────────────────────────────────────────

impl ConsentLedger for InMemoryLedger {
    fn append(
        &self,
        actor: &str,
        action: &str,
        payload: &Value,
        consent_reference: Option<&str>,
    ) -> ConsentResult<String> {
        let draft = EventDraft::new(actor, action, payload, consent_reference)?;

        let mut state = self.state.lock().map_err(|e| ConsentError::LedgerUnavailable {
            reason: format!("ledger state lock poisoned: {}", e),
        })?;

        let event = draft.seal(Utc::now(), state.last_hash.clone())?;
        let hash = event.sequence_hash.clone();

        debug!(
            actor = %event.actor,
            action = %event.action,
            sequence = state.events.len(),
            sequence_hash = %hash,
            "consent event appended in memory"
        );

        state.events.push(event);
        state.last_hash = hash.clone();
        Ok(hash)
    }

    fn last_hash(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_hash
            .clone()
    }

    fn verify_chain(&self) -> bool {
        self.verify_integrity()
    }
}
