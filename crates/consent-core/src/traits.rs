//! Core trait definitions for the consent pipeline.
//!
//! - `ConsentLedger`: trusted sink, the tamper-evident record of every decision
//! - `ConsentPolicy`: trusted gate, decides whether a request may proceed
//!
//! The validator wires them together. A decision is never returned to the
//! caller unless it has first been appended to the ledger.

use consent_contracts::{AccessRequest, ConsentDecision, ConsentResult};

/// The 64-character genesis sentinel: the `previous_hash` of the first event
/// and the tail of an empty ledger.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An append-only, hash-chained record of consent events.
///
/// Implementations own their events exclusively. Appends are serialized
/// internally; reads must never observe a half-written event as the tail.
pub trait ConsentLedger: Send + Sync {
    /// Append one event and return its `sequence_hash`.
    ///
    /// `actor` and `action` must be non-empty and `payload` must be a JSON
    /// object. On success the event is persisted and is the new chain tail.
    fn append(
        &self,
        actor: &str,
        action: &str,
        payload: &serde_json::Value,
        consent_reference: Option<&str>,
    ) -> ConsentResult<String>;

    /// The `sequence_hash` of the newest event, or `GENESIS_HASH` when there
    /// is none. Never fails.
    fn last_hash(&self) -> String;

    /// Replay the whole chain from genesis and report whether it is intact.
    fn verify_chain(&self) -> bool;
}

/// The consent policy: decides whether a data access request may proceed.
///
/// Implementations are trusted and must be deterministic; avoid I/O on the
/// evaluation path.
pub trait ConsentPolicy: Send + Sync {
    fn evaluate(&self, request: &AccessRequest) -> ConsentResult<ConsentDecision>;
}
