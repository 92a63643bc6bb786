//! The read-side projection of a ledger.
//!
//! A query component hands this to its clients: every stored event in file
//! order, as plain JSON, plus a count.  Producing a snapshot never verifies
//! the chain.

use serde::{Deserialize, Serialize};

/// Status string carried by a successfully produced snapshot.
pub const SNAPSHOT_STATUS_OK: &str = "ok";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub status: String,
    /// Number of entries in `events`.
    pub count: usize,
    /// Stored events, oldest first, exactly as read from storage.
    pub events: Vec<serde_json::Value>,
}

impl LedgerSnapshot {
    pub fn new(events: Vec<serde_json::Value>) -> Self {
        Self {
            status: SNAPSHOT_STATUS_OK.to_string(),
            count: events.len(),
            events,
        }
    }
}
