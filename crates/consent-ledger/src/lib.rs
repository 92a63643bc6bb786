//! # consent-ledger
//!
//! Tamper-evident, append-only, SHA-256 hash-chained record of consent events.
//!
//! ## Overview
//!
//! Every grant, denial, and violation is stored as a `ConsentEvent` that
//! links to the previous event through its digest.  Altering, deleting, or
//! reordering any stored event, even by a single byte, breaks the chain and
//! is detected by `verify_chain`.
//!
//! Two stores implement [`ConsentLedger`](consent_core::traits::ConsentLedger):
//!
//! - [`FileLedger`]: newline-delimited JSON in a single backing file
//! - [`InMemoryLedger`]: a `Vec` behind a mutex, for tests and demos
//!
//! ## Usage
//!
//! ```rust,ignore
//! use consent_core::traits::ConsentLedger;
//! use consent_ledger::{FileLedger, LedgerConfig};
//! use serde_json::json;
//!
//! let ledger = FileLedger::open(LedgerConfig::new("ledger.jsonl"));
//! let hash = ledger.append("svc", "consent_validation_passed", &json!({"target": "private_data"}), None)?;
//! assert_eq!(ledger.last_hash(), hash);
//! assert!(ledger.verify_chain());
//! ```

pub mod chain;
pub mod config;
pub mod event;
pub mod file;
pub mod memory;

pub use chain::{canonical_json, chain_digest, hash_event, verify_events, verify_lines, ChainReport};
pub use config::{LedgerConfig, ReadFailurePolicy, TailPolicy};
pub use consent_core::GENESIS_HASH;
pub use event::{ConsentEvent, EventDraft};
pub use file::FileLedger;
pub use memory::InMemoryLedger;

// ── Tests ─────────────────────────────────────────────────────────────────────
