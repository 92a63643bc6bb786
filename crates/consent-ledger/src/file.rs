//! File-backed implementation of `ConsentLedger`.
//!
//! The ledger is one newline-delimited JSON file: one event per line, oldest
//! first, never rewritten in place.  An append reads the current tail, seals
//! the new event against it, and writes the complete line with a single
//! `write_all`.  Verification replays the file from genesis.
//!
//! # Concurrency
//!
//! A `FileLedger` serializes its own appends and orders reads after any
//! in-flight append through an internal `RwLock`.  Nothing coordinates
//! separate processes or separate `FileLedger` values for the same path:
//! give each backing file exactly one writer.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use consent_contracts::{ConsentError, ConsentResult, LedgerSnapshot};
use consent_core::traits::ConsentLedger;

use crate::{
    chain::{parse_line, stored_lines, verify_lines, ChainReport},
    config::{LedgerConfig, ReadFailurePolicy, TailPolicy},
    event::{ConsentEvent, EventDraft, SEQUENCE_HASH_FIELD},
};

/// Where the next event attaches to the stored chain.
#[derive(Debug, PartialEq, Eq)]
struct Tail {
    /// `sequence_hash` of the last well-formed event.
    hash: String,
    /// Byte length to cut the file back to, dropping a torn final line.
    truncate_to: Option<u64>,
    /// The last line lacks its terminating newline.
    needs_newline: bool,
}

/// An append-only consent ledger stored in a single file.
pub struct FileLedger {
    config: LedgerConfig,
    lock: RwLock<()>,
}

impl FileLedger {
    /// Create a ledger over `config.path`.  The file is created on first append.
    pub fn open(config: LedgerConfig) -> Self {
        debug!(
            path = %config.path.display(),
            tail_policy = ?config.tail_policy,
            "opening file ledger"
        );
        Self {
            config,
            lock: RwLock::new(()),
        }
    }

    /// A ledger at `path` with default settings.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self::open(LedgerConfig::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Append an event stamped with `timestamp`.
    ///
    /// Input is validated and the line fully serialized before the file is
    /// opened, so a rejected append leaves the file untouched.
    pub fn append_at(
        &self,
        timestamp: DateTime<Utc>,
        actor: &str,
        action: &str,
        payload: &Value,
        consent_reference: Option<&str>,
    ) -> ConsentResult<String> {
        let draft = EventDraft::new(actor, action, payload, consent_reference)?;
        self.append_draft(draft, timestamp)
    }

    /// Append an event whose payload is any serializable value.
    ///
    /// The payload must serialize to a JSON object; a payload serde cannot
    /// represent fails with `ConsentError::Serialization` and nothing is written.
    pub fn append_serializable<P: Serialize + ?Sized>(
        &self,
        actor: &str,
        action: &str,
        payload: &P,
        consent_reference: Option<&str>,
    ) -> ConsentResult<String> {
        let draft = EventDraft::from_serializable(actor, action, payload, consent_reference)?;
        self.append_draft(draft, Utc::now())
    }

    fn append_draft(&self, draft: EventDraft, timestamp: DateTime<Utc>) -> ConsentResult<String> {
        let _guard = self
            .lock
            .write()
            .map_err(|e| ConsentError::LedgerUnavailable {
                reason: format!("ledger lock poisoned: {}", e),
            })?;

        let tail = self.locate_tail()?;
        let event = draft.seal(timestamp, tail.hash)?;

        let mut line = String::new();
        if tail.needs_newline {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(&event)?);
        line.push('\n');

        if let Some(len) = tail.truncate_to {
            self.truncate(len)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)
            .map_err(|e| ConsentError::io(&self.config.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| ConsentError::io(&self.config.path, e))?;
        if self.config.sync_on_append {
            file.sync_data()
                .map_err(|e| ConsentError::io(&self.config.path, e))?;
        }

        info!(
            path = %self.config.path.display(),
            actor = %event.actor,
            action = %event.action,
            sequence_hash = %event.sequence_hash,
            previous_hash = %event.previous_hash,
            "consent event appended"
        );

        Ok(event.sequence_hash)
    }

    /// Find the event the next append links to, applying the tail policy to
    /// a torn final line.
    fn locate_tail(&self) -> ConsentResult<Tail> {
        let Some(contents) = self.read_contents()? else {
            return Ok(Tail {
                hash: ConsentEvent::GENESIS_HASH.to_string(),
                truncate_to: None,
                needs_newline: false,
            });
        };

        // (byte offset of line start, 1-based line number, text)
        let mut lines: Vec<(usize, usize, &str)> = Vec::new();
        let mut offset = 0;
        for (idx, raw) in contents.split_inclusive('\n').enumerate() {
            let text = raw.trim_end_matches(['\n', '\r']);
            if !text.trim().is_empty() {
                lines.push((offset, idx + 1, text));
            }
            offset += raw.len();
        }

        let Some(&(start, line_no, last)) = lines.last() else {
            return Ok(Tail {
                hash: ConsentEvent::GENESIS_HASH.to_string(),
                truncate_to: None,
                needs_newline: false,
            });
        };

        let reason = match parse_line(last) {
            Ok(fields) => {
                return Ok(Tail {
                    hash: sequence_hash_of(&fields),
                    truncate_to: None,
                    needs_newline: !contents.ends_with('\n'),
                });
            }
            Err(reason) => reason,
        };

        if self.config.tail_policy == TailPolicy::Strict {
            return Err(ConsentError::TornTail {
                path: self.config.path.clone(),
                line: line_no,
            });
        }

        warn!(
            path = %self.config.path.display(),
            line = line_no,
            reason = %reason,
            "discarding torn final line before append"
        );

        let hash = match lines.len().checked_sub(2).map(|i| lines[i]) {
            None => ConsentEvent::GENESIS_HASH.to_string(),
            Some((_, prev_no, prev)) => {
                let fields = parse_line(prev).map_err(|reason| ConsentError::LedgerCorrupted {
                    reason: format!("line {} before the torn tail is unreadable: {}", prev_no, reason),
                })?;
                sequence_hash_of(&fields)
            }
        };

        Ok(Tail {
            hash,
            truncate_to: Some(start as u64),
            needs_newline: false,
        })
    }

    fn truncate(&self, len: u64) -> ConsentResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(&self.config.path)
            .map_err(|e| ConsentError::io(&self.config.path, e))?;
        file.set_len(len)
            .map_err(|e| ConsentError::io(&self.config.path, e))
    }

    /// The whole file as text, or `None` if it does not exist.
    ///
    /// Bytes that are not valid UTF-8 (a write torn inside a character, or
    /// tampering) are replaced rather than rejected, so they surface as a
    /// malformed line or a digest mismatch.
    fn read_contents(&self) -> ConsentResult<Option<String>> {
        match fs::read(&self.config.path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConsentError::io(&self.config.path, e)),
        }
    }

    /// Replay the chain and describe the outcome.
    ///
    /// Fails only if the file exists but cannot be read.
    pub fn verify_report(&self) -> ConsentResult<ChainReport> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let report = match self.read_contents()? {
            Some(contents) => verify_lines(&contents, self.config.tail_policy),
            None => ChainReport::empty(),
        };

        match &report.failure {
            None => info!(
                path = %self.config.path.display(),
                events_checked = report.events_checked,
                torn_tail = ?report.torn_tail,
                "ledger chain verified"
            ),
            Some(failure) => error!(
                path = %self.config.path.display(),
                line = failure.line,
                failure = %failure.kind,
                "ledger chain verification failed"
            ),
        }
        Ok(report)
    }

    /// Every event in storage order.
    ///
    /// A torn final line is skipped under `TailPolicy::Truncate` and is an
    /// error under `TailPolicy::Strict`; any other unreadable line is an error.
    /// The chain itself is not verified.
    pub fn events(&self) -> ConsentResult<Vec<ConsentEvent>> {
        self.read_records()
    }

    /// The read-side projection: stored events as JSON, in file order, with a count.
    pub fn snapshot(&self) -> ConsentResult<LedgerSnapshot> {
        Ok(LedgerSnapshot::new(self.read_records()?))
    }

    fn read_records<T: DeserializeOwned>(&self) -> ConsentResult<Vec<T>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let Some(contents) = self.read_contents()? else {
            return Ok(Vec::new());
        };

        let lines: Vec<(usize, &str)> = stored_lines(&contents).collect();
        let last = lines.len().saturating_sub(1);
        let mut records = Vec::with_capacity(lines.len());

        for (idx, (line_no, line)) in lines.into_iter().enumerate() {
            match serde_json::from_str::<T>(line) {
                Ok(record) => records.push(record),
                Err(_) if idx == last && self.config.tail_policy == TailPolicy::Truncate => {
                    debug!(line = line_no, "skipping torn final line");
                }
                Err(_) if idx == last => {
                    return Err(ConsentError::TornTail {
                        path: self.config.path.clone(),
                        line: line_no,
                    });
                }
                Err(e) => {
                    return Err(ConsentError::LedgerCorrupted {
                        reason: format!("line {} is unreadable: {}", line_no, e),
                    });
                }
            }
        }
        Ok(records)
    }
}

fn sequence_hash_of(fields: &serde_json::Map<String, Value>) -> String {
    fields
        .get(SEQUENCE_HASH_FIELD)
        .and_then(Value::as_str)
        .unwrap_or(ConsentEvent::GENESIS_HASH)
        .to_string()
}

impl ConsentLedger for FileLedger {
    fn append(
        &self,
        actor: &str,
        action: &str,
        payload: &Value,
        consent_reference: Option<&str>,
    ) -> ConsentResult<String> {
        self.append_at(Utc::now(), actor, action, payload, consent_reference)
    }

    /// Reads never fail here: an absent, unreadable, or torn last line all
    /// yield the genesis sentinel.
    fn last_hash(&self) -> String {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let contents = match self.read_contents() {
            Ok(Some(contents)) => contents,
            Ok(None) => return ConsentEvent::GENESIS_HASH.to_string(),
            Err(e) => {
                warn!(error = %e, "ledger unreadable; reporting genesis tail");
                return ConsentEvent::GENESIS_HASH.to_string();
            }
        };

        match stored_lines(&contents).last().map(|(_, line)| parse_line(line)) {
            Some(Ok(fields)) => sequence_hash_of(&fields),
            Some(Err(reason)) => {
                warn!(reason = %reason, "last ledger line unreadable; reporting genesis tail");
                ConsentEvent::GENESIS_HASH.to_string()
            }
            None => ConsentEvent::GENESIS_HASH.to_string(),
        }
    }

    fn verify_chain(&self) -> bool {
        match self.verify_report() {
            Ok(report) => report.valid,
            Err(e) => match self.config.unreadable_ledger {
                ReadFailurePolicy::TreatAsEmpty => {
                    warn!(error = %e, "ledger unreadable; treating as empty");
                    true
                }
                ReadFailurePolicy::FailClosed => {
                    error!(error = %e, "ledger unreadable; failing verification");
                    false
                }
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
