//! Hash-chain primitives: canonical hashing and chain integrity verification.
//!
//! An event's digest is SHA-256 over the canonical JSON text of every field
//! except `sequence_hash`.  Canonical text is compact JSON with object keys
//! sorted byte-wise at every depth, so the same field values always hash to
//! the same digest regardless of how a map happened to be ordered.
//!
//! Verification works on generic JSON rather than on typed events: a stored
//! value that was edited but is still well-formed JSON gets hashed as stored
//! and fails the digest check instead of failing to parse.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use consent_contracts::{ConsentError, ConsentResult};

use crate::config::TailPolicy;
use crate::event::{ConsentEvent, PREVIOUS_HASH_FIELD, SEQUENCE_HASH_FIELD};

// ── Canonical form ────────────────────────────────────────────────────────────

/// Render `value` as canonical JSON: no whitespace, object keys sorted.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, None, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        // Display on a scalar Value is its compact JSON form.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_object(map: &Map<String, Value>, skip: Option<&str>, out: &mut String) {
    let mut entries: Vec<(&String, &Value)> = map
        .iter()
        .filter(|(key, _)| Some(key.as_str()) != skip)
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::from(key.as_str()).to_string());
        out.push(':');
        write_value(value, out);
    }
    out.push('}');
}

// ── Digest ────────────────────────────────────────────────────────────────────

/// Compute the chain digest of an event given as a JSON object.
///
/// The `sequence_hash` key, if present, is excluded.  Returns 64 lowercase
/// hex characters.
pub fn chain_digest(fields: &Map<String, Value>) -> String {
    let mut canonical = String::new();
    write_object(fields, Some(SEQUENCE_HASH_FIELD), &mut canonical);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Compute the digest a typed event should carry.
///
/// Ignores whatever is currently in `event.sequence_hash`.
pub fn hash_event(event: &ConsentEvent) -> ConsentResult<String> {
    match serde_json::to_value(event)? {
        Value::Object(fields) => Ok(chain_digest(&fields)),
        _ => Err(ConsentError::Serialization {
            reason: "consent event did not serialize to a JSON object".to_string(),
        }),
    }
}

// ── Verification ──────────────────────────────────────────────────────────────

/// Why verification stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The stored `sequence_hash` does not match the recomputed digest.
    DigestMismatch { stored: String, recomputed: String },
    /// `previous_hash` does not name the preceding event.
    BrokenLink { expected: String, found: String },
    /// Two events carry the same `sequence_hash`.
    DuplicateDigest { digest: String },
    /// A line that is not the last one could not be read as an event.
    MalformedLine { reason: String },
    /// The last line could not be read as an event and the tail policy is strict.
    TornTail { reason: String },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigestMismatch { stored, recomputed } => {
                write!(f, "digest mismatch (stored {stored}, recomputed {recomputed})")
            }
            Self::BrokenLink { expected, found } => {
                write!(f, "broken link (expected previous_hash {expected}, found {found})")
            }
            Self::DuplicateDigest { digest } => write!(f, "duplicate digest {digest}"),
            Self::MalformedLine { reason } => write!(f, "malformed line: {reason}"),
            Self::TornTail { reason } => write!(f, "torn final line: {reason}"),
        }
    }
}

/// The first failure found, with its 1-based line number in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFailure {
    pub line: usize,
    #[serde(flatten)]
    pub kind: FailureKind,
}

/// The detailed result of replaying a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub valid: bool,
    /// Events that passed both checks before verification stopped.
    pub events_checked: usize,
    /// Line number of an unparsable final line that was left out of the chain.
    pub torn_tail: Option<usize>,
    pub failure: Option<ChainFailure>,
    /// `sequence_hash` of the last event that passed.
    pub tail_hash: String,
}

impl ChainReport {
    /// The report for a ledger with no events.
    pub fn empty() -> Self {
        Self {
            valid: true,
            events_checked: 0,
            torn_tail: None,
            failure: None,
            tail_hash: ConsentEvent::GENESIS_HASH.to_string(),
        }
    }
}

/// Running state of a replay from genesis.
struct Replay {
    expected_previous: String,
    seen: HashSet<String>,
    checked: usize,
}

impl Replay {
    fn new() -> Self {
        Self {
            expected_previous: ConsentEvent::GENESIS_HASH.to_string(),
            seen: HashSet::new(),
            checked: 0,
        }
    }

    /// Check one event against its predecessor and advance.
    fn check(&mut self, fields: &Map<String, Value>) -> Result<(), FailureKind> {
        let (stored, previous) = hash_fields(fields).map_err(|reason| FailureKind::MalformedLine { reason })?;

        if previous != self.expected_previous {
            return Err(FailureKind::BrokenLink {
                expected: self.expected_previous.clone(),
                found: previous.to_string(),
            });
        }

        let recomputed = chain_digest(fields);
        if recomputed != stored {
            return Err(FailureKind::DigestMismatch {
                stored: stored.to_string(),
                recomputed,
            });
        }

        if !self.seen.insert(stored.to_string()) {
            return Err(FailureKind::DuplicateDigest {
                digest: stored.to_string(),
            });
        }

        self.expected_previous = stored.to_string();
        self.checked += 1;
        Ok(())
    }

    fn finish(self, failure: Option<ChainFailure>, torn_tail: Option<usize>) -> ChainReport {
        ChainReport {
            valid: failure.is_none(),
            events_checked: self.checked,
            torn_tail,
            failure,
            tail_hash: self.expected_previous,
        }
    }
}

/// Extract `(sequence_hash, previous_hash)` from a stored event.
fn hash_fields(fields: &Map<String, Value>) -> Result<(&str, &str), String> {
    let stored = fields
        .get(SEQUENCE_HASH_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing string field '{SEQUENCE_HASH_FIELD}'"))?;
    let previous = fields
        .get(PREVIOUS_HASH_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing string field '{PREVIOUS_HASH_FIELD}'"))?;
    Ok((stored, previous))
}

/// Parse one stored line into its JSON fields.
///
/// A line is well-formed when it is a JSON object carrying string
/// `sequence_hash` and `previous_hash` fields.
pub(crate) fn parse_line(line: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(fields)) => {
            hash_fields(&fields)?;
            Ok(fields)
        }
        Ok(_) => Err("line is not a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Non-blank lines of `contents` with their 1-based line numbers.
pub(crate) fn stored_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| (idx + 1, line))
}

/// Replay newline-delimited events from genesis.
///
/// Every event must link to its predecessor and carry the digest of its own
/// content.  An unparsable line followed by any well-formed line is
/// corruption.  An unparsable final line is a torn write: with
/// `TailPolicy::Truncate` it is left out of the chain and the rest is judged
/// on its own; with `TailPolicy::Strict` it fails verification.
pub fn verify_lines(contents: &str, tail_policy: TailPolicy) -> ChainReport {
    let lines: Vec<(usize, &str)> = stored_lines(contents).collect();
    let last = lines.len().saturating_sub(1);
    let mut replay = Replay::new();

    for (idx, (line_no, line)) in lines.into_iter().enumerate() {
        let fields = match parse_line(line) {
            Ok(fields) => fields,
            Err(reason) if idx == last => {
                return match tail_policy {
                    TailPolicy::Truncate => replay.finish(None, Some(line_no)),
                    TailPolicy::Strict => replay.finish(
                        Some(ChainFailure {
                            line: line_no,
                            kind: FailureKind::TornTail { reason },
                        }),
                        None,
                    ),
                };
            }
            Err(reason) => {
                return replay.finish(
                    Some(ChainFailure {
                        line: line_no,
                        kind: FailureKind::MalformedLine { reason },
                    }),
                    None,
                );
            }
        };

        if let Err(kind) = replay.check(&fields) {
            return replay.finish(Some(ChainFailure { line: line_no, kind }), None);
        }
    }

    replay.finish(None, None)
}

/// Verify a chain of typed events held in memory.
///
/// Returns `true` when every event links to its predecessor (the first to
/// `GENESIS_HASH`) and carries the digest of its own content.  An empty
/// chain is valid.
pub fn verify_events(events: &[ConsentEvent]) -> bool {
    let mut replay = Replay::new();
    events.iter().all(|event| match serde_json::to_value(event) {
        Ok(Value::Object(fields)) => replay.check(&fields).is_ok(),
        _ => false,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::event::EventDraft;

    fn sealed(previous: &str, target: &str) -> ConsentEvent {
        EventDraft::new("svc", "consent_validation_passed", &json!({ "target": target }), None)
            .unwrap()
            .seal(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(), previous.to_string())
            .unwrap()
    }

    fn to_lines(events: &[ConsentEvent]) -> String {
        events
            .iter()
            .map(|e| serde_json::to_string(e).unwrap() + "\n")
            .collect()
    }

    fn chain(n: usize) -> Vec<ConsentEvent> {
        let mut events: Vec<ConsentEvent> = Vec::new();
        for i in 0..n {
            let previous = events
                .last()
                .map(|e| e.sequence_hash.clone())
                .unwrap_or_else(|| ConsentEvent::GENESIS_HASH.to_string());
            events.push(sealed(&previous, &format!("target-{i}")));
        }
        events
    }

    // ── Canonical form ────────────────────────────────────────────────────────

    #[test]
    fn canonical_json_sorts_keys_at_every_depth() {
        let value = json!({
            "zeta": 1,
            "alpha": { "d": [3, { "y": true, "b": null }], "a": "x" },
            "Mid": "upper sorts first"
        });
        assert_eq!(
            canonical_json(&value),
            r#"{"Mid":"upper sorts first","alpha":{"a":"x","d":[3,{"b":null,"y":true}]},"zeta":1}"#
        );
    }

    #[test]
    fn canonical_json_escapes_strings() {
        let value = json!({ "quote\"key": "line\nbreak", "unicode": "café" });
        assert_eq!(
            canonical_json(&value),
            "{\"quote\\\"key\":\"line\\nbreak\",\"unicode\":\"café\"}"
        );
    }

    #[test]
    fn chain_digest_ignores_key_order_and_sequence_hash() {
        let a: Map<String, Value> = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        let b: Map<String, Value> =
            serde_json::from_str(r#"{"a":2,"b":1,"sequence_hash":"whatever"}"#).unwrap();

        let digest = chain_digest(&a);
        assert_eq!(digest, chain_digest(&b));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn chain_digest_is_sha256_of_canonical_text() {
        let fields: Map<String, Value> = serde_json::from_str(r#"{"b":1,"a":"x"}"#).unwrap();
        let expected = hex::encode(Sha256::digest(br#"{"a":"x","b":1}"#));
        assert_eq!(chain_digest(&fields), expected);
    }

    #[test]
    fn hash_event_matches_sealed_digest() {
        let event = sealed(ConsentEvent::GENESIS_HASH, "private_data");
        assert_eq!(hash_event(&event).unwrap(), event.sequence_hash);

        // The digest survives a trip through the stored line format.
        let line = serde_json::to_string(&event).unwrap();
        let fields = parse_line(&line).unwrap();
        assert_eq!(chain_digest(&fields), event.sequence_hash);
    }

    #[test]
    fn float_payload_digest_survives_reparse() {
        let event = EventDraft::new(
            "svc",
            "measurement",
            &json!({ "value": 908411.5270066493, "tiny": 1.0715660391465826e-75 }),
            None,
        )
        .unwrap()
        .seal(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(), ConsentEvent::GENESIS_HASH.to_string())
        .unwrap();

        let line = serde_json::to_string(&event).unwrap();
        let fields = parse_line(&line).unwrap();
        assert_eq!(fields["payload"]["value"].as_f64(), Some(908411.5270066493));
        assert_eq!(chain_digest(&fields), event.sequence_hash);
        assert!(verify_lines(&format!("{line}\n"), TailPolicy::Strict).valid);
    }

    // ── verify_events ─────────────────────────────────────────────────────────

    #[test]
    fn verify_events_accepts_intact_chain() {
        assert!(verify_events(&[]));
        assert!(verify_events(&chain(4)));
    }

    #[test]
    fn verify_events_rejects_reordering() {
        let mut events = chain(3);
        events.swap(1, 2);
        assert!(!verify_events(&events));
    }

    #[test]
    fn verify_events_rejects_wrong_genesis() {
        let event = sealed(&"1".repeat(64), "x");
        assert!(!verify_events(&[event]));
    }

    // ── verify_lines ──────────────────────────────────────────────────────────

    #[test]
    fn verify_lines_reports_tail_and_count() {
        let events = chain(3);
        let report = verify_lines(&to_lines(&events), TailPolicy::Truncate);
        assert!(report.valid);
        assert_eq!(report.events_checked, 3);
        assert_eq!(report.tail_hash, events[2].sequence_hash);
        assert_eq!(report.torn_tail, None);
    }

    #[test]
    fn verify_lines_empty_and_blank_input_is_valid() {
        assert_eq!(verify_lines("", TailPolicy::Strict), ChainReport::empty());
        assert_eq!(verify_lines("\n  \n", TailPolicy::Strict), ChainReport::empty());
    }

    #[test]
    fn verify_lines_flags_digest_mismatch_with_line_number() {
        let events = chain(3);
        let contents = to_lines(&events).replace("target-1", "target-X");

        let report = verify_lines(&contents, TailPolicy::Truncate);
        assert!(!report.valid);
        assert_eq!(report.events_checked, 1);
        let failure = report.failure.unwrap();
        assert_eq!(failure.line, 2);
        assert!(matches!(failure.kind, FailureKind::DigestMismatch { .. }));
    }

    #[test]
    fn verify_lines_flags_deleted_event_as_broken_link() {
        let events = chain(3);
        let contents = to_lines(&[events[0].clone(), events[2].clone()]);

        let failure = verify_lines(&contents, TailPolicy::Truncate).failure.unwrap();
        assert_eq!(failure.line, 2);
        assert!(matches!(failure.kind, FailureKind::BrokenLink { .. }));
    }

    #[test]
    fn verify_lines_flags_duplicate_digest() {
        // A replayed copy of an event can only link if the accumulator is
        // rewound, so rewind it by hand.
        let first = sealed(ConsentEvent::GENESIS_HASH, "x");
        let line = serde_json::to_string(&first).unwrap();
        let mut replay = Replay::new();
        let fields = parse_line(&line).unwrap();
        replay.check(&fields).unwrap();
        replay.expected_previous = ConsentEvent::GENESIS_HASH.to_string();
        assert!(matches!(
            replay.check(&fields),
            Err(FailureKind::DuplicateDigest { .. })
        ));
    }

    #[test]
    fn torn_final_line_follows_tail_policy() {
        let events = chain(2);
        let mut contents = to_lines(&events);
        contents.push_str(r#"{"timestamp":"2026-01-02T03:0"#);

        let lenient = verify_lines(&contents, TailPolicy::Truncate);
        assert!(lenient.valid);
        assert_eq!(lenient.events_checked, 2);
        assert_eq!(lenient.torn_tail, Some(3));

        let strict = verify_lines(&contents, TailPolicy::Strict);
        assert!(!strict.valid);
        let failure = strict.failure.unwrap();
        assert_eq!(failure.line, 3);
        assert!(matches!(failure.kind, FailureKind::TornTail { .. }));
    }

    #[test]
    fn malformed_middle_line_fails_under_both_policies() {
        let events = chain(2);
        let contents = format!(
            "{}\n{{garbage\n{}\n",
            serde_json::to_string(&events[0]).unwrap(),
            serde_json::to_string(&events[1]).unwrap()
        );

        for policy in [TailPolicy::Truncate, TailPolicy::Strict] {
            let report = verify_lines(&contents, policy);
            assert!(!report.valid);
            let failure = report.failure.unwrap();
            assert_eq!(failure.line, 2);
            assert!(matches!(failure.kind, FailureKind::MalformedLine { .. }));
        }
    }

    #[test]
    fn parse_line_requires_hash_fields() {
        assert!(parse_line("[1,2]").is_err());
        assert!(parse_line(r#"{"previous_hash":"00"}"#).is_err());
        assert!(parse_line(r#"{"previous_hash":"00","sequence_hash":7}"#).is_err());
        assert!(parse_line(r#"{"previous_hash":"00","sequence_hash":"11"}"#).is_ok());
    }

    #[test]
    fn failure_kind_display() {
        let kind = FailureKind::BrokenLink {
            expected: "aa".to_string(),
            found: "bb".to_string(),
        };
        assert_eq!(kind.to_string(), "broken link (expected previous_hash aa, found bb)");
    }
}
