//! Ledger configuration.
//!
//! Each `FileLedger` is built from its own `LedgerConfig`; there is no
//! process-wide ledger path.  The config can be written inline or loaded from
//! TOML:
//!
//! ```toml
//! path = "/var/lib/consent/ledger.jsonl"
//! tail_policy = "strict"
//! unreadable_ledger = "fail-closed"
//! sync_on_append = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use consent_contracts::{ConsentError, ConsentResult};

/// Backing file used when no path is configured.
pub const DEFAULT_LEDGER_PATH: &str = "ledger.jsonl";

/// What to do with an unparsable final line (a write torn by a crash).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TailPolicy {
    /// The torn line is not part of the chain.  Verification judges the
    /// events before it, and the next append discards it.
    #[default]
    Truncate,
    /// A torn line fails verification and blocks further appends.
    Strict,
}

/// What `verify_chain` reports when the backing file exists but cannot be read.
///
/// A missing file is always an empty, valid ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadFailurePolicy {
    /// Report `true`, as for an empty ledger.
    #[default]
    TreatAsEmpty,
    /// Report `false`: a ledger that cannot be read cannot be attested.
    FailClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Newline-delimited JSON file holding the chain.
    pub path: PathBuf,
    pub tail_policy: TailPolicy,
    pub unreadable_ledger: ReadFailurePolicy,
    /// Call `sync_data` after every append so a returned hash is durable.
    pub sync_on_append: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LEDGER_PATH),
            tail_policy: TailPolicy::default(),
            unreadable_ledger: ReadFailurePolicy::default(),
            sync_on_append: true,
        }
    }
}

impl LedgerConfig {
    /// Default settings for a ledger stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_tail_policy(mut self, policy: TailPolicy) -> Self {
        self.tail_policy = policy;
        self
    }

    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.unreadable_ledger = policy;
        self
    }

    pub fn with_sync_on_append(mut self, sync: bool) -> Self {
        self.sync_on_append = sync;
        self
    }

    /// Parse `s` as TOML.  Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> ConsentResult<Self> {
        toml::from_str(s).map_err(|e| ConsentError::ConfigError {
            reason: format!("failed to parse ledger TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> ConsentResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConsentError::ConfigError {
            reason: format!("failed to read ledger config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
