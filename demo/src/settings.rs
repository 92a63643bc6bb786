//! Demo configuration: one TOML file with a `[ledger]` and a `[policy]` table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use consent_contracts::{ConsentError, ConsentResult, LedgerSnapshot};
use consent_core::traits::ConsentLedger;
use consent_ledger::{ChainReport, FileLedger, InMemoryLedger, LedgerConfig};
use consent_policy::PolicyConfig;

#[derive(Debug, Default, Deserialize)]
pub struct DemoConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl DemoConfig {
    /// Load `path` if given, otherwise use defaults.  `ledger_path` overrides
    /// the configured ledger location.
    pub fn load(path: Option<&Path>, ledger_path: Option<PathBuf>) -> ConsentResult<Self> {
        let mut config = match path {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|e| ConsentError::ConfigError {
                        reason: format!("failed to read config '{}': {}", path.display(), e),
                    })?;
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };
        if let Some(ledger_path) = ledger_path {
            config.ledger.path = ledger_path;
        }
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> ConsentResult<Self> {
        toml::from_str(s).map_err(|e| ConsentError::ConfigError {
            reason: format!("failed to parse demo config: {}", e),
        })
    }
}

/// The ledger the demo writes to.
pub enum Store {
    File(Arc<FileLedger>),
    Memory(Arc<InMemoryLedger>),
}

impl Store {
    pub fn new(config: &LedgerConfig, in_memory: bool) -> Self {
        if in_memory {
            Self::Memory(Arc::new(InMemoryLedger::new()))
        } else {
            Self::File(Arc::new(FileLedger::open(config.clone())))
        }
    }

    pub fn ledger(&self) -> Arc<dyn ConsentLedger> {
        match self {
            Self::File(ledger) => ledger.clone(),
            Self::Memory(ledger) => ledger.clone(),
        }
    }

    pub fn snapshot(&self) -> ConsentResult<LedgerSnapshot> {
        match self {
            Self::File(ledger) => ledger.snapshot(),
            Self::Memory(ledger) => ledger.export(),
        }
    }

    /// A detailed report where the store supports one.
    pub fn report(&self) -> ConsentResult<Option<ChainReport>> {
        match self {
            Self::File(ledger) => ledger.verify_report().map(Some),
            Self::Memory(_) => Ok(None),
        }
    }
}
