use anyhow::Context;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequencerConfig {
    pub endpoint: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    20
}

/// Limits imposed by the ledger protocol and the sequencer's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineLimits {
    /// Page size for whole-balance scans.
    pub balance_page_size: usize,
    /// Page size while selecting inputs for a spend.
    pub selection_page_size: usize,
    /// A selection reaching this many inputs is rejected.
    pub max_inputs: usize,
    /// Largest memo a transaction may carry, in bytes.
    pub max_extra_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            balance_page_size: 500,
            selection_page_size: 100,
            max_inputs: 256,
            max_extra_size: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub sequencer: SequencerConfig,
    pub user_id: String,
    /// hex encoded 32-byte Ed25519 seed
    pub spend_key: String,
    #[serde(default)]
    pub limits: EngineLimits,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Cannot read config file {path}", path = path.display()))?;
        let config: Config = serde_yaml::from_reader(file)
            .with_context(|| format!("Cannot read config file {path}", path = path.display()))?;
        Ok(config)
    }
}
