//! Configuration module for the swap client
//!
//! Settings are read from a TOML file and overridden by `SWAP_`-prefixed
//! environment variables (`SWAP_RPC__URL`, `SWAP_DISPATCH__RETRY_DELAY_MS`, ...).

use crate::tx_builder::DispatchOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Network the program id is selected for
    #[serde(default)]
    pub cluster: Cluster,

    /// Swap program ids by network
    #[serde(default)]
    pub programs: ProgramsConfig,

    #[serde(default)]
    pub das: DasConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Mainnet,
    #[default]
    Devnet,
    Localnet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// `processed`, `confirmed` or `finalized`
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramsConfig {
    pub mainnet: Option<String>,
    pub devnet: Option<String>,
    pub localnet: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DasConfig {
    /// DAS-capable endpoint; falls back to `rpc.url`
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Micro-lamports per compute unit
    #[serde(default)]
    pub priority_fee_micro_lamports: Option<u64>,

    #[serde(default)]
    pub skip_simulation: bool,

    #[serde(default)]
    pub skip_confirmation: bool,

    /// Overall bound for one dispatch call
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Print Prometheus metrics when a command finishes
    #[serde(default)]
    pub enable_metrics: bool,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.devnet.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_retry_delay_ms() -> u64 { 5_000 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            priority_fee_micro_lamports: None,
            skip_simulation: false,
            skip_confirmation: false,
            deadline_secs: None,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file layered under the environment
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("SWAP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to assemble configuration sources")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document directly, without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.rpc.url)
            .with_context(|| format!("Invalid rpc.url '{}'", self.rpc.url))?;
        if let Some(url) = &self.das.url {
            reqwest::Url::parse(url).with_context(|| format!("Invalid das.url '{url}'"))?;
        }
        parse_commitment(&self.rpc.commitment)?;

        for (network, id) in [
            ("mainnet", &self.programs.mainnet),
            ("devnet", &self.programs.devnet),
            ("localnet", &self.programs.localnet),
        ] {
            if let Some(id) = id {
                Pubkey::from_str(id)
                    .with_context(|| format!("Invalid programs.{network} id '{id}'"))?;
            }
        }

        if self.dispatch.retry_delay_ms == 0 {
            anyhow::bail!("dispatch.retry_delay_ms must be greater than zero");
        }
        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Program id configured for the selected cluster
    pub fn program_id(&self) -> Result<Pubkey> {
        let configured = match self.cluster {
            Cluster::Mainnet => &self.programs.mainnet,
            Cluster::Devnet => &self.programs.devnet,
            Cluster::Localnet => &self.programs.localnet,
        };
        let id = configured
            .as_deref()
            .with_context(|| format!("No program id configured for {:?}", self.cluster))?;
        Pubkey::from_str(id).with_context(|| format!("Invalid program id '{id}'"))
    }

    pub fn commitment(&self) -> Result<CommitmentConfig> {
        parse_commitment(&self.rpc.commitment)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn das_url(&self) -> &str {
        self.das.url.as_deref().unwrap_or(&self.rpc.url)
    }

    /// Keypair path with a leading `~` expanded from `$HOME`
    pub fn keypair_path(&self) -> PathBuf {
        let raw = &self.wallet.keypair_path;
        match (raw.strip_prefix("~/"), std::env::var_os("HOME")) {
            (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
            _ => PathBuf::from(raw),
        }
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            priority_fee: self.dispatch.priority_fee_micro_lamports,
            retry_delay: Duration::from_millis(self.dispatch.retry_delay_ms),
            skip_simulation: self.dispatch.skip_simulation,
            skip_confirmation: self.dispatch.skip_confirmation,
            deadline: self.dispatch.deadline_secs.map(Duration::from_secs),
        }
    }
}

fn parse_commitment(raw: &str) -> Result<CommitmentConfig> {
    match raw {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => anyhow::bail!("Unknown commitment level '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
cluster = "localnet"

[rpc]
url = "http://127.0.0.1:8899"
commitment = "finalized"

[programs]
localnet = "11111111111111111111111111111111"

[dispatch]
retry_delay_ms = 250
priority_fee_micro_lamports = 1000
"#;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.dispatch.retry_delay_ms, 5_000);
        assert_eq!(config.cluster, Cluster::Devnet);
        assert!(config.validate().is_ok());
        // no invented program id
        assert!(config.program_id().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.cluster, Cluster::Localnet);
        assert_eq!(config.program_id().unwrap(), solana_sdk::system_program::ID);
        assert_eq!(config.commitment().unwrap(), CommitmentConfig::finalized());
        assert_eq!(config.das_url(), "http://127.0.0.1:8899");

        let options = config.dispatch_options();
        assert_eq!(options.priority_fee, Some(1000));
        assert_eq!(options.retry_delay, Duration::from_millis(250));
        assert!(options.deadline.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.rpc.url, "http://127.0.0.1:8899");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.dispatch.retry_delay_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.programs.devnet = Some("xyz".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.commitment = "instant".to_string();
        assert!(config.validate().is_err());
    }
}
