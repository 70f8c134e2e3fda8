//! Configuration management for the feed voter
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::abi::CallVariant;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub voter: VoterConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoterConfig {
    pub candidate_id: String,
    pub target_country_id: String,
    #[serde(default)]
    pub wallet_id: String,
    #[serde(default = "default_feed_amount")]
    pub feed_amount: i64,
    #[serde(default)]
    pub call_variant: CallVariant,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_chain_name")]
    pub name: String,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub fee_mode: FeeMode,
    #[serde(default = "default_priority_fee_gwei")]
    pub priority_fee_gwei: u64,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeeMode {
    Legacy,
    #[default]
    Eip1559,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_feed_amount() -> i64 {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    5
}

fn default_chain_id() -> u64 {
    10143
}

fn default_chain_name() -> String {
    "monad-testnet".to_string()
}

fn default_rpc_url() -> String {
    "https://testnet-rpc.monad.xyz".to_string()
}

fn default_priority_fee_gwei() -> u64 {
    2
}

fn default_receipt_timeout_secs() -> u64 {
    300
}

fn default_receipt_poll_interval_ms() -> u64 {
    2000
}

fn default_api_base_url() -> String {
    "https://api.aicraft.fun".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_private_key_env() -> String {
    "PRIVATE_KEY".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            name: default_chain_name(),
            rpc_url: default_rpc_url(),
            fee_mode: FeeMode::default(),
            priority_fee_gwei: default_priority_fee_gwei(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
        }
    }
}

impl Settings {
    /// Load settings from `$FEED_VOTER_CONFIG` or `config/default.toml`
    pub fn load() -> Result<Self> {
        let config_path = env::var("FEED_VOTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.voter.candidate_id.trim().is_empty() {
            anyhow::bail!("voter.candidate_id is required");
        }
        if self.voter.target_country_id.trim().is_empty() {
            anyhow::bail!("voter.target_country_id is required");
        }
        if self.voter.feed_amount < 0 {
            anyhow::bail!("voter.feed_amount must not be negative");
        }
        if self.voter.max_attempts == 0 {
            anyhow::bail!("voter.max_attempts must be at least 1");
        }
        if self.chain.rpc_url.trim().is_empty() {
            anyhow::bail!("Chain {} has no RPC URL configured", self.chain.name);
        }
        if self.chain.receipt_timeout_secs == 0 || self.chain.receipt_poll_interval_ms == 0 {
            anyhow::bail!("Receipt timeout and poll interval must be positive");
        }
        if self.private_key().is_none() {
            anyhow::bail!("{} is required", self.wallet.private_key_env);
        }

        Ok(())
    }

    /// Private key from the configured environment variable, if set
    pub fn private_key(&self) -> Option<String> {
        env::var(&self.wallet.private_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
