//! Configuration for bounty-settlement.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Backoff strategy for transfer submission retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base * attempt`.
    #[default]
    Linear,
    /// `base * 2^(attempt-1)`, capped, with optional jitter.
    Exponential,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Payout settlement configuration.
    #[serde(default)]
    pub payout: PayoutConfig,

    /// Vulnerability registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Payment network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Durable storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Payout settlement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Treasury wallet paying out bounties.
    #[serde(default)]
    pub treasury_wallet: String,

    /// Token contract the bounty is paid in.
    #[serde(default)]
    pub token_address: String,

    /// Settlements allowed per auditor per hour.
    #[serde(default = "default_max_payouts_per_hour")]
    pub max_payouts_per_hour: u32,

    /// Upper bound on a single payout, in token units.
    #[serde(default = "default_max_single_bounty")]
    pub max_single_bounty: u64,

    /// Tokens the treasury may pay out per UTC day.
    #[serde(default = "default_daily_bounty_cap")]
    pub daily_bounty_cap: u64,

    /// Treat a failed balance query as "sufficient funds".
    #[serde(default = "default_true")]
    pub fail_open_on_balance_error: bool,

    /// Timeout for the proof verification call.
    #[serde(default = "default_query_timeout_ms")]
    pub verification_timeout_ms: u64,

    /// Timeout for the treasury balance query.
    #[serde(default = "default_query_timeout_ms")]
    pub balance_timeout_ms: u64,

    /// Timeout for a single transfer submission attempt.
    #[serde(default = "default_submission_timeout_ms")]
    pub submission_timeout_ms: u64,

    /// TTL of ledger lookups in the cache.
    #[serde(default = "default_ledger_cache_ttl_secs")]
    pub ledger_cache_ttl_secs: u64,

    /// Maximum cached ledger entries.
    #[serde(default = "default_ledger_cache_capacity")]
    pub ledger_cache_capacity: usize,

    /// Submission retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Delay growth between attempts.
    #[serde(default)]
    pub strategy: BackoffStrategy,

    /// Cap for exponential delays.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Random fraction added to exponential delays.
    #[serde(default)]
    pub jitter: f64,
}

/// Vulnerability registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// TTL of hash to record lookups.
    #[serde(default = "default_duplicate_cache_ttl_secs")]
    pub duplicate_cache_ttl_secs: u64,

    /// TTL of cached search results.
    #[serde(default = "default_search_cache_ttl_secs")]
    pub search_cache_ttl_secs: u64,

    /// TTL of cached statistics.
    #[serde(default = "default_statistics_cache_ttl_secs")]
    pub statistics_cache_ttl_secs: u64,

    /// Maximum entries in each registry cache.
    #[serde(default = "default_registry_cache_capacity")]
    pub cache_capacity: usize,

    /// Page size when a search names no limit.
    #[serde(default = "default_search_limit")]
    pub default_search_limit: usize,
}

/// Payment network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Base URL of the gasless transfer relayer.
    #[serde(default = "default_relayer_url")]
    pub relayer_url: String,

    /// Chain the transfers settle on.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Hex-encoded key used to sign transfer payloads.
    #[serde(default)]
    pub signing_key_hex: String,
}

/// Durable storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the ledger and registry files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            payout: PayoutConfig::default(),
            registry: RegistryConfig::default(),
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            treasury_wallet: String::new(),
            token_address: String::new(),
            max_payouts_per_hour: default_max_payouts_per_hour(),
            max_single_bounty: default_max_single_bounty(),
            daily_bounty_cap: default_daily_bounty_cap(),
            fail_open_on_balance_error: true,
            verification_timeout_ms: default_query_timeout_ms(),
            balance_timeout_ms: default_query_timeout_ms(),
            submission_timeout_ms: default_submission_timeout_ms(),
            ledger_cache_ttl_secs: default_ledger_cache_ttl_secs(),
            ledger_cache_capacity: default_ledger_cache_capacity(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            strategy: BackoffStrategy::default(),
            max_delay_ms: default_max_delay_ms(),
            jitter: 0.0,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            duplicate_cache_ttl_secs: default_duplicate_cache_ttl_secs(),
            search_cache_ttl_secs: default_search_cache_ttl_secs(),
            statistics_cache_ttl_secs: default_statistics_cache_ttl_secs(),
            cache_capacity: default_registry_cache_capacity(),
            default_search_limit: default_search_limit(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            relayer_url: default_relayer_url(),
            chain_id: default_chain_id(),
            signing_key_hex: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "bounty-settlement")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".bounty-settlement"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_relayer_url() -> String {
    "https://relayer.testnet.example".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_max_payouts_per_hour() -> u32 {
    10
}

const fn default_max_single_bounty() -> u64 {
    1_000
}

const fn default_daily_bounty_cap() -> u64 {
    10_000
}

const fn default_query_timeout_ms() -> u64 {
    15_000
}

const fn default_submission_timeout_ms() -> u64 {
    60_000
}

const fn default_ledger_cache_ttl_secs() -> u64 {
    300
}

const fn default_ledger_cache_capacity() -> usize {
    10_000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_duplicate_cache_ttl_secs() -> u64 {
    3_600
}

const fn default_search_cache_ttl_secs() -> u64 {
    60
}

const fn default_statistics_cache_ttl_secs() -> u64 {
    300
}

const fn default_registry_cache_capacity() -> usize {
    1_000
}

const fn default_search_limit() -> usize {
    100
}

const fn default_chain_id() -> u64 {
    1337 // local devnet
}

fn check_address(field: &str, value: &str, errors: &mut Vec<String>) {
    if value.is_empty() {
        errors.push(format!("{field} is not set"));
    } else if !value.starts_with("0x") {
        errors.push(format!("{field} must start with '0x': {value}"));
    } else if value.len() < 10 {
        errors.push(format!("{field} appears invalid (too short): {value}"));
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the configuration for problems. An empty list means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        check_address("payout.treasury_wallet", &self.payout.treasury_wallet, &mut errors);
        check_address("payout.token_address", &self.payout.token_address, &mut errors);

        let url = &self.network.relayer_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!("network.relayer_url must be an http(s) URL: {url}"));
        }
        if !self.network.signing_key_hex.is_empty()
            && hex::decode(&self.network.signing_key_hex).is_err()
        {
            errors.push("network.signing_key_hex is not valid hex".to_string());
        }
        if self.payout.retry.max_attempts == 0 {
            errors.push("payout.retry.max_attempts must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.payout.retry.jitter) {
            errors.push("payout.retry.jitter must be within [0, 1]".to_string());
        }
        if self.payout.max_payouts_per_hour == 0 {
            errors.push("payout.max_payouts_per_hour must be at least 1".to_string());
        }
        if self.payout.daily_bounty_cap == 0 {
            errors.push("payout.daily_bounty_cap must be at least 1".to_string());
        }

        errors
    }

    /// Path of the payout ledger file.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.storage.data_dir.join("payout_ledger.json")
    }

    /// Path of the vulnerability registry file.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.storage.data_dir.join("vulnerabilities.json")
    }
}

impl PayoutConfig {
    /// Verification call timeout.
    #[must_use]
    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    /// Balance query timeout.
    #[must_use]
    pub fn balance_timeout(&self) -> Duration {
        Duration::from_millis(self.balance_timeout_ms)
    }

    /// Per-attempt submission timeout.
    #[must_use]
    pub fn submission_timeout(&self) -> Duration {
        Duration::from_millis(self.submission_timeout_ms)
    }
}
