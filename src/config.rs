use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    pub api: ApiConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub paper_trading: PaperTradingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub dry_run: bool,
    pub journal_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Tried in order until one answers the liveness probe.
    pub rpc_endpoints: Vec<String>,
    pub treasury_wallet: String,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
    #[serde(default = "default_confirm_attempts")]
    pub confirm_attempts: u32,
    #[serde(default = "default_confirm_interval")]
    pub confirm_interval_ms: u64,
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_wallet_wait_attempts")]
    pub wallet_wait_attempts: u32,
    #[serde(default = "default_wallet_wait_interval")]
    pub wallet_wait_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub charts: bool,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_log_path")]
    pub csv_log_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperTradingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_balance")]
    pub initial_balance_sol: f64,
    /// Chance that a submitted transfer confirms.
    #[serde(default = "default_confirm_rate")]
    pub confirm_rate: f64,
    /// Chance that the simulated wallet declines a request.
    #[serde(default)]
    pub reject_rate: f64,
    #[serde(default = "default_paper_address")]
    pub address: String,
    /// When false the simulated RPC fails its liveness check and balance reads.
    #[serde(default = "default_true")]
    pub rpc_reachable: bool,
}

fn default_request_timeout() -> u64 { 10 }
fn default_rpc_timeout() -> u64 { 8 }
fn default_confirm_attempts() -> u32 { 20 }
fn default_confirm_interval() -> u64 { 500 }
fn default_explorer_url() -> String { "https://explorer.solana.com".to_string() }
fn default_refresh_interval() -> u64 { 30 }
fn default_wallet_wait_attempts() -> u32 { 30 }
fn default_wallet_wait_interval() -> u64 { 200 }
fn default_true() -> bool { true }
fn default_history_limit() -> usize { 10 }
fn default_csv_log_path() -> String { "bets.csv".to_string() }
fn default_balance() -> f64 { 5.0 }
fn default_confirm_rate() -> f64 { 0.90 }
fn default_paper_address() -> String { "PaperWa11et1111111111111111111111111111111".to_string() }

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            wallet_wait_attempts: default_wallet_wait_attempts(),
            wallet_wait_interval_ms: default_wallet_wait_interval(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            csv_logging: false,
            csv_log_path: default_csv_log_path(),
        }
    }
}

impl Default for PaperTradingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_balance_sol: default_balance(),
            confirm_rate: default_confirm_rate(),
            reject_rate: 0.0,
            address: default_paper_address(),
            rpc_reachable: true,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            charts: true,
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub market_api_url: Option<String>,
    pub solana_rpc_url: Option<String>,
    pub treasury_wallet: Option<String>,
    pub dry_run: Option<bool>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Environment values win over the file.
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.market_api_url {
            self.api.base_url = url.clone();
        }
        if let Some(url) = &env.solana_rpc_url {
            self.chain.rpc_endpoints.retain(|e| e != url);
            self.chain.rpc_endpoints.insert(0, url.clone());
        }
        if let Some(treasury) = &env.treasury_wallet {
            self.chain.treasury_wallet = treasury.clone();
        }
        if let Some(dry_run) = env.dry_run {
            self.system.dry_run = dry_run;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_address(&self.chain.treasury_wallet) {
            anyhow::bail!("Invalid treasury wallet address: {}", self.chain.treasury_wallet);
        }
        if self.chain.rpc_endpoints.is_empty() {
            anyhow::bail!("At least one RPC endpoint is required");
        }
        if self.polling.refresh_interval_secs == 0 {
            anyhow::bail!("polling.refresh_interval_secs must be positive");
        }
        for (name, rate) in [
            ("confirm_rate", self.paper_trading.confirm_rate),
            ("reject_rate", self.paper_trading.reject_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                anyhow::bail!("paper_trading.{} must be within [0, 1], got {}", name, rate);
            }
        }
        Ok(())
    }
}

/// Base58 public key, 32 to 44 characters.
pub fn is_valid_address(address: &str) -> bool {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("static regex is valid")
        })
        .is_match(address)
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let dry_run = match std::env::var("DRY_RUN") {
            Ok(v) => Some(
                v.parse::<bool>()
                    .with_context(|| format!("DRY_RUN must be true or false, got {}", v))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            market_api_url: std::env::var("MARKET_API_URL").ok(),
            solana_rpc_url: std::env::var("SOLANA_RPC_URL").ok(),
            treasury_wallet: std::env::var("TREASURY_WALLET").ok(),
            dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [system]
        dry_run = true
        journal_path = "journal.db"

        [api]
        base_url = "https://api.example.com/api"

        [chain]
        rpc_endpoints = ["https://rpc-a.example.com", "https://rpc-b.example.com"]
        treasury_wallet = "3SgkeKqYFhJy7YA2yVdaJEcZxtHqX68DesouKH4A6evm"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.polling.refresh_interval_secs, 30);
        assert_eq!(config.polling.wallet_wait_attempts, 30);
        assert_eq!(config.display.history_limit, 10);
        assert!(config.display.charts);
        assert!(!config.paper_trading.enabled);
        assert_eq!(config.paper_trading.confirm_rate, 0.90);
        assert!(config.paper_trading.rpc_reachable);
        assert_eq!(config.monitoring.csv_log_path, "bets.csv");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_rpc_url_is_tried_first() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        let env = EnvConfig {
            solana_rpc_url: Some("https://rpc-b.example.com".to_string()),
            dry_run: Some(false),
            ..Default::default()
        };

        config.apply_env(&env);

        assert_eq!(
            config.chain.rpc_endpoints,
            vec!["https://rpc-b.example.com", "https://rpc-a.example.com"]
        );
        assert!(!config.system.dry_run);
    }

    #[test]
    fn test_invalid_treasury_rejected() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.chain.treasury_wallet = "0xNotBase58".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_pattern() {
        assert!(is_valid_address("3SgkeKqYFhJy7YA2yVdaJEcZxtHqX68DesouKH4A6evm"));
        assert!(!is_valid_address("short"));
        assert!(!is_valid_address("3SgkeKqYFhJy7YA2yVdaJEcZxtHqX68DesouKH4A6ev0"));
    }
}
