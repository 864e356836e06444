//! Configuration Loader
//!
//! Loads and validates the engine configuration from a TOML file. Every field
//! carries a default, so an empty file is a valid configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::signal::SignalThresholds;
use crate::ports::store::RetentionPolicy;

/// Main configuration structure matching oracle.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub signals: SignalsSection,
    #[serde(default)]
    pub updater: UpdaterSection,
    #[serde(default)]
    pub pacing: PacingSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub rpc: RpcSection,
    #[serde(default)]
    pub retention: RetentionSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

fn default_tick_period_secs() -> u64 {
    30
}
fn default_min_tick_gap_secs() -> u64 {
    25
}
fn default_ai_gate_secs() -> u64 {
    60
}
fn default_cleanup_period_secs() -> u64 {
    60
}
fn default_restart_backoff_secs() -> u64 {
    3
}

/// Tick cadence and supervision
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_tick_period_secs")]
    pub tick_period_secs: u64,
    /// A tick never starts sooner than this after the previous start
    #[serde(default = "default_min_tick_gap_secs")]
    pub min_tick_gap_secs: u64,
    /// Minimum spacing between AI escalation runs
    #[serde(default = "default_ai_gate_secs")]
    pub ai_gate_secs: u64,
    #[serde(default = "default_cleanup_period_secs")]
    pub cleanup_period_secs: u64,
    #[serde(default = "default_restart_backoff_secs")]
    pub restart_backoff_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_period_secs: default_tick_period_secs(),
            min_tick_gap_secs: default_min_tick_gap_secs(),
            ai_gate_secs: default_ai_gate_secs(),
            cleanup_period_secs: default_cleanup_period_secs(),
            restart_backoff_secs: default_restart_backoff_secs(),
        }
    }
}

impl SchedulerSection {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_period_secs)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_secs(self.restart_backoff_secs)
    }

    pub fn cleanup_period(&self) -> Duration {
        Duration::from_secs(self.cleanup_period_secs)
    }
}

fn default_stop_loss_pct() -> Decimal {
    dec!(-0.25)
}
fn default_tp1_pct() -> Decimal {
    dec!(0.35)
}
fn default_tp2_pct() -> Decimal {
    dec!(1.0)
}
fn default_tp3_pct() -> Decimal {
    dec!(2.5)
}
fn default_max_hold_minutes() -> i64 {
    90
}
fn default_no_new_high_minutes() -> i64 {
    45
}
fn default_no_new_high_drop_ratio() -> Decimal {
    dec!(0.9)
}

/// Signal exit thresholds; percentages are fractions of the entry market cap
#[derive(Debug, Clone, Deserialize)]
pub struct SignalsSection {
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    #[serde(default = "default_tp1_pct")]
    pub tp1_pct: Decimal,
    #[serde(default = "default_tp2_pct")]
    pub tp2_pct: Decimal,
    #[serde(default = "default_tp3_pct")]
    pub tp3_pct: Decimal,
    #[serde(default = "default_max_hold_minutes")]
    pub max_hold_minutes: i64,
    #[serde(default = "default_no_new_high_minutes")]
    pub no_new_high_minutes: i64,
    #[serde(default = "default_no_new_high_drop_ratio")]
    pub no_new_high_drop_ratio: Decimal,
}

impl Default for SignalsSection {
    fn default() -> Self {
        Self {
            stop_loss_pct: default_stop_loss_pct(),
            tp1_pct: default_tp1_pct(),
            tp2_pct: default_tp2_pct(),
            tp3_pct: default_tp3_pct(),
            max_hold_minutes: default_max_hold_minutes(),
            no_new_high_minutes: default_no_new_high_minutes(),
            no_new_high_drop_ratio: default_no_new_high_drop_ratio(),
        }
    }
}

impl From<&SignalsSection> for SignalThresholds {
    fn from(section: &SignalsSection) -> Self {
        SignalThresholds {
            stop_loss_pct: section.stop_loss_pct,
            tp1_pct: section.tp1_pct,
            tp2_pct: section.tp2_pct,
            tp3_pct: section.tp3_pct,
            max_hold_minutes: section.max_hold_minutes,
            no_new_high_minutes: section.no_new_high_minutes,
            no_new_high_drop_ratio: section.no_new_high_drop_ratio,
        }
    }
}

fn default_floor() -> f64 {
    100_000.0
}
fn default_stale_after_secs() -> u64 {
    60
}
fn default_holder_refresh_secs() -> u64 {
    300
}
fn default_token_pacing_ms() -> u64 {
    300
}
fn default_http_timeout_secs() -> u64 {
    10
}

/// Market refresh of active tokens
#[derive(Debug, Clone, Deserialize)]
pub struct UpdaterSection {
    /// Tokens below this market cap are marked dead
    #[serde(default = "default_floor")]
    pub market_cap_floor: f64,
    /// Tokens below this 24h volume are marked dead
    #[serde(default = "default_floor")]
    pub volume_floor: f64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_holder_refresh_secs")]
    pub holder_refresh_secs: u64,
    /// Spacing between market-data requests
    #[serde(default = "default_token_pacing_ms")]
    pub token_pacing_ms: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for UpdaterSection {
    fn default() -> Self {
        Self {
            market_cap_floor: default_floor(),
            volume_floor: default_floor(),
            stale_after_secs: default_stale_after_secs(),
            holder_refresh_secs: default_holder_refresh_secs(),
            token_pacing_ms: default_token_pacing_ms(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl UpdaterSection {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn default_candle_batch_size() -> usize {
    20
}
fn default_candle_batch_pause_ms() -> u64 {
    100
}
fn default_candle_batch_pause_4h_ms() -> u64 {
    150
}
fn default_rpc_spacing_ms() -> u64 {
    500
}
fn default_ai_provider_gap_ms() -> u64 {
    1_000
}
fn default_ai_token_gap_ms() -> u64 {
    2_000
}

/// Spacing between external calls and stage batches
#[derive(Debug, Clone, Deserialize)]
pub struct PacingSection {
    #[serde(default = "default_candle_batch_size")]
    pub candle_batch_size: usize,
    /// Pause between 15m and 1h candle batches
    #[serde(default = "default_candle_batch_pause_ms")]
    pub candle_batch_pause_ms: u64,
    #[serde(default = "default_candle_batch_pause_4h_ms")]
    pub candle_batch_pause_4h_ms: u64,
    #[serde(default = "default_rpc_spacing_ms")]
    pub rpc_spacing_ms: u64,
    #[serde(default = "default_ai_provider_gap_ms")]
    pub ai_provider_gap_ms: u64,
    #[serde(default = "default_ai_token_gap_ms")]
    pub ai_token_gap_ms: u64,
    /// Optional requests-per-minute caps per AI provider
    #[serde(default)]
    pub openai_rpm: Option<u32>,
    #[serde(default)]
    pub gemini_rpm: Option<u32>,
}

impl Default for PacingSection {
    fn default() -> Self {
        Self {
            candle_batch_size: default_candle_batch_size(),
            candle_batch_pause_ms: default_candle_batch_pause_ms(),
            candle_batch_pause_4h_ms: default_candle_batch_pause_4h_ms(),
            rpc_spacing_ms: default_rpc_spacing_ms(),
            ai_provider_gap_ms: default_ai_provider_gap_ms(),
            ai_token_gap_ms: default_ai_token_gap_ms(),
            openai_rpm: None,
            gemini_rpm: None,
        }
    }
}

fn default_recheck_interval_secs() -> u64 {
    180
}
fn default_max_tokens_per_run() -> usize {
    5
}
fn default_run_budget_secs() -> u64 {
    30
}
fn default_ai_min_volume() -> f64 {
    100_000.0
}
fn default_min_history_rows() -> usize {
    100
}
fn default_history_len() -> usize {
    5
}

/// AI escalation
#[derive(Debug, Clone, Deserialize)]
pub struct AiSection {
    #[serde(default = "default_recheck_interval_secs")]
    pub recheck_interval_secs: u64,
    #[serde(default = "default_max_tokens_per_run")]
    pub max_tokens_per_run: usize,
    /// Wall-clock budget of one scheduled run
    #[serde(default = "default_run_budget_secs")]
    pub run_budget_secs: u64,
    #[serde(default = "default_ai_min_volume")]
    pub min_volume: f64,
    #[serde(default = "default_min_history_rows")]
    pub min_snapshots: usize,
    #[serde(default = "default_min_history_rows")]
    pub min_candles: usize,
    /// Past decisions sent with on-demand requests
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub gemini: GeminiSection,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            recheck_interval_secs: default_recheck_interval_secs(),
            max_tokens_per_run: default_max_tokens_per_run(),
            run_budget_secs: default_run_budget_secs(),
            min_volume: default_ai_min_volume(),
            min_snapshots: default_min_history_rows(),
            min_candles: default_min_history_rows(),
            history_len: default_history_len(),
            openai: OpenAiSection::default(),
            gemini: GeminiSection::default(),
        }
    }
}

impl AiSection {
    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_ai_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSection {
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Momentum prompt; calls fail with a configuration error while empty
    #[serde(default)]
    pub prompt: String,
    /// Used only when `OPENAI_API_KEY` is unset
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            endpoint: default_openai_endpoint(),
            model: default_openai_model(),
            temperature: default_temperature(),
            prompt: String::new(),
            api_key: None,
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

impl OpenAiSection {
    /// Get API key, checking OPENAI_API_KEY before the config value
    pub fn get_api_key(&self) -> Option<String> {
        env_or(&["OPENAI_API_KEY"], self.api_key.as_deref())
    }
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_max_output_tokens() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSection {
    /// API base; the model path is appended per call
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiSection {
    fn default() -> Self {
        Self {
            endpoint: default_gemini_endpoint(),
            model: default_gemini_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            prompt: String::new(),
            api_key: None,
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

impl GeminiSection {
    /// Get API key, checking GEMINI_API_KEY before the config value
    pub fn get_api_key(&self) -> Option<String> {
        env_or(&["GEMINI_API_KEY"], self.api_key.as_deref())
    }
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}
fn default_commitment() -> String {
    "confirmed".to_string()
}

/// Solana RPC used for holder estimates
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    #[serde(default = "default_rpc_url")]
    pub url: String,
    /// Commitment level: "processed", "confirmed", "finalized"
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
        }
    }
}

impl RpcSection {
    /// Get RPC URL with environment variable override
    /// Checks SOLANA_RPC_URL env var first, falls back to config value
    pub fn get_rpc_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.url.clone())
    }
}

fn default_snapshots_per_token() -> usize {
    10_000
}
fn default_candles_per_timeframe() -> usize {
    500
}
fn default_ai_decisions_per_token() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSection {
    #[serde(default = "default_snapshots_per_token")]
    pub snapshots_per_token: usize,
    #[serde(default = "default_candles_per_timeframe")]
    pub candles_per_timeframe: usize,
    #[serde(default = "default_ai_decisions_per_token")]
    pub ai_decisions_per_token: usize,
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self {
            snapshots_per_token: default_snapshots_per_token(),
            candles_per_timeframe: default_candles_per_timeframe(),
            ai_decisions_per_token: default_ai_decisions_per_token(),
        }
    }
}

impl From<&RetentionSection> for RetentionPolicy {
    fn from(section: &RetentionSection) -> Self {
        RetentionPolicy {
            snapshots_per_token: section.snapshots_per_token,
            candles_per_timeframe: section.candles_per_timeframe,
            ai_decisions_per_token: section.ai_decisions_per_token,
        }
    }
}

fn default_storage_path() -> String {
    "~/.pulse-oracle/oracle.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

impl StorageSection {
    /// Database path with `~` and environment variables expanded
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        shellexpand::full(&self.path)
            .map(|p| PathBuf::from(p.as_ref()))
            .map_err(|e| ConfigError::ValidationError(format!("storage.path: {}", e)))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn env_or(vars: &[&str], fallback: Option<&str>) -> Option<String> {
    vars.iter()
        .filter_map(|v| std::env::var(v).ok())
        .find(|v| !v.is_empty())
        .or_else(|| fallback.filter(|v| !v.is_empty()).map(str::to_string))
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}

impl Config {
    pub fn signal_thresholds(&self) -> SignalThresholds {
        SignalThresholds::from(&self.signals)
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::from(&self.retention)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.signals;

        if s.stop_loss_pct >= Decimal::ZERO || s.stop_loss_pct <= dec!(-1) {
            return Err(invalid(format!("stop_loss_pct must be in (-1, 0), got {}", s.stop_loss_pct)));
        }
        if s.tp1_pct <= Decimal::ZERO {
            return Err(invalid(format!("tp1_pct must be > 0, got {}", s.tp1_pct)));
        }
        if s.tp1_pct >= s.tp2_pct || s.tp2_pct >= s.tp3_pct {
            return Err(invalid(format!(
                "take-profit levels must increase, got {} / {} / {}",
                s.tp1_pct, s.tp2_pct, s.tp3_pct
            )));
        }
        if s.max_hold_minutes <= 0 || s.no_new_high_minutes <= 0 {
            return Err(invalid("hold windows must be > 0 minutes".to_string()));
        }
        if s.no_new_high_drop_ratio <= Decimal::ZERO || s.no_new_high_drop_ratio > Decimal::ONE {
            return Err(invalid(format!(
                "no_new_high_drop_ratio must be in (0, 1], got {}",
                s.no_new_high_drop_ratio
            )));
        }

        if self.scheduler.tick_period_secs == 0 {
            return Err(invalid("tick_period_secs must be > 0".to_string()));
        }
        if self.scheduler.cleanup_period_secs == 0 {
            return Err(invalid("cleanup_period_secs must be > 0".to_string()));
        }

        if self.updater.market_cap_floor < 0.0 || self.updater.volume_floor < 0.0 {
            return Err(invalid("dead-token floors must be >= 0".to_string()));
        }
        if self.pacing.candle_batch_size == 0 {
            return Err(invalid("candle_batch_size must be > 0".to_string()));
        }
        if self.pacing.openai_rpm == Some(0) || self.pacing.gemini_rpm == Some(0) {
            return Err(invalid("provider rpm caps must be > 0 when set".to_string()));
        }

        if self.ai.max_tokens_per_run == 0 {
            return Err(invalid("max_tokens_per_run must be > 0".to_string()));
        }
        for (name, t) in [("openai", self.ai.openai.temperature), ("gemini", self.ai.gemini.temperature)] {
            if !(0.0..=2.0).contains(&t) {
                return Err(invalid(format!("{} temperature must be 0-2, got {}", name, t)));
            }
        }

        if self.rpc.url.is_empty() {
            return Err(invalid("rpc url cannot be empty".to_string()));
        }
        if !matches!(self.rpc.commitment.as_str(), "processed" | "confirmed" | "finalized") {
            return Err(invalid(format!("unknown commitment '{}'", self.rpc.commitment)));
        }

        let r = &self.retention;
        if r.snapshots_per_token == 0 || r.candles_per_timeframe == 0 || r.ai_decisions_per_token == 0 {
            return Err(invalid("retention limits must be > 0".to_string()));
        }

        if self.storage.path.is_empty() {
            return Err(invalid("storage path cannot be empty".to_string()));
        }
        if !matches!(self.logging.level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            return Err(invalid(format!("unknown log level '{}'", self.logging.level)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.scheduler.tick_period_secs, 30);
        assert_eq!(config.scheduler.min_tick_gap_secs, 25);
        assert_eq!(config.updater.market_cap_floor, 100_000.0);
        assert_eq!(config.pacing.rpc_spacing_ms, 500);
        assert_eq!(config.ai.max_tokens_per_run, 5);
        assert_eq!(config.ai.openai.model, "gpt-4o-mini");
        assert_eq!(config.ai.gemini.max_output_tokens, 20);
        assert_eq!(config.retention_policy(), RetentionPolicy::default());
        assert_eq!(config.signal_thresholds(), SignalThresholds::default());
    }

    #[test]
    fn test_signal_overrides_keep_other_defaults() {
        let file = write_config(
            r#"
[signals]
stop_loss_pct = -0.2
tp1_pct = 0.5
max_hold_minutes = 120
"#,
        );
        let config = load_config(file.path()).unwrap();
        let thresholds = config.signal_thresholds();

        assert_eq!(thresholds.stop_loss_pct, dec!(-0.2));
        assert_eq!(thresholds.tp1_pct, dec!(0.5));
        assert_eq!(thresholds.tp2_pct, dec!(1.0));
        assert_eq!(thresholds.max_hold_minutes, 120);
        assert_eq!(config.ai.recheck_interval_secs, 180);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/oracle.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_non_negative_stop_loss_rejected() {
        let result = parse_config("[signals]\nstop_loss_pct = 0.1\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_unordered_take_profits_rejected() {
        let result = parse_config("[signals]\ntp1_pct = 1.5\ntp2_pct = 1.0\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_bad_commitment_rejected() {
        let result = parse_config("[rpc]\ncommitment = \"instant\"\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let result = parse_config("[scheduler\ntick_period_secs = 30");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_config_api_key_fallback() {
        let section = OpenAiSection {
            api_key: Some("sk-config".to_string()),
            ..Default::default()
        };
        // The env var wins when present; the config value otherwise
        let expected = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "sk-config".to_string());
        assert_eq!(section.get_api_key(), Some(expected));

        let empty = GeminiSection { api_key: Some(String::new()), ..Default::default() };
        if std::env::var("GEMINI_API_KEY").map_or(true, |v| v.is_empty()) {
            assert_eq!(empty.get_api_key(), None);
        }
    }

    #[test]
    fn test_storage_path_expands_home() {
        let section = StorageSection { path: "~/data/oracle.db".to_string() };
        let resolved = section.resolved_path().unwrap();
        assert!(!resolved.to_string_lossy().starts_with('~'));
        assert!(resolved.ends_with("data/oracle.db"));
    }
}
