//! Configuration Module
//!
//! Loads and validates configuration from TOML files and keeps the current
//! settings available for late binding.

pub mod loader;
pub mod settings;

pub use loader::{
    load_config, parse_config, AiSection, Config, ConfigError, GeminiSection, LoggingSection, OpenAiSection,
    PacingSection, RetentionSection, RpcSection, SchedulerSection, SignalsSection, StorageSection, UpdaterSection,
};
pub use settings::SettingsHandle;
