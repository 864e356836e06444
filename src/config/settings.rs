//! Late-bound settings
//!
//! The scheduler refreshes the handle at the start of every tick. Stages work
//! from the `Arc<Config>` snapshot taken at that moment, so a file edit takes
//! effect on the next tick without a restart.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::loader::{load_config, Config, ConfigError};

#[derive(Debug)]
pub struct SettingsHandle {
    /// `None` for fixed in-memory settings
    path: Option<PathBuf>,
    current: RwLock<Arc<Config>>,
}

impl SettingsHandle {
    /// Load the file once; later refreshes re-read the same path
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let config = load_config(&path)?;
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Settings that never change
    pub fn fixed(config: Config) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn current(&self) -> Arc<Config> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Re-read the file. A read, parse or validation failure keeps the
    /// previous configuration.
    pub fn refresh(&self) -> Arc<Config> {
        let Some(path) = &self.path else {
            return self.current();
        };

        match load_config(path) {
            Ok(config) => {
                let config = Arc::new(config);
                let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
                *guard = Arc::clone(&config);
                debug!("[CONFIG] Reloaded {}", path.display());
                config
            }
            Err(e) => {
                warn!("[CONFIG] Keeping previous settings, reload of {} failed: {}", path.display(), e);
                self.current()
            }
        }
    }
}
