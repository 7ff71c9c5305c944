//! Engine configuration.
//!
//! Configuration can be built in code or loaded from a TOML file:
//!
//! ```toml
//! max_threads = 4
//! progress_step = 5
//! thread_name_prefix = "pixelfx-worker"
//! ```

use crate::core::error::{FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the filter engine's worker pool and progress reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of worker threads (0 = hardware concurrency).
    pub max_threads: usize,
    /// Minimum percentage advance before a progress update is emitted.
    pub progress_step: u32,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_threads: 0,
            progress_step: 5,
            thread_name_prefix: "pixelfx-worker".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum threads.
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = max;
        self
    }

    /// Set the progress coalescing step.
    pub fn with_progress_step(mut self, step: u32) -> Self {
        self.progress_step = step;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Number of threads the pool will actually use.
    pub fn effective_threads(&self) -> usize {
        if self.max_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.max_threads
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> FilterResult<()> {
        if self.progress_step == 0 || self.progress_step > 100 {
            return Err(FilterError::Settings(format!(
                "progress_step must be between 1 and 100, got {}",
                self.progress_step
            )));
        }
        Ok(())
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> FilterResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| FilterError::Settings(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> FilterResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> FilterResult<String> {
        toml::to_string(self).map_err(|e| FilterError::Settings(e.to_string()))
    }
}
