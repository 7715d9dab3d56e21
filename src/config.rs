//! Runtime configuration.
//!
//! Settings come from an optional TOML file; every key has a default so an
//! empty file, or no file at all, yields a usable configuration.
//!
//! ```
//! use timetable_solver::config::{AppConfig, SolverBackend};
//!
//! let config = AppConfig::from_toml_str(r#"
//!     [solver]
//!     backend = "backtracking"
//!     time_limit_secs = 10
//!
//!     [week]
//!     days = 6
//! "#).unwrap();
//!
//! assert_eq!(config.solver.backend, SolverBackend::Backtracking);
//! assert_eq!(config.week.days, 6);
//! assert_eq!(config.model.consecutive_weight, 3);
//! ```

use crate::data::DAYS_RANGE;
use crate::model::{ModelOptions, RUN_WINDOW};
use crate::solver::{CancelToken, SearchBudget};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Filter passed to `env_logger` unless `RUST_LOG` is set.
    pub log_level: String,
    pub server: ServerConfig,
    pub solver: SolverSettings,
    pub week: WeekSettings,
    pub model: ModelOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig::default(),
            solver: SolverSettings::default(),
            week: WeekSettings::default(),
            model: ModelOptions::default(),
        }
    }
}

impl AppConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !DAYS_RANGE.contains(&self.week.days) {
            return Err(ConfigError::Invalid(format!(
                "week.days must be between 1 and 7, got {}",
                self.week.days
            )));
        }
        let limit = self.model.run_window_limit;
        if limit == 0 || limit as usize >= RUN_WINDOW {
            return Err(ConfigError::Invalid(format!(
                "model.run_window_limit must be 1 or 2, got {limit}"
            )));
        }
        if self.solver.time_limit_secs == 0 {
            return Err(ConfigError::Invalid(
                "solver.time_limit_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Search limits for one solve, tied to `cancel`.
    pub fn budget(&self, cancel: CancelToken) -> SearchBudget {
        let budget = SearchBudget::unlimited()
            .with_time_limit(self.solver.time_limit())
            .with_cancel(cancel);
        match self.solver.node_limit {
            Some(limit) => budget.with_node_limit(limit),
            None => budget,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SolverBackend {
    /// Integer program solved by HiGHS.
    #[default]
    Milp,
    /// Depth-first branch and bound in pure Rust.
    Backtracking,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverSettings {
    pub backend: SolverBackend,
    pub time_limit_secs: u64,
    /// Search nodes after which the backtracking engine gives up.
    pub node_limit: Option<u64>,
    pub threads: u32,
    pub random_seed: u32,
    /// Let HiGHS print its own log to the console.
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            backend: SolverBackend::Milp,
            time_limit_secs: 30,
            node_limit: None,
            threads: 1,
            random_seed: 1234,
            verbose: false,
        }
    }
}

impl SolverSettings {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WeekSettings {
    pub days: u32,
}

impl Default for WeekSettings {
    fn default() -> Self {
        Self {
            days: crate::data::DEFAULT_DAYS,
        }
    }
}
