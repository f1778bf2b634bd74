use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineKind;

const DEFAULT_TRIAL_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{key} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Knobs of the height search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub engine: EngineKind,
    /// Budget for each engine call; `None` waits forever.
    pub trial_timeout_ms: Option<u64>,
    /// Solve `H` and `H + 1` side by side.
    pub speculative: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            trial_timeout_ms: Some(DEFAULT_TRIAL_TIMEOUT_MS),
            speculative: false,
        }
    }
}

impl SolverConfig {
    pub fn trial_timeout(&self) -> Option<Duration> {
        self.trial_timeout_ms.map(Duration::from_millis)
    }

    /// Reads `ENGINE`, `TRIAL_TIMEOUT_MS` (0 disables the limit) and
    /// `SPECULATIVE`, keeping defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup("ENGINE") {
            config.engine = value.parse::<EngineKind>().map_err(|reason| ConfigError {
                key: "ENGINE",
                value: value.clone(),
                reason,
            })?;
        }
        if let Some(value) = lookup("TRIAL_TIMEOUT_MS") {
            let ms = value.parse::<u64>().map_err(|e| ConfigError {
                key: "TRIAL_TIMEOUT_MS",
                value: value.clone(),
                reason: e.to_string(),
            })?;
            config.trial_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(value) = lookup("SPECULATIVE") {
            config.speculative = match value.as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError {
                        key: "SPECULATIVE",
                        value,
                        reason: "expected true or false".to_string(),
                    });
                }
            };
        }
        Ok(config)
    }
}

/// Settings of the HTTP server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub sentry_dsn: Option<String>,
    pub solver: SolverConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(value) => value.parse::<u16>().map_err(|e| ConfigError {
                key: "PORT",
                value: value.clone(),
                reason: e.to_string(),
            })?,
            Err(_) => 3001,
        };
        Ok(Self {
            port,
            sentry_dsn: std::env::var("SENTRY_DSN").ok().filter(|s| !s.is_empty()),
            solver: SolverConfig::from_env()?,
        })
    }
}
