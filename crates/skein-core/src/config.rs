// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use crate::history::HistoryLogLevel;

/// Skein Core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether recovery-critical events are written to the recovery sink.
    pub recovery_enabled: bool,
    /// Process-wide default verbosity threshold for the logging sink.
    pub history_log_level: HistoryLogLevel,
    /// Upper bound on inbound events returned by a single heartbeat.
    pub max_events_per_heartbeat: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `SKEIN_RECOVERY_ENABLED`: `true`/`false` (default: true)
    /// - `SKEIN_HISTORY_LOG_LEVEL`: one of `none`, `am`, `dag`, `task`, `all`
    ///   (default: all)
    /// - `SKEIN_MAX_EVENTS_PER_HEARTBEAT`: positive integer (default: 500)
    pub fn from_env() -> Result<Self, ConfigError> {
        let recovery_enabled: bool = std::env::var("SKEIN_RECOVERY_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("SKEIN_RECOVERY_ENABLED", "must be 'true' or 'false'")
            })?;

        let history_log_level: HistoryLogLevel = std::env::var("SKEIN_HISTORY_LOG_LEVEL")
            .unwrap_or_else(|_| "all".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "SKEIN_HISTORY_LOG_LEVEL",
                    "must be one of: none, am, dag, task, all",
                )
            })?;

        let max_events_per_heartbeat: usize = std::env::var("SKEIN_MAX_EVENTS_PER_HEARTBEAT")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "SKEIN_MAX_EVENTS_PER_HEARTBEAT",
                    "must be a positive integer",
                )
            })?;
        if max_events_per_heartbeat == 0 {
            return Err(ConfigError::Invalid(
                "SKEIN_MAX_EVENTS_PER_HEARTBEAT",
                "must be a positive integer",
            ));
        }

        Ok(Self {
            recovery_enabled,
            history_log_level,
            max_events_per_heartbeat,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recovery_enabled: true,
            history_log_level: HistoryLogLevel::All,
            max_events_per_heartbeat: 500,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
