// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for skein-core.
//!
//! Sink I/O failures surface here with the event type that was being routed;
//! protocol usage errors live in `skein-protocol`.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while routing lifecycle events.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// The durable recovery write for a critical event failed.
    ///
    /// This is sticky at the router (`has_recovery_failed` stays set) and
    /// propagated to the producing caller, which may treat it as job-fatal.
    RecoveryWriteFailed {
        /// Type of the event that failed to persist.
        event_type: String,
        /// Error details from the recovery sink.
        details: String,
    },

    /// The best-effort logging append for an event failed.
    ///
    /// Recorded for operational visibility and then swallowed; never
    /// propagated and never affects job progress.
    LoggingWriteFailed {
        /// Type of the event that failed to append.
        event_type: String,
        /// Error details from the logging sink.
        details: String,
    },
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RecoveryWriteFailed { .. } => "RECOVERY_WRITE_FAILED",
            Self::LoggingWriteFailed { .. } => "LOGGING_WRITE_FAILED",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecoveryWriteFailed {
                event_type,
                details,
            } => {
                write!(
                    f,
                    "Recovery write failed for '{}' event: {}",
                    event_type, details
                )
            }
            Self::LoggingWriteFailed {
                event_type,
                details,
            } => {
                write!(
                    f,
                    "Logging write failed for '{}' event: {}",
                    event_type, details
                )
            }
        }
    }
}

impl std::error::Error for CoreError {}
