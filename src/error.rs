// EcoWatch Simulator - Error types
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the simulator and its collaborators.
//!
//! Simulated failures (dropped messages, omitted readings, unsupported
//! sensor types) are never errors; see [`crate::payload::TickOutcome`].

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum SimError {
    /// IO error from a file-backed directory or sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV sink error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Sensor directory could not be read or seeded
    #[error("Sensor directory error: {0}")]
    Directory(String),

    /// Publisher refused a payload
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;
