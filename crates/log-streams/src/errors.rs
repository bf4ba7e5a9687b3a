// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Fatal errors raised while building streams and routes from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Required value \"streamName\" was not defined")]
    MissingStreamName,

    #[error("Stream \"{0}\" is configured more than once")]
    DuplicateStream(String),

    #[error("Max retries for stream \"{stream}\" must be within [0, {max}], got {value}")]
    RetryBudgetOutOfRange { stream: String, value: i64, max: u32 },

    #[error("Invalid pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Route references unknown stream \"{0}\"")]
    UnknownStream(String),

    #[error("Invalid log level \"{0}\". Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Required value \"endpoint\" was not defined")]
    MissingEndpoint,

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// A single record that exceeds the per-record size cap. It is dropped, never batched.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("Record data and partition key combined were {size_bytes} bytes, more than the {max_bytes} byte limit")]
pub struct OversizedRecord {
    pub size_bytes: usize,
    pub max_bytes: usize,
}

/// The submission call itself failed. Distinct from per-record failures,
/// which are reported inside a successful [`crate::destination::SubmitOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Destination responded with {0}: {1}")]
    Status(StatusCode, String),

    #[error("Failed to decode destination response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Output already started")]
    AlreadyStarted,

    #[error("Output not running")]
    NotRunning,

    #[error("Stream service \"{0}\" is no longer running")]
    ServiceUnavailable(String),
}
