// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Output configuration.
//!
//! Configuration is read once at startup from an optional YAML file, then
//! from environment variables prefixed with `LOG_STREAMS_`, which take
//! precedence. Stream definitions and routes only come from the file; the
//! environment can override the top-level scalar settings
//! (`LOG_STREAMS_ENDPOINT`, `LOG_STREAMS_LOG_LEVEL`, ...).
//!
//! ```yaml
//! endpoint: "https://ingest.example.com/streams"
//! streams:
//!   - streamName: app-logs
//!     maxRecords: 250
//!     partitionKeyProperty: requestId
//!     originRules:
//!       - pattern: "^/var/log/nginx/"
//!         partitionKey: nginx
//! routes:
//!   - streamName: app-logs
//!     originPatterns: [".*"]
//! ```

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::buffer::BatchLimits;
use crate::constants::{
    DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_BACKOFF_MS,
    MAX_BATCH_RECORDS, MAX_BATCH_SIZE_BYTES,
};
use crate::errors::ConfigurationError;
use crate::partition::{KeyChain, OriginRule, PartitionKeyResolver};
use crate::retry::RetryBudget;

pub const ENV_PREFIX: &str = "LOG_STREAMS_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Partition key override for records from matching origins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OriginRuleConfig {
    pub pattern: String,
    pub partition_key: Option<String>,
    pub partition_key_property: Option<String>,
}

/// Raw settings of one stream, as written by the user.
///
/// Numeric limits are signed so that negative values reach validation and
/// get clamped with a warning instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamConfig {
    pub stream_name: Option<String>,
    pub max_records: Option<i64>,
    pub max_bytes: Option<i64>,
    pub max_retries: Option<i64>,
    #[serde(alias = "msFlushRate")]
    pub flush_interval_ms: Option<i64>,
    pub retry_backoff_ms: Option<u64>,
    pub partition_key: Option<String>,
    pub partition_key_property: Option<String>,
    pub origin_rules: Vec<OriginRuleConfig>,
}

/// Validated settings a stream service is built from.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub name: String,
    pub limits: BatchLimits,
    pub retry_budget: RetryBudget,
    /// `None` disables the periodic flush.
    pub flush_interval: Option<Duration>,
    pub retry_backoff: Duration,
    pub resolver: PartitionKeyResolver,
}

impl StreamConfig {
    /// Checks required fields and clamps out-of-range limits.
    ///
    /// Limits are clamped with a warning. A missing stream name or a retry
    /// budget outside `[0, 4]` is an error.
    pub fn validate(&self) -> Result<StreamSettings, ConfigurationError> {
        let name = self
            .stream_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ConfigurationError::MissingStreamName)?
            .to_string();

        let limits = BatchLimits {
            max_records: clamp_limit(&name, "maxRecords", self.max_records, MAX_BATCH_RECORDS),
            max_bytes: clamp_limit(&name, "maxBytes", self.max_bytes, MAX_BATCH_SIZE_BYTES),
        };

        let retry_budget = match self.max_retries {
            Some(value) => RetryBudget::new(&name, value)?,
            None => RetryBudget::default(),
        };

        let flush_interval_ms = match self.flush_interval_ms {
            None => DEFAULT_FLUSH_INTERVAL_MS,
            Some(value) => u64::try_from(value).unwrap_or_else(|_| {
                warn!(
                    stream = %name,
                    "STREAM | flushIntervalMs must not be negative, got {value}. Using {DEFAULT_FLUSH_INTERVAL_MS}"
                );
                DEFAULT_FLUSH_INTERVAL_MS
            }),
        };
        let flush_interval =
            (flush_interval_ms > 0).then_some(Duration::from_millis(flush_interval_ms));

        let origin_rules = self
            .origin_rules
            .iter()
            .map(|rule| {
                OriginRule::new(
                    &rule.pattern,
                    KeyChain::from_fields(
                        rule.partition_key.as_deref(),
                        rule.partition_key_property.as_deref(),
                    ),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let chain = KeyChain::from_fields(
            self.partition_key.as_deref(),
            self.partition_key_property.as_deref(),
        );

        Ok(StreamSettings {
            resolver: PartitionKeyResolver::new(name.clone(), chain, origin_rules),
            name,
            limits,
            retry_budget,
            flush_interval,
            retry_backoff: Duration::from_millis(
                self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            ),
        })
    }
}

/// `LOG_LEVEL` -> `logLevel`, matching the keys used in the file.
fn env_key_to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

fn clamp_limit(stream: &str, field: &str, value: Option<i64>, max: usize) -> usize {
    let Some(value) = value else {
        return max;
    };
    match usize::try_from(value) {
        Ok(v) if v > 0 && v <= max => v,
        _ => {
            warn!(
                stream,
                "STREAM | {field} must be within [1, {max}], got {value}. Using {max}"
            );
            max
        }
    }
}

/// Associates a stream with the origin patterns it receives records from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteConfig {
    pub stream_name: String,
    pub origin_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub streams: Vec<StreamConfig>,
    pub routes: Vec<RouteConfig>,
    pub endpoint: Option<String>,
    pub request_timeout_ms: u64,
    pub https_proxy: Option<String>,
    /// Flush partially filled buffers when the output stops.
    pub flush_on_shutdown: bool,
    pub log_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            routes: Vec::new(),
            endpoint: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            https_proxy: None,
            flush_on_shutdown: true,
            log_level: "info".to_string(),
        }
    }
}

impl OutputConfig {
    /// Loads the configuration from `path`, if given, then from the environment.
    ///
    /// A missing file is not an error; its settings keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .lowercase(false)
                    .map(|key| env_key_to_camel_case(key.as_str()).into()),
            )
            .extract()
            .map_err(|e| ConfigurationError::Load(e.to_string()))
    }

    /// Validates every stream and route. Returns the settings of each stream
    /// in configuration order.
    pub fn validate(&self) -> Result<Vec<StreamSettings>, ConfigurationError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigurationError::InvalidLogLevel(self.log_level.clone()));
        }

        let mut names = HashSet::new();
        let mut settings = Vec::with_capacity(self.streams.len());
        for stream in &self.streams {
            let validated = stream.validate()?;
            if !names.insert(validated.name.clone()) {
                return Err(ConfigurationError::DuplicateStream(validated.name));
            }
            settings.push(validated);
        }

        if let Some(route) = self.routes.iter().find(|r| !names.contains(&r.stream_name)) {
            return Err(ConfigurationError::UnknownStream(route.stream_name.clone()));
        }
        Ok(settings)
    }

    pub fn endpoint(&self) -> Result<&str, ConfigurationError> {
        self.endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(ConfigurationError::MissingEndpoint)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
