// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Partition key resolution.
//!
//! A stream resolves a key for every record through an ordered chain of
//! strategies, first match wins:
//!
//! 1. an origin rule whose pattern matches the record's origin, which runs its
//!    own chain instead of the stream's,
//! 2. a named property extracted from the record,
//! 3. a static key,
//! 4. a freshly generated UUID v4.
//!
//! Every chain ends with the generated key, so resolution always yields a
//! non-empty string.

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::constants::UNDEFINED_PARTITION_KEY;
use crate::errors::ConfigurationError;
use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Use the value of a named top-level property of the record data.
    Property(String),
    /// Use this key for every record.
    Static(String),
    /// Generate a random UUID v4 per record.
    Generated,
}

/// Ordered list of strategies, always terminated by [`KeyStrategy::Generated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChain {
    strategies: Vec<KeyStrategy>,
}

impl Default for KeyChain {
    fn default() -> Self {
        Self {
            strategies: vec![KeyStrategy::Generated],
        }
    }
}

impl KeyChain {
    /// Builds a chain from the optional configured fields. Empty strings count as unset.
    #[must_use]
    pub fn from_fields(partition_key: Option<&str>, partition_key_property: Option<&str>) -> Self {
        let mut strategies = Vec::with_capacity(3);
        if let Some(property) = partition_key_property.filter(|p| !p.is_empty()) {
            strategies.push(KeyStrategy::Property(property.to_string()));
        }
        if let Some(key) = partition_key.filter(|k| !k.is_empty()) {
            strategies.push(KeyStrategy::Static(key.to_string()));
        }
        strategies.push(KeyStrategy::Generated);
        Self { strategies }
    }

    #[must_use]
    pub fn strategies(&self) -> &[KeyStrategy] {
        &self.strategies
    }

    // Property and static strategies always produce a key, so the head of the
    // chain decides.
    fn resolve(&self, stream: &str, record: &Record) -> String {
        match self.strategies.first() {
            Some(KeyStrategy::Property(property)) => extract_property(stream, property, record),
            Some(KeyStrategy::Static(key)) => key.clone(),
            Some(KeyStrategy::Generated) | None => uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// A per-origin override of the stream's key chain.
#[derive(Debug, Clone)]
pub struct OriginRule {
    pattern: Regex,
    chain: KeyChain,
}

impl OriginRule {
    pub fn new(pattern: &str, chain: KeyChain) -> Result<Self, ConfigurationError> {
        let pattern = Regex::new(pattern).map_err(|source| ConfigurationError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern, chain })
    }

    #[must_use]
    pub fn matches(&self, origin: &str) -> bool {
        self.pattern.is_match(origin)
    }
}

#[derive(Debug, Clone)]
pub struct PartitionKeyResolver {
    stream: String,
    origin_rules: Vec<OriginRule>,
    chain: KeyChain,
}

impl PartitionKeyResolver {
    #[must_use]
    pub fn new(stream: impl Into<String>, chain: KeyChain, origin_rules: Vec<OriginRule>) -> Self {
        Self {
            stream: stream.into(),
            origin_rules,
            chain,
        }
    }

    /// Returns the partition key for `record`. Never empty.
    #[must_use]
    pub fn resolve(&self, record: &Record) -> String {
        let chain = self
            .origin_rules
            .iter()
            .find(|rule| rule.matches(record.origin()))
            .map_or(&self.chain, |rule| &rule.chain);
        chain.resolve(&self.stream, record)
    }
}

fn extract_property(stream: &str, property: &str, record: &Record) -> String {
    let value = lookup(record.data(), property);
    match value {
        Some(Value::String(key)) if !key.is_empty() => key,
        Some(Value::String(_)) | None => {
            warn!(
                stream,
                partition_key_property = property,
                "BUFFER | The specified partitionKeyProperty was undefined"
            );
            UNDEFINED_PARTITION_KEY.to_string()
        }
        Some(other) => {
            warn!(
                stream,
                partition_key_property = property,
                "BUFFER | The retrieved partition key was not a string"
            );
            other.to_string()
        }
    }
}

// Record data that is itself a JSON-encoded string is searched after decoding.
fn lookup(data: &Value, property: &str) -> Option<Value> {
    match data {
        Value::Object(map) => map.get(property).cloned(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map.get(property).cloned(),
            _ => None,
        },
        _ => None,
    }
}
