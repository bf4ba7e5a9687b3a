// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log records as they enter the output, and the serialized form that is shipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::constants::{MAX_LOGGED_PAYLOAD_CHARS, UNSERIALIZABLE_PLACEHOLDER};

/// An application log event plus the identifier of where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    origin: String,
    data: Value,
}

impl Record {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// Builds a record from any serializable value.
    ///
    /// Values serde cannot represent (for example maps keyed by non-strings)
    /// become a placeholder string instead of failing the write.
    pub fn from_serializable<T: Serialize + ?Sized>(origin: impl Into<String>, data: &T) -> Self {
        let data = serde_json::to_value(data).unwrap_or_else(|e| {
            warn!("Record data could not be serialized, using placeholder: {e}");
            Value::String(UNSERIALIZABLE_PLACEHOLDER.to_string())
        });
        Self::new(origin, data)
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Canonical compact JSON of the record data.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.data)
            .unwrap_or_else(|_| format!("\"{UNSERIALIZABLE_PLACEHOLDER}\""))
    }
}

/// The form of a record actually transmitted to the destination.
///
/// The partition key is resolved once, when the record is written, and
/// travels with the data across every retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireRecord {
    pub data: String,
    pub partition_key: String,
}

impl WireRecord {
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len() + self.partition_key.len()
    }
}

/// Closed, bounded group of wire records ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub batch_id: String,
    pub records: Vec<WireRecord>,
    pub size_bytes: usize,
}

impl Batch {
    #[must_use]
    pub fn new(records: Vec<WireRecord>, size_bytes: usize) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            records,
            size_bytes,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Returns at most `MAX_LOGGED_PAYLOAD_CHARS` characters of `payload`.
#[must_use]
pub fn truncate_for_log(payload: &str) -> &str {
    match payload.char_indices().nth(MAX_LOGGED_PAYLOAD_CHARS) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}
