// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON-over-HTTP implementation of [`Destination`].
//!
//! Each submission is a single POST of
//! `{"StreamName": ..., "Records": [{"Data": ..., "PartitionKey": ...}]}`.
//! The endpoint answers with one result entry per record, in order; entries
//! carrying an `ErrorCode` are failed records.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::destination::{Destination, RecordOutcome, SubmitOutcome};
use crate::errors::{ConfigurationError, SubmitError};
use crate::record::WireRecord;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitRequest<'a> {
    stream_name: &'a str,
    records: &'a [WireRecord],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitResponse {
    #[serde(default)]
    failed_record_count: usize,
    #[serde(default)]
    records: Vec<SubmitResponseEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitResponseEntry {
    error_code: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpDestination {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDestination {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        https_proxy: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers);
        if let Some(proxy) = https_proxy {
            let proxy = reqwest::Proxy::https(proxy)
                .map_err(|e| ConfigurationError::Load(format!("Invalid HTTPS proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigurationError::Load(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Destination for HttpDestination {
    async fn submit(
        &self,
        stream_name: &str,
        records: &[WireRecord],
    ) -> Result<SubmitOutcome, SubmitError> {
        let body = SubmitRequest {
            stream_name,
            records,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;
        if !status.is_success() {
            error!(stream = stream_name, "HTTP | {status}: Failed to submit records");
            return Err(SubmitError::Status(status, text));
        }

        let parsed: SubmitResponse =
            serde_json::from_str(&text).map_err(|e| SubmitError::Decode(e.to_string()))?;
        if parsed.records.len() != records.len() {
            return Err(SubmitError::Decode(format!(
                "expected {} record results, got {}",
                records.len(),
                parsed.records.len()
            )));
        }

        let outcome = SubmitOutcome {
            records: parsed
                .records
                .into_iter()
                .map(|entry| match entry.error_code {
                    Some(error_code) => RecordOutcome::Failed {
                        error_code,
                        error_message: entry.error_message.unwrap_or_default(),
                    },
                    None => RecordOutcome::Accepted,
                })
                .collect(),
        };
        if outcome.failed_count() != parsed.failed_record_count {
            debug!(
                stream = stream_name,
                reported = parsed.failed_record_count,
                counted = outcome.failed_count(),
                "HTTP | Failed record count disagrees with per-record results"
            );
        }
        Ok(outcome)
    }
}
