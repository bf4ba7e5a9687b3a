// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory destinations for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use log_streams::destination::{Destination, RecordOutcome, SubmitOutcome};
use log_streams::errors::SubmitError;
use log_streams::record::WireRecord;
use std::collections::HashMap;
use std::sync::Mutex;

/// Accepts every record and remembers each submitted batch per stream.
#[derive(Default)]
pub struct RecordingDestination {
    submissions: Mutex<Vec<(String, Vec<WireRecord>)>>,
}

impl RecordingDestination {
    pub fn submissions(&self) -> Vec<(String, Vec<WireRecord>)> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn batches_for(&self, stream: &str) -> Vec<Vec<WireRecord>> {
        self.submissions()
            .into_iter()
            .filter(|(name, _)| name == stream)
            .map(|(_, records)| records)
            .collect()
    }
}

#[async_trait]
impl Destination for RecordingDestination {
    async fn submit(
        &self,
        stream_name: &str,
        records: &[WireRecord],
    ) -> Result<SubmitOutcome, SubmitError> {
        self.submissions
            .lock()
            .unwrap()
            .push((stream_name.to_string(), records.to_vec()));
        Ok(SubmitOutcome::all_accepted(records.len()))
    }
}

/// Fails each record containing `marker` on its first `failures_per_record`
/// submissions, then accepts it. Other records are always accepted.
pub struct FlakyDestination {
    marker: String,
    failures_per_record: usize,
    seen: Mutex<HashMap<String, usize>>,
    submissions: Mutex<Vec<Vec<WireRecord>>>,
}

impl FlakyDestination {
    pub fn new(marker: &str, failures_per_record: usize) -> Self {
        Self {
            marker: marker.to_string(),
            failures_per_record,
            seen: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn submissions(&self) -> Vec<Vec<WireRecord>> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Destination for FlakyDestination {
    async fn submit(
        &self,
        _stream_name: &str,
        records: &[WireRecord],
    ) -> Result<SubmitOutcome, SubmitError> {
        self.submissions.lock().unwrap().push(records.to_vec());
        let mut seen = self.seen.lock().unwrap();
        let records = records
            .iter()
            .map(|record| {
                if !record.data.contains(&self.marker) {
                    return RecordOutcome::Accepted;
                }
                let count = seen.entry(record.data.clone()).or_insert(0);
                *count += 1;
                if *count <= self.failures_per_record {
                    RecordOutcome::Failed {
                        error_code: "InternalFailure".to_string(),
                        error_message: "try again".to_string(),
                    }
                } else {
                    RecordOutcome::Accepted
                }
            })
            .collect();
        Ok(SubmitOutcome { records })
    }
}
