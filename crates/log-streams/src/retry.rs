// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of a batch with bounded, per-record retry.
//!
//! Each attempt submits the records still pending. Records the destination
//! accepts are final and never sent again; only the failed subset is
//! resubmitted, in its original serialized form, for at most `max_retries`
//! further attempts (`max_retries + 1` submissions in total).
//!
//! A call that fails outright is terminal for the batch: nothing is known
//! about the individual records, so they are reported and dropped rather
//! than blindly resent.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::constants::{DEFAULT_MAX_RETRIES, MAX_RETRIES_CEILING};
use crate::destination::{Destination, RecordOutcome, SubmitOutcome};
use crate::errors::ConfigurationError;
use crate::record::{truncate_for_log, Batch, WireRecord};

const MISSING_RESULT_ERROR_CODE: &str = "MissingResult";

/// Number of resubmissions allowed after the first attempt, within `[0, 4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget(u32);

impl Default for RetryBudget {
    fn default() -> Self {
        Self(DEFAULT_MAX_RETRIES)
    }
}

impl RetryBudget {
    /// Out-of-range budgets are rejected, never clamped.
    pub fn new(stream: &str, max_retries: i64) -> Result<Self, ConfigurationError> {
        match u32::try_from(max_retries) {
            Ok(value) if value <= MAX_RETRIES_CEILING => Ok(Self(value)),
            _ => Err(ConfigurationError::RetryBudgetOutOfRange {
                stream: stream.to_string(),
                value: max_retries,
                max: MAX_RETRIES_CEILING,
            }),
        }
    }

    #[must_use]
    pub fn max_retries(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn max_attempts(self) -> u32 {
        self.0 + 1
    }
}

/// How a batch delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReport {
    /// Every record was accepted.
    Delivered { attempts: u32 },
    /// Records still failed after the last allowed attempt and were dropped.
    Abandoned { attempts: u32, dropped: usize },
    /// A submission call failed outright; its records were dropped.
    TransportFailed { attempts: u32, unresolved: usize },
}

impl DeliveryReport {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match *self {
            DeliveryReport::Delivered { attempts }
            | DeliveryReport::Abandoned { attempts, .. }
            | DeliveryReport::TransportFailed { attempts, .. } => attempts,
        }
    }
}

#[derive(Clone)]
pub struct RetryEngine {
    stream: String,
    destination: Arc<dyn Destination>,
    budget: RetryBudget,
    backoff: Duration,
}

impl std::fmt::Debug for RetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryEngine")
            .field("stream", &self.stream)
            .field("budget", &self.budget)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl RetryEngine {
    #[must_use]
    pub fn new(
        stream: impl Into<String>,
        destination: Arc<dyn Destination>,
        budget: RetryBudget,
        backoff: Duration,
    ) -> Self {
        Self {
            stream: stream.into(),
            destination,
            budget,
            backoff,
        }
    }

    /// Drives `batch` to completion: delivered, abandoned, or failed in transport.
    pub async fn deliver(&self, batch: Batch) -> DeliveryReport {
        let Batch {
            batch_id,
            records,
            size_bytes,
        } = batch;
        debug!(
            stream = %self.stream,
            batch_id = %batch_id,
            batch_size_in_records = records.len(),
            batch_size_in_bytes = size_bytes,
            "RETRY | Sending batch"
        );

        let mut pending = records;
        let mut attempt: u32 = 0;
        loop {
            let outcome = match self.destination.submit(&self.stream, &pending).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        stream = %self.stream,
                        batch_id = %batch_id,
                        attempt,
                        unresolved = pending.len(),
                        "RETRY | Failed to submit batch, dropping its records: {e}"
                    );
                    return DeliveryReport::TransportFailed {
                        attempts: attempt + 1,
                        unresolved: pending.len(),
                    };
                }
            };

            let failed = self.collect_failed(&batch_id, attempt, pending, outcome);
            if failed.is_empty() {
                debug!(
                    stream = %self.stream,
                    batch_id = %batch_id,
                    attempts = attempt + 1,
                    "RETRY | Finished sending batch"
                );
                return DeliveryReport::Delivered {
                    attempts: attempt + 1,
                };
            }

            if attempt >= self.budget.max_retries() {
                for (record, error_code) in &failed {
                    error!(
                        stream = %self.stream,
                        batch_id = %batch_id,
                        error_code = %error_code,
                        partition_key = %record.partition_key,
                        "RETRY | Record could not be delivered after {} attempts, dropping it: {}",
                        attempt + 1,
                        truncate_for_log(&record.data)
                    );
                }
                return DeliveryReport::Abandoned {
                    attempts: attempt + 1,
                    dropped: failed.len(),
                };
            }

            attempt += 1;
            warn!(
                stream = %self.stream,
                batch_id = %batch_id,
                attempt,
                failed = failed.len(),
                "RETRY | Resubmitting failed records"
            );
            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff * attempt).await;
            }
            pending = failed.into_iter().map(|(record, _)| record).collect();
        }
    }

    /// Picks the records whose outcome is a failure, keeping their order.
    ///
    /// Records without a matching outcome entry are treated as failed.
    fn collect_failed(
        &self,
        batch_id: &str,
        attempt: u32,
        submitted: Vec<WireRecord>,
        outcome: SubmitOutcome,
    ) -> Vec<(WireRecord, String)> {
        if outcome.records.len() < submitted.len() {
            warn!(
                stream = %self.stream,
                batch_id,
                submitted = submitted.len(),
                results = outcome.records.len(),
                "RETRY | Destination returned fewer results than records submitted"
            );
        }

        let mut results = outcome.records.into_iter();
        let mut failed = Vec::new();
        for record in submitted {
            match results.next() {
                Some(RecordOutcome::Accepted) => {}
                Some(RecordOutcome::Failed {
                    error_code,
                    error_message,
                }) => {
                    debug!(
                        stream = %self.stream,
                        batch_id,
                        attempt,
                        error_code = %error_code,
                        error_message = %error_message,
                        "RETRY | Record failed to be delivered: {}",
                        truncate_for_log(&record.data)
                    );
                    failed.push((record, error_code));
                }
                None => failed.push((record, MISSING_RESULT_ERROR_CODE.to_string())),
            }
        }
        failed
    }
}
