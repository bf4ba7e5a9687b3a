// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::errors::SubmitError;
use crate::record::WireRecord;

/// Result of submitting one record within a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Accepted,
    Failed {
        error_code: String,
        error_message: String,
    },
}

impl RecordOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, RecordOutcome::Failed { .. })
    }
}

/// Per-record outcomes of a call, in the same order as the submitted records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmitOutcome {
    pub records: Vec<RecordOutcome>,
}

impl SubmitOutcome {
    #[must_use]
    pub fn all_accepted(count: usize) -> Self {
        Self {
            records: vec![RecordOutcome::Accepted; count],
        }
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_failed()).count()
    }
}

/// The remote ingestion endpoint.
///
/// `Err` means the call itself failed and nothing is known about individual
/// records; per-record failures come back inside `Ok`.
#[async_trait]
pub trait Destination: Send + Sync {
    async fn submit(
        &self,
        stream_name: &str,
        records: &[WireRecord],
    ) -> Result<SubmitOutcome, SubmitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_count() {
        let outcome = SubmitOutcome {
            records: vec![
                RecordOutcome::Accepted,
                RecordOutcome::Failed {
                    error_code: "ProvisionedThroughputExceededException".to_string(),
                    error_message: "Rate exceeded".to_string(),
                },
                RecordOutcome::Accepted,
            ],
        };
        assert_eq!(outcome.failed_count(), 1);
        assert_eq!(SubmitOutcome::all_accepted(3).failed_count(), 0);
    }
}
