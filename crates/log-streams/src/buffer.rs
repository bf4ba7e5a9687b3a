// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffering of wire records into count- and size-bounded batches.
//!
//! # Batching Strategy
//!
//! Records accumulate in an open batch until appending the next one would
//! break a limit:
//! 1. **Count limit**: more than `max_records` records
//! 2. **Size limit**: more than `max_bytes` bytes of data and partition keys
//!
//! When that happens the open batch is closed and handed back to the caller
//! before the new record is appended, so the open batch never exceeds either
//! limit. The one exception is a record that alone is larger than
//! `max_bytes`: it is still admitted into an empty batch, as long as it fits
//! under the per-record cap.
//!
//! Records are never reordered. Batches come out in write order and records
//! keep their write order inside and across batches.

use tracing::warn;

use crate::constants;
use crate::errors::OversizedRecord;
use crate::partition::PartitionKeyResolver;
use crate::record::{Batch, Record, WireRecord};

/// Upper bounds for a single batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_records: usize,
    pub max_bytes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_records: constants::MAX_BATCH_RECORDS,
            max_bytes: constants::MAX_BATCH_SIZE_BYTES,
        }
    }
}

/// Point-in-time view of the open batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub records: usize,
    pub size_bytes: usize,
}

/// The open batch of a single stream.
///
/// Only its owner mutates it: the stream service funnels both limit-triggered
/// and timer-triggered flushes through [`Buffer::write`] and [`Buffer::flush`].
#[derive(Debug)]
pub struct Buffer {
    stream: String,
    resolver: PartitionKeyResolver,
    limits: BatchLimits,
    max_record_size_bytes: usize,
    records: Vec<WireRecord>,
    size_bytes: usize,
}

impl Buffer {
    #[must_use]
    pub fn new(stream: impl Into<String>, resolver: PartitionKeyResolver, limits: BatchLimits) -> Self {
        Self {
            stream: stream.into(),
            resolver,
            limits,
            max_record_size_bytes: constants::MAX_RECORD_SIZE_BYTES,
            records: Vec::new(),
            size_bytes: 0,
        }
    }

    /// Serializes `record`, resolves its partition key and appends it.
    ///
    /// Returns the batch that had to be closed to make room, if any. A record
    /// above the per-record cap is rejected and the open batch is untouched.
    pub fn write(&mut self, record: &Record) -> Result<Option<Batch>, OversizedRecord> {
        let wire = WireRecord {
            data: record.to_json(),
            partition_key: self.resolver.resolve(record),
        };
        self.push(wire)
    }

    /// Appends an already serialized record.
    pub fn push(&mut self, wire: WireRecord) -> Result<Option<Batch>, OversizedRecord> {
        let size_bytes = wire.size_bytes();
        if size_bytes > self.max_record_size_bytes {
            return Err(OversizedRecord {
                size_bytes,
                max_bytes: self.max_record_size_bytes,
            });
        }

        let over_count = self.records.len() + 1 > self.limits.max_records;
        let over_size = self.size_bytes + size_bytes > self.limits.max_bytes;
        let closed = if !self.records.is_empty() && (over_count || over_size) {
            self.flush()
        } else {
            None
        };

        if self.records.is_empty() && size_bytes > self.limits.max_bytes {
            warn!(
                stream = %self.stream,
                size_bytes,
                max_bytes = self.limits.max_bytes,
                "BUFFER | Record is larger than the batch size limit, sending it alone"
            );
        }

        self.records.push(wire);
        self.size_bytes += size_bytes;
        Ok(closed)
    }

    /// Closes the open batch. Returns `None` when there is nothing buffered.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.records.is_empty() {
            return None;
        }
        let records = std::mem::take(&mut self.records);
        let size_bytes = std::mem::replace(&mut self.size_bytes, 0);
        Some(Batch::new(records, size_bytes))
    }

    #[must_use]
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            records: self.records.len(),
            size_bytes: self.size_bytes,
        }
    }

    #[must_use]
    pub fn limits(&self) -> BatchLimits {
        self.limits
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::partition::KeyChain;
    use proptest::prelude::*;
    use serde_json::json;

    fn create_test_buffer(max_records: usize, max_bytes: usize) -> Buffer {
        Buffer::new(
            "test-stream",
            PartitionKeyResolver::new("test-stream", KeyChain::from_fields(Some("k"), None), vec![]),
            BatchLimits {
                max_records,
                max_bytes,
            },
        )
    }

    fn create_wire(data: &str) -> WireRecord {
        WireRecord {
            data: data.to_string(),
            partition_key: "k".to_string(),
        }
    }

    #[test]
    fn test_buffer_default_limits() {
        let limits = BatchLimits::default();
        assert_eq!(limits.max_records, 500);
        assert_eq!(limits.max_bytes, 5_242_880);
    }

    #[test]
    fn test_write_serializes_and_resolves_key() {
        let mut buffer = create_test_buffer(10, 1000);
        let closed = buffer.write(&Record::new("app", json!({"a": 1}))).unwrap();

        assert!(closed.is_none());
        assert_eq!(
            buffer.stats(),
            BufferStats {
                records: 1,
                size_bytes: r#"{"a":1}"#.len() + 1,
            }
        );
        let batch = buffer.flush().unwrap();
        assert_eq!(batch.records[0].data, r#"{"a":1}"#);
        assert_eq!(batch.records[0].partition_key, "k");
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let mut buffer = create_test_buffer(10, 1000);
        assert!(buffer.flush().is_none());
    }

    #[test]
    fn test_flush_resets_buffer() {
        let mut buffer = create_test_buffer(10, 1000);
        buffer.push(create_wire("one")).unwrap();
        buffer.push(create_wire("two")).unwrap();

        let batch = buffer.flush().unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size_bytes, 8);
        assert_eq!(buffer.stats(), BufferStats::default());
    }

    #[test]
    fn test_count_limit_closes_batch() {
        let mut buffer = create_test_buffer(2, 1000);
        assert!(buffer.push(create_wire("1")).unwrap().is_none());
        assert!(buffer.push(create_wire("2")).unwrap().is_none());

        let closed = buffer.push(create_wire("3")).unwrap().unwrap();

        assert_eq!(closed.records, vec![create_wire("1"), create_wire("2")]);
        assert_eq!(buffer.stats().records, 1);
    }

    #[test]
    fn test_size_limit_closes_batch() {
        // each record is 5 bytes: 4 of data + 1 of key
        let mut buffer = create_test_buffer(100, 12);
        assert!(buffer.push(create_wire("aaaa")).unwrap().is_none());
        assert!(buffer.push(create_wire("bbbb")).unwrap().is_none());

        let closed = buffer.push(create_wire("cccc")).unwrap().unwrap();

        assert_eq!(closed.len(), 2);
        assert_eq!(closed.size_bytes, 10);
        assert_eq!(buffer.stats().size_bytes, 5);
    }

    #[test]
    fn test_exact_size_fits() {
        let mut buffer = create_test_buffer(100, 10);
        buffer.push(create_wire("aaaa")).unwrap();
        assert!(buffer.push(create_wire("bbbb")).unwrap().is_none());
        assert_eq!(buffer.stats().size_bytes, 10);
    }

    #[test]
    fn test_single_record_larger_than_batch_limit_is_admitted() {
        let mut buffer = create_test_buffer(100, 3);

        assert!(buffer.push(create_wire("large")).unwrap().is_none());
        assert_eq!(buffer.stats().records, 1);

        let closed = buffer.push(create_wire("next")).unwrap().unwrap();
        assert_eq!(closed.records, vec![create_wire("large")]);
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut buffer = create_test_buffer(100, constants::MAX_BATCH_SIZE_BYTES);
        buffer.push(create_wire("kept")).unwrap();

        let huge = "x".repeat(constants::MAX_RECORD_SIZE_BYTES);
        let result = buffer.push(create_wire(&huge));

        assert_eq!(
            result,
            Err(OversizedRecord {
                size_bytes: constants::MAX_RECORD_SIZE_BYTES + 1,
                max_bytes: constants::MAX_RECORD_SIZE_BYTES,
            })
        );
        assert_eq!(buffer.stats().records, 1);
    }

    #[test]
    fn test_record_exactly_at_cap_is_accepted() {
        let mut buffer = create_test_buffer(100, constants::MAX_BATCH_SIZE_BYTES);
        let data = "x".repeat(constants::MAX_RECORD_SIZE_BYTES - 1);
        assert!(buffer.push(create_wire(&data)).is_ok());
    }

    #[test]
    fn test_one_record_one_byte_limits() {
        let mut buffer = create_test_buffer(1, 1);
        assert!(buffer.write(&Record::new("a", json!("first"))).unwrap().is_none());

        let closed = buffer.write(&Record::new("a", json!("second"))).unwrap();

        assert_eq!(closed.unwrap().records[0].data, "\"first\"");
        assert_eq!(buffer.stats().records, 1);
        assert_eq!(buffer.flush().unwrap().records[0].data, "\"second\"");
    }

    #[test]
    fn test_preserves_order_across_batches() {
        let mut buffer = create_test_buffer(2, 1000);
        let mut out = Vec::new();
        for i in 0..5 {
            if let Some(batch) = buffer.push(create_wire(&i.to_string())).unwrap() {
                out.extend(batch.records);
            }
        }
        out.extend(buffer.flush().unwrap().records);

        let data: Vec<_> = out.into_iter().map(|r| r.data).collect();
        assert_eq!(data, vec!["0", "1", "2", "3", "4"]);
    }

    proptest! {
        #[test]
        fn prop_closed_batches_respect_limits(
            max_records in 1usize..20,
            max_bytes in 1usize..200,
            sizes in proptest::collection::vec(0usize..120, 0..200),
        ) {
            let mut buffer = create_test_buffer(max_records, max_bytes);
            let mut batches = Vec::new();
            let mut accepted = Vec::new();

            for (i, size) in sizes.iter().enumerate() {
                let data = format!("{i}:{}", "x".repeat(*size));
                let wire = create_wire(&data);
                accepted.push(wire.data.clone());
                if let Some(batch) = buffer.push(wire).unwrap() {
                    batches.push(batch);
                }
                let stats = buffer.stats();
                prop_assert!(stats.records <= max_records);
                prop_assert!(stats.size_bytes <= max_bytes || stats.records == 1);
            }
            batches.extend(buffer.flush());

            for batch in &batches {
                prop_assert!(!batch.is_empty());
                prop_assert!(batch.len() <= max_records);
                prop_assert!(batch.size_bytes <= max_bytes || batch.len() == 1);
                let actual: usize = batch.records.iter().map(WireRecord::size_bytes).sum();
                prop_assert_eq!(actual, batch.size_bytes);
            }

            let emitted: Vec<String> = batches
                .into_iter()
                .flat_map(|b| b.records.into_iter().map(|r| r.data))
                .collect();
            prop_assert_eq!(emitted, accepted);
        }
    }
}
