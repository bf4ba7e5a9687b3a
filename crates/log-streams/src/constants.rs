// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits imposed by the ingestion endpoint and defaults for stream settings.
//!
//! The batch limits mirror what the destination itself accepts for a single
//! submission, so a batch that respects them is never rejected for its shape.

/// Maximum combined size of a record's data and partition key, in bytes.
///
/// Records above this size are rejected at write time and never batched.
pub const MAX_RECORD_SIZE_BYTES: usize = 1_024 * 1_024;

/// Maximum number of records in a single batch.
pub const MAX_BATCH_RECORDS: usize = 500;

/// Maximum total size of a single batch, in bytes (5 MiB).
pub const MAX_BATCH_SIZE_BYTES: usize = 5 * 1_024 * 1_024;

/// Highest accepted retry budget. Attempts per batch are `max_retries + 1`.
pub const MAX_RETRIES_CEILING: u32 = 4;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 60_000;

/// Base delay between retry attempts. The n-th retry waits `n * base`.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Longest prefix of a record payload that is ever written to diagnostic logs.
pub const MAX_LOGGED_PAYLOAD_CHARS: usize = 1_024;

/// Partition key used when the configured property is missing from a record.
pub const UNDEFINED_PARTITION_KEY: &str = "undefined";

/// Stand-in for record data that cannot be serialized.
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "[Unserializable]";
