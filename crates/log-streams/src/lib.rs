// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Log Streams
//!
//! Output stage that batches application log records and ships them to named
//! streams of a remote ingestion endpoint.
//!
//! ## Pipeline
//!
//! ```text
//! Record ─> Router ─> StreamService (Buffer) ─> RetryEngine ─> Destination
//!                 └─> StreamService (Buffer) ─> RetryEngine ─> Destination
//! ```
//!
//! - [`router`]: picks the streams a record goes to from its origin
//! - [`partition`]: resolves the partition key of each record
//! - [`buffer`]: closes count- and size-bounded batches
//! - [`retry`]: delivers a batch, resubmitting only the records that failed
//! - [`stream_service`]: single-owner actor per stream, with its flush timer
//! - [`output`]: lifecycle of the whole output

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(missing_copy_implementations)]
#![allow(clippy::missing_errors_doc)]

pub mod buffer;
pub mod config;
pub mod constants;
pub mod destination;
pub mod errors;
pub mod http_destination;
pub mod output;
pub mod partition;
pub mod record;
pub mod retry;
pub mod router;
pub mod stream_service;

pub use config::OutputConfig;
pub use destination::Destination;
pub use http_destination::HttpDestination;
pub use output::LogOutput;
pub use record::Record;
