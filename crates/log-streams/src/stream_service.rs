// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Actor owning the buffer of a single stream.
//!
//! ```text
//!    ┌──────────────┐
//!    │ StreamHandle │ (cloneable, one per producer)
//!    └──────┬───────┘
//!           │ StreamCommand
//!           v
//!    ┌──────────────┐   flush interval
//!    │ StreamService│ <──────────────── timer
//!    └──────┬───────┘
//!           │ closed batches
//!           v
//!    ┌──────────────┐
//!    │ RetryEngine  │ (one delivery task per batch)
//!    └──────────────┘
//! ```
//!
//! Writes, explicit flushes and timer ticks are all handled by the service
//! task, one at a time, so the buffer needs no locking. Closed batches are
//! delivered on their own tasks, tracked by a shared [`TaskTracker`], so a
//! slow destination never holds up writes.

use std::future::pending;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::buffer::{Buffer, BufferStats};
use crate::config::StreamSettings;
use crate::destination::Destination;
use crate::errors::LifecycleError;
use crate::record::{truncate_for_log, Batch, Record};
use crate::retry::{DeliveryReport, RetryEngine};

#[derive(Debug)]
pub enum StreamCommand {
    Write(Arc<Record>),
    /// Close the open batch and reply with how many records it held.
    Flush(oneshot::Sender<usize>),
    Stats(oneshot::Sender<BufferStats>),
    /// Stop the service, optionally flushing the open batch first.
    Shutdown {
        flush: bool,
        done: oneshot::Sender<()>,
    },
}

/// Cloneable address of a running stream. Two handles are equal when they
/// point at the same stream name.
#[derive(Clone, Debug)]
pub struct StreamHandle {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<StreamCommand>,
}

impl PartialEq for StreamHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for StreamHandle {}

impl Hash for StreamHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl StreamHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `record` for the stream. Never waits on the network.
    pub fn write(&self, record: Arc<Record>) -> Result<(), LifecycleError> {
        self.send(StreamCommand::Write(record))
    }

    pub async fn flush(&self) -> Result<usize, LifecycleError> {
        let (tx, rx) = oneshot::channel();
        self.send(StreamCommand::Flush(tx))?;
        rx.await.map_err(|_| self.unavailable())
    }

    pub async fn stats(&self) -> Result<BufferStats, LifecycleError> {
        let (tx, rx) = oneshot::channel();
        self.send(StreamCommand::Stats(tx))?;
        rx.await.map_err(|_| self.unavailable())
    }

    /// Stops the service and waits until it no longer accepts commands.
    pub async fn shutdown(&self, flush: bool) -> Result<(), LifecycleError> {
        let (done, rx) = oneshot::channel();
        self.send(StreamCommand::Shutdown { flush, done })?;
        rx.await.map_err(|_| self.unavailable())
    }

    fn send(&self, command: StreamCommand) -> Result<(), LifecycleError> {
        self.tx.send(command).map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> LifecycleError {
        LifecycleError::ServiceUnavailable(self.name.to_string())
    }
}

pub struct StreamService {
    name: Arc<str>,
    buffer: Buffer,
    engine: RetryEngine,
    flush_interval: Option<Duration>,
    deliveries: TaskTracker,
    rx: mpsc::UnboundedReceiver<StreamCommand>,
}

impl StreamService {
    /// Builds the service and its first handle. Nothing runs until [`StreamService::run`].
    #[must_use]
    pub fn new(
        settings: StreamSettings,
        destination: Arc<dyn Destination>,
        deliveries: TaskTracker,
    ) -> (Self, StreamHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let name: Arc<str> = Arc::from(settings.name.as_str());
        let engine = RetryEngine::new(
            settings.name.clone(),
            destination,
            settings.retry_budget,
            settings.retry_backoff,
        );
        let buffer = Buffer::new(settings.name, settings.resolver, settings.limits);

        let service = Self {
            name: Arc::clone(&name),
            buffer,
            engine,
            flush_interval: settings.flush_interval,
            deliveries,
            rx,
        };
        (service, StreamHandle { name, tx })
    }

    /// Processes commands until shutdown or until every handle is dropped.
    ///
    /// The flush timer is armed here and disarmed when this returns.
    pub async fn run(mut self) {
        info!(stream = %self.name, "STREAM | Stream service started");
        let mut ticker = self.flush_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            let command = tokio::select! {
                command = self.rx.recv() => command,
                () = next_tick(&mut ticker) => {
                    self.flush("interval");
                    continue;
                }
            };

            match command {
                Some(StreamCommand::Write(record)) => self.write(&record),
                Some(StreamCommand::Flush(reply)) => {
                    let flushed = self.flush("requested");
                    if reply.send(flushed).is_err() {
                        error!(
                            stream = %self.name,
                            "STREAM | Failed to send flush response - receiver dropped"
                        );
                    }
                }
                Some(StreamCommand::Stats(reply)) => {
                    if reply.send(self.buffer.stats()).is_err() {
                        error!(
                            stream = %self.name,
                            "STREAM | Failed to send stats response - receiver dropped"
                        );
                    }
                }
                Some(StreamCommand::Shutdown { flush, done }) => {
                    self.stop(flush);
                    if done.send(()).is_err() {
                        error!(
                            stream = %self.name,
                            "STREAM | Failed to send shutdown response - receiver dropped"
                        );
                    }
                    break;
                }
                None => {
                    debug!(stream = %self.name, "STREAM | All handles dropped");
                    self.stop(false);
                    break;
                }
            }
        }
        info!(stream = %self.name, "STREAM | Stream service stopped");
    }

    fn write(&mut self, record: &Record) {
        match self.buffer.write(record) {
            Ok(Some(batch)) => self.dispatch(batch),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    stream = %self.name,
                    origin = record.origin(),
                    size_bytes = e.size_bytes,
                    "STREAM | Dropping record: {e}. Record: {}",
                    truncate_for_log(&record.to_json())
                );
            }
        }
    }

    fn flush(&mut self, trigger: &str) -> usize {
        match self.buffer.flush() {
            Some(batch) => {
                let len = batch.len();
                debug!(stream = %self.name, trigger, records = len, "STREAM | Flushing buffer");
                self.dispatch(batch);
                len
            }
            None => 0,
        }
    }

    fn stop(&mut self, flush: bool) {
        self.rx.close();
        if flush {
            self.flush("shutdown");
        } else {
            let stats = self.buffer.stats();
            if stats.records > 0 {
                warn!(
                    stream = %self.name,
                    records = stats.records,
                    size_bytes = stats.size_bytes,
                    "STREAM | Discarding buffered records on shutdown"
                );
            }
        }
    }

    fn dispatch(&self, batch: Batch) {
        let engine = self.engine.clone();
        let stream = Arc::clone(&self.name);
        self.deliveries.spawn(async move {
            let records = batch.len();
            if let DeliveryReport::Delivered { attempts } = engine.deliver(batch).await {
                debug!(stream = %stream, records, attempts, "STREAM | Batch delivered");
            }
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}
