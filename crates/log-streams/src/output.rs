// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The log output: routes records to stream services and owns their lifecycle.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::OutputConfig;
use crate::destination::Destination;
use crate::errors::{ConfigurationError, LifecycleError};
use crate::record::Record;
use crate::router::Router;
use crate::stream_service::{StreamHandle, StreamService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Running,
    Stopped,
}

pub struct LogOutput {
    router: Router<StreamHandle>,
    idle: Vec<StreamService>,
    running: Vec<JoinHandle<()>>,
    deliveries: TaskTracker,
    flush_on_shutdown: bool,
    state: State,
}

impl LogOutput {
    /// Validates `config` and builds every stream and route.
    ///
    /// Streams are created but not running; records written before
    /// [`LogOutput::start`] are ignored.
    pub fn new(
        config: &OutputConfig,
        destination: Arc<dyn Destination>,
    ) -> Result<Self, ConfigurationError> {
        let settings = config.validate()?;
        let deliveries = TaskTracker::new();

        let mut router = Router::new();
        let mut idle = Vec::with_capacity(settings.len());
        for stream in settings {
            let (service, handle) =
                StreamService::new(stream, Arc::clone(&destination), deliveries.clone());
            // Listed even without routes, so that it is shut down with the rest.
            router.register(handle, std::iter::empty::<&str>())?;
            idle.push(service);
        }

        for route in &config.routes {
            let handle = router
                .streams()
                .find(|h| h.name() == route.stream_name)
                .cloned()
                .ok_or_else(|| ConfigurationError::UnknownStream(route.stream_name.clone()))?;
            router.register(handle, &route.origin_patterns)?;
        }

        Ok(Self {
            router,
            idle,
            running: Vec::new(),
            deliveries,
            flush_on_shutdown: config.flush_on_shutdown,
            state: State::Created,
        })
    }

    /// Starts every stream service and arms their flush timers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        if self.state != State::Created {
            return Err(LifecycleError::AlreadyStarted);
        }
        self.running = self.idle.drain(..).map(|s| tokio::spawn(s.run())).collect();
        self.state = State::Running;
        info!("STREAM | Log output started with {} streams", self.running.len());
        Ok(())
    }

    /// Forwards `record` to every stream whose patterns match its origin.
    ///
    /// Returns the number of streams the record was queued on. Unrouted
    /// records, and records written while the output is not running, are
    /// dropped.
    pub fn write(&self, record: Record) -> usize {
        if self.state != State::Running {
            debug!(origin = record.origin(), "STREAM | Output is not running, dropping record");
            return 0;
        }

        let streams = self.router.route(record.origin());
        let record = Arc::new(record);
        let mut queued = 0;
        for stream in streams.iter() {
            match stream.write(Arc::clone(&record)) {
                Ok(()) => queued += 1,
                Err(e) => warn!(stream = stream.name(), "STREAM | Failed to queue record: {e}"),
            }
        }
        queued
    }

    /// Stops accepting records, disarms timers and flushes the open batches
    /// when configured to, then calls `on_stopped`.
    ///
    /// Deliveries already in flight keep running; use
    /// [`LogOutput::wait_for_deliveries`] to wait for them.
    pub async fn stop<F>(&mut self, on_stopped: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(),
    {
        if self.state != State::Running {
            return Err(LifecycleError::NotRunning);
        }
        self.state = State::Stopped;

        for stream in self.router.streams() {
            if let Err(e) = stream.shutdown(self.flush_on_shutdown).await {
                warn!(stream = stream.name(), "STREAM | Failed to shut down stream: {e}");
            }
        }
        for task in self.running.drain(..) {
            if let Err(e) = task.await {
                error!("STREAM | Stream service task failed: {e}");
            }
        }
        self.deliveries.close();

        info!(
            in_flight = self.deliveries.len(),
            "STREAM | Log output stopped"
        );
        on_stopped();
        Ok(())
    }

    /// Waits up to `timeout` for in-flight deliveries to finish. Returns
    /// whether they all did. Deliveries are never aborted.
    ///
    /// Only completes early once the output has been stopped.
    pub async fn wait_for_deliveries(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.deliveries.wait())
            .await
            .is_ok()
    }

    /// Names of every configured stream.
    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.router.streams().map(StreamHandle::name)
    }
}
