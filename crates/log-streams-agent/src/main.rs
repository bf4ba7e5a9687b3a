// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Reads newline-delimited JSON records from stdin, one
//! `{"origin": "...", "data": ...}` object per line, and ships them through
//! the configured log streams. Stops on end of input or Ctrl-C.

use serde::Deserialize;
use serde_json::Value;
use std::{env, path::PathBuf, process::ExitCode, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use log_streams::{HttpDestination, LogOutput, OutputConfig, Record};

const CONFIG_PATH_ENV: &str = "LOG_STREAMS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "log-streams.yaml";
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct InputLine {
    origin: String,
    data: Value,
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_PATH_ENV).ok())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let config = OutputConfig::load(Some(&config_path));
    let log_level = config
        .as_ref()
        .map(|c| c.log_level.to_lowercase())
        .unwrap_or_else(|_| "info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set default subscriber: {e}");
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration from {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    let destination = match config.endpoint().and_then(|endpoint| {
        HttpDestination::new(
            endpoint,
            config.request_timeout(),
            config.https_proxy.as_deref(),
        )
    }) {
        Ok(destination) => destination,
        Err(e) => {
            error!("Error creating destination: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut output = match LogOutput::new(&config, Arc::new(destination)) {
        Ok(output) => output,
        Err(e) => {
            error!("Error creating log output: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = output.start() {
        error!("Error starting log output: {e}");
        return ExitCode::FAILURE;
    }
    info!(
        streams = ?output.streams().collect::<Vec<_>>(),
        "Reading records from stdin"
    );

    read_records(&output).await;

    if let Err(e) = output.stop(|| debug!("Log output torn down")).await {
        error!("Error stopping log output: {e}");
    }
    if !output.wait_for_deliveries(DELIVERY_TIMEOUT).await {
        warn!(
            "Deliveries still in flight after {}s, exiting anyway",
            DELIVERY_TIMEOUT.as_secs()
        );
    }
    ExitCode::SUCCESS
}

async fn read_records(output: &LogOutput) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<InputLine>(&line) {
                        Ok(input) => {
                            output.write(Record::new(input.origin, input.data));
                        }
                        Err(e) => warn!("Skipping malformed input line: {e}"),
                    }
                }
                Ok(None) => {
                    info!("End of input, shutting down");
                    break;
                }
                Err(e) => {
                    error!("Error reading stdin: {e}");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }
}
