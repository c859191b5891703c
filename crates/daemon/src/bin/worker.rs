// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay job worker (relay-worker)
//!
//! Started by `relayd` for exactly one job. Stdin carries the job and any
//! abandonment notice; stdout carries lease updates back to the host, so
//! nothing else may be printed there.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use relay_adapters::{HttpConfig, HttpServiceClient, ProcessTaskHandler, TracedTelemetry};
use relay_daemon::lifecycle;
use relay_daemon::worker::{read_job, run_job_worker, WorkerServices};
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("relay-worker {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--help" | "-h" | "help" => {
                println!("relay-worker {}", env!("CARGO_PKG_VERSION"));
                println!("Runs one job handed over on stdin by relayd. Not meant to be run by hand.");
                return;
            }
            _ => {}
        }
    }

    let mut stdin = BufReader::new(tokio::io::stdin());
    let (config, payload) = match read_job(&mut stdin).await {
        Ok(job) => job,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let diag_dir = lifecycle::diag_dir(&config.work_folder);
    let log_file = format!("worker-{}.log", payload.request_id);
    let log_guard = match lifecycle::setup_logging(&diag_dir, &log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    lifecycle::install_panic_hook(diag_dir.join(&log_file));

    let token = payload.access_token().map(str::to_string);
    let http = HttpServiceClient::new(
        HttpConfig::new(&config.server_url, config.pool_id).with_token(token.clone()),
    );
    let telemetry = TracedTelemetry::new(http.telemetry(
        payload.plan.plan_id.clone(),
        payload.timeline.id.clone(),
        token,
    ));
    let services = WorkerServices {
        telemetry: Arc::new(telemetry),
        store: http,
        handler: ProcessTaskHandler::new(),
    };

    let outcome = run_job_worker(config, payload, stdin, tokio::io::stdout(), services).await;
    info!(?outcome, "worker exiting");
    drop(log_guard);

    // The stdin reader thread cannot be cancelled; leave without waiting on it
    std::process::exit(0);
}
