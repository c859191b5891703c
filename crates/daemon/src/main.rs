// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay agent host (relayd)
//!
//! Holds the work-queue session, polls for jobs and runs each one in a
//! `relay-worker` child process.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;

use relay_adapters::{HttpServiceClient, TracedLease, TracedQueue};
use relay_daemon::lifecycle::{self, Config};
use relay_daemon::{Heartbeat, JobListener, WorkerSupervisor};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

const LOG_FILE: &str = "relayd.log";

fn print_usage() {
    println!("relayd {}", env!("CARGO_PKG_VERSION"));
    println!("Relay agent - polls a work queue and runs build/release jobs");
    println!();
    println!("USAGE:");
    println!("    relayd [--config <path>]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>  Config file (default: $RELAY_CONFIG, else <work>/.agent.toml)");
    println!("    -h, --help       Print help");
    println!("    -V, --version    Print version");
    println!();
    println!("ENVIRONMENT:");
    println!("    RELAY_TOKEN      Agent access token");
    println!("    RELAY_WORK_DIR   Work folder used to find the default config");
    println!("    RUST_LOG         Log filter (default: info)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("relayd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_usage();
                return Ok(());
            }
            "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("error: --config requires a path");
                    std::process::exit(2);
                }
            },
            other => {
                eprintln!("error: unexpected argument '{}'", other);
                eprintln!("Run 'relayd --help' for usage.");
                std::process::exit(2);
            }
        }
    }

    // Configuration errors are fatal to the agent but not a crash
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(());
        }
    };

    let diag_dir = config.diag_dir();
    let log_path = diag_dir.join(LOG_FILE);
    let _log_guard = match lifecycle::setup_logging(&diag_dir, LOG_FILE) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(());
        }
    };
    lifecycle::install_panic_hook(log_path.clone());

    info!(
        pool_id = config.pool_id,
        agent = %config.agent_name,
        server = %config.server_url,
        "starting agent"
    );

    let http = HttpServiceClient::new(config.http());
    let owner_name = uuid::Uuid::new_v4().to_string();
    let mut listener = JobListener::new(
        TracedQueue::new(http.clone()),
        config.listener(owner_name),
    );
    let supervisor = WorkerSupervisor::new(
        TracedLease::new(http),
        config.worker_binary(),
        config.worker(),
    );
    let heartbeat = Heartbeat::new(&config.work_folder);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let result = tokio::select! {
        result = lifecycle::serve(&mut listener, &supervisor, &heartbeat) => result,
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
            Ok(())
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!(error = %e, "agent stopped");
        lifecycle::write_fatal_error(&log_path, &e.to_string());
    }

    listener.stop().await;
    if let Err(e) = heartbeat.stop() {
        error!(error = %e, "failed to remove heartbeat file");
    }
    info!("agent stopped");
    Ok(())
}
