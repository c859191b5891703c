// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: configuration, logging, and the serve loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_adapters::{HttpConfig, LeaseClient, QueueClient, SessionRequest};
use relay_core::WorkerConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::env;
use crate::heartbeat::Heartbeat;
use crate::listener::{JobListener, ListenerConfig, ListenerError};
use crate::supervisor::WorkerSupervisor;

/// Name of the default config file inside the work folder.
pub const CONFIG_FILE: &str = ".agent.toml";

/// Worker binary name, looked up next to the running executable.
pub const WORKER_BIN: &str = "relay-worker";

/// Agent configuration, read from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub server_url: String,
    pub pool_id: u64,
    #[serde(default)]
    pub pool_name: String,
    pub agent_name: String,
    pub agent_id: u64,
    pub work_folder: PathBuf,
    #[serde(default = "default_poll_retry_secs")]
    pub poll_retry_secs: u64,
    #[serde(default = "default_max_session_retries")]
    pub max_session_retries: u32,
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    #[serde(default)]
    pub enable_access_token: bool,
    #[serde(default)]
    pub worker_path: Option<PathBuf>,
    /// From `RELAY_TOKEN`, never from the file.
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_poll_retry_secs() -> u64 {
    15
}

fn default_max_session_retries() -> u32 {
    10
}

fn default_drain_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load from `--config`, else `RELAY_CONFIG`, else the work folder.
    pub fn load(cli_path: Option<PathBuf>) -> Result<Self, LifecycleError> {
        let path = resolve_path(cli_path, env::config_path(), env::work_dir())?;
        let content = std::fs::read_to_string(&path).map_err(|source| LifecycleError::ReadConfig {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::parse(&content).map_err(|source| LifecycleError::ParseConfig {
            path: path.clone(),
            source,
        })?;
        config.token = env::token();
        if let Some(worker) = env::worker_path() {
            config.worker_path = Some(worker);
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `<work>/_diag`, where both binaries write their logs.
    pub fn diag_dir(&self) -> PathBuf {
        diag_dir(&self.work_folder)
    }

    pub fn poll_retry(&self) -> Duration {
        Duration::from_secs(self.poll_retry_secs)
    }

    pub fn http(&self) -> HttpConfig {
        HttpConfig::new(&self.server_url, self.pool_id).with_token(self.token.clone())
    }

    pub fn listener(&self, owner_name: String) -> ListenerConfig {
        ListenerConfig {
            session: SessionRequest {
                owner_name,
                agent_id: self.agent_id,
                agent_name: self.agent_name.clone(),
            },
            retry_delay: self.poll_retry(),
            max_session_retries: self.max_session_retries,
        }
    }

    /// Settings handed to each worker.
    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            server_url: self.server_url.clone(),
            pool_id: self.pool_id,
            agent_id: self.agent_id,
            agent_name: self.agent_name.clone(),
            work_folder: self.work_folder.clone(),
            enable_access_token: self.enable_access_token,
            drain_timeout_secs: self.drain_timeout_secs,
            max_issues: env::max_issues().unwrap_or(relay_engine::feedback::DEFAULT_MAX_ISSUES),
        }
    }

    /// The worker binary: configured, else next to this executable.
    pub fn worker_binary(&self) -> PathBuf {
        if let Some(path) = &self.worker_path {
            return path.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BIN)))
            .unwrap_or_else(|| PathBuf::from(WORKER_BIN))
    }
}

/// Pick the config file: explicit path, then environment, then work folder.
pub fn resolve_path(
    cli_path: Option<PathBuf>,
    env_path: Option<PathBuf>,
    work_dir: Option<PathBuf>,
) -> Result<PathBuf, LifecycleError> {
    if let Some(path) = cli_path.or(env_path) {
        return Ok(path);
    }
    let work = match work_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    Ok(work.join(CONFIG_FILE))
}

pub fn diag_dir(work_folder: &Path) -> PathBuf {
    work_folder.join("_diag")
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to read config {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid log path {0}")]
    LogPath(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Send tracing output to `<dir>/<file_name>` through a non-blocking writer.
///
/// Keep the guard alive for the life of the process; dropping it flushes.
pub fn setup_logging(
    dir: &Path,
    file_name: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(dir)?;
    if file_name.is_empty() {
        return Err(LifecycleError::LogPath(dir.to_path_buf()));
    }
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

/// Write a fatal error synchronously to the log file and to stderr.
///
/// The non-blocking writer may not flush before the process exits.
pub fn write_fatal_error(log_path: &Path, message: &str) {
    use std::io::Write;

    eprintln!("error: {}", message);
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR {}", message);
}

/// Record panics in the log file before the previous hook runs.
pub fn install_panic_hook(log_path: PathBuf) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let message = info.to_string();
        error!(panic = %message, "panicked");
        write_fatal_error(&log_path, &message);
        previous(info);
    }));
}

/// Poll for jobs and run each in a worker, one at a time.
///
/// Returns only on an error the listener cannot recover from.
pub async fn serve<Q, L>(
    listener: &mut JobListener<Q>,
    supervisor: &WorkerSupervisor<L>,
    heartbeat: &Heartbeat,
) -> Result<(), ListenerError>
where
    Q: QueueClient,
    L: LeaseClient,
{
    loop {
        if let Err(e) = heartbeat.beat() {
            warn!(error = %e, "failed to write heartbeat");
        }
        let message = listener.next_message().await?;
        if !message.is_job_request() {
            info!(
                message_id = message.message_id,
                message_type = %message.message_type,
                "ignoring message"
            );
            continue;
        }
        let payload = match message.job_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(message_id = message.message_id, error = %e, "invalid job payload");
                continue;
            }
        };
        let request_id = payload.request_id;
        info!(request_id, job = %payload.job_name, "running job");
        match supervisor.run_job(payload).await {
            Ok(report) => info!(request_id, ?report, "job finished"),
            Err(e) => error!(request_id, error = %e, "job failed to run"),
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
