use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, bail};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "safeguard.log";

/// Keeps the non-blocking writer alive; dropping it flushes pending log lines.
pub struct LoggingGuard {
    _flush_on_drop: WorkerGuard,
    run_id: String,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Installs the global subscriber: JSON lines into a rolling file under `logging.dir`, WARN and
/// above mirrored to stderr when enabled, and span traces captured for errors.
pub fn init_tracing(logging: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = prepare_log_dir(logging)?;
    let filter = env_filter(&logging.filter)?;
    let stale = purge_expired_logs(
        &log_dir,
        LOG_FILE_PREFIX,
        logging.retention_days,
        SystemTime::now(),
    );

    let appender = match logging.rotation {
        LoggingRotation::Daily => rolling::daily(&log_dir, LOG_FILE_PREFIX),
        LoggingRotation::Hourly => rolling::hourly(&log_dir, LOG_FILE_PREFIX),
    };
    let (json_writer, flush_on_drop) = tracing_appender::non_blocking(appender);

    let json_lines = fmt::layer()
        .json()
        .flatten_event(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_ansi(false)
        .with_writer(json_writer)
        .with_filter(filter);
    let warnings_to_stderr = logging.stderr_warn_enabled.then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(json_lines)
        .with(warnings_to_stderr)
        .with(ErrorLayer::default())
        .try_init()
        .context("cannot install the tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = %log_dir.display(),
        filter = %logging.filter,
        rotation = ?logging.rotation,
        retention_days = logging.retention_days,
        "logging_initialized"
    );
    for problem in stale {
        tracing::warn!(target: "logging", problem = %problem, "log_retention_failed");
    }

    Ok(LoggingGuard {
        _flush_on_drop: flush_on_drop,
        run_id,
    })
}

fn prepare_log_dir(logging: &LoggingConfig) -> Result<PathBuf> {
    if logging.dir.as_os_str().is_empty() {
        bail!("logging.dir cannot be empty");
    }
    let dir = if logging.dir.is_absolute() {
        logging.dir.clone()
    } else {
        std::env::current_dir()
            .context("relative logging.dir needs a readable working directory")?
            .join(&logging.dir)
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    Ok(dir)
}

fn env_filter(filter: &str) -> Result<EnvFilter> {
    if filter.trim().is_empty() {
        bail!("logging.filter cannot be empty");
    }
    EnvFilter::try_new(filter).with_context(|| format!("invalid logging.filter '{filter}'"))
}

/// Removes prefixed log files last modified before `now - retention_days`. Returns one warning
/// per file that could not be inspected or removed.
fn purge_expired_logs(
    log_dir: &Path,
    prefix: &str,
    retention_days: usize,
    now: SystemTime,
) -> Vec<String> {
    let retention = Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60) as u64);
    let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) => {
            return vec![format!(
                "cannot scan log directory {}: {err}",
                log_dir.display()
            )];
        }
    };

    entries
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(format!("failed to read logging directory entry: {err}")),
            };
            if !entry.file_name().to_string_lossy().starts_with(prefix) {
                return None;
            }

            let path = entry.path();
            let modified = match entry.metadata().and_then(|meta| {
                if meta.is_file() {
                    meta.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => return None,
                Err(err) => return Some(format!("failed to stat {}: {err}", path.display())),
            };

            if modified > cutoff {
                return None;
            }
            fs::remove_file(&path)
                .err()
                .map(|err| format!("failed to remove expired log file {}: {err}", path.display()))
        })
        .collect()
}
