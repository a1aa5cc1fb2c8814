//! Logging setup: `tracing` + `EnvFilter` seeded from `STRATUM_LOG_LEVEL`,
//! optionally rotated out to `STRATUM_LOG_FILE` via `tracing-appender`,
//! mirroring the teacher's `tracing_subscriber::fmt().with_env_filter(...)`
//! init in its guest binary.

use std::path::Path;
use stratum_shared::constants::env;
use tracing_subscriber::EnvFilter;

/// Non-blocking file writer guard; must be held for the process lifetime or
/// buffered log lines are dropped on exit.
pub struct LoggingGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

/// Install the global `tracing` subscriber. Call once, as early as possible
/// in each binary's `main`.
pub fn init() -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var(env::LOG_LEVEL).unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level)
    });

    match std::env::var(env::LOG_FILE) {
        Ok(path) => init_file(&path, filter),
        Err(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).with_ansi(true).init();
            LoggingGuard(None)
        }
    }
}

fn init_file(path: &str, filter: EnvFilter) -> LoggingGuard {
    let path = Path::new(path);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("stratum.log"));

    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("warning: could not create log directory {}: {e}", dir.display());
    }

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(non_blocking)
        .init();

    LoggingGuard(Some(guard))
}
