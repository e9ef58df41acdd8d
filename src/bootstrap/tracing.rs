//! Tracing configuration for webrecorder
//!
//! ## Behavior / 行为
//!
//! - **Development**: debug level, stdout + log file
//! - **Production**: info level, stdout + log file
//! - **RUST_LOG**: overrides the default directives when set
//! - **File logging**: skipped (stdout only) if the logs directory cannot be created

use std::{fs, io, path::Path, sync::OnceLock};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, registry};

const LOG_FILE_NAME: &str = "webrecorder.log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Check if running in development environment
fn is_development() -> bool {
    cfg!(debug_assertions)
}

/// Build the default filter directives for tracing
///
/// ## Behavior / 行为
/// - **Development**: debug for the workspace crates
/// - **Production**: info for the workspace crates
/// - **diesel / r2d2**: always warn, pool checkouts are noisy
fn build_filter_directives(is_dev: bool) -> Vec<String> {
    let level = if is_dev { "debug" } else { "info" };
    vec![
        level.to_string(),
        format!("webrecorder={level}"),
        format!("wr_app={level}"),
        format!("wr_infra={level}"),
        format!("wr_core={level}"),
        "diesel=warn".to_string(),
        "r2d2=warn".to_string(),
    ]
}

/// Initialize the tracing subscriber
///
/// Call once, before any work is spawned. `logs_dir` receives a non-blocking file
/// appender; pass `None` for stdout only.
///
/// ## Errors / 错误
///
/// Returns `Err` if a subscriber is already registered.
pub fn init_tracing_subscriber(logs_dir: Option<&Path>) -> anyhow::Result<()> {
    let is_dev = is_development();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(build_filter_directives(is_dev).join(","))
    });

    let stdout_writer: BoxMakeWriter = BoxMakeWriter::new(io::stdout);
    let file_writer = match logs_dir.map(build_file_writer).transpose() {
        Ok(writer) => writer,
        Err(err) => {
            eprintln!("Failed to initialize file logging, falling back to stdout: {err}");
            None
        }
    };

    // "2025-01-15 10:30:45.123 INFO [file.rs:42] [target] message"
    let stdout_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::new(TIMESTAMP_FORMAT.to_string()))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_ansi(cfg!(not(test)))
        .with_writer(stdout_writer);

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_timer(fmt::time::ChronoUtc::new(TIMESTAMP_FORMAT.to_string()))
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
    });

    registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

fn build_file_writer(logs_dir: &Path) -> anyhow::Result<NonBlocking> {
    fs::create_dir_all(logs_dir)?;

    let file_appender = tracing_appender::rolling::never(logs_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    LOG_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Tracing log guard already initialized"))?;

    Ok(non_blocking)
}
