//! Logging and tracing configuration
//!
//! Logs go to stderr so that stdout stays reserved for results. When the log
//! directory is writable, the same events are also appended to
//! `<data dir>/logs/hurlui.log` with full detail.

use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate (DEBUG with `verbose`), WARN for dependencies.
pub fn init_cli(verbose: bool) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("hurlui=debug,warn")
        } else {
            EnvFilter::new("hurlui=info,warn")
        }
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let log_file = log_file_path();
    let file_layer = log_file.as_ref().and_then(|path| {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            Err(e) => {
                eprintln!("Warning: Could not open log file: {}", e);
                None
            }
        }
    });
    let opened = file_layer.is_some();

    // A second init (tests, embedding hosts) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if opened {
        log_file
    } else {
        None
    }
}

/// Get the path to the log file, creating its directory
fn log_file_path() -> Option<PathBuf> {
    let log_dir = paths::log_dir()?;
    std::fs::create_dir_all(&log_dir).ok()?;
    Some(log_dir.join("hurlui.log"))
}
