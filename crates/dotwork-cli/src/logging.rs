//! Tracing subscriber initialisation.
//!
//! Only the CLI crate is allowed to call [`init_logging`]; `dotwork-core` and
//! `dotwork-adapters` only *emit* spans and events.
//!
//! # Verbosity mapping
//!
//! | Flag(s)  | Filter level            |
//! |----------|-------------------------|
//! | (none)   | config `log_level`      |
//! | `-v`     | INFO                    |
//! | `-vv`    | DEBUG                   |
//! | `-vvv`   | TRACE                   |
//! | `--quiet`| ERROR                   |
//!
//! `RUST_LOG` overrides all of the above if set. With `log_to_file` enabled,
//! events are also appended to `<log_dir>/dotwork.log.YYYY-MM-DD`.

use std::io::IsTerminal as _;

use anyhow::Context as _;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{cli::GlobalArgs, config::AppConfig};

/// Base name of the rolling log file.
pub const LOG_FILE_NAME: &str = "dotwork.log";

/// Initialise the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros fire. The returned
/// guard flushes the file log on drop and must live until exit.
pub fn init_logging(args: &GlobalArgs, config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let level = derive_level(args, &config.log_level);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "dotwork={level},dotwork_core={level},dotwork_adapters={level}"
        ))
    });

    let use_ansi = !args.no_color && std::io::stderr().is_terminal();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(use_ansi)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("creating log directory {}", config.log_dir.display()))?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise tracing: {e}"))?;

    Ok(guard)
}

/// Translate the verbosity counter and quiet flag to a level string, falling
/// back to the configured level.
fn derive_level(args: &GlobalArgs, configured: &str) -> String {
    if args.quiet {
        return "error".into();
    }
    match args.verbose {
        0 => configured.to_ascii_lowercase(),
        1 => "info".into(),
        2 => "debug".into(),
        _ => "trace".into(),
    }
}
