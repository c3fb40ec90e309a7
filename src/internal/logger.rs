use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn timer() -> ChronoLocal {
    ChronoLocal::new(TIMESTAMP_FORMAT.to_string())
}

/// Logs to stdout and appends the same lines to `log_file`.
///
/// `json` switches stdout to JSON lines; the file always gets plain text.
pub fn init(log_file: &str, json: bool) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Could not open log file {}", log_file))?;

    let stdout_layer = if json {
        fmt::layer().json().with_timer(timer()).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_ansi(true)
            .with_timer(timer())
            .boxed()
    };

    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_timer(timer())
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(LevelFilter::INFO)
        .try_init()
        .context("Could not install the tracing subscriber")?;

    Ok(())
}
