//! Tracing subscriber setup.
//!
//! The terminal layer writes to stderr with the `RUST_LOG` filter, so log lines
//! never interleave with the conversation on stdout. With a log directory, a
//! second layer writes the full DEBUG transcript of the session to a file.

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const TRANSCRIPT_FILTER: &str = "debug,hyper=warn,h2=warn,reqwest=warn,rustls=warn,tokio=warn";

pub fn transcript_file_name(at: NaiveDateTime) -> String {
    format!("agent_log_{}.txt", at.format("%Y-%m-%d_%H%M%S"))
}

/// Installs the global subscriber. The returned guard must be held until exit
/// or buffered transcript lines are lost.
pub fn init(filter: &str, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let terminal_filter =
        EnvFilter::try_new(filter).with_context(|| format!("Invalid log filter '{filter}'"))?;
    let terminal_layer = fmt::layer()
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (path, writer, guard) = open_transcript(dir)?;
            let layer = fmt::layer()
                .with_timer(ChronoLocal::rfc_3339())
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(TRANSCRIPT_FILTER));
            eprintln!("Logging session transcript to {}", path.display());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn open_transcript(
    dir: &Path,
) -> anyhow::Result<(
    PathBuf,
    tracing_appender::non_blocking::NonBlocking,
    WorkerGuard,
)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let name = transcript_file_name(Local::now().naive_local());
    let appender = tracing_appender::rolling::never(dir, &name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((dir.join(name), writer, guard))
}
