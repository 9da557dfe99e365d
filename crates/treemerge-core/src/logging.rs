use anyhow::Context;
use std::path::Path;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Name of the log file written under the log directory.
pub const LOG_FILE: &str = "treemerge.log";

/// Route merge events to `<log_dir>/treemerge.log` and to stderr, at `info`
/// unless `RUST_LOG` sets a filter. stdout stays free for merged trees.
///
/// File writes go through a background worker; keep the returned guard alive
/// until the last event of the run, dropping it flushes the file.
pub fn init_logging(
    log_dir: &Path,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file_appender(log_dir)?);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}

/// Stderr-only logging for runs without a log directory, at `warn` unless
/// `RUST_LOG` sets a filter.
pub fn init_console_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Never-rotated appender for [`LOG_FILE`], creating `log_dir` first.
fn log_file_appender(log_dir: &Path) -> anyhow::Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    Ok(rolling::never(log_dir, LOG_FILE))
}
