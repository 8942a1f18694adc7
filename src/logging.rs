use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{AppConfig, LogRotation};

/// Install the global subscriber.
///
/// Text mode writes to the rolling file and to ANSI stdout; JSON mode writes
/// only to the file. `RUST_LOG` overrides the configured level.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// stops the background writer.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (file_writer, guard) = file_writer(config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(file_writer),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_ansi(false).with_writer(file_writer))
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    guard
}

fn file_writer(config: &AppConfig) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(
        rotation(config.rotation),
        &config.log_dir,
        &config.log_file,
    );
    tracing_appender::non_blocking(appender)
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Apply `level` to this crate and keep dependencies at warn
fn filter_directive(level: &str) -> String {
    format!("warn,moneytransfer={}", level)
}
