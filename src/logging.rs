use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{AppConfig, LogFormat};

/// Install the global subscriber.
///
/// Stderr always receives events, keeping stdout for command output. When
/// `log_dir` is configured a daily rolling file sink is added and the
/// returned guard must be kept alive until shutdown so buffered lines are
/// flushed.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let bridged = tracing_log::LogTracer::init().is_ok();

    let filter = EnvFilter::try_new(&config.log_filter)
        .with_context(|| format!("parse log filter {:?}", config.log_filter))?;

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "brokerdesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    if !bridged || !installed {
        // Tests and embedders may have set these up already; keep theirs.
        tracing::debug!(
            target: "brokerdesk",
            event = "logging_already_initialised",
            log_bridge = bridged,
            subscriber = installed
        );
    }

    Ok(guard)
}
