use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::settings::{user_cache_dir, Settings};

/// Environment variable holding a filter directive, e.g. `pathzoom=debug`.
pub const LOG_ENV: &str = "PATHZOOM_LOG";

/// Install the global subscriber: stderr always, plus a daily rolling file
/// in the cache directory when `log_to_file` is set. Keep the returned
/// guard alive until exit so buffered file output is flushed.
pub fn init_logging(settings: &Settings) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file, guard) = match (settings.log_to_file, user_cache_dir()) {
        (true, Some(dir)) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(dir, "pathzoom.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file);
    tracing::subscriber::set_global_default(subscriber)?;
    // Route `log` records from dependencies into tracing.
    tracing_log::LogTracer::init()?;
    Ok(guard)
}
