//! Tracing subscribers for the bot and the CLI listings.
//!
//! `start` keeps a rotated JSON trail under the runtime `logs/` directory
//! next to a console layer; `history` and `errors` log to stderr only so
//! their stdout listing stays pipeable.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "coachbot.log";

/// Used when `RUST_LOG` is unset or unparseable. teloxide polling and sqlx
/// statement logs drown out broadcast events at `info`.
pub const DEFAULT_DIRECTIVES: &str = "info,teloxide=warn,sqlx=warn";

/// Keeps the background log writer alive; drop it last to flush.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Install the long-running bot subscriber.
///
/// Broadcast outcomes and ledger failures land in
/// `{logs_dir}/coachbot.log.YYYY-MM-DD` as JSON, one object per event.
///
/// # Errors
///
/// Fails if `logs_dir` cannot be created.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", logs_dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(resolve_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(LoggingGuard { _guard: guard })
}

/// Stderr-only subscriber for the one-shot listing commands.
pub fn init_cli() {
    tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();
}

/// Filter from a `RUST_LOG` value, falling back to [`DEFAULT_DIRECTIVES`].
pub fn resolve_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}
