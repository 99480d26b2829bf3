//! Coachbot CLI entry point.
//!
//! Provides `start` to run the Telegram bot, plus `history` and `errors` to
//! inspect the persisted ledgers without going through Telegram.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use teloxide::Bot;
use tokio::sync::mpsc;
use tracing::info;

use coachbot::broadcast::{
    AllowList, Authorizer, BroadcastRecord, Composer, ComposerSettings, DeliveryEngine,
};
use coachbot::config::{load_config, runtime_paths, Config, RuntimePaths};
use coachbot::error_log::ErrorLog;
use coachbot::ledger::BoundedLedger;
use coachbot::recipients::ChatUserDirectory;
use coachbot::telegram::media::TelegramTransport;
use coachbot::telegram::{run_telegram, BotServices};

/// Buffer for album-ready notices between timer tasks and the sender.
const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// Coachbot: Telegram front end of the coaching service.
#[derive(Parser)]
#[command(name = "coachbot", version, about)]
struct Cli {
    /// Path to config.toml (default: ~/.coachbot/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the Telegram bot.
    Start,
    /// Print recent broadcast outcomes.
    History {
        /// Number of entries to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print recently reported errors.
    Errors {
        /// Number of entries to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = runtime_paths()?;
    let config_path = cli.config.unwrap_or_else(|| paths.config_toml.clone());

    match cli.command {
        Command::Start => handle_start(&paths, &config_path).await,
        Command::History { limit } => handle_history(&paths, &config_path, limit).await,
        Command::Errors { limit } => handle_errors(&paths, &config_path, limit).await,
    }
}

/// Run the bot until Ctrl+C.
async fn handle_start(paths: &RuntimePaths, config_path: &Path) -> anyhow::Result<()> {
    let _logging_guard = coachbot::logging::init_production(&paths.logs_dir)?;

    // A missing .env is fine; the token may come from the real environment.
    let _ = dotenvy::from_path(&paths.env_file);

    let config = load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let token = std::env::var(&config.telegram.bot_token_env).with_context(|| {
        format!(
            "bot token env var {} is not set",
            config.telegram.bot_token_env
        )
    })?;

    let db = coachbot::db::open(&paths.database).await?;
    info!(path = %paths.database.display(), "database opened");

    let bot = Bot::new(token);
    let authorizer: Arc<dyn Authorizer> =
        Arc::new(AllowList::new(config.telegram.operators.iter().copied()));
    let (notices_tx, notices_rx) = mpsc::channel(NOTICE_CHANNEL_CAPACITY);

    let composer = Arc::new(Composer::new(
        ComposerSettings::from(&config.broadcast),
        Arc::clone(&authorizer),
        notices_tx,
    ));
    let directory = Arc::new(ChatUserDirectory::new(db.clone()));
    let engine = Arc::new(DeliveryEngine::new(
        directory.clone(),
        Arc::new(TelegramTransport::new(bot.clone())),
        BoundedLedger::new(db.clone(), config.ledger.broadcast_capacity),
        config.broadcast.send_timeout(),
    ));
    let errors = Arc::new(ErrorLog::new(db, config.ledger.error_capacity));

    info!(
        operators = config.telegram.operators.len(),
        debounce_ms = config.broadcast.album_debounce_ms,
        max_photos = config.broadcast.max_photos,
        max_caption_chars = config.broadcast.max_caption_chars,
        "coachbot starting"
    );

    let services = BotServices {
        composer,
        engine,
        directory,
        errors,
        authorizer,
        inline_name_limit: config.broadcast.inline_name_limit,
    };

    run_telegram(bot, services, notices_rx).await
}

/// Print the broadcast ledger, newest first.
async fn handle_history(
    paths: &RuntimePaths,
    config_path: &Path,
    limit: usize,
) -> anyhow::Result<()> {
    coachbot::logging::init_cli();
    let config = load_cli_config(config_path)?;
    let db = coachbot::db::open(&paths.database).await?;
    let ledger: BoundedLedger<BroadcastRecord> =
        BoundedLedger::new(db, config.ledger.broadcast_capacity);

    let entries = ledger.recent(limit).await?;
    if entries.is_empty() {
        println!("No broadcasts recorded.");
    }
    for stamped in entries {
        let record = stamped.entry;
        println!(
            "{}  operator={}  total={} success={} failure={}  photos={}  {}",
            stamped.created_at.to_rfc3339(),
            record.operator_id,
            record.total,
            record.success,
            record.failure,
            record.photo_refs.len(),
            record.text.replace('\n', " "),
        );
    }
    Ok(())
}

/// Print the error ledger, newest first.
async fn handle_errors(
    paths: &RuntimePaths,
    config_path: &Path,
    limit: usize,
) -> anyhow::Result<()> {
    coachbot::logging::init_cli();
    let config = load_cli_config(config_path)?;
    let db = coachbot::db::open(&paths.database).await?;
    let errors = ErrorLog::new(db, config.ledger.error_capacity);

    let entries = errors.recent(limit).await?;
    if entries.is_empty() {
        println!("No errors recorded.");
    }
    for stamped in entries {
        let record = stamped.entry;
        let operator = record
            .operator_id
            .map_or_else(|| "-".to_owned(), |id| id.to_string());
        println!(
            "{}  [{}]  user={}  {}",
            stamped.created_at.to_rfc3339(),
            record.context,
            operator,
            record.message.replace('\n', " "),
        );
    }
    Ok(())
}

/// Read-only commands only need ledger capacities; fall back to defaults
/// when no config file exists yet.
fn load_cli_config(config_path: &Path) -> anyhow::Result<Config> {
    if config_path.exists() {
        load_config(config_path)
    } else {
        Config::from_toml("[telegram]\n")
    }
}
