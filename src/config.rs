//! Configuration loading and validation.
//!
//! Coachbot reads a single human-owned `config.toml` from the runtime
//! directory (`~/.coachbot/` unless `--config` points elsewhere). A handful
//! of values can be overridden through environment variables so deployments
//! can adjust them without editing the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Telegram bot settings.
    pub telegram: TelegramConfig,

    /// Broadcast composition and delivery tuning.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Capacities of the persisted outcome ledgers.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Telegram-specific configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable name holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// Telegram user IDs allowed to compose and send broadcasts.
    #[serde(default)]
    pub operators: Vec<i64>,
}

/// Broadcast composition and delivery tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    /// Quiet period after the last album photo before the draft moves on.
    #[serde(default = "default_album_debounce_ms")]
    pub album_debounce_ms: u64,

    /// Maximum photos a single broadcast may carry.
    #[serde(default = "default_max_photos")]
    pub max_photos: usize,

    /// Longest accepted caption in characters. Telegram rejects photo
    /// captions above 1024.
    #[serde(default = "default_max_caption_chars")]
    pub max_caption_chars: usize,

    /// Names listed inline in the delivery summary before the overflow
    /// report is attached instead.
    #[serde(default = "default_inline_name_limit")]
    pub inline_name_limit: usize,

    /// Per-recipient send timeout in seconds. `0` disables the timeout.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl BroadcastConfig {
    /// Album debounce window as a [`Duration`].
    pub fn album_debounce(&self) -> Duration {
        Duration::from_millis(self.album_debounce_ms)
    }

    /// Per-recipient send timeout, or `None` when disabled.
    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_secs > 0).then(|| Duration::from_secs(self.send_timeout_secs))
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            album_debounce_ms: default_album_debounce_ms(),
            max_photos: default_max_photos(),
            max_caption_chars: default_max_caption_chars(),
            inline_name_limit: default_inline_name_limit(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

/// Capacities of the two persisted ledgers.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Maximum retained broadcast outcome records.
    #[serde(default = "default_ledger_capacity")]
    pub broadcast_capacity: u32,

    /// Maximum retained error records.
    #[serde(default = "default_ledger_capacity")]
    pub error_capacity: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_ledger_capacity(),
            error_capacity: default_ledger_capacity(),
        }
    }
}

// Default value functions for serde

fn default_bot_token_env() -> String {
    "COACHBOT_TELEGRAM_TOKEN".to_owned()
}
fn default_album_debounce_ms() -> u64 {
    700
}
fn default_max_photos() -> usize {
    3
}
fn default_max_caption_chars() -> usize {
    1024
}
fn default_inline_name_limit() -> usize {
    20
}
fn default_send_timeout_secs() -> u64 {
    30
}
fn default_ledger_capacity() -> u32 {
    500
}

impl Config {
    /// Parse and validate a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a value is out of range.
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the broadcast engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.broadcast.max_photos == 0 {
            anyhow::bail!("broadcast.max_photos must be at least 1");
        }
        if self.broadcast.max_caption_chars == 0 {
            anyhow::bail!("broadcast.max_caption_chars must be at least 1");
        }
        if self.broadcast.inline_name_limit == 0 {
            anyhow::bail!("broadcast.inline_name_limit must be at least 1");
        }
        if self.ledger.broadcast_capacity == 0 {
            anyhow::bail!("ledger.broadcast_capacity must be at least 1");
        }
        if self.ledger.error_capacity == 0 {
            anyhow::bail!("ledger.error_capacity must be at least 1");
        }
        if self.telegram.bot_token_env.trim().is_empty() {
            anyhow::bail!("telegram.bot_token_env must not be empty");
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests never touch the process environment.
    /// - `COACHBOT_OPERATORS`: comma-separated operator user IDs (replaces the list)
    /// - `COACHBOT_ALBUM_DEBOUNCE_MS`: album debounce window
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = env("COACHBOT_OPERATORS") {
            let parsed: Result<Vec<i64>, _> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<i64>)
                .collect();
            match parsed {
                Ok(ids) => self.telegram.operators = ids,
                Err(e) => tracing::warn!(error = %e, "ignoring invalid COACHBOT_OPERATORS"),
            }
        }

        if let Some(raw) = env("COACHBOT_ALBUM_DEBOUNCE_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.broadcast.album_debounce_ms = ms,
                Err(e) => tracing::warn!(error = %e, "ignoring invalid COACHBOT_ALBUM_DEBOUNCE_MS"),
            }
        }
    }
}

/// Load the config from a TOML file and apply process env overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let mut config = Config::from_toml(&contents)
        .map_err(|e| anyhow::anyhow!("{e} (in {})", path.display()))?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Filesystem layout of the runtime directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Runtime root (`~/.coachbot`).
    pub root: PathBuf,
    /// Human-owned configuration file.
    pub config_toml: PathBuf,
    /// Dotenv file holding the bot token.
    pub env_file: PathBuf,
    /// SQLite database with the ledgers and known chat users.
    pub database: PathBuf,
    /// Rotated JSON log files.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Build the layout under an explicit root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_toml: root.join("config.toml"),
            env_file: root.join(".env"),
            database: root.join("coachbot.db"),
            logs_dir: root.join("logs"),
            root,
        }
    }
}

/// Resolve the default runtime directory (`~/.coachbot/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(RuntimePaths::with_root(home.home_dir().join(".coachbot")))
}
