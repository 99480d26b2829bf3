//! Known chat users and broadcast recipient resolution.
//!
//! Every inbound update upserts its sender into `chat_users`. The broadcast
//! engine reads the table back through [`RecipientDirectory`], keeping users
//! with a private chat destination and skipping bot accounts.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::trace;

use crate::broadcast::{DirectoryError, Recipient, RecipientDirectory};

/// Row type returned by SQLite queries for chat users.
type ChatUserRow = (i64, Option<i64>, Option<String>, String);

/// A Telegram user seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownUser {
    /// Telegram user id.
    pub user_id: i64,
    /// Private chat with the bot, if the user has opened one.
    pub chat_id: Option<i64>,
    /// Telegram username without `@`.
    pub username: Option<String>,
    /// First name as set in Telegram.
    pub first_name: String,
    /// Whether the account is a bot.
    pub is_bot: bool,
}

/// SQLite-backed directory of chat users.
#[derive(Debug, Clone)]
pub struct ChatUserDirectory {
    db: SqlitePool,
}

impl ChatUserDirectory {
    /// Create a directory over `db`.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert or refresh a user.
    ///
    /// A known chat id is never cleared by a later update without one (for
    /// example a message the user sent in a group).
    ///
    /// # Errors
    ///
    /// Returns the SQLite error on failure.
    pub async fn remember(&self, user: &KnownUser) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO chat_users (user_id, chat_id, username, first_name, is_bot, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now')) \
             ON CONFLICT(user_id) DO UPDATE SET \
                chat_id = COALESCE(excluded.chat_id, chat_users.chat_id), \
                username = excluded.username, \
                first_name = excluded.first_name, \
                is_bot = excluded.is_bot, \
                updated_at = excluded.updated_at",
        )
        .bind(user.user_id)
        .bind(user.chat_id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(user.is_bot)
        .execute(&self.db)
        .await?;

        trace!(user_id = user.user_id, "chat user remembered");
        Ok(())
    }

    /// Number of users with a deliverable destination.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error on failure.
    pub async fn deliverable_count(&self) -> Result<u64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT count(*) FROM chat_users WHERE chat_id IS NOT NULL AND is_bot = 0",
        )
        .fetch_one(&self.db)
        .await?;
        Ok(count.unsigned_abs())
    }
}

#[async_trait]
impl RecipientDirectory for ChatUserDirectory {
    async fn list_deliverable_recipients(&self) -> Result<Vec<Recipient>, DirectoryError> {
        let rows: Vec<ChatUserRow> = sqlx::query_as(
            "SELECT user_id, chat_id, username, first_name FROM chat_users \
             WHERE chat_id IS NOT NULL AND is_bot = 0 \
             ORDER BY user_id",
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| DirectoryError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(user_id, chat_id, username, first_name)| {
                chat_id.map(|destination| Recipient {
                    destination,
                    display_name: display_name(user_id, username.as_deref(), &first_name),
                })
            })
            .collect())
    }
}

/// `@username` when set, else the first name, else the numeric id.
pub fn display_name(user_id: i64, username: Option<&str>, first_name: &str) -> String {
    match username.filter(|u| !u.is_empty()) {
        Some(username) => format!("@{username}"),
        None if !first_name.trim().is_empty() => first_name.trim().to_owned(),
        None => user_id.to_string(),
    }
}
