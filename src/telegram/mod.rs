//! Telegram adapter: UI formatting, slash commands, media transport, and bot
//! dispatcher.
//!
//! Maps inbound updates onto the broadcast [`Composer`], renders its
//! outcomes, and runs confirmed broadcasts through the [`DeliveryEngine`].
//! Handler failures are reported to the [`ErrorLog`] and never stop the
//! dispatcher.

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broadcast::report::{summarize, OVERFLOW_REPORT_FILE_NAME};
use crate::broadcast::{Authorizer, Composer, DeliveryEngine, OperatorNotice, TextOutcome};
use crate::error_log::ErrorLog;
use crate::recipients::{ChatUserDirectory, KnownUser};

pub mod commands;
pub mod media;
pub mod ui;

use self::ui::BroadcastAction;

// ---------------------------------------------------------------------------
// Shared state for handler injection
// ---------------------------------------------------------------------------

/// Services the bot handlers depend on.
#[derive(Clone)]
pub struct BotServices {
    /// Per-operator draft state machine.
    pub composer: Arc<Composer>,
    /// Broadcast fan-out and ledger.
    pub engine: Arc<DeliveryEngine>,
    /// Known chat users; every sender is recorded here.
    pub directory: Arc<ChatUserDirectory>,
    /// Persisted error log.
    pub errors: Arc<ErrorLog>,
    /// Operator capability check.
    pub authorizer: Arc<dyn Authorizer>,
    /// Names listed inline in delivery summaries.
    pub inline_name_limit: usize,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the Telegram bot adapter.
///
/// Starts the notice forwarder (album-ready prompts produced by debounce
/// timers) and the dispatcher with message and callback branches.
///
/// Blocks until the bot is stopped (Ctrl+C).
pub async fn run_telegram(
    bot: Bot,
    services: BotServices,
    mut notices_rx: mpsc::Receiver<OperatorNotice>,
) -> anyhow::Result<()> {
    let notice_bot = bot.clone();
    let _notice_handle = tokio::spawn(async move {
        while let Some(notice) = notices_rx.recv().await {
            let chat_id = ChatId(notice.operator_id());
            let text = match notice {
                OperatorNotice::AlbumReady { photos, .. } => ui::photos_ready_text(photos),
            };
            if let Err(e) = notice_bot.send_message(chat_id, text).await {
                warn!(error = %e, "failed to send operator notice");
            }
        }
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    info!("telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![services])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

// ---------------------------------------------------------------------------
// Message handler
// ---------------------------------------------------------------------------

/// Handle an incoming Telegram message.
///
/// Records the sender as a known chat user, then routes photos, slash
/// commands, and text to the composer.
async fn handle_message(bot: Bot, msg: Message, state: BotServices) -> ResponseResult<()> {
    let Some(ref user) = msg.from else {
        return Ok(());
    };
    // teloxide uses u64 for user IDs; the rest of the crate uses i64.
    let user_id = i64::try_from(user.id.0).unwrap_or(0);

    let known = KnownUser {
        user_id,
        chat_id: msg.chat.is_private().then_some(msg.chat.id.0),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        is_bot: user.is_bot,
    };
    if let Err(e) = state.directory.remember(&known).await {
        state
            .errors
            .report("telegram.remember_user", Some(user_id), &e)
            .await;
    }

    if let Err(e) = route_message(&bot, &msg, &state, user_id).await {
        state
            .errors
            .report("telegram.message", Some(user_id), &e)
            .await;
    }

    Ok(())
}

async fn route_message(
    bot: &Bot,
    msg: &Message,
    state: &BotServices,
    user_id: i64,
) -> anyhow::Result<()> {
    if let Some(sizes) = msg.photo() {
        let Some(photo) = media::largest_photo_id(sizes) else {
            return Ok(());
        };
        let album_id = msg.media_group_id().map(ToString::to_string);
        let outcome = state.composer.on_photo(user_id, photo, album_id);
        debug!(user_id, ?outcome, "photo routed");

        if let Some(reply) = ui::photo_outcome_text(outcome) {
            bot.send_message(msg.chat.id, reply).await?;
        }
        return Ok(());
    }

    let Some(text) = msg.text() else {
        debug!(user_id, "unsupported message type, ignoring");
        return Ok(());
    };

    if text.starts_with('/') {
        let reply = dispatch_command(text, state, user_id).await;
        bot.send_message(msg.chat.id, reply)
            .parse_mode(ParseMode::Html)
            .await?;
        return Ok(());
    }

    match state.composer.on_text(user_id, text) {
        TextOutcome::Preview {
            draft_id,
            composition,
        } => {
            let recipients = state.directory.deliverable_count().await.ok();
            media::send_preview(bot, msg.chat.id, draft_id, &composition, recipients).await?;
        }
        other => {
            if let Some(reply) = ui::text_outcome_text(&other) {
                bot.send_message(msg.chat.id, reply).await?;
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatcher
// ---------------------------------------------------------------------------

/// Parse and dispatch a slash command, returning the HTML response.
async fn dispatch_command(text: &str, state: &BotServices, user_id: i64) -> String {
    let without_slash = &text[1..];
    let full_command = without_slash
        .split_whitespace()
        .next()
        .unwrap_or(without_slash);
    // Strip @bot_name suffix if present
    let command = full_command.split('@').next().unwrap_or(full_command);
    let is_operator = state.authorizer.is_authorized_operator(user_id);

    match command {
        "help" | "start" => commands::handle_help(is_operator),
        "broadcast" => commands::handle_broadcast(&state.composer, user_id),
        "cancel" if is_operator => commands::handle_cancel(&state.composer, user_id),
        "history" if is_operator => commands::handle_history(state.engine.ledger()).await,
        "errors" if is_operator => commands::handle_errors(&state.errors).await,
        "cancel" | "history" | "errors" => ui::UNAUTHORIZED.to_owned(),
        _ => format!("Unknown command: /{}", ui::escape_html(command)),
    }
}

// ---------------------------------------------------------------------------
// Callback query handler
// ---------------------------------------------------------------------------

/// Handle the preview's Send and Cancel buttons.
async fn handle_callback(bot: Bot, query: CallbackQuery, state: BotServices) -> ResponseResult<()> {
    let user_id = i64::try_from(query.from.id.0).unwrap_or(0);

    let Some((action, draft_id)) = query.data.as_deref().and_then(ui::parse_callback) else {
        bot.answer_callback_query(&query.id)
            .text("Unknown action")
            .await?;
        return Ok(());
    };

    if let Err(e) = route_callback(&bot, &query, action, draft_id, &state, user_id).await {
        state
            .errors
            .report("telegram.callback", Some(user_id), &e)
            .await;
    }

    Ok(())
}

async fn route_callback(
    bot: &Bot,
    query: &CallbackQuery,
    action: BroadcastAction,
    draft_id: u64,
    state: &BotServices,
    user_id: i64,
) -> anyhow::Result<()> {
    let chat_id = ChatId(user_id);

    match action {
        BroadcastAction::Cancel => {
            let reply = ui::cancel_text(state.composer.cancel_draft(user_id, draft_id));
            bot.answer_callback_query(&query.id).text(reply).await?;
            bot.send_message(chat_id, reply).await?;
        }
        BroadcastAction::Send => {
            let composition = match state.composer.confirm(user_id, draft_id) {
                Ok(composition) => composition,
                Err(e) => {
                    bot.answer_callback_query(&query.id)
                        .text(ui::confirm_error_text(e))
                        .await?;
                    return Ok(());
                }
            };

            bot.answer_callback_query(&query.id)
                .text("Sending...")
                .await?;
            bot.send_message(chat_id, "Broadcast is being sent...")
                .await?;

            let outcome = match state.engine.deliver(user_id, &composition).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    bot.send_message(chat_id, "Broadcast failed: recipients are unavailable.")
                        .await?;
                    return Err(e.into());
                }
            };

            // The report goes out even if the summary message is refused.
            let summary = summarize(&outcome, state.inline_name_limit);
            let sent = bot
                .send_message(chat_id, summary.text)
                .parse_mode(ParseMode::Html)
                .await;

            if let Some(report) = summary.overflow_report {
                let file = InputFile::memory(report.into_bytes()).file_name(OVERFLOW_REPORT_FILE_NAME);
                bot.send_document(chat_id, file).await?;
            }
            sent?;
        }
    }

    Ok(())
}
