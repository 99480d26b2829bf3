//! Photo handling on the Telegram side: file id extraction, preview
//! rendering, and the teloxide-backed [`BroadcastTransport`].
//!
//! Photos are never downloaded. Telegram file ids are reusable across
//! chats for the same bot, so previews and broadcasts resend by id.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, ParseMode, PhotoSize};

use crate::broadcast::{BroadcastTransport, Composition, PhotoRef, TransportError};
use crate::telegram::ui;

/// File id of the largest size (last in the array by Telegram convention).
pub fn largest_photo_id(sizes: &[PhotoSize]) -> Option<PhotoRef> {
    sizes.last().map(|photo| photo.file.id.clone())
}

/// Build album media with the caption on the first item only.
pub fn album_media(photos: &[PhotoRef], caption: &str) -> Vec<InputMedia> {
    photos
        .iter()
        .enumerate()
        .map(|(idx, photo)| {
            let item = InputMediaPhoto::new(InputFile::file_id(photo.clone()));
            let item = if idx == 0 {
                item.caption(caption.to_owned())
            } else {
                item
            };
            InputMedia::Photo(item)
        })
        .collect()
}

/// Render a broadcast preview for the operator with Send/Cancel buttons.
///
/// A single photo carries the keyboard directly. Telegram albums cannot have
/// inline keyboards, so an album preview is followed by a separate prompt.
/// The buttons carry `draft_id` so they only ever act on this draft.
///
/// # Errors
///
/// Returns the Telegram request error if any send fails.
pub async fn send_preview(
    bot: &Bot,
    chat_id: ChatId,
    draft_id: u64,
    composition: &Composition,
    recipients: Option<u64>,
) -> ResponseResult<()> {
    match composition.photos.as_slice() {
        [single] => {
            bot.send_photo(chat_id, InputFile::file_id(single.clone()))
                .caption(composition.text.clone())
                .reply_markup(ui::broadcast_keyboard(draft_id))
                .await?;
        }
        photos => {
            bot.send_media_group(chat_id, album_media(photos, &composition.text))
                .await?;
            bot.send_message(chat_id, ui::preview_prompt(recipients))
                .parse_mode(ParseMode::Html)
                .reply_markup(ui::broadcast_keyboard(draft_id))
                .await?;
        }
    }
    Ok(())
}

/// Delivers broadcasts through the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Wrap a bot handle.
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl BroadcastTransport for TelegramTransport {
    async fn send_single(
        &self,
        destination: i64,
        photo: &PhotoRef,
        caption: &str,
    ) -> Result<(), TransportError> {
        self.bot
            .send_photo(ChatId(destination), InputFile::file_id(photo.clone()))
            .caption(caption.to_owned())
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn send_group(
        &self,
        destination: i64,
        photos: &[PhotoRef],
        caption: &str,
    ) -> Result<(), TransportError> {
        self.bot
            .send_media_group(ChatId(destination), album_media(photos, caption))
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
