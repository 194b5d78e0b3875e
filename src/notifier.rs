//! Outbound message delivery.

use async_trait::async_trait;
use common::Error;
use reports::chunk_for_delivery;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::warn;

/// Sends one Telegram-HTML message to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_html(&self, target: ChatId, text: &str) -> Result<(), Error>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_html(&self, target: ChatId, text: &str) -> Result<(), Error> {
        self.bot
            .send_message(target, text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| Error::Telegram(e.to_string()))
    }
}

/// Send `text` in paragraph-aligned chunks, in order.
///
/// A failed chunk is logged and the rest are still sent. Returns how many
/// chunks went out.
pub async fn deliver_chunked(
    notifier: &dyn Notifier,
    target: ChatId,
    text: &str,
    max_chars: usize,
) -> usize {
    let mut delivered = 0usize;
    for (i, chunk) in chunk_for_delivery(text, max_chars).iter().enumerate() {
        if chunk.trim().is_empty() {
            continue;
        }
        match notifier.send_html(target, chunk).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Delivery of chunk {} to chat {} failed: {}", i, target.0, e),
        }
    }
    delivered
}
