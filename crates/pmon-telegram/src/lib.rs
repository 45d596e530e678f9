//! Telegram adapter (teloxide).
//!
//! This crate implements the `pmon-core` Notifier port over the Telegram Bot API.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ChatId, InputFile, Recipient},
};

use tokio::time::sleep;

use pmon_core::{domain::Destination, errors::Error, ports::Notifier, Result};

/// Telegram caps photo captions at 1024 characters.
pub const CAPTION_LIMIT: usize = 1024;
/// Telegram caps text messages at 4096 characters.
pub const MESSAGE_LIMIT: usize = 4096;

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    recipient: Recipient,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, destination: &Destination) -> Self {
        Self {
            bot,
            recipient: recipient_for(destination),
        }
    }

    pub fn from_token(token: &str, destination: &Destination) -> Self {
        Self::new(Bot::new(token), destination)
    }

    /// Resolve the bot's username; a cheap way to validate the token at startup.
    pub async fn whoami(&self) -> Result<String> {
        let me = self.with_retry(|| self.bot.get_me()).await?;
        Ok(me.username().to_string())
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Delivery(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "telegram flood control, retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_photo(&self, path: &Path, caption: &str) -> Result<()> {
        let caption = fit_text(caption, CAPTION_LIMIT);
        self.with_retry(|| {
            self.bot
                .send_photo(self.recipient.clone(), InputFile::file(path))
                .caption(caption.clone())
        })
        .await?;
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        let text = fit_text(text, MESSAGE_LIMIT);
        self.with_retry(|| self.bot.send_message(self.recipient.clone(), text.clone()))
            .await?;
        Ok(())
    }
}

fn recipient_for(destination: &Destination) -> Recipient {
    match destination {
        Destination::Chat(id) => Recipient::Id(ChatId(*id)),
        Destination::Channel(name) => Recipient::ChannelUsername(name.clone()),
    }
}

/// Truncate to at most `limit` characters, marking the cut with `...`.
fn fit_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    format!("{}...", text.chars().take(keep).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_destinations_map_to_chat_ids() {
        assert_eq!(
            recipient_for(&Destination::Chat(-1001234)),
            Recipient::Id(ChatId(-1001234))
        );
    }

    #[test]
    fn channel_destinations_map_to_usernames() {
        assert_eq!(
            recipient_for(&Destination::Channel("@printer".into())),
            Recipient::ChannelUsername("@printer".into())
        );
    }

    #[test]
    fn short_text_is_untouched() {
        let caption = "Print Status - 20240101_000000";
        assert_eq!(fit_text(caption, CAPTION_LIMIT), caption);
    }

    #[test]
    fn long_text_is_cut_to_the_limit() {
        let long = "é".repeat(MESSAGE_LIMIT + 10);
        let fitted = fit_text(&long, MESSAGE_LIMIT);
        assert_eq!(fitted.chars().count(), MESSAGE_LIMIT);
        assert!(fitted.ends_with("..."));
    }

    #[test]
    fn notifier_targets_the_configured_destination() {
        let n = TelegramNotifier::from_token("123:abc", &Destination::Chat(42));
        assert_eq!(n.recipient, Recipient::Id(ChatId(42)));
    }
}
