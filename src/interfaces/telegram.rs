use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::{ApiError, RequestError};
use teloxide::payloads::{SendMessageSetters, SendPhotoSetters};
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode, Recipient};
use tracing::{error, info, warn};

use crate::core::config::TelegramCredentials;
use crate::core::relay::Dispatcher;
use crate::core::report::Report;
use crate::core::report::format::{MessageFormatter, escape_html, truncate_chars, truncate_html};
use crate::interfaces::iceout::MediaDownloader;

pub const CAPTION_LIMIT: usize = 1024;
pub const MESSAGE_LIMIT: usize = 4096;

/// `-100123…` style ids address a chat directly, anything else is a public
/// channel username (the leading `@` is optional).
pub fn parse_recipient(chat_id: &str) -> Recipient {
    let chat_id = chat_id.trim();
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if chat_id.starts_with('@') => Recipient::ChannelUsername(chat_id.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{}", chat_id)),
    }
}

/// Telegram rejected the HTML markup itself; worth one more try as plain
/// text. Transport and decoding failures never qualify: the message may
/// already have been posted.
pub(crate) fn is_markup_error(err: &RequestError) -> bool {
    match err {
        RequestError::Api(ApiError::CantParseEntities(_)) => true,
        RequestError::Api(ApiError::Unknown(description)) => {
            description.to_lowercase().contains("can't parse")
        }
        _ => false,
    }
}

/// Body for one send attempt: escaped and cut for HTML mode, just cut otherwise.
pub(crate) fn prepare_body(text: &str, html: bool, limit: usize) -> String {
    if html {
        truncate_html(&escape_html(text), limit)
    } else {
        truncate_chars(text, limit)
    }
}

pub struct TelegramDispatcher {
    bot: Bot,
    recipient: Recipient,
    formatter: MessageFormatter,
    media: MediaDownloader,
}

impl TelegramDispatcher {
    pub fn new(
        credentials: &TelegramCredentials,
        formatter: MessageFormatter,
        media: MediaDownloader,
        timeout: Duration,
    ) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            bot: Bot::with_client(&credentials.bot_token, client),
            recipient: parse_recipient(&credentials.chat_id),
            formatter,
            media,
        })
    }

    #[cfg(test)]
    fn with_api_url(mut self, url: url::Url) -> Self {
        self.bot = self.bot.set_api_url(url);
        self
    }

    async fn deliver(&self, text: &str, photo: Option<&[u8]>, html: bool) -> Result<(), RequestError> {
        match photo {
            Some(bytes) => {
                let file = InputFile::memory(bytes.to_vec()).file_name("report.jpg");
                let mut req = self
                    .bot
                    .send_photo(self.recipient.clone(), file)
                    .caption(prepare_body(text, html, CAPTION_LIMIT));
                if html {
                    req = req.parse_mode(ParseMode::Html);
                }
                req.await?;
            }
            None => {
                let mut req = self
                    .bot
                    .send_message(self.recipient.clone(), prepare_body(text, html, MESSAGE_LIMIT));
                if html {
                    req = req.parse_mode(ParseMode::Html);
                }
                req.await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Dispatcher<Report> for TelegramDispatcher {
    async fn send(&self, report: &Report) -> bool {
        let text = self.formatter.format(report);
        let photo = match report.photo_url() {
            Some(url) => self.media.download(url).await,
            None => None,
        };

        let err = match self.deliver(&text, photo.as_deref(), true).await {
            Ok(()) => {
                info!("[telegram] Report #{} sent", report.id);
                return true;
            }
            Err(e) => e,
        };

        error!("[telegram] Report #{} rejected: {}", report.id, err);
        if !is_markup_error(&err) {
            return false;
        }

        warn!("[telegram] Retrying report #{} as plain text", report.id);
        match self.deliver(&text, photo.as_deref(), false).await {
            Ok(()) => {
                info!("[telegram] Report #{} sent as plain text", report.id);
                true
            }
            Err(e) => {
                error!("[telegram] Plain-text fallback for report #{} failed: {}", report.id, e);
                false
            }
        }
    }
}
