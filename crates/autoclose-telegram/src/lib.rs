//! Telegram adapter (teloxide).
//!
//! The inbox is one forum supergroup; every support thread is a forum topic
//! and its topic id is the thread's channel id.

use async_trait::async_trait;
use teloxide::prelude::*;
use tokio::time::sleep;

pub mod handlers;
pub mod router;

use autoclose_core::{
    domain::ChannelId, errors::Error, messaging::port::ThreadNotifier, ports::Thread, Result,
};

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    inbox: teloxide::types::ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, inbox_chat_id: i64) -> Self {
        Self {
            bot,
            inbox: teloxide::types::ChatId(inbox_chat_id),
        }
    }

    fn topic_id(channel_id: &ChannelId) -> Result<i32> {
        channel_id.as_str().parse::<i32>().map_err(|_| {
            Error::External(format!("channel id {channel_id} is not a forum topic id"))
        })
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
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
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

#[async_trait]
impl ThreadNotifier for TelegramNotifier {
    async fn post_system_message(&self, thread: &Thread, text: &str) -> Result<()> {
        let topic = Self::topic_id(&thread.channel_id)?;
        self.with_retry(|| {
            self.bot
                .send_message(self.inbox, text.to_string())
                .message_thread_id(topic)
        })
        .await?;
        Ok(())
    }
}
