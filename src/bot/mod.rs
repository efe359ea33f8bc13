//! Bot front end - chat transport seam, events and the polling loop / 机器人前端
//!
//! ```text
//! TelegramClient ──getUpdates──► Event ──► Dispatcher ──► SearchEngine
//!        ▲                                     │
//!        └────────── ChatTransport ◄───────────┘
//! ```

pub mod command;
pub mod dispatcher;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::search::NavButton;
use crate::telegram::{TelegramClient, Update};

pub use command::Command;
pub use dispatcher::Dispatcher;

/// Wait after a failed poll / 轮询失败后的等待时间
pub const POLL_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    /// Content identical to what is shown / 内容未变化
    Unchanged,
}

/// Outbound side of the messaging transport / 消息通道（发送方向）
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, buttons: &[NavButton]) -> anyhow::Result<()>;

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        buttons: &[NavButton],
    ) -> anyhow::Result<EditOutcome>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> anyhow::Result<()>;

    async fn send_typing(&self, chat_id: i64) -> anyhow::Result<()>;
}

/// Inbound interaction / 入站事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Text {
        chat_id: i64,
        text: String,
    },
    Callback {
        callback_id: String,
        /// Message carrying the buttons; gone if too old / 按钮所在的消息
        target: Option<(i64, i64)>,
        data: String,
    },
}

impl Event {
    /// Extract the interaction we handle, if any / 提取需要处理的事件
    pub fn from_update(update: Update) -> Option<Event> {
        if let Some(cb) = update.callback_query {
            let target = cb.message.map(|m| (m.chat.id, m.message_id));
            return Some(Event::Callback {
                callback_id: cb.id,
                target,
                data: cb.data.unwrap_or_default(),
            });
        }

        let message = update.message?;
        let text = message.text?;
        Some(Event::Text {
            chat_id: message.chat.id,
            text,
        })
    }
}

/// Long polling loop / 长轮询循环
///
/// Each event is handled in its own task. Never returns.
pub async fn run_polling(client: Arc<TelegramClient>, dispatcher: Arc<Dispatcher>, timeout: u64) {
    let mut offset = 0i64;
    tracing::info!("Polling for updates");

    loop {
        let updates = match client.get_updates(offset, timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                let wait = e.retry_after().map(Duration::from_secs).unwrap_or(POLL_BACKOFF);
                tracing::warn!("getUpdates failed: {}, retrying in {:?}", e, wait);
                tokio::time::sleep(wait).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(event) = Event::from_update(update) else {
                continue;
            };
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.handle(event).await;
            });
        }
    }
}
