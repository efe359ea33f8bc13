//! Telegram Bot API HTTP 客户端

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::types::*;
use crate::bot::{ChatTransport, EditOutcome};
use crate::search::NavButton;

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error {code}: {description}")]
    Api {
        code: i64,
        description: String,
        retry_after: Option<u64>,
    },
    #[error("api returned ok without result")]
    EmptyResult,
}

impl TelegramError {
    /// Edit rejected because the content is identical / 内容未变化导致的编辑失败
    pub fn is_not_modified(&self) -> bool {
        matches!(self, TelegramError::Api { description, .. } if description.contains(PARSE_NOT_MODIFIED))
    }

    /// Seconds to wait before retrying (flood control) / 限流等待时间
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            TelegramError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// One row of inline buttons, `None` when there is nothing to attach / 构建内联键盘
pub fn keyboard(buttons: &[NavButton]) -> Option<InlineKeyboardMarkup> {
    if buttons.is_empty() {
        return None;
    }
    let row = buttons
        .iter()
        .map(|b| InlineKeyboardButton {
            text: b.label.to_string(),
            callback_data: b.token.clone(),
        })
        .collect();
    Some(InlineKeyboardMarkup {
        inline_keyboard: vec![row],
    })
}

/// Telegram 客户端
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// `poll_timeout` is the long polling wait, the HTTP timeout is a bit longer
    pub fn new(api_base: &str, token: &str, poll_timeout: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout + 15))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        // without_url: the URL embeds the bot token and must never reach the logs
        let resp = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let resp: ApiResponse<R> = resp.json().await.map_err(|e| e.without_url())?;

        if !resp.ok {
            return Err(TelegramError::Api {
                code: resp.error_code.unwrap_or_default(),
                description: resp.description.unwrap_or_default(),
                retry_after: resp.parameters.and_then(|p| p.retry_after),
            });
        }

        resp.result.ok_or(TelegramError::EmptyResult)
    }

    /// 获取机器人信息
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &EmptyRequest {}).await
    }

    /// 长轮询获取更新
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, TelegramError> {
        let req = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call("getUpdates", &req).await
    }

    pub async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message, TelegramError> {
        let req = SendMessageRequest { chat_id, text, reply_markup };
        self.call("sendMessage", &req).await
    }

    pub async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let req = EditMessageTextRequest {
            chat_id,
            message_id,
            text,
            reply_markup,
        };
        // Returns the edited Message (or `true` for inline messages)
        self.call::<_, serde_json::Value>("editMessageText", &req).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str, text: Option<&str>) -> Result<(), TelegramError> {
        let req = AnswerCallbackQueryRequest { callback_query_id, text };
        self.call::<_, bool>("answerCallbackQuery", &req).await?;
        Ok(())
    }

    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<(), TelegramError> {
        let req = SendChatActionRequest { chat_id, action };
        self.call::<_, bool>("sendChatAction", &req).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str, buttons: &[NavButton]) -> anyhow::Result<()> {
        self.send_text(chat_id, text, keyboard(buttons)).await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        buttons: &[NavButton],
    ) -> anyhow::Result<EditOutcome> {
        match self.edit_text(chat_id, message_id, text, keyboard(buttons)).await {
            Ok(()) => Ok(EditOutcome::Edited),
            Err(e) if e.is_not_modified() => Ok(EditOutcome::Unchanged),
            Err(e) => Err(e.into()),
        }
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> anyhow::Result<()> {
        self.answer_callback_query(callback_id, text).await?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> anyhow::Result<()> {
        self.send_chat_action(chat_id, CHAT_ACTION_TYPING).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn fake_api(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_keyboard() {
        assert!(keyboard(&[]).is_none());
        let markup = keyboard(&[
            NavButton { label: "⬅️ Ant.", token: "1|s|a|x|0".into() },
            NavButton { label: "Sig. ➡️", token: "1|s|a|x|2".into() },
        ])
        .unwrap();
        assert_eq!(markup.inline_keyboard.len(), 1);
        assert_eq!(markup.inline_keyboard[0][1].callback_data, "1|s|a|x|2");
    }

    #[test]
    fn test_update_deserialize() {
        let raw = json!({
            "update_id": 10,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 5, "is_bot": false, "first_name": "Ana"},
                "message": {"message_id": 77, "chat": {"id": 5, "type": "private"}, "text": "x"},
                "data": "1|p|Gomez|Ana|1"
            }
        });
        let update: Update = serde_json::from_value(raw).unwrap();
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.data.as_deref(), Some("1|p|Gomez|Ana|1"));
        assert_eq!(cb.message.unwrap().message_id, 77);
    }

    #[tokio::test]
    async fn test_not_modified_is_unchanged() {
        let app = Router::new().route(
            "/bot123:abc/editMessageText",
            post(|Json(_body): Json<Value>| async {
                Json(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
                }))
            }),
        );
        let base = fake_api(app).await;
        let client = TelegramClient::new(&base, "123:abc", 1).unwrap();

        let outcome = client.edit_message(1, 2, "same", &[]).await.unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_api_error_surfaces() {
        let app = Router::new().route(
            "/bot123:abc/sendMessage",
            post(|| async {
                Json(json!({
                    "ok": false,
                    "error_code": 429,
                    "description": "Too Many Requests: retry after 3",
                    "parameters": {"retry_after": 3}
                }))
            }),
        );
        let base = fake_api(app).await;
        let client = TelegramClient::new(&base, "123:abc", 1).unwrap();

        let err = client.send_text(1, "hola", None).await.unwrap_err();
        assert!(!err.is_not_modified());
        assert_eq!(err.retry_after(), Some(3));
    }
}
