//! Minimal Telegram Bot API client: long-poll updates in, messages and
//! documents out. Only the handful of methods the bot needs.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use bot_core::{notify::MessageSink, Keyboard};
use shared::domain::ChatId;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum TelegramError {
    /// Another consumer is already long-polling this bot token.
    #[error("conflicting getUpdates consumer: {0}")]
    Conflict(String),
    #[error("telegram api error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

fn button(text: &str) -> KeyboardButton {
    KeyboardButton { text: text.into() }
}

/// Concrete reply markup for the controller's abstract keyboard choice.
pub fn reply_markup_for(keyboard: Keyboard) -> ReplyKeyboardMarkup {
    use bot_core::texts::{CLAIM_BUTTON, DONE_BUTTON, HELP_BUTTON, STATUS_BUTTON};

    let rows = match keyboard {
        Keyboard::Menu => vec![
            vec![button(CLAIM_BUTTON)],
            vec![button(STATUS_BUTTON), button(HELP_BUTTON)],
        ],
        Keyboard::Claim => vec![
            vec![button(DONE_BUTTON)],
            vec![button(STATUS_BUTTON), button(HELP_BUTTON)],
        ],
    };
    ReplyKeyboardMarkup {
        keyboard: rows,
        resize_keyboard: true,
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, TelegramError> {
        Self::with_api_base(token, API_BASE)
    }

    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base: format!("{api_base}/bot{token}"),
        })
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", json!({})).await
    }

    /// One long-poll round. Blocks server-side for up to `timeout_secs` when
    /// no updates are pending.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut payload = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call("getUpdates", payload).await
    }

    pub async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<Message, TelegramError> {
        let mut payload = json!({
            "chat_id": chat.0,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = serde_json::to_value(reply_markup_for(keyboard))?;
        }
        self.call("sendMessage", payload).await
    }

    pub async fn send_document(
        &self,
        chat: ChatId,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError> {
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat.0.to_string())
            .text("caption", caption.to_string())
            .part(
                "document",
                reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
            );
        let response = self
            .http
            .post(format!("{}/sendDocument", self.base))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body: ApiResponse<serde_json::Value> = response.json().await?;
        check_ok(status, &body)?;
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body: ApiResponse<T> = response.json().await?;
        check_ok(status, &body)?;
        body.result.ok_or_else(|| TelegramError::Api {
            code: 0,
            description: format!("{method} returned no result"),
        })
    }
}

fn check_ok<T>(
    status: reqwest::StatusCode,
    body: &ApiResponse<T>,
) -> Result<(), TelegramError> {
    if body.ok {
        return Ok(());
    }
    let description = body.description.clone().unwrap_or_default();
    let code = body.error_code.unwrap_or(i64::from(status.as_u16()));
    if code == 409 {
        return Err(TelegramError::Conflict(description));
    }
    Err(TelegramError::Api { code, description })
}

#[async_trait]
impl MessageSink for TelegramClient {
    async fn deliver(&self, chat: ChatId, text: &str) -> anyhow::Result<()> {
        self.send_message(chat, text, None).await?;
        Ok(())
    }
}
