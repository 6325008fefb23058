pub mod telegram;

#[cfg(test)]
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TransportError;

/// HTTP access to the Bot API. `method` is the API method name
/// (e.g. "getUpdates"), appended to the transport's base URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        method: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<serde_json::Value, TransportError>;

    async fn post(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError>;
}

/// Envelope wrapping every Bot API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

/// One inbound event. Immutable once received.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<Sender>,
}

impl Message {
    pub fn chat_id(&self) -> i64 {
        self.chat.id
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}
