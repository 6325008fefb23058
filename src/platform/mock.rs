//! Scripted in-memory `Transport` for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::platform::Transport;

#[derive(Debug, Clone)]
pub struct GetCall {
    pub method: String,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct PostCall {
    pub method: String,
    pub body: serde_json::Value,
}

/// Replays queued `get` responses in order and accepts every `post`
/// except those addressed to a chat marked as failing. Once the `get`
/// queue runs dry the `exhausted` token is cancelled and further gets fail.
#[derive(Default)]
pub struct MockTransport {
    gets: Mutex<VecDeque<Result<serde_json::Value, TransportError>>>,
    failing_chats: Mutex<HashSet<i64>>,
    get_calls: Mutex<Vec<GetCall>>,
    post_calls: Mutex<Vec<PostCall>>,
    pub exhausted: CancellationToken,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_get(&self, response: Result<serde_json::Value, TransportError>) {
        self.gets.lock().unwrap().push_back(response);
    }

    pub fn push_updates(&self, updates: serde_json::Value) {
        self.push_get(Ok(json!({ "ok": true, "result": updates })));
    }

    pub fn fail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn get_calls(&self) -> Vec<GetCall> {
        self.get_calls.lock().unwrap().clone()
    }

    pub fn post_calls(&self) -> Vec<PostCall> {
        self.post_calls.lock().unwrap().clone()
    }

    /// Text of every message sent to `chat_id`, in send order.
    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.post_calls()
            .into_iter()
            .filter(|c| c.body["chat_id"] == chat_id)
            .filter_map(|c| c.body["text"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        method: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<serde_json::Value, TransportError> {
        self.get_calls.lock().unwrap().push(GetCall {
            method: method.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            timeout,
            at: Instant::now(),
        });

        let next = self.gets.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => {
                self.exhausted.cancel();
                Err(TransportError::Network("script exhausted".to_string()))
            }
        }
    }

    async fn post(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let mut calls = self.post_calls.lock().unwrap();
        calls.push(PostCall {
            method: method.to_string(),
            body: body.clone(),
        });
        let message_id = calls.len();
        drop(calls);

        let chat_id = body["chat_id"].as_i64().unwrap_or_default();
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            return Err(TransportError::Status {
                status: 403,
                body: r#"{"ok":false,"description":"Forbidden: bot was blocked by the user"}"#
                    .to_string(),
            });
        }

        Ok(json!({ "ok": true, "result": { "message_id": message_id } }))
    }
}
