use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::TransportError;
use crate::platform::Transport;

/// Telegram rejects texts over 4096 characters; stay under it in bytes.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Split long text into chunks of at most `max_len` bytes, preferring to
/// break after a newline, then after a space.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // max_len is smaller than the next char; take the whole char
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// `Transport` over HTTPS using reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    send_timeout: Duration,
}

impl HttpTransport {
    pub fn new(api_base_url: &str, bot_token: &str, send_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/bot{}", api_base_url.trim_end_matches('/'), bot_token),
            send_timeout,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.without_url().to_string()))
    }
}

// The bot token is part of every URL, so errors are stripped of it before
// they reach the logs.
fn network_error(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.without_url().to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        method: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<serde_json::Value, TransportError> {
        debug!("GET {} {:?}", method, query);

        let response = self
            .client
            .get(self.endpoint(method))
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(network_error)?;

        Self::read_json(response).await
    }

    async fn post(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        debug!("POST {}", method);

        let response = self
            .client
            .post(self.endpoint(method))
            .json(body)
            .timeout(self.send_timeout)
            .send()
            .await
            .map_err(network_error)?;

        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_includes_token_and_method() {
        let transport = HttpTransport::new(
            "https://api.telegram.org/",
            "123:abc",
            Duration::from_secs(10),
        );
        assert_eq!(
            transport.endpoint("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn test_short_message_is_one_chunk() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let chunks = split_message("aaaa\nbbbb\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc"]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "ëëëëë";
        let chunks = split_message(text, 3);
        assert!(chunks.iter().all(|c| c.len() <= 3));
        assert_eq!(chunks.concat(), text);
    }
}
