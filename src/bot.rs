use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::error::SendError;
use crate::platform::{ApiResponse, Transport};

/// Acknowledgement for a delivered message
#[derive(Debug, Clone, PartialEq)]
pub struct SendAck {
    pub message_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: Option<i64>,
}

/// Outbound side of the Bot API
#[derive(Clone)]
pub struct Bot {
    transport: Arc<dyn Transport>,
}

impl Bot {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `text` to `chat_id`.
    ///
    /// Failures are logged here with the target chat; callers are expected
    /// to treat the returned error as non-fatal.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<SendAck, SendError> {
        let result = self.try_send(chat_id, text).await;
        match &result {
            Ok(ack) => debug!("Sent message {:?} to {}", ack.message_id, chat_id),
            Err(e) => error!("Error sending message to {}: {}", chat_id, e),
        }
        result
    }

    async fn try_send(&self, chat_id: i64, text: &str) -> Result<SendAck, SendError> {
        let body = json!({ "chat_id": chat_id, "text": text });
        let value = self.transport.post("sendMessage", &body).await?;

        let response: ApiResponse<SentMessage> =
            serde_json::from_value(value).map_err(|e| SendError::Decode(e.to_string()))?;

        if !response.ok {
            return Err(SendError::NotOk {
                description: response.description,
            });
        }

        Ok(SendAck {
            message_id: response.result.and_then(|m| m.message_id),
        })
    }
}
