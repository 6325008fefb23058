use thiserror::Error;

/// Failure reported by a [`Transport`](crate::platform::Transport) call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response body: {0}")]
    Decode(String),
}

/// Any failure retrieving a batch of updates. Consumed by the backoff loop.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server reported failure: {}", .description.as_deref().unwrap_or("no description"))]
    NotOk { description: Option<String> },
    #[error("malformed update batch: {0}")]
    Decode(String),
}

/// Failure delivering one outbound message.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server rejected message: {}", .description.as_deref().unwrap_or("no description"))]
    NotOk { description: Option<String> },
    #[error("malformed sendMessage response: {0}")]
    Decode(String),
}

/// Failure inside a message handler. Logged by the poller, never retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to send reply: {0}")]
    Send(#[from] SendError),
    #[error("failed to render reply: {0}")]
    Serialize(#[from] serde_json::Error),
}
