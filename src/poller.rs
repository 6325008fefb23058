//! Long-poll loop over `getUpdates`.
//!
//! [`UpdatePoller`] owns the delivery offset. Each successful fetch is
//! processed in ascending `update_id` order and the offset moves past every
//! update whether or not its handler succeeded, so a failing handler drops
//! that update instead of replaying it forever. A failed fetch leaves the
//! offset alone and feeds the [`Backoff`].

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::error::{DispatchError, FetchError};
use crate::handler::MessageHandler;
use crate::platform::{ApiResponse, Message, Transport, Update};

/// Long-poll parameters. The HTTP request is given `request_margin` on top of
/// the server-side `timeout` so an empty poll returns before the client gives up.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout: Duration,
    pub request_margin: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            request_margin: Duration::from_secs(10),
        }
    }
}

impl PollSettings {
    pub fn request_timeout(&self) -> Duration {
        self.timeout + self.request_margin
    }
}

/// Result of one successful fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub count: usize,
}

// Messages are decoded one by one so a single odd update cannot fail the batch.
#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

pub struct UpdatePoller {
    transport: Arc<dyn Transport>,
    settings: PollSettings,
    backoff: Backoff,
    shutdown: CancellationToken,
    offset: Option<i64>,
}

impl UpdatePoller {
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: PollSettings,
        backoff: Backoff,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            settings,
            backoff,
            shutdown,
            offset: None,
        }
    }

    /// Next `update_id` to request, once any update has been seen.
    #[allow(dead_code)]
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    #[allow(dead_code)]
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Fetch one batch and hand every message in it to `handler`.
    ///
    /// If shutdown is requested while waiting on the server the fetch is
    /// abandoned and an empty outcome is returned. A batch that has already
    /// arrived is always processed to the end.
    pub async fn poll_once(
        &mut self,
        handler: &dyn MessageHandler,
    ) -> Result<BatchOutcome, FetchError> {
        let batch = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Ok(BatchOutcome { count: 0 }),
            batch = self.fetch() => batch?,
        };
        Ok(self.process(batch, handler).await)
    }

    /// Poll until shutdown, backing off after failed fetches.
    pub async fn run(&mut self, handler: &dyn MessageHandler) {
        info!(
            "Polling for updates (timeout {}s)",
            self.settings.timeout.as_secs()
        );

        while !self.shutdown.is_cancelled() {
            match self.poll_once(handler).await {
                Ok(outcome) => {
                    self.backoff.reset();
                    if outcome.count > 0 {
                        debug!(
                            "Processed {} update(s), offset now {:?}",
                            outcome.count, self.offset
                        );
                    }
                }
                Err(e) => {
                    error!("Error processing updates: {}", e);
                    let delay = self.backoff.on_failure();
                    info!("Waiting for {} seconds.", delay.as_secs());
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("Poller stopped");
    }

    async fn fetch(&self) -> Result<Vec<RawUpdate>, FetchError> {
        let mut query = vec![("timeout", self.settings.timeout.as_secs().to_string())];
        if let Some(offset) = self.offset {
            query.push(("offset", offset.to_string()));
        }

        let value = self
            .transport
            .get("getUpdates", &query, self.settings.request_timeout())
            .await?;

        let response: ApiResponse<Vec<RawUpdate>> =
            serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))?;

        if !response.ok {
            return Err(FetchError::NotOk {
                description: response.description,
            });
        }

        let mut updates = response
            .result
            .ok_or_else(|| FetchError::Decode("response has no result".to_string()))?;
        updates.sort_by_key(|u| u.update_id);
        Ok(updates)
    }

    async fn process(
        &mut self,
        batch: Vec<RawUpdate>,
        handler: &dyn MessageHandler,
    ) -> BatchOutcome {
        let count = batch.len();

        for raw in batch {
            let update = decode_update(raw);
            if update.message.is_some() {
                match handler.handle(&update).await {
                    Ok(()) => {}
                    // Already logged with its chat id by the sender
                    Err(DispatchError::Send(_)) => {}
                    Err(e) => warn!("Handler failed for update {}: {}", update.update_id, e),
                }
            }
            self.advance(update.update_id);
        }

        BatchOutcome { count }
    }

    fn advance(&mut self, update_id: i64) {
        let next = update_id.saturating_add(1);
        self.offset = Some(self.offset.map_or(next, |current| current.max(next)));
    }
}

fn decode_update(raw: RawUpdate) -> Update {
    let update_id = raw.update_id;
    let message = raw
        .message
        .and_then(|value| match serde_json::from_value::<Message>(value) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping undecodable message in update {}: {}", update_id, e);
                None
            }
        });

    Update { update_id, message }
}
