use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::platform::Sender;

const UNKNOWN: &str = "Unknown";

/// What the bot remembers about a registered chat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub first_name: String,
    pub username: String,
    pub language_code: String,
}

impl UserRecord {
    /// Build a record from the sender of a message; absent fields become "Unknown".
    pub fn from_sender(sender: Option<&Sender>) -> Self {
        let sender = sender.cloned().unwrap_or_default();
        Self {
            first_name: or_unknown(sender.first_name),
            username: or_unknown(sender.username),
            language_code: or_unknown(sender.language_code),
        }
    }
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

/// Registered users keyed by chat id.
///
/// Shared between the dispatcher, which writes on registration, and the
/// broadcaster, which reads. Clones share the same map. Readers that go on
/// to do network I/O take a [`UserDirectory::chat_ids`] snapshot instead of
/// holding the lock.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    inner: Arc<RwLock<BTreeMap<i64, UserRecord>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the record for `chat_id`
    pub async fn register(&self, chat_id: i64, record: UserRecord) {
        self.inner.write().await.insert(chat_id, record);
    }

    #[allow(dead_code)]
    pub async fn get(&self, chat_id: i64) -> Option<UserRecord> {
        self.inner.read().await.get(&chat_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    #[allow(dead_code)]
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Point-in-time copy of the registered chat ids, ascending.
    pub async fn chat_ids(&self) -> Vec<i64> {
        self.inner.read().await.keys().copied().collect()
    }

    /// The whole directory as indented JSON. Non-ASCII text is kept as-is.
    pub async fn to_pretty_json(&self) -> serde_json::Result<String> {
        let users = self.inner.read().await;
        serde_json::to_string_pretty(&*users)
    }
}
