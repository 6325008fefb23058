use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bot::Bot;
use crate::users::UserDirectory;

/// Outcome of one broadcast cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
    /// Recipients not attempted because shutdown was requested mid-cycle
    pub skipped: usize,
}

/// Sends a fixed text to every registered chat.
#[derive(Clone)]
pub struct Broadcaster {
    bot: Bot,
    users: UserDirectory,
    text: String,
    shutdown: CancellationToken,
}

impl Broadcaster {
    pub fn new(
        bot: Bot,
        users: UserDirectory,
        text: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            bot,
            users,
            text: text.into(),
            shutdown,
        }
    }

    /// Send the broadcast once to each chat in a snapshot of the directory.
    /// A failed send is counted and the cycle moves on; nothing is retried
    /// until the next cycle. Shutdown abandons the in-flight send and skips
    /// the remaining recipients.
    pub async fn run_cycle(&self) -> BroadcastReport {
        let recipients = self.users.chat_ids().await;
        if recipients.is_empty() {
            debug!("Broadcast skipped: no registered users");
            return BroadcastReport::default();
        }

        let total = recipients.len();
        let mut report = BroadcastReport::default();
        for chat_id in recipients {
            let sent = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                sent = self.bot.send_message(chat_id, &self.text) => sent,
            };
            // send_message already logs the failure with the chat id
            match sent {
                Ok(_) => report.delivered += 1,
                Err(_) => report.failed += 1,
            }
        }
        report.skipped = total - report.delivered - report.failed;

        info!(
            "Broadcast delivered to {} user(s), {} failed, {} skipped",
            report.delivered, report.failed, report.skipped
        );
        report
    }
}
