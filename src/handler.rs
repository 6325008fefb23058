use async_trait::async_trait;
use tracing::{debug, info};

use crate::bot::Bot;
use crate::error::DispatchError;
use crate::platform::telegram::{split_message, MAX_MESSAGE_LEN};
use crate::platform::{Message, Update};
use crate::users::{UserDirectory, UserRecord};

const NO_TEXT: &str = "No text provided";

/// Callback invoked by the poller for every update that carries a message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, update: &Update) -> Result<(), DispatchError>;
}

/// Commands the bot understands. Matching is exact: no trimming, no case folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Info,
    Echo(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        match text {
            "/start" => Command::Start,
            "/info" => Command::Info,
            other => Command::Echo(other.to_string()),
        }
    }
}

/// Reply produced for one inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundReply {
    pub chat_id: i64,
    pub text: String,
}

/// Routes messages to command handlers and sends the reply back.
pub struct Dispatcher {
    bot: Bot,
    users: UserDirectory,
}

impl Dispatcher {
    pub fn new(bot: Bot, users: UserDirectory) -> Self {
        Self { bot, users }
    }

    /// Run the command in `message` and build the reply, without sending it.
    pub async fn dispatch(
        &self,
        chat_id: i64,
        message: &Message,
    ) -> Result<OutboundReply, DispatchError> {
        let text = message.text.as_deref().unwrap_or(NO_TEXT);

        let reply = match Command::parse(text) {
            Command::Start => {
                let record = UserRecord::from_sender(message.from.as_ref());
                let first_name = record.first_name.clone();
                self.users.register(chat_id, record).await;
                info!("Registered chat {} ({})", chat_id, first_name);
                format!(
                    "Welcome, {}! You have been added to the users list.",
                    first_name
                )
            }
            Command::Info => format!("Users: {}", self.users.to_pretty_json().await?),
            Command::Echo(text) => format!("You said: {}", text),
        };

        Ok(OutboundReply {
            chat_id,
            text: reply,
        })
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, update: &Update) -> Result<(), DispatchError> {
        let Some(message) = update.message.as_ref() else {
            debug!("Update {} has no message", update.update_id);
            return Ok(());
        };

        let chat_id = message.chat_id();
        info!(
            "New message from {}: {}",
            chat_id,
            message.text.as_deref().unwrap_or(NO_TEXT)
        );

        let reply = self.dispatch(chat_id, message).await?;
        for chunk in split_message(&reply.text, MAX_MESSAGE_LEN) {
            self.bot.send_message(reply.chat_id, &chunk).await?;
        }
        Ok(())
    }
}
