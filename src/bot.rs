use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::api::{ApiError, MessageApi, MessageRef};
use crate::command::Command;
use crate::gateway::sink::GatewayEvent;
use crate::pasta::{PastaError, PastaStore};

pub const MESSAGE_LIMIT: usize = 2000;
pub const PREMIUM_MESSAGE_LIMIT: usize = 4000;
const PREMIUM_TYPE_NITRO: u8 = 2;

/// Longest message the account may send.
pub fn message_limit_for(premium_type: Option<u8>) -> usize {
    if premium_type == Some(PREMIUM_TYPE_NITRO) {
        PREMIUM_MESSAGE_LIMIT
    } else {
        MESSAGE_LIMIT
    }
}

#[derive(Debug, Deserialize)]
struct Ready {
    user: ReadyUser,
}

#[derive(Debug, Deserialize)]
struct ReadyUser {
    id: String,
    #[serde(default)]
    premium_type: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct MessageCreate {
    id: String,
    channel_id: String,
    #[serde(default)]
    content: String,
    author: Author,
}

#[derive(Debug, Deserialize)]
struct Author {
    id: String,
}

/// Turns the account's own prefixed messages into pasta commands.
pub struct Bot {
    api: MessageApi,
    pastas: PastaStore,
    prefix: String,
    user_id: Option<String>,
    message_limit: usize,
}

impl Bot {
    pub fn new(api: MessageApi, pastas: PastaStore, prefix: &str) -> Self {
        Self {
            api,
            pastas,
            prefix: prefix.to_string(),
            user_id: None,
            message_limit: MESSAGE_LIMIT,
        }
    }

    /// Seeds the message limit before READY arrives.
    pub fn with_premium_type(mut self, premium_type: Option<u8>) -> Self {
        self.message_limit = message_limit_for(premium_type);
        self
    }

    pub fn pastas(&self) -> &PastaStore {
        &self.pastas
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn message_limit(&self) -> usize {
        self.message_limit
    }

    /// Consumes events until every sender is gone, then hands the bot back.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<GatewayEvent>) -> Self {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        tracing::debug!("event stream ended");
        self
    }

    pub async fn dispatch(&mut self, event: GatewayEvent) {
        match event.event_type.as_str() {
            "READY" => self.handle_ready(&event.data),
            "MESSAGE_CREATE" => self.handle_message_create(&event.data).await,
            _ => {}
        }
    }

    fn handle_ready(&mut self, data: &Value) {
        let ready = match Ready::deserialize(data) {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!("unexpected READY payload: {e}");
                return;
            }
        };
        self.message_limit = message_limit_for(ready.user.premium_type);
        tracing::info!(user_id = %ready.user.id, limit = self.message_limit, "ready");
        self.user_id = Some(ready.user.id);
    }

    async fn handle_message_create(&mut self, data: &Value) {
        let Ok(message) = MessageCreate::deserialize(data) else {
            return;
        };
        if self.user_id.as_deref() != Some(message.author.id.as_str()) {
            return;
        }
        let Some(command) = Command::parse(&message.content, &self.prefix) else {
            return;
        };

        let msg = MessageRef {
            channel_id: message.channel_id,
            id: message.id,
        };
        tracing::debug!(?command, "running command");
        if let Err(e) = self.execute(&msg, command).await {
            tracing::warn!(
                channel_id = %msg.channel_id,
                message_id = %msg.id,
                "command failed: {e}"
            );
        }
    }

    async fn execute(&mut self, msg: &MessageRef, command: Command) -> Result<(), ApiError> {
        match command {
            Command::Add { name, text } => {
                let name = name.unwrap_or_default();
                let text = text.unwrap_or_default();
                match self.pastas.add(&name, &text).await {
                    Ok(()) => self.api.delete(msg).await,
                    Err(e @ PastaError::Invalid) => self.api.edit(msg, &e.to_string()).await,
                    Err(e) => {
                        tracing::error!("failed to store pasta: {e}");
                        Ok(())
                    }
                }
            }
            Command::Delete { name } => {
                let name = name.unwrap_or_default();
                if let Err(e) = self.pastas.remove(&name).await {
                    tracing::error!("failed to remove pasta: {e}");
                }
                self.api.delete(msg).await
            }
            Command::Send { name } => {
                let name = name.unwrap_or_default();
                let content = match self.pastas.get(&name) {
                    Ok(text) => text.to_string(),
                    Err(e) => e.to_string(),
                };
                self.api.edit(msg, &content).await
            }
            Command::List => {
                if self.pastas.is_empty() {
                    return self.api.edit(msg, "There are no pastas yet").await;
                }
                let list = self.pastas.names().join(",");
                if list.chars().count() > self.message_limit {
                    println!("{list}");
                    return self
                        .api
                        .edit(msg, "The message is too long, it will be displayed in the terminal")
                        .await;
                }
                self.api.edit(msg, &list).await
            }
            Command::Unknown(cmd) => {
                tracing::debug!(%cmd, "ignoring unknown command");
                Ok(())
            }
        }
    }
}
