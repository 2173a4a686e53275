use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::TransportError;
use crate::types::{ChatId, MessageId};

/// An inline button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub tag: String,
}

/// The messaging platform, seen from the game.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        button: Option<&Button>,
    ) -> Result<MessageId, TransportError>;

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), TransportError>;

    /// Confirms receipt of a button click.
    async fn acknowledge(&self, _callback_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Sends messages and keeps each chat down to its last few bot messages.
pub struct Outbox {
    transport: Arc<dyn ChatTransport>,
    /// chat_id -> ids of the most recent messages we sent, oldest first
    trail: DashMap<ChatId, VecDeque<MessageId>>,
    keep: usize,
}

impl Outbox {
    pub fn new(transport: Arc<dyn ChatTransport>, keep: usize) -> Self {
        Self {
            transport,
            trail: DashMap::new(),
            keep: keep.max(1),
        }
    }

    /// Sends a message, logging failures. Older messages past the trail
    /// size are deleted best-effort.
    pub async fn send(&self, chat_id: ChatId, text: &str, button: Option<&Button>) -> Option<MessageId> {
        let message_id = match self.transport.send(chat_id, text, button).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Failed to send message to chat {}: {}", chat_id, e);
                return None;
            }
        };

        let evicted: Vec<MessageId> = {
            let mut trail = self.trail.entry(chat_id).or_default();
            trail.push_back(message_id);
            let excess = trail.len().saturating_sub(self.keep);
            trail.drain(..excess).collect()
        };

        for old in evicted {
            if let Err(e) = self.transport.delete(chat_id, old).await {
                tracing::debug!("Could not delete message {} in chat {}: {}", old, chat_id, e);
            }
        }

        Some(message_id)
    }

    pub async fn acknowledge(&self, callback_id: &str) {
        if let Err(e) = self.transport.acknowledge(callback_id).await {
            tracing::debug!("Could not acknowledge callback {}: {}", callback_id, e);
        }
    }

    #[cfg(test)]
    pub fn trail(&self, chat_id: ChatId) -> Vec<MessageId> {
        self.trail
            .get(&chat_id)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default()
    }
}
