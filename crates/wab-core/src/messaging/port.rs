use async_trait::async_trait;

use crate::{
    domain::{ConversationId, InboundMessage},
    messaging::types::{OutgoingContent, Presence, SentMessage},
    Result,
};

/// Messaging transport port.
///
/// The WhatsApp gateway adapter is the production implementation; tests use
/// in-memory fakes. Pairing, encryption and delivery all live behind it.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Whether the underlying socket is currently open.
    fn is_open(&self) -> bool;

    async fn presence_subscribe(&self, to: &ConversationId) -> Result<()>;

    async fn send_presence(&self, to: &ConversationId, presence: Presence) -> Result<()>;

    /// Send `content`, optionally quoting the message that triggered it.
    async fn send_message(
        &self,
        to: &ConversationId,
        content: OutgoingContent,
        quoted: Option<&InboundMessage>,
    ) -> Result<SentMessage>;
}
