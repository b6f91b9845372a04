use std::sync::Arc;

use crate::{
    domain::{ConversationId, InboundMessage},
    errors::Error,
    messaging::{
        port::TransportPort,
        types::{OutgoingContent, Presence, SentMessage},
    },
    Result,
};

/// TransportPort decorator that refuses outbound calls while the socket is closed.
///
/// Messages attempted during a disconnect are dropped with
/// `Error::TransportNotReady`; nothing is queued for after the reconnect.
pub struct ReadyGuard {
    inner: Arc<dyn TransportPort>,
}

impl ReadyGuard {
    pub fn new(inner: Arc<dyn TransportPort>) -> Self {
        Self { inner }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.is_open() {
            Ok(())
        } else {
            Err(Error::TransportNotReady)
        }
    }
}

#[async_trait::async_trait]
impl TransportPort for ReadyGuard {
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn presence_subscribe(&self, to: &ConversationId) -> Result<()> {
        self.ensure_open()?;
        self.inner.presence_subscribe(to).await
    }

    async fn send_presence(&self, to: &ConversationId, presence: Presence) -> Result<()> {
        self.ensure_open()?;
        self.inner.send_presence(to, presence).await
    }

    async fn send_message(
        &self,
        to: &ConversationId,
        content: OutgoingContent,
        quoted: Option<&InboundMessage>,
    ) -> Result<SentMessage> {
        self.ensure_open()?;
        self.inner.send_message(to, content, quoted).await
    }
}
