//! WhatsApp adapter over an Evolution API gateway.
//!
//! This crate implements the `wab-core` TransportPort and TransportConnector
//! over the gateway's REST API, and turns its webhook callbacks into core
//! transport events.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};

pub mod client;
pub mod connector;
pub mod webhook;

use wab_core::{
    domain::{ConversationId, InboundMessage},
    messaging::{
        port::TransportPort,
        types::{OutgoingContent, Presence, SentMessage},
    },
    Result,
};

use crate::client::{number_for, EvolutionClient};

#[derive(Clone)]
pub struct EvolutionTransport {
    client: Arc<EvolutionClient>,
    open: Arc<AtomicBool>,
}

impl EvolutionTransport {
    pub fn new(client: Arc<EvolutionClient>) -> Self {
        Self {
            client,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn client(&self) -> Arc<EvolutionClient> {
        self.client.clone()
    }

    /// Updated from connection events (webhook and connector).
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    fn quoted_payload(quoted: Option<&InboundMessage>) -> Option<Value> {
        let q = quoted?;
        Some(json!({
            "key": q.key,
            "message": q.message,
        }))
    }
}

#[async_trait]
impl TransportPort for EvolutionTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn presence_subscribe(&self, _to: &ConversationId) -> Result<()> {
        // The gateway subscribes to contact presence by itself.
        Ok(())
    }

    async fn send_presence(&self, to: &ConversationId, presence: Presence) -> Result<()> {
        self.client
            .send_presence(&number_for(to.as_str()), presence.as_str())
            .await
    }

    async fn send_message(
        &self,
        to: &ConversationId,
        content: OutgoingContent,
        quoted: Option<&InboundMessage>,
    ) -> Result<SentMessage> {
        let number = number_for(to.as_str());
        let quoted = Self::quoted_payload(quoted);
        let resp = match content {
            OutgoingContent::Text { text } => self.client.send_text(&number, &text, quoted).await?,
            OutgoingContent::Image {
                bytes,
                mime_type,
                caption,
            } => {
                let media = base64::engine::general_purpose::STANDARD.encode(bytes);
                self.client
                    .send_image(&number, media, &mime_type, caption.as_deref(), quoted)
                    .await?
            }
        };

        Ok(SentMessage {
            id: resp
                .pointer("/key/id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}
