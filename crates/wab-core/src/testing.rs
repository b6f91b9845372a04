//! In-memory fakes shared by the unit tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{ConversationId, InboundMessage, MessageKey},
    errors::Error,
    messaging::{
        port::TransportPort,
        types::{MessageContent, OutgoingContent, Presence, SentMessage},
    },
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Subscribe(String),
    Presence(String, Presence),
    Text {
        to: String,
        text: String,
        quoted: Option<String>,
    },
    Image {
        to: String,
        caption: Option<String>,
        len: usize,
    },
}

pub struct FakeTransport {
    open: AtomicBool,
    fail_sends: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            open: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTransport {
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the message sends, in order.
    pub fn sends(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Text { .. } | Call::Image { .. }))
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sends()
            .into_iter()
            .map(|c| match c {
                Call::Text { text, .. } => text,
                Call::Image { caption, .. } => caption.unwrap_or_default(),
                _ => unreachable!(),
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl TransportPort for FakeTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn presence_subscribe(&self, to: &ConversationId) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Subscribe(to.0.clone()));
        Ok(())
    }

    async fn send_presence(&self, to: &ConversationId, presence: Presence) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Presence(to.0.clone(), presence));
        Ok(())
    }

    async fn send_message(
        &self,
        to: &ConversationId,
        content: OutgoingContent,
        quoted: Option<&InboundMessage>,
    ) -> Result<SentMessage> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::External("boom".to_string()));
        }
        let call = match content {
            OutgoingContent::Text { text } => Call::Text {
                to: to.0.clone(),
                text,
                quoted: quoted.map(|q| q.key.id.clone()),
            },
            OutgoingContent::Image { bytes, caption, .. } => Call::Image {
                to: to.0.clone(),
                caption,
                len: bytes.len(),
            },
        };
        self.calls.lock().unwrap().push(call);
        Ok(SentMessage {
            id: Some("OUT".to_string()),
        })
    }
}

pub fn inbound(jid: &str, text: &str) -> InboundMessage {
    InboundMessage {
        key: MessageKey {
            remote_jid: jid.to_string(),
            from_me: false,
            id: format!("IN-{text}"),
            participant: None,
        },
        push_name: None,
        message: Some(MessageContent::text(text)),
    }
}
