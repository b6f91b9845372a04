use std::fmt;

use serde::{Deserialize, Serialize};

use crate::messaging::types::MessageContent;

/// WhatsApp chat id (JID), e.g. `51999888777@s.whatsapp.net`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(jid: impl Into<String>) -> Self {
        Self(jid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_group(&self) -> bool {
        self.0.ends_with("@g.us")
    }

    /// True only for one-to-one chats. Groups, status broadcasts and
    /// newsletters are never answered.
    pub fn is_private(&self) -> bool {
        !self.is_group()
            && !self.0.ends_with("@broadcast")
            && !self.0.ends_with("@newsletter")
            && !self.0.is_empty()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Message key as emitted by the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(default)]
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// One inbound message. Only the key and the textual content are used; the
/// rest of the transport payload is discarded at the adapter boundary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub key: MessageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageContent>,
}

impl InboundMessage {
    pub fn conversation(&self) -> ConversationId {
        ConversationId(self.key.remote_jid.clone())
    }

    pub fn has_content(&self) -> bool {
        self.message.is_some()
    }
}
