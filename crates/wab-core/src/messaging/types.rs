use serde::{Deserialize, Serialize};

/// WhatsApp message content in the transport's JSON shape.
///
/// Only the fields that can carry text are modelled; unknown kinds
/// (stickers, audio, reactions, ...) deserialize to an all-`None` value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_message: Option<MediaContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_message: Option<MediaContent>,

    // Envelopes carrying a nested message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_message: Option<Envelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_once_message: Option<Envelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_once_message_v2: Option<Envelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_once_message_v2_extension: Option<Envelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_with_caption_message: Option<Envelope>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            conversation: Some(text.into()),
            ..Self::default()
        }
    }

    /// The nested message of the first envelope present, if any.
    pub fn inner(&self) -> Option<&MessageContent> {
        [
            &self.ephemeral_message,
            &self.view_once_message,
            &self.view_once_message_v2,
            &self.view_once_message_v2_extension,
            &self.document_with_caption_message,
        ]
        .into_iter()
        .flatten()
        .find_map(|env| env.message.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub message: Option<Box<MessageContent>>,
}

/// Outgoing payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutgoingContent {
    Text {
        text: String,
    },
    Image {
        bytes: Vec<u8>,
        mime_type: String,
        caption: Option<String>,
    },
}

impl OutgoingContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
        }
    }
}

/// Presence ("typing indicator") states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Composing,
    Paused,
}

impl Presence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Composing => "composing",
            Self::Paused => "paused",
        }
    }
}

/// Reference to a message accepted by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub id: Option<String>,
}

/// Outcome of a best-effort send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    /// The socket was closed; the message was dropped (no queue, no retry).
    NotReady,
    Failed(String),
}
