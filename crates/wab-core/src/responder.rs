use std::{io::ErrorKind, path::PathBuf, sync::Arc, time::Duration};

use tokio::time::sleep;

use crate::{
    config::{Config, DEFAULT_ENROLLMENT_FORM_URL},
    domain::{ConversationId, InboundMessage},
    errors::Error,
    messaging::{
        port::TransportPort,
        types::{DeliveryStatus, OutgoingContent, Presence},
    },
    registry::GreetedStore,
    scripts,
};

/// Pacing and assets for outbound conversation messages.
#[derive(Clone, Debug)]
pub struct ResponderSettings {
    /// "Typing" time before the welcome.
    pub welcome_delay: Duration,
    /// "Typing" time before every reply, and the pause between welcome and menu.
    pub reply_delay: Duration,
    pub welcome_image_path: PathBuf,
    pub enrollment_form_url: String,
}

impl ResponderSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            welcome_delay: cfg.welcome_delay,
            reply_delay: cfg.reply_delay,
            welcome_image_path: cfg.welcome_image_path.clone(),
            enrollment_form_url: cfg.enrollment_form_url.clone(),
        }
    }
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            welcome_delay: Duration::from_millis(400),
            reply_delay: Duration::from_millis(3000),
            welcome_image_path: PathBuf::from("bienvenidas.jpg"),
            enrollment_form_url: DEFAULT_ENROLLMENT_FORM_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GreetOutcome {
    AlreadyGreeted,
    /// The greeting flow ran (welcome then menu); the caller must not dispatch further.
    Handled {
        welcome: DeliveryStatus,
        menu: DeliveryStatus,
    },
}

/// Issues the outbound side of a conversation with human-like pacing.
///
/// Sends are best effort: failures are logged and reported as a
/// [`DeliveryStatus`], never propagated.
pub struct Responder {
    transport: Arc<dyn TransportPort>,
    registry: Arc<dyn GreetedStore>,
    settings: ResponderSettings,
}

impl Responder {
    pub fn new(
        transport: Arc<dyn TransportPort>,
        registry: Arc<dyn GreetedStore>,
        settings: ResponderSettings,
    ) -> Self {
        Self {
            transport,
            registry,
            settings,
        }
    }

    /// One-time welcome + menu for a conversation seen for the first time.
    ///
    /// The conversation is marked greeted before anything is sent, so a
    /// failed welcome is not retried on the next message.
    pub async fn greet_if_first_time(
        &self,
        to: &ConversationId,
        context: &InboundMessage,
    ) -> GreetOutcome {
        if !self.registry.mark_greeted(to).newly_added() {
            return GreetOutcome::AlreadyGreeted;
        }
        tracing::info!(conversation = %to, "first contact, sending welcome");

        self.start_typing(to).await;
        pause(self.settings.welcome_delay).await;

        let welcome_content = self.welcome_content().await;
        let welcome = self.deliver(to, welcome_content, Some(context)).await;

        self.presence(to, Presence::Paused).await;
        pause(self.settings.reply_delay).await;

        let menu = self.send_menu(to, context).await;

        GreetOutcome::Handled { welcome, menu }
    }

    /// composing → delay → text (quoting `context`) → paused.
    pub async fn send_reply(
        &self,
        to: &ConversationId,
        text: &str,
        context: &InboundMessage,
    ) -> DeliveryStatus {
        self.start_typing(to).await;
        pause(self.settings.reply_delay).await;
        let status = self
            .deliver(to, OutgoingContent::text(text), Some(context))
            .await;
        self.presence(to, Presence::Paused).await;
        status
    }

    pub async fn send_menu(&self, to: &ConversationId, context: &InboundMessage) -> DeliveryStatus {
        self.send_reply(to, &scripts::requirements_menu(), context)
            .await
    }

    pub async fn send_eligible(
        &self,
        to: &ConversationId,
        context: &InboundMessage,
    ) -> DeliveryStatus {
        let text = scripts::eligible_text(&self.settings.enrollment_form_url);
        self.send_reply(to, &text, context).await
    }

    pub async fn send_ineligible(
        &self,
        to: &ConversationId,
        context: &InboundMessage,
    ) -> DeliveryStatus {
        self.send_reply(to, scripts::INELIGIBLE_TEXT, context).await
    }

    pub async fn send_numeric_notice(
        &self,
        to: &ConversationId,
        context: &InboundMessage,
    ) -> DeliveryStatus {
        self.send_reply(to, scripts::NUMERIC_OPTION_NOTICE, context)
            .await
    }

    async fn welcome_content(&self) -> OutgoingContent {
        let path = &self.settings.welcome_image_path;
        match tokio::fs::read(path).await {
            Ok(bytes) => OutgoingContent::Image {
                bytes,
                mime_type: image_mime_type(path).to_string(),
                caption: Some(scripts::WELCOME_CAPTION.to_string()),
            },
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    tracing::warn!(
                        path = %path.display(),
                        "welcome image not found, sending text only"
                    );
                } else {
                    tracing::warn!(
                        path = %path.display(),
                        "could not read welcome image, sending text only: {e}"
                    );
                }
                OutgoingContent::text(scripts::WELCOME_CAPTION)
            }
        }
    }

    async fn start_typing(&self, to: &ConversationId) {
        if let Err(e) = self.transport.presence_subscribe(to).await {
            tracing::debug!(conversation = %to, "presence subscribe failed: {e}");
        }
        self.presence(to, Presence::Composing).await;
    }

    async fn presence(&self, to: &ConversationId, presence: Presence) {
        if let Err(e) = self.transport.send_presence(to, presence).await {
            tracing::debug!(
                conversation = %to,
                presence = presence.as_str(),
                "presence update failed: {e}"
            );
        }
    }

    async fn deliver(
        &self,
        to: &ConversationId,
        content: OutgoingContent,
        quoted: Option<&InboundMessage>,
    ) -> DeliveryStatus {
        let kind = content.kind();
        match self.transport.send_message(to, content, quoted).await {
            Ok(_) => DeliveryStatus::Sent,
            Err(Error::TransportNotReady) => {
                tracing::warn!(conversation = %to, kind, "not sent; socket is not open");
                DeliveryStatus::NotReady
            }
            Err(e) => {
                tracing::error!(conversation = %to, kind, "send failed: {e}");
                DeliveryStatus::Failed(e.to_string())
            }
        }
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        sleep(d).await;
    }
}

fn image_mime_type(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
