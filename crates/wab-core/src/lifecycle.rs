//! Transport session supervision: connection updates, credential persistence,
//! pairing codes and reconnect policy.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};

use crate::{
    auth::SessionDir, config::Config, dispatch::Dispatcher, domain::InboundMessage, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Why the transport closed, from WhatsApp Web status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    ConnectionLost,
    MultideviceMismatch,
    ConnectionClosed,
    ConnectionReplaced,
    LoggedOut,
    BadSession,
    Unavailable,
    RestartRequired,
    Other(u16),
}

impl DisconnectReason {
    pub fn from_status_code(code: u16) -> Self {
        match code {
            401 => Self::LoggedOut,
            408 => Self::ConnectionLost,
            411 => Self::MultideviceMismatch,
            428 => Self::ConnectionClosed,
            440 => Self::ConnectionReplaced,
            500 => Self::BadSession,
            503 => Self::Unavailable,
            515 => Self::RestartRequired,
            other => Self::Other(other),
        }
    }

    pub fn status_code(self) -> u16 {
        match self {
            Self::LoggedOut => 401,
            Self::ConnectionLost => 408,
            Self::MultideviceMismatch => 411,
            Self::ConnectionClosed => 428,
            Self::ConnectionReplaced => 440,
            Self::BadSession => 500,
            Self::Unavailable => 503,
            Self::RestartRequired => 515,
            Self::Other(code) => code,
        }
    }

    /// Everything except an explicit logout is retried.
    pub fn should_reconnect(self) -> bool {
        self != Self::LoggedOut
    }
}

/// Pairing material offered by the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PairingCode {
    /// Raw QR payload.
    pub code: Option<String>,
    /// Rendered QR as a `data:image/png;base64,` URL.
    pub image: Option<String>,
    /// Phone-number pairing code, when requested.
    pub pairing_code: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub state: Option<ConnectionState>,
    pub reason: Option<DisconnectReason>,
    pub qr: Option<PairingCode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CredentialUpdate {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Connection(ConnectionUpdate),
    CredsUpdate(CredentialUpdate),
    MessagesUpsert(Vec<InboundMessage>),
}

/// Starts (or restarts) a transport session with the saved credentials.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, session: &SessionDir) -> Result<()>;
}

/// Linear reconnect backoff: `min(max, step * (1 + attempts))`.
#[derive(Clone, Debug)]
pub struct Backoff {
    step: Duration,
    max: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(step: Duration, max: Duration) -> Self {
        Self {
            step,
            max: max.max(step),
            attempts: 0,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.reconnect_step, cfg.reconnect_max)
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.step.saturating_mul(self.attempts.saturating_add(1));
        self.attempts = self.attempts.saturating_add(1);
        delay.min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(30))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The account was logged out; the session directory must be cleared by hand.
    LoggedOut,
    /// The event source went away (shutdown).
    EventsClosed,
}

/// Event loop over one transport session.
pub struct Supervisor {
    connector: Arc<dyn TransportConnector>,
    dispatcher: Arc<Dispatcher>,
    session: SessionDir,
    backoff: Backoff,
    reconnect_at: Option<Instant>,
}

impl Supervisor {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        dispatcher: Arc<Dispatcher>,
        session: SessionDir,
        backoff: Backoff,
    ) -> Self {
        Self {
            connector,
            dispatcher,
            session,
            backoff,
            reconnect_at: None,
        }
    }

    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<SessionEnd> {
        if self.session.is_empty() {
            tracing::info!(
                session = %self.session.root().display(),
                "no saved session, a pairing code will be shown"
            );
        }
        self.connect().await;

        loop {
            let deadline = self.reconnect_at;
            tokio::select! {
                ev = events.recv() => {
                    let Some(ev) = ev else {
                        return Ok(SessionEnd::EventsClosed);
                    };
                    if let Some(end) = self.handle_event(ev) {
                        return Ok(end);
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.reconnect_at = None;
                    self.connect().await;
                }
            }
        }
    }

    async fn connect(&mut self) {
        if let Err(e) = self.connector.connect(&self.session).await {
            tracing::error!("could not start transport session: {e}");
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_some() {
            return;
        }
        let wait = self.backoff.next_delay();
        tracing::info!(wait_ms = wait.as_millis() as u64, "reconnecting");
        self.reconnect_at = Some(Instant::now() + wait);
    }

    fn handle_event(&mut self, ev: TransportEvent) -> Option<SessionEnd> {
        match ev {
            TransportEvent::Connection(update) => self.on_connection_update(update),
            TransportEvent::CredsUpdate(update) => {
                if let Err(e) = self.session.save(&update.key, &update.value) {
                    tracing::warn!(key = %update.key, "could not persist credentials: {e}");
                }
                None
            }
            TransportEvent::MessagesUpsert(batch) => {
                // Handlers run on their own tasks so pacing delays never stall
                // connection handling.
                let _task = self.dispatcher.spawn_batch(batch);
                None
            }
        }
    }

    fn on_connection_update(&mut self, update: ConnectionUpdate) -> Option<SessionEnd> {
        if let Some(qr) = &update.qr {
            self.show_pairing_code(qr);
        }

        match update.state {
            Some(ConnectionState::Open) => {
                tracing::info!("connected to WhatsApp");
                if let Err(e) = self.session.remove_qr_image() {
                    tracing::warn!("could not remove stale QR image: {e}");
                }
                self.backoff.reset();
                self.reconnect_at = None;
                None
            }
            Some(ConnectionState::Close) => {
                let reason = update.reason.unwrap_or(DisconnectReason::Other(0));
                let reconnect = reason.should_reconnect();
                tracing::warn!(
                    ?reason,
                    code = reason.status_code(),
                    reconnect,
                    "connection closed"
                );
                if reconnect {
                    self.schedule_reconnect();
                    None
                } else {
                    tracing::error!(
                        session = %self.session.root().display(),
                        "session logged out; delete the session directory and restart to pair again"
                    );
                    Some(SessionEnd::LoggedOut)
                }
            }
            Some(ConnectionState::Connecting) | None => None,
        }
    }

    fn show_pairing_code(&self, qr: &PairingCode) {
        if let Some(code) = &qr.pairing_code {
            tracing::info!(pairing_code = %code, "enter this code in WhatsApp > Linked devices");
        }
        if let Some(code) = &qr.code {
            tracing::info!(qr = %code, "scan the QR code with WhatsApp > Linked devices");
        }
        if let Some(image) = &qr.image {
            match self.session.save_qr_image(image) {
                Ok(path) => tracing::info!(path = %path.display(), "QR image written"),
                Err(e) => tracing::warn!("could not write QR image: {e}"),
            }
        }
    }
}
