use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use wab_core::{
    auth::SessionDir,
    errors::Error,
    lifecycle::{
        ConnectionState, ConnectionUpdate, CredentialUpdate, PairingCode, TransportConnector,
        TransportEvent,
    },
    Result,
};

use crate::{client::QrPayload, EvolutionTransport};

/// Credential key under which the gateway instance registration is kept.
pub const INSTANCE_KEY: &str = "instance";

/// Starts the gateway session: registers the instance on first run, then
/// asks the gateway to connect it, forwarding QR codes and the resulting
/// state as transport events.
pub struct EvolutionConnector {
    transport: EvolutionTransport,
    events: mpsc::UnboundedSender<TransportEvent>,
    webhook_url: Option<String>,
}

impl EvolutionConnector {
    pub fn new(
        transport: EvolutionTransport,
        events: mpsc::UnboundedSender<TransportEvent>,
        webhook_url: Option<String>,
    ) -> Self {
        Self {
            transport,
            events,
            webhook_url,
        }
    }

    fn emit(&self, ev: TransportEvent) -> Result<()> {
        self.events
            .send(ev)
            .map_err(|_| Error::External("transport event channel closed".to_string()))
    }

    fn emit_qr(&self, qr: QrPayload) -> Result<()> {
        if qr.is_empty() {
            return Ok(());
        }
        self.emit(TransportEvent::Connection(ConnectionUpdate {
            state: Some(ConnectionState::Connecting),
            reason: None,
            qr: Some(PairingCode {
                code: qr.code,
                image: qr.base64,
                pairing_code: qr.pairing_code,
            }),
        }))
    }

    fn emit_instance_record(&self, registration: Option<Value>) -> Result<()> {
        let client = self.transport.client();
        let mut record = json!({
            "instanceName": client.instance(),
            "savedAt": Utc::now().to_rfc3339(),
        });
        if let Some(registration) = registration {
            record["registration"] = registration;
        }
        self.emit(TransportEvent::CredsUpdate(CredentialUpdate {
            key: INSTANCE_KEY.to_string(),
            value: record,
        }))
    }

    async fn refresh_webhook(&self) {
        let Some(url) = &self.webhook_url else {
            return;
        };
        if let Err(e) = self.transport.client().set_webhook(url).await {
            tracing::warn!("could not register webhook with the gateway: {e}");
        }
    }

    async fn register(&self) -> Result<()> {
        let client = self.transport.client();
        match client.create_instance(self.webhook_url.as_deref()).await {
            Ok((registration, qr)) => {
                tracing::info!(instance = client.instance(), "gateway instance created");
                self.emit_instance_record(Some(registration))?;
                self.emit_qr(qr)
            }
            // The instance already exists on the gateway (e.g. local session was wiped).
            Err(Error::Http { status: 403, .. }) | Err(Error::Http { status: 409, .. }) => {
                tracing::info!(
                    instance = client.instance(),
                    "gateway instance already exists, reusing it"
                );
                self.emit_instance_record(None)?;
                self.refresh_webhook().await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TransportConnector for EvolutionConnector {
    async fn connect(&self, session: &SessionDir) -> Result<()> {
        let client = self.transport.client();
        self.transport.set_open(false);

        let registered = match session.load(INSTANCE_KEY) {
            Ok(record) => record.is_some(),
            Err(e) => {
                tracing::warn!("unreadable instance record, registering again: {e}");
                false
            }
        };
        if registered {
            self.refresh_webhook().await;
        } else {
            self.register().await?;
        }

        // An already-paired instance reports `open` right away and emits no
        // connection.update, so ask for the state explicitly.
        let state = client.connection_state().await?;
        if state == "open" {
            self.transport.set_open(true);
            return self.emit(TransportEvent::Connection(ConnectionUpdate {
                state: Some(ConnectionState::Open),
                ..ConnectionUpdate::default()
            }));
        }

        tracing::info!(instance = client.instance(), %state, "connecting gateway instance");
        let qr = client.connect_instance().await?;
        self.emit_qr(qr)
    }
}
