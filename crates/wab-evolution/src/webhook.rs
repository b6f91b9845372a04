//! Gateway webhook: `POST <path>` with `{ event, instance, data }`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use wab_core::{
    domain::InboundMessage,
    lifecycle::{ConnectionState, ConnectionUpdate, DisconnectReason, PairingCode, TransportEvent},
};

use crate::EvolutionTransport;

#[derive(Clone, Debug, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub data: Value,
}

pub struct WebhookState {
    pub instance: String,
    pub transport: EvolutionTransport,
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

pub fn router(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(handle_webhook))
        .with_state(Arc::new(state))
}

async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    if let Some(instance) = payload.instance.as_deref() {
        if instance != state.instance {
            tracing::debug!(%instance, "webhook for another instance ignored");
            return StatusCode::OK;
        }
    }

    let Some(ev) = translate(&payload) else {
        tracing::debug!(event = %payload.event, "webhook event ignored");
        return StatusCode::OK;
    };

    if let TransportEvent::Connection(ConnectionUpdate {
        state: Some(conn), ..
    }) = &ev
    {
        state.transport.set_open(*conn == ConnectionState::Open);
    }

    if state.events.send(ev).is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// Map a webhook payload to a transport event. Unknown or empty events map to `None`.
pub fn translate(payload: &WebhookPayload) -> Option<TransportEvent> {
    match normalize_event_name(&payload.event).as_str() {
        "messages.upsert" => {
            let batch = parse_messages(&payload.data);
            if batch.is_empty() {
                None
            } else {
                Some(TransportEvent::MessagesUpsert(batch))
            }
        }
        "connection.update" => Some(TransportEvent::Connection(parse_connection(&payload.data))),
        "qrcode.updated" => {
            let qr = payload.data.get("qrcode").unwrap_or(&payload.data);
            let pairing = PairingCode {
                code: str_field(qr, "code"),
                image: str_field(qr, "base64"),
                pairing_code: str_field(qr, "pairingCode"),
            };
            if pairing == PairingCode::default() {
                return None;
            }
            Some(TransportEvent::Connection(ConnectionUpdate {
                state: Some(ConnectionState::Connecting),
                reason: None,
                qr: Some(pairing),
            }))
        }
        _ => None,
    }
}

/// `MESSAGES_UPSERT` and `messages.upsert` name the same event.
fn normalize_event_name(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace('_', ".")
}

fn parse_messages(data: &Value) -> Vec<InboundMessage> {
    let items: Vec<&Value> = match data {
        Value::Array(arr) => arr.iter().collect(),
        Value::Object(obj) => match obj.get("messages") {
            Some(Value::Array(arr)) => arr.iter().collect(),
            _ => vec![data],
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<InboundMessage>(v.clone()) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!("unparseable inbound message skipped: {e}");
                None
            }
        })
        .collect()
}

fn parse_connection(data: &Value) -> ConnectionUpdate {
    let state = match data.get("state").and_then(|s| s.as_str()) {
        Some("open") => Some(ConnectionState::Open),
        Some("close") => Some(ConnectionState::Close),
        Some("connecting") => Some(ConnectionState::Connecting),
        _ => None,
    };
    let reason = if state == Some(ConnectionState::Close) {
        data.get("statusReason")
            .and_then(|v| v.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .map(DisconnectReason::from_status_code)
    } else {
        None
    };
    ConnectionUpdate {
        state,
        reason,
        qr: None,
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> WebhookPayload {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn messages_upsert_single_object() {
        let p = payload(json!({
            "event": "messages.upsert",
            "instance": "lecturistas",
            "data": {
                "key": { "remoteJid": "51999888777@s.whatsapp.net", "fromMe": false, "id": "ABC" },
                "pushName": "Ana",
                "message": { "extendedTextMessage": { "text": "Hola" } },
                "messageType": "extendedTextMessage",
                "messageTimestamp": 1717000000
            }
        }));
        let Some(TransportEvent::MessagesUpsert(batch)) = translate(&p) else {
            panic!("expected messages");
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].key.id, "ABC");
        assert_eq!(batch[0].push_name.as_deref(), Some("Ana"));
        assert!(batch[0].message.is_some());
    }

    #[test]
    fn messages_upsert_array_and_uppercase_event_name() {
        let p = payload(json!({
            "event": "MESSAGES_UPSERT",
            "data": { "messages": [
                { "key": { "remoteJid": "a@s.whatsapp.net", "id": "1" }, "message": { "conversation": "1" } },
                { "key": { "remoteJid": "a@s.whatsapp.net", "id": "2" } }
            ]}
        }));
        let Some(TransportEvent::MessagesUpsert(batch)) = translate(&p) else {
            panic!("expected messages");
        };
        assert_eq!(batch.len(), 2);
        assert!(batch[1].message.is_none());
    }

    #[test]
    fn connection_close_carries_reason() {
        let p = payload(json!({
            "event": "connection.update",
            "data": { "instance": "lecturistas", "state": "close", "statusReason": 401 }
        }));
        assert_eq!(
            translate(&p),
            Some(TransportEvent::Connection(ConnectionUpdate {
                state: Some(ConnectionState::Close),
                reason: Some(DisconnectReason::LoggedOut),
                qr: None,
            }))
        );

        let open = payload(json!({
            "event": "connection.update",
            "data": { "state": "open", "statusReason": 200 }
        }));
        assert_eq!(
            translate(&open),
            Some(TransportEvent::Connection(ConnectionUpdate {
                state: Some(ConnectionState::Open),
                reason: None,
                qr: None,
            }))
        );
    }

    #[test]
    fn qrcode_updated_becomes_pairing_code() {
        let p = payload(json!({
            "event": "qrcode.updated",
            "data": { "qrcode": { "code": "2@xyz", "base64": "data:image/png;base64,AAAA" } }
        }));
        let Some(TransportEvent::Connection(update)) = translate(&p) else {
            panic!("expected connection update");
        };
        let qr = update.qr.unwrap();
        assert_eq!(qr.code.as_deref(), Some("2@xyz"));
        assert_eq!(qr.image.as_deref(), Some("data:image/png;base64,AAAA"));
        assert_eq!(qr.pairing_code, None);
    }

    #[test]
    fn unknown_and_empty_events_are_ignored() {
        assert_eq!(
            translate(&payload(json!({ "event": "presence.update", "data": {} }))),
            None
        );
        assert_eq!(
            translate(&payload(json!({ "event": "messages.upsert", "data": [] }))),
            None
        );
        assert_eq!(
            translate(&payload(json!({ "event": "qrcode.updated", "data": {} }))),
            None
        );
    }

    mod handler {
        use super::*;
        use crate::client::EvolutionClient;
        use std::time::Duration;
        use wab_core::messaging::port::TransportPort;

        struct Served {
            url: String,
            transport: EvolutionTransport,
        }

        async fn serve(events: mpsc::UnboundedSender<TransportEvent>) -> Served {
            let client = EvolutionClient::new(
                "http://127.0.0.1:9",
                "k",
                "lecturistas",
                Duration::from_secs(1),
            )
            .unwrap();
            let transport = EvolutionTransport::new(Arc::new(client));
            let app = router(
                "/webhook/evolution",
                WebhookState {
                    instance: "lecturistas".to_string(),
                    transport: transport.clone(),
                    events,
                },
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Served {
                url: format!("http://{addr}/webhook/evolution"),
                transport,
            }
        }

        async fn post(url: &str, body: Value) -> reqwest::StatusCode {
            reqwest::Client::new()
                .post(url)
                .json(&body)
                .send()
                .await
                .unwrap()
                .status()
        }

        #[tokio::test]
        async fn connection_events_toggle_open_flag_and_are_forwarded() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let served = serve(tx).await;

            let status = post(
                &served.url,
                json!({ "event": "connection.update", "instance": "lecturistas",
                        "data": { "state": "open" } }),
            )
            .await;
            assert_eq!(status, reqwest::StatusCode::OK);
            assert!(served.transport.is_open());
            assert!(matches!(
                rx.try_recv(),
                Ok(TransportEvent::Connection(ConnectionUpdate {
                    state: Some(ConnectionState::Open),
                    ..
                }))
            ));

            post(
                &served.url,
                json!({
                    "event": "CONNECTION_UPDATE",
                    "data": { "state": "close", "statusReason": 428 }
                }),
            )
            .await;
            assert!(!served.transport.is_open());
            assert!(rx.try_recv().is_ok());
        }

        #[tokio::test]
        async fn other_instances_and_unknown_events_are_acknowledged_only() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let served = serve(tx).await;

            let status = post(
                &served.url,
                json!({ "event": "connection.update", "instance": "someone-else",
                        "data": { "state": "open" } }),
            )
            .await;
            assert_eq!(status, reqwest::StatusCode::OK);
            assert!(!served.transport.is_open());

            let status = post(
                &served.url,
                json!({ "event": "contacts.update", "instance": "lecturistas", "data": {} }),
            )
            .await;
            assert_eq!(status, reqwest::StatusCode::OK);
            assert!(rx.try_recv().is_err());
        }

        #[tokio::test]
        async fn closed_event_channel_is_unavailable() {
            let (tx, rx) = mpsc::unbounded_channel();
            let served = serve(tx).await;
            drop(rx);

            let status = post(
                &served.url,
                json!({ "event": "messages.upsert", "instance": "lecturistas", "data": {
                    "key": { "remoteJid": "51999888777@s.whatsapp.net", "id": "X" },
                    "message": { "conversation": "hola" }
                }}),
            )
            .await;
            assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
        }
    }
}
