//! Thin JSON client for the Evolution API gateway.

use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use wab_core::{config::Config, errors::Error, Result};

#[derive(Clone, Debug)]
pub struct EvolutionClient {
    base_url: String,
    api_key: String,
    instance: String,
    http: reqwest::Client,
}

/// QR / pairing payload returned by `instance/create` and `instance/connect`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    #[serde(default)]
    pub pairing_code: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub base64: Option<String>,
}

impl QrPayload {
    pub fn is_empty(&self) -> bool {
        self.pairing_code.is_none() && self.code.is_none() && self.base64.is_none()
    }
}

impl EvolutionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        instance: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            instance: instance.into(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.evolution_api_url.clone(),
            cfg.evolution_api_key.clone(),
            cfg.evolution_instance.clone(),
            cfg.http_timeout,
        )
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub async fn send_text(
        &self,
        number: &str,
        text: &str,
        quoted: Option<Value>,
    ) -> Result<Value> {
        let mut body = json!({ "number": number, "text": text });
        if let Some(q) = quoted {
            body["quoted"] = q;
        }
        let path = format!("/message/sendText/{}", self.instance);
        self.call(Method::POST, &path, Some(body)).await
    }

    pub async fn send_image(
        &self,
        number: &str,
        media_base64: String,
        mime_type: &str,
        caption: Option<&str>,
        quoted: Option<Value>,
    ) -> Result<Value> {
        let mut body = json!({
            "number": number,
            "mediatype": "image",
            "mimetype": mime_type,
            "media": media_base64,
            "fileName": file_name_for(mime_type),
        });
        if let Some(c) = caption {
            body["caption"] = json!(c);
        }
        if let Some(q) = quoted {
            body["quoted"] = q;
        }
        let path = format!("/message/sendMedia/{}", self.instance);
        self.call(Method::POST, &path, Some(body)).await
    }

    pub async fn send_presence(&self, number: &str, presence: &str) -> Result<()> {
        let body = json!({ "number": number, "presence": presence, "delay": 0 });
        let path = format!("/chat/sendPresence/{}", self.instance);
        self.call(Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    /// Register the instance on the gateway. Returns the raw registration
    /// (instance id, token) and any QR offered with it.
    pub async fn create_instance(&self, webhook_url: Option<&str>) -> Result<(Value, QrPayload)> {
        let mut body = json!({
            "instanceName": self.instance,
            "qrcode": true,
            "integration": "WHATSAPP-BAILEYS",
        });
        if let Some(url) = webhook_url {
            body["webhook"] = webhook_settings(url);
        }
        let v = self.call(Method::POST, "/instance/create", Some(body)).await?;
        let qr = v
            .get("qrcode")
            .cloned()
            .and_then(|q| serde_json::from_value::<QrPayload>(q).ok())
            .unwrap_or_default();
        Ok((v, qr))
    }

    pub async fn connect_instance(&self) -> Result<QrPayload> {
        let path = format!("/instance/connect/{}", self.instance);
        let v = self.call(Method::GET, &path, None).await?;
        Ok(serde_json::from_value(v).unwrap_or_default())
    }

    /// Gateway-side connection state (`open`, `connecting`, `close`).
    pub async fn connection_state(&self) -> Result<String> {
        let path = format!("/instance/connectionState/{}", self.instance);
        let v = self.call(Method::GET, &path, None).await?;
        Ok(v.pointer("/instance/state")
            .or_else(|| v.get("state"))
            .and_then(|s| s.as_str())
            .unwrap_or("close")
            .to_string())
    }

    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        let path = format!("/webhook/set/{}", self.instance);
        let body = json!({ "webhook": webhook_settings(url) });
        self.call(Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        const MAX_RETRIES: usize = 1;
        let url = format!("{}{}", self.base_url, path);
        let mut attempts = 0usize;

        loop {
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header("apikey", &self.api_key);
            if let Some(b) = &body {
                req = req.json(b);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| Error::External(format!("gateway request error: {e}")))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempts < MAX_RETRIES {
                attempts += 1;
                let wait = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .unwrap_or(1);
                sleep(Duration::from_secs(wait.min(30))).await;
                continue;
            }

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Http {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }

            let txt = resp
                .text()
                .await
                .map_err(|e| Error::External(format!("gateway read error: {e}")))?;
            if txt.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&txt)?);
        }
    }
}

/// Gateway `number` for a chat id: bare phone number for user JIDs, the
/// full JID for everything else (e.g. `@lid`).
pub fn number_for(jid: &str) -> String {
    match jid.strip_suffix("@s.whatsapp.net") {
        Some(number) => number.split(':').next().unwrap_or(number).to_string(),
        None => jid.to_string(),
    }
}

fn webhook_settings(url: &str) -> Value {
    json!({
        "enabled": true,
        "url": url,
        "byEvents": false,
        "base64": false,
        "events": ["MESSAGES_UPSERT", "CONNECTION_UPDATE", "QRCODE_UPDATED"],
    })
}

fn file_name_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "bienvenida.png",
        "image/webp" => "bienvenida.webp",
        _ => "bienvenida.jpg",
    }
}
