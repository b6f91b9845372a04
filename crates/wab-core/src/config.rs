use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_ENROLLMENT_FORM_URL: &str = "https://forms.gle/sRYpg8RDdqbUAQr28";

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // HTTP surface
    pub port: u16,
    pub webhook_path: String,
    /// Public URL the gateway should post events to; registered on startup when set.
    pub public_webhook_url: Option<String>,

    // Gateway
    pub evolution_api_url: String,
    pub evolution_api_key: String,
    pub evolution_instance: String,
    pub http_timeout: Duration,

    // Local state
    pub session_dir: PathBuf,
    pub greeted_file: PathBuf,
    pub welcome_image_path: PathBuf,

    // Conversation
    pub enrollment_form_url: String,
    pub welcome_delay: Duration,
    pub reply_delay: Duration,

    // Reconnect backoff
    pub reconnect_step: Duration,
    pub reconnect_max: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let evolution_api_url = env_str("EVOLUTION_API_URL")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("EVOLUTION_API_URL environment variable is required".to_string())
            })?;
        let evolution_api_key = env_str("EVOLUTION_API_KEY")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("EVOLUTION_API_KEY environment variable is required".to_string())
            })?;

        let port = match env_str("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {raw}")))?,
            None => 3000,
        };

        let webhook_path = normalize_route(
            &env_str("WEBHOOK_PATH").unwrap_or_else(|| "/webhook/evolution".to_string()),
        );

        let public_webhook_url = env_str("WEBHOOK_URL").and_then(non_empty);

        let evolution_instance = env_str("EVOLUTION_INSTANCE")
            .and_then(non_empty)
            .unwrap_or_else(|| "lecturistas".to_string());
        let http_timeout = Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(15));

        let session_dir = env_path("SESSION_PATH").unwrap_or_else(|| PathBuf::from("auth"));
        let greeted_file =
            env_path("GREETED_FILE").unwrap_or_else(|| PathBuf::from("greeted.json"));
        let welcome_image_path =
            env_path("WELCOME_IMAGE_PATH").unwrap_or_else(|| PathBuf::from("bienvenidas.jpg"));

        let enrollment_form_url = env_str("ENROLLMENT_FORM_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_ENROLLMENT_FORM_URL.to_string());
        let welcome_delay = Duration::from_millis(env_u64("WELCOME_DELAY_MS").unwrap_or(400));
        let reply_delay = Duration::from_millis(env_u64("REPLY_DELAY_MS").unwrap_or(3000));

        let reconnect_step =
            Duration::from_millis(env_u64("RECONNECT_STEP_MS").unwrap_or(2000).max(1));
        let reconnect_max = Duration::from_millis(env_u64("RECONNECT_MAX_MS").unwrap_or(30_000))
            .max(reconnect_step);

        Ok(Self {
            port,
            webhook_path,
            public_webhook_url,
            evolution_api_url: evolution_api_url.trim_end_matches('/').to_string(),
            evolution_api_key,
            evolution_instance,
            http_timeout,
            session_dir,
            greeted_file,
            welcome_image_path,
            enrollment_form_url,
            welcome_delay,
            reply_delay,
            reconnect_step,
            reconnect_max,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn normalize_route(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/webhook/evolution".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
