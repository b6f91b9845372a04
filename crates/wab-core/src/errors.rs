/// Core error type for the responder.
///
/// Adapter crates map their specific errors into this type so the dispatch
/// path can tell "transport closed" apart from other delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport not ready: socket is not open")]
    TransportNotReady,

    #[error("gateway returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
