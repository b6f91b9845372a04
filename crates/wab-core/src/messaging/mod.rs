//! Transport-facing abstractions (WhatsApp gateway today; any socket-like transport later).

pub mod guarded;
pub mod port;
pub mod types;
