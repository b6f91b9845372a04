//! Core of the WhatsApp recruitment auto-responder.
//!
//! This crate is framework-agnostic. The WhatsApp gateway lives behind the
//! [`messaging::port::TransportPort`] and [`lifecycle::TransportConnector`]
//! ports, implemented in adapter crates.

pub mod auth;
pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod messaging;
pub mod registry;
pub mod responder;
pub mod scripts;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
