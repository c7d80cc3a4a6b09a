//! Core of the keyword relay.
//!
//! Watches source chats, matches new messages against per-destination keyword
//! sets and relays matches (native forward, or a reconstructed copy when the
//! source forbids forwarding). The chat platform lives behind the
//! [`backend::port::ChatBackend`] port, implemented in adapter crates.

pub mod backend;
pub mod config;
pub mod context;
pub mod cursor;
pub mod delivery;
pub mod domain;
pub mod errors;
pub mod events;
pub mod formatting;
pub mod liveness;
pub mod logging;
pub mod matcher;
pub mod relay;
pub mod routing;
pub mod runtime;
pub mod scheduler;
pub mod startup;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{Error, Result};
