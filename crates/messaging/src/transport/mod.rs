//! Transports: how sync messages reach the rest of the fleet.
//!
//! Two production transports exist behind one contract — a broker
//! connection and a proxy relay — plus an in-memory fabric for tests and
//! single-process wiring. Startup selects exactly one from configuration.

mod broker;
mod local;
mod relay;

pub use broker::{BrokerOptions, BrokerTransport};
pub use local::{LocalFabric, LocalTransport};
pub use relay::{RelayLink, RelayLinkError, RelayTransport};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::MessagingError;
use crate::registry::MessageRegistry;

/// Duplex channel between this process and every other process in the
/// fleet.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Best-effort, at-most-once broadcast. Returns immediately; a failure
    /// is logged and the message dropped, because state events are
    /// superseded by future state rather than replayed.
    fn publish(&self, name: &str, payload: Bytes);

    /// Begin delivering inbound messages to `registry`. Called exactly
    /// once, after every handler is registered.
    async fn start(&self, registry: Arc<MessageRegistry>) -> Result<(), MessagingError>;

    /// Release all network resources. Safe to call even when `start`
    /// partially failed.
    async fn stop(&self);
}
