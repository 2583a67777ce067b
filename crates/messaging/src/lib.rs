//! # Partyline Messaging Crate
//!
//! The state-synchronization fabric that makes a fleet of game-server
//! processes look like one chat service. Discrete state changes (nickname,
//! mutes, ignores, channel preferences, relayed chat components) are encoded
//! into compact binary messages, broadcast to every other process over a
//! pluggable transport, and applied to local user records without ever
//! rebroadcasting a change that arrived from elsewhere.
//!
//! ## Architecture
//!
//! - **Envelope**: the `(type-name, origin-process, payload)` wire frame
//! - **Transport**: broker (Redis pub/sub), relay (proxy plugin messaging),
//!   and an in-memory fabric for single-process wiring and tests
//! - **Registry**: name → decode-and-apply handler dispatch
//! - **Synchronizer**: the per-process façade offering typed publish
//!   operations and the built-in handler catalog
//!
//! Delivery is best-effort by design: a dropped sync message is superseded
//! by the next state change or by the persisted truth re-read at login.

pub mod envelope;
pub mod error;
pub mod registry;
pub mod sync;
pub mod transport;

pub use envelope::Frame;
pub use error::MessagingError;
pub use registry::MessageRegistry;
pub use sync::{names, Notices, Origin, Synchronizer};
pub use transport::{
    BrokerOptions, BrokerTransport, LocalFabric, LocalTransport, RelayLink, RelayLinkError,
    RelayTransport, Transport,
};
