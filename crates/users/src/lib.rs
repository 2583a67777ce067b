//! # Partyline Users Crate
//!
//! Chat user records and the collaborator interfaces the sync layer consumes:
//! the user directory (resolves a UUID to a mutable local record), the channel
//! registry (resolves a channel key), and the notifier (delivers rendered text
//! to a player). The sync layer never owns these; a host embeds its own
//! implementations behind the traits, and the in-memory implementations here
//! back tests and standalone deployments.
//!
//! ## Architecture
//!
//! - **Entities**: `ChatUser`, `ChannelSettings`, `ChannelKey`, `Channel`
//! - **Services**: directory / registry / notifier traits and memory-backed
//!   implementations
//! - **Types**: shared error types

pub mod entities;
pub mod services;
pub mod types;

pub use entities::{Channel, ChannelKey, ChannelSettings, ChatUser, SharedUser};
pub use services::{
    ChannelRegistry, LogNotifier, MemoryChannelRegistry, MemoryUserDirectory, Notifier,
    RecordingNotifier, UserDirectory,
};
pub use types::DirectoryError;
