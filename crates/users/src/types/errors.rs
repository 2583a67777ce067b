//! Error types for the user directory and channel registry collaborators.

use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by a user directory implementation.
///
/// The sync layer treats every variant the same way: the event being applied
/// is dropped. A directory backed by remote storage maps its own timeouts
/// into `Unavailable`.
#[derive(Debug, Error, Clone)]
pub enum DirectoryError {
    #[error("no record for user {0}")]
    UnknownUser(Uuid),

    #[error("user storage unavailable: {0}")]
    Unavailable(String),
}
