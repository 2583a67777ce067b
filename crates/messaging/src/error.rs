//! Error types for the messaging fabric.

use partyline_codec::CodecError;
use thiserror::Error;

/// Failures inside the sync layer. Nothing here escalates to a user-visible
/// error: a dropped event means transient inconsistency that the next state
/// change (or a fresh login re-reading persisted truth) corrects. The only
/// startup-fatal classes are `DuplicateHandler` and `Configuration`.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] CodecError),

    #[error("no handler registered for message type \"{0}\"")]
    UnknownMessageType(String),

    #[error("handler already registered for message type \"{0}\"")]
    DuplicateHandler(String),

    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("event references a user or channel unknown to this process")]
    UnresolvedTarget,

    #[error("invalid transport configuration: {0}")]
    Configuration(String),
}
