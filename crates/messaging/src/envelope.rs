//! Wire envelope shared by every transport.

use bytes::Bytes;
use partyline_codec::{CodecResult, PayloadReader, PayloadWriter};
use uuid::Uuid;

/// One unit on the wire: the message-type name, the publishing process's
/// identity, then the type-specific payload.
///
/// The origin tag exists because a broker topic echoes a publish back to
/// its own subscriber; without it a process would apply its own events as
/// if they were remote. Transports compare the tag against the local
/// process id and drop matches before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    pub origin: Uuid,
    pub payload: Bytes,
}

impl Frame {
    pub fn encode(name: &str, origin: Uuid, payload: &[u8]) -> CodecResult<Bytes> {
        let mut writer = PayloadWriter::new();
        writer.write_str(name)?;
        writer.write_uuid(origin);
        writer.write_raw(payload);
        Ok(writer.freeze())
    }

    pub fn decode(raw: Bytes) -> CodecResult<Self> {
        let mut reader = PayloadReader::new(raw);
        let name = reader.read_str()?;
        let origin = reader.read_uuid()?;
        let payload = reader.take_remaining();
        Ok(Self {
            name,
            origin,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let origin = Uuid::new_v4();
        let raw = Frame::encode("muted", origin, b"\x01").unwrap();
        let frame = Frame::decode(raw).unwrap();
        assert_eq!(frame.name, "muted");
        assert_eq!(frame.origin, origin);
        assert_eq!(frame.payload, Bytes::from_static(b"\x01"));
    }

    #[test]
    fn empty_payload_is_valid() {
        let raw = Frame::encode("nickname-reset", Uuid::new_v4(), &[]).unwrap();
        let frame = Frame::decode(raw).unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let raw = Frame::encode("muted", Uuid::new_v4(), b"\x01").unwrap();
        assert!(Frame::decode(raw.slice(..raw.len() - 20)).is_err());
    }
}
