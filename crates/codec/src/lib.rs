//! Binary payload codec for sync messages.
//!
//! Every message exchanged between servers is an ordered sequence of
//! primitive fields appended to one buffer: length-prefixed UTF-8 strings
//! (u16 big-endian prefix), single-byte booleans, big-endian 64-bit
//! integers, and UUIDs written as two consecutive big-endian u64s
//! (most-significant bits first). Serialized rich text travels as a plain
//! string; the codec never interprets it.
//!
//! The layout is the persisted contract between server versions, so it is
//! additive-only: new message types may be introduced, existing field
//! sequences must never change.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use uuid::Uuid;

/// Decode failures. A failed read invalidates the whole message; callers
/// must drop it rather than attempt partial recovery.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload ended early: needed {needed} bytes, {remaining} left")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("boolean field holds invalid byte {0:#04x}")]
    InvalidBool(u8),

    #[error("string field of {0} bytes exceeds the u16 length prefix")]
    StringTooLong(usize),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Appends encoded fields to a growable buffer.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length-prefixed UTF-8. Strings longer than `u16::MAX` bytes do not
    /// fit the prefix and are rejected rather than truncated.
    pub fn write_str(&mut self, value: &str) -> CodecResult<()> {
        let len = value.len();
        if len > u16::MAX as usize {
            return Err(CodecError::StringTooLong(len));
        }
        self.buf.put_u16(len as u16);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Most-significant bits first, matching the fleet's historical layout.
    pub fn write_uuid(&mut self, value: Uuid) {
        let (msb, lsb) = value.as_u64_pair();
        self.buf.put_u64(msb);
        self.buf.put_u64(lsb);
    }

    /// Appends raw bytes with no framing. Used for nesting an already
    /// encoded payload behind an envelope header.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Consumes encoded fields from a buffer in write order.
#[derive(Debug)]
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> CodecResult<()> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(CodecError::UnexpectedEnd { needed, remaining });
        }
        Ok(())
    }

    pub fn read_str(&mut self) -> CodecResult<String> {
        self.ensure(2)?;
        let len = self.buf.get_u16() as usize;
        self.ensure(len)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        self.ensure(1)?;
        match self.buf.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }

    pub fn read_i64(&mut self) -> CodecResult<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_uuid(&mut self) -> CodecResult<Uuid> {
        self.ensure(16)?;
        let msb = self.buf.get_u64();
        let lsb = self.buf.get_u64();
        Ok(Uuid::from_u64_pair(msb, lsb))
    }

    /// Hands back everything not yet consumed, emptying the reader.
    pub fn take_remaining(&mut self) -> Bytes {
        self.buf.split_to(self.buf.len())
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_mixed_field_sequence() {
        let id = Uuid::new_v4();
        let mut writer = PayloadWriter::new();
        writer.write_str("global").unwrap();
        writer.write_bool(true);
        writer.write_bool(false);
        writer.write_i64(-42);
        writer.write_uuid(id);

        let mut reader = PayloadReader::new(writer.freeze());
        assert_eq!(reader.read_str().unwrap(), "global");
        assert!(reader.read_bool().unwrap());
        assert!(!reader.read_bool().unwrap());
        assert_eq!(reader.read_i64().unwrap(), -42);
        assert_eq!(reader.read_uuid().unwrap(), id);
        assert!(reader.is_empty());
    }

    #[test]
    fn round_trips_empty_and_unicode_strings() {
        let mut writer = PayloadWriter::new();
        writer.write_str("").unwrap();
        writer.write_str("héllo wörld ☂").unwrap();

        let mut reader = PayloadReader::new(writer.freeze());
        assert_eq!(reader.read_str().unwrap(), "");
        assert_eq!(reader.read_str().unwrap(), "héllo wörld ☂");
    }

    #[test]
    fn uuid_layout_is_msb_then_lsb_big_endian() {
        let id = Uuid::from_u64_pair(0x0102030405060708, 0x090a0b0c0d0e0f10);
        let mut writer = PayloadWriter::new();
        writer.write_uuid(id);
        let bytes = writer.freeze();
        assert_eq!(&bytes[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[8..], &[9, 10, 11, 12, 13, 14, 15, 16]);
    }

    #[test]
    fn truncated_string_fails() {
        let mut writer = PayloadWriter::new();
        writer.write_str("abcdef").unwrap();
        let full = writer.freeze();
        let mut reader = PayloadReader::new(full.slice(..4));
        assert!(matches!(
            reader.read_str(),
            Err(CodecError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn truncated_uuid_fails() {
        let mut writer = PayloadWriter::new();
        writer.write_uuid(Uuid::new_v4());
        let full = writer.freeze();
        let mut reader = PayloadReader::new(full.slice(..10));
        assert!(matches!(
            reader.read_uuid(),
            Err(CodecError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn invalid_bool_byte_fails() {
        let mut reader = PayloadReader::new(Bytes::from_static(&[7]));
        assert!(matches!(reader.read_bool(), Err(CodecError::InvalidBool(7))));
    }

    #[test]
    fn invalid_utf8_fails() {
        let mut reader = PayloadReader::new(Bytes::from_static(&[0, 2, 0xff, 0xfe]));
        assert!(matches!(reader.read_str(), Err(CodecError::InvalidUtf8)));
    }

    #[test]
    fn oversized_string_is_rejected_at_write_time() {
        let big = "x".repeat(u16::MAX as usize + 1);
        let mut writer = PayloadWriter::new();
        assert!(matches!(
            writer.write_str(&big),
            Err(CodecError::StringTooLong(_))
        ));
    }

    #[test]
    fn take_remaining_returns_unconsumed_tail() {
        let mut writer = PayloadWriter::new();
        writer.write_bool(true);
        writer.write_raw(b"opaque tail");

        let mut reader = PayloadReader::new(writer.freeze());
        reader.read_bool().unwrap();
        assert_eq!(reader.take_remaining(), Bytes::from_static(b"opaque tail"));
        assert!(reader.is_empty());
    }

    #[test]
    fn reading_from_empty_buffer_fails() {
        let mut reader = PayloadReader::new(Bytes::new());
        assert!(reader.read_bool().is_err());
        assert!(reader.read_str().is_err());
        assert!(reader.read_i64().is_err());
        assert!(reader.read_uuid().is_err());
    }
}
