//! Primitive big-endian codec
//!
//! Field encodings:
//! - integers: big-endian `i8`/`i16`/`i32`/`i64`
//! - string: `i16` length + UTF-8 bytes
//! - bytes: `i32` length + raw bytes
//!
//! All reads are checked: a short buffer or negative length is a
//! `ProtocolError`, never a panic.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use sentra_common::error::{ProtocolError, Result};

/// Reads fields from a byte buffer, tracking position automatically
pub struct ByteReader {
    buf: Bytes,
}

impl ByteReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(ProtocolError::Truncated.into());
        }
        Ok(())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    /// Read an `i16` length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_i16()?;
        if len < 0 {
            return Err(ProtocolError::InvalidLength(i64::from(len)).into());
        }
        let len = len as usize;
        self.ensure(len)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidString.into())
    }

    /// Read an `i32` length-prefixed byte payload
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(ProtocolError::InvalidLength(i64::from(len)).into());
        }
        let len = len as usize;
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }
}

/// Builds a byte buffer by appending fields
#[derive(Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.buf.put_i8(value);
        self
    }

    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.buf.put_i16(value);
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.buf.put_i64(value);
        self
    }

    /// Write an `i16` length-prefixed UTF-8 string
    ///
    /// Strings longer than `i16::MAX` bytes are not representable on the
    /// wire; callers validate topic/key lengths before reaching here.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_i16(value.len() as i16);
        self.buf.put_slice(value.as_bytes());
        self
    }

    /// Write an `i32` length-prefixed byte payload
    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.write_i32(value.len() as i32);
        self.buf.put_slice(value);
        self
    }

    /// Append raw bytes with no length prefix (already-encoded bodies)
    pub fn write_raw(&mut self, raw: &[u8]) -> &mut Self {
        self.buf.put_slice(raw);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_common::error::{Error, ProtocolError};

    #[test]
    fn primitives_round_trip() {
        let mut writer = ByteWriter::new();
        writer
            .write_i8(-7)
            .write_i16(1025)
            .write_i32(-123_456)
            .write_i64(1 << 40);

        let mut reader = ByteReader::new(writer.into_bytes());
        assert_eq!(reader.read_i8().unwrap(), -7);
        assert_eq!(reader.read_i16().unwrap(), 1025);
        assert_eq!(reader.read_i32().unwrap(), -123_456);
        assert_eq!(reader.read_i64().unwrap(), 1 << 40);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn strings_and_bytes_round_trip() {
        let mut writer = ByteWriter::new();
        writer
            .write_string("customer_100")
            .write_string("")
            .write_bytes(b"{\"amount\": 5000}")
            .write_bytes(b"");

        let mut reader = ByteReader::new(writer.into_bytes());
        assert_eq!(reader.read_string().unwrap(), "customer_100");
        assert_eq!(reader.read_string().unwrap(), "");
        assert_eq!(&reader.read_bytes().unwrap()[..], b"{\"amount\": 5000}");
        assert_eq!(reader.read_bytes().unwrap().len(), 0);
    }

    #[test]
    fn utf8_strings_survive() {
        let mut writer = ByteWriter::new();
        writer.write_string("çlient-β");
        let mut reader = ByteReader::new(writer.into_bytes());
        assert_eq!(reader.read_string().unwrap(), "çlient-β");
    }

    #[test]
    fn short_buffer_is_truncated_error() {
        let mut reader = ByteReader::new(Bytes::from_static(&[0, 0, 1]));
        match reader.read_i32() {
            Err(Error::Protocol(ProtocolError::Truncated)) => {}
            other => panic!("expected Truncated, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn string_length_larger_than_payload_is_truncated() {
        // length prefix says 10 bytes but only 2 follow
        let mut reader = ByteReader::new(Bytes::from_static(&[0, 10, b'h', b'i']));
        assert!(matches!(
            reader.read_string(),
            Err(Error::Protocol(ProtocolError::Truncated))
        ));
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut writer = ByteWriter::new();
        writer.write_i32(-1);
        let mut reader = ByteReader::new(writer.into_bytes());
        assert!(matches!(
            reader.read_bytes(),
            Err(Error::Protocol(ProtocolError::InvalidLength(-1)))
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut reader = ByteReader::new(Bytes::from_static(&[0, 2, 0xff, 0xfe]));
        assert!(matches!(
            reader.read_string(),
            Err(Error::Protocol(ProtocolError::InvalidString))
        ));
    }
}
