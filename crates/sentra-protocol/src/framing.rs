//! Transport framing
//!
//! Every application message crossing a socket is preceded by a 4-byte
//! big-endian length of the payload that follows. Receivers loop until the
//! exact byte count is satisfied; a peer closing mid-frame surfaces as an
//! I/O error that terminates the connection.

use std::io::{Read, Write};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use sentra_common::error::{ProtocolError, Result};

/// Upper bound on a single frame. A corrupt length prefix must not turn
/// into a multi-gigabyte allocation.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

fn check_frame_size(size: usize) -> Result<()> {
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(size).into());
    }
    Ok(())
}

/// Read one length-prefixed message from a blocking stream
pub fn read_frame<R: Read>(stream: &mut R) -> Result<Bytes> {
    let mut size_buf = [0u8; 4];
    stream.read_exact(&mut size_buf)?;
    let size = u32::from_be_bytes(size_buf) as usize;
    check_frame_size(size)?;

    let mut payload = vec![0u8; size];
    stream.read_exact(&mut payload)?;
    Ok(Bytes::from(payload))
}

/// Send one length-prefixed message over a blocking stream
pub fn write_frame<W: Write>(stream: &mut W, payload: &[u8]) -> Result<()> {
    check_frame_size(payload.len())?;
    stream.write_all(&(payload.len() as u32).to_be_bytes())?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}

/// Read one length-prefixed message from an async stream
pub async fn read_frame_async<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Bytes> {
    let mut size_buf = [0u8; 4];
    stream.read_exact(&mut size_buf).await?;
    let size = u32::from_be_bytes(size_buf) as usize;
    check_frame_size(size)?;

    let mut payload = vec![0u8; size];
    stream.read_exact(&mut payload).await?;
    Ok(Bytes::from(payload))
}

/// Send one length-prefixed message over an async stream
pub async fn write_frame_async<W: AsyncWrite + Unpin>(stream: &mut W, payload: &[u8]) -> Result<()> {
    check_frame_size(payload.len())?;
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_common::error::{Error, ProtocolError};
    use std::io::Cursor;

    #[test]
    fn frame_round_trips_sync() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"hello broker").unwrap();

        let mut cursor = Cursor::new(wire);
        let frame = read_frame(&mut cursor).unwrap();
        assert_eq!(&frame[..], b"hello broker");
    }

    #[test]
    fn empty_frame_round_trips() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"").unwrap();

        let mut cursor = Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor).unwrap().len(), 0);
    }

    #[test]
    fn peer_close_mid_frame_is_io_error() {
        // length says 8 bytes, only 3 arrive
        let mut wire = Vec::new();
        wire.extend_from_slice(&8u32.to_be_bytes());
        wire.extend_from_slice(b"abc");

        let mut cursor = Cursor::new(wire);
        assert!(matches!(read_frame(&mut cursor), Err(Error::Io(_))));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(MAX_FRAME_SIZE as u32 + 1).to_be_bytes());

        let mut cursor = Cursor::new(wire);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(Error::Protocol(ProtocolError::FrameTooLarge(_)))
        ));
    }

    #[tokio::test]
    async fn frame_round_trips_async() {
        let mut wire = Vec::new();
        write_frame_async(&mut wire, b"async frame").await.unwrap();

        let mut cursor = Cursor::new(wire);
        let frame = read_frame_async(&mut cursor).await.unwrap();
        assert_eq!(&frame[..], b"async frame");
    }
}
