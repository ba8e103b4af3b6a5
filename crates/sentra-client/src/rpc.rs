//! Shared RPC plumbing for producer and consumer
//!
//! One connection, one in-flight request at a time: the socket lock is
//! held across the send and the matching receive, so responses can never
//! interleave between callers sharing a client.

use std::net::TcpStream;

use parking_lot::Mutex;

use sentra_common::error::{NetworkError, ProtocolError, Result};
use sentra_protocol::framing::{read_frame, write_frame};
use sentra_protocol::messages::{ApiKey, RequestHeader};
use sentra_protocol::wire::{ByteReader, ByteWriter};

pub(crate) struct RpcClient {
    stream: Mutex<TcpStream>,
    correlation_id: Mutex<i32>,
    client_id: String,
}

impl RpcClient {
    pub fn connect(host: &str, port: u16, client_id: &str) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).map_err(|e| {
            NetworkError::ConnectionFailed(format!("{}:{}: {}", host, port, e))
        })?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream: Mutex::new(stream),
            correlation_id: Mutex::new(0),
            client_id: client_id.to_string(),
        })
    }

    fn next_correlation_id(&self) -> i32 {
        let mut id = self.correlation_id.lock();
        *id += 1;
        *id
    }

    /// Send one request and block for its response body.
    ///
    /// The returned reader is positioned just past the echoed correlation
    /// id, at the first body field.
    pub fn call(&self, api_key: ApiKey, encode_body: impl FnOnce(&mut ByteWriter)) -> Result<ByteReader> {
        let correlation_id = self.next_correlation_id();

        let mut request = ByteWriter::new();
        RequestHeader::new(api_key, correlation_id, self.client_id.clone()).encode(&mut request);
        encode_body(&mut request);
        let request = request.into_bytes();

        let mut stream = self.stream.lock();
        write_frame(&mut *stream, &request)?;
        let response = read_frame(&mut *stream)?;
        drop(stream);

        let mut reader = ByteReader::new(response);
        let echoed = reader.read_i32()?;
        if echoed != correlation_id {
            return Err(ProtocolError::CorrelationMismatch {
                expected: correlation_id,
                actual: echoed,
            }
            .into());
        }
        Ok(reader)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}
