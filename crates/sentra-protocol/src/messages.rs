//! Typed request/response messages
//!
//! A request opens with the standard header
//! `[api_key: i16][api_version: i16][correlation_id: i32][client_id: string]`
//! followed by an API-specific body. A response is
//! `[correlation_id: i32][body]`; the outer transport frame carries the
//! length. Error responses carry the full positional field set, with
//! zero / `-1` sentinels, so clients can always decode by position.

use bytes::Bytes;

use sentra_common::error::{ProtocolError, Result};
use sentra_common::types::{Offset, PartitionId, Record};

use crate::wire::{ByteReader, ByteWriter};

/// Protocol version carried in the request header
pub const API_VERSION: i16 = 1;

// ============================================================================
// API keys and error codes
// ============================================================================

/// Request type, carried as the first `i16` of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKey {
    Produce,
    Fetch,
    JoinGroup,
    CreateTopic,
}

impl ApiKey {
    pub fn as_i16(self) -> i16 {
        match self {
            ApiKey::Produce => 0,
            ApiKey::Fetch => 1,
            ApiKey::JoinGroup => 2,
            ApiKey::CreateTopic => 3,
        }
    }
}

impl TryFrom<i16> for ApiKey {
    type Error = ProtocolError;

    fn try_from(value: i16) -> std::result::Result<Self, ProtocolError> {
        match value {
            0 => Ok(ApiKey::Produce),
            1 => Ok(ApiKey::Fetch),
            2 => Ok(ApiKey::JoinGroup),
            3 => Ok(ApiKey::CreateTopic),
            other => Err(ProtocolError::UnknownApiKey(other)),
        }
    }
}

/// Wire error codes, carried as the first `i16` of every response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    None,
    UnknownTopic,
    UnknownPartition,
    NoGroup,
    Storage,
    UnknownApi,
}

impl ErrorCode {
    pub fn as_i16(self) -> i16 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::UnknownTopic => 1,
            ErrorCode::UnknownPartition => 2,
            ErrorCode::NoGroup => 3,
            ErrorCode::Storage => 4,
            ErrorCode::UnknownApi => 99,
        }
    }

    /// Decode a wire error code. Codes this build does not know decode to
    /// `None` only for 0; anything else is preserved as a raw failure by
    /// the caller via [`ErrorCode::from_i16`] returning `Err`.
    pub fn from_i16(value: i16) -> std::result::Result<Self, i16> {
        match value {
            0 => Ok(ErrorCode::None),
            1 => Ok(ErrorCode::UnknownTopic),
            2 => Ok(ErrorCode::UnknownPartition),
            3 => Ok(ErrorCode::NoGroup),
            4 => Ok(ErrorCode::Storage),
            99 => Ok(ErrorCode::UnknownApi),
            other => Err(other),
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, ErrorCode::None)
    }
}

// ============================================================================
// Request header
// ============================================================================

/// Standard request header
///
/// `api_key` is kept raw so the router can answer UNKNOWN_API (with the
/// echoed correlation id) instead of dropping the connection.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: String,
}

impl RequestHeader {
    pub fn new(api_key: ApiKey, correlation_id: i32, client_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.as_i16(),
            api_version: API_VERSION,
            correlation_id,
            client_id: client_id.into(),
        }
    }

    pub fn encode(&self, writer: &mut ByteWriter) {
        writer
            .write_i16(self.api_key)
            .write_i16(self.api_version)
            .write_i32(self.correlation_id)
            .write_string(&self.client_id);
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            api_key: reader.read_i16()?,
            api_version: reader.read_i16()?,
            correlation_id: reader.read_i32()?,
            client_id: reader.read_string()?,
        })
    }
}

// ============================================================================
// PRODUCE
// ============================================================================

/// `[topic: string][key: string][value: bytes]`
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub topic: String,
    pub key: String,
    pub value: Bytes,
}

impl ProduceRequest {
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer
            .write_string(&self.topic)
            .write_string(&self.key)
            .write_bytes(&self.value);
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            topic: reader.read_string()?,
            key: reader.read_string()?,
            value: reader.read_bytes()?,
        })
    }
}

/// `[error_code: i16][partition: i32][offset: i64]`
#[derive(Debug, Clone, Copy)]
pub struct ProduceResponse {
    pub error: ErrorCode,
    pub partition: PartitionId,
    pub offset: Offset,
}

impl ProduceResponse {
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer
            .write_i16(self.error.as_i16())
            .write_i32(self.partition)
            .write_i64(self.offset);
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        let error = ErrorCode::from_i16(reader.read_i16()?).unwrap_or(ErrorCode::UnknownApi);
        Ok(Self {
            error,
            partition: reader.read_i32()?,
            offset: reader.read_i64()?,
        })
    }
}

// ============================================================================
// FETCH
// ============================================================================

/// `[topic: string][partition: i32][offset: i64][max_records: i32]`
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub topic: String,
    pub partition: PartitionId,
    pub offset: Offset,
    pub max_records: i32,
}

impl FetchRequest {
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer
            .write_string(&self.topic)
            .write_i32(self.partition)
            .write_i64(self.offset)
            .write_i32(self.max_records);
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            topic: reader.read_string()?,
            partition: reader.read_i32()?,
            offset: reader.read_i64()?,
            max_records: reader.read_i32()?,
        })
    }
}

/// `[error_code: i16][num_records: i32]` then per record
/// `[offset: i64][key: string][value: bytes]`
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub error: ErrorCode,
    pub records: Vec<Record>,
}

impl FetchResponse {
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer
            .write_i16(self.error.as_i16())
            .write_i32(self.records.len() as i32);
        for record in &self.records {
            writer
                .write_i64(record.offset)
                .write_string(&record.key)
                .write_bytes(&record.value);
        }
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        let error = ErrorCode::from_i16(reader.read_i16()?).unwrap_or(ErrorCode::UnknownApi);
        let count = reader.read_i32()?;
        if count < 0 {
            return Err(ProtocolError::InvalidLength(i64::from(count)).into());
        }

        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let offset = reader.read_i64()?;
            let key = reader.read_string()?;
            let value = reader.read_bytes()?;
            records.push(Record { offset, key, value });
        }
        Ok(Self { error, records })
    }
}

// ============================================================================
// JOIN_GROUP
// ============================================================================

/// `[group: string][consumer_id: string][topic: string]`
#[derive(Debug, Clone)]
pub struct JoinGroupRequest {
    pub group: String,
    pub consumer_id: String,
    pub topic: String,
}

impl JoinGroupRequest {
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer
            .write_string(&self.group)
            .write_string(&self.consumer_id)
            .write_string(&self.topic);
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            group: reader.read_string()?,
            consumer_id: reader.read_string()?,
            topic: reader.read_string()?,
        })
    }
}

/// `[error_code: i16][assigned_partition: i32]`
///
/// `partition = -1` with `error = None` means the group has no free
/// partition left; `-1` with UNKNOWN_TOPIC means the topic does not exist.
#[derive(Debug, Clone, Copy)]
pub struct JoinGroupResponse {
    pub error: ErrorCode,
    pub partition: PartitionId,
}

impl JoinGroupResponse {
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_i16(self.error.as_i16()).write_i32(self.partition);
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        let error = ErrorCode::from_i16(reader.read_i16()?).unwrap_or(ErrorCode::UnknownApi);
        Ok(Self {
            error,
            partition: reader.read_i32()?,
        })
    }
}

// ============================================================================
// CREATE_TOPIC
// ============================================================================

/// `[topic: string][num_partitions: i32]`
#[derive(Debug, Clone)]
pub struct CreateTopicRequest {
    pub topic: String,
    pub num_partitions: i32,
}

impl CreateTopicRequest {
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer
            .write_string(&self.topic)
            .write_i32(self.num_partitions);
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            topic: reader.read_string()?,
            num_partitions: reader.read_i32()?,
        })
    }
}

/// `[error_code: i16]`
#[derive(Debug, Clone, Copy)]
pub struct CreateTopicResponse {
    pub error: ErrorCode,
}

impl CreateTopicResponse {
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_i16(self.error.as_i16());
    }

    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        let error = ErrorCode::from_i16(reader.read_i16()?).unwrap_or(ErrorCode::UnknownApi);
        Ok(Self { error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T>(encode: impl Fn(&T, &mut ByteWriter), value: &T) -> ByteReader {
        let mut writer = ByteWriter::new();
        encode(value, &mut writer);
        ByteReader::new(writer.into_bytes())
    }

    #[test]
    fn header_round_trips() {
        let header = RequestHeader::new(ApiKey::Produce, 42, "txn-producer");
        let mut reader = round_trip(RequestHeader::encode, &header);

        let decoded = RequestHeader::decode(&mut reader).unwrap();
        assert_eq!(decoded.api_key, 0);
        assert_eq!(decoded.api_version, API_VERSION);
        assert_eq!(decoded.correlation_id, 42);
        assert_eq!(decoded.client_id, "txn-producer");
    }

    #[test]
    fn produce_round_trips() {
        let request = ProduceRequest {
            topic: "transactions".into(),
            key: "customer_100".into(),
            value: Bytes::from_static(b"{\"amount\": 5000}"),
        };
        let mut reader = round_trip(ProduceRequest::encode, &request);

        let decoded = ProduceRequest::decode(&mut reader).unwrap();
        assert_eq!(decoded.topic, "transactions");
        assert_eq!(decoded.key, "customer_100");
        assert_eq!(&decoded.value[..], b"{\"amount\": 5000}");
    }

    #[test]
    fn fetch_response_round_trips_with_empty_fields() {
        let response = FetchResponse {
            error: ErrorCode::None,
            records: vec![
                Record::new(0, "", Bytes::new()),
                Record::new(1, "k", Bytes::from_static(b"v")),
            ],
        };
        let mut reader = round_trip(FetchResponse::encode, &response);

        let decoded = FetchResponse::decode(&mut reader).unwrap();
        assert!(decoded.error.is_none());
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.records[0].key, "");
        assert_eq!(decoded.records[0].value.len(), 0);
        assert_eq!(decoded.records[1].offset, 1);
    }

    #[test]
    fn join_group_sentinels_round_trip() {
        let response = JoinGroupResponse {
            error: ErrorCode::None,
            partition: -1,
        };
        let mut reader = round_trip(JoinGroupResponse::encode, &response);

        let decoded = JoinGroupResponse::decode(&mut reader).unwrap();
        assert!(decoded.error.is_none());
        assert_eq!(decoded.partition, -1);
    }

    #[test]
    fn api_key_rejects_unknown_values() {
        assert!(ApiKey::try_from(3).is_ok());
        assert!(matches!(
            ApiKey::try_from(17),
            Err(ProtocolError::UnknownApiKey(17))
        ));
    }

    #[test]
    fn error_codes_map_both_ways() {
        for code in [
            ErrorCode::None,
            ErrorCode::UnknownTopic,
            ErrorCode::UnknownPartition,
            ErrorCode::NoGroup,
            ErrorCode::Storage,
            ErrorCode::UnknownApi,
        ] {
            assert_eq!(ErrorCode::from_i16(code.as_i16()), Ok(code));
        }
        assert_eq!(ErrorCode::from_i16(42), Err(42));
    }
}
