//! Request routing
//!
//! Decodes the standard header, dispatches on the API key and builds the
//! `[correlation_id][body]` response. Protocol-level failures (unknown
//! topic, unknown partition, unknown API) are reported as error codes in
//! the response and never terminate the connection; a frame whose header
//! or body cannot be decoded does.

use bytes::Bytes;
use tracing::{error, warn};

use sentra_common::error::Result;
use sentra_common::metrics;
use sentra_protocol::messages::{
    ApiKey, CreateTopicRequest, CreateTopicResponse, ErrorCode, FetchRequest, FetchResponse,
    JoinGroupRequest, JoinGroupResponse, ProduceRequest, ProduceResponse, RequestHeader,
};
use sentra_protocol::wire::{ByteReader, ByteWriter};

use crate::registry::{JoinOutcome, Registry};

/// Handle one framed request, returning the framed response payload.
///
/// Returns `Err` only when the request cannot be decoded at all, in which
/// case the caller drops the connection.
pub fn handle_request(registry: &Registry, frame: Bytes) -> Result<Bytes> {
    let mut reader = ByteReader::new(frame);
    let header = RequestHeader::decode(&mut reader)?;

    let mut body = ByteWriter::new();
    match ApiKey::try_from(header.api_key) {
        Ok(ApiKey::Produce) => handle_produce(registry, &mut reader, &mut body)?,
        Ok(ApiKey::Fetch) => handle_fetch(registry, &mut reader, &mut body)?,
        Ok(ApiKey::JoinGroup) => handle_join_group(registry, &mut reader, &mut body)?,
        Ok(ApiKey::CreateTopic) => handle_create_topic(registry, &mut reader, &mut body)?,
        Err(_) => {
            warn!(
                api_key = header.api_key,
                client = %header.client_id,
                "unknown api key"
            );
            metrics::record_error_response(ErrorCode::UnknownApi.as_i16());
            body.write_i16(ErrorCode::UnknownApi.as_i16());
        }
    }
    let body = body.into_bytes();

    let mut response = ByteWriter::with_capacity(4 + body.len());
    response.write_i32(header.correlation_id).write_raw(&body);
    Ok(response.into_bytes())
}

fn handle_produce(registry: &Registry, reader: &mut ByteReader, body: &mut ByteWriter) -> Result<()> {
    let request = ProduceRequest::decode(reader)?;

    let Some(topic) = registry.topic(&request.topic) else {
        metrics::record_error_response(ErrorCode::UnknownTopic.as_i16());
        ProduceResponse {
            error: ErrorCode::UnknownTopic,
            partition: 0,
            offset: 0,
        }
        .encode(body);
        return Ok(());
    };

    let (partition_id, partition) = topic.route(&request.key);

    let response = match partition.append(&request.key, &request.value) {
        Ok(offset) => {
            metrics::record_produced(&request.topic, request.value.len() as u64);
            ProduceResponse {
                error: ErrorCode::None,
                partition: partition_id,
                offset,
            }
        }
        Err(e) => {
            error!(
                topic = %request.topic,
                partition = partition_id,
                "append failed: {}",
                e
            );
            metrics::record_error_response(ErrorCode::Storage.as_i16());
            ProduceResponse {
                error: ErrorCode::Storage,
                partition: partition_id,
                offset: -1,
            }
        }
    };
    response.encode(body);
    Ok(())
}

fn handle_fetch(registry: &Registry, reader: &mut ByteReader, body: &mut ByteWriter) -> Result<()> {
    let request = FetchRequest::decode(reader)?;

    let Some(topic) = registry.topic(&request.topic) else {
        metrics::record_error_response(ErrorCode::UnknownTopic.as_i16());
        FetchResponse {
            error: ErrorCode::UnknownTopic,
            records: Vec::new(),
        }
        .encode(body);
        return Ok(());
    };

    let Some(partition) = topic.partition(request.partition) else {
        metrics::record_error_response(ErrorCode::UnknownPartition.as_i16());
        FetchResponse {
            error: ErrorCode::UnknownPartition,
            records: Vec::new(),
        }
        .encode(body);
        return Ok(());
    };

    let response = match partition.read(request.offset, request.max_records) {
        Ok(records) => {
            metrics::record_fetched(&request.topic, records.len() as u64);
            FetchResponse {
                error: ErrorCode::None,
                records,
            }
        }
        Err(e) => {
            error!(
                topic = %request.topic,
                partition = request.partition,
                "read failed: {}",
                e
            );
            metrics::record_error_response(ErrorCode::Storage.as_i16());
            FetchResponse {
                error: ErrorCode::Storage,
                records: Vec::new(),
            }
        }
    };
    response.encode(body);
    Ok(())
}

fn handle_join_group(
    registry: &Registry,
    reader: &mut ByteReader,
    body: &mut ByteWriter,
) -> Result<()> {
    let request = JoinGroupRequest::decode(reader)?;

    let response = match registry.join_group(&request.group, &request.consumer_id, &request.topic) {
        JoinOutcome::Assigned(partition) => JoinGroupResponse {
            error: ErrorCode::None,
            partition,
        },
        JoinOutcome::UnknownTopic => {
            metrics::record_error_response(ErrorCode::UnknownTopic.as_i16());
            JoinGroupResponse {
                error: ErrorCode::UnknownTopic,
                partition: -1,
            }
        }
        // Kept as err = NONE with the -1 sentinel for wire compatibility.
        JoinOutcome::Exhausted => JoinGroupResponse {
            error: ErrorCode::None,
            partition: -1,
        },
    };
    response.encode(body);
    Ok(())
}

fn handle_create_topic(
    registry: &Registry,
    reader: &mut ByteReader,
    body: &mut ByteWriter,
) -> Result<()> {
    let request = CreateTopicRequest::decode(reader)?;

    let response = match registry.create_topic(&request.topic, request.num_partitions) {
        Ok(()) => CreateTopicResponse {
            error: ErrorCode::None,
        },
        Err(sentra_common::Error::Config(reason)) => {
            warn!(topic = %request.topic, "rejected create: {}", reason);
            metrics::record_error_response(ErrorCode::UnknownPartition.as_i16());
            CreateTopicResponse {
                error: ErrorCode::UnknownPartition,
            }
        }
        Err(e) => {
            error!(topic = %request.topic, "create failed: {}", e);
            metrics::record_error_response(ErrorCode::Storage.as_i16());
            CreateTopicResponse {
                error: ErrorCode::Storage,
            }
        }
    };
    response.encode(body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_protocol::messages::API_VERSION;
    use tempfile::TempDir;

    fn request_frame(api_key: i16, correlation_id: i32, encode_body: impl Fn(&mut ByteWriter)) -> Bytes {
        let mut writer = ByteWriter::new();
        writer
            .write_i16(api_key)
            .write_i16(API_VERSION)
            .write_i32(correlation_id)
            .write_string("test-client");
        encode_body(&mut writer);
        writer.into_bytes()
    }

    fn response_reader(registry: &Registry, frame: Bytes, correlation_id: i32) -> ByteReader {
        let response = handle_request(registry, frame).expect("routable request");
        let mut reader = ByteReader::new(response);
        assert_eq!(reader.read_i32().unwrap(), correlation_id);
        reader
    }

    fn registry_with_topic(partitions: i32) -> (Registry, TempDir) {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new(dir.path());
        registry.create_topic("transactions", partitions).unwrap();
        (registry, dir)
    }

    #[test]
    fn produce_then_fetch_round_trips() {
        let (registry, _dir) = registry_with_topic(2);

        let frame = request_frame(0, 7, |w| {
            ProduceRequest {
                topic: "transactions".into(),
                key: "k".into(),
                value: Bytes::from_static(b"v"),
            }
            .encode(w);
        });
        let mut reader = response_reader(&registry, frame, 7);
        let produce = ProduceResponse::decode(&mut reader).unwrap();
        assert!(produce.error.is_none());
        assert_eq!(produce.offset, 0);
        let expected_partition = (crc32fast::hash(b"k") % 2) as i32;
        assert_eq!(produce.partition, expected_partition);

        let frame = request_frame(1, 8, |w| {
            FetchRequest {
                topic: "transactions".into(),
                partition: produce.partition,
                offset: 0,
                max_records: 10,
            }
            .encode(w);
        });
        let mut reader = response_reader(&registry, frame, 8);
        let fetch = FetchResponse::decode(&mut reader).unwrap();
        assert!(fetch.error.is_none());
        assert_eq!(fetch.records.len(), 1);
        assert_eq!(fetch.records[0].offset, 0);
        assert_eq!(fetch.records[0].key, "k");
        assert_eq!(&fetch.records[0].value[..], b"v");
    }

    #[test]
    fn produce_to_unknown_topic_keeps_positional_fields() {
        let (registry, _dir) = registry_with_topic(1);

        let frame = request_frame(0, 1, |w| {
            ProduceRequest {
                topic: "missing".into(),
                key: "k".into(),
                value: Bytes::new(),
            }
            .encode(w);
        });
        let mut reader = response_reader(&registry, frame, 1);
        let produce = ProduceResponse::decode(&mut reader).unwrap();
        assert_eq!(produce.error, ErrorCode::UnknownTopic);
        assert_eq!(produce.partition, 0);
        assert_eq!(produce.offset, 0);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn fetch_unknown_partition() {
        let (registry, _dir) = registry_with_topic(2);

        for bad_partition in [-1, 2, 57] {
            let frame = request_frame(1, 3, |w| {
                FetchRequest {
                    topic: "transactions".into(),
                    partition: bad_partition,
                    offset: 0,
                    max_records: 10,
                }
                .encode(w);
            });
            let mut reader = response_reader(&registry, frame, 3);
            let fetch = FetchResponse::decode(&mut reader).unwrap();
            assert_eq!(fetch.error, ErrorCode::UnknownPartition);
            assert!(fetch.records.is_empty());
        }
    }

    #[test]
    fn join_group_outcomes_on_the_wire() {
        let (registry, _dir) = registry_with_topic(1);

        let join = |correlation: i32, consumer: &str, topic: &str| {
            let consumer = consumer.to_string();
            let topic = topic.to_string();
            let frame = request_frame(2, correlation, move |w| {
                JoinGroupRequest {
                    group: "g".into(),
                    consumer_id: consumer.clone(),
                    topic: topic.clone(),
                }
                .encode(w);
            });
            let mut reader = response_reader(&registry, frame, correlation);
            JoinGroupResponse::decode(&mut reader).unwrap()
        };

        let first = join(1, "c1", "transactions");
        assert!(first.error.is_none());
        assert_eq!(first.partition, 0);

        // all partitions taken: sentinel -1 with err NONE
        let full = join(2, "c2", "transactions");
        assert!(full.error.is_none());
        assert_eq!(full.partition, -1);

        let unknown = join(3, "c3", "no-such-topic");
        assert_eq!(unknown.error, ErrorCode::UnknownTopic);
        assert_eq!(unknown.partition, -1);
    }

    #[test]
    fn create_topic_via_wire_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new(dir.path());

        for correlation in [1, 2] {
            let frame = request_frame(3, correlation, |w| {
                CreateTopicRequest {
                    topic: "events".into(),
                    num_partitions: 2,
                }
                .encode(w);
            });
            let mut reader = response_reader(&registry, frame, correlation);
            let response = CreateTopicResponse::decode(&mut reader).unwrap();
            assert!(response.error.is_none());
        }
        assert_eq!(registry.topic("events").unwrap().num_partitions(), 2);
    }

    #[test]
    fn unknown_api_key_reports_code_99() {
        let (registry, _dir) = registry_with_topic(1);

        let frame = request_frame(42, 9, |_| {});
        let mut reader = response_reader(&registry, frame, 9);
        assert_eq!(reader.read_i16().unwrap(), 99);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn malformed_header_is_fatal() {
        let (registry, _dir) = registry_with_topic(1);
        assert!(handle_request(&registry, Bytes::from_static(&[0, 0, 0])).is_err());
    }
}
