//! Producer client

use tracing::debug;

use sentra_common::error::{Error, Result};
use sentra_common::types::RecordMetadata;
use sentra_protocol::messages::{
    ApiKey, CreateTopicRequest, CreateTopicResponse, ProduceRequest, ProduceResponse,
};

use crate::rpc::RpcClient;

/// Synchronous producer over one broker connection
pub struct Producer {
    rpc: RpcClient,
}

impl Producer {
    pub fn connect(host: &str, port: u16, client_id: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::connect(host, port, client_id)?,
        })
    }

    /// Ask the broker to create a topic. Creating an existing topic is a
    /// broker-side no-op, so this is safe to call on every startup.
    pub fn create_topic(&self, topic: &str, num_partitions: i32) -> Result<()> {
        let mut reader = self.rpc.call(ApiKey::CreateTopic, |w| {
            CreateTopicRequest {
                topic: topic.to_string(),
                num_partitions,
            }
            .encode(w);
        })?;

        let response = CreateTopicResponse::decode(&mut reader)?;
        if !response.error.is_none() {
            return Err(Error::Broker(response.error.as_i16()));
        }
        Ok(())
    }

    /// Send one record; the broker picks the partition from the key hash.
    pub fn send(&self, topic: &str, key: &str, value: &[u8]) -> Result<RecordMetadata> {
        let mut reader = self.rpc.call(ApiKey::Produce, |w| {
            ProduceRequest {
                topic: topic.to_string(),
                key: key.to_string(),
                value: bytes::Bytes::copy_from_slice(value),
            }
            .encode(w);
        })?;

        let response = ProduceResponse::decode(&mut reader)?;
        if !response.error.is_none() {
            return Err(Error::Broker(response.error.as_i16()));
        }

        debug!(
            client = self.rpc.client_id(),
            topic,
            partition = response.partition,
            offset = response.offset,
            "record produced"
        );
        Ok(RecordMetadata {
            topic: topic.to_string(),
            partition: response.partition,
            offset: response.offset,
        })
    }
}
