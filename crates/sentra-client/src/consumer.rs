//! Consumer client
//!
//! A consumer joins a group to receive an exclusive partition, then
//! fetches from its own cursor, advancing past the last record returned.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use sentra_common::error::{Error, NetworkError, Result};
use sentra_common::types::{Offset, PartitionId, Record};
use sentra_protocol::messages::{
    ApiKey, FetchRequest, FetchResponse, JoinGroupRequest, JoinGroupResponse,
};

use crate::rpc::RpcClient;

struct CursorState {
    assigned_partition: Option<PartitionId>,
    current_offset: Offset,
}

/// Synchronous consumer over one broker connection
pub struct Consumer {
    rpc: RpcClient,
    cursor: Mutex<CursorState>,
}

impl Consumer {
    pub fn connect(host: &str, port: u16, client_id: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::connect(host, port, client_id)?,
            cursor: Mutex::new(CursorState {
                assigned_partition: None,
                current_offset: 0,
            }),
        })
    }

    /// Join a consumer group, using the client id as the member id.
    ///
    /// On success the returned partition becomes this consumer's fetch
    /// target and the cursor resets to offset zero. A full group (every
    /// partition owned) surfaces as [`NetworkError::NotJoined`].
    pub fn join_group(&self, group: &str, topic: &str) -> Result<PartitionId> {
        let mut reader = self.rpc.call(ApiKey::JoinGroup, |w| {
            JoinGroupRequest {
                group: group.to_string(),
                consumer_id: self.rpc.client_id().to_string(),
                topic: topic.to_string(),
            }
            .encode(w);
        })?;

        let response = JoinGroupResponse::decode(&mut reader)?;
        if !response.error.is_none() {
            return Err(Error::Broker(response.error.as_i16()));
        }
        if response.partition < 0 {
            // err NONE with the -1 sentinel: every partition is owned
            return Err(NetworkError::NotJoined.into());
        }

        let mut cursor = self.cursor.lock();
        cursor.assigned_partition = Some(response.partition);
        cursor.current_offset = 0;

        debug!(
            client = self.rpc.client_id(),
            group,
            topic,
            partition = response.partition,
            "joined group"
        );
        Ok(response.partition)
    }

    /// Partition received from the last successful join, if any
    pub fn assigned_partition(&self) -> Option<PartitionId> {
        self.cursor.lock().assigned_partition
    }

    /// Fetch up to `max_records` from the assigned partition, advancing
    /// the cursor past the last record returned.
    pub fn fetch(&self, topic: &str, max_records: i32) -> Result<Vec<Record>> {
        let (partition, offset) = {
            let cursor = self.cursor.lock();
            match cursor.assigned_partition {
                Some(partition) => (partition, cursor.current_offset),
                None => return Err(NetworkError::NotJoined.into()),
            }
        };

        let mut reader = self.rpc.call(ApiKey::Fetch, |w| {
            FetchRequest {
                topic: topic.to_string(),
                partition,
                offset,
                max_records,
            }
            .encode(w);
        })?;

        let response = FetchResponse::decode(&mut reader)?;
        if !response.error.is_none() {
            return Err(Error::Broker(response.error.as_i16()));
        }

        if let Some(last) = response.records.last() {
            self.cursor.lock().current_offset = last.offset + 1;
        }
        Ok(response.records)
    }

    /// Poll the topic, invoking `handler` per record. Sleeps `interval`
    /// whenever a fetch comes back empty; returns when `handler` returns
    /// `false` or a call fails.
    pub fn poll(
        &self,
        topic: &str,
        max_records: i32,
        interval: Duration,
        mut handler: impl FnMut(&Record) -> bool,
    ) -> Result<()> {
        loop {
            let records = self.fetch(topic, max_records)?;
            for record in &records {
                if !handler(record) {
                    return Ok(());
                }
            }
            if records.is_empty() {
                std::thread::sleep(interval);
            }
        }
    }
}
