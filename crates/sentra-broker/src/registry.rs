//! Topic and consumer-group registry
//!
//! Topics map to a fixed set of partitions created once and kept for the
//! broker's lifetime. Consumer groups hand out exclusive partition
//! assignments within a topic: first free partition in ascending order,
//! sticky for the life of the group, no revocation and no rebalancing.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::info;

use sentra_common::error::{Error, Result};
use sentra_common::types::PartitionId;

use crate::log::PartitionLog;

/// A topic with a fixed number of partitions
pub struct Topic {
    name: String,
    partitions: Vec<Arc<PartitionLog>>,
}

impl Topic {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_partitions(&self) -> i32 {
        self.partitions.len() as i32
    }

    /// Partition by id; out-of-range (including negative) is `None`
    pub fn partition(&self, id: PartitionId) -> Option<&Arc<PartitionLog>> {
        usize::try_from(id).ok().and_then(|i| self.partitions.get(i))
    }

    /// Route a key to a partition.
    ///
    /// Uses CRC32 over the UTF-8 key bytes: deterministic and stable across
    /// processes, so producers route identically after a broker restart.
    pub fn partition_for_key(&self, key: &str) -> PartitionId {
        (crc32fast::hash(key.as_bytes()) % self.partitions.len() as u32) as PartitionId
    }

    /// Route a key and hand back the owning partition log
    pub fn route(&self, key: &str) -> (PartitionId, &Arc<PartitionLog>) {
        let id = self.partition_for_key(key);
        (id, &self.partitions[id as usize])
    }
}

/// Result of a group join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Consumer owns this partition (new or previously assigned)
    Assigned(PartitionId),
    /// The requested topic does not exist
    UnknownTopic,
    /// Every partition already has an owner
    Exhausted,
}

#[derive(Default)]
struct ConsumerGroup {
    /// consumer_id -> assigned partition
    members: Mutex<HashMap<String, PartitionId>>,
}

/// Broker-level registry of topics and consumer groups
pub struct Registry {
    data_dir: PathBuf,
    topics: DashMap<String, Arc<Topic>>,
    groups: DashMap<String, ConsumerGroup>,
}

impl Registry {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            topics: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create a topic with `num_partitions` partitions, opening (and
    /// recovering) each partition log. Idempotent: creating an existing
    /// topic is a no-op, whatever partition count is passed.
    pub fn create_topic(&self, name: &str, num_partitions: i32) -> Result<()> {
        if num_partitions <= 0 {
            return Err(Error::Config(format!(
                "topic '{}' needs a positive partition count, got {}",
                name, num_partitions
            )));
        }

        match self.topics.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let partitions = (0..num_partitions)
                    .map(|id| PartitionLog::open(&self.data_dir, name, id).map(Arc::new))
                    .collect::<Result<Vec<_>>>()?;

                slot.insert(Arc::new(Topic {
                    name: name.to_string(),
                    partitions,
                }));
                info!(topic = name, partitions = num_partitions, "topic created");
                Ok(())
            }
        }
    }

    pub fn topic(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.get(name).map(|t| t.value().clone())
    }

    /// Add a consumer to a group and assign it a partition of `topic`.
    ///
    /// A consumer_id that is already a member keeps its existing
    /// assignment; otherwise the lowest unassigned partition index wins.
    pub fn join_group(&self, group: &str, consumer_id: &str, topic: &str) -> JoinOutcome {
        let Some(topic) = self.topic(topic) else {
            return JoinOutcome::UnknownTopic;
        };
        let num_partitions = topic.num_partitions();

        let group = self.groups.entry(group.to_string()).or_default();
        let mut members = group.members.lock();

        if let Some(&existing) = members.get(consumer_id) {
            return JoinOutcome::Assigned(existing);
        }

        let taken: HashSet<PartitionId> = members.values().copied().collect();
        for candidate in 0..num_partitions {
            if !taken.contains(&candidate) {
                members.insert(consumer_id.to_string(), candidate);
                info!(
                    consumer = consumer_id,
                    partition = candidate,
                    "consumer joined group"
                );
                return JoinOutcome::Assigned(candidate);
            }
        }

        JoinOutcome::Exhausted
    }
}
