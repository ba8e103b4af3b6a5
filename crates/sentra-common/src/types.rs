//! Common type definitions for Sentra

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Timestamp in seconds since Unix epoch
pub type Timestamp = i64;

/// Offset type for log positions
pub type Offset = i64;

/// Partition identifier
pub type PartitionId = i32;

// ============================================================================
// Record Types
// ============================================================================

/// A record stored in a topic partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Offset in the partition, assigned at append
    pub offset: Offset,
    /// Key used for partition routing
    pub key: String,
    /// Opaque payload
    pub value: Bytes,
}

impl Record {
    pub fn new(offset: Offset, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            offset,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Metadata about a produced record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Topic name
    pub topic: String,
    /// Partition the key routed to
    pub partition: PartitionId,
    /// Offset in the partition
    pub offset: Offset,
}

// ============================================================================
// Topic Types
// ============================================================================

/// A topic to create when the broker starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSeed {
    /// Topic name
    pub name: String,
    /// Number of partitions, fixed at creation
    pub partitions: i32,
}
