//! Sentra broker core
//!
//! A single-node log-structured message broker:
//! - durable per-partition append-only logs with crash recovery (`log`)
//! - topic and consumer-group registry with sticky assignment (`registry`)
//! - request routing for the framed binary protocol (`router`)
//! - the TCP accept loop and per-connection workers (`server`)

pub mod log;
pub mod registry;
pub mod router;
pub mod server;

pub use log::PartitionLog;
pub use registry::{JoinOutcome, Registry, Topic};
pub use server::BrokerServer;
