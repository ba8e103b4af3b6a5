//! Configuration management for Sentra

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::TopicSeed;

/// Main configuration structure for Sentra
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Broker configuration
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Fraud pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Directory holding partition logs
    pub data_dir: String,
    /// Topics to create on startup
    #[serde(default)]
    pub topics: Vec<TopicSeed>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9092,
            data_dir: "./data".to_string(),
            topics: Vec::new(),
        }
    }
}

impl BrokerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Broker host to consume from
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Consumer group for the scoring consumers
    pub group: String,
    /// Topic carrying transactions
    pub transaction_topic: String,
    /// Topic carrying account-opening events
    pub account_topic: String,
    /// Topic carrying card-issue events
    pub card_topic: String,
    /// Number of scoring consumers (0 = one per partition, capped by cores)
    pub scoring_consumers: usize,
    /// Sleep between empty fetches, in milliseconds
    pub poll_interval_ms: u64,
    /// Records per fetch
    pub fetch_max_records: i32,
    /// Optional JSON file with feature definitions (built-in catalog if unset)
    pub features_path: Option<String>,
    /// Optional JSON file with rule definitions (built-in catalog if unset)
    pub rules_path: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9092,
            group: "fraud-engine".to_string(),
            transaction_topic: "transactions".to_string(),
            account_topic: "account-opening".to_string(),
            card_topic: "card-issue".to_string(),
            scoring_consumers: 4,
            poll_interval_ms: 200,
            fetch_max_records: 50,
            features_path: None,
            rules_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_round_trips_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sentra.toml");

        let config = Config::default();
        let serialized = toml::to_string(&config).expect("serialize");
        tokio::fs::write(&path, serialized).await.expect("write");

        let loaded = Config::load(&path).await.expect("load");
        assert_eq!(loaded.broker.port, 9092);
        assert_eq!(loaded.broker.host, "localhost");
        assert_eq!(loaded.pipeline.group, "fraud-engine");
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = Config::load("/definitely/not/here.toml").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
