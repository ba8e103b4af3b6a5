//! Event envelope
//!
//! The engine consumes decoded event records as attribute maps. The
//! pipeline assigns the `_source` tag before calling `update`; the
//! envelope otherwise carries `customer_id`, `timestamp` (epoch seconds)
//! and arbitrary typed attributes referenced by feature fields and rule
//! conditions.

use std::collections::HashMap;

use sentra_common::error::{Error, Result};

use crate::value::{attrs_from_json, Value};

/// Attribute key carrying the event stream tag
pub const SOURCE_KEY: &str = "_source";

/// Attribute key identifying the customer a profile belongs to
pub const CUSTOMER_ID_KEY: &str = "customer_id";

/// Attribute key carrying the event time in epoch seconds
pub const TIMESTAMP_KEY: &str = "timestamp";

/// A decoded event: a map of typed attributes
#[derive(Debug, Clone, Default)]
pub struct Event {
    attrs: HashMap<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attrs(attrs: HashMap<String, Value>) -> Self {
        Self { attrs }
    }

    /// Decode a JSON object payload into an event. Attributes with no
    /// `Value` representation (nulls, nested structures) are dropped.
    pub fn from_json_bytes(raw: &[u8]) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_slice(raw)?;
        let object = json
            .as_object()
            .ok_or_else(|| Error::InvalidEvent("payload is not a JSON object".to_string()))?;
        Ok(Self {
            attrs: attrs_from_json(object),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Builder-style insert for constructing events inline
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.attrs.get(CUSTOMER_ID_KEY).and_then(Value::as_str)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.attrs.get(TIMESTAMP_KEY).and_then(Value::as_i64)
    }

    pub fn source(&self) -> Option<&str> {
        self.attrs.get(SOURCE_KEY).and_then(Value::as_str)
    }

    /// Tag the event with its stream of origin; the pipeline does this
    /// before handing enrichment events to the feature store.
    pub fn set_source(&mut self, source: &str) {
        self.attrs.insert(SOURCE_KEY.to_string(), Value::from(source));
    }
}
