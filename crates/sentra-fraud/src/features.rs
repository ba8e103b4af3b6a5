//! Schema-driven feature store
//!
//! Features are declared once at engine construction and computed
//! incrementally from event streams. Bucketed features (sum/count/unique)
//! aggregate into coarse time buckets of `bucket_size` seconds, bounding
//! memory per customer to `window / bucket_size` entries; buckets older
//! than the window are evicted lazily during reads. Latest features
//! overwrite on every matching event.

use std::collections::{BTreeMap, HashMap, HashSet};

use dashmap::DashMap;
use serde::Deserialize;

use sentra_common::error::{Error, Result};
use sentra_common::types::Timestamp;

use crate::event::Event;
use crate::value::Value;

/// Event stream a feature consumes when its config names none
pub const DEFAULT_SOURCE: &str = "transaction";

// ============================================================================
// Feature configuration
// ============================================================================

/// What a feature computes
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    /// Sum of `field` over the window
    Sum {
        field: String,
        window: i64,
        bucket_size: i64,
    },
    /// Count of matching events over the window
    Count { window: i64, bucket_size: i64 },
    /// Cardinality of distinct `field` values over the window
    Unique {
        field: String,
        window: i64,
        bucket_size: i64,
    },
    /// Most recently seen `field` value, any timestamp
    Latest { field: String },
}

/// A configured feature
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub name: String,
    /// Event stream tag this feature consumes
    pub source: String,
    /// Attribute values that must all match for an event to count
    pub filter: HashMap<String, Value>,
    /// Value reported when the customer has no state for this feature
    pub default: Option<Value>,
    pub kind: FeatureKind,
}

impl FeatureConfig {
    fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            source: DEFAULT_SOURCE.to_string(),
            filter: HashMap::new(),
            default: None,
            kind,
        }
    }

    pub fn sum(
        name: impl Into<String>,
        field: impl Into<String>,
        window: i64,
        bucket_size: i64,
    ) -> Self {
        Self::new(
            name,
            FeatureKind::Sum {
                field: field.into(),
                window,
                bucket_size,
            },
        )
    }

    pub fn count(name: impl Into<String>, window: i64, bucket_size: i64) -> Self {
        Self::new(name, FeatureKind::Count { window, bucket_size })
    }

    pub fn unique(
        name: impl Into<String>,
        field: impl Into<String>,
        window: i64,
        bucket_size: i64,
    ) -> Self {
        Self::new(
            name,
            FeatureKind::Unique {
                field: field.into(),
                window,
                bucket_size,
            },
        )
    }

    pub fn latest(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, FeatureKind::Latest { field: field.into() })
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Value reported when no state exists: the configured default, or 0
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Int(0))
    }

    fn filter_matches(&self, event: &Event) -> bool {
        self.filter
            .iter()
            .all(|(key, expected)| event.get(key) == Some(expected))
    }
}

/// Serde-facing feature declaration, converted into [`FeatureConfig`]
/// with required-field validation.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub window: Option<i64>,
    #[serde(default)]
    pub bucket_size: Option<i64>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub filter: HashMap<String, Value>,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

impl TryFrom<FeatureSpec> for FeatureConfig {
    type Error = Error;

    fn try_from(spec: FeatureSpec) -> Result<Self> {
        let require_field = |spec: &FeatureSpec| {
            spec.field.clone().ok_or_else(|| {
                Error::Config(format!("feature '{}' requires a field", spec.name))
            })
        };
        let require_window = |spec: &FeatureSpec| -> Result<(i64, i64)> {
            let window = spec.window.ok_or_else(|| {
                Error::Config(format!("feature '{}' requires a window", spec.name))
            })?;
            let bucket_size = spec.bucket_size.ok_or_else(|| {
                Error::Config(format!("feature '{}' requires a bucket_size", spec.name))
            })?;
            if window <= 0 || bucket_size <= 0 {
                return Err(Error::Config(format!(
                    "feature '{}' window and bucket_size must be positive",
                    spec.name
                )));
            }
            Ok((window, bucket_size))
        };

        let kind = match spec.kind.as_str() {
            "sum" => {
                let field = require_field(&spec)?;
                let (window, bucket_size) = require_window(&spec)?;
                FeatureKind::Sum {
                    field,
                    window,
                    bucket_size,
                }
            }
            "count" => {
                let (window, bucket_size) = require_window(&spec)?;
                FeatureKind::Count { window, bucket_size }
            }
            "unique" => {
                let field = require_field(&spec)?;
                let (window, bucket_size) = require_window(&spec)?;
                FeatureKind::Unique {
                    field,
                    window,
                    bucket_size,
                }
            }
            "latest" => FeatureKind::Latest {
                field: require_field(&spec)?,
            },
            other => {
                return Err(Error::Config(format!(
                    "feature '{}' has unknown type '{}'",
                    spec.name, other
                )))
            }
        };

        Ok(FeatureConfig {
            name: spec.name,
            source: spec.source,
            filter: spec.filter,
            default: spec.default,
            kind,
        })
    }
}

/// Parse a JSON array of feature declarations
pub fn features_from_json(raw: &str) -> Result<Vec<FeatureConfig>> {
    let specs: Vec<FeatureSpec> = serde_json::from_str(raw)?;
    specs.into_iter().map(FeatureConfig::try_from).collect()
}

// ============================================================================
// Feature state
// ============================================================================

/// Per-feature state inside a customer profile
enum FeatureState {
    Latest(Value),
    Buckets(BTreeMap<i64, Bucket>),
}

/// One time bucket's aggregate
enum Bucket {
    Sum(Value),
    Count(i64),
    Unique(HashSet<Value>),
}

type Profile = HashMap<String, FeatureState>;

/// Lower edge of the bucket `timestamp` falls into
fn bucket_key(timestamp: Timestamp, bucket_size: i64) -> i64 {
    timestamp.div_euclid(bucket_size) * bucket_size
}

/// Delete buckets strictly older than the cutoff
fn evict(buckets: &mut BTreeMap<i64, Bucket>, cutoff: i64) {
    buckets.retain(|&key, _| key >= cutoff);
}

// ============================================================================
// Feature store
// ============================================================================

/// Per-customer feature state, sharded by customer id.
///
/// The map's entry locks serialize updates and reads per customer, so a
/// reader always observes a consistent profile; different customers
/// proceed in parallel.
pub struct FeatureStore {
    configs: Vec<FeatureConfig>,
    profiles: DashMap<String, Profile>,
}

impl FeatureStore {
    pub fn new(configs: Vec<FeatureConfig>) -> Self {
        Self {
            configs,
            profiles: DashMap::new(),
        }
    }

    pub fn configs(&self) -> &[FeatureConfig] {
        &self.configs
    }

    /// Fold an event into every feature whose source tag and filter match.
    ///
    /// Missing attributes are a no-op for the features that need them;
    /// nothing here errors or panics.
    pub fn update(&self, event: &Event) {
        let Some(customer_id) = event.customer_id() else {
            return;
        };
        let source = event.source().unwrap_or(DEFAULT_SOURCE);

        let mut profile = self.profiles.entry(customer_id.to_string()).or_default();
        for config in &self.configs {
            if config.source != source || !config.filter_matches(event) {
                continue;
            }
            apply(config, event, &mut profile);
        }
    }

    /// Read every configured feature for a customer as of `current_time`.
    ///
    /// Expired buckets are removed as a side effect. A customer with no
    /// profile (or no state for a feature) reports that feature's default.
    pub fn read_features(
        &self,
        customer_id: &str,
        current_time: Timestamp,
    ) -> HashMap<String, Value> {
        let mut result = HashMap::with_capacity(self.configs.len());

        let Some(mut profile) = self.profiles.get_mut(customer_id) else {
            for config in &self.configs {
                result.insert(config.name.clone(), config.default_value());
            }
            return result;
        };

        for config in &self.configs {
            let value = match profile.get_mut(&config.name) {
                Some(state) => read_state(config, state, current_time),
                None => config.default_value(),
            };
            result.insert(config.name.clone(), value);
        }
        result
    }
}

fn apply(config: &FeatureConfig, event: &Event, profile: &mut Profile) {
    match &config.kind {
        FeatureKind::Latest { field } => {
            if let Some(value) = event.get(field) {
                profile.insert(config.name.clone(), FeatureState::Latest(value.clone()));
            }
        }
        FeatureKind::Sum { field, bucket_size, .. } => {
            let (Some(timestamp), Some(value)) = (event.timestamp(), event.get(field)) else {
                return;
            };
            let Some(buckets) = bucket_map(profile, &config.name) else {
                return;
            };
            let slot = buckets
                .entry(bucket_key(timestamp, *bucket_size))
                .or_insert(Bucket::Sum(Value::Int(0)));
            if let Bucket::Sum(total) = slot {
                if let Some(sum) = total.add(value) {
                    *total = sum;
                }
            }
        }
        FeatureKind::Count { bucket_size, .. } => {
            let Some(timestamp) = event.timestamp() else {
                return;
            };
            let Some(buckets) = bucket_map(profile, &config.name) else {
                return;
            };
            let slot = buckets
                .entry(bucket_key(timestamp, *bucket_size))
                .or_insert(Bucket::Count(0));
            if let Bucket::Count(count) = slot {
                *count += 1;
            }
        }
        FeatureKind::Unique { field, bucket_size, .. } => {
            let (Some(timestamp), Some(value)) = (event.timestamp(), event.get(field)) else {
                return;
            };
            let Some(buckets) = bucket_map(profile, &config.name) else {
                return;
            };
            let slot = buckets
                .entry(bucket_key(timestamp, *bucket_size))
                .or_insert_with(|| Bucket::Unique(HashSet::new()));
            if let Bucket::Unique(set) = slot {
                set.insert(value.clone());
            }
        }
    }
}

/// Bucket map for `name`, creating (or resetting a mismatched state to)
/// an empty one.
fn bucket_map<'a>(profile: &'a mut Profile, name: &str) -> Option<&'a mut BTreeMap<i64, Bucket>> {
    let reset = !matches!(profile.get(name), Some(FeatureState::Buckets(_)));
    if reset {
        profile.insert(name.to_string(), FeatureState::Buckets(BTreeMap::new()));
    }
    match profile.get_mut(name) {
        Some(FeatureState::Buckets(buckets)) => Some(buckets),
        _ => None,
    }
}

fn read_state(config: &FeatureConfig, state: &mut FeatureState, current_time: Timestamp) -> Value {
    match (&config.kind, state) {
        (FeatureKind::Latest { .. }, FeatureState::Latest(value)) => value.clone(),
        (FeatureKind::Sum { window, .. }, FeatureState::Buckets(buckets)) => {
            evict(buckets, current_time - window);
            buckets.values().fold(Value::Int(0), |acc, bucket| match bucket {
                Bucket::Sum(value) => acc.add(value).unwrap_or(acc),
                _ => acc,
            })
        }
        (FeatureKind::Count { window, .. }, FeatureState::Buckets(buckets)) => {
            evict(buckets, current_time - window);
            Value::Int(
                buckets
                    .values()
                    .map(|bucket| match bucket {
                        Bucket::Count(count) => *count,
                        _ => 0,
                    })
                    .sum(),
            )
        }
        (FeatureKind::Unique { window, .. }, FeatureState::Buckets(buckets)) => {
            evict(buckets, current_time - window);
            let mut union: HashSet<&Value> = HashSet::new();
            for bucket in buckets.values() {
                if let Bucket::Unique(set) = bucket {
                    union.extend(set.iter());
                }
            }
            Value::Int(union.len() as i64)
        }
        // declared kind and stored state disagree: report the default
        _ => config.default_value(),
    }
}
