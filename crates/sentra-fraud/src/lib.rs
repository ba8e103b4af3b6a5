//! Sentra fraud engine
//!
//! A schema-driven feature store plus a predicate rule engine, scoring
//! transaction events in near-real-time:
//! - `value`: the tagged attribute value union events and features share
//! - `event`: the decoded attribute-map envelope consumed from the broker
//! - `features`: per-customer time-bucketed aggregates and latest values
//! - `rules`: boolean conjunctions over feature and event fields
//! - `engine`: the read → evaluate → decide → update orchestrator
//! - `catalog`: the built-in production feature/rule set

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod engine;
pub mod event;
pub mod features;
pub mod rules;
pub mod value;

pub use engine::{Decision, FraudEngine, Scoring};
pub use event::Event;
pub use features::{FeatureConfig, FeatureKind, FeatureStore};
pub use rules::{CompareOp, Condition, ConditionSource, Rule, RuleEngine};
pub use value::Value;
