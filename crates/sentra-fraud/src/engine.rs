//! Fraud orchestrator
//!
//! Ties the feature store and rule engine together. Scoring order is a
//! contract: features are read *before* the transaction is folded in, so
//! every decision reflects prior events only.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use sentra_common::error::{Error, Result};
use sentra_common::metrics;

use crate::event::Event;
use crate::features::{FeatureConfig, FeatureStore};
use crate::rules::{Rule, RuleEngine};
use crate::value::Value;

/// Outcome of scoring one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Block,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "APPROVE",
            Decision::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored transaction: the decision, which rules fired, and the
/// feature snapshot the rules saw.
#[derive(Debug, Clone)]
pub struct Scoring {
    pub decision: Decision,
    pub fired: Vec<String>,
    pub features: HashMap<String, Value>,
}

/// The scoring engine: feature store plus rule book
pub struct FraudEngine {
    features: FeatureStore,
    rules: RuleEngine,
}

impl FraudEngine {
    pub fn new(configs: Vec<FeatureConfig>, rules: Vec<Rule>) -> Self {
        Self {
            features: FeatureStore::new(configs),
            rules: RuleEngine::new(rules),
        }
    }

    /// Score one transaction event.
    ///
    /// Reads the feature snapshot at the event's own timestamp, evaluates
    /// every rule against snapshot + raw event, decides (any fired rule
    /// blocks), and only then folds the transaction into the store for
    /// future scoring.
    pub fn process(&self, txn: &Event) -> Result<Scoring> {
        let customer_id = txn
            .customer_id()
            .ok_or_else(|| Error::InvalidEvent("transaction without customer_id".to_string()))?;
        let timestamp = txn
            .timestamp()
            .ok_or_else(|| Error::InvalidEvent("transaction without timestamp".to_string()))?;

        let features = self.features.read_features(customer_id, timestamp);
        let fired = self.rules.evaluate(txn, &features);
        let decision = if fired.is_empty() {
            Decision::Approve
        } else {
            Decision::Block
        };

        metrics::record_transaction_scored(decision.as_str());
        for rule in &fired {
            metrics::record_rule_fired(rule);
        }
        debug!(customer_id, %decision, rules = ?fired, "transaction scored");

        // untagged events count as the transaction source inside update
        self.features.update(txn);

        Ok(Scoring {
            decision,
            fired,
            features,
        })
    }

    /// Fold a non-transaction event (account opening, card issue) into
    /// the feature store. The caller tags `_source` first.
    pub fn update(&self, event: &Event) {
        self.features.update(event);
    }
}
