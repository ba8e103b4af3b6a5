//! Built-in feature catalog and rule book
//!
//! The production set the pipeline runs with when no external JSON
//! definitions are supplied: transaction velocity and volume features
//! over 1h/24h windows, account and card enrichment attributes, and the
//! seven deployed rules.

use crate::features::FeatureConfig;
use crate::rules::{CompareOp, Condition, ConditionSource, Rule};
use crate::value::Value;

const HOUR: i64 = 3600;
const DAY: i64 = 86_400;

/// Default feature definitions
pub fn default_features() -> Vec<FeatureConfig> {
    vec![
        // Transaction features
        FeatureConfig::sum("sum_txn_1h", "amount", HOUR, 600),
        FeatureConfig::count("count_txn_1h", HOUR, 600),
        FeatureConfig::sum("sum_txn_24h", "amount", DAY, HOUR),
        FeatureConfig::count("count_txn_24h", DAY, HOUR),
        FeatureConfig::unique("unique_ben_24h", "beneficiary", DAY, HOUR),
        FeatureConfig::count("count_credit_24h", DAY, HOUR).with_filter("txn_type", "credit"),
        FeatureConfig::count("count_cashout_1h", HOUR, 600).with_filter("txn_type", "cashout"),
        // Account features
        FeatureConfig::latest("account_age_days", "account_age_days")
            .with_source("account-opening")
            .with_default(9999),
        FeatureConfig::latest("account_type", "account_type")
            .with_source("account-opening")
            .with_default("unknown"),
        FeatureConfig::latest("nationality", "nationality")
            .with_source("account-opening")
            .with_default("unknown"),
        // Card features
        FeatureConfig::latest("has_credit_card", "has_credit_card")
            .with_source("card-issue")
            .with_default(0),
        FeatureConfig::latest("card_type", "card_type")
            .with_source("card-issue")
            .with_default("none"),
        FeatureConfig::latest("credit_limit", "credit_limit")
            .with_source("card-issue")
            .with_default(0),
    ]
}

fn features(field: &str, op: CompareOp, value: impl Into<Value>) -> Condition {
    Condition {
        source: ConditionSource::Features,
        field: field.to_string(),
        op,
        value: value.into(),
    }
}

fn transaction(field: &str, op: CompareOp, value: impl Into<Value>) -> Condition {
    Condition {
        source: ConditionSource::Transaction,
        field: field.to_string(),
        op,
        value: value.into(),
    }
}

/// Default rule book
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "high_velocity_high_amount",
            vec![
                features("count_txn_1h", CompareOp::Ge, 3),
                features("sum_txn_1h", CompareOp::Gt, 20_000),
            ],
        ),
        Rule::new(
            "suspicious_first_credit",
            vec![
                features("count_credit_24h", CompareOp::Eq, 0),
                transaction("txn_type", CompareOp::Eq, "credit"),
                transaction("amount", CompareOp::Gt, 10_000),
            ],
        ),
        Rule::new(
            "many_beneficiaries",
            vec![features("unique_ben_24h", CompareOp::Ge, 5)],
        ),
        Rule::new(
            "rapid_cashout",
            vec![
                features("count_cashout_1h", CompareOp::Ge, 2),
                transaction("txn_type", CompareOp::Eq, "cashout"),
                transaction("amount", CompareOp::Gt, 5_000),
            ],
        ),
        Rule::new(
            "single_large_txn",
            vec![transaction("amount", CompareOp::Gt, 30_000)],
        ),
        Rule::new(
            "new_account_large_txn",
            vec![
                features("account_age_days", CompareOp::Lt, 30),
                transaction("amount", CompareOp::Gt, 10_000),
            ],
        ),
        Rule::new(
            "no_card_large_cashout",
            vec![
                features("has_credit_card", CompareOp::Eq, 0),
                transaction("txn_type", CompareOp::Eq, "cashout"),
                transaction("amount", CompareOp::Gt, 8_000),
            ],
        ),
    ]
}
