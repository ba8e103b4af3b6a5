//! Predicate rule engine
//!
//! A rule is an ordered conjunction of typed comparisons across two
//! scopes: the feature snapshot and the raw event. Conditions evaluate
//! with short-circuiting; every rule is evaluated independently and all
//! firing rule names are returned in declared order.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Deserialize;

use sentra_common::error::Result;

use crate::event::Event;
use crate::value::Value;

/// Where a condition reads its left-hand operand from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ConditionSource {
    #[serde(rename = "features")]
    Features,
    #[serde(rename = "transaction")]
    Transaction,
}

/// Comparison operator; a closed set, so an unknown operator is a config
/// parse error rather than a silent false at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    /// Apply the operator. A failed comparison (mismatched value tags)
    /// makes the condition false for every operator, `!=` included.
    pub fn apply(self, actual: &Value, expected: &Value) -> bool {
        let Some(ordering) = actual.compare(expected) else {
            return false;
        };
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// One comparison inside a rule
#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub source: ConditionSource,
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

/// A named conjunction of conditions
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub name: String,
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn new(name: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self {
            name: name.into(),
            conditions,
        }
    }
}

/// Parse a JSON array of rules, keeping declared order
pub fn rules_from_json(raw: &str) -> Result<Vec<Rule>> {
    Ok(serde_json::from_str(raw)?)
}

/// Evaluates rules against a feature snapshot and a raw event
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Names of all rules whose conditions all hold, in declared order.
    ///
    /// A feature absent from the snapshot reads as integer 0; an event
    /// attribute absent from the transaction makes its condition false.
    pub fn evaluate(&self, event: &Event, features: &HashMap<String, Value>) -> Vec<String> {
        let mut fired = Vec::new();

        for rule in &self.rules {
            let all_true = rule.conditions.iter().all(|condition| {
                let actual = match condition.source {
                    ConditionSource::Features => Some(
                        features
                            .get(&condition.field)
                            .cloned()
                            .unwrap_or(Value::Int(0)),
                    ),
                    ConditionSource::Transaction => event.get(&condition.field).cloned(),
                };
                match actual {
                    Some(actual) => condition.op.apply(&actual, &condition.value),
                    None => false,
                }
            });

            if all_true {
                fired.push(rule.name.clone());
            }
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(source: ConditionSource, field: &str, op: CompareOp, value: impl Into<Value>) -> Condition {
        Condition {
            source,
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    fn features(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn operators_follow_natural_ordering() {
        let five = Value::Int(5);
        assert!(CompareOp::Eq.apply(&five, &Value::Int(5)));
        assert!(CompareOp::Ne.apply(&five, &Value::Int(6)));
        assert!(CompareOp::Lt.apply(&five, &Value::Int(6)));
        assert!(CompareOp::Le.apply(&five, &Value::Int(5)));
        assert!(CompareOp::Gt.apply(&five, &Value::Int(4)));
        assert!(CompareOp::Ge.apply(&five, &Value::Float(5.0)));
    }

    #[test]
    fn mismatched_types_never_fire() {
        let s = Value::Str("5".into());
        for op in [
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Lt,
            CompareOp::Le,
            CompareOp::Gt,
            CompareOp::Ge,
        ] {
            assert!(!op.apply(&s, &Value::Int(5)), "{:?} fired across tags", op);
        }
    }

    #[test]
    fn conjunction_requires_every_condition() {
        let engine = RuleEngine::new(vec![Rule::new(
            "high_velocity",
            vec![
                condition(ConditionSource::Features, "count_txn_1h", CompareOp::Ge, 3),
                condition(ConditionSource::Transaction, "amount", CompareOp::Gt, 10_000),
            ],
        )]);

        let txn = Event::new().with("amount", 20_000);
        let snapshot = features(&[("count_txn_1h", Value::Int(3))]);
        assert_eq!(engine.evaluate(&txn, &snapshot), vec!["high_velocity"]);

        let low = features(&[("count_txn_1h", Value::Int(2))]);
        assert!(engine.evaluate(&txn, &low).is_empty());

        let small = Event::new().with("amount", 500);
        assert!(engine.evaluate(&small, &snapshot).is_empty());
    }

    #[test]
    fn missing_feature_reads_as_zero() {
        let engine = RuleEngine::new(vec![Rule::new(
            "no_credit_history",
            vec![condition(
                ConditionSource::Features,
                "count_credit_24h",
                CompareOp::Eq,
                0,
            )],
        )]);

        assert_eq!(
            engine.evaluate(&Event::new(), &HashMap::new()),
            vec!["no_credit_history"]
        );
    }

    #[test]
    fn missing_event_attribute_blocks_the_condition() {
        let engine = RuleEngine::new(vec![Rule::new(
            "large",
            vec![condition(ConditionSource::Transaction, "amount", CompareOp::Gt, 100)],
        )]);

        assert!(engine.evaluate(&Event::new(), &HashMap::new()).is_empty());
    }

    #[test]
    fn fired_rules_come_back_in_declared_order() {
        let engine = RuleEngine::new(vec![
            Rule::new(
                "b_rule",
                vec![condition(ConditionSource::Transaction, "amount", CompareOp::Gt, 10)],
            ),
            Rule::new(
                "a_rule",
                vec![condition(ConditionSource::Transaction, "amount", CompareOp::Gt, 20)],
            ),
        ]);

        let txn = Event::new().with("amount", 50);
        assert_eq!(engine.evaluate(&txn, &HashMap::new()), vec!["b_rule", "a_rule"]);
    }

    #[test]
    fn rules_parse_from_json() {
        let rules = rules_from_json(
            r#"[
                {"name": "single_large_txn", "conditions": [
                    {"field": "amount", "source": "transaction", "op": ">", "value": 30000}
                ]},
                {"name": "suspicious_first_credit", "conditions": [
                    {"field": "count_credit_24h", "source": "features", "op": "==", "value": 0},
                    {"field": "txn_type", "source": "transaction", "op": "==", "value": "credit"}
                ]}
            ]"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "single_large_txn");
        assert_eq!(rules[1].conditions[1].op, CompareOp::Eq);
        assert_eq!(rules[1].conditions[1].value, Value::Str("credit".into()));

        assert!(rules_from_json(r#"[{"name": "bad", "conditions": [{"field": "x", "source": "transaction", "op": "~", "value": 1}]}]"#).is_err());
    }
}
