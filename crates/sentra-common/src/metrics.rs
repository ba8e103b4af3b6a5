//! Metrics and observability for Sentra
#![allow(clippy::must_use_candidate)]

use metrics::counter;

// ============================================================================
// Broker Metrics
// ============================================================================

/// Record a produced record and its payload size
pub fn record_produced(topic: &str, bytes: u64) {
    counter!("sentra_broker_records_produced_total", "topic" => topic.to_string()).increment(1);
    counter!("sentra_broker_bytes_produced_total", "topic" => topic.to_string()).increment(bytes);
}

/// Record records handed out by a fetch
pub fn record_fetched(topic: &str, count: u64) {
    counter!("sentra_broker_records_fetched_total", "topic" => topic.to_string()).increment(count);
}

/// Record a protocol-level error response
pub fn record_error_response(code: i16) {
    counter!("sentra_broker_error_responses_total", "code" => code.to_string()).increment(1);
}

// ============================================================================
// Fraud Metrics
// ============================================================================

/// Record a scored transaction and its decision
pub fn record_transaction_scored(decision: &str) {
    counter!("sentra_fraud_transactions_scored_total", "decision" => decision.to_string())
        .increment(1);
}

/// Record a rule firing
pub fn record_rule_fired(rule: &str) {
    counter!("sentra_fraud_rules_fired_total", "rule" => rule.to_string()).increment(1);
}

/// Record an enrichment event applied to the feature store
pub fn record_enrichment(source: &str) {
    counter!("sentra_fraud_enrichment_events_total", "source" => source.to_string()).increment(1);
}
