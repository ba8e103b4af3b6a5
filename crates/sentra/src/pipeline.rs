//! Fraud pipeline
//!
//! Consumes the enrichment streams (account openings, card issues) and the
//! transaction stream from the broker, sharing one fraud engine. Each
//! consumer runs on its own thread with a synchronous client; scoring
//! workers report into a stats channel drained by the main thread, which
//! logs a summary every few seconds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{error, info, warn};

use sentra_client::Consumer;
use sentra_common::config::PipelineConfig;
use sentra_common::metrics;
use sentra_fraud::{catalog, features, rules, Decision, Event, FraudEngine};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

enum StatsEvent {
    Enriched {
        source: &'static str,
    },
    Scored {
        consumer: String,
        decision: Decision,
        fired: Vec<String>,
    },
}

/// Run the pipeline until the broker connection is lost on every worker
pub fn run(config: &PipelineConfig) -> Result<()> {
    let engine = Arc::new(build_engine(config)?);
    let (stats_tx, stats_rx) = unbounded::<StatsEvent>();

    let mut workers = Vec::new();

    workers.push(spawn_enrichment(
        config.clone(),
        config.account_topic.clone(),
        "account-enrichment",
        "account-opening",
        engine.clone(),
        stats_tx.clone(),
    ));
    workers.push(spawn_enrichment(
        config.clone(),
        config.card_topic.clone(),
        "card-enrichment",
        "card-issue",
        engine.clone(),
        stats_tx.clone(),
    ));

    let scoring = if config.scoring_consumers == 0 {
        num_cpus::get().min(4)
    } else {
        config.scoring_consumers
    };
    for i in 0..scoring {
        workers.push(spawn_scoring(
            config.clone(),
            format!("fraud-consumer-{}", i),
            engine.clone(),
            stats_tx.clone(),
        ));
    }
    drop(stats_tx);

    info!(workers = workers.len(), "pipeline started");
    aggregate_stats(&stats_rx);

    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}

fn build_engine(config: &PipelineConfig) -> Result<FraudEngine> {
    let feature_configs = match &config.features_path {
        Some(path) => features::features_from_json(&std::fs::read_to_string(path)?)?,
        None => catalog::default_features(),
    };
    let rule_book = match &config.rules_path {
        Some(path) => rules::rules_from_json(&std::fs::read_to_string(path)?)?,
        None => catalog::default_rules(),
    };
    info!(
        features = feature_configs.len(),
        rules = rule_book.len(),
        "fraud engine configured"
    );
    Ok(FraudEngine::new(feature_configs, rule_book))
}

/// Consume one enrichment topic, tagging events with their stream of
/// origin before handing them to the feature store.
fn spawn_enrichment(
    config: PipelineConfig,
    topic: String,
    group: &'static str,
    source: &'static str,
    engine: Arc<FraudEngine>,
    stats: Sender<StatsEvent>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let consumer = match join(&config, group, group, &topic) {
            Some(consumer) => consumer,
            None => return,
        };

        let interval = Duration::from_millis(config.poll_interval_ms);
        loop {
            let records = match consumer.fetch(&topic, config.fetch_max_records) {
                Ok(records) => records,
                Err(e) => {
                    warn!(topic = %topic, "enrichment consumer lost connection: {}", e);
                    return;
                }
            };

            for record in &records {
                let mut event = match Event::from_json_bytes(&record.value) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(topic = %topic, offset = record.offset, "undecodable event: {}", e);
                        continue;
                    }
                };
                event.set_source(source);
                engine.update(&event);
                metrics::record_enrichment(source);
                let _ = stats.send(StatsEvent::Enriched { source });
            }

            if records.is_empty() {
                std::thread::sleep(interval);
            }
        }
    })
}

/// Consume the transaction topic and score every record
fn spawn_scoring(
    config: PipelineConfig,
    consumer_id: String,
    engine: Arc<FraudEngine>,
    stats: Sender<StatsEvent>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let topic = config.transaction_topic.clone();
        let consumer = match join(&config, &consumer_id, &config.group, &topic) {
            Some(consumer) => consumer,
            None => return,
        };

        let interval = Duration::from_millis(config.poll_interval_ms);
        loop {
            let records = match consumer.fetch(&topic, config.fetch_max_records) {
                Ok(records) => records,
                Err(e) => {
                    warn!(consumer = %consumer_id, "lost connection: {}", e);
                    return;
                }
            };

            for record in &records {
                let txn = match Event::from_json_bytes(&record.value) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(offset = record.offset, "undecodable transaction: {}", e);
                        continue;
                    }
                };
                match engine.process(&txn) {
                    Ok(scoring) => {
                        let _ = stats.send(StatsEvent::Scored {
                            consumer: consumer_id.clone(),
                            decision: scoring.decision,
                            fired: scoring.fired,
                        });
                    }
                    Err(e) => {
                        warn!(offset = record.offset, "unscoreable transaction: {}", e);
                    }
                }
            }

            if records.is_empty() {
                std::thread::sleep(interval);
            }
        }
    })
}

fn join(config: &PipelineConfig, client_id: &str, group: &str, topic: &str) -> Option<Consumer> {
    let consumer = match Consumer::connect(&config.host, config.port, client_id) {
        Ok(consumer) => consumer,
        Err(e) => {
            error!(client_id, "failed to connect to broker: {}", e);
            return None;
        }
    };
    match consumer.join_group(group, topic) {
        Ok(partition) => {
            info!(client_id, topic, partition, "consumer assigned");
            Some(consumer)
        }
        Err(e) => {
            error!(client_id, topic, "failed to join group: {}", e);
            None
        }
    }
}

#[derive(Default)]
struct ConsumerStats {
    processed: u64,
    blocked: u64,
    approved: u64,
}

/// Drain stats events, logging a rollup every [`STATS_INTERVAL`].
/// Returns when every worker has hung up.
fn aggregate_stats(stats_rx: &Receiver<StatsEvent>) {
    let ticker = crossbeam::channel::tick(STATS_INTERVAL);
    let mut per_consumer: HashMap<String, ConsumerStats> = HashMap::new();
    let mut rules_fired: HashMap<String, u64> = HashMap::new();
    let mut enriched: HashMap<&'static str, u64> = HashMap::new();

    loop {
        crossbeam::select! {
            recv(stats_rx) -> event => match event {
                Ok(StatsEvent::Enriched { source }) => {
                    *enriched.entry(source).or_default() += 1;
                }
                Ok(StatsEvent::Scored { consumer, decision, fired }) => {
                    let entry = per_consumer.entry(consumer).or_default();
                    entry.processed += 1;
                    match decision {
                        Decision::Block => entry.blocked += 1,
                        Decision::Approve => entry.approved += 1,
                    }
                    for rule in fired {
                        *rules_fired.entry(rule).or_default() += 1;
                    }
                }
                Err(_) => return,
            },
            recv(ticker) -> _ => {
                log_rollup(&per_consumer, &rules_fired, &enriched);
            }
        }
    }
}

fn log_rollup(
    per_consumer: &HashMap<String, ConsumerStats>,
    rules_fired: &HashMap<String, u64>,
    enriched: &HashMap<&'static str, u64>,
) {
    let processed: u64 = per_consumer.values().map(|s| s.processed).sum();
    let blocked: u64 = per_consumer.values().map(|s| s.blocked).sum();
    let approved: u64 = per_consumer.values().map(|s| s.approved).sum();
    let block_pct = if processed > 0 {
        blocked as f64 / processed as f64 * 100.0
    } else {
        0.0
    };

    info!(
        processed,
        blocked,
        approved,
        block_pct,
        accounts = enriched.get("account-opening").copied().unwrap_or(0),
        cards = enriched.get("card-issue").copied().unwrap_or(0),
        "pipeline rollup"
    );

    let mut by_count: Vec<(&String, &u64)> = rules_fired.iter().collect();
    by_count.sort_by(|a, b| b.1.cmp(a.1));
    for (rule, count) in by_count {
        info!(rule = %rule, count, "rule fired");
    }
}
