//! Seeded traffic generators for demo deployments
//!
//! Three event streams matching the topics the broker seeds: a skewed
//! transaction stream (a handful of customers behave fraudulently), plus
//! low-rate account-opening and card-issue streams. Deterministic per
//! seed so demo runs are reproducible.

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use tracing::info;

use sentra_client::Producer;

const NUM_CUSTOMERS: usize = 100;
const NUM_FRAUDSTERS: usize = 5;
const NUM_BENEFICIARIES: usize = 200;
const TXN_TYPES: [&str; 4] = ["debit", "credit", "cashout", "transfer"];

fn customer(i: usize) -> String {
    format!("cust_{:04}", i)
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Sleep to approximate `rate` events per second, with jitter
fn pace(rng: &mut StdRng, rate: f64) {
    if rate <= 0.0 {
        return;
    }
    let jitter = rng.gen_range(0.5..1.5);
    std::thread::sleep(Duration::from_secs_f64(jitter / rate));
}

fn run_stream(
    count: Option<u64>,
    mut emit: impl FnMut(u64) -> Result<()>,
) -> Result<()> {
    let mut sent: u64 = 0;
    loop {
        if let Some(limit) = count {
            if sent >= limit {
                info!(sent, "generator finished");
                return Ok(());
            }
        }
        emit(sent)?;
        sent += 1;
    }
}

/// Transactions: most customers small and boring, fraudsters large and
/// cashout-heavy toward a wide beneficiary set.
pub fn transactions(host: &str, port: u16, rate: f64, count: Option<u64>, seed: u64) -> Result<()> {
    let producer = Producer::connect(host, port, "txn-producer")?;
    let mut rng = StdRng::seed_from_u64(seed);

    let fraudsters: HashSet<usize> = {
        let mut indices: Vec<usize> = (0..NUM_CUSTOMERS).collect();
        indices.shuffle(&mut rng);
        indices.into_iter().take(NUM_FRAUDSTERS).collect()
    };
    info!(
        fraudsters = ?fraudsters.iter().map(|&i| customer(i)).collect::<Vec<_>>(),
        rate,
        "producing transactions"
    );

    let fraud_type_weights = WeightedIndex::new([10, 30, 40, 20])?;
    let normal_type_weights = WeightedIndex::new([60, 15, 10, 15])?;

    run_stream(count, |sent| {
        let who = rng.gen_range(0..NUM_CUSTOMERS);
        let is_fraud = fraudsters.contains(&who);

        let (amount, beneficiary, txn_type) = if is_fraud {
            (
                rng.gen_range(5_000..40_000),
                rng.gen_range(0..NUM_BENEFICIARIES),
                TXN_TYPES[fraud_type_weights.sample(&mut rng)],
            )
        } else {
            (
                rng.gen_range(10..6_000),
                rng.gen_range(0..5),
                TXN_TYPES[normal_type_weights.sample(&mut rng)],
            )
        };

        let key = customer(who);
        let payload = serde_json::json!({
            "customer_id": key,
            "amount": amount,
            "beneficiary": format!("ben_{:04}", beneficiary),
            "txn_type": txn_type,
            "timestamp": now_secs(),
        });
        producer.send("transactions", &key, payload.to_string().as_bytes())?;

        if (sent + 1) % 50 == 0 {
            info!(sent = sent + 1, "transactions produced");
        }
        pace(&mut rng, rate);
        Ok(())
    })
}

/// Account openings at a slow trickle
pub fn account_openings(host: &str, port: u16, rate: f64, count: Option<u64>, seed: u64) -> Result<()> {
    let producer = Producer::connect(host, port, "account-producer")?;
    let mut rng = StdRng::seed_from_u64(seed);

    let account_types = WeightedIndex::new([50, 35, 15])?;
    let nationalities = ["SA", "SA", "SA", "AE", "EG", "JO", "PK", "IN"];
    info!(rate, "producing account openings");

    run_stream(count, |sent| {
        let key = customer(rng.gen_range(0..NUM_CUSTOMERS));
        let payload = serde_json::json!({
            "customer_id": key,
            "account_type": (["savings", "checking", "business"][account_types.sample(&mut rng)]),
            "initial_deposit": rng.gen_range(500..100_000),
            "account_age_days": rng.gen_range(0..1_500),
            "nationality": nationalities[rng.gen_range(0..nationalities.len())],
            "timestamp": now_secs(),
        });
        producer.send("account-opening", &key, payload.to_string().as_bytes())?;

        if (sent + 1) % 10 == 0 {
            info!(sent = sent + 1, "account events produced");
        }
        pace(&mut rng, rate);
        Ok(())
    })
}

/// Card issues at an even slower trickle
pub fn card_issues(host: &str, port: u16, rate: f64, count: Option<u64>, seed: u64) -> Result<()> {
    let producer = Producer::connect(host, port, "card-producer")?;
    let mut rng = StdRng::seed_from_u64(seed);

    let card_types = WeightedIndex::new([50, 35, 15])?;
    let card_tiers = WeightedIndex::new([60, 30, 10])?;
    let credit_limits = [5_000, 10_000, 25_000, 50_000, 100_000];
    info!(rate, "producing card issues");

    run_stream(count, |sent| {
        let key = customer(rng.gen_range(0..NUM_CUSTOMERS));
        let card_type = ["debit", "credit", "prepaid"][card_types.sample(&mut rng)];
        let is_credit = card_type == "credit";

        let payload = serde_json::json!({
            "customer_id": key,
            "card_type": card_type,
            "card_tier": (["standard", "gold", "platinum"][card_tiers.sample(&mut rng)]),
            "credit_limit": if is_credit { credit_limits[rng.gen_range(0..credit_limits.len())] } else { 0 },
            "has_credit_card": i32::from(is_credit),
            "timestamp": now_secs(),
        });
        producer.send("card-issue", &key, payload.to_string().as_bytes())?;

        if (sent + 1) % 10 == 0 {
            info!(sent = sent + 1, "card events produced");
        }
        pace(&mut rng, rate);
        Ok(())
    })
}
