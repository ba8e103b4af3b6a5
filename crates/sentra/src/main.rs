//! Sentra - log-structured message broker + streaming fraud engine
//!
//! Single binary providing:
//! - the broker server
//! - the fraud scoring pipeline (enrichment + scoring consumers)
//! - seeded traffic generators for demo deployments

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use sentra_broker::BrokerServer;
use sentra_common::config::{BrokerConfig, Config, PipelineConfig};
use sentra_common::types::TopicSeed;

mod generate;
mod pipeline;

#[derive(Parser)]
#[command(name = "sentra")]
#[command(author, version, about = "Sentra - streaming fraud detection platform", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the broker server
    Broker {
        /// Configuration file path (TOML); flags below apply when unset
        #[arg(short, long)]
        config: Option<String>,

        #[arg(long, default_value = "localhost", env = "SENTRA_HOST")]
        host: String,

        #[arg(long, default_value_t = 9092, env = "SENTRA_PORT")]
        port: u16,

        #[arg(long, default_value = "./data", env = "SENTRA_DATA_DIR")]
        data_dir: String,
    },

    /// Run the fraud pipeline: enrichment consumers + scoring consumers
    Pipeline {
        /// Configuration file path (TOML)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Produce a seeded stream of transaction events
    ProduceTransactions {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 9092)]
        port: u16,
        /// Target events per second
        #[arg(long, default_value_t = 10.0)]
        rate: f64,
        /// Stop after this many events (unbounded if unset)
        #[arg(long)]
        count: Option<u64>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Produce a seeded stream of account-opening events
    ProduceAccounts {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 9092)]
        port: u16,
        #[arg(long, default_value_t = 1.0)]
        rate: f64,
        #[arg(long)]
        count: Option<u64>,
        #[arg(long, default_value_t = 77)]
        seed: u64,
    },

    /// Produce a seeded stream of card-issue events
    ProduceCards {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 9092)]
        port: u16,
        #[arg(long, default_value_t = 0.5)]
        rate: f64,
        #[arg(long)]
        count: Option<u64>,
        #[arg(long, default_value_t = 55)]
        seed: u64,
    },
}

/// The demo deployment's topic layout
fn demo_topics() -> Vec<TopicSeed> {
    vec![
        TopicSeed {
            name: "transactions".to_string(),
            partitions: 4,
        },
        TopicSeed {
            name: "account-opening".to_string(),
            partitions: 2,
        },
        TopicSeed {
            name: "card-issue".to_string(),
            partitions: 2,
        },
    ]
}

async fn broker_config(
    config: Option<String>,
    host: String,
    port: u16,
    data_dir: String,
) -> Result<BrokerConfig> {
    if let Some(path) = config {
        return Ok(Config::load(&path).await?.broker);
    }
    Ok(BrokerConfig {
        host,
        port,
        data_dir,
        topics: demo_topics(),
    })
}

async fn pipeline_config(config: Option<String>) -> Result<PipelineConfig> {
    if let Some(path) = config {
        return Ok(Config::load(&path).await?.pipeline);
    }
    Ok(PipelineConfig::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("sentra=info".parse()?),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Broker {
            config,
            host,
            port,
            data_dir,
        } => {
            let config = broker_config(config, host, port, data_dir).await?;
            let server = BrokerServer::bind(&config).await?;

            let shutdown = async {
                tokio::signal::ctrl_c().await.ok();
                info!("shutdown signal received");
            };

            tokio::select! {
                result = server.serve() => result?,
                () = shutdown => {}
            }
        }

        Commands::Pipeline { config } => {
            let config = pipeline_config(config).await?;
            run_until_ctrl_c(move || pipeline::run(&config)).await?;
        }

        Commands::ProduceTransactions {
            host,
            port,
            rate,
            count,
            seed,
        } => {
            run_until_ctrl_c(move || generate::transactions(&host, port, rate, count, seed)).await?;
        }

        Commands::ProduceAccounts {
            host,
            port,
            rate,
            count,
            seed,
        } => {
            run_until_ctrl_c(move || generate::account_openings(&host, port, rate, count, seed))
                .await?;
        }

        Commands::ProduceCards {
            host,
            port,
            rate,
            count,
            seed,
        } => {
            run_until_ctrl_c(move || generate::card_issues(&host, port, rate, count, seed)).await?;
        }
    }

    Ok(())
}

/// Drive a blocking worker, returning early on ctrl-c
async fn run_until_ctrl_c(worker: impl FnOnce() -> Result<()> + Send + 'static) -> Result<()> {
    let handle = tokio::task::spawn_blocking(worker);

    tokio::select! {
        result = handle => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    }
}
