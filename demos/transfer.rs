use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing_subscriber::prelude::*;
use utxo_spend_engine::config::Config;
use utxo_spend_engine::sequencer::http::HttpSequencer;
use utxo_spend_engine::signer::SpendKeySigner;
use utxo_spend_engine::types::Hash;
use utxo_spend_engine::{Amount, EngineError, TransferEngine, TransferRequest};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,

    /// kernel asset id
    #[clap(long, value_parser)]
    asset: String,

    /// receiver member ids
    #[clap(long, value_parser, required = true)]
    receiver: Vec<String>,

    #[clap(long, value_parser, default_value = "1")]
    threshold: u8,

    /// decimal amount, e.g. 0.25
    #[clap(long, value_parser)]
    amount: String,

    #[clap(long, value_parser, default_value = "")]
    memo: String,

    /// only report whether an earlier transfer with this request id landed
    #[clap(long, value_parser)]
    check_request: Option<Uuid>,

    /// merge small outputs before transferring
    #[clap(long)]
    consolidate: bool,
}

#[tokio::main]
async fn main() {
    let result = _main().await;
    result.unwrap();
}

async fn _main() -> anyhow::Result<()> {
    // Start logging setup block
    let fmt_layer = tracing_subscriber::fmt::layer().with_test_writer();

    tracing_subscriber::registry().with(fmt_layer).init();

    let cli = Cli::parse();

    tracing::info!("Config file {:?}", cli.config_path);
    let config = Config::from_file(&cli.config_path)?;

    let sequencer =
        HttpSequencer::new(&config.sequencer).context("Failed to build sequencer client")?;
    let signer = SpendKeySigner::from_seed_hex(&config.spend_key)?;
    let engine = TransferEngine::new(sequencer, signer, config.user_id, config.limits);

    let asset = Hash::from_str(&cli.asset)?;
    if let Some(request_id) = cli.check_request {
        match engine.get_transaction(request_id).await? {
            Some(record) => println!("{}", serde_json::to_string(&record)?),
            None => println!("request {request_id} never landed; start a new transfer"),
        }
        return Ok(());
    }

    if cli.consolidate {
        match engine.consolidate(asset).await? {
            Some(sent) => tracing::info!("consolidated into {:?}", sent.records()),
            None => tracing::info!("nothing to consolidate"),
        }
    }

    let request = TransferRequest {
        asset,
        receivers: cli.receiver,
        threshold: cli.threshold,
        amount: Amount::from_str(&cli.amount)?,
        extra: cli.memo.into_bytes(),
        request_id: None,
    };

    let sent = match engine.transfer(&request).await {
        Ok(sent) => sent,
        Err(err @ EngineError::MaxCountNotEnoughUtxo { .. }) => {
            return Err(anyhow!("{err}; rerun with --consolidate"))
        }
        Err(err) if err.is_retryable() => {
            return Err(anyhow!("{err}; the transfer may be retried"))
        }
        Err(err) => return Err(err.into()),
    };

    for record in sent.records() {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
