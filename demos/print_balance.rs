use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::prelude::*;
use utxo_spend_engine::config::Config;
use utxo_spend_engine::sequencer::http::HttpSequencer;
use utxo_spend_engine::signer::SpendKeySigner;
use utxo_spend_engine::types::Hash;
use utxo_spend_engine::TransferEngine;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,

    /// kernel asset id; all assets when omitted
    #[clap(long, value_parser)]
    asset: Option<String>,
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

    let Cli { config_path, asset } = Cli::parse();

    tracing::info!("Config file {:?}", config_path);
    let config = Config::from_file(&config_path)?;

    let sequencer =
        HttpSequencer::new(&config.sequencer).context("Failed to build sequencer client")?;
    let signer = SpendKeySigner::from_seed_hex(&config.spend_key)?;
    let engine = TransferEngine::new(sequencer, signer, config.user_id, config.limits);

    match asset {
        Some(asset) => {
            let asset = Hash::from_str(&asset)?;
            let balance = engine.balance(asset).await?;
            println!("{asset}: {balance}");
        }
        None => {
            for (asset, balance) in engine.balances().await? {
                println!("{asset}: {balance}");
            }
        }
    }

    Ok(())
}
