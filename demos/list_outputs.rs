use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::prelude::*;
use utxo_spend_engine::config::Config;
use utxo_spend_engine::outputs::OutputPager;
use utxo_spend_engine::sequencer::http::HttpSequencer;
use utxo_spend_engine::sequencer::OutputQuery;
use utxo_spend_engine::types::{Hash, OutputState};

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,

    /// file to write outputs to, one json object per line
    #[clap(long, value_parser)]
    output_path: PathBuf,

    /// kernel asset id filter
    #[clap(long, value_parser)]
    asset: Option<String>,

    /// extra members of a multisig receiver set
    #[clap(long, value_parser)]
    member: Vec<String>,

    #[clap(long, value_parser, default_value = "1")]
    threshold: u8,
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

    let Cli {
        config_path,
        output_path,
        asset,
        member,
        threshold,
    } = Cli::parse();

    tracing::info!("Config file {:?}", config_path);
    let config = Config::from_file(&config_path)?;
    let sequencer =
        HttpSequencer::new(&config.sequencer).context("Failed to build sequencer client")?;

    let mut members = vec![config.user_id.clone()];
    members.extend(member);
    let mut query = OutputQuery::new(members, threshold, config.limits.balance_page_size)
        .with_state(OutputState::Unspent);
    if let Some(asset) = asset {
        query = query.with_asset(Hash::from_str(&asset)?);
    }

    let mut output = File::create(&output_path)
        .with_context(|| format!("Cannot create {path}", path = output_path.display()))?;
    let mut pager = OutputPager::new(query);
    let mut total = 0;
    while let Some(page) = pager.next_page(&sequencer).await? {
        total += page.len();
        for utxo in page.iter() {
            output.write_all(format!("{}\n", serde_json::to_string(utxo)?).as_bytes())?;
        }
        tracing::info!("fetched {} outputs, next offset {}", total, pager.offset());
    }

    tracing::info!("Total outputs: {:?}", total);
    Ok(())
}
