mod catalog;
mod cli;
mod config;
mod counters;
mod error;
mod ingest;
mod insights;
mod mining;
mod output;
mod runs;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting SeqLens - CI Failure Sequence Analysis");
    cli.execute().await?;

    Ok(())
}
