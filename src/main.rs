mod analysis;
mod auth;
mod chunking;
mod cli;
mod config;
mod embedding;
mod error;
mod insights;
mod pipeline;
mod providers;
mod report;
mod server;
mod service;
mod vector_store;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LOG_LEVEL", "info"))
        .init();

    let cli = Cli::parse();
    info!("Starting reportlens");
    cli.execute().await?;

    Ok(())
}
