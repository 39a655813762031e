//! MRI scanner: classify brain MRI images from the terminal or a small web UI.
//!
//! For education only. Results are never a medical diagnosis.

mod commands;
mod web;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
