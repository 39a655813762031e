//! Lookout CLI: competitor monitoring with AI summaries.
//!
//! Scrapes competitor pages and feeds, summarizes changes with an LLM, and
//! delivers reports to Slack, Notion, email or a webhook.

mod commands;
mod progress;
mod prompts;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli)?;
    commands::run(cli).await
}
