//! arxivflat CLI: flatten an arXiv submission's LaTeX source into one file.
//!
//! Fetches the source bundle, picks the root document, and inlines every
//! `\input` / `\include` so the result can be pasted as a single blob.

mod commands;

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
