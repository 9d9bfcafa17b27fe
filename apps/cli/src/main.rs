//! zoteroimport CLI: copy a Zotero library into a collection repository.
//!
//! Pages through a library's top-level items, maps their metadata to Dublin
//! Core and Zotero element sets, and stores them in a local libSQL database.

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
