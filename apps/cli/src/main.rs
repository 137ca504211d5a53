//! docs-cloner CLI — clone a documentation site into Markdown.
//!
//! Reads the site's XML sitemap, fetches every listed page, extracts the main
//! content, and mirrors it as Markdown files under an output directory.

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
