//! MegaBrain CLI — a thin shell over the search/indexing engine in `lib.rs`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use megabrain::cli::Commands;
use megabrain::config::MegabrainConfig;
use megabrain::connector::api::{Container, Router};

/// MegaBrain - hybrid lexical + semantic code search
#[derive(Parser)]
#[command(name = "megabrain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Root directory for the lexical index, vector store, state store, and
    /// config file. Defaults to `~/.megabrain`.
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| {
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            home.join(".megabrain")
        });

    let config = MegabrainConfig::load_from(&data_dir)?;
    let container = Container::new(config).await?;
    let router = Router::new(&container);

    let output = router.route(cli.command).await?;
    println!("{output}");

    Ok(())
}
