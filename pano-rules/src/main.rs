use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod flatten_cmd;
mod path_guard;
mod resolve_cmd;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v, e.g. RUST_LOG=pano_rules::resolve=debug
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("pano_rules=debug")
    } else {
        EnvFilter::new("pano_rules=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(verbose = cli.verbose, "logging initialized");

    match cli.command {
        Command::Flatten(args) => flatten_cmd::run_flatten(args),
        Command::Resolve(args) => resolve_cmd::run_resolve(args),
    }
}
