use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "pano-rules")]
#[command(about = "Flatten Panorama security rulebases into one JSON document per rule")]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Resolve every security rule and write NDJSON documents.
    Flatten(FlattenArgs),
    /// Resolve a few names from one scope and print the result.
    Resolve(ResolveArgs),
}

#[derive(Parser, Debug)]
pub struct FlattenArgs {
    /// Panorama configuration export.
    pub input: PathBuf,
    /// Tenant label stamped on every document.
    #[arg(long)]
    pub tenant: String,
    /// Snapshot date (YYYY-MM-DD); defaults to today.
    #[arg(long, value_parser = parse_snapshot_date)]
    pub date: Option<NaiveDate>,
    /// Output file; defaults to <output_dir>/<tenant>_<date>.ndjson.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Settings TOML; defaults to the built-in settings.
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    pub input: PathBuf,
    /// Device group (or `Shared`) to resolve from.
    #[arg(long)]
    pub scope: String,
    #[arg(long, value_enum)]
    pub category: ResolveCategory,
    #[arg(required = true)]
    pub names: Vec<String>,
    #[arg(long)]
    pub settings: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ResolveCategory {
    Address,
    Service,
    Application,
    Zone,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_snapshot_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| format!("invalid date '{raw}' (expected YYYY-MM-DD): {err}"))
}
