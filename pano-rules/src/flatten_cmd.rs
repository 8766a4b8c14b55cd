use anyhow::{bail, Context, Result};
use chrono::Local;
use pano_rules::catalog::build_catalog;
use pano_rules::observe::TracingObserver;
use pano_rules::resolve::Resolver;
use pano_rules::rules::{RuleWalker, RunContext};
use pano_rules::settings::resolve_settings;
use pano_rules::sink::PendingOutput;
use pano_rules::summary::{render_colored, RunTally};
use tracing::{info, warn};
use xml_tree_core::parse_file;

use crate::cli::FlattenArgs;
use crate::path_guard::{default_output_path, ensure_output_not_input};

pub fn run_flatten(args: FlattenArgs) -> Result<()> {
    let tenant = args.tenant.trim().to_string();
    if tenant.is_empty() {
        bail!("--tenant must not be empty");
    }

    let (settings, settings_source) = resolve_settings(args.settings.as_deref());
    info!(source = %settings_source, "settings loaded");

    let snapshot_date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&settings.output_dir, &tenant, snapshot_date));
    ensure_output_not_input(&output, &args.input)?;

    let root = parse_file(&args.input)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;

    let (catalog, build) = build_catalog(&root, &settings);
    for issue in &build.issues {
        warn!(%issue, "catalog issue");
    }
    if build.zone_fallback_used {
        info!(zones = catalog.zones.len(), "zones collected by broad rescan");
    }
    info!(
        device_groups = catalog.device_groups.len(),
        zones = catalog.zones.len(),
        issues = build.issues.len(),
        affected_scopes = build.affected_scopes(),
        "catalog built"
    );

    let observer = TracingObserver;
    let resolver = Resolver::new(&catalog, &observer);
    let context = RunContext {
        tenant,
        snapshot_date,
    };
    let walker = RuleWalker::new(&root, &resolver, &context);

    let mut pending = PendingOutput::create(&output)
        .with_context(|| format!("failed to prepare output {}", output.display()))?;
    let mut tally = RunTally::default();
    let walked = walker.walk(|document| {
        tally.record(document);
        pending.sink().write_record(document)
    });
    let report = match walked {
        Ok(report) => report,
        Err(err) => {
            pending.discard();
            return Err(err).with_context(|| format!("failed to write {}", output.display()));
        }
    };
    let written = pending
        .commit()
        .with_context(|| format!("failed to finish {}", output.display()))?;

    tally.skipped = report.skipped.len();
    tally.catalog_issues = build.issues.len();
    info!(
        documents = report.processed,
        path = %written.display(),
        "output written"
    );
    println!("{}", render_colored(tally));
    Ok(())
}
