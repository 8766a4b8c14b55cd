use anyhow::{Context, Result};
use colored::Colorize;
use pano_rules::catalog::build_catalog;
use pano_rules::observe::TracingObserver;
use pano_rules::resolve::{Outcome, Resolver};
use pano_rules::settings::resolve_settings;
use serde::Serialize;
use xml_tree_core::parse_file;

use crate::cli::{OutputFormat, ResolveArgs, ResolveCategory};

#[derive(Debug, Serialize)]
struct ResolveReport<'a> {
    scope: &'a str,
    category: &'static str,
    lookup_path: Vec<&'a str>,
    names: &'a [String],
    values: Vec<String>,
}

pub fn run_resolve(args: ResolveArgs) -> Result<()> {
    let (settings, _) = resolve_settings(args.settings.as_deref());
    let root = parse_file(&args.input)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    let (catalog, _) = build_catalog(&root, &settings);

    let observer = TracingObserver;
    let resolver = Resolver::new(&catalog, &observer);
    let scope = args.scope.as_str();
    let values = match args.category {
        ResolveCategory::Address => resolver.expand_addresses(scope, &args.names),
        ResolveCategory::Service => resolver.expand_services(scope, &args.names),
        ResolveCategory::Application => resolver.expand_applications(scope, &args.names),
        ResolveCategory::Zone => resolver.resolve_zones(scope, &args.names),
    };

    let report = ResolveReport {
        scope,
        category: category_name(args.category),
        lookup_path: resolver.lookup_path(scope).scopes().to_vec(),
        names: &args.names,
        values,
    };

    match args.format {
        OutputFormat::Text => println!("{}", render_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn render_text(report: &ResolveReport<'_>) -> String {
    let mut out = vec![format!(
        "{} {} via {}",
        report.category,
        report.names.join(","),
        report.lookup_path.join(" > ")
    )
    .cyan()
    .to_string()];
    for value in &report.values {
        let line = if Outcome::parse(value).is_marker() {
            value.yellow().to_string()
        } else {
            value.clone()
        };
        out.push(format!("  {line}"));
    }
    out.join("\n")
}

fn category_name(category: ResolveCategory) -> &'static str {
    match category {
        ResolveCategory::Address => "address",
        ResolveCategory::Service => "service",
        ResolveCategory::Application => "application",
        ResolveCategory::Zone => "zone",
    }
}
