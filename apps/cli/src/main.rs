#![deny(warnings)]

//! Headless CLI that audits a pre-schedule report and prints, per target,
//! whether its match quota is met along with a region breakdown.

mod config;

use anyhow::{bail, Context, Result};
use config::CliConfig;
use sched_core::{validate_report, PreScheduleReport, RegionDirectory, RegionId};
use sched_quota::{audit_report, format_with, is_entry_satisfied, RenderStyle};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: quota-audit --report <report.json> --regions <regions.json> [--config <cli.yaml>] [--plain] [--json]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    report: Option<PathBuf>,
    regions: Option<PathBuf>,
    config: Option<PathBuf>,
    plain: bool,
    json: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let mut parsed = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--report" => parsed.report = it.next().map(PathBuf::from),
            "--regions" => parsed.regions = it.next().map(PathBuf::from),
            "--config" => parsed.config = it.next().map(PathBuf::from),
            "--plain" => parsed.plain = true,
            "--json" => parsed.json = true,
            _ => {}
        }
    }
    parsed
}

/// Load, validate and audit the report, returning everything to print.
async fn run(
    report_path: &Path,
    regions_path: &Path,
    cfg: &CliConfig,
    json: bool,
) -> Result<String> {
    let report_text = tokio::fs::read_to_string(report_path)
        .await
        .with_context(|| format!("reading report {}", report_path.display()))?;
    let report: PreScheduleReport =
        serde_json::from_str(&report_text).context("invalid report json")?;
    validate_report(&report).context("report failed validation")?;

    let regions_text = tokio::fs::read_to_string(regions_path)
        .await
        .with_context(|| format!("reading regions {}", regions_path.display()))?;
    let regions = RegionDirectory::from_json(&regions_text).context("invalid regions json")?;

    let audit = audit_report(&report)?;
    if json {
        return Ok(serde_json::to_string_pretty(&audit)?);
    }

    let mut out = Vec::new();
    let lookup = |id: RegionId| std::future::ready(regions.get(id).cloned());
    for entry in &report.target_match_count {
        let ok = is_entry_satisfied(entry)?;
        let rendered = format_with(&lookup, &entry.required, &entry.supplied, &cfg.format).await?;
        out.push(format!(
            "target {} | {}",
            entry.target.target.id,
            if ok { "OK" } else { "UNDER-SUPPLIED" }
        ));
        out.push(rendered);
    }

    out.push(format!(
        "Totals | required: {} | supplied: {} | stored totals {} | under-supplied targets: {}",
        audit.total_required,
        audit.total_supplied,
        if audit.totals_match { "match" } else { "DIFFER" },
        audit.under_supplied.len()
    ));
    if !report.target_has_duplicates.is_empty() {
        out.push(format!(
            "Duplicate group sets | {} groups | flagged targets: {:?}",
            report.target_duplicates.len(),
            report
                .target_has_duplicates
                .iter()
                .map(|t| t.0)
                .collect::<Vec<_>>()
        ));
    }

    Ok(out.join("\n"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1));
    let mut cfg = match &args.config {
        Some(path) => CliConfig::load(path).await?,
        None => CliConfig::default(),
    };
    if args.plain {
        cfg.format.style = RenderStyle::Plain;
    }

    // Logging setup
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (Some(report_path), Some(regions_path)) = (&args.report, &args.regions) else {
        bail!(USAGE);
    };
    info!(report = %report_path.display(), regions = %regions_path.display(), "starting audit");

    println!("{}", run(report_path, regions_path, &cfg, args.json).await?);
    Ok(())
}
