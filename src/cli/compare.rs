use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::cli::OutputFormat;
use crate::core::config::{ContextColumns, IdColumns, ReconConfig};
use crate::core::rule::{ComparisonRule, RuleSet};
use crate::export::links::DEFAULT_WINDOW_ID;
use crate::export::{write_table_file, CountyLinks};
use crate::parsing;
use crate::recon::report::{reconcile, ReconReport, ResultSet};

#[derive(Args)]
pub struct CompareArgs {
    /// MLS export (xlsx, xls, xlsb, ods, csv, or tsv)
    #[arg(required = true)]
    pub mls_file: PathBuf,

    /// CAMA export (same formats)
    #[arg(required = true)]
    pub cama_file: PathBuf,

    /// Identifier column in the MLS export
    #[arg(long, default_value = "Parcel Number")]
    pub mls_id: String,

    /// Identifier column in the CAMA export
    #[arg(long, default_value = "PARID")]
    pub cama_id: String,

    /// Absolute tolerance for numeric comparisons
    #[arg(long, default_value_t = 0.01)]
    pub tolerance: f64,

    /// Compare values even when one side is exactly zero
    #[arg(long)]
    pub include_zeros: bool,

    /// JSON file with a custom comparison rule list
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Write the four Excel reports into this directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// windowId used for county deep links in exported reports
    #[arg(long, default_value = DEFAULT_WINDOW_ID)]
    pub window_id: String,
}

pub fn run(args: CompareArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let mls = parsing::load_dataset(&args.mls_file)?;
    let cama = parsing::load_dataset(&args.cama_file)?;

    if verbose {
        eprintln!(
            "Loaded {} MLS records ({} columns) and {} CAMA records ({} columns)",
            mls.len(),
            mls.columns().len(),
            cama.len(),
            cama.columns().len()
        );
        for row in mls.head(3) {
            eprintln!("  MLS: {}", row.join(" | "));
        }
        for row in cama.head(3) {
            eprintln!("  CAMA: {}", row.join(" | "));
        }
    }

    let rules = match &args.rules {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let parsed: Vec<ComparisonRule> = serde_json::from_str(&text)?;
            RuleSet::new(parsed)
        }
        None => RuleSet::default_property_rules(),
    };

    let ids = IdColumns {
        mls: args.mls_id.clone(),
        cama: args.cama_id.clone(),
    };
    let config = ReconConfig {
        tolerance: args.tolerance,
        skip_zeros: !args.include_zeros,
    };

    let report = reconcile(&mls, &cama, &ids, &rules, &ContextColumns::default(), &config)?;

    match format {
        OutputFormat::Text => print_text_summary(&report),
        OutputFormat::Json => print_json_report(&report, &config)?,
        OutputFormat::Tsv => print_tsv_summary(&report),
    }

    if let Some(dir) = &args.output_dir {
        write_reports(&report, dir, &args.window_id)?;
    }

    Ok(())
}

fn write_reports(report: &ReconReport, dir: &std::path::Path, window_id: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let links = CountyLinks::new(window_id);

    for set in ResultSet::ALL {
        let table = report.table(set);
        if table.rows.is_empty() {
            info!("skipping {} (empty)", set.title());
            continue;
        }
        let path = dir.join(format!("{}.xlsx", set.file_stem()));
        write_table_file(&table, set.title(), Some(&links), &path)?;
        info!("wrote {} ({} rows)", path.display(), table.rows.len());
    }

    Ok(())
}

fn print_text_summary(report: &ReconReport) {
    println!("Comparison Results");
    println!("{}", "=".repeat(60));

    println!("\nRows processed: {}", report.stats.rows_processed);
    println!("  In both datasets: {}", report.stats.rows_in_both);

    println!("\nMissing in CAMA: {}", report.missing_in_cama.len());
    println!("Missing in MLS: {}", report.missing_in_mls.len());
    println!(
        "Value mismatches: {} findings across {} records",
        report.mismatches.len(),
        report.stats.mismatched_rows
    );
    println!("Perfect matches: {}", report.perfect_matches.len());

    println!(
        "\nExcluded (no applicable comparator): {}",
        report.stats.excluded_rows
    );
    println!("Errored comparisons: {}", report.stats.errored_comparisons);
}

fn print_json_report(report: &ReconReport, config: &ReconConfig) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "configuration": {
            "tolerance": config.tolerance,
            "skip_zeros": config.skip_zeros,
        },
        "stats": report.stats,
        "missing_in_cama": report.missing_in_cama,
        "missing_in_mls": report.missing_in_mls,
        "mismatches": report.mismatches,
        "perfect_matches": report.perfect_matches,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv_summary(report: &ReconReport) {
    println!("missing_in_cama\tmissing_in_mls\tmismatches\tperfect_matches\texcluded\terrored");
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        report.missing_in_cama.len(),
        report.missing_in_mls.len(),
        report.mismatches.len(),
        report.perfect_matches.len(),
        report.stats.excluded_rows,
        report.stats.errored_comparisons,
    );
}
