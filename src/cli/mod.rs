//! Command-line interface for parcel-recon.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **compare**: Reconcile an MLS export against a CAMA export
//! - **session-id**: Acquire a fresh county windowId for deep links
//! - **photos**: Batch-download property photos for a result spreadsheet
//! - **serve**: Start the interactive web interface
//!
//! ## Usage
//!
//! ```text
//! # Compare two exports and print a summary
//! parcel-recon compare mls_export.xlsx cama_export.xlsx
//!
//! # Write the four hyperlinked reports
//! parcel-recon compare mls.xlsx cama.xlsx --output-dir reports/
//!
//! # JSON output for scripting
//! parcel-recon compare mls.csv cama.csv --format json
//!
//! # Acquire a windowId, with a fallback for when extraction fails
//! parcel-recon session-id --fallback 638981240146803746
//!
//! # Start web UI
//! parcel-recon serve --port 8080 --open
//! ```

use clap::{Parser, Subcommand};

pub mod compare;
pub mod photos;
pub mod session;

#[derive(Parser)]
#[command(name = "parcel-recon")]
#[command(author = "Stark County Data Services")]
#[command(version)]
#[command(about = "Reconcile MLS listing exports against CAMA assessment exports")]
#[command(
    long_about = "parcel-recon joins an MLS spreadsheet export and a CAMA (county assessment) export on their parcel identifier and reports:\n- Listings missing from CAMA, and parcels missing from MLS\n- Field-level value mismatches (direct, summed, and categorical rules)\n- Perfect matches, with the fields actually compared\n\nReports export as Excel files with deep links into the county system and the listing site."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile an MLS export against a CAMA export
    Compare(compare::CompareArgs),

    /// Acquire a session windowId from the county system
    SessionId(session::SessionArgs),

    /// Download property photos for a result spreadsheet
    Photos(photos::PhotosArgs),

    /// Start the web server
    Serve(ServeArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
