//! # parcel-recon
//!
//! A library for reconciling MLS (Multiple Listing Service) spreadsheet
//! exports against CAMA (county property assessment) exports.
//!
//! The two systems describe the same real-world properties but rarely agree:
//! identifiers go missing on one side, square footage drifts, bedroom counts
//! diverge. `parcel-recon` joins both exports on the parcel identifier,
//! applies a configurable set of per-field comparison rules, and partitions
//! every record into four disjoint result sets.
//!
//! ## Features
//!
//! - **Full outer join** on canonicalized identifiers, with provenance tags
//! - **Three rule variants**: direct equality under tolerance, multi-column
//!   sum equality, and rule-derived categorical equality
//! - **Explicit blank/zero semantics**: a blank source is "cannot compare,"
//!   never a mismatch; zeros can be skipped as unpopulated
//! - **Four result sets**: missing-in-CAMA, missing-in-MLS, field-level
//!   mismatches, and perfect matches
//! - **Hyperlinked Excel reports**, a web upload UI, and best-effort
//!   session-id and photo acquisition
//!
//! ## Example
//!
//! ```rust,no_run
//! use parcel_recon::core::config::{ContextColumns, IdColumns, ReconConfig};
//! use parcel_recon::core::rule::RuleSet;
//! use parcel_recon::parsing::load_dataset;
//! use parcel_recon::recon::report::reconcile;
//!
//! let mls = load_dataset("mls_export.xlsx".as_ref()).unwrap();
//! let cama = load_dataset("cama_export.xlsx".as_ref()).unwrap();
//!
//! let report = reconcile(
//!     &mls,
//!     &cama,
//!     &IdColumns::default(),
//!     &RuleSet::default_property_rules(),
//!     &ContextColumns::default(),
//!     &ReconConfig::default(),
//! )
//! .unwrap();
//!
//! println!(
//!     "{} mismatches, {} perfect matches",
//!     report.mismatches.len(),
//!     report.perfect_matches.len()
//! );
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Typed values, datasets, comparison rules, configuration
//! - [`recon`]: The reconciliation engine (align, compare, classify, report)
//! - [`parsing`]: Spreadsheet and delimited-text readers
//! - [`export`]: Hyperlink builders and Excel report writer
//! - [`acquire`]: Best-effort session-id and photo acquisition
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: Web server for browser-based comparison

pub mod acquire;
pub mod cli;
pub mod core;
pub mod export;
pub mod parsing;
pub mod recon;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use core::config::{ContextColumns, IdColumns, ReconConfig};
pub use core::rule::{ComparisonRule, RuleSet};
pub use core::table::Dataset;
pub use core::value::FieldValue;
pub use recon::report::{reconcile, ReconReport, ResultSet};
pub use recon::ReconError;
