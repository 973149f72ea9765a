use serde::Serialize;

use crate::core::config::{ContextColumns, IdColumns, ReconConfig};
use crate::core::rule::RuleSet;
use crate::core::table::Dataset;
use crate::core::types::Provenance;
use crate::recon::align::align;
use crate::recon::classify::{classify_row, RowClass};
use crate::recon::compare::Finding;
use crate::recon::ReconError;

/// An MLS listing with no CAMA record.
#[derive(Debug, Clone, Serialize)]
pub struct MissingListing {
    pub parcel_id: String,
    pub listing_number: String,
    pub closed_date: String,
}

/// A CAMA parcel with no MLS listing. The CAMA export carries no listing
/// context, so the identifier is all we can report.
#[derive(Debug, Clone, Serialize)]
pub struct MissingParcel {
    pub parcel_id: String,
}

/// A record where every applicable comparator agreed.
#[derive(Debug, Clone, Serialize)]
pub struct PerfectMatch {
    pub parcel_id: String,
    pub listing_number: String,
    pub salekey: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub fields_compared: usize,
    pub fields_list: String,
}

/// Totals reported alongside the result sets, so rows with zero applicable
/// comparators are observable rather than silently dropped.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunStats {
    /// Joined rows processed (all provenances).
    pub rows_processed: usize,
    pub rows_in_both: usize,
    pub mismatched_rows: usize,
    pub perfect_rows: usize,
    /// `Both` rows with no applicable comparator.
    pub excluded_rows: usize,
    /// Comparators recovered after an unexpected value shape.
    pub errored_comparisons: usize,
}

/// The four disjoint result sets of one reconciliation run, plus statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconReport {
    pub missing_in_cama: Vec<MissingListing>,
    pub missing_in_mls: Vec<MissingParcel>,
    /// One entry per finding, not per record.
    pub mismatches: Vec<Finding>,
    pub perfect_matches: Vec<PerfectMatch>,
    pub stats: RunStats,
}

/// Run one full reconciliation: align, classify every `Both` row, and
/// aggregate the four result sets.
///
/// Inputs are borrowed read-only; the report is wholly new data, so callers
/// may run multiple reconciliations concurrently.
///
/// # Errors
///
/// Returns [`ReconError`] if either identifier column is missing - the only
/// error that aborts a run. Row- and field-local problems are recovered and
/// counted in [`RunStats`].
pub fn reconcile(
    mls: &Dataset,
    cama: &Dataset,
    ids: &IdColumns,
    rules: &RuleSet,
    context: &ContextColumns,
    config: &ReconConfig,
) -> Result<ReconReport, ReconError> {
    let joined = align(mls, cama, &ids.mls, &ids.cama)?;

    let mut report = ReconReport {
        stats: RunStats {
            rows_processed: joined.len(),
            ..RunStats::default()
        },
        ..ReconReport::default()
    };

    for row in &joined {
        match row.provenance {
            Provenance::MlsOnly => report.missing_in_cama.push(MissingListing {
                parcel_id: row.parcel_id.clone(),
                listing_number: row.display(&context.listing_number),
                closed_date: row.display(&context.closed_date),
            }),
            Provenance::CamaOnly => report.missing_in_mls.push(MissingParcel {
                parcel_id: row.parcel_id.clone(),
            }),
            Provenance::Both => {
                report.stats.rows_in_both += 1;
                let outcome = classify_row(row, rules, context, config);
                report.stats.errored_comparisons += outcome.errored_comparisons;
                match outcome.class {
                    RowClass::Mismatch(findings) => {
                        report.stats.mismatched_rows += 1;
                        report.mismatches.extend(findings);
                    }
                    RowClass::PerfectMatch { fields_compared } => {
                        report.stats.perfect_rows += 1;
                        report.perfect_matches.push(PerfectMatch {
                            parcel_id: row.parcel_id.clone(),
                            listing_number: row.display(&context.listing_number),
                            salekey: row.display(&context.salekey),
                            address: row.display(&context.address),
                            city: row.display(&context.city),
                            state: row.display(&context.state),
                            zip: row.display(&context.zip),
                            fields_compared: fields_compared.len(),
                            fields_list: fields_compared.join(", "),
                        });
                    }
                    RowClass::Excluded => report.stats.excluded_rows += 1,
                }
            }
        }
    }

    Ok(report)
}

/// Which of the four result sets to render or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSet {
    MissingInCama,
    MissingInMls,
    Mismatches,
    PerfectMatches,
}

impl ResultSet {
    pub const ALL: [ResultSet; 4] = [
        ResultSet::MissingInCama,
        ResultSet::MissingInMls,
        ResultSet::Mismatches,
        ResultSet::PerfectMatches,
    ];

    /// Stem used for downloaded/exported file names.
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        match self {
            ResultSet::MissingInCama => "missing_in_CAMA",
            ResultSet::MissingInMls => "missing_in_MLS",
            ResultSet::Mismatches => "value_mismatches",
            ResultSet::PerfectMatches => "perfect_matches",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            ResultSet::MissingInCama => "Missing in CAMA",
            ResultSet::MissingInMls => "Missing in MLS",
            ResultSet::Mismatches => "Value Mismatches",
            ResultSet::PerfectMatches => "Perfect Matches",
        }
    }
}

impl std::str::FromStr for ResultSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing_in_cama" => Ok(ResultSet::MissingInCama),
            "missing_in_mls" => Ok(ResultSet::MissingInMls),
            "mismatches" => Ok(ResultSet::Mismatches),
            "perfect_matches" => Ok(ResultSet::PerfectMatches),
            other => Err(format!("unknown result set '{other}'")),
        }
    }
}

/// A result set flattened to named columns of display strings, ready for
/// spreadsheet export.
#[derive(Debug, Clone, Serialize)]
pub struct ResultTable {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl ReconReport {
    /// Flatten one result set into a [`ResultTable`].
    #[must_use]
    pub fn table(&self, set: ResultSet) -> ResultTable {
        match set {
            ResultSet::MissingInCama => ResultTable {
                headers: vec!["Parcel_ID", "Listing_Number", "Closed_Date"],
                rows: self
                    .missing_in_cama
                    .iter()
                    .map(|r| {
                        vec![
                            r.parcel_id.clone(),
                            r.listing_number.clone(),
                            r.closed_date.clone(),
                        ]
                    })
                    .collect(),
            },
            ResultSet::MissingInMls => ResultTable {
                headers: vec!["Parcel_ID"],
                rows: self
                    .missing_in_mls
                    .iter()
                    .map(|r| vec![r.parcel_id.clone()])
                    .collect(),
            },
            ResultSet::Mismatches => ResultTable {
                headers: vec![
                    "Parcel_ID",
                    "Listing_Number",
                    "SALEKEY",
                    "Address",
                    "City",
                    "State",
                    "Zip",
                    "Field_MLS",
                    "Field_CAMA",
                    "MLS_Value",
                    "CAMA_Value",
                    "Difference",
                    "Expected_CAMA_Value",
                    "Match_Rule",
                ],
                rows: self
                    .mismatches
                    .iter()
                    .map(|f| {
                        vec![
                            f.parcel_id.clone(),
                            f.listing_number.clone(),
                            f.salekey.clone(),
                            f.address.clone(),
                            f.city.clone(),
                            f.state.clone(),
                            f.zip.clone(),
                            f.field_mls.clone(),
                            f.field_cama.clone(),
                            f.mls_value.display(),
                            f.cama_value.display(),
                            f.difference.clone().unwrap_or_default(),
                            f.expected_cama
                                .as_ref()
                                .map(crate::core::value::FieldValue::display)
                                .unwrap_or_default(),
                            f.match_rule.clone().unwrap_or_default(),
                        ]
                    })
                    .collect(),
            },
            ResultSet::PerfectMatches => ResultTable {
                headers: vec![
                    "Parcel_ID",
                    "Listing_Number",
                    "SALEKEY",
                    "Address",
                    "City",
                    "State",
                    "Zip",
                    "Fields_Compared",
                    "Fields_List",
                ],
                rows: self
                    .perfect_matches
                    .iter()
                    .map(|r| {
                        vec![
                            r.parcel_id.clone(),
                            r.listing_number.clone(),
                            r.salekey.clone(),
                            r.address.clone(),
                            r.city.clone(),
                            r.state.clone(),
                            r.zip.clone(),
                            r.fields_compared.to_string(),
                            r.fields_list.clone(),
                        ]
                    })
                    .collect(),
            },
        }
    }
}
