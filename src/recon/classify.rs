use tracing::warn;

use crate::core::config::{ContextColumns, ReconConfig};
use crate::core::rule::RuleSet;
use crate::recon::align::JoinedRow;
use crate::recon::compare::{evaluate, Finding, Outcome, RowContext};

/// Classification of one present-in-both row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowClass {
    /// At least one comparator produced a finding. Findings appear in
    /// evaluation order (Direct, then Summed, then Categorical, each in
    /// configured order).
    Mismatch(Vec<Finding>),
    /// At least one comparator was applicable and none produced a finding.
    PerfectMatch {
        /// MLS-side names of the fields actually compared.
        fields_compared: Vec<String>,
    },
    /// No comparator was applicable; the row belongs to neither the
    /// mismatch nor the perfect-match set.
    Excluded,
}

/// Outcome of classifying one row, including recovered comparator errors.
#[derive(Debug)]
pub struct RowOutcome {
    pub class: RowClass,
    /// Comparators that failed with an unexpected value shape and were
    /// treated as not applicable.
    pub errored_comparisons: usize,
}

/// Run every configured comparator against one `Both` row and fold the
/// outcomes.
///
/// A comparator error never aborts the row: it is logged with enough
/// context to diagnose (parcel id, field name), counted, and skipped.
#[must_use]
pub fn classify_row(
    row: &JoinedRow,
    rules: &RuleSet,
    context_columns: &ContextColumns,
    config: &ReconConfig,
) -> RowOutcome {
    let context = RowContext::from_row(row, context_columns);

    let mut findings = Vec::new();
    let mut fields_compared = Vec::new();
    let mut errored = 0usize;

    for rule in rules.iter() {
        match evaluate(rule, row, &context, config) {
            Ok(Outcome::NotApplicable) => {}
            Ok(Outcome::NoFinding) => {
                fields_compared.push(rule.mls_field().to_string());
            }
            Ok(Outcome::Finding(finding)) => {
                fields_compared.push(rule.mls_field().to_string());
                findings.push(*finding);
            }
            Err(error) => {
                errored += 1;
                warn!(
                    parcel = %context.parcel_id,
                    field = %rule.mls_field(),
                    %error,
                    "comparator failed; treated as not applicable"
                );
            }
        }
    }

    let class = if !findings.is_empty() {
        RowClass::Mismatch(findings)
    } else if !fields_compared.is_empty() {
        RowClass::PerfectMatch { fields_compared }
    } else {
        RowClass::Excluded
    };

    RowOutcome {
        class,
        errored_comparisons: errored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rule::{CategoricalRule, ComparisonRule, DirectRule, SummedRule};
    use crate::core::table::Dataset;
    use crate::core::value::FieldValue;
    use crate::recon::align::align;

    fn both_row(mls_cols: &[(&str, FieldValue)], cama_cols: &[(&str, FieldValue)]) -> JoinedRow {
        let mut mls_names = vec!["Parcel Number".to_string()];
        mls_names.extend(mls_cols.iter().map(|(n, _)| (*n).to_string()));
        let mut mls = Dataset::new(mls_names);
        let mut row = vec![FieldValue::Number(42.0)];
        row.extend(mls_cols.iter().map(|(_, v)| v.clone()));
        mls.push_row(row);

        let mut cama_names = vec!["PARID".to_string()];
        cama_names.extend(cama_cols.iter().map(|(n, _)| (*n).to_string()));
        let mut cama = Dataset::new(cama_names);
        let mut row = vec![FieldValue::Number(42.0)];
        row.extend(cama_cols.iter().map(|(_, v)| v.clone()));
        cama.push_row(row);

        align(&mls, &cama, "Parcel Number", "PARID")
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    fn rules() -> RuleSet {
        RuleSet::new(vec![
            ComparisonRule::Direct(DirectRule {
                mls_col: "Bedrooms Total".to_string(),
                cama_col: "RMBED".to_string(),
            }),
            ComparisonRule::Direct(DirectRule {
                mls_col: "Bathrooms Full".to_string(),
                cama_col: "FIXBATH".to_string(),
            }),
        ])
    }

    #[test]
    fn test_perfect_match_counts_applicable_fields() {
        let row = both_row(
            &[
                ("Bedrooms Total", FieldValue::Number(3.0)),
                ("Bathrooms Full", FieldValue::Number(2.0)),
            ],
            &[
                ("RMBED", FieldValue::Number(3.0)),
                ("FIXBATH", FieldValue::Number(2.0)),
            ],
        );
        let outcome = classify_row(
            &row,
            &rules(),
            &ContextColumns::default(),
            &ReconConfig::default(),
        );
        let RowClass::PerfectMatch { fields_compared } = outcome.class else {
            panic!("expected a perfect match");
        };
        assert_eq!(fields_compared, vec!["Bedrooms Total", "Bathrooms Full"]);
        assert_eq!(outcome.errored_comparisons, 0);
    }

    #[test]
    fn test_one_finding_makes_mismatch() {
        let row = both_row(
            &[
                ("Bedrooms Total", FieldValue::Number(3.0)),
                ("Bathrooms Full", FieldValue::Number(2.0)),
            ],
            &[
                ("RMBED", FieldValue::Number(4.0)),
                ("FIXBATH", FieldValue::Number(2.0)),
            ],
        );
        let outcome = classify_row(
            &row,
            &rules(),
            &ContextColumns::default(),
            &ReconConfig::default(),
        );
        let RowClass::Mismatch(findings) = outcome.class else {
            panic!("expected a mismatch");
        };
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field_mls, "Bedrooms Total");
        assert_eq!(findings[0].difference.as_deref(), Some("-1.00"));
    }

    #[test]
    fn test_no_applicable_comparator_is_excluded() {
        let row = both_row(
            &[("Bedrooms Total", FieldValue::Blank)],
            &[("RMBED", FieldValue::Number(3.0))],
        );
        let outcome = classify_row(
            &row,
            &rules(),
            &ContextColumns::default(),
            &ReconConfig::default(),
        );
        assert_eq!(outcome.class, RowClass::Excluded);
    }

    #[test]
    fn test_finding_order_follows_variant_then_configured_order() {
        let rules = RuleSet::new(vec![
            ComparisonRule::Categorical(CategoricalRule {
                mls_col: "Cooling".to_string(),
                cama_col: "HEAT".to_string(),
                contains_text: "Central Air".to_string(),
                expected_if_true: FieldValue::Number(1.0),
                expected_if_false: FieldValue::Number(0.0),
                case_sensitive: false,
            }),
            ComparisonRule::Summed(SummedRule {
                mls_col: "Below Grade Finished Area".to_string(),
                cama_cols: vec!["FINBSMTAREA".to_string()],
            }),
            ComparisonRule::Direct(DirectRule {
                mls_col: "Bedrooms Total".to_string(),
                cama_col: "RMBED".to_string(),
            }),
        ]);
        let row = both_row(
            &[
                ("Cooling", FieldValue::Text("Central Air".to_string())),
                ("Below Grade Finished Area", FieldValue::Number(900.0)),
                ("Bedrooms Total", FieldValue::Number(3.0)),
            ],
            &[
                ("HEAT", FieldValue::Number(2.0)),
                ("FINBSMTAREA", FieldValue::Number(700.0)),
                ("RMBED", FieldValue::Number(4.0)),
            ],
        );
        let outcome = classify_row(
            &row,
            &rules,
            &ContextColumns::default(),
            &ReconConfig {
                tolerance: 0.01,
                skip_zeros: false,
            },
        );
        let RowClass::Mismatch(findings) = outcome.class else {
            panic!("expected mismatches");
        };
        let fields: Vec<&str> = findings.iter().map(|f| f.field_mls.as_str()).collect();
        assert_eq!(
            fields,
            vec!["Bedrooms Total", "Below Grade Finished Area", "Cooling"]
        );
    }

    #[test]
    fn test_comparator_error_is_recovered_and_counted() {
        let rules = RuleSet::new(vec![
            ComparisonRule::Summed(SummedRule {
                mls_col: "Below Grade Finished Area".to_string(),
                cama_cols: Vec::new(), // malformed: nothing to sum
            }),
            ComparisonRule::Direct(DirectRule {
                mls_col: "Bedrooms Total".to_string(),
                cama_col: "RMBED".to_string(),
            }),
        ]);
        let row = both_row(
            &[
                ("Below Grade Finished Area", FieldValue::Number(900.0)),
                ("Bedrooms Total", FieldValue::Number(3.0)),
            ],
            &[("RMBED", FieldValue::Number(3.0))],
        );
        let outcome = classify_row(
            &row,
            &rules,
            &ContextColumns::default(),
            &ReconConfig::default(),
        );
        assert_eq!(outcome.errored_comparisons, 1);
        // The healthy comparator still runs and the row still classifies
        assert!(matches!(outcome.class, RowClass::PerfectMatch { .. }));
    }
}
