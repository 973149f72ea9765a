use serde::Serialize;
use thiserror::Error;

use crate::core::config::{ContextColumns, ReconConfig};
use crate::core::rule::{CategoricalRule, ComparisonRule, DirectRule, SummedRule};
use crate::core::value::{format_difference, numbers_close, values_equal, FieldValue};
use crate::recon::align::JoinedRow;

/// Marker reported when a mismatching pair cannot be differenced numerically.
pub const TEXT_DIFFERENCE: &str = "Text difference";

/// Marker reported when one side of a numeric pair is not-a-number.
pub const NO_DIFFERENCE: &str = "N/A";

/// Result of running one comparator against one joined row.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A required source was blank, a named column is absent, or the
    /// skip-zeros gate fired. Never a finding.
    NotApplicable,
    /// The comparator ran and the values agree.
    NoFinding,
    /// The comparator ran and the values disagree.
    Finding(Box<Finding>),
}

/// One field-level mismatch. Produced during classification and consumed
/// immediately by the result aggregator; not retained elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub parcel_id: String,
    pub listing_number: String,
    pub salekey: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub field_mls: String,
    pub field_cama: String,
    pub mls_value: FieldValue,
    pub cama_value: FieldValue,
    /// Formatted `MLS - CAMA` for numeric pairs, or a textual marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<String>,
    /// Categorical findings only: the CAMA value the rule expected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_cama: Option<FieldValue>,
    /// Categorical findings only: human-readable statement of the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_rule: Option<String>,
}

/// Contextual fields passed through from the joined row into findings.
#[derive(Debug, Clone)]
pub struct RowContext {
    pub parcel_id: String,
    pub listing_number: String,
    pub salekey: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl RowContext {
    #[must_use]
    pub fn from_row(row: &JoinedRow, columns: &ContextColumns) -> Self {
        Self {
            parcel_id: row.parcel_id.clone(),
            listing_number: row.display(&columns.listing_number),
            salekey: row.display(&columns.salekey),
            address: row.display(&columns.address),
            city: row.display(&columns.city),
            state: row.display(&columns.state),
            zip: row.display(&columns.zip),
        }
    }

    fn finding(&self, field_mls: &str, field_cama: String, mls: FieldValue, cama: FieldValue) -> Finding {
        Finding {
            parcel_id: self.parcel_id.clone(),
            listing_number: self.listing_number.clone(),
            salekey: self.salekey.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip: self.zip.clone(),
            field_mls: field_mls.to_string(),
            field_cama,
            mls_value: mls,
            cama_value: cama,
            difference: None,
            expected_cama: None,
            match_rule: None,
        }
    }
}

/// An unexpected value shape inside one comparator for one row.
///
/// Recovered locally by the classifier: logged, counted, and treated as
/// [`Outcome::NotApplicable`]; never aborts the row or the run.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("sum rule for '{0}' lists no CAMA columns")]
    EmptySum(String),
    #[error("non-finite value in '{column}'")]
    NonFinite { column: String },
}

/// Evaluate one rule against one joined row.
///
/// Dispatches on the rule variant; all variants share the applicability
/// gate (blank sources and, when configured, exact zeros are not
/// comparable).
///
/// # Errors
///
/// Returns [`EvalError`] for value shapes the comparators cannot reason
/// about; the caller recovers by treating the comparator as not applicable.
pub fn evaluate(
    rule: &ComparisonRule,
    row: &JoinedRow,
    context: &RowContext,
    config: &ReconConfig,
) -> Result<Outcome, EvalError> {
    match rule {
        ComparisonRule::Direct(r) => evaluate_direct(r, row, context, config),
        ComparisonRule::Summed(r) => evaluate_summed(r, row, context, config),
        ComparisonRule::Categorical(r) => evaluate_categorical(r, row, context, config),
    }
}

fn evaluate_direct(
    rule: &DirectRule,
    row: &JoinedRow,
    context: &RowContext,
    config: &ReconConfig,
) -> Result<Outcome, EvalError> {
    let (Some(mls_val), Some(cama_val)) = (row.get(&rule.mls_col), row.get(&rule.cama_col)) else {
        return Ok(Outcome::NotApplicable);
    };
    if mls_val.is_blank() || cama_val.is_blank() {
        return Ok(Outcome::NotApplicable);
    }

    let mls_num = finite_number(mls_val, &rule.mls_col)?;
    let cama_num = finite_number(cama_val, &rule.cama_col)?;
    if zero_gate(config, &[mls_num, cama_num]) {
        return Ok(Outcome::NotApplicable);
    }

    if values_equal(mls_val, cama_val, config.tolerance) {
        return Ok(Outcome::NoFinding);
    }

    let mut finding = context.finding(
        &rule.mls_col,
        rule.cama_col.clone(),
        mls_val.clone(),
        cama_val.clone(),
    );
    finding.difference = Some(difference_label(mls_num, cama_num));
    Ok(Outcome::Finding(Box::new(finding)))
}

fn evaluate_summed(
    rule: &SummedRule,
    row: &JoinedRow,
    context: &RowContext,
    config: &ReconConfig,
) -> Result<Outcome, EvalError> {
    if rule.cama_cols.is_empty() {
        return Err(EvalError::EmptySum(rule.mls_col.clone()));
    }

    let Some(mls_val) = row.get(&rule.mls_col) else {
        return Ok(Outcome::NotApplicable);
    };
    let mut cama_vals = Vec::with_capacity(rule.cama_cols.len());
    for col in &rule.cama_cols {
        match row.get(col) {
            Some(v) => cama_vals.push((col.as_str(), v)),
            None => return Ok(Outcome::NotApplicable),
        }
    }
    if mls_val.is_blank() {
        return Ok(Outcome::NotApplicable);
    }

    // Non-coercible fields contribute 0 and do not block the sum; a sum of
    // entirely-absent fields is not a meaningful zero.
    let mut sum = 0.0;
    let mut all_blank = true;
    for &(col, val) in &cama_vals {
        if val.is_blank() {
            continue;
        }
        all_blank = false;
        if let Some(n) = finite_number(val, col)? {
            sum += n;
        }
    }
    if all_blank {
        return Ok(Outcome::NotApplicable);
    }

    let mls_num = finite_number(mls_val, &rule.mls_col)?;
    if zero_gate(config, &[mls_num, Some(sum)]) {
        return Ok(Outcome::NotApplicable);
    }

    let total = FieldValue::Number(sum);
    if values_equal(mls_val, &total, config.tolerance) {
        return Ok(Outcome::NoFinding);
    }

    let mut finding = context.finding(
        &rule.mls_col,
        format!("SUM({})", rule.cama_cols.join(", ")),
        mls_val.clone(),
        total,
    );
    finding.difference = Some(difference_label(mls_num, Some(sum)));
    Ok(Outcome::Finding(Box::new(finding)))
}

fn evaluate_categorical(
    rule: &CategoricalRule,
    row: &JoinedRow,
    context: &RowContext,
    config: &ReconConfig,
) -> Result<Outcome, EvalError> {
    let (Some(mls_val), Some(cama_val)) = (row.get(&rule.mls_col), row.get(&rule.cama_col)) else {
        return Ok(Outcome::NotApplicable);
    };
    if mls_val.is_blank() || cama_val.is_blank() {
        return Ok(Outcome::NotApplicable);
    }

    let mls_num = finite_number(mls_val, &rule.mls_col)?;
    let cama_num = finite_number(cama_val, &rule.cama_col)?;
    if zero_gate(config, &[mls_num, cama_num]) {
        return Ok(Outcome::NotApplicable);
    }

    let text_found = if rule.case_sensitive {
        mls_val.display().contains(&rule.contains_text)
    } else {
        mls_val
            .display()
            .to_lowercase()
            .contains(&rule.contains_text.to_lowercase())
    };
    let expected = if text_found {
        &rule.expected_if_true
    } else {
        &rule.expected_if_false
    };

    let matched = match (expected.as_number(), cama_val.as_number()) {
        (Some(e), Some(c)) => numbers_close(c, e, config.tolerance),
        _ => cama_val.display().to_lowercase() == expected.display().to_lowercase(),
    };
    if matched {
        return Ok(Outcome::NoFinding);
    }

    let mut finding = context.finding(
        &rule.mls_col,
        rule.cama_col.clone(),
        mls_val.clone(),
        cama_val.clone(),
    );
    finding.expected_cama = Some(expected.clone());
    finding.match_rule = Some(format!(
        "If '{}' in {}, then {} should be {}, else {}",
        rule.contains_text,
        rule.mls_col,
        rule.cama_col,
        rule.expected_if_true.display(),
        rule.expected_if_false.display(),
    ));
    Ok(Outcome::Finding(Box::new(finding)))
}

/// Coerce for the zero gate and difference computation, rejecting infinities.
/// NaN passes through: "not a number" is a meaningful comparison state.
fn finite_number(value: &FieldValue, column: &str) -> Result<Option<f64>, EvalError> {
    match value.as_number() {
        Some(n) if n.is_infinite() => Err(EvalError::NonFinite {
            column: column.to_string(),
        }),
        other => Ok(other),
    }
}

/// When `skip_zeros` is on, an exact coerced zero on any side means
/// "not meaningfully populated" and the whole comparison is skipped.
fn zero_gate(config: &ReconConfig, sides: &[Option<f64>]) -> bool {
    config.skip_zeros && sides.iter().any(|n| *n == Some(0.0))
}

fn difference_label(mls: Option<f64>, cama: Option<f64>) -> String {
    match (mls, cama) {
        (Some(a), Some(b)) => {
            if a.is_nan() || b.is_nan() {
                NO_DIFFERENCE.to_string()
            } else {
                format_difference(a - b)
            }
        }
        _ => TEXT_DIFFERENCE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::Dataset;
    use crate::recon::align::align;

    fn joined_row(mls_cols: &[(&str, FieldValue)], cama_cols: &[(&str, FieldValue)]) -> JoinedRow {
        let mut mls_names = vec!["Parcel Number".to_string()];
        mls_names.extend(mls_cols.iter().map(|(n, _)| (*n).to_string()));
        let mut mls = Dataset::new(mls_names);
        let mut row = vec![FieldValue::Number(1.0)];
        row.extend(mls_cols.iter().map(|(_, v)| v.clone()));
        mls.push_row(row);

        let mut cama_names = vec!["PARID".to_string()];
        cama_names.extend(cama_cols.iter().map(|(n, _)| (*n).to_string()));
        let mut cama = Dataset::new(cama_names);
        let mut row = vec![FieldValue::Number(1.0)];
        row.extend(cama_cols.iter().map(|(_, v)| v.clone()));
        cama.push_row(row);

        align(&mls, &cama, "Parcel Number", "PARID")
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    fn context(row: &JoinedRow) -> RowContext {
        RowContext::from_row(row, &ContextColumns::default())
    }

    fn config(tolerance: f64, skip_zeros: bool) -> ReconConfig {
        ReconConfig {
            tolerance,
            skip_zeros,
        }
    }

    fn direct(mls: &str, cama: &str) -> DirectRule {
        DirectRule {
            mls_col: mls.to_string(),
            cama_col: cama.to_string(),
        }
    }

    #[test]
    fn test_direct_within_tolerance_is_no_finding() {
        let row = joined_row(
            &[("Above Grade Finished Area", FieldValue::Number(1400.0))],
            &[("SFLA", FieldValue::Number(1400.005))],
        );
        let out = evaluate_direct(
            &direct("Above Grade Finished Area", "SFLA"),
            &row,
            &context(&row),
            &config(0.01, false),
        )
        .unwrap();
        assert_eq!(out, Outcome::NoFinding);
    }

    #[test]
    fn test_direct_beyond_tolerance_yields_finding() {
        let row = joined_row(
            &[("Above Grade Finished Area", FieldValue::Number(1400.0))],
            &[("SFLA", FieldValue::Number(1250.0))],
        );
        let out = evaluate_direct(
            &direct("Above Grade Finished Area", "SFLA"),
            &row,
            &context(&row),
            &config(0.01, false),
        )
        .unwrap();
        let Outcome::Finding(finding) = out else {
            panic!("expected a finding");
        };
        assert_eq!(finding.difference.as_deref(), Some("150.00"));
        assert_eq!(finding.field_cama, "SFLA");
    }

    #[test]
    fn test_blank_source_is_never_a_finding() {
        let row = joined_row(
            &[("Bedrooms Total", FieldValue::Blank)],
            &[("RMBED", FieldValue::Number(3.0))],
        );
        let out = evaluate_direct(
            &direct("Bedrooms Total", "RMBED"),
            &row,
            &context(&row),
            &config(0.0, false),
        )
        .unwrap();
        assert_eq!(out, Outcome::NotApplicable);

        // Whitespace-only text counts as blank too
        let row = joined_row(
            &[("Bedrooms Total", FieldValue::Number(3.0))],
            &[("RMBED", FieldValue::Text("   ".to_string()))],
        );
        let out = evaluate_direct(
            &direct("Bedrooms Total", "RMBED"),
            &row,
            &context(&row),
            &config(0.0, false),
        )
        .unwrap();
        assert_eq!(out, Outcome::NotApplicable);
    }

    #[test]
    fn test_skip_zero_gate() {
        let row = joined_row(
            &[("Bedrooms Total", FieldValue::Number(0.0))],
            &[("RMBED", FieldValue::Number(5.0))],
        );
        let rule = direct("Bedrooms Total", "RMBED");

        let out = evaluate_direct(&rule, &row, &context(&row), &config(0.01, true)).unwrap();
        assert_eq!(out, Outcome::NotApplicable);

        let out = evaluate_direct(&rule, &row, &context(&row), &config(0.01, false)).unwrap();
        let Outcome::Finding(finding) = out else {
            panic!("expected a finding with skip_zeros off");
        };
        assert_eq!(finding.difference.as_deref(), Some("-5.00"));
    }

    #[test]
    fn test_direct_text_fallback() {
        let row = joined_row(
            &[("Style", FieldValue::Text("Ranch".to_string()))],
            &[("STYLE", FieldValue::Text("RANCH ".to_string()))],
        );
        let out = evaluate_direct(&direct("Style", "STYLE"), &row, &context(&row), &config(0.01, true))
            .unwrap();
        assert_eq!(out, Outcome::NoFinding);

        let row = joined_row(
            &[("Style", FieldValue::Text("Ranch".to_string()))],
            &[("STYLE", FieldValue::Text("Colonial".to_string()))],
        );
        let out = evaluate_direct(&direct("Style", "STYLE"), &row, &context(&row), &config(0.01, true))
            .unwrap();
        let Outcome::Finding(finding) = out else {
            panic!("expected a finding");
        };
        assert_eq!(finding.difference.as_deref(), Some(TEXT_DIFFERENCE));
    }

    #[test]
    fn test_missing_column_is_not_applicable() {
        let row = joined_row(
            &[("Bedrooms Total", FieldValue::Number(3.0))],
            &[("RMBED", FieldValue::Number(3.0))],
        );
        let out = evaluate_direct(
            &direct("Bathrooms Full", "FIXBATH"),
            &row,
            &context(&row),
            &config(0.01, true),
        )
        .unwrap();
        assert_eq!(out, Outcome::NotApplicable);
    }

    #[test]
    fn test_summed_mismatch_reports_sum_and_difference() {
        let row = joined_row(
            &[("Below Grade Finished Area", FieldValue::Number(500.0))],
            &[
                ("RECROMAREA", FieldValue::Number(200.0)),
                ("FINBSMTAREA", FieldValue::Number(150.0)),
                ("UFEATAREA", FieldValue::Blank),
            ],
        );
        let rule = SummedRule {
            mls_col: "Below Grade Finished Area".to_string(),
            cama_cols: vec![
                "RECROMAREA".to_string(),
                "FINBSMTAREA".to_string(),
                "UFEATAREA".to_string(),
            ],
        };
        let out = evaluate_summed(&rule, &row, &context(&row), &config(0.01, true)).unwrap();
        let Outcome::Finding(finding) = out else {
            panic!("expected a finding");
        };
        assert_eq!(finding.difference.as_deref(), Some("150.00"));
        assert_eq!(finding.cama_value, FieldValue::Number(350.0));
        assert_eq!(
            finding.field_cama,
            "SUM(RECROMAREA, FINBSMTAREA, UFEATAREA)"
        );
    }

    #[test]
    fn test_summed_all_blank_is_not_applicable() {
        let row = joined_row(
            &[("Below Grade Finished Area", FieldValue::Number(500.0))],
            &[
                ("RECROMAREA", FieldValue::Blank),
                ("FINBSMTAREA", FieldValue::Blank),
            ],
        );
        let rule = SummedRule {
            mls_col: "Below Grade Finished Area".to_string(),
            cama_cols: vec!["RECROMAREA".to_string(), "FINBSMTAREA".to_string()],
        };
        // A sum of entirely-absent fields is not a meaningful zero
        let out = evaluate_summed(&rule, &row, &context(&row), &config(0.01, false)).unwrap();
        assert_eq!(out, Outcome::NotApplicable);
    }

    #[test]
    fn test_summed_non_coercible_contributes_zero() {
        let row = joined_row(
            &[("Below Grade Finished Area", FieldValue::Number(200.0))],
            &[
                ("RECROMAREA", FieldValue::Number(200.0)),
                ("FINBSMTAREA", FieldValue::Text("unknown".to_string())),
            ],
        );
        let rule = SummedRule {
            mls_col: "Below Grade Finished Area".to_string(),
            cama_cols: vec!["RECROMAREA".to_string(), "FINBSMTAREA".to_string()],
        };
        let out = evaluate_summed(&rule, &row, &context(&row), &config(0.01, true)).unwrap();
        assert_eq!(out, Outcome::NoFinding);
    }

    #[test]
    fn test_summed_empty_rule_is_an_evaluation_error() {
        let row = joined_row(
            &[("Below Grade Finished Area", FieldValue::Number(200.0))],
            &[("RECROMAREA", FieldValue::Number(200.0))],
        );
        let rule = SummedRule {
            mls_col: "Below Grade Finished Area".to_string(),
            cama_cols: Vec::new(),
        };
        let err = evaluate_summed(&rule, &row, &context(&row), &config(0.01, true)).unwrap_err();
        assert!(matches!(err, EvalError::EmptySum(_)));
    }

    fn cooling_rule() -> CategoricalRule {
        CategoricalRule {
            mls_col: "Cooling".to_string(),
            cama_col: "HEAT".to_string(),
            contains_text: "Central Air".to_string(),
            expected_if_true: FieldValue::Number(1.0),
            expected_if_false: FieldValue::Number(0.0),
            case_sensitive: false,
        }
    }

    #[test]
    fn test_categorical_match_and_mismatch() {
        let row = joined_row(
            &[("Cooling", FieldValue::Text("Central Air, Ceiling Fan".to_string()))],
            &[("HEAT", FieldValue::Number(1.0))],
        );
        let out =
            evaluate_categorical(&cooling_rule(), &row, &context(&row), &config(0.01, false)).unwrap();
        assert_eq!(out, Outcome::NoFinding);

        let row = joined_row(
            &[("Cooling", FieldValue::Text("central air".to_string()))],
            &[("HEAT", FieldValue::Number(0.0))],
        );
        let out =
            evaluate_categorical(&cooling_rule(), &row, &context(&row), &config(0.01, false)).unwrap();
        let Outcome::Finding(finding) = out else {
            panic!("expected a finding");
        };
        assert_eq!(finding.expected_cama, Some(FieldValue::Number(1.0)));
        assert!(finding.match_rule.as_deref().unwrap().contains("Central Air"));
        assert!(finding.difference.is_none());
    }

    #[test]
    fn test_categorical_case_sensitivity() {
        let mut rule = cooling_rule();
        rule.case_sensitive = true;

        let row = joined_row(
            &[("Cooling", FieldValue::Text("central air".to_string()))],
            &[("HEAT", FieldValue::Number(0.0))],
        );
        // Lowercase text no longer matches, so HEAT=0 is the expected value
        let out = evaluate_categorical(&rule, &row, &context(&row), &config(0.01, false)).unwrap();
        assert_eq!(out, Outcome::NoFinding);
    }

    #[test]
    fn test_categorical_string_fallback() {
        let rule = CategoricalRule {
            mls_col: "Cooling".to_string(),
            cama_col: "HEATDESC".to_string(),
            contains_text: "Central Air".to_string(),
            expected_if_true: FieldValue::Text("Central".to_string()),
            expected_if_false: FieldValue::Text("None".to_string()),
            case_sensitive: false,
        };
        let row = joined_row(
            &[("Cooling", FieldValue::Text("Central Air".to_string()))],
            &[("HEATDESC", FieldValue::Text(" central ".to_string()))],
        );
        let out = evaluate_categorical(&rule, &row, &context(&row), &config(0.01, false)).unwrap();
        assert_eq!(out, Outcome::NoFinding);
    }

    #[test]
    fn test_infinite_value_is_an_evaluation_error() {
        let row = joined_row(
            &[("Bedrooms Total", FieldValue::Number(f64::INFINITY))],
            &[("RMBED", FieldValue::Number(3.0))],
        );
        let err = evaluate_direct(
            &direct("Bedrooms Total", "RMBED"),
            &row,
            &context(&row),
            &config(0.01, true),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::NonFinite { .. }));
    }
}
