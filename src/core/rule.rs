use serde::{Deserialize, Serialize};

use crate::core::value::FieldValue;

/// Direct one-to-one comparison: the MLS value must equal the CAMA value
/// under tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRule {
    pub mls_col: String,
    pub cama_col: String,
}

/// Sum comparison: the MLS value must equal the numeric sum of the listed
/// CAMA columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummedRule {
    pub mls_col: String,
    pub cama_cols: Vec<String>,
}

/// Categorical comparison: the MLS text is tested for substring containment,
/// and the CAMA value must equal the expected value chosen by that test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalRule {
    pub mls_col: String,
    pub cama_col: String,
    pub contains_text: String,
    pub expected_if_true: FieldValue,
    pub expected_if_false: FieldValue,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// One declarative field-level check. Rules are immutable configuration,
/// supplied once per run; the core never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComparisonRule {
    Direct(DirectRule),
    Summed(SummedRule),
    Categorical(CategoricalRule),
}

impl ComparisonRule {
    /// The MLS-side field name, used to label findings and the
    /// `Fields_Compared` list.
    #[must_use]
    pub fn mls_field(&self) -> &str {
        match self {
            ComparisonRule::Direct(r) => &r.mls_col,
            ComparisonRule::Summed(r) => &r.mls_col,
            ComparisonRule::Categorical(r) => &r.mls_col,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            ComparisonRule::Direct(_) => 0,
            ComparisonRule::Summed(_) => 1,
            ComparisonRule::Categorical(_) => 2,
        }
    }
}

/// The ordered set of rules for one run.
///
/// Evaluation order is fixed for deterministic finding order: Direct rules in
/// configured order, then Summed, then Categorical. Construction performs a
/// stable partition, so rules of the same variant keep their relative order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<ComparisonRule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<ComparisonRule>) -> Self {
        rules.sort_by_key(ComparisonRule::variant_rank);
        Self { rules }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComparisonRule> {
        self.rules.iter()
    }

    /// The production rule set for Stark County MLS/CAMA exports.
    #[must_use]
    pub fn default_property_rules() -> Self {
        let direct = [
            ("Above Grade Finished Area", "SFLA"),
            ("Bedrooms Total", "RMBED"),
            ("Bathrooms Full", "FIXBATH"),
            ("Bathrooms Half", "FIXHALF"),
        ];

        let mut rules: Vec<ComparisonRule> = direct
            .iter()
            .map(|(mls, cama)| {
                ComparisonRule::Direct(DirectRule {
                    mls_col: (*mls).to_string(),
                    cama_col: (*cama).to_string(),
                })
            })
            .collect();

        rules.push(ComparisonRule::Summed(SummedRule {
            mls_col: "Below Grade Finished Area".to_string(),
            cama_cols: vec![
                "RECROMAREA".to_string(),
                "FINBSMTAREA".to_string(),
                "UFEATAREA".to_string(),
            ],
        }));

        rules.push(ComparisonRule::Categorical(CategoricalRule {
            mls_col: "Cooling".to_string(),
            cama_col: "HEAT".to_string(),
            contains_text: "Central Air".to_string(),
            expected_if_true: FieldValue::Number(1.0),
            expected_if_false: FieldValue::Number(0.0),
            case_sensitive: false,
        }));

        Self::new(rules)
    }
}
