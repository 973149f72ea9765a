use serde::{Deserialize, Serialize, Serializer};

/// Fixed relative epsilon guarding floating rounding in tolerance comparisons.
/// The user-facing knob is the absolute tolerance in [`crate::core::config::ReconConfig`].
pub const RELATIVE_EPSILON: f64 = 1e-9;

/// A single cell value from either dataset.
///
/// Spreadsheet exports blur the line between "blank", "zero", and
/// "non-numeric text"; this enum keeps the three states distinguishable so
/// the comparators can check them explicitly instead of re-deriving them
/// from raw strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Blank,
}

// Manual Serialize: JSON has no NaN/infinity, so non-finite numbers render
// as their display string instead of failing the whole response.
impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            FieldValue::Number(n) => serializer.serialize_str(&n.to_string()),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Blank => serializer.serialize_none(),
        }
    }
}

impl FieldValue {
    /// Build a value from a raw text field (CSV cell, form input).
    ///
    /// Whitespace-only input is `Blank`; anything that parses as a float is
    /// `Number`; the rest stays `Text` verbatim.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return FieldValue::Blank;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => FieldValue::Number(n),
            Err(_) => FieldValue::Text(raw.to_string()),
        }
    }

    /// Blank means "cannot compare": absent, or text that is only whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Blank => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Number(_) => false,
        }
    }

    /// Best-effort numeric coercion. `Text` is trimmed and parsed; a parse
    /// failure is `None`, never an error.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Blank => None,
        }
    }

    /// Render for result tables. Integral numbers drop the trailing `.0`
    /// a float round-trip would otherwise print.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::Blank => String::new(),
        }
    }

    /// Canonical join-key form, or `None` for blanks (blank identifiers
    /// never join). Integral floats and their text rendering canonicalize
    /// to the same key, so `204522.0` from an xlsx cell joins `"204522"`
    /// from a CSV export.
    #[must_use]
    pub fn join_key(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        match self {
            FieldValue::Number(_) => Some(self.display()),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                // Numeric-looking text canonicalizes through the same path
                match trimmed.parse::<f64>() {
                    Ok(n) => Some(FieldValue::Number(n).display()),
                    Err(_) => Some(trimmed.to_string()),
                }
            }
            FieldValue::Blank => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)] // Guarded by the magnitude check
        let int = n as i64;
        return format!("{int}");
    }
    format!("{n}")
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Tolerant numeric equality: `|a - b| <= tolerance + RELATIVE_EPSILON * max(|a|,|b|)`.
///
/// Two NaNs compare equal (both sides "not a number" simultaneously); exactly
/// one NaN compares unequal.
#[must_use]
pub fn numbers_close(a: f64, b: f64, tolerance: f64) -> bool {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => (a - b).abs() <= tolerance + RELATIVE_EPSILON * a.abs().max(b.abs()),
    }
}

/// Equality under tolerance with string fallback.
///
/// If both sides coerce to numbers, compare with [`numbers_close`]; otherwise
/// fall back to case-insensitive trimmed string equality.
#[must_use]
pub fn values_equal(a: &FieldValue, b: &FieldValue, tolerance: f64) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => numbers_close(x, y, tolerance),
        _ => a.display().to_lowercase() == b.display().to_lowercase(),
    }
}

/// Format a signed difference with two decimals and thousands separators,
/// e.g. `1,234.50` or `-5.00`.
#[must_use]
pub fn format_difference(diff: f64) -> String {
    let rendered = format!("{:.2}", diff.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));

    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if diff < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_classification() {
        assert_eq!(FieldValue::from_raw("1200"), FieldValue::Number(1200.0));
        assert_eq!(FieldValue::from_raw(" 3.5 "), FieldValue::Number(3.5));
        assert_eq!(FieldValue::from_raw(""), FieldValue::Blank);
        assert_eq!(FieldValue::from_raw("   "), FieldValue::Blank);
        assert_eq!(
            FieldValue::from_raw("Central Air"),
            FieldValue::Text("Central Air".to_string())
        );
    }

    #[test]
    fn test_blank_detection() {
        assert!(FieldValue::Blank.is_blank());
        assert!(FieldValue::Text("   ".to_string()).is_blank());
        assert!(!FieldValue::Text("x".to_string()).is_blank());
        assert!(!FieldValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_coercion() {
        assert_eq!(FieldValue::Text(" 42 ".to_string()).as_number(), Some(42.0));
        assert_eq!(FieldValue::Text("abc".to_string()).as_number(), None);
        assert_eq!(FieldValue::Blank.as_number(), None);
    }

    #[test]
    fn test_join_key_canonicalization() {
        assert_eq!(
            FieldValue::Number(204_522.0).join_key().as_deref(),
            Some("204522")
        );
        assert_eq!(
            FieldValue::Text(" 204522 ".to_string()).join_key().as_deref(),
            Some("204522")
        );
        assert_eq!(FieldValue::Blank.join_key(), None);
        assert_eq!(FieldValue::Text("  ".to_string()).join_key(), None);
    }

    #[test]
    fn test_numbers_close() {
        assert!(numbers_close(10.0, 10.005, 0.01));
        assert!(!numbers_close(10.0, 10.02, 0.01));
        assert!(numbers_close(f64::NAN, f64::NAN, 0.01));
        assert!(!numbers_close(f64::NAN, 1.0, 0.01));
        // Relative epsilon absorbs float rounding on large magnitudes
        assert!(numbers_close(1e12, 1e12 + 0.5, 0.01));
    }

    #[test]
    fn test_values_equal_string_fallback() {
        let a = FieldValue::Text("Ranch".to_string());
        let b = FieldValue::Text(" ranch ".to_string());
        assert!(values_equal(&a, &b, 0.01));

        let c = FieldValue::Text("Colonial".to_string());
        assert!(!values_equal(&a, &c, 0.01));
    }

    #[test]
    fn test_format_difference() {
        assert_eq!(format_difference(150.0), "150.00");
        assert_eq!(format_difference(-5.0), "-5.00");
        assert_eq!(format_difference(1234.5), "1,234.50");
        assert_eq!(format_difference(-1_234_567.891), "-1,234,567.89");
        assert_eq!(format_difference(0.0), "0.00");
    }
}
