use serde::{Deserialize, Serialize};

/// Default absolute tolerance for numeric comparisons.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Comparison settings for one reconciliation run.
///
/// Threaded explicitly into the aligner and classifier; there is no ambient
/// configuration, so runs against different file pairs can execute
/// concurrently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconConfig {
    /// Absolute tolerance for numeric equality.
    pub tolerance: f64,
    /// Treat an exact zero on either side as "not meaningfully populated"
    /// and skip the comparison.
    pub skip_zeros: bool,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            skip_zeros: true,
        }
    }
}

/// Identifier column names, one per dataset. The MLS column is renamed to
/// the CAMA column name during alignment so both sides share one join key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdColumns {
    pub mls: String,
    pub cama: String,
}

impl Default for IdColumns {
    fn default() -> Self {
        Self {
            mls: "Parcel Number".to_string(),
            cama: "PARID".to_string(),
        }
    }
}

/// Contextual columns passed through from the joined row into findings and
/// result tables. These are not computed; absent columns simply render blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextColumns {
    pub listing_number: String,
    pub closed_date: String,
    pub salekey: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Default for ContextColumns {
    fn default() -> Self {
        Self {
            listing_number: "Listing #".to_string(),
            closed_date: "Closed Date".to_string(),
            salekey: "SALEKEY".to_string(),
            address: "Address".to_string(),
            city: "City".to_string(),
            state: "State or Province".to_string(),
            zip: "Postal Code".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_exports() {
        let ids = IdColumns::default();
        assert_eq!(ids.mls, "Parcel Number");
        assert_eq!(ids.cama, "PARID");

        let cfg = ReconConfig::default();
        assert!(cfg.skip_zeros);
        assert!((cfg.tolerance - 0.01).abs() < f64::EPSILON);
    }
}
