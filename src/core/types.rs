use serde::{Deserialize, Serialize};

/// Which dataset a value or column came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Mls,
    Cama,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mls => write!(f, "MLS"),
            Self::Cama => write!(f, "CAMA"),
        }
    }
}

/// Which side(s) of the join a row originated from.
///
/// Exactly one tag per joined row, a deterministic function of where the
/// identifier value was present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Identifier present only in the MLS export.
    MlsOnly,
    /// Identifier present only in the CAMA export.
    CamaOnly,
    /// Identifier present in both exports.
    Both,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MlsOnly => write!(f, "MLS only"),
            Self::CamaOnly => write!(f, "CAMA only"),
            Self::Both => write!(f, "both"),
        }
    }
}
