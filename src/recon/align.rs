use std::collections::{HashMap, HashSet};

use crate::core::table::Dataset;
use crate::core::types::{Provenance, Side};
use crate::core::value::FieldValue;
use crate::recon::ReconError;

/// One identifier value aligned across both datasets: the union of fields
/// from both sides plus a provenance tag.
#[derive(Debug, Clone)]
pub struct JoinedRow {
    /// The identifier as displayed in result tables.
    pub parcel_id: String,
    pub provenance: Provenance,
    values: HashMap<String, FieldValue>,
}

impl JoinedRow {
    /// Value of a named field, if the owning dataset had that column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column)
    }

    /// Display rendering of a field; absent columns render blank.
    #[must_use]
    pub fn display(&self, column: &str) -> String {
        self.values.get(column).map(FieldValue::display).unwrap_or_default()
    }
}

/// Full outer join of the two datasets, keyed on their identifier columns.
///
/// The MLS identifier column is renamed to the CAMA identifier column name,
/// so every joined row carries the key under one name. Identifier values are
/// canonicalized before matching (see [`FieldValue::join_key`]); blank
/// identifiers never join. Column names shared by both datasets (other than
/// the identifiers) are disambiguated as `<name>_MLS` / `<name>_CAMA` on
/// every joined row.
///
/// Output order is deterministic: MLS rows in input order (each with its
/// CAMA matches in CAMA input order; duplicate keys produce one row per
/// pairing), then unmatched CAMA rows in input order.
///
/// # Errors
///
/// Returns [`ReconError::MissingIdColumn`] if either identifier column is
/// absent from its dataset.
pub fn align(
    mls: &Dataset,
    cama: &Dataset,
    id_mls: &str,
    id_cama: &str,
) -> Result<Vec<JoinedRow>, ReconError> {
    if !mls.has_column(id_mls) {
        return Err(ReconError::MissingIdColumn {
            side: Side::Mls,
            column: id_mls.to_string(),
        });
    }
    if !cama.has_column(id_cama) {
        return Err(ReconError::MissingIdColumn {
            side: Side::Cama,
            column: id_cama.to_string(),
        });
    }

    // Non-key columns present on both sides get suffixed on every joined row,
    // so a rule author can always address either underlying column.
    let shared: HashSet<&str> = mls
        .columns()
        .iter()
        .filter(|c| c.as_str() != id_mls && c.as_str() != id_cama)
        .filter(|c| cama.has_column(c))
        .map(String::as_str)
        .collect();

    let mut cama_by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for idx in 0..cama.len() {
        if let Some(key) = cama.value(idx, id_cama).and_then(FieldValue::join_key) {
            cama_by_key.entry(key).or_default().push(idx);
        }
    }

    let mut joined = Vec::new();
    let mut cama_matched = vec![false; cama.len()];

    for mls_idx in 0..mls.len() {
        let id_value = mls.value(mls_idx, id_mls).cloned().unwrap_or(FieldValue::Blank);
        let key = id_value.join_key();

        let matches = key.as_ref().and_then(|k| cama_by_key.get(k));
        match matches {
            Some(cama_rows) => {
                for &cama_idx in cama_rows {
                    cama_matched[cama_idx] = true;
                    let mut values = HashMap::new();
                    insert_side(&mut values, mls, mls_idx, id_mls, id_cama, Side::Mls, &shared);
                    insert_side(&mut values, cama, cama_idx, id_mls, id_cama, Side::Cama, &shared);
                    values.insert(id_cama.to_string(), id_value.clone());
                    joined.push(JoinedRow {
                        parcel_id: id_value.display(),
                        provenance: Provenance::Both,
                        values,
                    });
                }
            }
            None => {
                let mut values = HashMap::new();
                insert_side(&mut values, mls, mls_idx, id_mls, id_cama, Side::Mls, &shared);
                values.insert(id_cama.to_string(), id_value.clone());
                joined.push(JoinedRow {
                    parcel_id: id_value.display(),
                    provenance: Provenance::MlsOnly,
                    values,
                });
            }
        }
    }

    for cama_idx in 0..cama.len() {
        if cama_matched[cama_idx] {
            continue;
        }
        let id_value = cama.value(cama_idx, id_cama).cloned().unwrap_or(FieldValue::Blank);
        let mut values = HashMap::new();
        insert_side(&mut values, cama, cama_idx, id_mls, id_cama, Side::Cama, &shared);
        values.insert(id_cama.to_string(), id_value.clone());
        joined.push(JoinedRow {
            parcel_id: id_value.display(),
            provenance: Provenance::CamaOnly,
            values,
        });
    }

    Ok(joined)
}

fn insert_side(
    values: &mut HashMap<String, FieldValue>,
    dataset: &Dataset,
    row: usize,
    id_mls: &str,
    id_cama: &str,
    side: Side,
    shared: &HashSet<&str>,
) {
    for column in dataset.columns() {
        // Identifier columns are carried separately under the CAMA name.
        if column == id_mls || column == id_cama {
            continue;
        }
        let Some(value) = dataset.value(row, column) else {
            continue;
        };
        let name = if shared.contains(column.as_str()) {
            format!("{column}_{side}")
        } else {
            column.clone()
        };
        values.insert(name, value.clone());
    }
}
