use tracing::{debug, warn};

use crate::error::ReconError;
use crate::model::{CatalogEntry, CatalogSlot};
use crate::normalize::Normalizer;

/// Catalog entries split by copy count. Only single-copy entries are matched.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub single_copy: Vec<CatalogSlot>,
    pub multi_copy: Vec<CatalogSlot>,
}

/// Parse and shape-check the catalog document once, at the boundary.
///
/// The document must be a non-empty JSON array whose every element is a
/// catalog record with a `title` string and a `copies` array. Accession
/// numbers already present in the input (a previous run's artifact) are
/// dropped; every run assigns from scratch.
pub fn parse_catalog(json: &str) -> Result<Vec<CatalogEntry>, ReconError> {
    let doc: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ReconError::Validation(format!("catalog is not valid JSON: {e}")))?;

    let items = match doc {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(ReconError::Validation(format!(
                "catalog must be a JSON array, found {}",
                json_kind(&other)
            )))
        }
    };

    if items.is_empty() {
        return Err(ReconError::Validation("catalog is empty".into()));
    }

    let mut entries = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<CatalogEntry>(item).map_err(|e| ReconError::CatalogShape {
                index,
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    clear_accessions(&mut entries);
    Ok(entries)
}

/// Remove any accession numbers the entries arrived with. Returns how many
/// entries were stamped.
pub fn clear_accessions(entries: &mut [CatalogEntry]) -> usize {
    let mut stamped = 0;
    for entry in entries.iter_mut() {
        if !entry.accession_numbers.is_empty() {
            entry.accession_numbers.clear();
            stamped += 1;
        }
    }
    if stamped > 0 {
        warn!(entries = stamped, "catalog already carried accession numbers; discarding them");
    }
    stamped
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Canonicalize every catalog title in place.
pub fn normalize_titles(entries: &mut [CatalogEntry], normalizer: &mut Normalizer) {
    for entry in entries {
        entry.title = normalizer.normalize(&entry.title).text;
    }
}

/// Split entries into single-copy and multi-copy subsets, preserving input
/// positions.
pub fn partition(catalog: Vec<CatalogEntry>) -> Result<Partition, ReconError> {
    let total = catalog.len();
    let mut out = Partition::default();

    for (index, entry) in catalog.into_iter().enumerate() {
        let slot = CatalogSlot { index, entry };
        if slot.entry.copies.len() == 1 {
            out.single_copy.push(slot);
        } else {
            out.multi_copy.push(slot);
        }
    }

    if out.single_copy.len() + out.multi_copy.len() != total {
        return Err(ReconError::Consistency(format!(
            "partition lost entries: {} single + {} multi != {total}",
            out.single_copy.len(),
            out.multi_copy.len()
        )));
    }

    debug!(
        total,
        single_copy = out.single_copy.len(),
        multi_copy = out.multi_copy.len(),
        "catalog partitioned"
    );
    Ok(out)
}
