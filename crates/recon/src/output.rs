//! Output artifacts.

use serde::Serialize;

use crate::error::ReconError;
use crate::model::{CatalogEntry, ReconResult};

/// Every catalog entry in input order; matched entries carry their
/// accession number.
pub fn annotated_catalog(result: &ReconResult) -> Vec<CatalogEntry> {
    let mut slots: Vec<(usize, &CatalogEntry)> = result
        .matches
        .iter()
        .map(|m| (m.catalog_index, &m.entry))
        .chain(result.unmatched_catalog.iter().map(|s| (s.index, &s.entry)))
        .chain(result.multi_copy.iter().map(|s| (s.index, &s.entry)))
        .collect();
    slots.sort_by_key(|(index, _)| *index);
    slots.into_iter().map(|(_, entry)| entry.clone()).collect()
}

/// Pretty JSON with object keys sorted and non-ASCII text left literal.
///
/// Values pass through `serde_json::Value`, whose map type orders keys, so
/// struct field order never leaks into the document.
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ReconError> {
    let tree = serde_json::to_value(value).map_err(|e| ReconError::Serialize(e.to_string()))?;
    let mut out =
        serde_json::to_string_pretty(&tree).map_err(|e| ReconError::Serialize(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Score;

    #[derive(Serialize)]
    struct Unordered {
        zeta: u8,
        alpha: &'static str,
    }

    #[test]
    fn keys_are_sorted() {
        let json = to_canonical_json(&Unordered { zeta: 1, alpha: "a" }).unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn non_ascii_is_literal() {
        let json = to_canonical_json(&vec![CatalogEntry::new("Die große Flut", 1)]).unwrap();
        assert!(json.contains("Die große Flut"));
        assert!(!json.contains("\\u"));
    }

    #[test]
    fn non_finite_score_fails() {
        let err = to_canonical_json(&vec![Score::new(f64::NAN)]).unwrap_err();
        assert!(matches!(err, ReconError::Serialize(_)));
    }
}
