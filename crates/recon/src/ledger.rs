use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::error::ReconError;
use crate::model::{DuplicateRecord, LedgerEntry, OrphanRecord};
use crate::normalize::Normalizer;

/// The ledger split into usable, orphan and duplicate rows.
#[derive(Debug, Clone, Default)]
pub struct LedgerLoad {
    pub ledger: BTreeMap<String, LedgerEntry>,
    pub orphans: Vec<OrphanRecord>,
    pub duplicates: Vec<DuplicateRecord>,
}

impl LedgerLoad {
    /// Boundary check before matching: a ledger without a single usable
    /// accession number cannot be reconciled.
    pub fn ensure_usable(&self) -> Result<(), ReconError> {
        if self.ledger.is_empty() {
            return Err(ReconError::Validation(format!(
                "ledger has no rows with a usable accession number ({} orphan(s), {} duplicate(s))",
                self.orphans.len(),
                self.duplicates.len()
            )));
        }
        Ok(())
    }
}

/// Load ledger CSV text into a map keyed by accession number.
///
/// Ragged rows are tolerated; a missing cell reads as empty, which turns a
/// row without an accession column into an orphan.
///
/// The accession cell is trimmed before the placeholder and duplicate checks,
/// so `" ? "` is an orphan and `" 042"` collides with `"042"`.
pub fn load_ledger(
    csv_data: &str,
    config: &LedgerConfig,
    normalizer: &mut Normalizer,
) -> Result<LedgerLoad, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(config.has_header)
        .flexible(true)
        .delimiter(config.delimiter as u8)
        .from_reader(csv_data.as_bytes());

    let col = config.columns;
    let mut load = LedgerLoad::default();

    for record in reader.records() {
        let record = record.map_err(|e| ReconError::LedgerParse {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let title = normalizer.normalize(record.get(col.title).unwrap_or("")).text;
        let author = normalizer.normalize(record.get(col.author).unwrap_or("")).text;
        let accession_number = record.get(col.accession_number).unwrap_or("").trim().to_string();

        if config.placeholders.iter().any(|p| p == &accession_number) {
            debug!(line, accession = %accession_number, %title, "ignoring row without usable accession number");
            load.orphans.push(OrphanRecord {
                accession_number,
                title,
                author,
                line,
            });
            continue;
        }

        if let Some(kept) = load.ledger.get(&accession_number) {
            warn!(
                accession = %accession_number,
                kept_line = kept.line,
                kept_title = %kept.title,
                line,
                %title,
                "accession number appears more than once; keeping the first row"
            );
            load.duplicates.push(DuplicateRecord {
                kept_line: kept.line,
                accession_number,
                title,
                author,
                line,
            });
            continue;
        }

        load.ledger.insert(
            accession_number.clone(),
            LedgerEntry {
                accession_number,
                title,
                author,
                line,
            },
        );
    }

    Ok(load)
}
