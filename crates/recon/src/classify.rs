//! Token-set tier classification.
//!
//! A diagnostic over the pools as they stand before the first pass: how many
//! single-copy entries would land in each confidence bucket if the lenient
//! token-set overlap were the only measure. Works on its own copy of the
//! ledger rows; the session is never touched.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::{debug, info};

use crate::matcher::{Prepared, Scorer, SetOverlapScorer};
use crate::model::{CatalogSlot, LedgerEntry, Score, Tier, TierReport};
use crate::normalize::Normalizer;

/// Scores at or below this never enter the classification.
const TIER_FLOOR: f64 = 80.0;

pub fn tier_report(
    single_copy: &[CatalogSlot],
    ledger: &BTreeMap<String, LedgerEntry>,
    normalizer: &mut Normalizer,
) -> TierReport {
    let scorer = SetOverlapScorer;
    let rows: Vec<(&str, Rc<str>)> = ledger
        .values()
        .map(|e| (e.accession_number.as_str(), normalizer.fold(&e.title)))
        .collect();
    let prepared: Vec<Prepared<'_>> = rows.iter().map(|(_, title)| Prepared::new(title)).collect();
    // Rows already taken by an exact classification.
    let mut used: BTreeSet<&str> = BTreeSet::new();

    let mut report = TierReport {
        evaluated: single_copy.len(),
        ..Default::default()
    };

    for slot in single_copy {
        let folded = normalizer.fold(&slot.entry.title);
        let entry = Prepared::new(&folded);

        let mut best = TIER_FLOOR;
        let mut leaders: Vec<&str> = Vec::new();
        for ((accession, _), title) in rows.iter().zip(&prepared) {
            if used.contains(accession) {
                continue;
            }
            let score = scorer.score_prepared(&entry, title);
            if score <= TIER_FLOOR {
                continue;
            }
            if score > best {
                best = score;
                leaders.clear();
                leaders.push(*accession);
            } else if score == best {
                leaders.push(*accession);
            }
        }

        match leaders.len() {
            0 => report.unmatched += 1,
            1 => match Tier::classify(best) {
                Tier::Exact => {
                    used.insert(leaders[0]);
                    report.exact += 1;
                }
                Tier::Top => report.top += 1,
                Tier::Good => report.good += 1,
                Tier::Acceptable => report.acceptable += 1,
                Tier::Below => report.unmatched += 1,
            },
            _ => {
                info!(
                    catalog_index = slot.index,
                    title = %slot.entry.title,
                    score = best,
                    accessions = ?leaders,
                    "ambiguous tier classification"
                );
                report.ambiguous += 1;
            }
        }
    }

    if report.evaluated > 0 {
        let top = (report.exact + report.top) as f64;
        report.top_rate = Score::new(100.0 * top / report.evaluated as f64);
    }

    debug!(
        evaluated = report.evaluated,
        exact = report.exact,
        top = report.top,
        good = report.good,
        acceptable = report.acceptable,
        ambiguous = report.ambiguous,
        unmatched = report.unmatched,
        "tier classification"
    );
    report
}
