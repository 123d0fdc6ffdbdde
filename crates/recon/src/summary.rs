use std::collections::BTreeMap;

use crate::model::{ReconResult, ReconSummary, Score};

/// Compute summary statistics from a finished run.
pub fn compute_summary(result: &ReconResult, corrections: usize) -> ReconSummary {
    let mut matched_by_tier: BTreeMap<String, usize> = BTreeMap::new();
    for m in &result.matches {
        *matched_by_tier.entry(m.tier.to_string()).or_insert(0) += 1;
    }

    let matched = result.matches.len();
    let single_copy = matched + result.unmatched_catalog.len();
    let match_rate = if single_copy == 0 {
        0.0
    } else {
        100.0 * matched as f64 / single_copy as f64
    };

    ReconSummary {
        catalog_entries: single_copy + result.multi_copy.len(),
        single_copy,
        multi_copy: result.multi_copy.len(),
        ledger_entries: matched + result.unmatched_ledger.len(),
        orphans: result.orphans.len(),
        duplicates: result.duplicates.len(),
        matched,
        matched_by_tier,
        unmatched_catalog: result.unmatched_catalog.len(),
        unmatched_ledger: result.unmatched_ledger.len(),
        surfaced_candidates: result.candidates.len(),
        ties: result.ties.len(),
        corrections,
        match_rate: Score::new(match_rate),
    }
}
