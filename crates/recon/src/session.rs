//! Per-run matching state.
//!
//! A [`MatchSession`] owns both shrinking pools, the claimed map and the
//! normalizer. The only way an entry moves from `unmatched` to `matched` is
//! [`MatchSession::commit`], which updates every pool in one step.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use tracing::{debug, info};

use crate::error::ReconError;
use crate::matcher::{Prepared, Scorer};
use crate::model::{
    Candidate, CatalogSlot, LedgerEntry, Match, PassStats, PassTier, Score, ScoredCandidate,
    TieReport,
};
use crate::normalize::Normalizer;

pub struct MatchSession {
    unmatched: Vec<CatalogSlot>,
    ledger: BTreeMap<String, LedgerEntry>,
    /// Accession number -> catalog position it was attached to.
    claimed: BTreeMap<String, usize>,
    matched: Vec<Match>,
    candidates: Vec<Candidate>,
    ties: Vec<TieReport>,
    passes: Vec<PassStats>,
    single_copy_total: usize,
    original_keys: BTreeSet<String>,
    normalizer: Normalizer,
    /// Scorer name -> stored hits.
    shortlists: HashMap<&'static str, Shortlist>,
    score_floor: f64,
}

/// Hits at or above `floor` for each catalog position, against the ledger
/// as it stood when the entry was first scored.
struct Shortlist {
    floor: f64,
    by_entry: HashMap<usize, Vec<ScoredCandidate>>,
}

/// The qualifying rows of one unmatched entry.
#[derive(Debug, Clone)]
pub struct EntryCandidates {
    pub catalog_index: usize,
    pub catalog_title: String,
    pub candidates: Vec<ScoredCandidate>,
}

/// Everything a session accumulated, released once the passes are done.
pub struct SessionParts {
    pub unmatched: Vec<CatalogSlot>,
    pub ledger: BTreeMap<String, LedgerEntry>,
    pub matched: Vec<Match>,
    pub candidates: Vec<Candidate>,
    pub ties: Vec<TieReport>,
    pub passes: Vec<PassStats>,
    pub corrections: usize,
}

impl MatchSession {
    pub fn new(
        single_copy: Vec<CatalogSlot>,
        ledger: BTreeMap<String, LedgerEntry>,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            single_copy_total: single_copy.len(),
            original_keys: ledger.keys().cloned().collect(),
            unmatched: single_copy,
            ledger,
            claimed: BTreeMap::new(),
            matched: Vec::new(),
            candidates: Vec::new(),
            ties: Vec::new(),
            passes: Vec::new(),
            normalizer,
            shortlists: HashMap::new(),
            score_floor: f64::INFINITY,
        }
    }

    /// Store hits down to `floor` even when a pass asks for a higher cutoff,
    /// so later passes with lower cutoffs reuse them.
    pub fn with_score_floor(mut self, floor: f64) -> Self {
        self.score_floor = floor;
        self
    }

    pub fn unmatched(&self) -> &[CatalogSlot] {
        &self.unmatched
    }

    pub fn ledger(&self) -> &BTreeMap<String, LedgerEntry> {
        &self.ledger
    }

    pub fn claimed(&self) -> &BTreeMap<String, usize> {
        &self.claimed
    }

    pub fn matched(&self) -> &[Match] {
        &self.matched
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn ties(&self) -> &[TieReport] {
        &self.ties
    }

    pub fn passes(&self) -> &[PassStats] {
        &self.passes
    }

    pub fn normalizer_mut(&mut self) -> &mut Normalizer {
        &mut self.normalizer
    }

    /// Claim `accession_number` for the unmatched entry at catalog position
    /// `catalog_index`.
    ///
    /// Preconditions are checked before anything is touched, so a failed
    /// commit leaves the session unchanged.
    pub fn commit(
        &mut self,
        catalog_index: usize,
        accession_number: &str,
        score: Score,
        tier: PassTier,
        round: Option<u32>,
    ) -> Result<(), ReconError> {
        if let Some(owner) = self.claimed.get(accession_number) {
            return Err(ReconError::Consistency(format!(
                "accession {accession_number} already claimed by catalog entry #{owner}"
            )));
        }
        if !self.ledger.contains_key(accession_number) {
            return Err(ReconError::Consistency(format!(
                "accession {accession_number} is not in the ledger"
            )));
        }
        let pos = self
            .unmatched
            .iter()
            .position(|slot| slot.index == catalog_index)
            .ok_or_else(|| {
                ReconError::Consistency(format!(
                    "catalog entry #{catalog_index} is not unmatched"
                ))
            })?;

        let row = self
            .ledger
            .remove(accession_number)
            .ok_or_else(|| ReconError::Consistency(format!("accession {accession_number} vanished")))?;
        let mut slot = self.unmatched.remove(pos);
        slot.entry.accession_numbers = vec![row.accession_number.clone()];

        info!(
            %tier,
            accession = %row.accession_number,
            catalog_index,
            title = %slot.entry.title,
            score = score.value(),
            "matched"
        );

        self.claimed.insert(row.accession_number.clone(), catalog_index);
        self.matched.push(Match {
            accession_number: row.accession_number,
            catalog_index,
            entry: slot.entry,
            ledger_title: row.title,
            score,
            tier,
            round,
        });
        Ok(())
    }

    /// Rows scoring at least `cutoff` for every unmatched entry, restricted
    /// to the remaining ledger, in unmatched order.
    ///
    /// Titles are fixed after load and the ledger only shrinks, so each pair
    /// is scored once per scorer; later calls filter the stored hits. A cutoff
    /// below the stored floor rescores from scratch.
    pub fn score_unmatched(&mut self, scorer: &dyn Scorer, cutoff: f64) -> Vec<EntryCandidates> {
        let floor = cutoff.min(self.score_floor);
        let stale = self
            .shortlists
            .get(scorer.name())
            .map_or(true, |list| list.floor > floor);
        if stale {
            self.shortlists.insert(
                scorer.name(),
                Shortlist {
                    floor,
                    by_entry: HashMap::new(),
                },
            );
        }
        self.fill_shortlist(scorer);

        let Some(list) = self.shortlists.get(scorer.name()) else {
            return Vec::new();
        };
        self.unmatched
            .iter()
            .map(|slot| {
                let candidates = list
                    .by_entry
                    .get(&slot.index)
                    .map(|hits| {
                        hits.iter()
                            .filter(|c| {
                                c.score.value() >= cutoff
                                    && self.ledger.contains_key(&c.accession_number)
                            })
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                EntryCandidates {
                    catalog_index: slot.index,
                    catalog_title: slot.entry.title.clone(),
                    candidates,
                }
            })
            .collect()
    }

    /// Score the unmatched entries the shortlist has not seen yet.
    fn fill_shortlist(&mut self, scorer: &dyn Scorer) {
        let Some(list) = self.shortlists.get_mut(scorer.name()) else {
            return;
        };
        let pending: Vec<&CatalogSlot> = self
            .unmatched
            .iter()
            .filter(|slot| !list.by_entry.contains_key(&slot.index))
            .collect();
        if pending.is_empty() {
            return;
        }

        let normalizer = &mut self.normalizer;
        let rows: Vec<(&LedgerEntry, Rc<str>)> = self
            .ledger
            .values()
            .map(|row| (row, normalizer.fold(&row.title)))
            .collect();
        let prepared: Vec<Prepared<'_>> = rows.iter().map(|(_, folded)| Prepared::new(folded)).collect();

        let mut pairs = 0;
        for slot in pending {
            let folded = normalizer.fold(&slot.entry.title);
            let entry = Prepared::new(&folded);
            let hits = rows
                .iter()
                .zip(&prepared)
                .filter_map(|((row, _), title)| {
                    let score = scorer.score_prepared(&entry, title);
                    (score >= list.floor).then(|| ScoredCandidate {
                        accession_number: row.accession_number.clone(),
                        ledger_title: row.title.clone(),
                        score: Score::new(score),
                    })
                })
                .collect();
            pairs += rows.len();
            list.by_entry.insert(slot.index, hits);
        }
        debug!(scorer = scorer.name(), floor = list.floor, pairs, "scored new pairs");
    }

    pub fn record_tie(&mut self, tie: TieReport) {
        self.ties.push(tie);
    }

    pub fn surface(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
    }

    /// Check the invariants and snapshot pool sizes after a pass or round.
    pub fn finish_pass(
        &mut self,
        pass: PassTier,
        round: Option<u32>,
        committed: usize,
    ) -> Result<PassStats, ReconError> {
        self.check_invariants()?;
        let stats = PassStats {
            pass,
            round,
            committed,
            matched: self.matched.len(),
            unmatched_catalog: self.unmatched.len(),
            unmatched_ledger: self.ledger.len(),
            claimed: self.claimed.len(),
        };
        info!(
            %pass,
            round = round.unwrap_or(0),
            committed,
            matched = stats.matched,
            unmatched_catalog = stats.unmatched_catalog,
            unmatched_ledger = stats.unmatched_ledger,
            "pass finished"
        );
        self.passes.push(stats.clone());
        Ok(stats)
    }

    pub fn check_invariants(&self) -> Result<(), ReconError> {
        if self.matched.len() + self.unmatched.len() != self.single_copy_total {
            return Err(ReconError::Consistency(format!(
                "pool imbalance: {} matched + {} unmatched != {} single-copy entries",
                self.matched.len(),
                self.unmatched.len(),
                self.single_copy_total
            )));
        }
        if self.claimed.len() != self.matched.len() {
            return Err(ReconError::Consistency(format!(
                "{} claimed accession numbers for {} matches",
                self.claimed.len(),
                self.matched.len()
            )));
        }
        for accession in self.claimed.keys() {
            if !self.original_keys.contains(accession) {
                return Err(ReconError::Consistency(format!(
                    "claimed accession {accession} was never in the ledger"
                )));
            }
            if self.ledger.contains_key(accession) {
                return Err(ReconError::Consistency(format!(
                    "claimed accession {accession} is still in the ledger"
                )));
            }
        }
        if let Some(slot) = self.unmatched.iter().find(|s| !s.entry.accession_numbers.is_empty()) {
            return Err(ReconError::Consistency(format!(
                "unmatched catalog entry #{} carries {:?}",
                slot.index, slot.entry.accession_numbers
            )));
        }
        for m in &self.matched {
            if m.entry.accession_numbers.len() != 1
                || m.entry.accession_numbers[0] != m.accession_number
            {
                return Err(ReconError::Consistency(format!(
                    "catalog entry #{} carries {:?}, expected [{}]",
                    m.catalog_index, m.entry.accession_numbers, m.accession_number
                )));
            }
        }
        Ok(())
    }

    pub fn into_parts(self) -> SessionParts {
        SessionParts {
            unmatched: self.unmatched,
            ledger: self.ledger,
            matched: self.matched,
            candidates: self.candidates,
            ties: self.ties,
            passes: self.passes,
            corrections: self.normalizer.corrections(),
        }
    }
}
