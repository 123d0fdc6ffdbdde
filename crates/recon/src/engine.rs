use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::catalog::{clear_accessions, normalize_titles, partition, Partition};
use crate::classify::tier_report;
use crate::config::{AcceptablePolicy, MatchConfig};
use crate::error::ReconError;
use crate::ledger::LedgerLoad;
use crate::matcher::{ExactScorer, Scorer, WeightedScorer};
use crate::model::{
    Candidate, CatalogEntry, PassTier, ReconMeta, ReconResult, ReconSummary,
    ScoredCandidate, TieKind, TieReport,
};
use crate::normalize::Normalizer;
use crate::session::{EntryCandidates, MatchSession};
use crate::summary::compute_summary;

/// Pre-loaded inputs for one run.
#[derive(Debug, Clone)]
pub struct ReconInput {
    pub catalog: Vec<CatalogEntry>,
    pub ledger: LedgerLoad,
}

/// Run all three passes. Returns matches, residual pools and diagnostics.
///
/// `normalizer` is the one that loaded the ledger, so its correction count
/// covers both inputs.
pub fn run(
    config: &MatchConfig,
    input: ReconInput,
    mut normalizer: Normalizer,
) -> Result<ReconResult, ReconError> {
    config.validate()?;
    input.ledger.ensure_usable()?;
    if input.catalog.is_empty() {
        return Err(ReconError::Validation("catalog is empty".into()));
    }

    let mut catalog = input.catalog;
    clear_accessions(&mut catalog);
    normalize_titles(&mut catalog, &mut normalizer);
    let catalog_entries = catalog.len();
    let Partition {
        single_copy,
        multi_copy,
    } = partition(catalog)?;

    let LedgerLoad {
        ledger,
        orphans,
        duplicates,
    } = input.ledger;
    let ledger_entries = ledger.len();

    if !orphans.is_empty() {
        warn!(count = orphans.len(), "ledger rows without accession number");
    }
    if !duplicates.is_empty() {
        warn!(count = duplicates.len(), "ledger rows with duplicate accession number");
    }
    info!(
        catalog_entries,
        single_copy = single_copy.len(),
        multi_copy = multi_copy.len(),
        ledger_entries,
        "starting reconciliation"
    );

    let tiers = config
        .diagnostics
        .tier_report
        .then(|| tier_report(&single_copy, &ledger, &mut normalizer));

    let mut session = MatchSession::new(single_copy, ledger, normalizer)
        .with_score_floor(config.thresholds.acceptable);
    pass_exact(&mut session)?;
    pass_high_confidence(
        &mut session,
        config.thresholds.high_confidence,
        config.passes.max_rounds,
    )?;
    pass_acceptable(
        &mut session,
        config.thresholds.acceptable,
        config.passes.acceptable_policy,
    )?;

    let parts = session.into_parts();
    let mut result = ReconResult {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            thresholds: config.thresholds.clone(),
            max_rounds: config.passes.max_rounds,
            acceptable_policy: config.passes.acceptable_policy,
        },
        summary: ReconSummary::default(),
        matches: parts.matched,
        unmatched_catalog: parts.unmatched,
        unmatched_ledger: parts.ledger.into_values().collect(),
        multi_copy,
        candidates: parts.candidates,
        ties: parts.ties,
        orphans,
        duplicates,
        passes: parts.passes,
        tier_report: tiers,
    };
    result.summary = compute_summary(&result, parts.corrections);

    let s = &result.summary;
    warn!(
        matched = s.matched,
        single_copy = s.single_copy,
        unmatched_catalog = s.unmatched_catalog,
        unmatched_ledger = s.unmatched_ledger,
        candidates = s.surfaced_candidates,
        ties = s.ties,
        "reconciliation finished"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// Pass 1: fold-equal titles only.
pub fn pass_exact(session: &mut MatchSession) -> Result<usize, ReconError> {
    let proposals = propose(session, &ExactScorer, 100.0, PassTier::Exact, None);
    let committed = commit_all(session, proposals, PassTier::Exact, None)?;
    session.finish_pass(PassTier::Exact, None, committed)?;
    Ok(committed)
}

/// Pass 2: repeat high-confidence rounds until one commits nothing.
///
/// Each round scores against the ledger as it stands after the previous
/// round, so a consumed row can resolve an earlier tie.
pub fn pass_high_confidence(
    session: &mut MatchSession,
    cutoff: f64,
    max_rounds: u32,
) -> Result<usize, ReconError> {
    let mut total = 0;
    for round in 1..=max_rounds {
        let proposals = propose(
            session,
            &WeightedScorer,
            cutoff,
            PassTier::HighConfidence,
            Some(round),
        );
        let committed = commit_all(session, proposals, PassTier::HighConfidence, Some(round))?;
        session.finish_pass(PassTier::HighConfidence, Some(round), committed)?;
        total += committed;
        if committed == 0 {
            break;
        }
    }
    Ok(total)
}

/// Pass 3: surface unambiguous acceptable candidates; commit them only under
/// [`AcceptablePolicy::Accept`].
pub fn pass_acceptable(
    session: &mut MatchSession,
    cutoff: f64,
    policy: AcceptablePolicy,
) -> Result<usize, ReconError> {
    let proposals = propose(session, &WeightedScorer, cutoff, PassTier::Acceptable, None);
    let accept = policy == AcceptablePolicy::Accept;

    let mut committed = 0;
    for p in proposals {
        info!(
            catalog_index = p.catalog_index,
            catalog_title = %p.catalog_title,
            accession = %p.candidate.accession_number,
            ledger_title = %p.candidate.ledger_title,
            score = p.candidate.score.value(),
            %policy,
            "acceptable candidate"
        );
        session.surface(Candidate {
            catalog_index: p.catalog_index,
            catalog_title: p.catalog_title,
            accession_number: p.candidate.accession_number.clone(),
            ledger_title: p.candidate.ledger_title,
            score: p.candidate.score,
            committed: accept,
        });
        if accept {
            session.commit(
                p.catalog_index,
                &p.candidate.accession_number,
                p.candidate.score,
                PassTier::Acceptable,
                None,
            )?;
            committed += 1;
        }
    }

    session.finish_pass(PassTier::Acceptable, None, committed)?;
    Ok(committed)
}

// ---------------------------------------------------------------------------
// Candidate collection
// ---------------------------------------------------------------------------

/// One unambiguous candidate for one catalog entry.
#[derive(Debug, Clone)]
struct Proposal {
    catalog_index: usize,
    catalog_title: String,
    candidate: ScoredCandidate,
}

/// Score every unmatched entry against every remaining ledger row.
///
/// Entries with more than one qualifying row are deferred and reported;
/// proposals that name the same accession number are deferred as well.
fn propose(
    session: &mut MatchSession,
    scorer: &dyn Scorer,
    cutoff: f64,
    pass: PassTier,
    round: Option<u32>,
) -> Vec<Proposal> {
    let mut proposals = Vec::new();
    let mut ties = Vec::new();

    for entry in session.score_unmatched(scorer, cutoff) {
        let EntryCandidates {
            catalog_index,
            catalog_title,
            candidates: mut qualifying,
        } = entry;

        match qualifying.len() {
            0 => {}
            1 => proposals.push(Proposal {
                catalog_index,
                catalog_title,
                candidate: qualifying.remove(0),
            }),
            _ => {
                info!(
                    %pass,
                    round = round.unwrap_or(0),
                    catalog_index,
                    title = %catalog_title,
                    candidates = qualifying.len(),
                    scorer = scorer.name(),
                    "tie, deferring"
                );
                for c in &qualifying {
                    info!(
                        accession = %c.accession_number,
                        ledger_title = %c.ledger_title,
                        score = c.score.value(),
                        "tied candidate"
                    );
                }
                ties.push(TieReport {
                    pass,
                    round,
                    kind: TieKind::AmbiguousCandidates,
                    catalog_index,
                    catalog_title,
                    candidates: qualifying,
                });
            }
        }
    }

    let proposals = drop_contended(proposals, pass, round, &mut ties);
    for tie in ties {
        session.record_tie(tie);
    }
    proposals
}

/// Defer every proposal whose accession number another entry also proposed.
fn drop_contended(
    proposals: Vec<Proposal>,
    pass: PassTier,
    round: Option<u32>,
    ties: &mut Vec<TieReport>,
) -> Vec<Proposal> {
    let mut demand: BTreeMap<&str, usize> = BTreeMap::new();
    for p in &proposals {
        *demand.entry(p.candidate.accession_number.as_str()).or_insert(0) += 1;
    }
    let contended: Vec<String> = demand
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(acc, _)| acc.to_string())
        .collect();

    if contended.is_empty() {
        return proposals;
    }

    let (deferred, kept): (Vec<_>, Vec<_>) = proposals
        .into_iter()
        .partition(|p| contended.contains(&p.candidate.accession_number));

    for p in deferred {
        info!(
            %pass,
            round = round.unwrap_or(0),
            catalog_index = p.catalog_index,
            title = %p.catalog_title,
            accession = %p.candidate.accession_number,
            score = p.candidate.score.value(),
            "accession proposed by several entries, deferring"
        );
        ties.push(TieReport {
            pass,
            round,
            kind: TieKind::ContendedAccession,
            catalog_index: p.catalog_index,
            catalog_title: p.catalog_title,
            candidates: vec![p.candidate],
        });
    }
    kept
}

fn commit_all(
    session: &mut MatchSession,
    proposals: Vec<Proposal>,
    tier: PassTier,
    round: Option<u32>,
) -> Result<usize, ReconError> {
    let n = proposals.len();
    for p in proposals {
        session.commit(
            p.catalog_index,
            &p.candidate.accession_number,
            p.candidate.score,
            tier,
            round,
        )?;
    }
    Ok(n)
}
