use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::config::{AcceptablePolicy, ThresholdConfig};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One physical copy as listed by the external catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    /// Scraped fields this crate does not interpret, carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One bibliographic record from the external catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub copies: Vec<CopyRecord>,
    /// Empty until matched; exactly one element afterwards.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accession_numbers: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, copies: usize) -> Self {
        Self {
            title: title.into(),
            copies: vec![CopyRecord::default(); copies],
            accession_numbers: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// A catalog entry together with its position in the input document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSlot {
    pub index: usize,
    pub entry: CatalogEntry,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A ledger row with a usable accession number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub accession_number: String,
    pub title: String,
    pub author: String,
    pub line: u64,
}

/// A ledger row without a usable accession number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanRecord {
    pub accession_number: String,
    pub title: String,
    pub author: String,
    pub line: u64,
}

/// A ledger row whose accession number was already taken by an earlier row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRecord {
    pub accession_number: String,
    pub title: String,
    pub author: String,
    pub line: u64,
    /// Line of the row that kept the accession number.
    pub kept_line: u64,
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Similarity score in `[0, 100]`.
///
/// Serialization refuses NaN and infinities instead of letting them degrade
/// into `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Score(f64);

impl Score {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.0.is_finite() {
            return Err(serde::ser::Error::custom(format!(
                "refusing to serialize non-finite score {}",
                self.0
            )));
        }
        serializer.serialize_f64((self.0 * 100.0).round() / 100.0)
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassTier {
    Exact,
    HighConfidence,
    Acceptable,
}

impl std::fmt::Display for PassTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::HighConfidence => write!(f, "high_confidence"),
            Self::Acceptable => write!(f, "acceptable"),
        }
    }
}

/// A committed pairing of one accession number with one catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub accession_number: String,
    pub catalog_index: usize,
    /// The entry, already stamped with `accession_number`.
    pub entry: CatalogEntry,
    pub ledger_title: String,
    pub score: Score,
    pub tier: PassTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
}

/// A scored ledger row considered for one catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub accession_number: String,
    pub ledger_title: String,
    pub score: Score,
}

/// An acceptable-tier pairing surfaced for manual review.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub catalog_index: usize,
    pub catalog_title: String,
    pub accession_number: String,
    pub ledger_title: String,
    pub score: Score,
    /// Whether the active policy committed it.
    pub committed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieKind {
    /// One catalog entry, several qualifying ledger rows.
    AmbiguousCandidates,
    /// One ledger row, proposed by several catalog entries.
    ContendedAccession,
}

/// A decision the engine deferred instead of guessing.
#[derive(Debug, Clone, Serialize)]
pub struct TieReport {
    pub pass: PassTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    pub kind: TieKind,
    pub catalog_index: usize,
    pub catalog_title: String,
    pub candidates: Vec<ScoredCandidate>,
}

/// Pool sizes recorded after a pass (or a high-confidence round).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub pass: PassTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    pub committed: usize,
    pub matched: usize,
    pub unmatched_catalog: usize,
    pub unmatched_ledger: usize,
    pub claimed: usize,
}

// ---------------------------------------------------------------------------
// Tier classification
// ---------------------------------------------------------------------------

/// Confidence bucket for a token-set score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Exact,
    Top,
    Good,
    Acceptable,
    Below,
}

impl Tier {
    pub fn classify(score: f64) -> Self {
        if score >= 100.0 {
            Self::Exact
        } else if score > 99.0 {
            Self::Top
        } else if score >= 90.0 {
            Self::Good
        } else if score >= 80.0 {
            Self::Acceptable
        } else {
            Self::Below
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TierReport {
    pub evaluated: usize,
    pub exact: usize,
    pub top: usize,
    pub good: usize,
    pub acceptable: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    /// Percent of evaluated entries landing in exact or top.
    pub top_rate: Score,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub catalog_entries: usize,
    pub single_copy: usize,
    pub multi_copy: usize,
    pub ledger_entries: usize,
    pub orphans: usize,
    pub duplicates: usize,
    pub matched: usize,
    pub matched_by_tier: BTreeMap<String, usize>,
    pub unmatched_catalog: usize,
    pub unmatched_ledger: usize,
    pub surfaced_candidates: usize,
    pub ties: usize,
    pub corrections: usize,
    /// Percent of single-copy entries matched.
    pub match_rate: Score,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub run_at: String,
    pub thresholds: ThresholdConfig,
    pub max_rounds: u32,
    pub acceptable_policy: AcceptablePolicy,
}

/// Everything a run produces: matches, residual pools and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub matches: Vec<Match>,
    pub unmatched_catalog: Vec<CatalogSlot>,
    pub unmatched_ledger: Vec<LedgerEntry>,
    pub multi_copy: Vec<CatalogSlot>,
    pub candidates: Vec<Candidate>,
    pub ties: Vec<TieReport>,
    pub orphans: Vec<OrphanRecord>,
    pub duplicates: Vec<DuplicateRecord>,
    pub passes: Vec<PassStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_report: Option<TierReport>,
}
