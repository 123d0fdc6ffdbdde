use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration. Every field has a default, so an empty TOML document
/// (or `MatchConfig::default()`) reproduces the stock matching behavior.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub passes: PassConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Accession values that mean "no number assigned yet".
    #[serde(default = "default_placeholders")]
    pub placeholders: Vec<String>,
    #[serde(default)]
    pub columns: LedgerColumns,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: default_delimiter(),
            placeholders: default_placeholders(),
            columns: LedgerColumns::default(),
        }
    }
}

/// Zero-based column positions in the ledger export
/// (`Sign,atur,Buchtitel,Verfasser,Zugang,...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerColumns {
    pub title: usize,
    pub author: usize,
    pub accession_number: usize,
}

impl Default for LedgerColumns {
    fn default() -> Self {
        Self {
            title: 2,
            author: 3,
            accession_number: 4,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_placeholders() -> Vec<String> {
    vec![String::new(), "?".into()]
}

// ---------------------------------------------------------------------------
// Thresholds + passes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
    #[serde(default = "default_acceptable")]
    pub acceptable: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high_confidence: default_high_confidence(),
            acceptable: default_acceptable(),
        }
    }
}

fn default_high_confidence() -> f64 {
    95.0
}

fn default_acceptable() -> f64 {
    80.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassConfig {
    /// Upper bound on high-confidence rounds.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default)]
    pub acceptable_policy: AcceptablePolicy,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            acceptable_policy: AcceptablePolicy::default(),
        }
    }
}

fn default_max_rounds() -> u32 {
    5
}

/// What the acceptable-confidence pass does with an unambiguous candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptablePolicy {
    /// Report the candidate for manual review; leave all pools untouched.
    #[default]
    Surface,
    /// Commit the candidate exactly like a high-confidence match.
    Accept,
}

impl std::fmt::Display for AcceptablePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Surface => write!(f, "surface"),
            Self::Accept => write!(f, "accept"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Compute the token-set tier classification before matching.
    #[serde(default)]
    pub tier_report: bool,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: MatchConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let t = &self.thresholds;
        for (name, value) in [("high_confidence", t.high_confidence), ("acceptable", t.acceptable)] {
            if !value.is_finite() || value <= 0.0 || value > 100.0 {
                return Err(ReconError::ConfigValidation(format!(
                    "thresholds.{name} must be within (0, 100], got {value}"
                )));
            }
        }
        if t.acceptable > t.high_confidence {
            return Err(ReconError::ConfigValidation(format!(
                "thresholds.acceptable ({}) must not exceed thresholds.high_confidence ({})",
                t.acceptable, t.high_confidence
            )));
        }

        if self.passes.max_rounds == 0 {
            return Err(ReconError::ConfigValidation(
                "passes.max_rounds must be at least 1".into(),
            ));
        }

        let c = self.ledger.columns;
        if c.title == c.author || c.title == c.accession_number || c.author == c.accession_number {
            return Err(ReconError::ConfigValidation(format!(
                "ledger columns must be distinct (title={}, author={}, accession_number={})",
                c.title, c.author, c.accession_number
            )));
        }

        if !self.ledger.delimiter.is_ascii() {
            return Err(ReconError::ConfigValidation(format!(
                "ledger.delimiter must be a single ASCII character, got {:?}",
                self.ledger.delimiter
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
