use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// Input absent or structurally wrong at the load boundary.
    Validation(String),
    /// A catalog element does not have the expected record shape.
    CatalogShape { index: usize, message: String },
    /// CSV framing error while reading the ledger.
    LedgerParse { line: u64, message: String },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad threshold, overlapping columns, etc.).
    ConfigValidation(String),
    /// Bookkeeping invariant violated. Indicates a defect, never bad data.
    Consistency(String),
    /// Output serialization refused (e.g. non-finite score).
    Serialize(String),
}

impl ReconError {
    /// Fatal defects must not be retried or downgraded by callers.
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::CatalogShape { index, message } => {
                write!(f, "catalog entry #{index}: {message}")
            }
            Self::LedgerParse { line, message } => {
                write!(f, "ledger line {line}: {message}")
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Consistency(msg) => write!(f, "internal consistency error: {msg}"),
            Self::Serialize(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
