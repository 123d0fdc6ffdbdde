//! `shelfmatch-recon`: book collection reconciliation engine.
//!
//! Pure engine crate: receives pre-read catalog JSON and ledger CSV text,
//! returns accession number assignments plus residual pools.
//! No CLI or IO dependencies.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod output;
pub mod session;
pub mod summary;

pub use catalog::parse_catalog;
pub use config::{AcceptablePolicy, MatchConfig};
pub use engine::{run, ReconInput};
pub use error::ReconError;
pub use ledger::{load_ledger, LedgerLoad};
pub use model::{CatalogEntry, ReconResult};
pub use normalize::Normalizer;
pub use output::{annotated_catalog, to_canonical_json};
