//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Description                                         |
//! |------|-----------------------------------------------------|
//! | 0    | Success (ties and unmatched entries are not errors) |
//! | 2    | Usage error (bad arguments, output would clobber input) |
//! | 3    | Input rejected (catalog shape, ledger framing)      |
//! | 4    | Internal consistency violation                      |
//! | 5    | File I/O or output serialization failure            |
//! | 6    | Invalid configuration                               |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` or the relevant `CliError` constructor

use shelfmatch_recon::ReconError;

/// Success: the run completed and the artifact was written.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error: bad arguments, or an output path that names an input.
/// clap exits with the same code for malformed command lines.
pub const EXIT_USAGE: u8 = 2;

/// Catalog or ledger is empty, malformed or has the wrong shape.
pub const EXIT_INPUT: u8 = 3;

/// A bookkeeping invariant broke during matching. Always a defect.
pub const EXIT_CONSISTENCY: u8 = 4;

/// Cannot read an input, write an output, or serialize the result.
pub const EXIT_IO: u8 = 5;

/// Config file failed to parse or validate.
pub const EXIT_CONFIG: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::Validation(_)
        | ReconError::CatalogShape { .. }
        | ReconError::LedgerParse { .. } => EXIT_INPUT,
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG,
        ReconError::Consistency(_) => EXIT_CONSISTENCY,
        ReconError::Serialize(_) => EXIT_IO,
    }
}
