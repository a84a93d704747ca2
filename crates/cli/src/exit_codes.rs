//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage or precondition failure (nothing was written)  |
//! | 3    | Cannot read an input file or write an output file    |
//! | 4    | Malformed order CSV or grid file                     |
//! | 10   | Invalid engine config                                |
//! | 11   | No available write slot in the ledger                |
//! | 12   | Partial write: some ranges failed                    |
//! | 13   | Proxy API error (network or HTTP)                    |

use stockledger_recon::ReconError;
use stockledger_sheets::SheetsError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing write parameters, empty update set.
pub const EXIT_USAGE: u8 = 2;

/// File could not be read or written.
pub const EXIT_IO: u8 = 3;

/// Input file could not be parsed (CSV, JSON grid, out-of-range quantities).
pub const EXIT_PARSE: u8 = 4;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 10;

/// Every candidate column group already holds entries. Nothing was written.
pub const EXIT_NO_WRITE_SLOT: u8 = 11;

/// At least one range write failed; the rest were applied.
pub const EXIT_PARTIAL_WRITE: u8 = 12;

/// Proxy unreachable or returned an error.
pub const EXIT_API: u8 = 13;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        ReconError::MissingColumn { .. }
        | ReconError::OrderCsv(_)
        | ReconError::QuantityOverflow { .. } => EXIT_PARSE,
        ReconError::Precondition(_)
        | ReconError::EmptyUpdateSet
        | ReconError::RowNotInSnapshot { .. } => EXIT_USAGE,
        ReconError::NoWriteSlot { .. } => EXIT_NO_WRITE_SLOT,
    }
}

/// Map a proxy client error to its exit code.
pub fn sheets_exit_code(err: &SheetsError) -> u8 {
    match err {
        SheetsError::Network(_) | SheetsError::Http { .. } | SheetsError::Parse(_) => EXIT_API,
    }
}
