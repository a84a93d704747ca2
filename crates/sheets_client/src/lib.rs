//! Spreadsheet proxy client: reads catalog and inventory grids, writes ledger ranges.
//!
//! This crate is the single source of truth for the proxy wire contract.
//! No retries: a failed write is reported to the caller, which decides
//! whether to re-dispatch the failed subset.

mod client;

pub use client::{grid_from_json, SheetsClient, SheetsError};
