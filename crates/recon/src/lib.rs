//! `stockledger-recon`: order-to-inventory reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded grids and order lines, returns
//! merged quantities and a write batch for an append-only sheet ledger.
//! No CLI or network dependencies; writes go through [`SheetWriter`].

pub mod a1;
pub mod aggregate;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod merge;
pub mod model;
pub mod resolver;
pub mod slot;
pub mod summary;

pub use config::{AccumulationPolicy, ReconConfig};
pub use dispatch::{dispatch_batch, SheetWriter};
pub use engine::{load_order_csv, plan_write, reconcile};
pub use error::ReconError;
pub use ingest::{catalog_from_grid, inventory_from_grid};
pub use model::{
    CellValue, DispatchReport, InventorySnapshot, OrderLine, ReconInput, Reconciliation,
    WriteBatch, WriteRequest,
};
