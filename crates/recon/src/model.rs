use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::config::AccumulationPolicy;

/// Width of one ledger column group: date, time, quantity, manager.
pub const GROUP_WIDTH: usize = 4;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One product master row, typed once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogRow {
    pub primary_code: String,
    pub secondary_code: String,
    pub asin: String,
    pub jan: String,
    pub lot_unit: u32,
    pub product_name: String,
}

/// One parsed line of the marketplace order export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub item_code: String,
    pub item_sku: String,
    pub quantity: u32,
    pub product_name: String,
    pub lot_override: Option<String>,
}

/// One data row of an inventory sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRow {
    /// 1-based row number on the sheet.
    pub row: u32,
    pub product_name: String,
    pub asin: String,
    pub jan: String,
    pub quantity: i64,
    /// Cells from the start of the ledger region to the end of the row.
    #[serde(skip)]
    pub ledger: Vec<String>,
}

impl InventoryRow {
    /// True when every cell of `[start, start + width)` in the ledger region is blank.
    /// Cells past the end of a ragged row count as blank.
    pub fn ledger_span_is_blank(&self, start: usize, width: usize) -> bool {
        self.ledger
            .iter()
            .skip(start)
            .take(width)
            .all(|cell| cell.trim().is_empty())
    }
}

/// Point-in-time read of one inventory sheet.
#[derive(Debug, Clone, Serialize)]
pub struct InventorySnapshot {
    pub header_row: u32,
    /// Offset (relative to the read range) where `InventoryRow::ledger` begins.
    pub ledger_start: usize,
    pub rows: Vec<InventoryRow>,
}

/// Everything one reconciliation run reads.
pub struct ReconInput {
    pub orders: Vec<OrderLine>,
    pub catalog: Vec<CatalogRow>,
    pub inventory: InventorySnapshot,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Which branch of the resolver decided an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPath {
    /// Single primary-code hit whose secondary code confirms the item code.
    PrimaryCode,
    /// Adopted through the SKU lookup on the secondary code.
    SecondaryCode,
    /// Two or more primary-code rows and no SKU confirmation.
    Ambiguous,
    /// Nothing in the catalog for either code.
    NotFound,
}

impl MatchPath {
    pub fn is_match(self) -> bool {
        matches!(self, Self::PrimaryCode | Self::SecondaryCode)
    }
}

impl std::fmt::Display for MatchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrimaryCode => write!(f, "primary_code"),
            Self::SecondaryCode => write!(f, "secondary_code"),
            Self::Ambiguous => write!(f, "ambiguous"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    pub asin: String,
    pub jan: String,
    pub product_name: String,
    pub lot_unit: u32,
    pub matched: bool,
    pub via: MatchPath,
    /// Lot unit came from the override table rather than the catalog.
    pub lot_override: bool,
}

impl ResolvedIdentity {
    /// Sales key: JAN, else ASIN, else product name.
    pub fn sales_key(&self) -> &str {
        [&self.jan, &self.asin, &self.product_name]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLine {
    pub line: OrderLine,
    pub identity: ResolvedIdentity,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesEntry {
    pub key: String,
    pub product_name: String,
    pub asin: String,
    pub jan: String,
    pub raw_count: u64,
    pub single_unit_count: u64,
    /// Order lines that collapsed into this key, including any whose counts were dropped.
    pub line_count: usize,
}

/// Sales totals keyed by resolved identity, in first-appearance order.
#[derive(Debug, Clone, Serialize)]
pub struct SalesAggregate {
    pub policy: AccumulationPolicy,
    entries: Vec<SalesEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SalesAggregate {
    pub fn new(policy: AccumulationPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SalesEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[SalesEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_single_units(&self) -> u64 {
        self.entries.iter().map(|e| e.single_unit_count).sum()
    }

    /// Insert a new entry, or return the existing one for its key.
    pub(crate) fn slot(&mut self, key: &str, fresh: impl FnOnce() -> SalesEntry) -> (&mut SalesEntry, bool) {
        match self.index.get(key) {
            Some(&i) => (&mut self.entries[i], false),
            None => {
                let i = self.entries.len();
                self.entries.push(fresh());
                self.index.insert(key.to_string(), i);
                (&mut self.entries[i], true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedItem {
    /// 1-based row number of the inventory row this item was merged from.
    pub row: u32,
    pub product_name: String,
    pub asin: String,
    pub jan: String,
    pub quantity: i64,
    pub sales_count: i64,
    /// `quantity - sales_count`; negative means oversold.
    pub updated_quantity: i64,
}

impl MergedItem {
    pub fn needs_update(&self) -> bool {
        self.sales_count > 0
    }

    /// Identity used in reports: JAN, else ASIN, else product name.
    pub fn identity_key(&self) -> &str {
        [&self.jan, &self.asin, &self.product_name]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutput {
    pub items: Vec<MergedItem>,
    /// Sales that found no inventory row by JAN.
    pub unplaced: Vec<SalesEntry>,
}

impl MergeOutput {
    pub fn updates(&self) -> Vec<&MergedItem> {
        self.items.iter().filter(|i| i.needs_update()).collect()
    }
}

// ---------------------------------------------------------------------------
// Write planning
// ---------------------------------------------------------------------------

/// A `GROUP_WIDTH`-wide span of ledger columns, identified by its starting offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnGroup {
    pub offset: usize,
}

impl ColumnGroup {
    pub fn last_offset(&self) -> usize {
        self.offset + GROUP_WIDTH - 1
    }
}

/// Operator-supplied parameters for one write-back.
#[derive(Debug, Clone, Serialize)]
pub struct WriteRequest {
    pub sheet_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub manager: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// What a write command updates, for failure reports and scoped retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteTarget {
    Header { row: u32 },
    Item { key: String, row: u32 },
}

impl std::fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header { row } => write!(f, "header (row {row})"),
            Self::Item { key, row } => write!(f, "{key} (row {row})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteCommand {
    pub target: WriteTarget,
    pub sheet_name: String,
    pub range: String,
    pub values: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteBatch {
    pub sheet_name: String,
    pub group: ColumnGroup,
    pub commands: Vec<WriteCommand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedWrite {
    pub target: WriteTarget,
    pub range: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub total: usize,
    pub succeeded: Vec<WriteTarget>,
    pub failed: Vec<FailedWrite>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub order_lines: usize,
    pub zero_quantity_lines: usize,
    pub matched_lines: usize,
    pub unmatched_lines: usize,
    pub ambiguous_lines: usize,
    pub sales_keys: usize,
    pub total_single_units: u64,
    pub inventory_rows: usize,
    pub rows_to_update: usize,
    pub oversold_rows: usize,
    pub unplaced_sales: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub policy: AccumulationPolicy,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub resolved: Vec<ResolvedLine>,
    pub sales: SalesAggregate,
    pub merge: MergeOutput,
}
