//! Conversion of raw sheet grids into typed rows.
//!
//! This is the only place that reads cells by offset. Every parse defect is
//! recovered here (quantity -> 0, lot unit -> 1) so downstream stages never
//! see a raw cell.

use crate::config::{CatalogSchema, InventoryLayout};
use crate::model::{CatalogRow, InventoryRow, InventorySnapshot};

fn cell(row: &[String], offset: usize) -> String {
    row.get(offset).map(|c| c.trim().to_string()).unwrap_or_default()
}

/// Largest magnitude a count cell may hold; anything beyond is a defect.
pub const MAX_COUNT: i64 = 1_000_000_000_000;

/// Parse an integer cell, ignoring thousands separators and trailing text.
///
/// Accepts an optional sign followed by digits (`"1,250"`, `"-3"`, `"12個"`).
/// Returns `None` when no leading digits are present or the magnitude exceeds
/// [`MAX_COUNT`].
pub fn parse_count(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '，')
        .collect();

    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value: i64 = digits[..end].parse().ok()?;
    if value > MAX_COUNT {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Lot unit cell: non-negative integer, 1 when absent or unparsable.
pub fn parse_lot_unit(raw: &str) -> u32 {
    parse_count(raw)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(1)
}

/// Build catalog rows from the product master grid, skipping the label rows.
pub fn catalog_from_grid(grid: &[Vec<String>], schema: &CatalogSchema) -> Vec<CatalogRow> {
    let rows: Vec<CatalogRow> = grid
        .iter()
        .skip(schema.header_rows)
        .map(|raw| CatalogRow {
            primary_code: cell(raw, schema.primary_code),
            secondary_code: cell(raw, schema.secondary_code),
            asin: cell(raw, schema.asin),
            jan: cell(raw, schema.jan),
            lot_unit: parse_lot_unit(&cell(raw, schema.lot_unit)),
            product_name: cell(raw, schema.product_name),
        })
        .collect();

    log::debug!("catalog: {} rows ingested", rows.len());
    rows
}

/// Build an inventory snapshot. `grid[0]` is the header row at `layout.header_row`.
pub fn inventory_from_grid(grid: &[Vec<String>], layout: &InventoryLayout) -> InventorySnapshot {
    let ledger_start = layout.ledger_start();

    let rows: Vec<InventoryRow> = grid
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, raw)| InventoryRow {
            row: layout.header_row + i as u32,
            product_name: cell(raw, layout.product_name),
            asin: cell(raw, layout.asin),
            jan: cell(raw, layout.jan),
            quantity: parse_count(&cell(raw, layout.quantity)).unwrap_or(0),
            ledger: raw.iter().skip(ledger_start).cloned().collect(),
        })
        .collect();

    log::debug!("inventory: {} data rows below header row {}", rows.len(), layout.header_row);

    InventorySnapshot {
        header_row: layout.header_row,
        ledger_start,
        rows,
    }
}
