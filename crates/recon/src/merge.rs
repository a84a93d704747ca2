use std::collections::HashSet;

use crate::error::ReconError;
use crate::model::{InventorySnapshot, MergeOutput, MergedItem, SalesAggregate};

/// Join inventory rows with sales by trimmed JAN. Every inventory row yields
/// exactly one item; quantities are never clamped. A row whose new quantity
/// does not fit in `i64` fails the merge instead of wrapping.
pub fn merge_inventory(
    snapshot: &InventorySnapshot,
    sales: &SalesAggregate,
) -> Result<MergeOutput, ReconError> {
    let mut seen_jans: HashSet<&str> = HashSet::new();
    let mut consumed: HashSet<&str> = HashSet::new();

    let items: Vec<MergedItem> = snapshot
        .rows
        .iter()
        .map(|row| {
            let jan = row.jan.trim();
            let sales_count = if jan.is_empty() {
                0
            } else {
                if !seen_jans.insert(jan) {
                    log::warn!("merge: JAN {jan} appears on more than one inventory row (row {})", row.row);
                }
                match sales.get(jan) {
                    Some(entry) if entry.single_unit_count > 0 => {
                        consumed.insert(entry.key.as_str());
                        i64::try_from(entry.single_unit_count).map_err(|_| overflow(row.row, jan))?
                    }
                    _ => 0,
                }
            };

            let updated_quantity = row
                .quantity
                .checked_sub(sales_count)
                .ok_or_else(|| overflow(row.row, jan))?;

            Ok(MergedItem {
                row: row.row,
                product_name: row.product_name.clone(),
                asin: row.asin.clone(),
                jan: jan.to_string(),
                quantity: row.quantity,
                sales_count,
                updated_quantity,
            })
        })
        .collect::<Result<_, ReconError>>()?;

    let unplaced: Vec<_> = sales
        .entries()
        .iter()
        .filter(|e| e.single_unit_count > 0 && !consumed.contains(e.key.as_str()))
        .cloned()
        .collect();

    for entry in &unplaced {
        log::warn!(
            "merge: {} single units for '{}' match no inventory row",
            entry.single_unit_count,
            entry.key
        );
    }

    let output = MergeOutput { items, unplaced };
    log::info!(
        "merge: {} inventory rows, {} to update, {} unplaced sales",
        output.items.len(),
        output.updates().len(),
        output.unplaced.len()
    );
    Ok(output)
}

fn overflow(row: u32, jan: &str) -> ReconError {
    ReconError::QuantityOverflow {
        row,
        jan: jan.to_string(),
    }
}
