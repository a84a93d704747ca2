use crate::config::InventoryLayout;
use crate::error::ReconError;
use crate::model::{ColumnGroup, InventorySnapshot, MergedItem, GROUP_WIDTH};

/// Pick the first candidate column group that is blank on every data row of
/// the snapshot. Rows that are not being updated still count: a group with
/// any history anywhere is never reused.
pub fn select_write_slot(
    snapshot: &InventorySnapshot,
    updates: &[&MergedItem],
    layout: &InventoryLayout,
) -> Result<ColumnGroup, ReconError> {
    if updates.is_empty() {
        return Err(ReconError::EmptyUpdateSet);
    }

    for group in layout.candidate_groups() {
        let start = group.offset.saturating_sub(snapshot.ledger_start);
        match snapshot
            .rows
            .iter()
            .find(|r| !r.ledger_span_is_blank(start, GROUP_WIDTH))
        {
            None => {
                log::info!("slot: column group at offset {} is free", group.offset);
                return Ok(group);
            }
            Some(blocker) => {
                log::debug!(
                    "slot: column group at offset {} holds entries (row {})",
                    group.offset,
                    blocker.row
                );
            }
        }
    }

    Err(ReconError::NoWriteSlot {
        offsets: layout.group_offsets.clone(),
        pending: updates
            .iter()
            .map(|u| format!("{} (row {})", u.identity_key(), u.row))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InventoryRow;

    fn layout() -> InventoryLayout {
        InventoryLayout::default()
    }

    fn inv(row: u32, ledger: &[&str]) -> InventoryRow {
        InventoryRow {
            row,
            product_name: String::new(),
            asin: String::new(),
            jan: format!("49{row}"),
            quantity: 10,
            ledger: ledger.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn snapshot(rows: Vec<InventoryRow>) -> InventorySnapshot {
        InventorySnapshot {
            header_row: 3,
            ledger_start: 7,
            rows,
        }
    }

    fn item(row: u32) -> MergedItem {
        MergedItem {
            row,
            product_name: String::new(),
            asin: String::new(),
            jan: format!("49{row}"),
            quantity: 10,
            sales_count: 1,
            updated_quantity: 9,
        }
    }

    fn filled(groups: usize) -> Vec<&'static str> {
        let mut cells = Vec::new();
        for _ in 0..groups {
            cells.extend(["2024-01-01", "10:00", "5", "Sato"]);
        }
        cells
    }

    #[test]
    fn empty_ledger_takes_first_group() {
        let snap = snapshot(vec![inv(4, &[]), inv(5, &[])]);
        let it = item(4);
        let group = select_write_slot(&snap, &[&it], &layout()).unwrap();
        assert_eq!(group.offset, 7);
    }

    #[test]
    fn entry_on_a_non_updated_row_blocks_the_group() {
        // Row 5 is not in the update set but already used group 7 and 11.
        let snap = snapshot(vec![inv(4, &[]), inv(5, &filled(2))]);
        let it = item(4);
        let group = select_write_slot(&snap, &[&it], &layout()).unwrap();
        assert_eq!(group.offset, 15);
    }

    #[test]
    fn whitespace_cells_count_as_blank() {
        let snap = snapshot(vec![inv(4, &["  ", "", "\t", " "])]);
        let it = item(4);
        assert_eq!(select_write_slot(&snap, &[&it], &layout()).unwrap().offset, 7);
    }

    #[test]
    fn single_cell_dirties_a_group() {
        let snap = snapshot(vec![inv(4, &["", "", "", "x"])]);
        let it = item(4);
        assert_eq!(select_write_slot(&snap, &[&it], &layout()).unwrap().offset, 11);
    }

    #[test]
    fn selection_is_deterministic_and_monotonic() {
        let it = item(4);
        let mut previous = 0;
        for used in 0..6 {
            let snap = snapshot(vec![inv(4, &filled(used))]);
            let a = select_write_slot(&snap, &[&it], &layout()).unwrap();
            let b = select_write_slot(&snap, &[&it], &layout()).unwrap();
            assert_eq!(a, b);
            assert!(a.offset > previous || used == 0);
            previous = a.offset;
        }
    }

    #[test]
    fn all_groups_dirty_is_an_error() {
        let snap = snapshot(vec![inv(4, &filled(6)), inv(5, &[])]);
        let a = item(4);
        let b = item(5);
        let err = select_write_slot(&snap, &[&a, &b], &layout()).unwrap_err();
        match &err {
            ReconError::NoWriteSlot { offsets, pending } => {
                assert_eq!(offsets.len(), 6);
                assert_eq!(pending, &vec!["494 (row 4)".to_string(), "495 (row 5)".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("no available write slot"));
    }

    #[test]
    fn empty_update_set_is_rejected() {
        let snap = snapshot(vec![inv(4, &[])]);
        assert!(matches!(
            select_write_slot(&snap, &[], &layout()),
            Err(ReconError::EmptyUpdateSet)
        ));
    }
}
