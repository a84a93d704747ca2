use chrono::{NaiveDate, NaiveTime};

use crate::a1::qualify_range;
use crate::config::InventoryLayout;
use crate::error::ReconError;
use crate::model::{
    CellValue, ColumnGroup, DispatchReport, InventorySnapshot, MergedItem, WriteBatch,
    WriteCommand, WriteRequest, WriteTarget, GROUP_WIDTH,
};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

impl WriteRequest {
    /// Validate operator input before anything touches the network.
    ///
    /// `staff` is the accepted manager list; when empty any non-blank name passes.
    pub fn new(
        sheet_name: &str,
        date: &str,
        time: &str,
        manager: &str,
        staff: &[String],
    ) -> Result<Self, ReconError> {
        let sheet_name = required(sheet_name, "sheet name")?;
        let date_raw = required(date, "date")?;
        let time_raw = required(time, "time")?;
        let manager = required(manager, "manager")?;

        let date = DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(date_raw, f).ok())
            .ok_or_else(|| {
                ReconError::Precondition(format!("date '{date_raw}' is not YYYY-MM-DD"))
            })?;
        let time = TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(time_raw, f).ok())
            .ok_or_else(|| ReconError::Precondition(format!("time '{time_raw}' is not HH:MM")))?;

        if !staff.is_empty() && !staff.iter().any(|s| s == manager) {
            return Err(ReconError::Precondition(format!(
                "manager '{manager}' is not on the staff list"
            )));
        }

        Ok(Self {
            sheet_name: sheet_name.to_string(),
            date,
            time,
            manager: manager.to_string(),
        })
    }

    pub fn date_text(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn time_text(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, ReconError> {
    let v = value.trim();
    if v.is_empty() {
        Err(ReconError::Precondition(format!("{what} is required")))
    } else {
        Ok(v)
    }
}

/// Build the header marker plus one four-cell row write per update.
///
/// Row numbers come from the merged items, and each item is checked against
/// the snapshot so a stale or reordered update set fails instead of writing
/// to the wrong row.
pub fn build_write_batch(
    request: &WriteRequest,
    group: ColumnGroup,
    updates: &[&MergedItem],
    snapshot: &InventorySnapshot,
    layout: &InventoryLayout,
) -> Result<WriteBatch, ReconError> {
    if updates.is_empty() {
        return Err(ReconError::EmptyUpdateSet);
    }

    let first = layout.column_letters(group.offset)?;
    let last = layout.column_letters(group.offset + GROUP_WIDTH - 1)?;
    let date = request.date_text();
    let time = request.time_text();
    let sheet = &request.sheet_name;

    let mut commands = Vec::with_capacity(updates.len() + 1);
    commands.push(WriteCommand {
        target: WriteTarget::Header {
            row: snapshot.header_row,
        },
        sheet_name: sheet.clone(),
        range: qualify_range(sheet, &format!("{first}{}", snapshot.header_row)),
        values: vec![vec![CellValue::Text(date.clone())]],
    });

    for item in updates {
        let present = snapshot
            .rows
            .iter()
            .any(|r| r.row == item.row && r.jan.trim() == item.jan);
        if !present {
            return Err(ReconError::RowNotInSnapshot {
                row: item.row,
                jan: item.jan.clone(),
            });
        }

        commands.push(WriteCommand {
            target: WriteTarget::Item {
                key: item.identity_key().to_string(),
                row: item.row,
            },
            sheet_name: sheet.clone(),
            range: qualify_range(sheet, &format!("{first}{row}:{last}{row}", row = item.row)),
            values: vec![vec![
                CellValue::Text(date.clone()),
                CellValue::Text(time.clone()),
                CellValue::Int(item.updated_quantity),
                CellValue::Text(request.manager.clone()),
            ]],
        });
    }

    log::info!(
        "batch: {} commands for '{}' in columns {first}:{last}",
        commands.len(),
        sheet
    );

    Ok(WriteBatch {
        sheet_name: sheet.clone(),
        group,
        commands,
    })
}

impl WriteBatch {
    /// The subset of this batch whose targets failed in `report`, for a scoped retry.
    pub fn retain_failed(&self, report: &DispatchReport) -> WriteBatch {
        let commands = self
            .commands
            .iter()
            .filter(|c| report.failed.iter().any(|f| f.target == c.target))
            .cloned()
            .collect();
        WriteBatch {
            sheet_name: self.sheet_name.clone(),
            group: self.group,
            commands,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FailedWrite, InventoryRow};

    fn request() -> WriteRequest {
        WriteRequest::new("Stock_A", "2024/03/09", "09:05", "Sato", &[]).unwrap()
    }

    fn inv(row: u32, jan: &str) -> InventoryRow {
        InventoryRow {
            row,
            product_name: String::new(),
            asin: String::new(),
            jan: jan.into(),
            quantity: 10,
            ledger: Vec::new(),
        }
    }

    fn item(row: u32, jan: &str, updated: i64) -> MergedItem {
        MergedItem {
            row,
            product_name: String::new(),
            asin: String::new(),
            jan: jan.into(),
            quantity: 10,
            sales_count: 10 - updated,
            updated_quantity: updated,
        }
    }

    fn snapshot() -> InventorySnapshot {
        InventorySnapshot {
            header_row: 3,
            ledger_start: 7,
            rows: vec![inv(4, "4901"), inv(5, "4902"), inv(6, "4903")],
        }
    }

    #[test]
    fn header_and_rows_use_group_columns() {
        let a = item(4, "4901", 7);
        let c = item(6, "4903", -2);
        let batch = build_write_batch(
            &request(),
            ColumnGroup { offset: 11 },
            &[&a, &c],
            &snapshot(),
            &InventoryLayout::default(),
        )
        .unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.commands[0].range, "Stock_A!N3");
        assert_eq!(
            batch.commands[0].values,
            vec![vec![CellValue::Text("2024-03-09".into())]]
        );
        assert_eq!(batch.commands[1].range, "Stock_A!N4:Q4");
        assert_eq!(
            batch.commands[1].values[0],
            vec![
                CellValue::Text("2024-03-09".into()),
                CellValue::Text("09:05".into()),
                CellValue::Int(7),
                CellValue::Text("Sato".into()),
            ]
        );
        // Row 6, not the item's position in the update list.
        assert_eq!(batch.commands[2].range, "Stock_A!N6:Q6");
        assert_eq!(batch.commands[2].values[0][2], CellValue::Int(-2));
    }

    #[test]
    fn stale_row_is_rejected() {
        let moved = item(5, "4901", 1);
        let err = build_write_batch(
            &request(),
            ColumnGroup { offset: 7 },
            &[&moved],
            &snapshot(),
            &InventoryLayout::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::RowNotInSnapshot { row: 5, .. }));
    }

    #[test]
    fn sheet_names_with_spaces_are_quoted() {
        let req = WriteRequest::new("在庫 A", "2024-03-09", "09:05:30", "Sato", &[]).unwrap();
        let a = item(4, "4901", 7);
        let batch = build_write_batch(
            &req,
            ColumnGroup { offset: 7 },
            &[&a],
            &snapshot(),
            &InventoryLayout::default(),
        )
        .unwrap();
        assert_eq!(batch.commands[0].range, "'在庫 A'!J3");
        assert_eq!(batch.commands[1].range, "'在庫 A'!J4:M4");
        assert_eq!(batch.commands[1].values[0][1], CellValue::Text("09:05".into()));
    }

    #[test]
    fn request_preconditions() {
        let staff = vec!["Sato".to_string(), "Suzuki".to_string()];
        assert!(WriteRequest::new("", "2024-03-09", "09:00", "Sato", &staff).is_err());
        assert!(WriteRequest::new("S", " ", "09:00", "Sato", &staff).is_err());
        assert!(WriteRequest::new("S", "2024-03-09", "", "Sato", &staff).is_err());
        assert!(WriteRequest::new("S", "2024-03-09", "09:00", "", &staff).is_err());
        assert!(WriteRequest::new("S", "09/03/2024", "09:00", "Sato", &staff).is_err());
        assert!(WriteRequest::new("S", "2024-03-09", "9am", "Sato", &staff).is_err());

        let err = WriteRequest::new("S", "2024-03-09", "09:00", "Tanaka", &staff).unwrap_err();
        assert!(err.to_string().contains("not on the staff list"));
        assert!(WriteRequest::new("S", "2024-03-09", "09:00", "Suzuki", &staff).is_ok());
    }

    #[test]
    fn retain_failed_keeps_only_failed_targets() {
        let a = item(4, "4901", 7);
        let b = item(5, "4902", 3);
        let batch = build_write_batch(
            &request(),
            ColumnGroup { offset: 7 },
            &[&a, &b],
            &snapshot(),
            &InventoryLayout::default(),
        )
        .unwrap();
        let failed_target = batch.commands[2].target.clone();
        let report = DispatchReport {
            total: 3,
            succeeded: vec![batch.commands[0].target.clone(), batch.commands[1].target.clone()],
            failed: vec![FailedWrite {
                target: failed_target.clone(),
                range: batch.commands[2].range.clone(),
                error: "503".into(),
            }],
        };
        let retry = batch.retain_failed(&report);
        assert_eq!(retry.len(), 1);
        assert_eq!(retry.commands[0].target, failed_target);
        assert_eq!(retry.group, batch.group);
    }
}
