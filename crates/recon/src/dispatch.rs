//! Concurrent issue of a write batch through an external sheet writer.

use std::fmt::Display;
use std::thread;

use crate::model::{CellValue, DispatchReport, FailedWrite, WriteBatch, WriteCommand};

/// One range write against the remote sheet. Failure is per call.
pub trait SheetWriter: Sync {
    type Error: Display;

    fn write_range(
        &self,
        sheet_name: &str,
        range: &str,
        values: &[Vec<CellValue>],
    ) -> Result<(), Self::Error>;
}

/// Issue every command in `batch`, at most `max_in_flight` at a time, and wait
/// for all of them. Nothing is rolled back; the report lists each failure.
pub fn dispatch_batch<W: SheetWriter>(
    writer: &W,
    batch: &WriteBatch,
    max_in_flight: usize,
) -> DispatchReport {
    let width = max_in_flight.max(1);
    let mut report = DispatchReport {
        total: batch.commands.len(),
        succeeded: Vec::new(),
        failed: Vec::new(),
    };

    for chunk in batch.commands.chunks(width) {
        let outcomes: Vec<(&WriteCommand, Result<(), String>)> = thread::scope(|s| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|cmd| {
                    let handle = s.spawn(move || {
                        writer
                            .write_range(&cmd.sheet_name, &cmd.range, &cmd.values)
                            .map_err(|e| e.to_string())
                    });
                    (cmd, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(cmd, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err("writer thread panicked".to_string()));
                    (cmd, result)
                })
                .collect()
        });

        for (cmd, result) in outcomes {
            match result {
                Ok(()) => report.succeeded.push(cmd.target.clone()),
                Err(error) => {
                    log::warn!("dispatch: {} ({}) failed: {error}", cmd.target, cmd.range);
                    report.failed.push(FailedWrite {
                        target: cmd.target.clone(),
                        range: cmd.range.clone(),
                        error,
                    });
                }
            }
        }
    }

    log::info!(
        "dispatch: {}/{} writes succeeded, {} failed",
        report.succeeded.len(),
        report.total,
        report.failed.len()
    );
    report
}
