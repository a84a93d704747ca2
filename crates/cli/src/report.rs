//! Human-readable tables and summaries.
//!
//! Tables go to stdout (only when JSON is not requested); one-line summaries
//! go to stderr so they never mix with machine output.

use std::io::{self, Write};

use stockledger_recon::model::{
    DispatchReport, MergeOutput, Reconciliation, SalesAggregate, WriteBatch,
};

use crate::util::{pad_left, pad_right};
use crate::CliError;

const NAME_WIDTH: usize = 32;
const KEY_WIDTH: usize = 16;

pub fn summary_line(recon: &Reconciliation) {
    let s = &recon.summary;
    eprintln!(
        "{} order lines: {} matched, {} unmatched ({} ambiguous), {} zero-quantity skipped",
        s.order_lines, s.matched_lines, s.unmatched_lines, s.ambiguous_lines, s.zero_quantity_lines,
    );
    eprintln!(
        "{} sales keys, {} single units (policy: {})",
        s.sales_keys, s.total_single_units, recon.meta.policy,
    );
}

pub fn merge_line(recon: &Reconciliation) {
    let s = &recon.summary;
    eprintln!(
        "{} inventory rows: {} to update, {} oversold, {} sales unplaced",
        s.inventory_rows, s.rows_to_update, s.oversold_rows, s.unplaced_sales,
    );
}

fn write_err(e: io::Error) -> CliError {
    CliError::io(e.to_string())
}

pub fn sales_table(sales: &SalesAggregate) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "{} {} {} {} {}",
        pad_right("KEY", KEY_WIDTH),
        pad_right("PRODUCT", NAME_WIDTH),
        pad_left("COUNT", 6),
        pad_left("UNITS", 6),
        pad_left("LINES", 5),
    )
    .map_err(write_err)?;

    for e in sales.entries() {
        writeln!(
            out,
            "{} {} {} {} {}",
            pad_right(&e.key, KEY_WIDTH),
            pad_right(&e.product_name, NAME_WIDTH),
            pad_left(&e.raw_count.to_string(), 6),
            pad_left(&e.single_unit_count.to_string(), 6),
            pad_left(&e.line_count.to_string(), 5),
        )
        .map_err(write_err)?;
    }
    Ok(())
}

pub fn merge_table(merge: &MergeOutput) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "{} {} {} {} {} {}",
        pad_left("ROW", 5),
        pad_right("JAN", KEY_WIDTH),
        pad_right("PRODUCT", NAME_WIDTH),
        pad_left("STOCK", 7),
        pad_left("SOLD", 6),
        pad_left("NEW", 7),
    )
    .map_err(write_err)?;

    for item in merge.updates() {
        let flag = if item.updated_quantity < 0 { "  oversold" } else { "" };
        writeln!(
            out,
            "{} {} {} {} {} {}{flag}",
            pad_left(&item.row.to_string(), 5),
            pad_right(&item.jan, KEY_WIDTH),
            pad_right(&item.product_name, NAME_WIDTH),
            pad_left(&item.quantity.to_string(), 7),
            pad_left(&item.sales_count.to_string(), 6),
            pad_left(&item.updated_quantity.to_string(), 7),
        )
        .map_err(write_err)?;
    }

    if !merge.unplaced.is_empty() {
        writeln!(out).map_err(write_err)?;
        writeln!(out, "unplaced sales (no inventory row with this JAN):").map_err(write_err)?;
        for e in &merge.unplaced {
            writeln!(
                out,
                "  {} {} {}",
                pad_right(&e.key, KEY_WIDTH),
                pad_right(&e.product_name, NAME_WIDTH),
                pad_left(&e.single_unit_count.to_string(), 6),
            )
            .map_err(write_err)?;
        }
    }
    Ok(())
}

pub fn batch_table(batch: &WriteBatch) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for cmd in &batch.commands {
        let values: Vec<String> = cmd
            .values
            .iter()
            .flat_map(|row| row.iter().map(|v| v.to_string()))
            .collect();
        writeln!(
            out,
            "{} {} [{}]",
            pad_right(&cmd.range, 24),
            pad_right(&cmd.target.to_string(), 28),
            values.join(", "),
        )
        .map_err(write_err)?;
    }
    Ok(())
}

pub fn dispatch_lines(report: &DispatchReport) {
    eprintln!(
        "wrote {}/{} ranges, {} failed",
        report.succeeded.len(),
        report.total,
        report.failed.len(),
    );
    for f in &report.failed {
        eprintln!("  failed: {} {}: {}", f.target, f.range, f.error);
    }
}
