use crate::model::{MatchPath, MergeOutput, ReconSummary, ResolvedLine, SalesAggregate};

/// Compute run counters from the stage outputs.
pub fn compute_summary(
    order_lines: usize,
    zero_quantity_lines: usize,
    resolved: &[ResolvedLine],
    sales: &SalesAggregate,
    merge: &MergeOutput,
) -> ReconSummary {
    let mut matched_lines = 0;
    let mut unmatched_lines = 0;
    let mut ambiguous_lines = 0;

    for r in resolved {
        match r.identity.via {
            MatchPath::PrimaryCode | MatchPath::SecondaryCode => matched_lines += 1,
            MatchPath::Ambiguous => {
                unmatched_lines += 1;
                ambiguous_lines += 1;
            }
            MatchPath::NotFound => unmatched_lines += 1,
        }
    }

    let updates = merge.updates();

    ReconSummary {
        order_lines,
        zero_quantity_lines,
        matched_lines,
        unmatched_lines,
        ambiguous_lines,
        sales_keys: sales.len(),
        total_single_units: sales.total_single_units(),
        inventory_rows: merge.items.len(),
        rows_to_update: updates.len(),
        oversold_rows: updates.iter().filter(|i| i.updated_quantity < 0).count(),
        unplaced_sales: merge.unplaced.len(),
    }
}
