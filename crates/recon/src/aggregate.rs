use std::collections::BTreeMap;

use crate::catalog::CatalogIndex;
use crate::config::AccumulationPolicy;
use crate::model::{OrderLine, ResolvedLine, SalesAggregate, SalesEntry};
use crate::resolver::resolve_line;

/// Output of one aggregation pass.
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub sales: SalesAggregate,
    /// Every non-zero line with its resolution, in input order.
    pub resolved: Vec<ResolvedLine>,
    pub zero_quantity_lines: usize,
}

/// Resolve each order line, expand it by its lot unit, and fold by sales key.
pub fn aggregate_orders(
    lines: &[OrderLine],
    index: &CatalogIndex<'_>,
    lot_overrides: &BTreeMap<String, u32>,
    policy: AccumulationPolicy,
) -> Aggregated {
    let mut zero_quantity_lines = 0;
    let mut resolved = Vec::with_capacity(lines.len());

    for line in lines {
        if line.quantity == 0 {
            zero_quantity_lines += 1;
            continue;
        }
        let identity = resolve_line(line, index, lot_overrides);
        resolved.push(ResolvedLine {
            line: line.clone(),
            identity,
        });
    }

    let sales = fold_resolved(&resolved, policy);

    log::info!(
        "aggregate: {} lines -> {} keys, {} single units ({} zero-quantity dropped, policy {})",
        resolved.len(),
        sales.len(),
        sales.total_single_units(),
        zero_quantity_lines,
        policy
    );

    Aggregated {
        sales,
        resolved,
        zero_quantity_lines,
    }
}

/// Fold resolved lines into a sales aggregate. Identity fields of an entry are
/// captured from the first line with its key.
pub fn fold_resolved(resolved: &[ResolvedLine], policy: AccumulationPolicy) -> SalesAggregate {
    let mut sales = SalesAggregate::new(policy);

    for r in resolved {
        if r.line.quantity == 0 {
            continue;
        }
        let id = &r.identity;
        let raw = u64::from(r.line.quantity);
        let single = raw * u64::from(id.lot_unit);
        let key = id.sales_key();

        let (entry, fresh) = sales.slot(key, || SalesEntry {
            key: key.to_string(),
            product_name: id.product_name.clone(),
            asin: id.asin.clone(),
            jan: id.jan.clone(),
            raw_count: 0,
            single_unit_count: 0,
            line_count: 0,
        });

        entry.line_count += 1;
        match (policy, fresh) {
            (_, true) | (AccumulationPolicy::Sum, false) => {
                entry.raw_count += raw;
                entry.single_unit_count += single;
            }
            (AccumulationPolicy::FirstWins, false) => {
                log::debug!("aggregate: '{key}' already counted, dropping {single} units");
            }
        }
    }

    sales
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CatalogRow;

    fn catalog() -> Vec<CatalogRow> {
        vec![
            CatalogRow {
                primary_code: "X1".into(),
                secondary_code: "X1".into(),
                asin: "B0X1".into(),
                jan: "4900000000001".into(),
                lot_unit: 2,
                product_name: "Tea 2-pack".into(),
            },
            CatalogRow {
                primary_code: "Y1".into(),
                secondary_code: "S-Y1".into(),
                asin: "B0Y1".into(),
                jan: "4900000000001".into(),
                lot_unit: 1,
                product_name: "Tea single".into(),
            },
        ]
    }

    fn line(code: &str, sku: &str, qty: u32, name: &str) -> OrderLine {
        OrderLine {
            item_code: code.into(),
            item_sku: sku.into(),
            quantity: qty,
            product_name: name.into(),
            lot_override: None,
        }
    }

    fn overrides() -> BTreeMap<String, u32> {
        BTreeMap::from([("-6".to_string(), 6)])
    }

    #[test]
    fn lot_unit_expands_counts() {
        let rows = catalog();
        let index = CatalogIndex::build(&rows);
        let out = aggregate_orders(&[line("X1", "S1", 3, "tea")], &index, &overrides(), AccumulationPolicy::Sum);
        let entry = out.sales.get("4900000000001").unwrap();
        assert_eq!(entry.raw_count, 3);
        assert_eq!(entry.single_unit_count, 6);
        assert_eq!(entry.product_name, "Tea 2-pack");
    }

    #[test]
    fn zero_quantity_lines_never_aggregate() {
        let rows = catalog();
        let index = CatalogIndex::build(&rows);
        let out = aggregate_orders(
            &[line("X1", "", 0, "tea"), line("", "", 0, "ghost")],
            &index,
            &overrides(),
            AccumulationPolicy::Sum,
        );
        assert!(out.sales.is_empty());
        assert!(out.resolved.is_empty());
        assert_eq!(out.zero_quantity_lines, 2);
    }

    #[test]
    fn sum_policy_adds_collisions() {
        let rows = catalog();
        let index = CatalogIndex::build(&rows);
        let lines = [line("X1", "", 3, "a"), line("Y1", "s-y1", 5, "b")];
        let out = aggregate_orders(&lines, &index, &overrides(), AccumulationPolicy::Sum);
        assert_eq!(out.sales.len(), 1);
        let entry = out.sales.get("4900000000001").unwrap();
        assert_eq!(entry.raw_count, 8);
        assert_eq!(entry.single_unit_count, 6 + 5);
        assert_eq!(entry.line_count, 2);
        // identity of the first contributing line
        assert_eq!(entry.product_name, "Tea 2-pack");
        assert_eq!(entry.asin, "B0X1");
    }

    #[test]
    fn first_wins_policy_drops_later_counts() {
        let rows = catalog();
        let index = CatalogIndex::build(&rows);
        let lines = [line("X1", "", 3, "a"), line("Y1", "s-y1", 5, "b")];
        let out = aggregate_orders(&lines, &index, &overrides(), AccumulationPolicy::FirstWins);
        let entry = out.sales.get("4900000000001").unwrap();
        assert_eq!(entry.raw_count, 3);
        assert_eq!(entry.single_unit_count, 6);
        assert_eq!(entry.line_count, 2);
        assert_eq!(out.sales.policy, AccumulationPolicy::FirstWins);
    }

    #[test]
    fn unmatched_lines_key_by_product_name() {
        let rows = catalog();
        let index = CatalogIndex::build(&rows);
        let mut boxed = line("ZZ", "", 2, "Mystery box");
        boxed.lot_override = Some("-6".into());
        let out = aggregate_orders(
            &[boxed, line("", "", 1, "Mystery box")],
            &index,
            &overrides(),
            AccumulationPolicy::Sum,
        );
        let entry = out.sales.get("Mystery box").unwrap();
        assert!(entry.jan.is_empty());
        assert_eq!(entry.single_unit_count, 12 + 1);
    }

    #[test]
    fn entries_keep_first_appearance_order() {
        let rows = catalog();
        let index = CatalogIndex::build(&rows);
        let lines = [
            line("", "", 1, "zeta"),
            line("X1", "", 1, "tea"),
            line("", "", 1, "alpha"),
        ];
        let out = aggregate_orders(&lines, &index, &overrides(), AccumulationPolicy::Sum);
        let keys: Vec<&str> = out.sales.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "4900000000001", "alpha"]);
        assert_eq!(out.sales.total_single_units(), 1 + 2 + 1);
    }
}
