use std::collections::BTreeMap;

use crate::catalog::{fold, CatalogIndex};
use crate::model::{CatalogRow, MatchPath, OrderLine, ResolvedIdentity};

/// Resolve one order line against the catalog.
///
/// Decision order:
/// 1. No item code: look up the SKU on the secondary code.
/// 2. Item code present, by number of primary-code rows:
///    - none: SKU lookup;
///    - one: adopt it when its own secondary code equals the item code,
///      otherwise SKU lookup;
///    - two or more: SKU lookup, and unmatched if that misses. An ambiguous
///      primary-code row is never adopted on its own.
///
/// The lot-override table beats any catalog lot unit.
pub fn resolve_line(
    line: &OrderLine,
    index: &CatalogIndex<'_>,
    lot_overrides: &BTreeMap<String, u32>,
) -> ResolvedIdentity {
    let (row, via) = find_row(line, index);

    let override_unit = line
        .lot_override
        .as_deref()
        .filter(|code| !code.is_empty())
        .and_then(|code| lot_overrides.get(code))
        .copied();

    let lot_unit = match (override_unit, row) {
        (Some(unit), _) => unit,
        (None, Some(r)) => r.lot_unit,
        (None, None) => 1,
    };

    let identity = match row {
        Some(r) => ResolvedIdentity {
            asin: r.asin.clone(),
            jan: r.jan.clone(),
            product_name: if r.product_name.is_empty() {
                line.product_name.clone()
            } else {
                r.product_name.clone()
            },
            lot_unit,
            matched: true,
            via,
            lot_override: override_unit.is_some(),
        },
        None => ResolvedIdentity {
            asin: String::new(),
            jan: String::new(),
            product_name: line.product_name.clone(),
            lot_unit,
            matched: false,
            via,
            lot_override: override_unit.is_some(),
        },
    };

    log::debug!(
        "resolve code='{}' sku='{}' -> {} (lot {})",
        line.item_code,
        line.item_sku,
        identity.via,
        identity.lot_unit
    );

    identity
}

fn find_row<'a>(line: &OrderLine, index: &CatalogIndex<'a>) -> (Option<&'a CatalogRow>, MatchPath) {
    let by_sku = |miss: MatchPath| match index.find_by_secondary_code(&line.item_sku) {
        Some(r) => (Some(r), MatchPath::SecondaryCode),
        None => (None, miss),
    };

    if line.item_code.is_empty() {
        return by_sku(MatchPath::NotFound);
    }

    match index.find_by_primary_code(&line.item_code).as_slice() {
        [] => by_sku(MatchPath::NotFound),
        [only] if fold(&only.secondary_code) == fold(&line.item_code) => {
            (Some(*only), MatchPath::PrimaryCode)
        }
        [_] => by_sku(MatchPath::NotFound),
        _ => by_sku(MatchPath::Ambiguous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(primary: &str, secondary: &str, jan: &str, lot: u32, name: &str) -> CatalogRow {
        CatalogRow {
            primary_code: primary.into(),
            secondary_code: secondary.into(),
            asin: format!("ASIN-{jan}"),
            jan: jan.into(),
            lot_unit: lot,
            product_name: name.into(),
        }
    }

    fn line(code: &str, sku: &str, qty: u32) -> OrderLine {
        OrderLine {
            item_code: code.into(),
            item_sku: sku.into(),
            quantity: qty,
            product_name: "raw name".into(),
            lot_override: None,
        }
    }

    fn overrides() -> BTreeMap<String, u32> {
        BTreeMap::from([("-2".to_string(), 2), ("-4".to_string(), 4), ("-6".to_string(), 6)])
    }

    #[test]
    fn self_consistent_primary_row_is_adopted() {
        let rows = vec![row("X1", "X1", "4900000000001", 2, "Tea")];
        let index = CatalogIndex::build(&rows);
        let id = resolve_line(&line("X1", "S1", 3), &index, &overrides());
        assert!(id.matched);
        assert_eq!(id.via, MatchPath::PrimaryCode);
        assert_eq!(id.jan, "4900000000001");
        assert_eq!(id.lot_unit, 2);
        assert_eq!(id.product_name, "Tea");
    }

    #[test]
    fn missing_item_code_falls_back_to_sku() {
        let rows = vec![row("P1", "s9", "4901", 1, "Soap")];
        let index = CatalogIndex::build(&rows);
        let id = resolve_line(&line("", "S9", 1), &index, &overrides());
        assert!(id.matched);
        assert_eq!(id.via, MatchPath::SecondaryCode);
        assert_eq!(id.jan, "4901");
    }

    #[test]
    fn single_primary_without_confirmation_uses_sku() {
        let rows = vec![
            row("X1", "X1-OLD", "4901", 1, "Old"),
            row("Z", "S1", "4902", 3, "Via SKU"),
        ];
        let index = CatalogIndex::build(&rows);
        let id = resolve_line(&line("X1", "S1", 1), &index, &overrides());
        assert_eq!(id.via, MatchPath::SecondaryCode);
        assert_eq!(id.jan, "4902");
        assert_eq!(id.lot_unit, 3);
    }

    #[test]
    fn single_primary_without_confirmation_or_sku_is_unmatched() {
        let rows = vec![row("X1", "X1-OLD", "4901", 4, "Old")];
        let index = CatalogIndex::build(&rows);
        let id = resolve_line(&line("X1", "S1", 1), &index, &overrides());
        assert!(!id.matched);
        assert_eq!(id.via, MatchPath::NotFound);
        assert_eq!(id.lot_unit, 1);
        assert!(id.jan.is_empty());
    }

    #[test]
    fn ambiguous_primary_never_adopts_a_candidate() {
        let rows = vec![
            row("DUP", "DUP", "4901", 2, "Old pack"),
            row("DUP", "DUP-NEW", "4902", 4, "New pack"),
        ];
        let index = CatalogIndex::build(&rows);
        let id = resolve_line(&line("DUP", "nothing", 5), &index, &overrides());
        assert!(!id.matched);
        assert_eq!(id.via, MatchPath::Ambiguous);
        assert_eq!(id.lot_unit, 1);
        assert_eq!(id.product_name, "raw name");
        assert!(id.asin.is_empty() && id.jan.is_empty());
    }

    #[test]
    fn ambiguous_primary_resolved_by_sku() {
        let rows = vec![
            row("DUP", "DUP", "4901", 2, "Old pack"),
            row("DUP", "DUP-NEW", "4902", 4, "New pack"),
        ];
        let index = CatalogIndex::build(&rows);
        let id = resolve_line(&line("DUP", "dup-new", 5), &index, &overrides());
        assert!(id.matched);
        assert_eq!(id.jan, "4902");
        assert_eq!(id.lot_unit, 4);
    }

    #[test]
    fn resolution_depends_on_secondary_order_only_through_sku() {
        let a = row("DUP", "S", "4901", 1, "A");
        let b = row("DUP", "S", "4902", 1, "B");
        let forward = vec![a.clone(), b.clone()];
        let reverse = vec![b, a];
        let l = line("DUP", "S", 1);
        let f = resolve_line(&l, &CatalogIndex::build(&forward), &overrides());
        let r = resolve_line(&l, &CatalogIndex::build(&reverse), &overrides());
        assert_eq!(f.jan, "4901");
        assert_eq!(r.jan, "4902");
    }

    #[test]
    fn lot_override_wins_over_catalog() {
        let rows = vec![row("X1", "X1", "4901", 2, "Tea")];
        let index = CatalogIndex::build(&rows);
        let mut l = line("X1", "", 1);
        l.lot_override = Some("-6".into());
        let id = resolve_line(&l, &index, &overrides());
        assert_eq!(id.lot_unit, 6);
        assert!(id.lot_override);
    }

    #[test]
    fn lot_override_applies_to_unmatched_lines() {
        let rows: Vec<CatalogRow> = Vec::new();
        let index = CatalogIndex::build(&rows);
        let mut l = line("NOPE", "", 1);
        l.lot_override = Some("-4".into());
        let id = resolve_line(&l, &index, &overrides());
        assert!(!id.matched);
        assert_eq!(id.lot_unit, 4);
    }

    #[test]
    fn unknown_override_code_is_ignored() {
        let rows = vec![row("X1", "X1", "4901", 3, "Tea")];
        let index = CatalogIndex::build(&rows);
        let mut l = line("X1", "", 1);
        l.lot_override = Some("-3".into());
        let id = resolve_line(&l, &index, &overrides());
        assert_eq!(id.lot_unit, 3);
        assert!(!id.lot_override);
    }

    #[test]
    fn blank_catalog_name_keeps_order_name() {
        let rows = vec![row("X1", "X1", "4901", 1, "")];
        let index = CatalogIndex::build(&rows);
        let id = resolve_line(&line("X1", "", 1), &index, &overrides());
        assert_eq!(id.product_name, "raw name");
    }

    #[test]
    fn resolution_is_idempotent() {
        let rows = vec![
            row("DUP", "DUP", "4901", 2, "Old"),
            row("DUP", "x", "4902", 2, "New"),
            row("Q", "S7", "4903", 6, "Case"),
        ];
        let index = CatalogIndex::build(&rows);
        for l in [line("DUP", "S7", 2), line("", "s7", 1), line("Q", "", 1)] {
            assert_eq!(
                resolve_line(&l, &index, &overrides()),
                resolve_line(&l, &index, &overrides())
            );
        }
    }
}
