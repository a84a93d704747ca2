use crate::aggregate::aggregate_orders;
use crate::batch::build_write_batch;
use crate::catalog::CatalogIndex;
use crate::config::{OrderColumns, ReconConfig};
use crate::error::ReconError;
use crate::ingest::parse_count;
use crate::merge::merge_inventory;
use crate::model::{
    InventorySnapshot, OrderLine, ReconInput, ReconMeta, Reconciliation, WriteBatch, WriteRequest,
};
use crate::slot::select_write_slot;
use crate::summary::compute_summary;

/// Resolve, aggregate and merge one run. Pure apart from the timestamp.
pub fn reconcile(config: &ReconConfig, input: &ReconInput) -> Result<Reconciliation, ReconError> {
    let index = CatalogIndex::build(&input.catalog);
    let aggregated = aggregate_orders(
        &input.orders,
        &index,
        &config.lot_overrides,
        config.aggregation.policy,
    );
    let merge = merge_inventory(&input.inventory, &aggregated.sales)?;

    let summary = compute_summary(
        input.orders.len(),
        aggregated.zero_quantity_lines,
        &aggregated.resolved,
        &aggregated.sales,
        &merge,
    );

    Ok(Reconciliation {
        meta: ReconMeta {
            config_name: config.name.clone(),
            policy: config.aggregation.policy,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        resolved: aggregated.resolved,
        sales: aggregated.sales,
        merge,
    })
}

/// Choose a clean column group and build the write batch for a reconciliation.
/// Fails before producing any command when nothing needs writing or no group is free.
pub fn plan_write(
    config: &ReconConfig,
    recon: &Reconciliation,
    snapshot: &InventorySnapshot,
    request: &WriteRequest,
) -> Result<WriteBatch, ReconError> {
    let updates = recon.merge.updates();
    let group = select_write_slot(snapshot, &updates, &config.inventory)?;
    build_write_batch(request, group, &updates, snapshot, &config.inventory)
}

/// Load the marketplace order export. Blank lines are skipped; an unparsable or
/// negative quantity becomes 0 and is later dropped by the aggregator.
pub fn load_order_csv(csv_data: &str, columns: &OrderColumns) -> Result<Vec<OrderLine>, ReconError> {
    let data = csv_data.strip_prefix('\u{feff}').unwrap_or(csv_data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, ReconError> {
        headers
            .iter()
            .position(|h| h == name.trim())
            .ok_or_else(|| ReconError::MissingColumn {
                column: name.into(),
            })
    };

    let code_idx = idx(&columns.item_code)?;
    let sku_idx = idx(&columns.item_sku)?;
    let qty_idx = idx(&columns.quantity)?;
    let name_idx = idx(&columns.product_name)?;
    // Exports without the lot-override column still load.
    let override_idx = columns
        .lot_override
        .as_deref()
        .and_then(|name| headers.iter().position(|h| h == name.trim()));

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();

        lines.push(OrderLine {
            item_code: field(code_idx),
            item_sku: field(sku_idx),
            quantity: parse_count(&field(qty_idx))
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0),
            product_name: field(name_idx),
            lot_override: override_idx.map(field).filter(|s| !s.is_empty()),
        });
    }

    log::info!("orders: {} lines loaded", lines.len());
    Ok(lines)
}
