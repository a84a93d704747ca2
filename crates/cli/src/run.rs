//! `stockledger aggregate | merge | plan | write`: the reconciliation pipeline.

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use clap::{Args, ValueEnum};
use serde::Serialize;
use stockledger_recon::model::{
    DispatchReport, ReconMeta, ReconSummary, ResolvedLine, SalesAggregate, SalesEntry, WriteBatch,
};
use stockledger_recon::{
    catalog_from_grid, dispatch_batch, inventory_from_grid, plan_write, reconcile,
    AccumulationPolicy, ReconConfig, ReconInput, Reconciliation, WriteRequest,
};

use crate::exit_codes::EXIT_PARTIAL_WRITE;
use crate::input::{load_config, load_orders, recon_err, GridSource};
use crate::report;
use crate::CliError;

#[derive(Args)]
pub struct InputArgs {
    /// Order export CSV (UTF-8 or Shift_JIS)
    #[arg(long, value_name = "CSV")]
    pub orders: PathBuf,

    /// Product master grid (.json or .csv); read from the proxy when omitted
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Engine config (TOML); the built-in layout when omitted
    #[arg(long, short = 'c', value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Override the config's accumulation policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Spreadsheet proxy base URL
    #[arg(long, env = "STOCKLEDGER_API", value_name = "URL")]
    pub api: Option<String>,
}

#[derive(Args)]
pub struct InventoryArgs {
    /// Inventory sheet name (the write target for plan/write)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Inventory grid (.json or .csv), header row first; read from the proxy when omitted
    #[arg(long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,
}

#[derive(Args)]
pub struct WriteArgs {
    /// Ledger date (YYYY-MM-DD, or `today`)
    #[arg(long)]
    pub date: Option<String>,

    /// Ledger time (HH:MM, or `now`)
    #[arg(long)]
    pub time: Option<String>,

    /// Person responsible for the stock update
    #[arg(long)]
    pub manager: Option<String>,
}

#[derive(Args)]
pub struct OutputArgs {
    /// Output JSON to stdout instead of tables
    #[arg(long)]
    pub json: bool,

    /// Write JSON output to file
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Sum,
    FirstWins,
}

impl From<PolicyArg> for AccumulationPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Sum => AccumulationPolicy::Sum,
            PolicyArg::FirstWins => AccumulationPolicy::FirstWins,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AggregateOutput<'a> {
    meta: &'a ReconMeta,
    summary: &'a ReconSummary,
    resolved: &'a [ResolvedLine],
    sales: &'a SalesAggregate,
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    meta: &'a ReconMeta,
    summary: &'a ReconSummary,
    unplaced: &'a [SalesEntry],
    batch: &'a WriteBatch,
}

#[derive(Serialize)]
struct WriteOutput<'a> {
    meta: &'a ReconMeta,
    summary: &'a ReconSummary,
    batch: &'a WriteBatch,
    attempts: usize,
    report: &'a DispatchReport,
}

fn emit_json<T: Serialize>(value: &T, out: &OutputArgs) -> Result<(), CliError> {
    if !out.json && out.output.is_none() {
        return Ok(());
    }
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::internal(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = out.output {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }
    if out.json {
        println!("{json_str}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared loading
// ---------------------------------------------------------------------------

fn config_for(args: &InputArgs) -> Result<ReconConfig, CliError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(p) = args.policy {
        config.aggregation.policy = p.into();
    }
    Ok(config)
}

fn load_input(
    config: &ReconConfig,
    args: &InputArgs,
    inventory: Option<&InventoryArgs>,
) -> Result<ReconInput, CliError> {
    let source = GridSource {
        api: args.api.clone(),
    };

    let orders = load_orders(&args.orders, config)?;
    let catalog = catalog_from_grid(&source.catalog(args.catalog.as_ref())?, &config.catalog);
    let inventory_grid = match inventory {
        Some(inv) => source.inventory(inv.inventory.as_ref(), inv.sheet.as_deref())?,
        None => Vec::new(),
    };

    Ok(ReconInput {
        orders,
        catalog,
        inventory: inventory_from_grid(&inventory_grid, &config.inventory),
    })
}

/// Expand `today` / `now` against the local clock; other values pass through.
fn resolve_clock(date: Option<&str>, time: Option<&str>, clock: NaiveDateTime) -> (String, String) {
    let date = match date.map(str::trim) {
        Some(d) if d.eq_ignore_ascii_case("today") => clock.format("%Y-%m-%d").to_string(),
        other => other.unwrap_or("").to_string(),
    };
    let time = match time.map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("now") => clock.format("%H:%M").to_string(),
        other => other.unwrap_or("").to_string(),
    };
    (date, time)
}

fn write_request(config: &ReconConfig, inv: &InventoryArgs, w: &WriteArgs) -> Result<WriteRequest, CliError> {
    let (date, time) = resolve_clock(w.date.as_deref(), w.time.as_deref(), Local::now().naive_local());
    WriteRequest::new(
        inv.sheet.as_deref().unwrap_or(""),
        &date,
        &time,
        w.manager.as_deref().unwrap_or(""),
        &config.write.staff,
    )
    .map_err(|e| {
        let err = recon_err(e);
        if config.write.staff.is_empty() {
            err
        } else {
            err.with_hint(format!("staff: {}", config.write.staff.join(", ")))
        }
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn cmd_aggregate(args: InputArgs, out: OutputArgs) -> Result<(), CliError> {
    let config = config_for(&args)?;
    let input = load_input(&config, &args, None)?;
    let recon = reconcile(&config, &input).map_err(recon_err)?;

    emit_json(
        &AggregateOutput {
            meta: &recon.meta,
            summary: &recon.summary,
            resolved: &recon.resolved,
            sales: &recon.sales,
        },
        &out,
    )?;
    if !out.json {
        report::sales_table(&recon.sales)?;
    }
    report::summary_line(&recon);
    Ok(())
}

pub fn cmd_merge(args: InputArgs, inv: InventoryArgs, out: OutputArgs) -> Result<(), CliError> {
    let config = config_for(&args)?;
    let input = load_input(&config, &args, Some(&inv))?;
    let recon = reconcile(&config, &input).map_err(recon_err)?;

    emit_json(&recon, &out)?;
    if !out.json {
        report::merge_table(&recon.merge)?;
    }
    report::summary_line(&recon);
    report::merge_line(&recon);
    Ok(())
}

fn planned(
    config: &ReconConfig,
    args: &InputArgs,
    inv: &InventoryArgs,
    request: &WriteRequest,
) -> Result<(Reconciliation, WriteBatch), CliError> {
    let input = load_input(config, args, Some(inv))?;
    let recon = reconcile(config, &input).map_err(recon_err)?;
    report::summary_line(&recon);
    report::merge_line(&recon);

    let batch = plan_write(config, &recon, &input.inventory, request).map_err(|e| {
        let err = recon_err(e);
        match err.code {
            crate::exit_codes::EXIT_NO_WRITE_SLOT => {
                err.with_hint("archive older ledger columns on this sheet, then re-run")
            }
            _ => err,
        }
    })?;
    eprintln!(
        "column group at offset {} selected: {} write(s) planned",
        batch.group.offset,
        batch.commands.len()
    );
    Ok((recon, batch))
}

/// Build the write batch without touching the sheet.
pub fn cmd_plan(args: InputArgs, inv: InventoryArgs, w: WriteArgs, out: OutputArgs) -> Result<(), CliError> {
    let config = config_for(&args)?;
    let request = write_request(&config, &inv, &w)?;
    let (recon, batch) = planned(&config, &args, &inv, &request)?;

    emit_json(
        &PlanOutput {
            meta: &recon.meta,
            summary: &recon.summary,
            unplaced: &recon.merge.unplaced,
            batch: &batch,
        },
        &out,
    )?;
    if !out.json {
        report::batch_table(&batch)?;
    }
    Ok(())
}

/// Build the write batch and dispatch it through the proxy.
pub fn cmd_write(
    args: InputArgs,
    inv: InventoryArgs,
    w: WriteArgs,
    retry: usize,
    out: OutputArgs,
) -> Result<(), CliError> {
    let config = config_for(&args)?;
    let request = write_request(&config, &inv, &w)?;
    let client = GridSource {
        api: args.api.clone(),
    }
    .client()?;

    let (recon, batch) = planned(&config, &args, &inv, &request)?;

    let mut outcome = dispatch_batch(&client, &batch, config.write.max_in_flight);
    let mut attempts = 1;
    while !outcome.is_complete() && attempts <= retry {
        let pending = batch.retain_failed(&outcome);
        log::info!("retrying {} failed write(s)", pending.commands.len());
        let again = dispatch_batch(&client, &pending, config.write.max_in_flight);
        outcome.succeeded.extend(again.succeeded);
        outcome.failed = again.failed;
        attempts += 1;
    }

    emit_json(
        &WriteOutput {
            meta: &recon.meta,
            summary: &recon.summary,
            batch: &batch,
            attempts,
            report: &outcome,
        },
        &out,
    )?;
    report::dispatch_lines(&outcome);

    if outcome.is_complete() {
        Ok(())
    } else {
        Err(CliError {
            code: EXIT_PARTIAL_WRITE,
            message: format!("{} of {} writes failed", outcome.failed.len(), outcome.total),
            hint: Some(format!(
                "the failed ranges are listed above; re-run with --retry or fix them on sheet '{}'",
                batch.sheet_name
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 7, 42)
            .unwrap()
    }

    #[test]
    fn today_and_now_use_the_clock() {
        let (date, time) = resolve_clock(Some("today"), Some("NOW"), clock());
        assert_eq!(date, "2024-05-01");
        assert_eq!(time, "09:07");
    }

    #[test]
    fn explicit_values_pass_through() {
        let (date, time) = resolve_clock(Some("2023-12-31"), Some("23:59"), clock());
        assert_eq!(date, "2023-12-31");
        assert_eq!(time, "23:59");
    }

    #[test]
    fn missing_values_stay_blank() {
        let (date, time) = resolve_clock(None, None, clock());
        assert!(date.is_empty());
        assert!(time.is_empty());
    }
}
