//! Loading the three run inputs: config, order export, and sheet grids.

use std::path::{Path, PathBuf};

use stockledger_recon::engine::load_order_csv;
use stockledger_recon::{ReconConfig, ReconError};
use stockledger_sheets::{grid_from_json, SheetsClient};

use crate::exit_codes::recon_exit_code;
use crate::CliError;

/// Decode file bytes: UTF-8 (BOM stripped) first, Shift_JIS otherwise.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => match s.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => s,
        },
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(&bytes);
            if had_errors {
                log::warn!("input is neither UTF-8 nor clean Shift_JIS; some characters were replaced");
            }
            decoded.into_owned()
        }
    }
}

pub fn read_text(path: &Path) -> Result<String, CliError> {
    let bytes = std::fs::read(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    Ok(decode_text(bytes))
}

pub fn recon_err(err: ReconError) -> CliError {
    CliError {
        code: recon_exit_code(&err),
        message: err.to_string(),
        hint: None,
    }
}

/// Config from `--config`, or the built-in production layout.
pub fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    match path {
        Some(p) => {
            let text = read_text(p)?;
            ReconConfig::from_toml(&text).map_err(|e| {
                recon_err(e).with_hint(format!("check {}; `stockledger config default` prints a full example", p.display()))
            })
        }
        None => Ok(ReconConfig::default()),
    }
}

pub fn load_orders(path: &Path, config: &ReconConfig) -> Result<Vec<stockledger_recon::OrderLine>, CliError> {
    let text = read_text(path)?;
    load_order_csv(&text, &config.orders).map_err(|e| {
        let err = recon_err(e);
        match err.code {
            crate::exit_codes::EXIT_PARSE => err.with_hint("set the header names under [orders] in the config"),
            _ => err,
        }
    })
}

/// A grid file: JSON (`{"values": [[..]]}` or a bare 2D array) or a headerless CSV.
pub fn load_grid_file(path: &Path) -> Result<Vec<Vec<String>>, CliError> {
    let text = read_text(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let doc: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| CliError::parse(format!("{}: {e}", path.display())))?;
        let doc = if doc.is_array() {
            serde_json::json!({ "values": doc })
        } else {
            doc
        };
        return grid_from_json(&doc).map_err(|e| CliError::parse(format!("{}: {e}", path.display())));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CliError::parse(format!("{}: {e}", path.display())))?;
        grid.push(record.iter().map(String::from).collect());
    }
    Ok(grid)
}

/// Where the catalog and inventory grids come from: local files, else the proxy.
pub struct GridSource {
    pub api: Option<String>,
}

impl GridSource {
    pub fn client(&self) -> Result<SheetsClient, CliError> {
        let base = self.api.as_deref().ok_or_else(|| {
            CliError::args("no proxy API configured")
                .with_hint("pass --api <url> or set STOCKLEDGER_API, or supply the grid as a file")
        })?;
        SheetsClient::new(base).map_err(CliError::sheets)
    }

    pub fn catalog(&self, file: Option<&PathBuf>) -> Result<Vec<Vec<String>>, CliError> {
        match file {
            Some(path) => load_grid_file(path),
            None => self.client()?.read_catalog().map_err(CliError::sheets),
        }
    }

    pub fn inventory(&self, file: Option<&PathBuf>, sheet: Option<&str>) -> Result<Vec<Vec<String>>, CliError> {
        match (file, sheet) {
            (Some(path), _) => load_grid_file(path),
            (None, Some(name)) => self.client()?.read_inventory(name).map_err(CliError::sheets),
            (None, None) => Err(CliError::args("no inventory source")
                .with_hint("pass --inventory <file> or --sheet <name>")),
        }
    }
}
