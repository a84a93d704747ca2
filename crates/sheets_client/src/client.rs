//! Spreadsheet proxy HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). The proxy owns the
//! spreadsheet credentials; this side only speaks its JSON contract.

use std::time::Duration;

use serde_json::Value;
use stockledger_recon::{CellValue, SheetWriter};
use thiserror::Error;

/// Proxy API client (blocking).
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::blocking::Client,
    api_base: String,
}

#[derive(Debug, Error)]
pub enum SheetsError {
    /// Transport failure (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The proxy answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The body was not the expected JSON shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl SheetsClient {
    /// Create a client for a proxy at `api_base` (e.g. `http://localhost:3000`).
    pub fn new(api_base: &str) -> Result<Self, SheetsError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("stockledger/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SheetsError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Names of the inventory sheets in the workbook.
    pub fn list_sheets(&self) -> Result<Vec<String>, SheetsError> {
        let url = format!("{}/api/inventory-sheets", self.api_base);
        let json = self.get_json(&url, &[])?;

        let names = json["sheetNames"]
            .as_array()
            .ok_or_else(|| SheetsError::Parse("missing sheetNames in response".into()))?
            .iter()
            .filter_map(|n| n.as_str().map(String::from))
            .collect();
        Ok(names)
    }

    /// The product master grid, label row included.
    pub fn read_catalog(&self) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!("{}/api/product-sheet", self.api_base);
        let json = self.get_json(&url, &[])?;
        grid_from_json(&json)
    }

    /// One inventory sheet's grid, header row first.
    pub fn read_inventory(&self, sheet_name: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!("{}/api/inventory-read", self.api_base);
        let json = self.get_json(&url, &[("sheetName", sheet_name)])?;
        grid_from_json(&json)
    }

    /// Write one A1 range. Values are sent as the sheet would receive typed input.
    pub fn write_range(
        &self,
        sheet_name: &str,
        range: &str,
        values: &[Vec<CellValue>],
    ) -> Result<(), SheetsError> {
        let url = format!("{}/api/inventory-write", self.api_base);
        let body = serde_json::json!({
            "sheetName": sheet_name,
            "range": range,
            "values": values,
        });

        log::debug!("POST {url} range={range}");
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| SheetsError::Network(e.to_string()))?;
        let json = read_body(resp)?;

        if json["success"].as_bool() == Some(true) {
            Ok(())
        } else {
            Err(SheetsError::Parse(format!(
                "write to {range} was not acknowledged: {json}"
            )))
        }
    }

    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, SheetsError> {
        log::debug!("GET {url}");
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .map_err(|e| SheetsError::Network(e.to_string()))?;
        read_body(resp)
    }
}

impl SheetWriter for SheetsClient {
    type Error = SheetsError;

    fn write_range(
        &self,
        sheet_name: &str,
        range: &str,
        values: &[Vec<CellValue>],
    ) -> Result<(), SheetsError> {
        SheetsClient::write_range(self, sheet_name, range, values)
    }
}

fn read_body(resp: reqwest::blocking::Response) -> Result<Value, SheetsError> {
    let status = resp.status();
    let text = resp
        .text()
        .map_err(|e| SheetsError::Network(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["error"].as_str().map(String::from))
            .unwrap_or(text);
        return Err(SheetsError::Http {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| SheetsError::Parse(e.to_string()))
}

/// `{"values": [[..]]}` to a string grid. A missing `values` key is an empty
/// range; non-string cells are stringified.
pub fn grid_from_json(json: &Value) -> Result<Vec<Vec<String>>, SheetsError> {
    let rows = match &json["values"] {
        Value::Null => return Ok(Vec::new()),
        Value::Array(rows) => rows,
        other => {
            return Err(SheetsError::Parse(format!(
                "values is not an array: {other}"
            )))
        }
    };

    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => Ok(cells.iter().map(cell_text).collect()),
            other => Err(SheetsError::Parse(format!("row is not an array: {other}"))),
        })
        .collect()
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
