use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (overlapping groups, bad column letters, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// Required header missing from the order file.
    #[error("order file: missing column '{column}'")]
    MissingColumn { column: String },

    /// Malformed order CSV (bad quoting, I/O while reading records).
    #[error("order file: {0}")]
    OrderCsv(#[from] csv::Error),

    /// A required write parameter is missing or malformed.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The order file produced no sales against any inventory row.
    #[error("nothing to write: no inventory row has sales in this run")]
    EmptyUpdateSet,

    /// Every candidate column group already holds ledger entries.
    #[error(
        "no available write slot: all {} candidate column groups already hold entries; \
         {} row(s) left unwritten: {}",
        .offsets.len(),
        .pending.len(),
        .pending.join(", ")
    )]
    NoWriteSlot {
        offsets: Vec<usize>,
        pending: Vec<String>,
    },

    /// Stock minus sales does not fit in a signed 64-bit quantity.
    #[error("row {row} (JAN '{jan}'): updated quantity is out of range")]
    QuantityOverflow { row: u32, jan: String },

    /// An update item no longer lines up with the snapshot it came from.
    #[error("row {row} (JAN '{jan}') is not present in the inventory snapshot")]
    RowNotInSnapshot { row: u32, jan: String },
}
