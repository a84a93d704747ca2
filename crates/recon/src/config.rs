use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::a1::{col_to_letter, letter_to_col};
use crate::error::ReconError;
use crate::model::{ColumnGroup, GROUP_WIDTH};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconConfig {
    pub name: String,
    pub catalog: CatalogSchema,
    pub inventory: InventoryLayout,
    pub orders: OrderColumns,
    pub aggregation: AggregationConfig,
    pub write: WriteConfig,
    /// Lot-override code (from the order file) -> single-unit multiplier.
    pub lot_overrides: BTreeMap<String, u32>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            catalog: CatalogSchema::default(),
            inventory: InventoryLayout::default(),
            orders: OrderColumns::default(),
            aggregation: AggregationConfig::default(),
            write: WriteConfig::default(),
            lot_overrides: BTreeMap::from([
                ("-2".to_string(), 2),
                ("-4".to_string(), 4),
                ("-6".to_string(), 6),
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog schema
// ---------------------------------------------------------------------------

/// Column offsets into the product master grid.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSchema {
    /// Leading rows of the grid that are labels, not products.
    pub header_rows: usize,
    pub asin: usize,
    pub jan: usize,
    pub lot_unit: usize,
    pub primary_code: usize,
    pub secondary_code: usize,
    pub product_name: usize,
}

impl Default for CatalogSchema {
    fn default() -> Self {
        Self {
            header_rows: 1,
            asin: 4,
            jan: 5,
            lot_unit: 6,
            primary_code: 15,
            secondary_code: 16,
            product_name: 17,
        }
    }
}

impl CatalogSchema {
    fn fields(&self) -> [(&'static str, usize); 6] {
        [
            ("asin", self.asin),
            ("jan", self.jan),
            ("lot_unit", self.lot_unit),
            ("primary_code", self.primary_code),
            ("secondary_code", self.secondary_code),
            ("product_name", self.product_name),
        ]
    }
}

// ---------------------------------------------------------------------------
// Inventory layout
// ---------------------------------------------------------------------------

/// Shape of one inventory sheet as returned by the inventory reader.
///
/// Offsets are relative to `first_column`, the leftmost column of the read
/// range. The grid's first row is the header, which sits on `header_row`
/// (1-based); data rows follow directly below it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InventoryLayout {
    pub first_column: String,
    pub header_row: u32,
    pub product_name: usize,
    pub asin: usize,
    pub jan: usize,
    pub quantity: usize,
    /// Starting offsets of the 4-wide ledger groups, in the order they are tried.
    pub group_offsets: Vec<usize>,
}

impl Default for InventoryLayout {
    fn default() -> Self {
        Self {
            first_column: "C".into(),
            header_row: 3,
            product_name: 0,
            asin: 4,
            jan: 5,
            quantity: 6,
            group_offsets: vec![7, 11, 15, 19, 23, 27],
        }
    }
}

impl InventoryLayout {
    pub fn first_column_index(&self) -> Option<usize> {
        letter_to_col(&self.first_column)
    }

    /// Offset where the historical ledger region starts.
    pub fn ledger_start(&self) -> usize {
        self.group_offsets.iter().copied().min().unwrap_or(0)
    }

    pub fn candidate_groups(&self) -> Vec<ColumnGroup> {
        self.group_offsets
            .iter()
            .map(|&offset| ColumnGroup { offset })
            .collect()
    }

    /// Sheet column letters for a logical offset.
    pub fn column_letters(&self, offset: usize) -> Result<String, ReconError> {
        let base = self.first_column_index().ok_or_else(|| {
            ReconError::ConfigValidation(format!(
                "inventory.first_column '{}' is not a column name",
                self.first_column
            ))
        })?;
        Ok(col_to_letter(base + offset))
    }
}

// ---------------------------------------------------------------------------
// Order file columns
// ---------------------------------------------------------------------------

/// Header names in the marketplace order export.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrderColumns {
    pub item_code: String,
    pub item_sku: String,
    pub quantity: String,
    pub product_name: String,
    /// Optional: exports without a lot-override column still load.
    pub lot_override: Option<String>,
}

impl Default for OrderColumns {
    fn default() -> Self {
        Self {
            item_code: "商品コード".into(),
            item_sku: "商品SKU".into(),
            quantity: "個数".into(),
            product_name: "商品名".into(),
            lot_override: Some("SKU管理番号".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation + Write
// ---------------------------------------------------------------------------

/// What happens when two order lines resolve to the same sales key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulationPolicy {
    /// Add every colliding line's counts into the first entry.
    #[default]
    Sum,
    /// Keep the first line's counts; later collisions contribute nothing.
    FirstWins,
}

impl std::fmt::Display for AccumulationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::FirstWins => write!(f, "first_wins"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub policy: AccumulationPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WriteConfig {
    /// Upper bound on concurrently dispatched range writes.
    pub max_in_flight: usize,
    /// Accepted manager names. Empty accepts anyone.
    pub staff: Vec<String>,
}

/// Warehouse roster accepted as managers when no `[write] staff` is configured.
const DEFAULT_STAFF: [&str; 6] = ["宮原", "田中", "河野", "木村", "森本", "廣瀬"];

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            staff: DEFAULT_STAFF.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ReconError> {
        toml::to_string_pretty(self).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.validate_catalog()?;
        self.validate_inventory()?;

        for (name, label) in [
            (&self.orders.item_code, "item_code"),
            (&self.orders.item_sku, "item_sku"),
            (&self.orders.quantity, "quantity"),
            (&self.orders.product_name, "product_name"),
        ] {
            if name.trim().is_empty() {
                return Err(invalid(format!("orders.{label} must name a column")));
            }
        }

        for (code, mult) in &self.lot_overrides {
            if code.is_empty() {
                return Err(invalid("lot_overrides: empty override code".into()));
            }
            if *mult == 0 {
                return Err(invalid(format!("lot_overrides: '{code}' must be at least 1")));
            }
        }

        if self.write.max_in_flight == 0 {
            return Err(invalid("write.max_in_flight must be at least 1".into()));
        }

        Ok(())
    }

    fn validate_catalog(&self) -> Result<(), ReconError> {
        let fields = self.catalog.fields();
        for (i, (name, offset)) in fields.iter().enumerate() {
            if let Some((other, _)) = fields[..i].iter().find(|(_, o)| o == offset) {
                return Err(invalid(format!(
                    "catalog.{name} and catalog.{other} share offset {offset}"
                )));
            }
        }
        Ok(())
    }

    fn validate_inventory(&self) -> Result<(), ReconError> {
        let inv = &self.inventory;

        if inv.first_column_index().is_none() {
            return Err(invalid(format!(
                "inventory.first_column '{}' is not a column name",
                inv.first_column
            )));
        }
        if inv.header_row == 0 {
            return Err(invalid("inventory.header_row is 1-based".into()));
        }
        if inv.group_offsets.is_empty() {
            return Err(invalid("inventory.group_offsets is empty".into()));
        }

        for pair in inv.group_offsets.windows(2) {
            if pair[0] + GROUP_WIDTH > pair[1] {
                return Err(invalid(format!(
                    "inventory.group_offsets must increase by at least {GROUP_WIDTH} \
                     ({} then {})",
                    pair[0], pair[1]
                )));
            }
        }

        let ledger_start = inv.ledger_start();
        for (name, offset) in [
            ("product_name", inv.product_name),
            ("asin", inv.asin),
            ("jan", inv.jan),
            ("quantity", inv.quantity),
        ] {
            if offset >= ledger_start {
                return Err(invalid(format!(
                    "inventory.{name} (offset {offset}) falls inside the ledger region \
                     starting at {ledger_start}"
                )));
            }
        }

        Ok(())
    }
}

fn invalid(msg: String) -> ReconError {
    ReconError::ConfigValidation(msg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ReconConfig::default();
        config.validate().unwrap();
        assert_eq!(config.inventory.ledger_start(), 7);
        assert_eq!(config.inventory.candidate_groups().len(), 6);
        assert_eq!(config.lot_overrides["-4"], 4);
    }

    #[test]
    fn default_staff_is_the_warehouse_roster() {
        let config = ReconConfig::default();
        assert_eq!(config.write.staff[0], "宮原");
        assert!(config.write.staff.iter().any(|s| s == "廣瀬"));

        let open = ReconConfig::from_toml("[write]\nstaff = []\n").unwrap();
        assert!(open.write.staff.is_empty());
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = ReconConfig::default().to_toml().unwrap();
        let parsed = ReconConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.inventory.group_offsets, vec![7, 11, 15, 19, 23, 27]);
        assert_eq!(parsed.catalog.primary_code, 15);
        assert_eq!(parsed.orders.lot_override.as_deref(), Some("SKU管理番号"));
        assert_eq!(parsed.write.staff.len(), 6);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let input = r#"
name = "Warehouse B"

[aggregation]
policy = "first_wins"

[inventory]
first_column = "B"
group_offsets = [8, 12]
"#;
        let config = ReconConfig::from_toml(input).unwrap();
        assert_eq!(config.name, "Warehouse B");
        assert_eq!(config.aggregation.policy, AccumulationPolicy::FirstWins);
        assert_eq!(config.inventory.header_row, 3);
        assert_eq!(config.inventory.column_letters(8).unwrap(), "J");
        assert_eq!(config.catalog.secondary_code, 16);
    }

    #[test]
    fn reject_overlapping_groups() {
        let input = r#"
[inventory]
group_offsets = [7, 10]
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("increase by at least 4"));
    }

    #[test]
    fn reject_out_of_order_groups() {
        let input = r#"
[inventory]
group_offsets = [11, 7]
"#;
        assert!(ReconConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_field_inside_ledger() {
        let input = r#"
[inventory]
quantity = 9
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("inventory.quantity"));
    }

    #[test]
    fn reject_shared_catalog_offset() {
        let input = r#"
[catalog]
jan = 4
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("share offset 4"));
    }

    #[test]
    fn reject_bad_first_column() {
        let input = r#"
[inventory]
first_column = "C3"
"#;
        assert!(ReconConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_zero_override() {
        let input = r#"
[lot_overrides]
"-2" = 0
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("'-2'"));
    }

    #[test]
    fn reject_unknown_policy() {
        let input = r#"
[aggregation]
policy = "replace"
"#;
        assert!(ReconConfig::from_toml(input).is_err());
    }
}
