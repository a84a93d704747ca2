use std::collections::HashMap;

use crate::model::CatalogRow;

/// Case-insensitive lookup view over a borrowed set of catalog rows.
pub struct CatalogIndex<'a> {
    rows: &'a [CatalogRow],
    by_primary: HashMap<String, Vec<usize>>,
    by_secondary: HashMap<String, usize>,
}

impl<'a> CatalogIndex<'a> {
    pub fn build(rows: &'a [CatalogRow]) -> Self {
        let mut by_primary: HashMap<String, Vec<usize>> = HashMap::with_capacity(rows.len());
        let mut by_secondary: HashMap<String, usize> = HashMap::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            if !row.primary_code.is_empty() {
                by_primary.entry(fold(&row.primary_code)).or_default().push(i);
            }
            if !row.secondary_code.is_empty() {
                // First occurrence wins on duplicate secondary codes
                by_secondary.entry(fold(&row.secondary_code)).or_insert(i);
            }
        }

        Self {
            rows,
            by_primary,
            by_secondary,
        }
    }

    /// Every row whose primary code equals `code`, in catalog order.
    pub fn find_by_primary_code(&self, code: &str) -> Vec<&'a CatalogRow> {
        if code.is_empty() {
            return Vec::new();
        }
        let rows = self.rows;
        self.by_primary
            .get(&fold(code))
            .map(|idxs| idxs.iter().map(|&i| &rows[i]).collect())
            .unwrap_or_default()
    }

    /// The first row whose secondary code equals `code`.
    pub fn find_by_secondary_code(&self, code: &str) -> Option<&'a CatalogRow> {
        if code.is_empty() {
            return None;
        }
        self.by_secondary.get(&fold(code)).map(|&i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub(crate) fn fold(code: &str) -> String {
    code.to_lowercase()
}
