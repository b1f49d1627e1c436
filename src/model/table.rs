//! Table types and the stable table identity key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::TableShape;

/// Deterministic table key: `{doc_id}::p{page:03}::t{index:02}`.
///
/// Unique within a document and stable across reruns as long as the
/// extraction order is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableUid(String);

impl TableUid {
    pub fn new(doc_id: &str, page: u32, index: u32) -> Self {
        Self(format!("{doc_id}::p{page:03}::t{index:02}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TableUid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One table extracted from a page, rows of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTable {
    /// 1-based page number.
    pub page: u32,
    /// 1-based index among the page's tables, in extraction order.
    pub index: u32,
    pub rows: Vec<Vec<String>>,
}

impl PageTable {
    pub fn new(page: u32, index: u32, rows: Vec<Vec<String>>) -> Self {
        Self { page, index, rows }
    }

    /// Row count and widest row.
    pub fn shape(&self) -> TableShape {
        TableShape {
            rows: self.rows.len(),
            cols: self.rows.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    pub fn total_cells(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn empty_cells(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.iter())
            .filter(|c| c.trim().is_empty())
            .count()
    }

    /// Fraction of cells without content; 0 for an empty table.
    pub fn empty_ratio(&self) -> f64 {
        let total = self.total_cells();
        if total == 0 {
            return 0.0;
        }
        self.empty_cells() as f64 / total as f64
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn uid(&self, doc_id: &str) -> TableUid {
        TableUid::new(doc_id, self.page, self.index)
    }

    /// File stem shared by the raw and clean CSV artifacts.
    pub fn file_stem(&self) -> String {
        format!("page_{:03}_table{:02}", self.page, self.index)
    }
}
