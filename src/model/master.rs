//! Row types for the per-document and corpus-wide CSV outputs.
//!
//! The wide table rows carry a fixed block of generic cell columns
//! (`c1..c50`) so tables of any width share one schema. Those rows are
//! written through explicit record builders; the narrow rows go through
//! serde.

use serde::{Deserialize, Serialize};

use crate::model::TableUid;

/// Width of the generic cell column block (`c1..c50`).
pub const MASTER_CELL_COLUMNS: usize = 50;

/// Header names for the generic cell columns.
pub fn cell_column_names() -> Vec<String> {
    (1..=MASTER_CELL_COLUMNS).map(|i| format!("c{i}")).collect()
}

/// One section-header or paragraph row in a document's `TEXT_sections.csv`.
///
/// Field order matches the CSV header order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRow {
    /// `section_header` or `paragraph`.
    #[serde(rename = "type")]
    pub kind: String,
    pub section_number: Option<String>,
    pub section_title: Option<String>,
    pub text: String,
    pub page: u32,
}

/// A section row joined with document metadata, for `master_sections.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterSectionRow {
    pub doc_id: String,
    pub doc_type: String,
    pub file_name: String,
    pub page: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub section_number: Option<String>,
    pub section_title: Option<String>,
    pub text: String,
}

impl MasterSectionRow {
    pub fn from_section(row: SectionRow, doc_id: &str, doc_type: &str, file_name: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            doc_type: doc_type.to_string(),
            file_name: file_name.to_string(),
            page: row.page,
            kind: row.kind,
            section_number: row.section_number,
            section_title: row.section_title,
            text: row.text,
        }
    }
}

/// One table row flattened into `TEXT_tables_all.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct TablesAllRow {
    pub page: u32,
    pub table_idx: u32,
    /// 1-based row number within the table.
    pub row: u32,
    pub cells: Vec<String>,
}

impl TablesAllRow {
    pub fn headers() -> Vec<String> {
        let mut h = vec!["_page".to_string(), "_table_idx".to_string(), "_row".to_string()];
        h.extend(cell_column_names());
        h
    }

    /// Full record, cells padded or truncated to the fixed column block.
    pub fn record(&self) -> Vec<String> {
        let mut rec = vec![
            self.page.to_string(),
            self.table_idx.to_string(),
            self.row.to_string(),
        ];
        rec.extend(padded_cells(&self.cells));
        rec
    }
}

/// One enriched table row in the corpus-wide `master_tables.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterTableRow {
    pub doc_id: String,
    pub doc_type: String,
    pub file_name: String,
    pub page: u32,
    pub table_idx: u32,
    pub row: u32,
    pub table_uid: TableUid,
    pub section_number_near: String,
    pub section_title_near: String,
    pub caption_near: String,
    pub table_order_in_page: u32,
    pub cells: Vec<String>,
}

impl MasterTableRow {
    pub fn headers() -> Vec<String> {
        let mut h: Vec<String> = [
            "doc_id",
            "doc_type",
            "file_name",
            "_page",
            "_table_idx",
            "_row",
            "table_uid",
            "section_number_near",
            "section_title_near",
            "caption_near",
            "table_order_in_page",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        h.extend(cell_column_names());
        h
    }

    pub fn record(&self) -> Vec<String> {
        let mut rec = vec![
            self.doc_id.clone(),
            self.doc_type.clone(),
            self.file_name.clone(),
            self.page.to_string(),
            self.table_idx.to_string(),
            self.row.to_string(),
            self.table_uid.to_string(),
            self.section_number_near.clone(),
            self.section_title_near.clone(),
            self.caption_near.clone(),
            self.table_order_in_page.to_string(),
        ];
        rec.extend(padded_cells(&self.cells));
        rec
    }
}

/// One diagram-context row in the corpus-wide `pid_index.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidIndexRow {
    pub doc_id: String,
    pub doc_type: String,
    pub file_name: String,
    pub page: u32,
    pub pid_like: bool,
    pub pid_reference: String,
    pub pid_note: String,
    pub rule: String,
    pub evidence: String,
}

fn padded_cells(cells: &[String]) -> Vec<String> {
    let mut out: Vec<String> = cells.iter().take(MASTER_CELL_COLUMNS).cloned().collect();
    out.resize(MASTER_CELL_COLUMNS, String::new());
    out
}
