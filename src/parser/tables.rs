//! Table filtering, cleaning and validation.
//!
//! Extraction keeps tables permissively (only extreme noise is dropped)
//! so the raw artifacts stay complete. Cleaning normalizes every cell
//! and prunes fully-empty rows and columns. Datasheet validation is the
//! strict gate: only tables passing it feed the per-document master.

use crate::config::TableOptions;
use crate::text::{normalize_cell, row_has_content, CellFixup};

/// Widest row in the table, zero when empty.
pub fn max_width(rows: &[Vec<String>]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}

/// Permissive extraction filter: enough cells, not almost all blank.
pub fn keep_table(rows: &[Vec<String>], opts: &TableOptions) -> bool {
    if rows.is_empty() {
        return false;
    }
    let total: usize = rows.iter().map(Vec::len).sum();
    if total < opts.min_total_cells {
        return false;
    }
    let empty = rows
        .iter()
        .flatten()
        .filter(|cell| cell.trim().is_empty())
        .count();
    empty as f64 / total.max(1) as f64 <= opts.max_empty_ratio
}

/// Normalize every cell, then drop rows and columns that end up fully
/// empty. Ragged rows are squared up to the widest one first so column
/// pruning lines up.
pub fn clean_table(rows: &[Vec<String>], fixups: &[CellFixup]) -> Vec<Vec<String>> {
    let kept: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| normalize_cell(cell, fixups)).collect())
        .filter(|row: &Vec<String>| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    let width = max_width(&kept);
    let mut keep_col = vec![false; width];
    for row in &kept {
        for (idx, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                keep_col[idx] = true;
            }
        }
    }

    kept.into_iter()
        .map(|mut row| {
            row.resize(width, String::new());
            row.into_iter()
                .zip(&keep_col)
                .filter_map(|(cell, &keep)| keep.then_some(cell))
                .collect()
        })
        .collect()
}

/// Strict datasheet gate over a cleaned table: minimum rows, minimum
/// width, bounded emptiness, and at least the minimum number of rows
/// carrying real content.
pub fn is_valid_datasheet(rows: &[Vec<String>], opts: &TableOptions) -> bool {
    if rows.len() < opts.datasheet_min_content_rows {
        return false;
    }
    if max_width(rows) < opts.datasheet_min_columns {
        return false;
    }
    let total: usize = rows.iter().map(Vec::len).sum();
    if total == 0 {
        return false;
    }
    let empty = rows
        .iter()
        .flatten()
        .filter(|cell| cell.trim().is_empty())
        .count();
    if empty as f64 / total as f64 > opts.datasheet_max_empty_ratio {
        return false;
    }
    let content_rows = rows.iter().filter(|row| row_has_content(row)).count();
    content_rows >= opts.datasheet_min_content_rows
}

/// Narrow tables read as title blocks or legend fragments, not data.
pub fn is_small_table(rows: &[Vec<String>], max_cols: usize) -> bool {
    max_width(rows) <= max_cols
}

/// Pad every row with empty cells up to `width`.
pub fn pad_rows(rows: &[Vec<String>], width: usize) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            let mut padded = row.clone();
            padded.resize(width, String::new());
            padded
        })
        .collect()
}
