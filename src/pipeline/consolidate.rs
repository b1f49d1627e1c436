//! Stage 4: cross-document consolidation.
//!
//! Per-document stage-3 outputs are merged into corpus-wide master files.
//! Each table row is enriched with its nearest numbered section, nearest
//! caption and ordinal within the page, so downstream consumers can join
//! tables back to prose without re-reading the documents.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use regex::Regex;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::model::{
    Block, DocSummary, MasterSectionRow, MasterTableRow, MergedDocSummary, MergedSummary,
    PidIndexRow, SectionRow, TableUid,
};
use crate::pipeline::{recreate_dir, write_json};
use crate::rules::CompiledRules;

/// What stage 4 did.
#[derive(Debug, Clone, Default)]
pub struct ConsolidateReport {
    pub documents: usize,
    pub section_rows: usize,
    pub table_rows: usize,
    pub pid_rows: usize,
    pub failed_documents: usize,
}

struct DocConsolidation {
    summary: DocSummary,
    sections: Vec<MasterSectionRow>,
    tables: Vec<MasterTableRow>,
    pid_rows: Vec<PidIndexRow>,
}

/// Merge every parsed document into the corpus-wide master files.
pub fn consolidate(config: &PipelineConfig) -> Result<ConsolidateReport> {
    let rules = config.rules.compile()?;
    // Structural shape of an enrichable section number, not corpus tuning.
    let numbered = Regex::new(r"^\d+(\.\d+)*$").map_err(|e| Error::Other(e.to_string()))?;
    let blocks_root = config.blocks_dir();
    let out_root = config.consolidated_dir();
    recreate_dir(&out_root)?;

    let mut report = ConsolidateReport::default();
    let mut all_sections: Vec<MasterSectionRow> = Vec::new();
    let mut all_tables: Vec<MasterTableRow> = Vec::new();
    let mut all_pid: Vec<PidIndexRow> = Vec::new();
    let mut merged_docs: Vec<MergedDocSummary> = Vec::new();

    for doc_dir in discover_doc_dirs(&blocks_root)? {
        match consolidate_document(&rules, &numbered, &doc_dir) {
            Ok(doc) => {
                report.documents += 1;
                let mut pid_pages: Vec<u32> = doc.pid_rows.iter().map(|r| r.page).collect();
                pid_pages.sort_unstable();
                pid_pages.dedup();
                merged_docs.push(MergedDocSummary {
                    summary: doc.summary,
                    sections_count: doc.sections.len() as u64,
                    tables_count: doc.tables.len() as u64,
                    pid_pages,
                });
                all_sections.extend(doc.sections);
                all_tables.extend(doc.tables);
                all_pid.extend(doc.pid_rows);
            }
            Err(e) => {
                report.failed_documents += 1;
                warn!("{}: cannot consolidate: {e}", doc_dir.display());
            }
        }
    }

    report.section_rows = all_sections.len();
    report.table_rows = all_tables.len();
    report.pid_rows = all_pid.len();

    write_sections_master(&out_root.join("master_sections.csv"), &all_sections)?;
    write_tables_master(&out_root.join("master_tables.csv"), &all_tables)?;
    write_pid_index(&out_root.join("pid_index.csv"), &all_pid)?;
    write_json(
        &out_root.join("merged_summary.json"),
        &MergedSummary {
            generated_at: Utc::now(),
            documents: merged_docs,
        },
    )?;

    info!(
        "consolidated {} documents: {} section rows, {} table rows, {} pid rows ({} failed)",
        report.documents,
        report.section_rows,
        report.table_rows,
        report.pid_rows,
        report.failed_documents
    );
    Ok(report)
}

/// Stage-3 document directories, identified by their `summary.json`,
/// sorted by name.
fn discover_doc_dirs(blocks_root: &Path) -> Result<Vec<PathBuf>> {
    if !blocks_root.is_dir() {
        return Err(Error::MissingInput {
            doc_id: "corpus".to_string(),
            path: blocks_root.to_path_buf(),
        });
    }
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(blocks_root)? {
        let path = entry?.path();
        if path.is_dir() && path.join("summary.json").is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn consolidate_document(
    rules: &CompiledRules,
    numbered: &Regex,
    doc_dir: &Path,
) -> Result<DocConsolidation> {
    let summary: DocSummary =
        serde_json::from_str(&fs::read_to_string(doc_dir.join("summary.json"))?)?;
    let doc_type = summary.doc_type.as_str().to_string();

    let section_rows = load_sections(doc_dir, &summary)?;

    // Nearest numbered section and first caption per page, scanned in
    // document order so the last section on a page wins.
    let mut nearest: BTreeMap<u32, (String, String)> = BTreeMap::new();
    let mut captions: BTreeMap<u32, String> = BTreeMap::new();
    for row in &section_rows {
        if let Some(number) = row.section_number.as_deref() {
            if numbered.is_match(number) {
                let title = row.section_title.clone().unwrap_or_default();
                nearest.insert(row.page, (number.to_string(), title));
            }
        }
        let candidate = match row.section_title.as_deref() {
            Some(title) if !title.is_empty() => title,
            _ => row.text.as_str(),
        };
        if rules.caption.is_match(candidate) {
            captions.entry(row.page).or_insert_with(|| candidate.to_string());
        }
    }

    let cell_rows = load_table_rows(doc_dir)?;
    let mut page_tables: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (page, idx, _, _) in &cell_rows {
        let tables = page_tables.entry(*page).or_default();
        if !tables.contains(idx) {
            tables.push(*idx);
        }
    }

    let mut tables = Vec::with_capacity(cell_rows.len());
    for (page, idx, row, cells) in cell_rows {
        let (section_number_near, section_title_near) = nearest
            .get(&page)
            .or_else(|| page.checked_sub(1).and_then(|p| nearest.get(&p)))
            .cloned()
            .unwrap_or_default();
        let caption_near = captions.get(&page).cloned().unwrap_or_default();
        let table_order_in_page = page_tables
            .get(&page)
            .and_then(|tables| tables.iter().position(|t| *t == idx))
            .map_or(0, |p| p as u32 + 1);
        tables.push(MasterTableRow {
            doc_id: summary.doc_id.clone(),
            doc_type: doc_type.clone(),
            file_name: summary.file_name.clone(),
            page,
            table_idx: idx,
            row,
            table_uid: TableUid::new(&summary.doc_id, page, idx),
            section_number_near,
            section_title_near,
            caption_near,
            table_order_in_page,
            cells,
        });
    }

    let sections = section_rows
        .into_iter()
        .map(|row| MasterSectionRow::from_section(row, &summary.doc_id, &doc_type, &summary.file_name))
        .collect();
    let pid_rows = load_pid_rows(doc_dir, &summary, &doc_type)?;

    Ok(DocConsolidation {
        summary,
        sections,
        tables,
        pid_rows,
    })
}

/// Section rows from `TEXT_sections.csv`, or derived from `blocks.jsonl`
/// when the CSV was never written (diagram pages excluded).
fn load_sections(doc_dir: &Path, summary: &DocSummary) -> Result<Vec<SectionRow>> {
    let csv_path = doc_dir.join("TEXT_sections.csv");
    if csv_path.is_file() {
        let mut rows = Vec::new();
        let mut reader = csv::Reader::from_path(&csv_path)?;
        for row in reader.deserialize() {
            rows.push(row?);
        }
        return Ok(rows);
    }

    let jsonl_path = doc_dir.join("blocks.jsonl");
    if !jsonl_path.is_file() {
        return Ok(Vec::new());
    }
    let pid_pages: Vec<u32> = summary.pid_context.iter().map(|c| c.page).collect();
    let mut rows = Vec::new();
    for line in fs::read_to_string(&jsonl_path)?.lines() {
        let block: Block = serde_json::from_str(line)?;
        if pid_pages.contains(&block.source().page) {
            continue;
        }
        match block {
            Block::SectionHeader {
                section_number,
                section_title,
                source,
            } => rows.push(SectionRow {
                kind: "section_header".to_string(),
                section_number: Some(section_number),
                section_title: Some(section_title),
                text: String::new(),
                page: source.page,
            }),
            Block::Paragraph {
                section_number,
                section_title,
                text,
                source,
            } => rows.push(SectionRow {
                kind: "paragraph".to_string(),
                section_number,
                section_title,
                text,
                page: source.page,
            }),
            _ => {}
        }
    }
    Ok(rows)
}

/// Table cell rows as `(page, table_idx, row, cells)`, from
/// `TEXT_tables_all.csv` or merged from the raw per-table CSVs.
#[allow(clippy::type_complexity)]
fn load_table_rows(doc_dir: &Path) -> Result<Vec<(u32, u32, u32, Vec<String>)>> {
    let all_path = doc_dir.join("TEXT_tables_all.csv");
    if all_path.is_file() {
        let mut rows = Vec::new();
        let mut reader = csv::Reader::from_path(&all_path)?;
        for record in reader.records() {
            let record = record?;
            let page = parse_cell(record.get(0));
            let idx = parse_cell(record.get(1));
            let row = parse_cell(record.get(2));
            // Page, table and row numbering is 1-based; a zero means the
            // record is damaged and would mint a bogus table uid.
            if page == 0 || idx == 0 || row == 0 {
                return Err(Error::Validation(format!(
                    "{}: malformed table row ({:?}, {:?}, {:?})",
                    all_path.display(),
                    record.get(0),
                    record.get(1),
                    record.get(2)
                )));
            }
            let cells = record.iter().skip(3).map(str::to_string).collect();
            rows.push((page, idx, row, cells));
        }
        return Ok(rows);
    }

    let tables_dir = doc_dir.join("tables");
    if !tables_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<(u32, u32, PathBuf)> = Vec::new();
    for entry in fs::read_dir(&tables_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((page, idx)) = table_file_key(name) {
            files.push((page, idx, path));
        }
    }
    files.sort();

    let mut rows = Vec::new();
    for (page, idx, path) in files {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let cells = record.iter().map(str::to_string).collect();
            rows.push((page, idx, i as u32 + 1, cells));
        }
    }
    Ok(rows)
}

/// `page_004_table02.csv` -> `(4, 2)`.
fn table_file_key(name: &str) -> Option<(u32, u32)> {
    let stem = name.strip_suffix(".csv")?;
    let rest = stem.strip_prefix("page_")?;
    let (page, idx) = rest.split_once("_table")?;
    Some((page.parse().ok()?, idx.parse().ok()?))
}

fn parse_cell(cell: Option<&str>) -> u32 {
    cell.and_then(|c| c.trim().parse().ok()).unwrap_or(0)
}

/// Diagram context rows concatenated from `pid_context/*_pid_context.csv`.
fn load_pid_rows(doc_dir: &Path, summary: &DocSummary, doc_type: &str) -> Result<Vec<PidIndexRow>> {
    let context_dir = doc_dir.join("pid_context");
    if !context_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(&context_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_pid_context.csv"))
        })
        .collect();
    files.sort();

    let mut rows = Vec::new();
    for path in files {
        let mut reader = csv::Reader::from_path(&path)?;
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or_default().to_string();
            rows.push(PidIndexRow {
                doc_id: summary.doc_id.clone(),
                doc_type: doc_type.to_string(),
                file_name: summary.file_name.clone(),
                page: parse_cell(record.get(0)),
                pid_like: record.get(1) == Some("true"),
                pid_reference: field(2),
                pid_note: field(3),
                rule: field(4),
                evidence: field(5),
            });
        }
    }
    Ok(rows)
}

fn write_sections_master(path: &Path, rows: &[MasterSectionRow]) -> Result<()> {
    if rows.is_empty() {
        fs::write(path, "")?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_tables_master(path: &Path, rows: &[MasterTableRow]) -> Result<()> {
    if rows.is_empty() {
        fs::write(path, "")?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(MasterTableRow::headers())?;
    for row in rows {
        writer.write_record(row.record())?;
    }
    writer.flush()?;
    Ok(())
}

fn write_pid_index(path: &Path, rows: &[PidIndexRow]) -> Result<()> {
    if rows.is_empty() {
        fs::write(path, "")?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
