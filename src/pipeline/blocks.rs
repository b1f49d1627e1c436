//! Stage 3: page classification and structural parsing.
//!
//! The driver walks the stage-1 manifests, classifies every page and hands
//! it to one of two strategies: diagram pages get context and placeholder
//! artifacts, text pages get section/check/table parsing. A strategy
//! failure is recorded on the page and the loop keeps going.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Outcome, Result};
use crate::model::{
    Block, BlockSource, CheckState, DatasheetSummary, DocSummary, DocType, DocumentManifest,
    EmbeddedPidOutput, PageEntry, PageRecord, PageTable, PidContext, SectionRow, TableShape,
    TablesAllRow, ValidTableRef,
};
use crate::parser::{
    apply_page_rules, build_datasheet_tidy, classify_page, clean_table, detect_test_type,
    extract_note, extract_reference, is_small_table, is_valid_datasheet, keep_table,
    line_has_checkmark, pad_rows, segment_sections, RULE_NO_PID,
};
use crate::pipeline::{read_extract_index, recreate_dir, write_json, write_jsonl};
use crate::rules::CompiledRules;
use crate::source::PageSource;
use crate::text;

/// What stage 3 did.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub documents: usize,
    pub pages: usize,
    pub blocks: usize,
    pub failed_documents: usize,
}

/// Output directories for one document's stage-3 artifacts. Subdirectories
/// are created on first write, so documents without tables or diagram pages
/// stay flat.
pub struct DocDirs {
    pub doc_dir: PathBuf,
    pub tables_dir: PathBuf,
    pub tables_clean_dir: PathBuf,
    pub pid_context_dir: PathBuf,
}

impl DocDirs {
    fn new(blocks_root: &Path, doc_id: &str) -> Self {
        let doc_dir = blocks_root.join(doc_id);
        Self {
            tables_dir: doc_dir.join("tables"),
            tables_clean_dir: doc_dir.join("tables_clean"),
            pid_context_dir: doc_dir.join("pid_context"),
            doc_dir,
        }
    }
}

/// Everything a strategy may read about the page it processes.
pub struct PageContext<'a> {
    pub source: BlockSource,
    pub text: &'a str,
    /// Raw tables as reported by the source, 1-based indices preserved.
    pub tables: &'a [PageTable],
    pub class: &'a PidContext,
    pub dirs: &'a DocDirs,
    pub config: &'a PipelineConfig,
    pub rules: &'a CompiledRules,
}

/// What one strategy produced for one page.
#[derive(Debug, Default)]
pub struct PageOutput {
    pub blocks: Vec<Block>,
    pub section_rows: Vec<SectionRow>,
    /// Tables that passed the noise filter, as written to `tables/`.
    pub kept_tables: Vec<PageTable>,
    /// Cleaned counterparts, as written to `tables_clean/`.
    pub clean_tables: Vec<PageTable>,
    /// The datasheet-valid subset of the cleaned tables.
    pub valid_tables: Vec<ValidTableRef>,
    pub checks_found: usize,
    pub embedded_pid: Option<EmbeddedPidOutput>,
}

/// A page processing mode selected by the classifier verdict.
pub trait PageStrategy {
    fn name(&self) -> &'static str;

    fn process_page(&self, ctx: &PageContext<'_>) -> Result<PageOutput>;
}

/// Parse every document: classify pages, run strategies, write the
/// per-document block, table and summary artifacts.
pub fn parse_blocks(config: &PipelineConfig, source: &dyn PageSource) -> Result<ParseReport> {
    let rules = config.rules.compile()?;
    let index = read_extract_index(config)?;
    let out_root = config.blocks_dir();
    recreate_dir(&out_root)?;

    let mut report = ParseReport::default();
    for manifest in &index.documents {
        if config.skips(&manifest.doc_id) {
            continue;
        }
        match parse_document(config, source, &rules, manifest, &out_root) {
            Ok((pages, blocks)) => {
                report.documents += 1;
                report.pages += pages;
                report.blocks += blocks;
            }
            Err(e) => {
                report.failed_documents += 1;
                warn!("{}: cannot parse: {e}", manifest.doc_id);
            }
        }
    }
    info!(
        "parsed {} documents, {} pages, {} blocks ({} failed)",
        report.documents, report.pages, report.blocks, report.failed_documents
    );
    Ok(report)
}

/// Accumulated per-document state across the page loop.
#[derive(Default)]
struct DocState {
    records: Vec<PageRecord>,
    blocks: Vec<Block>,
    section_rows: Vec<SectionRow>,
    raw_tables: Vec<PageTable>,
    /// Clean rows of datasheet-valid tables, pooled for the HD master.
    valid_pool: Vec<(ValidTableRef, Vec<Vec<String>>)>,
    pid_context: Vec<PidContext>,
    embedded: Vec<EmbeddedPidOutput>,
    checks_found: usize,
}

impl DocState {
    fn absorb(&mut self, output: PageOutput) {
        self.checks_found += output.checks_found;
        for vref in output.valid_tables {
            if let Some(table) = output
                .clean_tables
                .iter()
                .find(|t| t.page == vref.page && t.index == vref.table_index)
            {
                self.valid_pool.push((vref, table.rows.clone()));
            }
        }
        self.raw_tables.extend(output.kept_tables);
        self.blocks.extend(output.blocks);
        self.section_rows.extend(output.section_rows);
        if let Some(embedded) = output.embedded_pid {
            self.embedded.push(embedded);
        }
    }
}

fn parse_document(
    config: &PipelineConfig,
    source: &dyn PageSource,
    rules: &CompiledRules,
    manifest: &DocumentManifest,
    out_root: &Path,
) -> Result<(usize, usize)> {
    let doc = source.open(&manifest.file_name)?;
    let dirs = DocDirs::new(out_root, &manifest.doc_id);
    fs::create_dir_all(&dirs.doc_dir)?;

    let mut state = DocState::default();
    for entry in &manifest.pages {
        let page = entry.page;
        let page_text = read_page_text(config, entry, &manifest.doc_id);
        let (raw_tables, mut outcome) = match doc.page_tables(page) {
            Ok(tables) => (tables, Outcome::Ok),
            Err(e) => {
                warn!("{} page {page}: {e}", manifest.doc_id);
                (Vec::new(), Outcome::partial(format!("tables unavailable: {e}")))
            }
        };
        let tables: Vec<PageTable> = raw_tables
            .into_iter()
            .enumerate()
            .map(|(i, rows)| PageTable::new(page, i as u32 + 1, rows))
            .collect();
        let shapes: Vec<TableShape> = tables.iter().map(PageTable::shape).collect();

        let mut class = classify_page(&page_text, &shapes, rules, &config.classify);
        apply_page_rules(
            &mut class,
            config.rules.page_rules_for(manifest.doc_type.as_str()),
            page,
        );
        let context = PidContext {
            page,
            pid_like: class.pid_like,
            pid_reference: extract_reference(&page_text, rules),
            pid_note: extract_note(&page_text, rules),
            rule: class.rule_tag().map(str::to_string),
            evidence: class.evidence.clone(),
        };

        let strategy: &dyn PageStrategy = if class.pid_like {
            &DiagramStrategy
        } else {
            &TextTableStrategy
        };
        debug!("{} page {page}: {}", manifest.doc_id, strategy.name());

        let ctx = PageContext {
            source: BlockSource {
                doc_id: manifest.doc_id.clone(),
                doc_type: manifest.doc_type,
                file_name: manifest.file_name.clone(),
                page,
            },
            text: &page_text,
            tables: &tables,
            class: &context,
            dirs: &dirs,
            config,
            rules,
        };

        let mut dispatch_error = None;
        match strategy.process_page(&ctx) {
            Ok(output) => state.absorb(output),
            Err(e) => {
                let err = Error::Dispatch {
                    strategy: strategy.name(),
                    reason: e.to_string(),
                };
                warn!("{} page {page}: {err}", manifest.doc_id);
                dispatch_error = Some(err.to_string());
                outcome = Outcome::failed(err.to_string());
            }
        }

        state.records.push(PageRecord {
            page,
            has_text: !page_text.trim().is_empty(),
            tables_shapes: shapes,
            pid_like: class.pid_like,
            pid_evidence: class.evidence,
            pid_reference: context.pid_reference.clone(),
            pid_note: context.pid_note.clone(),
            dispatched_to: strategy.name().to_string(),
            dispatch_error,
            outcome,
        });
        if class.pid_like {
            state.pid_context.push(context);
        }
    }

    finalize_document(rules, manifest, &dirs, state)
}

/// Cleaned text when stage 2 ran, raw text otherwise, empty when neither
/// file is on disk.
fn read_page_text(config: &PipelineConfig, entry: &PageEntry, doc_id: &str) -> String {
    let clean = config.clean_pages_dir().join(&entry.txt_file);
    let raw = config.raw_pages_dir().join(&entry.txt_file);
    for path in [clean, raw] {
        if let Ok(page_text) = fs::read_to_string(&path) {
            return page_text;
        }
    }
    warn!("{doc_id} page {}: no page text on disk", entry.page);
    String::new()
}

fn finalize_document(
    rules: &CompiledRules,
    manifest: &DocumentManifest,
    dirs: &DocDirs,
    state: DocState,
) -> Result<(usize, usize)> {
    if !state.section_rows.is_empty() {
        let mut writer = csv::Writer::from_path(dirs.doc_dir.join("TEXT_sections.csv"))?;
        for row in &state.section_rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }

    if !state.raw_tables.is_empty() {
        let mut writer = csv::Writer::from_path(dirs.doc_dir.join("TEXT_tables_all.csv"))?;
        writer.write_record(TablesAllRow::headers())?;
        for table in &state.raw_tables {
            for (i, cells) in table.rows.iter().enumerate() {
                let row = TablesAllRow {
                    page: table.page,
                    table_idx: table.index,
                    row: i as u32 + 1,
                    cells: cells.clone(),
                };
                writer.write_record(row.record())?;
            }
        }
        writer.flush()?;
    }

    let datasheet = if manifest.doc_type == DocType::Hd && !state.valid_pool.is_empty() {
        Some(build_datasheet_artifacts(rules, dirs, &state)?)
    } else {
        None
    };

    write_jsonl(&dirs.doc_dir.join("blocks.jsonl"), &state.blocks)?;
    write_json(&dirs.doc_dir.join("blocks.json"), &state.records)?;

    let mut diagram_pages: Vec<u32> = state
        .pid_context
        .iter()
        .map(|c| c.page)
        .chain(state.embedded.iter().map(|e| e.page))
        .collect();
    diagram_pages.sort_unstable();
    diagram_pages.dedup();

    let count = |wanted: fn(&Outcome) -> bool| {
        state.records.iter().filter(|r| wanted(&r.outcome)).count() as u32
    };
    let summary = DocSummary {
        doc_id: manifest.doc_id.clone(),
        file_name: manifest.file_name.clone(),
        doc_type: manifest.doc_type,
        page_count: manifest.n_pages,
        total_blocks: state.blocks.len() as u32,
        total_tables: state.raw_tables.len() as u32,
        checks_found: state.checks_found as u32,
        embedded_pid_pages: diagram_pages,
        pid_context: state.pid_context,
        pages_ok: count(Outcome::is_ok),
        pages_partial: count(|o| matches!(o, Outcome::Partial { .. })),
        pages_failed: count(|o| matches!(o, Outcome::Failed { .. })),
        datasheet,
    };
    write_json(&dirs.doc_dir.join("summary.json"), &summary)?;
    Ok((state.records.len(), state.blocks.len()))
}

/// Pool the validated clean tables into the padded datasheet master and run
/// the tidy extraction over it.
fn build_datasheet_artifacts(
    rules: &CompiledRules,
    dirs: &DocDirs,
    state: &DocState,
) -> Result<DatasheetSummary> {
    let width = state
        .valid_pool
        .iter()
        .flat_map(|(_, rows)| rows.iter().map(Vec::len))
        .max()
        .unwrap_or(0);
    let mut master: Vec<Vec<String>> = Vec::new();
    for (_, rows) in &state.valid_pool {
        master.extend(pad_rows(rows, width));
    }

    let master_path = dirs.doc_dir.join("HD_master_clean.csv");
    let mut writer = csv::Writer::from_path(&master_path)?;
    for row in &master {
        writer.write_record(row)?;
    }
    writer.flush()?;

    let (tidy_rows, tidy) = build_datasheet_tidy(&master, rules);
    let tidy_path = dirs.doc_dir.join("HD_tidy.csv");
    let mut writer = csv::Writer::from_path(&tidy_path)?;
    for row in &tidy_rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(DatasheetSummary {
        master_csv: "HD_master_clean.csv".to_string(),
        tidy_csv: "HD_tidy.csv".to_string(),
        tidy_rows: tidy_rows.len() as u32,
        valid_tables: state.valid_pool.iter().map(|(vref, _)| vref.clone()).collect(),
        pruebas: tidy.tests_detected,
        requisitos_true: tidy.requirements_true,
        banderas_true: tidy.flags_true,
        proceso_fields: tidy.process_fields,
        embedded_outputs: state.embedded.clone(),
    })
}

/// Strategy for pages classified as diagrams: table capture, context row,
/// placeholder artifacts reserved for OCR.
pub struct DiagramStrategy;

impl PageStrategy for DiagramStrategy {
    fn name(&self) -> &'static str {
        "diagram"
    }

    fn process_page(&self, ctx: &PageContext<'_>) -> Result<PageOutput> {
        let mut out = PageOutput::default();
        let page = ctx.source.page;

        // Title blocks on drawings still come through as tables and carry
        // revision data, so they are captured like any other table.
        for table in ctx.tables {
            if !keep_table(&table.rows, &ctx.config.tables) {
                continue;
            }
            write_table_pair(ctx, table, &mut out)?;
        }

        for (suffix, headers) in PLACEHOLDERS {
            let name = format!("page_{page:03}_{suffix}.csv");
            write_records(&ctx.dirs.pid_context_dir.join(name), headers, &[])?;
        }

        let context_name = format!("page_{page:03}_pid_context.csv");
        write_records(
            &ctx.dirs.pid_context_dir.join(context_name),
            CONTEXT_HEADERS,
            &[context_record(ctx.class)],
        )?;
        let summary_name = format!("page_{page:03}_pid_summary.json");
        write_json(&ctx.dirs.pid_context_dir.join(summary_name), ctx.class)?;

        Ok(out)
    }
}

/// Strategy for text and table pages: section segmentation, test/checkbox
/// scan, table capture and datasheet validation.
pub struct TextTableStrategy;

impl PageStrategy for TextTableStrategy {
    fn name(&self) -> &'static str {
        "text_table"
    }

    fn process_page(&self, ctx: &PageContext<'_>) -> Result<PageOutput> {
        let mut out = PageOutput::default();
        let page = ctx.source.page;
        let lines: Vec<&str> = ctx
            .text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        for segment in segment_sections(&lines, ctx.rules) {
            out.section_rows.push(segment.clone().into_row(page));
            out.blocks.push(segment.into_block(ctx.source.clone()));
        }

        for line in &lines {
            let test_type = detect_test_type(line, ctx.rules);
            let marked = line_has_checkmark(line, ctx.rules);
            if test_type.is_none() && !marked {
                continue;
            }
            out.checks_found += 1;
            let line_text = text::normalize_cell(line, &ctx.rules.cell_fixups);
            match test_type {
                Some(test_type) => out.blocks.push(Block::TestRequirement {
                    test_type,
                    text: line_text,
                    has_checkmark: marked,
                    source: ctx.source.clone(),
                }),
                None => out.blocks.push(Block::CheckItem {
                    text: line_text,
                    state: CheckState::Checked,
                    source: ctx.source.clone(),
                }),
            }
        }

        if !skip_tables(ctx.text, ctx.rules) {
            for table in ctx.tables {
                if !keep_table(&table.rows, &ctx.config.tables) {
                    continue;
                }
                let clean_name = write_table_pair(ctx, table, &mut out)?;
                let valid = out
                    .clean_tables
                    .last()
                    .is_some_and(|t| is_valid_datasheet(&t.rows, &ctx.config.tables));
                if valid {
                    out.valid_tables.push(ValidTableRef {
                        page,
                        table_index: table.index,
                        clean_csv: format!("tables_clean/{clean_name}"),
                    });
                }
            }
        }

        if let Some(embedded) = embedded_pid_candidate(ctx, &out)? {
            out.embedded_pid = Some(embedded);
        }
        Ok(out)
    }
}

const PLACEHOLDERS: [(&str, &[&str]); 3] = [
    ("titleblock", &["field", "value"]),
    ("tags", &["tag", "service", "notes"]),
    ("linelist", &["line", "size", "spec", "notes"]),
];

const CONTEXT_HEADERS: &[&str] = &[
    "page",
    "pid_like",
    "pid_reference",
    "pid_note",
    "rule",
    "evidence",
];

fn context_record(context: &PidContext) -> Vec<String> {
    vec![
        context.page.to_string(),
        context.pid_like.to_string(),
        context.pid_reference.clone().unwrap_or_default(),
        context.pid_note.clone().unwrap_or_default(),
        context.rule.clone().unwrap_or_default(),
        context.evidence_joined(),
    ]
}

/// True when the page text names a structure the table filter should not
/// see at all (covers, content tables).
fn skip_tables(page_text: &str, rules: &CompiledRules) -> bool {
    let haystack = page_text.to_uppercase();
    rules
        .set
        .table_skip_markers
        .iter()
        .any(|marker| haystack.contains(&marker.to_uppercase()))
}

/// Write the raw and cleaned CSVs for one kept table and record it in the
/// page output. Returns the clean CSV file name.
fn write_table_pair(
    ctx: &PageContext<'_>,
    table: &PageTable,
    out: &mut PageOutput,
) -> Result<String> {
    let raw_name = format!("{}.csv", table.file_stem());
    write_rows(&ctx.dirs.tables_dir.join(&raw_name), &table.rows)?;

    let cleaned = clean_table(&table.rows, &ctx.rules.cell_fixups);
    let clean_name = format!("{}_clean.csv", table.file_stem());
    write_rows(&ctx.dirs.tables_clean_dir.join(&clean_name), &cleaned)?;

    out.blocks.push(Block::TableRef {
        page: table.page,
        table_index: table.index,
        table_uid: table.uid(&ctx.source.doc_id).to_string(),
        csv_file: format!("tables/{raw_name}"),
        source: ctx.source.clone(),
    });
    out.kept_tables.push(table.clone());
    out.clean_tables
        .push(PageTable::new(table.page, table.index, cleaned));
    Ok(clean_name)
}

/// Embedded-diagram candidate: an HD page that is nearly empty of text and
/// has at most incidental tables gets placeholder artifacts for OCR.
fn embedded_pid_candidate(
    ctx: &PageContext<'_>,
    out: &PageOutput,
) -> Result<Option<EmbeddedPidOutput>> {
    if ctx.source.doc_type != DocType::Hd {
        return Ok(None);
    }
    if ctx.text.trim().chars().count() > ctx.config.classify.embedded_text_char_max {
        return Ok(None);
    }
    if !out.valid_tables.is_empty() {
        return Ok(None);
    }
    if ctx.class.rule.as_deref() == Some(RULE_NO_PID) {
        return Ok(None);
    }
    let max_cols = ctx.config.classify.embedded_small_table_max_cols;
    let has_small = ctx
        .tables
        .iter()
        .any(|t| is_small_table(&t.rows, max_cols));
    if !has_small && !ctx.tables.is_empty() {
        return Ok(None);
    }

    let page = ctx.source.page;
    let mut files = Vec::with_capacity(PLACEHOLDERS.len());
    for (suffix, headers) in PLACEHOLDERS {
        let name = format!("PID_page_{page:03}_{suffix}.csv");
        write_records(&ctx.dirs.pid_context_dir.join(&name), headers, &[])?;
        files.push(format!("pid_context/{name}"));
    }
    let mut files = files.into_iter();
    Ok(Some(EmbeddedPidOutput {
        page,
        titleblock_csv: files.next().unwrap_or_default(),
        tags_csv: files.next().unwrap_or_default(),
        linelist_csv: files.next().unwrap_or_default(),
    }))
}

/// Header-less CSV, rows as-is. Raw source tables may be ragged.
fn write_rows(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV with a header row and any number of data records.
fn write_records(path: &Path, headers: &[&str], records: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}
