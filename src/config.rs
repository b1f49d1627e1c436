//! Pipeline configuration.
//!
//! Every stage entry point takes a [`PipelineConfig`] by reference; there is
//! no global state. Heuristic thresholds live in small option structs whose
//! defaults carry the corpus tuning, so callers can retune per corpus
//! without touching code.

use std::path::PathBuf;

use crate::rules::RuleSet;
use crate::source::SourceBackend;

/// Configuration shared by all five pipeline stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for input documents.
    pub input_dir: PathBuf,

    /// Root directory for every stage artifact.
    pub output_dir: PathBuf,

    /// How pages are read from input documents.
    pub backend: SourceBackend,

    /// Keyword and pattern tables driving detection heuristics.
    pub rules: RuleSet,

    /// Restrict a run to a single document id.
    pub doc_filter: Option<String>,

    /// Header/footer detection thresholds.
    pub clean: CleanOptions,

    /// Page classification thresholds.
    pub classify: ClassifyOptions,

    /// Table filtering thresholds.
    pub tables: TableOptions,
}

impl PipelineConfig {
    /// Create a configuration with default heuristics and built-in rules.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            backend: SourceBackend::Auto,
            rules: RuleSet::default(),
            doc_filter: None,
            clean: CleanOptions::default(),
            classify: ClassifyOptions::default(),
            tables: TableOptions::default(),
        }
    }

    /// Set the page source backend.
    pub fn with_backend(mut self, backend: SourceBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Replace the rule tables.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Process only the document with this id.
    pub fn with_doc_filter(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_filter = Some(doc_id.into());
        self
    }

    /// Set header/footer detection options.
    pub fn with_clean(mut self, clean: CleanOptions) -> Self {
        self.clean = clean;
        self
    }

    /// Set classification options.
    pub fn with_classify(mut self, classify: ClassifyOptions) -> Self {
        self.classify = classify;
        self
    }

    /// Set table filtering options.
    pub fn with_tables(mut self, tables: TableOptions) -> Self {
        self.tables = tables;
        self
    }

    /// Stage 1 output: per-document raw page text and manifests.
    pub fn raw_pages_dir(&self) -> PathBuf {
        self.output_dir.join("raw_pages")
    }

    /// Stage 2 output: cleaned page text.
    pub fn clean_pages_dir(&self) -> PathBuf {
        self.output_dir.join("clean_pages")
    }

    /// Stage 3 output: per-document blocks, tables and context files.
    pub fn blocks_dir(&self) -> PathBuf {
        self.output_dir.join("blocks")
    }

    /// Stage 4 output: corpus-wide master files.
    pub fn consolidated_dir(&self) -> PathBuf {
        self.output_dir.join("consolidated")
    }

    /// Stage 5 output: graph nodes and edges.
    pub fn graph_dir(&self) -> PathBuf {
        self.output_dir.join("graph")
    }

    /// True when this document id is excluded by the active filter.
    pub fn skips(&self, doc_id: &str) -> bool {
        match &self.doc_filter {
            Some(wanted) => wanted != doc_id,
            None => false,
        }
    }
}

/// Thresholds for repeated header/footer detection.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Lines inspected at the top and at the bottom of each page.
    pub edge_lines: usize,

    /// Fraction of pages a normalized line must appear on to count as
    /// a header or footer.
    pub freq_threshold: f64,

    /// Normalized lines shorter than this never become candidates.
    pub min_len: usize,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            edge_lines: 6,
            freq_threshold: 0.6,
            min_len: 8,
        }
    }
}

impl CleanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edge_lines(mut self, n: usize) -> Self {
        self.edge_lines = n;
        self
    }

    pub fn with_freq_threshold(mut self, t: f64) -> Self {
        self.freq_threshold = t;
        self
    }

    pub fn with_min_len(mut self, n: usize) -> Self {
        self.min_len = n;
        self
    }
}

/// Thresholds for the diagram-page classifier.
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    /// A table at most this many rows still counts as a title block.
    pub small_table_rows: usize,

    /// A table at most this many columns still counts as a title block.
    pub small_table_cols: usize,

    /// Row floor above which a table is considered a data table.
    pub large_table_rows: usize,

    /// Column floor above which a table is considered a data table.
    pub large_table_cols: usize,

    /// Embedded-diagram candidate: at most this much text on the page.
    pub embedded_text_char_max: usize,

    /// Embedded-diagram candidate: widest table still considered incidental.
    pub embedded_small_table_max_cols: usize,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            small_table_rows: 5,
            small_table_cols: 4,
            large_table_rows: 10,
            large_table_cols: 6,
            embedded_text_char_max: 250,
            embedded_small_table_max_cols: 3,
        }
    }
}

impl ClassifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_small_table(mut self, rows: usize, cols: usize) -> Self {
        self.small_table_rows = rows;
        self.small_table_cols = cols;
        self
    }

    pub fn with_large_table(mut self, rows: usize, cols: usize) -> Self {
        self.large_table_rows = rows;
        self.large_table_cols = cols;
        self
    }

    pub fn with_embedded_text_char_max(mut self, n: usize) -> Self {
        self.embedded_text_char_max = n;
        self
    }
}

/// Thresholds for keeping or discarding extracted tables.
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Tables with fewer cells than this are noise.
    pub min_total_cells: usize,

    /// Tables emptier than this ratio are noise.
    pub max_empty_ratio: f64,

    /// Datasheet validity: emptiness ceiling.
    pub datasheet_max_empty_ratio: f64,

    /// Datasheet validity: minimum rows with real content.
    pub datasheet_min_content_rows: usize,

    /// Datasheet validity: minimum column count.
    pub datasheet_min_columns: usize,

    /// Widest row written to the wide CSV outputs (c1..cN).
    pub max_columns: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            min_total_cells: 4,
            max_empty_ratio: 0.95,
            datasheet_max_empty_ratio: 0.90,
            datasheet_min_content_rows: 2,
            datasheet_min_columns: 6,
            max_columns: 50,
        }
    }
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_total_cells(mut self, n: usize) -> Self {
        self.min_total_cells = n;
        self
    }

    pub fn with_max_empty_ratio(mut self, r: f64) -> Self {
        self.max_empty_ratio = r;
        self
    }

    pub fn with_max_columns(mut self, n: usize) -> Self {
        self.max_columns = n;
        self
    }
}
