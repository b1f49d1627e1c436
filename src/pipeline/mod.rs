//! The five batch stages.
//!
//! Each stage reads the previous stage's on-disk artifacts, recreates its
//! own output directory wholesale, and returns a small report of what it
//! did. Failures below the corpus level (a page, a table, a document) are
//! logged and recorded in the artifacts; only a missing or empty corpus
//! aborts a stage.

mod blocks;
mod clean;
mod consolidate;
mod extract;
mod graph;

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::model::ExtractIndex;
use crate::source::PageSource;

pub use blocks::{
    parse_blocks, DiagramStrategy, PageContext, PageOutput, PageStrategy, ParseReport,
    TextTableStrategy,
};
pub use clean::{clean_pages, CleanReport};
pub use consolidate::{consolidate, ConsolidateReport};
pub use extract::{extract_pages, ExtractReport};
pub use graph::{build_graph, GraphReport};

/// Reports from one full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub extract: ExtractReport,
    pub clean: CleanReport,
    pub parse: ParseReport,
    pub consolidate: ConsolidateReport,
    pub graph: GraphReport,
}

/// Run all five stages in order over one corpus.
pub fn run_all(config: &PipelineConfig, source: &dyn PageSource) -> Result<PipelineReport> {
    let extract = extract_pages(config, source)?;
    let clean = clean_pages(config)?;
    let parse = parse_blocks(config, source)?;
    let consolidate = consolidate::consolidate(config)?;
    let graph = build_graph(config)?;
    Ok(PipelineReport {
        extract,
        clean,
        parse,
        consolidate,
        graph,
    })
}

/// Delete and recreate a stage output directory.
pub(crate) fn recreate_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// One serialized record per line.
pub(crate) fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Load the stage-1 index later stages are driven by.
pub(crate) fn read_extract_index(config: &PipelineConfig) -> Result<ExtractIndex> {
    let path = config.raw_pages_dir().join("index.json");
    if !path.is_file() {
        return Err(Error::MissingInput {
            doc_id: "corpus".to_string(),
            path,
        });
    }
    let raw = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}
