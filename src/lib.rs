//! # ingesta
//!
//! Batch pipeline that turns a folder of engineering documents
//! (technical specifications, datasheets, material requisitions, P&ID
//! drawings) into queryable artifacts: cleaned page text, structural
//! blocks, per-table CSVs, corpus-wide master files and a typed
//! node/edge graph.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ingesta::{run_pipeline, PipelineConfig};
//!
//! fn main() -> ingesta::Result<()> {
//!     let config = PipelineConfig::new("./docs", "./outputs");
//!     let report = run_pipeline(&config)?;
//!     println!(
//!         "{} documents, {} graph nodes",
//!         report.extract.documents, report.graph.nodes
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Stages
//!
//! - **extract**: per-page text, per-document manifests, a corpus index
//! - **clean**: removal of repeated headers and footers
//! - **parse**: structural blocks, tables, diagram context, datasheets
//! - **consolidate**: corpus-wide master CSVs with nearest-context enrichment
//! - **graph**: deterministic node/edge export as CSV and JSONL
//!
//! Each stage reads the previous stage's artifacts from the output
//! directory, so stages can be rerun individually. Heuristics are tuned
//! through [`PipelineConfig`] and the data-driven [`rules::RuleSet`].

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod rules;
pub mod source;
pub mod text;

// Re-export commonly used types
pub use config::{ClassifyOptions, CleanOptions, PipelineConfig, TableOptions};
pub use error::{Error, Outcome, Result};
pub use model::{
    Block, DocSummary, DocType, DocumentManifest, ExtractIndex, GraphEdge, GraphNode, PageTable,
    TableUid,
};
pub use pipeline::{
    build_graph, clean_pages, consolidate, extract_pages, parse_blocks, run_all, CleanReport,
    ConsolidateReport, ExtractReport, GraphReport, ParseReport, PipelineReport,
};
pub use rules::RuleSet;
pub use source::{
    FsSource, MemoryDocument, MemorySource, PageSource, SourceBackend, SourceDocument,
};

/// Run all five stages over the configured input directory.
///
/// # Example
///
/// ```no_run
/// use ingesta::{run_pipeline, PipelineConfig, SourceBackend};
///
/// let config = PipelineConfig::new("./docs", "./outputs")
///     .with_backend(SourceBackend::Dump);
/// let report = run_pipeline(&config).unwrap();
/// println!("{} table rows consolidated", report.consolidate.table_rows);
/// ```
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport> {
    let source = FsSource::new(&config.input_dir, config.backend);
    pipeline::run_all(config, &source)
}

/// Run all five stages over a caller-supplied page source.
///
/// Useful for embedding: tests and ingestion services feed a
/// [`MemorySource`] instead of a directory.
pub fn run_pipeline_with_source(
    config: &PipelineConfig,
    source: &dyn PageSource,
) -> Result<PipelineReport> {
    pipeline::run_all(config, source)
}
