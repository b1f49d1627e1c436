//! Data model shared across the pipeline stages.
//!
//! Stage outputs are plain serde types: manifests and summaries as JSON,
//! row types for the CSV artifacts, block variants for the structural
//! records, and the node/edge types of the derived graph.

mod block;
mod document;
mod graph;
mod master;
mod pid;
mod table;

pub use block::{Block, BlockSource, CheckState, PageRecord, TableShape};
pub use document::{
    CleanIndex, CleanManifest, CleanPageEntry, DatasheetSummary, DocSummary, DocType,
    DocumentManifest, EmbeddedPidOutput, ExtractIndex, LayoutPatterns, MergedDocSummary,
    MergedSummary, PageEntry, ValidTableRef,
};
pub use graph::{EdgeKind, GraphEdge, GraphNode, NodeRecord};
pub use master::{
    cell_column_names, MasterSectionRow, MasterTableRow, PidIndexRow, SectionRow, TablesAllRow,
    MASTER_CELL_COLUMNS,
};
pub use pid::PidContext;
pub use table::{PageTable, TableUid};
