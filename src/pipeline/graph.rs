//! Stage 5: typed graph export.
//!
//! Reads the consolidated master files and emits a node/edge graph with
//! deterministic composite identifiers. Duplicate definitions collapse
//! by identity, so reruns over unchanged inputs reproduce byte-identical
//! outputs.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::model::{
    EdgeKind, GraphEdge, GraphNode, MasterSectionRow, NodeRecord, PidIndexRow, TableUid,
};
use crate::pipeline::recreate_dir;

/// What stage 5 did.
#[derive(Debug, Clone, Default)]
pub struct GraphReport {
    pub nodes: usize,
    pub edges: usize,
}

/// One parsed `master_tables.csv` row.
struct TableRow {
    doc_id: String,
    page: u32,
    table_idx: u32,
    row: u32,
    table_uid: TableUid,
    section_number_near: String,
    section_title_near: String,
    caption_near: String,
    table_order_in_page: u32,
    cells: Vec<String>,
}

/// Nodes and edges in insertion order, deduplicated by identity.
#[derive(Default)]
struct GraphAccum {
    nodes: Vec<GraphNode>,
    node_ids: HashSet<String>,
    edges: Vec<GraphEdge>,
    edge_keys: HashSet<GraphEdge>,
}

impl GraphAccum {
    fn add_node(&mut self, node: GraphNode) {
        if self.node_ids.insert(node.id().to_string()) {
            self.nodes.push(node);
        }
    }

    fn add_edge(&mut self, edge: GraphEdge) {
        if self.edge_keys.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }
}

/// Build the corpus graph from the stage-4 master files.
pub fn build_graph(config: &PipelineConfig) -> Result<GraphReport> {
    let consolidated = config.consolidated_dir();
    if !consolidated.is_dir() {
        return Err(Error::MissingInput {
            doc_id: "corpus".to_string(),
            path: consolidated,
        });
    }
    let out_root = config.graph_dir();
    recreate_dir(&out_root)?;

    let sections = load_sections(&consolidated.join("master_sections.csv"))?;
    let tables = load_tables(&consolidated.join("master_tables.csv"))?;
    let pid_rows = load_pid(&consolidated.join("pid_index.csv"))?;
    if sections.is_empty() && tables.is_empty() && pid_rows.is_empty() {
        warn!("no consolidated data under {}", consolidated.display());
    }

    let mut accum = GraphAccum::default();

    // Doc nodes for every id seen anywhere, in sorted order.
    let mut doc_ids: BTreeSet<&str> = BTreeSet::new();
    doc_ids.extend(sections.iter().map(|r| r.doc_id.as_str()));
    doc_ids.extend(tables.iter().map(|r| r.doc_id.as_str()));
    doc_ids.extend(pid_rows.iter().map(|r| r.doc_id.as_str()));
    for doc_id in &doc_ids {
        accum.add_node(GraphNode::doc(doc_id));
    }

    for row in &sections {
        let number = row.section_number.as_deref().unwrap_or_default();
        let title = row.section_title.as_deref().unwrap_or_default();
        if number.is_empty() && title.is_empty() {
            continue;
        }
        let node = GraphNode::section(&row.doc_id, Some(row.page), number, title);
        let id = node.id().to_string();
        accum.add_node(node);
        accum.add_edge(GraphEdge::new(
            GraphNode::doc(&row.doc_id).id(),
            id,
            EdgeKind::DocContainsSection,
        ));
    }

    // One Table node per uid; the first row carries the enrichment.
    let mut seen_uids: HashSet<&str> = HashSet::new();
    let distinct: Vec<&TableRow> = tables
        .iter()
        .filter(|row| seen_uids.insert(row.table_uid.as_str()))
        .collect();
    for row in &distinct {
        let node = GraphNode::table(
            &row.doc_id,
            row.page,
            row.table_idx,
            row.table_uid.clone(),
            &row.section_number_near,
            &row.section_title_near,
            &row.caption_near,
            row.table_order_in_page,
        );
        let id = node.id().to_string();
        accum.add_node(node);
        accum.add_edge(GraphEdge::new(
            GraphNode::doc(&row.doc_id).id(),
            id,
            EdgeKind::DocContainsTable,
        ));
    }

    // Params come from each table's header row.
    for row in tables.iter().filter(|r| r.row == 1) {
        let table_id = format!("Table:{}", row.table_uid.as_str());
        for cell in &row.cells {
            let name = cell.trim();
            if name.is_empty() || matches!(name.to_lowercase().as_str(), "nan" | "none" | "null") {
                continue;
            }
            let param = GraphNode::param(name);
            let param_id = param.id().to_string();
            accum.add_node(param);
            accum.add_edge(GraphEdge::new(&table_id, param_id, EdgeKind::TableHasParam));
        }
    }

    // A table links back to its nearest section only when that section
    // node actually exists on the same page.
    for row in &distinct {
        if row.section_number_near.is_empty() || row.page == 0 {
            continue;
        }
        let candidate =
            GraphNode::section(&row.doc_id, Some(row.page), &row.section_number_near, "");
        if accum.node_ids.contains(candidate.id()) {
            accum.add_edge(GraphEdge::new(
                candidate.id(),
                format!("Table:{}", row.table_uid.as_str()),
                EdgeKind::SectionNearTable,
            ));
        }
    }

    for row in &pid_rows {
        let page = (row.page > 0).then_some(row.page);
        if row.pid_reference.is_empty() && page.is_none() {
            continue;
        }
        let node = GraphNode::pid_ref(
            &row.doc_id,
            page,
            &row.pid_reference,
            &row.rule,
            &row.evidence,
        );
        let id = node.id().to_string();
        accum.add_node(node);
        accum.add_edge(GraphEdge::new(
            GraphNode::doc(&row.doc_id).id(),
            id,
            EdgeKind::DocHasPidPage,
        ));
    }

    write_nodes_csv(&out_root.join("graph_nodes.csv"), &accum.nodes)?;
    write_edges_csv(&out_root.join("graph_edges.csv"), &accum.edges)?;
    write_graph_jsonl(&out_root.join("graph.jsonl"), &accum)?;

    let report = GraphReport {
        nodes: accum.nodes.len(),
        edges: accum.edges.len(),
    };
    info!("graph: {} nodes, {} edges", report.nodes, report.edges);
    Ok(report)
}

/// True for an existing file with content; empty stage-4 outputs are
/// zero-byte and carry no header to parse.
fn non_empty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

fn load_sections(path: &Path) -> Result<Vec<MasterSectionRow>> {
    if !non_empty_file(path) {
        return Ok(Vec::new());
    }
    let mut rows = Vec::new();
    let mut reader = csv::Reader::from_path(path)?;
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn load_tables(path: &Path) -> Result<Vec<TableRow>> {
    if !non_empty_file(path) {
        return Ok(Vec::new());
    }
    let mut rows = Vec::new();
    let mut reader = csv::Reader::from_path(path)?;
    for record in reader.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or_default().trim().to_string();
        let number = |i: usize| field(i).parse::<u32>().unwrap_or(0);
        let doc_id = field(0);
        let page = number(3);
        let table_idx = number(4);
        let uid_field = field(6);
        let table_uid = if uid_field.is_empty() {
            TableUid::new(&doc_id, page, table_idx)
        } else {
            TableUid::from(uid_field)
        };
        rows.push(TableRow {
            doc_id,
            page,
            table_idx,
            row: number(5),
            table_uid,
            section_number_near: field(7),
            section_title_near: field(8),
            caption_near: field(9),
            table_order_in_page: number(10),
            cells: record.iter().skip(11).map(str::to_string).collect(),
        });
    }
    Ok(rows)
}

fn load_pid(path: &Path) -> Result<Vec<PidIndexRow>> {
    if !non_empty_file(path) {
        return Ok(Vec::new());
    }
    let mut rows = Vec::new();
    let mut reader = csv::Reader::from_path(path)?;
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn write_nodes_csv(path: &Path, nodes: &[GraphNode]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(GraphNode::csv_headers())?;
    for node in nodes {
        writer.write_record(node.csv_record())?;
    }
    writer.flush()?;
    Ok(())
}

fn write_edges_csv(path: &Path, edges: &[GraphEdge]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(GraphEdge::csv_headers())?;
    for edge in edges {
        writer.write_record(edge.csv_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Nodes first, then edges, one JSON object per line. Node lines are
/// tagged `"type":"node"`; edge lines carry their relation in `type`.
fn write_graph_jsonl(path: &Path, accum: &GraphAccum) -> Result<()> {
    let mut out = String::new();
    for node in &accum.nodes {
        out.push_str(&serde_json::to_string(&NodeRecord::new(node))?);
        out.push('\n');
    }
    for edge in &accum.edges {
        out.push_str(&serde_json::to_string(edge)?);
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}
