//! Typed node/edge graph derived from the consolidated corpus outputs.
//!
//! Node identifiers are deterministic composite strings
//! (`Label:part_part_...`), so rebuilding the graph from unchanged
//! inputs reproduces identical ids. The CSV export uses one fixed
//! column union across all node labels; fields a label does not carry
//! stay empty.

use serde::{Deserialize, Serialize};

use crate::model::TableUid;
use crate::text;

/// Typed relation between two graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    DocContainsSection,
    DocContainsTable,
    TableHasParam,
    DocHasPidPage,
    SectionNearTable,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::DocContainsSection => "DOC_CONTAINS_SECTION",
            EdgeKind::DocContainsTable => "DOC_CONTAINS_TABLE",
            EdgeKind::TableHasParam => "TABLE_HAS_PARAM",
            EdgeKind::DocHasPidPage => "DOC_HAS_PID_PAGE",
            EdgeKind::SectionNearTable => "SECTION_NEAR_TABLE",
        }
    }
}

/// A graph node, tagged by `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label")]
pub enum GraphNode {
    Doc {
        id: String,
        doc_id: String,
    },
    Section {
        id: String,
        doc_id: String,
        page: Option<u32>,
        section_number: String,
        section_title: String,
    },
    Table {
        id: String,
        doc_id: String,
        page: u32,
        table_idx: u32,
        table_uid: TableUid,
        section_number_near: String,
        section_title_near: String,
        caption_near: String,
        table_order_in_page: u32,
    },
    Param {
        id: String,
        name: String,
    },
    PidRef {
        id: String,
        doc_id: String,
        page: Option<u32>,
        reference: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rule: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        evidence: Option<String>,
    },
}

fn node_id(label: &str, parts: &[&str]) -> String {
    format!("{label}:{}", parts.join("_"))
}

fn page_part(page: Option<u32>) -> String {
    page.map(|p| p.to_string()).unwrap_or_else(|| "NA".to_string())
}

impl GraphNode {
    pub fn doc(doc_id: &str) -> Self {
        GraphNode::Doc {
            id: node_id("Doc", &[doc_id]),
            doc_id: doc_id.to_string(),
        }
    }

    /// Section node keyed by number when present, else by a short title slug.
    pub fn section(doc_id: &str, page: Option<u32>, number: &str, title: &str) -> Self {
        let key = if number.is_empty() {
            text::slug(title, 40)
        } else {
            number.to_string()
        };
        GraphNode::Section {
            id: node_id("Section", &[doc_id, &page_part(page), &key]),
            doc_id: doc_id.to_string(),
            page,
            section_number: number.to_string(),
            section_title: title.to_string(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn table(
        doc_id: &str,
        page: u32,
        table_idx: u32,
        table_uid: TableUid,
        section_number_near: &str,
        section_title_near: &str,
        caption_near: &str,
        table_order_in_page: u32,
    ) -> Self {
        GraphNode::Table {
            id: node_id("Table", &[table_uid.as_str()]),
            doc_id: doc_id.to_string(),
            page,
            table_idx,
            table_uid,
            section_number_near: section_number_near.to_string(),
            section_title_near: section_title_near.to_string(),
            caption_near: caption_near.to_string(),
            table_order_in_page,
        }
    }

    /// Parameter node named by its slug; the slug is also the identity.
    pub fn param(raw_name: &str) -> Self {
        let name = text::slug(raw_name, 120);
        GraphNode::Param {
            id: node_id("Param", &[&name]),
            name,
        }
    }

    pub fn pid_ref(
        doc_id: &str,
        page: Option<u32>,
        reference: &str,
        rule: &str,
        evidence: &str,
    ) -> Self {
        let ref_key = if reference.is_empty() { "ref" } else { reference };
        GraphNode::PidRef {
            id: node_id("PidRef", &[doc_id, &page_part(page), &text::slug(ref_key, 64)]),
            doc_id: doc_id.to_string(),
            page,
            reference: reference.to_string(),
            rule: (!rule.is_empty()).then(|| rule.to_string()),
            evidence: (!evidence.is_empty()).then(|| evidence.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            GraphNode::Doc { id, .. }
            | GraphNode::Section { id, .. }
            | GraphNode::Table { id, .. }
            | GraphNode::Param { id, .. }
            | GraphNode::PidRef { id, .. } => id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GraphNode::Doc { .. } => "Doc",
            GraphNode::Section { .. } => "Section",
            GraphNode::Table { .. } => "Table",
            GraphNode::Param { .. } => "Param",
            GraphNode::PidRef { .. } => "PidRef",
        }
    }

    /// Column union shared by `graph_nodes.csv` rows of every label.
    pub fn csv_headers() -> Vec<String> {
        [
            "id",
            "label",
            "doc_id",
            "page",
            "section_number",
            "section_title",
            "table_idx",
            "table_uid",
            "section_number_near",
            "section_title_near",
            "caption_near",
            "table_order_in_page",
            "name",
            "reference",
            "rule",
            "evidence",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn csv_record(&self) -> Vec<String> {
        let mut rec = vec![String::new(); 16];
        rec[0] = self.id().to_string();
        rec[1] = self.label().to_string();
        match self {
            GraphNode::Doc { doc_id, .. } => {
                rec[2] = doc_id.clone();
            }
            GraphNode::Section {
                doc_id,
                page,
                section_number,
                section_title,
                ..
            } => {
                rec[2] = doc_id.clone();
                rec[3] = page_csv(*page);
                rec[4] = section_number.clone();
                rec[5] = section_title.clone();
            }
            GraphNode::Table {
                doc_id,
                page,
                table_idx,
                table_uid,
                section_number_near,
                section_title_near,
                caption_near,
                table_order_in_page,
                ..
            } => {
                rec[2] = doc_id.clone();
                rec[3] = page.to_string();
                rec[6] = table_idx.to_string();
                rec[7] = table_uid.to_string();
                rec[8] = section_number_near.clone();
                rec[9] = section_title_near.clone();
                rec[10] = caption_near.clone();
                rec[11] = table_order_in_page.to_string();
            }
            GraphNode::Param { name, .. } => {
                rec[12] = name.clone();
            }
            GraphNode::PidRef {
                doc_id,
                page,
                reference,
                rule,
                evidence,
                ..
            } => {
                rec[2] = doc_id.clone();
                rec[3] = page_csv(*page);
                rec[13] = reference.clone();
                rec[14] = rule.clone().unwrap_or_default();
                rec[15] = evidence.clone().unwrap_or_default();
            }
        }
        rec
    }
}

fn page_csv(page: Option<u32>) -> String {
    page.map(|p| p.to_string()).unwrap_or_default()
}

/// A directed typed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub src: String,
    pub dst: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn new(src: impl Into<String>, dst: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            kind,
        }
    }

    pub fn csv_headers() -> Vec<String> {
        vec!["src".to_string(), "dst".to_string(), "type".to_string()]
    }

    pub fn csv_record(&self) -> Vec<String> {
        vec![
            self.src.clone(),
            self.dst.clone(),
            self.kind.as_str().to_string(),
        ]
    }
}

/// JSONL line wrapper marking a record as a node.
///
/// Edge lines need no wrapper: a [`GraphEdge`] already serializes its
/// relation under `type`, so consumers split the stream on
/// `type == "node"`.
#[derive(Debug, Serialize)]
pub struct NodeRecord<'a> {
    #[serde(rename = "type")]
    pub record: &'static str,
    #[serde(flatten)]
    pub node: &'a GraphNode,
}

impl<'a> NodeRecord<'a> {
    pub fn new(node: &'a GraphNode) -> Self {
        Self {
            record: "node",
            node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_deterministic() {
        let doc = GraphNode::doc("bomba-101");
        assert_eq!(doc.id(), "Doc:bomba-101");

        let sec = GraphNode::section("bomba-101", Some(3), "4.1", "Pruebas");
        assert_eq!(sec.id(), "Section:bomba-101_3_4.1");

        let by_title = GraphNode::section("bomba-101", Some(3), "", "Alcance General");
        assert_eq!(by_title.id(), "Section:bomba-101_3_Alcance General");

        let param = GraphNode::param("Presión (psig)");
        assert_eq!(param.id(), "Param:Presión (psig)");
    }

    #[test]
    fn test_pid_ref_without_reference() {
        let node = GraphNode::pid_ref("doc", Some(4), "", "", "");
        assert_eq!(node.id(), "PidRef:doc_4_ref");
        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("rule"));
    }

    #[test]
    fn test_csv_union_width() {
        let table = GraphNode::table(
            "doc",
            2,
            1,
            TableUid::new("doc", 2, 1),
            "4.1",
            "Pruebas",
            "",
            1,
        );
        let rec = table.csv_record();
        assert_eq!(rec.len(), GraphNode::csv_headers().len());
        assert_eq!(rec[7], "doc::p002::t01");
        assert_eq!(rec[12], "");
    }

    #[test]
    fn test_jsonl_records_are_distinguishable() {
        let node = GraphNode::doc("d1");
        let line = serde_json::to_string(&NodeRecord::new(&node)).unwrap();
        assert!(line.contains("\"type\":\"node\""));
        assert!(line.contains("\"label\":\"Doc\""));

        let edge = GraphEdge::new("Doc:d1", "Table:t", EdgeKind::DocContainsTable);
        let line = serde_json::to_string(&edge).unwrap();
        assert!(line.contains("\"type\":\"DOC_CONTAINS_TABLE\""));
        assert!(line.contains("\"src\":\"Doc:d1\""));
    }
}
