//! Structural blocks emitted by the page parsers.

use serde::{Deserialize, Serialize};

use crate::error::Outcome;
use crate::model::DocType;

/// Where a block came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSource {
    pub doc_id: String,
    pub doc_type: DocType,
    pub file_name: String,
    pub page: u32,
}

/// Three-valued checkbox state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Checked,
    Unchecked,
    Unknown,
}

impl CheckState {
    /// Map a normalized cell token to a state.
    ///
    /// Wingdings checkboxes survive text extraction as `l` (checked) and
    /// `m` (unchecked); plain marks are `x`/`X` and the common glyphs.
    pub fn from_token(token: &str) -> Self {
        let t = token.trim();
        if t.eq_ignore_ascii_case("l") {
            return CheckState::Checked;
        }
        if t.eq_ignore_ascii_case("m") {
            return CheckState::Unchecked;
        }
        match t {
            "x" | "X" | "✓" | "✔" | "☑" | "☒" => CheckState::Checked,
            _ => CheckState::Unknown,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CheckState::Checked => Some(true),
            CheckState::Unchecked => Some(false),
            CheckState::Unknown => None,
        }
    }
}

/// One structural unit found on a page, streamed to `blocks.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    SectionHeader {
        section_number: String,
        section_title: String,
        source: BlockSource,
    },
    Paragraph {
        #[serde(skip_serializing_if = "Option::is_none")]
        section_number: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        section_title: Option<String>,
        text: String,
        source: BlockSource,
    },
    TestRequirement {
        test_type: String,
        text: String,
        has_checkmark: bool,
        source: BlockSource,
    },
    CheckItem {
        text: String,
        state: CheckState,
        source: BlockSource,
    },
    TableRef {
        page: u32,
        table_index: u32,
        table_uid: String,
        csv_file: String,
        source: BlockSource,
    },
}

impl Block {
    pub fn source(&self) -> &BlockSource {
        match self {
            Block::SectionHeader { source, .. }
            | Block::Paragraph { source, .. }
            | Block::TestRequirement { source, .. }
            | Block::CheckItem { source, .. }
            | Block::TableRef { source, .. } => source,
        }
    }

    /// True for section headers and paragraphs, the block kinds that feed
    /// the per-document sections CSV.
    pub fn is_sectional(&self) -> bool {
        matches!(self, Block::SectionHeader { .. } | Block::Paragraph { .. })
    }
}

/// Row/column shape of one extracted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableShape {
    pub rows: usize,
    pub cols: usize,
}

/// Per-page record written to `blocks.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub page: u32,
    pub has_text: bool,
    pub tables_shapes: Vec<TableShape>,
    pub pid_like: bool,
    pub pid_evidence: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_note: Option<String>,
    /// Name of the strategy that processed this page.
    pub dispatched_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_error: Option<String>,
    #[serde(default, skip_serializing_if = "Outcome::is_ok")]
    pub outcome: Outcome,
}
