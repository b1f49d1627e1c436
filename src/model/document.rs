//! Document-level types: type tokens, manifests and stage summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Outcome;
use crate::model::pid::PidContext;

/// Document type token detected at ingestion.
///
/// Serialized as the corpus token (`"ET"`, `"HD"`, `"MR"`, `"PID"`,
/// `"OTRO"`); downstream artifacts and consumers key on those strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DocType {
    #[serde(rename = "ET")]
    Et,
    #[serde(rename = "HD")]
    Hd,
    #[serde(rename = "MR")]
    Mr,
    #[serde(rename = "PID")]
    Pid,
    #[default]
    #[serde(rename = "OTRO")]
    Other,
}

impl DocType {
    /// The corpus token for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Et => "ET",
            DocType::Hd => "HD",
            DocType::Mr => "MR",
            DocType::Pid => "PID",
            DocType::Other => "OTRO",
        }
    }

    /// Parse a corpus token, defaulting to [`DocType::Other`].
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_uppercase().as_str() {
            "ET" => DocType::Et,
            "HD" => DocType::Hd,
            "MR" => DocType::Mr,
            "PID" => DocType::Pid,
            _ => DocType::Other,
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-page entry of a stage-1 manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    /// 1-based page number.
    pub page: u32,
    /// Page text file, relative to the stage output root.
    pub txt_file: String,
    /// Page width in points, when the source reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Page height in points, when the source reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    /// Extraction outcome for this page.
    #[serde(default, skip_serializing_if = "Outcome::is_ok")]
    pub outcome: Outcome,
}

/// Stage-1 output record for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentManifest {
    pub doc_id: String,
    pub file_name: String,
    pub n_pages: u32,
    pub doc_type: DocType,
    /// First non-empty line of page 1, capped in length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Revision token pulled from the file stem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub pages: Vec<PageEntry>,
}

/// Global stage-1 index across the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractIndex {
    pub generated_at: DateTime<Utc>,
    pub rules_version: String,
    pub documents: Vec<DocumentManifest>,
}

/// Detected repeated-line patterns for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutPatterns {
    pub header: Vec<String>,
    pub footer: Vec<String>,
}

/// Per-page entry of a stage-2 manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanPageEntry {
    pub page: u32,
    pub clean_txt_file: String,
    pub orig_txt_file: String,
    pub n_lines_before: usize,
    pub n_lines_after: usize,
}

/// Stage-2 output record for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanManifest {
    pub doc_id: String,
    pub file_name: String,
    pub doc_type: DocType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub n_pages: u32,
    pub detected_patterns: LayoutPatterns,
    pub pages: Vec<CleanPageEntry>,
}

/// Global stage-2 index across the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanIndex {
    pub generated_at: DateTime<Utc>,
    pub documents: Vec<CleanManifest>,
}

/// Stage-3 summary for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSummary {
    pub doc_id: String,
    pub file_name: String,
    pub doc_type: DocType,
    pub page_count: u32,
    pub total_blocks: u32,
    pub total_tables: u32,
    /// Test/checkbox lines detected across the document.
    pub checks_found: u32,
    /// Pages carrying diagram content, classified or embedded.
    pub embedded_pid_pages: Vec<u32>,
    /// Diagram context rows, one per classified diagram page.
    pub pid_context: Vec<PidContext>,
    pub pages_ok: u32,
    pub pages_partial: u32,
    pub pages_failed: u32,
    /// Datasheet extraction results, present for HD documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasheet: Option<DatasheetSummary>,
}

/// Reference to one validated datasheet table in the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidTableRef {
    pub page: u32,
    pub table_index: u32,
    pub clean_csv: String,
}

/// Placeholder artifacts reserved for a page with an embedded diagram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedPidOutput {
    pub page: u32,
    pub titleblock_csv: String,
    pub tags_csv: String,
    pub linelist_csv: String,
}

/// Datasheet (HD) master/tidy results attached to a stage-3 summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasheetSummary {
    pub master_csv: String,
    pub tidy_csv: String,
    pub tidy_rows: u32,
    /// Tables that passed datasheet validity and fed the master.
    pub valid_tables: Vec<ValidTableRef>,
    pub pruebas: Vec<String>,
    pub requisitos_true: Vec<String>,
    pub banderas_true: Vec<String>,
    pub proceso_fields: Vec<String>,
    pub embedded_outputs: Vec<EmbeddedPidOutput>,
}

/// One document inside the stage-4 merged summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedDocSummary {
    #[serde(flatten)]
    pub summary: DocSummary,
    pub sections_count: u64,
    pub tables_count: u64,
    pub pid_pages: Vec<u32>,
}

/// Stage-4 merged summary across the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedSummary {
    pub generated_at: DateTime<Utc>,
    pub documents: Vec<MergedDocSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_tokens() {
        assert_eq!(DocType::Hd.as_str(), "HD");
        assert_eq!(DocType::from_token("hd"), DocType::Hd);
        assert_eq!(DocType::from_token("minuta"), DocType::Other);
        let json = serde_json::to_string(&DocType::Other).unwrap();
        assert_eq!(json, "\"OTRO\"");
    }

    #[test]
    fn test_manifest_roundtrip() {
        let manifest = DocumentManifest {
            doc_id: "bomba-101".into(),
            file_name: "bomba-101.pdf".into(),
            n_pages: 2,
            doc_type: DocType::Hd,
            title: Some("HOJA DE DATOS".into()),
            rev: Some("015.1".into()),
            pages: vec![PageEntry {
                page: 1,
                txt_file: "bomba-101/bomba-101_page_001.txt".into(),
                width: Some(612.0),
                height: Some(792.0),
                outcome: Outcome::Ok,
            }],
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(!json.contains("outcome"));
        let back: DocumentManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.doc_type, DocType::Hd);
        assert_eq!(back.pages[0].page, 1);
    }
}
