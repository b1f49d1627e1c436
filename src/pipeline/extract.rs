//! Stage 1: per-page text extraction and document manifests.

use std::fs;
use std::path::Path;

use chrono::Utc;
use log::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Outcome, Result};
use crate::model::{DocType, DocumentManifest, ExtractIndex, PageEntry};
use crate::pipeline::{recreate_dir, write_json};
use crate::rules::{CompiledRules, RuleSet};
use crate::source::{document_stem, PageSource};
use crate::text;

/// What stage 1 did.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub documents: usize,
    pub pages: usize,
    pub failed_documents: usize,
}

/// Extract page text and a manifest for every document in the corpus.
///
/// The output directory is recreated wholesale. A document that cannot be
/// opened is reported and skipped; a page that cannot be extracted degrades
/// to an empty page file with a `Failed` outcome in the manifest. A missing
/// corpus or zero discoverable documents halts the stage with
/// [`Error::EmptyCorpus`], after writing an empty index so later stages
/// see a consistent layout.
pub fn extract_pages(config: &PipelineConfig, source: &dyn PageSource) -> Result<ExtractReport> {
    let rules = config.rules.compile()?;
    let out_root = config.raw_pages_dir();
    recreate_dir(&out_root)?;

    let names = match source.discover() {
        Ok(names) if !names.is_empty() => names,
        Ok(_) => {
            write_index(&out_root, &config.rules, Vec::new())?;
            return Err(Error::EmptyCorpus(config.input_dir.clone()));
        }
        Err(e) => {
            write_index(&out_root, &config.rules, Vec::new())?;
            return Err(e);
        }
    };

    let mut report = ExtractReport::default();
    let mut manifests = Vec::new();
    for file_name in &names {
        let doc_id = text::slug_doc_id(document_stem(file_name));
        if config.skips(&doc_id) {
            continue;
        }
        match extract_document(config, source, &rules, file_name, &doc_id, &out_root) {
            Ok(manifest) => {
                report.documents += 1;
                report.pages += manifest.pages.len();
                manifests.push(manifest);
            }
            Err(e) => {
                report.failed_documents += 1;
                warn!("{file_name}: cannot extract: {e}");
            }
        }
    }

    write_index(&out_root, &config.rules, manifests)?;
    info!(
        "extracted {} documents, {} pages ({} failed)",
        report.documents, report.pages, report.failed_documents
    );
    Ok(report)
}

fn extract_document(
    config: &PipelineConfig,
    source: &dyn PageSource,
    rules: &CompiledRules,
    file_name: &str,
    doc_id: &str,
    out_root: &Path,
) -> Result<DocumentManifest> {
    let doc = source.open(file_name)?;
    let doc_dir = out_root.join(doc_id);
    fs::create_dir_all(&doc_dir)?;

    let n_pages = doc.page_count();
    let mut pages = Vec::with_capacity(n_pages as usize);
    let mut first_page = String::new();
    for page in 1..=n_pages {
        let (page_text, outcome) = match doc.page_text(page) {
            Ok(raw) => (text::nfc(&raw), Outcome::Ok),
            Err(e) => {
                warn!("{doc_id} page {page}: {e}");
                (String::new(), Outcome::failed(e.to_string()))
            }
        };
        if page == 1 {
            first_page = page_text.clone();
        }
        let txt_name = format!("{doc_id}_page_{page:03}.txt");
        fs::write(doc_dir.join(&txt_name), &page_text)?;
        let size = doc.page_size(page);
        pages.push(PageEntry {
            page,
            txt_file: format!("{doc_id}/{txt_name}"),
            width: size.map(|(w, _)| w),
            height: size.map(|(_, h)| h),
            outcome,
        });
    }

    let manifest = DocumentManifest {
        doc_id: doc_id.to_string(),
        file_name: file_name.to_string(),
        n_pages,
        doc_type: detect_doc_type(file_name, &first_page, &config.rules),
        title: first_line_title(&first_page),
        rev: detect_revision(document_stem(file_name), rules),
        pages,
    };
    write_json(&doc_dir.join("manifest.json"), &manifest)?;
    Ok(manifest)
}

fn write_index(out_root: &Path, rules: &RuleSet, documents: Vec<DocumentManifest>) -> Result<()> {
    let index = ExtractIndex {
        generated_at: Utc::now(),
        rules_version: rules.version.clone(),
        documents,
    };
    write_json(&out_root.join("index.json"), &index)
}

/// Document type from a file-name token, falling back to first-page
/// keyword hints, falling back to `Other`.
fn detect_doc_type(file_name: &str, first_page: &str, rules: &RuleSet) -> DocType {
    let stem = document_stem(file_name);
    for token in stem.split(|c: char| !c.is_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        let doc_type = DocType::from_token(token);
        if doc_type != DocType::Other {
            return doc_type;
        }
    }
    let haystack = first_page.to_lowercase();
    for (token, hints) in &rules.doc_type_hints {
        if hints.iter().any(|h| haystack.contains(&h.to_lowercase())) {
            return DocType::from_token(token);
        }
    }
    DocType::Other
}

/// First non-empty line of page 1, capped in length.
fn first_line_title(first_page: &str) -> Option<String> {
    first_page
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| text::truncate_chars(l, 180).to_string())
}

/// Revision token from the file stem, separators normalized to `.`.
fn detect_revision(stem: &str, rules: &CompiledRules) -> Option<String> {
    for pattern in &rules.revisions {
        if let Some(m) = pattern.captures(stem).and_then(|c| c.get(1)) {
            let rev = m
                .as_str()
                .chars()
                .map(|c| if matches!(c, '-' | '_' | ',') { '.' } else { c })
                .collect();
            return Some(rev);
        }
    }
    None
}
