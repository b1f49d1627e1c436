//! Stage 2: repeated header/footer removal.
//!
//! Repeated lines are detected per document, separately for the top and
//! bottom page zones, and removed only inside the zone they were detected
//! in. A line that also appears mid-page survives there.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use log::{debug, info, warn};

use crate::config::{CleanOptions, PipelineConfig};
use crate::error::Result;
use crate::model::{CleanIndex, CleanManifest, CleanPageEntry, DocumentManifest, LayoutPatterns};
use crate::pipeline::{read_extract_index, recreate_dir, write_json};
use crate::rules::CompiledRules;
use crate::text;

/// What stage 2 did.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub documents: usize,
    pub removed_lines: usize,
    pub failed_documents: usize,
}

/// Strip detected headers and footers from every stage-1 document.
pub fn clean_pages(config: &PipelineConfig) -> Result<CleanReport> {
    let rules = config.rules.compile()?;
    let index = read_extract_index(config)?;
    let out_root = config.clean_pages_dir();
    recreate_dir(&out_root)?;

    let mut report = CleanReport::default();
    let mut manifests = Vec::new();
    for manifest in &index.documents {
        if config.skips(&manifest.doc_id) {
            continue;
        }
        match clean_document(config, &rules, manifest, &out_root) {
            Ok((clean_manifest, removed)) => {
                report.documents += 1;
                report.removed_lines += removed;
                manifests.push(clean_manifest);
            }
            Err(e) => {
                report.failed_documents += 1;
                warn!("{}: cannot clean: {e}", manifest.doc_id);
            }
        }
    }

    let clean_index = CleanIndex {
        generated_at: Utc::now(),
        documents: manifests,
    };
    write_json(&out_root.join("index.json"), &clean_index)?;
    info!(
        "cleaned {} documents, removed {} repeated lines ({} failed)",
        report.documents, report.removed_lines, report.failed_documents
    );
    Ok(report)
}

fn clean_document(
    config: &PipelineConfig,
    rules: &CompiledRules,
    manifest: &DocumentManifest,
    out_root: &Path,
) -> Result<(CleanManifest, usize)> {
    let raw_root = config.raw_pages_dir();
    let doc_dir = out_root.join(&manifest.doc_id);
    fs::create_dir_all(&doc_dir)?;

    let mut pages: Vec<Vec<String>> = Vec::with_capacity(manifest.pages.len());
    for entry in &manifest.pages {
        let raw = fs::read_to_string(raw_root.join(&entry.txt_file)).unwrap_or_default();
        pages.push(raw.lines().map(str::to_string).collect());
    }

    let patterns = detect_patterns(&pages, &config.clean, rules);
    debug!(
        "{}: {} header / {} footer patterns",
        manifest.doc_id,
        patterns.header.len(),
        patterns.footer.len()
    );

    let mut entries = Vec::with_capacity(manifest.pages.len());
    let mut removed_total = 0;
    for (entry, lines) in manifest.pages.iter().zip(&pages) {
        let kept = clean_page(lines, &patterns, &config.clean);
        removed_total += lines.len() - kept.len();

        let txt_name = format!("{}_page_{:03}.txt", manifest.doc_id, entry.page);
        fs::write(doc_dir.join(&txt_name), kept.join("\n"))?;
        entries.push(CleanPageEntry {
            page: entry.page,
            clean_txt_file: format!("{}/{txt_name}", manifest.doc_id),
            orig_txt_file: entry.txt_file.clone(),
            n_lines_before: lines.len(),
            n_lines_after: kept.len(),
        });
    }

    let clean_manifest = CleanManifest {
        doc_id: manifest.doc_id.clone(),
        file_name: manifest.file_name.clone(),
        doc_type: manifest.doc_type,
        rev: manifest.rev.clone(),
        n_pages: manifest.n_pages,
        detected_patterns: patterns,
        pages: entries,
    };
    write_json(&doc_dir.join("clean_manifest.json"), &clean_manifest)?;
    Ok((clean_manifest, removed_total))
}

/// Count normalized lines in the top and bottom zones across all pages and
/// keep the ones frequent enough to be layout furniture.
fn detect_patterns(
    pages: &[Vec<String>],
    opts: &CleanOptions,
    rules: &CompiledRules,
) -> LayoutPatterns {
    let mut top: BTreeMap<String, usize> = BTreeMap::new();
    let mut bottom: BTreeMap<String, usize> = BTreeMap::new();
    for lines in pages {
        for line in lines.iter().take(opts.edge_lines) {
            tally(&mut top, line, opts);
        }
        let from = lines.len().saturating_sub(opts.edge_lines);
        for line in lines.iter().skip(from) {
            tally(&mut bottom, line, opts);
        }
    }

    // One-page documents would otherwise flag every long edge line.
    let need = ((opts.freq_threshold * pages.len() as f64).ceil() as usize).max(2);
    LayoutPatterns {
        header: frequent(top, need, rules),
        footer: frequent(bottom, need, rules),
    }
}

fn tally(counts: &mut BTreeMap<String, usize>, line: &str, opts: &CleanOptions) {
    let norm = text::normalize_line(line);
    if norm.chars().count() >= opts.min_len {
        *counts.entry(norm).or_insert(0) += 1;
    }
}

fn frequent(counts: BTreeMap<String, usize>, need: usize, rules: &CompiledRules) -> Vec<String> {
    counts
        .into_iter()
        .filter(|(line, count)| *count >= need && plausible_pattern(line, rules))
        .map(|(line, _)| line)
        .collect()
}

/// Short all-caps lines are usually content headings, not furniture; they
/// only qualify when they read like a page-number line.
fn plausible_pattern(line: &str, rules: &CompiledRules) -> bool {
    let has_upper = line.chars().any(char::is_uppercase);
    let has_lower = line.chars().any(char::is_lowercase);
    if has_upper && !has_lower && line.split_whitespace().count() <= 2 {
        return rules.page_number.is_match(line);
    }
    true
}

/// Remove pattern matches inside their zone; interior lines always survive.
fn clean_page(lines: &[String], patterns: &LayoutPatterns, opts: &CleanOptions) -> Vec<String> {
    let bottom_from = lines.len().saturating_sub(opts.edge_lines);
    lines
        .iter()
        .enumerate()
        .filter(|(i, line)| {
            let norm = text::normalize_line(line);
            if *i < opts.edge_lines && patterns.header.iter().any(|p| *p == norm) {
                return false;
            }
            if *i >= bottom_from && patterns.footer.iter().any(|p| *p == norm) {
                return false;
            }
            true
        })
        .map(|(_, line)| line.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;

    fn rules() -> CompiledRules {
        RuleSet::default().compile().unwrap()
    }

    fn page(header: &str, body: &[String], footer: &str) -> Vec<String> {
        let mut lines = vec![header.to_string()];
        lines.extend(body.iter().cloned());
        lines.push(footer.to_string());
        lines
    }

    #[test]
    fn test_detects_frequent_edge_lines() {
        let pages: Vec<Vec<String>> = (1..=5)
            .map(|i| {
                page(
                    "Refinería del Norte S.A. de C.V.",
                    &[format!("4.{i} PRUEBAS"), format!("texto de la página {i}")],
                    &format!("Documento 0001-PR-002 Hoja {i}"),
                )
            })
            .collect();
        let opts = CleanOptions::default().with_edge_lines(1);
        let patterns = detect_patterns(&pages, &opts, &rules());
        assert_eq!(patterns.header, vec!["Refinería del Norte S.A. de C.V."]);
        // The sheet counter differs per page, so the footer never repeats.
        assert!(patterns.footer.is_empty());
    }

    #[test]
    fn test_short_all_caps_needs_page_number_shape() {
        let pages: Vec<Vec<String>> = (1..=4)
            .map(|i| page("NOTAS GENERALES", &[format!("cuerpo {i}")], "PÁGINA 3"))
            .collect();
        let opts = CleanOptions::default().with_edge_lines(1);
        let patterns = detect_patterns(&pages, &opts, &rules());
        assert!(patterns.header.is_empty());
        assert_eq!(patterns.footer, vec!["PÁGINA 3"]);
    }

    #[test]
    fn test_cleaning_is_zone_restricted() {
        let repeated = "Refinería del Norte S.A. de C.V.";
        let lines: Vec<String> = [
            repeated,
            "1.2 ALCANCE",
            "La presente especificación aplica a bombas centrífugas.",
            "El contratista entregará los documentos a",
            repeated,
            "para su revisión y aprobación final antes del embarque",
            "de los equipos al sitio de instalación definitiva.",
            "línea de cierre",
        ]
        .iter()
        .map(|l| l.to_string())
        .collect();

        let patterns = LayoutPatterns {
            header: vec![repeated.to_string()],
            footer: Vec::new(),
        };
        let opts = CleanOptions::default().with_edge_lines(2);
        let kept = clean_page(&lines, &patterns, &opts);
        assert_eq!(kept.len(), lines.len() - 1);
        // The interior occurrence is outside the zone and survives.
        assert!(kept.iter().any(|l| l == repeated));
    }

    #[test]
    fn test_clean_stage_end_to_end() {
        use crate::source::{MemoryDocument, MemorySource};

        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new("/nonexistent", dir.path());

        let mut doc = MemoryDocument::new();
        for i in 1..=4 {
            doc = doc.with_page(
                format!(
                    "Refinería del Norte S.A. de C.V.\n4.{i} SECCIÓN\ntexto de la sección {i}"
                ),
                Vec::new(),
            );
        }
        let source = MemorySource::new().with_document("0001-ET-023.pdf", doc);
        crate::pipeline::extract_pages(&config, &source).unwrap();

        let report = clean_pages(&config).unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.removed_lines, 4);

        let cleaned = fs::read_to_string(
            config
                .clean_pages_dir()
                .join("0001-ET-023/0001-ET-023_page_002.txt"),
        )
        .unwrap();
        assert!(cleaned.starts_with("4.2 SECCIÓN"));

        let index: CleanIndex = serde_json::from_str(
            &fs::read_to_string(config.clean_pages_dir().join("index.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(index.documents[0].pages[1].n_lines_before, 3);
        assert_eq!(index.documents[0].pages[1].n_lines_after, 2);
    }
}
