//! Diagram-page classification.
//!
//! The verdict for a page is a pure function of its text, its table
//! shapes, the document type and the page number. Override rules win
//! over the heuristic and leave an evidence tag, so downstream
//! artifacts always show why a page was routed.

use crate::config::ClassifyOptions;
use crate::model::TableShape;
use crate::rules::{CompiledRules, PageRules};

/// Evidence tag recorded when an override forces the diagram route.
pub const RULE_FORCE_PID: &str = "RULE_FORCE_PID";
/// Evidence tag recorded when an override forces the text route.
pub const RULE_NO_PID: &str = "RULE_NO_PID";

/// Verdict for one page plus the matched strings supporting it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageClassification {
    pub pid_like: bool,
    /// Distinct diagram-title matches, sorted, plus any override tags.
    pub evidence: Vec<String>,
}

impl PageClassification {
    /// The override tag that decided this page, if one applied.
    pub fn rule_tag(&self) -> Option<&str> {
        self.evidence
            .iter()
            .find(|e| *e == RULE_FORCE_PID || *e == RULE_NO_PID)
            .map(String::as_str)
    }
}

/// Heuristic classification from page text and table shapes.
///
/// Diagram-title keywords must match at all; a large data table then
/// demotes the page unless an explicit diagram marker or a note line
/// co-occurs with it. Without tables the page is a diagram; small
/// tables (title blocks, legends) do not change that. Evidence is kept
/// even on a negative verdict.
pub fn classify_page(
    text: &str,
    shapes: &[TableShape],
    rules: &CompiledRules,
    opts: &ClassifyOptions,
) -> PageClassification {
    let mut out = PageClassification::default();

    let mut terms: Vec<String> = rules
        .diagram_title
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    if terms.is_empty() {
        return out;
    }
    terms.sort();
    terms.dedup();
    out.evidence = terms;

    let has_large = shapes
        .iter()
        .any(|s| s.rows >= opts.large_table_rows && s.cols >= opts.large_table_cols);
    if has_large {
        out.pid_like = rules.diagram_marker.is_match(text) || has_note_line(text, rules);
        return out;
    }

    if shapes.is_empty() {
        out.pid_like = true;
        return out;
    }
    out.pid_like = shapes
        .iter()
        .any(|s| s.rows <= opts.small_table_rows && s.cols <= opts.small_table_cols);
    out
}

/// Apply per-document-type page overrides on top of the heuristic.
///
/// The force-diagram list is checked first, so a page listed on both
/// sides routes to the diagram strategy.
pub fn apply_page_rules(class: &mut PageClassification, rules: Option<&PageRules>, page: u32) {
    let Some(rules) = rules else {
        return;
    };
    if rules.pid.contains(&page) {
        push_tag(&mut class.evidence, RULE_FORCE_PID);
        class.pid_like = true;
        return;
    }
    if rules.no_pid.contains(&page) {
        push_tag(&mut class.evidence, RULE_NO_PID);
        class.pid_like = false;
    }
}

/// First drawing reference code in the page text.
pub fn extract_reference(text: &str, rules: &CompiledRules) -> Option<String> {
    rules.reference.find(text).map(|m| m.as_str().to_string())
}

/// First note line in the page text, without its prefix.
pub fn extract_note(text: &str, rules: &CompiledRules) -> Option<String> {
    for rx in &rules.notes {
        if let Some(caps) = rx.captures(text) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().trim().to_string());
            }
        }
    }
    None
}

fn has_note_line(text: &str, rules: &CompiledRules) -> bool {
    rules.notes.iter().any(|rx| rx.is_match(text))
}

fn push_tag(evidence: &mut Vec<String>, tag: &str) {
    if !evidence.iter().any(|e| e == tag) {
        evidence.push(tag.to_string());
    }
}
