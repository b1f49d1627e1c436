//! Line-level test-requirement and checkbox detection.
//!
//! Every non-blank line of a text page is scanned independently. A
//! keyword hit yields a test type; a standalone check glyph yields a
//! checked line, after boilerplate and noise filters. Lines are
//! normalized first so OCR-spaced tokens cannot shadow a real mark.

use crate::rules::CompiledRules;
use crate::text::normalize_cell;

/// Test type for the first matching keyword, in rule order.
pub fn detect_test_type(line: &str, rules: &CompiledRules) -> Option<String> {
    rules
        .test_keywords
        .iter()
        .find(|(rx, _)| rx.is_match(line))
        .map(|(_, test_type)| test_type.clone())
}

/// True when the line carries a standalone check glyph or `x` mark and
/// survives the revision-boilerplate and short-line noise filters.
pub fn line_has_checkmark(line: &str, rules: &CompiledRules) -> bool {
    let norm = normalize_cell(line, &rules.cell_fixups);
    if !has_check_token(&norm, rules) {
        return false;
    }
    if rules.check_ignore.is_match(&norm) {
        return false;
    }
    !is_noise_check_line(&norm, rules)
}

/// A mark only counts as a whole whitespace token, so `Max`, `x.` or
/// `(x)` never match.
fn has_check_token(normalized: &str, rules: &CompiledRules) -> bool {
    normalized
        .split_whitespace()
        .any(|tok| rules.is_check_token(tok))
}

/// Short mark-only fragments, and short lines with no test/inspection
/// context word, are noise.
fn is_noise_check_line(normalized: &str, rules: &CompiledRules) -> bool {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let joined = tokens.join(" ");
    if tokens.len() <= 2 && joined.chars().count() <= 5 {
        return true;
    }
    let upper = normalized.to_uppercase();
    let has_context = rules
        .set
        .check_context_words
        .iter()
        .any(|w| upper.contains(w.as_str()));
    !has_context && tokens.len() <= 3
}
