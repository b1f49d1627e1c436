//! Shared text normalization helpers.
//!
//! Every heuristic downstream of extraction (header matching, section
//! detection, checkbox scanning) works on normalized text, so the rules for
//! whitespace, invisible characters and OCR artifacts live in one place.

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Invisible characters stripped from line edges before frequency counting.
const EDGE_STRIP: &[char] = &[' ', '\t', '\u{200b}', '\u{200e}', '\u{200f}'];

/// NFC-normalize extracted text once at ingestion.
///
/// Accented Spanish corpora arrive with mixed composed/decomposed forms;
/// exact-match heuristics need one canonical form.
pub fn nfc(text: &str) -> String {
    text.nfc().collect()
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn collapse_ws(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            in_ws = true;
        } else {
            if in_ws && !out.is_empty() {
                out.push(' ');
            }
            in_ws = false;
            out.push(ch);
        }
    }
    out
}

/// Normalize one line for header/footer frequency matching: NBSP to space,
/// invisible edge characters stripped, whitespace collapsed.
pub fn normalize_line(line: &str) -> String {
    let replaced = line.replace('\u{a0}', " ");
    let trimmed = replaced.trim_matches(|c: char| EDGE_STRIP.contains(&c));
    collapse_ws(trimmed)
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Derive a filesystem-friendly document id from a file stem.
///
/// Collapses whitespace, replaces path separators, caps the length so the
/// id stays usable as a directory name.
pub fn slug_doc_id(stem: &str) -> String {
    let base = collapse_ws(stem).replace(['/', '\\'], "-");
    truncate_chars(&base, 90).to_string()
}

/// Slug used for graph node identity: whitespace collapsed, symbols outside
/// a small useful set removed, bounded length, `"NA"` when nothing is left.
pub fn slug(text: &str, max_chars: usize) -> String {
    let collapsed = collapse_ws(text);
    let filtered: String = collapsed
        .chars()
        .filter(|c| {
            c.is_alphanumeric()
                || *c == '_'
                || c.is_whitespace()
                || matches!(c, '-' | '.' | '#' | '/' | '(' | ')')
        })
        .collect();
    let cut = truncate_chars(&filtered, max_chars).trim().to_string();
    if cut.is_empty() {
        "NA".to_string()
    } else {
        cut
    }
}

/// True when a heading candidate reads like a real title: starts with an
/// uppercase letter, digit or parenthesis, does not open with a stray
/// conjunction, and stays within plausible length.
pub fn looks_like_title(text: &str, stopwords: &[String]) -> bool {
    let s = text.trim();
    let Some(first_char) = s.chars().next() else {
        return false;
    };
    if !(first_char.is_uppercase() || first_char.is_ascii_digit() || first_char == '(') {
        return false;
    }
    let first_word = s
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| matches!(c, '(' | ')' | ':' | ';' | ',' | '.'))
        .to_lowercase();
    if stopwords.iter().any(|w| *w == first_word) {
        return false;
    }
    s.chars().count() <= 180
}

/// A single OCR repair rule: pattern over spaced-out glyphs, replacement.
#[derive(Debug, Clone)]
pub struct CellFixup {
    pub pattern: Regex,
    pub replacement: String,
}

/// Normalize one table cell: unify dashes, drop NBSP, collapse runs of
/// spaces and tabs, fold newlines into spaces, repair spaced-out OCR tokens.
pub fn normalize_cell(raw: &str, fixups: &[CellFixup]) -> String {
    let mut txt = raw
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace('\u{a0}', " ");

    let mut squeezed = String::with_capacity(txt.len());
    let mut pending_space = false;
    let mut pending_newline = false;
    for ch in txt.chars() {
        match ch {
            ' ' | '\t' => pending_space = true,
            '\n' | '\r' => {
                pending_newline = true;
                pending_space = false;
            }
            _ => {
                if pending_newline || pending_space {
                    if !squeezed.is_empty() {
                        squeezed.push(' ');
                    }
                    pending_newline = false;
                    pending_space = false;
                }
                squeezed.push(ch);
            }
        }
    }
    txt = squeezed;

    for fixup in fixups {
        txt = fixup.pattern.replace_all(&txt, fixup.replacement.as_str()).into_owned();
    }
    txt.trim().to_string()
}

/// True when the row carries at least one alphanumeric token of length 2+.
pub fn row_has_content(row: &[String]) -> bool {
    row.iter().any(|cell| {
        let mut run = 0;
        for ch in cell.chars() {
            if ch.is_ascii_alphanumeric() {
                run += 1;
                if run >= 2 {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    })
}
