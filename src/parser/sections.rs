//! Numbered-section segmentation for text pages.
//!
//! Lines that look like `4.1 TITLE` open a section; everything between
//! headers collapses into one paragraph attached to the section above
//! it. Text before the first header becomes an unattached paragraph.

use crate::model::{Block, BlockSource, SectionRow};
use crate::rules::CompiledRules;
use crate::text::{collapse_ws, looks_like_title};

/// One segment of a page: a section header or the prose under one.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Header {
        number: String,
        title: String,
    },
    Paragraph {
        section_number: Option<String>,
        section_title: Option<String>,
        text: String,
    },
}

impl Segment {
    pub fn into_block(self, source: BlockSource) -> Block {
        match self {
            Segment::Header { number, title } => Block::SectionHeader {
                section_number: number,
                section_title: title,
                source,
            },
            Segment::Paragraph {
                section_number,
                section_title,
                text,
            } => Block::Paragraph {
                section_number,
                section_title,
                text,
                source,
            },
        }
    }

    /// Row for the per-document sections CSV. Header rows carry an
    /// empty text column.
    pub fn into_row(self, page: u32) -> SectionRow {
        match self {
            Segment::Header { number, title } => SectionRow {
                kind: "section_header".to_string(),
                section_number: Some(number),
                section_title: Some(title),
                text: String::new(),
                page,
            },
            Segment::Paragraph {
                section_number,
                section_title,
                text,
            } => SectionRow {
                kind: "paragraph".to_string(),
                section_number,
                section_title,
                text,
                page,
            },
        }
    }
}

/// Split page lines into header and paragraph segments.
///
/// A header line must both match the numbered-heading shape and read
/// like a title; otherwise it stays part of the running paragraph.
/// Callers pass non-blank lines.
pub fn segment_sections(lines: &[&str], rules: &CompiledRules) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<(String, String)> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in lines {
        match match_header(line, rules) {
            Some((number, title)) => {
                flush_paragraph(&mut buffer, &current, &mut segments);
                current = Some((number.clone(), title.clone()));
                segments.push(Segment::Header { number, title });
            }
            None => buffer.push(line),
        }
    }
    flush_paragraph(&mut buffer, &current, &mut segments);
    segments
}

fn match_header(line: &str, rules: &CompiledRules) -> Option<(String, String)> {
    let caps = rules.section_header.captures(line)?;
    let number = caps.get(1)?.as_str().trim_end_matches('.').to_string();
    let title = collapse_ws(caps.get(2)?.as_str());
    looks_like_title(&title, &rules.set.title_stopwords).then_some((number, title))
}

fn flush_paragraph(
    buffer: &mut Vec<&str>,
    current: &Option<(String, String)>,
    segments: &mut Vec<Segment>,
) {
    if buffer.is_empty() {
        return;
    }
    let text = buffer.join("\n").trim().to_string();
    buffer.clear();
    if text.is_empty() {
        return;
    }
    let (number, title) = match current {
        Some((n, t)) => (Some(n.clone()), Some(t.clone())),
        None => (None, None),
    };
    segments.push(Segment::Paragraph {
        section_number: number,
        section_title: title,
        text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocType;
    use crate::rules::RuleSet;

    fn compiled() -> CompiledRules {
        RuleSet::default().compile().unwrap()
    }

    #[test]
    fn test_headers_and_paragraphs() {
        let rules = compiled();
        let lines = [
            "1.1 ALCANCE DEL SUMINISTRO",
            "El proveedor suministrará",
            "la bomba completa.",
            "1.2 Normas Aplicables",
            "ASME B73.1",
        ];
        let segments = segment_sections(&lines, &rules);
        assert_eq!(segments.len(), 4);
        assert_eq!(
            segments[0],
            Segment::Header {
                number: "1.1".to_string(),
                title: "ALCANCE DEL SUMINISTRO".to_string(),
            }
        );
        assert_eq!(
            segments[1],
            Segment::Paragraph {
                section_number: Some("1.1".to_string()),
                section_title: Some("ALCANCE DEL SUMINISTRO".to_string()),
                text: "El proveedor suministrará\nla bomba completa.".to_string(),
            }
        );
        assert!(matches!(&segments[2], Segment::Header { number, .. } if number == "1.2"));
    }

    #[test]
    fn test_text_before_first_header_is_unattached() {
        let rules = compiled();
        let segments = segment_sections(&["Texto de portada", "2.1. Pruebas Requeridas"], &rules);
        assert_eq!(
            segments[0],
            Segment::Paragraph {
                section_number: None,
                section_title: None,
                text: "Texto de portada".to_string(),
            }
        );
        // trailing dot on the number is dropped
        assert!(matches!(&segments[1], Segment::Header { number, .. } if number == "2.1"));
    }

    #[test]
    fn test_rejected_headers_stay_in_prose() {
        let rules = compiled();
        // bare number without a dotted level, and a stopword-led title
        let lines = ["4 INTRODUCCIÓN", "1.1 de los equipos"];
        let segments = segment_sections(&lines, &rules);
        assert_eq!(segments.len(), 1);
        assert_eq!(
            segments[0],
            Segment::Paragraph {
                section_number: None,
                section_title: None,
                text: "4 INTRODUCCIÓN\n1.1 de los equipos".to_string(),
            }
        );
    }

    #[test]
    fn test_row_and_block_conversion() {
        let seg = Segment::Header {
            number: "3.2".to_string(),
            title: "MATERIALES".to_string(),
        };
        let row = seg.clone().into_row(7);
        assert_eq!(row.kind, "section_header");
        assert_eq!(row.text, "");
        assert_eq!(row.page, 7);

        let source = BlockSource {
            doc_id: "doc".into(),
            doc_type: DocType::Et,
            file_name: "doc.pdf".into(),
            page: 7,
        };
        let json = serde_json::to_string(&seg.into_block(source)).unwrap();
        assert!(json.contains("\"type\":\"section_header\""));
        assert!(json.contains("\"section_number\":\"3.2\""));
    }
}
