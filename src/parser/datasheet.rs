//! Datasheet master scanning and tidy key-value extraction.
//!
//! The per-document master is a flat list of cleaned table rows. Four
//! scans read it: PRUEBAS rows under the tests header (required and
//! witnessed marks per test name), REQUISITOS checklist phrases,
//! BANDERAS revision flags, and PROCESO scalar values. Checked marks
//! always win over unchecked ones when a phrase repeats.

use serde::Serialize;

use crate::model::CheckState;
use crate::rules::{CompiledRules, ProcessRule};
use crate::text::{collapse_ws, row_has_content};

/// Required/witnessed marks for one test row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestMarks {
    pub required: Option<bool>,
    pub witnessed: Option<bool>,
}

/// Location of the tests header row and its named columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestsHeader {
    pub row: usize,
    pub name_col: usize,
    pub required_col: Option<usize>,
    pub witnessed_col: Option<usize>,
}

/// One row of the tidy CSV. Group decides which value columns apply.
#[derive(Debug, Clone, Serialize)]
pub struct TidyRow {
    pub grupo: String,
    pub item: String,
    pub requerida: Option<bool>,
    pub presenciada: Option<bool>,
    pub seleccionado: Option<bool>,
    pub valor: Option<String>,
}

/// What the tidy extraction found, recorded in the document summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TidySummary {
    pub tidy_rows: usize,
    pub tests_detected: Vec<String>,
    pub requirements_true: Vec<String>,
    pub flags_true: Vec<String>,
    pub process_fields: Vec<String>,
}

/// Find the row introducing the tests block: it must mention both the
/// block name and the required column. Column indexes come from header
/// cell text, with a positional fallback for the required column.
pub fn find_tests_header(rows: &[Vec<String>]) -> Option<TestsHeader> {
    for (idx, row) in rows.iter().enumerate() {
        let joined = row.join(" ").to_lowercase();
        if joined.contains("pruebas") && joined.contains("requerida") {
            let required_col = row
                .iter()
                .position(|c| c.to_lowercase().contains("requerida"))
                .or((row.len() > 1).then_some(1));
            let witnessed_col = row
                .iter()
                .position(|c| c.to_lowercase().contains("presenci"));
            return Some(TestsHeader {
                row: idx,
                name_col: 0,
                required_col,
                witnessed_col,
            });
        }
    }
    None
}

/// Scan test rows below the header until a blank row or a stop word.
///
/// A numeric first cell (a row counter) defers to the second cell for
/// the test name. Marks come from the named columns; when both are
/// empty the first two marks anywhere in the row are taken as
/// required/witnessed. A repeated name keeps its first position but
/// takes the later marks.
pub fn scan_tests(
    rows: &[Vec<String>],
    header: &TestsHeader,
    stop_words: &[String],
) -> Vec<(String, TestMarks)> {
    let mut out: Vec<(String, TestMarks)> = Vec::new();
    for row in rows.iter().skip(header.row + 1) {
        if !row_has_content(row) {
            break;
        }
        let head = row.first().map(|c| c.to_uppercase()).unwrap_or_default();
        if stop_words.iter().any(|w| head.contains(w.as_str())) {
            break;
        }

        let mut name = row.get(header.name_col).cloned().unwrap_or_default();
        if is_row_counter(&name) {
            if let Some(second) = row.get(1) {
                if second.chars().any(char::is_alphabetic) {
                    name = second.clone();
                }
            }
        }
        if name.is_empty() {
            continue;
        }

        let required_tok = cell_at(row, header.required_col);
        let witnessed_tok = cell_at(row, header.witnessed_col);
        let marks = if required_tok.is_empty() && witnessed_tok.is_empty() {
            let found: Vec<bool> = row_tokens(row)
                .into_iter()
                .filter_map(|t| CheckState::from_token(t).as_bool())
                .collect();
            TestMarks {
                required: found.first().copied(),
                witnessed: found.get(1).copied(),
            }
        } else {
            TestMarks {
                required: CheckState::from_token(required_tok).as_bool(),
                witnessed: CheckState::from_token(witnessed_tok).as_bool(),
            }
        };

        match out.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = marks,
            None => out.push((name, marks)),
        }
    }
    out
}

/// Presence marks for the fixed checklist phrases, in phrase order.
pub fn scan_checklist(rows: &[Vec<String>], phrases: &[String]) -> Vec<(String, Option<bool>)> {
    let mut found: Vec<(String, Option<bool>)> =
        phrases.iter().map(|p| (p.clone(), None)).collect();
    for row in rows {
        let joined = collapse_ws(&row.join(" "));
        if joined.is_empty() {
            continue;
        }
        let (checked_any, unchecked_any) = row_mark_presence(row);
        for (phrase, val) in found.iter_mut() {
            if joined.contains(phrase.as_str()) {
                if checked_any {
                    *val = Some(true);
                } else if unchecked_any && val.is_none() {
                    *val = Some(false);
                }
            }
        }
    }
    found
}

/// Revision-status flags matched against whole-row text, in rule order.
pub fn scan_flags(
    rows: &[Vec<String>],
    flags: &[(String, regex::Regex)],
) -> Vec<(String, Option<bool>)> {
    let mut found: Vec<(String, Option<bool>)> =
        flags.iter().map(|(name, _)| (name.clone(), None)).collect();
    for row in rows {
        let row_text = row.join(" ");
        let (checked_any, unchecked_any) = row_mark_presence(row);
        for ((_, rx), (_, val)) in flags.iter().zip(found.iter_mut()) {
            if rx.is_match(&row_text) {
                if checked_any {
                    *val = Some(true);
                } else if unchecked_any && val.is_none() {
                    *val = Some(false);
                }
            }
        }
    }
    found
}

/// Scalar process values pulled from the whole master text, one line
/// per row. A rule with a fixed value fires on match; otherwise the
/// first capture group is taken, trimmed.
pub fn scan_process(
    rows: &[Vec<String>],
    rules: &[(ProcessRule, regex::Regex)],
) -> Vec<(String, String)> {
    let joined = rows
        .iter()
        .map(|row| row.join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = Vec::new();
    for (rule, rx) in rules {
        if let Some(caps) = rx.captures(&joined) {
            let value = match &rule.value {
                Some(fixed) => fixed.clone(),
                None => caps
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            };
            if !value.is_empty() {
                out.push((rule.field.clone(), value));
            }
        }
    }
    out
}

/// Run the four scans over master rows and assemble the tidy records.
pub fn build_datasheet_tidy(
    rows: &[Vec<String>],
    rules: &CompiledRules,
) -> (Vec<TidyRow>, TidySummary) {
    let tests = match find_tests_header(rows) {
        Some(header) => scan_tests(rows, &header, &rules.set.tests_stop_words),
        None => Vec::new(),
    };
    let checklist = scan_checklist(rows, &rules.set.checklist_phrases);
    let flags = scan_flags(rows, &rules.flags);
    let process = scan_process(rows, &rules.process);

    let mut tidy = Vec::new();
    for (name, marks) in &tests {
        tidy.push(TidyRow {
            grupo: "PRUEBAS".to_string(),
            item: name.clone(),
            requerida: marks.required,
            presenciada: marks.witnessed,
            seleccionado: None,
            valor: None,
        });
    }
    for (phrase, val) in &checklist {
        tidy.push(TidyRow {
            grupo: "REQUISITOS".to_string(),
            item: phrase.clone(),
            requerida: None,
            presenciada: None,
            seleccionado: *val,
            valor: None,
        });
    }
    for (name, val) in &flags {
        tidy.push(TidyRow {
            grupo: "BANDERAS".to_string(),
            item: name.clone(),
            requerida: None,
            presenciada: None,
            seleccionado: *val,
            valor: None,
        });
    }
    for (field, value) in &process {
        tidy.push(TidyRow {
            grupo: "PROCESO".to_string(),
            item: field.clone(),
            requerida: None,
            presenciada: None,
            seleccionado: None,
            valor: Some(value.clone()),
        });
    }

    let summary = TidySummary {
        tidy_rows: tidy.len(),
        tests_detected: tests.iter().map(|(n, _)| n.clone()).collect(),
        requirements_true: trues(&checklist),
        flags_true: trues(&flags),
        process_fields: process.iter().map(|(f, _)| f.clone()).collect(),
    };
    (tidy, summary)
}

fn trues(entries: &[(String, Option<bool>)]) -> Vec<String> {
    entries
        .iter()
        .filter(|(_, v)| *v == Some(true))
        .map(|(name, _)| name.clone())
        .collect()
}

fn row_tokens(row: &[String]) -> Vec<&str> {
    row.iter().flat_map(|c| c.split_whitespace()).collect()
}

fn row_mark_presence(row: &[String]) -> (bool, bool) {
    let mut checked = false;
    let mut unchecked = false;
    for tok in row_tokens(row) {
        match CheckState::from_token(tok).as_bool() {
            Some(true) => checked = true,
            Some(false) => unchecked = true,
            None => {}
        }
    }
    (checked, unchecked)
}

/// A bare 1-3 digit cell is a row counter, not a test name.
fn is_row_counter(cell: &str) -> bool {
    !cell.is_empty() && cell.len() <= 3 && cell.chars().all(|c| c.is_ascii_digit())
}

fn cell_at(row: &[String], col: Option<usize>) -> &str {
    col.and_then(|i| row.get(i)).map(String::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_find_tests_header_columns() {
        let master = rows(&[
            &["HOJA DE DATOS", "", "", ""],
            &["PRUEBAS", "", "Requerida", "Presenciada"],
        ]);
        let header = find_tests_header(&master).unwrap();
        assert_eq!(header.row, 1);
        assert_eq!(header.name_col, 0);
        assert_eq!(header.required_col, Some(2));
        assert_eq!(header.witnessed_col, Some(3));

        assert!(find_tests_header(&rows(&[&["PRUEBAS", "marcas"]])).is_none());
    }

    #[test]
    fn test_scan_tests_column_marks() {
        let master = rows(&[
            &["PRUEBAS", "", "Requerida", "Presenciada"],
            &["Prueba hidrostática", "", "l", ""],
            &["FAT", "", "m", "l"],
            &["1", "Prueba de vacío", "x", ""],
            &["NOTAS generales", "", "", ""],
            &["Nunca alcanzada", "", "l", ""],
        ]);
        let header = find_tests_header(&master).unwrap();
        let stop = RuleSet::default().tests_stop_words;
        let tests = scan_tests(&master, &header, &stop);
        assert_eq!(tests.len(), 3);
        assert_eq!(tests[0].0, "Prueba hidrostática");
        assert_eq!(
            tests[0].1,
            TestMarks {
                required: Some(true),
                witnessed: None,
            }
        );
        assert_eq!(
            tests[1].1,
            TestMarks {
                required: Some(false),
                witnessed: Some(true),
            }
        );
        // numeric row counter defers to the second cell
        assert_eq!(tests[2].0, "Prueba de vacío");
    }

    #[test]
    fn test_scan_tests_positional_fallback() {
        let master = rows(&[
            &["PRUEBAS", "Requerida", "Presenciada", ""],
            &["Líquidos penetrantes", "", "", "x"],
            &["Ultrasonidos", "", "", ""],
        ]);
        let header = find_tests_header(&master).unwrap();
        let tests = scan_tests(&master, &header, &RuleSet::default().tests_stop_words);
        // the named columns are empty, so the row-wide mark fills required
        assert_eq!(
            tests[0].1,
            TestMarks {
                required: Some(true),
                witnessed: None,
            }
        );
        assert_eq!(tests[1].1, TestMarks::default());
    }

    #[test]
    fn test_scan_tests_repeated_name_keeps_position() {
        let master = rows(&[
            &["PRUEBAS", "", "Requerida", ""],
            &["FAT", "", "m", ""],
            &["SAT", "", "l", ""],
            &["FAT", "", "l", ""],
        ]);
        let header = find_tests_header(&master).unwrap();
        let tests = scan_tests(&master, &header, &RuleSet::default().tests_stop_words);
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].0, "FAT");
        assert_eq!(tests[0].1.required, Some(true));
    }

    #[test]
    fn test_scan_checklist_checked_wins() {
        let phrases = vec![
            "Certificados de materiales".to_string(),
            "Radiográfico".to_string(),
            "Indicador de nivel".to_string(),
        ];
        let master = rows(&[
            &["Certificados de materiales", "l"],
            &["Radiográfico", "m"],
            &["Radiográfico", "x"],
        ]);
        let found = scan_checklist(&master, &phrases);
        assert_eq!(found[0], ("Certificados de materiales".to_string(), Some(true)));
        assert_eq!(found[1], ("Radiográfico".to_string(), Some(true)));
        assert_eq!(found[2], ("Indicador de nivel".to_string(), None));
    }

    #[test]
    fn test_scan_flags() {
        let compiled = RuleSet::default().compile().unwrap();
        let master = rows(&[
            &["FOR CONSTRUCTION", "x"],
            &["FOR INFORMATION", "m"],
        ]);
        let flags = scan_flags(&master, &compiled.flags);
        let get = |name: &str| {
            flags
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| *v)
                .unwrap()
        };
        assert_eq!(get("for_construction"), Some(true));
        assert_eq!(get("for_information"), Some(false));
        assert_eq!(get("as_built"), None);
    }

    #[test]
    fn test_scan_process_values() {
        let compiled = RuleSet::default().compile().unwrap();
        let master = rows(&[
            &["Presión de descarga (psig)", "Normal 250"],
            &["VISCOSIDAD (CP) TBD", ""],
            &["Voltaje (V) 440/460", "Frecuencia (Hz) 60"],
        ]);
        let vals = scan_process(&master, &compiled.process);
        assert!(vals.contains(&("P_descarga_normal_psig".to_string(), "250".to_string())));
        assert!(vals.contains(&("viscosidad_cP".to_string(), "TBD".to_string())));
        assert!(vals.contains(&("voltaje_V".to_string(), "440/460".to_string())));
        assert!(vals.contains(&("frecuencia_Hz".to_string(), "60".to_string())));
    }

    #[test]
    fn test_build_tidy_groups_in_order() {
        let compiled = RuleSet::default().compile().unwrap();
        let master = rows(&[
            &["PRUEBAS", "", "Requerida", "Presenciada"],
            &["Prueba hidrostática", "", "l", "m"],
            &["", "", "", ""],
            &["Certificados de materiales", "x", "", ""],
            &["FOR CONSTRUCTION", "l", "", ""],
        ]);
        let (tidy, summary) = build_datasheet_tidy(&master, &compiled);

        assert_eq!(tidy[0].grupo, "PRUEBAS");
        assert_eq!(tidy[0].item, "Prueba hidrostática");
        assert_eq!(tidy[0].requerida, Some(true));
        assert_eq!(tidy[0].presenciada, Some(false));

        let groups: Vec<&str> = tidy.iter().map(|r| r.grupo.as_str()).collect();
        let first_req = groups.iter().position(|g| *g == "REQUISITOS").unwrap();
        let first_flag = groups.iter().position(|g| *g == "BANDERAS").unwrap();
        assert!(first_req > 0 && first_flag > first_req);

        assert_eq!(summary.tests_detected, vec!["Prueba hidrostática".to_string()]);
        assert_eq!(
            summary.requirements_true,
            vec!["Certificados de materiales".to_string()]
        );
        assert_eq!(summary.flags_true, vec!["for_construction".to_string()]);
        assert_eq!(summary.tidy_rows, tidy.len());
    }
}
