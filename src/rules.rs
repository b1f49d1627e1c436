//! Corpus rule tables.
//!
//! Keyword lists, patterns and per-document-type overrides are corpus
//! tuning, not logic, so they live in one versioned [`RuleSet`] value that
//! can be serialized, reviewed and swapped per corpus. [`RuleSet::default`]
//! carries the tuning for the Spanish engineering corpus this pipeline was
//! built against; a JSON file loaded with [`RuleSet::from_path`] may
//! override any subset of the tables.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::text::CellFixup;

/// Page-number overrides for one document type (1-based pages).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageRules {
    /// Pages always classified as diagrams.
    #[serde(default)]
    pub pid: Vec<u32>,
    /// Pages never classified as diagrams.
    #[serde(default)]
    pub no_pid: Vec<u32>,
}

/// One keyword-to-test-type mapping entry. First match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestKeyword {
    pub pattern: String,
    pub test_type: String,
}

/// One revision-status flag pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRule {
    pub name: String,
    pub pattern: String,
}

/// One process-value extraction rule. With `value` set, a match yields that
/// fixed value; otherwise the first capture group, trimmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRule {
    pub field: String,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One OCR cell repair rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixupRule {
    pub pattern: String,
    pub replacement: String,
}

/// The complete rule inventory driving detection heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rule set revision, carried into run provenance.
    #[serde(default = "default_version")]
    pub version: String,

    /// First-page keyword hints per document type token.
    #[serde(default = "default_doc_type_hints")]
    pub doc_type_hints: BTreeMap<String, Vec<String>>,

    /// Patterns marking diagram-title text (any match flags the page).
    #[serde(default = "default_diagram_title_patterns")]
    pub diagram_title_patterns: Vec<String>,

    /// Marker that exempts a page with a large table from demotion.
    #[serde(default = "default_diagram_marker_pattern")]
    pub diagram_marker_pattern: String,

    /// Drawing reference code pattern (e.g. `FFM/F-S-ME-015`).
    #[serde(default = "default_reference_pattern")]
    pub reference_pattern: String,

    /// Line-anchored note patterns; first capture is the note text.
    #[serde(default = "default_note_patterns")]
    pub note_patterns: Vec<String>,

    /// Per-document-type page overrides.
    #[serde(default = "default_page_rules")]
    pub page_rules: BTreeMap<String, PageRules>,

    /// Revision token patterns over the file stem, in priority order.
    #[serde(default = "default_revision_patterns")]
    pub revision_patterns: Vec<String>,

    /// Page-number line shape kept by the header plausibility filter.
    #[serde(default = "default_page_number_pattern")]
    pub page_number_pattern: String,

    /// Numbered section heading pattern; captures number and title.
    #[serde(default = "default_section_header_pattern")]
    pub section_header_pattern: String,

    /// Words a section title never starts with.
    #[serde(default = "default_title_stopwords")]
    pub title_stopwords: Vec<String>,

    /// Table caption shape used for nearest-caption enrichment.
    #[serde(default = "default_caption_pattern")]
    pub caption_pattern: String,

    /// Keyword patterns mapped to test type identifiers.
    #[serde(default = "default_test_keywords")]
    pub test_keywords: Vec<TestKeyword>,

    /// Standalone tokens that count as checkbox glyphs.
    #[serde(default = "default_check_glyphs")]
    pub check_glyphs: Vec<String>,

    /// Revision/issue boilerplate that never counts as a checked line.
    #[serde(default = "default_check_ignore_pattern")]
    pub check_ignore_pattern: String,

    /// Context words a short line must carry to count as a check.
    #[serde(default = "default_check_context_words")]
    pub check_context_words: Vec<String>,

    /// Fixed datasheet checklist phrases scanned for presence marks.
    #[serde(default = "default_checklist_phrases")]
    pub checklist_phrases: Vec<String>,

    /// Revision-status flags scanned across datasheet rows.
    #[serde(default = "default_flag_rules")]
    pub flag_rules: Vec<FlagRule>,

    /// Scalar process values extracted from the datasheet master.
    #[serde(default = "default_process_rules")]
    pub process_rules: Vec<ProcessRule>,

    /// OCR repairs applied during cell normalization.
    #[serde(default = "default_cell_fixups")]
    pub cell_fixups: Vec<FixupRule>,

    /// Page text markers that suppress table extraction (covers, TOCs).
    #[serde(default = "default_table_skip_markers")]
    pub table_skip_markers: Vec<String>,

    /// Row head words ending the datasheet tests table scan.
    #[serde(default = "default_tests_stop_words")]
    pub tests_stop_words: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            version: default_version(),
            doc_type_hints: default_doc_type_hints(),
            diagram_title_patterns: default_diagram_title_patterns(),
            diagram_marker_pattern: default_diagram_marker_pattern(),
            reference_pattern: default_reference_pattern(),
            note_patterns: default_note_patterns(),
            page_rules: default_page_rules(),
            revision_patterns: default_revision_patterns(),
            page_number_pattern: default_page_number_pattern(),
            section_header_pattern: default_section_header_pattern(),
            title_stopwords: default_title_stopwords(),
            caption_pattern: default_caption_pattern(),
            test_keywords: default_test_keywords(),
            check_glyphs: default_check_glyphs(),
            check_ignore_pattern: default_check_ignore_pattern(),
            check_context_words: default_check_context_words(),
            checklist_phrases: default_checklist_phrases(),
            flag_rules: default_flag_rules(),
            process_rules: default_process_rules(),
            cell_fixups: default_cell_fixups(),
            table_skip_markers: default_table_skip_markers(),
            tests_stop_words: default_tests_stop_words(),
        }
    }
}

impl RuleSet {
    /// Load a rule set from a JSON file. Tables absent from the file keep
    /// their built-in defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::RuleSet(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::RuleSet(format!("malformed rule set {}: {e}", path.display())))
    }

    /// Write the rule set as pretty JSON, the shape `from_path` accepts.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Compile every pattern once for use across a run.
    pub fn compile(&self) -> Result<CompiledRules> {
        CompiledRules::new(self.clone())
    }

    /// Override pages for one document type token, if declared.
    pub fn page_rules_for(&self, doc_type: &str) -> Option<&PageRules> {
        self.page_rules.get(doc_type)
    }
}

/// A [`RuleSet`] with every pattern compiled. Built once per run.
#[derive(Debug)]
pub struct CompiledRules {
    pub set: RuleSet,
    pub diagram_title: Regex,
    pub diagram_marker: Regex,
    pub reference: Regex,
    pub notes: Vec<Regex>,
    pub revisions: Vec<Regex>,
    pub page_number: Regex,
    pub section_header: Regex,
    pub caption: Regex,
    pub test_keywords: Vec<(Regex, String)>,
    pub check_ignore: Regex,
    pub flags: Vec<(String, Regex)>,
    pub process: Vec<(ProcessRule, Regex)>,
    pub cell_fixups: Vec<CellFixup>,
}

impl CompiledRules {
    fn new(set: RuleSet) -> Result<Self> {
        let diagram_alternation = set
            .diagram_title_patterns
            .iter()
            .map(|p| format!("(?:{p})"))
            .collect::<Vec<_>>()
            .join("|");

        let diagram_title = build(&diagram_alternation, true, false)?;
        let diagram_marker = build(&set.diagram_marker_pattern, true, false)?;
        let reference = build(&set.reference_pattern, false, false)?;
        let notes = set
            .note_patterns
            .iter()
            .map(|p| build(p, true, true))
            .collect::<Result<Vec<_>>>()?;
        let revisions = set
            .revision_patterns
            .iter()
            .map(|p| build(p, false, false))
            .collect::<Result<Vec<_>>>()?;
        let page_number = build(&format!("^(?:{})$", set.page_number_pattern), true, false)?;
        let section_header = build(&set.section_header_pattern, false, false)?;
        let caption = build(&set.caption_pattern, true, false)?;
        let test_keywords = set
            .test_keywords
            .iter()
            .map(|k| Ok((build(&k.pattern, true, false)?, k.test_type.clone())))
            .collect::<Result<Vec<_>>>()?;
        let check_ignore = build(&set.check_ignore_pattern, true, false)?;
        let flags = set
            .flag_rules
            .iter()
            .map(|f| Ok((f.name.clone(), build(&f.pattern, true, false)?)))
            .collect::<Result<Vec<_>>>()?;
        let process = set
            .process_rules
            .iter()
            .map(|r| Ok((r.clone(), build(&r.pattern, true, false)?)))
            .collect::<Result<Vec<_>>>()?;
        let cell_fixups = set
            .cell_fixups
            .iter()
            .map(|f| {
                Ok(CellFixup {
                    pattern: build(&f.pattern, true, false)?,
                    replacement: f.replacement.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            set,
            diagram_title,
            diagram_marker,
            reference,
            notes,
            revisions,
            page_number,
            section_header,
            caption,
            test_keywords,
            check_ignore,
            flags,
            process,
            cell_fixups,
        })
    }

    /// True when the token is a standalone checkbox glyph or mark.
    pub fn is_check_token(&self, token: &str) -> bool {
        token == "x" || token == "X" || self.set.check_glyphs.iter().any(|g| g == token)
    }
}

fn build(pattern: &str, case_insensitive: bool, multi_line: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .multi_line(multi_line)
        .build()
        .map_err(|e| Error::RuleSet(format!("bad pattern {pattern:?}: {e}")))
}

fn default_version() -> String {
    "2024.1".to_string()
}

fn default_doc_type_hints() -> BTreeMap<String, Vec<String>> {
    let mut hints = BTreeMap::new();
    hints.insert(
        "ET".to_string(),
        vec!["Especificación Técnica".to_string(), " ET ".to_string()],
    );
    hints.insert(
        "HD".to_string(),
        vec![
            "Hoja de Datos".to_string(),
            "Hojas de Datos".to_string(),
            " HD ".to_string(),
        ],
    );
    hints.insert(
        "MR".to_string(),
        vec![
            "Manual de Requisitos".to_string(),
            "Requisición".to_string(),
            "Requisition".to_string(),
            " MR ".to_string(),
        ],
    );
    hints.insert(
        "PID".to_string(),
        vec![
            "P&ID".to_string(),
            "P & ID".to_string(),
            "DIAGRAMA DE TUBERÍAS".to_string(),
            "Piping and Instrumentation Diagram".to_string(),
        ],
    );
    hints
}

fn default_diagram_title_patterns() -> Vec<String> {
    [
        r"\bP&ID\b",
        r"\bP\s*&\s*ID\b",
        r"\bPIPING\s+AND\s+INSTRUMENTATION\b",
        r"\bPROCESS\s+AND\s+INSTRUMENTATION\b",
        r"\bDIAGRAMA\b",
        r"\bDIAGRAM\b",
        r"\bDIAGRAMA\s+DE\s+TUBER[ÍI]A\s+E\s+INSTRUMENTACI[ÓO]N\b",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_diagram_marker_pattern() -> String {
    r"\bDIAGRAMA\b".to_string()
}

fn default_reference_pattern() -> String {
    r"[A-Z]{2,}(?:/[A-Z0-9\-]+){1,}".to_string()
}

fn default_note_patterns() -> Vec<String> {
    vec![
        r"^\s*Nota:\s*(.+)$".to_string(),
        r"^\s*Note:\s*(.+)$".to_string(),
    ]
}

fn default_page_rules() -> BTreeMap<String, PageRules> {
    let mut rules = BTreeMap::new();
    // HD sheets 2-3 are datasheet pages, sheet 4 is the embedded diagram
    rules.insert(
        "HD".to_string(),
        PageRules {
            pid: vec![4],
            no_pid: vec![2, 3],
        },
    );
    rules
}

fn default_revision_patterns() -> Vec<String> {
    vec![
        r"(\d{2,4}[\.\-_,]\d+)\D*$".to_string(),
        r"(\d{2,4}\.\d+)".to_string(),
    ]
}

fn default_page_number_pattern() -> String {
    r"page \d+|página \d+|pag \d+".to_string()
}

fn default_section_header_pattern() -> String {
    r"^\s*(\d+(?:\.\d+)+\.?)\s+(.+)$".to_string()
}

fn default_title_stopwords() -> Vec<String> {
    [
        "de", "del", "la", "el", "los", "las", "y", "o", "u", "en", "por", "para", "con",
        "veces",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_caption_pattern() -> String {
    r"^\s*(?:tabla|table)\s+\d+\.?\s+.+".to_string()
}

fn default_test_keywords() -> Vec<TestKeyword> {
    [
        (r"\bhidrost", "hydrostatic_pressure_test"),
        (r"\bhidrostat", "hydrostatic_pressure_test"),
        (r"\bfat\b", "factory_acceptance_test"),
        (r"\bsat\b", "site_acceptance_test"),
        (r"\bradi(?:og|o)g", "ndt_rt"),
        (r"\bultrason", "ndt_ut"),
        (r"\bpart[ií]culas\s+magn", "ndt_mt"),
        (r"\bl[ií]quidos\s+penetr", "ndt_pt"),
        (r"\bi/o\b", "io_checks"),
        (r"\bentradas\b", "io_checks"),
        (r"\bsalidas\b", "io_checks"),
        (r"\balarmas\b", "io_checks"),
    ]
    .iter()
    .map(|(p, t)| TestKeyword {
        pattern: p.to_string(),
        test_type: t.to_string(),
    })
    .collect()
}

fn default_check_glyphs() -> Vec<String> {
    ["☒", "☑", "✓", "✔", "●", "◼", "■", "•", "◻"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_check_ignore_pattern() -> String {
    r"FOR\s+CONSTRUCTION|IFR|IFC|REV(?:ISION)?\s*:?|EMISI[ÓO]N|PROP[ÓO]SITO|ISSUED\s+FOR"
        .to_string()
}

fn default_check_context_words() -> Vec<String> {
    [
        "REQUI", "PRESENCI", "PRUEB", "HIDRO", "SAT", "FAT", "NDT", "INSPECCI", "TEST",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_checklist_phrases() -> Vec<String> {
    [
        "Inspección usando la lista de comprobación de API 675",
        "Certificados de materiales",
        "Ensayos no destructivos",
        "Radiográfico",
        "Ultrasonidos",
        "Partículas magnéticas",
        "Líquidos penetrantes",
        "Limpieza antes del montaje final",
        "Durezas en soldaduras y zonas térmicamente afectadas",
        "Suministrar procedimientos de ensayos presenciados",
        "Unidades en placa características",
        "Tuberías de proceso suministradas por vendedor",
        "Panel View para cada paquete de Inyección",
        "Quill de inyección con boquilla de dosificación",
        "El vendedor suministra válvula de alivio de presión",
        "Indicador de presión a la descarga de las bombas",
        "Válvulas dobles de antirretorno requeridas",
        "Tablero eléctrico (mínimo NEMA 4X)",
        "Sistema de Control",
        "Indicador de nivel",
        "Skid estructural para paquetizado",
        "El vendedor suministra válvula de contrapresión",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_flag_rules() -> Vec<FlagRule> {
    [
        ("for_construction", r"\bFOR\s+CONSTRUCTION\b"),
        ("for_information", r"\bFOR\s+INFORMATION\b"),
        ("for_approval_comments", r"\bFOR\s+APPROVAL/COMMENTS\b"),
        ("for_purchasing", r"\bFOR\s+PURCHASING\b"),
        ("for_design", r"\bFOR\s+DESIGN\b"),
        ("as_built", r"\bAS\s+BUILT\b"),
    ]
    .iter()
    .map(|(n, p)| FlagRule {
        name: n.to_string(),
        pattern: p.to_string(),
    })
    .collect()
}

fn default_process_rules() -> Vec<ProcessRule> {
    vec![
        ProcessRule {
            field: "P_descarga_normal_psig".to_string(),
            pattern: r"Presión de descarga .*?Normal\s*([0-9]+)\b".to_string(),
            value: None,
        },
        ProcessRule {
            field: "SG_normal".to_string(),
            pattern: r"Gravedad Especifica .*?Normal\s*([0-9]+(?:\.[0-9]+)?)".to_string(),
            value: None,
        },
        ProcessRule {
            field: "viscosidad_cP".to_string(),
            pattern: r"VISCOSIDAD\s*\(CP\)\s*TBD".to_string(),
            value: Some("TBD".to_string()),
        },
        ProcessRule {
            field: "clasificacion_area".to_string(),
            pattern: r"Clase\s*1\s*Div\s*2\s*Grupo\s*D".to_string(),
            value: Some("Clase 1 Div 2 Grupo D".to_string()),
        },
        ProcessRule {
            field: "voltaje_V".to_string(),
            pattern: r"Voltaje\s*\(V\)\s*([0-9/ ]+)".to_string(),
            value: None,
        },
        ProcessRule {
            field: "frecuencia_Hz".to_string(),
            pattern: r"Frecuencia\s*\(Hz\)\s*([0-9]+)".to_string(),
            value: None,
        },
        ProcessRule {
            field: "fases".to_string(),
            pattern: r"Fases\s*([0-9]+)".to_string(),
            value: None,
        },
    ]
}

fn default_cell_fixups() -> Vec<FixupRule> {
    [
        (r"\bM\s*a\s*x\b", "Max"),
        (r"\bM\s*i\s*n\b", "Min"),
        (r"\bN\s*/\s*A\b", "N/A"),
        (r"\bA\s*S\s*T\s*M\b", "ASTM"),
        (r"\bP\s*S\s*V\b", "PSV"),
        (r"\bD\s*C\s*S\b", "DCS"),
        (r"\bC\s*C\s*M\b", "CCM"),
        (r"\bH\s*D\b", "HD"),
    ]
    .iter()
    .map(|(p, r)| FixupRule {
        pattern: p.to_string(),
        replacement: r.to_string(),
    })
    .collect()
}

fn default_table_skip_markers() -> Vec<String> {
    [
        "TABLA DE CONTENIDO",
        "CONTENTS",
        "INTRODUCCIÓN",
        "PORTADA",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_tests_stop_words() -> Vec<String> {
    [
        "NOTAS",
        "PREPARACIÓN",
        "PESOS",
        "FLUIDO DE LUBRICACIÓN",
        "ACCIONAMIENTO",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_compile() {
        let compiled = RuleSet::default().compile().unwrap();
        assert!(compiled.diagram_title.is_match("Ver P&ID adjunto"));
        assert!(compiled.diagram_title.is_match("diagrama de tubería e instrumentación"));
        assert!(compiled.reference.is_match("FFM/F-S-ME-015"));
        assert!(compiled.page_number.is_match("Página 3"));
        assert!(!compiled.page_number.is_match("see página 3 below"));
    }

    #[test]
    fn test_check_tokens() {
        let compiled = RuleSet::default().compile().unwrap();
        assert!(compiled.is_check_token("x"));
        assert!(compiled.is_check_token("☒"));
        assert!(!compiled.is_check_token("Max"));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let json = r#"{"version": "corpus-b.1", "table_skip_markers": ["COVER"]}"#;
        let rules: RuleSet = serde_json::from_str(json).unwrap();
        assert_eq!(rules.version, "corpus-b.1");
        assert_eq!(rules.table_skip_markers, vec!["COVER".to_string()]);
        // untouched tables keep the built-ins
        assert_eq!(rules.page_rules["HD"].pid, vec![4]);
        assert_eq!(rules.checklist_phrases.len(), 22);
    }

    #[test]
    fn test_roundtrip_through_json() {
        let rules = RuleSet::default();
        let json = serde_json::to_string(&rules).unwrap();
        let back: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, rules.version);
        assert_eq!(back.test_keywords.len(), rules.test_keywords.len());
        back.compile().unwrap();
    }
}
