//! End-to-end tests over an in-memory corpus.
//!
//! Three documents cover the main routes: a technical specification with
//! numbered sections and small tables, an HD datasheet exercising the
//! page-rule overrides, the tests/process scans and the embedded-diagram
//! candidate, and a two-page P&ID set with a large line-list table.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use ingesta::model::{ExtractIndex, MergedSummary, PageRecord};
use ingesta::{
    run_pipeline_with_source, DocSummary, DocType, MemoryDocument, MemorySource, PipelineConfig,
    PipelineReport,
};
use tempfile::TempDir;

const COMPANY_HEADER: &str = "Refinería del Norte S.A. de C.V.";

fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

/// ET specification, three pages, company header repeated on every page.
fn et_doc() -> MemoryDocument {
    let tests_table = table(&[
        &["Prueba", "Norma", "Fluido", "Duración", "Requerida", "Presenciada"],
        &["Hidrostática", "ASME B16.5", "Agua", "30 min", "x", ""],
    ]);
    let materials_table = table(&[
        &["Componente", "Material", "Norma", "Notas"],
        &["Carcasa", "ASTM A351", "-", ""],
        &["Impulsor", "ASTM A744", "-", ""],
    ]);
    MemoryDocument::new()
        .with_page(
            format!(
                "{COMPANY_HEADER}\nESPECIFICACIÓN TÉCNICA\nBOMBAS DOSIFICADORAS DE INYECCIÓN"
            ),
            Vec::new(),
        )
        .with_page(
            format!(
                "{COMPANY_HEADER}\nTabla 1 Resumen de pruebas requeridas\n4.1 PRUEBAS\n\
                 El equipo será probado en fábrica.\nPrueba hidrostática x"
            ),
            vec![tests_table],
        )
        .with_page(
            format!("{COMPANY_HEADER}\n5.2 MATERIALES\nLos materiales cumplirán ASTM A351."),
            vec![materials_table],
        )
}

/// HD datasheet, five pages. Pages 2 and 3 land on the default force-text
/// override, page 4 on the force-diagram override, page 5 is a sparse page
/// that becomes an embedded-diagram candidate.
fn hd_doc() -> MemoryDocument {
    let tests_table = table(&[
        &["PRUEBAS", "Norma", "Fluido", "Presión", "Duración", "Requerida", "Presenciada"],
        &["Prueba hidrostática", "ASME", "Agua", "150 psig", "30 min", "x", ""],
        &["FAT", "API 675", "", "", "", "x", "x"],
        &["SAT", "", "", "", "", "", ""],
    ]);
    let process_table = table(&[
        &[
            "NOTAS DE PROCESO",
            "Presión de descarga (psig) Normal 250",
            "Gravedad Especifica Normal 0.98",
            "VISCOSIDAD (CP) TBD",
            "Voltaje (V) 440/460",
            "Frecuencia (Hz) 60 Fases 3",
        ],
        &[
            "Área",
            "Clase 1 Div 2 Grupo D",
            "Fluido Agua de inyección",
            "Temperatura 25 C",
            "Caudal 10 gpm",
            "Succión atmosférica",
        ],
    ]);
    MemoryDocument::new()
        .with_page(
            "HOJA DE DATOS\nBOMBA DOSIFICADORA DE INYECCIÓN DE INHIBIDOR DE CORROSIÓN\n\
             Servicio continuo en la unidad de tratamiento químico del área 200. El alcance \
             del paquete incluye el patín estructural de montaje, el tanque de día de 450 \
             litros con indicador de nivel, las válvulas de aislamiento en la succión y la \
             descarga, el arreglo de tubería interna del paquete y la instrumentación local \
             necesaria para la operación segura y el mantenimiento rutinario del conjunto.",
            Vec::new(),
        )
        .with_page(
            "PRUEBAS REQUERIDAS\nVer DIAGRAMA de conexiones en la hoja 4",
            vec![tests_table],
        )
        .with_page(
            "Datos de proceso y condiciones de operación",
            vec![process_table],
        )
        .with_page(
            "Ver plano PID/0001-HD-015 adjunto\nNota: conexiones según anexo B",
            Vec::new(),
        )
        .with_page("Ver esquema del patín en el plano adjunto", Vec::new())
}

/// Two-page P&ID set: a title page without tables and a flow sheet with a
/// large line-list grid.
fn pid_doc() -> MemoryDocument {
    let grid: Vec<Vec<String>> = (0..12)
        .map(|r| (0..8).map(|c| format!("r{r}c{c}")).collect())
        .collect();
    MemoryDocument::new()
        .with_page(
            "DIAGRAMA DE TUBERÍA E INSTRUMENTACIÓN\nFFM/F-S-ME-015\n\
             Nota: límite de baterías en la línea P-1001",
            Vec::new(),
        )
        .with_page("DIAGRAMA DE FLUJO DEL ÁREA 200\nLISTA DE LÍNEAS", vec![grid])
}

fn corpus() -> MemorySource {
    MemorySource::new()
        .with_document("0001-ET-023.pdf", et_doc())
        .with_document("0001-HD-015.pdf", hd_doc())
        .with_document("0002-PID-100.pdf", pid_doc())
}

fn run(dir: &TempDir) -> (PipelineConfig, PipelineReport) {
    let config = PipelineConfig::new(dir.path().join("docs"), dir.path().join("out"));
    let report = run_pipeline_with_source(&config, &corpus()).unwrap();
    (config, report)
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn csv_records(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn test_report_counts_across_all_stages() {
    let dir = tempfile::tempdir().unwrap();
    let (_, report) = run(&dir);

    assert_eq!(report.extract.documents, 3);
    assert_eq!(report.extract.pages, 10);
    assert_eq!(report.extract.failed_documents, 0);

    assert_eq!(report.clean.documents, 3);
    assert_eq!(report.clean.removed_lines, 3);
    assert_eq!(report.clean.failed_documents, 0);

    assert_eq!(report.parse.documents, 3);
    assert_eq!(report.parse.pages, 10);
    assert_eq!(report.parse.blocks, 16);
    assert_eq!(report.parse.failed_documents, 0);

    assert_eq!(report.consolidate.documents, 3);
    assert_eq!(report.consolidate.section_rows, 10);
    assert_eq!(report.consolidate.table_rows, 23);
    assert_eq!(report.consolidate.pid_rows, 3);

    assert_eq!(report.graph.nodes, 38);
    assert_eq!(report.graph.edges, 43);
}

#[test]
fn test_extract_index_and_page_files() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = run(&dir);

    let index: ExtractIndex =
        serde_json::from_str(&read(&config.raw_pages_dir().join("index.json"))).unwrap();
    assert_eq!(index.documents.len(), 3);

    let ids: Vec<&str> = index.documents.iter().map(|d| d.doc_id.as_str()).collect();
    assert_eq!(ids, ["0001-ET-023", "0001-HD-015", "0002-PID-100"]);
    assert_eq!(index.documents[0].doc_type, DocType::Et);
    assert_eq!(index.documents[1].doc_type, DocType::Hd);
    assert_eq!(index.documents[2].doc_type, DocType::Pid);
    assert_eq!(index.documents[0].n_pages, 3);
    assert_eq!(index.documents[1].n_pages, 5);
    assert_eq!(index.documents[2].n_pages, 2);

    // Raw page text keeps the running header; clean is a later stage.
    let raw = read(
        &config
            .raw_pages_dir()
            .join("0001-ET-023/0001-ET-023_page_002.txt"),
    );
    assert!(raw.starts_with(COMPANY_HEADER));
    assert!(raw.contains("4.1 PRUEBAS"));
}

#[test]
fn test_clean_strips_repeated_company_header() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = run(&dir);

    let cleaned = read(
        &config
            .clean_pages_dir()
            .join("0001-ET-023/0001-ET-023_page_002.txt"),
    );
    assert_eq!(
        cleaned,
        "Tabla 1 Resumen de pruebas requeridas\n4.1 PRUEBAS\n\
         El equipo será probado en fábrica.\nPrueba hidrostática x"
    );

    // The HD document has no repeated lines, so its pages pass through.
    let untouched = read(
        &config
            .clean_pages_dir()
            .join("0001-HD-015/0001-HD-015_page_004.txt"),
    );
    assert_eq!(
        untouched,
        "Ver plano PID/0001-HD-015 adjunto\nNota: conexiones según anexo B"
    );
}

#[test]
fn test_parse_summaries_per_document() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = run(&dir);
    let blocks = config.blocks_dir();

    let et: DocSummary =
        serde_json::from_str(&read(&blocks.join("0001-ET-023/summary.json"))).unwrap();
    assert_eq!(et.total_blocks, 9);
    assert_eq!(et.total_tables, 2);
    assert_eq!(et.checks_found, 1);
    assert!(et.embedded_pid_pages.is_empty());
    assert!(et.pid_context.is_empty());
    assert!(et.datasheet.is_none());
    assert_eq!(et.pages_ok, 3);

    let hd: DocSummary =
        serde_json::from_str(&read(&blocks.join("0001-HD-015/summary.json"))).unwrap();
    assert_eq!(hd.total_blocks, 6);
    assert_eq!(hd.total_tables, 2);
    assert_eq!(hd.checks_found, 0);
    // Page 4 is the forced diagram page, page 5 the embedded candidate.
    assert_eq!(hd.embedded_pid_pages, [4, 5]);
    assert_eq!(hd.pid_context.len(), 1);
    assert_eq!(hd.pid_context[0].page, 4);
    assert_eq!(hd.pid_context[0].pid_reference.as_deref(), Some("PID/0001-HD-015"));
    assert_eq!(hd.pid_context[0].pid_note.as_deref(), Some("conexiones según anexo B"));
    assert_eq!(hd.pid_context[0].rule.as_deref(), Some("RULE_FORCE_PID"));

    let pid: DocSummary =
        serde_json::from_str(&read(&blocks.join("0002-PID-100/summary.json"))).unwrap();
    assert_eq!(pid.total_blocks, 1);
    assert_eq!(pid.total_tables, 1);
    assert_eq!(pid.embedded_pid_pages, [1, 2]);
    assert_eq!(pid.pid_context.len(), 2);
    assert_eq!(pid.pid_context[0].pid_reference.as_deref(), Some("FFM/F-S-ME-015"));
    assert_eq!(
        pid.pid_context[0].pid_note.as_deref(),
        Some("límite de baterías en la línea P-1001")
    );
    assert!(pid.pid_context[1].pid_reference.is_none());
}

#[test]
fn test_parse_datasheet_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = run(&dir);
    let doc_dir = config.blocks_dir().join("0001-HD-015");

    let hd: DocSummary = serde_json::from_str(&read(&doc_dir.join("summary.json"))).unwrap();
    let sheet = hd.datasheet.expect("HD document builds a datasheet");
    assert_eq!(sheet.master_csv, "HD_master_clean.csv");
    assert_eq!(sheet.tidy_csv, "HD_tidy.csv");
    assert_eq!(sheet.pruebas, ["Prueba hidrostática", "FAT", "SAT"]);
    assert!(sheet.requisitos_true.is_empty());
    assert!(sheet.banderas_true.is_empty());
    assert_eq!(
        sheet.proceso_fields,
        [
            "P_descarga_normal_psig",
            "SG_normal",
            "viscosidad_cP",
            "clasificacion_area",
            "voltaje_V",
            "frecuencia_Hz",
            "fases",
        ]
    );
    // 3 tests + 22 checklist phrases + 6 flags + 7 process fields.
    assert_eq!(sheet.tidy_rows, 38);
    assert_eq!(sheet.valid_tables.len(), 2);
    assert_eq!(sheet.embedded_outputs.len(), 1);
    assert_eq!(sheet.embedded_outputs[0].page, 5);
    assert_eq!(
        sheet.embedded_outputs[0].titleblock_csv,
        "pid_context/PID_page_005_titleblock.csv"
    );

    // Master pool is header-less, padded to the widest valid table.
    let master = read(&doc_dir.join("HD_master_clean.csv"));
    let master_lines: Vec<&str> = master.lines().collect();
    assert_eq!(master_lines.len(), 6);
    assert!(master_lines[0].starts_with("PRUEBAS,"));
    assert!(master_lines[4].starts_with("NOTAS DE PROCESO,"));
    assert_eq!(master_lines[4].matches(',').count(), 6);

    let tidy = read(&doc_dir.join("HD_tidy.csv"));
    assert!(tidy.starts_with("grupo,item,requerida,presenciada,seleccionado,valor"));
    assert!(tidy.contains("PRUEBAS,Prueba hidrostática,true,,,"));
    assert!(tidy.contains("PRUEBAS,FAT,true,true,,"));
    assert!(tidy.contains("PRUEBAS,SAT,,,,"));
    assert!(tidy.contains("PROCESO,P_descarga_normal_psig,,,,250"));
    assert!(tidy.contains("PROCESO,SG_normal,,,,0.98"));
    assert!(tidy.contains("PROCESO,voltaje_V,,,,440/460"));
    assert!(tidy.contains("PROCESO,fases,,,,3"));
    assert_eq!(tidy.lines().count(), 39);
}

#[test]
fn test_parse_page_records_and_diagram_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = run(&dir);
    let blocks = config.blocks_dir();

    let records: Vec<PageRecord> =
        serde_json::from_str(&read(&blocks.join("0001-HD-015/blocks.json"))).unwrap();
    assert_eq!(records.len(), 5);

    // Page 2 reads diagram-like but the page rule forces the text route.
    let page2 = &records[1];
    assert!(!page2.pid_like);
    assert_eq!(page2.dispatched_to, "text_table");
    assert!(page2.pid_evidence.iter().any(|e| e == "DIAGRAMA"));
    assert!(page2.pid_evidence.iter().any(|e| e == "RULE_NO_PID"));

    let page4 = &records[3];
    assert!(page4.pid_like);
    assert_eq!(page4.dispatched_to, "diagram");
    assert_eq!(page4.pid_reference.as_deref(), Some("PID/0001-HD-015"));

    // A large table does not demote a page that carries a diagram marker.
    let pid_records: Vec<PageRecord> =
        serde_json::from_str(&read(&blocks.join("0002-PID-100/blocks.json"))).unwrap();
    assert!(pid_records[1].pid_like);
    assert_eq!(pid_records[1].dispatched_to, "diagram");

    let hd_context = blocks.join("0001-HD-015/pid_context");
    assert!(hd_context.join("page_004_titleblock.csv").is_file());
    assert!(hd_context.join("page_004_pid_summary.json").is_file());
    assert!(hd_context.join("PID_page_005_linelist.csv").is_file());
    let context_rows = csv_records(&hd_context.join("page_004_pid_context.csv"));
    assert_eq!(
        context_rows,
        [[
            "4",
            "true",
            "PID/0001-HD-015",
            "conexiones según anexo B",
            "RULE_FORCE_PID",
            "RULE_FORCE_PID",
        ]]
    );

    // The diagram strategy still captures tables; the P&ID line list lands
    // in tables/ and feeds the master downstream.
    assert!(blocks
        .join("0002-PID-100/tables/page_002_table01.csv")
        .is_file());
    assert!(blocks.join("0001-ET-023/TEXT_sections.csv").is_file());
    assert!(blocks.join("0001-ET-023/TEXT_tables_all.csv").is_file());
    assert!(!blocks.join("0002-PID-100/TEXT_sections.csv").exists());
}

#[test]
fn test_consolidated_masters_and_enrichment() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = run(&dir);
    let out = config.consolidated_dir();

    let sections = csv_records(&out.join("master_sections.csv"));
    assert_eq!(sections.len(), 10);
    let et_headers: Vec<&Vec<String>> = sections
        .iter()
        .filter(|r| r[0] == "0001-ET-023" && r[4] == "section_header")
        .collect();
    assert_eq!(et_headers.len(), 2);
    assert_eq!(et_headers[0][5], "4.1");
    assert_eq!(et_headers[0][6], "PRUEBAS");
    assert_eq!(et_headers[1][5], "5.2");

    let tables = csv_records(&out.join("master_tables.csv"));
    assert_eq!(tables.len(), 23);
    let uids: HashSet<&str> = tables.iter().map(|r| r[6].as_str()).collect();
    assert_eq!(uids.len(), 5);
    assert!(uids.contains("0001-ET-023::p002::t01"));
    assert!(uids.contains("0002-PID-100::p002::t01"));
    assert!(tables.iter().all(|r| r[10] == "1"));

    // Nearest-section and caption enrichment is per page.
    let et_p2: Vec<&Vec<String>> = tables
        .iter()
        .filter(|r| r[6] == "0001-ET-023::p002::t01")
        .collect();
    assert_eq!(et_p2.len(), 2);
    for row in &et_p2 {
        assert_eq!(row[7], "4.1");
        assert_eq!(row[8], "PRUEBAS");
        assert_eq!(row[9], "Tabla 1 Resumen de pruebas requeridas");
    }
    let et_p3 = tables
        .iter()
        .find(|r| r[6] == "0001-ET-023::p003::t01")
        .unwrap();
    assert_eq!(et_p3[7], "5.2");
    assert_eq!(et_p3[9], "");
    let hd_p2 = tables
        .iter()
        .find(|r| r[6] == "0001-HD-015::p002::t01")
        .unwrap();
    assert_eq!(hd_p2[7], "");
    assert_eq!(hd_p2[8], "");

    let pid_rows = csv_records(&out.join("pid_index.csv"));
    assert_eq!(pid_rows.len(), 3);
    assert_eq!(pid_rows[0][0], "0001-HD-015");
    assert_eq!(pid_rows[0][3], "4");
    assert_eq!(pid_rows[0][5], "PID/0001-HD-015");
    assert_eq!(pid_rows[1][0], "0002-PID-100");
    assert_eq!(pid_rows[1][5], "FFM/F-S-ME-015");
    assert_eq!(pid_rows[1][8], "DIAGRAMA");
    assert_eq!(pid_rows[2][3], "2");
    assert_eq!(pid_rows[2][5], "");

    let merged: MergedSummary =
        serde_json::from_str(&read(&out.join("merged_summary.json"))).unwrap();
    assert_eq!(merged.documents.len(), 3);
    let et = &merged.documents[0];
    assert_eq!(et.summary.doc_id, "0001-ET-023");
    assert_eq!(et.sections_count, 6);
    assert_eq!(et.tables_count, 5);
    assert!(et.pid_pages.is_empty());
    let hd = &merged.documents[1];
    assert_eq!(hd.sections_count, 4);
    assert_eq!(hd.tables_count, 6);
    assert_eq!(hd.pid_pages, [4]);
    let pid = &merged.documents[2];
    assert_eq!(pid.sections_count, 0);
    assert_eq!(pid.tables_count, 12);
    assert_eq!(pid.pid_pages, [1, 2]);
}

#[test]
fn test_graph_nodes_edges_and_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = run(&dir);
    let out = config.graph_dir();

    let nodes = csv_records(&out.join("graph_nodes.csv"));
    assert_eq!(nodes.len(), 38);
    let count = |label: &str| nodes.iter().filter(|r| r[1] == label).count();
    assert_eq!(count("Doc"), 3);
    assert_eq!(count("Section"), 2);
    assert_eq!(count("Table"), 5);
    assert_eq!(count("Param"), 25);
    assert_eq!(count("PidRef"), 3);

    let ids: HashSet<&str> = nodes.iter().map(|r| r[0].as_str()).collect();
    assert!(ids.contains("Doc:0001-ET-023"));
    assert!(ids.contains("Section:0001-ET-023_2_4.1"));
    assert!(ids.contains("Table:0001-HD-015::p003::t01"));
    assert!(ids.contains("Param:Requerida"));
    assert!(ids.contains("Param:r0c0"));
    assert!(ids.contains("PidRef:0001-HD-015_4_PID/0001-HD-015"));
    assert!(ids.contains("PidRef:0002-PID-100_1_FFM/F-S-ME-015"));
    // A diagram row without a reference still yields a page node.
    assert!(ids.contains("PidRef:0002-PID-100_2_ref"));

    let edges = csv_records(&out.join("graph_edges.csv"));
    assert_eq!(edges.len(), 43);
    let kind = |k: &str| edges.iter().filter(|r| r[2] == k).count();
    assert_eq!(kind("DOC_CONTAINS_SECTION"), 2);
    assert_eq!(kind("DOC_CONTAINS_TABLE"), 5);
    assert_eq!(kind("TABLE_HAS_PARAM"), 31);
    assert_eq!(kind("SECTION_NEAR_TABLE"), 2);
    assert_eq!(kind("DOC_HAS_PID_PAGE"), 3);
    assert!(edges
        .iter()
        .any(|r| r[0] == "Section:0001-ET-023_2_4.1"
            && r[1] == "Table:0001-ET-023::p002::t01"
            && r[2] == "SECTION_NEAR_TABLE"));

    let jsonl = read(&out.join("graph.jsonl"));
    let lines: Vec<&str> = jsonl.lines().collect();
    assert_eq!(lines.len(), 38 + 43);
    assert!(lines[0].contains("\"type\":\"node\""));
    assert!(lines[0].contains("\"id\":\"Doc:0001-ET-023\""));
    // Edge lines carry their relation in the type field.
    assert!(lines[38].contains("\"src\":"));
    assert!(!jsonl.contains("\"type\":\"edge\""));
    assert!(jsonl.contains("\"type\":\"DOC_HAS_PID_PAGE\""));
    assert!(!jsonl.contains("Param:nan"));
}

#[test]
fn test_rerun_is_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    let (config, first_report) = run(&dir);

    let graph_files = ["graph_nodes.csv", "graph_edges.csv", "graph.jsonl"];
    let before: Vec<String> = graph_files
        .iter()
        .map(|f| read(&config.graph_dir().join(f)))
        .collect();
    let tables_before = read(&config.consolidated_dir().join("master_tables.csv"));

    let second_report = run_pipeline_with_source(&config, &corpus()).unwrap();
    assert_eq!(first_report.graph.nodes, second_report.graph.nodes);
    assert_eq!(first_report.graph.edges, second_report.graph.edges);

    for (file, content) in graph_files.iter().zip(&before) {
        assert_eq!(&read(&config.graph_dir().join(file)), content, "{file}");
    }
    assert_eq!(
        read(&config.consolidated_dir().join("master_tables.csv")),
        tables_before
    );
}
