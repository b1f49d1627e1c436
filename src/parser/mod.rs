//! Page parsing: classification, section segmentation, check/test
//! detection, table cleaning and datasheet extraction.

mod checks;
mod classify;
mod datasheet;
mod sections;
mod tables;

pub use checks::{detect_test_type, line_has_checkmark};
pub use classify::{
    apply_page_rules, classify_page, extract_note, extract_reference, PageClassification,
    RULE_FORCE_PID, RULE_NO_PID,
};
pub use datasheet::{
    build_datasheet_tidy, find_tests_header, scan_checklist, scan_flags, scan_process,
    scan_tests, TestMarks, TestsHeader, TidyRow, TidySummary,
};
pub use sections::{segment_sections, Segment};
pub use tables::{
    clean_table, is_small_table, is_valid_datasheet, keep_table, max_width, pad_rows,
};
