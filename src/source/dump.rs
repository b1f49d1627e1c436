//! Document reader for pre-extracted page dumps.
//!
//! A dump is a `<stem>.pages.json` file sitting next to (or instead of)
//! the PDF it was extracted from: a JSON array of page records carrying
//! text, table cells and page geometry. Dumps are how table-aware
//! extractors feed the pipeline without linking their stack in.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::source::{PageTables, SourceDocument};

#[derive(Debug, Clone, Deserialize)]
struct DumpPage {
    page: u32,
    #[serde(default)]
    text: String,
    #[serde(default)]
    tables: PageTables,
    #[serde(default)]
    width: Option<f32>,
    #[serde(default)]
    height: Option<f32>,
}

/// Reader for `.pages.json` page dumps.
pub struct DumpSource {
    pages: BTreeMap<u32, DumpPage>,
}

impl DumpSource {
    /// Parses a page dump from disk.
    pub fn open_path(path: &Path) -> Result<Box<dyn SourceDocument>> {
        let raw = fs::read_to_string(path)?;
        let records: Vec<DumpPage> = serde_json::from_str(&raw)?;
        let mut pages = BTreeMap::new();
        for record in records {
            pages.insert(record.page, record);
        }
        Ok(Box::new(Self { pages }))
    }

    fn page_at(&self, page: u32) -> Result<&DumpPage> {
        self.pages.get(&page).ok_or(Error::Extraction {
            page,
            reason: "page missing from dump".to_string(),
        })
    }
}

impl SourceDocument for DumpSource {
    fn page_count(&self) -> u32 {
        // Dumps may skip unreadable pages; the highest page number still
        // defines the document length.
        self.pages.last_key_value().map_or(0, |(page, _)| *page)
    }

    fn page_text(&self, page: u32) -> Result<String> {
        Ok(self.page_at(page)?.text.clone())
    }

    fn page_tables(&self, page: u32) -> Result<PageTables> {
        Ok(self.page_at(page)?.tables.clone())
    }

    fn page_size(&self, page: u32) -> Option<(f32, f32)> {
        let record = self.pages.get(&page)?;
        Some((record.width?, record.height?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_roundtrip_with_gap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DOC-001.pages.json");
        fs::write(
            &path,
            r#"[
                {"page": 1, "text": "HOJA DE DATOS", "width": 841.9, "height": 595.3},
                {"page": 3, "text": "", "tables": [[["Item", "Valor"], ["Caudal", "250"]]]}
            ]"#,
        )
        .unwrap();

        let doc = DumpSource::open_path(&path).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page_text(1).unwrap(), "HOJA DE DATOS");
        assert_eq!(doc.page_size(1), Some((841.9, 595.3)));
        assert_eq!(doc.page_size(3), None);

        let tables = doc.page_tables(3).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0][1], vec!["Caudal", "250"]);

        // Page 2 was skipped by the extractor.
        assert!(matches!(
            doc.page_text(2),
            Err(Error::Extraction { page: 2, .. })
        ));
    }

    #[test]
    fn test_dump_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pages.json");
        fs::write(&path, "{not json").unwrap();
        assert!(DumpSource::open_path(&path).is_err());
    }
}
