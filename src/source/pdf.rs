//! Text-layer document reader backed by `lopdf`.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Document, ObjectId};

use crate::error::{Error, Result};
use crate::source::{PageTables, SourceDocument};

/// Reader for native PDF files.
///
/// Text comes straight from the text layer via [`lopdf`]. The text layer
/// carries no geometry, so this reader never reports tables; corpora that
/// need table cells ship a page dump next to the PDF instead.
pub struct PdfSource {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfSource {
    /// Loads a PDF from disk and indexes its page tree.
    pub fn open_path(path: &Path) -> Result<Box<dyn SourceDocument>> {
        let doc = Document::load(path)?;
        let pages = doc.get_pages();
        Ok(Box::new(Self { doc, pages }))
    }
}

impl SourceDocument for PdfSource {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&self, page: u32) -> Result<String> {
        if !self.pages.contains_key(&page) {
            return Err(Error::PageOutOfRange(page, self.page_count()));
        }
        self.doc.extract_text(&[page]).map_err(|e| Error::Extraction {
            page,
            reason: e.to_string(),
        })
    }

    fn page_tables(&self, _page: u32) -> Result<PageTables> {
        Ok(Vec::new())
    }

    fn page_size(&self, page: u32) -> Option<(f32, f32)> {
        let page_id = *self.pages.get(&page)?;
        let dict = self.doc.get_dictionary(page_id).ok()?;
        let media_box = dict.get(b"MediaBox").ok()?.as_array().ok()?;
        if media_box.len() < 4 {
            return None;
        }
        // MediaBox is [llx lly urx ury]; the lower-left corner is not
        // always the origin.
        let llx = media_box[0].as_float().ok()?;
        let lly = media_box[1].as_float().ok()?;
        let urx = media_box[2].as_float().ok()?;
        let ury = media_box[3].as_float().ok()?;
        Some((urx - llx, ury - lly))
    }
}
