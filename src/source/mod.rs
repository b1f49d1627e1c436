//! Page sources.
//!
//! Everything downstream of extraction sees documents through the
//! [`PageSource`]/[`SourceDocument`] traits, so the concrete reader
//! (native PDF text layer, sidecar extraction dump, in-memory corpus)
//! stays swappable. Per-page failures surface as [`Error::Extraction`]
//! and are degraded by callers, never aborting a document.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

mod dump;
mod pdf;

pub use dump::DumpSource;
pub use pdf::PdfSource;

/// Extracted tables for one page: tables, rows, cells.
pub type PageTables = Vec<Vec<Vec<String>>>;

/// How input documents are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceBackend {
    /// Pick per file: `.pages.json` dumps, `.pdf` otherwise.
    #[default]
    Auto,
    /// Native PDF text layer. Reports no tables.
    Pdf,
    /// Sidecar extraction dumps only.
    Dump,
}

impl SourceBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceBackend::Auto => "auto",
            SourceBackend::Pdf => "pdf",
            SourceBackend::Dump => "dump",
        }
    }
}

impl fmt::Display for SourceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(SourceBackend::Auto),
            "pdf" => Ok(SourceBackend::Pdf),
            "dump" => Ok(SourceBackend::Dump),
            other => Err(Error::Other(format!("unknown source backend {other:?}"))),
        }
    }
}

/// A corpus of documents the extract stage can enumerate and open.
pub trait PageSource {
    /// Document file names in processing order.
    fn discover(&self) -> Result<Vec<String>>;

    /// Open one document by its file name.
    fn open(&self, file_name: &str) -> Result<Box<dyn SourceDocument>>;
}

/// One open document.
pub trait SourceDocument {
    fn page_count(&self) -> u32;

    /// Raw text of a 1-based page.
    fn page_text(&self, page: u32) -> Result<String>;

    /// Tables of a 1-based page, outermost to innermost: tables, rows,
    /// cells.
    fn page_tables(&self, page: u32) -> Result<PageTables>;

    /// Page size in points, when the source knows it.
    fn page_size(&self, page: u32) -> Option<(f32, f32)>;
}

/// Open a single file with the given backend.
pub fn open_document(path: &Path, backend: SourceBackend) -> Result<Box<dyn SourceDocument>> {
    match backend {
        SourceBackend::Pdf => PdfSource::open_path(path),
        SourceBackend::Dump => DumpSource::open_path(path),
        SourceBackend::Auto => {
            if is_dump_path(path) {
                DumpSource::open_path(path)
            } else {
                PdfSource::open_path(path)
            }
        }
    }
}

/// Document stem shared by a PDF and its extraction dump:
/// `bomba.pages.json` and `bomba.pdf` both map to `bomba`.
pub fn document_stem(file_name: &str) -> &str {
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    stem.strip_suffix(".pages").unwrap_or(stem)
}

fn is_dump_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".pages.json"))
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Directory-backed corpus. Discovery lists candidate files by
/// extension, sorted by name; when a document has both a PDF and a
/// dump under the auto backend, the dump wins.
#[derive(Debug, Clone)]
pub struct FsSource {
    dir: PathBuf,
    backend: SourceBackend,
}

impl FsSource {
    pub fn new(dir: impl Into<PathBuf>, backend: SourceBackend) -> Self {
        Self {
            dir: dir.into(),
            backend,
        }
    }
}

impl PageSource for FsSource {
    fn discover(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Err(Error::EmptyCorpus(self.dir.clone()));
        }
        let mut names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let wanted = match self.backend {
                SourceBackend::Pdf => is_pdf_path(&path),
                SourceBackend::Dump => is_dump_path(&path),
                SourceBackend::Auto => is_pdf_path(&path) || is_dump_path(&path),
            };
            if !wanted {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();

        if self.backend == SourceBackend::Auto {
            let dumped: Vec<String> = names
                .iter()
                .filter(|n| n.ends_with(".pages.json"))
                .map(|n| document_stem(n).to_string())
                .collect();
            names.retain(|n| {
                n.ends_with(".pages.json") || !dumped.iter().any(|s| s == document_stem(n))
            });
        }
        Ok(names)
    }

    fn open(&self, file_name: &str) -> Result<Box<dyn SourceDocument>> {
        open_document(&self.dir.join(file_name), self.backend)
    }
}

/// Programmatic corpus for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    docs: BTreeMap<String, MemoryDocument>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, file_name: impl Into<String>, doc: MemoryDocument) -> Self {
        self.docs.insert(file_name.into(), doc);
        self
    }
}

impl PageSource for MemorySource {
    fn discover(&self) -> Result<Vec<String>> {
        Ok(self.docs.keys().cloned().collect())
    }

    fn open(&self, file_name: &str) -> Result<Box<dyn SourceDocument>> {
        match self.docs.get(file_name) {
            Some(doc) => Ok(Box::new(doc.clone())),
            None => Err(Error::MissingInput {
                doc_id: document_stem(file_name).to_string(),
                path: PathBuf::from(file_name),
            }),
        }
    }
}

/// In-memory document: a list of pages with text and tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
}

#[derive(Debug, Clone, Default)]
struct MemoryPage {
    text: String,
    tables: PageTables,
    size: Option<(f32, f32)>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, text: impl Into<String>, tables: PageTables) -> Self {
        self.pages.push(MemoryPage {
            text: text.into(),
            tables,
            size: Some((612.0, 792.0)),
        });
        self
    }

    fn page_at(&self, page: u32) -> Result<&MemoryPage> {
        page.checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .ok_or(Error::PageOutOfRange(page, self.pages.len() as u32))
    }
}

impl SourceDocument for MemoryDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&self, page: u32) -> Result<String> {
        self.page_at(page).map(|p| p.text.clone())
    }

    fn page_tables(&self, page: u32) -> Result<PageTables> {
        self.page_at(page).map(|p| p.tables.clone())
    }

    fn page_size(&self, page: u32) -> Option<(f32, f32)> {
        self.page_at(page).ok().and_then(|p| p.size)
    }
}
