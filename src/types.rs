//! Core data types, enums, and reports for the bindery export library.
//!
//! This module defines the fundamental data structures used throughout bindery:
//! - The book/chapter/document model (`Book`, `Chapter`, `Document`)
//! - Book-level metadata and settings (`BookMetadata`, `BookSettings`)
//! - Table-of-contents entries (`ContentItem`)
//! - The dual-counter tables driven by the numbering pass (`Counters`)
//! - Output manifests (`AssetEntry`) and format selection (`ExportFormat`)
//! - Soft sanity findings surfaced alongside a finished export (`ExportWarning`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::node::ContentNode;

/// Identifier of a document as stored by the document source.
pub type DocumentId = u64;

/// Target output format for a book export.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum ExportFormat {
    #[default]
    #[serde(rename = "epub")]
    Epub,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "html-single")]
    HtmlSingle,
    #[serde(rename = "latex")]
    Latex,
    #[serde(rename = "docx")]
    Docx,
    #[serde(rename = "odt")]
    Odt,
    #[serde(rename = "bits")]
    Bits,
    #[serde(rename = "print")]
    Print,
}

impl ExportFormat {
    /// File extension of the packaged container for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Epub => "epub",
            ExportFormat::Html | ExportFormat::HtmlSingle | ExportFormat::Print => "html.zip",
            ExportFormat::Latex => "latex.zip",
            ExportFormat::Docx => "docx",
            ExportFormat::Odt => "odt",
            ExportFormat::Bits => "bits.zip",
        }
    }

    /// Extension of the per-chapter files TOC links point into. EPUB
    /// chapters are XHTML documents; every other chapter-file format
    /// links through the HTML rendition.
    pub fn chapter_extension(&self) -> &'static str {
        match self {
            ExportFormat::Epub => "xhtml",
            _ => "html",
        }
    }

    /// MIME type of the packaged container for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Epub => "application/epub+zip",
            ExportFormat::Html | ExportFormat::HtmlSingle | ExportFormat::Print => {
                "application/zip"
            }
            ExportFormat::Latex | ExportFormat::Bits => "application/zip",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Odt => "application/vnd.oasis.opendocument.text",
        }
    }
}

/// Paper size used for pagination-oriented CSS and print output.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    A5,
    B5,
    Letter,
    Legal,
}

impl PaperSize {
    /// CSS `@page size` value for this paper size.
    pub fn css_size(&self) -> &'static str {
        match self {
            PaperSize::A4 => "A4",
            PaperSize::A5 => "A5",
            PaperSize::B5 => "B5",
            PaperSize::Letter => "letter",
            PaperSize::Legal => "legal",
        }
    }
}

/// Book-level descriptive metadata, embedded into title pages and
/// container metadata of every output format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookMetadata {
    pub author: Option<String>,
    pub subtitle: Option<String>,
    pub version: Option<String>,
    pub publisher: Option<String>,
    pub copyright: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A style/font file shipped alongside a book style.
///
/// Two entries naming the same physical asset compare equal; the asset
/// collector deduplicates on this value equality, never on identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetEntry {
    pub filename: String,
    pub url: String,
}

impl AssetEntry {
    pub fn new(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
        }
    }
}

/// A named book style: a stylesheet plus the font/asset files it references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookStyle {
    pub slug: String,
    pub contents_css: String,
    #[serde(default)]
    pub files: Vec<AssetEntry>,
}

/// Book-level export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSettings {
    /// Citation style identifier handed to the citation renderer (e.g. "apa").
    pub citation_style: String,
    pub book_style: Option<BookStyle>,
    #[serde(default)]
    pub paper_size: PaperSize,
    /// BCP47-ish language code, e.g. "en-US" or "de".
    pub language: String,
    /// Language-keyed default bibliography headers ("en" -> "Bibliography").
    #[serde(default)]
    pub bibliography_header: HashMap<String, String>,
}

/// A book-level reference to a document, carrying the display `number`
/// and an optional `part` boundary label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// Foreign key into the document source.
    pub text: DocumentId,
    /// Ordering/display key. Unique and positive within one book;
    /// gaps are permitted.
    pub number: u32,
    /// When set, a book "part" with this title begins at this chapter.
    pub part: Option<String>,
}

/// An ordered collection of chapters plus book-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub metadata: BookMetadata,
    #[serde(default)]
    pub settings: BookSettings,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    pub cover_image: Option<AssetEntry>,
    pub updated: DateTime<Utc>,
    pub added: DateTime<Utc>,
}

impl Book {
    /// Returns the chapters sorted by ascending `number`.
    ///
    /// The stored chapter list is *not* guaranteed to be in number order, so
    /// every order-dependent pipeline stage goes through this accessor.
    pub fn sorted_chapters(&self) -> Vec<Chapter> {
        let mut chapters = self.chapters.clone();
        chapters.sort_by_key(|c| c.number);
        chapters
    }
}

/// A bibliography database entry, opaque to the pipeline and handed
/// verbatim to the citation renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BibEntry {
    pub bib_type: String,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

/// Per-document settings relevant to export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSettings {
    pub language: Option<String>,
    /// Chapter-specific bibliography header, overriding the book default.
    pub bibliography_header: Option<String>,
}

/// An independently authored document referenced by a chapter.
///
/// Read-only to this crate; bodies may arrive lazily via
/// [`DocumentSource::fetch_body`](crate::resolver::DocumentSource::fetch_body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    /// The stored content tree; `None` until the body has been fetched.
    pub content: Option<ContentNode>,
    /// Image database keyed by in-document image id.
    #[serde(default)]
    pub images: HashMap<u64, AssetEntry>,
    /// Bibliography database keyed by citation id.
    #[serde(default)]
    pub bibliography: HashMap<String, BibEntry>,
    #[serde(default)]
    pub settings: DocumentSettings,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A navigational entry (heading or part boundary) with a nesting level,
/// used to build the hierarchical table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub title: String,
    /// Target file plus anchor, e.g. `document-2.html#_2_3`.
    pub link: String,
    /// Chapter number the entry belongs to.
    pub doc_num: u32,
    /// −1 = part boundary, 0 = chapter/document title, 1–6 = heading depth.
    pub level: i8,
    /// Children, populated by the TOC builder. Owned by the parent item.
    pub sub_items: Vec<ContentItem>,
}

/// Categories of elements the numbering pass assigns counters to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountedCategory {
    Figure,
    Equation,
    Photo,
    Table,
    Footnote,
}

impl CountedCategory {
    /// Parses the `data-category` attribute value of a figure element.
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "figure" => Some(CountedCategory::Figure),
            "equation" => Some(CountedCategory::Equation),
            "photo" => Some(CountedCategory::Photo),
            "table" => Some(CountedCategory::Table),
            _ => None,
        }
    }
}

/// A `(book-wide, chapter-local)` counter pair for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterPair {
    pub book: u32,
    pub chapter: u32,
}

/// The per-export-run counter tables: four independent monotonic counters
/// (figure, equation, photo, table) plus the footnote counter, each tracked
/// as a `(book-wide, chapter-local)` pair.
///
/// Constructed fresh at the start of an export run and discarded after
/// packaging; never persisted, never shared across chapters concurrently.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pairs: HashMap<CountedCategory, CounterPair>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments both the book-wide and chapter-local counter of the
    /// category and returns the updated pair.
    pub fn bump(&mut self, category: CountedCategory) -> CounterPair {
        let pair = self.pairs.entry(category).or_default();
        pair.book += 1;
        pair.chapter += 1;
        *pair
    }

    /// Resets the chapter-local counters. Called at each chapter boundary
    /// of the numbering pass; book-wide values keep increasing.
    pub fn reset_chapter(&mut self) {
        for pair in self.pairs.values_mut() {
            pair.chapter = 0;
        }
    }

    pub fn get(&self, category: CountedCategory) -> CounterPair {
        self.pairs.get(&category).copied().unwrap_or_default()
    }
}

/// Returns the language-localized label word for a counted category.
///
/// Only the language primary subtag is considered ("de-CH" -> "de");
/// unknown languages fall back to English.
pub fn label_for(category: CountedCategory, language: &str) -> &'static str {
    let lang = language.split(['-', '_']).next().unwrap_or("en");
    match (lang, category) {
        ("de", CountedCategory::Figure) => "Abbildung",
        ("de", CountedCategory::Equation) => "Gleichung",
        ("de", CountedCategory::Photo) => "Foto",
        ("de", CountedCategory::Table) => "Tabelle",
        ("de", CountedCategory::Footnote) => "Anmerkung",
        ("fr", CountedCategory::Figure) => "Figure",
        ("fr", CountedCategory::Equation) => "Équation",
        ("fr", CountedCategory::Photo) => "Photo",
        ("fr", CountedCategory::Table) => "Tableau",
        ("fr", CountedCategory::Footnote) => "Note",
        ("es", CountedCategory::Figure) => "Figura",
        ("es", CountedCategory::Equation) => "Ecuación",
        ("es", CountedCategory::Photo) => "Foto",
        ("es", CountedCategory::Table) => "Tabla",
        ("es", CountedCategory::Footnote) => "Nota",
        (_, CountedCategory::Figure) => "Figure",
        (_, CountedCategory::Equation) => "Equation",
        (_, CountedCategory::Photo) => "Photo",
        (_, CountedCategory::Table) => "Table",
        (_, CountedCategory::Footnote) => "Note",
    }
}

/// Whether serializers render the book-wide or the chapter-local counter
/// value into visible labels.
///
/// The output formats genuinely differ here: EPUB keeps chapter-local
/// numbering visually while the HTML family computes book-wide numbers,
/// so this is a serializer-level setting rather than unified behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberingStyle {
    #[default]
    BookWide,
    ChapterLocal,
}

/// A soft issue found while exporting. Warnings never block serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportWarning {
    /// A cross-reference whose target carries no counter at resolution time.
    DanglingReference { chapter: u32, target: String },
    /// A chapter whose document has an empty title.
    MissingChapterTitle { chapter: u32 },
    /// Unaccepted tracked changes were stripped from a chapter.
    UnresolvedTrackedChange { chapter: u32 },
}

/// Collected soft findings for one export run.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub warnings: Vec<ExportWarning>,
}

impl ExportReport {
    pub fn warn(&mut self, warning: ExportWarning) {
        self.warnings.push(warning);
    }
}

/// The finished, packaged export of one book.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// Suggested download filename, e.g. `my-book.epub`.
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}
