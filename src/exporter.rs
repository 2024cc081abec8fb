//! The export orchestrator: a declaratively configured pipeline that turns
//! a [`Book`] and its documents into one packaged publication artifact.
//!
//! Stages run as an explicit sequence: resolve → assemble → render
//! citations (concurrent per chapter, joined before numbering) → number →
//! build TOC → collect assets → serialize → pack. Any stage failure cancels
//! the remaining stages; there is no partial artifact.

use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::assembler::{assemble_chapter, assembly_warnings, AssembledChapter};
use crate::assets::collect_assets;
use crate::citations::{render_chapter_citations, CitationRenderer, NoopCitationRenderer};
use crate::error::{Error, Result};
use crate::numbering::number_chapters;
use crate::packager::{pack, AssetFetcher, HttpFetcher};
use crate::resolver::{resolve_chapter_documents, DocumentSource};
use crate::serializer::print::PrintRenderer;
use crate::serializer::template::DocTemplate;
use crate::serializer::{self, SerializerOutput};
use crate::toc::build_toc;
use crate::types::{
    Book, ContentItem, ExportArtifact, ExportFormat, ExportReport, NumberingStyle, PaperSize,
};

lazy_static! {
    /// Characters stripped from download filenames.
    static ref FILENAME_SANITIZE_REGEX: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// The main export configuration, built declaratively using the builder
/// pattern.
///
/// ## Builder Pattern
///
/// Use [`ExportConfig::builder()`](ExportConfig::builder) to create a new
/// configuration:
///
/// ```rust,no_run
/// # use bindery::prelude::*;
/// let config = ExportConfig::builder()
///     .format(ExportFormat::Epub)
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct ExportConfig {
    /// Target output format.
    #[builder(default = "ExportFormat::Epub")]
    pub format: ExportFormat,

    /// Overrides the serializer's default numbering style.
    ///
    /// When unset, EPUB renders chapter-local labels and every other
    /// format renders book-wide labels — the formats genuinely differ, so
    /// this stays a per-serializer setting rather than unified behavior.
    #[builder(default)]
    pub numbering_style: Option<NumberingStyle>,

    /// Overrides the book's configured paper size for pagination CSS.
    #[builder(default)]
    pub paper_size: Option<PaperSize>,

    /// Fixed timestamp stamped on every container entry. Defaults to the
    /// book's `updated` time; two exports of an unchanged book therefore
    /// produce byte-identical containers.
    #[builder(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Cap on concurrently rendered chapters (citation stage).
    #[builder(default = "num_cpus::get().min(4)")]
    pub max_concurrency: usize,

    /// Template document for DOCX export. Required for
    /// [`ExportFormat::Docx`].
    #[builder(default)]
    pub docx_template: Option<DocTemplate>,

    /// Template document for ODT export. Required for
    /// [`ExportFormat::Odt`].
    #[builder(default)]
    pub odt_template: Option<DocTemplate>,

    /// The external citation/bibliography engine.
    #[builder(default = "Arc::new(NoopCitationRenderer)")]
    pub citation_renderer: Arc<dyn CitationRenderer>,

    /// Resolves binary-by-URL entries at packaging time.
    #[builder(default = "Arc::new(HttpFetcher::default())")]
    pub asset_fetcher: Arc<dyn AssetFetcher>,

    /// The external pagination engine. Required for
    /// [`ExportFormat::Print`].
    #[builder(default)]
    pub print_renderer: Option<Arc<dyn PrintRenderer>>,
}

impl std::fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportConfig")
            .field("format", &self.format)
            .field("numbering_style", &self.numbering_style)
            .field("paper_size", &self.paper_size)
            .field("timestamp", &self.timestamp)
            .field("max_concurrency", &self.max_concurrency)
            .field("docx_template", &self.docx_template.is_some())
            .field("odt_template", &self.odt_template.is_some())
            .field("print_renderer", &self.print_renderer.is_some())
            .finish()
    }
}

impl ExportConfig {
    /// Creates a new builder for configuring `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }

    /// Performs validation checks on the configuration for a specific book.
    ///
    /// All checks run without fetching anything; `export` calls this
    /// automatically, so manual invocation is optional but catches
    /// configuration errors early.
    pub fn preflight_check(&self, book: &Book) -> Result<&Self> {
        if book.title.trim().is_empty() {
            return Err(Error::Other("Book title is required".to_string()));
        }
        if book.chapters.is_empty() {
            return Err(Error::EmptyBook(book.title.clone()));
        }
        match self.format {
            ExportFormat::Docx if self.docx_template.is_none() => Err(Error::Unsupported(
                "DOCX export requires a docx_template".to_string(),
            )),
            ExportFormat::Odt if self.odt_template.is_none() => Err(Error::Unsupported(
                "ODT export requires an odt_template".to_string(),
            )),
            ExportFormat::Print if self.print_renderer.is_none() => Err(Error::Unsupported(
                "Print export requires a print_renderer".to_string(),
            )),
            _ => Ok(self),
        }
    }

    /// Runs the full export pipeline for one book.
    ///
    /// # Arguments
    ///
    /// * `book` - The book record with its ordered chapter list
    /// * `source` - Read-only access to the referenced documents
    ///
    /// # Returns
    ///
    /// * `Ok(ExportArtifact)` - The packaged container plus soft warnings
    /// * `Err(Error)` - The first stage failure; no partial artifact exists
    pub async fn export(
        &self,
        book: &Book,
        source: &dyn DocumentSource,
    ) -> Result<ExportArtifact> {
        self.preflight_check(book)?;
        let mut report = ExportReport::default();

        // Stage 1: resolve chapter documents (all-or-nothing).
        let resolved = resolve_chapter_documents(book, source).await?;

        // Stage 2: assemble working trees, image DB threaded per chapter.
        let mut chapters = Vec::with_capacity(resolved.len());
        for resolved_chapter in &resolved {
            let assembled = assemble_chapter(resolved_chapter, &resolved_chapter.document.images)?;
            for warning in assembly_warnings(&assembled) {
                report.warn(warning);
            }
            chapters.push(assembled);
        }

        // Stage 3: citation rendering, concurrent with a join barrier.
        let mut chapters = render_chapter_citations(
            book,
            chapters,
            Arc::clone(&self.citation_renderer),
            self.max_concurrency,
        )
        .await?;

        // Stages 4-6 are strictly sequential and order-dependent.
        number_chapters(&mut chapters, &book.settings.language, &mut report);
        let toc = build_toc(&mut chapters, self.format.chapter_extension());
        let rewrite_references = self.format != ExportFormat::Print;
        let manifest = collect_assets(book, &mut chapters, rewrite_references);

        info!(
            "serializing '{}' as {:?} ({} chapters)",
            book.title,
            self.format,
            chapters.len()
        );

        // Print short-circuits: the external renderer produces the bytes.
        if self.format == ExportFormat::Print {
            return self.render_print(book, &chapters, report).await;
        }

        let output = self.serialize(book, &chapters, &toc, &manifest)?;
        let timestamp = self.timestamp.unwrap_or(book.updated);
        let bytes = pack(
            &output,
            self.format.mime_type(),
            timestamp,
            self.asset_fetcher.as_ref(),
        )
        .await?;

        Ok(ExportArtifact {
            filename: self.artifact_filename(book),
            mime_type: self.format.mime_type(),
            bytes,
            report,
        })
    }

    fn serialize(
        &self,
        book: &Book,
        chapters: &[AssembledChapter],
        toc: &[ContentItem],
        manifest: &crate::assets::AssetManifest,
    ) -> Result<SerializerOutput> {
        let numbering = self.numbering_style.unwrap_or(match self.format {
            ExportFormat::Epub => NumberingStyle::ChapterLocal,
            _ => NumberingStyle::BookWide,
        });
        let paper_size = self.paper_size.unwrap_or(book.settings.paper_size);

        let output = match self.format {
            ExportFormat::Epub => serializer::epub::serialize(book, chapters, toc, manifest, numbering),
            ExportFormat::Html => serializer::html::serialize(book, chapters, toc, manifest, numbering),
            ExportFormat::HtmlSingle => serializer::html::serialize_single(
                book, chapters, toc, manifest, numbering, paper_size,
            ),
            ExportFormat::Latex => serializer::latex::serialize(book, chapters, manifest, numbering),
            ExportFormat::Docx => {
                let template = self
                    .docx_template
                    .as_ref()
                    .ok_or_else(|| Error::Unsupported("missing DOCX template".to_string()))?;
                serializer::docx::serialize(book, chapters, template, numbering)
            }
            ExportFormat::Odt => {
                let template = self
                    .odt_template
                    .as_ref()
                    .ok_or_else(|| Error::Unsupported("missing ODT template".to_string()))?;
                serializer::odt::serialize(book, chapters, template, numbering)
            }
            ExportFormat::Bits => serializer::bits::serialize(book, chapters, manifest, numbering),
            ExportFormat::Print => unreachable!("print is rendered externally"),
        };
        Ok(output)
    }

    async fn render_print(
        &self,
        book: &Book,
        chapters: &[AssembledChapter],
        report: ExportReport,
    ) -> Result<ExportArtifact> {
        let renderer = self
            .print_renderer
            .as_ref()
            .ok_or_else(|| Error::Unsupported("missing print renderer".to_string()))?;
        let numbering = self.numbering_style.unwrap_or(NumberingStyle::BookWide);
        let paper_size = self.paper_size.unwrap_or(book.settings.paper_size);
        let input = serializer::print::prepare(book, chapters, numbering, paper_size);
        let bytes = renderer.render(&input.html, &input.css).await?;
        Ok(ExportArtifact {
            filename: format!("{}.pdf", self.filename_stem(book)),
            mime_type: "application/pdf",
            bytes,
            report,
        })
    }

    fn filename_stem(&self, book: &Book) -> String {
        let base = if book.path.trim().is_empty() {
            &book.title
        } else {
            &book.path
        };
        let sanitized = FILENAME_SANITIZE_REGEX
            .replace_all(base.trim(), "-")
            .trim_matches('-')
            .to_lowercase();
        if sanitized.is_empty() {
            "book".to_string()
        } else {
            sanitized
        }
    }

    fn artifact_filename(&self, book: &Book) -> String {
        format!("{}.{}", self.filename_stem(book), self.format.extension())
    }
}

impl ExportConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(max) = self.max_concurrency {
            if max == 0 {
                return Err("max_concurrency must be at least 1".to_string());
            }
        }
        Ok(())
    }
}
