//! Bindery - Book Assembly and Export Library
//!
//! This crate provides an asynchronous, declarative API for assembling an
//! ordered collection of independently authored documents ("chapters") plus
//! book-level metadata into distributable publication artifacts: EPUB,
//! single/multi-file HTML, LaTeX, DOCX, ODT, BITS/JATS XML and paginated
//! print output.
//!
//! # Getting Started
//!
//! Configure an export with the `ExportConfig` builder, then run it against
//! a book and a document source:
//!
//! ```rust,no_run
//! use bindery::prelude::*;
//!
//! # async fn run(book: Book, source: impl DocumentSource) -> bindery::error::Result<()> {
//! // 1. Configure the export task using the builder
//! let config = ExportConfig::builder()
//!     .format(ExportFormat::Epub)
//!     .build()?;
//!
//! // Optional: validate the configuration against the book early
//! config.preflight_check(&book)?;
//!
//! // 2. Execute the full export pipeline
//! let artifact = config.export(&book, &source).await?;
//! println!("exported {} ({} bytes)", artifact.filename, artifact.bytes.len());
//! # Ok(())
//! # }
//! ```
//!
//! The pipeline resolves every chapter's document (all-or-nothing), builds
//! per-chapter content trees, renders citations concurrently, assigns
//! book-wide and chapter-local numbering, builds the table of contents,
//! collects assets, serializes into the configured format and packs the
//! final container deterministically.

pub mod assembler;
pub mod assets;
pub mod citations;
pub mod error;
pub mod exporter;
pub mod node;
pub mod numbering;
pub mod packager;
pub mod resolver;
pub mod serializer;
pub mod toc;
pub mod types;

// Publicly expose the main `ExportConfig` struct and its builder
pub use exporter::ExportConfig;
pub use exporter::ExportConfigBuilder;

// Re-export error and core types for direct access
pub use types::{
    AssetEntry, Book, BookMetadata, BookSettings, BookStyle, Chapter, ContentItem, Counters,
    Document, ExportArtifact, ExportFormat, ExportReport, ExportWarning, NumberingStyle, PaperSize,
};

/// Prelude module for convenient imports.
///
/// Re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use bindery::prelude::*;`
/// statement.
pub mod prelude {
    pub use super::{
        AssetEntry, Book, BookMetadata, BookSettings, BookStyle, Chapter, ContentItem, Document,
        ExportArtifact, ExportConfig, ExportConfigBuilder, ExportFormat, ExportReport,
        ExportWarning, NumberingStyle, PaperSize, error, serializer, types,
    };
    pub use crate::citations::{CitationRenderer, NoopCitationRenderer, RenderedCitations};
    pub use crate::node::ContentNode;
    pub use crate::packager::{AssetFetcher, HttpFetcher};
    pub use crate::resolver::{DocumentSource, ResolvedChapter};
    pub use crate::serializer::print::PrintRenderer;
    pub use crate::serializer::template::DocTemplate;
    pub use std::sync::Arc;
}
