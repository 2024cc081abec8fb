//! Citation rendering adapter: invokes the external citation engine once
//! per chapter and splices the rendered bibliography into the chapter tree.
//!
//! Rendering is independent per chapter and may run concurrently, but the
//! caller joins all chapters before the numbering pass begins — numbering
//! requires stable, fully rendered trees in book order.

use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::assembler::AssembledChapter;
use crate::error::Result;
use crate::node::ContentNode;
use crate::types::{BibEntry, Book};

/// Front-matter returned by the citation renderer for one chapter; kept for
/// per-chapter citation reuse in later single-document renders.
#[derive(Debug, Clone, Default)]
pub struct RenderedCitations {
    /// Rendered bibliography as an HTML fragment; empty when the chapter
    /// cites nothing.
    pub bib_html: String,
}

/// The external citation/bibliography rendering engine.
///
/// Implementations format in-text citations and return the chapter's
/// bibliography as HTML. Rendering may be network- or CPU-bound; the
/// adapter treats each call as a suspension point.
#[async_trait]
pub trait CitationRenderer: Send + Sync {
    async fn render(
        &self,
        tree: &ContentNode,
        style_id: &str,
        bibliography_header: &str,
        bibliography: &HashMap<String, BibEntry>,
    ) -> Result<RenderedCitations>;
}

/// A renderer that produces no bibliography. Used for books without
/// bibliography databases and as the test double.
pub struct NoopCitationRenderer;

#[async_trait]
impl CitationRenderer for NoopCitationRenderer {
    async fn render(
        &self,
        _tree: &ContentNode,
        _style_id: &str,
        _bibliography_header: &str,
        _bibliography: &HashMap<String, BibEntry>,
    ) -> Result<RenderedCitations> {
        Ok(RenderedCitations::default())
    }
}

/// Resolves the bibliography header for one chapter: the chapter's own
/// setting, falling back to the book's language-keyed default.
pub fn resolve_bibliography_header(book: &Book, chapter_header: Option<&str>) -> String {
    if let Some(header) = chapter_header {
        if !header.trim().is_empty() {
            return header.to_string();
        }
    }
    let lang = book
        .settings
        .language
        .split(['-', '_'])
        .next()
        .unwrap_or("en");
    book.settings
        .bibliography_header
        .get(lang)
        .or_else(|| book.settings.bibliography_header.get("en"))
        .cloned()
        .unwrap_or_else(|| "Bibliography".to_string())
}

/// Renders citations for every chapter, concurrently, and appends each
/// rendered bibliography as a trailing `section` child of the chapter tree.
///
/// All chapters are joined before this function returns (barrier), so the
/// numbering pass downstream always sees settled trees. Concurrency is
/// capped by `max_concurrency` permits.
pub async fn render_chapter_citations(
    book: &Book,
    chapters: Vec<AssembledChapter>,
    renderer: Arc<dyn CitationRenderer>,
    max_concurrency: usize,
) -> Result<Vec<AssembledChapter>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let style_id = book.settings.citation_style.clone();

    let mut tasks = Vec::with_capacity(chapters.len());
    for mut assembled in chapters {
        let header = resolve_bibliography_header(
            book,
            assembled.document.settings.bibliography_header.as_deref(),
        );
        let renderer = Arc::clone(&renderer);
        let semaphore = Arc::clone(&semaphore);
        let style_id = style_id.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await?;
            let rendered = renderer
                .render(
                    &assembled.tree,
                    &style_id,
                    &header,
                    &assembled.document.bibliography,
                )
                .await?;

            if !rendered.bib_html.is_empty() {
                let mut section = ContentNode::element("section")
                    .with_attr("class", "bibliography")
                    .with_child(
                        ContentNode::element("h2").with_child(ContentNode::text(header.clone())),
                    );
                section.append_child(
                    ContentNode::element("div")
                        .with_attr("class", "bib-entries")
                        .with_child(ContentNode::Raw(rendered.bib_html)),
                );
                assembled.tree.append_child(section);
            }
            Result::Ok(assembled)
        }));
    }

    // Join barrier: chapters come back in spawn (= chapter number) order,
    // and the first failure aborts the export.
    let mut rendered = Vec::with_capacity(tasks.len());
    for task in tasks {
        rendered.push(task.await??);
    }
    debug!("citation rendering settled for {} chapters", rendered.len());
    Ok(rendered)
}
