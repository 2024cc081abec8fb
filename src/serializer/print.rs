//! Print serializer: reuses the HTML pipeline with per-image filename
//! rewriting disabled and hands concatenated chapter HTML plus computed
//! page CSS to an external pagination renderer.

use async_trait::async_trait;

use crate::assembler::AssembledChapter;
use crate::error::Result;
use crate::serializer::{chapter_body_html, materialize_labels, pagination_css};
use crate::types::{Book, NumberingStyle, PaperSize};

/// The external pagination/print renderer (e.g. a paged-media engine).
#[async_trait]
pub trait PrintRenderer: Send + Sync {
    /// Renders concatenated book HTML plus page CSS into the final
    /// paginated bytes (typically PDF).
    async fn render(&self, html: &str, css: &str) -> Result<Vec<u8>>;
}

/// The prepared print input: the concatenated HTML document and its
/// paper-size-keyed page CSS.
#[derive(Debug, Clone)]
pub struct PrintInput {
    pub html: String,
    pub css: String,
}

/// Builds the print input from the assembled chapters.
///
/// Image references keep their original URLs (the print renderer fetches
/// them itself), so this runs on chapters collected with reference
/// rewriting disabled.
pub fn prepare(
    book: &Book,
    chapters: &[AssembledChapter],
    numbering: NumberingStyle,
    paper_size: PaperSize,
) -> PrintInput {
    let mut body = String::new();
    for assembled in chapters {
        let mut prepared = assembled.clone();
        materialize_labels(&mut prepared.tree, numbering, &book.settings.language, None);
        body.push_str(&chapter_body_html(&prepared));
        body.push('\n');
    }

    let css = pagination_css(paper_size);
    let html = crate::serializer::html_document(&book.title, &book.settings.language, "", &body);
    PrintInput { html, css }
}
