//! Chapter data resolution: ensures every chapter's referenced document is
//! fully loaded before the pipeline runs.
//!
//! Resolution is all-or-nothing. If any chapter's document cannot be looked
//! up, the whole export fails with an access error; there is no partial
//! export of the accessible chapters.

use async_trait::async_trait;
use futures::future::try_join_all;
use log::debug;

use crate::error::{Error, Result};
use crate::types::{Book, Chapter, Document, DocumentId};

/// Read-only access to the documents a book's chapters reference.
///
/// Implementations typically wrap an HTTP document service; tests use an
/// in-memory map. `lookup` must answer from already-known records without
/// fetching; `fetch_body` is the suspension point that loads full content,
/// comments and raw content for one document.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Looks up a document record by id. `None` means the document does not
    /// exist or is not visible to the current user.
    fn lookup(&self, id: DocumentId) -> Option<Document>;

    /// Fetches the full body of a document whose record was visible but
    /// whose content has not been loaded yet.
    async fn fetch_body(&self, id: DocumentId) -> Result<Document>;
}

/// A chapter joined with its fully loaded document.
#[derive(Debug, Clone)]
pub struct ResolvedChapter {
    pub chapter: Chapter,
    pub document: Document,
}

/// Resolves every chapter of `book` against the document source.
///
/// Chapters are returned sorted by ascending `number` regardless of the
/// stored order. Documents whose bodies are missing are fetched
/// concurrently; the returned future completes only once all of them have
/// arrived (or the first failure aborts everything).
///
/// # Errors
///
/// * [`Error::EmptyBook`] - the book has no chapters; checked before any fetch
/// * [`Error::Access`] - at least one chapter's document is not visible
pub async fn resolve_chapter_documents(
    book: &Book,
    source: &dyn DocumentSource,
) -> Result<Vec<ResolvedChapter>> {
    if book.chapters.is_empty() {
        return Err(Error::EmptyBook(book.title.clone()));
    }

    let chapters = book.sorted_chapters();

    // Look up every record first so an inaccessible chapter fails the export
    // before any body fetch is issued.
    let mut records = Vec::with_capacity(chapters.len());
    for chapter in &chapters {
        match source.lookup(chapter.text) {
            Some(document) => records.push(document),
            None => {
                return Err(Error::Access(format!(
                    "chapter {} references document {} which is not readable",
                    chapter.number, chapter.text
                )));
            }
        }
    }

    let fetches = records.iter().filter(|d| d.content.is_none()).count();
    debug!(
        "resolving {} chapters ({} bodies to fetch)",
        chapters.len(),
        fetches
    );

    let loaded = try_join_all(records.into_iter().map(|document| async move {
        if document.content.is_some() {
            Ok(document)
        } else {
            source.fetch_body(document.id).await
        }
    }))
    .await?;

    Ok(chapters
        .into_iter()
        .zip(loaded)
        .map(|(chapter, document)| ResolvedChapter { chapter, document })
        .collect())
}
