//! Content assembly: turns a resolved document into the chapter's working
//! tree the rest of the pipeline operates on.
//!
//! The document's image database is passed as an explicit parameter to
//! every tree-building call rather than living on a shared mutable schema
//! object, so chapters can be assembled concurrently without cross-chapter
//! image-lookup corruption.

use std::collections::HashMap;

use crate::error::Result;
use crate::node::ContentNode;
use crate::resolver::ResolvedChapter;
use crate::types::{AssetEntry, Chapter, ContentItem, Document, ExportWarning};

/// A chapter's assembled working state, carried through numbering, TOC
/// building, asset collection and serialization.
#[derive(Debug, Clone)]
pub struct AssembledChapter {
    pub chapter: Chapter,
    /// Document id, title, bibliography and settings (body already consumed
    /// into `tree`).
    pub document: Document,
    /// The detached working tree; mutated in place by later stages.
    pub tree: ContentNode,
    /// Ids of in-document equation markers; a non-empty list pulls the math
    /// stylesheet archive into HTML-family outputs.
    pub equations: Vec<String>,
    /// Flat TOC entries for this chapter, filled by the TOC builder.
    pub toc_items: Vec<ContentItem>,
    /// Count of hidden subtrees stripped during assembly.
    pub stripped_hidden: usize,
}

impl AssembledChapter {
    /// Serialized output filename stem for this chapter, e.g. `document-2`.
    pub fn file_stem(&self) -> String {
        format!("document-{}", self.chapter.number)
    }
}

/// Builds the working tree for one resolved chapter.
///
/// The stored content tree is cloned, hidden subtrees (unaccepted tracked
/// deletions, explicitly hidden nodes) are removed, and equation markers are
/// collected. Node order is preserved exactly. A document with no content is
/// valid and produces an empty `body` element.
///
/// # Arguments
///
/// * `resolved` - The chapter with its fully loaded document
/// * `images` - The document's image database, threaded explicitly
pub fn assemble_chapter(
    resolved: &ResolvedChapter,
    images: &HashMap<u64, AssetEntry>,
) -> Result<AssembledChapter> {
    let mut tree = match &resolved.document.content {
        Some(content) => content.clone(),
        None => ContentNode::element("body"),
    };

    let stripped_hidden = tree.strip_hidden();

    // Resolve image-database references into concrete src URLs so the tree
    // is self-contained from here on.
    tree.walk_mut(&mut |node| {
        if node.name() == Some("img") {
            if let Some(id) = node
                .attr("data-image-id")
                .and_then(|v| v.parse::<u64>().ok())
            {
                if let Some(entry) = images.get(&id) {
                    node.set_attr("src", entry.url.clone());
                    node.set_attr("data-filename", entry.filename.clone());
                }
            }
        }
    });

    let mut equations = Vec::new();
    tree.walk(&mut |node| {
        if let Some(eq) = node.attr("data-equation") {
            equations.push(eq.to_string());
        }
    });

    Ok(AssembledChapter {
        chapter: resolved.chapter.clone(),
        document: resolved.document.clone(),
        tree,
        equations,
        toc_items: Vec::new(),
        stripped_hidden,
    })
}

/// Soft findings from assembly: stripped tracked changes and empty titles.
pub fn assembly_warnings(assembled: &AssembledChapter) -> Vec<ExportWarning> {
    let mut warnings = Vec::new();
    if assembled.stripped_hidden > 0 {
        warnings.push(ExportWarning::UnresolvedTrackedChange {
            chapter: assembled.chapter.number,
        });
    }
    if assembled.document.title.trim().is_empty() {
        warnings.push(ExportWarning::MissingChapterTitle {
            chapter: assembled.chapter.number,
        });
    }
    warnings
}
