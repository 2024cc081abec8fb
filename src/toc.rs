//! Table-of-contents construction.
//!
//! Two sub-steps: `set_links` scans every chapter tree for heading elements
//! (plus a synthetic document-title entry and part boundaries) and emits a
//! flat, level-tagged list of [`ContentItem`]s in document order;
//! `order_links` then nests that flat list into a tree by level.

use crate::assembler::AssembledChapter;
use crate::node::ContentNode;
use crate::types::ContentItem;

const HEADINGS: &[(&str, i8)] = &[
    ("h1", 1),
    ("h2", 2),
    ("h3", 3),
    ("h4", 4),
    ("h5", 5),
    ("h6", 6),
];

fn heading_level(name: &str) -> Option<i8> {
    HEADINGS
        .iter()
        .find(|(tag, _)| *tag == name)
        .map(|(_, level)| *level)
}

/// Scans one chapter tree and emits its flat TOC entries in document order.
///
/// A chapter `part` boundary becomes a level −1 item, the document title a
/// level 0 item, each `h1`–`h6` an item at its heading depth. Headings
/// without an id get `_{chapterNumber}_{index}` assigned in-tree so every
/// link target is addressable.
///
/// # Arguments
///
/// * `assembled` - The chapter; its tree is mutated to add missing ids
/// * `target_file` - Output filename the links point into
pub fn set_links(assembled: &mut AssembledChapter, target_file: &str) -> Vec<ContentItem> {
    let chapter_number = assembled.chapter.number;
    let mut items = Vec::new();

    if let Some(part) = &assembled.chapter.part {
        items.push(ContentItem {
            title: part.clone(),
            link: target_file.to_string(),
            doc_num: chapter_number,
            level: -1,
            sub_items: Vec::new(),
        });
    }

    items.push(ContentItem {
        title: assembled.document.title.clone(),
        link: target_file.to_string(),
        doc_num: chapter_number,
        level: 0,
        sub_items: Vec::new(),
    });

    let mut index = 0usize;
    scan_headings(
        &mut assembled.tree,
        chapter_number,
        target_file,
        &mut index,
        &mut items,
    );

    items
}

/// Recursive heading scan. Rendered bibliography sections are skipped
/// wholesale: their `h2` header is a rendering artifact, not authored
/// structure, and must not receive an anchor or a TOC entry.
fn scan_headings(
    node: &mut ContentNode,
    chapter_number: u32,
    target_file: &str,
    index: &mut usize,
    items: &mut Vec<ContentItem>,
) {
    if node.name() == Some("section") && node.attr("class") == Some("bibliography") {
        return;
    }

    if let Some(level) = node.name().and_then(heading_level) {
        *index += 1;
        let id = match node.attr("id") {
            Some(id) => id.to_string(),
            None => {
                let id = format!("_{}_{}", chapter_number, *index);
                node.set_attr("id", id.clone());
                id
            }
        };
        items.push(ContentItem {
            title: node.text_content(),
            link: format!("{}#{}", target_file, id),
            doc_num: chapter_number,
            level,
            sub_items: Vec::new(),
        });
    }

    if let ContentNode::Element { children, .. } = node {
        for child in children {
            scan_headings(child, chapter_number, target_file, index, items);
        }
    }
}

/// Nests a flat, level-tagged item list into a tree.
///
/// For each item after the first, the nearest prior item with a strictly
/// lower level adopts it as its last child; only that nearest ancestor
/// receives the child, so no item ends up under two parents. Part items
/// (level −1) always stay top-level.
pub fn order_links(flat: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut roots: Vec<ContentItem> = Vec::new();
    for item in flat {
        match find_parent(&mut roots, item.level) {
            Some(parent) => parent.sub_items.push(item),
            None => roots.push(item),
        }
    }
    roots
}

/// Finds the adoption point for an item of the given level: the deepest
/// item on the rightmost spine of the forest with a strictly lower level.
///
/// Scanning the flat list backward for the nearest lower-level item always
/// lands on the rightmost spine, so descending it is equivalent to the
/// backward scan over the original flat order.
fn find_parent(items: &mut [ContentItem], level: i8) -> Option<&mut ContentItem> {
    let last = items.last_mut()?;
    if last.level >= level {
        return None;
    }
    if last
        .sub_items
        .last()
        .map_or(false, |child| child.level < level)
    {
        find_parent(&mut last.sub_items, level)
    } else {
        Some(last)
    }
}

/// Builds the complete, nested TOC for a book from its chapters.
pub fn build_toc(chapters: &mut [AssembledChapter], file_extension: &str) -> Vec<ContentItem> {
    let mut flat = Vec::new();
    for assembled in chapters.iter_mut() {
        let target_file = format!("{}.{}", assembled.file_stem(), file_extension);
        let items = set_links(assembled, &target_file);
        assembled.toc_items = items.clone();
        flat.extend(items);
    }
    order_links(flat)
}
