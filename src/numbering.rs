//! Book-wide numbering and cross-reference resolution.
//!
//! Chapters are processed strictly in ascending chapter-number order, each
//! tree in document (pre-order) order. Every labeled figure, equation,
//! photo, table and footnote receives both a book-wide and a chapter-local
//! counter. Cross-references are resolved in a second pass, after every
//! target has been stamped — a reference whose target carries no counter by
//! then is a dangling reference and is surfaced as a soft warning, never an
//! error.
//!
//! The counter tables are touched only inside this single sequential pass;
//! no concurrent access is possible by construction.

use log::debug;
use std::collections::HashMap;

use crate::assembler::AssembledChapter;
use crate::node::ContentNode;
use crate::types::{label_for, CountedCategory, CounterPair, Counters, ExportReport, ExportWarning};

/// Counter stamps of one numbered element, keyed by its element id and
/// used for cross-reference resolution.
#[derive(Debug, Clone)]
struct NumberedTarget {
    category: CountedCategory,
    pair: CounterPair,
    /// Chapter the target element lives in; references from other chapters
    /// need a cross-file link in multi-file output.
    chapter: u32,
}

/// Runs the numbering pass over all chapters, in place.
///
/// Labels are written as `data-book-counter`, `data-chapter-counter` and a
/// human-visible `data-label` built from the language-localized category
/// word plus the book-wide value. Serializers that render chapter-local
/// numbering recompute the label text from `data-chapter-counter`.
///
/// # Arguments
///
/// * `chapters` - Assembled chapters, already sorted by chapter number
/// * `language` - Book language for label localization
/// * `report` - Soft-warning sink for dangling cross-references
pub fn number_chapters(chapters: &mut [AssembledChapter], language: &str, report: &mut ExportReport) {
    debug_assert!(chapters.windows(2).all(|w| w[0].chapter.number < w[1].chapter.number));

    let mut counters = Counters::new();
    let mut targets: HashMap<String, NumberedTarget> = HashMap::new();

    // Pass one: stamp counters onto every numbered element across the book.
    for assembled in chapters.iter_mut() {
        counters.reset_chapter();
        let chapter_number = assembled.chapter.number;
        stamp_tree(
            &mut assembled.tree,
            &mut counters,
            &mut targets,
            chapter_number,
            language,
        );
    }

    // Pass two: resolve cross-references against the stamped targets.
    for assembled in chapters.iter_mut() {
        let chapter_number = assembled.chapter.number;
        assembled.tree.walk_mut(&mut |node| {
            if node.name() != Some("cross-reference") {
                return;
            }
            let Some(target_id) = node.attr("data-target").map(str::to_string) else {
                return;
            };
            match targets.get(&target_id) {
                Some(target) => {
                    let label = format!(
                        "{} {}",
                        label_for(target.category, language),
                        target.pair.book
                    );
                    node.set_attr("data-book-counter", target.pair.book.to_string());
                    node.set_attr("data-chapter-counter", target.pair.chapter.to_string());
                    node.set_attr("data-label", label.clone());
                    if target.chapter != chapter_number {
                        node.set_attr("data-ref-chapter", target.chapter.to_string());
                    }
                    if let ContentNode::Element { children, .. } = node {
                        children.clear();
                        children.push(ContentNode::text(label));
                    }
                }
                None => {
                    // Left unresolved on purpose; the sanity check reports it.
                    report.warn(ExportWarning::DanglingReference {
                        chapter: chapter_number,
                        target: target_id,
                    });
                }
            }
        });
    }

    debug!(
        "numbering pass complete: {} targets, {} warnings",
        targets.len(),
        report.warnings.len()
    );
}

fn stamp_tree(
    tree: &mut ContentNode,
    counters: &mut Counters,
    targets: &mut HashMap<String, NumberedTarget>,
    chapter_number: u32,
    language: &str,
) {
    let mut footnote_index = 0u32;
    tree.walk_mut(&mut |node| {
        match node.name() {
            Some("figure") => {
                let Some(category) = node.attr("data-category").and_then(CountedCategory::from_attr)
                else {
                    return;
                };
                let pair = counters.bump(category);
                node.set_attr("data-book-counter", pair.book.to_string());
                node.set_attr("data-chapter-counter", pair.chapter.to_string());
                node.set_attr(
                    "data-label",
                    format!("{} {}", label_for(category, language), pair.book),
                );
                if let Some(id) = node.attr("id").map(str::to_string) {
                    targets.insert(
                        id,
                        NumberedTarget {
                            category,
                            pair,
                            chapter: chapter_number,
                        },
                    );
                }
            }
            Some("footnote") => {
                let pair = counters.bump(CountedCategory::Footnote);
                footnote_index += 1;
                node.set_attr("data-book-counter", pair.book.to_string());
                node.set_attr("data-chapter-counter", pair.chapter.to_string());
                node.set_attr(
                    "data-label",
                    format!(
                        "{} {}",
                        label_for(CountedCategory::Footnote, language),
                        pair.book
                    ),
                );
                // Generated anchor keeps marker and body paired book-wide.
                let anchor = format!("fn-{}", pair.book);
                node.set_attr("data-anchor", anchor);
                if node.attr("id").is_none() {
                    node.set_attr("id", format!("fnref-{}-{}", chapter_number, footnote_index));
                }
                if let Some(id) = node.attr("id").map(str::to_string) {
                    targets.insert(
                        id,
                        NumberedTarget {
                            category: CountedCategory::Footnote,
                            pair,
                            chapter: chapter_number,
                        },
                    );
                }
            }
            _ => {}
        }
    });
}
