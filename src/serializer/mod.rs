//! Format serializers: each target format consumes the assembled, numbered
//! chapter trees plus the TOC and asset manifest and emits a list of named
//! output entries. Packaging into the final container happens separately.

use crate::assembler::AssembledChapter;
use crate::node::ContentNode;
use crate::types::{label_for, CountedCategory, NumberingStyle, PaperSize};

pub mod bits;
pub mod docx;
pub mod epub;
pub mod html;
pub mod latex;
pub mod odt;
pub mod print;
pub mod template;

/// URL of the bundled math-rendering stylesheet archive, merged into
/// HTML-family outputs when any chapter carries equations.
pub const MATH_STYLE_ARCHIVE_URL: &str = "https://assets.bindery.dev/mathlive-styles.zip";

/// A named text entry of a serialized output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFile {
    pub filename: String,
    pub contents: String,
}

impl TextFile {
    pub fn new(filename: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            contents: contents.into(),
        }
    }
}

/// A named binary entry, described by source URL until packaging fetches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFile {
    pub filename: String,
    pub url: String,
}

/// A pre-built zip fragment merged into a target directory of the final
/// container without recompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFragment {
    pub directory: String,
    pub url: String,
}

/// Common output contract of every format serializer.
#[derive(Debug, Clone, Default)]
pub struct SerializerOutput {
    pub text_files: Vec<TextFile>,
    pub binary_files: Vec<BinaryFile>,
    pub extra_archives: Vec<ArchiveFragment>,
}

/// Rewrites the stamped `data-label` values of a tree to use the
/// chapter-local counter instead of the book-wide one.
///
/// The numbering pass always writes book-wide labels; serializers
/// configured for [`NumberingStyle::ChapterLocal`] call this per chapter
/// before rendering.
pub fn relabel_chapter_local(tree: &mut ContentNode, language: &str) {
    tree.walk_mut(&mut |node| {
        let category = match node.name() {
            Some("figure") => node.attr("data-category").and_then(CountedCategory::from_attr),
            Some("footnote") => Some(CountedCategory::Footnote),
            _ => None,
        };
        let (Some(category), Some(chapter_counter)) = (category, node.attr("data-chapter-counter"))
        else {
            return;
        };
        let label = format!("{} {}", label_for(category, language), chapter_counter);
        node.set_attr("data-label", label);
    });
}

/// Materializes numbering metadata into visible markup:
///
/// * figures get a trailing `figcaption` carrying the label,
/// * footnotes become `span.footnote` floats anchored by their generated id,
/// * resolved cross-references become links.
///
/// `link_ext` is the chapter-file extension for multi-file output:
/// references whose target lives in another chapter link to
/// `document-{n}.{ext}#target`. `None` means all chapters share one
/// document and bare anchors suffice.
///
/// Run per chapter after the optional chapter-local relabeling.
pub fn materialize_labels(
    tree: &mut ContentNode,
    numbering: NumberingStyle,
    language: &str,
    link_ext: Option<&str>,
) {
    if numbering == NumberingStyle::ChapterLocal {
        relabel_chapter_local(tree, language);
    }
    tree.walk_mut(&mut |node| match node.name() {
        Some("figure") => {
            let Some(label) = node.attr("data-label").map(str::to_string) else {
                return;
            };
            node.append_child(
                ContentNode::element("figcaption")
                    .with_attr("class", "figure-label")
                    .with_child(ContentNode::text(label)),
            );
        }
        Some("footnote") => {
            let label = node.attr("data-label").map(str::to_string).unwrap_or_default();
            let anchor = node.attr("data-anchor").map(str::to_string).unwrap_or_default();
            let marker = ContentNode::element("span")
                .with_attr("class", "footnote-marker")
                .with_child(ContentNode::text(label));
            if let ContentNode::Element { name, attrs, children } = node {
                *name = "span".to_string();
                attrs.insert("class".to_string(), "footnote".to_string());
                if !anchor.is_empty() {
                    attrs.insert("id".to_string(), anchor);
                }
                children.insert(0, marker);
            }
        }
        Some("cross-reference") => {
            let Some(target) = node.attr("data-target").map(str::to_string) else {
                return;
            };
            // Dangling references keep their element untouched.
            if node.attr("data-label").is_none() {
                return;
            }
            let href = match (node.attr("data-ref-chapter").map(str::to_string), link_ext) {
                (Some(chapter), Some(ext)) => {
                    format!("document-{}.{}#{}", chapter, ext, target)
                }
                _ => format!("#{}", target),
            };
            if let ContentNode::Element { name, attrs, .. } = node {
                *name = "a".to_string();
                attrs.insert("href".to_string(), href);
            }
        }
        _ => {}
    });
}

/// Pagination-oriented CSS keyed to the paper size: page-break rules and
/// footnote-as-float styling shared by single-file HTML and print output.
pub fn pagination_css(paper_size: PaperSize) -> String {
    format!(
        "@page {{ size: {}; margin: 2cm; }}\n\
         h1.chapter-title {{ page-break-before: always; }}\n\
         figure, table {{ page-break-inside: avoid; }}\n\
         .footnote {{ float: footnote; }}\n\
         .footnote-marker {{ vertical-align: super; font-size: 0.7em; }}\n",
        paper_size.css_size()
    )
}

/// Wraps a rendered body in a minimal standalone HTML document.
pub fn html_document(title: &str, language: &str, head_extra: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n<meta charset=\"utf-8\"/>\n\
         <title>{}</title>\n{}</head>\n<body>\n{}\n</body>\n</html>\n",
        language,
        crate::node::escape_xml(title),
        head_extra,
        body
    )
}

/// Renders one chapter body: the part/title headings followed by the
/// serialized content tree.
pub fn chapter_body_html(assembled: &AssembledChapter) -> String {
    let mut body = String::new();
    if let Some(part) = &assembled.chapter.part {
        body.push_str(&format!(
            "<h1 class=\"part-title\">{}</h1>\n",
            crate::node::escape_xml(part)
        ));
    }
    body.push_str(&format!(
        "<h1 class=\"chapter-title\">{}</h1>\n",
        crate::node::escape_xml(&assembled.document.title)
    ));
    body.push_str(&assembled.tree.inner_html());
    body
}
