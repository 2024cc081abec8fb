//! Template-driven rendering shared by the DOCX and ODT serializers.
//!
//! A template document is split into three zones — preamble, body-template,
//! postamble — identified by bookmark markers found while scanning the
//! template's top-level content nodes. Unmarked nodes attach to whichever
//! zone was most recently entered, defaulting to body; a template with no
//! markers at all therefore renders everything as body (lenient fallback,
//! never an error).

use lazy_static::lazy_static;
use regex::Regex;

use crate::assembler::AssembledChapter;
use crate::node::ContentNode;
use crate::types::Book;

lazy_static! {
    /// Matches `{book.field}` placeholders in amble text blocks.
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"\{book\.([a-z]+)\}").unwrap();
}

/// A template document plus the URL of the archive it came from. The
/// archive supplies every non-content entry (styles, numbering) untouched.
#[derive(Debug, Clone)]
pub struct DocTemplate {
    /// Parsed top-level content nodes of the template's document body.
    pub body: ContentNode,
    /// Source archive merged into the output container.
    pub url: String,
}

/// The three zones of a split template.
#[derive(Debug, Clone, Default)]
pub struct TemplateZones {
    pub preamble: Vec<ContentNode>,
    pub body: Vec<ContentNode>,
    pub postamble: Vec<ContentNode>,
}

#[derive(Clone, Copy, PartialEq)]
enum Zone {
    Preamble,
    Body,
    Postamble,
}

/// Returns the zone a top-level node enters, if it carries a bookmark
/// marker named `preamble`, `body` or `postamble`.
fn zone_marker(node: &ContentNode) -> Option<Zone> {
    let bookmark = node.find_first(&|n| n.name() == Some("bookmark"))?;
    match bookmark.attr("name")? {
        "preamble" => Some(Zone::Preamble),
        "body" => Some(Zone::Body),
        "postamble" => Some(Zone::Postamble),
        _ => None,
    }
}

/// Splits a template's top-level content nodes into the three zones.
pub fn split_zones(template_body: &ContentNode) -> TemplateZones {
    let mut zones = TemplateZones::default();
    let mut current = Zone::Body;

    for node in template_body.children() {
        if let Some(entered) = zone_marker(node) {
            current = entered;
        }
        match current {
            Zone::Preamble => zones.preamble.push(node.clone()),
            Zone::Body => zones.body.push(node.clone()),
            Zone::Postamble => zones.postamble.push(node.clone()),
        }
    }
    zones
}

/// Renders the repeatable body zone once per chapter.
///
/// Each clone's body bookmark is renamed to a chapter-unique tag and the
/// chapter's content is spliced in after the bookmark; an explicit
/// page-break node separates consecutive chapters.
pub fn render_body(zones: &TemplateZones, chapters: &[AssembledChapter]) -> Vec<ContentNode> {
    let mut rendered = Vec::new();
    for (index, assembled) in chapters.iter().enumerate() {
        if index > 0 {
            rendered.push(ContentNode::element("page-break"));
        }
        for node in &zones.body {
            let mut clone = node.clone();
            splice_chapter(&mut clone, assembled);
            rendered.push(clone);
        }
    }
    rendered
}

/// Renames the body bookmark of a cloned zone node to a chapter-unique tag
/// and inserts the chapter's content after it.
fn splice_chapter(node: &mut ContentNode, assembled: &AssembledChapter) {
    let tag = format!("body_{}", assembled.chapter.number);
    let mut content: Option<Vec<ContentNode>> = Some(chapter_content(assembled));

    node.walk_mut(&mut |candidate| {
        let ContentNode::Element { children, .. } = candidate else {
            return;
        };
        let Some(position) = children
            .iter()
            .position(|c| c.name() == Some("bookmark") && c.attr("name") == Some("body"))
        else {
            return;
        };
        children[position].set_attr("name", tag.clone());
        if let Some(content) = content.take() {
            let tail = children.split_off(position + 1);
            children.extend(content);
            children.extend(tail);
        }
    });
}

/// The chapter content spliced into a body-zone clone: a title heading
/// followed by the working tree's children.
fn chapter_content(assembled: &AssembledChapter) -> Vec<ContentNode> {
    let mut content = vec![ContentNode::element("h1")
        .with_attr("class", "chapter-title")
        .with_child(ContentNode::text(assembled.document.title.clone()))];
    content.extend(assembled.tree.children().iter().cloned());
    content
}

/// Substitutes `{book.title}`-style metadata placeholders in the amble
/// zones' text blocks, skipping text inside tracked-deletion regions.
pub fn render_ambles(zones: &mut TemplateZones, book: &Book) {
    for node in zones.preamble.iter_mut().chain(zones.postamble.iter_mut()) {
        substitute_placeholders(node, book);
    }
}

fn substitute_placeholders(node: &mut ContentNode, book: &Book) {
    match node {
        ContentNode::Text(text) => {
            *text = PLACEHOLDER_REGEX
                .replace_all(text, |caps: &regex::Captures| {
                    placeholder_value(book, &caps[1]).unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned();
        }
        ContentNode::Element { attrs, children, .. } => {
            if attrs.get("data-track").map(String::as_str) == Some("deletion") {
                return;
            }
            for child in children {
                substitute_placeholders(child, book);
            }
        }
        ContentNode::Raw(_) => {}
    }
}

fn placeholder_value(book: &Book, field: &str) -> Option<String> {
    match field {
        "title" => Some(book.title.clone()),
        "author" => book.metadata.author.clone(),
        "subtitle" => book.metadata.subtitle.clone(),
        "version" => book.metadata.version.clone(),
        "publisher" => book.metadata.publisher.clone(),
        "copyright" => book.metadata.copyright.clone(),
        _ => None,
    }
}

/// Renders the full document body: substituted preamble, per-chapter body
/// clones, substituted postamble.
pub fn render_document(
    template: &DocTemplate,
    book: &Book,
    chapters: &[AssembledChapter],
) -> Vec<ContentNode> {
    let mut zones = split_zones(&template.body);
    render_ambles(&mut zones, book);

    let mut nodes = zones.preamble.clone();
    nodes.extend(render_body(&zones, chapters));
    nodes.extend(zones.postamble.clone());
    nodes
}
