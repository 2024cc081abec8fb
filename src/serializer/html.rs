//! HTML serializer: one file per chapter plus an `index.html` TOC page, or
//! a single self-contained document with pagination CSS inlined.

use lazy_static::lazy_static;
use regex::Regex;

use crate::assembler::AssembledChapter;
use crate::assets::AssetManifest;
use crate::node::escape_xml;
use crate::serializer::{
    chapter_body_html, html_document, materialize_labels, pagination_css, ArchiveFragment,
    BinaryFile, SerializerOutput, TextFile, MATH_STYLE_ARCHIVE_URL,
};
use crate::types::{Book, ContentItem, NumberingStyle, PaperSize};

lazy_static! {
    /// Extracts the numeric component of chapter filenames for the
    /// single-file concatenation order.
    static ref FILE_NUMBER_REGEX: Regex = Regex::new(r"\d+").unwrap();
}

/// Serializes a book into one HTML file per chapter plus an `index.html`
/// table of contents, stylesheet and image entries.
pub fn serialize(
    book: &Book,
    chapters: &[AssembledChapter],
    toc: &[ContentItem],
    manifest: &AssetManifest,
    numbering: NumberingStyle,
) -> SerializerOutput {
    let mut output = SerializerOutput::default();
    let head = "<link rel=\"stylesheet\" type=\"text/css\" href=\"document.css\"/>\n";

    output.text_files.push(TextFile::new(
        "index.html",
        html_document(&book.title, &book.settings.language, head, &index_body(book, toc)),
    ));

    for assembled in chapters {
        let mut prepared = assembled.clone();
        materialize_labels(&mut prepared.tree, numbering, &book.settings.language, Some("html"));
        output.text_files.push(TextFile::new(
            format!("{}.html", assembled.file_stem()),
            html_document(
                &assembled.document.title,
                &book.settings.language,
                head,
                &chapter_body_html(&prepared),
            ),
        ));
    }

    output
        .text_files
        .push(TextFile::new("document.css", stylesheet(book)));

    push_shared_binaries(&mut output, manifest);
    push_math_archive(&mut output, chapters);
    output
}

/// Serializes a book into one self-contained HTML document.
///
/// Chapter bodies and the index body are concatenated ordered by a numeric
/// filename sort with the index always first, and the paper-size-keyed
/// pagination CSS is inlined into the head.
pub fn serialize_single(
    book: &Book,
    chapters: &[AssembledChapter],
    toc: &[ContentItem],
    manifest: &AssetManifest,
    numbering: NumberingStyle,
    paper_size: PaperSize,
) -> SerializerOutput {
    let mut output = SerializerOutput::default();

    let mut parts: Vec<(String, String)> = vec![("index.html".to_string(), index_body(book, toc))];
    for assembled in chapters {
        let mut prepared = assembled.clone();
        // Single document: bare anchors reach every chapter's targets.
        materialize_labels(&mut prepared.tree, numbering, &book.settings.language, None);
        parts.push((
            format!("{}.html", assembled.file_stem()),
            chapter_body_html(&prepared),
        ));
    }
    parts.sort_by_key(|(filename, _)| sort_key(filename));

    let body = parts
        .into_iter()
        .map(|(_, body)| body)
        .collect::<Vec<_>>()
        .join("\n");
    let head = format!(
        "<style>\n{}\n{}</style>\n",
        stylesheet(book),
        pagination_css(paper_size)
    );

    output.text_files.push(TextFile::new(
        "index.html",
        html_document(&book.title, &book.settings.language, &head, &body),
    ));

    push_shared_binaries(&mut output, manifest);
    push_math_archive(&mut output, chapters);
    output
}

/// Sort key for the single-file concatenation: the index page always
/// first, then chapter files by their numeric component.
fn sort_key(filename: &str) -> (u8, u64) {
    if filename == "index.html" {
        return (0, 0);
    }
    let number = FILE_NUMBER_REGEX
        .find(filename)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(u64::MAX);
    (1, number)
}

fn index_body(book: &Book, toc: &[ContentItem]) -> String {
    let mut body = format!("<h1 class=\"booktitle\">{}</h1>\n", escape_xml(&book.title));
    if let Some(subtitle) = &book.metadata.subtitle {
        body.push_str(&format!(
            "<h2 class=\"booksubtitle\">{}</h2>\n",
            escape_xml(subtitle)
        ));
    }
    if let Some(author) = &book.metadata.author {
        body.push_str(&format!("<p class=\"author\">{}</p>\n", escape_xml(author)));
    }
    body.push_str("<div class=\"toc\">\n<ul>\n");
    for item in toc {
        toc_entry(item, &mut body);
    }
    body.push_str("</ul>\n</div>");
    body
}

fn toc_entry(item: &ContentItem, out: &mut String) {
    out.push_str(&format!(
        "<li class=\"toc-level-{}\"><a href=\"{}\">{}</a>",
        item.level,
        escape_xml(&item.link),
        escape_xml(&item.title)
    ));
    if !item.sub_items.is_empty() {
        out.push_str("\n<ul>\n");
        for sub in &item.sub_items {
            toc_entry(sub, out);
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</li>\n");
}

fn stylesheet(book: &Book) -> String {
    book.settings
        .book_style
        .as_ref()
        .map(|style| style.contents_css.clone())
        .unwrap_or_else(|| "body { font-family: serif; max-width: 40em; margin: auto; }\n".to_string())
}

fn push_shared_binaries(output: &mut SerializerOutput, manifest: &AssetManifest) {
    for image in &manifest.images {
        output.binary_files.push(BinaryFile {
            filename: image.filename.clone(),
            url: image.url.clone(),
        });
    }
    for file in &manifest.style_files {
        output.binary_files.push(BinaryFile {
            filename: file.filename.clone(),
            url: file.url.clone(),
        });
    }
}

fn push_math_archive(output: &mut SerializerOutput, chapters: &[AssembledChapter]) {
    if chapters.iter().any(|c| !c.equations.is_empty()) {
        output.extra_archives.push(ArchiveFragment {
            directory: "css".to_string(),
            url: MATH_STYLE_ARCHIVE_URL.to_string(),
        });
    }
}
