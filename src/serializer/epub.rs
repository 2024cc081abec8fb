//! EPUB serializer: per-chapter XHTML, titlepage, optional cover page,
//! copyright page, OPF manifest/spine, NCX, EPUB3 navigation document and
//! the OCF `container.xml`.
//!
//! The `mimetype` entry itself is written by the packager (it must be the
//! first, uncompressed entry of the OCF container).

use crate::assembler::AssembledChapter;
use crate::assets::AssetManifest;
use crate::node::escape_xml;
use crate::serializer::{
    chapter_body_html, materialize_labels, ArchiveFragment, BinaryFile, SerializerOutput, TextFile,
    MATH_STYLE_ARCHIVE_URL,
};
use crate::types::{Book, ContentItem, NumberingStyle};

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="EPUB/document.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const FALLBACK_CSS: &str = "body { font-family: serif; margin: 1em; }\n";

/// Serializes a book into the text/binary entries of an EPUB container.
///
/// Spine order is cover → titlepage → chapters → copyright → nav
/// (non-linear). Exactly one image is marked `cover-image` when the book
/// carries a cover. EPUB keeps chapter-local numbering visually by default.
pub fn serialize(
    book: &Book,
    chapters: &[AssembledChapter],
    toc: &[ContentItem],
    manifest: &AssetManifest,
    numbering: NumberingStyle,
) -> SerializerOutput {
    let mut output = SerializerOutput::default();
    let language = &book.settings.language;

    output
        .text_files
        .push(TextFile::new("META-INF/container.xml", CONTAINER_XML));

    // Chapter documents.
    for assembled in chapters {
        let mut prepared = assembled.clone();
        materialize_labels(&mut prepared.tree, numbering, language, Some("xhtml"));
        let body = chapter_body_html(&prepared);
        output.text_files.push(TextFile::new(
            format!("EPUB/{}.xhtml", assembled.file_stem()),
            xhtml_document(&assembled.document.title, language, &body),
        ));
    }

    output.text_files.push(TextFile::new(
        "EPUB/titlepage.xhtml",
        xhtml_document(&book.title, language, &titlepage_body(book)),
    ));

    if book.cover_image.is_some() {
        output.text_files.push(TextFile::new(
            "EPUB/cover.xhtml",
            xhtml_document("Cover", language, &cover_body(book)),
        ));
    }

    output.text_files.push(TextFile::new(
        "EPUB/copyright.xhtml",
        xhtml_document("Copyright", language, &copyright_body(book)),
    ));

    output.text_files.push(TextFile::new(
        "EPUB/nav.xhtml",
        xhtml_document("Contents", language, &nav_body(toc)),
    ));

    let css = book
        .settings
        .book_style
        .as_ref()
        .map(|style| style.contents_css.clone())
        .unwrap_or_else(|| FALLBACK_CSS.to_string());
    output
        .text_files
        .push(TextFile::new("EPUB/css/document.css", css));

    output
        .text_files
        .push(TextFile::new("EPUB/document.opf", generate_opf(book, chapters, manifest)));
    output
        .text_files
        .push(TextFile::new("EPUB/document.ncx", generate_ncx(book, toc)));

    for image in &manifest.images {
        output.binary_files.push(BinaryFile {
            filename: format!("EPUB/{}", image.filename),
            url: image.url.clone(),
        });
    }
    for file in &manifest.style_files {
        output.binary_files.push(BinaryFile {
            filename: format!("EPUB/css/{}", file.filename),
            url: file.url.clone(),
        });
    }
    if let Some(cover) = &book.cover_image {
        output.binary_files.push(BinaryFile {
            filename: format!("EPUB/{}", cover.filename),
            url: cover.url.clone(),
        });
    }

    if chapters.iter().any(|c| !c.equations.is_empty()) {
        output.extra_archives.push(ArchiveFragment {
            directory: "EPUB/css".to_string(),
            url: MATH_STYLE_ARCHIVE_URL.to_string(),
        });
    }

    output
}

fn xhtml_document(title: &str, language: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{lang}\" xml:lang=\"{lang}\">\n\
         <head>\n<title>{title}</title>\n\
         <link rel=\"stylesheet\" type=\"text/css\" href=\"css/document.css\"/>\n\
         </head>\n<body>\n{body}\n</body>\n</html>\n",
        lang = language,
        title = escape_xml(title),
        body = body
    )
}

fn titlepage_body(book: &Book) -> String {
    let mut body = format!(
        "<div class=\"titlepage\">\n<h1>{}</h1>\n",
        escape_xml(&book.title)
    );
    if let Some(subtitle) = &book.metadata.subtitle {
        body.push_str(&format!("<h2>{}</h2>\n", escape_xml(subtitle)));
    }
    if let Some(author) = &book.metadata.author {
        body.push_str(&format!("<p class=\"author\">{}</p>\n", escape_xml(author)));
    }
    body.push_str("</div>");
    body
}

fn cover_body(book: &Book) -> String {
    match &book.cover_image {
        Some(cover) => format!(
            "<div class=\"cover\"><img src=\"{}\" alt=\"{}\"/></div>",
            escape_xml(&cover.filename),
            escape_xml(&book.title)
        ),
        None => String::new(),
    }
}

fn copyright_body(book: &Book) -> String {
    let mut body = String::from("<div class=\"copyrightpage\">\n");
    if let Some(copyright) = &book.metadata.copyright {
        body.push_str(&format!("<p>{}</p>\n", escape_xml(copyright)));
    }
    if let Some(publisher) = &book.metadata.publisher {
        body.push_str(&format!(
            "<p class=\"publisher\">{}</p>\n",
            escape_xml(publisher)
        ));
    }
    if let Some(version) = &book.metadata.version {
        body.push_str(&format!("<p class=\"version\">{}</p>\n", escape_xml(version)));
    }
    body.push_str("</div>");
    body
}

fn nav_body(toc: &[ContentItem]) -> String {
    let mut body = String::from("<nav epub:type=\"toc\" id=\"toc\">\n<ol>\n");
    for item in toc {
        nav_item(item, &mut body);
    }
    body.push_str("</ol>\n</nav>");
    body
}

fn nav_item(item: &ContentItem, out: &mut String) {
    out.push_str(&format!(
        "<li><a href=\"{}\">{}</a>",
        escape_xml(&item.link),
        escape_xml(&item.title)
    ));
    if !item.sub_items.is_empty() {
        out.push_str("\n<ol>\n");
        for sub in &item.sub_items {
            nav_item(sub, out);
        }
        out.push_str("</ol>\n");
    }
    out.push_str("</li>\n");
}

fn generate_opf(book: &Book, chapters: &[AssembledChapter], manifest: &AssetManifest) -> String {
    let mut opf = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"BookId\">\n\
         <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n",
    );

    opf.push_str(&format!("<dc:title>{}</dc:title>\n", escape_xml(&book.title)));
    // Derived from the stable book id so repeated exports stay
    // byte-identical.
    opf.push_str(&format!(
        "<dc:identifier id=\"BookId\">urn:book:{}</dc:identifier>\n",
        book.id
    ));
    opf.push_str(&format!(
        "<dc:language>{}</dc:language>\n",
        escape_xml(&book.settings.language)
    ));
    if let Some(author) = &book.metadata.author {
        opf.push_str(&format!("<dc:creator>{}</dc:creator>\n", escape_xml(author)));
    }
    if let Some(publisher) = &book.metadata.publisher {
        opf.push_str(&format!(
            "<dc:publisher>{}</dc:publisher>\n",
            escape_xml(publisher)
        ));
    }
    if let Some(copyright) = &book.metadata.copyright {
        opf.push_str(&format!("<dc:rights>{}</dc:rights>\n", escape_xml(copyright)));
    }
    for keyword in &book.metadata.keywords {
        opf.push_str(&format!("<dc:subject>{}</dc:subject>\n", escape_xml(keyword)));
    }
    opf.push_str(&format!(
        "<meta property=\"dcterms:modified\">{}</meta>\n",
        book.updated.format("%Y-%m-%dT%H:%M:%SZ")
    ));
    if book.cover_image.is_some() {
        opf.push_str("<meta name=\"cover\" content=\"cover-image\"/>\n");
    }
    opf.push_str("</metadata>\n<manifest>\n");

    opf.push_str(
        "<item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n\
         <item id=\"ncx\" href=\"document.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n\
         <item id=\"titlepage\" href=\"titlepage.xhtml\" media-type=\"application/xhtml+xml\"/>\n\
         <item id=\"copyright\" href=\"copyright.xhtml\" media-type=\"application/xhtml+xml\"/>\n\
         <item id=\"css\" href=\"css/document.css\" media-type=\"text/css\"/>\n",
    );
    if let Some(cover) = &book.cover_image {
        opf.push_str("<item id=\"cover\" href=\"cover.xhtml\" media-type=\"application/xhtml+xml\"/>\n");
        opf.push_str(&format!(
            "<item id=\"cover-image\" href=\"{}\" media-type=\"{}\" properties=\"cover-image\"/>\n",
            escape_xml(&cover.filename),
            media_type(&cover.filename)
        ));
    }
    for assembled in chapters {
        opf.push_str(&format!(
            "<item id=\"{stem}\" href=\"{stem}.xhtml\" media-type=\"application/xhtml+xml\"/>\n",
            stem = assembled.file_stem()
        ));
    }
    for (index, image) in manifest.images.iter().enumerate() {
        opf.push_str(&format!(
            "<item id=\"img-{}\" href=\"{}\" media-type=\"{}\"/>\n",
            index,
            escape_xml(&image.filename),
            media_type(&image.filename)
        ));
    }
    for (index, file) in manifest.style_files.iter().enumerate() {
        opf.push_str(&format!(
            "<item id=\"style-{}\" href=\"css/{}\" media-type=\"{}\"/>\n",
            index,
            escape_xml(&file.filename),
            media_type(&file.filename)
        ));
    }

    opf.push_str("</manifest>\n<spine toc=\"ncx\">\n");
    if book.cover_image.is_some() {
        opf.push_str("<itemref idref=\"cover\"/>\n");
    }
    opf.push_str("<itemref idref=\"titlepage\"/>\n");
    for assembled in chapters {
        opf.push_str(&format!("<itemref idref=\"{}\"/>\n", assembled.file_stem()));
    }
    opf.push_str("<itemref idref=\"copyright\"/>\n");
    opf.push_str("<itemref idref=\"nav\" linear=\"no\"/>\n");
    opf.push_str("</spine>\n</package>\n");
    opf
}

fn generate_ncx(book: &Book, toc: &[ContentItem]) -> String {
    let mut ncx = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n\
         <head>\n<meta name=\"dtb:uid\" content=\"urn:book:{}\"/>\n</head>\n\
         <docTitle><text>{}</text></docTitle>\n<navMap>\n",
        book.id,
        escape_xml(&book.title)
    );
    let mut play_order = 0u32;
    for item in toc {
        ncx_nav_point(item, &mut ncx, &mut play_order);
    }
    ncx.push_str("</navMap>\n</ncx>\n");
    ncx
}

fn ncx_nav_point(item: &ContentItem, out: &mut String, play_order: &mut u32) {
    *play_order += 1;
    out.push_str(&format!(
        "<navPoint id=\"np-{order}\" playOrder=\"{order}\">\n\
         <navLabel><text>{}</text></navLabel>\n<content src=\"{}\"/>\n",
        escape_xml(&item.title),
        escape_xml(&item.link),
        order = play_order
    ));
    for sub in &item.sub_items {
        ncx_nav_point(sub, out, play_order);
    }
    out.push_str("</navPoint>\n");
}

/// Media type from a filename extension; images and fonts only.
fn media_type(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("otf") => "font/otf",
        Some("ttf") => "font/ttf",
        Some("css") => "text/css",
        _ => "application/octet-stream",
    }
}
