//! Integration tests for the bindery crate.
//!
//! These tests run full export pipelines from fixture books to packaged
//! container validation.

use async_trait::async_trait;
use bindery::citations::CitationRenderer;
use bindery::error::Result;
use bindery::prelude::*;
use bindery::serializer::MATH_STYLE_ARCHIVE_URL;
use std::sync::Mutex;

mod common;
use common::{
    figure, footnote, heading, make_book, make_document, make_zip, para, read_zip_entry,
    zip_entry_names, FixtureCitationRenderer, MemoryFetcher, MemorySource,
};

fn memory_fetcher(fetcher: MemoryFetcher) -> Arc<dyn bindery::packager::AssetFetcher> {
    Arc::new(fetcher)
}

#[tokio::test]
async fn test_epub_export_full_pipeline() -> Result<()> {
    let mut book = make_book(&[(1, 10, None), (2, 20, Some("Part Two"))]);
    book.cover_image = Some(AssetEntry::new("cover.jpg", "https://img.test/cover.jpg"));

    let source = MemorySource::new(vec![
        make_document(
            10,
            "Alpha",
            vec![heading(1, "Opening"), para("first chapter"), figure("f1", "figure")],
        ),
        make_document(20, "Beta", vec![para("second chapter"), footnote("aside")]),
    ]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Epub)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    assert_eq!(artifact.filename, "test-book.epub");
    assert_eq!(artifact.mime_type, "application/epub+zip");
    assert!(artifact.report.warnings.is_empty());

    // OCF: mimetype first and uncompressed
    let names = zip_entry_names(&artifact.bytes);
    assert_eq!(names[0], "mimetype");
    assert_eq!(read_zip_entry(&artifact.bytes, "mimetype"), "application/epub+zip");
    {
        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(artifact.bytes.clone())).unwrap();
        let mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.compression(), zip::CompressionMethod::Stored);
    }

    assert!(names.contains(&"META-INF/container.xml".to_string()));
    assert!(names.contains(&"EPUB/document-1.xhtml".to_string()));
    assert!(names.contains(&"EPUB/document-2.xhtml".to_string()));
    assert!(names.contains(&"EPUB/nav.xhtml".to_string()));
    assert!(names.contains(&"EPUB/cover.jpg".to_string()));

    let chapter_one = read_zip_entry(&artifact.bytes, "EPUB/document-1.xhtml");
    assert!(chapter_one.contains("<h1 class=\"chapter-title\">Alpha</h1>"));
    assert!(chapter_one.contains("first chapter"));
    // EPUB defaults to chapter-local labels
    assert!(chapter_one.contains("Figure 1"));

    // Spine order: cover, titlepage, chapters in order, copyright, nav last
    let opf = read_zip_entry(&artifact.bytes, "EPUB/document.opf");
    let spine = &opf[opf.find("<spine").unwrap()..];
    let position = |idref: &str| {
        spine
            .find(&format!("idref=\"{}\"", idref))
            .unwrap_or_else(|| panic!("missing spine entry {}", idref))
    };
    assert!(position("cover") < position("titlepage"));
    assert!(position("titlepage") < position("document-1"));
    assert!(position("document-1") < position("document-2"));
    assert!(position("document-2") < position("copyright"));
    assert!(position("copyright") < position("nav"));
    assert!(opf.contains("urn:book:7"));
    assert!(opf.contains("properties=\"cover-image\""));

    // Nav links rewritten to the .xhtml chapter files
    let nav = read_zip_entry(&artifact.bytes, "EPUB/nav.xhtml");
    assert!(nav.contains("document-1.xhtml"));
    assert!(!nav.contains("document-1.html\""));
    assert!(nav.contains("Part Two"));
    Ok(())
}

#[tokio::test]
async fn test_epub_export_is_reproducible() -> Result<()> {
    let book = make_book(&[(1, 10, None)]);
    let documents = vec![make_document(
        10,
        "Alpha",
        vec![heading(1, "One"), para("text"), figure("f1", "table")],
    )];

    let config = ExportConfig::builder()
        .format(ExportFormat::Epub)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;

    let first = config
        .export(&book, &MemorySource::new(documents.clone()))
        .await?;
    let second = config
        .export(&book, &MemorySource::new(documents))
        .await?;
    assert_eq!(first.bytes, second.bytes);
    Ok(())
}

#[tokio::test]
async fn test_html_export_orders_chapters_by_number() -> Result<()> {
    // Stored chapter order is reversed; output must follow the numbers.
    let book = make_book(&[(2, 20, None), (1, 10, None)]);
    let source = MemorySource::new(vec![
        make_document(10, "Alpha", vec![para("alpha body")]),
        make_document(20, "Beta", vec![para("beta body")]),
    ]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Html)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;
    assert_eq!(artifact.filename, "test-book.html.zip");

    let names = zip_entry_names(&artifact.bytes);
    assert!(names.contains(&"index.html".to_string()));
    assert!(names.contains(&"document.css".to_string()));

    let one = read_zip_entry(&artifact.bytes, "document-1.html");
    assert!(one.contains("Alpha"));
    assert!(one.contains("alpha body"));
    let two = read_zip_entry(&artifact.bytes, "document-2.html");
    assert!(two.contains("Beta"));

    // The index TOC lists chapter 1 before chapter 2
    let index = read_zip_entry(&artifact.bytes, "index.html");
    assert!(index.find("Alpha").unwrap() < index.find("Beta").unwrap());
    assert!(index.contains("document-1.html"));
    Ok(())
}

#[tokio::test]
async fn test_html_single_concatenates_with_pagination_css() -> Result<()> {
    let book = make_book(&[(1, 10, None), (2, 20, None)]);
    let source = MemorySource::new(vec![
        make_document(10, "Alpha", vec![para("alpha body")]),
        make_document(20, "Beta", vec![para("beta body")]),
    ]);

    let config = ExportConfig::builder()
        .format(ExportFormat::HtmlSingle)
        .paper_size(PaperSize::A5)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    let names = zip_entry_names(&artifact.bytes);
    assert_eq!(
        names.iter().filter(|n| n.ends_with(".html")).count(),
        1,
        "single-file output has exactly one HTML entry"
    );

    let index = read_zip_entry(&artifact.bytes, "index.html");
    // Book title page first, then chapters in numeric order
    let title_at = index.find("booktitle").unwrap();
    let alpha_at = index.find("alpha body").unwrap();
    let beta_at = index.find("beta body").unwrap();
    assert!(title_at < alpha_at && alpha_at < beta_at);
    // Pagination CSS inlined, keyed to the configured paper size
    assert!(index.contains("@page { size: A5;"));
    assert!(index.contains("float: footnote"));
    Ok(())
}

#[tokio::test]
async fn test_export_fails_on_empty_book() -> Result<()> {
    let book = make_book(&[]);
    let source = MemorySource::default();
    let config = ExportConfig::builder().build()?;

    let result = config.export(&book, &source).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Test Book"));
    Ok(())
}

#[tokio::test]
async fn test_docx_template_export() -> Result<()> {
    let book = make_book(&[(1, 10, None), (2, 20, None)]);
    let source = MemorySource::new(vec![
        make_document(10, "Alpha", vec![para("alpha body")]),
        make_document(20, "Beta", vec![para("beta body")]),
    ]);

    let template_url = "https://assets.test/report-template.docx";
    let template_zip = make_zip(&[
        ("word/styles.xml", "<w:styles>original styles</w:styles>"),
        ("word/document.xml", "TEMPLATE-ORIGINAL"),
    ]);
    let fetcher = MemoryFetcher::default().with(template_url, template_zip);

    let bookmark = |name: &str| ContentNode::element("bookmark").with_attr("name", name);
    let template = DocTemplate {
        body: ContentNode::element("body")
            .with_child(
                ContentNode::element("p")
                    .with_child(bookmark("preamble"))
                    .with_child(ContentNode::text("{book.title}, {book.author}")),
            )
            .with_child(ContentNode::element("div").with_child(bookmark("body")))
            .with_child(
                ContentNode::element("p")
                    .with_child(bookmark("postamble"))
                    .with_child(ContentNode::text("{book.copyright}")),
            ),
        url: template_url.to_string(),
    };

    let config = ExportConfig::builder()
        .format(ExportFormat::Docx)
        .docx_template(template)
        .asset_fetcher(memory_fetcher(fetcher))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    assert_eq!(artifact.filename, "test-book.docx");
    assert_eq!(
        artifact.mime_type,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );

    // Generated document.xml shadows the template's entry
    let document = read_zip_entry(&artifact.bytes, "word/document.xml");
    assert!(!document.contains("TEMPLATE-ORIGINAL"));
    assert!(document.contains("Test Book, Jane Doe"));
    assert!(document.contains("© 2026 Jane Doe"));
    // Body zone repeated per chapter, separated by a page break
    assert!(document.contains("alpha body"));
    assert!(document.contains("beta body"));
    assert!(document.contains("<page-break></page-break>"));

    // Non-content template entries pass through untouched
    let styles = read_zip_entry(&artifact.bytes, "word/styles.xml");
    assert_eq!(styles, "<w:styles>original styles</w:styles>");
    Ok(())
}

#[tokio::test]
async fn test_odt_template_export() -> Result<()> {
    let book = make_book(&[(1, 10, None)]);
    let source = MemorySource::new(vec![make_document(10, "Alpha", vec![para("alpha body")])]);

    let template_url = "https://assets.test/report-template.odt";
    let fetcher = MemoryFetcher::default().with(
        template_url,
        make_zip(&[("styles.xml", "<office:styles/>")]),
    );
    let template = DocTemplate {
        body: ContentNode::element("body").with_child(
            ContentNode::element("div")
                .with_child(ContentNode::element("bookmark").with_attr("name", "body")),
        ),
        url: template_url.to_string(),
    };

    let config = ExportConfig::builder()
        .format(ExportFormat::Odt)
        .odt_template(template)
        .asset_fetcher(memory_fetcher(fetcher))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    assert_eq!(artifact.filename, "test-book.odt");
    let content = read_zip_entry(&artifact.bytes, "content.xml");
    assert!(content.contains("office:document-content"));
    assert!(content.contains("alpha body"));
    assert!(zip_entry_names(&artifact.bytes).contains(&"styles.xml".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_citation_rendering_appends_bibliography() -> Result<()> {
    let book = make_book(&[(1, 10, None)]);
    let mut doc = make_document(10, "Alpha", vec![para("cited text")]);
    doc.bibliography.insert(
        "smith2020".to_string(),
        bindery::types::BibEntry {
            bib_type: "book".to_string(),
            fields: [("title".to_string(), "A Study".to_string())].into(),
        },
    );
    doc.bibliography.insert(
        "jones2021".to_string(),
        bindery::types::BibEntry::default(),
    );
    let source = MemorySource::new(vec![doc]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Html)
        .citation_renderer(Arc::new(FixtureCitationRenderer) as Arc<dyn CitationRenderer>)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    let chapter = read_zip_entry(&artifact.bytes, "document-1.html");
    assert!(chapter.contains("<section class=\"bibliography\">"));
    assert!(chapter.contains("<h2>Bibliography</h2>"));
    // The renderer's fragment is spliced in unescaped
    assert!(chapter.contains("<p class=\"bib-entry\">2 entries</p>"));

    // The rendered bibliography header never leaks into the index TOC
    let index = read_zip_entry(&artifact.bytes, "index.html");
    assert!(!index.contains("Bibliography"));
    Ok(())
}

#[tokio::test]
async fn test_cross_chapter_references_link_between_files() -> Result<()> {
    let book = make_book(&[(1, 10, None), (2, 20, None)]);
    let source = MemorySource::new(vec![
        make_document(
            10,
            "Alpha",
            vec![para("see"), ContentNode::element("cross-reference").with_attr("data-target", "late")],
        ),
        make_document(20, "Beta", vec![figure("late", "table")]),
    ]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Html)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    let one = read_zip_entry(&artifact.bytes, "document-1.html");
    assert!(one.contains(">Table 1</a>"));
    assert!(one.contains("href=\"document-2.html#late\""));
    assert!(artifact.report.warnings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_asset_fetch_failure_aborts_export() -> Result<()> {
    let book = make_book(&[(1, 10, None)]);
    let source = MemorySource::new(vec![make_document(
        10,
        "Alpha",
        vec![ContentNode::element("img").with_attr("src", "https://img.test/gone.png")],
    )]);

    let strict = MemoryFetcher {
        strict: true,
        ..Default::default()
    };
    let config = ExportConfig::builder()
        .format(ExportFormat::Html)
        .asset_fetcher(memory_fetcher(strict))
        .build()?;

    let result = config.export(&book, &source).await;
    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(message.contains("Failed to fetch asset"));
    assert!(message.contains("https://img.test/gone.png"));
    Ok(())
}

#[tokio::test]
async fn test_hidden_content_stripped_and_reported() -> Result<()> {
    let book = make_book(&[(1, 10, None)]);
    let source = MemorySource::new(vec![make_document(
        10,
        "Alpha",
        vec![
            para("kept text"),
            ContentNode::element("p")
                .with_attr("data-track", "deletion")
                .with_child(ContentNode::text("rejected text")),
        ],
    )]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Html)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    let chapter = read_zip_entry(&artifact.bytes, "document-1.html");
    assert!(chapter.contains("kept text"));
    assert!(!chapter.contains("rejected text"));
    assert_eq!(
        artifact.report.warnings,
        vec![ExportWarning::UnresolvedTrackedChange { chapter: 1 }]
    );
    Ok(())
}

#[tokio::test]
async fn test_dangling_reference_surfaces_in_report() -> Result<()> {
    let book = make_book(&[(1, 10, None)]);
    let source = MemorySource::new(vec![make_document(
        10,
        "Alpha",
        vec![
            para("see"),
            ContentNode::element("cross-reference").with_attr("data-target", "missing-target"),
        ],
    )]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Html)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    assert_eq!(
        artifact.report.warnings,
        vec![ExportWarning::DanglingReference {
            chapter: 1,
            target: "missing-target".to_string(),
        }]
    );
    Ok(())
}

struct CapturingPrintRenderer {
    captured: Mutex<Option<(String, String)>>,
}

#[async_trait]
impl PrintRenderer for CapturingPrintRenderer {
    async fn render(&self, html: &str, css: &str) -> Result<Vec<u8>> {
        *self.captured.lock().unwrap() = Some((html.to_string(), css.to_string()));
        Ok(b"%PDF-1.7 stub".to_vec())
    }
}

#[tokio::test]
async fn test_print_export_hands_off_to_renderer() -> Result<()> {
    let book = make_book(&[(1, 10, None)]);
    let source = MemorySource::new(vec![make_document(
        10,
        "Alpha",
        vec![
            para("printed text"),
            ContentNode::element("img").with_attr("src", "https://img.test/a.png"),
        ],
    )]);

    let renderer = Arc::new(CapturingPrintRenderer {
        captured: Mutex::new(None),
    });
    let config = ExportConfig::builder()
        .format(ExportFormat::Print)
        .paper_size(PaperSize::B5)
        .print_renderer(Arc::clone(&renderer) as Arc<dyn PrintRenderer>)
        .build()?;
    let artifact = config.export(&book, &source).await?;

    assert_eq!(artifact.filename, "test-book.pdf");
    assert_eq!(artifact.mime_type, "application/pdf");
    assert_eq!(artifact.bytes, b"%PDF-1.7 stub".to_vec());

    let captured = renderer.captured.lock().unwrap().clone().unwrap();
    let (html, css) = captured;
    assert!(html.contains("printed text"));
    assert!(html.contains("<h1 class=\"chapter-title\">Alpha</h1>"));
    // Print keeps original image URLs; the renderer fetches them itself
    assert!(html.contains("https://img.test/a.png"));
    assert!(css.contains("size: B5"));
    Ok(())
}

#[tokio::test]
async fn test_math_style_archive_merged_for_equations() -> Result<()> {
    let book = make_book(&[(1, 10, None)]);
    let source = MemorySource::new(vec![make_document(
        10,
        "Alpha",
        vec![ContentNode::element("span")
            .with_attr("data-equation", "e = mc^2")
            .with_child(ContentNode::text("e = mc^2"))],
    )]);

    let fetcher = MemoryFetcher::default().with(
        MATH_STYLE_ARCHIVE_URL,
        make_zip(&[("mathlive.css", ".ML__base { display: inline; }")]),
    );
    let config = ExportConfig::builder()
        .format(ExportFormat::Epub)
        .asset_fetcher(memory_fetcher(fetcher))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    let names = zip_entry_names(&artifact.bytes);
    assert!(names.contains(&"EPUB/css/mathlive.css".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_latex_export() -> Result<()> {
    let book = make_book(&[(1, 10, Some("Part I")), (2, 20, None)]);
    let mut doc = make_document(
        10,
        "Alpha",
        vec![heading(1, "Intro"), para("some text"), figure("f1", "figure")],
    );
    doc.bibliography.insert(
        "smith2020".to_string(),
        bindery::types::BibEntry {
            bib_type: "article".to_string(),
            fields: [("title".to_string(), "A Study".to_string())].into(),
        },
    );
    let source = MemorySource::new(vec![
        doc,
        make_document(20, "Beta", vec![para("100% more & better")]),
    ]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Latex)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;
    assert_eq!(artifact.filename, "test-book.latex.zip");

    let main = read_zip_entry(&artifact.bytes, "book.tex");
    assert!(main.contains("\\documentclass[11pt]{book}"));
    assert!(main.contains("\\part{Part I}"));
    let part_at = main.find("\\part{Part I}").unwrap();
    let one_at = main.find("\\input{document-1}").unwrap();
    let two_at = main.find("\\input{document-2}").unwrap();
    assert!(part_at < one_at && one_at < two_at);

    let one = read_zip_entry(&artifact.bytes, "document-1.tex");
    assert!(one.contains("\\chapter{Alpha}"));
    assert!(one.contains("\\section{Intro}"));
    assert!(one.contains("\\begin{figure}"));
    assert!(one.contains("\\caption{Figure 1}"));

    // LaTeX specials escaped in body text
    let two = read_zip_entry(&artifact.bytes, "document-2.tex");
    assert!(two.contains("100\\% more \\& better"));

    let bib = read_zip_entry(&artifact.bytes, "bibliography.bib");
    assert!(bib.contains("@article{smith2020,"));
    assert!(bib.contains("title = {A Study}"));
    Ok(())
}

#[tokio::test]
async fn test_bits_export() -> Result<()> {
    let book = make_book(&[(1, 10, None), (2, 20, None)]);
    let mut doc = make_document(10, "Alpha", vec![para("chapter text")]);
    doc.bibliography
        .insert("smith2020".to_string(), bindery::types::BibEntry::default());
    let source = MemorySource::new(vec![doc, make_document(20, "Beta", vec![])]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Bits)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;
    assert_eq!(artifact.filename, "test-book.bits.zip");

    let manuscript = read_zip_entry(&artifact.bytes, "manuscript.xml");
    assert!(manuscript.contains("BITS Book Interchange DTD v2.1"));
    assert!(manuscript.contains("<book-title>Test Book</book-title>"));
    assert!(manuscript.contains("<book-part book-part-type=\"chapter\" id=\"ch-1\">"));
    assert!(manuscript.contains("<book-part book-part-type=\"chapter\" id=\"ch-2\">"));
    assert!(manuscript.contains("<ref id=\"smith2020\"/>"));
    Ok(())
}

#[tokio::test]
async fn test_lazy_document_bodies_fetched_during_export() -> Result<()> {
    let book = make_book(&[(1, 10, None), (2, 20, None)]);
    let source = MemorySource::new(vec![
        make_document(10, "Alpha", vec![para("a")]),
        make_document(20, "Beta", vec![para("b")]),
    ])
    .with_lazy(&[10, 20]);

    let config = ExportConfig::builder()
        .format(ExportFormat::Html)
        .asset_fetcher(memory_fetcher(MemoryFetcher::default()))
        .build()?;
    let artifact = config.export(&book, &source).await?;

    let mut fetched = source.fetch_log.lock().unwrap().clone();
    fetched.sort();
    assert_eq!(fetched, vec![10, 20]);
    assert!(read_zip_entry(&artifact.bytes, "document-2.html").contains("Beta"));
    Ok(())
}
