//! Common test utilities for the bindery crate.
//!
//! Provides fixture builders for books and documents, in-memory
//! implementations of the external collaborators (document source, asset
//! fetcher, citation renderer) and zip inspection helpers.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::Mutex;

use bindery::error::{Error, Result};
use bindery::prelude::*;

/// Fixed timestamp used by every fixture book so exports are reproducible.
#[allow(dead_code)]
pub fn fixed_updated() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
}

/// Builds a book with the given `(number, document id, part)` chapters.
#[allow(dead_code)]
pub fn make_book(chapters: &[(u32, u64, Option<&str>)]) -> Book {
    Book {
        id: 7,
        title: "Test Book".to_string(),
        path: "test-book".to_string(),
        metadata: BookMetadata {
            author: Some("Jane Doe".to_string()),
            subtitle: None,
            version: Some("1.0".to_string()),
            publisher: Some("Test Press".to_string()),
            copyright: Some("© 2026 Jane Doe".to_string()),
            keywords: vec!["testing".to_string()],
        },
        settings: BookSettings {
            citation_style: "apa".to_string(),
            book_style: None,
            paper_size: PaperSize::A4,
            language: "en-US".to_string(),
            bibliography_header: HashMap::from([("en".to_string(), "Bibliography".to_string())]),
        },
        chapters: chapters
            .iter()
            .map(|(number, text, part)| Chapter {
                text: *text,
                number: *number,
                part: part.map(|p| p.to_string()),
            })
            .collect(),
        cover_image: None,
        updated: fixed_updated(),
        added: fixed_updated(),
    }
}

/// Builds a document with the given body children.
#[allow(dead_code)]
pub fn make_document(id: u64, title: &str, children: Vec<ContentNode>) -> Document {
    let mut body = ContentNode::element("body");
    for child in children {
        body.append_child(child);
    }
    Document {
        id,
        title: title.to_string(),
        content: Some(body),
        images: HashMap::new(),
        bibliography: HashMap::new(),
        settings: Default::default(),
        metadata: HashMap::new(),
    }
}

#[allow(dead_code)]
pub fn heading(level: u8, text: &str) -> ContentNode {
    ContentNode::element(format!("h{}", level)).with_child(ContentNode::text(text))
}

#[allow(dead_code)]
pub fn para(text: &str) -> ContentNode {
    ContentNode::element("p").with_child(ContentNode::text(text))
}

#[allow(dead_code)]
pub fn figure(id: &str, category: &str) -> ContentNode {
    ContentNode::element("figure")
        .with_attr("id", id)
        .with_attr("data-category", category)
        .with_child(
            ContentNode::element("img").with_attr("src", format!("https://img.test/{}.png", id)),
        )
}

#[allow(dead_code)]
pub fn footnote(text: &str) -> ContentNode {
    ContentNode::element("footnote").with_child(ContentNode::text(text))
}

#[allow(dead_code)]
pub fn cross_reference(target: &str) -> ContentNode {
    ContentNode::element("cross-reference").with_attr("data-target", target)
}

/// An in-memory document source. Ids listed in `lazy` answer `lookup` with
/// the body withheld, to exercise the lazy fetch path.
#[derive(Default)]
pub struct MemorySource {
    pub bodies: HashMap<u64, Document>,
    pub lazy: Vec<u64>,
    pub fetch_log: Mutex<Vec<u64>>,
}

impl MemorySource {
    #[allow(dead_code)]
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            bodies: documents.into_iter().map(|d| (d.id, d)).collect(),
            lazy: Vec::new(),
            fetch_log: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn with_lazy(mut self, ids: &[u64]) -> Self {
        self.lazy = ids.to_vec();
        self
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    fn lookup(&self, id: u64) -> Option<Document> {
        let document = self.bodies.get(&id)?.clone();
        if self.lazy.contains(&id) {
            let mut record = document;
            record.content = None;
            Some(record)
        } else {
            Some(document)
        }
    }

    async fn fetch_body(&self, id: u64) -> Result<Document> {
        self.fetch_log.lock().unwrap().push(id);
        self.bodies
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Access(format!("document {} not readable", id)))
    }
}

/// An in-memory asset fetcher; unknown URLs yield the empty byte string so
/// export fixtures do not need to pre-register every image.
#[derive(Default)]
pub struct MemoryFetcher {
    pub responses: HashMap<String, Vec<u8>>,
    pub strict: bool,
}

impl MemoryFetcher {
    #[allow(dead_code)]
    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), bytes);
        self
    }
}

#[async_trait]
impl AssetFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match self.responses.get(url) {
            Some(bytes) => Ok(bytes.clone()),
            None if self.strict => Err(Error::AssetFetch {
                url: url.to_string(),
                reason: "no stubbed response".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// A citation renderer echoing a fixed bibliography fragment when the
/// chapter has bibliography entries.
#[allow(dead_code)]
pub struct FixtureCitationRenderer;

#[async_trait]
impl CitationRenderer for FixtureCitationRenderer {
    async fn render(
        &self,
        _tree: &ContentNode,
        _style_id: &str,
        _bibliography_header: &str,
        bibliography: &HashMap<String, bindery::types::BibEntry>,
    ) -> Result<RenderedCitations> {
        if bibliography.is_empty() {
            return Ok(RenderedCitations::default());
        }
        Ok(RenderedCitations {
            bib_html: format!("<p class=\"bib-entry\">{} entries</p>", bibliography.len()),
        })
    }
}

/// Lists the entry names of a zip container in stored order.
#[allow(dead_code)]
pub fn zip_entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Reads one text entry out of a zip container.
#[allow(dead_code)]
pub fn read_zip_entry(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut contents = String::new();
    entry.read_to_string(&mut contents).unwrap();
    contents
}

/// Builds a small in-memory zip archive from `(name, contents)` pairs, for
/// stubbing archive fragments and templates.
#[allow(dead_code)]
pub fn make_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, contents) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
