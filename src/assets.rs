//! Asset collection: gathers referenced images and style/font files across
//! all chapters, deduplicating by value equality, and rewrites in-tree
//! references to collector-assigned output filenames.
//!
//! Only descriptors are collected here; the actual bytes are fetched by URL
//! at packaging time.

use log::debug;
use std::collections::HashMap;

use crate::assembler::AssembledChapter;
use crate::types::{AssetEntry, Book};

/// The deduplicated asset manifest of one export run.
#[derive(Debug, Clone, Default)]
pub struct AssetManifest {
    /// Images referenced by chapter content, in first-seen order.
    pub images: Vec<AssetEntry>,
    /// Stylesheet/font files shipped with the book style.
    pub style_files: Vec<AssetEntry>,
}

impl AssetManifest {
    /// All entries the packager must fetch, images first.
    pub fn all_entries(&self) -> Vec<AssetEntry> {
        let mut entries = self.images.clone();
        entries.extend(self.style_files.iter().cloned());
        entries
    }
}

/// Collects image and style assets from all chapters.
///
/// Two distinct elements citing the same physical asset (equal
/// `{filename, url}` descriptor) collapse to one manifest entry. When
/// `rewrite_references` is set, each `img` element's `src` is rewritten to
/// the assigned output filename; print output keeps the original URLs.
pub fn collect_assets(
    book: &Book,
    chapters: &mut [AssembledChapter],
    rewrite_references: bool,
) -> AssetManifest {
    let mut manifest = AssetManifest::default();
    // Maps the source descriptor to the assigned output filename.
    let mut assigned: HashMap<AssetEntry, String> = HashMap::new();

    for assembled in chapters.iter_mut() {
        assembled.tree.walk_mut(&mut |node| {
            if node.name() != Some("img") {
                return;
            }
            let Some(url) = node.attr("src").map(str::to_string) else {
                return;
            };
            let filename = node
                .attr("data-filename")
                .map(str::to_string)
                .unwrap_or_else(|| filename_from_url(&url));
            let entry = AssetEntry::new(filename, url);

            let output_name = match assigned.get(&entry) {
                Some(name) => name.clone(),
                None => {
                    let name = unique_name(&entry.filename, &assigned);
                    assigned.insert(entry.clone(), name.clone());
                    manifest.images.push(AssetEntry::new(name.clone(), entry.url));
                    name
                }
            };

            if rewrite_references {
                node.set_attr("src", output_name);
            }
        });
    }

    if let Some(style) = &book.settings.book_style {
        for file in &style.files {
            if !manifest.style_files.contains(file) {
                manifest.style_files.push(file.clone());
            }
        }
    }

    debug!(
        "collected {} images and {} style files",
        manifest.images.len(),
        manifest.style_files.len()
    );
    manifest
}

/// Derives a filename from the last URL path segment.
fn filename_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("image")
        .split('?')
        .next()
        .unwrap_or("image")
        .to_string()
}

/// Picks an output filename that does not collide with an already assigned
/// one: the original name when free, otherwise `{stem}-{n}.{ext}`.
fn unique_name(filename: &str, assigned: &HashMap<AssetEntry, String>) -> String {
    let taken = |name: &str| assigned.values().any(|v| v == name);
    if !taken(filename) {
        return filename.to_string();
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (filename, None),
    };
    let mut counter = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}-{}.{}", stem, counter, ext),
            None => format!("{}-{}", stem, counter),
        };
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
