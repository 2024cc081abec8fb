//! Zip/container packaging: turns a serializer's named entries into the
//! final downloadable container.
//!
//! Packaging is the unique place binary bytes are fetched and the unique
//! place the book's fixed `updated` timestamp is consumed, so identical
//! inputs and timestamp produce byte-identical output.

use chrono::{DateTime, Datelike, Timelike, Utc};
use log::{debug, warn};
use std::collections::HashSet;
use std::io::{Cursor, Write};

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::serializer::SerializerOutput;

/// MIME type of an EPUB OCF container; triggers the `mimetype`-first rule.
const EPUB_MIME: &str = "application/epub+zip";

/// Fetches remote bytes for binary entries and archive fragments.
///
/// Serialization references assets purely descriptively (by URL); the
/// packager resolves them through this trait. Tests install an in-memory
/// implementation.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP-backed fetcher used in production.
#[derive(Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(|e| Error::AssetFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(Error::AssetFetch {
                url: url.to_string(),
                reason: format!("HTTP status {}", response.status()),
            });
        }
        let bytes = response.bytes().await.map_err(|e| Error::AssetFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Packs serialized output into the final zip container.
///
/// Entry order is deterministic: the `mimetype` entry first for EPUB
/// (Stored, uncompressed per OCF), then text files, binary files and
/// archive fragments in the order the serializer emitted them. Every
/// locally written entry carries the fixed timestamp; fragment entries are
/// raw-copied without recompression. Fragment entries whose names collide
/// with already written files are skipped, so generated content shadows
/// template content.
///
/// # Arguments
///
/// * `output` - The serializer's named entries
/// * `mime_type` - Container MIME type
/// * `timestamp` - Fixed modification time stamped on every written entry
/// * `fetcher` - Resolves binary-by-URL entries and fragments
pub async fn pack(
    output: &SerializerOutput,
    mime_type: &str,
    timestamp: DateTime<Utc>,
    fetcher: &dyn AssetFetcher,
) -> Result<Vec<u8>> {
    let zip_time = zip_datetime(timestamp);
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip_time);
    let stored = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip_time);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut written: HashSet<String> = HashSet::new();

    // OCF requires the mimetype entry first and uncompressed.
    if mime_type == EPUB_MIME {
        zip.start_file("mimetype", stored)?;
        zip.write_all(mime_type.as_bytes())?;
        written.insert("mimetype".to_string());
    }

    for text in &output.text_files {
        zip.start_file(&text.filename, deflated)?;
        zip.write_all(text.contents.as_bytes())?;
        written.insert(text.filename.clone());
    }

    for binary in &output.binary_files {
        if written.contains(&binary.filename) {
            continue;
        }
        let bytes = fetcher.fetch(&binary.url).await?;
        zip.start_file(&binary.filename, deflated)?;
        zip.write_all(&bytes)?;
        written.insert(binary.filename.clone());
    }

    for fragment in &output.extra_archives {
        let bytes = fetcher.fetch(&fragment.url).await?;
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::AssetFetch {
            url: fragment.url.clone(),
            reason: format!("not a readable zip archive: {}", e),
        })?;
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            if entry.is_dir() {
                continue;
            }
            let name = if fragment.directory.is_empty() {
                entry.name().to_string()
            } else {
                format!("{}/{}", fragment.directory.trim_end_matches('/'), entry.name())
            };
            if written.contains(&name) {
                warn!("fragment entry '{}' shadowed by generated file", name);
                continue;
            }
            // Raw copy keeps the fragment's compressed data untouched.
            zip.raw_copy_file_rename(entry, &name)?;
            written.insert(name);
        }
    }

    let cursor = zip.finish()?;
    let bytes = cursor.into_inner();
    debug!("packed {} entries ({} bytes)", written.len(), bytes.len());
    Ok(bytes)
}

/// Converts a UTC timestamp into the zip DOS time format. Dates before the
/// zip epoch clamp to it.
fn zip_datetime(timestamp: DateTime<Utc>) -> zip::DateTime {
    zip::DateTime::from_date_and_time(
        timestamp.year().clamp(1980, 2107) as u16,
        timestamp.month() as u8,
        timestamp.day() as u8,
        timestamp.hour() as u8,
        timestamp.minute() as u8,
        timestamp.second() as u8,
    )
    .unwrap_or_default()
}
