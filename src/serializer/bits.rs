//! BITS/JATS serializer: wraps each chapter's converted front/body/back XML
//! fragments into `<book-part>` elements inside a single `manuscript.xml`,
//! plus a manifest listing the referenced images.

use crate::assembler::AssembledChapter;
use crate::assets::AssetManifest;
use crate::node::escape_xml;
use crate::serializer::{materialize_labels, BinaryFile, SerializerOutput, TextFile};
use crate::types::{Book, NumberingStyle};

const BITS_PROLOGUE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<!DOCTYPE book PUBLIC \"-//NLM//DTD BITS Book Interchange DTD v2.1 20220202//EN\" \"BITS-book2.dtd\">\n";

/// Serializes a book into a BITS 2.1 manuscript plus image manifest.
pub fn serialize(
    book: &Book,
    chapters: &[AssembledChapter],
    manifest: &AssetManifest,
    numbering: NumberingStyle,
) -> SerializerOutput {
    let mut output = SerializerOutput::default();

    let mut xml = String::from(BITS_PROLOGUE);
    xml.push_str(&format!(
        "<book dtd-version=\"2.1\" xml:lang=\"{}\">\n",
        escape_xml(&book.settings.language)
    ));
    xml.push_str("<book-meta>\n");
    xml.push_str(&format!(
        "<book-title-group><book-title>{}</book-title></book-title-group>\n",
        escape_xml(&book.title)
    ));
    if let Some(author) = &book.metadata.author {
        xml.push_str(&format!(
            "<contrib-group><contrib contrib-type=\"author\"><string-name>{}</string-name></contrib></contrib-group>\n",
            escape_xml(author)
        ));
    }
    if let Some(publisher) = &book.metadata.publisher {
        xml.push_str(&format!(
            "<publisher><publisher-name>{}</publisher-name></publisher>\n",
            escape_xml(publisher)
        ));
    }
    xml.push_str("</book-meta>\n<book-body>\n");

    for assembled in chapters {
        let mut prepared = assembled.clone();
        materialize_labels(&mut prepared.tree, numbering, &book.settings.language, None);
        xml.push_str(&book_part(&prepared));
    }

    xml.push_str("</book-body>\n</book>\n");
    output.text_files.push(TextFile::new("manuscript.xml", xml));

    let mut listing = String::new();
    for image in &manifest.images {
        listing.push_str(&image.filename);
        listing.push('\n');
    }
    output.text_files.push(TextFile::new("manifest.txt", listing));

    for image in &manifest.images {
        output.binary_files.push(BinaryFile {
            filename: image.filename.clone(),
            url: image.url.clone(),
        });
    }

    output
}

fn book_part(assembled: &AssembledChapter) -> String {
    let mut part = format!(
        "<book-part book-part-type=\"chapter\" id=\"ch-{}\">\n",
        assembled.chapter.number
    );
    part.push_str(&format!(
        "<book-part-meta><title-group><title>{}</title></title-group></book-part-meta>\n",
        escape_xml(&assembled.document.title)
    ));
    part.push_str("<body>\n");
    part.push_str(&assembled.tree.inner_xhtml());
    part.push_str("\n</body>\n");

    // Bibliography sections move into the back matter of the part.
    if !assembled.document.bibliography.is_empty() {
        part.push_str("<back><ref-list>\n");
        let mut keys: Vec<_> = assembled.document.bibliography.keys().collect();
        keys.sort();
        for key in keys {
            part.push_str(&format!("<ref id=\"{}\"/>\n", escape_xml(key)));
        }
        part.push_str("</ref-list></back>\n");
    }
    part.push_str("</book-part>\n");
    part
}
