//! ODT serializer: the OpenDocument sibling of the DOCX serializer.
//! Renders the template zones into `content.xml`; the template archive
//! supplies `styles.xml`, `meta.xml` and the rest untouched.

use crate::assembler::AssembledChapter;
use crate::serializer::template::{render_document, DocTemplate};
use crate::serializer::{materialize_labels, ArchiveFragment, SerializerOutput, TextFile};
use crate::types::{Book, NumberingStyle};

const CONTENT_XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<office:document-content xmlns:office=\"urn:oasis:names:tc:opendocument:xmlns:office:1.0\" \
xmlns:text=\"urn:oasis:names:tc:opendocument:xmlns:text:1.0\" office:version=\"1.2\">\n\
<office:body>\n<office:text>\n";
const CONTENT_XML_FOOTER: &str = "</office:text>\n</office:body>\n</office:document-content>\n";

/// Serializes a book through an ODT template.
pub fn serialize(
    book: &Book,
    chapters: &[AssembledChapter],
    template: &DocTemplate,
    numbering: NumberingStyle,
) -> SerializerOutput {
    let mut output = SerializerOutput::default();

    let prepared: Vec<AssembledChapter> = chapters
        .iter()
        .map(|assembled| {
            let mut prepared = assembled.clone();
            materialize_labels(&mut prepared.tree, numbering, &book.settings.language, None);
            prepared
        })
        .collect();

    let nodes = render_document(template, book, &prepared);
    let mut xml = String::from(CONTENT_XML_HEADER);
    for node in &nodes {
        xml.push_str(&node.to_xhtml());
        xml.push('\n');
    }
    xml.push_str(CONTENT_XML_FOOTER);

    output.text_files.push(TextFile::new("content.xml", xml));
    output.extra_archives.push(ArchiveFragment {
        directory: String::new(),
        url: template.url.clone(),
    });

    output
}
