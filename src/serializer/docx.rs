//! DOCX serializer: renders the template zones plus per-chapter body clones
//! into `word/document.xml` and merges the remainder of the template
//! archive (styles, numbering, relationships) into the output untouched.

use crate::assembler::AssembledChapter;
use crate::serializer::template::{render_document, DocTemplate};
use crate::serializer::{materialize_labels, ArchiveFragment, SerializerOutput, TextFile};
use crate::types::{Book, NumberingStyle};

const DOCUMENT_XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\n<w:body>\n";
const DOCUMENT_XML_FOOTER: &str = "</w:body>\n</w:document>\n";

/// Serializes a book through a DOCX template.
///
/// Only `word/document.xml` is produced here; every other entry of the
/// template archive passes through untouched (text files shadow colliding
/// archive entries at packaging time).
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
    let mut xml = String::from(DOCUMENT_XML_HEADER);
    for node in &nodes {
        xml.push_str(&node.to_xhtml());
        xml.push('\n');
    }
    xml.push_str(DOCUMENT_XML_FOOTER);

    output
        .text_files
        .push(TextFile::new("word/document.xml", xml));
    output.extra_archives.push(ArchiveFragment {
        directory: String::new(),
        url: template.url.clone(),
    });

    output
}
