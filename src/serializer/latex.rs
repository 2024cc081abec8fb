//! LaTeX serializer: one `.tex` file per chapter, a combined bibliography
//! file, and a wrapping `book.tex` that issues `\part{}` commands at part
//! boundaries and `\input{}`s each chapter in order.

use crate::assembler::AssembledChapter;
use crate::assets::AssetManifest;
use crate::node::ContentNode;
use crate::serializer::{materialize_labels, BinaryFile, SerializerOutput, TextFile};
use crate::types::{Book, NumberingStyle};

/// Serializes a book into a LaTeX source tree.
pub fn serialize(
    book: &Book,
    chapters: &[AssembledChapter],
    manifest: &AssetManifest,
    numbering: NumberingStyle,
) -> SerializerOutput {
    let mut output = SerializerOutput::default();

    output
        .text_files
        .push(TextFile::new("book.tex", book_tex(book, chapters)));

    for assembled in chapters {
        let mut prepared = assembled.clone();
        materialize_labels(&mut prepared.tree, numbering, &book.settings.language, None);
        let mut tex = format!("\\chapter{{{}}}\n\n", escape_latex(&assembled.document.title));
        tex.push_str(&latex_from_tree(&prepared.tree));
        output
            .text_files
            .push(TextFile::new(format!("{}.tex", assembled.file_stem()), tex));
    }

    output
        .text_files
        .push(TextFile::new("bibliography.bib", bibliography(chapters)));

    for image in &manifest.images {
        output.binary_files.push(BinaryFile {
            filename: image.filename.clone(),
            url: image.url.clone(),
        });
    }

    output
}

fn book_tex(book: &Book, chapters: &[AssembledChapter]) -> String {
    let mut tex = String::from(
        "\\documentclass[11pt]{book}\n\
         \\usepackage[utf8]{inputenc}\n\
         \\usepackage{graphicx}\n\
         \\usepackage{csquotes}\n\
         \\usepackage[style=authoryear]{biblatex}\n\
         \\addbibresource{bibliography.bib}\n\n",
    );
    tex.push_str(&format!("\\title{{{}}}\n", escape_latex(&book.title)));
    if let Some(author) = &book.metadata.author {
        tex.push_str(&format!("\\author{{{}}}\n", escape_latex(author)));
    }
    tex.push_str("\n\\begin{document}\n\\maketitle\n\\tableofcontents\n\n");

    for assembled in chapters {
        if let Some(part) = &assembled.chapter.part {
            tex.push_str(&format!("\\part{{{}}}\n", escape_latex(part)));
        }
        tex.push_str(&format!("\\input{{{}}}\n", assembled.file_stem()));
    }

    tex.push_str("\n\\printbibliography\n\\end{document}\n");
    tex
}

/// Combines every chapter's bibliography database into one `.bib` file.
fn bibliography(chapters: &[AssembledChapter]) -> String {
    let mut bib = String::new();
    let mut seen = std::collections::HashSet::new();
    for assembled in chapters {
        let mut keys: Vec<_> = assembled.document.bibliography.keys().collect();
        keys.sort();
        for key in keys {
            if !seen.insert(key.clone()) {
                continue;
            }
            let entry = &assembled.document.bibliography[key];
            bib.push_str(&format!("@{}{{{},\n", entry.bib_type, key));
            let mut fields: Vec<_> = entry.fields.iter().collect();
            fields.sort();
            for (field, value) in fields {
                bib.push_str(&format!("  {} = {{{}}},\n", field, value));
            }
            bib.push_str("}\n\n");
        }
    }
    bib
}

/// Converts a content tree into LaTeX markup.
///
/// Covers the structural subset the pipeline produces: headings, paragraphs,
/// emphasis, lists, figures with captions, footnotes, cross-reference links
/// and tables degrade gracefully to plain text.
pub fn latex_from_tree(tree: &ContentNode) -> String {
    let mut out = String::new();
    latex_node(tree, &mut out);
    out
}

fn latex_node(node: &ContentNode, out: &mut String) {
    match node {
        ContentNode::Text(text) => out.push_str(&escape_latex(text)),
        ContentNode::Raw(markup) => out.push_str(&escape_latex(markup)),
        ContentNode::Element { name, children, .. } => match name.as_str() {
            "h1" => wrap(node, out, "\\section{", "}\n\n"),
            "h2" => wrap(node, out, "\\subsection{", "}\n\n"),
            "h3" | "h4" | "h5" | "h6" => wrap(node, out, "\\subsubsection{", "}\n\n"),
            "p" => {
                latex_children(children, out);
                out.push_str("\n\n");
            }
            "em" | "i" => wrap(node, out, "\\emph{", "}"),
            "strong" | "b" => wrap(node, out, "\\textbf{", "}"),
            "ul" => wrap(node, out, "\\begin{itemize}\n", "\\end{itemize}\n\n"),
            "ol" => wrap(node, out, "\\begin{enumerate}\n", "\\end{enumerate}\n\n"),
            "li" => wrap(node, out, "\\item ", "\n"),
            "img" => {
                if let Some(src) = node.attr("src") {
                    out.push_str(&format!("\\includegraphics[width=\\linewidth]{{{}}}\n", src));
                }
            }
            "figure" => {
                out.push_str("\\begin{figure}[htb]\n\\centering\n");
                latex_children(children, out);
                if let Some(label) = node.attr("data-label") {
                    out.push_str(&format!("\\caption{{{}}}\n", escape_latex(label)));
                }
                if let Some(id) = node.attr("id") {
                    out.push_str(&format!("\\label{{{}}}\n", id));
                }
                out.push_str("\\end{figure}\n\n");
            }
            "figcaption" => {} // rendered via \caption above
            "footnote" | "span" if node.attr("class") == Some("footnote") => {
                wrap(node, out, "\\footnote{", "}")
            }
            "footnote" => wrap(node, out, "\\footnote{", "}"),
            "a" => {
                if let Some(href) = node.attr("href") {
                    if let Some(target) = href.strip_prefix('#') {
                        out.push_str(&format!("\\ref{{{}}}", target));
                        return;
                    }
                }
                latex_children(children, out);
            }
            "cross-reference" => latex_children(children, out),
            "br" => out.push_str("\\\\\n"),
            _ => latex_children(children, out),
        },
    }
}

fn wrap(node: &ContentNode, out: &mut String, before: &str, after: &str) {
    out.push_str(before);
    latex_children(node.children(), out);
    out.push_str(after);
}

fn latex_children(children: &[ContentNode], out: &mut String) {
    for child in children {
        latex_node(child, out);
    }
}

/// Escapes LaTeX special characters in plain text.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '&' => out.push_str("\\&"),
            '%' => out.push_str("\\%"),
            '$' => out.push_str("\\$"),
            '#' => out.push_str("\\#"),
            '_' => out.push_str("\\_"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}
