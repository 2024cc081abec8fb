//! The content tree: a DOM-equivalent representation of a document body.
//!
//! Every pipeline stage (numbering, TOC building, asset collection, the
//! format serializers) operates on this tree. It is built once per chapter
//! by the content assembler from the document's stored JSON tree and
//! discarded after packaging.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Elements serialized without a closing tag in HTML and self-closed in XHTML.
const VOID_ELEMENTS: &[&str] = &["img", "br", "hr", "meta", "link"];

/// A node in a document content tree.
///
/// Attributes live in a `BTreeMap` so attribute order — and therefore
/// serialized output — is deterministic, which the byte-reproducibility
/// guarantee of the packager depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentNode {
    Element {
        name: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<ContentNode>,
    },
    Text(String),
    /// Pre-rendered markup spliced in verbatim (e.g. the citation engine's
    /// bibliography fragment). Never escaped on serialization.
    Raw(String),
}

impl ContentNode {
    /// Creates an element node with no attributes or children.
    pub fn element(name: impl Into<String>) -> Self {
        ContentNode::Element {
            name: name.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Creates a text node.
    pub fn text(value: impl Into<String>) -> Self {
        ContentNode::Text(value.into())
    }

    /// Builder-style attribute setter, for constructing fixture trees.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child appender.
    pub fn with_child(mut self, child: ContentNode) -> Self {
        self.append_child(child);
        self
    }

    /// Parses a stored JSON content tree into a `ContentNode`.
    ///
    /// The stored shape is `{"type": name, "attrs": {...}, "content": [...]}`
    /// for elements and `{"type": "text", "text": "..."}` for text nodes.
    ///
    /// # Arguments
    ///
    /// * `json` - The stored tree as parsed JSON
    ///
    /// # Returns
    ///
    /// * `Result<ContentNode>` - The reconstructed tree, or an error for
    ///   malformed node records
    pub fn from_json(json: &Value) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| Error::Other("Content node is not a JSON object".to_string()))?;
        let node_type = obj
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::Other("Content node has no 'type' field".to_string()))?;

        if node_type == "text" {
            let text = obj.get("text").and_then(|t| t.as_str()).unwrap_or("");
            return Ok(ContentNode::Text(text.to_string()));
        }

        let mut attrs = BTreeMap::new();
        if let Some(attr_obj) = obj.get("attrs").and_then(|a| a.as_object()) {
            for (key, value) in attr_obj {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                attrs.insert(key.clone(), rendered);
            }
        }

        let mut children = Vec::new();
        if let Some(content) = obj.get("content").and_then(|c| c.as_array()) {
            for child in content {
                children.push(ContentNode::from_json(child)?);
            }
        }

        Ok(ContentNode::Element {
            name: node_type.to_string(),
            attrs,
            children,
        })
    }

    /// The element name, or `None` for text nodes.
    pub fn name(&self) -> Option<&str> {
        match self {
            ContentNode::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Looks up an attribute value on an element node.
    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            ContentNode::Element { attrs, .. } => attrs.get(key).map(|s| s.as_str()),
            _ => None,
        }
    }

    /// Sets an attribute on an element node; no-op for text nodes.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if let ContentNode::Element { attrs, .. } = self {
            attrs.insert(key.into(), value.into());
        }
    }

    /// Appends a child to an element node; no-op for text nodes.
    pub fn append_child(&mut self, child: ContentNode) {
        if let ContentNode::Element { children, .. } = self {
            children.push(child);
        }
    }

    /// Immutable children slice (empty for text nodes).
    pub fn children(&self) -> &[ContentNode] {
        match self {
            ContentNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Pre-order (document order) traversal over all nodes.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ContentNode)) {
        visit(self);
        if let ContentNode::Element { children, .. } = self {
            for child in children {
                child.walk(visit);
            }
        }
    }

    /// Pre-order traversal with mutable access to every node.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut ContentNode)) {
        visit(self);
        if let ContentNode::Element { children, .. } = self {
            for child in children {
                child.walk_mut(visit);
            }
        }
    }

    /// Finds the first element (pre-order) satisfying the predicate.
    pub fn find_first(&self, predicate: &impl Fn(&ContentNode) -> bool) -> Option<&ContentNode> {
        if predicate(self) {
            return Some(self);
        }
        for child in self.children() {
            if let Some(found) = child.find_first(predicate) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text of this node and all descendants, document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.walk(&mut |node| {
            if let ContentNode::Text(text) = node {
                out.push_str(text);
            }
        });
        out
    }

    /// Whether this element is flagged hidden: an unaccepted tracked
    /// deletion or explicitly hidden content.
    pub fn is_hidden(&self) -> bool {
        self.attr("data-hidden") == Some("true") || self.attr("data-track") == Some("deletion")
    }

    /// Removes hidden subtrees in place, preserving the order of everything
    /// else. Returns the number of subtrees removed.
    pub fn strip_hidden(&mut self) -> usize {
        let mut removed = 0;
        if let ContentNode::Element { children, .. } = self {
            children.retain(|child| {
                if child.is_hidden() {
                    removed += 1;
                    false
                } else {
                    true
                }
            });
            for child in children {
                removed += child.strip_hidden();
            }
        }
        removed
    }

    /// Serializes the tree to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out, false);
        out
    }

    /// Serializes the tree to XHTML (void elements self-closed).
    pub fn to_xhtml(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out, true);
        out
    }

    /// Serializes only the children, leaving out the wrapping element.
    /// Chapter working trees keep their stored `body` root; output
    /// documents provide their own wrapper.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            child.write_markup(&mut out, false);
        }
        out
    }

    /// XHTML variant of [`inner_html`](ContentNode::inner_html).
    pub fn inner_xhtml(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            child.write_markup(&mut out, true);
        }
        out
    }

    fn write_markup(&self, out: &mut String, xhtml: bool) {
        match self {
            ContentNode::Text(text) => out.push_str(&escape_xml(text)),
            ContentNode::Raw(markup) => out.push_str(markup),
            ContentNode::Element {
                name,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_xml(value));
                    out.push('"');
                }
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    out.push_str(if xhtml { "/>" } else { ">" });
                    return;
                }
                out.push('>');
                for child in children {
                    child.write_markup(out, xhtml);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
}

/// Escapes the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
