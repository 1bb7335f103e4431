//! XML helpers for the ADT wire formats.
//!
//! Requests are built from small per-kind string templates with escaped
//! attributes. Responses come back under varying namespace prefixes
//! (`adtcore:`, `chkrun:`, `aunit:`, `tm:`, `asx:`; server versions also
//! differ), so all reading goes through local-name matching, which is the
//! namespace-stripping the protocol needs.

use roxmltree::{Document, Node};

use crate::domain::error::{AdtError, Result};

/// Escape a string for use inside an XML attribute or text node.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Parse a response body. Malformed server XML is a protocol failure.
pub fn parse(body: &str) -> Result<Document<'_>> {
    Document::parse(body).map_err(|err| AdtError::Network(format!("invalid XML response: {err}")))
}

/// Attribute lookup by local name, ignoring any namespace prefix.
pub fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|attribute| attribute.name() == name)
        .map(|attribute| attribute.value())
}

pub fn attr_or<'a>(node: Node<'a, '_>, name: &str, default: &'a str) -> &'a str {
    attr(node, name).unwrap_or(default)
}

/// All element descendants with the given local name, in document order.
pub fn elements<'a, 'i>(doc: &'a Document<'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    doc.descendants()
        .filter(move |node| node.is_element() && node.tag_name().name() == name)
}

/// Element children (direct) with the given local name.
pub fn children<'a, 'i>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

/// Element descendants of a node with the given local name.
pub fn descendants<'a, 'i>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.descendants()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

/// Concatenated text content of a node.
pub fn text(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        if descendant.is_text() {
            out.push_str(descendant.text().unwrap_or(""));
        }
    }
    out
}

/// Parse the `{uri}#start={line},{offset}` fragment the check run appends to
/// message URIs. Returns (bare uri, line, offset).
pub fn split_start_fragment(uri: &str) -> (String, u32, u32) {
    if let Some((bare, fragment)) = uri.split_once("#start=") {
        let mut parts = fragment.split(',');
        let line = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let offset = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        return (bare.to_string(), line, offset);
    }
    (uri.to_string(), 0, 0)
}
