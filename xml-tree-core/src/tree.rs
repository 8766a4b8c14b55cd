use std::collections::BTreeMap;

use serde::Serialize;

/// A generic XML tree node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements.
    pub children: Vec<XmlNode>,
    /// Optional text content.
    pub text: Option<String>,
}

impl XmlNode {
    /// Create a new XML node with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Return the first child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Return every descendant matching a `/`-separated relative path, in
    /// document order.
    ///
    /// An empty path matches the node itself.
    pub fn find_all(&self, path: &str) -> Vec<&XmlNode> {
        let mut current: Vec<&XmlNode> = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(move |node| node.children.iter().filter(move |c| c.tag == segment))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// Return every descendant (not including `self`) with the provided tag,
    /// depth-first in document order.
    pub fn descendants(&self, tag: &str) -> Vec<&XmlNode> {
        let mut out = Vec::new();
        collect_descendants(self, tag, &mut out);
        out
    }

    /// Attribute value, or `default` when absent.
    pub fn attr_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attributes
            .get(name)
            .map(String::as_str)
            .unwrap_or(default)
    }

    /// Trimmed text content, or `default` when the node has no non-blank text.
    pub fn text_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => default,
        }
    }

    /// Trimmed, non-empty text of every `<member>` child, in document order.
    pub fn member_texts(&self) -> Vec<String> {
        self.children
            .iter()
            .filter(|c| c.tag == "member")
            .map(|c| c.text_or("").to_string())
            .filter(|text| !text.is_empty())
            .collect()
    }
}

fn collect_descendants<'a>(node: &'a XmlNode, tag: &str, out: &mut Vec<&'a XmlNode>) {
    for child in &node.children {
        if child.tag == tag {
            out.push(child);
        }
        collect_descendants(child, tag, out);
    }
}
