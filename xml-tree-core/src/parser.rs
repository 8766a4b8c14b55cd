use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

use crate::tree::XmlNode;

/// Errors that can occur while loading XML into an [`XmlNode`] tree.
///
/// File-level failures are reported before any parsing is attempted, so each
/// variant identifies a distinct cause.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input path does not exist.
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Input path exists but is a directory or other non-file object.
    #[error("input path is not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
    /// Input file exists but could not be read.
    #[error("failed to read input file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Input file is empty or contains only whitespace.
    #[error("input file is empty: {}", .0.display())]
    Empty(PathBuf),
    /// Input is not well-formed XML.
    #[error("XML syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    /// quick-xml failed while decoding an already tokenized event.
    #[error("failed to decode XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Input bytes were not valid UTF-8 for tag/attribute/text extraction.
    #[error("invalid UTF-8 while parsing XML: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// Failed to decode text entity or bytes.
    #[error("failed to decode XML text: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
}

/// Parse XML bytes into an [`XmlNode`] tree.
pub fn parse(xml: &[u8]) -> Result<XmlNode, ParseError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(err) => {
                return Err(syntax_error(
                    xml,
                    reader.buffer_position() as usize,
                    err.to_string(),
                ))
            }
        };
        match event {
            Event::Start(e) => {
                let node = build_node_start(&e, &reader, xml)?;
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = build_node_start(&e, &reader, xml)?;
                attach(node, &mut stack, &mut root, xml, &reader)?;
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape()?.into_owned();
                    append_text(current, text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = std::str::from_utf8(e.as_ref())?.to_string();
                    append_text(current, text);
                }
            }
            Event::End(_) => {
                let Some(node) = stack.pop() else {
                    return Err(syntax_error(
                        xml,
                        reader.buffer_position() as usize,
                        "encountered closing tag without open tag".to_string(),
                    ));
                };
                attach(node, &mut stack, &mut root, xml, &reader)?;
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(syntax_error(
            xml,
            xml.len(),
            format!("unclosed element <{}> at end of document", open.tag),
        ));
    }

    root.ok_or_else(|| syntax_error(xml, xml.len(), "no root element found".to_string()))
}

/// Load and parse an XML file into an [`XmlNode`] tree.
///
/// Fails with a distinct [`ParseError`] variant for a missing path, a path
/// that is not a file, an unreadable file, an empty file, and malformed XML.
pub fn parse_file(path: &Path) -> Result<XmlNode, ParseError> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ParseError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ParseError::Unreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if !meta.is_file() {
        return Err(ParseError::NotAFile(path.to_path_buf()));
    }

    let bytes = fs::read(path).map_err(|source| ParseError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty(path.to_path_buf()));
    }
    parse(&bytes)
}

fn attach(
    node: XmlNode,
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    xml: &[u8],
    reader: &Reader<&[u8]>,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    } else {
        return Err(syntax_error(
            xml,
            reader.buffer_position() as usize,
            "multiple top-level elements found".to_string(),
        ));
    }
    Ok(())
}

fn append_text(node: &mut XmlNode, text: String) {
    if text.trim().is_empty() {
        return;
    }
    match &mut node.text {
        Some(existing) => existing.push_str(&text),
        None => node.text = Some(text),
    }
}

fn build_node_start(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
    xml: &[u8],
) -> Result<XmlNode, ParseError> {
    let tag = qname_to_string(e.name())?;
    let mut node = XmlNode::new(tag);

    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            syntax_error(xml, reader.buffer_position() as usize, err.to_string())
        })?;
        let key = qname_to_string(attr.key)?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| {
                syntax_error(xml, reader.buffer_position() as usize, err.to_string())
            })?
            .into_owned();
        node.attributes.insert(key, value);
    }

    Ok(node)
}

fn qname_to_string(name: QName<'_>) -> Result<String, ParseError> {
    Ok(std::str::from_utf8(name.as_ref())?.to_string())
}

/// Build a [`ParseError::Syntax`] with a 1-based line/column for `offset`.
fn syntax_error(xml: &[u8], offset: usize, message: String) -> ParseError {
    let offset = offset.min(xml.len());
    let consumed = &xml[..offset];
    let line = consumed.iter().filter(|b| **b == b'\n').count() + 1;
    let column = match consumed.iter().rposition(|b| *b == b'\n') {
        Some(newline) => offset - newline,
        None => offset + 1,
    };
    ParseError::Syntax {
        line,
        column,
        message,
    }
}
