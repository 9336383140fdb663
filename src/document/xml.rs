/*!
 * Minimal XML tree for OOXML parts.
 *
 * Parsing keeps attribute values as raw escaped bytes and keeps every
 * non-element node, so a part that is parsed and written back without edits
 * comes out equivalent to the input.
 */

use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesStart, Event};

use crate::errors::DocumentError;

/// XML declaration of a part
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDecl {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// Any node in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data
    Text(String),
    CData(String),
    Comment(String),
    /// Processing instruction body, target included
    PI(String),
    DocType(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An element with its attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// Qualified name such as `w:p`
    pub name: String,
    /// Attribute pairs; values are kept escaped
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Raw value of the attribute `key`
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Child elements, skipping text and other nodes
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// First child element named `name`
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.is(name))
    }

    /// Concatenated text of the direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) | XmlNode::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A parsed XML part
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub decl: Option<XmlDecl>,
    /// Top-level nodes in order; exactly one of them is the root element
    pub nodes: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parse `bytes`; `part` names the package part in errors
    pub fn parse(part: &str, bytes: &[u8]) -> Result<Self, DocumentError> {
        let xml_error = |message: String| DocumentError::Xml {
            part: part.to_string(),
            message,
        };

        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut decl = None;
        let mut nodes: Vec<XmlNode> = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(format!("at byte {}: {}", reader.buffer_position(), e)))?;

            let node = match event {
                Event::Eof => break,
                Event::Decl(d) => {
                    let version = d.version().map_err(|e| xml_error(e.to_string()))?;
                    decl = Some(XmlDecl {
                        version: bytes_to_string(version),
                        encoding: d.encoding().and_then(|r| r.ok()).map(bytes_to_string),
                        standalone: d.standalone().and_then(|r| r.ok()).map(bytes_to_string),
                    });
                    continue;
                }
                Event::Start(s) => {
                    stack.push(XmlElement {
                        name: bytes_to_string(s.name().as_ref()),
                        attrs: collect_attrs(&s).map_err(xml_error)?,
                        children: Vec::new(),
                    });
                    continue;
                }
                Event::End(e) => {
                    let name = bytes_to_string(e.name().as_ref());
                    match stack.pop() {
                        Some(el) if el.name == name => XmlNode::Element(el),
                        Some(el) => {
                            return Err(xml_error(format!("expected </{}>, found </{}>", el.name, name)));
                        }
                        None => return Err(xml_error(format!("unexpected </{}>", name))),
                    }
                }
                Event::Empty(s) => XmlNode::Element(XmlElement {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s).map_err(xml_error)?,
                    children: Vec::new(),
                }),
                Event::Text(t) => XmlNode::Text(t.unescape().map_err(|e| xml_error(e.to_string()))?.into_owned()),
                Event::CData(t) => XmlNode::CData(bytes_to_string(t.into_inner())),
                Event::Comment(t) => XmlNode::Comment(bytes_to_string(t.into_inner())),
                Event::PI(t) => XmlNode::PI(format!(
                    "{}{}",
                    bytes_to_string(t.target()),
                    bytes_to_string(t.content())
                )),
                Event::DocType(t) => XmlNode::DocType(bytes_to_string(t.into_inner())),
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(open) = stack.last() {
            return Err(xml_error(format!("unclosed element <{}>", open.name)));
        }
        if !nodes.iter().any(|n| matches!(n, XmlNode::Element(_))) {
            return Err(xml_error("no root element".to_string()));
        }

        Ok(Self { decl, nodes })
    }

    pub fn root(&self) -> Option<&XmlElement> {
        self.nodes.iter().find_map(XmlNode::as_element)
    }

    pub fn root_mut(&mut self) -> Option<&mut XmlElement> {
        self.nodes.iter_mut().find_map(XmlNode::as_element_mut)
    }

    /// Serialize the tree back to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let mut out = Vec::new();

        if let Some(decl) = &self.decl {
            let d = BytesDecl::new(decl.version.as_str(), decl.encoding.as_deref(), decl.standalone.as_deref());
            let mut writer = quick_xml::Writer::new(Vec::new());
            writer
                .write_event(Event::Decl(d))
                .map_err(|e| DocumentError::Xml {
                    part: "declaration".to_string(),
                    message: e.to_string(),
                })?;
            out.extend_from_slice(&writer.into_inner());
        }

        for node in &self.nodes {
            write_node(&mut out, node);
        }
        Ok(out)
    }
}

fn collect_attrs(s: &BytesStart<'_>) -> Result<Vec<(String, String)>, String> {
    let mut attrs = Vec::new();
    for attr in s.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        // Raw value: character references such as `&#13;` must survive untouched
        attrs.push((bytes_to_string(attr.key.as_ref()), bytes_to_string(attr.value.as_ref())));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

fn escape_text_into(out: &mut Vec<u8>, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            _ => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

fn write_node(out: &mut Vec<u8>, node: &XmlNode) {
    match node {
        XmlNode::Element(el) => write_element(out, el),
        XmlNode::Text(text) => escape_text_into(out, text),
        XmlNode::CData(text) => {
            out.extend_from_slice(b"<![CDATA[");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"]]>");
        }
        XmlNode::Comment(text) => {
            out.extend_from_slice(b"<!--");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"-->");
        }
        XmlNode::PI(content) => {
            out.extend_from_slice(b"<?");
            out.extend_from_slice(content.as_bytes());
            out.extend_from_slice(b"?>");
        }
        XmlNode::DocType(text) => {
            out.extend_from_slice(b"<!DOCTYPE");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b">");
        }
    }
}

fn write_element(out: &mut Vec<u8>, el: &XmlElement) {
    out.push(b'<');
    out.extend_from_slice(el.name.as_bytes());
    for (key, value) in &el.attrs {
        out.push(b' ');
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(value.as_bytes());
        out.push(b'"');
    }

    if el.children.is_empty() {
        out.extend_from_slice(b"/>");
        return;
    }

    out.push(b'>');
    for child in &el.children {
        write_node(out, child);
    }
    out.extend_from_slice(b"</");
    out.extend_from_slice(el.name.as_bytes());
    out.push(b'>');
}
