//! Load, query and save USB VIF documents using quick-xml.
//!
//! Documents are parsed into a small element tree that keeps comments,
//! attribute order and namespace URIs. Whitespace-only text between elements
//! is dropped on load and regenerated with two-space indentation on save, so
//! merged subtrees line up with the rest of the document.

mod tree;
mod write;

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

pub use tree::{Attribute, Document, Element, Node, QName};
pub use write::{save_document, write_document};

/// USB-IF Vendor Info File namespace.
pub const VIF_NS: &str = "http://usb.org/VendorInfoFile.xsd";
/// XML Schema instance namespace.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// VIF optional-content namespace used for vendor extensions.
pub const OPT_NS: &str = "http://usb.org/VendorInfoFileOptionalContent.xsd";
/// Namespace implicitly bound to the `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefixes declared on the root of every written document, in declaration
/// order.
pub const REGISTERED_PREFIXES: &[(&str, &str)] =
    &[("vif", VIF_NS), ("xsi", XSI_NS), ("opt", OPT_NS)];

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml: {0}")]
    Xml(String),
    #[error("invalid document: {0}")]
    Invalid(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

type Scopes = Vec<Vec<(String, String)>>;

/// Read and parse an XML document from disk.
pub fn load_document(path: impl AsRef<Path>) -> Result<Document, XmlError> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)?;
    let document = parse_document(&xml)?;
    debug!(path = %path.display(), bytes = xml.len(), "loaded XML document");
    Ok(document)
}

/// Parse an XML document, resolving namespace prefixes to URIs.
pub fn parse_document(xml: &str) -> Result<Document, XmlError> {
    let mut reader = Reader::from_str(xml);
    let mut scopes: Scopes = Vec::new();
    let mut open: Vec<Element> = Vec::new();
    let mut prolog = Vec::new();
    let mut epilog = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                return Err(XmlError::Xml(format!(
                    "{err} (at byte {})",
                    reader.buffer_position()
                )))
            }
        };
        match event {
            Event::Start(start) => {
                let element = open_element(&start, &mut scopes)?;
                open.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, &mut scopes)?;
                scopes.pop();
                attach(element, &mut open, &mut root)?;
            }
            Event::End(_) => {
                scopes.pop();
                let element = open
                    .pop()
                    .ok_or_else(|| XmlError::Xml("unexpected closing tag".into()))?;
                attach(element, &mut open, &mut root)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|err| XmlError::Xml(err.to_string()))?;
                // Indentation is regenerated on save.
                if !text.trim().is_empty() {
                    push_text(text.into_owned(), &mut open)?;
                }
            }
            Event::CData(data) => {
                push_text(String::from_utf8_lossy(&data).into_owned(), &mut open)?;
            }
            Event::Comment(comment) => {
                let body = String::from_utf8_lossy(&comment).into_owned();
                match open.last_mut() {
                    Some(parent) => parent.push_comment(body),
                    None if root.is_none() => prolog.push(Node::Comment(body)),
                    None => epilog.push(Node::Comment(body)),
                }
            }
            Event::Eof => break,
            // The declaration is rewritten on save; PIs and DOCTYPE are dropped.
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(XmlError::Xml(format!(
            "unexpected end of document inside <{}>",
            unclosed.name.local
        )));
    }
    let root = root.ok_or_else(|| XmlError::Invalid("document has no root element".into()))?;
    debug!(
        root = %root.name.local,
        prolog_comments = prolog.len(),
        epilog_comments = epilog.len(),
        "parsed XML document"
    );
    Ok(Document {
        prolog,
        root,
        epilog,
    })
}

fn open_element(start: &BytesStart<'_>, scopes: &mut Scopes) -> Result<Element, XmlError> {
    let mut declared = Vec::new();
    let mut raw_attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| XmlError::Xml(err.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| XmlError::Xml(err.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::Xml(err.to_string()))?
            .into_owned();
        if key == "xmlns" {
            declared.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value));
        } else {
            raw_attributes.push((key, value));
        }
    }
    scopes.push(declared);

    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|err| XmlError::Xml(err.to_string()))?
        .to_string();
    let name = resolve_name(scopes, &raw_name, true)?;
    let attributes = raw_attributes
        .into_iter()
        .map(|(key, value)| {
            Ok(Attribute {
                name: resolve_name(scopes, &key, false)?,
                value,
            })
        })
        .collect::<Result<Vec<_>, XmlError>>()?;
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn resolve_name(scopes: &Scopes, raw: &str, is_element: bool) -> Result<QName, XmlError> {
    let (prefix, local) = raw.split_once(':').unwrap_or(("", raw));
    if prefix.is_empty() && !is_element {
        return Ok(QName::unqualified(local));
    }
    if prefix == "xml" {
        return Ok(QName::new(XML_NS, local));
    }
    match lookup_namespace(scopes, prefix) {
        Some(uri) if !uri.is_empty() => Ok(QName::new(uri, local)),
        _ if prefix.is_empty() => Ok(QName::unqualified(local)),
        _ => Err(XmlError::Invalid(format!(
            "unbound namespace prefix '{prefix}' in '{raw}'"
        ))),
    }
}

fn lookup_namespace<'a>(scopes: &'a Scopes, prefix: &str) -> Option<&'a str> {
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter().rev())
        .find(|(declared, _)| declared == prefix)
        .map(|(_, uri)| uri.as_str())
}

fn push_text(text: String, open: &mut [Element]) -> Result<(), XmlError> {
    match open.last_mut() {
        Some(parent) => {
            parent.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::Invalid(
            "character data outside the root element".into(),
        )),
    }
}

fn attach(
    element: Element,
    open: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    if let Some(parent) = open.last_mut() {
        parent.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::Invalid("multiple root elements".into()));
    }
    *root = Some(element);
    Ok(())
}
