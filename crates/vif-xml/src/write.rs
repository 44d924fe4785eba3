//! Serialization with registered prefixes and two-space indentation.

use std::io::Write as _;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

use crate::tree::{Document, Element, Node, QName};
use crate::{XmlError, REGISTERED_PREFIXES, XML_NS};

const INDENT: &str = "  ";

/// Serialize a document as UTF-8 XML with two-space indentation.
///
/// The registered `vif`, `xsi` and `opt` prefixes are always declared on the
/// root element; other namespaces get generated `nsN` prefixes.
pub fn write_document(document: &Document) -> Result<String, XmlError> {
    let prefixes = PrefixTable::for_document(document);
    let mut writer = Writer::new(Vec::new());
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
    )?;
    for node in &document.prolog {
        newline(&mut writer, 0)?;
        write_node(&mut writer, node, &prefixes, Some(0))?;
    }
    newline(&mut writer, 0)?;
    write_element(&mut writer, &document.root, &prefixes, Some(0), true)?;
    for node in &document.epilog {
        newline(&mut writer, 0)?;
        write_node(&mut writer, node, &prefixes, Some(0))?;
    }
    newline(&mut writer, 0)?;
    String::from_utf8(writer.into_inner()).map_err(|err| XmlError::Xml(err.to_string()))
}

/// Serialize a document and write it to `path`.
///
/// The bytes go to a temporary file in the destination directory which is
/// then renamed over `path`, so a failed save never leaves a truncated file.
pub fn save_document(document: &Document, path: impl AsRef<Path>) -> Result<(), XmlError> {
    let path = path.as_ref();
    let xml = write_document(document)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(xml.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|err| XmlError::Io(err.error))?;
    debug!(path = %path.display(), bytes = xml.len(), "saved XML document");
    Ok(())
}

struct PrefixTable {
    entries: Vec<(String, String)>,
}

impl PrefixTable {
    fn for_document(document: &Document) -> Self {
        let mut table = PrefixTable {
            entries: REGISTERED_PREFIXES
                .iter()
                .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
                .collect(),
        };
        table.register_element(&document.root);
        table
    }

    fn register_element(&mut self, element: &Element) {
        self.register(&element.name);
        for attr in &element.attributes {
            self.register(&attr.name);
        }
        for child in element.elements() {
            self.register_element(child);
        }
    }

    fn register(&mut self, name: &QName) {
        let Some(uri) = name.namespace.as_deref() else {
            return;
        };
        if uri == XML_NS || self.prefix_for(uri).is_some() {
            return;
        }
        let generated = format!("ns{}", self.entries.len() - REGISTERED_PREFIXES.len());
        self.entries.push((generated, uri.to_string()));
    }

    fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, known)| known == uri)
            .map(|(prefix, _)| prefix.as_str())
    }

    fn qualify(&self, name: &QName) -> String {
        match name.namespace.as_deref() {
            None => name.local.clone(),
            Some(XML_NS) => format!("xml:{}", name.local),
            Some(uri) => match self.prefix_for(uri) {
                Some(prefix) => format!("{prefix}:{}", name.local),
                None => name.local.clone(),
            },
        }
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|err| XmlError::Xml(err.to_string()))
}

fn newline(writer: &mut Writer<Vec<u8>>, level: usize) -> Result<(), XmlError> {
    let whitespace = format!("\n{}", INDENT.repeat(level));
    emit(writer, Event::Text(BytesText::from_escaped(whitespace)))
}

/// `level` is `None` inside mixed content, where no whitespace may be added.
fn write_node(
    writer: &mut Writer<Vec<u8>>,
    node: &Node,
    prefixes: &PrefixTable,
    level: Option<usize>,
) -> Result<(), XmlError> {
    match node {
        Node::Element(element) => write_element(writer, element, prefixes, level, false),
        Node::Text(text) => emit(writer, Event::Text(BytesText::new(text))),
        Node::Comment(body) => emit(
            writer,
            Event::Comment(BytesText::from_escaped(body.as_str())),
        ),
    }
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    prefixes: &PrefixTable,
    level: Option<usize>,
    declare_namespaces: bool,
) -> Result<(), XmlError> {
    let name = prefixes.qualify(&element.name);
    let mut start = BytesStart::new(name.as_str());
    if declare_namespaces {
        for (prefix, uri) in &prefixes.entries {
            start.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
        }
    }
    for attr in &element.attributes {
        let key = prefixes.qualify(&attr.name);
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }
    if element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }
    emit(writer, Event::Start(start))?;

    let has_text = element
        .children
        .iter()
        .any(|node| matches!(node, Node::Text(_)));
    let has_markup = element
        .children
        .iter()
        .any(|node| !matches!(node, Node::Text(_)));
    match level {
        Some(level) if has_markup && !has_text => {
            for child in &element.children {
                newline(writer, level + 1)?;
                write_node(writer, child, prefixes, Some(level + 1))?;
            }
            newline(writer, level)?;
        }
        _ => {
            for child in &element.children {
                write_node(writer, child, prefixes, None)?;
            }
        }
    }
    emit(writer, Event::End(BytesEnd::new(name.as_str())))
}
