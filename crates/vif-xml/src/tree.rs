//! In-memory element tree with namespace-resolved names.

use crate::{OPT_NS, VIF_NS};

/// Element or attribute name resolved against its namespace URI.
///
/// Prefixes are not part of the name; they are assigned again when the tree
/// is written so that registered namespaces always use their registered
/// prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI, `None` for names outside any namespace.
    pub namespace: Option<String>,
    /// Local part of the name.
    pub local: String,
}

impl QName {
    /// Name bound to the given namespace URI.
    pub fn new(namespace: &str, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            local: local.into(),
        }
    }

    /// Name without a namespace, as used by plain attributes.
    pub fn unqualified(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Name in the VIF namespace (`vif:` prefix).
    pub fn vif(local: impl Into<String>) -> Self {
        Self::new(VIF_NS, local)
    }

    /// Name in the optional-content namespace (`opt:` prefix).
    pub fn opt(local: impl Into<String>) -> Self {
        Self::new(OPT_NS, local)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Child node of an element or of the document prolog/epilog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data with entities already unescaped.
    Text(String),
    /// Comment body, stored verbatim without the `<!--`/`-->` delimiters.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`Element::set_attribute`].
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder form of [`Element::push_text`].
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    /// Builder form of [`Element::push`].
    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    /// Replace the value of an existing attribute or append a new one.
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| &attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Append character data. Empty strings are ignored.
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.children.push(Node::Text(text));
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_comment(&mut self, comment: impl Into<String>) {
        self.children.push(Node::Comment(comment.into()));
    }

    /// Concatenated character data of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Direct child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &QName) -> Option<&Element> {
        self.elements().find(|element| &element.name == name)
    }

    pub fn child_mut(&mut self, name: &QName) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if &element.name == name => Some(element),
            _ => None,
        })
    }

    /// All descendant elements with the given name, in document (pre-)order.
    /// The element itself is not included.
    pub fn descendants(&self, name: &QName) -> Vec<&Element> {
        let mut found = Vec::new();
        collect_descendants(self, name, &mut found);
        found
    }

    /// First descendant element with the given name.
    pub fn descendant(&self, name: &QName) -> Option<&Element> {
        for child in self.elements() {
            if &child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// Child-node index paths of every descendant with the given name, in
    /// the same order as [`Element::descendants`].
    ///
    /// Paths stay valid while nodes are only appended, so they can be taken
    /// before a batch of edits and resolved with [`Element::element_at_mut`].
    pub fn descendant_paths(&self, name: &QName) -> Vec<Vec<usize>> {
        let mut found = Vec::new();
        collect_paths(self, name, &mut Vec::new(), &mut found);
        found
    }

    /// Element reached by following child-node indices from `self`.
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get_mut(index) {
                Some(Node::Element(child)) => child,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn collect_paths(
    element: &Element,
    name: &QName,
    path: &mut Vec<usize>,
    found: &mut Vec<Vec<usize>>,
) {
    for (index, node) in element.children.iter().enumerate() {
        if let Node::Element(child) = node {
            path.push(index);
            if &child.name == name {
                found.push(path.clone());
            }
            collect_paths(child, name, path, found);
            path.pop();
        }
    }
}

fn collect_descendants<'a>(element: &'a Element, name: &QName, found: &mut Vec<&'a Element>) {
    for child in element.elements() {
        if &child.name == name {
            found.push(child);
        }
        collect_descendants(child, name, found);
    }
}

/// A parsed XML document: the root element plus the comments around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Comments preceding the root element.
    pub prolog: Vec<Node>,
    pub root: Element,
    /// Comments following the root element.
    pub epilog: Vec<Node>,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }
}
