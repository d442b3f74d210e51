//! Owned, mutable XML element tree
//!
//! Built from `quick-xml` reader events and written back with its writer.
//! Elements are addressed by index paths (child positions from the root) so a
//! caller can locate nodes immutably and then edit them through `element_mut`.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// XML tree errors
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Document has no root element")]
    NoRoot,

    #[error("Unexpected closing tag </{0}>")]
    UnexpectedEnd(String),

    #[error("Unclosed element <{0}>")]
    Unclosed(String),
}

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError::Malformed(e.to_string())
    }
}

/// Child node of an element (or of the document outside the root)
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data
    Text(String),
    CData(String),
    /// Raw comment body
    Comment(String),
    /// Raw processing instruction body
    ProcessingInstruction(String),
    /// Raw doctype body
    DocType(String),
}

/// Element with qualified name, ordered attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name as written (`prefix:local` or `local`)
    pub name: String,
    /// Attributes in document order, values unescaped
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Namespace prefix, if the name has one
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Build a sibling name carrying this element's prefix
    pub fn prefixed(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set or replace an attribute
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute, returning whether it was present
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(key, _)| key != name);
        self.attributes.len() != before
    }

    /// Direct child elements
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Indices (into `children`) of direct child elements with the given local name
    pub fn child_indices(&self, local_name: &str) -> Vec<usize> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match node {
                Node::Element(e) if e.local_name() == local_name => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn child_element_mut(&mut self, index: usize) -> Option<&mut Element> {
        match self.children.get_mut(index) {
            Some(Node::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// Concatenated text of this element and its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.clear();
        self.children.push(Node::Text(text.into()));
    }

    /// Element at an index path relative to this element
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get(index)? {
                Node::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get_mut(index)? {
                Node::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Index paths of this element and all descendants matching `pred`, in document order
    pub fn find_paths<F>(&self, pred: F) -> Vec<Vec<usize>>
    where
        F: Fn(&Element) -> bool,
    {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        collect_paths(self, &pred, &mut prefix, &mut out);
        out
    }

    /// This element and all descendants with the given local name, in document order
    pub fn descendants_named<'a>(&'a self, local_name: &str) -> Vec<&'a Element> {
        self.find_paths(|e| e.local_name() == local_name)
            .iter()
            .filter_map(|path| self.element_at(path))
            .collect()
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut element = Element::new(lossy(start.name().as_ref()));

        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
            let key = lossy(attr.key.as_ref());
            let value = attr.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }

        Ok(element)
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(t) | Node::CData(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
            _ => {}
        }
    }
}

fn collect_paths<F>(element: &Element, pred: &F, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>)
where
    F: Fn(&Element) -> bool,
{
    if pred(element) {
        out.push(prefix.clone());
    }

    for (i, child) in element.children.iter().enumerate() {
        if let Node::Element(e) = child {
            prefix.push(i);
            collect_paths(e, pred, prefix, out);
            prefix.pop();
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parsed XML document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Comments, processing instructions and doctype before the root
    pub prolog: Vec<Node>,
    pub root: Element,
    /// Comments and processing instructions after the root
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

    /// Parse a complete document
    ///
    /// The XML declaration is dropped; serialization always emits a UTF-8 one.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let node = match reader.read_event()? {
                Event::Start(e) => {
                    stack.push(Element::from_start(&e)?);
                    continue;
                }
                Event::End(e) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::UnexpectedEnd(lossy(e.name().as_ref())))?;
                    Node::Element(element)
                }
                Event::Empty(e) => Node::Element(Element::from_start(&e)?),
                Event::Text(e) => Node::Text(e.unescape()?.into_owned()),
                Event::CData(e) => Node::CData(lossy(&e.into_inner())),
                Event::Comment(e) => Node::Comment(lossy(&e.into_inner())),
                Event::PI(e) => Node::ProcessingInstruction(lossy(&e.into_inner())),
                Event::DocType(e) => Node::DocType(lossy(&e.into_inner())),
                Event::Decl(_) => continue,
                Event::Eof => break,
            };

            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
                continue;
            }

            match node {
                Node::Element(element) => {
                    if root.is_some() {
                        return Err(XmlError::Malformed("multiple root elements".to_string()));
                    }
                    root = Some(element);
                }
                // Whitespace between top-level constructs is not kept
                Node::Text(t) if t.trim().is_empty() => {}
                Node::Text(t) => {
                    return Err(XmlError::Malformed(format!(
                        "text outside of root element: {}",
                        t.trim()
                    )));
                }
                other => {
                    if root.is_none() {
                        prolog.push(other);
                    } else {
                        epilog.push(other);
                    }
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Unclosed(open.name.clone()));
        }

        let root = root.ok_or(XmlError::NoRoot)?;

        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// Serialize as UTF-8 with an XML declaration
    pub fn to_bytes(&self) -> Result<Vec<u8>, XmlError> {
        let mut writer = Writer::new(Vec::new());

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;

        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }

        Ok(writer.into_inner())
    }

    pub fn element(&self, path: &[usize]) -> Option<&Element> {
        self.root.element_at(path)
    }

    pub fn element_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        self.root.element_at_mut(path)
    }

    /// Index paths of all elements with the given local name
    pub fn paths_named(&self, local_name: &str) -> Vec<Vec<usize>> {
        self.root.find_paths(|e| e.local_name() == local_name)
    }

    /// All elements with the given local name, in document order
    pub fn elements_named<'a>(&'a self, local_name: &str) -> Vec<&'a Element> {
        self.root.descendants_named(local_name)
    }

    /// Text of the first element with the given local name
    pub fn first_text(&self, local_name: &str) -> Option<String> {
        self.elements_named(local_name)
            .first()
            .map(|e| e.text().trim().to_string())
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), XmlError> {
    match node {
        Node::Element(e) => write_element(writer, e)?,
        Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        Node::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str())))?,
        Node::Comment(t) => writer.write_event(Event::Comment(BytesText::from_escaped(t.as_str())))?,
        Node::ProcessingInstruction(t) => {
            writer.write_event(Event::PI(BytesText::from_escaped(t.as_str())))?
        }
        Node::DocType(t) => writer.write_event(Event::DocType(BytesText::from_escaped(t.as_str())))?,
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- exported -->
<foxml:digitalObject xmlns:foxml="info:fedora/fedora-system:def/foxml#" PID="uuid:1" FEDORA_URI="info:fedora/uuid:1">
  <foxml:datastream ID="IMG_FULL" CONTROL_GROUP="M">
    <foxml:datastreamVersion ID="IMG_FULL.0" SIZE="12"><foxml:binaryContent>AAEC</foxml:binaryContent></foxml:datastreamVersion>
  </foxml:datastream>
  <note>a &amp; b</note>
</foxml:digitalObject>
"#;

    #[test]
    fn test_parse_names_and_attributes() {
        let doc = Document::parse(SAMPLE).unwrap();

        assert_eq!(doc.root.name, "foxml:digitalObject");
        assert_eq!(doc.root.local_name(), "digitalObject");
        assert_eq!(doc.root.prefix(), Some("foxml"));
        assert_eq!(doc.root.attr("PID"), Some("uuid:1"));
        assert_eq!(doc.prolog.len(), 1);
        assert_eq!(doc.first_text("note").as_deref(), Some("a & b"));
    }

    #[test]
    fn test_paths_address_nested_elements() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        let paths = doc.paths_named("datastreamVersion");
        assert_eq!(paths.len(), 1);

        let version = doc.element_mut(&paths[0]).unwrap();
        assert_eq!(version.attr("ID"), Some("IMG_FULL.0"));
        assert!(version.remove_attr("SIZE"));
        assert!(!version.remove_attr("SIZE"));
    }

    #[test]
    fn test_serialization_escapes_and_reparses() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        doc.root.set_attr("LABEL", "x < y \"quoted\"");

        let bytes = doc.to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("a &amp; b"));

        let reparsed = Document::parse(&text).unwrap();
        assert_eq!(reparsed.root.attr("LABEL"), Some("x < y \"quoted\""));
        assert_eq!(reparsed.root, doc.root);
    }

    #[test]
    fn test_unclosed_element_is_error() {
        assert!(Document::parse("<a><b></b>").is_err());
    }

    #[test]
    fn test_empty_input_has_no_root() {
        assert!(matches!(Document::parse("  "), Err(XmlError::NoRoot)));
    }
}
