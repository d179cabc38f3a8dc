//! Minimal element tree over quick-xml
//!
//! Program reports carry every value in a `v` attribute, so the tree keeps element
//! names (without namespace prefix), attributes and children. Text content is
//! dropped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::decode::{FormatError, FormatResult};

/// XML element with attributes and child elements
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    /// Local element name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child with this name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Every child with this name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// `v` attribute of the first child with this name
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.child(name)?.attr("v")
    }

    /// Like [`Element::value_of`], failing with [`FormatError::MissingElement`]
    pub fn require(&self, name: &str) -> FormatResult<&str> {
        self.value_of(name).ok_or_else(|| {
            FormatError::MissingElement(format!("{name} (in {})", self.name))
        })
    }
}

fn element_from(start: &BytesStart<'_>) -> FormatResult<Element> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| FormatError::Xml(format!("attribute of {name}: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| FormatError::Xml(format!("attribute {key} of {name}: {e}")))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

/// Parse a document and return its root element
///
/// Bodies that are not valid UTF-8 are read as Latin-1, the encoding the
/// provider declares for these reports.
pub fn parse_document(body: &[u8]) -> FormatResult<Element> {
    let text = match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => body.iter().map(|&b| char::from(b)).collect(),
    };

    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            FormatError::Xml(format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FormatError::Xml("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(FormatError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| FormatError::Xml("empty document".to_string()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> FormatResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(FormatError::Xml("multiple root elements".to_string())),
    }
    Ok(())
}
