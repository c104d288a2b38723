//! Streaming parser building the owned tree
//!
//! Character data and raw markup are taken from the source by byte span
//! rather than from the event payloads, so entity handling is uniform and
//! comments survive untouched.

use super::error::MarkupError;
use super::node::{Element, Node};
use super::BODY;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::Range;

/// Byte layout of the `<w:body>` element inside its source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyLayout {
    /// Offset just past the `<w:body ...>` open tag
    pub open_end: usize,
    /// Offset of the `</w:body>` close tag
    pub close_start: usize,
    /// Span of every body child node, parallel to the body element's children
    pub children: Vec<Range<usize>>,
}

/// A parsed XML part with its source retained
#[derive(Debug, Clone)]
pub struct XmlDocument {
    source: String,
    root: Element,
    body: Option<BodyLayout>,
}

impl XmlDocument {
    /// Original source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Root element
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Body layout if the part has a `<w:body>`
    pub fn body_layout(&self) -> Option<&BodyLayout> {
        self.body.as_ref()
    }

    /// The `<w:body>` element
    pub fn body(&self) -> Option<&Element> {
        self.root.find(BODY)
    }

    /// Source text of one body child
    pub fn body_child_source(&self, index: usize) -> Option<&str> {
        let layout = self.body.as_ref()?;
        let span = layout.children.get(index)?;
        self.source.get(span.clone())
    }
}

/// Parse a complete XML part
pub fn parse(source: impl Into<String>) -> Result<XmlDocument, MarkupError> {
    let source = source.into();
    let (root, body) = build_tree(&source)?;
    Ok(XmlDocument { source, root, body })
}

/// Parse a standalone element fragment (namespace prefixes are not checked)
pub fn parse_element(fragment: &str) -> Result<Element, MarkupError> {
    build_tree(fragment).map(|(root, _)| root)
}

fn syntax(position: usize, err: impl std::fmt::Display) -> MarkupError {
    MarkupError::Syntax {
        position,
        message: err.to_string(),
    }
}

fn unescape_span(source: &str, span: Range<usize>) -> Result<String, MarkupError> {
    let raw = source.get(span.clone()).unwrap_or_default();
    quick_xml::escape::unescape(raw)
        .map(|s| s.into_owned())
        .map_err(|e| syntax(span.start, e))
}

fn element_from_start(start: &BytesStart<'_>, position: usize) -> Result<Element, MarkupError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut el = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax(position, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = std::str::from_utf8(&attr.value).map_err(|e| syntax(position, e))?;
        let value = quick_xml::escape::unescape(raw).map_err(|e| syntax(position, e))?;
        el.attrs.push((key, value.into_owned()));
    }
    Ok(el)
}

/// Tracks where we are relative to the first `<w:body>`
#[derive(Default)]
struct BodyTracker {
    depth: Option<usize>,
    closed: bool,
    layout: BodyLayout,
    child_start: usize,
}

impl BodyTracker {
    fn at_child_level(&self, stack_len: usize) -> bool {
        !self.closed && self.depth == Some(stack_len)
    }

    fn into_layout(self) -> Option<BodyLayout> {
        if self.closed {
            Some(self.layout)
        } else {
            None
        }
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            // Prolog-level text and comments are only kept in the source
            if let Node::Element(el) = node {
                if root.is_none() {
                    *root = Some(el);
                }
            }
        }
    }
}

fn build_tree(source: &str) -> Result<(Element, Option<BodyLayout>), MarkupError> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut body = BodyTracker::default();

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|e| syntax(before, e))?;
        let after = reader.buffer_position() as usize;
        let child_level = body.at_child_level(stack.len());

        match event {
            Event::Start(start) => {
                let el = element_from_start(&start, before)?;
                if child_level {
                    body.child_start = before;
                }
                let opens_body = el.name == BODY && body.depth.is_none();
                stack.push(el);
                if opens_body {
                    body.depth = Some(stack.len());
                    body.layout.open_end = after;
                }
            }
            Event::Empty(start) => {
                let el = element_from_start(&start, before)?;
                if child_level {
                    body.layout.children.push(before..after);
                }
                attach(&mut stack, &mut root, Node::Element(el));
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or(MarkupError::UnbalancedTag { position: before })?;
                if !body.closed && body.depth == Some(stack.len() + 1) {
                    body.closed = true;
                    body.layout.close_start = before;
                } else if body.at_child_level(stack.len()) {
                    body.layout.children.push(body.child_start..after);
                }
                attach(&mut stack, &mut root, Node::Element(el));
            }
            Event::Text(_) | Event::GeneralRef(_) => {
                if stack.is_empty() {
                    continue;
                }
                let text = unescape_span(source, before..after)?;
                if child_level {
                    body.layout.children.push(before..after);
                }
                attach(&mut stack, &mut root, Node::Text(text));
            }
            Event::CData(_) => {
                if stack.is_empty() {
                    continue;
                }
                // <![CDATA[ ... ]]>
                let inner = source
                    .get(before + 9..after.saturating_sub(3))
                    .unwrap_or_default()
                    .to_string();
                if child_level {
                    body.layout.children.push(before..after);
                }
                attach(&mut stack, &mut root, Node::Text(inner));
            }
            Event::Comment(_) | Event::PI(_) => {
                if stack.is_empty() {
                    continue;
                }
                let raw = source.get(before..after).unwrap_or_default().to_string();
                if child_level {
                    body.layout.children.push(before..after);
                }
                attach(&mut stack, &mut root, Node::Raw(raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(MarkupError::UnexpectedEof { open: stack.len() });
    }
    let root = root.ok_or(MarkupError::NoRoot)?;
    Ok((root, body.into_layout()))
}
