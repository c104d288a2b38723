//! Owned XML nodes

/// A node in the XML tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An element with attributes and children
    Element(Element),
    /// Unescaped character data
    Text(String),
    /// Markup preserved verbatim (comments, processing instructions)
    Raw(String),
}

impl Node {
    /// Borrow the element if this node is one
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Mutably borrow the element if this node is one
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An XML element with its qualified name kept literally (e.g. `w:p`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Qualified name as written in the source
    pub name: String,
    /// Attributes in source order, values unescaped
    pub attrs: Vec<(String, String)>,
    /// Child nodes in source order
    pub children: Vec<Node>,
}

impl Element {
    /// Create an element without attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child appender
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style text appender
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Local part of the qualified name
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Whether this element has the given qualified name
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Look up an attribute value by qualified name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute, keeping its position if it already exists
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Shorthand for the ubiquitous `w:val` attribute
    pub fn val(&self) -> Option<&str> {
        self.attr("w:val")
    }

    /// Iterate over child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Iterate mutably over child elements
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Iterate over child elements with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |el| el.name == name)
    }

    /// Iterate mutably over child elements with the given name
    pub fn children_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> {
        self.elements_mut().filter(move |el| el.name == name)
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// First child element with the given name, mutably
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.name == name)
    }

    /// Position of the first child element with the given name among all children
    pub fn child_position(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, Node::Element(el) if el.name == name))
    }

    /// First descendant (depth-first, pre-order) with the given name
    pub fn find(&self, name: &str) -> Option<&Element> {
        for el in self.elements() {
            if el.name == name {
                return Some(el);
            }
            if let Some(found) = el.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given name in document order
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for el in self.elements() {
            if el.name == name {
                out.push(el);
            }
            el.collect_named(name, out);
        }
    }

    /// Visit every descendant element mutably in document order
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        for el in self.elements_mut() {
            f(el);
            el.visit_mut(f);
        }
    }

    /// Whether any descendant has the given name
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Remove all direct children with the given name
    pub fn remove_children_named(&mut self, name: &str) {
        self.children
            .retain(|n| !matches!(n, Node::Element(el) if el.name == name));
    }

    /// Concatenated character data of direct text children
    pub fn own_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Concatenated text of every `w:t` descendant
    pub fn w_text(&self) -> String {
        let mut out = String::new();
        self.push_w_text(&mut out);
        out
    }

    fn push_w_text(&self, out: &mut String) {
        for el in self.elements() {
            if el.name == "w:t" {
                out.push_str(&el.own_text());
            } else {
                el.push_w_text(out);
            }
        }
    }

    /// Serialize this element to a string
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        super::writer::write_element(self, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new("w:p")
            .with_child(Element::new("w:pPr").with_child(Element::new("w:pStyle").with_attr("w:val", "Heading1")))
            .with_child(Element::new("w:r").with_child(Element::new("w:t").with_text("Intro")))
            .with_child(Element::new("w:r").with_child(Element::new("w:t").with_text("duction")))
    }

    #[test]
    fn test_w_text_concatenates_runs() {
        assert_eq!(sample().w_text(), "Introduction");
    }

    #[test]
    fn test_find_descends_depth_first() {
        let p = sample();
        let style = p.find("w:pStyle").expect("pStyle present");
        assert_eq!(style.val(), Some("Heading1"));
        assert_eq!(p.descendants_named("w:t").len(), 2);
    }

    #[test]
    fn test_set_attr_keeps_position() {
        let mut el = Element::new("w:ind")
            .with_attr("w:left", "720")
            .with_attr("w:hanging", "360");
        el.set_attr("w:left", "1440");
        assert_eq!(el.attrs[0], ("w:left".to_string(), "1440".to_string()));
        assert_eq!(el.attrs.len(), 2);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(Element::new("w:tbl").local_name(), "tbl");
        assert_eq!(Element::new("plain").local_name(), "plain");
    }
}
