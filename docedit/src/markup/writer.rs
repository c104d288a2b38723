//! Serialization of the owned tree and body re-rendering

use super::error::MarkupError;
use super::node::{Element, Node};
use super::reader::XmlDocument;
use quick_xml::escape::{escape, partial_escape};

/// One slot of a re-rendered body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPart {
    /// Copy body child `n` byte-for-byte from the source
    Original(usize),
    /// Serialize a new or modified node
    New(Node),
}

/// Append the serialized form of `el` to `out`
pub fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in &el.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(el) => write_element(el, out),
        Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
        Node::Raw(raw) => out.push_str(raw),
    }
}

impl XmlDocument {
    /// Render the part with its body replaced by `parts`
    ///
    /// Everything outside the body, and every `Original` child, is copied
    /// from the source text unchanged.
    pub fn render_body(&self, parts: &[BodyPart]) -> Result<String, MarkupError> {
        let layout = self.body_layout().ok_or(MarkupError::MissingBody)?;
        let source = self.source();
        let mut out = String::with_capacity(source.len());
        out.push_str(&source[..layout.open_end]);
        for part in parts {
            match part {
                BodyPart::Original(index) => {
                    let span = layout
                        .children
                        .get(*index)
                        .ok_or(MarkupError::UnknownBodyChild(*index))?;
                    out.push_str(&source[span.clone()]);
                }
                BodyPart::New(node) => write_node(node, &mut out),
            }
        }
        out.push_str(&source[layout.close_start..]);
        Ok(out)
    }

    /// Parts that reproduce the body unchanged
    pub fn original_parts(&self) -> Vec<BodyPart> {
        let count = self.body_layout().map_or(0, |l| l.children.len());
        (0..count).map(BodyPart::Original).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::reader::parse;
    use super::*;

    const DOC: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\r\n",
        r#"<w:document xmlns:w="urn:w"><w:body>"#,
        r#"<w:p w:rsidR="00AB"><w:r><w:t>A &#x26; B</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>second</w:t></w:r></w:p>"#,
        "</w:body></w:document>"
    );

    #[test]
    fn test_identity_render_is_byte_equal() {
        // Arrange
        let doc = parse(DOC).unwrap();

        // Act
        let rendered = doc.render_body(&doc.original_parts()).unwrap();

        // Assert
        assert_eq!(rendered, DOC);
    }

    #[test]
    fn test_new_part_is_serialized_and_neighbours_kept() {
        let doc = parse(DOC).unwrap();
        let p = Element::new("w:p").with_child(
            Element::new("w:r").with_child(Element::new("w:t").with_text("x < y & z")),
        );
        let rendered = doc
            .render_body(&[BodyPart::Original(0), BodyPart::New(Node::Element(p))])
            .unwrap();
        assert!(rendered.contains(r#"<w:t>A &#x26; B</w:t>"#));
        assert!(rendered.contains("<w:t>x &lt; y &amp; z</w:t>"));
        assert!(!rendered.contains("second"));
    }

    #[test]
    fn test_unknown_original_index_is_error() {
        let doc = parse(DOC).unwrap();
        let err = doc.render_body(&[BodyPart::Original(9)]).unwrap_err();
        assert_eq!(err, MarkupError::UnknownBodyChild(9));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let el = Element::new("w:instrText").with_attr("w:note", "a\"b<c");
        assert_eq!(el.to_xml(), r#"<w:instrText w:note="a&quot;b&lt;c"/>"#);
    }
}
