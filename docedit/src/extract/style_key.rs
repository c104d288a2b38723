//! Deterministic formatting fingerprints
//!
//! `<w:spacing w:after="200" w:line="276"/>` becomes `spacing-after200_line276`,
//! `<w:jc w:val="center"/>` becomes `jc-center`, and toggles switched off
//! (`<w:b w:val="0"/>`) disappear. Children are sorted by tag so markup order
//! never changes a key.

use crate::markup::Element;
use itertools::Itertools;

/// Toggle properties whose `w:val="0"` form means "absent"
const BOOLEAN_TAGS: &[&str] = &["b", "bCs", "i", "iCs", "strike", "dstrike", "caps", "smallCaps"];

fn is_switched_off(el: &Element) -> bool {
    BOOLEAN_TAGS.contains(&el.local_name())
        && matches!(el.val(), Some("0") | Some("false"))
        && el.attrs.len() == 1
        && el.elements().next().is_none()
}

/// Fingerprint of one property element, `None` when it should be skipped
pub fn element_key_part(el: &Element) -> Option<String> {
    if is_switched_off(el) {
        return None;
    }

    let attrs = el
        .attrs
        .iter()
        .filter(|(name, _)| !name.starts_with("xmlns"))
        .map(|(name, value)| {
            let local = name.rsplit(':').next().unwrap_or(name);
            (local, value)
        })
        .sorted_by(|a, b| a.0.cmp(b.0))
        .map(|(local, value)| {
            if local == "val" {
                value.clone()
            } else {
                format!("{}{}", local, value)
            }
        });
    let children = el
        .elements()
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .filter_map(element_key_part);
    let parts: Vec<String> = attrs.chain(children).collect();

    if parts.is_empty() {
        Some(el.local_name().to_string())
    } else {
        Some(format!("{}-{}", el.local_name(), parts.join("_")))
    }
}

/// `w:pStyle` of a paragraph, if set
pub fn paragraph_style_id(p: &Element) -> Option<&str> {
    p.child("w:pPr")
        .and_then(|p_pr| p_pr.child("w:pStyle"))
        .and_then(Element::val)
}

/// Paragraph style key: `{style}` or `{style}_{sorted pPr parts}`
///
/// Run properties nested in `w:pPr` (the paragraph mark) do not take part.
pub fn paragraph_style_key(p: &Element, default_style: &str) -> String {
    let style = paragraph_style_id(p).unwrap_or(default_style);
    let parts = p
        .child("w:pPr")
        .map(|p_pr| {
            p_pr.elements()
                .filter(|el| !el.is("w:pStyle") && !el.is("w:rPr"))
                .sorted_by(|a, b| a.name.cmp(&b.name))
                .filter_map(element_key_part)
                .join("_")
        })
        .unwrap_or_default();
    if parts.is_empty() {
        style.to_string()
    } else {
        format!("{}_{}", style, parts)
    }
}

/// Run style key from `w:rPr`, `default` when the run has no properties
pub fn run_key(run: &Element) -> String {
    let parts = run
        .child("w:rPr")
        .map(|r_pr| {
            r_pr.elements()
                .sorted_by(|a, b| a.name.cmp(&b.name))
                .filter_map(element_key_part)
                .join("_")
        })
        .unwrap_or_default();
    if parts.is_empty() {
        "default".to_string()
    } else {
        parts
    }
}

/// Human-readable run formatting such as `bold, size:28, font:Arial`
pub fn describe_run(run: &Element) -> String {
    let Some(r_pr) = run.child("w:rPr") else {
        return "default".to_string();
    };

    let mut descriptions = Vec::new();
    for child in r_pr.elements().sorted_by(|a, b| a.name.cmp(&b.name)) {
        let val = child.val().unwrap_or_default();
        match child.local_name() {
            "b" if !is_switched_off(child) => descriptions.push("bold".to_string()),
            "i" if !is_switched_off(child) => descriptions.push("italic".to_string()),
            "b" | "i" | "szCs" | "lang" => {}
            "u" => descriptions.push(format!("underline:{}", child.val().unwrap_or("single"))),
            "sz" => descriptions.push(format!("size:{}", val)),
            "color" => descriptions.push(format!("color:{}", val)),
            "highlight" => descriptions.push(format!("highlight:{}", val)),
            "rStyle" => descriptions.push(format!("rStyle:{}", val)),
            "rFonts" => {
                let font = child
                    .attr("w:ascii")
                    .filter(|f| !f.is_empty())
                    .or_else(|| child.attr("w:eastAsia").filter(|f| !f.is_empty()));
                if let Some(font) = font {
                    descriptions.push(format!("font:{}", font));
                }
            }
            tag if val.is_empty() => descriptions.push(tag.to_string()),
            tag => descriptions.push(format!("{}:{}", tag, val)),
        }
    }

    if descriptions.is_empty() {
        "default".to_string()
    } else {
        descriptions.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_element;

    fn el(xml: &str) -> Element {
        parse_element(xml).unwrap()
    }

    #[test]
    fn test_key_parts() {
        assert_eq!(
            element_key_part(&el(r#"<w:jc w:val="center"/>"#)).as_deref(),
            Some("jc-center")
        );
        assert_eq!(
            element_key_part(&el(r#"<w:spacing w:line="276" w:after="200"/>"#)).as_deref(),
            Some("spacing-after200_line276")
        );
        assert_eq!(
            element_key_part(&el(r#"<w:numPr><w:numId w:val="1"/><w:ilvl w:val="0"/></w:numPr>"#))
                .as_deref(),
            Some("numPr-ilvl-0_numId-1")
        );
        assert_eq!(element_key_part(&el("<w:b/>")).as_deref(), Some("b"));
        assert_eq!(element_key_part(&el(r#"<w:b w:val="0"/>"#)), None);
        assert_eq!(element_key_part(&el(r#"<w:i w:val="false"/>"#)), None);
    }

    #[test]
    fn test_paragraph_style_key_is_order_independent() {
        // Arrange
        let a = el(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:spacing w:after="0"/><w:jc w:val="center"/><w:rPr><w:b/></w:rPr></w:pPr></w:p>"#);
        let b = el(r#"<w:p><w:pPr><w:jc w:val="center"/><w:pStyle w:val="Heading1"/><w:spacing w:after="0"/></w:pPr></w:p>"#);

        // Act
        let key_a = paragraph_style_key(&a, "Normal");
        let key_b = paragraph_style_key(&b, "Normal");

        // Assert
        assert_eq!(key_a, "Heading1_jc-center_spacing-after0");
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn test_paragraph_without_properties_uses_default_style() {
        assert_eq!(paragraph_style_key(&el("<w:p/>"), "Normal"), "Normal");
        assert_eq!(paragraph_style_id(&el("<w:p/>")), None);
    }

    #[test]
    fn test_run_keys_and_descriptions() {
        let plain = el("<w:r><w:t>x</w:t></w:r>");
        let styled = el(
            r#"<w:r><w:rPr><w:sz w:val="28"/><w:b/><w:rFonts w:ascii="Arial"/><w:lang w:val="en-US"/><w:vertAlign w:val="superscript"/></w:rPr><w:t>x</w:t></w:r>"#,
        );
        let unbolded = el(r#"<w:r><w:rPr><w:b w:val="0"/></w:rPr></w:r>"#);

        assert_eq!(run_key(&plain), "default");
        assert_eq!(describe_run(&plain), "default");
        assert_eq!(run_key(&unbolded), "default");
        assert_eq!(describe_run(&unbolded), "default");
        assert_eq!(
            describe_run(&styled),
            "bold, font:Arial, size:28, vertAlign:superscript"
        );
        assert_eq!(run_key(&styled), "b_lang-en-US_rFonts-asciiArial_sz-28_vertAlign-superscript");
    }
}
