//! Table of contents recognition and entry parsing

use super::style_key::{element_key_part, paragraph_style_id};
use super::paragraph_runs;
use crate::markup::Element;
use crate::styles::StyleSheet;
use once_cell::sync::Lazy;
use regex::Regex;

static ENTRY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:[.\-]\d+)*[.)]?)\s*(.*)$").expect("invalid entry number regex"));

static PAGEREF_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PAGEREF\s+(\S+)").expect("invalid PAGEREF regex"));

static TOC_STYLE_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^toc\s*([1-9])$").expect("invalid TOC style regex"));

/// Whether a `w:sdt` holds a table of contents
pub fn is_toc_sdt(sdt: &Element) -> bool {
    let properties = sdt.child("w:sdtPr");
    let gallery = properties
        .and_then(|pr| pr.find("w:docPartGallery"))
        .and_then(Element::val)
        .is_some_and(|v| v.contains("Table of Contents"));
    let alias = properties
        .and_then(|pr| pr.child("w:alias"))
        .and_then(Element::val)
        .is_some_and(|v| v.to_uppercase().contains("TOC"));
    let pageref = sdt
        .child("w:sdtContent")
        .is_some_and(|content| {
            content
                .descendants_named("w:instrText")
                .iter()
                .any(|i| i.own_text().contains("PAGEREF"))
        });
    gallery || alias || pageref
}

/// Entry paragraphs of a TOC content control, in order
pub fn entry_paragraphs(sdt: &Element) -> Vec<&Element> {
    sdt.child("w:sdtContent")
        .map(|content| content.children_named("w:p").collect())
        .unwrap_or_default()
}

/// Split `1-2. Methods` into `("1-2.", "Methods")`
pub fn split_number(head: &str) -> (String, String) {
    match ENTRY_NUMBER.captures(head.trim()) {
        Some(caps) => (caps[1].to_string(), caps[2].trim().to_string()),
        None => (String::new(), head.trim().to_string()),
    }
}

/// Bookmark a PAGEREF field instruction points at
pub fn pageref_target(instr: &str) -> Option<&str> {
    PAGEREF_TARGET
        .captures(instr)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Point a field instruction's PAGEREF at another bookmark
pub fn retarget_pageref(instr: &str, anchor: &str) -> String {
    PAGEREF_TARGET
        .replace(instr, regex::NoExpand(&format!("PAGEREF {}", anchor)))
        .into_owned()
}

/// Parsed content of one TOC paragraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    /// Number part
    pub number: String,
    /// Title part
    pub title: String,
    /// Text after the tab leader
    pub page: String,
    /// Hyperlink anchor or PAGEREF target
    pub anchor: Option<String>,
    /// Left indent in twips
    pub indent: i64,
    /// Level fingerprint
    pub fingerprint: String,
}

impl ParsedEntry {
    /// Whether the paragraph shows any text
    pub fn is_blank(&self) -> bool {
        self.number.is_empty() && self.title.is_empty() && self.page.is_empty()
    }
}

/// Left indent of a paragraph from its direct properties
pub fn indent_left(p: &Element) -> i64 {
    p.child("w:pPr")
        .and_then(|p_pr| p_pr.child("w:ind"))
        .and_then(|ind| ind.attr("w:left").or_else(|| ind.attr("w:start")))
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

fn level_fingerprint(p: &Element, indent: i64) -> String {
    let mut borders: Vec<String> = p
        .child("w:pPr")
        .and_then(|p_pr| p_pr.child("w:pBdr"))
        .map(|bdr| bdr.elements().filter_map(element_key_part).collect())
        .unwrap_or_default();
    borders.sort();
    let border_key = if borders.is_empty() {
        "none".to_string()
    } else {
        borders.join(",")
    };
    let bold = paragraph_runs(p)
        .into_iter()
        .find(|r| r.child("w:t").is_some())
        .and_then(|r| r.child("w:rPr"))
        .and_then(|r_pr| r_pr.child("w:b"))
        .is_some_and(|b| !matches!(b.val(), Some("0") | Some("false")));

    let mut fingerprint = format!("borders:{}|indent:{}", border_key, indent);
    if bold {
        fingerprint.push_str("|bold:True");
    }
    fingerprint
}

/// Parse a TOC paragraph into number, title, page and anchor
///
/// Text after the last tab is the page; earlier tabs separate the number
/// from the title.
pub fn parse_entry(p: &Element) -> ParsedEntry {
    let mut segments = vec![String::new()];
    for run in paragraph_runs(p) {
        for child in run.elements() {
            if child.is("w:tab") || child.is("w:ptab") {
                segments.push(String::new());
            } else if child.is("w:t") {
                if let Some(last) = segments.last_mut() {
                    last.push_str(&child.own_text());
                }
            }
        }
    }
    let page = if segments.len() > 1 {
        segments.pop().unwrap_or_default()
    } else {
        String::new()
    };
    let head = segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let anchor = p
        .descendants_named("w:hyperlink")
        .iter()
        .find_map(|h| h.attr("w:anchor"))
        .map(str::to_string)
        .or_else(|| {
            p.descendants_named("w:instrText")
                .iter()
                .find_map(|i| pageref_target(&i.own_text()).map(str::to_string))
        });

    let (number, title) = split_number(&head);
    let indent = indent_left(p);
    ParsedEntry {
        number,
        title,
        page: page.trim().to_string(),
        anchor,
        indent,
        fingerprint: level_fingerprint(p, indent),
    }
}

/// Outline level a TOC paragraph's style stands for (`TOC2` / `toc 2`)
pub fn level_from_style(p: &Element, styles: &StyleSheet) -> Option<u8> {
    let style_id = paragraph_style_id(p)?;
    let from = |name: &str| {
        TOC_STYLE_LEVEL
            .captures(name.trim())
            .and_then(|c| c[1].parse::<u8>().ok())
    };
    from(style_id).or_else(|| styles.get(style_id).and_then(|s| from(&s.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_element;

    const HYPERLINK_ENTRY: &str = r#"<w:p><w:pPr><w:pStyle w:val="TOC1"/><w:ind w:left="0"/></w:pPr>
        <w:hyperlink w:anchor="_Toc100"><w:r><w:t>1.</w:t></w:r><w:r><w:t xml:space="preserve"> Intro</w:t></w:r>
        <w:r><w:tab/></w:r>
        <w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText xml:space="preserve"> PAGEREF _Toc100 \h </w:instrText></w:r>
        <w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>3</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:hyperlink></w:p>"#;

    #[test]
    fn test_parse_hyperlink_entry() {
        // Arrange
        let p = parse_element(HYPERLINK_ENTRY).unwrap();

        // Act
        let entry = parse_entry(&p);

        // Assert
        assert_eq!(entry.number, "1.");
        assert_eq!(entry.title, "Intro");
        assert_eq!(entry.page, "3");
        assert_eq!(entry.anchor.as_deref(), Some("_Toc100"));
        assert_eq!(entry.fingerprint, "borders:none|indent:0");
    }

    #[test]
    fn test_parse_plain_entry_uses_pageref() {
        let p = parse_element(
            r#"<w:p><w:pPr><w:ind w:left="440"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Background</w:t></w:r><w:r><w:tab/><w:t>7</w:t></w:r>
            <w:r><w:instrText>PAGEREF _Toc7 \h</w:instrText></w:r></w:p>"#,
        )
        .unwrap();

        let entry = parse_entry(&p);

        assert_eq!(entry.number, "");
        assert_eq!(entry.title, "Background");
        assert_eq!(entry.page, "7");
        assert_eq!(entry.anchor.as_deref(), Some("_Toc7"));
        assert_eq!(entry.indent, 440);
        assert_eq!(entry.fingerprint, "borders:none|indent:440|bold:True");
    }

    #[test]
    fn test_tab_between_number_and_title() {
        let p = parse_element(
            r#"<w:p><w:r><w:t>2.</w:t></w:r><w:r><w:tab/><w:t>Scope</w:t></w:r><w:r><w:tab/><w:t>9</w:t></w:r></w:p>"#,
        )
        .unwrap();

        let entry = parse_entry(&p);

        assert_eq!((entry.number.as_str(), entry.title.as_str(), entry.page.as_str()), ("2.", "Scope", "9"));
    }

    #[test]
    fn test_retarget_pageref_keeps_switches() {
        assert_eq!(
            retarget_pageref(" PAGEREF _Toc1 \\h ", "_Toc00000002"),
            " PAGEREF _Toc00000002 \\h "
        );
    }

    #[test]
    fn test_split_number_forms() {
        assert_eq!(split_number("1-2. Methods"), ("1-2.".into(), "Methods".into()));
        assert_eq!(split_number("2.3 Scope"), ("2.3".into(), "Scope".into()));
        assert_eq!(split_number("Appendix"), ("".into(), "Appendix".into()));
    }

    #[test]
    fn test_toc_detection() {
        let gallery = parse_element(
            r#"<w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Table of Contents"/></w:docPartObj></w:sdtPr><w:sdtContent/></w:sdt>"#,
        )
        .unwrap();
        let plain = parse_element(r#"<w:sdt><w:sdtPr><w:alias w:val="Cover"/></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>"#)
            .unwrap();

        assert!(is_toc_sdt(&gallery));
        assert!(!is_toc_sdt(&plain));
        assert_eq!(entry_paragraphs(&plain).len(), 1);
    }

    #[test]
    fn test_level_from_style() {
        let p = parse_element(HYPERLINK_ENTRY).unwrap();
        assert_eq!(level_from_style(&p, &StyleSheet::default()), Some(1));
    }
}
