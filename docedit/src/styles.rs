//! Paragraph style sheet lookups (`word/styles.xml`)

use crate::markup::Element;
use std::collections::HashMap;

/// Numbering reference carried by `w:numPr`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberingRef {
    /// Numbering instance; 0 switches numbering off
    pub num_id: u32,
    /// Level within the instance, when stated
    pub level: Option<u8>,
}

impl NumberingRef {
    /// Read a `w:numPr` element; `None` when it names no instance
    pub fn from_num_pr(num_pr: &Element) -> Option<Self> {
        let num_id = num_pr
            .child("w:numId")
            .and_then(Element::val)
            .and_then(|v| v.trim().parse::<u32>().ok())?;
        let level = num_pr
            .child("w:ilvl")
            .and_then(Element::val)
            .and_then(|v| v.trim().parse::<u8>().ok());
        Some(Self { num_id, level })
    }
}

/// One `w:style` definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleInfo {
    /// Display name (`w:name`)
    pub name: String,
    /// Parent style (`w:basedOn`)
    pub based_on: Option<String>,
    /// Outline level from the style's paragraph properties
    pub outline_level: Option<u8>,
    /// Numbering from the style's paragraph properties
    pub numbering: Option<NumberingRef>,
}

/// Parsed paragraph styles keyed by style id
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    styles: HashMap<String, StyleInfo>,
    default_paragraph: Option<String>,
}

impl StyleSheet {
    /// Build the sheet from the root of `word/styles.xml`
    pub fn from_root(root: &Element) -> Self {
        let mut sheet = Self::default();
        for style in root.descendants_named("w:style") {
            let Some(id) = style.attr("w:styleId") else {
                continue;
            };
            let p_pr = style.child("w:pPr");
            let info = StyleInfo {
                name: style
                    .child("w:name")
                    .and_then(Element::val)
                    .unwrap_or_default()
                    .to_string(),
                based_on: style
                    .child("w:basedOn")
                    .and_then(Element::val)
                    .map(str::to_string),
                outline_level: p_pr
                    .and_then(|p| p.child("w:outlineLvl"))
                    .and_then(Element::val)
                    .and_then(|v| v.trim().parse::<u8>().ok()),
                numbering: p_pr
                    .and_then(|p| p.child("w:numPr"))
                    .and_then(NumberingRef::from_num_pr),
            };
            let is_default_paragraph = style.attr("w:type") == Some("paragraph")
                && matches!(style.attr("w:default"), Some("1") | Some("true"));
            if is_default_paragraph && sheet.default_paragraph.is_none() {
                sheet.default_paragraph = Some(id.to_string());
            }
            sheet.styles.insert(id.to_string(), info);
        }
        log::debug!("Loaded {} styles", sheet.styles.len());
        sheet
    }

    /// Style id applied to paragraphs without `w:pStyle`
    pub fn default_paragraph_style(&self) -> &str {
        self.default_paragraph.as_deref().unwrap_or("Normal")
    }

    /// Look up one style
    pub fn get(&self, style_id: &str) -> Option<&StyleInfo> {
        self.styles.get(style_id)
    }

    /// The style followed by its `basedOn` ancestors, stopping at cycles
    fn chain<'a>(&'a self, style_id: &'a str) -> impl Iterator<Item = &'a StyleInfo> + 'a {
        let mut seen: Vec<&'a str> = Vec::new();
        let mut next = Some(style_id);
        std::iter::from_fn(move || {
            let id = next?;
            if seen.contains(&id) {
                return None;
            }
            seen.push(id);
            let info = self.styles.get(id)?;
            next = info.based_on.as_deref();
            Some(info)
        })
    }

    /// Outline level inherited through `basedOn`
    pub fn outline_level(&self, style_id: &str) -> Option<u8> {
        self.chain(style_id).find_map(|s| s.outline_level)
    }

    /// Numbering inherited through `basedOn`
    pub fn numbering(&self, style_id: &str) -> Option<NumberingRef> {
        self.chain(style_id).find_map(|s| s.numbering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse;

    const STYLES: &str = r#"<w:styles xmlns:w="urn:w">
        <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
        <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/>
            <w:pPr><w:numPr><w:numId w:val="3"/></w:numPr><w:outlineLvl w:val="0"/></w:pPr></w:style>
        <w:style w:type="paragraph" w:styleId="Custom"><w:name w:val="Custom Head"/><w:basedOn w:val="Heading1"/></w:style>
        <w:style w:type="paragraph" w:styleId="LoopA"><w:basedOn w:val="LoopB"/></w:style>
        <w:style w:type="paragraph" w:styleId="LoopB"><w:basedOn w:val="LoopA"/></w:style>
    </w:styles>"#;

    fn sheet() -> StyleSheet {
        StyleSheet::from_root(parse(STYLES).unwrap().root())
    }

    #[test]
    fn test_inherited_outline_and_numbering() {
        let sheet = sheet();
        assert_eq!(sheet.outline_level("Custom"), Some(0));
        assert_eq!(
            sheet.numbering("Custom"),
            Some(NumberingRef {
                num_id: 3,
                level: None
            })
        );
        assert_eq!(sheet.outline_level("Normal"), None);
    }

    #[test]
    fn test_based_on_cycles_terminate() {
        assert_eq!(sheet().outline_level("LoopA"), None);
    }

    #[test]
    fn test_default_paragraph_style() {
        assert_eq!(sheet().default_paragraph_style(), "Normal");
        assert_eq!(StyleSheet::default().default_paragraph_style(), "Normal");
    }
}
