//! Semantic kind inference for paragraphs

use super::style_key::paragraph_style_id;
use crate::markup::Element;
use crate::model::BlockKind;
use crate::styles::{NumberingRef, StyleSheet};

fn heading_from_outline(level: u8) -> Option<BlockKind> {
    (level < 9).then_some(BlockKind::Heading(level + 1))
}

/// Kind implied by a style id or display name
fn kind_from_name(name: &str) -> Option<BlockKind> {
    let lower = name.to_lowercase();
    if lower.contains("heading") {
        let level = lower
            .chars()
            .find_map(|c| c.to_digit(10))
            .filter(|d| (1..=9).contains(d))
            .unwrap_or(1);
        return Some(BlockKind::Heading(level as u8));
    }
    if lower == "title" {
        return Some(BlockKind::Title);
    }
    if lower.contains("subtitle") {
        return Some(BlockKind::Subtitle);
    }
    if lower.contains("list") || lower.contains("bullet") || lower.contains("number") {
        return Some(BlockKind::List);
    }
    if lower.starts_with("toc") {
        return Some(BlockKind::Other);
    }
    None
}

/// Infer the semantic kind of a `w:p`
///
/// Priority: the paragraph's own outline level, the style chain's outline
/// level, keywords in the style id or name, then list numbering.
pub fn paragraph_kind(p: &Element, styles: &StyleSheet) -> BlockKind {
    let p_pr = p.child("w:pPr");
    let direct_outline = p_pr
        .and_then(|p| p.child("w:outlineLvl"))
        .and_then(Element::val)
        .and_then(|v| v.trim().parse::<u8>().ok());
    if let Some(kind) = direct_outline.and_then(heading_from_outline) {
        return kind;
    }

    let style_id = paragraph_style_id(p).unwrap_or_else(|| styles.default_paragraph_style());
    if let Some(kind) = styles.outline_level(style_id).and_then(heading_from_outline) {
        return kind;
    }

    let style_name = styles.get(style_id).map(|s| s.name.as_str()).unwrap_or_default();
    if let Some(kind) = kind_from_name(style_id).or_else(|| kind_from_name(style_name)) {
        return kind;
    }

    let numbered = p_pr
        .and_then(|p| p.child("w:numPr"))
        .and_then(NumberingRef::from_num_pr)
        .or_else(|| styles.numbering(style_id))
        .is_some_and(|n| n.num_id != 0);
    if numbered {
        BlockKind::List
    } else {
        BlockKind::Body
    }
}
