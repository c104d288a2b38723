//! TOC entry edits
//!
//! New and replaced entries are copies of an existing entry paragraph with
//! their text segments rewritten, so leaders, tab stops and fields survive.

use super::paragraph::text_run;
use super::{rebuild, ApplyError, Fate, Slot};
use crate::alias::StyleAliasTable;
use crate::extract::toc::{parse_entry, retarget_pageref};
use crate::markup::{Element, Node};
use crate::plan::{EditOperation, Position, TocEdit};
use std::collections::BTreeMap;

/// A TOC operation with its heading anchor worked out
#[derive(Debug)]
pub(crate) struct Resolved<'x> {
    pub(super) op: &'x EditOperation,
    /// Bookmark the entry links to
    pub(super) anchor: Option<String>,
    /// Outline level of the linked heading
    pub(super) level: Option<u8>,
}

/// Number of text segments a paragraph's tabs split it into
fn segment_count(p: &Element) -> usize {
    1 + crate::extract::paragraph_runs(p)
        .iter()
        .flat_map(|r| r.elements())
        .filter(|c| c.is("w:tab") || c.is("w:ptab"))
        .count()
}

/// Write one text per tab-separated segment into the `w:t` elements
///
/// The first `w:t` of a segment takes its text, later ones are dropped.
fn write_segments(p: &mut Element, texts: &[String]) -> bool {
    fn visit(el: &mut Element, texts: &[String], segment: &mut usize, placed: &mut Vec<bool>) {
        for child in el.elements_mut() {
            if child.is("w:pPr") {
                continue;
            }
            if !child.is("w:r") {
                visit(child, texts, segment, placed);
                continue;
            }
            let mut kept = Vec::with_capacity(child.children.len());
            for node in std::mem::take(&mut child.children) {
                match node {
                    Node::Element(ref e) if e.is("w:tab") || e.is("w:ptab") => {
                        *segment += 1;
                        kept.push(node);
                    }
                    Node::Element(mut t) if t.is("w:t") => {
                        if placed.get(*segment).copied().unwrap_or(true) {
                            continue;
                        }
                        placed[*segment] = true;
                        let text = texts.get(*segment).cloned().unwrap_or_default();
                        t.set_attr("xml:space", "preserve");
                        t.set_text(text);
                        kept.push(Node::Element(t));
                    }
                    other => kept.push(other),
                }
            }
            child.children = kept;
        }
    }
    let mut segment = 0;
    let mut placed = vec![false; texts.len()];
    visit(p, texts, &mut segment, &mut placed);
    placed.first().copied().unwrap_or(false)
}

/// Replace `w:hyperlink` wrappers with their content
fn unwrap_hyperlinks(el: &mut Element) {
    let children = std::mem::take(&mut el.children);
    for node in children {
        match node {
            Node::Element(mut child) if child.is("w:hyperlink") => {
                unwrap_hyperlinks(&mut child);
                el.children.extend(child.children);
            }
            Node::Element(mut child) => {
                unwrap_hyperlinks(&mut child);
                el.children.push(Node::Element(child));
            }
            other => el.children.push(other),
        }
    }
}

/// Drop field character and instruction runs, keeping field results
fn strip_field_runs(el: &mut Element) {
    el.children.retain(|n| {
        !n.as_element()
            .is_some_and(|r| r.is("w:r") && (r.child("w:fldChar").is_some() || r.child("w:instrText").is_some()))
    });
    for child in el.elements_mut() {
        strip_field_runs(child);
    }
}

/// Point hyperlinks and PAGEREF fields at `anchor`, or unlink the entry
fn relink(p: &mut Element, anchor: Option<&str>) {
    match anchor {
        Some(anchor) => p.visit_mut(&mut |el| {
            if el.is("w:hyperlink") && el.attr("w:anchor").is_some() {
                el.set_attr("w:anchor", anchor);
            } else if el.is("w:instrText") {
                let instr = el.own_text();
                if instr.contains("PAGEREF") {
                    el.set_text(retarget_pageref(&instr, anchor));
                }
            }
        }),
        None => {
            unwrap_hyperlinks(p);
            strip_field_runs(p);
        }
    }
}

/// Rewrite a copy of an entry paragraph to show `number title ⇥ page`
fn rewrite_entry(mut p: Element, number: &str, title: &str, page: &str, anchor: Option<&str>) -> Element {
    let head = match (number.is_empty(), title.is_empty()) {
        (true, _) => title.to_string(),
        (false, true) => number.to_string(),
        (false, false) => format!("{} {}", number, title),
    };
    let texts: Vec<String> = match segment_count(&p) {
        1 => vec![head],
        2 => vec![head, page.to_string()],
        n => {
            let mut texts = vec![String::new(); n];
            texts[0] = number.to_string();
            texts[1] = title.to_string();
            texts[n - 1] = page.to_string();
            texts
        }
    };
    if !write_segments(&mut p, &texts) {
        p.children.push(Node::Element(text_run(None, &texts.join("\t"))));
    }
    relink(&mut p, anchor);
    p
}

fn sample_for<'a>(
    toc: &TocEdit,
    level: Option<u8>,
    fallback: &'a Element,
    aliases: &'a StyleAliasTable,
    target: &str,
) -> Result<&'a Element, ApplyError> {
    if let Some(alias) = &toc.level_alias {
        return aliases
            .toc_level(alias)
            .map(|t| &t.sample)
            .ok_or_else(|| ApplyError::UnknownAlias {
                target: target.to_string(),
                alias: alias.clone(),
            });
    }
    Ok(level
        .and_then(|l| aliases.toc_level_for(l))
        .map_or(fallback, |t| &t.sample))
}

/// Apply the TOC operations of one content control
pub(crate) fn apply(
    sdt: &mut Element,
    resolved: &[Resolved<'_>],
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<(), ApplyError> {
    let entries: Vec<Element> = crate::extract::toc::entry_paragraphs(sdt)
        .into_iter()
        .cloned()
        .collect();
    let mut slots: BTreeMap<usize, Slot> = BTreeMap::new();

    for item in resolved {
        let (entry, toc, position) = match item.op {
            EditOperation::ReplaceTocEntry { entry, toc, .. } => (*entry, Some(toc), None),
            EditOperation::InsertTocEntry {
                entry, toc, position, ..
            } => (*entry, Some(toc), Some(*position)),
            EditOperation::DeleteTocEntry { entry, .. } => (*entry, None, None),
            _ => continue,
        };
        let here = format!("{}:p{}", target, entry);
        let existing = entries.get(entry).ok_or_else(|| ApplyError::TargetMissing {
            target: here.clone(),
        })?;
        let slot = slots.entry(entry).or_default();

        let Some(toc) = toc else {
            slot.fate = Fate::Remove;
            continue;
        };
        let parsed = parse_entry(existing);
        let page = toc.page.clone().unwrap_or_else(|| parsed.page.clone());
        match position {
            None => {
                let sample = match &toc.level_alias {
                    Some(_) => sample_for(toc, None, existing, aliases, &here)?,
                    None => existing,
                };
                let anchor = item.anchor.clone().or(parsed.anchor);
                let new = rewrite_entry(sample.clone(), &toc.number, &toc.title, &page, anchor.as_deref());
                slot.fate = Fate::Replace(new);
            }
            Some(position) => {
                let mut sample = sample_for(toc, item.level, existing, aliases, &here)?.clone();
                sample.visit_mut(&mut |el| {
                    el.remove_children_named("w:bookmarkStart");
                    el.remove_children_named("w:bookmarkEnd");
                });
                let new = rewrite_entry(sample, &toc.number, &toc.title, &page, item.anchor.as_deref());
                log::debug!("New TOC entry '{}' {} {}", toc.title, position_word(position), here);
                slot.insert(position, new);
            }
        }
    }

    let content = sdt.child_mut("w:sdtContent").ok_or_else(|| ApplyError::TargetMissing {
        target: target.to_string(),
    })?;
    rebuild(content, "w:p", slots);
    Ok(())
}

fn position_word(position: Position) -> &'static str {
    match position {
        Position::Before => "before",
        Position::After => "after",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_element;

    const ENTRY: &str = r#"<w:p><w:pPr><w:pStyle w:val="TOC1"/></w:pPr><w:hyperlink w:anchor="_Toc1"><w:r><w:t>1.</w:t></w:r><w:r><w:t xml:space="preserve"> Intro</w:t></w:r><w:r><w:tab/></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText xml:space="preserve"> PAGEREF _Toc1 \h </w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>3</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:hyperlink></w:p>"#;

    #[test]
    fn test_rewrite_keeps_field_and_relinks() {
        // Arrange
        let p = parse_element(ENTRY).unwrap();

        // Act
        let out = rewrite_entry(p, "2.", "Background", "4", Some("_Toc00000001"));

        // Assert
        let parsed = parse_entry(&out);
        assert_eq!(parsed.number, "2.");
        assert_eq!(parsed.title, "Background");
        assert_eq!(parsed.page, "4");
        assert_eq!(parsed.anchor.as_deref(), Some("_Toc00000001"));
        assert!(out.to_xml().contains("PAGEREF _Toc00000001"));
    }

    #[test]
    fn test_rewrite_without_anchor_unlinks() {
        let p = parse_element(ENTRY).unwrap();

        let out = rewrite_entry(p, "", "Appendix", "9", None);

        let parsed = parse_entry(&out);
        assert_eq!(parsed.title, "Appendix");
        assert_eq!(parsed.page, "9");
        assert_eq!(parsed.anchor, None);
        assert!(!out.contains("w:hyperlink"));
        assert!(!out.contains("w:fldChar"));
    }

    #[test]
    fn test_three_segment_layout() {
        let p = parse_element(
            r#"<w:p><w:r><w:t>1.</w:t></w:r><w:r><w:tab/><w:t>Old</w:t></w:r><w:r><w:tab/><w:t>2</w:t></w:r></w:p>"#,
        )
        .unwrap();

        let out = rewrite_entry(p, "3.", "New", "8", None);

        assert_eq!(
            out.to_xml(),
            r#"<w:p><w:r><w:t xml:space="preserve">3.</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve">New</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve">8</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_apply_replace_insert_delete() {
        let sdt = format!(
            "<w:sdt><w:sdtPr/><w:sdtContent>{}{}</w:sdtContent></w:sdt>",
            ENTRY,
            ENTRY.replace("Intro", "Scope")
        );
        let mut sdt = parse_element(&sdt).unwrap();
        let edit = |title: &str| TocEdit {
            number: String::new(),
            title: title.to_string(),
            page: None,
            level_alias: None,
            anchor_block: None,
        };
        let replace = EditOperation::ReplaceTocEntry {
            block: 0,
            entry: 0,
            toc: edit("Overview"),
        };
        let insert = EditOperation::InsertTocEntry {
            block: 0,
            entry: 0,
            position: Position::After,
            toc: edit("Added"),
        };
        let delete = EditOperation::DeleteTocEntry { block: 0, entry: 1 };
        let resolved = [&replace, &insert, &delete].map(|op| Resolved {
            op,
            anchor: None,
            level: None,
        });

        apply(&mut sdt, &resolved, &StyleAliasTable::default(), "b0").unwrap();

        let entries: Vec<_> = crate::extract::toc::entry_paragraphs(&sdt)
            .into_iter()
            .map(parse_entry)
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Overview");
        assert_eq!(entries[0].anchor.as_deref(), Some("_Toc1"));
        assert_eq!(entries[0].page, "3");
        assert_eq!(entries[1].title, "Added");
        assert_eq!(entries[1].anchor, None);
    }
}
