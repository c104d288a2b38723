//! TOC synchronisation
//!
//! The table of contents is a view of the heading sequence. After a pass
//! that touched headings, [`plan_toc_sync`] compares every TOC with the
//! headings of the fresh extraction and writes the edit plan that brings
//! it back in line. Page numbers are not computed here: new entries borrow
//! the page of their neighbour and the package is repacked with
//! `updateFields` so the word processor refreshes them.

use crate::extract::toc::split_number;
use crate::extract::Extraction;
use crate::model::{Block, Paragraph, Toc, TocEntry};
use crate::plan::{Action, EditPlan, EditRecord};
use std::collections::BTreeSet;
use thiserror::Error;

/// Heading levels assumed when no entry tells which levels a TOC covers
const DEFAULT_LEVELS: [u8; 3] = [1, 2, 3];

/// Errors planning a TOC synchronisation
#[derive(Debug, Error)]
pub enum SyncError {
    /// An entry's anchor is a bookmark carried by more than one heading
    #[error("{target}: anchor '{anchor}' resolves to {count} headings")]
    AmbiguousAnchor {
        /// TOC entry target id
        target: String,
        /// Bookmark name
        anchor: String,
        /// Number of headings carrying it
        count: usize,
    },

    /// A TOC without entries gives no paragraph to copy new entries from
    #[error("b{block}: table of contents has no entries to model new ones on")]
    NoEntries {
        /// TOC block
        block: usize,
    },
}

/// A heading as the TOC should show it
#[derive(Debug, Clone, PartialEq, Eq)]
struct WantedEntry<'a> {
    block: usize,
    level: u8,
    number: String,
    title: String,
    bookmarks: &'a [String],
}

pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number and title a TOC entry for this heading shows
pub(crate) fn heading_entry(paragraph: &Paragraph) -> (String, String) {
    match paragraph.prefix() {
        Some(prefix) => (prefix.trim().to_string(), normalize(&paragraph.text)),
        None => split_number(&normalize(&paragraph.text)),
    }
}

fn wanted_entries<'a>(extraction: &'a Extraction, levels: &BTreeSet<u8>) -> Vec<WantedEntry<'a>> {
    extraction
        .headings()
        .filter_map(|block| {
            let level = block.kind.heading_level()?;
            let paragraph = block.paragraph()?;
            if !levels.contains(&level) || paragraph.text.trim().is_empty() {
                return None;
            }
            let (number, title) = heading_entry(paragraph);
            Some(WantedEntry {
                block: block.id.block(),
                level,
                number,
                title,
                bookmarks: &paragraph.bookmarks,
            })
        })
        .collect()
}

/// Levels a TOC shows, read from its entries
fn covered_levels(toc: &Toc) -> BTreeSet<u8> {
    let levels: BTreeSet<u8> = toc
        .entries
        .iter()
        .filter(|e| e.is_entry())
        .filter_map(|e| e.level)
        .collect();
    if levels.is_empty() {
        DEFAULT_LEVELS.into_iter().collect()
    } else {
        levels
    }
}

fn entry_text(number: &str, title: &str, page: &str) -> String {
    let head = if number.is_empty() {
        title.to_string()
    } else {
        format!("{} {}", number, title)
    };
    if page.is_empty() {
        head
    } else {
        format!("{} | {}", head, page)
    }
}

/// Match each entry to at most one wanted heading: anchor first, then title
fn match_entries(
    block: usize,
    entries: &[(usize, &TocEntry)],
    wanted: &[WantedEntry<'_>],
    extraction: &Extraction,
) -> Result<Vec<Option<usize>>, SyncError> {
    let mut taken = vec![false; wanted.len()];
    let mut matches = vec![None; entries.len()];

    for (slot, (i, entry)) in entries.iter().enumerate() {
        let Some(anchor) = &entry.anchor else {
            continue;
        };
        let count = extraction.headings_with_bookmark(anchor).count();
        if count > 1 {
            return Err(SyncError::AmbiguousAnchor {
                target: format!("b{}:p{}", block, i),
                anchor: anchor.clone(),
                count,
            });
        }
        if let Some(w) = wanted
            .iter()
            .position(|w| w.bookmarks.iter().any(|b| b == anchor))
            .filter(|w| !taken[*w])
        {
            taken[w] = true;
            matches[slot] = Some(w);
        }
    }

    for (slot, (_, entry)) in entries.iter().enumerate() {
        if matches[slot].is_some() {
            continue;
        }
        let title = normalize(&entry.title);
        if let Some(w) = (0..wanted.len()).find(|w| !taken[*w] && wanted[*w].title == title) {
            taken[w] = true;
            matches[slot] = Some(w);
        }
    }
    Ok(matches)
}

fn sync_one(toc_block: &Block, toc: &Toc, extraction: &Extraction) -> Result<Vec<EditRecord>, SyncError> {
    let block = toc_block.id.block();
    let entries: Vec<(usize, &TocEntry)> = toc.entries.iter().enumerate().filter(|(_, e)| e.is_entry()).collect();
    let wanted = wanted_entries(extraction, &covered_levels(toc));
    let matches = match_entries(block, &entries, &wanted, extraction)?;

    let target = |entry: usize| format!("b{}:p{}", block, entry);
    let mut records = Vec::new();

    // Drifted and stale entries
    for ((i, entry), matched) in entries.iter().zip(&matches) {
        match matched {
            None => {
                log::debug!("TOC entry {} '{}' no longer has a heading", target(*i), entry.title);
                records.push(EditRecord::new(Action::Delete, target(*i)));
            }
            Some(w) => {
                let heading = &wanted[*w];
                let linked = entry
                    .anchor
                    .as_ref()
                    .is_some_and(|a| heading.bookmarks.contains(a));
                if entry.number == heading.number && normalize(&entry.title) == heading.title && linked {
                    continue;
                }
                let mut record = EditRecord::new(Action::Replace, target(*i))
                    .with_text(entry_text(&heading.number, &heading.title, &entry.page));
                record.anchor_block_id = Some(format!("b{}", heading.block));
                records.push(record);
            }
        }
    }

    // Headings without an entry go after the entry of the closest earlier heading
    let entry_of: Vec<Option<usize>> = (0..wanted.len())
        .map(|w| matches.iter().position(|m| *m == Some(w)))
        .collect();
    for (w, heading) in wanted.iter().enumerate() {
        if entry_of[w].is_some() {
            continue;
        }
        let preceding = entry_of[..w].iter().rev().flatten().next().copied();
        let (anchor_slot, action) = match preceding {
            Some(slot) => (slot, Action::InsertAfter),
            None => match entry_of[w..].iter().flatten().next() {
                Some(slot) => (*slot, Action::InsertBefore),
                None if !entries.is_empty() => (entries.len() - 1, Action::InsertAfter),
                None => return Err(SyncError::NoEntries { block }),
            },
        };
        let (anchor_index, anchor_entry) = entries[anchor_slot];
        let mut record = EditRecord::new(action, target(anchor_index)).with_text(entry_text(
            &heading.number,
            &heading.title,
            &anchor_entry.page,
        ));
        record.anchor_block_id = Some(format!("b{}", heading.block));
        record.toc_level_alias = extraction
            .aliases
            .toc_level_for(heading.level)
            .map(|t| t.alias.clone());
        log::debug!("TOC gains '{}' next to {}", heading.title, target(anchor_index));
        records.push(record);
    }
    Ok(records)
}

/// Edit plan bringing every TOC in line with the headings
///
/// The plan is empty when all TOCs already match.
pub fn plan_toc_sync(extraction: &Extraction) -> Result<EditPlan, SyncError> {
    let mut records = Vec::new();
    for block in extraction.tocs() {
        if let Some(toc) = block.toc() {
            records.extend(sync_one(block, toc, extraction)?);
        }
    }
    log::info!("TOC synchronisation plan has {} edits", records.len());
    Ok(EditPlan::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::snapshot;

    fn toc_entry(title: &str, anchor: &str, page: &str) -> String {
        format!(
            r#"<w:p><w:pPr><w:pStyle w:val="TOC1"/></w:pPr><w:hyperlink w:anchor="{a}"><w:r><w:t>{t}</w:t></w:r><w:r><w:tab/></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText xml:space="preserve"> PAGEREF {a} \h </w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>{p}</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:hyperlink></w:p>"#,
            a = anchor,
            t = title,
            p = page
        )
    }

    fn heading(text: &str, bookmark: Option<(&str, u32)>) -> String {
        match bookmark {
            Some((name, id)) => format!(
                r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:bookmarkStart w:id="{id}" w:name="{name}"/><w:r><w:t>{text}</w:t></w:r><w:bookmarkEnd w:id="{id}"/></w:p>"#
            ),
            None => format!(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#),
        }
    }

    fn toc(entries: &[String]) -> String {
        format!(
            r#"<w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Table of Contents"/></w:docPartObj></w:sdtPr><w:sdtContent>{}</w:sdtContent></w:sdt>"#,
            entries.concat()
        )
    }

    fn plan_for(body: &str) -> EditPlan {
        let extraction = Extraction::from_snapshot(&snapshot(body));
        plan_toc_sync(&extraction).unwrap()
    }

    #[test]
    fn test_in_sync_toc_needs_no_edits() {
        // Arrange
        let body = [
            toc(&[toc_entry("Intro", "_Toc1", "3"), toc_entry("Methods", "_Toc2", "5")]),
            heading("Intro", Some(("_Toc1", 1))),
            heading("Methods", Some(("_Toc2", 2))),
        ]
        .concat();

        // Act
        let plan = plan_for(&body);

        // Assert
        assert!(plan.is_empty(), "{:?}", plan);
    }

    #[test]
    fn test_new_heading_is_inserted_after_its_predecessor() {
        let body = [
            toc(&[toc_entry("Intro", "_Toc1", "3"), toc_entry("Methods", "_Toc2", "5")]),
            heading("Intro", Some(("_Toc1", 1))),
            heading("Background", None),
            heading("Methods", Some(("_Toc2", 2))),
        ]
        .concat();

        let plan = plan_for(&body);

        assert_eq!(plan.edits.len(), 1);
        let edit = &plan.edits[0];
        assert_eq!(edit.action, Action::InsertAfter);
        assert_eq!(edit.target_id, "b0:p0");
        assert_eq!(edit.new_text.as_deref(), Some("Background | 3"));
        assert_eq!(edit.anchor_block_id.as_deref(), Some("b2"));
        assert_eq!(edit.toc_level_alias.as_deref(), Some("TL0"));
    }

    #[test]
    fn test_renamed_heading_is_matched_by_anchor() {
        let body = [
            toc(&[toc_entry("Intro", "_Toc1", "3")]),
            heading("Introduction", Some(("_Toc1", 1))),
        ]
        .concat();

        let plan = plan_for(&body);

        assert_eq!(plan.edits.len(), 1);
        assert_eq!(plan.edits[0].action, Action::Replace);
        assert_eq!(plan.edits[0].new_text.as_deref(), Some("Introduction | 3"));
        assert_eq!(plan.edits[0].anchor_block_id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_removed_heading_deletes_entry() {
        let body = [
            toc(&[toc_entry("Intro", "_Toc1", "3"), toc_entry("Gone", "_Toc9", "4")]),
            heading("Intro", Some(("_Toc1", 1))),
        ]
        .concat();

        let plan = plan_for(&body);

        assert_eq!(plan.edits, vec![EditRecord::new(Action::Delete, "b0:p1")]);
    }

    #[test]
    fn test_title_match_relinks_entry() {
        let body = [
            toc(&[toc_entry("Intro", "_TocStale", "3")]),
            heading("Intro", Some(("_Toc1", 1))),
        ]
        .concat();

        let plan = plan_for(&body);

        assert_eq!(plan.edits.len(), 1);
        assert_eq!(plan.edits[0].action, Action::Replace);
        assert_eq!(plan.edits[0].anchor_block_id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_ambiguous_anchor_is_an_error() {
        let body = [
            toc(&[toc_entry("Intro", "_Toc1", "3")]),
            heading("Intro", Some(("_Toc1", 1))),
            heading("Intro again", Some(("_Toc1", 2))),
        ]
        .concat();
        let extraction = Extraction::from_snapshot(&snapshot(&body));

        let err = plan_toc_sync(&extraction).unwrap_err();

        assert!(matches!(err, SyncError::AmbiguousAnchor { count: 2, .. }));
    }
}
