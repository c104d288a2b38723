//! Post-apply verification
//!
//! [`verify`] re-checks the structural properties every edited document
//! must keep; [`diff_text_merge`] shows what changed between two text-merge
//! views with block ids stripped, since ids shift after inserts and deletes.

use crate::extract::Extraction;
use crate::model::{BlockContent, Numbering, Paragraph};
use crate::toc_sync::{heading_entry, normalize};
use diffy::{create_patch, Line};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

static MERGE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?:b\d+(?::[rcp]\d+(?:[cp]\d+)*)?|p\d+)[:|]").expect("invalid text-merge id regex")
});

/// Property a finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// Rows disagree on their cell count, or a cell has no paragraph
    TableShape,
    /// A TOC entry's anchor does not resolve to exactly one heading
    TocAnchor,
    /// A TOC entry's number or title differs from its heading
    TocText,
    /// A numbering sequence skips or repeats a value
    Numbering,
}

/// One failed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Target id of the offending unit
    pub target: String,
    /// Failed property
    pub check: Check,
    /// Explanation
    pub message: String,
}

/// Result of verifying one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Whether every check passed
    pub ok: bool,
    /// Failed checks
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    /// Whether any finding is about the property
    pub fn has(&self, check: Check) -> bool {
        self.findings.iter().any(|f| f.check == check)
    }
}

/// Counter state per numbering instance while walking the document
#[derive(Default)]
struct NumberingTrack {
    counters: HashMap<u32, Vec<Option<u32>>>,
}

impl NumberingTrack {
    fn visit(&mut self, target: &str, paragraph: &Paragraph, findings: &mut Vec<Finding>) {
        let Some(Numbering::Computed {
            num_id,
            level,
            value,
            start,
            ..
        }) = &paragraph.numbering
        else {
            return;
        };
        let level = usize::from(*level);
        let counters = self.counters.entry(*num_id).or_default();
        if counters.len() <= level {
            counters.resize(level + 1, None);
        }
        let message = match counters[level] {
            Some(previous) if previous.checked_add(1) != Some(*value) => Some(format!(
                "numbering {} level {} goes from {} to {}",
                num_id, level, previous, value
            )),
            None if value != start => Some(format!(
                "numbering {} level {} starts at {} instead of {}",
                num_id, level, value, start
            )),
            _ => None,
        };
        if let Some(message) = message {
            findings.push(Finding {
                target: target.to_string(),
                check: Check::Numbering,
                message,
            });
        }
        counters[level] = Some(*value);
        counters.truncate(level + 1);
    }
}

/// Check table shape, TOC anchors and text, and numbering sequences
pub fn verify(extraction: &Extraction) -> VerifyReport {
    let mut findings = Vec::new();
    let mut numbering = NumberingTrack::default();

    for block in &extraction.blocks {
        match &block.content {
            BlockContent::Paragraph(p) => numbering.visit(&block.id.to_string(), p, &mut findings),
            BlockContent::Table(table) => {
                if !table.is_rectangular() {
                    findings.push(Finding {
                        target: block.id.to_string(),
                        check: Check::TableShape,
                        message: format!(
                            "rows have cell counts {:?}, expected {}",
                            table.rows.iter().map(|r| r.cells.len()).collect::<Vec<_>>(),
                            table.column_count
                        ),
                    });
                }
                for cell in table.rows.iter().flat_map(|r| &r.cells) {
                    if cell.paragraphs.is_empty() {
                        findings.push(Finding {
                            target: cell.id.to_string(),
                            check: Check::TableShape,
                            message: "cell has no paragraph".to_string(),
                        });
                    }
                    for cp in &cell.paragraphs {
                        numbering.visit(&cp.id.to_string(), &cp.paragraph, &mut findings);
                    }
                }
            }
            BlockContent::Toc(toc) => {
                for entry in toc.entries.iter().filter(|e| e.is_entry()) {
                    let target = entry.id.to_string();
                    let Some(anchor) = &entry.anchor else {
                        findings.push(Finding {
                            target,
                            check: Check::TocAnchor,
                            message: format!("entry '{}' links to no heading", entry.title),
                        });
                        continue;
                    };
                    let headings: Vec<_> = extraction.headings_with_bookmark(anchor).collect();
                    let [heading] = headings.as_slice() else {
                        findings.push(Finding {
                            target,
                            check: Check::TocAnchor,
                            message: format!("anchor '{}' resolves to {} headings", anchor, headings.len()),
                        });
                        continue;
                    };
                    let Some(paragraph) = heading.paragraph() else {
                        continue;
                    };
                    let (number, title) = heading_entry(paragraph);
                    if entry.number != number || normalize(&entry.title) != title {
                        findings.push(Finding {
                            target,
                            check: Check::TocText,
                            message: format!(
                                "entry shows '{} {}' but {} reads '{} {}'",
                                entry.number, entry.title, heading.id, number, title
                            ),
                        });
                    }
                }
            }
            BlockContent::Other { .. } => {}
        }
    }

    for finding in &findings {
        log::warn!("Verification: {}: {}", finding.target, finding.message);
    }
    VerifyReport {
        ok: findings.is_empty(),
        findings,
    }
}

/// Kind of a changed line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// Only in the second view
    Added,
    /// Only in the first view
    Removed,
}

/// One changed text-merge line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    /// Added or removed
    pub change: Change,
    /// Line with block ids stripped
    pub text: String,
}

/// Text-merge line with its ids removed
fn strip_ids(view: &str) -> String {
    view.lines()
        .map(|line| MERGE_ID.replace_all(line, "[").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

/// Lines added and removed between two text-merge views
pub fn diff_text_merge(before: &str, after: &str) -> Vec<DiffLine> {
    let before = strip_ids(before);
    let after = strip_ids(after);
    let patch = create_patch(&before, &after);
    patch
        .hunks()
        .iter()
        .flat_map(|hunk| hunk.lines())
        .filter_map(|line| match line {
            Line::Insert(text) => Some(DiffLine {
                change: Change::Added,
                text: text.trim_end_matches('\n').to_string(),
            }),
            Line::Delete(text) => Some(DiffLine {
                change: Change::Removed,
                text: text.trim_end_matches('\n').to_string(),
            }),
            Line::Context(_) => None,
        })
        .collect()
}
