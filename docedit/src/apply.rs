//! Plan application
//!
//! The mutator turns a snapshot and a [`ValidatedPlan`] into a new snapshot.
//! Every index in the plan refers to the input snapshot, so each body block
//! is assembled as: inserts before it (plan order), the block itself (kept,
//! replaced, restructured or removed), then inserts after it. Untouched
//! blocks are copied byte-for-byte from the source part.
//!
//! Application is all-or-nothing: the first failing operation aborts and no
//! snapshot is produced.

mod paragraph;
mod table;
mod toc;

use crate::alias::StyleAliasTable;
use crate::extract::Extraction;
use crate::markup::{BodyPart, Element, MarkupError, Node};
use crate::model::{Block, BlockKind};
use crate::package::PackageError;
use crate::plan::{EditOperation, Position};
use crate::snapshot::Snapshot;
use crate::validate::ValidatedPlan;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Default prefix of bookmarks that TOC entries link to
pub const DEFAULT_BOOKMARK_PREFIX: &str = "_Toc";

/// Errors aborting a plan application
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The plan refers to something the snapshot does not have
    #[error("{target}: target not found in the snapshot")]
    TargetMissing {
        /// Offending target id
        target: String,
    },

    /// A style alias has no template in the extraction
    #[error("{target}: unknown style alias '{alias}'")]
    UnknownAlias {
        /// Offending target id
        target: String,
        /// Alias
        alias: String,
    },

    /// A TOC entry links to a heading the same plan removes
    #[error("{target}: anchor heading b{block} is deleted by the same plan")]
    AnchorRemoved {
        /// TOC entry target id
        target: String,
        /// Heading block
        block: usize,
    },

    /// An operation cannot be carried out on the content it found
    #[error("{target}: {message}")]
    Invalid {
        /// Offending target id
        target: String,
        /// Explanation
        message: String,
    },

    /// Template or run markup failed to parse
    #[error("template markup is invalid: {0}")]
    Markup(#[from] MarkupError),

    /// The mutated document could not be re-read
    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Knobs of the mutator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Prefix of bookmarks created for TOC anchors
    pub bookmark_prefix: String,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            bookmark_prefix: DEFAULT_BOOKMARK_PREFIX.to_string(),
        }
    }
}

/// What becomes of one child in a rebuilt sequence
#[derive(Debug, Clone, Default)]
pub(crate) enum Fate {
    /// Keep the original node
    #[default]
    Keep,
    /// Use a new node in its place
    Replace(Element),
    /// Drop the node
    Remove,
}

/// Edits anchored at one child of a sequence
#[derive(Debug, Clone, Default)]
pub(crate) struct Slot {
    pub before: Vec<Element>,
    pub fate: Fate,
    pub after: Vec<Element>,
}

impl Slot {
    /// Queue a new node on one side
    pub fn insert(&mut self, position: Position, el: Element) {
        match position {
            Position::Before => self.before.push(el),
            Position::After => self.after.push(el),
        }
    }
}

/// Rebuild the `name` children of `parent` from slots keyed by ordinal
///
/// Children with other names keep their place.
pub(crate) fn rebuild(parent: &mut Element, name: &str, mut slots: BTreeMap<usize, Slot>) {
    if slots.is_empty() {
        return;
    }
    let children = std::mem::take(&mut parent.children);
    let mut ordinal = 0;
    for node in children {
        let is_target = matches!(&node, Node::Element(el) if el.name == name);
        if !is_target {
            parent.children.push(node);
            continue;
        }
        match slots.remove(&ordinal) {
            None => parent.children.push(node),
            Some(slot) => {
                parent
                    .children
                    .extend(slot.before.into_iter().map(Node::Element));
                match slot.fate {
                    Fate::Keep => parent.children.push(node),
                    Fate::Replace(el) => parent.children.push(Node::Element(el)),
                    Fate::Remove => {}
                }
                parent
                    .children
                    .extend(slot.after.into_iter().map(Node::Element));
            }
        }
        ordinal += 1;
    }
}

/// `n`-th child element with the given name
pub(crate) fn nth_child_mut<'a>(parent: &'a mut Element, name: &str, n: usize) -> Option<&'a mut Element> {
    parent.elements_mut().filter(|el| el.name == name).nth(n)
}

/// Unique bookmark names and ids for new TOC anchors
struct Bookmarks {
    names: HashSet<String>,
    next_id: u64,
    counter: u64,
}

impl Bookmarks {
    fn scan(body: &Element) -> Self {
        let starts = body.descendants_named("w:bookmarkStart");
        let names = starts
            .iter()
            .filter_map(|b| b.attr("w:name"))
            .map(str::to_string)
            .collect();
        let next_id = starts
            .iter()
            .filter_map(|b| b.attr("w:id"))
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);
        Self {
            names,
            next_id,
            counter: 0,
        }
    }

    fn allocate(&mut self, prefix: &str) -> (String, u64) {
        let name = loop {
            self.counter += 1;
            let candidate = format!("{}{:08}", prefix, self.counter);
            if self.names.insert(candidate.clone()) {
                break candidate;
            }
        };
        let id = self.next_id;
        self.next_id += 1;
        (name, id)
    }
}

/// Insert a bookmark around the content of a paragraph
fn inject_bookmark(p: &mut Element, name: &str, id: u64) {
    let at = p.child_position("w:pPr").map_or(0, |i| i + 1);
    p.children.insert(
        at,
        Node::Element(
            Element::new("w:bookmarkStart")
                .with_attr("w:id", id.to_string())
                .with_attr("w:name", name),
        ),
    );
    p.children.push(Node::Element(
        Element::new("w:bookmarkEnd").with_attr("w:id", id.to_string()),
    ));
}

/// Everything that happens at one body block
#[derive(Debug, Default)]
struct BlockSlot {
    slot: Slot,
    edited: bool,
    bookmark: Option<(String, u64)>,
}

struct Mutator<'a> {
    body: &'a Element,
    extraction: &'a Extraction,
    options: &'a ApplyOptions,
    blocks: BTreeMap<usize, BlockSlot>,
    bookmarks: Bookmarks,
}

impl<'a> Mutator<'a> {
    fn aliases(&self) -> &'a StyleAliasTable {
        &self.extraction.aliases
    }

    fn block(&self, n: usize) -> Result<&'a Block, ApplyError> {
        self.extraction.block(n).ok_or_else(|| ApplyError::TargetMissing {
            target: format!("b{}", n),
        })
    }

    fn source(&self, n: usize) -> Result<&'a Element, ApplyError> {
        let block = self.block(n)?;
        self.body
            .children
            .get(block.source_index)
            .and_then(Node::as_element)
            .ok_or_else(|| ApplyError::TargetMissing {
                target: block.id.to_string(),
            })
    }

    /// Working copy of a block, cloned from the source on first use
    fn working_copy(&mut self, n: usize) -> Result<&mut Element, ApplyError> {
        let source = self.source(n)?;
        let entry = self.blocks.entry(n).or_default();
        if !entry.edited {
            if matches!(entry.slot.fate, Fate::Remove) {
                return Err(ApplyError::Invalid {
                    target: format!("b{}", n),
                    message: "block is edited after being deleted".to_string(),
                });
            }
            entry.slot.fate = Fate::Replace(source.clone());
            entry.edited = true;
        }
        match &mut entry.slot.fate {
            Fate::Replace(el) => Ok(el),
            _ => Err(ApplyError::TargetMissing {
                target: format!("b{}", n),
            }),
        }
    }

    fn body_operation(&mut self, op: &EditOperation) -> Result<(), ApplyError> {
        let aliases = self.aliases();
        match op {
            EditOperation::ReplaceParagraph { block, content } => {
                let target = format!("b{}", block);
                let replaced = paragraph::replace(self.source(*block)?, content, aliases, &target)?;
                let entry = self.blocks.entry(*block).or_default();
                entry.slot.fate = Fate::Replace(replaced);
                entry.edited = true;
            }
            EditOperation::InsertParagraph {
                anchor,
                position,
                content,
            } => {
                self.block(*anchor)?;
                let new = paragraph::create(content, aliases, &format!("b{}", anchor))?;
                self.blocks.entry(*anchor).or_default().slot.insert(*position, new);
            }
            EditOperation::InsertTable {
                anchor,
                position,
                style_alias,
                rows,
            } => {
                self.block(*anchor)?;
                let new = table::build_table(style_alias, rows, aliases, &format!("b{}", anchor))?;
                self.blocks.entry(*anchor).or_default().slot.insert(*position, new);
            }
            EditOperation::DeleteBlock { block } => {
                self.block(*block)?;
                let entry = self.blocks.entry(*block).or_default();
                entry.slot.fate = Fate::Remove;
                entry.edited = false;
            }
            _ => {}
        }
        Ok(())
    }

    /// Bookmark a TOC entry should link to for a heading block
    fn heading_anchor(&mut self, heading: usize, target: &str) -> Result<String, ApplyError> {
        let block = self.block(heading)?;
        let Some(paragraph) = block.paragraph().filter(|_| block.is_heading()) else {
            return Err(ApplyError::Invalid {
                target: target.to_string(),
                message: format!("anchor block b{} is not a heading", heading),
            });
        };
        let entry = self.blocks.entry(heading).or_default();
        if matches!(entry.slot.fate, Fate::Remove) {
            return Err(ApplyError::AnchorRemoved {
                target: target.to_string(),
                block: heading,
            });
        }
        if let Some(name) = paragraph
            .bookmarks
            .iter()
            .find(|b| b.starts_with(&self.options.bookmark_prefix))
        {
            return Ok(name.clone());
        }
        if let Some((name, _)) = &entry.bookmark {
            return Ok(name.clone());
        }
        let (name, id) = self.bookmarks.allocate(&self.options.bookmark_prefix);
        log::debug!("Adding bookmark {} to heading b{}", name, heading);
        entry.bookmark = Some((name.clone(), id));
        Ok(name)
    }

    /// Heading a new TOC entry points at when the plan names none
    fn heading_by_title(&self, title: &str) -> Option<usize> {
        let matches: Vec<&Block> = self
            .extraction
            .headings()
            .filter(|b| b.paragraph().is_some_and(|p| p.text.trim() == title.trim()))
            .collect();
        match matches.as_slice() {
            [only] => Some(only.id.block()),
            _ => None,
        }
    }

    fn toc_operations(&mut self, block: usize, ops: &[&EditOperation]) -> Result<(), ApplyError> {
        let mut resolved = Vec::with_capacity(ops.len());
        for op in ops {
            let (entry, toc, inserting) = match op {
                EditOperation::ReplaceTocEntry { entry, toc, .. } => (*entry, Some(toc), false),
                EditOperation::InsertTocEntry { entry, toc, .. } => (*entry, Some(toc), true),
                EditOperation::DeleteTocEntry { entry, .. } => (*entry, None, false),
                _ => continue,
            };
            let target = format!("b{}:p{}", block, entry);
            let heading = toc.and_then(|t| {
                t.anchor_block
                    .or_else(|| inserting.then(|| self.heading_by_title(&t.title)).flatten())
            });
            let anchor = match heading {
                Some(h) => Some(self.heading_anchor(h, &target)?),
                None => None,
            };
            let level = heading
                .and_then(|h| self.extraction.block(h))
                .and_then(|b| b.kind.heading_level());
            resolved.push(toc::Resolved {
                op: *op,
                anchor,
                level,
            });
        }

        let aliases = self.aliases();
        let target = format!("b{}", block);
        let sdt = self.working_copy(block)?;
        toc::apply(sdt, &resolved, aliases, &target)
    }

    /// Body parts for the new document part
    fn finish(mut self) -> Result<Vec<BodyPart>, ApplyError> {
        let mut by_source: BTreeMap<usize, BlockSlot> = BTreeMap::new();
        let pending: Vec<usize> = self
            .blocks
            .iter()
            .filter(|(_, s)| s.bookmark.is_some())
            .map(|(n, _)| *n)
            .collect();
        for n in pending {
            let bookmark = self.blocks.get(&n).and_then(|s| s.bookmark.clone());
            if let Some((name, id)) = bookmark {
                inject_bookmark(self.working_copy(n)?, &name, id);
            }
        }
        for (n, slot) in std::mem::take(&mut self.blocks) {
            by_source.insert(self.block(n)?.source_index, slot);
        }

        let mut parts = Vec::with_capacity(self.body.children.len());
        for index in 0..self.body.children.len() {
            let Some(block) = by_source.remove(&index) else {
                parts.push(BodyPart::Original(index));
                continue;
            };
            let slot = block.slot;
            parts.extend(slot.before.into_iter().map(|el| BodyPart::New(Node::Element(el))));
            match slot.fate {
                Fate::Keep => parts.push(BodyPart::Original(index)),
                Fate::Replace(el) => parts.push(BodyPart::New(Node::Element(el))),
                Fate::Remove => {}
            }
            parts.extend(slot.after.into_iter().map(|el| BodyPart::New(Node::Element(el))));
        }
        Ok(parts)
    }
}

/// Apply a validated plan with default options
pub fn apply(
    snapshot: &Snapshot,
    extraction: &Extraction,
    plan: &ValidatedPlan,
) -> Result<Snapshot, ApplyError> {
    apply_with(snapshot, extraction, plan, &ApplyOptions::default())
}

/// Apply a validated plan, returning the mutated snapshot
///
/// `extraction` must be the extraction of `snapshot` the plan was validated
/// against.
pub fn apply_with(
    snapshot: &Snapshot,
    extraction: &Extraction,
    plan: &ValidatedPlan,
    options: &ApplyOptions,
) -> Result<Snapshot, ApplyError> {
    if plan.is_empty() {
        return Ok(snapshot.clone());
    }
    let document = snapshot.document();
    let body = document.body().ok_or(MarkupError::MissingBody)?;

    let mut mutator = Mutator {
        body,
        extraction,
        options,
        blocks: BTreeMap::new(),
        bookmarks: Bookmarks::scan(body),
    };

    // Body blocks first, then table internals, TOCs last so anchors see final headings
    let mut table_ops: BTreeMap<usize, Vec<&EditOperation>> = BTreeMap::new();
    let mut toc_ops: BTreeMap<usize, Vec<&EditOperation>> = BTreeMap::new();
    for op in plan.operations() {
        if op.is_toc_edit() {
            toc_ops.entry(op.block()).or_default().push(op);
            continue;
        }
        match op {
            EditOperation::ReplaceParagraph { .. }
            | EditOperation::InsertParagraph { .. }
            | EditOperation::InsertTable { .. }
            | EditOperation::DeleteBlock { .. } => mutator.body_operation(op)?,
            _ => table_ops.entry(op.block()).or_default().push(op),
        }
    }

    for (block, ops) in &table_ops {
        if mutator.block(*block)?.kind != BlockKind::Table {
            return Err(ApplyError::Invalid {
                target: format!("b{}", block),
                message: "table operation on a block that is not a table".to_string(),
            });
        }
        let aliases = mutator.aliases();
        let target = format!("b{}", block);
        let tbl = mutator.working_copy(*block)?;
        table::apply(tbl, ops, aliases, &target)?;
    }
    for (block, ops) in &toc_ops {
        if mutator.block(*block)?.kind != BlockKind::TableOfContents {
            return Err(ApplyError::Invalid {
                target: format!("b{}", block),
                message: "TOC operation on a block that is not a table of contents".to_string(),
            });
        }
        mutator.toc_operations(*block, ops)?;
    }

    let parts = mutator.finish()?;
    let xml = document.render_body(&parts)?;
    log::info!(
        "Applied {} operations ({} body parts)",
        plan.operations().len(),
        parts.len()
    );
    Ok(snapshot.with_document_xml(xml)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{snapshot, snapshot_with_parts};
    use crate::plan::{Action, EditPlan, EditRecord, EditUnit};
    use crate::validate::validate;

    fn run(body: &str, records: Vec<EditRecord>) -> (Snapshot, Extraction) {
        let before = snapshot(body);
        run_on(before, records)
    }

    fn run_on(before: Snapshot, records: Vec<EditRecord>) -> (Snapshot, Extraction) {
        let extraction = Extraction::from_snapshot(&before);
        let validation = validate(&EditPlan::new(records), &extraction);
        assert!(validation.report.valid, "{:?}", validation.report);
        let plan = validation.plan.unwrap();
        let after = apply(&before, &extraction, &plan).unwrap();
        let extraction = Extraction::from_snapshot(&after);
        (after, extraction)
    }

    fn texts(extraction: &Extraction) -> Vec<String> {
        extraction.blocks.iter().map(Block::text).collect()
    }

    #[test]
    fn test_rebuild_keeps_foreign_children() {
        // Arrange
        let mut parent = Element::new("w:tc")
            .with_child(Element::new("w:tcPr"))
            .with_child(Element::new("w:p").with_attr("n", "0"))
            .with_child(Element::new("w:p").with_attr("n", "1"));
        let mut slots = BTreeMap::new();
        slots.insert(
            0,
            Slot {
                before: vec![Element::new("w:p").with_attr("n", "new")],
                fate: Fate::Remove,
                after: Vec::new(),
            },
        );

        // Act
        rebuild(&mut parent, "w:p", slots);

        // Assert
        let names: Vec<String> = parent
            .elements()
            .map(|e| format!("{}{}", e.name, e.attr("n").unwrap_or("")))
            .collect();
        assert_eq!(names, vec!["w:tcPr", "w:pnew", "w:p1"]);
    }

    #[test]
    fn test_untouched_blocks_stay_byte_identical() {
        let body = r#"<w:p w:rsidR="00A1"><w:r><w:t>Keep me</w:t></w:r></w:p><w:p><w:r><w:t>Old</w:t></w:r></w:p>"#;
        let before = snapshot(body);

        let (after, extraction) = run_on(
            before.clone(),
            vec![EditRecord::new(Action::Replace, "b1").with_text("New")],
        );

        assert_eq!(texts(&extraction), vec!["Keep me", "New"]);
        assert_eq!(
            after.document().body_child_source(0),
            before.document().body_child_source(0)
        );
    }

    #[test]
    fn test_inserts_and_deletes_around_blocks() {
        let body = r#"<w:p><w:r><w:t>A</w:t></w:r></w:p><w:p><w:r><w:t>B</w:t></w:r></w:p><w:p><w:r><w:t>C</w:t></w:r></w:p>"#;

        let (_, extraction) = run(
            body,
            vec![
                EditRecord::new(Action::InsertAfter, "b0").with_text("A2").with_style("S1"),
                EditRecord::new(Action::InsertBefore, "b0").with_text("A0").with_style("S1"),
                EditRecord::new(Action::Delete, "b1"),
                EditRecord::new(Action::InsertAfter, "b1").with_text("B2").with_style("S1"),
                EditRecord::new(Action::InsertAfter, "b0").with_text("A3").with_style("S1"),
            ],
        );

        assert_eq!(texts(&extraction), vec!["A0", "A", "A2", "A3", "B2", "C"]);
    }

    #[test]
    fn test_empty_plan_returns_identical_document() {
        let before = snapshot(r#"<w:p><w:r><w:t>Same</w:t></w:r></w:p>"#);
        let extraction = Extraction::from_snapshot(&before);
        let plan = validate(&EditPlan::default(), &extraction).plan.unwrap();

        let after = apply(&before, &extraction, &plan).unwrap();

        assert!(!after.is_modified());
        assert_eq!(after.to_docx_bytes(false).unwrap(), before.package().bytes());
    }

    #[test]
    fn test_table_cell_replace_keeps_shape() {
        let body = r#"<w:tbl><w:tblGrid><w:gridCol w:w="3000"/><w:gridCol w:w="3000"/></w:tblGrid>
            <w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr>
            <w:tr><w:tc><w:p><w:r><w:t>c</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>d</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;

        let (_, extraction) = run(body, vec![EditRecord::new(Action::Replace, "b0:r0c0").with_text("changed")]);

        let table = extraction.blocks[0].table().unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!(table.is_rectangular());
        assert_eq!(extraction.blocks[0].text(), "changed | b\nc | d");
    }

    #[test]
    fn test_new_toc_entry_gets_heading_bookmark() {
        let body = r#"<w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Table of Contents"/></w:docPartObj></w:sdtPr><w:sdtContent>
          <w:p><w:pPr><w:pStyle w:val="TOC1"/></w:pPr><w:hyperlink w:anchor="_Toc1"><w:r><w:t>Intro</w:t></w:r><w:r><w:tab/></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText xml:space="preserve"> PAGEREF _Toc1 \h </w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>3</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:hyperlink></w:p>
          </w:sdtContent></w:sdt>
          <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:bookmarkStart w:id="0" w:name="_Toc1"/><w:r><w:t>Intro</w:t></w:r><w:bookmarkEnd w:id="0"/></w:p>
          <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Background</w:t></w:r></w:p>"#;
        let mut insert = EditRecord::new(Action::InsertAfter, "b0:p0").with_text("Background | 4");
        insert.anchor_block_id = Some("b2".into());

        let (_, extraction) = run(body, vec![insert]);

        let toc = extraction.blocks[0].toc().unwrap();
        assert_eq!(toc.entries.len(), 2);
        let entry = &toc.entries[1];
        assert_eq!(entry.title, "Background");
        assert_eq!(entry.page, "4");
        assert_eq!(entry.anchor.as_deref(), Some("_Toc00000001"));
        let heading = extraction.blocks[2].paragraph().unwrap();
        assert_eq!(heading.bookmarks, vec!["_Toc00000001".to_string()]);
        assert_eq!(toc.entries[0].anchor.as_deref(), Some("_Toc1"));
    }

    #[test]
    fn test_numbered_heading_delete_renumbers_survivors() {
        let numbering = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:abstractNum w:abstractNumId="0">
<w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/></w:lvl>
<w:lvl w:ilvl="1"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1-%2."/></w:lvl>
</w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
</w:numbering>"#;
        let heading = |level: u8, text: &str| {
            format!(
                r#"<w:p><w:pPr><w:pStyle w:val="Heading{}"/><w:numPr><w:ilvl w:val="{}"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
                level,
                level - 1,
                text
            )
        };
        let body = [
            heading(1, "Intro"),
            heading(2, "One"),
            heading(2, "Two"),
            heading(2, "Three"),
        ]
        .concat();
        let before = snapshot_with_parts(&body, None, Some(numbering));

        let (_, extraction) = run_on(before, vec![EditRecord::new(Action::Delete, "b2")]);

        let prefixes: Vec<Option<&str>> = extraction
            .blocks
            .iter()
            .map(|b| b.paragraph().and_then(|p| p.prefix()))
            .collect();
        assert_eq!(prefixes, vec![Some("1."), Some("1-1."), Some("1-2.")]);
    }

    #[test]
    fn test_column_insert_touches_every_row() {
        let body = r#"<w:tbl><w:tblGrid><w:gridCol w:w="4000"/><w:gridCol w:w="4000"/></w:tblGrid>
            <w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr>
            <w:tr><w:tc><w:p><w:r><w:t>c</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>d</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
        let record = EditRecord::new(Action::InsertAfter, "b0:c0")
            .with_text("x\ny")
            .with_unit(EditUnit::Column);

        let (after, extraction) = run(body, vec![record]);

        let table = extraction.blocks[0].table().unwrap();
        assert_eq!(table.column_count, 3);
        assert!(table.is_rectangular());
        assert_eq!(extraction.blocks[0].text(), "a | x | b\nc | y | d");
        let grid: Vec<String> = after
            .document()
            .body()
            .unwrap()
            .descendants_named("w:gridCol")
            .iter()
            .filter_map(|g| g.attr("w:w").map(str::to_string))
            .collect();
        assert_eq!(grid, vec!["2667", "2667", "2666"]);
    }
}
