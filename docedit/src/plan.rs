//! Edit plans
//!
//! Plans arrive as loose JSON records (`edits.json`); the validator turns
//! each record into an [`EditOperation`] whose variant carries exactly the
//! fields its action needs.

use crate::model::BlockKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading or amending an edit plan
#[derive(Debug, Error)]
pub enum PlanError {
    /// The plan file could not be read or written
    #[error("failed to access edit plan: {0}")]
    Io(#[from] std::io::Error),

    /// The plan is not valid JSON of the expected shape
    #[error("invalid edit plan JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An edit index outside the plan
    #[error("edit index {index} out of range (plan has {len} edits)")]
    EditIndex {
        /// Requested index
        index: usize,
        /// Number of edits
        len: usize,
    },

    /// Run fragments do not reassemble to the edit's new text
    #[error("run fragments of edit {index} concatenate to {actual:?}, expected {expected:?}")]
    RunConcatenationMismatch {
        /// Edit index
        index: usize,
        /// The edit's new text
        expected: String,
        /// Concatenated fragments
        actual: String,
    },

    /// A run fragment names a run style outside the template pool
    #[error("run style '{alias}' of edit {index} is not in the run style pool")]
    UnknownRunStyle {
        /// Edit index
        index: usize,
        /// Offending alias
        alias: String,
    },
}

/// Requested mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Swap content in place
    Replace,
    /// New content before the target
    InsertBefore,
    /// New content after the target
    InsertAfter,
    /// Remove the target
    Delete,
}

impl Action {
    /// Insert position, if this is an insert
    pub fn position(self) -> Option<Position> {
        match self {
            Action::InsertBefore => Some(Position::Before),
            Action::InsertAfter => Some(Position::After),
            _ => None,
        }
    }
}

/// Table granularity an edit works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditUnit {
    /// Single paragraph
    Paragraph,
    /// Single cell
    Cell,
    /// Whole row
    Row,
    /// Whole column
    Column,
    /// Whole table
    Table,
}

/// One formatted fragment of replacement text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFragment {
    /// Fragment text
    pub text: String,
    /// Run style alias (`R0`, ...)
    pub run_style: String,
}

/// One edit as written in `edits.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRecord {
    /// Requested mutation
    pub action: Action,
    /// Target block or sub-unit (`b3`, `b5:r1c2`, ...)
    pub target_id: String,
    /// Semantic tag of the new content (`H2`, `BODY`, `TBL`, `TOC`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_tag: Option<String>,
    /// New text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_text: Option<String>,
    /// Paragraph style alias (`S2`) or, for table inserts, the table alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_alias: Option<String>,
    /// Table granularity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_unit: Option<EditUnit>,
    /// Table shell alias for table inserts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_style_alias: Option<String>,
    /// One row style alias per new row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_style_aliases: Option<Vec<String>>,
    /// One list of cell style aliases per new row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_style_aliases: Option<Vec<Vec<String>>>,
    /// TOC level alias for TOC entry edits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toc_level_alias: Option<String>,
    /// Heading block a TOC entry points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_block_id: Option<String>,
    /// Formatted fragments of `new_text`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<RunFragment>>,
    /// Run style pool overriding the paragraph template's: alias to `w:rPr` markup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_style_templates: Option<BTreeMap<String, String>>,
}

impl EditRecord {
    /// A record with only the action and target set
    pub fn new(action: Action, target_id: impl Into<String>) -> Self {
        Self {
            action,
            target_id: target_id.into(),
            semantic_tag: None,
            new_text: None,
            style_alias: None,
            edit_unit: None,
            table_style_alias: None,
            row_style_aliases: None,
            cell_style_aliases: None,
            toc_level_alias: None,
            anchor_block_id: None,
            runs: None,
            run_style_templates: None,
        }
    }

    /// Builder-style text setter
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.new_text = Some(text.into());
        self
    }

    /// Builder-style style alias setter
    pub fn with_style(mut self, alias: impl Into<String>) -> Self {
        self.style_alias = Some(alias.into());
        self
    }

    /// Builder-style semantic tag setter
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.semantic_tag = Some(tag.into());
        self
    }

    /// Builder-style edit unit setter
    pub fn with_unit(mut self, unit: EditUnit) -> Self {
        self.edit_unit = Some(unit);
        self
    }
}

/// An ordered list of edits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditPlan {
    /// Edits in plan order
    pub edits: Vec<EditRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanWire {
    Wrapped { edits: Vec<EditRecord> },
    Bare(Vec<EditRecord>),
}

impl<'de> Deserialize<'de> for EditPlan {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let edits = match PlanWire::deserialize(deserializer)? {
            PlanWire::Wrapped { edits } | PlanWire::Bare(edits) => edits,
        };
        Ok(Self { edits })
    }
}

impl EditPlan {
    /// Wrap a list of edits
    pub fn new(edits: Vec<EditRecord>) -> Self {
        Self { edits }
    }

    /// Parse `{"edits": [...]}` or a bare array
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a plan file
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the plan as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), PlanError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether the plan has no edits
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Attach run fragments to an edit after checking they reassemble its text
    pub fn set_runs(&mut self, index: usize, runs: Vec<RunFragment>) -> Result<(), PlanError> {
        let len = self.edits.len();
        let edit = self
            .edits
            .get_mut(index)
            .ok_or(PlanError::EditIndex { index, len })?;
        let expected = edit.new_text.clone().unwrap_or_default();
        let actual: String = runs.iter().map(|r| r.text.as_str()).collect();
        if actual != expected {
            return Err(PlanError::RunConcatenationMismatch {
                index,
                expected,
                actual,
            });
        }
        edit.runs = Some(runs);
        Ok(())
    }
}

/// Side of the target an insert goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Before the target
    Before,
    /// After the target
    After,
}

/// New paragraph content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphEdit {
    /// Paragraph text, no newlines
    pub text: String,
    /// Paragraph style alias to build from
    pub style_alias: String,
    /// Whether the style differs from the target's (kind change or insert)
    pub restyle: bool,
    /// Formatted fragments, when distributed
    pub runs: Option<Vec<RunFragment>>,
    /// Run pool override: alias to `w:rPr` markup
    pub run_templates: Option<BTreeMap<String, String>>,
}

/// New cell content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    /// Cell text
    pub text: String,
    /// Cell style alias, if chosen
    pub style_alias: Option<String>,
}

/// New row content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEdit {
    /// Row style alias, if chosen
    pub style_alias: Option<String>,
    /// Cells in order
    pub cells: Vec<CellEdit>,
}

/// New TOC entry content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEdit {
    /// Number part
    pub number: String,
    /// Title part
    pub title: String,
    /// Page text; `None` keeps the page of the entry the content is built from
    pub page: Option<String>,
    /// TOC level alias to build from
    pub level_alias: Option<String>,
    /// Heading block the entry points at
    pub anchor_block: Option<usize>,
}

/// A typed edit; indices refer to the extraction the plan was validated against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOperation {
    /// Replace a body paragraph
    ReplaceParagraph {
        /// Block index
        block: usize,
        /// New content
        content: ParagraphEdit,
    },
    /// New body paragraph next to a block
    InsertParagraph {
        /// Anchor block index
        anchor: usize,
        /// Side of the anchor
        position: Position,
        /// New content
        content: ParagraphEdit,
    },
    /// Remove a whole block
    DeleteBlock {
        /// Block index
        block: usize,
    },
    /// New table next to a block
    InsertTable {
        /// Anchor block index
        anchor: usize,
        /// Side of the anchor
        position: Position,
        /// Table shell alias
        style_alias: String,
        /// Rows
        rows: Vec<RowEdit>,
    },
    /// Replace the text of a cell, one paragraph per line
    ReplaceCell {
        /// Table block index
        block: usize,
        /// Row
        row: usize,
        /// Column
        col: usize,
        /// Paragraph texts
        lines: Vec<String>,
    },
    /// Replace one paragraph of a cell
    ReplaceCellParagraph {
        /// Table block index
        block: usize,
        /// Row
        row: usize,
        /// Column
        col: usize,
        /// Paragraph within the cell
        para: usize,
        /// New content
        content: ParagraphEdit,
    },
    /// New paragraph inside a cell
    InsertCellParagraph {
        /// Table block index
        block: usize,
        /// Row
        row: usize,
        /// Column
        col: usize,
        /// Anchor paragraph within the cell
        para: usize,
        /// Side of the anchor
        position: Position,
        /// New content
        content: ParagraphEdit,
    },
    /// Remove one paragraph of a cell
    DeleteCellParagraph {
        /// Table block index
        block: usize,
        /// Row
        row: usize,
        /// Column
        col: usize,
        /// Paragraph within the cell
        para: usize,
    },
    /// Replace the cell texts of a row
    ReplaceRow {
        /// Table block index
        block: usize,
        /// Row
        row: usize,
        /// One text per cell
        cells: Vec<String>,
    },
    /// New rows next to a row
    InsertRow {
        /// Table block index
        block: usize,
        /// Anchor row
        row: usize,
        /// Side of the anchor
        position: Position,
        /// New rows
        rows: Vec<RowEdit>,
    },
    /// Remove a row
    DeleteRow {
        /// Table block index
        block: usize,
        /// Row
        row: usize,
    },
    /// New column next to a column, one cell per row
    InsertColumn {
        /// Table block index
        block: usize,
        /// Anchor column
        col: usize,
        /// Side of the anchor
        position: Position,
        /// One cell per row
        cells: Vec<CellEdit>,
    },
    /// Remove a column from every row
    DeleteColumn {
        /// Table block index
        block: usize,
        /// Column
        col: usize,
    },
    /// Replace a TOC entry
    ReplaceTocEntry {
        /// TOC block index
        block: usize,
        /// Entry paragraph
        entry: usize,
        /// New content
        toc: TocEdit,
    },
    /// New TOC entry next to an entry
    InsertTocEntry {
        /// TOC block index
        block: usize,
        /// Anchor entry paragraph
        entry: usize,
        /// Side of the anchor
        position: Position,
        /// New content
        toc: TocEdit,
    },
    /// Remove a TOC entry
    DeleteTocEntry {
        /// TOC block index
        block: usize,
        /// Entry paragraph
        entry: usize,
    },
}

impl EditOperation {
    /// Body block the operation works in or next to
    pub fn block(&self) -> usize {
        match self {
            EditOperation::ReplaceParagraph { block, .. }
            | EditOperation::DeleteBlock { block }
            | EditOperation::ReplaceCell { block, .. }
            | EditOperation::ReplaceCellParagraph { block, .. }
            | EditOperation::InsertCellParagraph { block, .. }
            | EditOperation::DeleteCellParagraph { block, .. }
            | EditOperation::ReplaceRow { block, .. }
            | EditOperation::InsertRow { block, .. }
            | EditOperation::DeleteRow { block, .. }
            | EditOperation::InsertColumn { block, .. }
            | EditOperation::DeleteColumn { block, .. }
            | EditOperation::ReplaceTocEntry { block, .. }
            | EditOperation::InsertTocEntry { block, .. }
            | EditOperation::DeleteTocEntry { block, .. } => *block,
            EditOperation::InsertParagraph { anchor, .. }
            | EditOperation::InsertTable { anchor, .. } => *anchor,
        }
    }

    /// Whether the operation adds or removes body blocks
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EditOperation::InsertParagraph { .. }
                | EditOperation::InsertTable { .. }
                | EditOperation::DeleteBlock { .. }
        )
    }

    /// Whether the operation changes the TOC directly
    pub fn is_toc_edit(&self) -> bool {
        matches!(
            self,
            EditOperation::ReplaceTocEntry { .. }
                | EditOperation::InsertTocEntry { .. }
                | EditOperation::DeleteTocEntry { .. }
        )
    }
}

/// Split row text into trimmed cells
pub fn split_cells(text: &str) -> Vec<String> {
    text.split('|').map(|c| c.trim().to_string()).collect()
}

/// Split table text into rows of trimmed cells
pub fn split_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(split_cells)
        .collect()
}

/// Split TOC entry text `number title | page` into its parts
pub fn split_toc_text(text: &str) -> (String, String, Option<String>) {
    let (head, page) = match text.rsplit_once('|') {
        Some((head, page)) => (head, Some(page.trim().to_string())),
        None => (text, None),
    };
    let (number, title) = crate::extract::toc::split_number(head);
    (number, title, page)
}

/// Parse an optional semantic tag
pub fn parse_tag(tag: Option<&str>) -> Result<Option<BlockKind>, String> {
    tag.map(str::parse::<BlockKind>).transpose()
}
