//! Edit plan validation
//!
//! Every edit is checked on its own against the extraction and all issues
//! are collected, so one report lists everything wrong with a plan. Only a
//! report without errors yields a [`ValidatedPlan`], the sole input the
//! mutator accepts.

use crate::alias::{AliasFamily, AliasRef};
use crate::extract::Extraction;
use crate::markup::parse_element;
use crate::model::{Block, BlockContent, BlockKind, Numbering, Paragraph, Table, TargetId};
use crate::plan::{
    parse_tag, split_cells, split_rows, split_toc_text, Action, CellEdit, EditOperation, EditPlan, EditRecord,
    EditUnit, ParagraphEdit, Position, RowEdit, TocEdit,
};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Machine-readable reason attached to every issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// The target id names nothing in the extraction
    TargetNotFound,
    /// A field the action needs is absent
    MissingRequiredField,
    /// Cell or line counts disagree with the table shape
    ColumnCountMismatch,
    /// A style alias is not in the alias table or has the wrong family
    StyleAliasUnknown,
    /// A replace changes the style alias without changing the kind
    StyleAliasMismatch,
    /// Run fragments do not reassemble to the new text
    RunConcatenationMismatch,
    /// The numbering of an affected block cannot be computed
    NumberingIndeterminate,
    /// A TOC entry's anchor block is not a heading
    AnchorResolutionFailure,
    /// New text breaks a content rule (embedded newline, bad markup)
    InvalidText,
    /// The target exists but cannot take this action
    InvalidTarget,
    /// Two edits touch the same unit or must run in separate passes
    ConflictingEdit,
    /// A heading change leaves the TOC out of date
    TocCascade,
    /// An insert or delete renumbers later blocks
    NumberingCascade,
    /// The edit's semantic tag differs from the block's
    SemanticTagMismatch,
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueCode::TargetNotFound => "target_not_found",
            IssueCode::MissingRequiredField => "missing_required_field",
            IssueCode::ColumnCountMismatch => "column_count_mismatch",
            IssueCode::StyleAliasUnknown => "style_alias_unknown",
            IssueCode::StyleAliasMismatch => "style_alias_mismatch",
            IssueCode::RunConcatenationMismatch => "run_concatenation_mismatch",
            IssueCode::NumberingIndeterminate => "numbering_indeterminate",
            IssueCode::AnchorResolutionFailure => "anchor_resolution_failure",
            IssueCode::InvalidText => "invalid_text",
            IssueCode::InvalidTarget => "invalid_target",
            IssueCode::ConflictingEdit => "conflicting_edit",
            IssueCode::TocCascade => "toc_cascade",
            IssueCode::NumberingCascade => "numbering_cascade",
            IssueCode::SemanticTagMismatch => "semantic_tag_mismatch",
        };
        write!(f, "{}", name)
    }
}

/// One finding about one edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Position of the edit in the plan
    pub edit_index: usize,
    /// The edit's target id as written
    pub target_id: String,
    /// Reason code
    pub code: IssueCode,
    /// Human-readable explanation
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "edit {} ({}): [{}] {}",
            self.edit_index, self.target_id, self.code, self.message
        )
    }
}

/// Validation outcome in wire form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Whether the plan has no errors
    pub valid: bool,
    /// Blocking issues
    pub errors: Vec<Issue>,
    /// Advisories that do not block the plan
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    /// Whether any issue carries the code
    pub fn has(&self, code: IssueCode) -> bool {
        self.errors
            .iter()
            .chain(&self.warnings)
            .any(|i| i.code == code)
    }
}

/// A plan whose every edit passed validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedPlan {
    operations: Vec<EditOperation>,
    touches_headings: bool,
}

impl ValidatedPlan {
    /// Typed operations in plan order
    pub fn operations(&self) -> &[EditOperation] {
        &self.operations
    }

    /// Whether the plan adds, removes, renames or renumbers headings
    pub fn touches_headings(&self) -> bool {
        self.touches_headings
    }

    /// Whether the plan has no operations
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Report plus the validated plan when the report is clean
#[derive(Debug, Clone)]
pub struct Validation {
    /// Report
    pub report: ValidationReport,
    /// Present when `report.valid`
    pub plan: Option<ValidatedPlan>,
}

/// Unit an operation reads or writes, for conflict detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Step {
    Block(usize),
    Row(usize),
    Col(usize),
    Para(usize),
    Entry(usize),
    Column(usize),
}

#[derive(Debug)]
struct Scope {
    index: usize,
    path: Vec<Step>,
    exclusive: bool,
}

fn scope_of(op: &EditOperation) -> (Vec<Step>, bool) {
    use EditOperation::*;
    use Step::*;
    match op {
        ReplaceParagraph { block, .. } | DeleteBlock { block } => (vec![Block(*block)], true),
        InsertParagraph { anchor, .. } | InsertTable { anchor, .. } => (vec![Block(*anchor)], false),
        ReplaceCell {
            block, row, col, ..
        } => (vec![Block(*block), Row(*row), Col(*col)], true),
        ReplaceCellParagraph {
            block,
            row,
            col,
            para,
            ..
        }
        | DeleteCellParagraph {
            block,
            row,
            col,
            para,
        } => (vec![Block(*block), Row(*row), Col(*col), Para(*para)], true),
        InsertCellParagraph {
            block,
            row,
            col,
            para,
            ..
        } => (vec![Block(*block), Row(*row), Col(*col), Para(*para)], false),
        ReplaceRow { block, row, .. } | DeleteRow { block, row } => {
            (vec![Block(*block), Row(*row)], true)
        }
        InsertRow { block, row, .. } => (vec![Block(*block), Row(*row)], false),
        InsertColumn { block, col, .. } => (vec![Block(*block), Column(*col)], false),
        DeleteColumn { block, col } => (vec![Block(*block), Column(*col)], true),
        ReplaceTocEntry { block, entry, .. } | DeleteTocEntry { block, entry } => {
            (vec![Block(*block), Entry(*entry)], true)
        }
        InsertTocEntry { block, entry, .. } => (vec![Block(*block), Entry(*entry)], false),
    }
}

struct Checker<'a> {
    extraction: &'a Extraction,
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
}

/// Per-edit context for issue reporting
struct Edit<'r> {
    index: usize,
    record: &'r EditRecord,
}

impl<'a> Checker<'a> {
    fn error(&mut self, edit: &Edit<'_>, code: IssueCode, message: impl Into<String>) {
        self.errors.push(Issue {
            edit_index: edit.index,
            target_id: edit.record.target_id.clone(),
            code,
            message: message.into(),
        });
    }

    fn warn(&mut self, edit: &Edit<'_>, code: IssueCode, message: impl Into<String>) {
        self.warnings.push(Issue {
            edit_index: edit.index,
            target_id: edit.record.target_id.clone(),
            code,
            message: message.into(),
        });
    }

    fn required_text(&mut self, edit: &Edit<'_>) -> Option<String> {
        match &edit.record.new_text {
            Some(text) => Some(text.clone()),
            None => {
                self.error(
                    edit,
                    IssueCode::MissingRequiredField,
                    format!("new_text is required for {:?}", edit.record.action),
                );
                None
            }
        }
    }

    fn single_line_text(&mut self, edit: &Edit<'_>) -> Option<String> {
        let text = self.required_text(edit)?;
        if text.contains('\n') || text.contains('\r') {
            self.error(
                edit,
                IssueCode::InvalidText,
                "new_text contains a newline; split it into separate edits",
            );
            return None;
        }
        Some(text)
    }

    fn check_alias(&mut self, edit: &Edit<'_>, alias: &str, family: AliasFamily, field: &str) -> bool {
        let known = match self.extraction.aliases.resolve(alias) {
            Some(found) => matches!(
                (family, found),
                (AliasFamily::Paragraph, AliasRef::Paragraph(_))
                    | (AliasFamily::Table, AliasRef::Table(_))
                    | (AliasFamily::Row, AliasRef::Row(_))
                    | (AliasFamily::Cell, AliasRef::Cell(_))
                    | (AliasFamily::TocLevel, AliasRef::TocLevel(_))
            ),
            None => false,
        };
        if !known {
            self.error(
                edit,
                IssueCode::StyleAliasUnknown,
                format!("{} '{}' is not a known {} alias", field, alias, family),
            );
        }
        known
    }

    fn table_of<'b>(&mut self, edit: &Edit<'_>, block: &'b Block) -> Option<&'b Table> {
        let table = block.table();
        if table.is_none() {
            self.error(
                edit,
                IssueCode::InvalidTarget,
                format!("{} is not a table", block.id),
            );
        }
        table
    }

    fn first_alias_of_kind(&self, kind: BlockKind) -> Option<String> {
        self.extraction
            .aliases
            .paragraphs
            .iter()
            .find(|t| t.kind == kind)
            .map(|t| t.alias.clone())
    }

    /// Check run fragments and the run pool of a paragraph edit
    fn check_runs(&mut self, edit: &Edit<'_>, text: &str, style_alias: &str) -> bool {
        let record = edit.record;
        let mut ok = true;

        if let Some(pool) = &record.run_style_templates {
            for (alias, xml) in pool {
                if !parse_element(xml).is_ok_and(|el| el.is("w:rPr")) {
                    self.error(
                        edit,
                        IssueCode::InvalidText,
                        format!("run_style_templates['{}'] is not a w:rPr element", alias),
                    );
                    ok = false;
                }
            }
        }

        let Some(runs) = &record.runs else {
            return ok;
        };
        let concat: String = runs.iter().map(|r| r.text.as_str()).collect();
        if concat != text {
            self.error(
                edit,
                IssueCode::RunConcatenationMismatch,
                format!("runs concatenate to {:?} but new_text is {:?}", concat, text),
            );
            ok = false;
        }

        let pool: Vec<String> = match &record.run_style_templates {
            Some(pool) => pool.keys().cloned().collect(),
            None => self
                .extraction
                .aliases
                .paragraph(style_alias)
                .map(|t| t.runs.iter().map(|r| r.alias.clone()).collect())
                .unwrap_or_default(),
        };
        for (j, run) in runs.iter().enumerate() {
            if !pool.contains(&run.run_style) {
                self.error(
                    edit,
                    IssueCode::StyleAliasUnknown,
                    format!(
                        "runs[{}].run_style '{}' is not in the run style pool of {}",
                        j, run.run_style, style_alias
                    ),
                );
                ok = false;
            }
        }
        ok
    }

    fn replace_content(
        &mut self,
        edit: &Edit<'_>,
        original: &Paragraph,
        original_kind: BlockKind,
        tag: Option<BlockKind>,
    ) -> Option<ParagraphEdit> {
        let text = self.single_line_text(edit)?;
        let kind_changes = tag.is_some_and(|t| t != original_kind);
        if kind_changes {
            self.warn(
                edit,
                IssueCode::SemanticTagMismatch,
                format!(
                    "semantic kind changes from {} to {}",
                    original_kind,
                    tag.map(|t| t.to_string()).unwrap_or_default()
                ),
            );
        }

        let style_alias = match (&edit.record.style_alias, kind_changes, tag) {
            (Some(alias), _, _) => {
                if !self.check_alias(edit, alias, AliasFamily::Paragraph, "style_alias") {
                    return None;
                }
                if *alias != original.style_alias && !kind_changes {
                    self.error(
                        edit,
                        IssueCode::StyleAliasMismatch,
                        format!(
                            "style_alias '{}' differs from the original '{}' while the kind stays {}",
                            alias, original.style_alias, original_kind
                        ),
                    );
                    return None;
                }
                alias.clone()
            }
            (None, true, Some(kind)) => match self.first_alias_of_kind(kind) {
                Some(alias) => alias,
                None => {
                    self.error(
                        edit,
                        IssueCode::MissingRequiredField,
                        format!("style_alias is required: no existing paragraph style is {}", kind),
                    );
                    return None;
                }
            },
            _ => original.style_alias.clone(),
        };

        if !self.check_runs(edit, &text, &style_alias) {
            return None;
        }
        Some(ParagraphEdit {
            restyle: style_alias != original.style_alias,
            text,
            style_alias,
            runs: edit.record.runs.clone(),
            run_templates: edit.record.run_style_templates.clone(),
        })
    }

    fn insert_content(
        &mut self,
        edit: &Edit<'_>,
        tag: Option<BlockKind>,
        fallback_alias: Option<&str>,
    ) -> Option<ParagraphEdit> {
        let text = self.single_line_text(edit)?;
        let style_alias = match (&edit.record.style_alias, tag) {
            (Some(alias), _) => {
                if !self.check_alias(edit, alias, AliasFamily::Paragraph, "style_alias") {
                    return None;
                }
                alias.clone()
            }
            (None, Some(kind)) if kind.is_paragraph() => match self.first_alias_of_kind(kind) {
                Some(alias) => alias,
                None => {
                    self.error(
                        edit,
                        IssueCode::MissingRequiredField,
                        format!("style_alias is required: no existing paragraph style is {}", kind),
                    );
                    return None;
                }
            },
            _ => match fallback_alias {
                Some(alias) => alias.to_string(),
                None => {
                    self.error(
                        edit,
                        IssueCode::MissingRequiredField,
                        "style_alias is required for paragraph inserts",
                    );
                    return None;
                }
            },
        };

        if let (Some(kind), Some(template)) = (tag, self.extraction.aliases.paragraph(&style_alias)) {
            if kind != template.kind {
                self.warn(
                    edit,
                    IssueCode::SemanticTagMismatch,
                    format!(
                        "semantic_tag {} differs from the kind {} of style {}",
                        kind, template.kind, style_alias
                    ),
                );
            }
        }

        if !self.check_runs(edit, &text, &style_alias) {
            return None;
        }
        Some(ParagraphEdit {
            text,
            style_alias,
            restyle: true,
            runs: edit.record.runs.clone(),
            run_templates: edit.record.run_style_templates.clone(),
        })
    }

    /// Build new rows for row and table inserts
    fn new_rows(
        &mut self,
        edit: &Edit<'_>,
        column_count: Option<usize>,
        aliases_required: bool,
    ) -> Option<Vec<RowEdit>> {
        let text = self.required_text(edit)?;
        let rows = split_rows(&text);
        if rows.is_empty() {
            self.error(edit, IssueCode::InvalidText, "new_text holds no rows");
            return None;
        }

        let width = column_count.unwrap_or(rows[0].len());
        let mut ok = true;
        for (i, cells) in rows.iter().enumerate() {
            if cells.len() != width {
                self.error(
                    edit,
                    IssueCode::ColumnCountMismatch,
                    format!("row {} of new_text has {} cells, expected {}", i, cells.len(), width),
                );
                ok = false;
            }
        }

        let record = edit.record;
        let row_aliases = record.row_style_aliases.clone().unwrap_or_default();
        let cell_aliases = record.cell_style_aliases.clone().unwrap_or_default();
        if aliases_required {
            if row_aliases.is_empty() {
                self.error(
                    edit,
                    IssueCode::MissingRequiredField,
                    "row_style_aliases is required for row inserts",
                );
                ok = false;
            }
            if cell_aliases.is_empty() {
                self.error(
                    edit,
                    IssueCode::MissingRequiredField,
                    "cell_style_aliases is required for row inserts",
                );
                ok = false;
            }
        }
        if !row_aliases.is_empty() && row_aliases.len() != 1 && row_aliases.len() != rows.len() {
            self.error(
                edit,
                IssueCode::ColumnCountMismatch,
                format!(
                    "row_style_aliases has {} entries for {} rows",
                    row_aliases.len(),
                    rows.len()
                ),
            );
            ok = false;
        }
        if !cell_aliases.is_empty() && cell_aliases.len() != 1 && cell_aliases.len() != rows.len() {
            self.error(
                edit,
                IssueCode::ColumnCountMismatch,
                format!(
                    "cell_style_aliases has {} rows for {} new rows",
                    cell_aliases.len(),
                    rows.len()
                ),
            );
            ok = false;
        }
        for aliases in &cell_aliases {
            if aliases.len() != width {
                self.error(
                    edit,
                    IssueCode::ColumnCountMismatch,
                    format!("cell_style_aliases row has {} entries, expected {}", aliases.len(), width),
                );
                ok = false;
            }
        }
        for alias in &row_aliases {
            ok &= self.check_alias(edit, alias, AliasFamily::Row, "row_style_aliases");
        }
        for alias in cell_aliases.iter().flatten() {
            ok &= self.check_alias(edit, alias, AliasFamily::Cell, "cell_style_aliases");
        }
        if !ok {
            return None;
        }

        let pick = |list_len: usize, i: usize| if list_len == 1 { 0 } else { i };
        Some(
            rows.into_iter()
                .enumerate()
                .map(|(i, cells)| RowEdit {
                    style_alias: row_aliases.get(pick(row_aliases.len(), i)).cloned(),
                    cells: cells
                        .into_iter()
                        .enumerate()
                        .map(|(c, text)| CellEdit {
                            text,
                            style_alias: cell_aliases
                                .get(pick(cell_aliases.len(), i))
                                .and_then(|row| row.get(c))
                                .cloned(),
                        })
                        .collect(),
                })
                .collect(),
        )
    }

    fn new_column(&mut self, edit: &Edit<'_>, table: &Table) -> Option<Vec<CellEdit>> {
        let text = self.required_text(edit)?;
        let lines: Vec<String> = text
            .trim_end_matches('\n')
            .split('\n')
            .map(|l| l.trim().to_string())
            .collect();
        let mut ok = true;
        if lines.len() != table.rows.len() {
            self.error(
                edit,
                IssueCode::ColumnCountMismatch,
                format!(
                    "new_text has {} lines but the table has {} rows",
                    lines.len(),
                    table.rows.len()
                ),
            );
            ok = false;
        }
        if !table.is_rectangular() {
            self.error(
                edit,
                IssueCode::ColumnCountMismatch,
                "column edits need every row to have the same number of cells",
            );
            ok = false;
        }

        let aliases: Vec<String> = edit
            .record
            .cell_style_aliases
            .iter()
            .flatten()
            .flatten()
            .cloned()
            .collect();
        if !aliases.is_empty() && aliases.len() != 1 && aliases.len() != table.rows.len() {
            self.error(
                edit,
                IssueCode::ColumnCountMismatch,
                format!(
                    "cell_style_aliases has {} entries for {} rows",
                    aliases.len(),
                    table.rows.len()
                ),
            );
            ok = false;
        }
        for alias in &aliases {
            ok &= self.check_alias(edit, alias, AliasFamily::Cell, "cell_style_aliases");
        }
        if !ok {
            return None;
        }
        Some(
            lines
                .into_iter()
                .enumerate()
                .map(|(i, text)| CellEdit {
                    text,
                    style_alias: aliases
                        .get(if aliases.len() == 1 { 0 } else { i })
                        .cloned(),
                })
                .collect(),
        )
    }

    fn toc_content(&mut self, edit: &Edit<'_>) -> Option<TocEdit> {
        let text = self.single_line_text(edit)?;
        let (number, title, page) = split_toc_text(&text);
        let record = edit.record;

        if let Some(alias) = &record.toc_level_alias {
            if !self.check_alias(edit, alias, AliasFamily::TocLevel, "toc_level_alias") {
                return None;
            }
        }

        let anchor_block = match &record.anchor_block_id {
            None => None,
            Some(id) => {
                let heading = match id.parse::<TargetId>() {
                    Ok(TargetId::Block(n)) => self.extraction.block(n).filter(|b| b.is_heading()),
                    _ => None,
                };
                match heading {
                    Some(block) => Some(block.id.block()),
                    None => {
                        self.error(
                            edit,
                            IssueCode::AnchorResolutionFailure,
                            format!("anchor_block_id '{}' is not a heading block", id),
                        );
                        return None;
                    }
                }
            }
        };

        Some(TocEdit {
            number,
            title,
            page,
            level_alias: record.toc_level_alias.clone(),
            anchor_block,
        })
    }

    /// Turn a record into a typed operation, reporting why it cannot be
    fn convert(&mut self, edit: &Edit<'_>) -> Option<EditOperation> {
        let record = edit.record;
        let target = match record.target_id.parse::<TargetId>() {
            Ok(target) => target,
            Err(message) => {
                self.error(edit, IssueCode::InvalidTarget, message);
                return None;
            }
        };
        let tag = match parse_tag(record.semantic_tag.as_deref()) {
            Ok(tag) => tag,
            Err(message) => {
                self.error(edit, IssueCode::InvalidText, message);
                return None;
            }
        };
        let extraction = self.extraction;
        let Some(block) = extraction.block(target.block()) else {
            self.error(
                edit,
                IssueCode::TargetNotFound,
                format!(
                    "block {} does not exist (document has {} blocks)",
                    target.block_id(),
                    extraction.blocks.len()
                ),
            );
            return None;
        };

        match target {
            TargetId::Block(n) => self.convert_block(edit, n, block, tag),
            TargetId::Row { block: n, row } => {
                let table = self.table_of(edit, block)?;
                self.convert_row(edit, n, row, table)
            }
            TargetId::Cell { block: n, row, col } => {
                let table = self.table_of(edit, block)?;
                if table.cell(row, col).is_none() {
                    self.error(
                        edit,
                        IssueCode::TargetNotFound,
                        format!("cell ({}, {}) is outside the table", row, col),
                    );
                    return None;
                }
                match record.action {
                    Action::Replace => {
                        let text = self.required_text(edit)?;
                        let lines = text
                            .trim_end_matches('\n')
                            .split('\n')
                            .map(|l| l.trim_end_matches('\r').to_string())
                            .collect();
                        Some(EditOperation::ReplaceCell {
                            block: n,
                            row,
                            col,
                            lines,
                        })
                    }
                    _ => {
                        self.error(
                            edit,
                            IssueCode::InvalidTarget,
                            "single cells cannot be inserted or deleted; use row or column edits",
                        );
                        None
                    }
                }
            }
            TargetId::CellParagraph {
                block: n,
                row,
                col,
                para,
            } => {
                let table = self.table_of(edit, block)?;
                let Some(cell) = table.cell(row, col) else {
                    self.error(
                        edit,
                        IssueCode::TargetNotFound,
                        format!("cell ({}, {}) is outside the table", row, col),
                    );
                    return None;
                };
                let Some(original) = cell.paragraphs.get(para) else {
                    self.error(
                        edit,
                        IssueCode::TargetNotFound,
                        format!(
                            "paragraph {} is outside cell ({}, {}) which has {}",
                            para,
                            row,
                            col,
                            cell.paragraphs.len()
                        ),
                    );
                    return None;
                };
                match record.action {
                    Action::Replace => {
                        let content =
                            self.replace_content(edit, &original.paragraph, original.kind, tag)?;
                        Some(EditOperation::ReplaceCellParagraph {
                            block: n,
                            row,
                            col,
                            para,
                            content,
                        })
                    }
                    Action::InsertBefore | Action::InsertAfter => {
                        let content =
                            self.insert_content(edit, tag, Some(&original.paragraph.style_alias))?;
                        Some(EditOperation::InsertCellParagraph {
                            block: n,
                            row,
                            col,
                            para,
                            position: record.action.position().unwrap_or(Position::After),
                            content,
                        })
                    }
                    Action::Delete => {
                        if cell.paragraphs.len() == 1 {
                            self.error(
                                edit,
                                IssueCode::InvalidTarget,
                                "a cell must keep at least one paragraph; replace its text instead",
                            );
                            return None;
                        }
                        Some(EditOperation::DeleteCellParagraph {
                            block: n,
                            row,
                            col,
                            para,
                        })
                    }
                }
            }
            TargetId::Column { block: n, col } => {
                let table = self.table_of(edit, block)?;
                self.convert_column(edit, n, col, table)
            }
            TargetId::TocEntry { block: n, entry } => {
                let Some(toc) = block.toc() else {
                    self.error(
                        edit,
                        IssueCode::InvalidTarget,
                        format!("{} is not a table of contents", block.id),
                    );
                    return None;
                };
                if entry >= toc.entries.len() {
                    self.error(
                        edit,
                        IssueCode::TargetNotFound,
                        format!(
                            "entry {} is outside the TOC which has {} paragraphs",
                            entry,
                            toc.entries.len()
                        ),
                    );
                    return None;
                }
                match record.action.position() {
                    _ if record.action == Action::Delete => {
                        Some(EditOperation::DeleteTocEntry { block: n, entry })
                    }
                    Some(position) => Some(EditOperation::InsertTocEntry {
                        block: n,
                        entry,
                        position,
                        toc: self.toc_content(edit)?,
                    }),
                    None => Some(EditOperation::ReplaceTocEntry {
                        block: n,
                        entry,
                        toc: self.toc_content(edit)?,
                    }),
                }
            }
        }
    }

    fn convert_block(
        &mut self,
        edit: &Edit<'_>,
        n: usize,
        block: &Block,
        tag: Option<BlockKind>,
    ) -> Option<EditOperation> {
        let record = edit.record;
        if matches!(record.action, Action::Replace | Action::Delete) {
            if let Some(tag) = tag {
                let is_paragraph_replace = record.action == Action::Replace && block.paragraph().is_some();
                if tag != block.kind && !is_paragraph_replace {
                    self.warn(
                        edit,
                        IssueCode::SemanticTagMismatch,
                        format!("edit tag {} differs from block tag {}", tag, block.kind),
                    );
                }
            }
        }

        match record.action {
            Action::Delete => match record.edit_unit {
                Some(EditUnit::Row) | Some(EditUnit::Column) | Some(EditUnit::Cell) => {
                    self.error(
                        edit,
                        IssueCode::InvalidTarget,
                        "name the row, column or cell to delete (bN:rR, bN:cC)",
                    );
                    None
                }
                _ => Some(EditOperation::DeleteBlock { block: n }),
            },
            Action::Replace => match &block.content {
                BlockContent::Paragraph(p) => {
                    let content = self.replace_content(edit, p, block.kind, tag)?;
                    Some(EditOperation::ReplaceParagraph { block: n, content })
                }
                BlockContent::Table(_) => {
                    self.error(
                        edit,
                        IssueCode::InvalidTarget,
                        "tables are replaced through their rows, cells or paragraphs",
                    );
                    None
                }
                BlockContent::Toc(_) => {
                    self.error(
                        edit,
                        IssueCode::InvalidTarget,
                        "TOC entries are replaced through bN:pP targets",
                    );
                    None
                }
                BlockContent::Other { .. } => {
                    self.error(
                        edit,
                        IssueCode::InvalidTarget,
                        "content controls can only be deleted or have content inserted next to them",
                    );
                    None
                }
            },
            Action::InsertBefore | Action::InsertAfter => {
                let position = record.action.position().unwrap_or(Position::After);
                match (record.edit_unit, block.table()) {
                    (Some(EditUnit::Row), Some(table)) => {
                        let row = match position {
                            Position::Before => 0,
                            Position::After => table.rows.len().saturating_sub(1),
                        };
                        let rows = self.new_rows(edit, Some(table.column_count), true)?;
                        return Some(EditOperation::InsertRow {
                            block: n,
                            row,
                            position,
                            rows,
                        });
                    }
                    (Some(EditUnit::Column), Some(table)) => {
                        let col = match position {
                            Position::Before => 0,
                            Position::After => table.column_count.saturating_sub(1),
                        };
                        let cells = self.new_column(edit, table)?;
                        return Some(EditOperation::InsertColumn {
                            block: n,
                            col,
                            position,
                            cells,
                        });
                    }
                    (Some(EditUnit::Row), None) | (Some(EditUnit::Column), None) => {
                        self.error(
                            edit,
                            IssueCode::InvalidTarget,
                            format!("{} is not a table", block.id),
                        );
                        return None;
                    }
                    _ => {}
                }

                if record.edit_unit == Some(EditUnit::Table) || tag == Some(BlockKind::Table) {
                    let Some(alias) = record
                        .table_style_alias
                        .clone()
                        .or_else(|| record.style_alias.clone())
                    else {
                        self.error(
                            edit,
                            IssueCode::MissingRequiredField,
                            "table_style_alias is required for table inserts",
                        );
                        return None;
                    };
                    if !self.check_alias(edit, &alias, AliasFamily::Table, "table_style_alias") {
                        return None;
                    }
                    let rows = self.new_rows(edit, None, false)?;
                    return Some(EditOperation::InsertTable {
                        anchor: n,
                        position,
                        style_alias: alias,
                        rows,
                    });
                }

                let content = self.insert_content(edit, tag, None)?;
                Some(EditOperation::InsertParagraph {
                    anchor: n,
                    position,
                    content,
                })
            }
        }
    }

    fn convert_row(
        &mut self,
        edit: &Edit<'_>,
        n: usize,
        row: usize,
        table: &Table,
    ) -> Option<EditOperation> {
        let Some(existing) = table.rows.get(row) else {
            self.error(
                edit,
                IssueCode::TargetNotFound,
                format!(
                    "row {} out of range (table has {} rows)",
                    row,
                    table.rows.len()
                ),
            );
            return None;
        };
        match edit.record.action {
            Action::Replace => {
                let text = self.single_line_text(edit)?;
                let cells = split_cells(&text);
                if cells.len() != existing.cells.len() {
                    self.error(
                        edit,
                        IssueCode::ColumnCountMismatch,
                        format!(
                            "new_text has {} cells but row {} has {}",
                            cells.len(),
                            row,
                            existing.cells.len()
                        ),
                    );
                    return None;
                }
                Some(EditOperation::ReplaceRow {
                    block: n,
                    row,
                    cells,
                })
            }
            Action::InsertBefore | Action::InsertAfter => {
                let rows = self.new_rows(edit, Some(table.column_count), true)?;
                Some(EditOperation::InsertRow {
                    block: n,
                    row,
                    position: edit.record.action.position().unwrap_or(Position::After),
                    rows,
                })
            }
            Action::Delete => {
                if table.rows.len() == 1 {
                    self.error(
                        edit,
                        IssueCode::InvalidTarget,
                        "cannot delete the only row; delete the table instead",
                    );
                    return None;
                }
                Some(EditOperation::DeleteRow { block: n, row })
            }
        }
    }

    fn convert_column(
        &mut self,
        edit: &Edit<'_>,
        n: usize,
        col: usize,
        table: &Table,
    ) -> Option<EditOperation> {
        if col >= table.column_count {
            self.error(
                edit,
                IssueCode::TargetNotFound,
                format!(
                    "column {} out of range (table has {} columns)",
                    col, table.column_count
                ),
            );
            return None;
        }
        match edit.record.action {
            Action::Replace => {
                self.error(
                    edit,
                    IssueCode::InvalidTarget,
                    "columns are replaced cell by cell",
                );
                None
            }
            Action::InsertBefore | Action::InsertAfter => {
                let cells = self.new_column(edit, table)?;
                Some(EditOperation::InsertColumn {
                    block: n,
                    col,
                    position: edit.record.action.position().unwrap_or(Position::After),
                    cells,
                })
            }
            Action::Delete => {
                if table.column_count <= 1 {
                    self.error(
                        edit,
                        IssueCode::InvalidTarget,
                        "cannot delete the only column; delete the table instead",
                    );
                    return None;
                }
                if !table.is_rectangular() {
                    self.error(
                        edit,
                        IssueCode::ColumnCountMismatch,
                        "column edits need every row to have the same number of cells",
                    );
                    return None;
                }
                Some(EditOperation::DeleteColumn { block: n, col })
            }
        }
    }

    /// Numbering of the paragraph an operation replaces or deletes
    fn target_numbering(&self, op: &EditOperation) -> Option<&'a Numbering> {
        let extraction = self.extraction;
        match op {
            EditOperation::ReplaceParagraph { block, .. } | EditOperation::DeleteBlock { block } => {
                extraction.block(*block)?.paragraph()?.numbering.as_ref()
            }
            EditOperation::ReplaceCellParagraph {
                block,
                row,
                col,
                para,
                ..
            }
            | EditOperation::DeleteCellParagraph {
                block,
                row,
                col,
                para,
            } => extraction
                .block(*block)?
                .table()?
                .cell(*row, *col)?
                .paragraphs
                .get(*para)?
                .paragraph
                .numbering
                .as_ref(),
            _ => None,
        }
    }

    /// Numbering instance new paragraphs of a style join, judged from existing ones
    fn style_numbering(&self, style_alias: &str) -> Option<&'a Numbering> {
        self.extraction
            .blocks
            .iter()
            .filter_map(Block::paragraph)
            .filter(|p| p.style_alias == style_alias)
            .find_map(|p| p.numbering.as_ref())
    }

    fn numbered_after(&self, num_id: u32, after: usize) -> Vec<String> {
        self.extraction
            .blocks
            .iter()
            .skip(after + 1)
            .filter(|b| {
                b.paragraph()
                    .and_then(|p| p.numbering.as_ref())
                    .is_some_and(|n| matches!(n, Numbering::Computed { num_id: id, .. } if *id == num_id))
            })
            .map(|b| b.id.to_string())
            .collect()
    }

    /// Advisory warnings about numbering and TOC cascades
    fn cascade_warnings(&mut self, edit: &Edit<'_>, op: &EditOperation) -> bool {
        let extraction = self.extraction;
        let mut touches_headings = false;

        // Numbering of the replaced or deleted paragraph
        if let Some(Numbering::Indeterminate { reason }) = self.target_numbering(op) {
            self.warn(
                edit,
                IssueCode::NumberingIndeterminate,
                format!("numbering of the target cannot be computed: {}", reason),
            );
        }

        let inserted_style = match op {
            EditOperation::InsertParagraph { content, .. } => Some(content.style_alias.as_str()),
            _ => None,
        };
        let joined = inserted_style.and_then(|s| self.style_numbering(s));
        let removed = match op {
            EditOperation::DeleteBlock { .. } => self.target_numbering(op),
            _ => None,
        };
        match removed.or(joined) {
            Some(Numbering::Computed { num_id, .. }) => {
                let after = match op {
                    EditOperation::InsertParagraph {
                        anchor,
                        position: Position::Before,
                        ..
                    } => anchor.saturating_sub(1),
                    other => other.block(),
                };
                let shifted = self.numbered_after(*num_id, after);
                let verb = if removed.is_some() { "deleting" } else { "inserting" };
                let message = if shifted.is_empty() {
                    format!("{} a numbered paragraph (numId {})", verb, num_id)
                } else {
                    format!(
                        "{} a numbered paragraph renumbers {}",
                        verb,
                        shifted.join(", ")
                    )
                };
                self.warn(edit, IssueCode::NumberingCascade, message);
            }
            Some(Numbering::Indeterminate { reason }) if joined.is_some() => {
                self.warn(
                    edit,
                    IssueCode::NumberingIndeterminate,
                    format!("numbering of the new paragraph cannot be computed: {}", reason),
                );
            }
            _ => {}
        }

        let heading_kind = |alias: &str| {
            extraction
                .aliases
                .paragraph(alias)
                .is_some_and(|t| matches!(t.kind, BlockKind::Heading(_)))
        };
        match op {
            EditOperation::DeleteBlock { block } => {
                touches_headings = extraction.block(*block).is_some_and(Block::is_heading);
            }
            EditOperation::InsertParagraph { content, .. } => {
                touches_headings = heading_kind(&content.style_alias);
            }
            EditOperation::ReplaceParagraph { block, content } => {
                let was_heading = extraction.block(*block).is_some_and(Block::is_heading);
                let text_changed = extraction
                    .block(*block)
                    .and_then(Block::paragraph)
                    .is_some_and(|p| p.text != content.text);
                touches_headings = (was_heading && (text_changed || content.restyle))
                    || (content.restyle && heading_kind(&content.style_alias));
            }
            _ => {}
        }
        if touches_headings && extraction.has_toc() {
            self.warn(
                edit,
                IssueCode::TocCascade,
                "heading change affects the table of contents; synchronise it after applying",
            );
        }
        touches_headings
    }

    /// Cross-edit checks: overlapping edits and passes that must be split
    fn check_conflicts(&mut self, plan: &EditPlan, ops: &[(usize, EditOperation)]) {
        let scopes: Vec<Scope> = ops
            .iter()
            .map(|(index, op)| {
                let (path, exclusive) = scope_of(op);
                Scope {
                    index: *index,
                    path,
                    exclusive,
                }
            })
            .collect();

        let mut reported = Vec::new();
        for (a, b) in scopes.iter().tuple_combinations() {
            let (shorter, longer) = if a.path.len() <= b.path.len() { (a, b) } else { (b, a) };
            let nested = longer.path.starts_with(&shorter.path);
            let same = a.path == b.path;
            let column_hits_cell = match (shorter.path.as_slice(), longer.path.as_slice()) {
                ([Step::Block(x), Step::Column(c)], [Step::Block(y), _, Step::Col(d), ..]) => {
                    x == y && c == d && shorter.exclusive
                }
                _ => false,
            };
            let conflict = column_hits_cell
                || (a.exclusive && b.exclusive && nested)
                || (shorter.exclusive && !longer.exclusive && nested && !same);
            if conflict && !reported.contains(&b.index) {
                reported.push(b.index);
                let edit = Edit {
                    index: b.index,
                    record: &plan.edits[b.index],
                };
                self.error(
                    &edit,
                    IssueCode::ConflictingEdit,
                    format!(
                        "overlaps edit {} ({}); combine them or apply them in separate passes",
                        a.index, plan.edits[a.index].target_id
                    ),
                );
            }
        }

        // Column structure and row structure of one table cannot change together
        let mut column_tables: HashMap<usize, usize> = HashMap::new();
        let mut row_tables: HashMap<usize, usize> = HashMap::new();
        for (index, op) in ops {
            match op {
                EditOperation::InsertColumn { block, .. } | EditOperation::DeleteColumn { block, .. } => {
                    column_tables.entry(*block).or_insert(*index);
                }
                EditOperation::InsertRow { block, .. }
                | EditOperation::DeleteRow { block, .. }
                | EditOperation::ReplaceRow { block, .. } => {
                    row_tables.entry(*block).or_insert(*index);
                }
                _ => {}
            }
        }
        for (block, col_index) in column_tables.iter().sorted() {
            if let Some(row_index) = row_tables.get(block) {
                let later = (*col_index).max(*row_index);
                let edit = Edit {
                    index: later,
                    record: &plan.edits[later],
                };
                self.error(
                    &edit,
                    IssueCode::ConflictingEdit,
                    format!(
                        "column and row structure of b{} change in one plan (edits {} and {}); split them across passes",
                        block, col_index, row_index
                    ),
                );
            }
        }

        // A cell must keep one paragraph
        let mut deletions: HashMap<(usize, usize, usize), Vec<usize>> = HashMap::new();
        for (index, op) in ops {
            if let EditOperation::DeleteCellParagraph { block, row, col, .. } = op {
                deletions.entry((*block, *row, *col)).or_default().push(*index);
            }
        }
        for ((block, row, col), indices) in deletions.into_iter().sorted() {
            let count = self
                .extraction
                .block(block)
                .and_then(Block::table)
                .and_then(|t| t.cell(row, col))
                .map_or(0, |c| c.paragraphs.len());
            if indices.len() >= count {
                if let Some(last) = indices.last() {
                    let edit = Edit {
                        index: *last,
                        record: &plan.edits[*last],
                    };
                    self.error(
                        &edit,
                        IssueCode::InvalidTarget,
                        format!("edits delete every paragraph of cell b{}:r{}c{}", block, row, col),
                    );
                }
            }
        }
    }
}

/// Validate a plan against the extraction it was written for
pub fn validate(plan: &EditPlan, extraction: &Extraction) -> Validation {
    let mut checker = Checker {
        extraction,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let mut ops = Vec::with_capacity(plan.edits.len());
    let mut touches_headings = false;
    for (index, record) in plan.edits.iter().enumerate() {
        let edit = Edit { index, record };
        if let Some(op) = checker.convert(&edit) {
            touches_headings |= checker.cascade_warnings(&edit, &op);
            ops.push((index, op));
        }
    }
    checker.check_conflicts(plan, &ops);

    let valid = checker.errors.is_empty();
    log::info!(
        "Validated {} edits: {} errors, {} warnings",
        plan.edits.len(),
        checker.errors.len(),
        checker.warnings.len()
    );
    let report = ValidationReport {
        valid,
        errors: checker.errors,
        warnings: checker.warnings,
    };
    let plan = valid.then(|| ValidatedPlan {
        operations: ops.into_iter().map(|(_, op)| op).collect(),
        touches_headings,
    });
    Validation { report, plan }
}
