//! Table edits: cell text, cell paragraphs, rows and columns
//!
//! Operations address rows, cells and paragraphs by their index in the
//! source table. In-place text edits run first, then each level is rebuilt
//! from slots so later levels still see source ordinals.

use super::paragraph::{self, first_text_r_pr, plain};
use super::{nth_child_mut, rebuild, ApplyError, Fate, Slot};
use crate::alias::StyleAliasTable;
use crate::extract::{cell_style_properties, template_paragraph_properties};
use crate::markup::{Element, Node};
use crate::plan::{CellEdit, EditOperation, Position, RowEdit};
use std::collections::BTreeMap;

/// Width of a regenerated grid when the template has none
const DEFAULT_TABLE_WIDTH: i64 = 9000;

fn missing(target: &str) -> ApplyError {
    ApplyError::TargetMissing {
        target: target.to_string(),
    }
}

fn cell_target(target: &str, row: usize, col: usize) -> String {
    format!("{}:r{}c{}", target, row, col)
}

fn cell_mut<'a>(tbl: &'a mut Element, row: usize, col: usize, target: &str) -> Result<&'a mut Element, ApplyError> {
    nth_child_mut(tbl, "w:tr", row)
        .and_then(|tr| nth_child_mut(tr, "w:tc", col))
        .ok_or_else(|| missing(&cell_target(target, row, col)))
}

fn cell<'a>(tbl: &'a Element, row: usize, col: usize) -> Option<&'a Element> {
    tbl.children_named("w:tr")
        .nth(row)
        .and_then(|tr| tr.children_named("w:tc").nth(col))
}

fn width_of(el: &Element) -> Option<i64> {
    el.attr("w:w").and_then(|w| w.trim().parse::<i64>().ok())
}

/// Grid column widths
fn grid_widths(tbl: &Element) -> Vec<i64> {
    tbl.child("w:tblGrid")
        .map(|grid| {
            grid.children_named("w:gridCol")
                .map(|g| width_of(g).unwrap_or(0))
                .collect()
        })
        .unwrap_or_default()
}

/// Set the `w:tcW` of a cell, creating the cell properties when missing
fn set_cell_width(tc: &mut Element, width: i64) {
    if tc.child("w:tcPr").is_none() {
        tc.children.insert(0, Node::Element(Element::new("w:tcPr")));
    }
    if let Some(tc_pr) = tc.child_mut("w:tcPr") {
        match tc_pr.child_mut("w:tcW") {
            Some(tc_w) => {
                tc_w.set_attr("w:w", width.to_string());
                tc_w.set_attr("w:type", "dxa");
            }
            None => tc_pr.children.insert(
                0,
                Node::Element(
                    Element::new("w:tcW")
                        .with_attr("w:w", width.to_string())
                        .with_attr("w:type", "dxa"),
                ),
            ),
        }
    }
}

/// Scale the grid back to `total` and refresh cell widths
///
/// Each width is rounded; the last column takes the remainder.
fn rescale(tbl: &mut Element, total: i64) {
    let widths = grid_widths(tbl);
    let sum: i64 = widths.iter().sum();
    if widths.is_empty() || sum <= 0 || total <= 0 {
        return;
    }
    let mut scaled: Vec<i64> = widths.iter().map(|w| (w * total + sum / 2) / sum).collect();
    let head: i64 = scaled[..scaled.len() - 1].iter().sum();
    if let Some(last) = scaled.last_mut() {
        *last = total - head;
    }

    if let Some(grid) = tbl.child_mut("w:tblGrid") {
        for (g, w) in grid.children_named_mut("w:gridCol").zip(&scaled) {
            g.set_attr("w:w", w.to_string());
        }
    }
    for tr in tbl.children_named_mut("w:tr") {
        let mut column = 0;
        for tc in tr.children_named_mut("w:tc") {
            let span = tc
                .child("w:tcPr")
                .and_then(|pr| pr.child("w:gridSpan"))
                .and_then(Element::val)
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            let width: i64 = scaled.iter().skip(column).take(span).sum();
            column += span;
            let has_width = tc.child("w:tcPr").is_some_and(|pr| pr.child("w:tcW").is_some());
            if has_width {
                set_cell_width(tc, width);
            }
        }
    }
    log::debug!("Rescaled table grid to {} twips over {} columns", total, scaled.len());
}

/// Paragraph properties and run format for new text in a cell
fn cell_paragraph_format(
    edit: &CellEdit,
    neighbour: Option<&Element>,
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<(Option<Element>, Option<Element>), ApplyError> {
    let template_alias = edit
        .style_alias
        .as_deref()
        .and_then(|a| aliases.cell(a))
        .and_then(|c| c.paragraph_alias.as_deref());
    if let Some(alias) = template_alias {
        let template = aliases.paragraph(alias).ok_or_else(|| ApplyError::UnknownAlias {
            target: target.to_string(),
            alias: alias.to_string(),
        })?;
        let r_pr = template.runs.first().and_then(|r| r.r_pr.clone());
        return Ok((template.p_pr.clone(), r_pr));
    }
    let sample = neighbour.and_then(|tc| tc.child("w:p"));
    Ok((
        sample.and_then(template_paragraph_properties),
        sample.and_then(first_text_r_pr),
    ))
}

/// New cell from an edit, formatted like `neighbour` unless a cell alias is given
fn build_cell(
    edit: &CellEdit,
    neighbour: Option<&Element>,
    width: Option<i64>,
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<Element, ApplyError> {
    let tc_pr = match &edit.style_alias {
        Some(alias) => aliases
            .cell(alias)
            .ok_or_else(|| ApplyError::UnknownAlias {
                target: target.to_string(),
                alias: alias.clone(),
            })?
            .tc_pr
            .clone(),
        None => neighbour.and_then(cell_style_properties),
    };
    let (p_pr, r_pr) = cell_paragraph_format(edit, neighbour, aliases, target)?;

    let mut tc = Element::new("w:tc");
    if let Some(tc_pr) = tc_pr {
        tc.children.push(Node::Element(tc_pr));
    }
    for line in edit.text.split('\n') {
        tc.children
            .push(Node::Element(plain(p_pr.as_ref(), r_pr.as_ref(), line.trim())));
    }
    let width = width.or_else(|| {
        neighbour
            .and_then(|n| n.child("w:tcPr"))
            .and_then(|pr| pr.child("w:tcW"))
            .and_then(width_of)
    });
    if let Some(width) = width {
        set_cell_width(&mut tc, width);
    }
    Ok(tc)
}

/// New row, cells formatted like the matching cells of `neighbour`
fn build_row(
    edit: &RowEdit,
    neighbour: Option<&Element>,
    widths: &[i64],
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<Element, ApplyError> {
    let tr_pr = match &edit.style_alias {
        Some(alias) => aliases
            .row(alias)
            .ok_or_else(|| ApplyError::UnknownAlias {
                target: target.to_string(),
                alias: alias.clone(),
            })?
            .tr_pr
            .clone(),
        None => neighbour.and_then(|tr| tr.child("w:trPr")).cloned(),
    };

    let mut tr = Element::new("w:tr");
    if let Some(tr_pr) = tr_pr {
        tr.children.push(Node::Element(tr_pr));
    }
    for (c, cell_edit) in edit.cells.iter().enumerate() {
        let sample = neighbour.and_then(|n| n.children_named("w:tc").nth(c));
        let width = if sample.is_none() { widths.get(c).copied() } else { None };
        tr.children
            .push(Node::Element(build_cell(cell_edit, sample, width, aliases, target)?));
    }
    Ok(tr)
}

/// New table from a table template and rows
pub(crate) fn build_table(
    style_alias: &str,
    rows: &[RowEdit],
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<Element, ApplyError> {
    let template = aliases.table(style_alias).ok_or_else(|| ApplyError::UnknownAlias {
        target: target.to_string(),
        alias: style_alias.to_string(),
    })?;
    let mut tbl = template.shell.clone();
    let columns = rows.first().map_or(0, |r| r.cells.len());

    let mut widths = grid_widths(&tbl);
    if widths.len() != columns && columns > 0 {
        let total = match widths.iter().sum::<i64>() {
            t if t > 0 => t,
            _ => DEFAULT_TABLE_WIDTH,
        };
        let each = total / columns as i64;
        widths = vec![each; columns];
        if let Some(last) = widths.last_mut() {
            *last = total - each * (columns as i64 - 1);
        }
        let mut grid = Element::new("w:tblGrid");
        for w in &widths {
            grid.children.push(Node::Element(
                Element::new("w:gridCol").with_attr("w:w", w.to_string()),
            ));
        }
        match tbl.child_mut("w:tblGrid") {
            Some(existing) => *existing = grid,
            None => tbl.children.push(Node::Element(grid)),
        }
    }

    for row in rows {
        let tr = build_row(row, None, &widths, aliases, target)?;
        tbl.children.push(Node::Element(tr));
    }
    Ok(tbl)
}

/// Rewrite a cell's paragraphs to one per line
fn replace_cell_lines(tc: &mut Element, lines: &[String]) {
    let sources: Vec<Element> = tc.children_named("w:p").cloned().collect();
    let format = |i: usize| {
        let source = sources.get(i.min(sources.len().saturating_sub(1)));
        let p_pr = source.and_then(|p| p.child("w:pPr")).cloned();
        let r_pr = source
            .and_then(first_text_r_pr)
            .or_else(|| sources.iter().find_map(first_text_r_pr));
        (p_pr, r_pr)
    };
    let paragraphs: Vec<Element> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let (p_pr, r_pr) = format(i);
            plain(p_pr.as_ref(), r_pr.as_ref(), line)
        })
        .collect();

    let at = tc
        .children
        .iter()
        .position(|n| matches!(n, Node::Element(el) if el.is("w:p")))
        .unwrap_or(tc.children.len());
    tc.remove_children_named("w:p");
    let at = at.min(tc.children.len());
    for (offset, p) in paragraphs.into_iter().enumerate() {
        tc.children.insert(at + offset, Node::Element(p));
    }
}

/// Apply every operation on one table
pub(crate) fn apply(
    tbl: &mut Element,
    ops: &[&EditOperation],
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<(), ApplyError> {
    let source = tbl.clone();
    let total: i64 = grid_widths(&source).iter().sum();

    let mut paragraph_slots: BTreeMap<(usize, usize), BTreeMap<usize, Slot>> = BTreeMap::new();
    let mut row_slots: BTreeMap<usize, Slot> = BTreeMap::new();
    let mut column_ops: Vec<&EditOperation> = Vec::new();

    for op in ops {
        match op {
            EditOperation::ReplaceCell { row, col, lines, .. } => {
                replace_cell_lines(cell_mut(tbl, *row, *col, target)?, lines);
            }
            EditOperation::ReplaceRow { row, cells, .. } => {
                for (col, text) in cells.iter().enumerate() {
                    replace_cell_lines(cell_mut(tbl, *row, col, target)?, std::slice::from_ref(text));
                }
            }
            EditOperation::ReplaceCellParagraph {
                row,
                col,
                para,
                content,
                ..
            } => {
                let here = format!("{}p{}", cell_target(target, *row, *col), para);
                let p = cell(&source, *row, *col)
                    .and_then(|tc| tc.children_named("w:p").nth(*para))
                    .ok_or_else(|| missing(&here))?;
                let replaced = paragraph::replace(p, content, aliases, &here)?;
                paragraph_slots
                    .entry((*row, *col))
                    .or_default()
                    .entry(*para)
                    .or_default()
                    .fate = Fate::Replace(replaced);
            }
            EditOperation::InsertCellParagraph {
                row,
                col,
                para,
                position,
                content,
                ..
            } => {
                let here = format!("{}p{}", cell_target(target, *row, *col), para);
                let new = paragraph::create(content, aliases, &here)?;
                paragraph_slots
                    .entry((*row, *col))
                    .or_default()
                    .entry(*para)
                    .or_default()
                    .insert(*position, new);
            }
            EditOperation::DeleteCellParagraph { row, col, para, .. } => {
                paragraph_slots
                    .entry((*row, *col))
                    .or_default()
                    .entry(*para)
                    .or_default()
                    .fate = Fate::Remove;
            }
            EditOperation::InsertRow {
                row, position, rows, ..
            } => {
                let neighbour = source
                    .children_named("w:tr")
                    .nth(*row)
                    .ok_or_else(|| missing(&format!("{}:r{}", target, row)))?;
                let widths = grid_widths(&source);
                let slot = row_slots.entry(*row).or_default();
                for edit in rows {
                    slot.insert(*position, build_row(edit, Some(neighbour), &widths, aliases, target)?);
                }
            }
            EditOperation::DeleteRow { row, .. } => {
                row_slots.entry(*row).or_default().fate = Fate::Remove;
            }
            EditOperation::InsertColumn { .. } | EditOperation::DeleteColumn { .. } => {
                column_ops.push(*op);
            }
            other => {
                return Err(ApplyError::Invalid {
                    target: target.to_string(),
                    message: format!("not a table operation: {:?}", other),
                })
            }
        }
    }

    for ((row, col), slots) in paragraph_slots {
        rebuild(cell_mut(tbl, row, col, target)?, "w:p", slots);
    }
    rebuild(tbl, "w:tr", row_slots);
    if !column_ops.is_empty() {
        apply_columns(tbl, &source, &column_ops, aliases, target)?;
        rescale(tbl, total);
    }
    Ok(())
}

fn apply_columns(
    tbl: &mut Element,
    source: &Element,
    ops: &[&EditOperation],
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<(), ApplyError> {
    let source_rows: Vec<&Element> = source.children_named("w:tr").collect();
    let source_grid: Vec<&Element> = source
        .child("w:tblGrid")
        .map(|g| g.children_named("w:gridCol").collect())
        .unwrap_or_default();

    let mut grid_slots: BTreeMap<usize, Slot> = BTreeMap::new();
    let mut cell_slots: Vec<BTreeMap<usize, Slot>> = vec![BTreeMap::new(); source_rows.len()];

    for op in ops {
        match op {
            EditOperation::InsertColumn {
                col, position, cells, ..
            } => {
                if let Some(g) = source_grid.get(*col) {
                    grid_slots.entry(*col).or_default().insert(*position, (*g).clone());
                }
                for (r, tr) in source_rows.iter().enumerate() {
                    let here = cell_target(target, r, *col);
                    let neighbour = tr.children_named("w:tc").nth(*col).ok_or_else(|| missing(&here))?;
                    let edit = cells.get(r).ok_or_else(|| ApplyError::Invalid {
                        target: here.clone(),
                        message: "new column has no cell for this row".to_string(),
                    })?;
                    let tc = build_cell(edit, Some(neighbour), None, aliases, &here)?;
                    cell_slots[r].entry(*col).or_default().insert(*position, tc);
                }
            }
            EditOperation::DeleteColumn { col, .. } => {
                grid_slots.entry(*col).or_default().fate = Fate::Remove;
                for slots in cell_slots.iter_mut() {
                    slots.entry(*col).or_default().fate = Fate::Remove;
                }
            }
            _ => {}
        }
    }

    if let Some(grid) = tbl.child_mut("w:tblGrid") {
        rebuild(grid, "w:gridCol", grid_slots);
    }
    for (r, slots) in cell_slots.into_iter().enumerate() {
        if let Some(tr) = nth_child_mut(tbl, "w:tr", r) {
            rebuild(tr, "w:tc", slots);
        }
    }
    Ok(())
}
