//! Blocks and their content

use super::kind::BlockKind;
use super::target::TargetId;
use serde::Serialize;

/// Computed auto-number state of a paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Numbering {
    /// Prefix computed from the numbering definitions
    Computed {
        /// Numbering instance (`w:numId`)
        num_id: u32,
        /// Zero-based list level (`w:ilvl`)
        level: u8,
        /// Counter value at this level
        value: u32,
        /// Value the level starts counting from
        start: u32,
        /// Rendered prefix such as `1-2.` or a bullet glyph
        prefix: String,
    },
    /// Numbering applies but its prefix cannot be known from the styling
    Indeterminate {
        /// Why the prefix could not be computed
        reason: String,
    },
}

impl Numbering {
    /// Rendered prefix, if computable
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Numbering::Computed { prefix, .. } => Some(prefix),
            Numbering::Indeterminate { .. } => None,
        }
    }

    /// Whether the prefix is unknown
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Numbering::Indeterminate { .. })
    }
}

/// A contiguous text span sharing one run style
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSpan {
    /// Text of the run
    pub text: String,
    /// Run style alias local to the paragraph's template (`R0`, `R1`, ...)
    pub run_style: String,
}

/// Paragraph content shared by body and cell paragraphs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    /// Paragraph style alias (`S1`, `S2`, ...)
    pub style_alias: String,
    /// Text of every `w:t` in the paragraph
    pub text: String,
    /// Text-bearing runs in order
    pub runs: Vec<RunSpan>,
    /// Auto-number state, if the paragraph is numbered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numbering: Option<Numbering>,
    /// Names of bookmarks starting in this paragraph
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bookmarks: Vec<String>,
    /// Whether the paragraph holds drawings or pictures
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_drawing: bool,
}

impl Paragraph {
    /// Distinct run styles in order of first use
    pub fn run_styles(&self) -> Vec<&str> {
        let mut styles: Vec<&str> = Vec::new();
        for run in &self.runs {
            if !styles.contains(&run.run_style.as_str()) {
                styles.push(&run.run_style);
            }
        }
        styles
    }

    /// Computed numbering prefix, if any
    pub fn prefix(&self) -> Option<&str> {
        self.numbering.as_ref().and_then(Numbering::prefix)
    }
}

/// A paragraph nested in a table cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellParagraph {
    /// Identifier (`bN:rRcCpP`)
    pub id: TargetId,
    /// Semantic kind
    pub kind: BlockKind,
    /// Paragraph content
    #[serde(flatten)]
    pub paragraph: Paragraph,
}

/// A table cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    /// Identifier (`bN:rRcC`)
    pub id: TargetId,
    /// Cell style alias (`CS0`, ...)
    pub style_alias: String,
    /// Paragraphs in the cell
    pub paragraphs: Vec<CellParagraph>,
}

impl Cell {
    /// Text of the cell, paragraphs joined with newlines
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.paragraph.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// Identifier (`bN:rR`)
    pub id: TargetId,
    /// Row style alias (`RS0`, ...)
    pub style_alias: String,
    /// Cells in order
    pub cells: Vec<Cell>,
}

/// Table content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Table shell alias (`T1`, ...)
    pub style_alias: String,
    /// Rows in order
    pub rows: Vec<Row>,
    /// Cell count of the first row
    pub column_count: usize,
}

impl Table {
    /// Whether every row has `column_count` cells
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|r| r.cells.len() == self.column_count)
    }

    /// Look up a cell by position
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }
}

/// One paragraph of a table of contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Identifier (`bN:pP`)
    pub id: TargetId,
    /// TOC level alias (`TL0`, ...); absent for empty paragraphs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_alias: Option<String>,
    /// Outline level the entry stands for, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// Number part (`1-2.`), empty when unnumbered
    pub number: String,
    /// Title part
    pub title: String,
    /// Page text, empty when the entry has none
    pub page: String,
    /// Bookmark the entry links to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl TocEntry {
    /// Entry text in edit-plan form: `number title | page`
    pub fn text(&self) -> String {
        let head = match (self.number.is_empty(), self.title.is_empty()) {
            (true, _) => self.title.clone(),
            (false, true) => self.number.clone(),
            (false, false) => format!("{} {}", self.number, self.title),
        };
        if self.page.is_empty() {
            head
        } else {
            format!("{} | {}", head, self.page)
        }
    }

    /// Whether the paragraph is an actual entry rather than a caption or filler
    pub fn is_entry(&self) -> bool {
        self.anchor.is_some() || !self.page.is_empty()
    }
}

/// Table of contents content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toc {
    /// Every direct paragraph of the content, in order
    pub entries: Vec<TocEntry>,
}

/// Content of a block, by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    /// Single paragraph
    Paragraph(Paragraph),
    /// Table
    Table(Table),
    /// Table of contents
    Toc(Toc),
    /// Opaque content control
    Other {
        /// Text of the content
        text: String,
    },
}

/// An addressable unit of the document body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Dense identifier in document order (`b0`, `b1`, ...)
    pub id: TargetId,
    /// Index of the node among the body's children in the source part
    #[serde(skip)]
    pub source_index: usize,
    /// Semantic kind
    pub kind: BlockKind,
    /// Kind-specific content
    pub content: BlockContent,
}

impl Block {
    /// Paragraph content, if this is a paragraph block
    pub fn paragraph(&self) -> Option<&Paragraph> {
        match &self.content {
            BlockContent::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    /// Table content, if this is a table block
    pub fn table(&self) -> Option<&Table> {
        match &self.content {
            BlockContent::Table(t) => Some(t),
            _ => None,
        }
    }

    /// TOC content, if this is a table of contents
    pub fn toc(&self) -> Option<&Toc> {
        match &self.content {
            BlockContent::Toc(t) => Some(t),
            _ => None,
        }
    }

    /// Style alias of the block (paragraph `S` or table `T` alias)
    pub fn style_alias(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Paragraph(p) => Some(&p.style_alias),
            BlockContent::Table(t) => Some(&t.style_alias),
            _ => None,
        }
    }

    /// Plain text of the block
    pub fn text(&self) -> String {
        match &self.content {
            BlockContent::Paragraph(p) => p.text.clone(),
            BlockContent::Table(t) => t
                .rows
                .iter()
                .map(|r| r.cells.iter().map(Cell::text).collect::<Vec<_>>().join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
            BlockContent::Toc(toc) => toc
                .entries
                .iter()
                .map(TocEntry::text)
                .collect::<Vec<_>>()
                .join("\n"),
            BlockContent::Other { text } => text.clone(),
        }
    }

    /// Whether the block is a heading
    pub fn is_heading(&self) -> bool {
        matches!(self.kind, BlockKind::Heading(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Paragraph {
        Paragraph {
            style_alias: "S1".to_string(),
            text: text.to_string(),
            runs: vec![
                RunSpan {
                    text: "A".to_string(),
                    run_style: "R0".to_string(),
                },
                RunSpan {
                    text: "B".to_string(),
                    run_style: "R1".to_string(),
                },
                RunSpan {
                    text: "C".to_string(),
                    run_style: "R0".to_string(),
                },
            ],
            numbering: None,
            bookmarks: Vec::new(),
            has_drawing: false,
        }
    }

    #[test]
    fn test_run_styles_are_distinct_in_first_use_order() {
        assert_eq!(paragraph("ABC").run_styles(), vec!["R0", "R1"]);
    }

    #[test]
    fn test_toc_entry_text_forms() {
        let mut entry = TocEntry {
            id: TargetId::TocEntry { block: 0, entry: 1 },
            level_alias: Some("TL0".to_string()),
            level: Some(1),
            number: "1.".to_string(),
            title: "Intro".to_string(),
            page: "3".to_string(),
            anchor: Some("_Toc00000001".to_string()),
        };
        assert_eq!(entry.text(), "1. Intro | 3");
        entry.number.clear();
        entry.page.clear();
        assert_eq!(entry.text(), "Intro");
        assert!(entry.is_entry());
    }

    #[test]
    fn test_table_text_joins_cells() {
        let cell = |row, col, text: &str| Cell {
            id: TargetId::Cell { block: 2, row, col },
            style_alias: "CS0".to_string(),
            paragraphs: vec![CellParagraph {
                id: TargetId::CellParagraph {
                    block: 2,
                    row,
                    col,
                    para: 0,
                },
                kind: BlockKind::Body,
                paragraph: paragraph(text),
            }],
        };
        let table = Table {
            style_alias: "T1".to_string(),
            rows: vec![Row {
                id: TargetId::Row { block: 2, row: 0 },
                style_alias: "RS0".to_string(),
                cells: vec![cell(0, 0, "a"), cell(0, 1, "b")],
            }],
            column_count: 2,
        };
        let block = Block {
            id: TargetId::Block(2),
            source_index: 4,
            kind: BlockKind::Table,
            content: BlockContent::Table(table),
        };
        assert_eq!(block.text(), "a | b");
        assert_eq!(block.style_alias(), Some("T1"));
        assert!(block.table().is_some_and(Table::is_rectangular));
    }
}
