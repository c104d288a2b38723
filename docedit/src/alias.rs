//! Style alias table
//!
//! Formatting descriptors found during extraction are deduplicated by
//! fingerprint and given short aliases in first-seen document order:
//!
//! - `S1`, `S2`, ... paragraph styles
//! - `T1`, `T2`, ... table shells
//! - `RS0`, `RS1`, ... row styles
//! - `CS0`, `CS1`, ... cell styles
//! - `TL0`, `TL1`, ... TOC entry levels
//!
//! Each alias keeps the markup needed to build new content in that style.
//! Run styles are local to a paragraph template and named `R0`, `R1`, ...

use crate::markup::Element;
use crate::model::BlockKind;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

fn serialize_xml<S: Serializer>(el: &Option<Element>, s: S) -> Result<S::Ok, S::Error> {
    match el {
        Some(el) => s.serialize_str(&el.to_xml()),
        None => s.serialize_none(),
    }
}

fn serialize_element<S: Serializer>(el: &Element, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&el.to_xml())
}

/// Alias family, recognised from the alias prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasFamily {
    /// `S{n}`
    Paragraph,
    /// `T{n}`
    Table,
    /// `RS{n}`
    Row,
    /// `CS{n}`
    Cell,
    /// `TL{n}`
    TocLevel,
}

impl AliasFamily {
    /// Family of an alias string, if it has a known shape
    pub fn of(alias: &str) -> Option<Self> {
        let (family, digits) = if let Some(d) = alias.strip_prefix("RS") {
            (AliasFamily::Row, d)
        } else if let Some(d) = alias.strip_prefix("CS") {
            (AliasFamily::Cell, d)
        } else if let Some(d) = alias.strip_prefix("TL") {
            (AliasFamily::TocLevel, d)
        } else if let Some(d) = alias.strip_prefix('S') {
            (AliasFamily::Paragraph, d)
        } else if let Some(d) = alias.strip_prefix('T') {
            (AliasFamily::Table, d)
        } else {
            return None;
        };
        (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then_some(family)
    }
}

impl std::fmt::Display for AliasFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AliasFamily::Paragraph => "paragraph style",
            AliasFamily::Table => "table style",
            AliasFamily::Row => "row style",
            AliasFamily::Cell => "cell style",
            AliasFamily::TocLevel => "TOC level",
        };
        write!(f, "{}", name)
    }
}

/// Run formatting used inside a paragraph template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunTemplate {
    /// Alias local to the paragraph template (`R0`, ...)
    pub alias: String,
    /// Fingerprint of the run properties
    pub key: String,
    /// Human-readable summary (`bold, size:28`)
    pub description: String,
    /// Run properties to copy into new runs
    #[serde(rename = "r_pr_xml", serialize_with = "serialize_xml")]
    pub r_pr: Option<Element>,
}

/// Paragraph style template (`S` alias)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParagraphTemplate {
    /// Alias (`S1`, ...)
    pub alias: String,
    /// Style fingerprint (`Heading1_jc-center`)
    pub style_key: String,
    /// Semantic kind of the first paragraph seen with this style
    pub kind: BlockKind,
    /// Paragraph properties to copy into new paragraphs
    #[serde(rename = "p_pr_xml", serialize_with = "serialize_xml")]
    pub p_pr: Option<Element>,
    /// Run styles seen with this paragraph style, first-seen order
    pub runs: Vec<RunTemplate>,
}

impl ParagraphTemplate {
    /// Look up a run template by its local alias
    pub fn run(&self, alias: &str) -> Option<&RunTemplate> {
        self.runs.iter().find(|r| r.alias == alias)
    }

    /// Register a run style, returning its local alias
    fn intern_run(&mut self, key: &str, description: String, r_pr: Option<&Element>) -> String {
        if let Some(existing) = self.runs.iter().find(|r| r.key == key) {
            return existing.alias.clone();
        }
        let alias = format!("R{}", self.runs.len());
        self.runs.push(RunTemplate {
            alias: alias.clone(),
            key: key.to_string(),
            description,
            r_pr: r_pr.cloned(),
        });
        alias
    }
}

/// Table shell template (`T` alias): table properties and grid without rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableTemplate {
    /// Alias (`T1`, ...)
    pub alias: String,
    /// `w:tbl` holding only `w:tblPr` and `w:tblGrid`
    #[serde(rename = "shell_xml", serialize_with = "serialize_element")]
    pub shell: Element,
}

/// Row style template (`RS` alias)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowTemplate {
    /// Alias (`RS0`, ...)
    pub alias: String,
    /// Row properties
    #[serde(rename = "tr_pr_xml", serialize_with = "serialize_xml")]
    pub tr_pr: Option<Element>,
}

/// Cell style template (`CS` alias)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellTemplate {
    /// Alias (`CS0`, ...)
    pub alias: String,
    /// Cell properties minus layout tags (`tcW`, `gridSpan`, `vMerge`, `hMerge`)
    #[serde(rename = "tc_pr_xml", serialize_with = "serialize_xml")]
    pub tc_pr: Option<Element>,
    /// Paragraph style of the first paragraph of the first cell seen
    pub paragraph_alias: Option<String>,
}

/// TOC level template (`TL` alias)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocLevelTemplate {
    /// Alias (`TL0`, ...)
    pub alias: String,
    /// Fingerprint (borders, indent, bold)
    pub fingerprint: String,
    /// Outline level the entries stand for, when known
    pub level: Option<u8>,
    /// Left indent in twips
    pub indent: i64,
    /// First entry paragraph seen at this level, used for cloning
    #[serde(rename = "sample_xml", serialize_with = "serialize_element")]
    pub sample: Element,
}

/// Resolved alias
#[derive(Debug, Clone, Copy)]
pub enum AliasRef<'a> {
    /// Paragraph style
    Paragraph(&'a ParagraphTemplate),
    /// Table shell
    Table(&'a TableTemplate),
    /// Row style
    Row(&'a RowTemplate),
    /// Cell style
    Cell(&'a CellTemplate),
    /// TOC level
    TocLevel(&'a TocLevelTemplate),
}

/// Every alias of one extraction
#[derive(Debug, Clone, Default, Serialize)]
pub struct StyleAliasTable {
    /// Paragraph styles
    pub paragraphs: Vec<ParagraphTemplate>,
    /// Table shells
    pub tables: Vec<TableTemplate>,
    /// Row styles
    pub rows: Vec<RowTemplate>,
    /// Cell styles
    pub cells: Vec<CellTemplate>,
    /// TOC levels
    pub toc_levels: Vec<TocLevelTemplate>,
    #[serde(skip)]
    index: HashMap<(char, String), usize>,
}

impl StyleAliasTable {
    /// Resolve an alias of any family
    pub fn resolve(&self, alias: &str) -> Option<AliasRef<'_>> {
        match AliasFamily::of(alias)? {
            AliasFamily::Paragraph => self.paragraph(alias).map(AliasRef::Paragraph),
            AliasFamily::Table => self.table(alias).map(AliasRef::Table),
            AliasFamily::Row => self.row(alias).map(AliasRef::Row),
            AliasFamily::Cell => self.cell(alias).map(AliasRef::Cell),
            AliasFamily::TocLevel => self.toc_level(alias).map(AliasRef::TocLevel),
        }
    }

    /// Whether the alias exists
    pub fn contains(&self, alias: &str) -> bool {
        self.resolve(alias).is_some()
    }

    /// Paragraph template by alias
    pub fn paragraph(&self, alias: &str) -> Option<&ParagraphTemplate> {
        self.paragraphs.iter().find(|t| t.alias == alias)
    }

    /// Table template by alias
    pub fn table(&self, alias: &str) -> Option<&TableTemplate> {
        self.tables.iter().find(|t| t.alias == alias)
    }

    /// Row template by alias
    pub fn row(&self, alias: &str) -> Option<&RowTemplate> {
        self.rows.iter().find(|t| t.alias == alias)
    }

    /// Cell template by alias
    pub fn cell(&self, alias: &str) -> Option<&CellTemplate> {
        self.cells.iter().find(|t| t.alias == alias)
    }

    /// TOC level template by alias
    pub fn toc_level(&self, alias: &str) -> Option<&TocLevelTemplate> {
        self.toc_levels.iter().find(|t| t.alias == alias)
    }

    /// TOC level template standing for an outline level
    pub fn toc_level_for(&self, level: u8) -> Option<&TocLevelTemplate> {
        self.toc_levels.iter().find(|t| t.level == Some(level))
    }

    fn lookup(&self, family: char, key: &str) -> Option<usize> {
        self.index.get(&(family, key.to_string())).copied()
    }

    /// Register a paragraph style, returning its alias
    pub fn intern_paragraph(&mut self, style_key: &str, kind: BlockKind, p_pr: Option<&Element>) -> String {
        if let Some(i) = self.lookup('S', style_key) {
            return self.paragraphs[i].alias.clone();
        }
        let alias = format!("S{}", self.paragraphs.len() + 1);
        self.index
            .insert(('S', style_key.to_string()), self.paragraphs.len());
        self.paragraphs.push(ParagraphTemplate {
            alias: alias.clone(),
            style_key: style_key.to_string(),
            kind,
            p_pr: p_pr.cloned(),
            runs: Vec::new(),
        });
        alias
    }

    /// Register a run style under a paragraph style, returning the run alias
    pub fn intern_run(
        &mut self,
        paragraph_alias: &str,
        key: &str,
        description: String,
        r_pr: Option<&Element>,
    ) -> String {
        match self.paragraphs.iter_mut().find(|t| t.alias == paragraph_alias) {
            Some(template) => template.intern_run(key, description, r_pr),
            None => "R0".to_string(),
        }
    }

    /// Register a table shell, returning its alias
    pub fn intern_table(&mut self, shell: Element) -> String {
        let key = shell.to_xml();
        if let Some(i) = self.lookup('T', &key) {
            return self.tables[i].alias.clone();
        }
        let alias = format!("T{}", self.tables.len() + 1);
        self.index.insert(('T', key), self.tables.len());
        self.tables.push(TableTemplate {
            alias: alias.clone(),
            shell,
        });
        alias
    }

    /// Register a row style, returning its alias
    pub fn intern_row(&mut self, tr_pr: Option<&Element>) -> String {
        let key = tr_pr.map(Element::to_xml).unwrap_or_default();
        if let Some(i) = self.lookup('R', &key) {
            return self.rows[i].alias.clone();
        }
        let alias = format!("RS{}", self.rows.len());
        self.index.insert(('R', key), self.rows.len());
        self.rows.push(RowTemplate {
            alias: alias.clone(),
            tr_pr: tr_pr.cloned(),
        });
        alias
    }

    /// Register a cell style, returning its alias
    pub fn intern_cell(&mut self, tc_pr: Option<Element>, paragraph_alias: Option<&str>) -> String {
        let key = tc_pr.as_ref().map(Element::to_xml).unwrap_or_default();
        if let Some(i) = self.lookup('C', &key) {
            let template = &mut self.cells[i];
            if template.paragraph_alias.is_none() {
                template.paragraph_alias = paragraph_alias.map(str::to_string);
            }
            return template.alias.clone();
        }
        let alias = format!("CS{}", self.cells.len());
        self.index.insert(('C', key), self.cells.len());
        self.cells.push(CellTemplate {
            alias: alias.clone(),
            tc_pr,
            paragraph_alias: paragraph_alias.map(str::to_string),
        });
        alias
    }

    /// Register a TOC level, returning its alias
    pub fn intern_toc_level(&mut self, fingerprint: &str, indent: i64, sample: &Element) -> String {
        if let Some(i) = self.lookup('L', fingerprint) {
            return self.toc_levels[i].alias.clone();
        }
        let alias = format!("TL{}", self.toc_levels.len());
        self.index
            .insert(('L', fingerprint.to_string()), self.toc_levels.len());
        self.toc_levels.push(TocLevelTemplate {
            alias: alias.clone(),
            fingerprint: fingerprint.to_string(),
            level: None,
            indent,
            sample: sample.clone(),
        });
        alias
    }

    /// Record the outline level a TOC alias stands for (first assignment wins)
    pub fn set_toc_level(&mut self, alias: &str, level: u8) {
        if let Some(t) = self.toc_levels.iter_mut().find(|t| t.alias == alias) {
            t.level.get_or_insert(level);
        }
    }
}
