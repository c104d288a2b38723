//! Block extraction
//!
//! Walks the body of a snapshot once, in document order, and produces the
//! addressable blocks together with the style alias table. Extraction is
//! read-only and deterministic: two extractions of one snapshot agree on
//! every id and alias.

mod semantic;
pub mod style_key;
pub mod toc;
mod text_merge;

pub use semantic::paragraph_kind;

use crate::alias::StyleAliasTable;
use crate::markup::Element;
use crate::model::{
    Block, BlockContent, BlockKind, Cell, CellParagraph, Paragraph, Row, RunSpan, Table, TargetId,
    Toc, TocEntry,
};
use crate::numbering::NumberingResolver;
use crate::snapshot::Snapshot;
use crate::styles::StyleSheet;
use serde::Serialize;
use style_key::{describe_run, paragraph_style_key, run_key};

/// Marker shown in place of a numbering prefix that cannot be computed
pub const DEFAULT_INDETERMINATE_MARKER: &str = "?";

/// Cell property tags that describe layout rather than style
const CELL_LAYOUT_TAGS: &[&str] = &["w:tcW", "w:gridSpan", "w:vMerge", "w:hMerge"];

/// Paragraph property tags never copied into templates
const TEMPLATE_EXCLUDED_PPR: &[&str] = &["w:sectPr", "w:pPrChange"];

/// Every `w:r` of a paragraph in order, including runs nested in
/// hyperlinks, smart tags and tracked insertions
pub fn paragraph_runs(p: &Element) -> Vec<&Element> {
    fn collect<'a>(el: &'a Element, out: &mut Vec<&'a Element>) {
        for child in el.elements() {
            if child.is("w:r") {
                out.push(child);
            } else if !child.is("w:pPr") {
                collect(child, out);
            }
        }
    }
    let mut out = Vec::new();
    collect(p, &mut out);
    out
}

/// Text of the direct `w:t` children of a run
pub fn run_text(run: &Element) -> String {
    run.children_named("w:t").map(Element::own_text).collect()
}

/// Whether a paragraph holds drawings, pictures or embedded objects
pub fn has_drawing(p: &Element) -> bool {
    p.contains("w:drawing") || p.contains("w:pict") || p.contains("w:object")
}

/// Bookmark names starting inside an element
pub fn bookmark_names(el: &Element) -> Vec<String> {
    el.descendants_named("w:bookmarkStart")
        .iter()
        .filter_map(|b| b.attr("w:name"))
        .map(str::to_string)
        .collect()
}

/// Table shell: the table with only its properties and grid
pub fn table_shell(tbl: &Element) -> Element {
    let mut shell = tbl.clone();
    shell.children.retain(|n| {
        n.as_element()
            .is_some_and(|el| el.is("w:tblPr") || el.is("w:tblGrid"))
    });
    shell
}

/// Cell properties with layout tags removed
pub fn cell_style_properties(tc: &Element) -> Option<Element> {
    let mut tc_pr = tc.child("w:tcPr")?.clone();
    for tag in CELL_LAYOUT_TAGS {
        tc_pr.remove_children_named(tag);
    }
    Some(tc_pr)
}

/// Paragraph properties suitable for building new paragraphs
pub fn template_paragraph_properties(p: &Element) -> Option<Element> {
    let mut p_pr = p.child("w:pPr")?.clone();
    for tag in TEMPLATE_EXCLUDED_PPR {
        p_pr.remove_children_named(tag);
    }
    Some(p_pr)
}

/// Result of extracting one snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    /// Addressable blocks in document order
    pub blocks: Vec<Block>,
    /// Aliases referenced by the blocks
    pub aliases: StyleAliasTable,
}

/// Serializable analysis of a document (`analysis.json`)
#[derive(Debug, Serialize)]
pub struct Analysis<'a> {
    /// Text-merge view
    pub text_merge: String,
    /// Blocks
    pub blocks: &'a [Block],
    /// Alias table
    pub aliases: &'a StyleAliasTable,
}

struct Extractor<'a> {
    styles: &'a StyleSheet,
    resolver: NumberingResolver<'a>,
    aliases: StyleAliasTable,
}

impl<'a> Extractor<'a> {
    fn paragraph(&mut self, p: &Element) -> (BlockKind, Paragraph) {
        let kind = paragraph_kind(p, self.styles);
        let key = paragraph_style_key(p, self.styles.default_paragraph_style());
        let style_alias =
            self.aliases
                .intern_paragraph(&key, kind, template_paragraph_properties(p).as_ref());

        let mut runs: Vec<RunSpan> = Vec::new();
        for run in paragraph_runs(p) {
            let text = run_text(run);
            if text.is_empty() {
                continue;
            }
            let run_style = self.aliases.intern_run(
                &style_alias,
                &run_key(run),
                describe_run(run),
                run.child("w:rPr"),
            );
            match runs.last_mut() {
                Some(last) if last.run_style == run_style => last.text.push_str(&text),
                _ => runs.push(RunSpan { text, run_style }),
            }
        }

        let paragraph = Paragraph {
            style_alias,
            text: runs.iter().map(|r| r.text.as_str()).collect(),
            runs,
            numbering: self.resolver.resolve(p),
            bookmarks: bookmark_names(p),
            has_drawing: has_drawing(p),
        };
        (kind, paragraph)
    }

    fn table(&mut self, tbl: &Element, block: usize) -> Table {
        let style_alias = self.aliases.intern_table(table_shell(tbl));
        let mut rows = Vec::new();
        for (r, tr) in tbl.children_named("w:tr").enumerate() {
            let row_alias = self.aliases.intern_row(tr.child("w:trPr"));
            let mut cells = Vec::new();
            for (c, tc) in tr.children_named("w:tc").enumerate() {
                let mut paragraphs = Vec::new();
                for (i, p) in tc.children_named("w:p").enumerate() {
                    let (kind, paragraph) = self.paragraph(p);
                    paragraphs.push(CellParagraph {
                        id: TargetId::CellParagraph {
                            block,
                            row: r,
                            col: c,
                            para: i,
                        },
                        kind,
                        paragraph,
                    });
                }
                let first_alias = paragraphs.first().map(|p| p.paragraph.style_alias.as_str());
                let cell_alias = self
                    .aliases
                    .intern_cell(cell_style_properties(tc), first_alias);
                cells.push(Cell {
                    id: TargetId::Cell {
                        block,
                        row: r,
                        col: c,
                    },
                    style_alias: cell_alias,
                    paragraphs,
                });
            }
            rows.push(Row {
                id: TargetId::Row { block, row: r },
                style_alias: row_alias,
                cells,
            });
        }

        let column_count = rows.first().map_or(0, |r| r.cells.len());
        let table = Table {
            style_alias,
            rows,
            column_count,
        };
        if !table.is_rectangular() {
            log::warn!("Table b{} has rows with differing cell counts", block);
        }
        table
    }

    fn toc(&mut self, sdt: &Element, block: usize) -> Toc {
        let mut entries = Vec::new();
        let mut indents = Vec::new();
        for (i, p) in toc::entry_paragraphs(sdt).into_iter().enumerate() {
            let parsed = toc::parse_entry(p);
            let level_alias = (!parsed.is_blank())
                .then(|| {
                    self.aliases
                        .intern_toc_level(&parsed.fingerprint, parsed.indent, p)
                });
            let entry = TocEntry {
                id: TargetId::TocEntry { block, entry: i },
                level_alias,
                level: toc::level_from_style(p, self.styles),
                number: parsed.number,
                title: parsed.title,
                page: parsed.page,
                anchor: parsed.anchor,
            };
            if entry.is_entry() {
                indents.push(parsed.indent);
            }
            entries.push((entry, parsed.indent));
        }

        // Without TOCn styles the level is the indent rank
        indents.sort_unstable();
        indents.dedup();
        let mut out = Vec::with_capacity(entries.len());
        for (mut entry, indent) in entries {
            if entry.level.is_none() && entry.is_entry() {
                entry.level = indents
                    .iter()
                    .position(|i| *i == indent)
                    .and_then(|rank| u8::try_from(rank + 1).ok());
            }
            if let (Some(alias), Some(level)) = (&entry.level_alias, entry.level) {
                self.aliases.set_toc_level(alias, level);
            }
            out.push(entry);
        }
        Toc { entries: out }
    }
}

impl Extraction {
    /// Extract the blocks of a snapshot
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let Some(body) = snapshot.document().body() else {
            log::warn!("Document has no body; nothing to extract");
            return Self::default();
        };

        let mut extractor = Extractor {
            styles: snapshot.styles(),
            resolver: NumberingResolver::new(snapshot.numbering(), snapshot.styles()),
            aliases: StyleAliasTable::default(),
        };

        let mut blocks = Vec::new();
        for (source_index, node) in body.children.iter().enumerate() {
            let Some(el) = node.as_element() else {
                continue;
            };
            let n = blocks.len();
            let (kind, content) = match el.name.as_str() {
                "w:p" => {
                    let (kind, paragraph) = extractor.paragraph(el);
                    (kind, BlockContent::Paragraph(paragraph))
                }
                "w:tbl" => (BlockKind::Table, BlockContent::Table(extractor.table(el, n))),
                "w:sdt" if toc::is_toc_sdt(el) => (
                    BlockKind::TableOfContents,
                    BlockContent::Toc(extractor.toc(el, n)),
                ),
                "w:sdt" => (BlockKind::Other, BlockContent::Other { text: el.w_text() }),
                _ => continue,
            };
            blocks.push(Block {
                id: TargetId::Block(n),
                source_index,
                kind,
                content,
            });
        }

        log::debug!(
            "Extracted {} blocks, {} paragraph styles, {} table styles",
            blocks.len(),
            extractor.aliases.paragraphs.len(),
            extractor.aliases.tables.len()
        );
        Self {
            blocks,
            aliases: extractor.aliases,
        }
    }

    /// Block by dense index
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Block containing a target
    pub fn block_of(&self, target: &TargetId) -> Option<&Block> {
        self.blocks.get(target.block())
    }

    /// Heading blocks in document order
    pub fn headings(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_heading())
    }

    /// Table of contents blocks
    pub fn tocs(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|b| b.kind == BlockKind::TableOfContents)
    }

    /// Whether the document has a table of contents
    pub fn has_toc(&self) -> bool {
        self.tocs().next().is_some()
    }

    /// Heading blocks carrying a bookmark
    pub fn headings_with_bookmark<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.headings()
            .filter(move |b| b.paragraph().is_some_and(|p| p.bookmarks.iter().any(|m| m == name)))
    }

    /// Text-merge view with the default indeterminate marker
    pub fn text_merge(&self) -> String {
        text_merge::render(self, DEFAULT_INDETERMINATE_MARKER)
    }

    /// Text-merge view with a custom indeterminate marker
    pub fn text_merge_with(&self, marker: &str) -> String {
        text_merge::render(self, marker)
    }

    /// Serializable analysis
    pub fn analysis(&self, marker: &str) -> Analysis<'_> {
        Analysis {
            text_merge: self.text_merge_with(marker),
            blocks: &self.blocks,
            aliases: &self.aliases,
        }
    }
}
