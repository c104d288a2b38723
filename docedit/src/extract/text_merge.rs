//! Text-merge view
//!
//! One line per block in document order:
//!
//! ```text
//! [b0:TITLE|S1] Annual report
//! [b1:TOC]
//!   [b1:p1|TL0] 1. Intro | 3
//! [b2:H1|S2|n=1.] Intro
//! [b3:TBL|T1]
//!   [b3:r0|RS0]
//!     [b3:r0c0|CS0] [p0|S2] Name
//! ```
//!
//! Blank paragraphs are left out; tables and TOCs always appear.

use super::Extraction;
use crate::model::{BlockContent, Numbering, Paragraph};

fn numbering_marker(paragraph: &Paragraph, indeterminate: &str) -> String {
    match &paragraph.numbering {
        Some(Numbering::Computed { prefix, .. }) => format!("|n={}", prefix),
        Some(Numbering::Indeterminate { .. }) => format!("|n={}", indeterminate),
        None => String::new(),
    }
}

/// Render the text-merge view of an extraction
pub fn render(extraction: &Extraction, indeterminate: &str) -> String {
    let mut out = String::new();
    for block in &extraction.blocks {
        match &block.content {
            BlockContent::Paragraph(p) => {
                if p.text.trim().is_empty() {
                    continue;
                }
                out.push_str(&format!(
                    "[{}:{}|{}{}] {}\n",
                    block.id,
                    block.kind,
                    p.style_alias,
                    numbering_marker(p, indeterminate),
                    p.text
                ));
            }
            BlockContent::Table(table) => {
                out.push_str(&format!("[{}:{}|{}]\n", block.id, block.kind, table.style_alias));
                for row in &table.rows {
                    out.push_str(&format!("  [{}|{}]\n", row.id, row.style_alias));
                    for cell in &row.cells {
                        out.push_str(&format!("    [{}|{}]", cell.id, cell.style_alias));
                        for (i, cp) in cell.paragraphs.iter().enumerate() {
                            let p = &cp.paragraph;
                            if i > 0 {
                                out.push_str("\n      ");
                            } else {
                                out.push(' ');
                            }
                            out.push_str(&format!(
                                "[p{}|{}{}] {}",
                                i,
                                p.style_alias,
                                numbering_marker(p, indeterminate),
                                p.text
                            ));
                        }
                        out.push('\n');
                    }
                }
            }
            BlockContent::Toc(toc) => {
                out.push_str(&format!("[{}:{}]\n", block.id, block.kind));
                for entry in &toc.entries {
                    let Some(alias) = &entry.level_alias else {
                        continue;
                    };
                    out.push_str(&format!("  [{}|{}] {}\n", entry.id, alias, entry.text()));
                }
            }
            BlockContent::Other { text } => {
                if text.trim().is_empty() {
                    continue;
                }
                out.push_str(&format!("[{}:{}] {}\n", block.id, block.kind, text));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::extract::Extraction;
    use crate::fixtures::snapshot;

    const BODY: &str = r#"<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Report</w:t></w:r></w:p>
        <w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Table of Contents"/></w:docPartObj></w:sdtPr><w:sdtContent>
          <w:p><w:r><w:t>Contents</w:t></w:r></w:p>
          <w:p><w:pPr><w:pStyle w:val="TOC1"/></w:pPr><w:hyperlink w:anchor="_Toc1"><w:r><w:t>Intro</w:t></w:r><w:r><w:tab/><w:t>3</w:t></w:r></w:hyperlink></w:p>
        </w:sdtContent></w:sdt>
        <w:p/>
        <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:bookmarkStart w:id="1" w:name="_Toc1"/><w:r><w:t>Intro</w:t></w:r><w:bookmarkEnd w:id="1"/></w:p>
        <w:tbl><w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>A</w:t></w:r></w:p><w:p><w:r><w:t>B</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;

    #[test]
    fn test_render_all_block_kinds() {
        // Arrange
        let extraction = Extraction::from_snapshot(&snapshot(BODY));

        // Act
        let view = extraction.text_merge();

        // Assert
        let expected = "\
[b0:TITLE|S1] Report
[b1:TOC]
  [b1:p0|TL0] Contents
  [b1:p1|TL0] Intro | 3
[b3:H1|S3] Intro
[b4:TBL|T1]
  [b4:r0|RS0]
    [b4:r0c0|CS0] [p0|S2] Name
    [b4:r0c1|CS0] [p0|S2] A
      [p1|S2] B
";
        assert_eq!(view, expected);
    }
}
