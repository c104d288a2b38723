//! Block model produced by extraction
//!
//! Every addressable unit of the document body is a [`Block`]. Tables and
//! tables of contents carry their sub-units (rows, cells, cell paragraphs,
//! entries) which are addressed through [`TargetId`].

mod block;
mod kind;
mod target;

pub use block::{
    Block, BlockContent, Cell, CellParagraph, Numbering, Paragraph, Row, RunSpan, Table, Toc,
    TocEntry,
};
pub use kind::BlockKind;
pub use target::TargetId;
