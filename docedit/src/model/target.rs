//! Block and sub-unit identifiers

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static TARGET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^b(\d+)(?::(?:r(\d+)(?:c(\d+)(?:p(\d+))?)?|c(\d+)|p(\d+)))?$")
        .expect("invalid target id regex")
});

/// Address of a block or of a sub-unit inside a table or TOC
///
/// | form           | meaning                         |
/// |----------------|---------------------------------|
/// | `b3`           | body block                      |
/// | `b3:r1`        | table row                       |
/// | `b3:r1c2`      | table cell                      |
/// | `b3:r1c2p0`    | paragraph inside a table cell   |
/// | `b3:c2`        | table column                    |
/// | `b3:p4`        | TOC entry (sdtContent paragraph)|
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetId {
    /// Whole block
    Block(usize),
    /// Table row
    Row {
        /// Block number
        block: usize,
        /// Row index
        row: usize,
    },
    /// Table cell
    Cell {
        /// Block number
        block: usize,
        /// Row index
        row: usize,
        /// Column index
        col: usize,
    },
    /// Paragraph inside a table cell
    CellParagraph {
        /// Block number
        block: usize,
        /// Row index
        row: usize,
        /// Column index
        col: usize,
        /// Paragraph index within the cell
        para: usize,
    },
    /// Table column
    Column {
        /// Block number
        block: usize,
        /// Column index
        col: usize,
    },
    /// TOC entry
    TocEntry {
        /// Block number
        block: usize,
        /// Paragraph index within the TOC content
        entry: usize,
    },
}

impl TargetId {
    /// Number of the body block this target lives in
    pub fn block(&self) -> usize {
        match *self {
            TargetId::Block(block)
            | TargetId::Row { block, .. }
            | TargetId::Cell { block, .. }
            | TargetId::CellParagraph { block, .. }
            | TargetId::Column { block, .. }
            | TargetId::TocEntry { block, .. } => block,
        }
    }

    /// Identifier of the enclosing body block
    pub fn block_id(&self) -> TargetId {
        TargetId::Block(self.block())
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TargetId::Block(b) => write!(f, "b{}", b),
            TargetId::Row { block, row } => write!(f, "b{}:r{}", block, row),
            TargetId::Cell { block, row, col } => write!(f, "b{}:r{}c{}", block, row, col),
            TargetId::CellParagraph {
                block,
                row,
                col,
                para,
            } => write!(f, "b{}:r{}c{}p{}", block, row, col, para),
            TargetId::Column { block, col } => write!(f, "b{}:c{}", block, col),
            TargetId::TocEntry { block, entry } => write!(f, "b{}:p{}", block, entry),
        }
    }
}

impl FromStr for TargetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Unrecognised target_id format: '{}'", s);
        let caps = TARGET_RE.captures(s.trim()).ok_or_else(invalid)?;
        let num = |i: usize| -> Result<Option<usize>, String> {
            caps.get(i)
                .map(|m| m.as_str().parse::<usize>().map_err(|_| invalid()))
                .transpose()
        };

        let block = num(1)?.ok_or_else(invalid)?;
        let target = match (num(2)?, num(3)?, num(4)?, num(5)?, num(6)?) {
            (None, None, None, None, None) => TargetId::Block(block),
            (Some(row), None, None, None, None) => TargetId::Row { block, row },
            (Some(row), Some(col), None, None, None) => TargetId::Cell { block, row, col },
            (Some(row), Some(col), Some(para), None, None) => TargetId::CellParagraph {
                block,
                row,
                col,
                para,
            },
            (None, None, None, Some(col), None) => TargetId::Column { block, col },
            (None, None, None, None, Some(entry)) => TargetId::TocEntry { block, entry },
            _ => return Err(invalid()),
        };
        Ok(target)
    }
}

impl TryFrom<String> for TargetId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetId> for String {
    fn from(id: TargetId) -> Self {
        id.to_string()
    }
}
