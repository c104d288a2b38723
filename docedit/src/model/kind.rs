//! Semantic block kinds and their text tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic kind of a block
///
/// Serialized as the short tags used in the text-merge view and in edit
/// plans: `H1`..`H9`, `BODY`, `LIST`, `TITLE`, `SUBTITLE`, `TBL`, `TOC`, `OTHER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BlockKind {
    /// Outline heading, level 1-9
    Heading(u8),
    /// Ordinary body paragraph
    Body,
    /// Numbered or bulleted list item
    List,
    /// Document title
    Title,
    /// Document subtitle
    Subtitle,
    /// Table
    Table,
    /// Table of contents container
    TableOfContents,
    /// Any other addressable content (non-TOC content controls)
    Other,
}

impl BlockKind {
    /// Whether the kind is carried by a single paragraph
    pub fn is_paragraph(self) -> bool {
        matches!(
            self,
            BlockKind::Heading(_)
                | BlockKind::Body
                | BlockKind::List
                | BlockKind::Title
                | BlockKind::Subtitle
        )
    }

    /// Heading level, if this is a heading
    pub fn heading_level(self) -> Option<u8> {
        match self {
            BlockKind::Heading(level) => Some(level),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Heading(level) => write!(f, "H{}", level),
            BlockKind::Body => write!(f, "BODY"),
            BlockKind::List => write!(f, "LIST"),
            BlockKind::Title => write!(f, "TITLE"),
            BlockKind::Subtitle => write!(f, "SUBTITLE"),
            BlockKind::Table => write!(f, "TBL"),
            BlockKind::TableOfContents => write!(f, "TOC"),
            BlockKind::Other => write!(f, "OTHER"),
        }
    }
}

impl FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase();
        match tag.as_str() {
            "BODY" => Ok(BlockKind::Body),
            "LIST" => Ok(BlockKind::List),
            "TITLE" => Ok(BlockKind::Title),
            "SUBTITLE" => Ok(BlockKind::Subtitle),
            "TBL" | "TABLE" => Ok(BlockKind::Table),
            "TOC" => Ok(BlockKind::TableOfContents),
            "OTHER" | "SDT" => Ok(BlockKind::Other),
            _ => tag
                .strip_prefix('H')
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| (1..=9).contains(n))
                .map(BlockKind::Heading)
                .ok_or_else(|| format!("Unknown semantic tag '{}'", s)),
        }
    }
}

impl TryFrom<String> for BlockKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        kind.to_string()
    }
}
