//! Error types for XML parsing and rendering

use thiserror::Error;

/// Errors raised while reading word processing XML parts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// The underlying tokenizer rejected the input
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax {
        /// Byte offset of the event that failed
        position: usize,
        /// Tokenizer message
        message: String,
    },

    /// A closing tag had no matching open element
    #[error("Unbalanced closing tag at byte {position}")]
    UnbalancedTag {
        /// Byte offset of the offending tag
        position: usize,
    },

    /// The input ended while elements were still open
    #[error("Unexpected end of input with {open} unclosed element(s)")]
    UnexpectedEof {
        /// Number of elements still open
        open: usize,
    },

    /// The input has no root element
    #[error("XML input has no root element")]
    NoRoot,

    /// The part is expected to contain a `<w:body>` element
    #[error("Document part has no <w:body> element")]
    MissingBody,

    /// A body part index does not exist in the source layout
    #[error("Body child {0} does not exist in the source document")]
    UnknownBodyChild(usize),
}
