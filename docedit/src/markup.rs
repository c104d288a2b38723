//! Minimal XML tree over quick-xml
//!
//! Word processing parts are parsed into a small owned tree of elements,
//! text and raw nodes. The parser additionally records the byte span of
//! every direct child of `<w:body>` so that a body can be re-rendered with
//! untouched children copied verbatim from the source.

mod error;
mod node;
mod reader;
mod writer;

pub use error::MarkupError;
pub use node::{Element, Node};
pub use reader::{parse, parse_element, BodyLayout, XmlDocument};
pub use writer::{write_element, BodyPart};

/// Qualified name of the WordprocessingML body element
pub const BODY: &str = "w:body";
