//! Immutable document snapshots
//!
//! A snapshot is one fully parsed state of a document. Stages never modify
//! a snapshot; the mutator renders a new `word/document.xml` and wraps it
//! in a fresh snapshot over the same container.

use crate::markup::{self, XmlDocument};
use crate::numbering::NumberingDefinitions;
use crate::package::{
    Package, PackageError, PartOverrides, DOCUMENT_PART, NUMBERING_PART, STYLES_PART,
};
use crate::styles::StyleSheet;
use std::path::Path;
use std::sync::Arc;

/// One parsed state of a document
#[derive(Debug, Clone)]
pub struct Snapshot {
    package: Arc<Package>,
    document: XmlDocument,
    styles: Arc<StyleSheet>,
    numbering: Arc<NumberingDefinitions>,
}

fn parse_part(name: &str, xml: &str) -> Result<XmlDocument, PackageError> {
    markup::parse(xml).map_err(|source| PackageError::Markup {
        part: name.to_string(),
        source,
    })
}

impl Snapshot {
    /// Open a .docx file
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        Self::from_package(Package::open(path)?)
    }

    /// Parse the parts of an opened package
    pub fn from_package(package: Package) -> Result<Self, PackageError> {
        let document_xml = package
            .part_str(DOCUMENT_PART)?
            .ok_or_else(|| PackageError::MissingPart(DOCUMENT_PART.to_string()))?;
        let document = parse_part(DOCUMENT_PART, document_xml)?;
        if document.body_layout().is_none() {
            return Err(PackageError::Markup {
                part: DOCUMENT_PART.to_string(),
                source: markup::MarkupError::MissingBody,
            });
        }

        let styles = match package.part_str(STYLES_PART)? {
            Some(xml) => StyleSheet::from_root(parse_part(STYLES_PART, xml)?.root()),
            None => {
                log::warn!("Package has no {}, style inference limited to style ids", STYLES_PART);
                StyleSheet::default()
            }
        };
        let numbering = match package.part_str(NUMBERING_PART)? {
            Some(xml) => NumberingDefinitions::from_root(parse_part(NUMBERING_PART, xml)?.root()),
            None => NumberingDefinitions::missing(),
        };

        Ok(Self {
            package: Arc::new(package),
            document,
            styles: Arc::new(styles),
            numbering: Arc::new(numbering),
        })
    }

    /// New snapshot over the same container with a replaced document part
    pub fn with_document_xml(&self, xml: String) -> Result<Self, PackageError> {
        let document = parse_part(DOCUMENT_PART, &xml)?;
        if document.body_layout().is_none() {
            return Err(PackageError::Markup {
                part: DOCUMENT_PART.to_string(),
                source: markup::MarkupError::MissingBody,
            });
        }
        Ok(Self {
            package: Arc::clone(&self.package),
            document,
            styles: Arc::clone(&self.styles),
            numbering: Arc::clone(&self.numbering),
        })
    }

    /// Underlying container
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Parsed `word/document.xml`
    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Paragraph styles
    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    /// Numbering definitions
    pub fn numbering(&self) -> &NumberingDefinitions {
        &self.numbering
    }

    /// Whether the document part differs from the one in the container
    pub fn is_modified(&self) -> bool {
        self.package.part(DOCUMENT_PART) != Some(self.document.source().as_bytes())
    }

    /// Serialize the snapshot into a .docx container
    ///
    /// With `update_fields` the settings part asks the word processor to
    /// refresh fields (TOC page numbers) when the file is opened.
    pub fn to_docx_bytes(&self, update_fields: bool) -> Result<Vec<u8>, PackageError> {
        let mut overrides = PartOverrides::new();
        overrides.insert(
            DOCUMENT_PART.to_string(),
            self.document.source().as_bytes().to_vec(),
        );
        if update_fields {
            self.package.add_update_fields(&mut overrides)?;
        }
        self.package.repack(&overrides)
    }
}
