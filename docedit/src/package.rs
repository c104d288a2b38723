//! DOCX container access and repacking
//!
//! A .docx file is a ZIP archive of XML parts. The package keeps the original
//! container bytes alongside every decoded entry so that repacking can copy
//! untouched entries without recompressing them, and can hand back the
//! original bytes when nothing changed at all.

use crate::markup::{self, MarkupError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use thiserror::Error;
use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Main document part
pub const DOCUMENT_PART: &str = "word/document.xml";
/// Style sheet part
pub const STYLES_PART: &str = "word/styles.xml";
/// Numbering definitions part
pub const NUMBERING_PART: &str = "word/numbering.xml";
/// Document settings part
pub const SETTINGS_PART: &str = "word/settings.xml";
/// Content types part
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
/// Relationships of the main document part
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";

/// Entries every word processing container must carry
pub const REQUIRED_PARTS: &[&str] = &[
    CONTENT_TYPES_PART,
    DOCUMENT_PART,
    "_rels/.rels",
    DOCUMENT_RELS_PART,
];

const UPDATE_FIELDS_TAG: &str = r#"<w:updateFields w:val="true"/>"#;
const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

static UPDATE_FIELDS_VAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(<w:updateFields[^/>]*w:val=")[^"]*(")"#).expect("invalid updateFields regex")
});
static SELF_CLOSING_SETTINGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(<w:settings\b[^>]*?)\s*/>").expect("invalid settings regex")
});
static GENERATED_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?ns\d+:").expect("invalid namespace prefix regex"));

/// Replacement content for package entries, keyed by entry name
pub type PartOverrides = BTreeMap<String, Vec<u8>>;

/// Package errors
#[derive(Error, Debug)]
pub enum PackageError {
    /// I/O error reading or writing the container
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A part the engine cannot work without is absent
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// A part is not valid UTF-8
    #[error("Part {0} is not valid UTF-8")]
    Utf8(String),

    /// A part failed to parse
    #[error("Failed to parse {part}: {source}")]
    Markup {
        /// Entry name
        part: String,
        /// Underlying parse error
        #[source]
        source: MarkupError,
    },

    /// A part could not be patched
    #[error("Format error: {0}")]
    Format(String),
}

/// One decoded archive entry
#[derive(Debug, Clone)]
pub struct PackageEntry {
    /// Entry name inside the archive
    pub name: String,
    /// Decompressed content
    pub data: Vec<u8>,
}

/// An opened word processing container
#[derive(Debug, Clone)]
pub struct Package {
    bytes: Vec<u8>,
    entries: Vec<PackageEntry>,
}

impl Package {
    /// Read a container from disk
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Decode a container held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
            });
        }

        for required in [CONTENT_TYPES_PART, DOCUMENT_PART] {
            if !entries.iter().any(|e| e.name == required) {
                return Err(PackageError::MissingPart(required.to_string()));
            }
        }

        log::debug!("Opened package with {} entries", entries.len());
        Ok(Self { bytes, entries })
    }

    /// Original container bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Entries in archive order
    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    /// Raw content of a part
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Content of a part decoded as UTF-8
    pub fn part_str(&self, name: &str) -> Result<Option<&str>, PackageError> {
        match self.part(name) {
            Some(data) => std::str::from_utf8(data)
                .map(Some)
                .map_err(|_| PackageError::Utf8(name.to_string())),
            None => Ok(None),
        }
    }

    /// Write a new container with `overrides` applied
    ///
    /// Entries keep their original order; unchanged entries are copied
    /// without recompression and parts absent from the original are
    /// appended. When every override equals the original content the
    /// original container bytes are returned as is.
    pub fn repack(&self, overrides: &PartOverrides) -> Result<Vec<u8>, PackageError> {
        let changed: Vec<&str> = overrides
            .iter()
            .filter(|(name, data)| self.part(name) != Some(data.as_slice()))
            .map(|(name, _)| name.as_str())
            .collect();
        if changed.is_empty() {
            log::debug!("No part changed, reusing original container bytes");
            return Ok(self.bytes.clone());
        }
        log::info!("Repacking with changed parts: {}", changed.join(", "));

        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.bytes.len())));

        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            match overrides.get(&name) {
                Some(data) if changed.contains(&name.as_str()) => {
                    writer.start_file(name.as_str(), options)?;
                    writer.write_all(data)?;
                }
                _ => {
                    let file = archive.by_index_raw(i)?;
                    writer.raw_copy_file(file)?;
                }
            }
        }

        for (name, data) in overrides {
            if self.part(name).is_none() {
                writer.start_file(name.as_str(), options)?;
                writer.write_all(data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Add the overrides that make the host word processor refresh fields on open
    ///
    /// `overrides` may already hold a changed settings part; it is patched
    /// in place. When the package has no settings part a minimal one is
    /// created and registered with the content types and document
    /// relationships.
    pub fn add_update_fields(&self, overrides: &mut PartOverrides) -> Result<(), PackageError> {
        let current = match overrides.get(SETTINGS_PART) {
            Some(data) => Some(
                String::from_utf8(data.clone())
                    .map_err(|_| PackageError::Utf8(SETTINGS_PART.to_string()))?,
            ),
            None => self.part_str(SETTINGS_PART)?.map(str::to_string),
        };

        match current {
            Some(settings) => {
                overrides.insert(
                    SETTINGS_PART.to_string(),
                    inject_update_fields(&settings).into_bytes(),
                );
            }
            None => {
                log::info!("Creating {} with updateFields", SETTINGS_PART);
                overrides.insert(
                    SETTINGS_PART.to_string(),
                    minimal_settings().into_bytes(),
                );
                let content_types = self.part_str(CONTENT_TYPES_PART)?.unwrap_or_default();
                overrides.insert(
                    CONTENT_TYPES_PART.to_string(),
                    ensure_settings_content_type(content_types)?.into_bytes(),
                );
                if let Some(rels) = self.part_str(DOCUMENT_RELS_PART)? {
                    overrides.insert(
                        DOCUMENT_RELS_PART.to_string(),
                        ensure_settings_relationship(rels)?.into_bytes(),
                    );
                }
            }
        }
        Ok(())
    }
}

/// Force `<w:updateFields w:val="true"/>` into a settings part
///
/// String-level patching keeps the namespace declarations of the part
/// exactly as written.
pub fn inject_update_fields(settings: &str) -> String {
    if settings.contains("w:updateFields") {
        log::debug!("Flipping existing updateFields to true");
        UPDATE_FIELDS_VAL
            .replace_all(settings, "${1}true${2}")
            .into_owned()
    } else if settings.contains("</w:settings>") {
        settings.replacen(
            "</w:settings>",
            &format!("{}</w:settings>", UPDATE_FIELDS_TAG),
            1,
        )
    } else {
        SELF_CLOSING_SETTINGS
            .replace(settings, format!("${{1}}>{}</w:settings>", UPDATE_FIELDS_TAG))
            .into_owned()
    }
}

fn minimal_settings() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:settings xmlns:w=\"{}\">{}</w:settings>",
        WORDML_NS, UPDATE_FIELDS_TAG
    )
}

fn ensure_settings_content_type(xml: &str) -> Result<String, PackageError> {
    if xml.contains(r#"PartName="/word/settings.xml""#) {
        return Ok(xml.to_string());
    }
    let close = xml.rfind("</Types>").ok_or_else(|| {
        PackageError::Format("Could not find </Types> in [Content_Types].xml".to_string())
    })?;
    Ok(format!(
        "{}<Override PartName=\"/word/settings.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml\"/>{}",
        &xml[..close],
        &xml[close..]
    ))
}

fn ensure_settings_relationship(xml: &str) -> Result<String, PackageError> {
    if xml.contains(r#"Target="settings.xml""#) {
        return Ok(xml.to_string());
    }
    let close = xml.rfind("</Relationships>").ok_or_else(|| {
        PackageError::Format(format!("Could not find </Relationships> in {}", DOCUMENT_RELS_PART))
    })?;

    let max_rid = xml
        .match_indices(r#"Id="rId"#)
        .filter_map(|(pos, pat)| {
            let digits: String = xml[pos + pat.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse::<u32>().ok()
        })
        .max()
        .unwrap_or(0);

    Ok(format!(
        "{}<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings\" Target=\"settings.xml\"/>{}",
        &xml[..close],
        max_rid + 1,
        &xml[close..]
    ))
}

/// Structural check of a repacked container
///
/// Returns one message per problem; an empty list means the container
/// looks sound.
pub fn check_package(bytes: &[u8]) -> Vec<String> {
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => return vec![format!("Invalid ZIP/DOCX container: {}", e)],
    };

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let mut problems: Vec<String> = REQUIRED_PARTS
        .iter()
        .filter(|required| !names.iter().any(|n| n == *required))
        .map(|required| format!("Missing required part: {}", required))
        .collect();

    for name in names
        .iter()
        .filter(|n| n.ends_with(".xml") || n.ends_with(".rels"))
    {
        let mut content = String::new();
        let read = archive
            .by_name(name)
            .map_err(|e| e.to_string())
            .and_then(|mut f| f.read_to_string(&mut content).map_err(|e| e.to_string()));
        if let Err(e) = read {
            problems.push(format!("Cannot read {}: {}", name, e));
            continue;
        }

        match markup::parse(content.as_str()) {
            Ok(doc) => {
                if name == DOCUMENT_PART {
                    if doc.root().name != "w:document" {
                        problems.push("document.xml missing w:document element".to_string());
                    }
                    if doc.body().is_none() {
                        problems.push("document.xml missing w:body element".to_string());
                    }
                }
            }
            Err(e) => problems.push(format!("{} is not well-formed: {}", name, e)),
        }

        if GENERATED_PREFIX.is_match(&content) {
            problems.push(format!(
                "{} contains auto-generated namespace prefixes (ns0:, ns1:, ...)",
                name
            ));
        }
    }

    problems
}
