//! In-memory documents for unit tests

use crate::package::tests::build_docx;
use crate::package::{
    Package, CONTENT_TYPES_PART, DOCUMENT_PART, DOCUMENT_RELS_PART, NUMBERING_PART, STYLES_PART,
};
use crate::snapshot::Snapshot;

pub(crate) const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

pub(crate) const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

pub(crate) const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

pub(crate) const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="0"/></w:pPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="1"/></w:pPr></w:style>
<w:style w:type="paragraph" w:styleId="TOC1"><w:name w:val="toc 1"/><w:basedOn w:val="Normal"/></w:style>
<w:style w:type="paragraph" w:styleId="TOC2"><w:name w:val="toc 2"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="220"/></w:pPr></w:style>
</w:styles>"#;

/// Wrap body markup into a full `word/document.xml`
pub(crate) fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

/// Container bytes for a body with optional styles and numbering parts
pub(crate) fn docx_bytes(body: &str, styles: Option<&str>, numbering: Option<&str>) -> Vec<u8> {
    let document = document_xml(body);
    let mut parts = vec![
        (CONTENT_TYPES_PART, CONTENT_TYPES),
        ("_rels/.rels", RELS),
        (DOCUMENT_PART, document.as_str()),
        (DOCUMENT_RELS_PART, DOCUMENT_RELS),
        (STYLES_PART, styles.unwrap_or(STYLES)),
    ];
    if let Some(numbering) = numbering {
        parts.push((NUMBERING_PART, numbering));
    }
    build_docx(&parts)
}

/// Snapshot of a body using the standard test styles
pub(crate) fn snapshot(body: &str) -> Snapshot {
    snapshot_with_parts(body, None, None)
}

/// Snapshot of a body with custom styles and numbering
pub(crate) fn snapshot_with_parts(
    body: &str,
    styles: Option<&str>,
    numbering: Option<&str>,
) -> Snapshot {
    let package = Package::from_bytes(docx_bytes(body, styles, numbering)).unwrap();
    Snapshot::from_package(package).unwrap()
}
