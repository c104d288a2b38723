mod common;

use common::{body, docx, heading, numbered_heading, toc_entry, TOC_END, TOC_START};
use docedit::config::EditorConfig;
use docedit::extract::Extraction;
use docedit::package::{check_package, Package, SETTINGS_PART};
use docedit::pipeline::{Pipeline, PipelineError};
use docedit::plan::{Action, EditPlan, EditRecord};
use docedit::snapshot::Snapshot;
use docedit::validate::IssueCode;

fn snapshot(body: &str) -> Snapshot {
    Snapshot::from_package(Package::from_bytes(docx(body)).unwrap()).unwrap()
}

fn toc_titles(extraction: &Extraction) -> Vec<(String, String)> {
    extraction
        .tocs()
        .flat_map(|b| b.toc().unwrap().entries.iter())
        .map(|e| (e.number.clone(), e.title.clone()))
        .collect()
}

/// TOC, Intro, body text, Methods
fn report_body() -> String {
    [
        TOC_START.to_string(),
        toc_entry(1, "Intro", "3", "_Toc100"),
        toc_entry(1, "Methods", "5", "_Toc101"),
        TOC_END.to_string(),
        heading(1, "Intro", "_Toc100", 0),
        body("Body text"),
        heading(1, "Methods", "_Toc101", 1),
    ]
    .concat()
}

#[test]
fn test_empty_plan_repacks_byte_identical() {
    // Arrange
    let bytes = docx(&report_body());
    let before = Snapshot::from_package(Package::from_bytes(bytes.clone()).unwrap()).unwrap();
    let pipeline = Pipeline::default();

    // Act
    let outcome = pipeline.run(&before, &EditPlan::default()).unwrap();
    let repacked = pipeline.to_docx_bytes(&outcome).unwrap();

    // Assert
    assert!(!outcome.toc_changed);
    assert!(outcome.diff.is_empty());
    assert_eq!(repacked, bytes);
}

#[test]
fn test_new_heading_appears_in_toc_through_files() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("report.docx");
    let output = dir.path().join("report.edited.docx");
    std::fs::write(&input, docx(&report_body())).unwrap();

    let before = Snapshot::open(&input).unwrap();
    let pipeline = Pipeline::new(EditorConfig::default());
    let heading_alias = pipeline.extract(&before).blocks[1]
        .style_alias()
        .unwrap()
        .to_string();
    let plan = EditPlan::from_json(&format!(
        r#"{{"edits":[{{"action":"insert_after","target_id":"b2","semantic_tag":"H1","new_text":"Background","style_alias":"{}"}}]}}"#,
        heading_alias
    ))
    .unwrap();

    // Act
    let outcome = pipeline.run(&before, &plan).unwrap();
    let bytes = pipeline.to_docx_bytes(&outcome).unwrap();
    std::fs::write(&output, &bytes).unwrap();

    // Assert
    assert!(outcome.verification.ok, "{:?}", outcome.verification.findings);
    assert!(check_package(&bytes).is_empty());

    let after = Snapshot::open(&output).unwrap();
    let extraction = Extraction::from_snapshot(&after);
    let titles: Vec<String> = toc_titles(&extraction).into_iter().map(|(_, t)| t).collect();
    assert_eq!(titles, vec!["Intro", "Background", "Methods"]);

    let background = extraction
        .headings()
        .find(|b| b.text() == "Background")
        .unwrap();
    let bookmark = &background.paragraph().unwrap().bookmarks[0];
    assert!(bookmark.starts_with("_Toc"));
    let entry = &extraction.tocs().next().unwrap().toc().unwrap().entries[1];
    assert_eq!(entry.anchor.as_ref(), Some(bookmark));

    let settings = after.package().part_str(SETTINGS_PART).unwrap().unwrap();
    assert!(settings.contains(r#"<w:updateFields w:val="true"/>"#));
}

#[test]
fn test_cell_replace_leaves_other_blocks_alone() {
    let table = r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/></w:tblPr><w:tblGrid><w:gridCol w:w="4000"/><w:gridCol w:w="4000"/></w:tblGrid>
        <w:tr><w:tc><w:tcPr><w:tcW w:w="4000" w:type="dxa"/></w:tcPr><w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Name</w:t></w:r></w:p></w:tc><w:tc><w:tcPr><w:tcW w:w="4000" w:type="dxa"/></w:tcPr><w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Owner</w:t></w:r></w:p></w:tc></w:tr>
        <w:tr><w:tc><w:tcPr><w:tcW w:w="4000" w:type="dxa"/></w:tcPr><w:p><w:r><w:t>Parser</w:t></w:r></w:p></w:tc><w:tc><w:tcPr><w:tcW w:w="4000" w:type="dxa"/></w:tcPr><w:p><w:r><w:t>Ana</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
    let before = snapshot(&[body("Before"), table.to_string(), body("After")].concat());
    let plan = EditPlan::new(vec![EditRecord::new(Action::Replace, "b1:r1c1").with_text("Ben")]);

    let outcome = Pipeline::default().run(&before, &plan).unwrap();

    let extraction = Extraction::from_snapshot(&outcome.snapshot);
    let table = extraction.blocks[1].table().unwrap();
    assert_eq!(table.cell(1, 1).unwrap().text(), "Ben");
    assert_eq!(table.cell(0, 1).unwrap().text(), "Owner");
    assert!(table.is_rectangular());
    let source = outcome.snapshot.document().source();
    assert!(source.contains(r#"<w:tblStyle w:val="TableGrid"/>"#));
    assert!(source.contains("<w:t>Before</w:t>"));
    assert_eq!(outcome.diff.len(), 2);
    assert!(outcome.sync_report.is_none());
}

#[test]
fn test_numbered_heading_delete_renumbers_toc() {
    // Arrange
    let doc = [
        TOC_START.to_string(),
        toc_entry(1, "1. Intro", "1", "_Toc1"),
        toc_entry(2, "1-1. One", "1", "_Toc2"),
        toc_entry(2, "1-2. Two", "2", "_Toc3"),
        toc_entry(2, "1-3. Three", "3", "_Toc4"),
        TOC_END.to_string(),
        numbered_heading(1, "Intro", "_Toc1", 1),
        numbered_heading(2, "One", "_Toc2", 2),
        numbered_heading(2, "Two", "_Toc3", 3),
        body("Second section text"),
        numbered_heading(2, "Three", "_Toc4", 4),
    ]
    .concat();
    let before = snapshot(&doc);
    let plan = EditPlan::new(vec![EditRecord::new(Action::Delete, "b3")]);

    // Act
    let outcome = Pipeline::default().run(&before, &plan).unwrap();

    // Assert
    assert!(outcome.body_report.has(IssueCode::TocCascade));
    assert!(outcome.sync_report.is_some());
    assert!(outcome.verification.ok, "{:?}", outcome.verification.findings);

    let extraction = Extraction::from_snapshot(&outcome.snapshot);
    assert_eq!(
        toc_titles(&extraction),
        vec![
            ("1.".to_string(), "Intro".to_string()),
            ("1-1.".to_string(), "One".to_string()),
            ("1-2.".to_string(), "Three".to_string()),
        ]
    );
    let entries = &extraction.blocks[0].toc().unwrap().entries;
    assert_eq!(entries[2].page, "3");
    assert_eq!(entries[2].anchor.as_deref(), Some("_Toc4"));
}

#[test]
fn test_invalid_plan_writes_nothing() {
    let before = snapshot(&report_body());
    let plan = EditPlan::new(vec![
        EditRecord::new(Action::Replace, "b2").with_text("One"),
        EditRecord::new(Action::Delete, "b2"),
    ]);

    let err = Pipeline::default().run(&before, &plan).unwrap_err();

    let PipelineError::InvalidPlan(report) = &err else {
        panic!("expected an invalid plan, got {:?}", err);
    };
    assert!(report.has(IssueCode::ConflictingEdit));
    assert!(!before.is_modified());
}

#[test]
fn test_check_package_flags_broken_containers() {
    assert!(check_package(&docx(&body("fine"))).is_empty());
    assert!(!check_package(b"not a zip").is_empty());
}
