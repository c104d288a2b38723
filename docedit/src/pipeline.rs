//! Two-pass edit pipeline
//!
//! This module strings the stages together:
//! 1. **Extraction**: read blocks, aliases and numbering from a snapshot
//! 2. **Body pass**: validate the caller's plan and apply it
//! 3. **Sync pass**: when the body pass touched headings and the document
//!    has a TOC, re-extract, plan the TOC synchronisation, validate and
//!    apply it
//! 4. **Verification**: re-extract the result, check it and diff the
//!    text-merge views
//!
//! Every stage takes a snapshot and returns a new one; nothing is written
//! to disk here.

use crate::apply::{apply_with, ApplyError};
use crate::config::EditorConfig;
use crate::extract::Extraction;
use crate::package::PackageError;
use crate::plan::EditPlan;
use crate::snapshot::Snapshot;
use crate::toc_sync::{plan_toc_sync, SyncError};
use crate::validate::{validate, ValidatedPlan, ValidationReport};
use crate::verify::{diff_text_merge, verify, DiffLine, VerifyReport};
use itertools::Itertools;
use thiserror::Error;

/// Result of one validate-and-apply pass
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// Snapshot after the pass
    pub snapshot: Snapshot,
    /// Validation report of the pass's plan
    pub report: ValidationReport,
    /// The applied plan
    pub plan: ValidatedPlan,
}

/// Result of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Final snapshot
    pub snapshot: Snapshot,
    /// Report of the caller's plan
    pub body_report: ValidationReport,
    /// Report of the generated TOC plan, when a sync pass ran
    pub sync_report: Option<ValidationReport>,
    /// Whether any pass edited a TOC
    pub toc_changed: bool,
    /// Checks on the final snapshot
    pub verification: VerifyReport,
    /// Text-merge lines added and removed
    pub diff: Vec<DiffLine>,
}

/// Drives extraction, validation, application and TOC synchronisation
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: EditorConfig,
}

impl Pipeline {
    /// Pipeline with the given configuration
    pub fn new(config: EditorConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Stage 1: extract a snapshot
    pub fn extract(&self, snapshot: &Snapshot) -> Extraction {
        Extraction::from_snapshot(snapshot)
    }

    /// Text-merge view with the configured indeterminate marker
    pub fn text_merge(&self, extraction: &Extraction) -> String {
        extraction.text_merge_with(&self.config.text_merge.indeterminate_marker)
    }

    /// Validate a plan and apply it
    ///
    /// # Parameters
    /// * `snapshot` - Snapshot the plan was written against
    /// * `plan` - Caller's edit plan
    ///
    /// # Returns
    /// * `Ok(PassOutcome)` - The plan was valid and applied
    /// * `Err(PipelineError)` - Validation failed or application aborted
    pub fn apply_plan(&self, snapshot: &Snapshot, plan: &EditPlan) -> Result<PassOutcome, PipelineError> {
        let extraction = self.extract(snapshot);
        let validation = validate(plan, &extraction);
        let Some(validated) = validation.plan else {
            return Err(PipelineError::InvalidPlan(validation.report));
        };
        let snapshot = apply_with(snapshot, &extraction, &validated, &self.config.apply_options())?;
        Ok(PassOutcome {
            snapshot,
            report: validation.report,
            plan: validated,
        })
    }

    /// Bring every TOC in line with the headings
    ///
    /// Returns `None` when the TOCs already match.
    pub fn sync_toc(&self, snapshot: &Snapshot) -> Result<Option<PassOutcome>, PipelineError> {
        let extraction = self.extract(snapshot);
        let plan = plan_toc_sync(&extraction)?;
        if plan.is_empty() {
            log::info!("Tables of contents already match the headings");
            return Ok(None);
        }
        let validation = validate(&plan, &extraction);
        let Some(validated) = validation.plan else {
            return Err(PipelineError::InvalidSyncPlan(validation.report));
        };
        let synced = apply_with(snapshot, &extraction, &validated, &self.config.apply_options())?;
        Ok(Some(PassOutcome {
            snapshot: synced,
            report: validation.report,
            plan: validated,
        }))
    }

    /// Run both passes and verify the result
    pub fn run(&self, snapshot: &Snapshot, plan: &EditPlan) -> Result<PipelineOutcome, PipelineError> {
        let before = self.text_merge(&self.extract(snapshot));

        let body = self.apply_plan(snapshot, plan)?;
        let mut toc_changed = body.plan.operations().iter().any(|op| op.is_toc_edit());
        let needs_sync =
            self.config.toc.auto_sync && body.plan.touches_headings() && self.extract(&body.snapshot).has_toc();

        let (snapshot, sync_report) = if needs_sync {
            log::info!("Plan touched headings; running the TOC synchronisation pass");
            match self.sync_toc(&body.snapshot)? {
                Some(sync) => {
                    toc_changed = true;
                    (sync.snapshot, Some(sync.report))
                }
                None => (body.snapshot, None),
            }
        } else {
            (body.snapshot, None)
        };

        let extraction = self.extract(&snapshot);
        let verification = verify(&extraction);
        let diff = diff_text_merge(&before, &self.text_merge(&extraction));
        log::info!(
            "Pipeline finished: {} changed lines, verification {}",
            diff.len(),
            if verification.ok { "passed" } else { "failed" }
        );

        Ok(PipelineOutcome {
            snapshot,
            body_report: body.report,
            sync_report,
            toc_changed,
            verification,
            diff,
        })
    }

    /// Container bytes for a pipeline result
    ///
    /// Fields are marked for refresh only when a TOC changed.
    pub fn to_docx_bytes(&self, outcome: &PipelineOutcome) -> Result<Vec<u8>, PipelineError> {
        let update_fields = self.config.repack.update_fields && outcome.toc_changed;
        Ok(outcome.snapshot.to_docx_bytes(update_fields)?)
    }
}

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The caller's plan failed validation
    #[error("edit plan is invalid:\n{}", .0.errors.iter().join("\n"))]
    InvalidPlan(ValidationReport),

    /// The synchronisation plan failed validation
    #[error("generated TOC plan is invalid:\n{}", .0.errors.iter().join("\n"))]
    InvalidSyncPlan(ValidationReport),

    /// Application aborted
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// Synchronisation could not be planned
    #[error("TOC sync error: {0}")]
    Sync(#[from] SyncError),

    /// Container could not be written
    #[error("Package error: {0}")]
    Package(#[from] PackageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::snapshot;
    use crate::plan::{Action, EditRecord};
    use crate::verify::Change;

    const BODY: &str = r#"<w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Table of Contents"/></w:docPartObj></w:sdtPr><w:sdtContent>
<w:p><w:pPr><w:pStyle w:val="TOC1"/></w:pPr><w:hyperlink w:anchor="_Toc1"><w:r><w:t>Intro</w:t></w:r><w:r><w:tab/></w:r><w:r><w:t>3</w:t></w:r></w:hyperlink></w:p>
<w:p><w:pPr><w:pStyle w:val="TOC1"/></w:pPr><w:hyperlink w:anchor="_Toc2"><w:r><w:t>Methods</w:t></w:r><w:r><w:tab/></w:r><w:r><w:t>5</w:t></w:r></w:hyperlink></w:p>
</w:sdtContent></w:sdt>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:bookmarkStart w:id="1" w:name="_Toc1"/><w:r><w:t>Intro</w:t></w:r><w:bookmarkEnd w:id="1"/></w:p>
<w:p><w:r><w:t>Body text</w:t></w:r></w:p>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:bookmarkStart w:id="2" w:name="_Toc2"/><w:r><w:t>Methods</w:t></w:r><w:bookmarkEnd w:id="2"/></w:p>"#;

    fn heading_alias(extraction: &Extraction) -> String {
        extraction.blocks[1].style_alias().unwrap().to_string()
    }

    #[test]
    fn test_heading_insert_runs_sync_pass() {
        // Arrange
        let before = snapshot(BODY);
        let alias = heading_alias(&Extraction::from_snapshot(&before));
        let plan = EditPlan::new(vec![EditRecord::new(Action::InsertAfter, "b2")
            .with_text("Background")
            .with_style(alias)
            .with_tag("H1")]);

        // Act
        let outcome = Pipeline::default().run(&before, &plan).unwrap();

        // Assert
        assert!(outcome.sync_report.is_some());
        assert!(outcome.toc_changed);
        assert!(outcome.verification.ok, "{:?}", outcome.verification.findings);
        let extraction = Extraction::from_snapshot(&outcome.snapshot);
        let titles: Vec<String> = extraction.blocks[0]
            .toc()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.title.clone())
            .collect();
        assert_eq!(titles, vec!["Intro", "Background", "Methods"]);
        assert_eq!(extraction.headings().count(), 3);
        assert!(outcome
            .diff
            .iter()
            .any(|d| d.change == Change::Added && d.text.ends_with("Background")));
    }

    #[test]
    fn test_body_only_plan_skips_sync() {
        let before = snapshot(BODY);
        let plan = EditPlan::new(vec![EditRecord::new(Action::Replace, "b2").with_text("New body")]);

        let outcome = Pipeline::default().run(&before, &plan).unwrap();

        assert!(outcome.sync_report.is_none());
        assert!(!outcome.toc_changed);
        assert!(outcome.verification.ok);
    }

    #[test]
    fn test_invalid_plan_is_rejected_before_mutation() {
        let before = snapshot(BODY);
        let plan = EditPlan::new(vec![EditRecord::new(Action::Replace, "b42").with_text("x")]);

        let err = Pipeline::default().run(&before, &plan).unwrap_err();

        assert!(matches!(err, PipelineError::InvalidPlan(ref report) if !report.valid));
    }

    #[test]
    fn test_update_fields_only_when_toc_changed() {
        let before = snapshot(BODY);
        let pipeline = Pipeline::default();
        let plan = EditPlan::new(vec![EditRecord::new(Action::Replace, "b2").with_text("New body")]);

        let outcome = pipeline.run(&before, &plan).unwrap();
        let bytes = pipeline.to_docx_bytes(&outcome).unwrap();

        let package = crate::package::Package::from_bytes(bytes).unwrap();
        assert!(package.part(crate::package::SETTINGS_PART).is_none());
    }
}
