//! Run distribution
//!
//! A paragraph whose text is split across several run styles cannot take
//! new text blindly: the caller decides which words keep which formatting.
//! [`prompts`] describes the original distribution for every edit that needs
//! that decision and [`accept`] attaches the caller's answer to the plan once
//! it reassembles the new text exactly.

use crate::extract::Extraction;
use crate::model::{Paragraph, TargetId};
use crate::plan::{Action, EditPlan, EditRecord, EditUnit, PlanError, RunFragment};
use serde::{Deserialize, Serialize};

/// One run style offered to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStyle {
    /// Run alias (`R0`, ...)
    pub alias: String,
    /// Formatting summary (`bold, size:28`)
    pub description: String,
}

/// One span of the original text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Span text
    pub text: String,
    /// Run alias of the span
    pub alias: String,
    /// Character offset within the paragraph text
    pub offset: usize,
    /// Length in characters
    pub length: usize,
}

/// Request to distribute new text across run styles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPrompt {
    /// Edit position in the plan
    pub edit_index: usize,
    /// Edit target
    pub target_id: String,
    /// Run styles the answer may use
    pub run_styles: Vec<RunStyle>,
    /// How the original text was distributed (replace only)
    pub original_segments: Vec<Segment>,
    /// Text to distribute
    pub new_text: String,
    /// Ready-to-send prompt text
    pub prompt: String,
}

/// Prompts in wire form (`{"prompts": [...]}`)
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunPrompts {
    /// Prompts in plan order
    pub prompts: Vec<RunPrompt>,
}

/// Caller's answer for one edit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunAnswer {
    /// Edit position in the plan
    pub edit_index: usize,
    /// Fragments in order
    pub runs: Vec<RunFragment>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnswersWire {
    Wrapped { answers: Vec<RunAnswer> },
    Bare(Vec<RunAnswer>),
}

/// Parse `{"answers": [...]}` or a bare array of answers
pub fn parse_answers(json: &str) -> Result<Vec<RunAnswer>, PlanError> {
    let answers = match serde_json::from_str::<AnswersWire>(json)? {
        AnswersWire::Wrapped { answers } | AnswersWire::Bare(answers) => answers,
    };
    Ok(answers)
}

/// Paragraph a replace edit targets
fn replaced_paragraph<'a>(record: &EditRecord, extraction: &'a Extraction) -> Option<&'a Paragraph> {
    match record.target_id.parse::<TargetId>().ok()? {
        TargetId::Block(n) => extraction.block(n)?.paragraph(),
        TargetId::CellParagraph {
            block,
            row,
            col,
            para,
        } => extraction
            .block(block)?
            .table()?
            .cell(row, col)?
            .paragraphs
            .get(para)
            .map(|p| &p.paragraph),
        _ => None,
    }
}

/// Paragraph style alias new runs of an edit are built from
fn template_alias(record: &EditRecord, extraction: &Extraction) -> Option<String> {
    if let Some(alias) = &record.style_alias {
        return Some(alias.clone());
    }
    match record.action {
        Action::Replace => replaced_paragraph(record, extraction).map(|p| p.style_alias.clone()),
        _ => None,
    }
}

/// Run aliases an edit's fragments may use
pub fn run_pool(record: &EditRecord, extraction: &Extraction) -> Vec<String> {
    if let Some(pool) = &record.run_style_templates {
        return pool.keys().cloned().collect();
    }
    template_alias(record, extraction)
        .and_then(|alias| extraction.aliases.paragraph(&alias))
        .map(|t| t.runs.iter().map(|r| r.alias.clone()).collect())
        .unwrap_or_default()
}

fn segments(paragraph: &Paragraph) -> Vec<Segment> {
    let mut offset = 0;
    paragraph
        .runs
        .iter()
        .map(|run| {
            let length = run.text.chars().count();
            let segment = Segment {
                text: run.text.clone(),
                alias: run.run_style.clone(),
                offset,
                length,
            };
            offset += length;
            segment
        })
        .collect()
}

fn render_prompt(styles: &[RunStyle], segments: &[Segment], new_text: &str, tag: Option<&str>) -> String {
    let mut out = String::from("Run styles:\n");
    for style in styles {
        out.push_str(&format!("  {}: [{}]\n", style.alias, style.description));
    }
    if !segments.is_empty() {
        out.push_str("\nOriginal text distribution:\n");
        for segment in segments {
            out.push_str(&format!("  {:?} -> {}\n", segment.text, segment.alias));
        }
    } else if let Some(tag) = tag {
        out.push_str(&format!("Semantic context: {}\n", tag));
    }
    out.push_str(&format!(
        "\nNew text: {:?}\n\n\
         Task:\n\
         Distribute the new text across the run styles.\n\
         - Keep the formatting of key information (dates, numbers, terms)\n\
         - Follow the original distribution where it still fits\n\
         - The fragments must concatenate to the new text exactly\n\n\
         Output format (JSON only):\n\
         {{\"runs\": [{{\"text\": \"...\", \"run_style\": \"{}\"}}, ...]}}",
        new_text,
        styles.first().map_or("R0", |s| s.alias.as_str())
    ));
    out
}

/// Run distribution prompts for every paragraph edit that needs one
///
/// Replace edits qualify when the target paragraph uses two or more run
/// styles; inserts qualify when their template knows two or more. Edits that
/// already carry `runs` or work on table structure are skipped.
pub fn prompts(plan: &EditPlan, extraction: &Extraction) -> RunPrompts {
    let mut prompts = Vec::new();
    for (index, record) in plan.edits.iter().enumerate() {
        if record.action == Action::Delete || record.runs.is_some() {
            continue;
        }
        if matches!(
            record.edit_unit,
            Some(EditUnit::Table) | Some(EditUnit::Row) | Some(EditUnit::Column)
        ) {
            continue;
        }
        let Some(new_text) = record.new_text.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let Some(template) = template_alias(record, extraction)
            .and_then(|alias| extraction.aliases.paragraph(&alias))
        else {
            continue;
        };

        let describe = |alias: &str| RunStyle {
            alias: alias.to_string(),
            description: template
                .run(alias)
                .map_or_else(|| "default".to_string(), |r| r.description.clone()),
        };
        let (run_styles, original_segments) = match record.action {
            Action::Replace => {
                let Some(paragraph) = replaced_paragraph(record, extraction) else {
                    continue;
                };
                let styles: Vec<RunStyle> =
                    paragraph.run_styles().into_iter().map(describe).collect();
                (styles, segments(paragraph))
            }
            _ => (
                template.runs.iter().map(|r| describe(&r.alias)).collect(),
                Vec::new(),
            ),
        };
        if run_styles.len() < 2 {
            continue;
        }

        let prompt = render_prompt(
            &run_styles,
            &original_segments,
            new_text,
            record.semantic_tag.as_deref(),
        );
        prompts.push(RunPrompt {
            edit_index: index,
            target_id: record.target_id.clone(),
            run_styles,
            original_segments,
            new_text: new_text.to_string(),
            prompt,
        });
    }
    log::info!("{} edits need run distribution", prompts.len());
    RunPrompts { prompts }
}

/// Attach distributed fragments to an edit
///
/// The fragments must reassemble the edit's new text exactly and may only
/// use run aliases from the edit's pool.
pub fn accept(
    plan: &mut EditPlan,
    extraction: &Extraction,
    index: usize,
    fragments: Vec<RunFragment>,
) -> Result<(), PlanError> {
    let record = plan.edits.get(index).ok_or(PlanError::EditIndex {
        index,
        len: plan.edits.len(),
    })?;
    let pool = run_pool(record, extraction);
    if let Some(unknown) = fragments.iter().find(|f| !pool.contains(&f.run_style)) {
        return Err(PlanError::UnknownRunStyle {
            index,
            alias: unknown.run_style.clone(),
        });
    }
    plan.set_runs(index, fragments)
}

/// Attach every answer, stopping at the first rejected one
pub fn accept_all(
    plan: &mut EditPlan,
    extraction: &Extraction,
    answers: Vec<RunAnswer>,
) -> Result<usize, PlanError> {
    let count = answers.len();
    for answer in answers {
        accept(plan, extraction, answer.edit_index, answer.runs)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::snapshot;

    const BODY: &str = r#"<w:p><w:r><w:t xml:space="preserve">Due </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>Friday</w:t></w:r><w:r><w:t>.</w:t></w:r></w:p>
        <w:p><w:r><w:t>Single style</w:t></w:r></w:p>"#;

    fn extraction() -> Extraction {
        Extraction::from_snapshot(&snapshot(BODY))
    }

    fn fragment(text: &str, style: &str) -> RunFragment {
        RunFragment {
            text: text.to_string(),
            run_style: style.to_string(),
        }
    }

    #[test]
    fn test_prompts_only_for_multi_style_targets() {
        // Arrange
        let plan = EditPlan::new(vec![
            EditRecord::new(Action::Replace, "b0").with_text("Due Monday."),
            EditRecord::new(Action::Replace, "b1").with_text("Still single"),
            EditRecord::new(Action::Delete, "b0"),
        ]);

        // Act
        let result = prompts(&plan, &extraction());

        // Assert
        assert_eq!(result.prompts.len(), 1);
        let prompt = &result.prompts[0];
        assert_eq!(prompt.edit_index, 0);
        let aliases: Vec<&str> = prompt.run_styles.iter().map(|s| s.alias.as_str()).collect();
        assert_eq!(aliases, vec!["R0", "R1"]);
        assert_eq!(prompt.run_styles[1].description, "bold");
        let offsets: Vec<(usize, usize)> = prompt
            .original_segments
            .iter()
            .map(|s| (s.offset, s.length))
            .collect();
        assert_eq!(offsets, vec![(0, 4), (4, 6), (10, 1)]);
        assert!(prompt.prompt.contains("\"Friday\" -> R1"));
        assert!(prompt.prompt.contains("New text: \"Due Monday.\""));
    }

    #[test]
    fn test_render_prompt_lists_styles_then_context() {
        let styles = vec![
            RunStyle {
                alias: "R0".into(),
                description: "plain".into(),
            },
            RunStyle {
                alias: "R1".into(),
                description: "bold".into(),
            },
        ];

        let prompt = render_prompt(&styles, &[], "Also due", Some("BODY"));

        assert!(prompt.starts_with("Run styles:\n  R0: [plain]\n  R1: [bold]\nSemantic context: BODY\n\nNew text: \"Also due\"\n"));
        assert!(!prompt.contains("Original text distribution"));
        assert!(prompt.ends_with(r#"{"runs": [{"text": "...", "run_style": "R0"}, ...]}"#));
    }

    #[test]
    fn test_inserts_use_the_template_pool() {
        let plan = EditPlan::new(vec![EditRecord::new(Action::InsertAfter, "b1")
            .with_text("Also due")
            .with_style("S1")]);

        let result = prompts(&plan, &extraction());

        assert_eq!(result.prompts.len(), 1);
        assert!(result.prompts[0].original_segments.is_empty());
    }

    #[test]
    fn test_accept_checks_pool_and_concatenation() {
        // Arrange
        let extraction = extraction();
        let mut plan = EditPlan::new(vec![EditRecord::new(Action::Replace, "b0").with_text("Due Monday.")]);

        // Act
        let unknown = accept(
            &mut plan,
            &extraction,
            0,
            vec![fragment("Due ", "R0"), fragment("Monday.", "R7")],
        );
        let short = accept(&mut plan, &extraction, 0, vec![fragment("Due ", "R0")]);
        let good = accept(
            &mut plan,
            &extraction,
            0,
            vec![fragment("Due ", "R0"), fragment("Monday", "R1"), fragment(".", "R0")],
        );

        // Assert
        assert!(matches!(unknown, Err(PlanError::UnknownRunStyle { ref alias, .. }) if alias == "R7"));
        assert!(matches!(short, Err(PlanError::RunConcatenationMismatch { .. })));
        assert!(good.is_ok());
        assert_eq!(plan.edits[0].runs.as_ref().map(Vec::len), Some(3));
        assert!(prompts(&plan, &extraction).prompts.is_empty());
    }

    #[test]
    fn test_parse_answers_accepts_both_shapes() {
        let wrapped = r#"{"answers":[{"edit_index":2,"runs":[{"text":"a","run_style":"R0"}]}]}"#;
        let bare = r#"[{"edit_index":0,"runs":[]}]"#;

        assert_eq!(parse_answers(wrapped).unwrap()[0].edit_index, 2);
        assert!(parse_answers(bare).unwrap()[0].runs.is_empty());
    }
}
