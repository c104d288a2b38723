//! docedit - DOCX edit reconciliation tool
//!
//! A CLI tool that extracts the addressable blocks of a .docx document,
//! applies block-level edit plans to it and keeps its tables of contents in
//! line with its headings.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::pedantic))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(missing_docs))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use docedit::config::EditorConfig;
use docedit::package::check_package;
use docedit::pipeline::{Pipeline, PipelineError};
use docedit::plan::EditPlan;
use docedit::runs;
use docedit::snapshot::Snapshot;
use docedit::verify::{verify, Change};
use std::path::{Path, PathBuf};

/// Main entry point for the docedit CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Info);
    }
    logger.init();

    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let config = EditorConfig::resolve(cli.config.as_deref(), &cwd).context("Failed to load configuration")?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Commands::Analyze { input, output_dir } => handle_analyze_command(&pipeline, &input, &output_dir)?,
        Commands::Validate { input, plan } => handle_validate_command(&pipeline, &input, &plan)?,
        Commands::Prompts {
            input,
            plan,
            answers,
            output,
        } => handle_prompts_command(&pipeline, &input, &plan, answers, output)?,
        Commands::Apply {
            input,
            plan,
            output,
            diff,
        } => handle_apply_command(&pipeline, &input, &plan, &output, diff)?,
        Commands::SyncToc { input, output } => handle_sync_toc_command(&pipeline, &input, &output)?,
        Commands::Verify { input } => handle_verify_command(&pipeline, &input)?,
        Commands::Repack {
            input,
            output,
            update_fields,
        } => handle_repack_command(&input, &output, update_fields)?,
    }

    Ok(())
}

fn open_snapshot(input: &Path) -> Result<Snapshot> {
    Snapshot::open(input).with_context(|| format!("Failed to open {}", input.display()))
}

fn load_plan(path: &Path) -> Result<EditPlan> {
    EditPlan::load(path).with_context(|| format!("Failed to load edit plan {}", path.display()))
}

/// Write a container and re-check it
fn write_docx(output: &Path, bytes: &[u8]) -> Result<()> {
    let problems = check_package(bytes);
    if !problems.is_empty() {
        anyhow::bail!("Refusing to write a broken container:\n  {}", problems.join("\n  "));
    }
    std::fs::write(output, bytes).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("✓ Successfully wrote: {}", output.display());
    Ok(())
}

/// Handle the analyze command
fn handle_analyze_command(pipeline: &Pipeline, input: &Path, output_dir: &Path) -> Result<()> {
    let snapshot = open_snapshot(input)?;
    let extraction = pipeline.extract(&snapshot);
    let marker = &pipeline.config().text_merge.indeterminate_marker;

    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create directory {}", output_dir.display()))?;
    }

    let analysis = serde_json::to_string_pretty(&extraction.analysis(marker)).context("Failed to serialize analysis")?;
    let analysis_path = output_dir.join("analysis.json");
    std::fs::write(&analysis_path, analysis)
        .with_context(|| format!("Failed to write {}", analysis_path.display()))?;

    let merge_path = output_dir.join("text_merge.txt");
    std::fs::write(&merge_path, pipeline.text_merge(&extraction))
        .with_context(|| format!("Failed to write {}", merge_path.display()))?;

    println!(
        "✓ Extracted {} blocks ({} headings, {} TOCs)",
        extraction.blocks.len(),
        extraction.headings().count(),
        extraction.tocs().count()
    );
    println!("  - {}", analysis_path.display());
    println!("  - {}", merge_path.display());
    Ok(())
}

/// Handle the validate command
fn handle_validate_command(pipeline: &Pipeline, input: &Path, plan_path: &Path) -> Result<()> {
    let snapshot = open_snapshot(input)?;
    let plan = load_plan(plan_path)?;
    let extraction = pipeline.extract(&snapshot);

    let validation = docedit::validate::validate(&plan, &extraction);
    println!(
        "{}",
        serde_json::to_string_pretty(&validation.report).context("Failed to serialize validation report")?
    );
    if !validation.report.valid {
        anyhow::bail!("Edit plan has {} errors", validation.report.errors.len());
    }
    Ok(())
}

/// Handle the prompts command
fn handle_prompts_command(
    pipeline: &Pipeline,
    input: &Path,
    plan_path: &Path,
    answers: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let snapshot = open_snapshot(input)?;
    let mut plan = load_plan(plan_path)?;
    let extraction = pipeline.extract(&snapshot);

    let Some(answers_path) = answers else {
        let prompts = runs::prompts(&plan, &extraction);
        let json = serde_json::to_string_pretty(&prompts).context("Failed to serialize prompts")?;
        match output {
            Some(path) => {
                std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                println!("✓ Wrote {} prompts to {}", prompts.prompts.len(), path.display());
            }
            None => println!("{}", json),
        }
        return Ok(());
    };

    let content = std::fs::read_to_string(&answers_path)
        .with_context(|| format!("Failed to read {}", answers_path.display()))?;
    let answers = runs::parse_answers(&content).context("Failed to parse answers")?;
    let accepted = runs::accept_all(&mut plan, &extraction, answers).context("Answer rejected")?;

    let target = output.unwrap_or_else(|| plan_path.to_path_buf());
    plan.save(&target)
        .with_context(|| format!("Failed to write edit plan {}", target.display()))?;
    println!("✓ Accepted {} answers into {}", accepted, target.display());
    Ok(())
}

/// Handle the apply command
fn handle_apply_command(pipeline: &Pipeline, input: &Path, plan_path: &Path, output: &Path, diff: bool) -> Result<()> {
    let snapshot = open_snapshot(input)?;
    let plan = load_plan(plan_path)?;

    let outcome = match pipeline.run(&snapshot, &plan) {
        Ok(outcome) => outcome,
        Err(PipelineError::InvalidPlan(report)) => {
            for issue in &report.errors {
                eprintln!("  {}", issue);
            }
            anyhow::bail!("Edit plan has {} errors; nothing was written", report.errors.len());
        }
        Err(e) => return Err(e).context("Failed to apply edit plan"),
    };

    for warning in &outcome.body_report.warnings {
        println!("warning: {}", warning);
    }
    if outcome.sync_report.is_some() {
        println!("✓ Tables of contents synchronised");
    }

    let bytes = pipeline.to_docx_bytes(&outcome).context("Failed to repack document")?;
    write_docx(output, &bytes)?;

    if diff {
        for line in &outcome.diff {
            let sign = match line.change {
                Change::Added => '+',
                Change::Removed => '-',
            };
            println!("{} {}", sign, line.text);
        }
    }

    if !outcome.verification.ok {
        for finding in &outcome.verification.findings {
            eprintln!("  {}: {}", finding.target, finding.message);
        }
        anyhow::bail!(
            "Verification found {} problems in {}",
            outcome.verification.findings.len(),
            output.display()
        );
    }
    Ok(())
}

/// Handle the sync-toc command
fn handle_sync_toc_command(pipeline: &Pipeline, input: &Path, output: &Path) -> Result<()> {
    let snapshot = open_snapshot(input)?;
    match pipeline.sync_toc(&snapshot).context("Failed to synchronise tables of contents")? {
        Some(pass) => {
            println!("✓ {} TOC edits applied", pass.plan.operations().len());
            let update_fields = pipeline.config().repack.update_fields;
            let bytes = pass
                .snapshot
                .to_docx_bytes(update_fields)
                .context("Failed to repack document")?;
            write_docx(output, &bytes)
        }
        None => {
            println!("Tables of contents already match the headings");
            let bytes = snapshot.to_docx_bytes(false).context("Failed to repack document")?;
            write_docx(output, &bytes)
        }
    }
}

/// Handle the verify command
fn handle_verify_command(pipeline: &Pipeline, input: &Path) -> Result<()> {
    let snapshot = open_snapshot(input)?;
    let report = verify(&pipeline.extract(&snapshot));
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize verification report")?
    );
    if !report.ok {
        anyhow::bail!("Verification found {} problems", report.findings.len());
    }
    Ok(())
}

/// Handle the repack command
fn handle_repack_command(input: &Path, output: &Path, update_fields: bool) -> Result<()> {
    let snapshot = open_snapshot(input)?;
    let bytes = snapshot
        .to_docx_bytes(update_fields)
        .context("Failed to repack document")?;
    write_docx(output, &bytes)
}
