//! Command-line interface definitions for docedit

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI structure for the docedit application
#[derive(Parser)]
#[command(name = "docedit")]
#[command(version)]
#[command(about = "Block-oriented DOCX edit reconciliation", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./docedit.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for docedit
#[derive(Subcommand)]
pub enum Commands {
    /// Extract blocks and aliases; write analysis.json and the text-merge view
    Analyze {
        /// Input .docx file
        input: PathBuf,

        /// Directory for analysis.json and text_merge.txt
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Check an edit plan against a document without changing it
    Validate {
        /// Input .docx file
        input: PathBuf,

        /// Edit plan (JSON)
        #[arg(short, long)]
        plan: PathBuf,
    },

    /// Produce run-distribution prompts, or fold answers back into the plan
    Prompts {
        /// Input .docx file
        input: PathBuf,

        /// Edit plan (JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Answers to previously issued prompts (JSON)
        #[arg(short, long)]
        answers: Option<PathBuf>,

        /// Where to write the prompts, or the amended plan when answers are given
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply an edit plan, synchronise TOCs and verify the result
    Apply {
        /// Input .docx file
        input: PathBuf,

        /// Edit plan (JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Output .docx file
        #[arg(short, long)]
        output: PathBuf,

        /// Print the text-merge lines added and removed
        #[arg(long)]
        diff: bool,
    },

    /// Bring every table of contents in line with the headings
    SyncToc {
        /// Input .docx file
        input: PathBuf,

        /// Output .docx file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check table shape, TOC anchors and numbering of a document
    Verify {
        /// Input .docx file
        input: PathBuf,
    },

    /// Rewrite a document through the editor without edits
    Repack {
        /// Input .docx file
        input: PathBuf,

        /// Output .docx file
        #[arg(short, long)]
        output: PathBuf,

        /// Ask the word processor to refresh fields when the file is opened
        #[arg(long)]
        update_fields: bool,
    },
}
