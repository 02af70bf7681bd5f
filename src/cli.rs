use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reforge")]
#[command(about = "Source-code analysis and refactoring planning engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze code structure, metrics and smells
    Analyze {
        /// Path to analyze
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a refactoring plan from the analysis
    Plan {
        /// Path to analyze
        path: PathBuf,

        /// JSON file with refactoring objectives
        #[arg(long)]
        objectives: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Plan, execute and validate in one pass
    Run {
        /// Path to analyze
        path: PathBuf,

        /// JSON file with refactoring objectives
        #[arg(long)]
        objectives: Option<PathBuf>,

        /// Write changed files back to disk (default is a dry run)
        #[arg(long)]
        apply: bool,

        /// Per-step deadline in seconds
        #[arg(long)]
        step_timeout: Option<u64>,

        /// Write the full result (including rollback data) to this file
        #[arg(long)]
        result_out: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-validate an executed refactoring from its recorded result
    Validate {
        /// Path holding the post-execution sources
        path: PathBuf,

        /// Result file produced by `reforge run --result-out`
        #[arg(long)]
        result: PathBuf,

        /// Number of tests run after the refactoring
        #[arg(long)]
        tests_run: Option<usize>,

        /// Number of tests that failed after the refactoring
        #[arg(long, default_value = "0")]
        tests_failed: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a default reforge.toml
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
    Terminal,
}

impl From<OutputFormat> for crate::io::output::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => crate::io::output::OutputFormat::Json,
            OutputFormat::Markdown => crate::io::output::OutputFormat::Markdown,
            OutputFormat::Terminal => crate::io::output::OutputFormat::Terminal,
        }
    }
}
