use std::path::PathBuf;
use thiserror::Error;

/// Errors that make an analysis run meaningless as a whole.
///
/// Per-file parse failures are NOT errors; they are recorded as `Syntax`
/// findings on the affected unit and the run continues.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no source files to analyze")]
    EmptyInput,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported language for {path}")]
    UnsupportedLanguage { path: PathBuf },
}

/// Fatal planning failures. No plan is returned when one of these occurs.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("cyclic step dependencies: unable to order steps {remaining:?}")]
    CyclicDependencies { remaining: Vec<String> },

    #[error("step '{step}' depends on unknown step '{missing}'")]
    UnresolvedDependency { step: String, missing: String },
}

/// Per-step execution failures. Caught by the executor, recorded on the
/// result, and never propagated past it.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("refactoring kind {kind} requires an external rewriter")]
    Unsupported { kind: String },

    #[error("target file not present in workspace: {path}")]
    MissingFile { path: PathBuf },

    #[error("change span {start}..{end} is outside {path} ({lines} lines)")]
    SpanOutOfRange {
        path: PathBuf,
        start: usize,
        end: usize,
        lines: usize,
    },

    #[error("step deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    #[error("{0}")]
    Apply(String),
}

/// Errors raised while loading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
