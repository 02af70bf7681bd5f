use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use reforge::cli::{Cli, Commands, OutputFormat};
use reforge::config::{default_config_toml, EngineConfig, CONFIG_FILE_NAME};
use reforge::core::{CodeAnalysis, RefactoringObjective, RefactoringResult, TestEvidence};
use reforge::executor::{
    analyze_workspace, apply_rollback, execute_plan, ExecutionOptions, MechanicalApplier,
    Workspace,
};
use reforge::io::output::{create_writer, OutputWriter};
use reforge::pipeline::analyze_path;
use reforge::planner::build_plan;
use reforge::suggest::generate_suggestions;
use reforge::validator::validate_refactoring;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            format,
            output,
        } => handle_analyze(&path, format, output),
        Commands::Plan {
            path,
            objectives,
            format,
            output,
        } => handle_plan(&path, objectives, format, output),
        Commands::Run {
            path,
            objectives,
            apply,
            step_timeout,
            result_out,
            format,
            output,
        } => handle_run(&path, objectives, apply, step_timeout, result_out, format, output),
        Commands::Validate {
            path,
            result,
            tests_run,
            tests_failed,
            format,
            output,
        } => handle_validate(&path, &result, tests_run, tests_failed, format, output),
        Commands::Init { force } => handle_init(force),
    }
}

fn handle_analyze(path: &Path, format: OutputFormat, output: Option<PathBuf>) -> Result<()> {
    let config = EngineConfig::load(path)?;
    let analysis = analyze_path(path, &config)?;
    create_writer(format.into(), output)?.write_analysis(&analysis)?;
    Ok(())
}

fn handle_plan(
    path: &Path,
    objectives: Option<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = EngineConfig::load(path)?;
    let analysis = analyze_path(path, &config)?;
    let objectives = load_objectives(objectives.as_deref())?;
    let suggestions = generate_suggestions(&analysis, &objectives, &config);
    let plan = build_plan(&analysis, &suggestions, &config)?;
    create_writer(format.into(), output)?.write_plan(&plan)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_run(
    path: &Path,
    objectives: Option<PathBuf>,
    apply: bool,
    step_timeout: Option<u64>,
    result_out: Option<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = EngineConfig::load(path)?;
    let analysis = analyze_path(path, &config)?;
    let objectives = load_objectives(objectives.as_deref())?;
    let suggestions = generate_suggestions(&analysis, &objectives, &config);
    let plan = build_plan(&analysis, &suggestions, &config)?;

    let mut workspace = load_workspace(&analysis)?;
    let before_units = analyze_workspace(&workspace, &config);
    let options = ExecutionOptions {
        step_deadline: step_timeout.map(Duration::from_secs),
        cancel: None,
    };
    let result = execute_plan(&plan, &mut workspace, &MechanicalApplier, &options, &config);
    let after_units = analyze_workspace(&workspace, &config);
    let validation = validate_refactoring(&before_units, &after_units, &result, None);

    if let Some(result_path) = result_out {
        std::fs::write(&result_path, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("failed to write {}", result_path.display()))?;
        info!("result written to {}", result_path.display());
    }

    if apply {
        if validation.is_valid {
            write_workspace(&workspace, &result)?;
            info!("applied {} change(s) to disk", result.changes.len());
        } else {
            log::warn!("validation failed; changes were not written to disk");
        }
    }

    let mut writer = create_writer(format.into(), output)?;
    writer.write_result(&result)?;
    writer.write_validation(&validation)?;
    Ok(())
}

fn handle_validate(
    path: &Path,
    result_path: &Path,
    tests_run: Option<usize>,
    tests_failed: usize,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = EngineConfig::load(path)?;
    let text = std::fs::read_to_string(result_path)
        .with_context(|| format!("failed to read {}", result_path.display()))?;
    let result: RefactoringResult = serde_json::from_str(&text)
        .with_context(|| format!("invalid result file {}", result_path.display()))?;

    let analysis = analyze_path(path, &config)?;
    let mut after = load_workspace(&analysis)?;
    let after_units = analyze_workspace(&after, &config);

    // The recorded preimages reconstruct the pre-execution state without
    // re-running the original analysis.
    apply_rollback(&result.rollback, &mut after);
    let before_units = analyze_workspace(&after, &config);

    let evidence = tests_run.map(|run| TestEvidence {
        tests_run: run,
        tests_passed: run.saturating_sub(tests_failed),
        tests_failed,
        coverage_before: None,
        coverage_after: None,
    });
    let validation =
        validate_refactoring(&before_units, &after_units, &result, evidence.as_ref());
    create_writer(format.into(), output)?.write_validation(&validation)?;
    Ok(())
}

fn handle_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        anyhow::bail!("Configuration file already exists. Use --force to overwrite.");
    }

    std::fs::write(&config_path, default_config_toml())?;
    println!("Created {CONFIG_FILE_NAME} configuration file");
    Ok(())
}

fn load_objectives(path: Option<&Path>) -> Result<Vec<RefactoringObjective>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid objectives file {}", path.display()))
        }
        None => Ok(Vec::new()),
    }
}

fn load_workspace(analysis: &CodeAnalysis) -> Result<Workspace> {
    let mut workspace = Workspace::new();
    for unit in &analysis.units {
        let content = std::fs::read_to_string(&unit.path)
            .with_context(|| format!("failed to read {}", unit.path.display()))?;
        workspace.insert(unit.path.clone(), content);
    }
    Ok(workspace)
}

fn write_workspace(workspace: &Workspace, result: &RefactoringResult) -> Result<()> {
    let touched: std::collections::BTreeSet<&PathBuf> =
        result.changes.iter().map(|c| &c.file).collect();
    for path in touched {
        match workspace.get(path) {
            Some(content) => std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => {
                if path.exists() {
                    std::fs::remove_file(path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                }
            }
        }
    }
    Ok(())
}
