use crate::analyzers::parse_source;
use crate::config::EngineConfig;
use crate::core::{
    CodeAnalysis, Finding, FindingKind, Language, RefactoringType, Severity, SourceFile,
    SourceLocation, SourceUnit,
};
use crate::errors::AnalysisError;
use crate::graph::{analyze_dependencies, DependencyAnalysis};
use crate::io::walker::find_project_files;
use crate::metrics::project_metrics;
use crate::smells::{analyze_unit_smells, detect_dead_exports, detect_duplication};
use chrono::Utc;
use log::{debug, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Analyze a batch of in-memory source files.
///
/// Per-file parsing and metrics fan out across threads; every worker returns
/// an immutable unit. The dependency pass is the synchronization barrier: it
/// starts only after the parallel stage has produced all units, because
/// cross-file edges need every file's import/export list. Everything after
/// the barrier is single-threaded over the aggregated value.
pub fn analyze_files(
    files: Vec<SourceFile>,
    config: &EngineConfig,
) -> Result<CodeAnalysis, AnalysisError> {
    analyze_with_root(PathBuf::from("."), files, config)
}

/// Discover and analyze all supported sources under `root`.
pub fn analyze_path(root: &Path, config: &EngineConfig) -> Result<CodeAnalysis, AnalysisError> {
    let paths = find_project_files(root, &config.ignore.patterns).map_err(|source| {
        AnalysisError::Io {
            path: root.to_path_buf(),
            source,
        }
    })?;

    let mut files = Vec::new();
    for path in paths {
        let content = std::fs::read_to_string(&path).map_err(|source| AnalysisError::Io {
            path: path.clone(),
            source,
        })?;
        files.push(SourceFile::new(path, content));
    }

    analyze_with_root(root.to_path_buf(), files, config)
}

fn analyze_with_root(
    root: PathBuf,
    files: Vec<SourceFile>,
    config: &EngineConfig,
) -> Result<CodeAnalysis, AnalysisError> {
    let files: Vec<SourceFile> = files
        .into_iter()
        .filter(|f| f.language != Language::Unknown)
        .collect();
    if files.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    info!("analyzing {} files under {}", files.len(), root.display());
    let units: Vec<SourceUnit> = files.par_iter().map(parse_source).collect();

    // Barrier crossed: every per-file model exists from here on.
    let DependencyAnalysis {
        report: graph,
        imported_names,
    } = analyze_dependencies(&units);
    debug!(
        "dependency graph: {} nodes, {} edges, {} cycles",
        graph.nodes.len(),
        graph.edges.len(),
        graph.cycles.len()
    );

    let mut findings: Vec<Finding> = Vec::new();
    for unit in &units {
        findings.extend(unit.findings.iter().cloned());
        findings.extend(analyze_unit_smells(unit, config));
    }
    findings.extend(detect_dead_exports(&units, &imported_names));
    findings.extend(graph.cycles.iter().map(|cycle| Finding {
        kind: FindingKind::CircularDependency,
        severity: Severity::Major,
        location: SourceLocation::point(cycle.nodes.first().cloned().unwrap_or_default(), 1, 0),
        message: format!("circular dependency: {}", cycle.nodes.join(" -> ")),
        auto_fixable: false,
        suggested: vec![],
        advice: cycle.suggestions.clone(),
        effort_minutes: 60,
    }));
    findings.extend(graph.unused_edges.iter().map(|edge| Finding {
        kind: FindingKind::UnusedDependency,
        severity: Severity::Warning,
        location: SourceLocation::point(edge.from.clone(), 1, 0),
        message: format!("{} imports {} but never references it", edge.from, edge.to),
        auto_fixable: true,
        suggested: vec![RefactoringType::OrganizeImports],
        advice: vec![],
        effort_minutes: 5,
    }));

    let duplications = detect_duplication(&units, &config.duplication);
    findings.extend(duplications.iter().map(|block| Finding {
        kind: FindingKind::Duplication,
        severity: if block.locations.len() > 2 {
            Severity::Major
        } else {
            Severity::Warning
        },
        location: block
            .locations
            .first()
            .map(|l| SourceLocation::span(l.file.clone(), l.start_line, l.end_line))
            .unwrap_or_else(|| SourceLocation::point(PathBuf::new(), 1, 0)),
        message: format!(
            "{} lines duplicated across {} locations (similarity {})",
            block.lines,
            block.locations.len(),
            block.similarity
        ),
        auto_fixable: false,
        suggested: vec![RefactoringType::EliminateDuplication],
        advice: vec![],
        effort_minutes: (block.lines as u32) * 2,
    }));

    findings.sort_by(|a, b| {
        (&a.location.file, a.location.line, a.kind.as_str())
            .cmp(&(&b.location.file, b.location.line, b.kind.as_str()))
    });

    let metrics = project_metrics(&units, config);
    info!(
        "analysis complete: {} findings, {} duplicate blocks",
        findings.len(),
        duplications.len()
    );

    Ok(CodeAnalysis {
        root,
        timestamp: Utc::now(),
        units,
        metrics,
        findings,
        duplications,
        graph,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn empty_input_is_a_hard_failure() {
        let err = analyze_files(vec![], &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput));
    }

    #[test]
    fn one_broken_file_does_not_abort_the_run() {
        let files = vec![
            SourceFile::new("src/ok.rs", "pub fn fine() -> u32 { 1 }\n"),
            SourceFile::new("src/bad.rs", "fn broken( {\n"),
        ];
        let analysis = analyze_files(files, &EngineConfig::default()).unwrap();
        assert_eq!(analysis.units.len(), 2);
        assert!(analysis
            .findings
            .iter()
            .any(|f| f.kind == FindingKind::Syntax));
        // The healthy file was still analyzed.
        assert_eq!(analysis.metrics.total_functions, 1);
    }

    #[test]
    fn findings_are_ordered_by_file_and_line() {
        let files = vec![SourceFile::new(
            "src/app.py",
            indoc! {r#"
                # TODO: first marker
                def f():
                    pass

                # TODO: second marker
                def g():
                    pass
            "#},
        )];
        let analysis = analyze_files(files, &EngineConfig::default()).unwrap();
        let lines: Vec<usize> = analysis.findings.iter().map(|f| f.location.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }
}
