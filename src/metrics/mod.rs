use crate::complexity::maintainability_index;
use crate::config::EngineConfig;
use crate::core::metrics::{average_complexity, max_complexity, total_complexity};
use crate::core::{FileMetricsReport, FunctionModel, MetricsSnapshot, ProjectMetrics, SourceUnit};

/// Per-file metric aggregation.
pub fn file_metrics(unit: &SourceUnit, config: &EngineConfig) -> FileMetricsReport {
    let functions: Vec<&FunctionModel> = unit.all_functions().collect();
    let avg = average_complexity(&functions);

    FileMetricsReport {
        path: unit.path.clone(),
        language: unit.language,
        loc: unit.lines,
        function_count: functions.len(),
        class_count: unit.classes.len(),
        average_complexity: avg,
        max_complexity: max_complexity(&functions),
        maintainability: maintainability_index(unit.lines, avg, &config.heuristics),
    }
}

/// Global metric aggregation across all analyzed units.
///
/// The debt estimate is an explicitly rough heuristic (complexity times a
/// configurable hours factor), not a promise.
pub fn project_metrics(units: &[SourceUnit], config: &EngineConfig) -> ProjectMetrics {
    let files: Vec<FileMetricsReport> = units.iter().map(|u| file_metrics(u, config)).collect();
    let functions: Vec<&FunctionModel> = units.iter().flat_map(|u| u.all_functions()).collect();

    let total = total_complexity(&functions);
    let maintainability = if files.is_empty() {
        0.0
    } else {
        files.iter().map(|f| f.maintainability).sum::<f64>() / files.len() as f64
    };

    ProjectMetrics {
        total_loc: files.iter().map(|f| f.loc).sum(),
        total_functions: functions.len(),
        total_classes: units.iter().map(|u| u.classes.len()).sum(),
        total_complexity: total,
        average_complexity: average_complexity(&functions),
        max_complexity: max_complexity(&functions),
        maintainability,
        debt_hours: total as f64 * config.heuristics.debt_hours_per_complexity,
        files,
    }
}

/// Compact snapshot used for before/after comparison around an execution.
pub fn snapshot(units: &[SourceUnit], duplicate_blocks: usize, config: &EngineConfig) -> MetricsSnapshot {
    let metrics = project_metrics(units, config);
    MetricsSnapshot {
        total_loc: metrics.total_loc,
        function_count: metrics.total_functions,
        total_complexity: metrics.total_complexity,
        average_complexity: metrics.average_complexity,
        maintainability: metrics.maintainability,
        duplicate_blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Language, SourceLocation};

    fn unit_with(cyclomatics: &[u32], lines: usize) -> SourceUnit {
        let mut unit = SourceUnit::empty("src/a.rs", Language::Rust);
        unit.lines = lines;
        for (idx, cc) in cyclomatics.iter().enumerate() {
            let mut func = FunctionModel::new(
                format!("f{idx}"),
                SourceLocation::span("src/a.rs", idx * 10 + 1, idx * 10 + 5),
            );
            func.cyclomatic = *cc;
            func.length = 5;
            unit.functions.push(func);
        }
        unit
    }

    #[test]
    fn aggregates_across_files() {
        let config = EngineConfig::default();
        let units = vec![unit_with(&[2, 4], 100), unit_with(&[6], 50)];
        let metrics = project_metrics(&units, &config);
        assert_eq!(metrics.total_loc, 150);
        assert_eq!(metrics.total_functions, 3);
        assert_eq!(metrics.total_complexity, 12);
        assert_eq!(metrics.average_complexity, 4.0);
        assert_eq!(metrics.max_complexity, 6);
        assert_eq!(metrics.debt_hours, 6.0);
    }

    #[test]
    fn empty_project_is_all_zero() {
        let metrics = project_metrics(&[], &EngineConfig::default());
        assert_eq!(metrics.total_loc, 0);
        assert_eq!(metrics.maintainability, 0.0);
        assert_eq!(metrics.debt_hours, 0.0);
    }

    #[test]
    fn debt_factor_is_configurable() {
        let mut config = EngineConfig::default();
        config.heuristics.debt_hours_per_complexity = 2.0;
        let metrics = project_metrics(&[unit_with(&[3], 10)], &config);
        assert_eq!(metrics.debt_hours, 6.0);
    }
}
