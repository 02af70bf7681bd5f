use crate::config::{EngineConfig, Heuristics, Thresholds};
use crate::core::{
    ClassModel, Finding, FindingKind, FunctionModel, RefactoringType, Severity, SourceUnit,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Flag functions whose size exceeds the long-method thresholds.
/// Remediation is estimated per block of lines over the warning threshold.
pub fn detect_long_method(
    func: &FunctionModel,
    thresholds: &Thresholds,
    heuristics: &Heuristics,
) -> Option<Finding> {
    if func.length <= thresholds.long_method_warn {
        return None;
    }

    let severity = if func.length > thresholds.long_method_critical {
        Severity::Critical
    } else if func.length > thresholds.long_method_major {
        Severity::Major
    } else {
        Severity::Warning
    };

    let over = func.length - thresholds.long_method_warn;
    let unit = heuristics.excess_line_unit.max(1);
    let effort = (over.div_ceil(unit) as u32) * heuristics.minutes_per_excess_lines;

    Some(Finding {
        kind: FindingKind::LongMethod,
        severity,
        location: func.location.clone(),
        message: format!(
            "Function '{}' has {} lines (threshold: {})",
            func.name, func.length, thresholds.long_method_warn
        ),
        auto_fixable: false,
        suggested: vec![RefactoringType::ExtractMethod],
        advice: vec![format!(
            "Split '{}' into smaller functions with single responsibilities",
            func.name
        )],
        effort_minutes: effort,
    })
}

/// Flag functions whose cyclomatic complexity marks them as hotspots.
pub fn detect_complexity_hotspot(
    func: &FunctionModel,
    thresholds: &Thresholds,
) -> Option<Finding> {
    if func.cyclomatic < thresholds.complexity_hotspot {
        return None;
    }

    let severity = if func.cyclomatic > thresholds.complexity_critical {
        Severity::Critical
    } else if func.cyclomatic > (thresholds.complexity_hotspot + thresholds.complexity_critical) / 2
    {
        Severity::Major
    } else {
        Severity::Warning
    };

    Some(Finding {
        kind: FindingKind::ComplexityHotspot,
        severity,
        location: func.location.clone(),
        message: format!(
            "Function '{}' has cyclomatic complexity {} (threshold: {})",
            func.name, func.cyclomatic, thresholds.complexity_hotspot
        ),
        auto_fixable: false,
        suggested: vec![
            RefactoringType::ExtractMethod,
            RefactoringType::SimplifyConditionals,
            RefactoringType::ReduceComplexity,
        ],
        advice: vec![
            "Extract methods".to_string(),
            "Simplify conditions".to_string(),
            "Reduce nesting".to_string(),
        ],
        effort_minutes: func.cyclomatic.saturating_sub(thresholds.complexity_hotspot) * 5,
    })
}

pub fn detect_deep_nesting(func: &FunctionModel, thresholds: &Thresholds) -> Option<Finding> {
    if func.nesting <= thresholds.max_nesting {
        return None;
    }

    Some(Finding {
        kind: FindingKind::DeepNesting,
        severity: if func.nesting > thresholds.max_nesting * 2 {
            Severity::Major
        } else {
            Severity::Warning
        },
        location: func.location.clone(),
        message: format!(
            "Function '{}' has nesting depth {} (threshold: {})",
            func.name, func.nesting, thresholds.max_nesting
        ),
        auto_fixable: false,
        suggested: vec![RefactoringType::SimplifyConditionals],
        advice: vec!["Use early returns to flatten control flow".to_string()],
        effort_minutes: (func.nesting - thresholds.max_nesting) * 10,
    })
}

pub fn detect_long_parameter_list(
    func: &FunctionModel,
    thresholds: &Thresholds,
) -> Option<Finding> {
    let count = func.parameters.len();
    if count <= thresholds.max_parameters {
        return None;
    }

    Some(Finding {
        kind: FindingKind::LongParameterList,
        severity: if count > thresholds.max_parameters * 2 {
            Severity::Major
        } else {
            Severity::Warning
        },
        location: func.location.clone(),
        message: format!(
            "Function '{}' has {} parameters (threshold: {})",
            func.name, count, thresholds.max_parameters
        ),
        auto_fixable: false,
        suggested: vec![RefactoringType::ExtractClass],
        advice: vec!["Group related parameters into a value object".to_string()],
        effort_minutes: ((count - thresholds.max_parameters) * 10) as u32,
    })
}

/// Flag classes with too many members. Remediation is estimated per member
/// over the threshold.
pub fn detect_large_class(
    class: &ClassModel,
    thresholds: &Thresholds,
    heuristics: &Heuristics,
) -> Option<Finding> {
    let methods = class.methods.len();
    let fields = class.fields.len();
    if methods <= thresholds.class_methods && fields <= thresholds.class_fields {
        return None;
    }

    let severity = if methods > thresholds.class_methods_critical
        || fields > thresholds.class_fields_critical
    {
        Severity::Critical
    } else {
        Severity::Major
    };

    let over = methods.saturating_sub(thresholds.class_methods)
        + fields.saturating_sub(thresholds.class_fields);

    Some(Finding {
        kind: FindingKind::LargeClass,
        severity,
        location: class.location.clone(),
        message: format!(
            "Class '{}' has {} methods and {} fields (thresholds: {}/{})",
            class.name, methods, fields, thresholds.class_methods, thresholds.class_fields
        ),
        auto_fixable: false,
        suggested: vec![RefactoringType::ExtractClass],
        advice: vec![format!(
            "Split '{}' along its responsibilities",
            class.name
        )],
        effort_minutes: (over as u32) * heuristics.minutes_per_excess_member,
    })
}

/// All structural smells for one unit.
pub fn analyze_unit_smells(unit: &SourceUnit, config: &EngineConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    for func in unit.all_functions() {
        findings.extend(detect_long_method(
            func,
            &config.thresholds,
            &config.heuristics,
        ));
        findings.extend(detect_complexity_hotspot(func, &config.thresholds));
        findings.extend(detect_deep_nesting(func, &config.thresholds));
        findings.extend(detect_long_parameter_list(func, &config.thresholds));
    }

    for class in &unit.classes {
        findings.extend(detect_large_class(
            class,
            &config.thresholds,
            &config.heuristics,
        ));
    }

    findings
}

/// Exports with zero observed usage: no reference inside their own file and
/// no import of the name anywhere else in the analyzed set. Callers outside
/// the analyzed set are invisible, which is why dead-code suggestions carry
/// reduced confidence.
pub fn detect_dead_exports(
    units: &[SourceUnit],
    imported_names: &BTreeMap<PathBuf, BTreeSet<String>>,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for unit in units {
        let imported_here = imported_names.get(&unit.path);

        for export in &unit.exports {
            let used_locally = unit
                .symbols
                .iter()
                .find(|s| s.name == export.name)
                .map(|s| !s.usages.is_empty())
                .unwrap_or(false);
            let used_elsewhere = imported_here
                .map(|names| names.contains(&export.name))
                .unwrap_or(false);

            if !used_locally && !used_elsewhere {
                findings.push(Finding {
                    kind: FindingKind::DeadCode,
                    severity: Severity::Warning,
                    location: export.location.clone(),
                    message: format!("Export '{}' has no observed usage", export.name),
                    auto_fixable: true,
                    suggested: vec![RefactoringType::RemoveDeadCode],
                    advice: vec![format!(
                        "Remove '{}' if no external consumers depend on it",
                        export.name
                    )],
                    effort_minutes: 5,
                });
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SourceLocation;

    fn func_with(length: usize, cyclomatic: u32) -> FunctionModel {
        let mut f = FunctionModel::new("work", SourceLocation::span("src/a.rs", 10, 10 + length - 1));
        f.length = length;
        f.cyclomatic = cyclomatic;
        f
    }

    #[test]
    fn short_simple_function_is_clean() {
        let config = EngineConfig::default();
        let f = func_with(20, 3);
        assert!(detect_long_method(&f, &config.thresholds, &config.heuristics).is_none());
        assert!(detect_complexity_hotspot(&f, &config.thresholds).is_none());
    }

    #[test]
    fn long_method_severity_escalates() {
        let config = EngineConfig::default();
        let warn = detect_long_method(&func_with(60, 1), &config.thresholds, &config.heuristics)
            .unwrap();
        assert_eq!(warn.severity, Severity::Warning);

        let major = detect_long_method(&func_with(80, 1), &config.thresholds, &config.heuristics)
            .unwrap();
        assert_eq!(major.severity, Severity::Major);

        let critical =
            detect_long_method(&func_with(120, 1), &config.thresholds, &config.heuristics)
                .unwrap();
        assert_eq!(critical.severity, Severity::Critical);
    }

    #[test]
    fn long_method_effort_is_fifteen_minutes_per_ten_lines() {
        let config = EngineConfig::default();
        // 70 lines: 20 over the threshold of 50 -> two blocks of ten.
        let finding =
            detect_long_method(&func_with(70, 1), &config.thresholds, &config.heuristics).unwrap();
        assert_eq!(finding.effort_minutes, 30);
    }

    #[test]
    fn hotspot_carries_remediation_advice() {
        let config = EngineConfig::default();
        let finding = detect_complexity_hotspot(&func_with(120, 22), &config.thresholds).unwrap();
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(
            finding.advice,
            vec!["Extract methods", "Simplify conditions", "Reduce nesting"]
        );
    }

    #[test]
    fn large_class_flags_on_either_axis() {
        let config = EngineConfig::default();
        let mut class = ClassModel {
            name: "Blob".to_string(),
            location: SourceLocation::span("src/a.rs", 1, 400),
            superclass: None,
            interfaces: vec![],
            methods: vec![],
            fields: vec![],
            cohesion: 50,
            coupling: 40,
            inheritance: Default::default(),
        };
        for i in 0..22 {
            class.methods.push(crate::core::MethodModel {
                function: func_with(5, 1),
                visibility: Default::default(),
                is_static: false,
                is_abstract: false,
                is_override: false,
            });
            class.fields.push(crate::core::FieldModel {
                name: format!("field{i}"),
                type_tag: None,
                visibility: Default::default(),
                is_static: false,
            });
        }

        let finding =
            detect_large_class(&class, &config.thresholds, &config.heuristics).unwrap();
        assert_eq!(finding.severity, Severity::Major);
        // 2 methods + 7 fields over -> 9 members at 10 minutes each.
        assert_eq!(finding.effort_minutes, 90);
    }

    #[test]
    fn unreferenced_export_is_dead() {
        let mut unit = SourceUnit::empty("src/lib.rs", crate::core::Language::Rust);
        unit.symbols.push(crate::core::Symbol {
            name: "orphan".to_string(),
            kind: crate::core::SymbolKind::Function,
            location: SourceLocation::span("src/lib.rs", 3, 5),
            visibility: Default::default(),
            exported: true,
            usages: vec![],
        });
        unit.exports.push(crate::core::Export {
            name: "orphan".to_string(),
            kind: crate::core::SymbolKind::Function,
            location: SourceLocation::span("src/lib.rs", 3, 5),
        });

        let findings = detect_dead_exports(&[unit], &BTreeMap::new());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::DeadCode);
        assert!(findings[0].auto_fixable);
    }

    #[test]
    fn imported_export_is_alive() {
        let mut unit = SourceUnit::empty("src/lib.rs", crate::core::Language::Rust);
        unit.exports.push(crate::core::Export {
            name: "used".to_string(),
            kind: crate::core::SymbolKind::Function,
            location: SourceLocation::span("src/lib.rs", 3, 5),
        });

        let mut imported = BTreeMap::new();
        imported.insert(
            PathBuf::from("src/lib.rs"),
            ["used".to_string()].into_iter().collect::<BTreeSet<_>>(),
        );

        assert!(detect_dead_exports(&[unit], &imported).is_empty());
    }
}
