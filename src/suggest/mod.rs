use crate::config::EngineConfig;
use crate::core::{
    CodeAnalysis, DuplicateBlock, EffortLevel, Finding, FindingKind, ObjectiveCategory,
    RefactoringObjective, RefactoringSuggestion, RefactoringType, ScopeLevel, Severity,
    SuggestionScope,
};
use std::path::PathBuf;

/// Derive ranked refactoring suggestions from an analysis and the caller's
/// objectives. A pure derivation: nothing in the analysis is mutated, and
/// the same inputs always produce the same ranked list.
pub fn generate_suggestions(
    analysis: &CodeAnalysis,
    objectives: &[RefactoringObjective],
    config: &EngineConfig,
) -> Vec<RefactoringSuggestion> {
    let mut suggestions: Vec<RefactoringSuggestion> = analysis
        .findings
        .iter()
        .filter_map(|finding| suggestion_for_finding(finding, analysis, config))
        .collect();

    suggestions.extend(
        analysis
            .duplications
            .iter()
            .filter(|block| block.extractable)
            .map(|block| duplication_suggestion(block, config)),
    );

    for objective in objectives {
        if objective.category == ObjectiveCategory::Modernization
            || objective.target_kinds.contains(&RefactoringType::Modernize)
        {
            suggestions.push(modernize_suggestion(analysis, objective, config));
        }
    }

    apply_objective_boosts(&mut suggestions, objectives);

    suggestions.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.confidence.cmp(&a.confidence))
            .then(a.id.cmp(&b.id))
    });
    suggestions
}

fn suggestion_for_finding(
    finding: &Finding,
    analysis: &CodeAnalysis,
    config: &EngineConfig,
) -> Option<RefactoringSuggestion> {
    let h = &config.heuristics;
    let file = finding.location.file.clone();
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let target = analysis
        .function_at(&finding.location.file, finding.location.line)
        .map(|f| f.name.clone());

    match finding.kind {
        FindingKind::ComplexityHotspot => {
            let complexity = analysis
                .function_at(&finding.location.file, finding.location.line)
                .map(|f| f.cyclomatic)
                .unwrap_or(config.thresholds.complexity_hotspot);
            Some(RefactoringSuggestion {
                id: format!("reduce_complexity-{stem}-{}", finding.location.line),
                refactoring: RefactoringType::ReduceComplexity,
                scope: SuggestionScope {
                    level: ScopeLevel::Method,
                    targets: target.into_iter().collect(),
                    files: vec![file.clone()],
                },
                benefits: vec![
                    "Fewer independent paths to reason about and test".to_string(),
                    "Lower change risk in the hottest code".to_string(),
                ],
                risks: vec!["Restructured control flow must preserve behavior".to_string()],
                effort: effort_tier(finding.effort_minutes),
                priority: complexity_priority(complexity),
                affected_files: vec![file],
                estimated_minutes: finding.effort_minutes,
                confidence: h.confidence_reduce_complexity,
            })
        }
        FindingKind::LongMethod => Some(RefactoringSuggestion {
            id: format!("extract_method-{stem}-{}", finding.location.line),
            refactoring: RefactoringType::ExtractMethod,
            scope: SuggestionScope {
                level: ScopeLevel::Method,
                targets: target.into_iter().collect(),
                files: vec![file.clone()],
            },
            benefits: vec!["Smaller functions with single responsibilities".to_string()],
            risks: vec!["Extracted pieces must keep their data dependencies".to_string()],
            effort: effort_tier(finding.effort_minutes),
            priority: severity_priority(finding.severity, 5, 7, 9),
            affected_files: vec![file],
            estimated_minutes: finding.effort_minutes,
            confidence: h.confidence_extract_method,
        }),
        FindingKind::LargeClass => Some(RefactoringSuggestion {
            id: format!("extract_class-{stem}-{}", finding.location.line),
            refactoring: RefactoringType::ExtractClass,
            scope: SuggestionScope {
                level: ScopeLevel::Class,
                targets: target.into_iter().collect(),
                files: vec![file.clone()],
            },
            benefits: vec!["Separated responsibilities and smaller interfaces".to_string()],
            risks: vec![
                "Callers of moved members need updating".to_string(),
                "Hidden coupling between members may surface".to_string(),
            ],
            effort: effort_tier(finding.effort_minutes),
            priority: severity_priority(finding.severity, 6, 6, 8),
            affected_files: vec![file],
            estimated_minutes: finding.effort_minutes,
            confidence: h.confidence_extract_class,
        }),
        FindingKind::DeadCode => Some(RefactoringSuggestion {
            id: format!("remove_dead_code-{stem}-{}", finding.location.line),
            refactoring: RefactoringType::RemoveDeadCode,
            scope: SuggestionScope {
                level: ScopeLevel::Symbol,
                targets: target.into_iter().collect(),
                files: vec![file.clone()],
            },
            benefits: vec!["Less code to read, build and maintain".to_string()],
            // Callers outside the analyzed set are invisible here.
            risks: vec!["The export may have consumers outside this analysis".to_string()],
            effort: EffortLevel::Low,
            priority: 4,
            affected_files: vec![file],
            estimated_minutes: finding.effort_minutes,
            confidence: h.confidence_remove_dead_code,
        }),
        FindingKind::DeepNesting => Some(RefactoringSuggestion {
            id: format!("simplify_conditionals-{stem}-{}", finding.location.line),
            refactoring: RefactoringType::SimplifyConditionals,
            scope: SuggestionScope {
                level: ScopeLevel::Method,
                targets: target.into_iter().collect(),
                files: vec![file.clone()],
            },
            benefits: vec!["Flatter control flow reads top to bottom".to_string()],
            risks: vec!["Guard-clause rewrites can invert conditions incorrectly".to_string()],
            effort: effort_tier(finding.effort_minutes),
            priority: 5,
            affected_files: vec![file],
            estimated_minutes: finding.effort_minutes,
            confidence: h.confidence_simplify_conditionals,
        }),
        FindingKind::UnusedDependency => Some(RefactoringSuggestion {
            id: format!("organize_imports-{stem}-{}", finding.location.line),
            refactoring: RefactoringType::OrganizeImports,
            scope: SuggestionScope {
                level: ScopeLevel::File,
                targets: vec![],
                files: vec![file.clone()],
            },
            benefits: vec!["Imports reflect actual dependencies".to_string()],
            risks: vec!["Side-effect-only imports must be kept".to_string()],
            effort: EffortLevel::Low,
            priority: 3,
            affected_files: vec![file],
            estimated_minutes: 5,
            confidence: h.confidence_organize_imports,
        }),
        // Cycles are reported, never auto-planned; parse errors and markers
        // carry no mechanical refactoring.
        FindingKind::CircularDependency
        | FindingKind::Syntax
        | FindingKind::Marker
        | FindingKind::Duplication
        | FindingKind::LongParameterList => None,
    }
}

fn duplication_suggestion(block: &DuplicateBlock, config: &EngineConfig) -> RefactoringSuggestion {
    let files: Vec<PathBuf> = {
        let mut files: Vec<PathBuf> = block.locations.iter().map(|l| l.file.clone()).collect();
        files.sort();
        files.dedup();
        files
    };
    let minutes = (block.lines as u32) * 2 * block.locations.len() as u32;

    RefactoringSuggestion {
        id: format!("eliminate_duplication-{}", &block.hash[..8.min(block.hash.len())]),
        refactoring: RefactoringType::EliminateDuplication,
        scope: SuggestionScope {
            level: if files.len() > 1 {
                ScopeLevel::Module
            } else {
                ScopeLevel::File
            },
            targets: vec![],
            files: files.clone(),
        },
        benefits: vec!["One copy to fix instead of several".to_string()],
        risks: vec!["Clones may diverge in subtle ways before extraction".to_string()],
        effort: effort_tier(minutes),
        priority: (3 + block.locations.len() as u8).min(10),
        affected_files: files,
        estimated_minutes: minutes,
        confidence: config.heuristics.confidence_eliminate_duplication,
    }
}

fn modernize_suggestion(
    analysis: &CodeAnalysis,
    objective: &RefactoringObjective,
    config: &EngineConfig,
) -> RefactoringSuggestion {
    let files: Vec<PathBuf> = analysis.units.iter().map(|u| u.path.clone()).collect();

    RefactoringSuggestion {
        id: "modernize-project".to_string(),
        refactoring: RefactoringType::Modernize,
        scope: SuggestionScope {
            level: ScopeLevel::Project,
            targets: vec![],
            files: files.clone(),
        },
        benefits: vec!["Current idioms and library surfaces".to_string()],
        risks: vec!["Broad mechanical rewrites touch many files at once".to_string()],
        effort: EffortLevel::High,
        priority: objective.priority.clamp(1, 10),
        estimated_minutes: (files.len() as u32) * 10,
        affected_files: files,
        confidence: config.heuristics.confidence_modernize,
    }
}

/// `min(10, floor(complexity / 2))`, floored at 1.
fn complexity_priority(complexity: u32) -> u8 {
    ((complexity / 2).min(10) as u8).max(1)
}

fn severity_priority(severity: Severity, warn: u8, major: u8, critical: u8) -> u8 {
    match severity {
        Severity::Critical | Severity::Error => critical,
        Severity::Major => major,
        _ => warn,
    }
}

fn effort_tier(minutes: u32) -> EffortLevel {
    match minutes {
        0..=29 => EffortLevel::Low,
        30..=120 => EffortLevel::Medium,
        _ => EffortLevel::High,
    }
}

fn apply_objective_boosts(
    suggestions: &mut [RefactoringSuggestion],
    objectives: &[RefactoringObjective],
) {
    for suggestion in suggestions.iter_mut() {
        for objective in objectives {
            if objective.target_kinds.contains(&suggestion.refactoring) {
                suggestion.priority =
                    (suggestion.priority + objective.priority / 3).min(10);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::{SourceFile, SourceLocation};
    use crate::pipeline::analyze_files;

    fn analysis_of(files: Vec<SourceFile>) -> CodeAnalysis {
        analyze_files(files, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn complexity_priority_follows_floor_rule() {
        assert_eq!(complexity_priority(22), 10);
        assert_eq!(complexity_priority(7), 3);
        assert_eq!(complexity_priority(1), 1);
        assert_eq!(complexity_priority(40), 10);
    }

    #[test]
    fn hotspot_yields_reduce_complexity_suggestion() {
        let mut branches = String::new();
        for i in 0..21 {
            branches.push_str(&format!("    if (n === {i}) {{ total += {i}; }}\n"));
        }
        let source = format!("export function rate(n) {{\n    let total = 0;\n{branches}    return total;\n}}\n");
        let analysis = analysis_of(vec![SourceFile::new("src/rate.js", source)]);

        let suggestions = generate_suggestions(&analysis, &[], &EngineConfig::default());
        let reduce = suggestions
            .iter()
            .find(|s| s.refactoring == RefactoringType::ReduceComplexity)
            .expect("reduce_complexity suggestion");
        assert_eq!(reduce.priority, 10);
        assert_eq!(reduce.confidence, 85);
        assert_eq!(reduce.scope.targets, vec!["rate"]);
    }

    #[test]
    fn suggestions_do_not_mutate_analysis() {
        let analysis = analysis_of(vec![SourceFile::new(
            "src/a.js",
            "export function f() { return 1; }\n",
        )]);
        let serialized_before = serde_json::to_string(&analysis).unwrap();
        let _ = generate_suggestions(&analysis, &[], &EngineConfig::default());
        assert_eq!(serde_json::to_string(&analysis).unwrap(), serialized_before);
    }

    #[test]
    fn objective_boost_raises_priority() {
        let finding = Finding {
            kind: FindingKind::DeadCode,
            severity: Severity::Warning,
            location: SourceLocation::span("src/a.js", 3, 4),
            message: "Export 'x' has no observed usage".to_string(),
            auto_fixable: true,
            suggested: vec![RefactoringType::RemoveDeadCode],
            advice: vec![],
            effort_minutes: 5,
        };
        let analysis = CodeAnalysis {
            root: PathBuf::from("."),
            timestamp: chrono::Utc::now(),
            units: vec![],
            metrics: Default::default(),
            findings: vec![finding],
            duplications: vec![],
            graph: Default::default(),
        };

        let objectives = vec![RefactoringObjective {
            category: ObjectiveCategory::Maintainability,
            target_kinds: vec![RefactoringType::RemoveDeadCode],
            priority: 9,
            metric_target: None,
        }];
        let boosted = generate_suggestions(&analysis, &objectives, &EngineConfig::default());
        let plain = generate_suggestions(&analysis, &[], &EngineConfig::default());
        assert!(boosted[0].priority > plain[0].priority);
    }

    #[test]
    fn modernization_objective_adds_project_suggestion() {
        let analysis = analysis_of(vec![SourceFile::new(
            "src/a.js",
            "export function f() { return 1; }\n",
        )]);
        let objectives = vec![RefactoringObjective {
            category: ObjectiveCategory::Modernization,
            target_kinds: vec![],
            priority: 6,
            metric_target: None,
        }];
        let suggestions = generate_suggestions(&analysis, &objectives, &EngineConfig::default());
        assert!(suggestions
            .iter()
            .any(|s| s.refactoring == RefactoringType::Modernize
                && s.scope.level == ScopeLevel::Project));
    }
}
