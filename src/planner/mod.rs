use crate::config::EngineConfig;
use crate::core::{
    ChangeType, CodeAnalysis, FileChange, LineSpan, RefactoringPlan, RefactoringStep,
    RefactoringSuggestion, RefactoringType, RiskAssessment, RiskLevel, RollbackPlan,
    ValidationKind, ValidationPlan,
};
use crate::errors::PlanningError;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Expand chosen suggestions into an ordered, dependency-resolved plan.
///
/// State machine: suggestions -> candidate steps -> dependency resolution ->
/// topological order -> risk assessment -> rollback/validation plan. A cycle
/// among steps is a fatal planning failure; no plan is returned.
pub fn build_plan(
    analysis: &CodeAnalysis,
    suggestions: &[RefactoringSuggestion],
    config: &EngineConfig,
) -> Result<RefactoringPlan, PlanningError> {
    let mut steps = Vec::new();
    for suggestion in suggestions {
        generate_steps(analysis, suggestion, &mut steps);
    }

    resolve_dependencies(&mut steps);
    let steps = topological_sort(steps)?;

    let risk = assess_risk(&steps, config);
    let estimated_minutes = steps
        .iter()
        .map(|s| match s.risk {
            RiskLevel::High => config.heuristics.minutes_high_risk,
            RiskLevel::Medium => config.heuristics.minutes_medium_risk,
            RiskLevel::Low => config.heuristics.minutes_low_risk,
        })
        .sum();

    let validation = validation_plan(&steps);

    Ok(RefactoringPlan {
        id: plan_id(&steps),
        rollback: RollbackPlan {
            strategy: "preimage-restore".to_string(),
            capture_preimages: true,
            steps: vec![
                "Capture each touched file before its first mutation".to_string(),
                "On rollback, restore captured contents and remove created files".to_string(),
            ],
        },
        risk,
        estimated_minutes,
        validation,
        steps,
    })
}

/// One generation sub-routine per refactoring kind. The match is exhaustive
/// on purpose: adding a kind without a generator is a compile error.
fn generate_steps(
    analysis: &CodeAnalysis,
    suggestion: &RefactoringSuggestion,
    steps: &mut Vec<RefactoringStep>,
) {
    match suggestion.refactoring {
        RefactoringType::ReduceComplexity => {
            // Preparatory extraction first; the ordering rule turns this
            // pairing into an explicit dependency edge.
            steps.push(step(
                steps.len(),
                RefactoringType::ExtractMethod,
                format!(
                    "Extract cohesive sections out of {}",
                    describe_target(suggestion)
                ),
                suggestion,
                modify_changes(suggestion, "carve helper functions out of the hotspot"),
                RiskLevel::Low,
                false,
                vec![
                    ValidationKind::Syntax,
                    ValidationKind::Types,
                    ValidationKind::Behavior,
                ],
            ));
            steps.push(step(
                steps.len(),
                RefactoringType::ReduceComplexity,
                format!("Simplify branching in {}", describe_target(suggestion)),
                suggestion,
                modify_changes(suggestion, "flatten conditionals and collapse duplicate arms"),
                RiskLevel::Medium,
                false,
                vec![
                    ValidationKind::Syntax,
                    ValidationKind::Types,
                    ValidationKind::Behavior,
                    ValidationKind::Performance,
                ],
            ));
        }
        RefactoringType::ExtractMethod => {
            steps.push(step(
                steps.len(),
                RefactoringType::ExtractMethod,
                format!("Extract methods from {}", describe_target(suggestion)),
                suggestion,
                modify_changes(suggestion, "split oversized function"),
                RiskLevel::Low,
                false,
                vec![
                    ValidationKind::Syntax,
                    ValidationKind::Types,
                    ValidationKind::Behavior,
                ],
            ));
        }
        RefactoringType::ExtractClass => {
            steps.push(step(
                steps.len(),
                RefactoringType::ExtractClass,
                format!("Split {} along responsibilities", describe_target(suggestion)),
                suggestion,
                modify_changes(suggestion, "move cohesive member groups into a new class"),
                RiskLevel::High,
                false,
                vec![
                    ValidationKind::Syntax,
                    ValidationKind::Types,
                    ValidationKind::Behavior,
                ],
            ));
        }
        RefactoringType::RemoveDeadCode => {
            let changes = dead_code_changes(analysis, suggestion);
            steps.push(step(
                steps.len(),
                RefactoringType::RemoveDeadCode,
                format!("Remove unused export {}", describe_target(suggestion)),
                suggestion,
                changes,
                RiskLevel::Low,
                true,
                vec![ValidationKind::Syntax, ValidationKind::Types],
            ));
        }
        RefactoringType::EliminateDuplication => {
            steps.push(step(
                steps.len(),
                RefactoringType::EliminateDuplication,
                "Extract duplicated block into a shared helper".to_string(),
                suggestion,
                modify_changes(suggestion, "replace clone instances with calls to one helper"),
                RiskLevel::Medium,
                false,
                vec![ValidationKind::Syntax, ValidationKind::Behavior],
            ));
        }
        RefactoringType::SimplifyConditionals => {
            steps.push(step(
                steps.len(),
                RefactoringType::SimplifyConditionals,
                format!("Flatten nesting in {}", describe_target(suggestion)),
                suggestion,
                modify_changes(suggestion, "introduce guard clauses"),
                RiskLevel::Low,
                false,
                vec![ValidationKind::Syntax, ValidationKind::Behavior],
            ));
        }
        RefactoringType::Modernize => {
            steps.push(step(
                steps.len(),
                RefactoringType::Modernize,
                "Modernize idioms across targeted files".to_string(),
                suggestion,
                modify_changes(suggestion, "apply current language idioms"),
                if suggestion.affected_files.len() > 10 {
                    RiskLevel::High
                } else {
                    RiskLevel::Medium
                },
                false,
                vec![
                    ValidationKind::Syntax,
                    ValidationKind::Types,
                    ValidationKind::Behavior,
                    ValidationKind::Security,
                ],
            ));
        }
        RefactoringType::OrganizeImports => {
            let changes = unused_import_changes(analysis, suggestion);
            steps.push(step(
                steps.len(),
                RefactoringType::OrganizeImports,
                "Drop imports with no remaining references".to_string(),
                suggestion,
                changes,
                RiskLevel::Low,
                true,
                vec![ValidationKind::Syntax],
            ));
        }
    }
}

fn step(
    index: usize,
    refactoring: RefactoringType,
    description: String,
    suggestion: &RefactoringSuggestion,
    changes: Vec<FileChange>,
    risk: RiskLevel,
    automated: bool,
    required_checks: Vec<ValidationKind>,
) -> RefactoringStep {
    RefactoringStep {
        id: format!("step-{:03}-{}", index + 1, refactoring),
        refactoring,
        description,
        target_files: suggestion.affected_files.clone(),
        changes,
        depends_on: Vec::new(),
        risk,
        automated,
        required_checks,
    }
}

fn describe_target(suggestion: &RefactoringSuggestion) -> String {
    match suggestion.scope.targets.first() {
        Some(target) => format!("'{target}'"),
        None => suggestion
            .affected_files
            .first()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "target".to_string()),
    }
}

fn modify_changes(suggestion: &RefactoringSuggestion, reason: &str) -> Vec<FileChange> {
    suggestion
        .affected_files
        .iter()
        .map(|file| FileChange {
            change: ChangeType::Modify,
            file: file.clone(),
            span: None,
            reason: reason.to_string(),
        })
        .collect()
}

/// Concrete line spans for dead-export removal, resolved from the analysis
/// so the executor needs no further lookups.
fn dead_code_changes(
    analysis: &CodeAnalysis,
    suggestion: &RefactoringSuggestion,
) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for file in &suggestion.affected_files {
        let Some(unit) = analysis.unit(file) else {
            continue;
        };
        for target in &suggestion.scope.targets {
            if let Some(export) = unit.exports.iter().find(|e| &e.name == target) {
                changes.push(FileChange {
                    change: ChangeType::Modify,
                    file: file.clone(),
                    span: Some(LineSpan {
                        start: export.location.line,
                        end: export.location.end_line,
                    }),
                    reason: format!("delete unused export '{target}'"),
                });
            }
        }
    }
    if changes.is_empty() {
        changes = modify_changes(suggestion, "delete unused export");
    }
    changes
}

/// Spans of import statements none of whose names are referenced.
fn unused_import_changes(
    analysis: &CodeAnalysis,
    suggestion: &RefactoringSuggestion,
) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for file in &suggestion.affected_files {
        let Some(unit) = analysis.unit(file) else {
            continue;
        };
        for import in &unit.imports {
            let referenced: u32 = import
                .names
                .iter()
                .map(|n| unit.identifier_usage.get(n).copied().unwrap_or(0))
                .sum();
            if !import.names.is_empty() && referenced == 0 {
                changes.push(FileChange {
                    change: ChangeType::Modify,
                    file: file.clone(),
                    span: Some(LineSpan {
                        start: import.location.line,
                        end: import.location.end_line,
                    }),
                    reason: format!("drop unused import of {}", import.module),
                });
            }
        }
    }
    if changes.is_empty() {
        changes = modify_changes(suggestion, "reorder and prune imports");
    }
    changes
}

/// Fixed ordering rules, encoded as directed (before, after) pairs applied
/// when two steps touch overlapping files. Extension point: add rules here,
/// never infer them.
static ORDERING_RULES: &[(RefactoringType, RefactoringType)] = &[
    (RefactoringType::ExtractMethod, RefactoringType::ReduceComplexity),
    (RefactoringType::ExtractMethod, RefactoringType::SimplifyConditionals),
    (RefactoringType::ExtractMethod, RefactoringType::ExtractClass),
    (RefactoringType::EliminateDuplication, RefactoringType::ReduceComplexity),
    (RefactoringType::RemoveDeadCode, RefactoringType::OrganizeImports),
];

fn resolve_dependencies(steps: &mut [RefactoringStep]) {
    let snapshot: Vec<(String, RefactoringType, Vec<std::path::PathBuf>)> = steps
        .iter()
        .map(|s| (s.id.clone(), s.refactoring, s.target_files.clone()))
        .collect();

    for step in steps.iter_mut() {
        for (other_id, other_kind, other_files) in &snapshot {
            if *other_id == step.id {
                continue;
            }
            let files_overlap = step
                .target_files
                .iter()
                .any(|f| other_files.contains(f));
            if !files_overlap {
                continue;
            }
            let rule_applies = ORDERING_RULES
                .iter()
                .any(|(before, after)| *before == *other_kind && *after == step.refactoring);
            if rule_applies && !step.depends_on.contains(other_id) {
                step.depends_on.push(other_id.clone());
            }
        }
    }
}

/// Kahn's algorithm with stable order: repeatedly emit the first step whose
/// dependencies are all satisfied. Failing to drain the list means the step
/// graph has a cycle, which is fatal.
fn topological_sort(
    steps: Vec<RefactoringStep>,
) -> Result<Vec<RefactoringStep>, PlanningError> {
    let known: HashSet<String> = steps.iter().map(|s| s.id.clone()).collect();
    for step in &steps {
        for dep in &step.depends_on {
            if !known.contains(dep) {
                return Err(PlanningError::UnresolvedDependency {
                    step: step.id.clone(),
                    missing: dep.clone(),
                });
            }
        }
    }

    let mut remaining = steps;
    let mut emitted: Vec<RefactoringStep> = Vec::new();
    let mut done: HashSet<String> = HashSet::new();

    while !remaining.is_empty() {
        let position = remaining
            .iter()
            .position(|s| s.depends_on.iter().all(|d| done.contains(d)));
        match position {
            Some(idx) => {
                let step = remaining.remove(idx);
                done.insert(step.id.clone());
                emitted.push(step);
            }
            None => {
                return Err(PlanningError::CyclicDependencies {
                    remaining: remaining.into_iter().map(|s| s.id).collect(),
                });
            }
        }
    }

    Ok(emitted)
}

/// Plan risk from step counts: any high step makes the plan high; more than
/// the configured number of medium steps makes it medium; otherwise low.
fn assess_risk(steps: &[RefactoringStep], config: &EngineConfig) -> RiskAssessment {
    let high = steps.iter().filter(|s| s.risk == RiskLevel::High).count();
    let medium = steps.iter().filter(|s| s.risk == RiskLevel::Medium).count();

    let level = if high > 0 {
        RiskLevel::High
    } else if medium > config.heuristics.medium_risk_step_limit {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut factors = Vec::new();
    if high > 0 {
        factors.push(format!("{high} high-risk step(s)"));
    }
    if medium > 0 {
        factors.push(format!("{medium} medium-risk step(s)"));
    }
    if factors.is_empty() {
        factors.push("all steps are low risk".to_string());
    }

    RiskAssessment {
        level,
        factors,
        mitigations: vec![
            "Pre-images are captured before every mutation".to_string(),
            "Execution halts on the first failing step".to_string(),
            "Behavior validation gates acceptance".to_string(),
        ],
    }
}

fn validation_plan(steps: &[RefactoringStep]) -> ValidationPlan {
    static ORDER: &[ValidationKind] = &[
        ValidationKind::Syntax,
        ValidationKind::Types,
        ValidationKind::Behavior,
        ValidationKind::Performance,
        ValidationKind::Security,
    ];

    let required: HashSet<ValidationKind> = steps
        .iter()
        .flat_map(|s| s.required_checks.iter().copied())
        .collect();
    let checks: Vec<ValidationKind> = ORDER
        .iter()
        .copied()
        .filter(|k| required.contains(k))
        .collect();

    ValidationPlan {
        description: "Run the required checks after the last step; accept only when none fail"
            .to_string(),
        checks,
    }
}

fn plan_id(steps: &[RefactoringStep]) -> String {
    let mut hasher = Sha256::new();
    for step in steps {
        hasher.update(step.id.as_bytes());
        for file in &step.target_files {
            hasher.update(file.display().to_string().as_bytes());
        }
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("plan-{hex}")
}
