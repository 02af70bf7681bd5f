use crate::core::{
    BehaviorComparison, CheckOutcome, CheckStatus, FindingKind, MetricPair, PerformanceComparison,
    RefactoringResult, SourceUnit, TestEvidence, ValidationKind, ValidationResult,
};
use crate::graph::analyze_dependencies;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

/// Re-check a finished execution: syntax, reference integrity, behavior,
/// performance and security, each as an independent named check.
///
/// `is_valid` is true only when no check failed; warnings are surfaced but
/// do not block. The behavior comparison's `behavior_preserved` boolean is
/// the gate callers should use for the keep-versus-rollback decision.
pub fn validate_refactoring(
    before_units: &[SourceUnit],
    after_units: &[SourceUnit],
    result: &RefactoringResult,
    evidence: Option<&TestEvidence>,
) -> ValidationResult {
    let touched: BTreeSet<PathBuf> = result.changes.iter().map(|c| c.file.clone()).collect();

    let mut checks = Vec::new();
    checks.push(timed(ValidationKind::Syntax, || {
        syntax_check(after_units, &touched)
    }));
    checks.push(timed(ValidationKind::Types, || {
        reference_integrity_check(after_units)
    }));

    let (behavior_outcome, behavior) = behavior_check(evidence);
    checks.push(behavior_outcome);

    let (performance_outcome, performance) = performance_check(result);
    checks.push(performance_outcome);

    checks.push(timed(ValidationKind::Security, || {
        security_check(before_units, after_units)
    }));

    let errors: Vec<String> = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Failed)
        .map(|c| c.message.clone())
        .collect();
    let warnings: Vec<String> = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Warning)
        .map(|c| c.message.clone())
        .collect();

    ValidationResult {
        is_valid: errors.is_empty(),
        checks,
        errors,
        warnings,
        performance,
        behavior,
    }
}

fn timed<F>(kind: ValidationKind, check: F) -> CheckOutcome
where
    F: FnOnce() -> (CheckStatus, String),
{
    let started = Instant::now();
    let (status, message) = check();
    CheckOutcome {
        kind,
        status,
        message,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

/// The touched files must still parse cleanly.
fn syntax_check(after_units: &[SourceUnit], touched: &BTreeSet<PathBuf>) -> (CheckStatus, String) {
    let broken: Vec<String> = after_units
        .iter()
        .filter(|u| touched.is_empty() || touched.contains(&u.path))
        .filter(|u| u.findings.iter().any(|f| f.kind == FindingKind::Syntax))
        .map(|u| u.path.display().to_string())
        .collect();

    if broken.is_empty() {
        (CheckStatus::Passed, "all touched files parse".to_string())
    } else {
        (
            CheckStatus::Failed,
            format!("syntax errors in: {}", broken.join(", ")),
        )
    }
}

/// Every name imported from an analyzed unit must still be exported by it.
/// The closest available stand-in for a type check without a host compiler.
fn reference_integrity_check(after_units: &[SourceUnit]) -> (CheckStatus, String) {
    let analysis = analyze_dependencies(after_units);
    let mut broken = Vec::new();

    for (path, names) in &analysis.imported_names {
        let Some(unit) = after_units.iter().find(|u| &u.path == path) else {
            broken.push(format!("{} no longer exists", path.display()));
            continue;
        };
        for name in names {
            if !unit.exports.iter().any(|e| &e.name == name) {
                broken.push(format!("{}::{name}", path.display()));
            }
        }
    }

    if broken.is_empty() {
        (
            CheckStatus::Passed,
            "imported names resolve to live exports".to_string(),
        )
    } else {
        (
            CheckStatus::Failed,
            format!("unresolved references: {}", broken.join(", ")),
        )
    }
}

fn behavior_check(evidence: Option<&TestEvidence>) -> (CheckOutcome, BehaviorComparison) {
    let started = Instant::now();

    let (status, message, comparison) = match evidence {
        Some(evidence) => {
            let preserved = evidence.tests_run > 0 && evidence.tests_failed == 0;
            let coverage_delta = match (evidence.coverage_before, evidence.coverage_after) {
                (Some(before), Some(after)) => Some(after - before),
                _ => None,
            };
            let comparison = BehaviorComparison {
                tests_run: evidence.tests_run,
                tests_passed: evidence.tests_passed,
                tests_failed: evidence.tests_failed,
                coverage_delta,
                behavior_preserved: preserved,
            };
            if evidence.tests_failed > 0 {
                (
                    CheckStatus::Failed,
                    format!("{} test(s) failed after refactoring", evidence.tests_failed),
                    comparison,
                )
            } else if evidence.tests_run == 0 {
                (
                    CheckStatus::Warning,
                    "no tests were run; behavior preservation is unverified".to_string(),
                    comparison,
                )
            } else {
                (
                    CheckStatus::Passed,
                    format!("{} test(s) passed", evidence.tests_passed),
                    comparison,
                )
            }
        }
        // No evidence: conservatively treat behavior as not demonstrated.
        None => (
            CheckStatus::Warning,
            "no test evidence supplied; behavior preservation is unverified".to_string(),
            BehaviorComparison::default(),
        ),
    };

    (
        CheckOutcome {
            kind: ValidationKind::Behavior,
            status,
            message,
            duration_ms: started.elapsed().as_millis() as u64,
        },
        comparison,
    )
}

fn performance_check(result: &RefactoringResult) -> (CheckOutcome, PerformanceComparison) {
    let started = Instant::now();
    let before = &result.before;
    let after = &result.after;

    let pairs = vec![
        MetricPair {
            name: "total_complexity".to_string(),
            before: before.total_complexity as f64,
            after: after.total_complexity as f64,
        },
        MetricPair {
            name: "maintainability".to_string(),
            before: before.maintainability,
            after: after.maintainability,
        },
        MetricPair {
            name: "total_loc".to_string(),
            before: before.total_loc as f64,
            after: after.total_loc as f64,
        },
    ];

    let complexity_growth = if before.total_complexity > 0 {
        (after.total_complexity as f64 - before.total_complexity as f64)
            / before.total_complexity as f64
    } else {
        0.0
    };
    let maintainability_drop = before.maintainability - after.maintainability;
    let significant = complexity_growth > 0.10 || maintainability_drop > 5.0;

    let (status, message) = if complexity_growth > 0.25 {
        (
            CheckStatus::Failed,
            format!(
                "total complexity grew {:.0}% during a refactoring",
                complexity_growth * 100.0
            ),
        )
    } else if significant {
        (
            CheckStatus::Warning,
            "metrics regressed measurably; review before keeping".to_string(),
        )
    } else {
        (CheckStatus::Passed, "no metric regression".to_string())
    };

    (
        CheckOutcome {
            kind: ValidationKind::Performance,
            status,
            message,
            duration_ms: started.elapsed().as_millis() as u64,
        },
        PerformanceComparison { pairs, significant },
    )
}

static DANGEROUS_CALLS: &[&str] = &[
    "eval",
    "exec",
    "system",
    "child_process",
    "subprocess",
    "Function",
    "popen",
];

fn dangerous_call_sites(units: &[SourceUnit]) -> usize {
    units
        .iter()
        .flat_map(|u| u.all_functions())
        .flat_map(|f| f.calls.iter())
        .filter(|call| DANGEROUS_CALLS.contains(&call.as_str()))
        .count()
}

/// New dynamic-execution call sites must not appear during a refactoring.
fn security_check(
    before_units: &[SourceUnit],
    after_units: &[SourceUnit],
) -> (CheckStatus, String) {
    let before = dangerous_call_sites(before_units);
    let after = dangerous_call_sites(after_units);

    if after > before {
        (
            CheckStatus::Failed,
            format!("dynamic-execution call sites grew from {before} to {after}"),
        )
    } else {
        (CheckStatus::Passed, "no new dangerous call sites".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::parse_source;
    use crate::core::{
        ExecutionStatus, MetricsDelta, MetricsSnapshot, RollbackInfo, SourceFile,
    };

    fn result_with(before: MetricsSnapshot, after: MetricsSnapshot) -> RefactoringResult {
        RefactoringResult {
            id: "run-test".to_string(),
            plan_id: "plan-test".to_string(),
            status: ExecutionStatus::Success,
            executed_steps: vec![],
            changes: vec![],
            delta: MetricsDelta::between(&before, &after),
            before,
            after,
            issues: vec![],
            rollback: RollbackInfo {
                available: true,
                preimages: vec![],
            },
            timestamp: chrono::Utc::now(),
        }
    }

    fn units_of(files: &[(&str, &str)]) -> Vec<SourceUnit> {
        files
            .iter()
            .map(|(path, content)| parse_source(&SourceFile::new(*path, *content)))
            .collect()
    }

    fn evidence(run: usize, failed: usize) -> TestEvidence {
        TestEvidence {
            tests_run: run,
            tests_passed: run - failed,
            tests_failed: failed,
            coverage_before: Some(81.0),
            coverage_after: Some(80.5),
        }
    }

    #[test]
    fn clean_refactoring_validates() {
        let units = units_of(&[("src/a.js", "export function f() { return 1; }\n")]);
        let result = result_with(MetricsSnapshot::default(), MetricsSnapshot::default());
        let validation =
            validate_refactoring(&units, &units, &result, Some(&evidence(10, 0)));
        assert!(validation.is_valid);
        assert!(validation.behavior.behavior_preserved);
    }

    #[test]
    fn failing_tests_invalidate_and_gate_rollback() {
        let units = units_of(&[("src/a.js", "export function f() { return 1; }\n")]);
        let result = result_with(MetricsSnapshot::default(), MetricsSnapshot::default());
        let validation =
            validate_refactoring(&units, &units, &result, Some(&evidence(10, 2)));
        assert!(!validation.is_valid);
        assert!(!validation.behavior.behavior_preserved);
        assert_eq!(validation.behavior.tests_failed, 2);
    }

    #[test]
    fn missing_evidence_is_a_warning_not_a_failure() {
        let units = units_of(&[("src/a.js", "export function f() { return 1; }\n")]);
        let result = result_with(MetricsSnapshot::default(), MetricsSnapshot::default());
        let validation = validate_refactoring(&units, &units, &result, None);
        assert!(validation.is_valid);
        assert!(!validation.behavior.behavior_preserved);
        assert!(!validation.warnings.is_empty());
    }

    #[test]
    fn syntax_break_fails_validation() {
        let before = units_of(&[("src/a.js", "export function f() { return 1; }\n")]);
        let after = units_of(&[("src/a.js", "export function f( { return 1; }\n")]);
        let result = result_with(MetricsSnapshot::default(), MetricsSnapshot::default());
        let validation = validate_refactoring(&before, &after, &result, Some(&evidence(5, 0)));
        assert!(!validation.is_valid);
        assert!(validation
            .checks
            .iter()
            .any(|c| c.kind == ValidationKind::Syntax && c.status == CheckStatus::Failed));
    }

    #[test]
    fn removed_export_with_live_importer_fails_reference_check() {
        let before = units_of(&[
            (
                "src/app.js",
                "import { helper } from \"./util.js\";\nexport function run() { return helper(); }\n",
            ),
            ("src/util.js", "export function helper() { return 1; }\n"),
        ]);
        let after = units_of(&[
            (
                "src/app.js",
                "import { helper } from \"./util.js\";\nexport function run() { return helper(); }\n",
            ),
            ("src/util.js", "function helper() { return 1; }\n"),
        ]);
        let result = result_with(MetricsSnapshot::default(), MetricsSnapshot::default());
        let validation = validate_refactoring(&before, &after, &result, Some(&evidence(5, 0)));
        assert!(validation
            .checks
            .iter()
            .any(|c| c.kind == ValidationKind::Types && c.status == CheckStatus::Failed));
    }

    #[test]
    fn complexity_regression_is_surfaced() {
        let before = MetricsSnapshot {
            total_complexity: 100,
            maintainability: 80.0,
            ..Default::default()
        };
        let after = MetricsSnapshot {
            total_complexity: 140,
            maintainability: 70.0,
            ..Default::default()
        };
        let units = units_of(&[("src/a.js", "export function f() { return 1; }\n")]);
        let result = result_with(before, after);
        let validation = validate_refactoring(&units, &units, &result, Some(&evidence(5, 0)));
        assert!(!validation.is_valid);
        assert!(validation.performance.significant);
    }

    #[test]
    fn new_eval_call_fails_security_check() {
        let before = units_of(&[("src/a.js", "export function f(x) { return x; }\n")]);
        let after = units_of(&[("src/a.js", "export function f(x) { return eval(x); }\n")]);
        let result = result_with(MetricsSnapshot::default(), MetricsSnapshot::default());
        let validation = validate_refactoring(&before, &after, &result, Some(&evidence(5, 0)));
        assert!(validation
            .checks
            .iter()
            .any(|c| c.kind == ValidationKind::Security && c.status == CheckStatus::Failed));
    }
}
