use crate::analyzers::parse_source;
use crate::config::EngineConfig;
use crate::core::{
    ChangeType, ExecutionStatus, FileChange, FilePreimage, MetricsDelta, MetricsSnapshot,
    RefactoringPlan, RefactoringResult, RefactoringStep, RollbackInfo, SourceFile, SourceUnit,
    StepMetrics, StepOutcome, StepStatus,
};
use crate::errors::StepError;
use crate::metrics;
use crate::smells::detect_duplication;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-memory view of the files a plan may touch. Loaded once before
/// execution and written back (or discarded) by the caller.
#[derive(Clone, Debug, Default)]
pub struct Workspace {
    files: BTreeMap<PathBuf, String>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files(files: &[SourceFile]) -> Self {
        Self {
            files: files
                .iter()
                .map(|f| (f.path.clone(), f.content.clone()))
                .collect(),
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn remove(&mut self, path: &Path) -> Option<String> {
        self.files.remove(path)
    }

    pub fn get(&self, path: &Path) -> Option<&String> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.keys()
    }

    pub fn to_source_files(&self) -> Vec<SourceFile> {
        self.files
            .iter()
            .map(|(path, content)| SourceFile::new(path.clone(), content.clone()))
            .collect()
    }

    /// Remove the 1-based line range `start..=end` from a file.
    fn delete_lines(&mut self, path: &Path, start: usize, end: usize) -> Result<usize, StepError> {
        let content = self
            .files
            .get(path)
            .ok_or_else(|| StepError::MissingFile {
                path: path.to_path_buf(),
            })?;
        let lines: Vec<&str> = content.lines().collect();
        if start == 0 || end < start || end > lines.len() {
            return Err(StepError::SpanOutOfRange {
                path: path.to_path_buf(),
                start,
                end,
                lines: lines.len(),
            });
        }

        let kept: Vec<&str> = lines
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx + 1 < start || *idx + 1 > end)
            .map(|(_, l)| *l)
            .collect();
        let mut next = kept.join("\n");
        if content.ends_with('\n') && !next.is_empty() {
            next.push('\n');
        }
        let removed = end - start + 1;
        self.files.insert(path.to_path_buf(), next);
        Ok(removed)
    }
}

/// Coarse-grained cancellation: checked between steps only. Steps not yet
/// started are skipped; the running step finishes.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct ExecutionOptions {
    /// Per-step deadline; exceeding it records the step as failed with a
    /// timeout cause and halts the run.
    pub step_deadline: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

/// Seam for the actual text transformation. The engine plans and sequences
/// changes; rewriting source text is delegated here and may be backed by an
/// external rewriter.
pub trait StepApplier {
    fn apply(
        &self,
        step: &RefactoringStep,
        workspace: &mut Workspace,
    ) -> Result<Vec<FileChange>, StepError>;
}

/// Built-in applier for the mechanically-safe kinds (span deletions, file
/// creation/removal). Kinds that need semantic rewriting are rejected so a
/// failure is recorded instead of a silent no-op.
pub struct MechanicalApplier;

impl StepApplier for MechanicalApplier {
    fn apply(
        &self,
        step: &RefactoringStep,
        workspace: &mut Workspace,
    ) -> Result<Vec<FileChange>, StepError> {
        if !step.automated {
            return Err(StepError::Unsupported {
                kind: step.refactoring.to_string(),
            });
        }

        let mut applied = Vec::new();
        // Apply bottom-up per file so earlier deletions do not shift the
        // line numbers of later ones.
        let mut changes = step.changes.clone();
        changes.sort_by(|a, b| {
            (&a.file, std::cmp::Reverse(a.span.map(|s| s.start)))
                .cmp(&(&b.file, std::cmp::Reverse(b.span.map(|s| s.start))))
        });

        for change in changes {
            match change.change {
                ChangeType::Modify => {
                    let span = change.span.ok_or_else(|| {
                        StepError::Apply(format!(
                            "modify of {} carries no line span",
                            change.file.display()
                        ))
                    })?;
                    workspace.delete_lines(&change.file, span.start, span.end)?;
                    applied.push(change);
                }
                ChangeType::Delete => {
                    workspace
                        .remove(&change.file)
                        .ok_or_else(|| StepError::MissingFile {
                            path: change.file.clone(),
                        })?;
                    applied.push(change);
                }
                ChangeType::Create => {
                    if !workspace.contains(&change.file) {
                        workspace.insert(change.file.clone(), String::new());
                    }
                    applied.push(change);
                }
            }
        }
        Ok(applied)
    }
}

/// Execute a plan's steps strictly in their topological order.
///
/// The first failing step stops the run; later steps are not attempted and
/// do not appear in the executed list. Pre-images of every touched file are
/// captured before its first mutation, making the returned rollback info
/// self-contained.
pub fn execute_plan(
    plan: &RefactoringPlan,
    workspace: &mut Workspace,
    applier: &dyn StepApplier,
    options: &ExecutionOptions,
    config: &EngineConfig,
) -> RefactoringResult {
    let before_units = analyze_workspace(workspace, config);
    let before = snapshot_of(&before_units, config);

    let mut outcomes: Vec<StepOutcome> = Vec::new();
    let mut preimages: BTreeMap<PathBuf, FilePreimage> = BTreeMap::new();
    let mut issues: Vec<String> = Vec::new();
    let mut cancelled = false;
    let mut failed = false;

    for step in &plan.steps {
        if options
            .cancel
            .as_ref()
            .map(|c| c.is_cancelled())
            .unwrap_or(false)
        {
            if !cancelled {
                issues.push("execution cancelled; remaining steps skipped".to_string());
                cancelled = true;
            }
            outcomes.push(StepOutcome {
                step_id: step.id.clone(),
                status: StepStatus::Skipped,
                duration_ms: 0,
                changes: vec![],
                issues: vec!["cancelled before start".to_string()],
                metrics: StepMetrics::default(),
            });
            continue;
        }

        let touched = touched_files(step);
        for file in &touched {
            preimages.entry(file.clone()).or_insert_with(|| FilePreimage {
                file: file.clone(),
                existed: workspace.contains(file),
                content: workspace.get(file).cloned().unwrap_or_default(),
            });
        }
        let step_before: BTreeMap<PathBuf, Option<String>> = touched
            .iter()
            .map(|f| (f.clone(), workspace.get(f).cloned()))
            .collect();

        let started = Instant::now();
        let applied = applier.apply(step, workspace);
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        let timed_out = options
            .step_deadline
            .map(|deadline| elapsed > deadline)
            .unwrap_or(false);

        match applied {
            Ok(changes) if !timed_out => {
                let metrics = step_metrics(&step_before, workspace, &changes, config);
                outcomes.push(StepOutcome {
                    step_id: step.id.clone(),
                    status: StepStatus::Success,
                    duration_ms,
                    changes,
                    issues: vec![],
                    metrics,
                });
            }
            Ok(_) => {
                let timeout = StepError::DeadlineExceeded {
                    elapsed_ms: duration_ms,
                };
                issues.push(format!("step {} timed out", step.id));
                outcomes.push(StepOutcome {
                    step_id: step.id.clone(),
                    status: StepStatus::Failed,
                    duration_ms,
                    changes: vec![],
                    issues: vec![timeout.to_string()],
                    metrics: StepMetrics::default(),
                });
                failed = true;
                break;
            }
            Err(err) => {
                issues.push(format!("step {} failed: {err}", step.id));
                outcomes.push(StepOutcome {
                    step_id: step.id.clone(),
                    status: StepStatus::Failed,
                    duration_ms,
                    changes: vec![],
                    issues: vec![err.to_string()],
                    metrics: StepMetrics::default(),
                });
                failed = true;
                break;
            }
        }
    }

    let after_units = analyze_workspace(workspace, config);
    let after = snapshot_of(&after_units, config);

    // A failing step degrades the run to partial: whatever executed before
    // it stands, and later steps were never attempted.
    let status = if failed || cancelled {
        ExecutionStatus::Partial
    } else {
        ExecutionStatus::Success
    };

    let changes: Vec<FileChange> = outcomes.iter().flat_map(|o| o.changes.clone()).collect();

    RefactoringResult {
        id: result_id(&plan.id),
        plan_id: plan.id.clone(),
        status,
        executed_steps: outcomes,
        changes,
        delta: MetricsDelta::between(&before, &after),
        before,
        after,
        issues,
        rollback: RollbackInfo {
            available: true,
            preimages: preimages.into_values().collect(),
        },
        timestamp: Utc::now(),
    }
}

/// Restore the pre-execution state of every touched file. Self-contained:
/// only the captured preimages are needed.
pub fn apply_rollback(rollback: &RollbackInfo, workspace: &mut Workspace) {
    for preimage in &rollback.preimages {
        if preimage.existed {
            workspace.insert(preimage.file.clone(), preimage.content.clone());
        } else {
            workspace.remove(&preimage.file);
        }
    }
}

pub fn analyze_workspace(workspace: &Workspace, _config: &EngineConfig) -> Vec<SourceUnit> {
    workspace
        .to_source_files()
        .iter()
        .map(parse_source)
        .collect()
}

fn snapshot_of(units: &[SourceUnit], config: &EngineConfig) -> MetricsSnapshot {
    let blocks = detect_duplication(units, &config.duplication);
    metrics::snapshot(units, blocks.len(), config)
}

fn touched_files(step: &RefactoringStep) -> BTreeSet<PathBuf> {
    step.target_files
        .iter()
        .cloned()
        .chain(step.changes.iter().map(|c| c.file.clone()))
        .collect()
}

fn step_metrics(
    before: &BTreeMap<PathBuf, Option<String>>,
    workspace: &Workspace,
    changes: &[FileChange],
    config: &EngineConfig,
) -> StepMetrics {
    let files_touched: BTreeSet<&PathBuf> = changes.iter().map(|c| &c.file).collect();

    let mut lines_changed = 0usize;
    let mut complexity_delta = 0i64;
    let mut units_before = Vec::new();
    let mut units_after = Vec::new();

    for (path, old) in before {
        let new = workspace.get(path);
        let old_text = old.as_deref().unwrap_or("");
        let new_text = new.map(|s| s.as_str()).unwrap_or("");
        if old_text == new_text {
            continue;
        }
        lines_changed += line_difference(old_text, new_text);

        let before_unit = parse_source(&SourceFile::new(path.clone(), old_text));
        let after_unit = parse_source(&SourceFile::new(path.clone(), new_text));
        let before_cc: i64 = before_unit
            .all_functions()
            .map(|f| f.cyclomatic as i64)
            .sum();
        let after_cc: i64 = after_unit.all_functions().map(|f| f.cyclomatic as i64).sum();
        complexity_delta += after_cc - before_cc;
        units_before.push(before_unit);
        units_after.push(after_unit);
    }

    let duplication_delta = detect_duplication(&units_after, &config.duplication).len() as i64
        - detect_duplication(&units_before, &config.duplication).len() as i64;

    StepMetrics {
        lines_changed,
        files_touched: files_touched.len(),
        complexity_delta,
        duplication_delta,
    }
}

fn line_difference(old: &str, new: &str) -> usize {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let shared = old_lines.len().min(new_lines.len());
    let differing = (0..shared)
        .filter(|&i| old_lines[i] != new_lines[i])
        .count();
    differing + old_lines.len().abs_diff(new_lines.len())
}

fn result_id(plan_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plan_id.as_bytes());
    hasher.update(Utc::now().timestamp_micros().to_le_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("run-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LineSpan, RefactoringType, RiskLevel, ValidationKind};

    fn dead_code_step(id: &str, file: &str, start: usize, end: usize) -> RefactoringStep {
        RefactoringStep {
            id: id.to_string(),
            refactoring: RefactoringType::RemoveDeadCode,
            description: "remove unused export".to_string(),
            target_files: vec![PathBuf::from(file)],
            changes: vec![FileChange {
                change: ChangeType::Modify,
                file: PathBuf::from(file),
                span: Some(LineSpan { start, end }),
                reason: "unused".to_string(),
            }],
            depends_on: vec![],
            risk: RiskLevel::Low,
            automated: true,
            required_checks: vec![ValidationKind::Syntax],
        }
    }

    fn plan_of(steps: Vec<RefactoringStep>) -> RefactoringPlan {
        RefactoringPlan {
            id: "plan-test".to_string(),
            steps,
            risk: crate::core::RiskAssessment {
                level: RiskLevel::Low,
                factors: vec![],
                mitigations: vec![],
            },
            estimated_minutes: 15,
            rollback: crate::core::RollbackPlan {
                strategy: "preimage-restore".to_string(),
                capture_preimages: true,
                steps: vec![],
            },
            validation: crate::core::ValidationPlan {
                checks: vec![ValidationKind::Syntax],
                description: String::new(),
            },
        }
    }

    #[test]
    fn mechanical_applier_deletes_spans() {
        let mut workspace = Workspace::new();
        workspace.insert(
            "src/a.js",
            "export function used() {}\nexport function dead() {}\nused();\n",
        );

        let plan = plan_of(vec![dead_code_step("step-001", "src/a.js", 2, 2)]);
        let result = execute_plan(
            &plan,
            &mut workspace,
            &MechanicalApplier,
            &ExecutionOptions::default(),
            &EngineConfig::default(),
        );

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.executed_steps.len(), 1);
        assert!(!workspace.get(Path::new("src/a.js")).unwrap().contains("dead"));
    }

    #[test]
    fn empty_plan_is_trivially_successful() {
        let mut workspace = Workspace::new();
        workspace.insert("src/a.js", "export function f() {}\n");
        let result = execute_plan(
            &plan_of(vec![]),
            &mut workspace,
            &MechanicalApplier,
            &ExecutionOptions::default(),
            &EngineConfig::default(),
        );
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.executed_steps.is_empty());
    }

    #[test]
    fn rollback_restores_exact_bytes() {
        let original = "export function used() {}\nexport function dead() {}\nused();\n";
        let mut workspace = Workspace::new();
        workspace.insert("src/a.js", original);

        let plan = plan_of(vec![dead_code_step("step-001", "src/a.js", 2, 2)]);
        let result = execute_plan(
            &plan,
            &mut workspace,
            &MechanicalApplier,
            &ExecutionOptions::default(),
            &EngineConfig::default(),
        );
        assert_ne!(workspace.get(Path::new("src/a.js")).unwrap(), original);

        apply_rollback(&result.rollback, &mut workspace);
        assert_eq!(workspace.get(Path::new("src/a.js")).unwrap(), original);
    }

    #[test]
    fn unsupported_kind_fails_the_step() {
        let mut workspace = Workspace::new();
        workspace.insert("src/a.js", "export function f() { return 1; }\n");

        let manual_step = RefactoringStep {
            automated: false,
            refactoring: RefactoringType::ExtractMethod,
            ..dead_code_step("step-001", "src/a.js", 1, 1)
        };
        let result = execute_plan(
            &plan_of(vec![manual_step]),
            &mut workspace,
            &MechanicalApplier,
            &ExecutionOptions::default(),
            &EngineConfig::default(),
        );
        assert_eq!(result.status, ExecutionStatus::Partial);
        assert_eq!(result.executed_steps[0].status, StepStatus::Failed);
    }

    #[test]
    fn cancellation_skips_unstarted_steps() {
        let mut workspace = Workspace::new();
        workspace.insert("src/a.js", "line one\nline two\nline three\n");

        let cancel = CancelToken::new();
        cancel.cancel();
        let options = ExecutionOptions {
            step_deadline: None,
            cancel: Some(cancel),
        };

        let plan = plan_of(vec![
            dead_code_step("step-001", "src/a.js", 1, 1),
            dead_code_step("step-002", "src/a.js", 2, 2),
        ]);
        let result = execute_plan(
            &plan,
            &mut workspace,
            &MechanicalApplier,
            &options,
            &EngineConfig::default(),
        );

        assert_eq!(result.status, ExecutionStatus::Partial);
        assert!(result
            .executed_steps
            .iter()
            .all(|o| o.status == StepStatus::Skipped));
        // Nothing ran, nothing changed.
        assert_eq!(
            workspace.get(Path::new("src/a.js")).unwrap(),
            "line one\nline two\nline three\n"
        );
    }

    #[test]
    fn out_of_range_span_is_a_step_failure() {
        let mut workspace = Workspace::new();
        workspace.insert("src/a.js", "only line\n");
        let plan = plan_of(vec![dead_code_step("step-001", "src/a.js", 5, 9)]);
        let result = execute_plan(
            &plan,
            &mut workspace,
            &MechanicalApplier,
            &ExecutionOptions::default(),
            &EngineConfig::default(),
        );
        assert_eq!(result.status, ExecutionStatus::Partial);
    }
}
