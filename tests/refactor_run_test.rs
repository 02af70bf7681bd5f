use indoc::indoc;
use reforge::config::EngineConfig;
use reforge::core::{
    ExecutionStatus, FileChange, RefactoringStep, RefactoringType, StepStatus,
};
use reforge::errors::StepError;
use reforge::executor::{
    analyze_workspace, apply_rollback, execute_plan, ExecutionOptions, MechanicalApplier,
    StepApplier, Workspace,
};
use reforge::pipeline::analyze_files;
use reforge::planner::build_plan;
use reforge::suggest::generate_suggestions;
use reforge::validator::validate_refactoring;
use reforge::SourceFile;
use std::path::Path;
use std::time::Duration;

const APP_JS: &str = indoc! {r#"
    import { used } from "./lib.js";

    export function run(x) {
        return used(x);
    }
"#};

const LIB_JS: &str = indoc! {r#"
    export function used(x) {
        return x + 1;
    }

    export function orphan(x) {
        return x - 1;
    }
"#};

fn project_files() -> Vec<SourceFile> {
    vec![
        SourceFile::new("src/app.js", APP_JS),
        SourceFile::new("src/lib.js", LIB_JS),
    ]
}

#[test]
fn dead_export_removal_runs_end_to_end() {
    let config = EngineConfig::default();
    let files = project_files();
    let analysis = analyze_files(files.clone(), &config).unwrap();

    let suggestions = generate_suggestions(&analysis, &[], &config);
    let dead = suggestions
        .iter()
        .find(|s| {
            s.refactoring == RefactoringType::RemoveDeadCode
                && s.scope.targets.contains(&"orphan".to_string())
        })
        .expect("dead-code suggestion for the orphan export");

    let plan = build_plan(&analysis, std::slice::from_ref(dead), &config).unwrap();
    assert_eq!(plan.steps.len(), 1);
    assert!(plan.steps[0].automated);

    let mut workspace = Workspace::from_files(&files);
    let before_units = analyze_workspace(&workspace, &config);
    let result = execute_plan(
        &plan,
        &mut workspace,
        &MechanicalApplier,
        &ExecutionOptions::default(),
        &config,
    );

    assert_eq!(result.status, ExecutionStatus::Success);
    let rewritten = workspace.get(Path::new("src/lib.js")).unwrap();
    assert!(!rewritten.contains("orphan"));
    assert!(rewritten.contains("used"));
    assert!(result.delta.loc < 0);

    let after_units = analyze_workspace(&workspace, &config);
    let validation = validate_refactoring(&before_units, &after_units, &result, None);
    assert!(validation.is_valid, "errors: {:?}", validation.errors);
}

#[test]
fn removing_a_live_export_is_caught_by_validation() {
    let config = EngineConfig::default();
    let files = project_files();
    let mut workspace = Workspace::from_files(&files);
    let before_units = analyze_workspace(&workspace, &config);

    // Hand-build a step that deletes the `used` export out from under its
    // importer.
    let step = RefactoringStep {
        id: "step-001-remove_dead_code".to_string(),
        refactoring: RefactoringType::RemoveDeadCode,
        description: "remove export".to_string(),
        target_files: vec!["src/lib.js".into()],
        changes: vec![FileChange {
            change: reforge::core::ChangeType::Modify,
            file: "src/lib.js".into(),
            span: Some(reforge::core::LineSpan { start: 1, end: 3 }),
            reason: "mistaken removal".to_string(),
        }],
        depends_on: vec![],
        risk: reforge::core::RiskLevel::Low,
        automated: true,
        required_checks: vec![reforge::core::ValidationKind::Types],
    };
    let analysis = analyze_files(files, &config).unwrap();
    let plan = {
        let mut plan = build_plan(&analysis, &[], &config).unwrap();
        plan.steps = vec![step];
        plan
    };

    let result = execute_plan(
        &plan,
        &mut workspace,
        &MechanicalApplier,
        &ExecutionOptions::default(),
        &config,
    );
    assert_eq!(result.status, ExecutionStatus::Success);

    let after_units = analyze_workspace(&workspace, &config);
    let validation = validate_refactoring(&before_units, &after_units, &result, None);
    assert!(!validation.is_valid);
    assert!(validation
        .errors
        .iter()
        .any(|e| e.contains("used")));

    // The recorded rollback undoes the damage without any re-analysis.
    apply_rollback(&result.rollback, &mut workspace);
    assert_eq!(workspace.get(Path::new("src/lib.js")).unwrap(), LIB_JS);
}

struct SlowApplier;

impl StepApplier for SlowApplier {
    fn apply(
        &self,
        _step: &RefactoringStep,
        _workspace: &mut Workspace,
    ) -> Result<Vec<FileChange>, StepError> {
        std::thread::sleep(Duration::from_millis(25));
        Ok(vec![])
    }
}

#[test]
fn step_deadline_records_a_timeout_failure() {
    let config = EngineConfig::default();
    let files = project_files();
    let analysis = analyze_files(files.clone(), &config).unwrap();
    let suggestions = generate_suggestions(&analysis, &[], &config);
    let plan = build_plan(&analysis, &suggestions, &config).unwrap();
    assert!(!plan.steps.is_empty());

    let mut workspace = Workspace::from_files(&files);
    let options = ExecutionOptions {
        step_deadline: Some(Duration::from_millis(1)),
        cancel: None,
    };
    let result = execute_plan(&plan, &mut workspace, &SlowApplier, &options, &config);

    let first = &result.executed_steps[0];
    assert_eq!(first.status, StepStatus::Failed);
    assert!(first.issues.iter().any(|i| i.contains("deadline")));
    assert_ne!(result.status, ExecutionStatus::Success);
}
