use proptest::prelude::*;
use reforge::complexity::maintainability_index;
use reforge::config::{EngineConfig, Heuristics};
use reforge::core::{
    CodeAnalysis, EffortLevel, RefactoringSuggestion, RefactoringType, ScopeLevel,
    SuggestionScope,
};
use reforge::pipeline::analyze_files;
use reforge::planner::build_plan;
use reforge::SourceFile;
use std::collections::HashSet;

fn empty_analysis() -> CodeAnalysis {
    CodeAnalysis {
        root: ".".into(),
        timestamp: chrono::Utc::now(),
        units: vec![],
        metrics: Default::default(),
        findings: vec![],
        duplications: vec![],
        graph: Default::default(),
    }
}

fn suggestion_of(kind: RefactoringType, index: usize) -> RefactoringSuggestion {
    let file = std::path::PathBuf::from(format!("src/f{index}.js"));
    RefactoringSuggestion {
        id: format!("{kind}-{index}"),
        refactoring: kind,
        scope: SuggestionScope {
            level: ScopeLevel::File,
            targets: vec![],
            files: vec![file.clone()],
        },
        benefits: vec![],
        risks: vec![],
        effort: EffortLevel::Medium,
        priority: 5,
        affected_files: vec![file],
        estimated_minutes: 30,
        confidence: 80,
    }
}

static ALL_KINDS: &[RefactoringType] = &[
    RefactoringType::ExtractMethod,
    RefactoringType::ExtractClass,
    RefactoringType::ReduceComplexity,
    RefactoringType::RemoveDeadCode,
    RefactoringType::EliminateDuplication,
    RefactoringType::SimplifyConditionals,
    RefactoringType::Modernize,
    RefactoringType::OrganizeImports,
];

proptest! {
    #[test]
    fn maintainability_index_is_never_negative(
        loc in 0usize..2_000_000,
        avg in 0.0f64..500.0,
    ) {
        let mi = maintainability_index(loc, avg, &Heuristics::default());
        prop_assert!(mi >= 0.0);
        prop_assert!(mi <= Heuristics::default().mi_base);
    }

    #[test]
    fn branch_count_drives_cyclomatic_complexity(branches in 0usize..20) {
        let mut source = String::from("export function f(n) {\n    let t = 0;\n");
        for i in 0..branches {
            source.push_str(&format!("    if (n > {i}) {{ t += {i}; }}\n"));
        }
        source.push_str("    return t;\n}\n");

        let analysis = analyze_files(
            vec![SourceFile::new("src/f.js", source)],
            &EngineConfig::default(),
        )
        .unwrap();
        let func = analysis.units[0].all_functions().next().unwrap();
        prop_assert_eq!(func.cyclomatic as usize, branches + 1);
    }

    #[test]
    fn plans_from_arbitrary_suggestion_mixes_stay_acyclic(
        kinds in proptest::collection::vec(0usize..8, 0..12),
    ) {
        let suggestions: Vec<RefactoringSuggestion> = kinds
            .iter()
            .enumerate()
            // Half the suggestions share one file so ordering rules fire.
            .map(|(i, k)| suggestion_of(ALL_KINDS[*k], i % 2))
            .collect();

        let plan = build_plan(&empty_analysis(), &suggestions, &EngineConfig::default())
            .expect("generated plans never contain cycles");

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &plan.steps {
            for dep in &step.depends_on {
                prop_assert!(seen.contains(dep.as_str()));
            }
            seen.insert(&step.id);
        }
    }
}
