use indoc::indoc;
use reforge::config::EngineConfig;
use reforge::core::{FindingKind, Language};
use reforge::pipeline::{analyze_files, analyze_path};
use reforge::SourceFile;
use std::fs;
use std::path::Path;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn analyzes_a_mixed_language_project_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/app.js",
        indoc! {r#"
            import { helper } from "./util.js";

            export function run(input) {
                if (!input) {
                    return null;
                }
                return helper(input);
            }
        "#},
    );
    write(
        dir.path(),
        "src/util.js",
        "export function helper(x) { return x * 2; }\n",
    );
    write(
        dir.path(),
        "tools/report.py",
        indoc! {r#"
            def summarize(rows):
                total = 0
                for row in rows:
                    if row:
                        total += row
                return total
        "#},
    );
    write(dir.path(), "notes.txt", "not source\n");

    let config = EngineConfig::load(dir.path()).unwrap();
    let analysis = analyze_path(dir.path(), &config).unwrap();

    assert_eq!(analysis.units.len(), 3);
    assert!(analysis
        .units
        .iter()
        .any(|u| u.language == Language::Python));
    assert_eq!(analysis.metrics.total_functions, 3);

    // app.js -> util.js is the only internal edge and it is referenced.
    assert_eq!(analysis.graph.edges.len(), 1);
    assert!(analysis.graph.unused_edges.is_empty());
}

#[test]
fn config_file_overrides_detection_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "reforge.toml",
        "[thresholds]\nlong_method_warn = 3\nlong_method_major = 6\nlong_method_critical = 9\n",
    );
    write(
        dir.path(),
        "src/small.js",
        indoc! {r#"
            export function tiny(a) {
                let out = a;
                out += 1;
                out += 2;
                return out;
            }
        "#},
    );

    let config = EngineConfig::load(dir.path()).unwrap();
    assert_eq!(config.thresholds.long_method_warn, 3);

    let analysis = analyze_path(dir.path(), &config).unwrap();
    assert!(analysis
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::LongMethod));
}

#[test]
fn cross_file_cycle_and_dead_export_are_both_reported() {
    let config = EngineConfig::default();
    let files = vec![
        SourceFile::new(
            "src/a.js",
            "import { b } from \"./b.js\";\nexport function a() { return b(); }\n",
        ),
        SourceFile::new(
            "src/b.js",
            "import { a } from \"./a.js\";\nexport function b() { return a(); }\nexport function forgotten() { return 0; }\n",
        ),
    ];
    let analysis = analyze_files(files, &config).unwrap();

    assert!(analysis
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::CircularDependency));
    let dead: Vec<_> = analysis
        .findings
        .iter()
        .filter(|f| f.kind == FindingKind::DeadCode)
        .collect();
    assert_eq!(dead.len(), 1);
    assert!(dead[0].message.contains("forgotten"));
}

#[test]
fn duplicated_blocks_are_found_across_files() {
    let config = EngineConfig::default();
    let block = indoc! {r#"
        export function normalize(values) {
            const out = [];
            for (const value of values) {
                if (value !== null) {
                    out.push(value.trim().toLowerCase());
                }
            }
            return out;
        }
    "#};
    let files = vec![
        SourceFile::new("src/one.js", block.to_string()),
        SourceFile::new("src/two.js", block.to_string()),
    ];
    let analysis = analyze_files(files, &config).unwrap();

    assert!(!analysis.duplications.is_empty());
    let exact = &analysis.duplications[0];
    assert_eq!(exact.similarity, 100);
    assert_eq!(exact.locations.len(), 2);
    assert!(analysis
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::Duplication));
}

#[test]
fn maintainability_tracks_size_and_complexity() {
    let config = EngineConfig::default();
    let mut branchy = String::from("export function branchy(n) {\n    let t = 0;\n");
    for i in 0..30 {
        branchy.push_str(&format!("    if (n > {i}) {{ t += {i}; }}\n"));
    }
    branchy.push_str("    return t;\n}\n");

    let simple = analyze_files(
        vec![SourceFile::new(
            "src/simple.js",
            "export function f() { return 1; }\n",
        )],
        &config,
    )
    .unwrap();
    let complex = analyze_files(
        vec![SourceFile::new("src/branchy.js", branchy)],
        &config,
    )
    .unwrap();

    assert!(simple.metrics.maintainability > complex.metrics.maintainability);
    assert!(complex.metrics.maintainability >= 0.0);
    assert!(complex.metrics.debt_hours > simple.metrics.debt_hours);
}
