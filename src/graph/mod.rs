use crate::core::{
    DependencyCycle, DependencyEdge, DependencyGraphReport, EdgeKind, ExternalPackage, Import,
    Language, ModuleCoupling, SourceUnit,
};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

/// Output of the cross-file dependency pass: the serializable report plus
/// the name table dead-export detection cross-references.
pub struct DependencyAnalysis {
    pub report: DependencyGraphReport,
    /// For each unit, the set of names other units import from it.
    pub imported_names: BTreeMap<PathBuf, BTreeSet<String>>,
}

/// Build the dependency graph over a complete set of per-file models. This
/// is the single-threaded synchronization point of a run: it must not start
/// until every unit's import/export lists exist.
pub fn analyze_dependencies(units: &[SourceUnit]) -> DependencyAnalysis {
    let mut graph: DiGraph<usize, EdgeData> = DiGraph::new();
    let mut index_of: HashMap<PathBuf, NodeIndex> = HashMap::new();

    for (idx, unit) in units.iter().enumerate() {
        let node = graph.add_node(idx);
        index_of.insert(unit.path.clone(), node);
    }

    let mut imported_names: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
    let mut externals: BTreeMap<String, ExternalUse> = BTreeMap::new();

    for unit in units {
        let from = index_of[&unit.path];
        let mut imported_symbols: HashMap<String, PathBuf> = HashMap::new();

        for import in &unit.imports {
            match resolve_import(unit, import, &index_of) {
                Resolution::Internal(target_path) => {
                    let to = index_of[&target_path];
                    let weight = import.names.len().max(1) as u32;
                    graph.add_edge(
                        from,
                        to,
                        EdgeData {
                            kind: EdgeKind::Import,
                            weight,
                            names: import.names.clone(),
                            module: import.module.clone(),
                        },
                    );
                    imported_names
                        .entry(target_path.clone())
                        .or_default()
                        .extend(import.names.iter().cloned());
                    for name in &import.names {
                        imported_symbols.insert(name.clone(), target_path.clone());
                    }
                }
                Resolution::External(package) => {
                    let entry = externals.entry(package).or_default();
                    entry.import_count += 1;
                    entry.call_sites += reference_count(unit, import);
                }
            }
        }

        // Inheritance and composition edges ride on resolved imports.
        for class in &unit.classes {
            for parent in class.superclass.iter().chain(class.interfaces.iter()) {
                if let Some(target) = imported_symbols.get(parent) {
                    graph.add_edge(
                        from,
                        index_of[target],
                        EdgeData {
                            kind: EdgeKind::Inheritance,
                            weight: 1,
                            names: vec![parent.clone()],
                            module: String::new(),
                        },
                    );
                }
            }
            for field in &class.fields {
                let Some(type_tag) = &field.type_tag else {
                    continue;
                };
                for token in type_tokens(type_tag) {
                    if let Some(target) = imported_symbols.get(token) {
                        graph.add_edge(
                            from,
                            index_of[target],
                            EdgeData {
                                kind: EdgeKind::Composition,
                                weight: 1,
                                names: vec![token.to_string()],
                                module: String::new(),
                            },
                        );
                    }
                }
            }
        }
    }

    let report = build_report(units, &graph, &externals);
    DependencyAnalysis {
        report,
        imported_names,
    }
}

#[derive(Clone, Debug)]
struct EdgeData {
    kind: EdgeKind,
    weight: u32,
    names: Vec<String>,
    module: String,
}

#[derive(Default)]
struct ExternalUse {
    import_count: u32,
    call_sites: u32,
}

enum Resolution {
    Internal(PathBuf),
    External(String),
}

fn type_tokens(type_tag: &str) -> impl Iterator<Item = &str> {
    type_tag
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
}

/// How often the names brought in by an import are referenced in the unit.
/// A whole-module import is checked through its binding name.
fn reference_count(unit: &SourceUnit, import: &Import) -> u32 {
    let names: Vec<String> = if import.names.is_empty() {
        vec![module_binding(&import.module)]
    } else {
        import.names.clone()
    };

    names
        .iter()
        .map(|n| unit.identifier_usage.get(n).copied().unwrap_or(0))
        .sum()
}

/// The identifier a whole-module import is referenced by.
fn module_binding(module: &str) -> String {
    module
        .rsplit(['.', '/', ':'])
        .find(|s| !s.is_empty())
        .unwrap_or(module)
        .to_string()
}

fn resolve_import(
    unit: &SourceUnit,
    import: &Import,
    index_of: &HashMap<PathBuf, NodeIndex>,
) -> Resolution {
    match unit.language {
        Language::Rust => resolve_rust(unit, import, index_of),
        Language::Python => resolve_python(unit, import, index_of),
        _ => resolve_ecmascript(unit, import, index_of),
    }
}

fn resolve_ecmascript(
    unit: &SourceUnit,
    import: &Import,
    index_of: &HashMap<PathBuf, NodeIndex>,
) -> Resolution {
    let module = &import.module;
    if module.starts_with('.') {
        let dir = unit.path.parent().unwrap_or(Path::new(""));
        let base = lexical_join(dir, Path::new(module));
        let candidates = [
            base.clone(),
            base.with_extension("js"),
            base.with_extension("jsx"),
            base.with_extension("ts"),
            base.with_extension("tsx"),
            base.join("index.js"),
            base.join("index.ts"),
        ];
        for candidate in candidates {
            if index_of.contains_key(&candidate) {
                return Resolution::Internal(candidate);
            }
        }
        // Unresolvable relative import still points inside the project;
        // treat as external under its raw specifier so it is visible.
        return Resolution::External(module.clone());
    }

    Resolution::External(package_of(module))
}

/// npm package name: first segment, or two for scoped packages.
fn package_of(module: &str) -> String {
    let mut parts = module.split('/');
    match parts.next() {
        Some(scope) if scope.starts_with('@') => match parts.next() {
            Some(name) => format!("{scope}/{name}"),
            None => scope.to_string(),
        },
        Some(first) => first.to_string(),
        None => module.to_string(),
    }
}

fn resolve_python(
    unit: &SourceUnit,
    import: &Import,
    index_of: &HashMap<PathBuf, NodeIndex>,
) -> Resolution {
    let module = &import.module;

    if let Some(stripped) = module.strip_prefix('.') {
        // One leading dot is the current package, each further dot one level up.
        let mut dir = unit.path.parent().unwrap_or(Path::new("")).to_path_buf();
        let mut rest = stripped;
        while let Some(more) = rest.strip_prefix('.') {
            dir = dir.parent().unwrap_or(Path::new("")).to_path_buf();
            rest = more;
        }
        let relative = rest.replace('.', "/");
        let base = if relative.is_empty() {
            dir
        } else {
            dir.join(relative)
        };
        for candidate in [base.with_extension("py"), base.join("__init__.py")] {
            if index_of.contains_key(&candidate) {
                return Resolution::Internal(candidate);
            }
        }
        return Resolution::External(module.clone());
    }

    let relative = module.replace('.', "/");
    if let Some(path) = suffix_match(index_of, &[format!("{relative}.py"), format!("{relative}/__init__.py")]) {
        return Resolution::Internal(path);
    }

    Resolution::External(
        module
            .split('.')
            .next()
            .unwrap_or(module)
            .to_string(),
    )
}

static RUST_BUILTIN_CRATES: &[&str] = &["std", "core", "alloc"];

fn resolve_rust(
    unit: &SourceUnit,
    import: &Import,
    index_of: &HashMap<PathBuf, NodeIndex>,
) -> Resolution {
    let module = &import.module;
    let segments: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();

    match segments.first() {
        Some(&"crate") => {
            let relative = segments[1..].join("/");
            match suffix_match(
                index_of,
                &[
                    format!("src/{relative}.rs"),
                    format!("src/{relative}/mod.rs"),
                ],
            ) {
                Some(path) => Resolution::Internal(path),
                None => Resolution::External(module.clone()),
            }
        }
        Some(&"super") => {
            let dir = unit.path.parent().unwrap_or(Path::new(""));
            let parent = dir.parent().unwrap_or(Path::new(""));
            let relative = segments[1..].join("/");
            let base = lexical_join(parent, Path::new(&relative));
            for candidate in [base.with_extension("rs"), base.join("mod.rs")] {
                if index_of.contains_key(&candidate) {
                    return Resolution::Internal(candidate);
                }
            }
            Resolution::External(module.clone())
        }
        Some(&"self") => {
            let dir = unit.path.parent().unwrap_or(Path::new(""));
            let relative = segments[1..].join("/");
            let base = lexical_join(dir, Path::new(&relative));
            for candidate in [base.with_extension("rs"), base.join("mod.rs")] {
                if index_of.contains_key(&candidate) {
                    return Resolution::Internal(candidate);
                }
            }
            Resolution::External(module.clone())
        }
        Some(first) if RUST_BUILTIN_CRATES.contains(first) => {
            Resolution::External(first.to_string())
        }
        Some(first) => Resolution::External(first.to_string()),
        None => Resolution::External(module.clone()),
    }
}

/// Smallest matching path, so ambiguous suffix matches resolve the same way
/// on every run.
fn suffix_match(index_of: &HashMap<PathBuf, NodeIndex>, suffixes: &[String]) -> Option<PathBuf> {
    let mut matches: Vec<&PathBuf> = index_of
        .keys()
        .filter(|path| suffixes.iter().any(|s| path.ends_with(s)))
        .collect();
    matches.sort();
    matches.first().map(|p| (*p).clone())
}

/// Join and normalize without touching the filesystem.
fn lexical_join(dir: &Path, relative: &Path) -> PathBuf {
    let mut parts: Vec<std::ffi::OsString> = dir
        .components()
        .map(|c| c.as_os_str().to_os_string())
        .collect();

    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            other => parts.push(other.as_os_str().to_os_string()),
        }
    }

    parts.iter().collect()
}

fn node_key(unit: &SourceUnit) -> String {
    unit.path.display().to_string().replace('\\', "/")
}

fn build_report(
    units: &[SourceUnit],
    graph: &DiGraph<usize, EdgeData>,
    externals: &BTreeMap<String, ExternalUse>,
) -> DependencyGraphReport {
    let key_of = |node: NodeIndex| node_key(&units[graph[node]]);

    let mut edges: Vec<DependencyEdge> = graph
        .edge_indices()
        .map(|e| {
            let (from, to) = graph.edge_endpoints(e).expect("edge endpoints");
            let data = &graph[e];
            DependencyEdge {
                from: key_of(from),
                to: key_of(to),
                kind: data.kind,
                weight: data.weight,
            }
        })
        .collect();
    edges.sort_by(|a, b| (&a.from, &a.to, a.kind as u8).cmp(&(&b.from, &b.to, b.kind as u8)));
    edges.dedup();

    // Cycles: every strongly-connected component larger than one node, plus
    // self-imports. Reported with the full node sequence; never auto-fixed.
    let mut cycles = Vec::new();
    for scc in petgraph::algo::tarjan_scc(graph) {
        let is_cycle = scc.len() > 1
            || scc
                .first()
                .map(|&n| graph.find_edge(n, n).is_some())
                .unwrap_or(false);
        if is_cycle {
            let mut nodes: Vec<String> = scc.iter().map(|&n| key_of(n)).collect();
            nodes.sort();
            cycles.push(DependencyCycle {
                nodes,
                suggestions: vec![
                    "Extract the shared definitions into a module both sides can depend on"
                        .to_string(),
                    "Invert one dependency behind an interface".to_string(),
                ],
            });
        }
    }
    cycles.sort_by(|a, b| a.nodes.cmp(&b.nodes));

    // Unused edges: import edges none of whose names are referenced in the
    // importing unit.
    let mut unused_edges = Vec::new();
    for e in graph.edge_indices() {
        let data = &graph[e];
        if data.kind != EdgeKind::Import {
            continue;
        }
        let (from, to) = graph.edge_endpoints(e).expect("edge endpoints");
        let unit = &units[graph[from]];
        let names: Vec<String> = if data.names.is_empty() {
            vec![module_binding(&data.module)]
        } else {
            data.names.clone()
        };
        let referenced: u32 = names
            .iter()
            .map(|n| unit.identifier_usage.get(n).copied().unwrap_or(0))
            .sum();
        if referenced == 0 {
            unused_edges.push(DependencyEdge {
                from: key_of(from),
                to: key_of(to),
                kind: data.kind,
                weight: data.weight,
            });
        }
    }
    unused_edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
    unused_edges.dedup();

    let external_packages = externals
        .iter()
        .map(|(name, usage)| ExternalPackage {
            name: name.clone(),
            import_count: usage.import_count,
            call_sites: usage.call_sites,
            safe_to_remove: usage.call_sites == 0,
        })
        .collect();

    let mut coupling: Vec<ModuleCoupling> = graph
        .node_indices()
        .map(|n| ModuleCoupling {
            module: key_of(n),
            fan_in: graph
                .neighbors_directed(n, petgraph::Direction::Incoming)
                .count(),
            fan_out: graph
                .neighbors_directed(n, petgraph::Direction::Outgoing)
                .count(),
        })
        .collect();
    coupling.sort_by(|a, b| a.module.cmp(&b.module));

    let mut nodes: Vec<String> = units.iter().map(node_key).collect();
    nodes.sort();

    DependencyGraphReport {
        nodes,
        edges,
        cycles,
        unused_edges,
        external_packages,
        coupling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::parse_source;
    use crate::core::SourceFile;

    fn unit_of(path: &str, content: &str) -> SourceUnit {
        parse_source(&SourceFile::new(path, content))
    }

    #[test]
    fn relative_js_imports_become_internal_edges() {
        let units = vec![
            unit_of(
                "src/app.js",
                "import { helper } from \"./util.js\";\nexport function run() { return helper(); }\n",
            ),
            unit_of("src/util.js", "export function helper() { return 1; }\n"),
        ];
        let analysis = analyze_dependencies(&units);
        assert_eq!(analysis.report.edges.len(), 1);
        assert_eq!(analysis.report.edges[0].from, "src/app.js");
        assert_eq!(analysis.report.edges[0].to, "src/util.js");
        assert!(analysis.report.cycles.is_empty());
        assert!(analysis.imported_names[Path::new("src/util.js")].contains("helper"));
    }

    #[test]
    fn import_cycle_is_reported_with_node_sequence() {
        let units = vec![
            unit_of("src/a.js", "import { b } from \"./b.js\";\nexport function a() { return b(); }\n"),
            unit_of("src/b.js", "import { a } from \"./a.js\";\nexport function b() { return a(); }\n"),
        ];
        let analysis = analyze_dependencies(&units);
        assert_eq!(analysis.report.cycles.len(), 1);
        let cycle = &analysis.report.cycles[0];
        assert_eq!(cycle.nodes, vec!["src/a.js", "src/b.js"]);
        assert!(!cycle.suggestions.is_empty());
    }

    #[test]
    fn unreferenced_import_is_an_unused_edge() {
        let units = vec![
            unit_of(
                "src/app.js",
                "import { helper } from \"./util.js\";\nexport function run() { return 2; }\n",
            ),
            unit_of("src/util.js", "export function helper() { return 1; }\n"),
        ];
        let analysis = analyze_dependencies(&units);
        assert_eq!(analysis.report.unused_edges.len(), 1);
    }

    #[test]
    fn external_package_safety_requires_zero_call_sites() {
        let units = vec![unit_of(
            "src/app.js",
            "import fs from \"fs-extra\";\nimport chalk from \"chalk\";\nexport function run() { return fs.readJson(\"x\"); }\n",
        )];
        let analysis = analyze_dependencies(&units);
        let fs_extra = analysis
            .report
            .external_packages
            .iter()
            .find(|p| p.name == "fs-extra")
            .unwrap();
        assert!(!fs_extra.safe_to_remove);
        let chalk = analysis
            .report
            .external_packages
            .iter()
            .find(|p| p.name == "chalk")
            .unwrap();
        assert!(chalk.safe_to_remove);
    }

    #[test]
    fn python_package_imports_resolve_by_suffix() {
        let units = vec![
            unit_of("pkg/app.py", "from pkg.util import helper\n\ndef run():\n    return helper()\n"),
            unit_of("pkg/util.py", "def helper():\n    return 1\n"),
        ];
        let analysis = analyze_dependencies(&units);
        assert_eq!(analysis.report.edges.len(), 1);
        assert_eq!(analysis.report.edges[0].to, "pkg/util.py");
    }
}
