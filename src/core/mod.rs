pub mod metrics;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    JavaScript,
    TypeScript,
    Python,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        static EXTENSION_MAP: &[(&[&str], Language)] = &[
            (&["rs"], Language::Rust),
            (&["js", "jsx", "mjs", "cjs"], Language::JavaScript),
            (&["ts", "tsx", "mts", "cts"], Language::TypeScript),
            (&["py"], Language::Python),
        ];

        EXTENSION_MAP
            .iter()
            .find(|(exts, _)| exts.contains(&ext))
            .map(|(_, lang)| *lang)
            .unwrap_or(Language::Unknown)
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Rust => "Rust",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Python => "Python",
            Language::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}

/// One file handed to the engine for a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
    pub language: Language,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        let language = Language::from_path(&path);
        Self {
            path,
            content: content.into(),
            language,
        }
    }
}

/// Location of a syntactic element. Usage sites reference locations, never
/// other symbols, so the model stays acyclic and serializable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceLocation {
    pub fn span(file: impl Into<PathBuf>, line: usize, end_line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column: 0,
            end_line,
            end_column: 0,
        }
    }

    pub fn point(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Variable,
    Interface,
    TypeAlias,
    Enum,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Crate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub location: SourceLocation,
    pub visibility: Visibility,
    pub exported: bool,
    /// Within-file reference sites, collected during parsing.
    pub usages: Vec<SourceLocation>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_tag: Option<String>,
    pub optional: bool,
    pub default: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectKind {
    /// Calls into I/O facilities (filesystem, network, console).
    Io,
    /// Mutation reaching outside the function's own locals.
    ExternalMutation,
    /// Assignment to a name not declared in the function.
    NonLocalAssignment,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SideEffect {
    pub kind: SideEffectKind,
    pub detail: String,
    pub line: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionModel {
    pub name: String,
    pub location: SourceLocation,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    /// 1 + decision points; never below 1.
    pub cyclomatic: u32,
    /// end line - start line + 1.
    pub length: usize,
    pub nesting: u32,
    pub calls: Vec<String>,
    pub is_recursive: bool,
    pub is_async: bool,
    /// True only when the side-effect list is empty.
    pub is_pure: bool,
    pub side_effects: Vec<SideEffect>,
}

impl FunctionModel {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            location,
            parameters: Vec::new(),
            return_type: None,
            cyclomatic: 1,
            length: 0,
            nesting: 0,
            calls: Vec::new(),
            is_recursive: false,
            is_async: false,
            is_pure: true,
            side_effects: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodModel {
    #[serde(flatten)]
    pub function: FunctionModel,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_override: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldModel {
    pub name: String,
    pub type_tag: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InheritanceSummary {
    pub depth: u32,
    pub children: Vec<String>,
    pub siblings: Vec<String>,
    pub is_leaf: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassModel {
    pub name: String,
    pub location: SourceLocation,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodModel>,
    pub fields: Vec<FieldModel>,
    /// 0-100; share of methods touching the class's own fields.
    pub cohesion: u8,
    /// 0-100; scaled count of distinct external call receivers.
    pub coupling: u8,
    pub inheritance: InheritanceSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Import {
    /// Module specifier as written in source.
    pub module: String,
    /// Imported names; empty means a whole-module or default import.
    pub names: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Export {
    pub name: String,
    pub kind: SymbolKind,
    pub location: SourceLocation,
}

/// A line retained for clone matching: trimmed, comment lines dropped,
/// original line number preserved.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NormalizedLine {
    pub line: usize,
    pub text: String,
}

/// One file's structural model. Immutable once produced; owned by the
/// analysis run that created it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub language: Language,
    pub lines: usize,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub functions: Vec<FunctionModel>,
    pub classes: Vec<ClassModel>,
    /// Findings raised while parsing (syntax errors, markers).
    pub findings: Vec<Finding>,
    /// Identifier occurrence counts outside import statements, for
    /// unused-import and dead-export cross-referencing.
    pub identifier_usage: BTreeMap<String, u32>,
    /// Normalized lines for the duplication detector.
    pub normalized_lines: Vec<NormalizedLine>,
}

impl SourceUnit {
    pub fn empty(path: impl Into<PathBuf>, language: Language) -> Self {
        Self {
            path: path.into(),
            language,
            lines: 0,
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            findings: Vec::new(),
            identifier_usage: BTreeMap::new(),
            normalized_lines: Vec::new(),
        }
    }

    /// All functions, free and methods, in declaration order.
    pub fn all_functions(&self) -> impl Iterator<Item = &FunctionModel> {
        self.functions.iter().chain(
            self.classes
                .iter()
                .flat_map(|c| c.methods.iter().map(|m| &m.function)),
        )
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Syntax,
    LongMethod,
    LargeClass,
    DeadCode,
    Duplication,
    ComplexityHotspot,
    DeepNesting,
    LongParameterList,
    CircularDependency,
    UnusedDependency,
    Marker,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Syntax => "syntax",
            FindingKind::LongMethod => "long_method",
            FindingKind::LargeClass => "large_class",
            FindingKind::DeadCode => "dead_code",
            FindingKind::Duplication => "duplication",
            FindingKind::ComplexityHotspot => "complexity_hotspot",
            FindingKind::DeepNesting => "deep_nesting",
            FindingKind::LongParameterList => "long_parameter_list",
            FindingKind::CircularDependency => "circular_dependency",
            FindingKind::UnusedDependency => "unused_dependency",
            FindingKind::Marker => "marker",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Major,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Major => "major",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
    pub auto_fixable: bool,
    pub suggested: Vec<RefactoringType>,
    /// Human-readable remediation hints.
    pub advice: Vec<String>,
    pub effort_minutes: u32,
}

/// Closed set of refactoring kinds the planner dispatches over. Adding a
/// kind is a compile-time change: the planner match is exhaustive.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RefactoringType {
    ExtractMethod,
    ExtractClass,
    ReduceComplexity,
    RemoveDeadCode,
    EliminateDuplication,
    SimplifyConditionals,
    Modernize,
    OrganizeImports,
}

impl RefactoringType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefactoringType::ExtractMethod => "extract_method",
            RefactoringType::ExtractClass => "extract_class",
            RefactoringType::ReduceComplexity => "reduce_complexity",
            RefactoringType::RemoveDeadCode => "remove_dead_code",
            RefactoringType::EliminateDuplication => "eliminate_duplication",
            RefactoringType::SimplifyConditionals => "simplify_conditionals",
            RefactoringType::Modernize => "modernize",
            RefactoringType::OrganizeImports => "organize_imports",
        }
    }
}

impl std::fmt::Display for RefactoringType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    Symbol,
    Method,
    Class,
    File,
    Module,
    Project,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestionScope {
    pub level: ScopeLevel,
    /// Symbol/method/class names targeted, when narrower than a file.
    pub targets: Vec<String>,
    pub files: Vec<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefactoringSuggestion {
    pub id: String,
    pub refactoring: RefactoringType,
    pub scope: SuggestionScope,
    pub benefits: Vec<String>,
    pub risks: Vec<String>,
    pub effort: EffortLevel,
    /// 1-10.
    pub priority: u8,
    pub affected_files: Vec<PathBuf>,
    pub estimated_minutes: u32,
    /// 0-100.
    pub confidence: u8,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveCategory {
    Maintainability,
    Performance,
    Readability,
    Testability,
    Modernization,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricTarget {
    pub name: String,
    pub current: Option<f64>,
    pub target: f64,
}

/// Caller-supplied objective steering suggestion ranking and planning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefactoringObjective {
    pub category: ObjectiveCategory,
    pub target_kinds: Vec<RefactoringType>,
    /// 1-10.
    pub priority: u8,
    pub metric_target: Option<MetricTarget>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Modify,
    Delete,
    Create,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileChange {
    pub change: ChangeType,
    pub file: PathBuf,
    pub span: Option<LineSpan>,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Syntax,
    Types,
    Behavior,
    Performance,
    Security,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefactoringStep {
    pub id: String,
    pub refactoring: RefactoringType,
    pub description: String,
    pub target_files: Vec<PathBuf>,
    pub changes: Vec<FileChange>,
    /// Ids of steps in the same plan that must complete first.
    pub depends_on: Vec<String>,
    pub risk: RiskLevel,
    pub automated: bool,
    pub required_checks: Vec<ValidationKind>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub factors: Vec<String>,
    pub mitigations: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub strategy: String,
    pub capture_preimages: bool,
    pub steps: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationPlan {
    pub checks: Vec<ValidationKind>,
    pub description: String,
}

/// An ordered, dependency-resolved execution plan. Immutable once produced;
/// re-planning creates a new plan id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefactoringPlan {
    pub id: String,
    pub steps: Vec<RefactoringStep>,
    pub risk: RiskAssessment,
    pub estimated_minutes: u32,
    pub rollback: RollbackPlan,
    pub validation: ValidationPlan,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StepMetrics {
    pub lines_changed: usize,
    pub files_touched: usize,
    pub complexity_delta: i64,
    pub duplication_delta: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub changes: Vec<FileChange>,
    pub issues: Vec<String>,
    pub metrics: StepMetrics,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total_loc: usize,
    pub function_count: usize,
    pub total_complexity: u64,
    pub average_complexity: f64,
    pub maintainability: f64,
    pub duplicate_blocks: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsDelta {
    pub loc: i64,
    pub complexity: i64,
    pub maintainability: f64,
    pub duplicate_blocks: i64,
}

impl MetricsDelta {
    pub fn between(before: &MetricsSnapshot, after: &MetricsSnapshot) -> Self {
        Self {
            loc: after.total_loc as i64 - before.total_loc as i64,
            complexity: after.total_complexity as i64 - before.total_complexity as i64,
            maintainability: after.maintainability - before.maintainability,
            duplicate_blocks: after.duplicate_blocks as i64 - before.duplicate_blocks as i64,
        }
    }
}

/// Captured pre-execution content of one touched file. `existed: false`
/// marks a file the execution created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilePreimage {
    pub file: PathBuf,
    pub existed: bool,
    pub content: String,
}

/// Self-contained rollback data: restoring the preimages reconstructs the
/// pre-execution state of every touched file without re-running analysis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RollbackInfo {
    pub available: bool,
    pub preimages: Vec<FilePreimage>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefactoringResult {
    pub id: String,
    pub plan_id: String,
    pub status: ExecutionStatus,
    pub executed_steps: Vec<StepOutcome>,
    pub changes: Vec<FileChange>,
    pub before: MetricsSnapshot,
    pub after: MetricsSnapshot,
    pub delta: MetricsDelta,
    pub issues: Vec<String>,
    pub rollback: RollbackInfo,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub kind: ValidationKind,
    pub status: CheckStatus,
    pub message: String,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricPair {
    pub name: String,
    pub before: f64,
    pub after: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PerformanceComparison {
    pub pairs: Vec<MetricPair>,
    pub significant: bool,
}

/// Test outcomes supplied by the caller; the engine does not run test suites.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestEvidence {
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub coverage_before: Option<f64>,
    pub coverage_after: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BehaviorComparison {
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub coverage_delta: Option<f64>,
    pub behavior_preserved: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub checks: Vec<CheckOutcome>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub performance: PerformanceComparison,
    pub behavior: BehaviorComparison,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CloneKind {
    Exact,
    Structural,
    Semantic,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct DuplicateLocation {
    pub file: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DuplicateBlock {
    pub hash: String,
    pub lines: usize,
    /// 0-100.
    pub similarity: u8,
    pub classification: CloneKind,
    pub extractable: bool,
    pub locations: Vec<DuplicateLocation>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Import,
    Inheritance,
    Composition,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub weight: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DependencyCycle {
    pub nodes: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExternalPackage {
    pub name: String,
    pub import_count: u32,
    pub call_sites: u32,
    /// True only when zero call sites resolve to the package within the
    /// analyzed unit set.
    pub safe_to_remove: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleCoupling {
    pub module: String,
    pub fan_in: usize,
    pub fan_out: usize,
}

/// Serializable view of the cross-file dependency graph. Built once, after
/// every per-file model is complete.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DependencyGraphReport {
    pub nodes: Vec<String>,
    pub edges: Vec<DependencyEdge>,
    pub cycles: Vec<DependencyCycle>,
    pub unused_edges: Vec<DependencyEdge>,
    pub external_packages: Vec<ExternalPackage>,
    pub coupling: Vec<ModuleCoupling>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileMetricsReport {
    pub path: PathBuf,
    pub language: Language,
    pub loc: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub average_complexity: f64,
    pub max_complexity: u32,
    pub maintainability: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub total_loc: usize,
    pub total_functions: usize,
    pub total_classes: usize,
    pub total_complexity: u64,
    pub average_complexity: f64,
    pub max_complexity: u32,
    /// Mean maintainability index across files.
    pub maintainability: f64,
    /// Rough heuristic: total complexity times a configurable factor.
    pub debt_hours: f64,
    pub files: Vec<FileMetricsReport>,
}

/// The aggregate output of an analysis run, consumed by reporting,
/// suggestion generation and planning. Immutable value; a re-run produces a
/// new one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeAnalysis {
    pub root: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub units: Vec<SourceUnit>,
    pub metrics: ProjectMetrics,
    pub findings: Vec<Finding>,
    pub duplications: Vec<DuplicateBlock>,
    pub graph: DependencyGraphReport,
}

impl CodeAnalysis {
    pub fn unit(&self, path: &Path) -> Option<&SourceUnit> {
        self.units.iter().find(|u| u.path == path)
    }

    pub fn function_at(&self, file: &Path, line: usize) -> Option<&FunctionModel> {
        self.unit(file)?
            .all_functions()
            .find(|f| f.location.line == line)
    }
}
