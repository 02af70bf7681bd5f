use crate::analyzers::{normalize_lines, scan_markers, syntax_finding, SourceParser};
use crate::core::{
    ClassModel, Export, FieldModel, FunctionModel, Import, InheritanceSummary, Language,
    MethodModel, Parameter, SideEffect, SideEffectKind, SourceFile, SourceLocation, SourceUnit,
    Symbol, SymbolKind, Visibility,
};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Everything the generic walker needs to know about one grammar.
struct LanguageSpec {
    grammar: fn() -> tree_sitter::Language,
    function_kinds: &'static [&'static str],
    class_kinds: &'static [&'static str],
    /// Node kinds that add one decision point each.
    decision_kinds: &'static [&'static str],
    nesting_kinds: &'static [&'static str],
    import_kinds: &'static [&'static str],
    call_kinds: &'static [&'static str],
    comment_prefixes: &'static [&'static str],
    /// Call-site markers classed as I/O. A trailing dot matches a namespace
    /// prefix; a bare name matches exactly.
    io_markers: &'static [&'static str],
    /// Short-circuit operators counted as decision points (empty when the
    /// grammar exposes a dedicated node kind instead).
    logical_operators: &'static [&'static str],
}

static JAVASCRIPT_SPEC: LanguageSpec = LanguageSpec {
    grammar: || tree_sitter_javascript::LANGUAGE.into(),
    function_kinds: &[
        "function_declaration",
        "function_expression",
        "arrow_function",
        "generator_function_declaration",
    ],
    class_kinds: &["class_declaration", "class"],
    decision_kinds: &[
        "if_statement",
        "ternary_expression",
        "switch_case",
        "while_statement",
        "do_statement",
        "for_statement",
        "for_in_statement",
        "catch_clause",
    ],
    nesting_kinds: &[
        "if_statement",
        "while_statement",
        "do_statement",
        "for_statement",
        "for_in_statement",
        "switch_statement",
        "try_statement",
    ],
    import_kinds: &["import_statement"],
    call_kinds: &["call_expression", "new_expression"],
    comment_prefixes: &["//", "/*", "*"],
    io_markers: &[
        "console.",
        "process.",
        "fs.",
        "fetch",
        "require",
        "XMLHttpRequest",
        "localStorage.",
        "sessionStorage.",
        "document.",
        "window.",
    ],
    logical_operators: &["&&", "||", "??"],
};

static TYPESCRIPT_SPEC: LanguageSpec = LanguageSpec {
    grammar: || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    function_kinds: &[
        "function_declaration",
        "function_expression",
        "arrow_function",
        "generator_function_declaration",
    ],
    class_kinds: &["class_declaration", "class"],
    decision_kinds: &[
        "if_statement",
        "ternary_expression",
        "switch_case",
        "while_statement",
        "do_statement",
        "for_statement",
        "for_in_statement",
        "catch_clause",
    ],
    nesting_kinds: &[
        "if_statement",
        "while_statement",
        "do_statement",
        "for_statement",
        "for_in_statement",
        "switch_statement",
        "try_statement",
    ],
    import_kinds: &["import_statement"],
    call_kinds: &["call_expression", "new_expression"],
    comment_prefixes: &["//", "/*", "*"],
    io_markers: &[
        "console.",
        "process.",
        "fs.",
        "fetch",
        "require",
        "XMLHttpRequest",
        "localStorage.",
        "sessionStorage.",
        "document.",
        "window.",
    ],
    logical_operators: &["&&", "||", "??"],
};

static PYTHON_SPEC: LanguageSpec = LanguageSpec {
    grammar: || tree_sitter_python::LANGUAGE.into(),
    function_kinds: &["function_definition"],
    class_kinds: &["class_definition"],
    decision_kinds: &[
        "if_statement",
        "elif_clause",
        "conditional_expression",
        "for_statement",
        "while_statement",
        "except_clause",
        "case_clause",
        "boolean_operator",
    ],
    nesting_kinds: &[
        "if_statement",
        "for_statement",
        "while_statement",
        "try_statement",
        "match_statement",
        "with_statement",
    ],
    import_kinds: &["import_statement", "import_from_statement"],
    call_kinds: &["call"],
    comment_prefixes: &["#"],
    io_markers: &[
        "print",
        "open",
        "input",
        "os.",
        "sys.",
        "subprocess.",
        "shutil.",
        "requests.",
        "logging.",
    ],
    logical_operators: &[],
};

pub struct TreeSitterParser {
    language: Language,
    spec: &'static LanguageSpec,
}

impl TreeSitterParser {
    pub fn javascript() -> Self {
        Self {
            language: Language::JavaScript,
            spec: &JAVASCRIPT_SPEC,
        }
    }

    pub fn typescript() -> Self {
        Self {
            language: Language::TypeScript,
            spec: &TYPESCRIPT_SPEC,
        }
    }

    pub fn python() -> Self {
        Self {
            language: Language::Python,
            spec: &PYTHON_SPEC,
        }
    }
}

impl SourceParser for TreeSitterParser {
    fn parse(&self, file: &SourceFile) -> SourceUnit {
        let mut unit = SourceUnit::empty(file.path.clone(), self.language);
        unit.lines = file.content.lines().count();
        unit.findings = scan_markers(&file.content, &file.path);
        unit.normalized_lines = normalize_lines(&file.content, self.spec.comment_prefixes);

        let mut parser = Parser::new();
        if parser.set_language(&(self.spec.grammar)()).is_err() {
            unit.findings.push(syntax_finding(
                &file.path,
                1,
                "grammar initialization failed".to_string(),
            ));
            return unit;
        }

        let Some(tree) = parser.parse(&file.content, None) else {
            unit.findings
                .push(syntax_finding(&file.path, 1, "parse returned no tree".to_string()));
            return unit;
        };

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(1);
            unit.findings.push(syntax_finding(
                &file.path,
                line,
                "syntax error".to_string(),
            ));
        }

        let builder = UnitBuilder {
            spec: self.spec,
            language: self.language,
            source: &file.content,
            path: &file.path,
        };
        builder.build(root, &mut unit);
        unit
    }

    fn language(&self) -> Language {
        self.language
    }
}

fn first_error_line(root: Node) -> Option<usize> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        for child in node.children(&mut node.walk()) {
            if child.has_error() {
                stack.push(child);
            }
        }
    }
    None
}

struct UnitBuilder<'s> {
    spec: &'static LanguageSpec,
    language: Language,
    source: &'s str,
    path: &'s Path,
}

impl<'s> UnitBuilder<'s> {
    fn text(&self, node: Node) -> &'s str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn location(&self, node: Node) -> SourceLocation {
        SourceLocation {
            file: self.path.to_path_buf(),
            line: node.start_position().row + 1,
            column: node.start_position().column,
            end_line: node.end_position().row + 1,
            end_column: node.end_position().column,
        }
    }

    fn build(&self, root: Node, unit: &mut SourceUnit) {
        self.walk_top(root, unit, true);
        self.link_inheritance(unit);
        self.collect_exports(root, unit);
        self.collect_identifier_usage(root, unit);
        self.attach_symbol_usages(root, unit);
    }

    /// Top-down walk collecting functions, classes, imports and top-level
    /// symbols. Class bodies are consumed by the class builder.
    fn walk_top(&self, node: Node, unit: &mut SourceUnit, top_level: bool) {
        for child in node.children(&mut node.walk()) {
            let kind = child.kind();
            if self.spec.import_kinds.contains(&kind) {
                unit.imports.extend(self.build_imports(child));
            } else if self.spec.class_kinds.contains(&kind) {
                let class = self.build_class(child);
                if top_level {
                    unit.symbols.push(Symbol {
                        name: class.name.clone(),
                        kind: SymbolKind::Class,
                        location: class.location.clone(),
                        visibility: self.default_visibility(&class.name),
                        exported: false,
                        usages: Vec::new(),
                    });
                }
                unit.classes.push(class);
            } else if self.spec.function_kinds.contains(&kind) {
                let func = self.build_function(child);
                if top_level {
                    unit.symbols.push(Symbol {
                        name: func.name.clone(),
                        kind: SymbolKind::Function,
                        location: func.location.clone(),
                        visibility: self.default_visibility(&func.name),
                        exported: false,
                        usages: Vec::new(),
                    });
                }
                unit.functions.push(func);
            } else {
                if top_level {
                    self.collect_declarations(child, unit);
                }
                let next_top = top_level
                    && matches!(
                        kind,
                        "export_statement"
                            | "expression_statement"
                            | "decorated_definition"
                            | "program"
                    );
                self.walk_top(child, unit, next_top);
            }
        }
    }

    fn default_visibility(&self, name: &str) -> Visibility {
        if self.language == Language::Python && name.starts_with('_') {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    /// Top-level variable, interface, type and enum declarations.
    fn collect_declarations(&self, node: Node, unit: &mut SourceUnit) {
        match node.kind() {
            "lexical_declaration" | "variable_declaration" => {
                for declarator in node.named_children(&mut node.walk()) {
                    if declarator.kind() == "variable_declarator" {
                        if let Some(name) = declarator.child_by_field_name("name") {
                            // Arrow functions bound to a name are functions.
                            let value_is_fn = declarator
                                .child_by_field_name("value")
                                .map(|v| self.spec.function_kinds.contains(&v.kind()))
                                .unwrap_or(false);
                            let kind = if value_is_fn {
                                SymbolKind::Function
                            } else {
                                SymbolKind::Variable
                            };
                            unit.symbols.push(Symbol {
                                name: self.text(name).to_string(),
                                kind,
                                location: self.location(declarator),
                                visibility: Visibility::Public,
                                exported: false,
                                usages: Vec::new(),
                            });
                        }
                    }
                }
            }
            "interface_declaration" => self.push_named_symbol(node, SymbolKind::Interface, unit),
            "type_alias_declaration" => self.push_named_symbol(node, SymbolKind::TypeAlias, unit),
            "enum_declaration" => self.push_named_symbol(node, SymbolKind::Enum, unit),
            "assignment" if self.language == Language::Python => {
                if let Some(left) = node.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        let name = self.text(left).to_string();
                        unit.symbols.push(Symbol {
                            visibility: self.default_visibility(&name),
                            name,
                            kind: SymbolKind::Variable,
                            location: self.location(node),
                            exported: false,
                            usages: Vec::new(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn push_named_symbol(&self, node: Node, kind: SymbolKind, unit: &mut SourceUnit) {
        if let Some(name) = node.child_by_field_name("name") {
            unit.symbols.push(Symbol {
                name: self.text(name).to_string(),
                kind,
                location: self.location(node),
                visibility: Visibility::Public,
                exported: false,
                usages: Vec::new(),
            });
        }
    }

    fn build_function(&self, node: Node) -> FunctionModel {
        let mut func = FunctionModel::new(self.function_name(node), self.location(node));

        if let Some(params) = node.child_by_field_name("parameters") {
            func.parameters = self.build_parameters(params);
        }
        func.return_type = node
            .child_by_field_name("return_type")
            .map(|n| self.text(n).trim_start_matches(':').trim().to_string());
        func.is_async = node
            .children(&mut node.walk())
            .any(|c| c.kind() == "async");
        func.cyclomatic = 1 + self.count_decisions(body_of(node).unwrap_or(node));
        func.nesting = self.max_nesting(body_of(node).unwrap_or(node), 0);
        func.length = func.location.end_line - func.location.line + 1;
        func.calls = self.collect_calls(node);
        func.is_recursive = func.calls.iter().any(|c| *c == func.name);
        func.side_effects = self.detect_side_effects(node);
        func.is_pure = func.side_effects.is_empty();
        func
    }

    fn function_name(&self, node: Node) -> String {
        if let Some(name) = node.child_by_field_name("name") {
            return self.text(name).to_string();
        }

        // Arrow functions and function expressions take the name they are
        // bound to.
        if let Some(parent) = node.parent() {
            if parent.kind() == "variable_declarator" || parent.kind() == "pair" {
                if let Some(name) = parent
                    .child_by_field_name("name")
                    .or_else(|| parent.child_by_field_name("key"))
                {
                    return self.text(name).to_string();
                }
            }
            if parent.kind() == "assignment_expression" {
                if let Some(left) = parent.child_by_field_name("left") {
                    return self.text(left).to_string();
                }
            }
        }

        "<anonymous>".to_string()
    }

    fn build_parameters(&self, params: Node) -> Vec<Parameter> {
        params
            .named_children(&mut params.walk())
            .filter_map(|p| self.build_parameter(p))
            .collect()
    }

    fn build_parameter(&self, node: Node) -> Option<Parameter> {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                if name == "self" || name == "cls" {
                    return None;
                }
                Some(Parameter {
                    name: name.to_string(),
                    type_tag: None,
                    optional: false,
                    default: None,
                })
            }
            "assignment_pattern" | "default_parameter" => Some(Parameter {
                name: node
                    .child_by_field_name("left")
                    .or_else(|| node.child_by_field_name("name"))
                    .map(|n| self.text(n).to_string())?,
                type_tag: None,
                optional: true,
                default: node
                    .child_by_field_name("right")
                    .or_else(|| node.child_by_field_name("value"))
                    .map(|n| self.text(n).to_string()),
            }),
            "typed_parameter" => Some(Parameter {
                name: node
                    .named_child(0)
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default(),
                type_tag: node
                    .child_by_field_name("type")
                    .map(|n| self.text(n).to_string()),
                optional: false,
                default: None,
            }),
            "typed_default_parameter" => Some(Parameter {
                name: node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())?,
                type_tag: node
                    .child_by_field_name("type")
                    .map(|n| self.text(n).to_string()),
                optional: true,
                default: node
                    .child_by_field_name("value")
                    .map(|n| self.text(n).to_string()),
            }),
            "required_parameter" | "optional_parameter" => Some(Parameter {
                name: node
                    .child_by_field_name("pattern")
                    .map(|n| self.text(n).to_string())?,
                type_tag: node
                    .child_by_field_name("type")
                    .map(|n| self.text(n).trim_start_matches(':').trim().to_string()),
                optional: node.kind() == "optional_parameter",
                default: node
                    .child_by_field_name("value")
                    .map(|n| self.text(n).to_string()),
            }),
            "rest_pattern" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                first_descendant(node, "identifier").map(|id| Parameter {
                    name: self.text(id).to_string(),
                    type_tag: None,
                    optional: true,
                    default: None,
                })
            }
            _ => None,
        }
    }

    fn count_decisions(&self, node: Node) -> u32 {
        let mut count = 0;
        let kind = node.kind();
        if self.spec.decision_kinds.contains(&kind) {
            count += 1;
        } else if kind == "binary_expression" && !self.spec.logical_operators.is_empty() {
            if let Some(op) = node.child_by_field_name("operator") {
                if self.spec.logical_operators.contains(&self.text(op)) {
                    count += 1;
                }
            }
        }

        for child in node.children(&mut node.walk()) {
            // Nested functions are measured separately.
            if !self.spec.function_kinds.contains(&child.kind()) {
                count += self.count_decisions(child);
            }
        }
        count
    }

    fn max_nesting(&self, node: Node, depth: u32) -> u32 {
        let next = if self.spec.nesting_kinds.contains(&node.kind()) {
            depth + 1
        } else {
            depth
        };

        let mut max = next;
        for child in node.children(&mut node.walk()) {
            if !self.spec.function_kinds.contains(&child.kind()) {
                max = max.max(self.max_nesting(child, next));
            }
        }
        max
    }

    fn collect_calls(&self, node: Node) -> Vec<String> {
        let mut calls = Vec::new();
        self.walk_calls(node, &mut calls);
        calls
    }

    fn walk_calls(&self, node: Node, calls: &mut Vec<String>) {
        if self.spec.call_kinds.contains(&node.kind()) {
            if let Some(callee) = node
                .child_by_field_name("function")
                .or_else(|| node.child_by_field_name("constructor"))
            {
                let text = self.text(callee);
                let last = text.rsplit('.').next().unwrap_or(text);
                calls.push(last.to_string());
            }
        }
        for child in node.children(&mut node.walk()) {
            self.walk_calls(child, calls);
        }
    }

    fn callee_text(&self, node: Node) -> Option<&'s str> {
        node.child_by_field_name("function")
            .or_else(|| node.child_by_field_name("constructor"))
            .map(|c| self.text(c))
    }

    fn is_io_call(&self, callee: &str) -> bool {
        self.spec.io_markers.iter().any(|marker| {
            if marker.ends_with('.') {
                callee.starts_with(marker)
            } else {
                callee == *marker
            }
        })
    }

    fn detect_side_effects(&self, func: Node) -> Vec<SideEffect> {
        let locals = self.collect_locals(func);
        let globals = self.collect_global_declarations(func);
        let mut effects = Vec::new();
        self.walk_effects(func, &locals, &globals, &mut effects);
        effects
    }

    /// Parameter names plus locally-declared bindings.
    fn collect_locals(&self, func: Node) -> HashSet<String> {
        let mut locals = HashSet::new();
        let mut stack = vec![func];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "variable_declarator" => {
                    if let Some(name) = node.child_by_field_name("name") {
                        locals.insert(self.text(name).to_string());
                    }
                }
                // Python assignment to a bare name declares a local.
                "assignment" | "augmented_assignment" if self.language == Language::Python => {
                    if let Some(left) = node.child_by_field_name("left") {
                        if left.kind() == "identifier" {
                            locals.insert(self.text(left).to_string());
                        }
                    }
                }
                "identifier" => {
                    if let Some(parent) = node.parent() {
                        if parent.kind().contains("parameter") || parent.kind() == "formal_parameters"
                        {
                            locals.insert(self.text(node).to_string());
                        }
                    }
                }
                _ => {}
            }
            for child in node.children(&mut node.walk()) {
                stack.push(child);
            }
        }
        locals
    }

    fn collect_global_declarations(&self, func: Node) -> HashSet<String> {
        let mut globals = HashSet::new();
        let mut stack = vec![func];
        while let Some(node) = stack.pop() {
            if node.kind() == "global_statement" || node.kind() == "nonlocal_statement" {
                for child in node.named_children(&mut node.walk()) {
                    globals.insert(self.text(child).to_string());
                }
            }
            for child in node.children(&mut node.walk()) {
                stack.push(child);
            }
        }
        globals
    }

    fn walk_effects(
        &self,
        node: Node,
        locals: &HashSet<String>,
        globals: &HashSet<String>,
        effects: &mut Vec<SideEffect>,
    ) {
        let line = node.start_position().row + 1;

        if self.spec.call_kinds.contains(&node.kind()) {
            if let Some(callee) = self.callee_text(node) {
                if self.is_io_call(callee) {
                    effects.push(SideEffect {
                        kind: SideEffectKind::Io,
                        detail: callee.to_string(),
                        line,
                    });
                }
            }
        }

        match node.kind() {
            "assignment_expression"
            | "augmented_assignment_expression"
            | "assignment"
            | "augmented_assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    match left.kind() {
                        "identifier" => {
                            let name = self.text(left).to_string();
                            let non_local = if self.language == Language::Python {
                                globals.contains(&name)
                            } else {
                                !locals.contains(&name)
                            };
                            if non_local {
                                effects.push(SideEffect {
                                    kind: SideEffectKind::NonLocalAssignment,
                                    detail: name,
                                    line,
                                });
                            }
                        }
                        "member_expression" | "attribute" | "subscript_expression" | "subscript" => {
                            effects.push(SideEffect {
                                kind: SideEffectKind::ExternalMutation,
                                detail: self.text(left).to_string(),
                                line,
                            });
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            if !self.spec.function_kinds.contains(&child.kind()) {
                self.walk_effects(child, locals, globals, effects);
            }
        }
    }

    fn build_class(&self, node: Node) -> ClassModel {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_else(|| "<anonymous>".to_string());

        let (superclass, interfaces) = self.class_heritage(node);

        let body = node.child_by_field_name("body");
        let mut methods = Vec::new();
        let mut fields = Vec::new();
        let mut touching = 0usize;
        if let Some(body) = body {
            self.walk_class_body(body, &mut methods, &mut fields, &mut touching);
        }

        let cohesion = if methods.is_empty() {
            100
        } else {
            ((touching * 100) / methods.len()).min(100) as u8
        };

        let receivers: HashSet<&String> = methods
            .iter()
            .flat_map(|m| m.function.calls.iter())
            .collect();
        let coupling = ((receivers.len() * 5).min(100)) as u8;

        ClassModel {
            name,
            location: self.location(node),
            superclass,
            interfaces,
            methods,
            fields,
            cohesion,
            coupling,
            inheritance: InheritanceSummary::default(),
        }
    }

    fn class_heritage(&self, node: Node) -> (Option<String>, Vec<String>) {
        let mut superclass = None;
        let mut interfaces = Vec::new();

        // Python: class C(Base, Proto): ...
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut names = superclasses
                .named_children(&mut superclasses.walk())
                .map(|c| self.text(c).to_string())
                .collect::<Vec<_>>();
            if !names.is_empty() {
                superclass = Some(names.remove(0));
                interfaces = names;
            }
            return (superclass, interfaces);
        }

        // JS/TS: class C extends Base implements I { ... }
        for child in node.children(&mut node.walk()) {
            if child.kind() == "class_heritage" {
                for clause in child.children(&mut child.walk()) {
                    match clause.kind() {
                        "extends_clause" => {
                            if let Some(value) = clause.named_child(0) {
                                superclass = Some(self.text(value).to_string());
                            }
                        }
                        "implements_clause" => {
                            for ty in clause.named_children(&mut clause.walk()) {
                                interfaces.push(self.text(ty).to_string());
                            }
                        }
                        "identifier" | "member_expression" => {
                            superclass = Some(self.text(clause).to_string());
                        }
                        _ => {}
                    }
                }
            }
        }
        (superclass, interfaces)
    }

    fn walk_class_body(
        &self,
        body: Node,
        methods: &mut Vec<MethodModel>,
        fields: &mut Vec<FieldModel>,
        touching: &mut usize,
    ) {
        for child in body.named_children(&mut body.walk()) {
            match child.kind() {
                "method_definition" | "function_definition" => {
                    if self.reads_instance_state(child) {
                        *touching += 1;
                    }
                    methods.push(self.build_method(child));
                }
                "field_definition" | "public_field_definition" | "property_definition" => {
                    if let Some(name) = child
                        .child_by_field_name("name")
                        .or_else(|| child.child_by_field_name("property"))
                    {
                        fields.push(FieldModel {
                            name: self.text(name).to_string(),
                            type_tag: child
                                .child_by_field_name("type")
                                .map(|n| self.text(n).trim_start_matches(':').trim().to_string()),
                            visibility: self.member_visibility(child, self.text(name)),
                            is_static: self.has_keyword(child, "static"),
                        });
                    }
                }
                // Python class-level assignment.
                "expression_statement" => {
                    if let Some(assignment) = child.named_child(0) {
                        if assignment.kind() == "assignment" {
                            if let Some(left) = assignment.child_by_field_name("left") {
                                if left.kind() == "identifier" {
                                    let name = self.text(left).to_string();
                                    fields.push(FieldModel {
                                        visibility: self.default_visibility(&name),
                                        name,
                                        type_tag: assignment
                                            .child_by_field_name("type")
                                            .map(|n| self.text(n).to_string()),
                                        is_static: true,
                                    });
                                }
                            }
                        }
                    }
                }
                // Decorated python methods wrap the function definition.
                "decorated_definition" => {
                    if let Some(def) = child.child_by_field_name("definition") {
                        if def.kind() == "function_definition" {
                            if self.reads_instance_state(def) {
                                *touching += 1;
                            }
                            methods.push(self.build_method(def));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn build_method(&self, node: Node) -> MethodModel {
        let function = self.build_function(node);
        let visibility = self.member_visibility(node, &function.name);
        MethodModel {
            is_static: self.has_keyword(node, "static"),
            is_abstract: self.has_keyword(node, "abstract"),
            is_override: self.has_keyword(node, "override"),
            function,
            visibility,
        }
    }

    fn member_visibility(&self, node: Node, name: &str) -> Visibility {
        if name.starts_with('#') {
            return Visibility::Private;
        }
        if self.language == Language::Python {
            return self.default_visibility(name);
        }
        for child in node.children(&mut node.walk()) {
            if child.kind() == "accessibility_modifier" {
                return match self.text(child) {
                    "private" => Visibility::Private,
                    "protected" => Visibility::Protected,
                    _ => Visibility::Public,
                };
            }
        }
        Visibility::Public
    }

    fn has_keyword(&self, node: Node, keyword: &str) -> bool {
        node.children(&mut node.walk())
            .any(|c| c.kind() == keyword)
    }

    /// Whether a method body reads or writes `this`/`self` state.
    fn reads_instance_state(&self, method: Node) -> bool {
        let mut stack = vec![method];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "member_expression" => {
                    if let Some(object) = node.child_by_field_name("object") {
                        if self.text(object) == "this" {
                            return true;
                        }
                    }
                }
                "attribute" => {
                    if let Some(object) = node.child_by_field_name("object") {
                        if self.text(object) == "self" {
                            return true;
                        }
                    }
                }
                _ => {}
            }
            for child in node.children(&mut node.walk()) {
                stack.push(child);
            }
        }
        false
    }

    fn link_inheritance(&self, unit: &mut SourceUnit) {
        let names: Vec<(String, Option<String>)> = unit
            .classes
            .iter()
            .map(|c| (c.name.clone(), c.superclass.clone()))
            .collect();

        for class in &mut unit.classes {
            let children: Vec<String> = names
                .iter()
                .filter(|(_, sup)| sup.as_deref() == Some(class.name.as_str()))
                .map(|(n, _)| n.clone())
                .collect();
            let siblings: Vec<String> = match &class.superclass {
                Some(sup) => names
                    .iter()
                    .filter(|(n, s)| s.as_deref() == Some(sup.as_str()) && n != &class.name)
                    .map(|(n, _)| n.clone())
                    .collect(),
                None => Vec::new(),
            };

            let mut depth = 0;
            let mut current = class.superclass.clone();
            while let Some(sup) = current {
                depth += 1;
                if depth > names.len() as u32 {
                    break;
                }
                current = names
                    .iter()
                    .find(|(n, _)| *n == sup)
                    .and_then(|(_, s)| s.clone());
            }

            class.inheritance = InheritanceSummary {
                depth,
                is_leaf: children.is_empty(),
                children,
                siblings,
            };
        }
    }

    fn build_imports(&self, node: Node) -> Vec<Import> {
        let location = self.location(node);

        match node.kind() {
            "import_statement" if self.language == Language::Python => {
                // import a.b, c as d
                let mut imports = Vec::new();
                for child in node.named_children(&mut node.walk()) {
                    match child.kind() {
                        "dotted_name" => imports.push(Import {
                            module: self.text(child).to_string(),
                            names: Vec::new(),
                            location: location.clone(),
                        }),
                        "aliased_import" => {
                            let module = child
                                .child_by_field_name("name")
                                .map(|n| self.text(n).to_string())
                                .unwrap_or_default();
                            let alias = child
                                .child_by_field_name("alias")
                                .map(|n| self.text(n).to_string());
                            imports.push(Import {
                                module,
                                names: alias.into_iter().collect(),
                                location: location.clone(),
                            });
                        }
                        _ => {}
                    }
                }
                imports
            }
            "import_from_statement" => {
                let module = node
                    .child_by_field_name("module_name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                let mut names = Vec::new();
                for child in node.named_children(&mut node.walk()) {
                    match child.kind() {
                        "dotted_name" if self.text(child) != module => {
                            names.push(self.text(child).to_string());
                        }
                        "aliased_import" => {
                            if let Some(alias) = child.child_by_field_name("alias") {
                                names.push(self.text(alias).to_string());
                            }
                        }
                        "wildcard_import" => {}
                        _ => {}
                    }
                }
                vec![Import {
                    module,
                    names,
                    location,
                }]
            }
            // JS/TS: import Default, { a, b as c } from "module"
            _ => {
                let module = node
                    .child_by_field_name("source")
                    .map(|n| self.text(n).trim_matches(['"', '\'', '`']).to_string())
                    .unwrap_or_default();
                let mut names = Vec::new();
                let mut stack = vec![node];
                while let Some(current) = stack.pop() {
                    for child in current.children(&mut current.walk()) {
                        match child.kind() {
                            "import_specifier" => {
                                let name = child
                                    .child_by_field_name("alias")
                                    .or_else(|| child.child_by_field_name("name"))
                                    .map(|n| self.text(n).to_string());
                                names.extend(name);
                            }
                            "namespace_import" => {
                                if let Some(id) = first_descendant(child, "identifier") {
                                    names.push(self.text(id).to_string());
                                }
                            }
                            "identifier" if current.kind() == "import_clause" => {
                                names.push(self.text(child).to_string());
                            }
                            _ => stack.push(child),
                        }
                    }
                }
                vec![Import {
                    module,
                    names,
                    location,
                }]
            }
        }
    }

    fn collect_exports(&self, root: Node, unit: &mut SourceUnit) {
        let mut exported: Vec<Export> = Vec::new();

        if self.language == Language::Python {
            // Module-level definitions without a leading underscore are the
            // module's surface.
            for symbol in &unit.symbols {
                if !symbol.name.starts_with('_') {
                    exported.push(Export {
                        name: symbol.name.clone(),
                        kind: symbol.kind,
                        location: symbol.location.clone(),
                    });
                }
            }
        } else {
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                for child in node.children(&mut node.walk()) {
                    if child.kind() == "export_statement" {
                        self.collect_export_names(child, unit, &mut exported);
                    }
                    stack.push(child);
                }
            }
        }

        for export in &exported {
            if let Some(symbol) = unit.symbols.iter_mut().find(|s| s.name == export.name) {
                symbol.exported = true;
            }
        }
        exported.sort_by(|a, b| a.name.cmp(&b.name).then(a.location.cmp(&b.location)));
        exported.dedup_by(|a, b| a.name == b.name);
        exported.sort_by(|a, b| a.location.cmp(&b.location));
        unit.exports = exported;
    }

    fn collect_export_names(&self, node: Node, unit: &SourceUnit, exported: &mut Vec<Export>) {
        if let Some(declaration) = node.child_by_field_name("declaration") {
            if let Some(name) = declaration.child_by_field_name("name") {
                exported.push(Export {
                    name: self.text(name).to_string(),
                    kind: export_kind(declaration.kind()),
                    location: self.location(declaration),
                });
                return;
            }
            // export const a = ..., b = ...
            for declarator in declaration.named_children(&mut declaration.walk()) {
                if declarator.kind() == "variable_declarator" {
                    if let Some(name) = declarator.child_by_field_name("name") {
                        exported.push(Export {
                            name: self.text(name).to_string(),
                            kind: SymbolKind::Variable,
                            location: self.location(declarator),
                        });
                    }
                }
            }
            return;
        }

        // export { a, b as c }
        let mut found_clause = false;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            for child in current.children(&mut current.walk()) {
                if child.kind() == "export_specifier" {
                    found_clause = true;
                    let name = child
                        .child_by_field_name("alias")
                        .or_else(|| child.child_by_field_name("name"))
                        .map(|n| self.text(n).to_string());
                    if let Some(name) = name {
                        let kind = unit
                            .symbols
                            .iter()
                            .find(|s| s.name == name)
                            .map(|s| s.kind)
                            .unwrap_or(SymbolKind::Variable);
                        exported.push(Export {
                            name,
                            kind,
                            location: self.location(child),
                        });
                    }
                } else {
                    stack.push(child);
                }
            }
        }

        // export default <expr>
        if !found_clause && self.has_keyword(node, "default") {
            exported.push(Export {
                name: "default".to_string(),
                kind: SymbolKind::Variable,
                location: self.location(node),
            });
        }
    }

    fn collect_identifier_usage(&self, root: Node, unit: &mut SourceUnit) {
        let mut usage: BTreeMap<String, u32> = BTreeMap::new();
        self.walk_identifiers(root, &mut |name, _| {
            *usage.entry(name.to_string()).or_insert(0) += 1;
        });
        unit.identifier_usage = usage;
    }

    fn attach_symbol_usages(&self, root: Node, unit: &mut SourceUnit) {
        let mut occurrences: BTreeMap<String, Vec<SourceLocation>> = BTreeMap::new();
        self.walk_identifiers(root, &mut |name, location| {
            occurrences.entry(name.to_string()).or_default().push(location);
        });

        for symbol in &mut unit.symbols {
            if let Some(locations) = occurrences.get(&symbol.name) {
                symbol.usages = locations
                    .iter()
                    .filter(|loc| loc.line != symbol.location.line)
                    .cloned()
                    .collect();
            }
        }
    }

    /// Visit identifier-like nodes outside import statements.
    fn walk_identifiers(&self, node: Node, f: &mut dyn FnMut(&str, SourceLocation)) {
        if self.spec.import_kinds.contains(&node.kind()) {
            return;
        }
        if matches!(
            node.kind(),
            "identifier" | "property_identifier" | "type_identifier" | "shorthand_property_identifier"
        ) {
            f(self.text(node), self.location(node));
        }
        for child in node.children(&mut node.walk()) {
            self.walk_identifiers(child, f);
        }
    }
}

fn body_of(node: Node) -> Option<Node> {
    node.child_by_field_name("body")
}

fn first_descendant<'tree>(node: Node<'tree>, kind: &str) -> Option<Node<'tree>> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == kind {
            return Some(current);
        }
        for child in current.children(&mut current.walk()) {
            stack.push(child);
        }
    }
    None
}

fn export_kind(node_kind: &str) -> SymbolKind {
    match node_kind {
        "function_declaration" | "generator_function_declaration" => SymbolKind::Function,
        "class_declaration" => SymbolKind::Class,
        "interface_declaration" => SymbolKind::Interface,
        "type_alias_declaration" => SymbolKind::TypeAlias,
        "enum_declaration" => SymbolKind::Enum,
        _ => SymbolKind::Variable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_js(content: &str) -> SourceUnit {
        TreeSitterParser::javascript().parse(&SourceFile::new("app.js", content))
    }

    fn parse_ts(content: &str) -> SourceUnit {
        TreeSitterParser::typescript().parse(&SourceFile::new("app.ts", content))
    }

    fn parse_py(content: &str) -> SourceUnit {
        TreeSitterParser::python().parse(&SourceFile::new("app.py", content))
    }

    #[test]
    fn js_function_complexity_counts_decisions() {
        let unit = parse_js(indoc! {r#"
            function classify(n) {
                if (n < 0) {
                    return "negative";
                }
                for (let i = 0; i < n; i++) {
                    if (i % 2 === 0 && i > 2) {
                        continue;
                    }
                }
                return n > 100 ? "big" : "small";
            }
        "#});
        assert_eq!(unit.functions.len(), 1);
        let func = &unit.functions[0];
        assert_eq!(func.name, "classify");
        // if + for + if + && + ternary
        assert_eq!(func.cyclomatic, 6);
    }

    #[test]
    fn js_arrow_function_takes_binding_name() {
        let unit = parse_js("const greet = (name) => name.length;\n");
        assert_eq!(unit.functions.len(), 1);
        assert_eq!(unit.functions[0].name, "greet");
        assert_eq!(unit.functions[0].parameters.len(), 1);
    }

    #[test]
    fn js_console_call_is_io() {
        let unit = parse_js("function log(m) { console.log(m); }\n");
        let func = &unit.functions[0];
        assert!(!func.is_pure);
        assert_eq!(func.side_effects[0].kind, SideEffectKind::Io);
    }

    #[test]
    fn js_imports_and_exports() {
        let unit = parse_js(indoc! {r#"
            import { readFile } from "./files.js";
            import helpers from "./helpers.js";

            export function parse(text) {
                return readFile(text);
            }

            function internal() {}
        "#});
        assert_eq!(unit.imports.len(), 2);
        assert_eq!(unit.imports[0].module, "./files.js");
        assert_eq!(unit.imports[0].names, vec!["readFile"]);
        assert_eq!(unit.exports.len(), 1);
        assert_eq!(unit.exports[0].name, "parse");
    }

    #[test]
    fn ts_class_model() {
        let unit = parse_ts(indoc! {r#"
            class Repository extends Base {
                private cache: Map<string, string>;

                constructor() {
                    super();
                    this.cache = new Map();
                }

                get(key: string): string {
                    return this.cache.get(key);
                }
            }
        "#});
        assert_eq!(unit.classes.len(), 1);
        let class = &unit.classes[0];
        assert_eq!(class.name, "Repository");
        assert_eq!(class.superclass.as_deref(), Some("Base"));
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.fields[0].visibility, Visibility::Private);
    }

    #[test]
    fn python_function_and_markers() {
        let unit = parse_py(indoc! {r#"
            # TODO: handle empty input
            def total(items):
                result = 0
                for item in items:
                    if item > 0:
                        result += item
                return result
        "#});
        assert_eq!(unit.functions.len(), 1);
        let func = &unit.functions[0];
        assert_eq!(func.name, "total");
        assert_eq!(func.cyclomatic, 3);
        assert!(func.is_pure);
        assert!(unit
            .findings
            .iter()
            .any(|f| f.kind == crate::core::FindingKind::Marker));
    }

    #[test]
    fn python_print_is_io() {
        let unit = parse_py("def shout(m):\n    print(m)\n");
        assert!(!unit.functions[0].is_pure);
    }

    #[test]
    fn python_module_surface_is_exported() {
        let unit = parse_py("def visible():\n    pass\n\ndef _hidden():\n    pass\n");
        assert_eq!(unit.exports.len(), 1);
        assert_eq!(unit.exports[0].name, "visible");
    }

    #[test]
    fn python_imports() {
        let unit = parse_py("import os\nfrom collections import OrderedDict\n");
        assert_eq!(unit.imports.len(), 2);
        assert_eq!(unit.imports[0].module, "os");
        let from_import = &unit.imports[1];
        assert_eq!(from_import.module, "collections");
        assert_eq!(from_import.names, vec!["OrderedDict"]);
    }

    #[test]
    fn broken_source_records_syntax_finding_and_continues() {
        let unit = parse_js("function broken( {\nfunction fine() { return 1; }\n");
        assert!(unit
            .findings
            .iter()
            .any(|f| f.kind == crate::core::FindingKind::Syntax));
    }
}
