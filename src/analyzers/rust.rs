use crate::analyzers::{normalize_lines, scan_markers, syntax_finding, SourceParser};
use crate::complexity::cyclomatic::{calculate_cyclomatic, calculate_nesting};
use crate::core::{
    ClassModel, Export, FieldModel, FunctionModel, Import, InheritanceSummary, Language,
    MethodModel, Parameter, SideEffect, SideEffectKind, SourceFile, SourceLocation, SourceUnit,
    Symbol, SymbolKind, Visibility,
};
use quote::ToTokens;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use syn::spanned::Spanned;
use syn::visit::Visit;

pub struct RustParser;

impl SourceParser for RustParser {
    fn parse(&self, file: &SourceFile) -> SourceUnit {
        match syn::parse_file(&file.content) {
            Ok(ast) => build_unit(file, &ast),
            Err(err) => {
                let mut unit = SourceUnit::empty(file.path.clone(), Language::Rust);
                unit.lines = file.content.lines().count();
                unit.findings.push(syntax_finding(
                    &file.path,
                    err.span().start().line.max(1),
                    format!("parse error: {err}"),
                ));
                unit
            }
        }
    }

    fn language(&self) -> Language {
        Language::Rust
    }
}

const COMMENT_PREFIXES: &[&str] = &["//", "/*", "*", "*/"];

fn build_unit(file: &SourceFile, ast: &syn::File) -> SourceUnit {
    let path = file.path.clone();
    let mut unit = SourceUnit::empty(path.clone(), Language::Rust);
    unit.lines = file.content.lines().count();
    unit.findings = scan_markers(&file.content, &path);
    unit.normalized_lines = normalize_lines(&file.content, COMMENT_PREFIXES);

    let mut impls: Vec<&syn::ItemImpl> = Vec::new();

    for item in &ast.items {
        match item {
            syn::Item::Fn(item_fn) => {
                unit.functions.push(build_function(item_fn, &path));
                push_symbol(
                    &mut unit,
                    item_fn.sig.ident.to_string(),
                    SymbolKind::Function,
                    item_fn.span(),
                    &item_fn.vis,
                );
            }
            syn::Item::Struct(item_struct) => {
                push_symbol(
                    &mut unit,
                    item_struct.ident.to_string(),
                    SymbolKind::Class,
                    item_struct.span(),
                    &item_struct.vis,
                );
            }
            syn::Item::Enum(item_enum) => {
                push_symbol(
                    &mut unit,
                    item_enum.ident.to_string(),
                    SymbolKind::Enum,
                    item_enum.span(),
                    &item_enum.vis,
                );
            }
            syn::Item::Trait(item_trait) => {
                push_symbol(
                    &mut unit,
                    item_trait.ident.to_string(),
                    SymbolKind::Interface,
                    item_trait.span(),
                    &item_trait.vis,
                );
            }
            syn::Item::Type(item_type) => {
                push_symbol(
                    &mut unit,
                    item_type.ident.to_string(),
                    SymbolKind::TypeAlias,
                    item_type.span(),
                    &item_type.vis,
                );
            }
            syn::Item::Const(item_const) => {
                push_symbol(
                    &mut unit,
                    item_const.ident.to_string(),
                    SymbolKind::Variable,
                    item_const.span(),
                    &item_const.vis,
                );
            }
            syn::Item::Static(item_static) => {
                push_symbol(
                    &mut unit,
                    item_static.ident.to_string(),
                    SymbolKind::Variable,
                    item_static.span(),
                    &item_static.vis,
                );
            }
            syn::Item::Use(item_use) => {
                unit.imports.extend(flatten_use(item_use, &path));
            }
            syn::Item::Impl(item_impl) => impls.push(item_impl),
            _ => {}
        }
    }

    // Structs become classes once their impl blocks are known.
    for item in &ast.items {
        if let syn::Item::Struct(item_struct) = item {
            unit.classes
                .push(build_class(item_struct, &impls, &path));
        }
    }

    unit.exports = unit
        .symbols
        .iter()
        .filter(|s| s.exported)
        .map(|s| Export {
            name: s.name.clone(),
            kind: s.kind,
            location: s.location.clone(),
        })
        .collect();

    collect_usages(ast, &mut unit, &path);
    unit
}

fn push_symbol(
    unit: &mut SourceUnit,
    name: String,
    kind: SymbolKind,
    span: proc_macro2::Span,
    vis: &syn::Visibility,
) {
    let visibility = visibility_of(vis);
    unit.symbols.push(Symbol {
        name,
        kind,
        location: span_location(span, &unit.path),
        visibility,
        exported: matches!(visibility, Visibility::Public | Visibility::Crate),
        usages: Vec::new(),
    });
}

fn visibility_of(vis: &syn::Visibility) -> Visibility {
    match vis {
        syn::Visibility::Public(_) => Visibility::Public,
        syn::Visibility::Restricted(r) if r.path.is_ident("crate") => Visibility::Crate,
        syn::Visibility::Restricted(_) => Visibility::Private,
        syn::Visibility::Inherited => Visibility::Private,
    }
}

fn span_location(span: proc_macro2::Span, path: &Path) -> SourceLocation {
    SourceLocation {
        file: path.to_path_buf(),
        line: span.start().line.max(1),
        column: span.start().column,
        end_line: span.end().line.max(1),
        end_column: span.end().column,
    }
}

fn build_function(item_fn: &syn::ItemFn, path: &Path) -> FunctionModel {
    let location = span_location(item_fn.span(), path);
    let mut func = FunctionModel::new(item_fn.sig.ident.to_string(), location);

    func.parameters = item_fn.sig.inputs.iter().filter_map(param_of).collect();
    func.return_type = match &item_fn.sig.output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => Some(type_tag(ty)),
    };
    func.is_async = item_fn.sig.asyncness.is_some();
    func.cyclomatic = calculate_cyclomatic(&item_fn.block);
    func.nesting = calculate_nesting(&item_fn.block);
    func.length = func.location.end_line - func.location.line + 1;
    func.calls = collect_calls(&item_fn.block);
    func.is_recursive = func.calls.iter().any(|c| *c == func.name);
    func.side_effects = detect_side_effects(&item_fn.block, &item_fn.sig);
    func.is_pure = func.side_effects.is_empty();
    func
}

fn param_of(arg: &syn::FnArg) -> Option<Parameter> {
    match arg {
        syn::FnArg::Receiver(_) => None,
        syn::FnArg::Typed(pat_type) => {
            let name = match &*pat_type.pat {
                syn::Pat::Ident(ident) => ident.ident.to_string(),
                other => other.to_token_stream().to_string(),
            };
            Some(Parameter {
                name,
                type_tag: Some(type_tag(&pat_type.ty)),
                optional: false,
                default: None,
            })
        }
    }
}

fn type_tag(ty: &syn::Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}

fn collect_calls(block: &syn::Block) -> Vec<String> {
    struct CallVisitor {
        calls: Vec<String>,
    }

    impl<'ast> Visit<'ast> for CallVisitor {
        fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
            if let syn::Expr::Path(expr_path) = &*call.func {
                if let Some(segment) = expr_path.path.segments.last() {
                    self.calls.push(segment.ident.to_string());
                }
            }
            syn::visit::visit_expr_call(self, call);
        }

        fn visit_expr_method_call(&mut self, call: &'ast syn::ExprMethodCall) {
            self.calls.push(call.method.to_string());
            syn::visit::visit_expr_method_call(self, call);
        }
    }

    let mut visitor = CallVisitor { calls: Vec::new() };
    visitor.visit_block(block);
    visitor.calls
}

static IO_MACROS: &[&str] = &[
    "println", "print", "eprintln", "eprint", "write", "writeln", "dbg",
];
static IO_PATH_MARKERS: &[&str] = &[
    "fs::", "io::", "File::", "stdin", "stdout", "stderr", "TcpStream", "UdpSocket", "Command::",
    "env::",
];

fn detect_side_effects(block: &syn::Block, sig: &syn::Signature) -> Vec<SideEffect> {
    struct LocalCollector {
        locals: HashSet<String>,
    }

    impl<'ast> Visit<'ast> for LocalCollector {
        fn visit_pat_ident(&mut self, pat: &'ast syn::PatIdent) {
            self.locals.insert(pat.ident.to_string());
            syn::visit::visit_pat_ident(self, pat);
        }
    }

    let mut collector = LocalCollector {
        locals: HashSet::new(),
    };
    for input in &sig.inputs {
        collector.visit_fn_arg(input);
    }
    collector.visit_block(block);

    struct EffectVisitor {
        locals: HashSet<String>,
        effects: Vec<SideEffect>,
    }

    impl EffectVisitor {
        fn record(&mut self, kind: SideEffectKind, detail: String, span: proc_macro2::Span) {
            self.effects.push(SideEffect {
                kind,
                detail,
                line: span.start().line.max(1),
            });
        }
    }

    impl<'ast> Visit<'ast> for EffectVisitor {
        fn visit_expr_macro(&mut self, mac: &'ast syn::ExprMacro) {
            if let Some(ident) = mac.mac.path.get_ident() {
                if IO_MACROS.contains(&ident.to_string().as_str()) {
                    self.record(SideEffectKind::Io, format!("{ident}!"), mac.span());
                }
            }
            syn::visit::visit_expr_macro(self, mac);
        }

        fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
            let callee = call.func.to_token_stream().to_string().replace(' ', "");
            if IO_PATH_MARKERS.iter().any(|m| callee.contains(m)) {
                self.record(SideEffectKind::Io, callee, call.span());
            }
            syn::visit::visit_expr_call(self, call);
        }

        fn visit_expr_assign(&mut self, assign: &'ast syn::ExprAssign) {
            match &*assign.left {
                syn::Expr::Path(expr_path) => {
                    if let Some(ident) = expr_path.path.get_ident() {
                        let name = ident.to_string();
                        if !self.locals.contains(&name) {
                            self.record(
                                SideEffectKind::NonLocalAssignment,
                                name,
                                assign.span(),
                            );
                        }
                    }
                }
                syn::Expr::Field(field) => {
                    let base = field.base.to_token_stream().to_string();
                    let kind = if base.starts_with("self") {
                        SideEffectKind::ExternalMutation
                    } else {
                        SideEffectKind::NonLocalAssignment
                    };
                    self.record(kind, field.to_token_stream().to_string(), assign.span());
                }
                syn::Expr::Unary(unary) if matches!(unary.op, syn::UnOp::Deref(_)) => {
                    self.record(
                        SideEffectKind::ExternalMutation,
                        unary.to_token_stream().to_string(),
                        assign.span(),
                    );
                }
                _ => {}
            }
            syn::visit::visit_expr_assign(self, assign);
        }
    }

    let mut visitor = EffectVisitor {
        locals: collector.locals,
        effects: Vec::new(),
    };
    visitor.visit_block(block);
    visitor.effects
}

fn build_class(
    item_struct: &syn::ItemStruct,
    impls: &[&syn::ItemImpl],
    path: &Path,
) -> ClassModel {
    let name = item_struct.ident.to_string();
    let fields: Vec<FieldModel> = item_struct
        .fields
        .iter()
        .enumerate()
        .map(|(idx, field)| FieldModel {
            name: field
                .ident
                .as_ref()
                .map(|i| i.to_string())
                .unwrap_or_else(|| idx.to_string()),
            type_tag: Some(type_tag(&field.ty)),
            visibility: visibility_of(&field.vis),
            is_static: false,
        })
        .collect();

    let own_impls: Vec<&&syn::ItemImpl> = impls
        .iter()
        .filter(|i| impl_target(i).as_deref() == Some(name.as_str()))
        .collect();

    let field_names: HashSet<String> = fields.iter().map(|f| f.name.clone()).collect();
    let mut interfaces = Vec::new();
    let mut methods = Vec::new();
    let mut touching = 0usize;
    for item_impl in &own_impls {
        let from_trait = item_impl
            .trait_
            .as_ref()
            .and_then(|(_, trait_path, _)| trait_path.segments.last())
            .map(|seg| seg.ident.to_string());
        if let Some(trait_name) = &from_trait {
            interfaces.push(trait_name.clone());
        }
        for item in &item_impl.items {
            if let syn::ImplItem::Fn(method) = item {
                if touches_own_field(&method.block, &field_names) {
                    touching += 1;
                }
                methods.push(build_method(method, from_trait.is_some(), path));
            }
        }
    }

    let cohesion = if methods.is_empty() || field_names.is_empty() {
        100
    } else {
        ((touching * 100) / methods.len()).min(100) as u8
    };
    let coupling = coupling_of(&methods);

    ClassModel {
        name,
        location: span_location(item_struct.span(), path),
        superclass: None,
        interfaces,
        methods,
        fields,
        cohesion,
        coupling,
        inheritance: InheritanceSummary {
            depth: 0,
            children: Vec::new(),
            siblings: Vec::new(),
            is_leaf: true,
        },
    }
}

fn impl_target(item_impl: &syn::ItemImpl) -> Option<String> {
    if let syn::Type::Path(type_path) = &*item_impl.self_ty {
        type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string())
    } else {
        None
    }
}

fn build_method(method: &syn::ImplItemFn, is_trait_impl: bool, path: &Path) -> MethodModel {
    let location = span_location(method.span(), path);
    let mut function = FunctionModel::new(method.sig.ident.to_string(), location);
    function.parameters = method.sig.inputs.iter().filter_map(param_of).collect();
    function.return_type = match &method.sig.output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => Some(type_tag(ty)),
    };
    function.is_async = method.sig.asyncness.is_some();
    function.cyclomatic = calculate_cyclomatic(&method.block);
    function.nesting = calculate_nesting(&method.block);
    function.length = function.location.end_line - function.location.line + 1;
    function.calls = collect_calls(&method.block);
    function.is_recursive = function.calls.iter().any(|c| *c == function.name);
    function.side_effects = detect_side_effects(&method.block, &method.sig);
    function.is_pure = function.side_effects.is_empty();

    let is_static = !method
        .sig
        .inputs
        .iter()
        .any(|arg| matches!(arg, syn::FnArg::Receiver(_)));

    MethodModel {
        function,
        visibility: visibility_of(&method.vis),
        is_static,
        is_abstract: false,
        is_override: is_trait_impl,
    }
}

fn touches_own_field(block: &syn::Block, field_names: &HashSet<String>) -> bool {
    struct FieldTouchVisitor<'a> {
        field_names: &'a HashSet<String>,
        touched: bool,
    }

    impl<'a, 'ast> Visit<'ast> for FieldTouchVisitor<'a> {
        fn visit_expr_field(&mut self, field: &'ast syn::ExprField) {
            if let syn::Expr::Path(base) = &*field.base {
                if base.path.is_ident("self") {
                    if let syn::Member::Named(name) = &field.member {
                        if self.field_names.contains(&name.to_string()) {
                            self.touched = true;
                        }
                    }
                }
            }
            syn::visit::visit_expr_field(self, field);
        }
    }

    let mut visitor = FieldTouchVisitor {
        field_names,
        touched: false,
    };
    visitor.visit_block(block);
    visitor.touched
}

fn coupling_of(methods: &[MethodModel]) -> u8 {
    let distinct: HashSet<&String> = methods.iter().flat_map(|m| m.function.calls.iter()).collect();
    ((distinct.len() * 5).min(100)) as u8
}

fn flatten_use(item_use: &syn::ItemUse, path: &Path) -> Vec<Import> {
    let location = span_location(item_use.span(), path);
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    walk_use_tree(&item_use.tree, &mut Vec::new(), &mut grouped);

    grouped
        .into_iter()
        .map(|(module, names)| Import {
            module,
            names,
            location: location.clone(),
        })
        .collect()
}

fn walk_use_tree(
    tree: &syn::UseTree,
    prefix: &mut Vec<String>,
    grouped: &mut BTreeMap<String, Vec<String>>,
) {
    match tree {
        syn::UseTree::Path(use_path) => {
            prefix.push(use_path.ident.to_string());
            walk_use_tree(&use_path.tree, prefix, grouped);
            prefix.pop();
        }
        syn::UseTree::Name(use_name) => {
            grouped
                .entry(prefix.join("::"))
                .or_default()
                .push(use_name.ident.to_string());
        }
        syn::UseTree::Rename(use_rename) => {
            grouped
                .entry(prefix.join("::"))
                .or_default()
                .push(use_rename.rename.to_string());
        }
        syn::UseTree::Glob(_) => {
            grouped.entry(prefix.join("::")).or_default();
        }
        syn::UseTree::Group(use_group) => {
            for item in &use_group.items {
                walk_use_tree(item, prefix, grouped);
            }
        }
    }
}

fn collect_usages(ast: &syn::File, unit: &mut SourceUnit, path: &Path) {
    struct UsageVisitor<'a> {
        path: &'a Path,
        occurrences: BTreeMap<String, Vec<SourceLocation>>,
    }

    impl<'a, 'ast> Visit<'ast> for UsageVisitor<'a> {
        fn visit_item_use(&mut self, _item: &'ast syn::ItemUse) {
            // Import statements do not count as usage.
        }

        fn visit_path(&mut self, p: &'ast syn::Path) {
            for segment in &p.segments {
                let name = segment.ident.to_string();
                self.occurrences
                    .entry(name)
                    .or_default()
                    .push(span_location(segment.ident.span(), self.path));
            }
            syn::visit::visit_path(self, p);
        }
    }

    let mut visitor = UsageVisitor {
        path,
        occurrences: BTreeMap::new(),
    };
    visitor.visit_file(ast);

    unit.identifier_usage = visitor
        .occurrences
        .iter()
        .map(|(name, locs)| (name.clone(), locs.len() as u32))
        .collect();

    for symbol in &mut unit.symbols {
        if let Some(locations) = visitor.occurrences.get(&symbol.name) {
            symbol.usages = locations
                .iter()
                .filter(|loc| loc.line != symbol.location.line)
                .cloned()
                .collect();
        }
    }
}
