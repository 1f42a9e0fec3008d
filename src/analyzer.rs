//! Analyzer (§4.3): walks a parsed component AST and emits an
//! `AnalyzerContext`, consumed read-only by `lowering` and `codegen`.
//!
//! Grounded on `parse.rs`'s `PROP_RE`/`STATE_RE` top-level-declaration
//! extraction and `discovery.rs`'s metadata-extraction shape, reimplemented
//! over a real oxc AST walk rather than regex, because the spec's analyzer
//! needs statement-level reasoning (if-return chains, signal/memo/effect
//! call detection at exactly the component's top level) that a line-regex
//! can't give for free. Every captured code span is kept as the verbatim
//! source slice (`&source[span.start..span.end]`), matching `expr.rs`'s
//! "exact slice, never a pretty-printer" discipline.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

use crate::ir::{
    CompilerError, SourceLocation, INV_DESTRUCTURED_PROPS_ADVISORY, INV_MALFORMED_COMPONENT_SHAPE,
};

#[derive(Debug, Clone, Default)]
pub struct PropParam {
    /// The prop's key on the props object (`props.<name>`).
    pub name: String,
    pub type_hint: Option<String>,
    pub optional: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignalDecl {
    pub getter: String,
    pub setter: String,
    pub initial_value: String,
    pub type_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MemoDecl {
    pub name: String,
    pub computation: String,
    pub type_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocalConstant {
    pub name: String,
    pub value: String,
    pub type_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocalFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ImportGroup {
    pub source: String,
    pub specifiers: Vec<String>,
    pub raw: String,
}

/// Source text of a `return <markup>` inside the component, plus its location.
/// Markup is kept as a raw span; `lowering` re-slices the JSX child nodes it
/// needs directly out of the AST rather than reparsing this text.
#[derive(Debug, Clone)]
pub struct JsxReturn {
    pub raw: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ConditionalReturn {
    pub condition: String,
    pub jsx_return: JsxReturn,
    pub scope_variables: Vec<String>,
    pub loc: SourceLocation,
}

/// A `createSignal(props.<X> ?? <default>)` pattern where `<X>` does not
/// start with `default` (case-insensitive) — the analyzer only detects the
/// shape; `codegen` realizes it as a "sync controlled prop" effect (§4.3).
#[derive(Debug, Clone)]
pub struct ControlledPropSync {
    pub signal_getter: String,
    pub prop_name: String,
    pub default_expr: String,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzerContext {
    pub component_name: String,
    pub file_path: String,
    pub has_use_client_directive: bool,
    pub has_default_export: bool,
    pub props_object_name: Option<String>,
    pub props_params: Vec<PropParam>,
    pub rest_props_name: Option<String>,
    pub rest_props_expanded_keys: Vec<String>,
    pub type_definitions: Vec<String>,
    pub signals: Vec<SignalDecl>,
    pub memos: Vec<MemoDecl>,
    pub effects: Vec<String>,
    pub on_mounts: Vec<String>,
    pub local_functions: Vec<LocalFunction>,
    pub local_constants: Vec<LocalConstant>,
    pub imports: Vec<ImportGroup>,
    pub jsx_return: Option<JsxReturn>,
    pub conditional_returns: Vec<ConditionalReturn>,
    pub controlled_prop_syncs: Vec<ControlledPropSync>,
    pub errors: Vec<CompilerError>,
}

impl AnalyzerContext {
    fn new(component_name: &str, file_path: &str) -> Self {
        AnalyzerContext {
            component_name: component_name.to_string(),
            file_path: file_path.to_string(),
            ..Default::default()
        }
    }
}

fn loc_of(span: oxc_span::Span, source: &str) -> SourceLocation {
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, ch) in source.char_indices() {
        if i as u32 >= span.start {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    SourceLocation { line, column: col }
}

fn slice<'s>(source: &'s str, span: oxc_span::Span) -> &'s str {
    &source[span.start as usize..span.end as usize]
}

/// Analyze `source` (a TSX-dialect component file) for the exported
/// component named `component_hint`, or the default export if `None`.
pub fn analyze(source: &str, file_path: &str, component_hint: Option<&str>) -> AnalyzerContext {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_typescript(true).with_jsx(true);
    let ret = Parser::new(&allocator, source, source_type).parse();

    let has_use_client_directive = source.trim_start().starts_with("\"use client\"")
        || source.trim_start().starts_with("'use client'")
        || ret.program.directives.iter().any(|d| d.directive.as_str() == "use client");

    let mut type_definitions = Vec::new();
    let mut imports = Vec::new();
    let mut found_name = component_hint.map(|s| s.to_string());
    let mut has_default_export = false;
    let mut target_function: Option<&Function> = None;
    let mut target_arrow_init: Option<(&str, &ArrowFunctionExpression)> = None;

    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(imp) => {
                imports.push(ImportGroup {
                    source: imp.source.value.to_string(),
                    specifiers: imp
                        .specifiers
                        .iter()
                        .flatten()
                        .map(|s| import_specifier_name(s))
                        .collect(),
                    raw: slice(source, imp.span()).to_string(),
                });
            }
            Statement::TSInterfaceDeclaration(iface) => {
                type_definitions.push(slice(source, iface.span()).to_string());
            }
            Statement::TSTypeAliasDeclaration(alias) => {
                type_definitions.push(slice(source, alias.span()).to_string());
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    if found_name.as_deref() == Some(id.name.as_str()) || found_name.is_none() {
                        found_name = Some(id.name.to_string());
                        target_function = Some(func);
                    }
                }
            }
            Statement::ExportNamedDeclaration(exp) => {
                if let Some(Declaration::FunctionDeclaration(func)) = &exp.declaration {
                    if let Some(id) = &func.id {
                        if found_name.as_deref() == Some(id.name.as_str()) || found_name.is_none()
                        {
                            found_name = Some(id.name.to_string());
                            target_function = Some(func);
                        }
                    }
                } else if let Some(Declaration::VariableDeclaration(var_decl)) = &exp.declaration {
                    for decl in &var_decl.declarations {
                        if let BindingPattern::BindingIdentifier(id) = &decl.id {
                            if found_name.as_deref() == Some(id.name.as_str())
                                || found_name.is_none()
                            {
                                if let Some(Expression::ArrowFunctionExpression(arrow)) =
                                    &decl.init
                                {
                                    found_name = Some(id.name.to_string());
                                    target_arrow_init = Some((id.name.as_str(), arrow));
                                }
                            }
                        }
                    }
                }
            }
            Statement::ExportDefaultDeclaration(exp) => {
                has_default_export = true;
                if let ExportDefaultDeclarationKind::FunctionDeclaration(func) = &exp.declaration {
                    if found_name.is_none() {
                        found_name = func.id.as_ref().map(|id| id.name.to_string());
                    }
                    target_function = Some(func);
                }
            }
            _ => {}
        }
    }

    let component_name = found_name.unwrap_or_else(|| "Component".to_string());
    let mut ctx = AnalyzerContext::new(&component_name, file_path);
    ctx.has_use_client_directive = has_use_client_directive;
    ctx.has_default_export = has_default_export;
    ctx.type_definitions = type_definitions;
    ctx.imports = imports;

    let (params, body) = if let Some(func) = target_function {
        (Some(&func.params), func.body.as_deref())
    } else if let Some((_, arrow)) = target_arrow_init {
        (
            Some(&arrow.params),
            if arrow.expression { None } else { Some(&arrow.body) },
        )
    } else {
        (None, None)
    };

    let Some(params) = params else {
        ctx.errors.push(CompilerError::error(
            INV_MALFORMED_COMPONENT_SHAPE,
            format!("could not locate component function `{}`", component_name),
            SourceLocation::default(),
        ));
        return ctx;
    };
    analyze_props(params, source, &mut ctx);

    let Some(body) = body else {
        ctx.errors.push(CompilerError::error(
            INV_MALFORMED_COMPONENT_SHAPE,
            "component has no function body".to_string(),
            SourceLocation::default(),
        ));
        return ctx;
    };

    analyze_body(body, source, &mut ctx);
    ctx
}

/// Every top-level exported (or default-exported) function/arrow-function
/// component candidate in `source`, in source order — used by the driver to
/// split a multi-component file into independent per-component compiles
/// (§6.2).
pub fn discover_component_names(source: &str) -> Vec<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_typescript(true).with_jsx(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    let mut names = Vec::new();

    for stmt in &ret.program.body {
        match stmt {
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    push_component_name(&mut names, id.name.as_str());
                }
            }
            Statement::ExportNamedDeclaration(exp) => {
                if let Some(Declaration::FunctionDeclaration(func)) = &exp.declaration {
                    if let Some(id) = &func.id {
                        push_component_name(&mut names, id.name.as_str());
                    }
                } else if let Some(Declaration::VariableDeclaration(var_decl)) = &exp.declaration {
                    for decl in &var_decl.declarations {
                        if let BindingPattern::BindingIdentifier(id) = &decl.id {
                            if matches!(decl.init, Some(Expression::ArrowFunctionExpression(_))) {
                                push_component_name(&mut names, id.name.as_str());
                            }
                        }
                    }
                }
            }
            Statement::ExportDefaultDeclaration(exp) => {
                if let ExportDefaultDeclarationKind::FunctionDeclaration(func) = &exp.declaration {
                    if let Some(id) = &func.id {
                        push_component_name(&mut names, id.name.as_str());
                    }
                }
            }
            _ => {}
        }
    }
    names
}

fn push_component_name(names: &mut Vec<String>, name: &str) {
    let is_component = name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false);
    if is_component && !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn import_specifier_name(spec: &ImportDeclarationSpecifier) -> String {
    match spec {
        ImportDeclarationSpecifier::ImportSpecifier(s) => s.local.name.to_string(),
        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => s.local.name.to_string(),
        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => s.local.name.to_string(),
    }
}

fn analyze_props(params: &FormalParameters, source: &str, ctx: &mut AnalyzerContext) {
    let Some(first) = params.items.first() else {
        return;
    };
    match &first.pattern {
        BindingPattern::BindingIdentifier(id) => {
            ctx.props_object_name = Some(id.name.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                let name = match &prop.key {
                    PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                    _ => continue,
                };
                let (default_value, optional) = match &prop.value {
                    BindingPattern::AssignmentPattern(assign) => (
                        Some(crate::typestrip::strip_types(slice(source, assign.right.span()))),
                        true,
                    ),
                    _ => (None, false),
                };
                ctx.props_params.push(PropParam {
                    name,
                    type_hint: None,
                    optional,
                    default_value,
                });
            }
            if let Some(rest) = &obj.rest {
                if let BindingPattern::BindingIdentifier(id) = &rest.argument {
                    ctx.rest_props_name = Some(id.name.to_string());
                    ctx.rest_props_expanded_keys =
                        ctx.props_params.iter().map(|p| p.name.clone()).collect();
                }
            }
        }
        _ => {
            ctx.errors.push(CompilerError::error(
                INV_MALFORMED_COMPONENT_SHAPE,
                "unresolved props parameter shape".to_string(),
                SourceLocation::default(),
            ));
        }
    }
}

/// Walks the component's top-level statements only — nested function bodies
/// are never scanned for signals/memos/effects (§4.3).
fn analyze_body(body: &FunctionBody, source: &str, ctx: &mut AnalyzerContext) {
    let mut pending_scope_vars: Vec<String> = Vec::new();

    for stmt in &body.statements {
        match stmt {
            Statement::VariableDeclaration(var_decl) => {
                for decl in &var_decl.declarations {
                    if try_collect_signal(decl, source, ctx) {
                        continue;
                    }
                    if try_collect_memo(decl, source, ctx) {
                        continue;
                    }
                    collect_local_constant(decl, source, ctx, &mut pending_scope_vars);
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    let params = func
                        .params
                        .items
                        .iter()
                        .filter_map(|p| binding_name(&p.pattern))
                        .collect();
                    let body_text = func
                        .body
                        .as_ref()
                        .map(|b| crate::typestrip::strip_types(slice(source, b.span())))
                        .unwrap_or_default();
                    ctx.local_functions.push(LocalFunction {
                        name: id.name.to_string(),
                        params,
                        body: body_text,
                    });
                    pending_scope_vars.push(id.name.to_string());
                }
            }
            Statement::ExpressionStatement(expr_stmt) => {
                collect_effect_or_mount(&expr_stmt.expression, source, ctx);
            }
            Statement::IfStatement(if_stmt) => {
                if let Some(jsx) = find_return_jsx(&if_stmt.consequent, source) {
                    ctx.conditional_returns.push(ConditionalReturn {
                        condition: slice(source, if_stmt.test.span()).to_string(),
                        jsx_return: jsx,
                        scope_variables: pending_scope_vars.clone(),
                        loc: loc_of(if_stmt.span(), source),
                    });
                    pending_scope_vars.clear();
                }
            }
            Statement::ReturnStatement(ret) => {
                if let Some(arg) = &ret.argument {
                    ctx.jsx_return = Some(JsxReturn {
                        raw: slice(source, arg.span()).to_string(),
                        loc: loc_of(ret.span(), source),
                    });
                }
            }
            _ => {}
        }
    }
}

fn binding_name(pattern: &BindingPattern) -> Option<String> {
    match pattern {
        BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
        _ => None,
    }
}

fn find_return_jsx(stmt: &Statement, source: &str) -> Option<JsxReturn> {
    match stmt {
        Statement::ReturnStatement(ret) => ret.argument.as_ref().map(|arg| JsxReturn {
            raw: slice(source, arg.span()).to_string(),
            loc: loc_of(ret.span(), source),
        }),
        Statement::BlockStatement(block) => {
            for s in &block.body {
                if let Some(jsx) = find_return_jsx(s, source) {
                    return Some(jsx);
                }
            }
            None
        }
        _ => None,
    }
}

/// `const [count, setCount] = createSignal(init)`.
fn try_collect_signal(decl: &VariableDeclarator, source: &str, ctx: &mut AnalyzerContext) -> bool {
    let BindingPattern::ArrayPattern(arr) = &decl.id else {
        return false;
    };
    let Some(Expression::CallExpression(call)) = &decl.init else {
        return false;
    };
    if callee_name(&call.callee).as_deref() != Some("createSignal") {
        return false;
    }
    let (Some(getter_pat), Some(setter_pat)) = (arr.elements.first(), arr.elements.get(1)) else {
        return false;
    };
    let (Some(getter), Some(setter)) = (
        getter_pat.as_ref().and_then(binding_name),
        setter_pat.as_ref().and_then(binding_name),
    ) else {
        return false;
    };
    if ctx.signals.iter().any(|s| s.getter == getter) {
        ctx.errors.push(CompilerError::error(
            INV_MALFORMED_COMPONENT_SHAPE,
            format!("duplicate signal getter `{getter}`"),
            loc_of(decl.span(), source),
        ));
    }
    let initial_value = call
        .arguments
        .first()
        .map(|a| crate::typestrip::strip_types(slice(source, a.span())))
        .unwrap_or_default();

    detect_controlled_prop_sync(&getter, &initial_value, ctx);

    ctx.signals.push(SignalDecl {
        getter,
        setter,
        initial_value,
        type_hint: None,
    });
    true
}

/// Detects `createSignal(props.<X> ?? <default>)` where `<X>` does not start
/// with `default` (case-insensitive, §4.3). Nullish coalescing (`??`) is not
/// part of §4.1's closed sub-language, so this is a direct textual split
/// rather than a trip through `expr.rs`.
fn detect_controlled_prop_sync(getter: &str, initial_value: &str, ctx: &mut AnalyzerContext) {
    let Some(idx) = initial_value.find("??") else {
        return;
    };
    let left = initial_value[..idx].trim();
    let right = initial_value[idx + 2..].trim();
    let Some(prop_name) = left.strip_prefix("props.") else {
        return;
    };
    if prop_name.is_empty() || !prop_name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return;
    }
    if prop_name.to_lowercase().starts_with("default") {
        return;
    }
    ctx.controlled_prop_syncs.push(ControlledPropSync {
        signal_getter: getter.to_string(),
        prop_name: prop_name.to_string(),
        default_expr: right.to_string(),
    });
}

/// `const name = createMemo(computation)`.
fn try_collect_memo(decl: &VariableDeclarator, source: &str, ctx: &mut AnalyzerContext) -> bool {
    let BindingPattern::BindingIdentifier(id) = &decl.id else {
        return false;
    };
    let Some(Expression::CallExpression(call)) = &decl.init else {
        return false;
    };
    if callee_name(&call.callee).as_deref() != Some("createMemo") {
        return false;
    }
    let computation = call
        .arguments
        .first()
        .map(|a| crate::typestrip::strip_types(slice(source, a.span())))
        .unwrap_or_default();
    ctx.memos.push(MemoDecl {
        name: id.name.to_string(),
        computation,
        type_hint: None,
    });
    true
}

fn collect_local_constant(
    decl: &VariableDeclarator,
    source: &str,
    ctx: &mut AnalyzerContext,
    pending_scope_vars: &mut Vec<String>,
) {
    if let BindingPattern::BindingIdentifier(id) = &decl.id {
        let value = decl
            .init
            .as_ref()
            .map(|init| crate::typestrip::strip_types(slice(source, init.span())))
            .unwrap_or_default();
        ctx.local_constants.push(LocalConstant {
            name: id.name.to_string(),
            value,
            type_hint: None,
        });
        pending_scope_vars.push(id.name.to_string());
    }
}

fn collect_effect_or_mount(expr: &Expression, source: &str, ctx: &mut AnalyzerContext) {
    let Expression::CallExpression(call) = expr else {
        return;
    };
    let Some(name) = callee_name(&call.callee) else {
        return;
    };
    let Some(first_arg) = call.arguments.first() else {
        return;
    };
    let body = crate::typestrip::strip_types(slice(source, first_arg.span()));
    match name.as_str() {
        "createEffect" => ctx.effects.push(body),
        "onMount" => ctx.on_mounts.push(body),
        _ => {}
    }
}

fn callee_name(callee: &Expression) -> Option<String> {
    match callee {
        Expression::Identifier(id) => Some(id.name.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_signal_and_jsx_return() {
        let src = r#"
            function Counter() {
                const [count, setCount] = createSignal(0);
                return <button onClick={() => setCount(n => n + 1)}>Count: {count()}</button>;
            }
        "#;
        let ctx = analyze(src, "counter.tsx", Some("Counter"));
        assert_eq!(ctx.component_name, "Counter");
        assert_eq!(ctx.signals.len(), 1);
        assert_eq!(ctx.signals[0].getter, "count");
        assert_eq!(ctx.signals[0].setter, "setCount");
        assert!(ctx.jsx_return.is_some());
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn destructured_props_are_collected() {
        let src = r#"
            function Dialog({ open, onClose }) {
                return <div>{open ? 'yes' : 'no'}</div>;
            }
        "#;
        let ctx = analyze(src, "dialog.tsx", Some("Dialog"));
        assert_eq!(ctx.props_params.len(), 2);
        assert_eq!(ctx.props_params[0].name, "open");
        assert!(ctx.props_object_name.is_none());
    }

    #[test]
    fn object_form_props_are_recorded() {
        let src = r#"
            function Dialog(props) {
                return <div>{props.open ? 'yes' : 'no'}</div>;
            }
        "#;
        let ctx = analyze(src, "dialog.tsx", Some("Dialog"));
        assert_eq!(ctx.props_object_name.as_deref(), Some("props"));
        assert!(ctx.props_params.is_empty());
    }

    #[test]
    fn controlled_prop_sync_detected() {
        let src = r#"
            function Toggle(props) {
                const [v, setV] = createSignal(props.initial ?? 0);
                return <div>{v()}</div>;
            }
        "#;
        let ctx = analyze(src, "toggle.tsx", Some("Toggle"));
        assert_eq!(ctx.controlled_prop_syncs.len(), 1);
        assert_eq!(ctx.controlled_prop_syncs[0].prop_name, "initial");
        assert_eq!(ctx.controlled_prop_syncs[0].default_expr, "0");
    }

    #[test]
    fn conditional_returns_collect_scope_variables() {
        let src = r#"
            function Page(props) {
                if (props.loading) {
                    const spinner = true;
                    return <div>loading</div>;
                }
                return <div>ready</div>;
            }
        "#;
        let ctx = analyze(src, "page.tsx", Some("Page"));
        assert_eq!(ctx.conditional_returns.len(), 1);
        assert!(ctx.jsx_return.is_some());
    }

    #[test]
    fn use_client_directive_detected() {
        let src = "\"use client\";\nfunction Widget() { return <div/>; }";
        let ctx = analyze(src, "widget.tsx", Some("Widget"));
        assert!(ctx.has_use_client_directive);
    }

    #[test]
    fn discovers_multiple_top_level_components() {
        let src = r#"
            function Counter() { return <div/>; }
            export const Dialog = (props) => { return <div/>; };
            function helper() { return 1; }
        "#;
        let names = discover_component_names(src);
        assert_eq!(names, vec!["Counter".to_string(), "Dialog".to_string()]);
    }
}
