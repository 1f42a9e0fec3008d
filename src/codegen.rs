//! Client-JS Generator (§4.6): walks the IR and the analyzer context to emit
//! the hydration script for one component, or nothing when the component
//! needs no client behavior at all.
//!
//! Grounded on the numbered-section `format!`-building style and
//! `escape_js_string` helper of the teacher's original client-codegen pass,
//! rewritten end to end against the new IR shape and the runtime surface
//! this crate actually targets (`createSignal`, `findScope`, `insert`,
//! `reconcileList`, `initChild`, ...). Numbering in the section comments
//! below tracks the spec's section letters (a-p) so the two stay easy to
//! cross-reference.

use std::collections::BTreeSet;

use crate::adapter::{HtmlAdapter, TemplateAdapter};
use crate::analyzer::{AnalyzerContext, PropParam};
use crate::ir::{
    AttrValue, ComponentIr, ComponentNode, ConditionalNode, ElementNode, EventBinding,
    ExpressionNode, LoopNode, ProviderNode, TemplateNode,
};

const BOOLEAN_ATTRS: &[&str] = &[
    "checked", "disabled", "readonly", "selected", "required", "hidden", "autofocus", "autoplay",
    "controls", "loop", "muted", "open", "multiple", "novalidate",
];

/// One reactive-attribute write collected against a single slot.
struct AttrEffect {
    attr_name: String,
    expr: String,
    presence_or_undefined: bool,
}

#[derive(Default)]
struct ClientNeeds<'a> {
    text_effects: Vec<(&'a str, &'a str, bool)>,
    attr_effects: Vec<(&'a str, Vec<AttrEffect>)>,
    events: Vec<(&'a str, &'a EventBinding)>,
    refs: Vec<(&'a str, &'a str)>,
    conditionals: Vec<&'a ConditionalNode>,
    loops: Vec<&'a LoopNode>,
    components: Vec<&'a ComponentNode>,
    providers: Vec<&'a ProviderNode>,
    in_conditional: bool,
}

impl<'a> ClientNeeds<'a> {
    fn collect_element(&mut self, el: &'a ElementNode) {
        if let Some(slot) = &el.slot_id {
            let mut attrs = Vec::new();
            for attr in &el.attrs {
                if !attr.dynamic {
                    continue;
                }
                let expr = match &attr.value {
                    AttrValue::Text(s) => s.clone(),
                    _ => continue,
                };
                attrs.push(AttrEffect {
                    attr_name: attr.name.clone(),
                    expr,
                    presence_or_undefined: attr.presence_or_undefined,
                });
            }
            if !attrs.is_empty() {
                self.attr_effects.push((slot.as_str(), attrs));
            }
            for ev in &el.events {
                self.events.push((slot.as_str(), ev));
            }
            if let Some(r) = &el.ref_binding {
                self.refs.push((slot.as_str(), r.as_str()));
            }
        }
    }
}

/// Read-only walk in source-appearance order (the same order
/// `crate::visitor` enforces for mutating passes); the generator only ever
/// reads, so it walks shared references directly rather than going through
/// the shared `TemplateVisitor` trait.
fn walk_ref<'a>(node: &'a TemplateNode, needs: &mut ClientNeeds<'a>) {
    match node {
        TemplateNode::Element(el) => {
            needs.collect_element(el);
            for c in &el.children {
                walk_ref(c, needs);
            }
        }
        TemplateNode::Text(_) => {}
        TemplateNode::Expression(e) => {
            if let Some(slot) = &e.slot_id {
                needs.text_effects.push((slot.as_str(), e.expr.as_str(), needs.in_conditional));
            }
        }
        TemplateNode::Conditional(c) => {
            needs.conditionals.push(c);
            let was = needs.in_conditional;
            needs.in_conditional = true;
            walk_ref(&c.when_true, needs);
            if let Some(wf) = &c.when_false {
                walk_ref(wf, needs);
            }
            needs.in_conditional = was;
        }
        TemplateNode::Loop(l) => {
            needs.loops.push(l);
            for c in &l.children {
                walk_ref(c, needs);
            }
        }
        TemplateNode::Component(c) => {
            needs.components.push(c);
            for c in &c.children {
                walk_ref(c, needs);
            }
        }
        TemplateNode::Fragment(f) => {
            for c in &f.children {
                walk_ref(c, needs);
            }
        }
        TemplateNode::Provider(p) => {
            needs.providers.push(p);
            for c in &p.children {
                walk_ref(c, needs);
            }
        }
        TemplateNode::IfStatement(s) => {
            walk_ref(&s.consequent, needs);
            if let Some(alt) = &s.alternate {
                walk_ref(alt, needs);
            }
        }
    }
}

fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
}

/// True iff the component references nothing a static render couldn't have
/// produced — the client-need predicate of §4.6.
fn needs_client_script(ctx: &AnalyzerContext, needs: &ClientNeeds) -> bool {
    !ctx.signals.is_empty()
        || !ctx.memos.is_empty()
        || !ctx.effects.is_empty()
        || !ctx.on_mounts.is_empty()
        || !needs.text_effects.is_empty()
        || !needs.attr_effects.is_empty()
        || !needs.events.is_empty()
        || !needs.refs.is_empty()
        || !needs.conditionals.is_empty()
        || !needs.loops.is_empty()
        || !needs.components.is_empty()
        || !needs.providers.is_empty()
}

/// 4.6.b: default fallback for a destructured prop used without its own
/// declared `?? default`. Numeric/boolean/string/array/object inference
/// falls back to the type hint when present; otherwise the prop is captured
/// with no default.
fn inferred_default(prop: &PropParam, used_as_loop_array: bool, used_as_object_guard: bool) -> Option<String> {
    if let Some(d) = &prop.default_value {
        return Some(d.clone());
    }
    if used_as_loop_array {
        return Some("[]".to_string());
    }
    match prop.type_hint.as_deref() {
        Some(h) if h.contains("number") => Some("0".to_string()),
        Some(h) if h.contains("boolean") => Some("false".to_string()),
        Some(h) if h.contains("string") => Some("''".to_string()),
        Some(h) if h.contains("[]") || h.contains("Array") => Some("[]".to_string()),
        Some(h) if h.starts_with('{') || h.contains("object") => {
            if used_as_object_guard {
                None
            } else {
                Some("{}".to_string())
            }
        }
        _ => None,
    }
}

/// Packages a child-component prop value per §4.6.p.
fn package_prop_value(value: &str, is_event_handler: bool, dynamic: bool, is_literal: bool) -> String {
    if is_event_handler {
        value.to_string()
    } else if dynamic {
        format!("{{ get p() {{ return {value} }} }}")
    } else if is_literal {
        format!("\"{}\"", escape_js_string(value))
    } else {
        value.to_string()
    }
}

/// Emits the hydration script for one component, or `None` when it needs no
/// client-side behavior (§4.6 "Client-need predicate").
pub fn generate_client_script(ctx: &AnalyzerContext, ir: &ComponentIr) -> Option<String> {
    let mut needs = ClientNeeds::default();
    walk_ref(&ir.root, &mut needs);

    if !needs_client_script(ctx, &needs) {
        return None;
    }

    let name = &ctx.component_name;
    let mut runtime_symbols: BTreeSet<&'static str> = BTreeSet::new();
    runtime_symbols.insert("findScope");
    runtime_symbols.insert("registerComponent");
    runtime_symbols.insert("hydrate");
    if !ctx.signals.is_empty() {
        runtime_symbols.insert("createSignal");
    }
    if !ctx.memos.is_empty() {
        runtime_symbols.insert("createMemo");
    }
    if !ctx.effects.is_empty()
        || !ctx.on_mounts.is_empty()
        || !needs.text_effects.is_empty()
        || !needs.attr_effects.is_empty()
        || !ctx.controlled_prop_syncs.is_empty()
        || needs.loops.iter().any(|l| !l.is_static_array)
    {
        runtime_symbols.insert("createEffect");
    }
    if !needs.text_effects.is_empty() || !needs.attr_effects.is_empty() || !needs.events.is_empty() || !needs.refs.is_empty() {
        runtime_symbols.insert("find");
    }
    if needs_parent_owned_finder(&ir.root) {
        runtime_symbols.insert("$");
    }
    if !needs.conditionals.is_empty() {
        runtime_symbols.insert("insert");
    }
    if needs.loops.iter().any(|l| !l.is_static_array) {
        runtime_symbols.insert("reconcileList");
    }
    if needs.loops.iter().any(|l| l.child_component.is_some()) {
        runtime_symbols.insert("createComponent");
    }
    if !needs.components.is_empty() {
        runtime_symbols.insert("initChild");
    }
    if !needs.providers.is_empty() {
        runtime_symbols.insert("provideContext");
    }

    let mut body = String::new();

    // §4.6.a
    body.push_str(&format!(
        "  const __scope = findScope('{name}', __instanceIndex, __parentScope);\n  if (!__scope) return;\n"
    ));

    // §4.6.b: prop captures for every destructured prop actually referenced.
    let referenced_props = referenced_prop_names(ctx, &needs);
    for prop in &ctx.props_params {
        if !referenced_props.contains(prop.name.as_str()) {
            continue;
        }
        let used_as_loop_array = needs.loops.iter().any(|l| l.array.trim() == prop.name);
        let used_as_object_guard = needs.conditionals.iter().any(|c| c.condition.trim() == prop.name);
        match inferred_default(prop, used_as_loop_array, used_as_object_guard) {
            Some(d) => body.push_str(&format!("  const {} = props.{} ?? {};\n", prop.name, prop.name, d)),
            None => body.push_str(&format!("  const {} = props.{};\n", prop.name, prop.name)),
        }
    }

    // §4.6.c: referenced local constants, verbatim (already type-stripped
    // upstream by `crate::typestrip`).
    for local in &ctx.local_constants {
        body.push_str(&format!("  const {} = {};\n", local.name, local.value));
    }

    // §4.6.d
    for signal in &ctx.signals {
        body.push_str(&format!(
            "  const [{}, {}] = createSignal({});\n",
            signal.getter, signal.setter, signal.initial_value
        ));
    }
    for sync in &ctx.controlled_prop_syncs {
        let Some(setter) = ctx
            .signals
            .iter()
            .find(|s| s.getter == sync.signal_getter)
            .map(|s| s.setter.as_str())
        else {
            continue;
        };
        body.push_str(&format!(
            "  // sync controlled prop '{}'\n  createEffect(() => {}(props.{} ?? {}));\n",
            sync.prop_name, setter, sync.prop_name, sync.default_expr
        ));
    }

    // §4.6.e
    for memo in &ctx.memos {
        body.push_str(&format!("  const {} = createMemo(() => {});\n", memo.name, memo.computation));
    }

    // §4.6.f
    for func in &ctx.local_functions {
        body.push_str(&format!(
            "  function {}({}) {{ {} }}\n",
            func.name,
            func.params.join(", "),
            func.body
        ));
    }

    // §4.6.g: prop-handler captures for handlers referenced by events that
    // aren't locally defined.
    let local_fn_names: BTreeSet<&str> = ctx.local_functions.iter().map(|f| f.name.as_str()).collect();
    let mut captured_handlers: BTreeSet<&str> = BTreeSet::new();
    for (_, ev) in &needs.events {
        let handler_name = ev.handler.trim();
        if handler_name.starts_with("props.") || local_fn_names.contains(handler_name)
            || handler_name.contains('=') || handler_name.contains('(')
        {
            continue;
        }
        captured_handlers.insert(handler_name);
    }
    for h in &captured_handlers {
        let prop_name = format!("on{}", capitalize(h));
        if ctx.props_params.iter().any(|p| p.name == prop_name) {
            body.push_str(&format!("  const {} = props.{};\n", h, prop_name));
        }
    }

    // §4.6.h: element references.
    for slot in ordered_slot_refs(&needs) {
        if crate::ir::is_parent_owned(slot) {
            body.push_str(&format!("  const _{} = $(__scope, '{}');\n", slot_var(slot), slot));
        } else {
            body.push_str(&format!(
                "  const _{} = find(__scope, '[data-bf=\"{}\"]');\n",
                slot_var(slot), slot
            ));
        }
    }
    for c in &needs.components {
        body.push_str(&format!(
            "  const _{} = find(__scope, '[data-bf-scope$=\"_{}\"]');\n",
            slot_var(&c.slot_id), c.slot_id
        ));
    }

    // §4.6.i
    for (slot, expr, in_conditional) in &needs.text_effects {
        let var = slot_var(slot);
        if *in_conditional {
            body.push_str(&format!(
                "  createEffect(() => {{ const el = find(__scope, '[data-bf=\"{slot}\"]'); if (el) el.textContent = String({expr}); }});\n"
            ));
        } else {
            body.push_str(&format!("  createEffect(() => _{var}.textContent = String({expr}));\n"));
        }
    }

    // §4.6.j
    for (slot, attrs) in &needs.attr_effects {
        let var = slot_var(slot);
        body.push_str("  createEffect(() => {\n");
        for attr in attrs {
            let AttrEffect { attr_name, expr, presence_or_undefined } = attr;
            if *presence_or_undefined {
                body.push_str(&format!(
                    "    {{ const __v = ({expr}); if (__v === undefined || __v === null) _{var}.removeAttribute('{attr_name}'); else _{var}.setAttribute('{attr_name}', String(__v)); }}\n"
                ));
            } else if attr_name == "value" {
                body.push_str(&format!(
                    "    {{ const __v = ({expr}); if (_{var}.value !== __v) _{var}.value = __v; }}\n"
                ));
            } else if BOOLEAN_ATTRS.contains(&attr_name.as_str()) {
                body.push_str(&format!("    _{var}.{attr_name} = !!({expr});\n"));
            } else {
                body.push_str(&format!("    _{var}.setAttribute('{attr_name}', String({expr}));\n"));
            }
        }
        body.push_str("  });\n");
    }

    // §4.6.k
    let adapter = HtmlAdapter;
    for cond in &needs.conditionals {
        let slot = cond.slot_id.as_deref().unwrap_or("");
        let true_template = escape_js_string(&render_branch(&cond.when_true, &adapter));
        let false_template = cond
            .when_false
            .as_ref()
            .map(|n| escape_js_string(&render_branch(n, &adapter)))
            .unwrap_or_default();
        body.push_str(&format!(
            "  insert(__scope, '{slot}', () => ({}), {{ template: \"{true_template}\", bindEvents(branchScope) {{}} }}, {{ template: \"{false_template}\", bindEvents(branchScope) {{}} }});\n",
            cond.condition
        ));
    }

    // §4.6.l
    for loop_node in &needs.loops {
        let slot = loop_node.slot_id.as_deref().unwrap_or("");
        let var = slot_var(slot);
        let key_fn = match &loop_node.key {
            Some(k) => format!("({}) => ({})", loop_node.param, k),
            None => format!("({}, __i) => __i", loop_node.param),
        };
        if loop_node.is_static_array {
            body.push_str(&format!(
                "  // static loop over '{}': nested component instances hydrate by matching scope elements to items by scopeID\n",
                loop_node.array
            ));
            continue;
        }
        let renderer = if let Some(child_name) = &loop_node.child_component {
            format!("({}) => createComponent('{}', {{}}, {})", loop_node.param, child_name, key_fn)
        } else {
            "(item) => ''".to_string()
        };
        body.push_str(&format!(
            "  createEffect(() => reconcileList(_{var}, {}, {}, {}));\n",
            loop_node.array, key_fn, renderer
        ));
    }

    // §4.6.m
    for (slot, ev) in &needs.events {
        let var = slot_var(slot);
        let handler = ev.handler.trim();
        let wrapped = if handler.starts_with("()") || handler.starts_with('(') {
            format!("(e) => {{ ({})(e); }}", handler)
        } else {
            handler.to_string()
        };
        body.push_str(&format!("  _{var}.addEventListener('{}', {wrapped});\n", ev.name));
    }

    // §4.6.n: reactive props on child components (generic `setAttribute`
    // path only; a component-name lookup table for `selected` special cases
    // is the optional refinement the generic path degrades to, per the
    // open-question decision recorded for this module).
    let reactive_component_props: Vec<(&ComponentNode, &crate::ir::ComponentProp)> = needs
        .components
        .iter()
        .flat_map(|c| c.props.iter().filter(|p| p.dynamic).map(move |p| (*c, p)))
        .collect();
    if !reactive_component_props.is_empty() {
        body.push_str("  createEffect(() => {\n");
        for (c, prop) in &reactive_component_props {
            if let AttrValue::Text(expr) = &prop.value {
                body.push_str(&format!(
                    "    _{}.setAttribute('{}', String({}));\n",
                    slot_var(&c.slot_id), prop.name, expr
                ));
            }
        }
        body.push_str("  });\n");
    }

    // §4.6.o
    for (slot, ref_name) in &needs.refs {
        let var = slot_var(slot);
        body.push_str(&format!("  if (typeof {ref_name} === 'function') {ref_name}(_{var});\n"));
    }
    for effect in &ctx.effects {
        body.push_str(&format!("  createEffect(() => {{ {effect} }});\n"));
    }
    for mount in &ctx.on_mounts {
        body.push_str(&format!("  {{ {mount} }}\n"));
    }

    for provider in &needs.providers {
        body.push_str(&format!(
            "  provideContext({}, () => ({}));\n",
            provider.context_name, provider.value_prop
        ));
    }

    // §4.6.p
    for c in &needs.components {
        let var = slot_var(&c.slot_id);
        let mut props_entries = Vec::new();
        for prop in &c.props {
            let value = match &prop.value {
                AttrValue::Text(s) => s.clone(),
                AttrValue::BoolShorthand => "true".to_string(),
                AttrValue::TemplateLiteral(_) => String::new(),
            };
            let packaged = package_prop_value(&value, prop.is_event_handler, prop.dynamic, prop.is_literal);
            props_entries.push(format!("{}: {}", prop.name, packaged));
        }
        body.push_str(&format!(
            "  initChild('{}', _{var}, {{ {} }});\n",
            c.name,
            props_entries.join(", ")
        ));
    }

    let mut script = String::new();
    // §4.6.1: alphabetically sorted runtime imports, only symbols actually used.
    let imports: Vec<&str> = runtime_symbols.into_iter().collect();
    script.push_str(&format!("import {{ {} }} from 'bf-runtime';\n\n", imports.join(", ")));

    // §4.6.2
    script.push_str(&format!(
        "function init{name}(__instanceIndex, __parentScope, props = {{}}) {{\n{body}}}\n\n"
    ));

    // §4.6.3
    script.push_str(&format!("registerComponent('{name}', init{name});\n"));

    // §4.6.4: statically templatable iff no loops, no child components, and
    // no signal calls inside interpolated expressions (prop refs are fine).
    if is_statically_templatable(&needs, ctx) {
        let template = escape_js_string(&adapter.generate(ir).template);
        script.push_str(&format!("registerTemplate('{name}', (props) => \"{template}\");\n"));
    }

    // §4.6.5
    script.push_str(&format!(
        "hydrate('{name}', (props, idx, scope) => init{name}(idx, scope, props));\n"
    ));

    Some(script)
}

fn render_branch(node: &TemplateNode, adapter: &HtmlAdapter) -> String {
    let ir = ComponentIr {
        component_name: String::new(),
        file_path: String::new(),
        root: node.clone(),
        type_definitions: vec![],
        errors: vec![],
    };
    adapter.generate(&ir).template
}

fn is_statically_templatable(needs: &ClientNeeds, ctx: &AnalyzerContext) -> bool {
    if !needs.loops.is_empty() || !needs.components.is_empty() {
        return false;
    }
    let signal_getters: BTreeSet<&str> = ctx.signals.iter().map(|s| s.getter.as_str()).collect();
    !needs
        .text_effects
        .iter()
        .any(|(_, expr, _)| signal_getters.iter().any(|g| expr.contains(&format!("{g}("))))
}

fn needs_parent_owned_finder(root: &TemplateNode) -> bool {
    root.slot_ids().iter().any(|s| crate::ir::is_parent_owned(s))
}

fn referenced_prop_names<'a>(ctx: &'a AnalyzerContext, needs: &ClientNeeds) -> BTreeSet<&'a str> {
    let mut out: BTreeSet<&str> = BTreeSet::new();
    for prop in &ctx.props_params {
        let haystacks: Vec<&str> = needs
            .text_effects
            .iter()
            .map(|(_, e, _)| *e)
            .chain(needs.loops.iter().map(|l| l.array.as_str()))
            .chain(needs.conditionals.iter().map(|c| c.condition.as_str()))
            .collect();
        if haystacks.iter().any(|h| contains_identifier(h, &prop.name)) {
            out.insert(prop.name.as_str());
        }
    }
    out
}

fn contains_identifier(haystack: &str, ident: &str) -> bool {
    haystack.match_indices(ident).any(|(i, _)| {
        let before_ok = i == 0 || !haystack.as_bytes()[i - 1].is_ascii_alphanumeric();
        let after = i + ident.len();
        let after_ok = after >= haystack.len() || !haystack.as_bytes()[after].is_ascii_alphanumeric();
        before_ok && after_ok
    })
}

/// Valid JS identifier derived from a slot id (`^s3` -> `s3_parent`).
fn slot_var(slot: &str) -> String {
    match slot.strip_prefix('^') {
        Some(stripped) => format!("{stripped}_parent"),
        None => slot.to_string(),
    }
}

fn ordered_slot_refs<'a>(needs: &ClientNeeds<'a>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let mut push = |slot: &'a str, seen: &mut BTreeSet<&'a str>, out: &mut Vec<&'a str>| {
        if seen.insert(slot) {
            out.push(slot);
        }
    };
    for (slot, _, _) in &needs.text_effects {
        push(slot, &mut seen, &mut out);
    }
    for (slot, _) in &needs.attr_effects {
        push(slot, &mut seen, &mut out);
    }
    for (slot, _) in &needs.events {
        push(slot, &mut seen, &mut out);
    }
    for (slot, _) in &needs.refs {
        push(slot, &mut seen, &mut out);
    }
    for l in &needs.loops {
        if let Some(s) = &l.slot_id {
            push(s.as_str(), &mut seen, &mut out);
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FragmentNode, SourceLocation};

    fn empty_ir() -> ComponentIr {
        ComponentIr {
            component_name: "Empty".into(),
            file_path: "empty.tsx".into(),
            root: TemplateNode::Fragment(FragmentNode {
                children: vec![],
                transparent: false,
                needs_scope_comment: false,
                loc: SourceLocation::default(),
            }),
            type_definitions: vec![],
            errors: vec![],
        }
    }

    fn counter_ir() -> ComponentIr {
        ComponentIr {
            component_name: "Counter".into(),
            file_path: "counter.tsx".into(),
            root: TemplateNode::Element(ElementNode {
                tag: "button".into(),
                attrs: vec![],
                events: vec![],
                ref_binding: None,
                children: vec![TemplateNode::Expression(ExpressionNode {
                    expr: "count()".into(),
                    reactive: true,
                    slot_id: Some("s0".into()),
                    client_only: false,
                    prop_refs: vec![],
                    loc: SourceLocation::default(),
                })],
                slot_id: None,
                needs_scope: true,
                loc: SourceLocation::default(),
            }),
            type_definitions: vec![],
            errors: vec![],
        }
    }

    fn counter_ctx() -> AnalyzerContext {
        let mut ctx = AnalyzerContext {
            component_name: "Counter".into(),
            ..Default::default()
        };
        ctx.signals.push(crate::analyzer::SignalDecl {
            getter: "count".into(),
            setter: "setCount".into(),
            initial_value: "0".into(),
            type_hint: None,
        });
        ctx
    }

    #[test]
    fn static_component_emits_no_script() {
        let ctx = AnalyzerContext {
            component_name: "Empty".into(),
            ..Default::default()
        };
        assert!(generate_client_script(&ctx, &empty_ir()).is_none());
    }

    #[test]
    fn reactive_text_emits_signal_and_effect() {
        let script = generate_client_script(&counter_ctx(), &counter_ir()).expect("script expected");
        assert!(script.contains("createSignal(0)"));
        assert!(script.contains("initCounter"));
        assert!(script.contains("registerComponent('Counter', initCounter)"));
        assert!(script.contains("hydrate('Counter'"));
    }

    #[test]
    fn determinism_two_runs_match() {
        let ctx = counter_ctx();
        let ir = counter_ir();
        assert_eq!(generate_client_script(&ctx, &ir), generate_client_script(&ctx, &ir));
    }
}
