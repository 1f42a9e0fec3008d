//! Template adapter interface (§6.2) and the one concrete reference
//! implementation the crate ships, `HtmlAdapter` (§6.3).
//!
//! Grounded on `transform.rs`'s `transform_template_native`/
//! `transform_node_internal` direct IR→HTML-with-anchors rendering,
//! reframed as one concrete `impl TemplateAdapter for HtmlAdapter` rather
//! than the only available rendering path — an embedder targeting a
//! different backend template language supplies their own `TemplateAdapter`
//! impl and the rest of the pipeline is unaffected (§6.2).
//!
//! A backend adapter cannot, in general, statically evaluate arbitrary
//! markup expressions (§1 Non-goals) — conditions, loop arrays, and
//! non-reactive text interpolations are opaque code to this crate. This
//! reference adapter therefore renders the deterministic, always-correct
//! subset (tags, static attributes, static text, the default/`whenTrue`
//! branch of conditionals, anchors) and leaves live values as the runtime
//! sees them: to be filled in by the client hydration script at `insert`/
//! `reconcileList` time. That's the whole point of islands hydration — the
//! server doesn't need to run the app's expression language, it only needs
//! to mark where the client must patch in values.

use crate::ir::{
    AttrValue, ComponentIr, ComponentNode, ConditionalNode, ElementNode, ExpressionNode,
    FragmentNode, IfStatementNode, LoopNode, ProviderNode, TemplateLiteralPart, TemplateNode,
    TextNode,
};

/// `{ extension, generate(componentIR) -> { template, ... } }` (§6.2). The
/// core treats every adapter as an opaque sink; `generate` is the only
/// method the driver calls.
pub trait TemplateAdapter {
    /// File extension used for this adapter's output file, e.g. `"html"`.
    fn extension(&self) -> &str;

    fn generate(&self, ir: &ComponentIr) -> AdapterOutput;
}

/// `generate`'s return value. `template` is a single text blob whose lines
/// the driver classifies by prefix when merging multiple components from
/// one source file (§6.2): lines starting with `import ` are collected into
/// the merged import block, lines starting with `type `/`interface ` into
/// the merged type block, everything else is component markup.
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    pub template: String,
}

/// Reference `TemplateAdapter`: renders IR directly to HTML with the
/// `data-bf-*` hydration anchors of §6.3.
pub struct HtmlAdapter;

impl TemplateAdapter for HtmlAdapter {
    fn extension(&self) -> &str {
        "html"
    }

    fn generate(&self, ir: &ComponentIr) -> AdapterOutput {
        let mut out = String::new();
        for type_def in &ir.type_definitions {
            out.push_str("type ");
            out.push_str(type_def);
            out.push('\n');
        }
        render_node(&ir.root, &ir.component_name, &mut out);
        AdapterOutput { template: out }
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn render_node(node: &TemplateNode, component_name: &str, out: &mut String) {
    match node {
        TemplateNode::Element(el) => render_element(el, component_name, out),
        TemplateNode::Text(t) => render_text(t, out),
        TemplateNode::Expression(e) => render_expression(e, out),
        TemplateNode::Conditional(c) => render_conditional(c, component_name, out),
        TemplateNode::Loop(l) => render_loop(l, out),
        TemplateNode::Component(c) => render_component(c, out),
        TemplateNode::Fragment(f) => render_fragment(f, component_name, out),
        TemplateNode::Provider(p) => render_provider(p, component_name, out),
        TemplateNode::IfStatement(s) => render_if_statement(s, component_name, out),
    }
}

fn render_children(children: &[TemplateNode], component_name: &str, out: &mut String) {
    for child in children {
        render_node(child, component_name, out);
    }
}

fn render_element(el: &ElementNode, component_name: &str, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    if let Some(slot_id) = &el.slot_id {
        out.push_str(&format!(" data-bf=\"{slot_id}\""));
    }
    if el.needs_scope {
        out.push_str(&format!(" data-bf-scope=\"{component_name}_0\""));
    }
    for attr in &el.attrs {
        render_attribute(attr, out);
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&el.tag.as_str()) {
        return;
    }
    render_children(&el.children, component_name, out);
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

fn render_attribute(attr: &crate::ir::Attribute, out: &mut String) {
    match &attr.value {
        AttrValue::BoolShorthand => {
            out.push(' ');
            out.push_str(&attr.name);
        }
        AttrValue::Text(s) if attr.is_literal => {
            out.push_str(&format!(" {}=\"{}\"", attr.name, html_escape_attr(s)));
        }
        AttrValue::Text(_) => {
            // Dynamic attribute value: the server cannot evaluate arbitrary
            // expressions (§1 Non-goals); the client effect (§4.6.j) sets it
            // post-hydration. Nothing is rendered server-side.
        }
        AttrValue::TemplateLiteral(tpl) => {
            // Structured template literal with only literal-branch ternaries:
            // render the `whenTrue` branch of every ternary part by default,
            // same static-subset convention as conditionals below.
            let mut rendered = String::new();
            for part in &tpl.parts {
                match part {
                    TemplateLiteralPart::StringPart { value } => rendered.push_str(value),
                    TemplateLiteralPart::TernaryPart { when_true, .. } => rendered.push_str(when_true),
                }
            }
            out.push_str(&format!(" {}=\"{}\"", attr.name, html_escape_attr(&rendered)));
        }
    }
}

fn render_text(t: &TextNode, out: &mut String) {
    out.push_str(&html_escape_text(&t.value));
}

fn render_expression(e: &ExpressionNode, out: &mut String) {
    match &e.slot_id {
        Some(slot_id) => {
            // §6.3: `data-bf="sN"` on a `<span>` wrapper around reactive text.
            out.push_str(&format!("<span data-bf=\"{slot_id}\"></span>"));
        }
        None => {
            // Non-reactive expression with no slot id: nothing to hydrate,
            // but the value still can't be evaluated server-side here
            // (§1 Non-goals) — left for the adapter's own expression
            // evaluator / the embedding template language to resolve.
            out.push_str(&format!("<!--bf-expr:{}-->", e.expr));
        }
    }
}

fn render_conditional(c: &ConditionalNode, component_name: &str, out: &mut String) {
    let slot_attr = c.slot_id.as_deref().unwrap_or("");
    out.push_str(&format!("<!--bf-cond-start:{slot_attr}-->"));
    render_node(&c.when_true, component_name, out);
    out.push_str(&format!("<!--bf-cond-end:{slot_attr}-->"));
}

fn render_loop(l: &LoopNode, out: &mut String) {
    // Array contents aren't known at compile time; the reconciler/static
    // hydration path populates this anchor entirely client-side.
    let slot_attr = l.slot_id.as_deref().unwrap_or("");
    out.push_str(&format!("<!--bf-loop:{slot_attr}-->"));
}

fn render_component(c: &ComponentNode, out: &mut String) {
    out.push_str(&format!(
        "<div data-bf-scope=\"{}_{}\" style=\"display:contents\"></div>",
        c.name, c.slot_id
    ));
}

fn render_fragment(f: &FragmentNode, component_name: &str, out: &mut String) {
    if f.needs_scope_comment {
        out.push_str(&format!("<!--bf-scope-start:{component_name}_0-->"));
    }
    render_children(&f.children, component_name, out);
    if f.needs_scope_comment {
        out.push_str("<!--bf-scope-end-->");
    }
}

fn render_provider(p: &ProviderNode, component_name: &str, out: &mut String) {
    render_children(&p.children, component_name, out);
}

fn render_if_statement(s: &IfStatementNode, component_name: &str, out: &mut String) {
    out.push_str("<!--bf-cond-start:if-->");
    render_node(&s.consequent, component_name, out);
    out.push_str("<!--bf-cond-end:if-->");
}

fn html_escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn html_escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Attribute, SourceLocation};

    fn component_ir(root: TemplateNode) -> ComponentIr {
        ComponentIr {
            component_name: "Widget".into(),
            file_path: "widget.tsx".into(),
            root,
            type_definitions: vec![],
            errors: vec![],
        }
    }

    #[test]
    fn renders_root_scope_anchor() {
        let ir = component_ir(TemplateNode::Element(ElementNode {
            tag: "div".into(),
            attrs: vec![],
            events: vec![],
            ref_binding: None,
            children: vec![],
            slot_id: None,
            needs_scope: true,
            loc: SourceLocation::default(),
        }));
        let out = HtmlAdapter.generate(&ir);
        assert!(out.template.contains("data-bf-scope=\"Widget_0\""));
    }

    #[test]
    fn reactive_text_renders_span_anchor() {
        let ir = component_ir(TemplateNode::Element(ElementNode {
            tag: "div".into(),
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
        }));
        let out = HtmlAdapter.generate(&ir);
        assert!(out.template.contains("<span data-bf=\"s0\"></span>"));
    }

    #[test]
    fn void_element_has_no_closing_tag() {
        let ir = component_ir(TemplateNode::Element(ElementNode {
            tag: "input".into(),
            attrs: vec![Attribute {
                name: "type".into(),
                value: AttrValue::Text("text".into()),
                dynamic: false,
                is_literal: true,
                presence_or_undefined: false,
                loc: SourceLocation::default(),
            }],
            events: vec![],
            ref_binding: None,
            children: vec![],
            slot_id: None,
            needs_scope: false,
            loc: SourceLocation::default(),
        }));
        let out = HtmlAdapter.generate(&ir);
        assert_eq!(out.template, "<input type=\"text\">");
    }

    #[test]
    fn component_child_renders_scope_div() {
        let ir = component_ir(TemplateNode::Component(ComponentNode {
            name: "Child".into(),
            props: vec![],
            children: vec![],
            slot_id: "s1".into(),
            template: None,
            loc: SourceLocation::default(),
        }));
        let out = HtmlAdapter.generate(&ir);
        assert!(out.template.contains("data-bf-scope=\"Child_s1\""));
    }
}
