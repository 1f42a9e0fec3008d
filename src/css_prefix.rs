//! CSS Layer Prefixer (§4.5): purely textual rewriting over the IR plus the
//! analyzer's local-constant metadata. Prepends `layer-<name>:` to class
//! tokens in static `class`/`className` attributes, and to class tokens
//! hiding inside referenced local constants' initializers.
//!
//! No direct teacher counterpart exists for this pass (the teacher crate has
//! no CSS-layer concept at all) — built in the teacher's own general idiom
//! for textual rewrites (the regex-table style `parse.rs` uses for its SVG
//! attribute mapping) rather than pulling in a CSS-parser crate, since this
//! is a token-level rewrite with no need for real CSS parsing.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::analyzer::LocalConstant;
use crate::ir::{AttrValue, ElementNode, TemplateLiteralPart, TemplateNode};
use crate::visitor::TemplateVisitor;

lazy_static! {
    static ref IDENT_RE: Regex = Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").unwrap();
    static ref QUOTED_STRING_RE: Regex = Regex::new(r#""([^"\\]|\\.)*"|'([^'\\]|\\.)*'"#).unwrap();
}

/// Rewrites every whitespace-separated token in `tokens` to `layer-<name>:token`,
/// skipping tokens that already carry a `layer-` prefix (idempotence, §4.5).
fn prefix_tokens(tokens: &str, layer: &str) -> String {
    tokens
        .split_whitespace()
        .map(|tok| {
            if tok.starts_with("layer-") {
                tok.to_string()
            } else {
                format!("layer-{layer}:{tok}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rewrites the contents of every quoted string literal found in `initializer`
/// (covers the top-level string, object-literal values, and array elements
/// shapes named in §4.5 with one textual pass rather than three).
fn rewrite_quoted_tokens(initializer: &str, layer: &str) -> String {
    QUOTED_STRING_RE
        .replace_all(initializer, |caps: &regex::Captures| {
            let whole = &caps[0];
            let quote = whole.chars().next().unwrap();
            let inner = &whole[1..whole.len() - 1];
            format!("{quote}{}{quote}", prefix_tokens(inner, layer))
        })
        .to_string()
}

/// A constant's initializer is "class-carrying" iff its shape is a string,
/// object, or array literal; calls, numbers, booleans, and bare identifiers
/// are left untouched (§4.5).
fn is_class_like_initializer(value: &str) -> bool {
    match value.trim().chars().next() {
        Some('"') | Some('\'') | Some('{') | Some('[') => true,
        _ => false,
    }
}

/// Identifiers referenced in a dynamic class expression, skipping ones
/// immediately preceded by `.` (member-access names) and ones that occur
/// inside a string literal (§4.5).
fn free_identifiers_outside_strings(code: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    // Mask out string-literal spans with spaces so IDENT_RE never matches inside them.
    let masked = QUOTED_STRING_RE.replace_all(code, |caps: &regex::Captures| " ".repeat(caps[0].len()));
    for m in IDENT_RE.find_iter(&masked) {
        let preceding_dot = masked[..m.start()].trim_end().ends_with('.');
        if preceding_dot {
            continue;
        }
        out.insert(m.as_str().to_string());
    }
    out
}

struct ClassAttrVisitor<'a> {
    layer: &'a str,
    rewrites: u32,
    referenced_constants: HashSet<String>,
}

impl<'a> ClassAttrVisitor<'a> {
    fn is_class_attr(name: &str) -> bool {
        name == "class" || name == "className"
    }

    fn visit_attrs(&mut self, el: &mut ElementNode) {
        for attr in &mut el.attrs {
            if !Self::is_class_attr(&attr.name) {
                continue;
            }
            match &mut attr.value {
                AttrValue::Text(s) if attr.is_literal => {
                    let rewritten = prefix_tokens(s, self.layer);
                    if &rewritten != s {
                        self.rewrites += 1;
                    }
                    *s = rewritten;
                }
                AttrValue::Text(s) if attr.dynamic => {
                    self.referenced_constants.extend(free_identifiers_outside_strings(s));
                }
                AttrValue::TemplateLiteral(tpl) => {
                    for part in &mut tpl.parts {
                        match part {
                            TemplateLiteralPart::StringPart { value } => {
                                let rewritten = prefix_tokens(value, self.layer);
                                if &rewritten != value {
                                    self.rewrites += 1;
                                }
                                *value = rewritten;
                            }
                            TemplateLiteralPart::TernaryPart { when_true, when_false, .. } => {
                                let rt = prefix_tokens(when_true, self.layer);
                                let rf = prefix_tokens(when_false, self.layer);
                                if &rt != when_true || &rf != when_false {
                                    self.rewrites += 1;
                                }
                                *when_true = rt;
                                *when_false = rf;
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl<'a> TemplateVisitor for ClassAttrVisitor<'a> {
    fn visit_element(&mut self, element: &mut ElementNode) {
        self.visit_attrs(element);
        crate::visitor::walk_element(self, element);
    }
}

/// Applies the CSS layer prefix (§4.5) to `root` and to `local_constants`
/// transitively referenced by dynamic class expressions in the IR. Returns
/// the number of rewrites performed — purely informational (ambient logging
/// reports it at the pass boundary; nothing downstream branches on it).
/// Idempotent: a second call with the same `layer` is a no-op (§8).
pub fn apply_css_layer_prefix(root: &mut TemplateNode, local_constants: &mut [LocalConstant], layer: &str) -> u32 {
    let mut visitor = ClassAttrVisitor {
        layer,
        rewrites: 0,
        referenced_constants: HashSet::new(),
    };
    visitor.visit_node(root);

    let mut referenced = visitor.referenced_constants;
    loop {
        let mut grew = false;
        for c in local_constants.iter() {
            if !referenced.contains(&c.name) {
                continue;
            }
            for ident in free_identifiers_outside_strings(&c.value) {
                if local_constants.iter().any(|other| other.name == ident) && referenced.insert(ident) {
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }

    let mut rewrites = visitor.rewrites;
    for c in local_constants.iter_mut() {
        if !referenced.contains(&c.name) || !is_class_like_initializer(&c.value) {
            continue;
        }
        let rewritten = rewrite_quoted_tokens(&c.value, layer);
        if rewritten != c.value {
            rewrites += 1;
        }
        c.value = rewritten;
    }
    rewrites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Attribute, SourceLocation};

    fn el_with_class(value: &str, dynamic: bool) -> TemplateNode {
        TemplateNode::Element(ElementNode {
            tag: "div".into(),
            attrs: vec![Attribute {
                name: "class".into(),
                value: AttrValue::Text(value.to_string()),
                dynamic,
                is_literal: !dynamic,
                presence_or_undefined: false,
                loc: SourceLocation::default(),
            }],
            events: vec![],
            ref_binding: None,
            children: vec![],
            slot_id: None,
            needs_scope: false,
            loc: SourceLocation::default(),
        })
    }

    #[test]
    fn prefixes_static_class_tokens() {
        let mut root = el_with_class("flex items-center", false);
        apply_css_layer_prefix(&mut root, &mut [], "card");
        let TemplateNode::Element(el) = &root else { panic!() };
        let AttrValue::Text(s) = &el.attrs[0].value else { panic!() };
        assert_eq!(s, "layer-card:flex layer-card:items-center");
    }

    #[test]
    fn idempotent_on_second_application() {
        let mut root = el_with_class("flex", false);
        apply_css_layer_prefix(&mut root, &mut [], "card");
        let once = {
            let TemplateNode::Element(el) = &root else { panic!() };
            let AttrValue::Text(s) = &el.attrs[0].value else { panic!() };
            s.clone()
        };
        apply_css_layer_prefix(&mut root, &mut [], "card");
        let TemplateNode::Element(el) = &root else { panic!() };
        let AttrValue::Text(s) = &el.attrs[0].value else { panic!() };
        assert_eq!(s, &once);
    }

    #[test]
    fn dynamic_class_marks_referenced_constant() {
        let mut root = el_with_class("baseClasses", true);
        let mut locals = vec![LocalConstant {
            name: "baseClasses".into(),
            value: "\"flex items-center\"".into(),
            type_hint: None,
        }];
        apply_css_layer_prefix(&mut root, &mut locals, "card");
        assert_eq!(locals[0].value, "\"layer-card:flex layer-card:items-center\"");
    }

    #[test]
    fn non_class_constant_left_untouched() {
        let mut root = el_with_class("x", true);
        let mut locals = vec![LocalConstant {
            name: "x".into(),
            value: "computeClasses()".into(),
            type_hint: None,
        }];
        apply_css_layer_prefix(&mut root, &mut locals, "card");
        assert_eq!(locals[0].value, "computeClasses()");
    }

    #[test]
    fn object_literal_values_are_rewritten() {
        let mut root = el_with_class("variants", true);
        let mut locals = vec![LocalConstant {
            name: "variants".into(),
            value: "{ primary: \"bg-blue\", secondary: \"bg-gray\" }".into(),
            type_hint: None,
        }];
        apply_css_layer_prefix(&mut root, &mut locals, "ui");
        assert!(locals[0].value.contains("layer-ui:bg-blue"));
        assert!(locals[0].value.contains("layer-ui:bg-gray"));
    }
}
