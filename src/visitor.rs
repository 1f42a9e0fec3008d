//! Single authoritative traversal mechanism for `TemplateNode` trees (§3.3,
//! §9 "Polymorphic IR"). Every pass that needs to walk the IR — slot
//! propagation, CSS prefixing, codegen — shares this walk order instead of
//! re-implementing recursion.
//!
//! Rules:
//! 1. Traversal order is fixed and matches source-appearance order.
//! 2. Implementers override `visit_*` methods to add behavior.
//! 3. Implementers MUST call the matching `walk_*` function to continue
//!    traversal unless pruning is intended.

use crate::ir::{
    ComponentNode, ConditionalNode, ElementNode, ExpressionNode, FragmentNode, IfStatementNode,
    LoopNode, ProviderNode, SlotId, TemplateNode, TextNode,
};

pub trait TemplateVisitor {
    fn visit_node(&mut self, node: &mut TemplateNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &mut ElementNode) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &mut TextNode) {}

    fn visit_expression(&mut self, _expression: &mut ExpressionNode) {}

    fn visit_conditional(&mut self, conditional: &mut ConditionalNode) {
        walk_conditional(self, conditional);
    }

    fn visit_loop(&mut self, loop_node: &mut LoopNode) {
        walk_loop(self, loop_node);
    }

    fn visit_component(&mut self, component: &mut ComponentNode) {
        walk_component(self, component);
    }

    fn visit_fragment(&mut self, fragment: &mut FragmentNode) {
        walk_fragment(self, fragment);
    }

    fn visit_provider(&mut self, provider: &mut ProviderNode) {
        walk_provider(self, provider);
    }

    fn visit_if_statement(&mut self, if_stmt: &mut IfStatementNode) {
        walk_if_statement(self, if_stmt);
    }

    fn visit_children(&mut self, children: &mut Vec<TemplateNode>) {
        walk_children(self, children);
    }
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(visitor: &mut V, children: &mut Vec<TemplateNode>) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &mut TemplateNode) {
    match node {
        TemplateNode::Element(el) => visitor.visit_element(el),
        TemplateNode::Text(t) => visitor.visit_text(t),
        TemplateNode::Expression(e) => visitor.visit_expression(e),
        TemplateNode::Conditional(c) => visitor.visit_conditional(c),
        TemplateNode::Loop(l) => visitor.visit_loop(l),
        TemplateNode::Component(c) => visitor.visit_component(c),
        TemplateNode::Fragment(f) => visitor.visit_fragment(f),
        TemplateNode::Provider(p) => visitor.visit_provider(p),
        TemplateNode::IfStatement(s) => visitor.visit_if_statement(s),
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &mut ElementNode) {
    visitor.visit_children(&mut element.children);
}

pub fn walk_conditional<V: TemplateVisitor + ?Sized>(visitor: &mut V, conditional: &mut ConditionalNode) {
    visitor.visit_node(&mut conditional.when_true);
    if let Some(alt) = conditional.when_false.as_mut() {
        visitor.visit_node(alt);
    }
}

pub fn walk_loop<V: TemplateVisitor + ?Sized>(visitor: &mut V, loop_node: &mut LoopNode) {
    visitor.visit_children(&mut loop_node.children);
}

pub fn walk_component<V: TemplateVisitor + ?Sized>(visitor: &mut V, component: &mut ComponentNode) {
    visitor.visit_children(&mut component.children);
}

pub fn walk_fragment<V: TemplateVisitor + ?Sized>(visitor: &mut V, fragment: &mut FragmentNode) {
    visitor.visit_children(&mut fragment.children);
}

pub fn walk_provider<V: TemplateVisitor + ?Sized>(visitor: &mut V, provider: &mut ProviderNode) {
    visitor.visit_children(&mut provider.children);
}

pub fn walk_if_statement<V: TemplateVisitor + ?Sized>(visitor: &mut V, if_stmt: &mut IfStatementNode) {
    visitor.visit_node(&mut if_stmt.consequent);
    if let Some(alt) = if_stmt.alternate.as_mut() {
        visitor.visit_node(alt);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// READ-ONLY SLOT COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Collects every slot id minted in a subtree, in walk order. Used by
/// `TemplateNode::slot_ids` and by §8's "every minted slot id is referenced"
/// test.
pub fn walk_collect_slots(node: &TemplateNode, out: &mut Vec<SlotId>) {
    match node {
        TemplateNode::Element(el) => {
            if let Some(id) = &el.slot_id {
                out.push(id.clone());
            }
            for child in &el.children {
                walk_collect_slots(child, out);
            }
        }
        TemplateNode::Text(_) => {}
        TemplateNode::Expression(e) => {
            if let Some(id) = &e.slot_id {
                out.push(id.clone());
            }
        }
        TemplateNode::Conditional(c) => {
            if let Some(id) = &c.slot_id {
                out.push(id.clone());
            }
            walk_collect_slots(&c.when_true, out);
            if let Some(alt) = &c.when_false {
                walk_collect_slots(alt, out);
            }
        }
        TemplateNode::Loop(l) => {
            if let Some(id) = &l.slot_id {
                out.push(id.clone());
            }
            for child in &l.children {
                walk_collect_slots(child, out);
            }
        }
        TemplateNode::Component(c) => {
            out.push(c.slot_id.clone());
            for child in &c.children {
                walk_collect_slots(child, out);
            }
        }
        TemplateNode::Fragment(f) => {
            for child in &f.children {
                walk_collect_slots(child, out);
            }
        }
        TemplateNode::Provider(p) => {
            for child in &p.children {
                walk_collect_slots(child, out);
            }
        }
        TemplateNode::IfStatement(s) => {
            walk_collect_slots(&s.consequent, out);
            if let Some(alt) = &s.alternate {
                walk_collect_slots(alt, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SourceLocation;

    #[test]
    fn collects_slots_in_walk_order() {
        let root = TemplateNode::Element(ElementNode {
            tag: "div".into(),
            attrs: vec![],
            events: vec![],
            ref_binding: None,
            children: vec![
                TemplateNode::Expression(ExpressionNode {
                    expr: "count()".into(),
                    reactive: true,
                    slot_id: Some("s0".into()),
                    client_only: false,
                    prop_refs: vec![],
                    loc: SourceLocation::default(),
                }),
                TemplateNode::Component(ComponentNode {
                    name: "Child".into(),
                    props: vec![],
                    children: vec![],
                    slot_id: "s1".into(),
                    template: None,
                    loc: SourceLocation::default(),
                }),
            ],
            slot_id: Some("s_root".into()),
            needs_scope: true,
            loc: SourceLocation::default(),
        });
        assert_eq!(root.slot_ids(), vec!["s_root", "s0", "s1"]);
    }
}
