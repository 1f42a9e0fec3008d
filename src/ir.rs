//! Intermediate Representation: the polymorphic tree produced by lowering (§4.4)
//! and consumed by the CSS layer prefixer, the client-JS generator, and template
//! adapters.
//!
//! `TemplateNode` is a tagged sum; every pass matches it exhaustively rather than
//! downcasting. Traversal goes through `crate::visitor::TemplateVisitor` so every
//! pass shares one walk order.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const INV_UNRESOLVED_IDENTIFIER: &str = "Z-ERR-SCOPE-002";
pub const INV_MISSING_REQUIRED_PROP: &str = "Z-ERR-PROVIDER-001";
pub const INV_TYPE_STRIP_RESIDUAL: &str = "Z-ERR-TYPESTRIP-001";
pub const INV_UNSUPPORTED_JSX_PATTERN: &str = "Z-WARN-JSX-001";
pub const INV_MALFORMED_COMPONENT_SHAPE: &str = "Z-ERR-SHAPE-001";
pub const INV_DESTRUCTURED_PROPS_ADVISORY: &str = "Z-ADV-PROPS-001";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        INV_UNRESOLVED_IDENTIFIER => {
            "Every free identifier in an expression or event handler resolves to a scope, prop, or local binding."
        }
        INV_MISSING_REQUIRED_PROP => "A Provider's `value` prop is always present.",
        INV_TYPE_STRIP_RESIDUAL => "No TypeScript-only syntax survives into emitted client JS.",
        INV_UNSUPPORTED_JSX_PATTERN => {
            "A `.map()` predicate/comparator that cannot be lowered to server-template code is flagged, not silently dropped."
        }
        INV_MALFORMED_COMPONENT_SHAPE => "A component has a resolvable props shape and a markup return.",
        INV_DESTRUCTURED_PROPS_ADVISORY => {
            "Destructuring patterns that limit reactivity are flagged, not silently accepted."
        }
        _ => "Unknown invariant.",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(string_enum))]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A diagnostic kind carried in a per-compile list (§7). Diagnostics are data,
/// never a `Result::Err` that aborts a compile — see `crate::error` for the
/// separate hard-failure tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct CompilerError {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub guarantee: String,
    pub loc: SourceLocation,
    pub suggestion: Option<String>,
}

impl CompilerError {
    pub fn error(code: &str, message: impl Into<String>, loc: SourceLocation) -> Self {
        Self::with_suggestion(code, Severity::Error, message, loc, None)
    }

    pub fn warning(code: &str, message: impl Into<String>, loc: SourceLocation) -> Self {
        Self::with_suggestion(code, Severity::Warning, message, loc, None)
    }

    pub fn with_suggestion(
        code: &str,
        severity: Severity,
        message: impl Into<String>,
        loc: SourceLocation,
        suggestion: Option<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            severity,
            message: message.into(),
            guarantee: get_guarantee(code).to_string(),
            loc,
            suggestion,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLOT IDS
// ═══════════════════════════════════════════════════════════════════════════════

/// An opaque hydration-anchor token, e.g. `s0`, `s1`, or a parent-owned `^s3`.
/// Minting is owned by the lowering pass instance (§5) — never a process-global
/// counter.
pub type SlotId = String;

pub fn is_parent_owned(slot: &str) -> bool {
    slot.starts_with('^')
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES / EVENTS / PROPS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AttrValue {
    /// A plain string, static or the raw code of a dynamic expression.
    Text(String),
    /// A template literal with ternary interpolations lifted into structured parts
    /// (§3.2 `IRTemplateLiteral`, §9 "template literals with ternary interpolations").
    TemplateLiteral(IrTemplateLiteral),
    /// Boolean attribute shorthand (`<input disabled />`).
    BoolShorthand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrTemplateLiteral {
    pub parts: Vec<TemplateLiteralPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TemplateLiteralPart {
    StringPart { value: String },
    TernaryPart {
        condition: String,
        when_true: String,
        when_false: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub dynamic: bool,
    pub is_literal: bool,
    /// Marks the `expr || undefined` pattern (rendered via setAttribute/removeAttribute).
    #[serde(default)]
    pub presence_or_undefined: bool,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBinding {
    /// Lowercased, `on` prefix stripped (e.g. `click`, not `onClick`).
    pub name: String,
    /// Opaque handler code, as written in source.
    pub handler: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentProp {
    pub name: String,
    pub value: AttrValue,
    pub dynamic: bool,
    pub is_literal: bool,
    /// True when `name` begins with `on` followed by an uppercase letter.
    #[serde(default)]
    pub is_event_handler: bool,
    #[serde(default)]
    pub loc: SourceLocation,
}

impl ComponentProp {
    pub fn classify_event_handler(name: &str) -> bool {
        let mut chars = name.chars();
        matches!((chars.next(), chars.next()), (Some('o'), Some('n')))
            && name
                .chars()
                .nth(2)
                .map(|c| c.is_ascii_uppercase())
                .unwrap_or(false)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IR NODES (§3.2)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Expression(ExpressionNode),
    Conditional(ConditionalNode),
    Loop(LoopNode),
    Component(ComponentNode),
    Fragment(FragmentNode),
    Provider(ProviderNode),
    IfStatement(IfStatementNode),
}

impl TemplateNode {
    pub fn loc(&self) -> SourceLocation {
        match self {
            TemplateNode::Element(n) => n.loc,
            TemplateNode::Text(n) => n.loc,
            TemplateNode::Expression(n) => n.loc,
            TemplateNode::Conditional(n) => n.loc,
            TemplateNode::Loop(n) => n.loc,
            TemplateNode::Component(n) => n.loc,
            TemplateNode::Fragment(n) => n.loc,
            TemplateNode::Provider(n) => n.loc,
            TemplateNode::IfStatement(n) => n.loc,
        }
    }

    /// Every minted slot id directly owned by this node (not its descendants).
    pub fn own_slot_id(&self) -> Option<&SlotId> {
        match self {
            TemplateNode::Element(n) => n.slot_id.as_ref(),
            TemplateNode::Expression(n) => n.slot_id.as_ref(),
            TemplateNode::Conditional(n) => n.slot_id.as_ref(),
            TemplateNode::Loop(n) => n.slot_id.as_ref(),
            TemplateNode::Component(n) => Some(&n.slot_id),
            _ => None,
        }
    }

    /// Every slot id minted anywhere in this subtree, in walk order (§8).
    pub fn slot_ids(&self) -> Vec<SlotId> {
        let mut out = Vec::new();
        crate::visitor::walk_collect_slots(self, &mut out);
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    #[serde(default)]
    pub attrs: Vec<Attribute>,
    #[serde(default)]
    pub events: Vec<EventBinding>,
    #[serde(default)]
    pub ref_binding: Option<String>,
    pub children: Vec<TemplateNode>,
    pub slot_id: Option<SlotId>,
    /// "This element is the hydration anchor for its component instance."
    #[serde(default)]
    pub needs_scope: bool,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    /// Whitespace-normalized literal string.
    pub value: String,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    pub expr: String,
    pub reactive: bool,
    pub slot_id: Option<SlotId>,
    #[serde(default)]
    pub client_only: bool,
    /// Destructured prop names this expression references as bare identifiers.
    #[serde(default)]
    pub prop_refs: Vec<String>,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalNode {
    pub condition: String,
    pub when_true: Box<TemplateNode>,
    pub when_false: Option<Box<TemplateNode>>,
    pub reactive: bool,
    pub slot_id: Option<SlotId>,
    #[serde(default)]
    pub client_only: bool,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortComparator {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ChainOrder {
    FilterSort,
    SortFilter,
    FilterOnly,
    SortOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopNode {
    /// The iterable expression, with any extracted filter/sort chain peeled off.
    pub array: String,
    pub param: String,
    pub index: Option<String>,
    pub key: Option<String>,
    pub children: Vec<TemplateNode>,
    /// A loop never mints its own slot id; it inherits its parent element's via
    /// propagation (§4.4 "Loop-slot propagation").
    pub slot_id: Option<SlotId>,
    /// True iff `array` does not reference a signal or memo.
    pub is_static_array: bool,
    pub child_component: Option<String>,
    #[serde(default)]
    pub nested_components: Vec<String>,
    pub filter_predicate: Option<String>,
    pub sort_comparator: Option<SortComparator>,
    pub chain_order: Option<ChainOrder>,
    #[serde(default)]
    pub client_only: bool,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    pub name: String,
    pub props: Vec<ComponentProp>,
    /// Slotted children passed between `<Comp>` and `</Comp>`.
    pub children: Vec<TemplateNode>,
    /// A component slot id always exists — the child may hydrate its own state
    /// even without reactive props (§3.2).
    pub slot_id: SlotId,
    /// Opaque template text the adapter produced for this child, if compiled
    /// as part of the same unit.
    pub template: Option<String>,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentNode {
    pub children: Vec<TemplateNode>,
    /// Transparent ⇔ single child is `children` / `props.children` / `<propsObj>.children`.
    #[serde(default)]
    pub transparent: bool,
    /// A root fragment with multiple children bears a comment-based scope marker.
    #[serde(default)]
    pub needs_scope_comment: bool,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderNode {
    pub context_name: String,
    pub value_prop: String,
    pub children: Vec<TemplateNode>,
    #[serde(default)]
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfStatementNode {
    pub condition: String,
    pub consequent: Box<TemplateNode>,
    pub alternate: Option<Box<TemplateNode>>,
    /// Local bindings declared in the block preceding this branch's return.
    pub scope_variables: Vec<String>,
    #[serde(default)]
    pub loc: SourceLocation,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROOT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentIr {
    pub component_name: String,
    pub file_path: String,
    pub root: TemplateNode,
    /// Nominal type declarations retained verbatim for the template adapter
    /// (`AnalyzerContext::type_definitions`, §3.1).
    #[serde(default)]
    pub type_definitions: Vec<String>,
    #[serde(default)]
    pub errors: Vec<CompilerError>,
}

/// `{ version: "0.1", metadata, root, errors }` (§6.5).
pub const IR_SCHEMA_VERSION: &str = "0.1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrDump {
    pub version: String,
    pub metadata: IrDumpMetadata,
    pub root: TemplateNode,
    pub errors: Vec<CompilerError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrDumpMetadata {
    pub component_name: String,
    pub file_path: String,
}

impl IrDump {
    pub fn from_ir(ir: &ComponentIr) -> Self {
        IrDump {
            version: IR_SCHEMA_VERSION.to_string(),
            metadata: IrDumpMetadata {
                component_name: ir.component_name.clone(),
                file_path: ir.file_path.clone(),
            },
            root: ir.root.clone(),
            errors: ir.errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_handler_prop_classification() {
        assert!(ComponentProp::classify_event_handler("onClick"));
        assert!(ComponentProp::classify_event_handler("onChange"));
        assert!(!ComponentProp::classify_event_handler("online"));
        assert!(!ComponentProp::classify_event_handler("on"));
        assert!(!ComponentProp::classify_event_handler("only"));
    }

    #[test]
    fn parent_owned_slot_detection() {
        assert!(is_parent_owned("^s3"));
        assert!(!is_parent_owned("s3"));
    }
}
