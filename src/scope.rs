//! Identifier classification (§4.3 "Reactivity test", §4.4).
//!
//! The analyzer and IR lowering both need to know, for a bare identifier
//! found inside an expression or event handler body, whether it names a
//! signal getter, a memo, a prop, a local constant/function, or something
//! from the ambient JS/runtime environment. `ScopeBindings` is the shared
//! lookup table; `classify` is the single place the priority order lives.

use std::collections::HashSet;

lazy_static::lazy_static! {
    /// Identifiers that are never unresolved: the reactivity primitives this
    /// dialect's runtime provides, plus standard JS globals available in a
    /// browser/module context.
    pub static ref AMBIENT_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("createSignal");
        s.insert("createMemo");
        s.insert("createEffect");
        s.insert("onMount");
        s.insert("onCleanup");
        s.insert("children");
        s.insert("props");

        s.insert("Math");
        s.insert("console");
        s.insert("JSON");
        s.insert("Date");
        s.insert("String");
        s.insert("Number");
        s.insert("Boolean");
        s.insert("Array");
        s.insert("Object");
        s.insert("Promise");
        s.insert("Map");
        s.insert("Set");
        s.insert("Error");
        s.insert("undefined");
        s.insert("null");
        s.insert("true");
        s.insert("false");
        s.insert("NaN");
        s.insert("Infinity");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("window");
        s.insert("document");
        s
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCategory {
    /// Scope-stack local: function param, loop var, catch param, arrow param.
    ScopeLocal,
    /// A signal getter (`count` in `const [count, setCount] = createSignal(0)`).
    SignalGetter,
    /// A signal setter.
    SignalSetter,
    Memo,
    /// A destructured prop, or a field read off an object-form props parameter.
    Prop,
    /// A top-level `const`/`let`/`function` declaration.
    Local,
    Global,
}

/// The complete set of known identifiers for one component, used to classify
/// any free identifier found while analyzing expressions (§4.3, §4.4).
/// Classification priority, matching an oxc-`Visit`-based scope stack layered
/// on top: scope-stack locals > component locals > signals/memos > props >
/// globals > unresolved.
#[derive(Debug, Clone, Default)]
pub struct ScopeBindings {
    pub scope_locals: HashSet<String>,
    pub signal_getters: HashSet<String>,
    pub signal_setters: HashSet<String>,
    pub memos: HashSet<String>,
    pub props: HashSet<String>,
    pub locals: HashSet<String>,
}

impl ScopeBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, name: &str) -> Option<IdentifierCategory> {
        if self.scope_locals.contains(name) {
            Some(IdentifierCategory::ScopeLocal)
        } else if self.locals.contains(name) {
            Some(IdentifierCategory::Local)
        } else if self.signal_getters.contains(name) {
            Some(IdentifierCategory::SignalGetter)
        } else if self.signal_setters.contains(name) {
            Some(IdentifierCategory::SignalSetter)
        } else if self.memos.contains(name) {
            Some(IdentifierCategory::Memo)
        } else if self.props.contains(name) {
            Some(IdentifierCategory::Prop)
        } else if AMBIENT_GLOBALS.contains(name) {
            Some(IdentifierCategory::Global)
        } else {
            None
        }
    }

    /// An expression is reactive (§4.4) if it mentions any signal getter by
    /// call form, any memo by call form, any non-`children` prop name as a
    /// free identifier, or a local constant whose own value is reactive
    /// (transitively — callers pass an expanded `reactive_locals` set for
    /// that transitive closure).
    pub fn is_reactive_identifier(&self, name: &str, reactive_locals: &HashSet<String>) -> bool {
        if name == "children" {
            return false;
        }
        self.signal_getters.contains(name)
            || self.memos.contains(name)
            || self.props.contains(name)
            || reactive_locals.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_locals_before_props() {
        let mut b = ScopeBindings::new();
        b.locals.insert("x".into());
        b.props.insert("x".into());
        assert_eq!(b.classify("x"), Some(IdentifierCategory::Local));
    }

    #[test]
    fn scope_stack_locals_win_over_everything() {
        let mut b = ScopeBindings::new();
        b.scope_locals.insert("item".into());
        b.props.insert("item".into());
        assert_eq!(b.classify("item"), Some(IdentifierCategory::ScopeLocal));
    }

    #[test]
    fn children_prop_is_never_reactive() {
        let mut b = ScopeBindings::new();
        b.props.insert("children".into());
        assert!(!b.is_reactive_identifier("children", &HashSet::new()));
    }

    #[test]
    fn unresolved_identifier_is_none() {
        let b = ScopeBindings::new();
        assert_eq!(b.classify("totallyUnknown"), None);
    }
}
