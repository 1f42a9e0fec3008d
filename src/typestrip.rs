//! Type-strip (§4.2): erase TypeScript-only syntax from a source-like string
//! so the emitted client script is valid JS.
//!
//! This mirrors the constructs `jsx_lowerer.rs`'s AST-based renamer removes
//! (`TSAsExpression`, `TSNonNullExpression`, `TSSatisfiesExpression`, generic
//! type arguments) but is reimplemented as regex-class rewrites over a raw
//! string per SPEC_FULL §4.2/§9 — the spec treats type-strip as a standalone
//! textual pass distinct from full-AST manipulation, since it must run over
//! opaque code snippets (event handler bodies, local constant initializers)
//! that were never given to the AST renamer in the first place.
//!
//! Intentionally approximate: a regex-class approach cannot perfectly
//! disambiguate every TS construct from adjacent JS syntax. §8's guard test
//! (`has_type_residual`) is the backstop that catches anything this pass
//! misses.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `as <Type>` assertions, including unions/generics/arrays: `x as Foo`,
    /// `x as Foo[]`, `x as Foo<Bar>`, `x as Foo | Bar`.
    static ref AS_ASSERTION_RE: Regex = Regex::new(
        r"\s+as\s+[A-Za-z_$][A-Za-z0-9_$.]*(?:<[^>;{}]*>)?(?:\[\])*(?:\s*\|\s*[A-Za-z_$][A-Za-z0-9_$.]*(?:<[^>;{}]*>)?(?:\[\])*)*"
    ).unwrap();

    /// Non-null postfix `!`, never consuming `!==`/`!=`. Matches an identifier,
    /// closing paren/bracket, or member tail immediately followed by `!` that
    /// is not itself followed by `=`.
    static ref NON_NULL_RE: Regex = Regex::new(r"([A-Za-z0-9_$\)\]])!(?!=)").unwrap();

    /// `x is T` type predicates in a parameter position, e.g. `(x: x is Foo) =>`.
    static ref TYPE_PREDICATE_RE: Regex = Regex::new(
        r":\s*[A-Za-z_$][A-Za-z0-9_$]*\s+is\s+[A-Za-z_$][A-Za-z0-9_$.<>,\[\]\s|]*(?=\s*\))"
    ).unwrap();

    /// Return-type annotations on arrow functions: `): T =>`.
    static ref ARROW_RETURN_TYPE_RE: Regex = Regex::new(
        r"\)\s*:\s*[A-Za-z_$][A-Za-z0-9_$.<>,\[\]\s|&]*?(?=\s*=>)"
    ).unwrap();

    /// Generic type arguments on `new` and call expressions: `new Foo<Bar>(`,
    /// `foo<Bar>(`.
    static ref GENERIC_CALL_RE: Regex = Regex::new(
        r"([A-Za-z_$][A-Za-z0-9_$]*)<([A-Za-z_$][A-Za-z0-9_$,\s\[\]<>]*)>(\s*\()"
    ).unwrap();

    /// Parameter type annotations: `name: Type` in a parameter list, skipping
    /// object-literal properties like `bubbles: true` by requiring the
    /// trailing token to look like a type (capitalized identifier, primitive
    /// keyword, or bracketed/union shape) rather than a value literal.
    static ref PARAM_TYPE_RE: Regex = Regex::new(
        r"([A-Za-z_$][A-Za-z0-9_$]*\??)\s*:\s*(string|number|boolean|any|unknown|void|never|object|[A-Z][A-Za-z0-9_$]*(?:<[^>,(){}]*>)?(?:\[\])?(?:\s*\|\s*[A-Za-z_$][A-Za-z0-9_$]*(?:\[\])?)*)(?=\s*[,)=])"
    ).unwrap();

    /// Variable-declaration type annotations: `let x: T` / `const x: T = ...`.
    static ref VAR_DECL_TYPE_RE: Regex = Regex::new(
        r"((?:let|const|var)\s+[A-Za-z_$][A-Za-z0-9_$]*)\s*:\s*[A-Za-z_$][A-Za-z0-9_$.<>,\[\]\s|&]*?(?=\s*[=;\n])"
    ).unwrap();
}

/// Erase TypeScript-only syntax from `source`, leaving everything else
/// byte-identical (§4.2).
pub fn strip_types(source: &str) -> String {
    let mut out = source.to_string();
    out = GENERIC_CALL_RE.replace_all(&out, "$1$3").to_string();
    out = ARROW_RETURN_TYPE_RE.replace_all(&out, ")").to_string();
    out = TYPE_PREDICATE_RE.replace_all(&out, "").to_string();
    out = AS_ASSERTION_RE.replace_all(&out, "").to_string();
    out = VAR_DECL_TYPE_RE.replace_all(&out, "$1").to_string();
    out = PARAM_TYPE_RE.replace_all(&out, "$1").to_string();
    out = NON_NULL_RE.replace_all(&out, "$1").to_string();
    out
}

/// §8 guard: detects TypeScript-only syntax surviving in emitted client JS.
/// A hard error (`TypeStripResidual`, §7) if any of these patterns match.
pub fn has_type_residual(emitted: &str) -> bool {
    lazy_static! {
        static ref INTERFACE_RE: Regex = Regex::new(r"\binterface\s+[A-Za-z_$]").unwrap();
        static ref TYPE_ALIAS_RE: Regex = Regex::new(r"\btype\s+[A-Za-z_$][A-Za-z0-9_$]*\s*=").unwrap();
        static ref GENERIC_CALL_RESIDUAL_RE: Regex =
            Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*<[A-Za-z_$][A-Za-z0-9_$,\s\[\]<>]*>\s*\(").unwrap();
    }
    INTERFACE_RE.is_match(emitted)
        || TYPE_ALIAS_RE.is_match(emitted)
        || AS_ASSERTION_RE.is_match(emitted)
        || NON_NULL_RE.is_match(emitted)
        || VAR_DECL_TYPE_RE.is_match(emitted)
        || PARAM_TYPE_RE.is_match(emitted)
        || GENERIC_CALL_RESIDUAL_RE.is_match(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_param_type_without_mangling_object_property() {
        let src = "function f(x: number) { return { bubbles: true }; }";
        let stripped = strip_types(src);
        assert!(!stripped.contains(": number"));
        assert!(stripped.contains("bubbles: true"));
    }

    #[test]
    fn strips_as_assertion() {
        assert_eq!(strip_types("const x = y as Foo;"), "const x = y;");
        assert_eq!(strip_types("const x = y as Foo[];"), "const x = y;");
    }

    #[test]
    fn strips_non_null_but_keeps_not_equal() {
        let out = strip_types("a! + (b)! - c !== d");
        assert_eq!(out, "a + (b) - c !== d");
    }

    #[test]
    fn strips_arrow_return_type() {
        let out = strip_types("const f = (x: number): number => x + 1;");
        assert!(!out.contains(": number =>"));
        assert!(out.contains("(x) => x + 1"));
    }

    #[test]
    fn strips_generic_call_args() {
        let out = strip_types("new Map<string, number>(); useState<Foo>(0);");
        assert_eq!(out, "new Map(); useState(0);");
    }

    #[test]
    fn strips_variable_decl_type() {
        let out = strip_types("let count: number = 0;");
        assert_eq!(out, "let count = 0;");
    }

    #[test]
    fn residual_guard_flags_surviving_constructs() {
        assert!(has_type_residual("interface Props { x: number }"));
        assert!(has_type_residual("type Foo = string;"));
        assert!(has_type_residual("const x = y as Foo;"));
        assert!(!has_type_residual("const x = y;"));
    }

    #[test]
    fn round_trips_clean_js_untouched() {
        let src = "const onClick = () => setCount(n => n + 1);";
        assert_eq!(strip_types(src), src);
    }
}
