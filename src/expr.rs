//! Closed expression sub-language parser and support-level classifier (§4.1).
//!
//! This is not a full JavaScript parser — it admits only the shapes the IR
//! lowering pass needs to reason about structurally: identifiers, literals,
//! member/call chains, unary/binary/logical/conditional operators, a single
//! arrow form, and the `filter`/`every`/`some` higher-order pattern. Anything
//! else parses to `Expr::Unrecognized` rather than raising — `parse` is total.
//!
//! Every node retains its exact source slice (`raw`), so `expr_to_string` is
//! a trivial, always-exact left inverse of `parse` rather than a
//! pretty-printer that could drift from the original formatting.

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Lte,
    Gt,
    Gte,
    EqStrict,
    NeqStrict,
    EqLoose,
    NeqLoose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HigherOrderMethod {
    Filter,
    Every,
    Some,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    Name(String),
    /// Bracket access with a string-literal key only (`obj['key']`).
    StringIndex(String),
}

/// A node in the closed sub-language. `raw` is the exact trimmed source text
/// this node was parsed from; it is what `expr_to_string` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub raw: String,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Identifier(String),
    Literal(Literal),
    /// A call expression. Nullary iff `args.is_empty()`.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: MemberProp,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    /// `x => expr` — a single identifier parameter, expression body.
    Arrow {
        param: String,
        body: Box<Expr>,
    },
    /// `<base>.filter(<predicate>)` etc., recognized as a distinct shape so
    /// the lowering pass can extract it without re-deriving it from `Call`.
    HigherOrder {
        method: HigherOrderMethod,
        target: Box<Expr>,
        predicate: Box<Expr>,
    },
    /// Syntactically well-formed input from outside the closed sub-language
    /// (or malformed input) — carried, not raised, per §4.1's contract.
    Unrecognized,
}

/// `exprToString(parseExpression(s)) == s` for any admitted input (§8) — here
/// true unconditionally, since every node keeps its own verbatim source slice.
pub fn expr_to_string(expr: &Expr) -> String {
    expr.raw.clone()
}

pub fn parse(text: &str) -> Expr {
    let trimmed = text.trim();
    let mut p = Parser::new(trimmed);
    match p.parse_conditional() {
        Some(expr) if p.at_end() => expr,
        _ => Expr {
            raw: trimmed.to_string(),
            kind: ExprKind::Unrecognized,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUPPORT LEVELS (§4.1)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SupportLevel {
    L1,
    L2,
    L3,
    L4,
    L5,
    L5Unsupported,
}

#[derive(Debug, Clone)]
pub struct SupportResult {
    pub supported: bool,
    pub level: SupportLevel,
    pub reason: Option<String>,
}

fn max_level(a: SupportLevel, b: SupportLevel) -> SupportLevel {
    if a as u8 >= b as u8 {
        a
    } else {
        b
    }
}

pub fn is_supported(expr: &Expr) -> SupportResult {
    classify(expr)
}

fn classify(expr: &Expr) -> SupportResult {
    match &expr.kind {
        ExprKind::Unrecognized => SupportResult {
            supported: false,
            level: SupportLevel::L5Unsupported,
            reason: Some("expression is outside the closed sub-language".to_string()),
        },
        ExprKind::Identifier(_) | ExprKind::Literal(_) => SupportResult {
            supported: true,
            level: SupportLevel::L1,
            reason: None,
        },
        ExprKind::Call { args, .. } if args.is_empty() => SupportResult {
            supported: true,
            level: SupportLevel::L1,
            reason: None,
        },
        ExprKind::Call { .. } => SupportResult {
            supported: false,
            level: SupportLevel::L5Unsupported,
            reason: Some("only nullary calls and filter/every/some are admitted".to_string()),
        },
        ExprKind::Member { object, .. } => {
            let inner = classify(object);
            SupportResult {
                supported: inner.supported,
                level: max_level(inner.level, SupportLevel::L2),
                reason: inner.reason,
            }
        }
        ExprKind::Unary { op: UnaryOp::Not, operand } => {
            let inner = classify(operand);
            SupportResult {
                supported: inner.supported,
                level: max_level(inner.level, SupportLevel::L4),
                reason: inner.reason,
            }
        }
        ExprKind::Unary { op: UnaryOp::Neg, operand } => {
            let inner = classify(operand);
            SupportResult {
                supported: inner.supported,
                level: max_level(inner.level, SupportLevel::L3),
                reason: inner.reason,
            }
        }
        ExprKind::Binary { left, right, .. } => {
            let l = classify(left);
            let r = classify(right);
            SupportResult {
                supported: l.supported && r.supported,
                level: max_level(max_level(l.level, r.level), SupportLevel::L3),
                reason: l.reason.or(r.reason),
            }
        }
        ExprKind::Logical { left, right, .. } => {
            let l = classify(left);
            let r = classify(right);
            SupportResult {
                supported: l.supported && r.supported,
                level: max_level(max_level(l.level, r.level), SupportLevel::L4),
                reason: l.reason.or(r.reason),
            }
        }
        ExprKind::Conditional { condition, when_true, when_false } => {
            let c = classify(condition);
            let t = classify(when_true);
            let f = classify(when_false);
            SupportResult {
                supported: c.supported && t.supported && f.supported,
                level: max_level(max_level(max_level(c.level, t.level), f.level), SupportLevel::L4),
                reason: c.reason.or(t.reason).or(f.reason),
            }
        }
        ExprKind::Arrow { .. } => SupportResult {
            supported: false,
            level: SupportLevel::L5Unsupported,
            reason: Some("standalone arrow expressions are not server-renderable".to_string()),
        },
        ExprKind::HigherOrder { method, target, predicate } => {
            if !matches!(
                method,
                HigherOrderMethod::Filter | HigherOrderMethod::Every | HigherOrderMethod::Some
            ) {
                return SupportResult {
                    supported: false,
                    level: SupportLevel::L5Unsupported,
                    reason: Some("map is not a supported higher-order method here".to_string()),
                };
            }
            if matches!(target.kind, ExprKind::HigherOrder { .. }) {
                return SupportResult {
                    supported: false,
                    level: SupportLevel::L5Unsupported,
                    reason: Some("nested higher-order calls are unsupported".to_string()),
                };
            }
            let pred_body = match &predicate.kind {
                ExprKind::Arrow { body, .. } => classify(body),
                _ => {
                    return SupportResult {
                        supported: false,
                        level: SupportLevel::L5Unsupported,
                        reason: Some("predicate must be a single-parameter arrow".to_string()),
                    }
                }
            };
            if pred_body.supported {
                SupportResult {
                    supported: true,
                    level: SupportLevel::L5,
                    reason: None,
                }
            } else {
                SupportResult {
                    supported: false,
                    level: SupportLevel::L5Unsupported,
                    reason: pred_body.reason,
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HAND-ROLLED RECURSIVE-DESCENT PARSER
// ═══════════════════════════════════════════════════════════════════════════════

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0 }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.bytes.len()
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && (self.bytes[self.pos] as char).is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.src[self.pos..].chars().next()
    }

    fn slice_from(&self, start: usize) -> String {
        self.src[start..self.pos].trim().to_string()
    }

    fn eat_str(&mut self, s: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn node(&self, start: usize, kind: ExprKind) -> Expr {
        Expr { raw: self.slice_from(start), kind }
    }

    // conditional := logical_or ('?' conditional ':' conditional)?
    fn parse_conditional(&mut self) -> Option<Expr> {
        let start = self.pos;
        let cond = self.parse_logical_or()?;
        if self.eat_str("?") {
            let when_true = self.parse_conditional()?;
            if !self.eat_str(":") {
                return None;
            }
            let when_false = self.parse_conditional()?;
            return Some(self.node(
                start,
                ExprKind::Conditional {
                    condition: Box::new(cond),
                    when_true: Box::new(when_true),
                    when_false: Box::new(when_false),
                },
            ));
        }
        Some(cond)
    }

    fn parse_logical_or(&mut self) -> Option<Expr> {
        let start = self.pos;
        let mut left = self.parse_logical_and()?;
        loop {
            let save = self.pos;
            if self.eat_str("||") {
                let right = self.parse_logical_and()?;
                left = self.node(
                    start,
                    ExprKind::Logical { op: LogicalOp::Or, left: Box::new(left), right: Box::new(right) },
                );
            } else {
                self.pos = save;
                break;
            }
        }
        Some(left)
    }

    fn parse_logical_and(&mut self) -> Option<Expr> {
        let start = self.pos;
        let mut left = self.parse_equality()?;
        loop {
            let save = self.pos;
            if self.eat_str("&&") {
                let right = self.parse_equality()?;
                left = self.node(
                    start,
                    ExprKind::Logical { op: LogicalOp::And, left: Box::new(left), right: Box::new(right) },
                );
            } else {
                self.pos = save;
                break;
            }
        }
        Some(left)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let start = self.pos;
        let mut left = self.parse_relational()?;
        loop {
            let save = self.pos;
            let op = if self.eat_str("===") {
                Some(BinaryOp::EqStrict)
            } else if self.eat_str("!==") {
                Some(BinaryOp::NeqStrict)
            } else if self.eat_str("==") {
                Some(BinaryOp::EqLoose)
            } else if self.eat_str("!=") {
                Some(BinaryOp::NeqLoose)
            } else {
                None
            };
            match op {
                Some(op) => {
                    let right = self.parse_relational()?;
                    left = self.node(start, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) });
                }
                None => {
                    self.pos = save;
                    break;
                }
            }
        }
        Some(left)
    }

    fn parse_relational(&mut self) -> Option<Expr> {
        let start = self.pos;
        let mut left = self.parse_additive()?;
        loop {
            let save = self.pos;
            let op = if self.eat_str("<=") {
                Some(BinaryOp::Lte)
            } else if self.eat_str(">=") {
                Some(BinaryOp::Gte)
            } else if self.eat_str("<") {
                Some(BinaryOp::Lt)
            } else if self.eat_str(">") {
                Some(BinaryOp::Gt)
            } else {
                None
            };
            match op {
                Some(op) => {
                    let right = self.parse_additive()?;
                    left = self.node(start, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) });
                }
                None => {
                    self.pos = save;
                    break;
                }
            }
        }
        Some(left)
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let start = self.pos;
        let mut left = self.parse_multiplicative()?;
        loop {
            let save = self.pos;
            // avoid consuming '=>' as '=' or unary follow-on ambiguity: additive ops never
            // start with '=' so this is unambiguous.
            let op = if self.eat_str("+") {
                Some(BinaryOp::Add)
            } else if self.peek() == Some('-') && !self.src[self.pos..].trim_start().starts_with("=>") {
                self.eat_str("-");
                Some(BinaryOp::Sub)
            } else {
                None
            };
            match op {
                Some(op) => {
                    let right = self.parse_multiplicative()?;
                    left = self.node(start, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) });
                }
                None => {
                    self.pos = save;
                    break;
                }
            }
        }
        Some(left)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let start = self.pos;
        let mut left = self.parse_unary()?;
        loop {
            let save = self.pos;
            let op = if self.eat_str("*") {
                Some(BinaryOp::Mul)
            } else if self.eat_str("/") {
                Some(BinaryOp::Div)
            } else if self.eat_str("%") {
                Some(BinaryOp::Mod)
            } else {
                None
            };
            match op {
                Some(op) => {
                    let right = self.parse_unary()?;
                    left = self.node(start, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) });
                }
                None => {
                    self.pos = save;
                    break;
                }
            }
        }
        Some(left)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.pos;
        if self.eat_str("!") {
            let operand = self.parse_unary()?;
            return Some(self.node(start, ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) }));
        }
        if self.peek() == Some('-') {
            self.eat_str("-");
            let operand = self.parse_unary()?;
            return Some(self.node(start, ExprKind::Unary { op: UnaryOp::Neg, operand: Box::new(operand) }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let start = self.pos;
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_ws();
            if self.eat_str(".") {
                let name = self.parse_ident_name()?;
                expr = self.node(start, ExprKind::Member { object: Box::new(expr), property: MemberProp::Name(name) });
            } else if self.eat_str("[") {
                let lit = self.parse_string_literal()?;
                if !self.eat_str("]") {
                    return None;
                }
                expr = self.node(start, ExprKind::Member { object: Box::new(expr), property: MemberProp::StringIndex(lit) });
            } else if self.peek() == Some('(') {
                self.eat_str("(");
                let args = self.parse_call_args()?;
                if !self.eat_str(")") {
                    return None;
                }
                expr = self.build_call(start, expr, args);
            } else {
                break;
            }
        }
        Some(expr)
    }

    fn build_call(&self, start: usize, callee: Expr, args: Vec<Expr>) -> Expr {
        if let ExprKind::Member { property: MemberProp::Name(name), .. } = &callee.kind {
            let method = match name.as_str() {
                "filter" => Some(HigherOrderMethod::Filter),
                "every" => Some(HigherOrderMethod::Every),
                "some" => Some(HigherOrderMethod::Some),
                _ => None,
            };
            if let (Some(method), ExprKind::Member { object, .. }) = (method, &callee.kind) {
                if args.len() == 1 {
                    return self.node(
                        start,
                        ExprKind::HigherOrder {
                            method,
                            target: object.clone(),
                            predicate: Box::new(args.into_iter().next().unwrap()),
                        },
                    );
                }
            }
        }
        self.node(start, ExprKind::Call { callee: Box::new(callee), args })
    }

    fn parse_call_args(&mut self) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            return Some(args);
        }
        loop {
            let arg = self.parse_arg()?;
            args.push(arg);
            if self.eat_str(",") {
                continue;
            }
            break;
        }
        Some(args)
    }

    /// An argument may itself be an arrow (`x => x.active`), which the
    /// conditional-level grammar doesn't recognize directly.
    fn parse_arg(&mut self) -> Option<Expr> {
        let start = self.pos;
        self.skip_ws();
        if let Some(arrow) = self.try_parse_arrow(start) {
            return Some(arrow);
        }
        self.pos = start;
        self.parse_conditional()
    }

    fn try_parse_arrow(&mut self, start: usize) -> Option<Expr> {
        let save = self.pos;
        let param = if self.eat_str("(") {
            let name = self.parse_ident_name()?;
            if !self.eat_str(")") {
                self.pos = save;
                return None;
            }
            name
        } else {
            match self.parse_ident_name() {
                Some(name) => name,
                None => {
                    self.pos = save;
                    return None;
                }
            }
        };
        if !self.eat_str("=>") {
            self.pos = save;
            return None;
        }
        let body = self.parse_conditional()?;
        Some(self.node(start, ExprKind::Arrow { param, body: Box::new(body) }))
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.pos;
        if let Some(arrow) = self.try_parse_arrow(start) {
            return Some(arrow);
        }
        self.pos = start;
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.eat_str("(");
                let inner = self.parse_conditional()?;
                if !self.eat_str(")") {
                    return None;
                }
                Some(inner)
            }
            Some('\'') | Some('"') => {
                let s = self.parse_string_literal()?;
                Some(self.node(start, ExprKind::Literal(Literal::String(s))))
            }
            Some(c) if c.is_ascii_digit() => {
                let n = self.parse_number()?;
                Some(self.node(start, ExprKind::Literal(Literal::Number(n))))
            }
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {
                let name = self.parse_ident_name()?;
                match name.as_str() {
                    "true" => Some(self.node(start, ExprKind::Literal(Literal::Bool(true)))),
                    "false" => Some(self.node(start, ExprKind::Literal(Literal::Bool(false)))),
                    "null" | "undefined" => Some(self.node(start, ExprKind::Literal(Literal::Null))),
                    _ => Some(self.node(start, ExprKind::Identifier(name))),
                }
            }
            _ => None,
        }
    }

    fn parse_ident_name(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        let mut chars = self.src[self.pos..].chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
            _ => return None,
        }
        self.pos += 1;
        while let Some(c) = self.src[self.pos..].chars().next() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Some(self.src[start..self.pos].to_string())
    }

    fn parse_number(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(c) = self.src[self.pos..].chars().next() {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            None
        } else {
            Some(self.src[start..self.pos].to_string())
        }
    }

    fn parse_string_literal(&mut self) -> Option<String> {
        self.skip_ws();
        let quote = self.src[self.pos..].chars().next()?;
        if quote != '\'' && quote != '"' {
            return None;
        }
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            let c = self.src[self.pos..].chars().next()?;
            if c == '\\' {
                self.pos += c.len_utf8();
                if self.pos < self.bytes.len() {
                    let next = self.src[self.pos..].chars().next()?;
                    self.pos += next.len_utf8();
                }
                continue;
            }
            self.pos += c.len_utf8();
            if c == quote {
                return Some(self.src[start + 1..self.pos - 1].to_string());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_round_trips() {
        let e = parse("count");
        assert_eq!(expr_to_string(&e), "count");
        assert!(is_supported(&e).supported);
        assert_eq!(is_supported(&e).level, SupportLevel::L1);
    }

    #[test]
    fn member_access_is_l2() {
        let e = parse("todos.length");
        assert!(matches!(e.kind, ExprKind::Member { .. }));
        assert_eq!(is_supported(&e).level, SupportLevel::L2);
    }

    #[test]
    fn comparison_with_literal_is_l3() {
        let e = parse("count() > 0");
        assert_eq!(is_supported(&e).level, SupportLevel::L3);
    }

    #[test]
    fn logical_and_with_not_is_l4() {
        let e = parse("!t.done && t.active");
        assert!(is_supported(&e).supported);
        assert_eq!(is_supported(&e).level, SupportLevel::L4);
    }

    #[test]
    fn filter_with_supported_predicate_is_l5() {
        let e = parse("todos().filter(t => !t.done)");
        let res = is_supported(&e);
        assert!(res.supported);
        assert_eq!(res.level, SupportLevel::L5);
        assert!(matches!(e.kind, ExprKind::HigherOrder { method: HigherOrderMethod::Filter, .. }));
    }

    #[test]
    fn standalone_arrow_is_unsupported() {
        let e = parse("x => x + 1");
        assert!(!is_supported(&e).supported);
        assert_eq!(is_supported(&e).level, SupportLevel::L5Unsupported);
    }

    #[test]
    fn nested_higher_order_is_unsupported() {
        let e = parse("todos().filter(t => t.active).filter(t => !t.done)");
        assert!(!is_supported(&e).supported);
    }

    #[test]
    fn round_trip_preserves_whitespace_variants() {
        let src = "  count()  >  0 ";
        let e = parse(src);
        assert_eq!(expr_to_string(&e), src.trim());
    }

    #[test]
    fn malformed_input_is_unrecognized_not_a_panic() {
        let e = parse("function(){}");
        assert!(matches!(e.kind, ExprKind::Unrecognized));
        assert!(!is_supported(&e).supported);
    }
}
