//! Parsing and semantic analysis for the `${{ … }}` expression language
//! embedded in CI workflow files.
//!
//! The surface syntax is parsed with a pest grammar and lowered into a
//! span-carrying AST ([`SpannedExpr`]), which the type checker
//! ([`check::Checker`]) walks bottom-up against a set of context
//! bindings. Every diagnostic carries a byte offset into the parsed
//! expression text; callers translate offsets into document positions.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use pest::Parser as _;
use pest::iterators::Pair;

pub mod builtins;
pub mod check;
pub mod contexts;
pub mod template;
pub mod types;

// Isolates the generated parser types so `missing_docs` can apply to
// the rest of the crate.
// See: https://github.com/pest-parser/pest/issues/326
mod parser {
    use pest_derive::Parser;

    /// A parser for the workflow expression language.
    #[derive(Parser)]
    #[grammar = "expr.pest"]
    pub struct ExprParser;
}

use parser::{ExprParser, Rule};

/// An error produced while parsing an expression.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    /// Byte offset of the error within the parsed text.
    pub offset: usize,
    /// Human-readable description.
    pub message: String,
}

/// A half-open byte range within the parsed expression text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Span {
    /// Start offset, inclusive.
    pub start: usize,
    /// End offset, exclusive.
    pub end: usize,
}

impl Span {
    /// Constructs a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A synthetic span for nodes not derived from source text.
    pub fn synthetic() -> Self {
        Self { start: 0, end: 0 }
    }
}

/// A value paired with the span it was parsed from.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned<T> {
    /// The wrapped value.
    pub inner: T,
    /// Where it came from.
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Wraps `inner` with `span`.
    pub fn new(inner: T, span: Span) -> Self {
        Self { inner, span }
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A spanned expression node.
pub type SpannedExpr = Spanned<Expr>;

/// A function name. Comparisons are case-insensitive.
#[derive(Clone, Debug)]
pub struct Function(pub String);

impl Function {
    /// The name as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl PartialEq<str> for Function {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

/// Binary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `expr && expr`
    And,
    /// `expr || expr`
    Or,
    /// `expr == expr`
    Eq,
    /// `expr != expr`
    Neq,
    /// `expr > expr`
    Gt,
    /// `expr >= expr`
    Ge,
    /// `expr < expr`
    Lt,
    /// `expr <= expr`
    Le,
}

/// Unary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    /// `!expr`
    Not,
}

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// The `null` literal.
    Null,
    /// A boolean literal.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A float literal.
    Float(f64),
    /// A single-quoted string literal, unescaped.
    String(String),
    /// A context variable reference, e.g. `github`.
    Variable(String),
    /// A property access, e.g. `github.actor`. The property is stored
    /// lowercased, since property lookup is case-insensitive.
    Member {
        /// The object being accessed.
        object: Box<SpannedExpr>,
        /// The (lowercased) property name.
        property: String,
    },
    /// A `.*` or `[*]` splat, e.g. `labels.*`.
    Splat {
        /// The object being splatted.
        object: Box<SpannedExpr>,
    },
    /// A computed index, e.g. `foo[0]` or `foo[bar]`.
    Index {
        /// The object being indexed.
        object: Box<SpannedExpr>,
        /// The index expression.
        index: Box<SpannedExpr>,
    },
    /// A function call.
    Call {
        /// The function name.
        function: Function,
        /// The arguments, in order.
        args: Vec<SpannedExpr>,
    },
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnOp,
        /// The operand.
        operand: Box<SpannedExpr>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinOp,
        /// The left operand.
        lhs: Box<SpannedExpr>,
        /// The right operand.
        rhs: Box<SpannedExpr>,
    },
    /// An array value. Not spellable in the surface syntax; produced
    /// when raw YAML values (e.g. matrix rows) are lifted into the
    /// expression domain.
    Array(Vec<SpannedExpr>),
    /// An object value. Like [`Expr::Array`], produced only from raw
    /// YAML values.
    Object(Vec<(String, SpannedExpr)>),
}

impl Expr {
    /// Parses `src` into a spanned expression tree.
    pub fn parse(src: &str) -> Result<SpannedExpr, ParseError> {
        let mut pairs = ExprParser::parse(Rule::expression, src).map_err(|e| {
            let offset = match e.location {
                pest::error::InputLocation::Pos(p) => p,
                pest::error::InputLocation::Span((s, _)) => s,
            };
            ParseError {
                offset,
                message: "unexpected token in expression".into(),
            }
        })?;

        // expression -> or_expr (EOI is a sibling).
        let or_expr = pairs
            .next()
            .and_then(|p| p.into_inner().next())
            .ok_or_else(|| ParseError {
                offset: 0,
                message: "empty expression".into(),
            })?;

        lower(or_expr)
    }

    /// Whether the expression is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Null | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::String(_)
        )
    }

    /// Renders the dotted access path of a variable/member/index chain,
    /// e.g. `github.event.pull_request.title`, with computed indices
    /// rendered as `*`. Returns `None` for expressions that aren't
    /// access chains (calls, operators, literals).
    pub fn access_path(&self) -> Option<String> {
        fn walk(expr: &Expr, out: &mut Vec<String>) -> bool {
            match expr {
                Expr::Variable(name) => {
                    out.push(name.to_ascii_lowercase());
                    true
                }
                Expr::Member { object, property } => {
                    if !walk(object, out) {
                        return false;
                    }
                    out.push(property.clone());
                    true
                }
                Expr::Splat { object } => {
                    if !walk(object, out) {
                        return false;
                    }
                    out.push("*".into());
                    true
                }
                Expr::Index { object, index } => {
                    if !walk(object, out) {
                        return false;
                    }
                    match &index.inner {
                        Expr::String(s) => out.push(s.to_ascii_lowercase()),
                        _ => out.push("*".into()),
                    }
                    true
                }
                _ => false,
            }
        }

        let mut parts = vec![];
        walk(self, &mut parts).then(|| parts.join("."))
    }
}

fn span_of(pair: &Pair<'_, Rule>) -> Span {
    let span = pair.as_span();
    Span::new(span.start(), span.end())
}

/// Lowers a pest pair into a spanned expression.
///
/// The grammar is not left-recursive, so chain rules like
/// `or_expr = { and_expr ~ ("||" ~ and_expr)* }` match one-or-many
/// operands; single operands punch through to their inner expression
/// and many-headed matches fold left-associatively.
fn lower(pair: Pair<'_, Rule>) -> Result<SpannedExpr, ParseError> {
    let span = span_of(&pair);

    match pair.as_rule() {
        Rule::or_expr => fold_binop(pair, |_| BinOp::Or),
        Rule::and_expr => fold_binop(pair, |_| BinOp::And),
        Rule::eq_expr => fold_binop_with_op(pair, |op| match op {
            "==" => BinOp::Eq,
            _ => BinOp::Neq,
        }),
        Rule::comp_expr => fold_binop_with_op(pair, |op| match op {
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            "<" => BinOp::Lt,
            _ => BinOp::Le,
        }),
        Rule::unary_expr => {
            let mut pairs = pair.into_inner();
            let first = pairs.next().expect("unary_expr has a child");
            match first.as_rule() {
                Rule::unary_op => {
                    let operand = lower(pairs.next().expect("unary_op has an operand"))?;
                    Ok(Spanned::new(
                        Expr::Unary {
                            op: UnOp::Not,
                            operand: operand.into(),
                        },
                        span,
                    ))
                }
                _ => lower(first),
            }
        }
        Rule::primary_expr | Rule::literal => {
            lower(pair.into_inner().next().expect("wrapper rule has a child"))
        }
        Rule::group => lower(pair.into_inner().next().expect("group has a child")),
        Rule::number => {
            let raw = pair.as_str();
            let expr = parse_number(raw).ok_or_else(|| ParseError {
                offset: span.start,
                message: format!("invalid number literal \"{raw}\""),
            })?;
            Ok(Spanned::new(expr, span))
        }
        Rule::string => {
            let inner = pair
                .into_inner()
                .next()
                .map(|p| p.as_str().replace("''", "'"))
                .unwrap_or_default();
            Ok(Spanned::new(Expr::String(inner), span))
        }
        Rule::boolean => Ok(Spanned::new(Expr::Bool(pair.as_str() == "true"), span)),
        Rule::null => Ok(Spanned::new(Expr::Null, span)),
        Rule::function_call => lower_call(pair),
        Rule::context => {
            let mut pairs = pair.into_inner();
            let head_pair = pairs.next().expect("context has a head");
            let mut acc = match head_pair.as_rule() {
                Rule::function_call => lower_call(head_pair)?,
                Rule::identifier => {
                    let head_span = span_of(&head_pair);
                    Spanned::new(Expr::Variable(head_pair.as_str().to_string()), head_span)
                }
                r => {
                    return Err(ParseError {
                        offset: span.start,
                        message: format!("unexpected context head: {r:?}"),
                    });
                }
            };

            for trailer in pairs {
                let trailer_span = span_of(&trailer);
                let combined = Span::new(acc.span.start, trailer_span.end);
                match trailer.as_rule() {
                    Rule::member => {
                        let part = trailer.into_inner().next().expect("member has a child");
                        acc = match part.as_rule() {
                            Rule::star => Spanned::new(Expr::Splat { object: acc.into() }, combined),
                            _ => Spanned::new(
                                Expr::Member {
                                    object: acc.into(),
                                    property: part.as_str().to_ascii_lowercase(),
                                },
                                combined,
                            ),
                        };
                    }
                    Rule::index => {
                        let part = trailer.into_inner().next().expect("index has a child");
                        acc = match part.as_rule() {
                            Rule::star => Spanned::new(Expr::Splat { object: acc.into() }, combined),
                            _ => Spanned::new(
                                Expr::Index {
                                    object: acc.into(),
                                    index: lower(part)?.into(),
                                },
                                combined,
                            ),
                        };
                    }
                    r => {
                        return Err(ParseError {
                            offset: trailer_span.start,
                            message: format!("unexpected context trailer: {r:?}"),
                        });
                    }
                }
            }

            Ok(acc)
        }
        r => Err(ParseError {
            offset: span.start,
            message: format!("unexpected rule: {r:?}"),
        }),
    }
}

fn lower_call(pair: Pair<'_, Rule>) -> Result<SpannedExpr, ParseError> {
    let span = span_of(&pair);
    let mut pairs = pair.into_inner();
    let name = pairs.next().expect("function_call has a name");

    let args = pairs.map(lower).collect::<Result<Vec<_>, _>>()?;

    Ok(Spanned::new(
        Expr::Call {
            function: Function(name.as_str().to_string()),
            args,
        },
        span,
    ))
}

fn parse_number(raw: &str) -> Option<Expr> {
    if let Some(hex) = raw.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(Expr::Int);
    }

    if !raw.contains(['.', 'e', 'E']) {
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Expr::Int(i));
        }
    }

    raw.parse::<f64>().ok().map(Expr::Float)
}

fn fold_binop(
    pair: Pair<'_, Rule>,
    op: impl Fn(&str) -> BinOp,
) -> Result<SpannedExpr, ParseError> {
    let mut pairs = pair.into_inner();
    let mut acc = lower(pairs.next().expect("binop chain has a head"))?;

    for next in pairs {
        let rhs = lower(next)?;
        let span = Span::new(acc.span.start, rhs.span.end);
        acc = Spanned::new(
            Expr::Binary {
                op: op(""),
                lhs: acc.into(),
                rhs: rhs.into(),
            },
            span,
        );
    }

    Ok(acc)
}

/// Folds a binop chain whose operators are captured as their own pairs
/// (`eq_op`/`comp_op`), i.e. `(op, operand)` two-tuples after the head.
fn fold_binop_with_op(
    pair: Pair<'_, Rule>,
    op: impl Fn(&str) -> BinOp,
) -> Result<SpannedExpr, ParseError> {
    let mut pairs = pair.into_inner();
    let mut acc = lower(pairs.next().expect("binop chain has a head"))?;

    while let Some(op_pair) = pairs.next() {
        let rhs = lower(pairs.next().expect("operator is followed by an operand"))?;
        let span = Span::new(acc.span.start, rhs.span.end);
        acc = Spanned::new(
            Expr::Binary {
                op: op(op_pair.as_str()),
                lhs: acc.into(),
                rhs: rhs.into(),
            },
            span,
        );
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(src: &str) -> SpannedExpr {
        Expr::parse(src).unwrap()
    }

    #[test]
    fn test_function_eq() {
        let func = Function("foo".into());
        assert_eq!(&func, "foo");
        assert_eq!(&func, "FOO");
        assert_eq!(&func, "Foo");
        assert_eq!(func, Function("FOO".into()));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("null").inner, Expr::Null);
        assert_eq!(parse("true").inner, Expr::Bool(true));
        assert_eq!(parse("false").inner, Expr::Bool(false));
        assert_eq!(parse("42").inner, Expr::Int(42));
        assert_eq!(parse("-7").inner, Expr::Int(-7));
        assert_eq!(parse("0x1f").inner, Expr::Int(31));
        assert_eq!(parse("2.5").inner, Expr::Float(2.5));
        assert_eq!(parse("1e3").inner, Expr::Float(1000.0));
        assert_eq!(parse("'it''s'").inner, Expr::String("it's".into()));
        assert_eq!(parse("''").inner, Expr::String(String::new()));
    }

    #[test]
    fn test_parse_member_chain() {
        let expr = parse("github.Event.pull_request.title");
        assert_eq!(
            expr.access_path().as_deref(),
            Some("github.event.pull_request.title")
        );

        // Properties are lowercased at parse time.
        let Expr::Member { property, .. } = &expr.inner else {
            panic!("expected a member access");
        };
        assert_eq!(property, "title");
    }

    #[test]
    fn test_parse_index_forms() {
        assert_eq!(
            parse("needs['build'].outputs").access_path().as_deref(),
            Some("needs.build.outputs")
        );
        assert_eq!(
            parse("matrix.os[0]").access_path().as_deref(),
            Some("matrix.os.*")
        );
        assert_eq!(
            parse("labels.*.name").access_path().as_deref(),
            Some("labels.*.name")
        );
        assert_eq!(
            parse("labels[*]").access_path().as_deref(),
            Some("labels.*")
        );
    }

    #[test]
    fn test_parse_calls() {
        let expr = parse("contains(github.ref, 'main')");
        let Expr::Call { function, args } = &expr.inner else {
            panic!("expected a call");
        };
        assert_eq!(function, "contains");
        assert_eq!(args.len(), 2);

        // Calls can head an access chain.
        let expr = parse("fromJSON(steps.meta.outputs.data).tags[0]");
        assert!(expr.access_path().is_none());
        assert!(matches!(expr.inner, Expr::Index { .. }));
    }

    #[test]
    fn test_parse_precedence() {
        // `==` binds tighter than `&&`, which binds tighter than `||`.
        let expr = parse("a == 'x' && b || c");
        let Expr::Binary { op: BinOp::Or, lhs, .. } = &expr.inner else {
            panic!("expected top-level ||");
        };
        let Expr::Binary { op: BinOp::And, lhs: eq, .. } = &lhs.inner else {
            panic!("expected && under ||");
        };
        assert!(matches!(
            eq.inner,
            Expr::Binary { op: BinOp::Eq, .. }
        ));
    }

    #[test]
    fn test_parse_unary_and_groups() {
        let expr = parse("!(!true || false)");
        let Expr::Unary { op: UnOp::Not, operand } = &expr.inner else {
            panic!("expected unary not");
        };
        assert!(matches!(
            operand.inner,
            Expr::Binary { op: BinOp::Or, .. }
        ));
    }

    #[test]
    fn test_parse_multiline() {
        let expr = parse(
            "github.event_name == 'push' &&\n  github.ref == 'refs/heads/main'",
        );
        assert!(matches!(
            expr.inner,
            Expr::Binary { op: BinOp::And, .. }
        ));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "foo ==", "((a)", "'unterminated", "a . ["] {
            assert!(Expr::parse(bad).is_err(), "expected parse error for {bad:?}");
        }
    }

    #[test]
    fn test_spans() {
        let expr = parse("  github.actor  ");
        assert_eq!(expr.span, Span::new(2, 14));

        let expr = parse("a || bc");
        assert_eq!(expr.span, Span::new(0, 7));
    }
}
