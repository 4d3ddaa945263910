//! Bottom-up semantic checking of expressions against context bindings.

use indexmap::IndexMap;
use itertools::Itertools as _;

use crate::{
    BinOp, Expr, SpannedExpr, builtins,
    types::{ExprType, ObjectType},
};

/// The context bindings available to an expression, keyed by
/// (lowercased) context name.
pub type Contexts = IndexMap<String, ExprType>;

/// A checker diagnostic. Offsets index into the checked expression's
/// source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExprDiagnostic {
    /// Byte offset of the offending subexpression.
    pub offset: usize,
    /// Human-readable description.
    pub message: String,
}

/// A dot-path pattern over access chains, where a `*` segment matches
/// any single segment. Matching is case-insensitive.
#[derive(Clone, Debug)]
pub struct PathPattern(Vec<String>);

impl PathPattern {
    /// Parses a pattern from its dotted form, e.g.
    /// `github.event.commits.*.message`.
    pub fn new(pattern: &str) -> Self {
        Self(
            pattern
                .split('.')
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        )
    }

    /// Whether the pattern matches the given dotted path exactly.
    pub fn matches(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.len() != self.0.len() {
            return false;
        }

        self.0
            .iter()
            .zip(segments)
            .all(|(pat, seg)| pat == "*" || seg.eq_ignore_ascii_case(pat))
    }
}

/// Access paths whose values may be influenced by external
/// contributors. Used by the checker's untrusted-input mode.
pub fn default_untrusted_paths() -> Vec<PathPattern> {
    [
        "github.event.issue.title",
        "github.event.issue.body",
        "github.event.pull_request.title",
        "github.event.pull_request.body",
        "github.event.pull_request.head.ref",
        "github.event.pull_request.head.label",
        "github.event.pull_request.head.repo.default_branch",
        "github.event.comment.body",
        "github.event.review.body",
        "github.event.review_comment.body",
        "github.event.discussion.title",
        "github.event.discussion.body",
        "github.event.commits.*.message",
        "github.event.commits.*.author.email",
        "github.event.commits.*.author.name",
        "github.event.head_commit.message",
        "github.event.head_commit.author.email",
        "github.event.head_commit.author.name",
        "github.event.pages.*.page_name",
        "github.event.workflow_run.head_branch",
        "github.event.workflow_run.head_commit.message",
        "github.event.workflow_run.head_commit.author.email",
        "github.event.workflow_run.head_commit.author.name",
        "github.head_ref",
    ]
    .into_iter()
    .map(PathPattern::new)
    .collect()
}

/// A bottom-up expression type checker.
///
/// One checker instance accumulates diagnostics across however many
/// expressions the caller feeds it; [`Checker::take_diagnostics`]
/// drains them.
pub struct Checker<'ctx> {
    contexts: &'ctx Contexts,
    untrusted: Option<&'ctx [PathPattern]>,
    diags: Vec<ExprDiagnostic>,
}

impl<'ctx> Checker<'ctx> {
    /// Creates a checker over the given context bindings.
    pub fn new(contexts: &'ctx Contexts) -> Self {
        Self {
            contexts,
            untrusted: None,
            diags: vec![],
        }
    }

    /// Enables untrusted-input mode: every evaluation of a matching
    /// access path emits a diagnostic whose message carries the path in
    /// double quotes.
    pub fn with_untrusted_paths(mut self, patterns: &'ctx [PathPattern]) -> Self {
        self.untrusted = Some(patterns);
        self
    }

    /// Drains accumulated diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<ExprDiagnostic> {
        std::mem::take(&mut self.diags)
    }

    fn error(&mut self, offset: usize, message: impl Into<String>) {
        self.diags.push(ExprDiagnostic {
            offset,
            message: message.into(),
        });
    }

    /// Type-checks `expr`, appending diagnostics for every problem
    /// found. Unresolved accesses produce [`ExprType::Unknown`] so one
    /// failure doesn't cascade.
    pub fn check(&mut self, expr: &SpannedExpr) -> ExprType {
        let ty = match &expr.inner {
            Expr::Null => ExprType::Null,
            Expr::Bool(_) => ExprType::Bool,
            Expr::Int(_) | Expr::Float(_) => ExprType::Number,
            Expr::String(_) => ExprType::String,
            Expr::Variable(name) => self.check_variable(expr, name),
            Expr::Member { object, property } => {
                let object_ty = self.check(object);
                self.check_member(expr, &object_ty, property)
            }
            Expr::Splat { object } => {
                let object_ty = self.check(object);
                self.check_splat(expr, &object_ty)
            }
            Expr::Index { object, index } => {
                let object_ty = self.check(object);
                let index_ty = self.check(index);
                self.check_index(expr, &object_ty, index, &index_ty)
            }
            Expr::Call { function, args } => self.check_call(expr, function.as_str(), args),
            Expr::Unary { operand, .. } => {
                self.check(operand);
                ExprType::Bool
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs_ty = self.check(lhs);
                let rhs_ty = self.check(rhs);
                self.check_binary(*op, lhs, &lhs_ty, rhs, &rhs_ty)
            }
            Expr::Array(items) => {
                let elem = items
                    .iter()
                    .map(|item| self.check(item))
                    .reduce(ExprType::fuse)
                    .unwrap_or(ExprType::Unknown);
                ExprType::array_of(elem)
            }
            Expr::Object(entries) => {
                let mut obj = ObjectType {
                    strict: true,
                    ..Default::default()
                };
                for (key, value) in entries {
                    let value_ty = self.check(value);
                    obj.insert(key.clone(), value_ty);
                }
                ExprType::Object(obj)
            }
        };

        self.check_untrusted(expr);

        ty
    }

    fn check_variable(&mut self, expr: &SpannedExpr, name: &str) -> ExprType {
        match self.contexts.get(&name.to_ascii_lowercase()) {
            Some(ty) => ty.clone(),
            None => {
                let available = self.contexts.keys().join(", ");
                self.error(
                    expr.span.start,
                    format!(
                        "undefined variable \"{name}\". available variables are {available}"
                    ),
                );
                ExprType::Unknown
            }
        }
    }

    fn check_member(
        &mut self,
        expr: &SpannedExpr,
        object_ty: &ExprType,
        property: &str,
    ) -> ExprType {
        match object_ty {
            ExprType::Unknown => ExprType::Unknown,
            ExprType::Object(obj) => match obj.prop(property) {
                Some(ty) => ty.clone(),
                None => {
                    if let Some(mapped) = &obj.mapped {
                        (**mapped).clone()
                    } else if obj.strict {
                        let known = obj.props.keys().join(", ");
                        self.error(
                            expr.span.start,
                            format!(
                                "property \"{property}\" is not defined in object type {{{known}}}"
                            ),
                        );
                        ExprType::Unknown
                    } else {
                        ExprType::Unknown
                    }
                }
            },
            // Property access distributes over filtered arrays,
            // e.g. `labels.*.name`.
            ExprType::Array(elem) => {
                let mapped = self.check_member(expr, elem, property);
                ExprType::array_of(mapped)
            }
            other => {
                self.error(
                    expr.span.start,
                    format!(
                        "receiver of property access \"{property}\" must be an object but is {other}"
                    ),
                );
                ExprType::Unknown
            }
        }
    }

    fn check_splat(&mut self, expr: &SpannedExpr, object_ty: &ExprType) -> ExprType {
        match object_ty {
            ExprType::Unknown => ExprType::array_of(ExprType::Unknown),
            ExprType::Array(elem) => ExprType::array_of((**elem).clone()),
            ExprType::Object(obj) => {
                let elem = obj
                    .mapped
                    .as_deref()
                    .cloned()
                    .or_else(|| {
                        obj.props
                            .values()
                            .cloned()
                            .reduce(ExprType::fuse)
                    })
                    .unwrap_or(ExprType::Unknown);
                ExprType::array_of(elem)
            }
            other => {
                self.error(
                    expr.span.start,
                    format!("receiver of object filter \"*\" must be an array or object but is {other}"),
                );
                ExprType::array_of(ExprType::Unknown)
            }
        }
    }

    fn check_index(
        &mut self,
        expr: &SpannedExpr,
        object_ty: &ExprType,
        index: &SpannedExpr,
        index_ty: &ExprType,
    ) -> ExprType {
        match object_ty {
            ExprType::Unknown => ExprType::Unknown,
            ExprType::Array(elem) => {
                if !matches!(index_ty, ExprType::Number | ExprType::Unknown | ExprType::String) {
                    self.error(
                        index.span.start,
                        format!("array index must be a number but is {index_ty}"),
                    );
                }
                (**elem).clone()
            }
            ExprType::Object(obj) => {
                // A string-literal index is just spelled-out property
                // access and follows the same rules.
                if let Expr::String(name) = &index.inner {
                    return self.check_member(expr, object_ty, &name.to_ascii_lowercase());
                }
                match &obj.mapped {
                    Some(mapped) => (**mapped).clone(),
                    None => ExprType::Unknown,
                }
            }
            ExprType::String => ExprType::String,
            other => {
                self.error(
                    expr.span.start,
                    format!("value of type {other} cannot be indexed"),
                );
                ExprType::Unknown
            }
        }
    }

    fn check_call(&mut self, expr: &SpannedExpr, name: &str, args: &[SpannedExpr]) -> ExprType {
        let arg_types: Vec<ExprType> = args.iter().map(|arg| self.check(arg)).collect();

        let Some(sig) = builtins::lookup(name) else {
            self.error(
                expr.span.start,
                format!("undefined function \"{name}\""),
            );
            return ExprType::Unknown;
        };

        let min = sig.min_args();
        if args.len() < min {
            self.error(
                expr.span.start,
                format!(
                    "function \"{name}\" takes at least {min} argument(s) but got {got}",
                    name = sig.name,
                    got = args.len()
                ),
            );
            return sig.ret;
        }

        if let Some(max) = sig.max_args()
            && args.len() > max
        {
            self.error(
                expr.span.start,
                format!(
                    "function \"{name}\" takes at most {max} argument(s) but got {got}",
                    name = sig.name,
                    got = args.len()
                ),
            );
            return sig.ret;
        }

        for (idx, (arg, arg_ty)) in args.iter().zip(&arg_types).enumerate() {
            let Some(kind) = sig.param_at(idx) else {
                break;
            };
            if !kind.accepts(arg_ty) {
                self.error(
                    arg.span.start,
                    format!(
                        "argument {n} of function \"{name}\" must be {expected} but is {arg_ty}",
                        n = idx + 1,
                        name = sig.name,
                        expected = kind.describe(),
                    ),
                );
            }
        }

        sig.ret
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        lhs: &SpannedExpr,
        lhs_ty: &ExprType,
        rhs: &SpannedExpr,
        rhs_ty: &ExprType,
    ) -> ExprType {
        match op {
            // Equality accepts any pair of operands.
            BinOp::Eq | BinOp::Neq => ExprType::Bool,
            BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le => {
                for (operand, ty) in [(lhs, lhs_ty), (rhs, rhs_ty)] {
                    if !matches!(ty, ExprType::Number | ExprType::Unknown) {
                        self.error(
                            operand.span.start,
                            format!("comparison operand must be a number but is {ty}"),
                        );
                    }
                }
                ExprType::Bool
            }
            BinOp::And | BinOp::Or => ExprType::Bool,
        }
    }

    /// In untrusted-input mode, reports an access chain whose full
    /// path matches one of the configured patterns. The path is quoted
    /// in the message so callers can extract it.
    fn check_untrusted(&mut self, expr: &SpannedExpr) {
        let Some(patterns) = self.untrusted else {
            return;
        };

        if !matches!(
            expr.inner,
            Expr::Member { .. } | Expr::Index { .. } | Expr::Variable(_)
        ) {
            return;
        }

        let Some(path) = expr.access_path() else {
            return;
        };

        if patterns.iter().any(|pattern| pattern.matches(&path)) {
            self.error(
                expr.span.start,
                format!(
                    "\"{path}\" is potentially untrusted. avoid using it directly in inline scripts; pass it through an environment variable instead"
                ),
            );
        }
    }
}
