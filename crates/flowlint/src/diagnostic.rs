//! Diagnostics: structured findings with positions.

use yamlgraft::Position;

/// Classifies what a diagnostic is about.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Malformed workflow or expression syntax.
    Syntax,
    /// A security finding.
    Security,
    /// A stylistic or hygiene finding.
    Style,
    /// An expression type error.
    Type,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Security => "security",
            DiagnosticKind::Style => "style",
            DiagnosticKind::Type => "type",
        };
        write!(f, "{name}")
    }
}

/// How bad a finding is. A tag on the diagnostic, not a behavior
/// switch: the same rule logic may emit different severities depending
/// on e.g. the workflow's triggers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational.
    Info,
    /// Low severity.
    Low,
    /// Medium severity.
    #[default]
    Medium,
    /// High severity.
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        write!(f, "{name}")
    }
}

/// A single finding, positioned within the analyzed document.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// The emitting rule's name (`"syntax"` for parser diagnostics).
    pub rule: &'static str,
    /// Human-readable description of the finding.
    pub message: String,
    /// 1-based position of the finding.
    pub pos: Position,
    /// What the finding is about.
    pub kind: DiagnosticKind,
    /// How bad it is.
    pub severity: Severity,
}

impl Diagnostic {
    /// A parser-emitted syntax diagnostic.
    pub fn syntax(pos: Position, message: impl Into<String>) -> Self {
        Self {
            rule: "syntax",
            message: message.into(),
            pos,
            kind: DiagnosticKind::Syntax,
            severity: Severity::Medium,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{pos}: {kind}[{rule}]: {message}",
            pos = self.pos,
            kind = self.kind,
            rule = self.rule,
            message = self.message
        )
    }
}
