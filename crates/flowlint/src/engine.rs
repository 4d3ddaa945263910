//! The analysis engine: parse, walk, collect, fix.

use std::sync::Arc;

use yamlgraft::{Document, Position};

use crate::{
    cache::Caches,
    config::Config,
    diagnostic::Diagnostic,
    fix::{self, Fix},
    parse::parse_workflow,
    registry::default_rules,
    state::AnalysisState,
    visitor::{CancelToken, walk},
};

/// Options for a single analysis run.
#[derive(Clone, Default)]
pub struct AnalyzeOptions {
    /// Whether to apply queued autofixes after analysis.
    pub fix: bool,
    /// Cooperative cancellation. Cancelling before the fix-apply pass
    /// begins guarantees no fix is applied.
    pub cancel: CancelToken,
}

/// The result of analyzing one workflow file.
pub struct Analysis {
    /// All diagnostics: the parser's first, then each rule's in
    /// registration order, each in emission order, then fix-failure
    /// notes.
    pub diagnostics: Vec<Diagnostic>,
    /// The rewritten source, when fixes were requested and at least
    /// one applied.
    pub fixed: Option<String>,
}

/// Analyzes one workflow document.
///
/// Diagnostics never propagate as errors; `Err` is reserved for
/// internal failures (a fatal rule hook) and cancellation.
pub fn analyze(
    source: &str,
    config: &Config,
    caches: &Arc<Caches>,
    options: &AnalyzeOptions,
) -> anyhow::Result<Analysis> {
    let document = match Document::parse(source) {
        Ok(document) => document,
        Err(yamlgraft::Error::InvalidInput) => {
            return Ok(Analysis {
                diagnostics: vec![Diagnostic::syntax(
                    Position::new(1, 1),
                    "could not parse file as YAML",
                )],
                fixed: None,
            });
        }
        Err(err) => return Err(err.into()),
    };

    let (workflow, mut diagnostics) = parse_workflow(&document);

    let Some(workflow) = workflow else {
        return Ok(Analysis {
            diagnostics,
            fixed: None,
        });
    };

    let state = AnalysisState { config, caches };
    let mut rules = default_rules(&state)?;

    walk(&mut rules, &workflow, &options.cancel)?;

    let mut fixes: Vec<Fix> = vec![];
    for rule in rules.iter_mut() {
        let (rule_diagnostics, rule_fixes) = rule.state_mut().take();
        diagnostics.extend(rule_diagnostics);
        fixes.extend(rule_fixes);
    }

    let mut fixed = None;
    if options.fix && !fixes.is_empty() && !options.cancel.is_cancelled() {
        let outcome = fix::apply_fixes(document, &fixes);
        diagnostics.extend(outcome.failures);
        if outcome.applied > 0 {
            fixed = Some(outcome.document.source().to_string());
        }
    }

    Ok(Analysis {
        diagnostics,
        fixed,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testutil::{analyze_rules, test_caches};

    #[test]
    fn test_invalid_yaml_is_one_syntax_diagnostic() {
        let diags = analyze_rules(": : :\n");
        assert!(!diags.is_empty());
        assert!(diags.iter().all(|d| d.kind == crate::diagnostic::DiagnosticKind::Syntax));
    }

    #[test]
    fn test_empty_workflow_has_no_crashes() {
        let diags = analyze_rules("on: push\njobs: {}\n");
        assert!(
            diags
                .iter()
                .all(|d| d.rule == "syntax" || d.rule == "missing-timeout"),
            "{diags:?}"
        );
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let source = "on: pull_request_target\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: echo \"${{ github.event.pull_request.title }}\"\n      - uses: actions/checkout@v3\n";

        let first = analyze_rules(source);
        let second = analyze_rules(source);

        let render = |diags: &[Diagnostic]| {
            diags
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(render(&first), render(&second));
    }

    #[test]
    fn test_cancellation_discards_fixes() {
        let config = Config::default();
        let caches = test_caches();
        let cancel = CancelToken::new();
        cancel.cancel();

        let options = AnalyzeOptions { fix: true, cancel };
        let result = analyze(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: make\n",
            &config,
            &caches,
            &options,
        );
        assert!(result.is_err());
    }
}
