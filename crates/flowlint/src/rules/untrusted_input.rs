//! Detects attacker-influenced context values expanded directly into
//! inline scripts, and rewrites them through environment variables.

use flowlint_expr::{
    Expr,
    check::{Checker, PathPattern, default_untrusted_paths},
    contexts::default_contexts,
    template::extract_fragments,
};
use indexmap::IndexMap;
use yamlgraft::{Op, Patch, Route};

use crate::{
    diagnostic::{DiagnosticKind, Severity},
    fix::Fix,
    models::{Exec, SourceString, Step, Workflow},
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

pub(crate) struct UntrustedInput {
    state: RuleState,
    patterns: Vec<PathPattern>,
    /// Whether the current workflow has a trigger whose payload an
    /// external contributor can influence. Raises severity only; the
    /// detection logic is shared.
    privileged_trigger: bool,
}

rule_meta!(
    UntrustedInput,
    "untrusted-input",
    "untrusted input expanded into an inline script"
);

impl UntrustedInput {
    pub(crate) fn new(_state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
            patterns: default_untrusted_paths(),
            privileged_trigger: false,
        })
    }

    /// The script this step feeds into an interpreter, if any: a `run:`
    /// body, or the `script` input of a github-script action.
    fn script<'a>(step: &'a Step) -> Option<(&'a SourceString, Route)> {
        match &step.exec {
            Exec::Run { script, .. } => Some((script, step.route.key("run"))),
            Exec::Action { uses, inputs, .. } => {
                if uses.value.starts_with("actions/github-script@")
                    || uses.value == "actions/github-script"
                {
                    inputs
                        .get("script")
                        .map(|input| (&input.value, step.route.key("with").key("script")))
                } else {
                    None
                }
            }
        }
    }

    /// Derives the environment variable name for a tainted access
    /// path. Deterministic: `github.`/`github.event.` prefixes are
    /// dropped, `pull_request` abbreviates to `pr`, wildcard segments
    /// are dropped, and the rest joins with underscores, uppercased.
    fn env_name(path: &str) -> String {
        let trimmed = path
            .strip_prefix("github.event.")
            .or_else(|| path.strip_prefix("github."))
            .unwrap_or(path);

        let name: Vec<String> = trimmed
            .split('.')
            .filter(|segment| *segment != "*")
            .map(|segment| match segment {
                "pull_request" => "pr".to_string(),
                other => other.to_string(),
            })
            .collect();

        name.join("_")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Rule for UntrustedInput {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_workflow_pre(&mut self, workflow: &Workflow) -> anyhow::Result<()> {
        self.privileged_trigger = workflow.has_untrusted_trigger();
        Ok(())
    }

    fn visit_step(&mut self, step: &Step) -> anyhow::Result<()> {
        let Some((script, script_route)) = Self::script(step) else {
            return Ok(());
        };

        let severity = if self.privileged_trigger {
            Severity::High
        } else {
            Severity::Medium
        };

        let contexts = default_contexts();
        let mut checker = Checker::new(&contexts).with_untrusted_paths(&self.patterns);

        let (fragments, _) = extract_fragments(&script.value);
        for fragment in fragments {
            let Ok(expr) = Expr::parse(fragment.inner) else {
                continue;
            };

            checker.check(&expr);
            for diag in checker.take_diagnostics() {
                // Only the untrusted-path findings are this rule's
                // business; the expression rule reports type problems.
                let Some(path) = diag.message.split('"').nth(1).map(str::to_string) else {
                    continue;
                };
                if !self.patterns.iter().any(|pattern| pattern.matches(&path)) {
                    continue;
                }

                self.state.error(
                    script.offset_position(fragment.inner_offset + diag.offset),
                    DiagnosticKind::Security,
                    severity,
                    diag.message,
                );

                // Rewrite only direct expansions: anything wrapped in
                // function calls or operators can't be replaced by a
                // plain environment variable reference.
                if expr.access_path().as_deref() != Some(path.as_str()) {
                    continue;
                }

                let raw_fragment = script.value[fragment.span.clone()].to_string();
                let name = Self::env_name(&path);

                let mut entries = IndexMap::new();
                entries.insert(
                    name.clone(),
                    serde_yaml::Value::String(raw_fragment.clone()),
                );

                self.state.queue_fix(Fix {
                    rule: Self::ident(),
                    title: format!("pass {path} via the {name} environment variable"),
                    pos: step.pos,
                    patches: vec![
                        Patch {
                            route: step.route.clone(),
                            op: Op::MergeInto {
                                key: "env".into(),
                                entries,
                            },
                        },
                        Patch {
                            route: script_route.clone(),
                            op: Op::RewriteFragment {
                                from: raw_fragment,
                                to: format!("${name}"),
                            },
                        },
                    ],
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::UntrustedInput;
    use crate::testutil::analyze_rules;

    #[test]
    fn test_env_name_derivation() {
        for (path, expected) in [
            ("github.event.pull_request.title", "PR_TITLE"),
            ("github.event.issue.body", "ISSUE_BODY"),
            ("github.event.comment.body", "COMMENT_BODY"),
            ("github.head_ref", "HEAD_REF"),
            ("github.event.commits.*.message", "COMMITS_MESSAGE"),
        ] {
            assert_eq!(UntrustedInput::env_name(path), expected);
        }
    }

    #[test]
    fn test_detects_untrusted_expansion() {
        let diags = analyze_rules(
            "on: pull_request_target\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: echo \"${{ github.event.pull_request.title }}\"\n",
        );

        let findings: Vec<_> = diags
            .iter()
            .filter(|d| d.rule == "untrusted-input")
            .collect();
        assert_eq!(findings.len(), 1, "{diags:?}");
        assert!(
            findings[0]
                .message
                .contains("\"github.event.pull_request.title\"")
        );
        assert_eq!(findings[0].severity, crate::diagnostic::Severity::High);
    }

    #[test]
    fn test_trusted_contexts_are_quiet() {
        let diags = analyze_rules(
            "on: pull_request_target\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: echo \"${{ github.sha }}\"\n",
        );
        assert!(diags.iter().all(|d| d.rule != "untrusted-input"), "{diags:?}");
    }

    #[test]
    fn test_normal_trigger_is_medium() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: echo \"${{ github.event.head_commit.message }}\"\n",
        );

        let finding = diags
            .iter()
            .find(|d| d.rule == "untrusted-input")
            .expect("expected a finding");
        assert_eq!(finding.severity, crate::diagnostic::Severity::Medium);
    }

    #[test]
    fn test_github_script_is_scanned() {
        let diags = analyze_rules(
            "on: issue_comment\njobs:\n  a:\n    runs-on: x\n    steps:\n      - uses: actions/github-script@v7\n        with:\n          script: console.log(`${{ github.event.comment.body }}`)\n",
        );
        assert!(
            diags.iter().any(|d| d.rule == "untrusted-input"),
            "{diags:?}"
        );
    }
}
