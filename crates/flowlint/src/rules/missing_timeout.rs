//! Reports jobs and steps without a `timeout-minutes:` and inserts a
//! conservative default.

use yamlgraft::{Anchor, Op, Patch};

use crate::{
    diagnostic::{DiagnosticKind, Severity},
    fix::Fix,
    models::{Job, Step},
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

/// The timeout the autofix inserts, in minutes.
const DEFAULT_TIMEOUT_MINUTES: u64 = 5;

pub(crate) struct MissingTimeout {
    state: RuleState,
}

rule_meta!(
    MissingTimeout,
    "missing-timeout",
    "job or step does not set timeout-minutes"
);

impl MissingTimeout {
    pub(crate) fn new(_state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
        })
    }

    fn timeout_fix(route: yamlgraft::Route, anchors: &[&str]) -> Vec<Patch> {
        vec![Patch {
            route,
            op: Op::AddEntry {
                key: "timeout-minutes".into(),
                value: serde_yaml::Value::from(DEFAULT_TIMEOUT_MINUTES),
                anchor: Anchor::BeforeAny(anchors.iter().map(|a| a.to_string()).collect()),
            },
        }]
    }
}

impl Rule for MissingTimeout {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_job_pre(&mut self, job: &Job) -> anyhow::Result<()> {
        // Reusable-workflow calls execute in the callee's jobs, which
        // carry their own timeouts.
        if job.workflow_call.is_some() || job.timeout_minutes.is_some() {
            return Ok(());
        }

        self.state.error(
            job.pos,
            DiagnosticKind::Style,
            Severity::Low,
            format!(
                "job \"{id}\" does not set \"timeout-minutes\"; hung jobs keep consuming runner time",
                id = job.id
            ),
        );
        self.state.queue_fix(Fix {
            rule: Self::ident(),
            title: format!(
                "set \"timeout-minutes: {DEFAULT_TIMEOUT_MINUTES}\" on job \"{id}\"",
                id = job.id
            ),
            pos: job.pos,
            patches: Self::timeout_fix(job.route.clone(), &["steps", "runs-on"]),
        });

        Ok(())
    }

    fn visit_step(&mut self, step: &Step) -> anyhow::Result<()> {
        if step.timeout_minutes.is_some() {
            return Ok(());
        }

        self.state.error(
            step.pos,
            DiagnosticKind::Style,
            Severity::Low,
            "step does not set \"timeout-minutes\"",
        );
        self.state.queue_fix(Fix {
            rule: Self::ident(),
            title: format!("set \"timeout-minutes: {DEFAULT_TIMEOUT_MINUTES}\" on step"),
            pos: step.pos,
            patches: Self::timeout_fix(step.route.clone(), &["run", "uses"]),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::testutil::analyze_rules;

    #[test]
    fn test_reports_job_and_step() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: make\n",
        );

        let findings: Vec<_> = diags
            .iter()
            .filter(|d| d.rule == "missing-timeout")
            .collect();
        assert_eq!(findings.len(), 2, "{diags:?}");
    }

    #[test]
    fn test_present_timeouts_are_clean() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    timeout-minutes: 10\n    steps:\n      - run: make\n        timeout-minutes: 3\n",
        );
        assert!(
            diags.iter().all(|d| d.rule != "missing-timeout"),
            "{diags:?}"
        );
    }

    #[test]
    fn test_expression_timeout_counts() {
        let diags = analyze_rules(
            "on:\n  workflow_call:\n    inputs:\n      t:\n        type: number\njobs:\n  a:\n    runs-on: x\n    timeout-minutes: ${{ inputs.t }}\n    steps:\n      - run: make\n        timeout-minutes: 1\n",
        );
        assert!(
            diags.iter().all(|d| d.rule != "missing-timeout"),
            "{diags:?}"
        );
    }
}
