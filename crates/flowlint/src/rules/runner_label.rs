//! Checks `runs-on:` labels against the platform's hosted runners and
//! the configured self-hosted labels.

use anyhow::anyhow;

use crate::{
    config::wildcard_match,
    diagnostic::{DiagnosticKind, Severity},
    models::Job,
    rules::{Rule, RuleLoadError, RuleState, rule_meta},
    state::AnalysisState,
};

/// Labels of hosted runners and their routing aliases.
const KNOWN_LABELS: &[&str] = &[
    "ubuntu-latest",
    "ubuntu-24.04",
    "ubuntu-22.04",
    "ubuntu-20.04",
    "windows-latest",
    "windows-2025",
    "windows-2022",
    "windows-2019",
    "macos-latest",
    "macos-15",
    "macos-14",
    "macos-13",
    "self-hosted",
    "linux",
    "windows",
    "macos",
    "x64",
    "arm",
    "arm64",
    "gpu",
];

pub(crate) struct RunnerLabel {
    state: RuleState,
    labels: Vec<String>,
}

rule_meta!(RunnerLabel, "runner-label", "unknown runner label");

impl RunnerLabel {
    pub(crate) fn new(state: &AnalysisState<'_>) -> Result<Self, RuleLoadError> {
        let labels = state
            .config
            .self_hosted_runner
            .clone()
            .ok_or_else(|| RuleLoadError::Skip(anyhow!("no self-hosted-runner configured")))?
            .labels;

        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
            labels,
        })
    }
}

impl Rule for RunnerLabel {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_job_pre(&mut self, job: &Job) -> anyhow::Result<()> {
        let Some(runs_on) = &job.runs_on else {
            return Ok(());
        };

        for label in runs_on.labels() {
            if label.contains_expression() {
                continue;
            }

            let known = KNOWN_LABELS
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&label.value))
                || self
                    .labels
                    .iter()
                    .any(|pattern| wildcard_match(pattern, &label.value));

            if !known {
                self.state.error(
                    label.pos,
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    format!(
                        "label \"{label}\" is unknown. configure known self-hosted runner labels in \"self-hosted-runner.labels\"",
                        label = label.value
                    ),
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::Config, testutil::analyze_with_config};

    fn config() -> Config {
        serde_yaml::from_str("self-hosted-runner:\n  labels:\n    - big-*\n").unwrap()
    }

    #[test]
    fn test_unknown_label() {
        let diags = analyze_with_config(
            "on: push\njobs:\n  a:\n    runs-on: [self-hosted, big-linux, mystery-box]\n    steps:\n      - run: make\n",
            config(),
        );

        let findings: Vec<_> = diags.iter().filter(|d| d.rule == "runner-label").collect();
        assert_eq!(findings.len(), 1, "{diags:?}");
        assert!(findings[0].message.contains("\"mystery-box\""));
    }

    #[test]
    fn test_hosted_labels_are_known() {
        let diags = analyze_with_config(
            "on: push\njobs:\n  a:\n    runs-on: ubuntu-latest\n    steps:\n      - run: make\n",
            config(),
        );
        assert!(diags.iter().all(|d| d.rule != "runner-label"), "{diags:?}");
    }
}
