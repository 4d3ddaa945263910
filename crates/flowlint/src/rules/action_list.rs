//! Enforces the configured allow/deny patterns over `uses:`
//! references.

use anyhow::anyhow;

use crate::{
    config::{ActionList as ActionListConfig, wildcard_match},
    diagnostic::{DiagnosticKind, Severity},
    models::Step,
    rules::{Rule, RuleLoadError, RuleState, rule_meta},
    state::AnalysisState,
};

pub(crate) struct ActionList {
    state: RuleState,
    config: ActionListConfig,
}

rule_meta!(
    ActionList,
    "action-list",
    "action reference violates the configured action list"
);

impl ActionList {
    pub(crate) fn new(state: &AnalysisState<'_>) -> Result<Self, RuleLoadError> {
        let config = state
            .config
            .action_list
            .clone()
            .filter(|list| !list.is_empty())
            .ok_or_else(|| RuleLoadError::Skip(anyhow!("no action-list configured")))?;

        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
            config,
        })
    }

    /// Matches a pattern against the reference both with and without
    /// its `@ref` suffix, so `actions/*` covers `actions/checkout@v4`.
    fn matches(pattern: &str, uses: &str) -> bool {
        if wildcard_match(pattern, uses) {
            return true;
        }
        uses.rsplit_once('@')
            .is_some_and(|(path, _)| wildcard_match(pattern, path))
    }
}

impl Rule for ActionList {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_step(&mut self, step: &Step) -> anyhow::Result<()> {
        let Some(uses) = step.uses() else {
            return Ok(());
        };
        if uses.contains_expression() {
            return Ok(());
        }

        if let Some(pattern) = self
            .config
            .blacklist
            .iter()
            .find(|pattern| Self::matches(pattern, &uses.value))
        {
            self.state.error(
                uses.pos,
                DiagnosticKind::Security,
                Severity::Medium,
                format!(
                    "action \"{uses}\" is disallowed by the blacklist pattern \"{pattern}\"",
                    uses = uses.value
                ),
            );
            return Ok(());
        }

        if !self.config.whitelist.is_empty()
            && !self
                .config
                .whitelist
                .iter()
                .any(|pattern| Self::matches(pattern, &uses.value))
        {
            self.state.error(
                uses.pos,
                DiagnosticKind::Security,
                Severity::Medium,
                format!(
                    "action \"{uses}\" is not allowed by the whitelist",
                    uses = uses.value
                ),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::Config, testutil::analyze_with_config};

    fn config() -> Config {
        serde_yaml::from_str(
            "action-list:\n  whitelist:\n    - actions/*\n  blacklist:\n    - evil/*\n",
        )
        .unwrap()
    }

    #[test]
    fn test_whitelist_and_blacklist() {
        let diags = analyze_with_config(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - uses: actions/checkout@v4\n      - uses: other/tool@v1\n      - uses: evil/miner@v2\n",
            config(),
        );

        let findings: Vec<_> = diags.iter().filter(|d| d.rule == "action-list").collect();
        assert_eq!(findings.len(), 2, "{diags:?}");
        assert!(findings[0].message.contains("not allowed by the whitelist"));
        assert!(findings[1].message.contains("blacklist"));
    }

    #[test]
    fn test_disabled_without_config() {
        let diags = crate::testutil::analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - uses: anything/goes@v1\n",
        );
        assert!(diags.iter().all(|d| d.rule != "action-list"), "{diags:?}");
    }
}
