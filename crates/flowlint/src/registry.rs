//! Rule registration and lifecycle.

use crate::{
    rules::{self, Rule, RuleLoadError},
    state::AnalysisState,
};

/// Constructs the default rule set, in deterministic registration
/// order. Rules whose configuration is absent skip themselves; any
/// other construction failure aborts the run.
pub fn default_rules(state: &AnalysisState<'_>) -> anyhow::Result<Vec<Box<dyn Rule>>> {
    let mut registered: Vec<Box<dyn Rule>> = vec![];

    macro_rules! register_rule {
        ($rule:path) => {{
            // HACK: https://github.com/rust-lang/rust/issues/48067
            use $rule as base;

            use crate::rules::RuleCore as _;
            match base::new(state) {
                Ok(rule) => registered.push(Box::new(rule)),
                Err(RuleLoadError::Skip(reason)) => {
                    tracing::debug!("skipping {rule}: {reason}", rule = base::ident());
                }
                Err(RuleLoadError::Fail(error)) => {
                    return Err(error.context(format!(
                        "failed to initialize rule {rule}",
                        rule = base::ident()
                    )));
                }
            }
        }};
    }

    register_rule!(rules::expression::ExpressionRule);
    register_rule!(rules::workflow_call::WorkflowCall);
    register_rule!(rules::local_action::LocalAction);
    register_rule!(rules::untrusted_input::UntrustedInput);
    register_rule!(rules::commit_sha::CommitSha);
    register_rule!(rules::missing_timeout::MissingTimeout);
    register_rule!(rules::obfuscation::Obfuscation);
    register_rule!(rules::action_list::ActionList);
    register_rule!(rules::runner_label::RunnerLabel);
    register_rule!(rules::config_variables::ConfigVariables);
    register_rule!(rules::credentials::Credentials);
    register_rule!(rules::permissions::Permissions);

    Ok(registered)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{cache::Caches, config::Config};

    #[test]
    fn test_config_gated_rules_skip() {
        let config = Config::default();
        let caches = Arc::new(Caches::with_loaders(
            Box::new(|_| Ok(None)),
            Box::new(|_| Ok(None)),
        ));
        let state = AnalysisState {
            config: &config,
            caches: &caches,
        };

        let rules = default_rules(&state).unwrap();
        let idents: Vec<&str> = rules.iter().map(|r| r.state().ident()).collect();

        // Config-driven rules are absent without their sections.
        assert!(!idents.contains(&"action-list"));
        assert!(!idents.contains(&"runner-label"));
        assert!(!idents.contains(&"config-variables"));
        // Everything else is present.
        assert!(idents.contains(&"expression"));
        assert!(idents.contains(&"untrusted-input"));
    }

    #[test]
    fn test_full_config_registers_all() {
        let config: Config = serde_yaml::from_str(
            "action-list:\n  whitelist: [\"*\"]\nself-hosted-runner:\n  labels: []\nconfig-variables:\n  - A\n",
        )
        .unwrap();
        let caches = Arc::new(Caches::with_loaders(
            Box::new(|_| Ok(None)),
            Box::new(|_| Ok(None)),
        ));
        let state = AnalysisState {
            config: &config,
            caches: &caches,
        };

        let rules = default_rules(&state).unwrap();
        assert_eq!(rules.len(), 12);
    }
}
