//! Requires remote action references to be pinned to a full length
//! commit SHA.

use crate::{
    diagnostic::{DiagnosticKind, Severity},
    models::Step,
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

pub(crate) struct CommitSha {
    state: RuleState,
}

rule_meta!(
    CommitSha,
    "commit-sha",
    "action reference is not pinned to a full length commit SHA"
);

impl CommitSha {
    pub(crate) fn new(_state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
        })
    }

    fn is_full_sha(reference: &str) -> bool {
        reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl Rule for CommitSha {
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

        // Local actions are controlled by the repository; Docker image
        // pinning is a different mechanism (digests).
        if uses.value.starts_with("./")
            || uses.value.starts_with("docker://")
            || uses.contains_expression()
        {
            return Ok(());
        }

        let pinned = uses
            .value
            .rsplit_once('@')
            .is_some_and(|(_, reference)| Self::is_full_sha(reference));

        if !pinned {
            self.state.error(
                uses.pos,
                DiagnosticKind::Security,
                Severity::High,
                format!(
                    "action \"{uses}\" is not pinned to a full length commit SHA",
                    uses = uses.value
                ),
            );
        }

        Ok(())
    }
}
