//! Checks `with:` inputs of local action steps against the action's
//! own metadata.

use std::sync::Arc;

use camino::Utf8Path;
use itertools::Itertools as _;

use crate::{
    cache::Caches,
    diagnostic::{DiagnosticKind, Severity},
    models::{Exec, Step},
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

pub(crate) struct LocalAction {
    state: RuleState,
    caches: Arc<Caches>,
}

rule_meta!(
    LocalAction,
    "local-action",
    "input mismatch against a local action's definition"
);

impl LocalAction {
    pub(crate) fn new(state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
            caches: state.caches.clone(),
        })
    }
}

impl Rule for LocalAction {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_step(&mut self, step: &Step) -> anyhow::Result<()> {
        let Exec::Action { uses, inputs, .. } = &step.exec else {
            return Ok(());
        };
        if !uses.value.starts_with("./") {
            return Ok(());
        }

        // Unknown metadata (missing file, unreadable definition)
        // suppresses the dependent checks.
        let Some(metadata) = self.caches.actions.get(Utf8Path::new(&uses.value)) else {
            return Ok(());
        };

        for (name, meta) in &metadata.inputs {
            if meta.required && !meta.has_default && !inputs.contains_key(name) {
                self.state.error(
                    uses.pos,
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    format!(
                        "input \"{name}\" is required by action \"{uses}\" but not provided",
                        uses = uses.value
                    ),
                );
            }
        }

        for (name, input) in inputs {
            if !metadata.inputs.contains_key(name) {
                let defined = metadata.inputs.keys().map(|k| format!("\"{k}\"")).join(", ");
                self.state.error(
                    input.name_pos,
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    format!(
                        "input \"{name}\" is not defined by action \"{uses}\". defined inputs are {defined}",
                        uses = uses.value
                    ),
                );
            }
        }

        Ok(())
    }
}
