//! Validates reusable-workflow call jobs: reference form, input
//! arity, and secret arity against the callee's metadata.

use std::sync::{Arc, LazyLock};

use camino::Utf8Path;
use itertools::Itertools as _;
use regex::Regex;

use crate::{
    cache::Caches,
    diagnostic::{DiagnosticKind, Severity},
    models::{CallInputType, Job, Workflow},
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

/// The `owner/repo/path@ref` form of a remote reusable workflow.
static REMOTE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^/@\s]+/[^/@\s]+/[^@\s]+@\S+$").expect("remote call regex is valid")
});

pub(crate) struct WorkflowCall {
    state: RuleState,
    caches: Arc<Caches>,
}

rule_meta!(
    WorkflowCall,
    "workflow-call",
    "invalid reusable workflow call"
);

impl WorkflowCall {
    pub(crate) fn new(state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
            caches: state.caches.clone(),
        })
    }
}

impl Rule for WorkflowCall {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_workflow_pre(&mut self, workflow: &Workflow) -> anyhow::Result<()> {
        // For callable workflows, validate that declared input
        // defaults agree with their declared types.
        let Some(event) = workflow.workflow_call_event() else {
            return Ok(());
        };

        for (name, input) in &event.inputs {
            let Some(default) = &input.default else {
                continue;
            };
            if default.contains_expression() {
                continue;
            }

            let ok = match input.ty {
                CallInputType::Boolean => {
                    matches!(default.value.as_str(), "true" | "false")
                }
                CallInputType::Number => default.value.parse::<f64>().is_ok(),
                CallInputType::String => true,
            };

            if !ok {
                self.state.error(
                    default.pos,
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    format!(
                        "default value \"{value}\" of input \"{name}\" does not match its declared type",
                        value = default.value
                    ),
                );
            }
        }

        Ok(())
    }

    fn visit_job_pre(&mut self, job: &Job) -> anyhow::Result<()> {
        let Some(call) = &job.workflow_call else {
            return Ok(());
        };
        if call.uses.contains_expression() {
            return Ok(());
        }

        let local = call.uses.value.starts_with("./");
        if !local && !REMOTE_CALL.is_match(&call.uses.value) {
            self.state.error(
                call.uses.pos,
                DiagnosticKind::Syntax,
                Severity::Medium,
                format!(
                    "reusable workflow call \"{uses}\" is invalid. it must be \"./path/to/workflow.yml\" or \"owner/repo/path@ref\"",
                    uses = call.uses.value
                ),
            );
            return Ok(());
        }
        if !local {
            // Remote callees would need fetching; only the local
            // metadata cache is consulted.
            return Ok(());
        }

        let Some(metadata) = self.caches.workflows.get(Utf8Path::new(&call.uses.value))
        else {
            return Ok(());
        };

        for (name, input) in &metadata.inputs {
            if input.required && !input.has_default && !call.inputs.contains_key(name) {
                self.state.error(
                    call.pos,
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    format!(
                        "input \"{name}\" is required by \"{uses}\" but not provided",
                        uses = call.uses.value
                    ),
                );
            }
        }

        for (name, input) in &call.inputs {
            if !metadata.inputs.contains_key(name) {
                let defined = metadata.inputs.keys().map(|k| format!("\"{k}\"")).join(", ");
                self.state.error(
                    input.name_pos,
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    format!(
                        "input \"{name}\" is not defined by \"{uses}\". defined inputs are {defined}",
                        uses = call.uses.value
                    ),
                );
            }
        }

        if !call.inherit_secrets {
            for (name, required) in &metadata.secrets {
                if *required && !call.secrets.contains_key(name) {
                    self.state.error(
                        call.pos,
                        DiagnosticKind::Syntax,
                        Severity::Medium,
                        format!(
                            "secret \"{name}\" is required by \"{uses}\" but not provided",
                            uses = call.uses.value
                        ),
                    );
                }
            }

            for (name, secret) in &call.secrets {
                if !metadata.secrets.contains_key(name) {
                    let defined =
                        metadata.secrets.keys().map(|k| format!("\"{k}\"")).join(", ");
                    self.state.error(
                        secret.name_pos,
                        DiagnosticKind::Syntax,
                        Severity::Medium,
                        format!(
                            "secret \"{name}\" is not defined by \"{uses}\". defined secrets are {defined}",
                            uses = call.uses.value
                        ),
                    );
                }
            }
        }

        Ok(())
    }
}
