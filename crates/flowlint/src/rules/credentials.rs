//! Reports hardcoded container registry credentials.

use crate::{
    diagnostic::{DiagnosticKind, Severity},
    models::{Container, Job},
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

pub(crate) struct Credentials {
    state: RuleState,
}

rule_meta!(
    Credentials,
    "credentials",
    "container registry password is hardcoded"
);

impl Credentials {
    pub(crate) fn new(_state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
        })
    }

    fn check_container(&mut self, what: &str, container: &Container) {
        let Some(credentials) = &container.credentials else {
            return;
        };
        let Some(password) = &credentials.password else {
            return;
        };

        // Passwords fed from the secrets context expand at runtime and
        // never appear in the file.
        if password.contains_expression() {
            return;
        }

        self.state.error(
            password.pos,
            DiagnosticKind::Security,
            Severity::High,
            format!(
                "{what} registry password is hardcoded; use a secret instead"
            ),
        );
    }
}

impl Rule for Credentials {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_job_pre(&mut self, job: &Job) -> anyhow::Result<()> {
        if let Some(container) = &job.container {
            self.check_container("container", container);
        }
        for (name, service) in &job.services {
            self.check_container(&format!("service \"{name}\""), service);
        }
        Ok(())
    }
}
