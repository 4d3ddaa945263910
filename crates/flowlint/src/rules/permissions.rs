//! Validates `permissions:` scope names and access values.

use itertools::Itertools as _;

use crate::{
    diagnostic::{DiagnosticKind, Severity},
    models::{Job, Permissions as PermissionsBlock, Workflow},
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

/// The permission scopes the platform defines.
const KNOWN_SCOPES: &[&str] = &[
    "actions",
    "attestations",
    "checks",
    "contents",
    "deployments",
    "discussions",
    "id-token",
    "issues",
    "models",
    "packages",
    "pages",
    "pull-requests",
    "repository-projects",
    "security-events",
    "statuses",
];

pub(crate) struct Permissions {
    state: RuleState,
}

rule_meta!(
    Permissions,
    "permissions",
    "invalid permission scope or access level"
);

impl Permissions {
    pub(crate) fn new(_state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
        })
    }

    fn check_block(&mut self, permissions: &PermissionsBlock) {
        for (name, scope) in &permissions.scopes {
            if !KNOWN_SCOPES.contains(&name.as_str()) {
                let known = KNOWN_SCOPES.iter().map(|s| format!("\"{s}\"")).join(", ");
                self.state.error(
                    scope.name_pos,
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    format!("unknown permission scope \"{name}\". known scopes are {known}"),
                );
            }

            if !matches!(scope.value.value.as_str(), "read" | "write" | "none") {
                self.state.error(
                    scope.value.pos,
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    format!(
                        "access level must be one of \"read\", \"write\", \"none\" but got \"{value}\"",
                        value = scope.value.value
                    ),
                );
            }
        }
    }
}

impl Rule for Permissions {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_workflow_pre(&mut self, workflow: &Workflow) -> anyhow::Result<()> {
        if let Some(permissions) = &workflow.permissions {
            self.check_block(permissions);
        }
        Ok(())
    }

    fn visit_job_pre(&mut self, job: &Job) -> anyhow::Result<()> {
        if let Some(permissions) = &job.permissions {
            self.check_block(permissions);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::testutil::analyze_rules;

    #[test]
    fn test_unknown_scope_and_bad_level() {
        let diags = analyze_rules(
            "on: push\npermissions:\n  contents: read\n  checkses: write\n  issues: admin\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: make\n",
        );

        let findings: Vec<_> = diags.iter().filter(|d| d.rule == "permissions").collect();
        assert_eq!(findings.len(), 2, "{diags:?}");
        assert!(findings[0].message.contains("\"checkses\""));
        assert!(findings[1].message.contains("\"admin\""));
    }

    #[test]
    fn test_valid_permissions() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    permissions:\n      id-token: write\n      contents: read\n    steps:\n      - run: make\n",
        );
        assert!(diags.iter().all(|d| d.rule != "permissions"), "{diags:?}");
    }
}
