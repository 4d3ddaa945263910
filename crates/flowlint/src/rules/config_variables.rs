//! Checks `vars.*` accesses against the configured variable names.

use anyhow::anyhow;
use flowlint_expr::{Expr, SpannedExpr, template::extract_fragments};
use itertools::Itertools as _;

use crate::{
    diagnostic::{DiagnosticKind, Severity},
    models::{Exec, Job, SourceString, Step, Workflow},
    rules::{Rule, RuleLoadError, RuleState, rule_meta},
    state::AnalysisState,
};

pub(crate) struct ConfigVariables {
    state: RuleState,
    variables: Vec<String>,
}

rule_meta!(
    ConfigVariables,
    "config-variables",
    "undefined configuration variable"
);

impl ConfigVariables {
    pub(crate) fn new(state: &AnalysisState<'_>) -> Result<Self, RuleLoadError> {
        let variables = state
            .config
            .config_variables
            .clone()
            .filter(|variables| !variables.is_empty())
            .ok_or_else(|| RuleLoadError::Skip(anyhow!("no config-variables configured")))?;

        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
            variables,
        })
    }

    /// Collects every `vars.NAME` access in the expression.
    fn vars_accesses(expr: &SpannedExpr, out: &mut Vec<(String, usize)>) {
        if let Expr::Member { object, property } = &expr.inner
            && matches!(&object.inner, Expr::Variable(name) if name.eq_ignore_ascii_case("vars"))
        {
            out.push((property.clone(), expr.span.start));
        }

        match &expr.inner {
            Expr::Member { object, .. } | Expr::Splat { object } => {
                Self::vars_accesses(object, out);
            }
            Expr::Index { object, index } => {
                if matches!(&object.inner, Expr::Variable(name) if name.eq_ignore_ascii_case("vars"))
                    && let Expr::String(name) = &index.inner
                {
                    out.push((name.clone(), expr.span.start));
                }
                Self::vars_accesses(object, out);
                Self::vars_accesses(index, out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    Self::vars_accesses(arg, out);
                }
            }
            Expr::Unary { operand, .. } => Self::vars_accesses(operand, out),
            Expr::Binary { lhs, rhs, .. } => {
                Self::vars_accesses(lhs, out);
                Self::vars_accesses(rhs, out);
            }
            _ => {}
        }
    }

    fn scan(&mut self, source: &SourceString) {
        if !source.contains_expression() {
            return;
        }

        let (fragments, _) = extract_fragments(&source.value);
        for fragment in fragments {
            let Ok(expr) = Expr::parse(fragment.inner) else {
                continue;
            };

            let mut accesses = vec![];
            Self::vars_accesses(&expr, &mut accesses);

            for (name, offset) in accesses {
                if self
                    .variables
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(&name))
                {
                    continue;
                }

                let defined = self
                    .variables
                    .iter()
                    .map(|v| format!("\"{v}\""))
                    .join(", ");
                self.state.error(
                    source.offset_position(fragment.inner_offset + offset),
                    DiagnosticKind::Security,
                    Severity::Medium,
                    format!(
                        "configuration variable \"{name}\" is not defined in \"config-variables\". defined variables are {defined}"
                    ),
                );
            }
        }
    }
}

impl Rule for ConfigVariables {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_workflow_pre(&mut self, workflow: &Workflow) -> anyhow::Result<()> {
        if let Some(env) = &workflow.env {
            for var in env.vars.values() {
                self.scan(&var.value);
            }
        }
        Ok(())
    }

    fn visit_job_pre(&mut self, job: &Job) -> anyhow::Result<()> {
        if let Some(env) = &job.env {
            for var in env.vars.values() {
                self.scan(&var.value);
            }
        }
        if let Some(cond) = &job.cond {
            self.scan(cond);
        }
        Ok(())
    }

    fn visit_step(&mut self, step: &Step) -> anyhow::Result<()> {
        if let Some(env) = &step.env {
            for var in env.vars.values() {
                self.scan(&var.value);
            }
        }
        if let Some(cond) = &step.cond {
            self.scan(cond);
        }
        match &step.exec {
            Exec::Run { script, .. } => self.scan(script),
            Exec::Action { inputs, .. } => {
                for input in inputs.values() {
                    self.scan(&input.value);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{config::Config, testutil::analyze_with_config};

    fn config() -> Config {
        serde_yaml::from_str("config-variables:\n  - DEPLOY_ENV\n").unwrap()
    }

    #[test]
    fn test_undefined_variable() {
        let diags = analyze_with_config(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: echo ${{ vars.DEPLOY_ENV }} ${{ vars.TYPO_ENV }}\n",
            config(),
        );

        let findings: Vec<_> = diags
            .iter()
            .filter(|d| d.rule == "config-variables")
            .collect();
        assert_eq!(findings.len(), 1, "{diags:?}");
        assert!(findings[0].message.contains("\"typo_env\""));
    }

    #[test]
    fn test_case_insensitive_match() {
        let diags = analyze_with_config(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: echo ${{ vars.deploy_env }}\n",
            config(),
        );
        assert!(
            diags.iter().all(|d| d.rule != "config-variables"),
            "{diags:?}"
        );
    }
}
