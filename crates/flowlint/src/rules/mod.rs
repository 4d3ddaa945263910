//! The rule framework: the rule contract, per-rule state, and the
//! static metadata macro.

use anyhow::Result;
use thiserror::Error;
use yamlgraft::Position;

use crate::{
    diagnostic::{Diagnostic, DiagnosticKind, Severity},
    fix::Fix,
    models::{Job, Step, Workflow},
};

pub mod action_list;
pub mod commit_sha;
pub mod config_variables;
pub mod credentials;
pub mod expression;
pub mod local_action;
pub mod missing_timeout;
pub mod obfuscation;
pub mod permissions;
pub mod runner_label;
pub mod untrusted_input;
pub mod workflow_call;

/// Static metadata every rule carries.
pub trait RuleCore {
    /// The rule's unique name.
    fn ident() -> &'static str
    where
        Self: Sized;

    /// A one-line description of what the rule reports.
    fn desc() -> &'static str
    where
        Self: Sized;

    /// The documentation URL for the rule.
    fn url() -> &'static str
    where
        Self: Sized;
}

/// A convenience macro for implementing [`RuleCore`] on a type.
///
/// Example use:
///
/// ```no_run
/// struct SomeRule;
///
/// rule_meta!(SomeRule, "some-rule", "brief description");
/// ```
macro_rules! rule_meta {
    ($t:ty, $id:literal, $desc:expr) => {
        use crate::rules::RuleCore;

        impl RuleCore for $t {
            fn ident() -> &'static str {
                $id
            }

            fn desc() -> &'static str
            where
                Self: Sized,
            {
                $desc
            }

            fn url() -> &'static str {
                concat!("https://docs.flowlint.dev/rules/#", $id)
            }
        }
    };
}

pub(crate) use rule_meta;

/// Errors from a rule's construction.
#[derive(Error, Debug)]
pub enum RuleLoadError {
    /// The rule should be skipped for this run (e.g. its configuration
    /// is absent), without failing the run.
    #[error("{0}")]
    Skip(anyhow::Error),
    /// The rule's initialization failed in a way that should abort the
    /// entire run.
    #[error("{0}")]
    Fail(anyhow::Error),
}

/// Per-rule mutable state: the diagnostic buffer and the autofix queue.
///
/// Both accumulate monotonically over one analysis run; no rule can see
/// another rule's state. A rule embeds one of these and exposes it via
/// [`Rule::state`]/[`Rule::state_mut`].
pub struct RuleState {
    ident: &'static str,
    url: &'static str,
    diagnostics: Vec<Diagnostic>,
    fixes: Vec<Fix>,
}

impl RuleState {
    /// Creates the state for the rule with the given identity.
    pub fn new(ident: &'static str, url: &'static str) -> Self {
        Self {
            ident,
            url,
            diagnostics: vec![],
            fixes: vec![],
        }
    }

    /// The owning rule's name.
    pub fn ident(&self) -> &'static str {
        self.ident
    }

    /// The owning rule's documentation URL.
    pub fn url(&self) -> &'static str {
        self.url
    }

    /// Appends a diagnostic at `pos`.
    pub fn error(
        &mut self,
        pos: Position,
        kind: DiagnosticKind,
        severity: Severity,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            rule: self.ident,
            message: message.into(),
            pos,
            kind,
            severity,
        });
    }

    /// Enqueues an autofix.
    pub fn queue_fix(&mut self, fix: Fix) {
        self.fixes.push(fix);
    }

    /// The diagnostics accumulated so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The fixes accumulated so far.
    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    /// Drains the accumulated diagnostics and fixes.
    pub(crate) fn take(&mut self) -> (Vec<Diagnostic>, Vec<Fix>) {
        (
            std::mem::take(&mut self.diagnostics),
            std::mem::take(&mut self.fixes),
        )
    }
}

/// The rule contract.
///
/// A rule overrides only the hooks it cares about; the default
/// implementations are no-ops. Hooks append findings and fixes to the
/// rule's own [`RuleState`] and return `Err` only for fatal internal
/// errors, which abort the walk.
pub trait Rule {
    /// The rule's state.
    fn state(&self) -> &RuleState;

    /// The rule's state, mutably.
    fn state_mut(&mut self) -> &mut RuleState;

    /// Called once before any job is visited.
    fn visit_workflow_pre(&mut self, _workflow: &Workflow) -> Result<()> {
        Ok(())
    }

    /// Called once after every job has been visited.
    fn visit_workflow_post(&mut self, _workflow: &Workflow) -> Result<()> {
        Ok(())
    }

    /// Called for each job, before its steps.
    fn visit_job_pre(&mut self, _job: &Job) -> Result<()> {
        Ok(())
    }

    /// Called for each job, after its steps.
    fn visit_job_post(&mut self, _job: &Job) -> Result<()> {
        Ok(())
    }

    /// Called for each step of each job, in order.
    fn visit_step(&mut self, _step: &Step) -> Result<()> {
        Ok(())
    }
}
