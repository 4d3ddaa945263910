//! The tree visitor that drives every rule over a workflow in one
//! depth-first pass.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Result, bail};

use crate::{models::Workflow, rules::Rule};

/// A cooperative cancellation handle. Checked at hook boundaries; a
/// cancelled walk aborts with an error and applies no fixes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Walks `workflow`, invoking every rule's hooks in the fixed order:
///
/// 1. `visit_workflow_pre` for each rule;
/// 2. per job (declaration order): `visit_job_pre` for each rule, then
///    `visit_step` for each rule per step (declaration order), then
///    `visit_job_post` for each rule;
/// 3. `visit_workflow_post` for each rule.
///
/// Rule order is registration order and is deterministic. A fatal hook
/// error aborts the walk; diagnostics already accumulated in the rule
/// states are preserved.
pub fn walk(
    rules: &mut [Box<dyn Rule>],
    workflow: &Workflow,
    cancel: &CancelToken,
) -> Result<()> {
    let checkpoint = |cancel: &CancelToken| -> Result<()> {
        if cancel.is_cancelled() {
            bail!("analysis cancelled");
        }
        Ok(())
    };

    checkpoint(cancel)?;
    for rule in rules.iter_mut() {
        rule.visit_workflow_pre(workflow)?;
    }

    for job in workflow.jobs.values() {
        checkpoint(cancel)?;
        for rule in rules.iter_mut() {
            rule.visit_job_pre(job)?;
        }

        for step in &job.steps {
            checkpoint(cancel)?;
            for rule in rules.iter_mut() {
                rule.visit_step(step)?;
            }
        }

        checkpoint(cancel)?;
        for rule in rules.iter_mut() {
            rule.visit_job_post(job)?;
        }
    }

    checkpoint(cancel)?;
    for rule in rules.iter_mut() {
        rule.visit_workflow_post(workflow)?;
    }

    Ok(())
}
