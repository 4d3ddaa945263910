//! The autofix engine: applies queued fixes onto the YAML document.

use yamlgraft::{Document, Patch, Position};

use crate::diagnostic::{Diagnostic, DiagnosticKind, Severity};

/// A queued autofix: one or more patch operations bound to a target
/// node's route, owned by the rule that queued it.
///
/// A fix is all-or-nothing: its patches are applied against a scratch
/// copy of the document and committed only if every one succeeds, so a
/// failing fix can never invalidate earlier successful fixes.
pub struct Fix {
    /// The queueing rule's name.
    pub rule: &'static str,
    /// A short description of what the fix does.
    pub title: String,
    /// The position of the fix's target node.
    pub pos: Position,
    /// The patch operations to apply, in order.
    pub patches: Vec<Patch>,
}

/// The outcome of a fix-apply pass.
pub struct FixOutcome {
    /// The document after all applicable fixes.
    pub document: Document,
    /// How many fixes were applied.
    pub applied: usize,
    /// Diagnostics for fixes that could not be applied.
    pub failures: Vec<Diagnostic>,
}

/// Applies `fixes` sequentially, in queue order.
///
/// A fix may fail when the document no longer has the shape it was
/// queued against (e.g. an earlier fix or a conflicting edit changed
/// it); the failure becomes a diagnostic and the pass continues with
/// the next fix.
pub fn apply_fixes(document: Document, fixes: &[Fix]) -> FixOutcome {
    let mut current = document;
    let mut applied = 0;
    let mut failures = vec![];

    for fix in fixes {
        match apply_one(&current, fix) {
            Ok(next) => {
                current = next;
                applied += 1;
            }
            Err(err) => {
                tracing::debug!(
                    rule = fix.rule,
                    title = %fix.title,
                    "fix not applied: {err}"
                );
                failures.push(Diagnostic {
                    rule: fix.rule,
                    message: format!(
                        "autofix \"{title}\" could not be applied: {err}",
                        title = fix.title
                    ),
                    pos: fix.pos,
                    kind: DiagnosticKind::Syntax,
                    severity: Severity::Info,
                });
            }
        }
    }

    FixOutcome {
        document: current,
        applied,
        failures,
    }
}

fn apply_one(document: &Document, fix: &Fix) -> Result<Document, yamlgraft::Error> {
    let mut patches = fix.patches.iter();

    let Some(first) = patches.next() else {
        return Err(yamlgraft::Error::InvalidPatch("fix has no patches".into()));
    };

    // Each patch re-parses, so this chain works on scratch documents
    // and the caller's document is untouched on failure.
    let mut scratch = yamlgraft::apply_patch(document, first)?;
    for patch in patches {
        scratch = yamlgraft::apply_patch(&scratch, patch)?;
    }

    Ok(scratch)
}
