//! End-to-end scenarios driving the full pipeline: parse, rules,
//! diagnostics, and fix application.

use std::sync::Arc;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use flowlint::{
    AnalyzeOptions, Diagnostic, analyze,
    cache::{Caches, ReusableInput, ReusableWorkflowMetadata},
    config::Config,
};

fn empty_caches() -> Arc<Caches> {
    Arc::new(Caches::with_loaders(
        Box::new(|_| Ok(None)),
        Box::new(|_| Ok(None)),
    ))
}

fn check(source: &str) -> Vec<Diagnostic> {
    analyze(
        source,
        &Config::default(),
        &empty_caches(),
        &AnalyzeOptions::default(),
    )
    .expect("analysis failed")
    .diagnostics
}

fn check_and_fix(source: &str) -> (Vec<Diagnostic>, Option<String>) {
    let analysis = analyze(
        source,
        &Config::default(),
        &empty_caches(),
        &AnalyzeOptions {
            fix: true,
            ..Default::default()
        },
    )
    .expect("analysis failed");
    (analysis.diagnostics, analysis.fixed)
}

#[test]
fn seed_type_mismatch_in_if() {
    let diags = check(
        "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - if: \"${{ 42 }}\"\n        run: make\n",
    );

    let findings: Vec<_> = diags
        .iter()
        .filter(|d| d.rule == "expression" && d.message.contains("must be bool"))
        .collect();
    assert_eq!(findings.len(), 1, "{diags:?}");
    assert_eq!(findings[0].pos.line, 6);
}

#[test]
fn seed_untrusted_input_code_injection() {
    let source = "on: pull_request_target\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo \"${{ github.event.pull_request.title }}\"\n";

    let (diags, fixed) = check_and_fix(source);

    let findings: Vec<_> = diags
        .iter()
        .filter(|d| d.rule == "untrusted-input")
        .collect();
    assert_eq!(findings.len(), 1, "{diags:?}");
    assert!(
        findings[0]
            .message
            .contains("github.event.pull_request.title")
    );

    let fixed = fixed.expect("a fix should have applied");
    assert!(fixed.contains("run: echo \"$PR_TITLE\""), "{fixed}");
    assert!(
        fixed.contains("PR_TITLE: \"${{ github.event.pull_request.title }}\""),
        "{fixed}"
    );
    assert!(fixed.contains("env:"), "{fixed}");
}

#[test]
fn seed_unpinned_action() {
    let source = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v3\n";

    let (diags, fixed) = check_and_fix(source);

    let findings: Vec<_> = diags.iter().filter(|d| d.rule == "commit-sha").collect();
    assert_eq!(findings.len(), 1, "{diags:?}");
    assert!(findings[0].message.contains("full length commit SHA"));

    // Other rules may fix other things, but the reference itself is
    // not rewritten.
    if let Some(fixed) = fixed {
        assert!(fixed.contains("actions/checkout@v3"), "{fixed}");
    }
}

#[test]
fn seed_missing_timeout() {
    let source =
        "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: make\n";

    let (diags, fixed) = check_and_fix(source);

    let findings: Vec<_> = diags
        .iter()
        .filter(|d| d.rule == "missing-timeout")
        .collect();
    assert_eq!(findings.len(), 2, "one per job and one per step: {diags:?}");

    assert_eq!(
        fixed.expect("fixes should have applied"),
        "on: push\njobs:\n  build:\n    timeout-minutes: 5\n    runs-on: ubuntu-latest\n    steps:\n      - timeout-minutes: 5\n        run: make\n"
    );
}

#[test]
fn seed_reusable_workflow_call_arity() {
    let caches = Arc::new(Caches::with_loaders(
        Box::new(|_| Ok(None)),
        Box::new(|path| {
            assert_eq!(path.as_str(), "./.github/workflows/deploy.yml");
            let mut inputs = IndexMap::new();
            inputs.insert(
                "required".to_string(),
                ReusableInput {
                    required: true,
                    has_default: false,
                },
            );
            inputs.insert(
                "optional".to_string(),
                ReusableInput {
                    required: false,
                    has_default: false,
                },
            );
            let mut secrets = IndexMap::new();
            secrets.insert("tok".to_string(), true);
            Ok(Some(ReusableWorkflowMetadata {
                inputs,
                secrets,
                outputs: vec![],
            }))
        }),
    ));

    let analysis = analyze(
        "on: push\njobs:\n  deploy:\n    uses: ./.github/workflows/deploy.yml\n",
        &Config::default(),
        &caches,
        &AnalyzeOptions::default(),
    )
    .expect("analysis failed");

    let findings: Vec<_> = analysis
        .diagnostics
        .iter()
        .filter(|d| d.rule == "workflow-call")
        .collect();
    assert_eq!(findings.len(), 2, "{:?}", analysis.diagnostics);
    assert!(findings[0].message.contains("input \"required\""));
    assert!(findings[1].message.contains("secret \"tok\""));

    // Both diagnostics anchor at the caller's `uses:` value.
    assert_eq!(findings[0].pos.line, 4);
    assert_eq!(findings[1].pos.line, 4);
}

#[test]
fn seed_path_obfuscation_fix() {
    let source = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: owner/repo/./sub/../sub@v1\n";

    let (diags, fixed) = check_and_fix(source);

    let findings: Vec<_> = diags.iter().filter(|d| d.rule == "obfuscation").collect();
    assert_eq!(findings.len(), 1, "{diags:?}");
    assert!(findings[0].message.contains("\".\""));
    assert!(findings[0].message.contains("\"..\""));

    let fixed = fixed.expect("the normalization fix should have applied");
    assert!(fixed.contains("uses: owner/repo/sub@v1"), "{fixed}");
    assert!(!fixed.contains(".."), "{fixed}");
}

#[test]
fn fixes_are_idempotent() {
    let source = "on: pull_request_target\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo \"${{ github.event.pull_request.title }}\"\n";

    let (first_diags, fixed) = check_and_fix(source);
    let fixed = fixed.expect("fixes should have applied");

    // Re-analyzing the fixed output yields strictly fewer findings and
    // nothing further to fix.
    let (second_diags, second_fixed) = check_and_fix(&fixed);
    assert!(second_diags.len() < first_diags.len());
    assert_eq!(second_fixed, None, "{second_diags:?}");
}

#[test]
fn boundary_expression_forms_are_syntax_errors() {
    for bad_condition in ["\"${{\"", "\"}}\"", "\"${{ }}\""] {
        let source = format!(
            "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - if: {bad_condition}\n        run: make\n"
        );

        let diags = check(&source);
        assert!(
            diags.iter().any(|d| d.rule == "expression"
                && d.kind == flowlint::DiagnosticKind::Syntax),
            "expected a syntax diagnostic for {bad_condition}: {diags:?}"
        );
    }
}

#[test]
fn diagnostics_carry_valid_positions() {
    let source = "on: pull_request_target\nnonsense: true\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - if: \"${{ 42 }}\"\n        run: echo \"${{ github.event.pull_request.title }}\"\n      - uses: actions/checkout@v3\n";

    let diags = check(source);
    assert!(!diags.is_empty());

    let lines: Vec<&str> = source.lines().collect();
    for diag in &diags {
        assert!(diag.pos.line >= 1 && diag.pos.line <= lines.len(), "{diag}");
        let line = lines[diag.pos.line - 1];
        assert!(
            diag.pos.col >= 1 && diag.pos.col <= line.len() + 1,
            "{diag} vs line {line:?}"
        );
    }
}
