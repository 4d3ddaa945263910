//! Default context binding schemas.
//!
//! These model the globally-available contexts with their documented
//! static fields. Per-workflow contexts (`matrix`, `needs`, `steps`,
//! `inputs`, `secrets`) get precise types overlaid by the analyzer;
//! the defaults here keep standalone checking usable.

use crate::{
    check::Contexts,
    types::{ExprType, ObjectType},
};

fn string() -> ExprType {
    ExprType::String
}

/// The `github` context. Loose: the webhook payload under `event` is
/// shaped by the trigger, so unknown fields must not be errors.
fn github_context() -> ExprType {
    ExprType::Object(ObjectType::loose([
        ("action", string()),
        ("action_path", string()),
        ("action_repository", string()),
        ("actor", string()),
        ("actor_id", string()),
        ("api_url", string()),
        ("base_ref", string()),
        ("env", string()),
        ("event", ExprType::any_object()),
        ("event_name", string()),
        ("event_path", string()),
        ("graphql_url", string()),
        ("head_ref", string()),
        ("job", string()),
        ("path", string()),
        ("ref", string()),
        ("ref_name", string()),
        ("ref_protected", ExprType::Bool),
        ("ref_type", string()),
        ("repository", string()),
        ("repository_id", string()),
        ("repository_owner", string()),
        ("repository_owner_id", string()),
        ("repositoryurl", string()),
        ("retention_days", ExprType::Number),
        ("run_attempt", string()),
        ("run_id", string()),
        ("run_number", string()),
        ("secret_source", string()),
        ("server_url", string()),
        ("sha", string()),
        ("token", string()),
        ("triggering_actor", string()),
        ("workflow", string()),
        ("workflow_ref", string()),
        ("workflow_sha", string()),
        ("workspace", string()),
    ]))
}

fn runner_context() -> ExprType {
    ExprType::Object(ObjectType::strict([
        ("arch", string()),
        ("debug", string()),
        ("environment", string()),
        ("name", string()),
        ("os", string()),
        ("temp", string()),
        ("tool_cache", string()),
    ]))
}

fn job_context() -> ExprType {
    ExprType::Object(ObjectType::loose([
        (
            "container",
            ExprType::Object(ObjectType::loose([
                ("id", string()),
                ("network", string()),
            ])),
        ),
        (
            "services",
            ExprType::Object(ObjectType::map_of(ExprType::any_object())),
        ),
        ("status", string()),
    ]))
}

fn strategy_context() -> ExprType {
    ExprType::Object(ObjectType::strict([
        ("fail-fast", ExprType::Bool),
        ("job-index", ExprType::Number),
        ("job-total", ExprType::Number),
        ("max-parallel", ExprType::Number),
    ]))
}

/// The default context bindings available to every expression.
pub fn default_contexts() -> Contexts {
    [
        ("github", github_context()),
        ("env", ExprType::Object(ObjectType::map_of(string()))),
        ("vars", ExprType::Object(ObjectType::map_of(string()))),
        (
            "secrets",
            ExprType::Object(ObjectType {
                strict: false,
                props: [("github_token".to_string(), string())].into_iter().collect(),
                mapped: Some(string().into()),
            }),
        ),
        ("job", job_context()),
        ("jobs", ExprType::Object(ObjectType::map_of(ExprType::any_object()))),
        ("runner", runner_context()),
        ("strategy", strategy_context()),
        ("matrix", ExprType::any_object()),
        ("needs", ExprType::Object(ObjectType::map_of(ExprType::any_object()))),
        ("steps", ExprType::Object(ObjectType::map_of(ExprType::any_object()))),
        ("inputs", ExprType::any_object()),
    ]
    .into_iter()
    .map(|(name, ty)| (name.to_string(), ty))
    .collect()
}
