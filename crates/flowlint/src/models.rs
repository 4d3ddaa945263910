//! Typed models for parsed workflow files.
//!
//! Every node carries the [`Position`] it was parsed from, and nodes
//! that autofixes may rewrite additionally carry the [`Route`] back
//! into the YAML document. Routes are the only channel through which
//! fixes mutate text, which is what keeps comments and formatting of
//! untouched spans intact.

use indexmap::IndexMap;
use yamlgraft::{Position, Route};

/// A string value as it appeared in the source.
#[derive(Clone, Debug)]
pub struct SourceString {
    /// The resolved string value.
    pub value: String,
    /// Whether the scalar was quoted.
    pub quoted: bool,
    /// Whether the scalar was a `|` literal block.
    pub literal_block: bool,
    /// The scalar's position.
    pub pos: Position,
    /// The route to the scalar.
    pub route: Route,
}

impl SourceString {
    /// Whether the value contains at least one `${{ … }}` fragment.
    pub fn contains_expression(&self) -> bool {
        self.value.contains("${{")
    }

    /// Translates a byte offset within [`SourceString::value`] into a
    /// document position.
    ///
    /// The mapping follows the template-scan contract: the position of
    /// an inner offset is the string's own position advanced by the
    /// line/column delta of the offset within the value, with a literal
    /// block contributing its leading newline (content starts on the
    /// line after the `|` header, at the value's own column).
    pub fn offset_position(&self, offset: usize) -> Position {
        let (line_delta, col_delta) = flowlint_expr::template::offset_to_delta(&self.value, offset);

        if self.literal_block {
            Position::new(self.pos.line + 1 + line_delta, 1 + col_delta)
        } else if line_delta == 0 {
            Position::new(self.pos.line, self.pos.col + col_delta)
        } else {
            Position::new(self.pos.line + line_delta, 1 + col_delta)
        }
    }
}

impl std::fmt::Display for SourceString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A literal-or-expression value: typed fields may be given either as
/// a literal of their type or as a `${{ … }}` expression whose
/// validation is deferred to the expression checker.
#[derive(Clone, Debug)]
pub enum LoE<T> {
    /// A literal value.
    Literal(T),
    /// An expression standing in for the value.
    Expr(SourceString),
}

impl<T> LoE<T> {
    /// The literal value, if this isn't an expression.
    pub fn as_literal(&self) -> Option<&T> {
        match self {
            LoE::Literal(v) => Some(v),
            LoE::Expr(_) => None,
        }
    }
}

/// A raw YAML value, used where workflows embed free-form data
/// (matrix rows and include/exclude combinations).
#[derive(Clone, Debug)]
pub struct RawValue {
    /// The value's position.
    pub pos: Position,
    /// The value itself.
    pub kind: RawValueKind,
}

/// The payload of a [`RawValue`].
#[derive(Clone, Debug)]
pub enum RawValueKind {
    /// A null.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    Str(String),
    /// A sequence of values.
    Seq(Vec<RawValue>),
    /// A string-keyed mapping of values.
    Map(IndexMap<String, RawValue>),
}

/// A parsed workflow file.
#[derive(Clone, Debug)]
pub struct Workflow {
    /// The workflow's `name:`, if any.
    pub name: Option<SourceString>,
    /// The events that trigger the workflow.
    pub on: Vec<Event>,
    /// Workflow-level permissions.
    pub permissions: Option<Permissions>,
    /// Workflow-level environment variables.
    pub env: Option<Env>,
    /// Workflow-level run defaults.
    pub defaults: Option<Defaults>,
    /// The workflow's concurrency group.
    pub concurrency: Option<Concurrency>,
    /// The workflow's jobs, in declaration order.
    pub jobs: IndexMap<String, Job>,
    /// The position of the document's top-level mapping.
    pub pos: Position,
}

impl Workflow {
    /// The `workflow_call` event, if the workflow is callable.
    pub fn workflow_call_event(&self) -> Option<&WorkflowCallEvent> {
        self.on.iter().find_map(|event| match event {
            Event::WorkflowCall(call) => Some(call),
            _ => None,
        })
    }

    /// Whether any trigger's payload may be influenced by external
    /// contributors.
    pub fn has_untrusted_trigger(&self) -> bool {
        self.on.iter().any(|event| {
            matches!(
                event,
                Event::Webhook(webhook)
                    if matches!(
                        webhook.name.value.as_str(),
                        "pull_request_target" | "workflow_run" | "issue_comment"
                    )
            )
        })
    }
}

/// A workflow trigger.
#[derive(Clone, Debug)]
pub enum Event {
    /// A plain webhook event (`push`, `pull_request`, …), with its
    /// optional filters.
    Webhook(WebhookEvent),
    /// A `schedule:` trigger.
    Schedule {
        /// The cron lines.
        crons: Vec<SourceString>,
        /// The event's position.
        pos: Position,
    },
    /// A `workflow_dispatch:` trigger.
    WorkflowDispatch {
        /// Declared inputs.
        inputs: IndexMap<String, DispatchInput>,
        /// The event's position.
        pos: Position,
    },
    /// A `repository_dispatch:` trigger.
    RepositoryDispatch {
        /// Accepted dispatch types.
        types: Vec<SourceString>,
        /// The event's position.
        pos: Position,
    },
    /// A `workflow_call:` trigger.
    WorkflowCall(WorkflowCallEvent),
}

impl Event {
    /// The event's position.
    pub fn pos(&self) -> Position {
        match self {
            Event::Webhook(webhook) => webhook.pos,
            Event::Schedule { pos, .. }
            | Event::WorkflowDispatch { pos, .. }
            | Event::RepositoryDispatch { pos, .. } => *pos,
            Event::WorkflowCall(call) => call.pos,
        }
    }
}

/// A webhook-style trigger with its filters.
#[derive(Clone, Debug)]
pub struct WebhookEvent {
    /// The event name (e.g. `push`).
    pub name: SourceString,
    /// The `types:` filter.
    pub types: Vec<SourceString>,
    /// The `branches:` filter.
    pub branches: Vec<SourceString>,
    /// The `branches-ignore:` filter.
    pub branches_ignore: Vec<SourceString>,
    /// The `tags:` filter.
    pub tags: Vec<SourceString>,
    /// The `tags-ignore:` filter.
    pub tags_ignore: Vec<SourceString>,
    /// The `paths:` filter.
    pub paths: Vec<SourceString>,
    /// The `paths-ignore:` filter.
    pub paths_ignore: Vec<SourceString>,
    /// The event's position.
    pub pos: Position,
}

/// The type of a `workflow_dispatch` input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DispatchInputType {
    /// A free-form string.
    String,
    /// A number.
    Number,
    /// A boolean.
    Boolean,
    /// One of a fixed set of options.
    Choice,
    /// A deployment environment name.
    Environment,
}

/// A single `workflow_dispatch` input.
#[derive(Clone, Debug)]
pub struct DispatchInput {
    /// The input's description.
    pub description: Option<SourceString>,
    /// Whether the input is required.
    pub required: Option<LoE<bool>>,
    /// The input's default value.
    pub default: Option<SourceString>,
    /// The input's declared type.
    pub ty: DispatchInputType,
    /// Options, for `choice` inputs.
    pub options: Vec<SourceString>,
    /// The input's position.
    pub pos: Position,
}

/// The type of a `workflow_call` input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallInputType {
    /// A boolean.
    Boolean,
    /// A number.
    Number,
    /// A string.
    String,
}

/// A single `workflow_call` input declaration.
#[derive(Clone, Debug)]
pub struct CallInput {
    /// The input's description.
    pub description: Option<SourceString>,
    /// Whether callers must provide the input.
    pub required: Option<LoE<bool>>,
    /// The input's default value.
    pub default: Option<SourceString>,
    /// The input's declared type.
    pub ty: CallInputType,
    /// The input's position.
    pub pos: Position,
}

/// A single `workflow_call` secret declaration.
#[derive(Clone, Debug)]
pub struct CallSecret {
    /// The secret's description.
    pub description: Option<SourceString>,
    /// Whether callers must provide the secret.
    pub required: Option<LoE<bool>>,
    /// The secret's position.
    pub pos: Position,
}

/// A single `workflow_call` output declaration.
#[derive(Clone, Debug)]
pub struct CallOutput {
    /// The output's description.
    pub description: Option<SourceString>,
    /// The output's value expression.
    pub value: Option<SourceString>,
    /// The output's position.
    pub pos: Position,
}

/// The `workflow_call:` trigger body.
#[derive(Clone, Debug)]
pub struct WorkflowCallEvent {
    /// Declared inputs.
    pub inputs: IndexMap<String, CallInput>,
    /// Declared secrets.
    pub secrets: IndexMap<String, CallSecret>,
    /// Declared outputs.
    pub outputs: IndexMap<String, CallOutput>,
    /// The event's position.
    pub pos: Position,
}

/// A `permissions:` block: either a blanket policy or per-scope values.
#[derive(Clone, Debug)]
pub struct Permissions {
    /// A blanket policy (`read-all`, `write-all`), if given as a scalar.
    pub all: Option<SourceString>,
    /// Per-scope values.
    pub scopes: IndexMap<String, PermissionScope>,
    /// The block's position.
    pub pos: Position,
}

/// A single permission scope entry.
#[derive(Clone, Debug)]
pub struct PermissionScope {
    /// The scope name's position.
    pub name_pos: Position,
    /// The scope's access value (`read`, `write`, `none`).
    pub value: SourceString,
}

/// An `env:` block: a literal mapping, or a whole-map expression.
#[derive(Clone, Debug)]
pub struct Env {
    /// The declared variables, in order.
    pub vars: IndexMap<String, EnvVar>,
    /// The whole-map expression, if `env:` was given as one.
    pub expression: Option<SourceString>,
    /// The block's position.
    pub pos: Position,
}

/// A single environment variable.
#[derive(Clone, Debug)]
pub struct EnvVar {
    /// The variable name's position.
    pub name_pos: Position,
    /// The variable's value.
    pub value: SourceString,
}

/// A `defaults:` block.
#[derive(Clone, Debug)]
pub struct Defaults {
    /// The `run:` defaults.
    pub run: Option<DefaultsRun>,
    /// The block's position.
    pub pos: Position,
}

/// The `defaults.run` settings.
#[derive(Clone, Debug)]
pub struct DefaultsRun {
    /// The default shell.
    pub shell: Option<SourceString>,
    /// The default working directory.
    pub working_directory: Option<SourceString>,
}

/// A `concurrency:` block.
#[derive(Clone, Debug)]
pub struct Concurrency {
    /// The concurrency group name.
    pub group: Option<SourceString>,
    /// Whether in-progress runs are cancelled.
    pub cancel_in_progress: Option<LoE<bool>>,
    /// The block's position.
    pub pos: Position,
}

/// The `runs-on:` value.
#[derive(Clone, Debug)]
pub enum RunsOn {
    /// The whole value is an expression.
    Expr(SourceString),
    /// One or more runner labels.
    Labels(Vec<SourceString>),
    /// The `{group, labels}` mapping form.
    Group {
        /// The runner group.
        group: Option<SourceString>,
        /// The labels within the group.
        labels: Vec<SourceString>,
        /// The mapping's position.
        pos: Position,
    },
}

impl RunsOn {
    /// All labels named by this `runs-on`, regardless of form.
    pub fn labels(&self) -> &[SourceString] {
        match self {
            RunsOn::Expr(_) => &[],
            RunsOn::Labels(labels) | RunsOn::Group { labels, .. } => labels,
        }
    }
}

/// A job's `strategy:` block.
#[derive(Clone, Debug)]
pub struct Strategy {
    /// The matrix, if any.
    pub matrix: Option<Matrix>,
    /// The `fail-fast:` setting.
    pub fail_fast: Option<LoE<bool>>,
    /// The `max-parallel:` setting.
    pub max_parallel: Option<LoE<f64>>,
    /// The block's position.
    pub pos: Position,
}

/// One row of a matrix: a name and its list of values.
#[derive(Clone, Debug)]
pub struct MatrixRow {
    /// The row name's position.
    pub name_pos: Position,
    /// The row's values, or an expression denoting the whole list.
    pub values: LoE<Vec<RawValue>>,
}

/// A matrix combination, as used by `include:` and `exclude:`.
#[derive(Clone, Debug)]
pub struct MatrixCombination {
    /// The combination's assignments.
    pub assigns: IndexMap<String, RawValue>,
    /// The combination's position.
    pub pos: Position,
}

/// A `strategy.matrix:` block.
#[derive(Clone, Debug)]
pub struct Matrix {
    /// Ordinary rows, keyed by row name.
    pub rows: IndexMap<String, MatrixRow>,
    /// `include:` combinations, or an expression for the whole list.
    pub include: Option<LoE<Vec<MatrixCombination>>>,
    /// `exclude:` combinations, or an expression for the whole list.
    pub exclude: Option<LoE<Vec<MatrixCombination>>>,
    /// The whole-matrix expression, if `matrix:` was given as one.
    pub expression: Option<SourceString>,
    /// The block's position.
    pub pos: Position,
}

/// A `container:` or service container block.
#[derive(Clone, Debug)]
pub struct Container {
    /// The container image.
    pub image: Option<SourceString>,
    /// Registry credentials.
    pub credentials: Option<Credentials>,
    /// Container environment variables.
    pub env: Option<Env>,
    /// Exposed ports.
    pub ports: Vec<SourceString>,
    /// Mounted volumes.
    pub volumes: Vec<SourceString>,
    /// Extra `docker create` options.
    pub options: Option<SourceString>,
    /// The block's position.
    pub pos: Position,
    /// The route to the block.
    pub route: Route,
}

/// Registry credentials for a container.
#[derive(Clone, Debug)]
pub struct Credentials {
    /// The username.
    pub username: Option<SourceString>,
    /// The password.
    pub password: Option<SourceString>,
    /// The block's position.
    pub pos: Position,
}

/// A reusable-workflow call (`uses:` at the job level).
#[derive(Clone, Debug)]
pub struct WorkflowCall {
    /// The callee reference.
    pub uses: SourceString,
    /// Inputs passed via `with:`.
    pub inputs: IndexMap<String, WorkflowCallArg>,
    /// Secrets passed via `secrets:`.
    pub secrets: IndexMap<String, WorkflowCallArg>,
    /// Whether `secrets: inherit` was given.
    pub inherit_secrets: bool,
    /// The call's position (the `uses:` key).
    pub pos: Position,
}

/// A single input/secret argument of a reusable-workflow call.
#[derive(Clone, Debug)]
pub struct WorkflowCallArg {
    /// The argument name's position.
    pub name_pos: Position,
    /// The argument's value.
    pub value: SourceString,
}

/// A single job.
#[derive(Clone, Debug)]
pub struct Job {
    /// The job's ID (its key under `jobs:`).
    pub id: String,
    /// The ID's position.
    pub id_pos: Position,
    /// The job's display name.
    pub name: Option<SourceString>,
    /// The job's `if:` condition.
    pub cond: Option<SourceString>,
    /// Upstream jobs this one needs.
    pub needs: Vec<SourceString>,
    /// Where the job runs. Absent on reusable-workflow-call jobs.
    pub runs_on: Option<RunsOn>,
    /// Job-level permissions.
    pub permissions: Option<Permissions>,
    /// Job-level environment variables.
    pub env: Option<Env>,
    /// The job's strategy.
    pub strategy: Option<Strategy>,
    /// The job's container.
    pub container: Option<Container>,
    /// Service containers, keyed by service name.
    pub services: IndexMap<String, Container>,
    /// The job's steps, in order.
    pub steps: Vec<Step>,
    /// Declared outputs.
    pub outputs: IndexMap<String, SourceString>,
    /// The reusable-workflow call, for call jobs.
    pub workflow_call: Option<WorkflowCall>,
    /// The job's timeout.
    pub timeout_minutes: Option<LoE<f64>>,
    /// Job-level run defaults.
    pub defaults: Option<Defaults>,
    /// The job's concurrency group.
    pub concurrency: Option<Concurrency>,
    /// The job's position (its key under `jobs:`).
    pub pos: Position,
    /// The route to the job's mapping.
    pub route: Route,
}

/// What a step executes.
#[derive(Clone, Debug)]
pub enum Exec {
    /// A `run:` step.
    Run {
        /// The script.
        script: SourceString,
        /// The shell to run it with.
        shell: Option<SourceString>,
        /// The working directory.
        working_dir: Option<SourceString>,
    },
    /// A `uses:` step.
    Action {
        /// The action reference.
        uses: SourceString,
        /// Inputs passed via `with:`.
        inputs: IndexMap<String, StepInput>,
        /// The `with.entrypoint` override, for Docker actions.
        entrypoint: Option<SourceString>,
        /// The `with.args` override, for Docker actions.
        args: Option<SourceString>,
    },
}

/// A single `with:` input on an action step.
#[derive(Clone, Debug)]
pub struct StepInput {
    /// The input name's position.
    pub name_pos: Position,
    /// The input's value.
    pub value: SourceString,
}

/// A single step.
#[derive(Clone, Debug)]
pub struct Step {
    /// The step's index within its job.
    pub index: usize,
    /// The step's `id:`, if any.
    pub id: Option<SourceString>,
    /// The step's `if:` condition.
    pub cond: Option<SourceString>,
    /// The step's display name.
    pub name: Option<SourceString>,
    /// Step-level environment variables.
    pub env: Option<Env>,
    /// The step's timeout.
    pub timeout_minutes: Option<LoE<f64>>,
    /// Whether failures are tolerated.
    pub continue_on_error: Option<LoE<bool>>,
    /// What the step executes.
    pub exec: Exec,
    /// The step's position.
    pub pos: Position,
    /// The route to the step's mapping.
    pub route: Route,
}

impl Step {
    /// The action reference, for `uses:` steps.
    pub fn uses(&self) -> Option<&SourceString> {
        match &self.exec {
            Exec::Action { uses, .. } => Some(uses),
            Exec::Run { .. } => None,
        }
    }

    /// The script, for `run:` steps.
    pub fn run(&self) -> Option<&SourceString> {
        match &self.exec {
            Exec::Run { script, .. } => Some(script),
            Exec::Action { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn source_string(value: &str, pos: Position, literal_block: bool) -> SourceString {
        SourceString {
            value: value.into(),
            quoted: false,
            literal_block,
            pos,
            route: Route::new(),
        }
    }

    #[test]
    fn test_offset_position_single_line() {
        let s = source_string("echo ${{ x }}", Position::new(4, 12), false);
        assert_eq!(s.offset_position(0), Position::new(4, 12));
        assert_eq!(s.offset_position(5), Position::new(4, 17));
    }

    #[test]
    fn test_offset_position_multiline() {
        let s = source_string("a\necho ${{ x }}", Position::new(4, 12), false);
        assert_eq!(s.offset_position(2), Position::new(5, 1));
        assert_eq!(s.offset_position(7), Position::new(5, 6));
    }

    #[test]
    fn test_offset_position_literal_block() {
        // A literal block's content starts on the line after the `|`.
        let s = source_string("echo hi\necho ${{ x }}", Position::new(10, 12), true);
        assert_eq!(s.offset_position(0), Position::new(11, 1));
        assert_eq!(s.offset_position(8), Position::new(12, 1));
        assert_eq!(s.offset_position(13), Position::new(12, 6));
    }
}
