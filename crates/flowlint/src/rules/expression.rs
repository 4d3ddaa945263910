//! Type-checks every `${{ … }}` template in the workflow.
//!
//! Context types are rebuilt as the walk descends: `inputs`/`secrets`
//! are derived from the workflow's triggers at `visit_workflow_pre`;
//! `matrix`, `needs`, and `steps` are derived per job at
//! `visit_job_pre` and torn down at `visit_job_post`; the `steps` type
//! grows as steps with `id:` are visited.

use flowlint_expr::{
    Expr, Span, Spanned, SpannedExpr,
    check::{Checker, Contexts},
    contexts::default_contexts,
    template::extract_fragments,
    types::{ExprType, ObjectType},
};
use indexmap::IndexMap;

use crate::{
    diagnostic::{DiagnosticKind, Severity},
    models::{
        CallInputType, DispatchInputType, Env, Event, Job, LoE, Matrix, RawValue, RawValueKind,
        RunsOn, SourceString, Step, Workflow,
    },
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

pub(crate) struct ExpressionRule {
    state: RuleState,
    workflow_contexts: Contexts,
    job_contexts: Option<Contexts>,
    steps_props: ObjectType,
    jobs_outputs: IndexMap<String, Vec<String>>,
}

rule_meta!(
    ExpressionRule,
    "expression",
    "type error in template expression"
);

/// What a templated string is expected to evaluate to, determined by
/// the key-path it appears at.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Expected {
    /// A boolean (`if:` conditions).
    Bool,
    /// A number (`timeout-minutes:` and friends).
    Number,
    /// A string-convertible value (everything else).
    Text,
    /// An object (whole-map `env:` expressions).
    Map,
    /// An array (whole-row matrix expressions).
    List,
}

impl ExpressionRule {
    pub(crate) fn new(_state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
            workflow_contexts: default_contexts(),
            job_contexts: None,
            steps_props: ObjectType {
                strict: true,
                ..Default::default()
            },
            jobs_outputs: IndexMap::new(),
        })
    }

    /// Type-checks every fragment of `source`, then checks the
    /// template's overall type against `expected`.
    fn check_template(
        state: &mut RuleState,
        contexts: &Contexts,
        source: &SourceString,
        expected: Expected,
    ) {
        let (fragments, template_errors) = extract_fragments(&source.value);

        for error in template_errors {
            state.error(
                source.offset_position(error.offset),
                DiagnosticKind::Syntax,
                Severity::Medium,
                error.message,
            );
        }

        let whole_template = fragments.len() == 1
            && source.value.trim() == &source.value[fragments[0].span.clone()];

        let mut checker = Checker::new(contexts);

        for fragment in &fragments {
            let expr = match Expr::parse(fragment.inner) {
                Ok(expr) => expr,
                Err(parse_error) => {
                    state.error(
                        source.offset_position(fragment.inner_offset + parse_error.offset),
                        DiagnosticKind::Syntax,
                        Severity::Medium,
                        parse_error.message,
                    );
                    continue;
                }
            };

            let ty = checker.check(&expr);
            for diag in checker.take_diagnostics() {
                state.error(
                    source.offset_position(fragment.inner_offset + diag.offset),
                    DiagnosticKind::Type,
                    Severity::Medium,
                    diag.message,
                );
            }

            let verdict = if whole_template {
                match expected {
                    Expected::Bool => (!matches!(ty, ExprType::Bool | ExprType::Unknown))
                        .then(|| format!("expression must be bool but is {ty}")),
                    Expected::Number => (!matches!(ty, ExprType::Number | ExprType::Unknown))
                        .then(|| format!("expression must be number but is {ty}")),
                    Expected::Map => {
                        (!matches!(ty, ExprType::Object(_) | ExprType::Unknown))
                            .then(|| format!("expression must be an object but is {ty}"))
                    }
                    Expected::List => (!matches!(ty, ExprType::Array(_) | ExprType::Unknown))
                        .then(|| format!("expression must be an array but is {ty}")),
                    Expected::Text => {
                        (!matches!(
                            ty,
                            ExprType::String | ExprType::Number | ExprType::Bool | ExprType::Unknown
                        ))
                        .then(|| format!("expression cannot be used as a string value: it is {ty}"))
                    }
                }
            } else {
                // Interpolated fragments must each stringify.
                (!matches!(
                    ty,
                    ExprType::String | ExprType::Number | ExprType::Bool | ExprType::Unknown
                ))
                .then(|| format!("expression cannot be interpolated into a string: it is {ty}"))
            };

            if let Some(message) = verdict {
                state.error(source.pos, DiagnosticKind::Type, Severity::Medium, message);
            }
        }
    }

    fn check(&mut self, source: &SourceString, expected: Expected) {
        let contexts = self
            .job_contexts
            .as_ref()
            .unwrap_or(&self.workflow_contexts);

        if !source.contains_expression() {
            // An `if:` condition without template fences is still an
            // expression: `if: github.ref == 'x'` is valid as written.
            if expected == Expected::Bool && !source.value.trim().is_empty() {
                Self::check_bare_condition(&mut self.state, contexts, source);
            }
            return;
        }

        Self::check_template(&mut self.state, contexts, source, expected);
    }

    /// Checks a fence-less `if:` value as one whole expression.
    fn check_bare_condition(state: &mut RuleState, contexts: &Contexts, source: &SourceString) {
        let expr = match Expr::parse(&source.value) {
            Ok(expr) => expr,
            Err(parse_error) => {
                state.error(
                    source.offset_position(parse_error.offset),
                    DiagnosticKind::Syntax,
                    Severity::Medium,
                    parse_error.message,
                );
                return;
            }
        };

        let mut checker = Checker::new(contexts);
        let ty = checker.check(&expr);
        for diag in checker.take_diagnostics() {
            state.error(
                source.offset_position(diag.offset),
                DiagnosticKind::Type,
                Severity::Medium,
                diag.message,
            );
        }

        if !matches!(ty, ExprType::Bool | ExprType::Unknown) {
            state.error(
                source.pos,
                DiagnosticKind::Type,
                Severity::Medium,
                format!("expression must be bool but is {ty}"),
            );
        }
    }

    fn check_env(&mut self, env: &Env) {
        if let Some(expression) = &env.expression {
            self.check(expression, Expected::Map);
        }
        for var in env.vars.values() {
            self.check(&var.value, Expected::Text);
        }
    }

    /// Lifts a raw YAML value into the expression domain.
    fn raw_expr(value: &RawValue) -> SpannedExpr {
        let inner = match &value.kind {
            RawValueKind::Null => Expr::Null,
            RawValueKind::Bool(b) => Expr::Bool(*b),
            RawValueKind::Int(i) => Expr::Int(*i),
            RawValueKind::Float(f) => Expr::Float(*f),
            RawValueKind::Str(s) => Expr::String(s.clone()),
            RawValueKind::Seq(items) => Expr::Array(items.iter().map(Self::raw_expr).collect()),
            RawValueKind::Map(entries) => Expr::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::raw_expr(v)))
                    .collect(),
            ),
        };

        Spanned::new(inner, Span::synthetic())
    }

    /// The type of a raw YAML value, via the checker's handling of
    /// lifted array/object expressions.
    fn raw_type(contexts: &Contexts, value: &RawValue) -> ExprType {
        let mut checker = Checker::new(contexts);
        checker.check(&Self::raw_expr(value))
    }

    /// Derives the `matrix` context type: a strict object whose
    /// properties are the union of the row names, with include
    /// combinations merged in.
    fn matrix_type(contexts: &Contexts, matrix: &Matrix) -> ExprType {
        if matrix.expression.is_some() {
            return ExprType::any_object();
        }

        let mut props = ObjectType {
            strict: true,
            ..Default::default()
        };

        for (name, row) in &matrix.rows {
            let ty = match &row.values {
                LoE::Expr(_) => ExprType::Unknown,
                LoE::Literal(values) => values
                    .iter()
                    .map(|value| Self::raw_type(contexts, value))
                    .reduce(ExprType::fuse)
                    .unwrap_or(ExprType::Unknown),
            };
            props.insert(name.clone(), ty);
        }

        match &matrix.include {
            // An expression include may introduce arbitrary properties.
            Some(LoE::Expr(_)) => props.strict = false,
            Some(LoE::Literal(combinations)) => {
                for combination in combinations {
                    for (name, value) in &combination.assigns {
                        let ty = Self::raw_type(contexts, value);
                        let merged = match props.prop(name) {
                            Some(existing) => existing.clone().fuse(ty),
                            None => ty,
                        };
                        props.insert(name.clone(), merged);
                    }
                }
            }
            None => {}
        }

        ExprType::Object(props)
    }

    /// Derives the `needs` context type from the job's declared
    /// dependencies and their outputs.
    fn needs_type(&self, job: &Job) -> ExprType {
        let mut props = ObjectType {
            strict: true,
            ..Default::default()
        };

        for need in &job.needs {
            let outputs = self
                .jobs_outputs
                .get(&need.value)
                .cloned()
                .unwrap_or_default();

            let outputs_ty = ObjectType::strict(
                outputs
                    .into_iter()
                    .map(|name| (name, ExprType::String)),
            );

            props.insert(
                need.value.clone(),
                ExprType::Object(ObjectType::strict([
                    ("outputs", ExprType::Object(outputs_ty)),
                    ("result", ExprType::String),
                ])),
            );
        }

        ExprType::Object(props)
    }

    /// The type recorded under `steps.<id>`.
    fn step_entry_type() -> ExprType {
        ExprType::Object(ObjectType::strict([
            (
                "outputs",
                ExprType::Object(ObjectType::map_of(ExprType::String)),
            ),
            ("outcome", ExprType::String),
            ("conclusion", ExprType::String),
        ]))
    }

    /// Derives the `inputs` context type from the workflow's
    /// `workflow_call` and `workflow_dispatch` triggers.
    fn inputs_type(workflow: &Workflow) -> Option<ExprType> {
        let mut props = ObjectType {
            strict: true,
            ..Default::default()
        };
        let mut any = false;

        for event in &workflow.on {
            match event {
                Event::WorkflowCall(call) => {
                    any = true;
                    for (name, input) in &call.inputs {
                        let ty = match input.ty {
                            CallInputType::Boolean => ExprType::Bool,
                            CallInputType::Number => ExprType::Number,
                            CallInputType::String => ExprType::String,
                        };
                        let merged = match props.prop(name) {
                            Some(existing) => existing.clone().fuse(ty),
                            None => ty,
                        };
                        props.insert(name.clone(), merged);
                    }
                }
                Event::WorkflowDispatch { inputs, .. } => {
                    any = true;
                    for (name, input) in inputs {
                        let ty = match input.ty {
                            DispatchInputType::Boolean => ExprType::Bool,
                            DispatchInputType::Number => ExprType::Number,
                            DispatchInputType::String
                            | DispatchInputType::Choice
                            | DispatchInputType::Environment => ExprType::String,
                        };
                        let merged = match props.prop(name) {
                            Some(existing) => existing.clone().fuse(ty),
                            None => ty,
                        };
                        props.insert(name.clone(), merged);
                    }
                }
                _ => {}
            }
        }

        any.then_some(ExprType::Object(props))
    }
}

impl Rule for ExpressionRule {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_workflow_pre(&mut self, workflow: &Workflow) -> anyhow::Result<()> {
        self.workflow_contexts = default_contexts();

        if let Some(inputs) = Self::inputs_type(workflow) {
            self.workflow_contexts.insert("inputs".into(), inputs);
        }

        if let Some(call) = workflow.workflow_call_event() {
            let mut secrets = ObjectType::map_of(ExprType::String);
            for name in call.secrets.keys() {
                secrets.insert(name.clone(), ExprType::String);
            }
            secrets.insert("github_token", ExprType::String);
            self.workflow_contexts
                .insert("secrets".into(), ExprType::Object(secrets));
        }

        self.jobs_outputs = workflow
            .jobs
            .iter()
            .map(|(id, job)| (id.clone(), job.outputs.keys().cloned().collect()))
            .collect();

        if let Some(name) = &workflow.name {
            self.check(name, Expected::Text);
        }
        if let Some(env) = &workflow.env {
            self.check_env(env);
        }
        if let Some(concurrency) = &workflow.concurrency {
            if let Some(group) = &concurrency.group {
                self.check(group, Expected::Text);
            }
            if let Some(LoE::Expr(cancel)) = &concurrency.cancel_in_progress {
                self.check(cancel, Expected::Bool);
            }
        }

        Ok(())
    }

    fn visit_job_pre(&mut self, job: &Job) -> anyhow::Result<()> {
        let mut contexts = self.workflow_contexts.clone();

        if let Some(matrix) = job.strategy.as_ref().and_then(|s| s.matrix.as_ref()) {
            contexts.insert(
                "matrix".into(),
                Self::matrix_type(&self.workflow_contexts, matrix),
            );
        }
        contexts.insert("needs".into(), self.needs_type(job));

        self.steps_props = ObjectType {
            strict: true,
            ..Default::default()
        };
        contexts.insert("steps".into(), ExprType::Object(self.steps_props.clone()));

        self.job_contexts = Some(contexts);

        if let Some(name) = &job.name {
            self.check(name, Expected::Text);
        }
        if let Some(cond) = &job.cond {
            self.check(cond, Expected::Bool);
        }
        if let Some(env) = &job.env {
            self.check_env(env);
        }
        if let Some(RunsOn::Expr(expr)) = &job.runs_on {
            self.check(expr, Expected::Text);
        }
        if let Some(LoE::Expr(timeout)) = &job.timeout_minutes {
            self.check(timeout, Expected::Number);
        }
        if let Some(concurrency) = &job.concurrency
            && let Some(group) = &concurrency.group
        {
            self.check(group, Expected::Text);
        }

        if let Some(strategy) = &job.strategy {
            if let Some(LoE::Expr(fail_fast)) = &strategy.fail_fast {
                self.check(fail_fast, Expected::Bool);
            }
            if let Some(LoE::Expr(max_parallel)) = &strategy.max_parallel {
                self.check(max_parallel, Expected::Number);
            }
            if let Some(matrix) = &strategy.matrix {
                if let Some(expression) = &matrix.expression {
                    self.check(expression, Expected::Map);
                }
                for row in matrix.rows.values() {
                    if let LoE::Expr(expr) = &row.values {
                        self.check(expr, Expected::List);
                    }
                }
                for combos in [&matrix.include, &matrix.exclude].into_iter().flatten() {
                    if let LoE::Expr(expr) = combos {
                        self.check(expr, Expected::List);
                    }
                }
            }
        }

        if let Some(container) = &job.container {
            if let Some(image) = &container.image {
                self.check(image, Expected::Text);
            }
            if let Some(env) = &container.env {
                self.check_env(env);
            }
        }

        if let Some(call) = &job.workflow_call {
            for input in call.inputs.values() {
                self.check(&input.value, Expected::Text);
            }
            for secret in call.secrets.values() {
                self.check(&secret.value, Expected::Text);
            }
        }

        Ok(())
    }

    fn visit_step(&mut self, step: &Step) -> anyhow::Result<()> {
        if let Some(id) = &step.id {
            self.check(id, Expected::Text);
        }
        if let Some(name) = &step.name {
            self.check(name, Expected::Text);
        }
        if let Some(cond) = &step.cond {
            self.check(cond, Expected::Bool);
        }
        if let Some(env) = &step.env {
            self.check_env(env);
        }
        if let Some(LoE::Expr(timeout)) = &step.timeout_minutes {
            self.check(timeout, Expected::Number);
        }
        if let Some(LoE::Expr(continue_on_error)) = &step.continue_on_error {
            self.check(continue_on_error, Expected::Bool);
        }

        match &step.exec {
            crate::models::Exec::Run {
                script,
                shell,
                working_dir,
            } => {
                self.check(script, Expected::Text);
                if let Some(shell) = shell {
                    self.check(shell, Expected::Text);
                }
                if let Some(working_dir) = working_dir {
                    self.check(working_dir, Expected::Text);
                }
            }
            crate::models::Exec::Action {
                uses,
                inputs,
                entrypoint,
                args,
            } => {
                if uses.contains_expression() {
                    self.state.error(
                        uses.pos,
                        DiagnosticKind::Syntax,
                        Severity::Medium,
                        "expressions are not allowed in \"uses\"",
                    );
                }
                for input in inputs.values() {
                    self.check(&input.value, Expected::Text);
                }
                if let Some(entrypoint) = entrypoint {
                    self.check(entrypoint, Expected::Text);
                }
                if let Some(args) = args {
                    self.check(args, Expected::Text);
                }
            }
        }

        // A step with an `id:` becomes addressable via the `steps`
        // context for the rest of the job.
        if let Some(id) = &step.id
            && !id.contains_expression()
        {
            self.steps_props.insert(id.value.clone(), Self::step_entry_type());
            if let Some(contexts) = self.job_contexts.as_mut() {
                contexts.insert("steps".into(), ExprType::Object(self.steps_props.clone()));
            }
        }

        Ok(())
    }

    fn visit_job_post(&mut self, job: &Job) -> anyhow::Result<()> {
        // Outputs are checked here so that the full `steps` type is in
        // scope for them.
        for output in job.outputs.values() {
            self.check(output, Expected::Text);
        }

        self.job_contexts = None;
        self.steps_props = ObjectType {
            strict: true,
            ..Default::default()
        };

        Ok(())
    }

    fn visit_workflow_post(&mut self, workflow: &Workflow) -> anyhow::Result<()> {
        if let Some(call) = workflow.workflow_call_event() {
            for output in call.outputs.values() {
                if let Some(value) = &output.value {
                    self.check(value, Expected::Text);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::testutil::analyze_rules;

    #[test]
    fn test_if_must_be_bool() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - if: \"${{ 42 }}\"\n        run: make\n",
        );

        let diag = diags
            .iter()
            .find(|d| d.rule == "expression" && d.message.contains("must be bool"))
            .expect("expected a must-be-bool diagnostic");
        assert_eq!(diag.pos.line, 6);
    }

    #[test]
    fn test_bool_condition_is_clean() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - if: ${{ github.ref == 'refs/heads/main' }}\n        run: make\n",
        );
        assert!(diags.iter().all(|d| d.rule != "expression"), "{diags:?}");
    }

    #[test]
    fn test_matrix_typing() {
        // `matrix.os` exists; `matrix.arch` does not.
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    strategy:\n      matrix:\n        os: [linux, mac]\n    steps:\n      - run: echo ${{ matrix.os }} ${{ matrix.arch }}\n",
        );

        let expression_diags: Vec<_> =
            diags.iter().filter(|d| d.rule == "expression").collect();
        assert_eq!(expression_diags.len(), 1, "{diags:?}");
        assert!(expression_diags[0].message.contains("\"arch\""));
    }

    #[test]
    fn test_matrix_include_extends_type() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    strategy:\n      matrix:\n        os: [linux]\n        include:\n          - os: mac\n            extra: yes\n    steps:\n      - run: echo ${{ matrix.extra }}\n",
        );
        assert!(diags.iter().all(|d| d.rule != "expression"), "{diags:?}");
    }

    #[test]
    fn test_needs_typing() {
        let diags = analyze_rules(
            "on: push\njobs:\n  build:\n    runs-on: x\n    outputs:\n      digest: ${{ steps.meta.outputs.digest }}\n    steps:\n      - id: meta\n        run: make\n  deploy:\n    runs-on: x\n    needs: build\n    steps:\n      - run: echo ${{ needs.build.outputs.digest }} ${{ needs.build.outputs.missing }}\n",
        );

        let expression_diags: Vec<_> =
            diags.iter().filter(|d| d.rule == "expression").collect();
        assert_eq!(expression_diags.len(), 1, "{diags:?}");
        assert!(expression_diags[0].message.contains("\"missing\""));
    }

    #[test]
    fn test_steps_context_grows_in_order() {
        // `steps.later` is referenced before the step with that id.
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: echo ${{ steps.later.outputs.x }}\n      - id: later\n        run: make\n",
        );
        assert!(
            diags
                .iter()
                .any(|d| d.rule == "expression" && d.message.contains("\"later\"")),
            "{diags:?}"
        );

        // Referencing an earlier step is fine.
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - id: earlier\n        run: make\n      - run: echo ${{ steps.earlier.outputs.x }}\n",
        );
        assert!(diags.iter().all(|d| d.rule != "expression"), "{diags:?}");
    }

    #[test]
    fn test_workflow_call_inputs_typing() {
        let diags = analyze_rules(
            "on:\n  workflow_call:\n    inputs:\n      count:\n        type: number\n        required: true\njobs:\n  a:\n    runs-on: x\n    timeout-minutes: ${{ inputs.count }}\n    steps:\n      - if: ${{ inputs.count }}\n        run: make\n",
        );

        // `timeout-minutes` accepts the number; `if` rejects it.
        let expression_diags: Vec<_> =
            diags.iter().filter(|d| d.rule == "expression").collect();
        assert_eq!(expression_diags.len(), 1, "{diags:?}");
        assert!(expression_diags[0].message.contains("must be bool"));
    }

    #[test]
    fn test_case_insensitive_contexts() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    strategy:\n      matrix:\n        OS: [linux]\n    steps:\n      - run: echo ${{ Matrix.os }}\n",
        );
        assert!(diags.iter().all(|d| d.rule != "expression"), "{diags:?}");
    }

    #[test]
    fn test_unterminated_template() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: \"echo ${{ github.actor\"\n",
        );
        assert!(
            diags
                .iter()
                .any(|d| d.rule == "expression"
                    && d.kind == crate::diagnostic::DiagnosticKind::Syntax
                    && d.message.contains("unterminated")),
            "{diags:?}"
        );
    }
}
