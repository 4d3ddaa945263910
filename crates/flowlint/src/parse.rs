//! The workflow parser: YAML document tree → typed workflow AST.
//!
//! The parser never aborts on the first problem: every violation
//! becomes a syntax diagnostic and parsing continues with the best
//! partial tree it can build. Unknown keys are diagnosed with the
//! permitted set; kind mismatches drop the offending node.

use indexmap::IndexMap;
use yamlgraft::{Document, Entry, NodeKind, Position, Route, ScalarValue, YamlNode};

use crate::{
    diagnostic::Diagnostic,
    models::{
        CallInput, CallInputType, CallOutput, CallSecret, Concurrency, Container, Credentials,
        Defaults, DefaultsRun, DispatchInput, DispatchInputType, Env, EnvVar, Event, Exec, Job,
        LoE, Matrix, MatrixCombination, MatrixRow, Permissions, PermissionScope, RawValue,
        RawValueKind, RunsOn, SourceString, Step, StepInput, Strategy, WebhookEvent, Workflow,
        WorkflowCall, WorkflowCallArg, WorkflowCallEvent,
    },
};

/// Webhook event names the platform defines.
const KNOWN_WEBHOOK_EVENTS: &[&str] = &[
    "branch_protection_rule",
    "check_run",
    "check_suite",
    "create",
    "delete",
    "deployment",
    "deployment_status",
    "discussion",
    "discussion_comment",
    "fork",
    "gollum",
    "issue_comment",
    "issues",
    "label",
    "merge_group",
    "milestone",
    "page_build",
    "project",
    "project_card",
    "project_column",
    "public",
    "pull_request",
    "pull_request_review",
    "pull_request_review_comment",
    "pull_request_target",
    "push",
    "registry_package",
    "release",
    "status",
    "watch",
    "workflow_run",
];

/// Parses a document into a workflow, collecting syntax diagnostics
/// along the way. Returns `None` for the workflow only when the
/// document has no usable top-level mapping.
pub fn parse_workflow(doc: &Document) -> (Option<Workflow>, Vec<Diagnostic>) {
    let mut parser = Parser { diags: vec![] };

    for load_error in doc.load_errors() {
        parser.error(load_error.pos, load_error.message.clone());
    }

    let Some(root) = doc.root() else {
        parser.error(Position::new(1, 1), "workflow file is empty");
        return (None, parser.diags);
    };

    let workflow = parser.workflow(root);
    (workflow, parser.diags)
}

struct Parser {
    diags: Vec<Diagnostic>,
}

impl Parser {
    fn error(&mut self, pos: Position, message: impl Into<String>) {
        self.diags.push(Diagnostic::syntax(pos, message));
    }

    /// Diagnoses entries whose keys aren't in the permitted set.
    fn check_keys(&mut self, entries: &[Entry], allowed: &[&str], section: &str) {
        for entry in entries {
            if !allowed.contains(&entry.key.as_str()) {
                let expected = allowed
                    .iter()
                    .map(|k| format!("\"{k}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.error(
                    entry.key_pos,
                    format!(
                        "unexpected key \"{key}\" for \"{section}\" section. expected one of {expected}",
                        key = entry.key
                    ),
                );
            }
        }
    }

    fn mapping<'a>(&mut self, node: &'a YamlNode, what: &str) -> Option<&'a [Entry]> {
        match node.as_mapping() {
            Some(entries) => Some(entries),
            None => {
                self.error(
                    node.pos,
                    format!(
                        "\"{what}\" section must be a mapping but found a {kind}",
                        kind = node.kind_name()
                    ),
                );
                None
            }
        }
    }

    fn sequence<'a>(&mut self, node: &'a YamlNode, what: &str) -> Option<&'a [YamlNode]> {
        match node.as_sequence() {
            Some(items) => Some(items),
            None => {
                self.error(
                    node.pos,
                    format!(
                        "\"{what}\" section must be a sequence but found a {kind}",
                        kind = node.kind_name()
                    ),
                );
                None
            }
        }
    }

    /// Converts a scalar node into a [`SourceString`]. Non-string
    /// scalars are stringified; non-scalar nodes are diagnosed.
    fn string(&mut self, node: &YamlNode, route: Route) -> Option<SourceString> {
        match node.as_scalar() {
            Some(scalar) => Some(SourceString {
                value: scalar.value.to_string_lossy(),
                quoted: scalar.style.is_quoted(),
                literal_block: scalar.style.is_literal_block(),
                pos: node.pos,
                route,
            }),
            None => {
                self.error(
                    node.pos,
                    format!(
                        "expected a string value but found a {kind}",
                        kind = node.kind_name()
                    ),
                );
                None
            }
        }
    }

    /// A boolean-typed field: a literal boolean, or an expression.
    fn bool_or_expr(&mut self, node: &YamlNode, route: Route) -> Option<LoE<bool>> {
        let Some(scalar) = node.as_scalar() else {
            self.error(
                node.pos,
                format!(
                    "expected a bool value but found a {kind}",
                    kind = node.kind_name()
                ),
            );
            return None;
        };
        match &scalar.value {
            ScalarValue::Bool(b) => Some(LoE::Literal(*b)),
            ScalarValue::Str(s) if s.contains("${{") => {
                Some(LoE::Expr(self.string(node, route)?))
            }
            other => {
                self.error(
                    node.pos,
                    format!(
                        "expected a bool value but found \"{}\"",
                        other.to_string_lossy()
                    ),
                );
                None
            }
        }
    }

    /// A number-typed field: a literal number, or an expression.
    fn number_or_expr(&mut self, node: &YamlNode, route: Route) -> Option<LoE<f64>> {
        let Some(scalar) = node.as_scalar() else {
            self.error(
                node.pos,
                format!(
                    "expected a number value but found a {kind}",
                    kind = node.kind_name()
                ),
            );
            return None;
        };
        match &scalar.value {
            ScalarValue::Int(i) => Some(LoE::Literal(*i as f64)),
            ScalarValue::Float(f) => Some(LoE::Literal(*f)),
            ScalarValue::Str(s) if s.contains("${{") => {
                Some(LoE::Expr(self.string(node, route)?))
            }
            other => {
                self.error(
                    node.pos,
                    format!(
                        "expected a number value but found \"{}\"",
                        other.to_string_lossy()
                    ),
                );
                None
            }
        }
    }

    /// A field accepting a single string or a sequence of strings.
    fn string_or_seq(&mut self, node: &YamlNode, route: &Route) -> Vec<SourceString> {
        match &node.kind {
            NodeKind::Sequence(items) => items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| self.string(item, route.index(idx)))
                .collect(),
            _ => self.string(node, route.clone()).into_iter().collect(),
        }
    }

    /// Recursively converts a node into a raw value.
    fn raw_value(&mut self, node: &YamlNode) -> RawValue {
        let kind = match &node.kind {
            NodeKind::Scalar(scalar) => match &scalar.value {
                ScalarValue::Null => RawValueKind::Null,
                ScalarValue::Bool(b) => RawValueKind::Bool(*b),
                ScalarValue::Int(i) => RawValueKind::Int(*i),
                ScalarValue::Float(f) => RawValueKind::Float(*f),
                ScalarValue::Str(s) => RawValueKind::Str(s.clone()),
            },
            NodeKind::Sequence(items) => {
                RawValueKind::Seq(items.iter().map(|item| self.raw_value(item)).collect())
            }
            NodeKind::Mapping(entries) => RawValueKind::Map(
                entries
                    .iter()
                    .filter_map(|entry| {
                        let value = entry.value.as_ref()?;
                        Some((entry.key.clone(), self.raw_value(value)))
                    })
                    .collect(),
            ),
        };

        RawValue {
            pos: node.pos,
            kind,
        }
    }

    fn workflow(&mut self, root: &YamlNode) -> Option<Workflow> {
        let entries = self.mapping(root, "workflow")?;
        self.check_keys(
            entries,
            &[
                "name",
                "run-name",
                "on",
                "permissions",
                "env",
                "defaults",
                "concurrency",
                "jobs",
            ],
            "workflow",
        );

        let mut workflow = Workflow {
            name: None,
            on: vec![],
            permissions: None,
            env: None,
            defaults: None,
            concurrency: None,
            jobs: IndexMap::new(),
            pos: root.pos,
        };

        let mut saw_on = false;
        let mut saw_jobs = false;

        for entry in entries {
            let route = Route::new().key(&entry.key);
            let Some(value) = entry.value.as_ref() else {
                self.error(entry.key_pos, format!("\"{}\" section is empty", entry.key));
                continue;
            };

            match entry.key.as_str() {
                "name" => workflow.name = self.string(value, route),
                // `run-name` is accepted and validated but not modeled.
                "run-name" => {
                    self.string(value, route);
                }
                "on" => {
                    saw_on = true;
                    workflow.on = self.events(value, &route);
                }
                "permissions" => workflow.permissions = self.permissions(value, route),
                "env" => workflow.env = self.env(value, route),
                "defaults" => workflow.defaults = self.defaults(value, route),
                "concurrency" => workflow.concurrency = self.concurrency(value, route),
                "jobs" => {
                    saw_jobs = true;
                    workflow.jobs = self.jobs(value, &route);
                }
                _ => {}
            }
        }

        if !saw_on {
            self.error(root.pos, "\"on\" section is missing in workflow");
        }
        if !saw_jobs {
            self.error(root.pos, "\"jobs\" section is missing in workflow");
        }

        Some(workflow)
    }

    fn events(&mut self, node: &YamlNode, route: &Route) -> Vec<Event> {
        match &node.kind {
            // `on: push`
            NodeKind::Scalar(_) => self
                .string(node, route.clone())
                .and_then(|name| self.bare_event(name))
                .into_iter()
                .collect(),
            // `on: [push, pull_request]`
            NodeKind::Sequence(items) => items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| {
                    let name = self.string(item, route.index(idx))?;
                    self.bare_event(name)
                })
                .collect(),
            // `on: {push: {...}, schedule: [...]}`
            NodeKind::Mapping(entries) => {
                let mut events = vec![];
                for entry in entries {
                    let event_route = route.key(&entry.key);
                    if let Some(event) =
                        self.event(&entry.key, entry.key_pos, entry.value.as_ref(), &event_route)
                    {
                        events.push(event);
                    }
                }
                events
            }
        }
    }

    fn bare_event(&mut self, name: SourceString) -> Option<Event> {
        match name.value.as_str() {
            "workflow_dispatch" => Some(Event::WorkflowDispatch {
                inputs: IndexMap::new(),
                pos: name.pos,
            }),
            "repository_dispatch" => Some(Event::RepositoryDispatch {
                types: vec![],
                pos: name.pos,
            }),
            "workflow_call" => Some(Event::WorkflowCall(WorkflowCallEvent {
                inputs: IndexMap::new(),
                secrets: IndexMap::new(),
                outputs: IndexMap::new(),
                pos: name.pos,
            })),
            "schedule" => {
                self.error(name.pos, "\"schedule\" event must have at least one cron");
                None
            }
            event => {
                if !KNOWN_WEBHOOK_EVENTS.contains(&event) {
                    self.error(
                        name.pos,
                        format!("unknown webhook event \"{event}\""),
                    );
                    return None;
                }
                Some(Event::Webhook(WebhookEvent {
                    pos: name.pos,
                    name,
                    types: vec![],
                    branches: vec![],
                    branches_ignore: vec![],
                    tags: vec![],
                    tags_ignore: vec![],
                    paths: vec![],
                    paths_ignore: vec![],
                }))
            }
        }
    }

    fn event(
        &mut self,
        name: &str,
        name_pos: Position,
        body: Option<&YamlNode>,
        route: &Route,
    ) -> Option<Event> {
        match name {
            "schedule" => {
                let body = body?;
                let items = self.sequence(body, "schedule")?;
                if items.is_empty() {
                    self.error(body.pos, "\"schedule\" event must have at least one cron");
                }
                let crons = items
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, item)| {
                        let entries = self.mapping(item, "schedule element")?;
                        self.check_keys(entries, &["cron"], "schedule element");
                        let cron = entries.iter().find(|e| e.key == "cron")?;
                        self.string(cron.value.as_ref()?, route.index(idx).key("cron"))
                    })
                    .collect();
                Some(Event::Schedule {
                    crons,
                    pos: name_pos,
                })
            }
            "workflow_dispatch" => {
                let mut inputs = IndexMap::new();
                if let Some(body) = body
                    && let Some(entries) = self.mapping(body, "workflow_dispatch")
                {
                    self.check_keys(entries, &["inputs"], "workflow_dispatch");
                    if let Some(inputs_entry) = entries.iter().find(|e| e.key == "inputs")
                        && let Some(inputs_node) = inputs_entry.value.as_ref()
                        && let Some(input_entries) = self.mapping(inputs_node, "inputs")
                    {
                        for input in input_entries {
                            if let Some(parsed) = self.dispatch_input(
                                input,
                                &route.key("inputs").key(&input.key),
                            ) {
                                inputs.insert(input.key.clone(), parsed);
                            }
                        }
                    }
                }
                Some(Event::WorkflowDispatch {
                    inputs,
                    pos: name_pos,
                })
            }
            "repository_dispatch" => {
                let mut types = vec![];
                if let Some(body) = body
                    && let Some(entries) = self.mapping(body, "repository_dispatch")
                {
                    self.check_keys(entries, &["types"], "repository_dispatch");
                    if let Some(types_entry) = entries.iter().find(|e| e.key == "types")
                        && let Some(types_node) = types_entry.value.as_ref()
                    {
                        types = self.string_or_seq(types_node, &route.key("types"));
                    }
                }
                Some(Event::RepositoryDispatch {
                    types,
                    pos: name_pos,
                })
            }
            "workflow_call" => Some(Event::WorkflowCall(
                self.workflow_call_event(name_pos, body, route),
            )),
            event => {
                if !KNOWN_WEBHOOK_EVENTS.contains(&event) {
                    self.error(name_pos, format!("unknown webhook event \"{event}\""));
                    return None;
                }
                Some(self.webhook_event(event, name_pos, body, route))
            }
        }
    }

    fn webhook_event(
        &mut self,
        name: &str,
        name_pos: Position,
        body: Option<&YamlNode>,
        route: &Route,
    ) -> Event {
        let mut webhook = WebhookEvent {
            name: SourceString {
                value: name.to_string(),
                quoted: false,
                literal_block: false,
                pos: name_pos,
                route: route.clone(),
            },
            types: vec![],
            branches: vec![],
            branches_ignore: vec![],
            tags: vec![],
            tags_ignore: vec![],
            paths: vec![],
            paths_ignore: vec![],
            pos: name_pos,
        };

        if let Some(body) = body
            && let Some(entries) = self.mapping(body, name)
        {
            self.check_keys(
                entries,
                &[
                    "types",
                    "branches",
                    "branches-ignore",
                    "tags",
                    "tags-ignore",
                    "paths",
                    "paths-ignore",
                    "workflows",
                ],
                name,
            );

            for entry in entries {
                let Some(value) = entry.value.as_ref() else {
                    continue;
                };
                let filter_route = route.key(&entry.key);
                let strings = self.string_or_seq(value, &filter_route);
                match entry.key.as_str() {
                    "types" => webhook.types = strings,
                    "branches" => webhook.branches = strings,
                    "branches-ignore" => webhook.branches_ignore = strings,
                    "tags" => webhook.tags = strings,
                    "tags-ignore" => webhook.tags_ignore = strings,
                    "paths" => webhook.paths = strings,
                    "paths-ignore" => webhook.paths_ignore = strings,
                    _ => {}
                }
            }
        }

        Event::Webhook(webhook)
    }

    fn dispatch_input(&mut self, entry: &Entry, route: &Route) -> Option<DispatchInput> {
        let body = entry.value.as_ref()?;
        let entries = self.mapping(body, "workflow_dispatch input")?;
        self.check_keys(
            entries,
            &["description", "required", "default", "type", "options"],
            "workflow_dispatch input",
        );

        let mut input = DispatchInput {
            description: None,
            required: None,
            default: None,
            ty: DispatchInputType::String,
            options: vec![],
            pos: entry.key_pos,
        };

        for field in entries {
            let Some(value) = field.value.as_ref() else {
                continue;
            };
            let field_route = route.key(&field.key);
            match field.key.as_str() {
                "description" => input.description = self.string(value, field_route),
                "required" => input.required = self.bool_or_expr(value, field_route),
                "default" => input.default = self.string(value, field_route),
                "type" => {
                    if let Some(ty) = self.string(value, field_route) {
                        input.ty = match ty.value.as_str() {
                            "string" => DispatchInputType::String,
                            "number" => DispatchInputType::Number,
                            "boolean" => DispatchInputType::Boolean,
                            "choice" => DispatchInputType::Choice,
                            "environment" => DispatchInputType::Environment,
                            other => {
                                self.error(
                                    ty.pos,
                                    format!(
                                        "invalid input type \"{other}\". expected one of \"string\", \"number\", \"boolean\", \"choice\", \"environment\""
                                    ),
                                );
                                DispatchInputType::String
                            }
                        };
                    }
                }
                "options" => input.options = self.string_or_seq(value, &field_route),
                _ => {}
            }
        }

        Some(input)
    }

    fn workflow_call_event(
        &mut self,
        pos: Position,
        body: Option<&YamlNode>,
        route: &Route,
    ) -> WorkflowCallEvent {
        let mut event = WorkflowCallEvent {
            inputs: IndexMap::new(),
            secrets: IndexMap::new(),
            outputs: IndexMap::new(),
            pos,
        };

        let Some(body) = body else {
            return event;
        };
        let Some(entries) = self.mapping(body, "workflow_call") else {
            return event;
        };
        self.check_keys(entries, &["inputs", "secrets", "outputs"], "workflow_call");

        for entry in entries {
            let Some(value) = entry.value.as_ref() else {
                continue;
            };
            let section_route = route.key(&entry.key);
            let Some(section) = self.mapping(value, &entry.key) else {
                continue;
            };

            match entry.key.as_str() {
                "inputs" => {
                    for input in section {
                        if let Some(parsed) =
                            self.call_input(input, &section_route.key(&input.key))
                        {
                            event.inputs.insert(input.key.clone(), parsed);
                        }
                    }
                }
                "secrets" => {
                    for secret in section {
                        let parsed = self.call_secret(secret, &section_route.key(&secret.key));
                        event.secrets.insert(secret.key.clone(), parsed);
                    }
                }
                "outputs" => {
                    for output in section {
                        let parsed = self.call_output(output, &section_route.key(&output.key));
                        event.outputs.insert(output.key.clone(), parsed);
                    }
                }
                _ => {}
            }
        }

        event
    }

    fn call_input(&mut self, entry: &Entry, route: &Route) -> Option<CallInput> {
        let body = entry.value.as_ref()?;
        let entries = self.mapping(body, "workflow_call input")?;
        self.check_keys(
            entries,
            &["description", "required", "default", "type"],
            "workflow_call input",
        );

        let mut input = CallInput {
            description: None,
            required: None,
            default: None,
            ty: CallInputType::String,
            pos: entry.key_pos,
        };
        let mut saw_type = false;

        for field in entries {
            let Some(value) = field.value.as_ref() else {
                continue;
            };
            let field_route = route.key(&field.key);
            match field.key.as_str() {
                "description" => input.description = self.string(value, field_route),
                "required" => input.required = self.bool_or_expr(value, field_route),
                "default" => input.default = self.string(value, field_route),
                "type" => {
                    saw_type = true;
                    if let Some(ty) = self.string(value, field_route) {
                        input.ty = match ty.value.as_str() {
                            "boolean" => CallInputType::Boolean,
                            "number" => CallInputType::Number,
                            "string" => CallInputType::String,
                            other => {
                                self.error(
                                    ty.pos,
                                    format!(
                                        "invalid workflow_call input type \"{other}\". expected one of \"boolean\", \"number\", \"string\""
                                    ),
                                );
                                CallInputType::String
                            }
                        };
                    }
                }
                _ => {}
            }
        }

        if !saw_type {
            self.error(
                entry.key_pos,
                format!(
                    "workflow_call input \"{name}\" must declare a \"type\"",
                    name = entry.key
                ),
            );
        }

        Some(input)
    }

    fn call_secret(&mut self, entry: &Entry, route: &Route) -> CallSecret {
        let mut secret = CallSecret {
            description: None,
            required: None,
            pos: entry.key_pos,
        };

        if let Some(body) = entry.value.as_ref()
            && let Some(entries) = self.mapping(body, "workflow_call secret")
        {
            self.check_keys(entries, &["description", "required"], "workflow_call secret");
            for field in entries {
                let Some(value) = field.value.as_ref() else {
                    continue;
                };
                let field_route = route.key(&field.key);
                match field.key.as_str() {
                    "description" => secret.description = self.string(value, field_route),
                    "required" => secret.required = self.bool_or_expr(value, field_route),
                    _ => {}
                }
            }
        }

        secret
    }

    fn call_output(&mut self, entry: &Entry, route: &Route) -> CallOutput {
        let mut output = CallOutput {
            description: None,
            value: None,
            pos: entry.key_pos,
        };

        if let Some(body) = entry.value.as_ref()
            && let Some(entries) = self.mapping(body, "workflow_call output")
        {
            self.check_keys(entries, &["description", "value"], "workflow_call output");
            for field in entries {
                let Some(value) = field.value.as_ref() else {
                    continue;
                };
                let field_route = route.key(&field.key);
                match field.key.as_str() {
                    "description" => output.description = self.string(value, field_route),
                    "value" => output.value = self.string(value, field_route),
                    _ => {}
                }
            }
        }

        output
    }

    fn permissions(&mut self, node: &YamlNode, route: Route) -> Option<Permissions> {
        match &node.kind {
            NodeKind::Scalar(_) => {
                let all = self.string(node, route)?;
                if !matches!(all.value.as_str(), "read-all" | "write-all") {
                    self.error(
                        all.pos,
                        format!(
                            "permission must be one of \"read-all\", \"write-all\" but got \"{}\"",
                            all.value
                        ),
                    );
                }
                Some(Permissions {
                    pos: all.pos,
                    all: Some(all),
                    scopes: IndexMap::new(),
                })
            }
            NodeKind::Mapping(entries) => {
                let mut scopes = IndexMap::new();
                for entry in entries {
                    let Some(value) = entry.value.as_ref() else {
                        continue;
                    };
                    if let Some(value) = self.string(value, route.key(&entry.key)) {
                        scopes.insert(
                            entry.key.clone(),
                            PermissionScope {
                                name_pos: entry.key_pos,
                                value,
                            },
                        );
                    }
                }
                Some(Permissions {
                    all: None,
                    scopes,
                    pos: node.pos,
                })
            }
            NodeKind::Sequence(_) => {
                self.error(
                    node.pos,
                    "\"permissions\" section must be a mapping or scalar but found a sequence",
                );
                None
            }
        }
    }

    fn env(&mut self, node: &YamlNode, route: Route) -> Option<Env> {
        match &node.kind {
            // The whole env block may be an expression.
            NodeKind::Scalar(_) => {
                let expr = self.string(node, route)?;
                if !expr.contains_expression() {
                    self.error(
                        expr.pos,
                        "\"env\" section must be a mapping or an expression",
                    );
                    return None;
                }
                Some(Env {
                    vars: IndexMap::new(),
                    pos: expr.pos,
                    expression: Some(expr),
                })
            }
            NodeKind::Mapping(entries) => {
                let mut vars = IndexMap::new();
                for entry in entries {
                    let Some(value) = entry.value.as_ref() else {
                        continue;
                    };
                    if let Some(value) = self.string(value, route.key(&entry.key)) {
                        vars.insert(
                            entry.key.clone(),
                            EnvVar {
                                name_pos: entry.key_pos,
                                value,
                            },
                        );
                    }
                }
                Some(Env {
                    vars,
                    expression: None,
                    pos: node.pos,
                })
            }
            NodeKind::Sequence(_) => {
                self.error(
                    node.pos,
                    "\"env\" section must be a mapping but found a sequence",
                );
                None
            }
        }
    }

    fn defaults(&mut self, node: &YamlNode, route: Route) -> Option<Defaults> {
        let entries = self.mapping(node, "defaults")?;
        self.check_keys(entries, &["run"], "defaults");

        let mut defaults = Defaults {
            run: None,
            pos: node.pos,
        };

        if let Some(run_entry) = entries.iter().find(|e| e.key == "run")
            && let Some(run_node) = run_entry.value.as_ref()
            && let Some(run_entries) = self.mapping(run_node, "defaults.run")
        {
            self.check_keys(run_entries, &["shell", "working-directory"], "defaults.run");
            let mut run = DefaultsRun {
                shell: None,
                working_directory: None,
            };
            for field in run_entries {
                let Some(value) = field.value.as_ref() else {
                    continue;
                };
                let field_route = route.key("run").key(&field.key);
                match field.key.as_str() {
                    "shell" => run.shell = self.string(value, field_route),
                    "working-directory" => run.working_directory = self.string(value, field_route),
                    _ => {}
                }
            }
            defaults.run = Some(run);
        }

        Some(defaults)
    }

    fn concurrency(&mut self, node: &YamlNode, route: Route) -> Option<Concurrency> {
        match &node.kind {
            NodeKind::Scalar(_) => {
                let group = self.string(node, route)?;
                Some(Concurrency {
                    pos: group.pos,
                    group: Some(group),
                    cancel_in_progress: None,
                })
            }
            _ => {
                let entries = self.mapping(node, "concurrency")?;
                self.check_keys(entries, &["group", "cancel-in-progress"], "concurrency");
                let mut concurrency = Concurrency {
                    group: None,
                    cancel_in_progress: None,
                    pos: node.pos,
                };
                for entry in entries {
                    let Some(value) = entry.value.as_ref() else {
                        continue;
                    };
                    let field_route = route.key(&entry.key);
                    match entry.key.as_str() {
                        "group" => concurrency.group = self.string(value, field_route),
                        "cancel-in-progress" => {
                            concurrency.cancel_in_progress = self.bool_or_expr(value, field_route)
                        }
                        _ => {}
                    }
                }
                Some(concurrency)
            }
        }
    }

    fn jobs(&mut self, node: &YamlNode, route: &Route) -> IndexMap<String, Job> {
        let Some(entries) = self.mapping(node, "jobs") else {
            return IndexMap::new();
        };

        if entries.is_empty() {
            self.error(node.pos, "\"jobs\" section must not be empty");
        }

        let mut jobs = IndexMap::new();
        for entry in entries {
            if let Some(job) = self.job(entry, &route.key(&entry.key)) {
                jobs.insert(entry.key.clone(), job);
            }
        }
        jobs
    }

    fn job(&mut self, entry: &Entry, route: &Route) -> Option<Job> {
        let Some(body) = entry.value.as_ref() else {
            self.error(
                entry.key_pos,
                format!("job \"{id}\" is empty", id = entry.key),
            );
            return None;
        };
        let entries = self.mapping(body, "job")?;
        self.check_keys(
            entries,
            &[
                "name",
                "needs",
                "runs-on",
                "permissions",
                "environment",
                "concurrency",
                "outputs",
                "env",
                "defaults",
                "if",
                "steps",
                "timeout-minutes",
                "strategy",
                "continue-on-error",
                "container",
                "services",
                "uses",
                "with",
                "secrets",
            ],
            "job",
        );

        let mut job = Job {
            id: entry.key.clone(),
            id_pos: entry.key_pos,
            name: None,
            cond: None,
            needs: vec![],
            runs_on: None,
            permissions: None,
            env: None,
            strategy: None,
            container: None,
            services: IndexMap::new(),
            steps: vec![],
            outputs: IndexMap::new(),
            workflow_call: None,
            timeout_minutes: None,
            defaults: None,
            concurrency: None,
            pos: entry.key_pos,
            route: route.clone(),
        };

        let mut call_uses = None;
        let mut call_with = IndexMap::new();
        let mut call_secrets = IndexMap::new();
        let mut call_inherit = false;

        for field in entries {
            let Some(value) = field.value.as_ref() else {
                continue;
            };
            let field_route = route.key(&field.key);
            match field.key.as_str() {
                "name" => job.name = self.string(value, field_route),
                "if" => job.cond = self.string(value, field_route),
                "needs" => job.needs = self.string_or_seq(value, &field_route),
                "runs-on" => job.runs_on = self.runs_on(value, field_route),
                "permissions" => job.permissions = self.permissions(value, field_route),
                "environment" => {
                    // Accepted (scalar or {name, url} mapping) but not modeled.
                    match &value.kind {
                        NodeKind::Scalar(_) => {
                            self.string(value, field_route);
                        }
                        NodeKind::Mapping(env_entries) => {
                            self.check_keys(env_entries, &["name", "url"], "environment");
                        }
                        NodeKind::Sequence(_) => {
                            self.error(
                                value.pos,
                                "\"environment\" must be a string or a mapping",
                            );
                        }
                    }
                }
                "concurrency" => job.concurrency = self.concurrency(value, field_route),
                "outputs" => {
                    if let Some(output_entries) = self.mapping(value, "outputs") {
                        for output in output_entries {
                            let Some(output_value) = output.value.as_ref() else {
                                continue;
                            };
                            if let Some(parsed) =
                                self.string(output_value, field_route.key(&output.key))
                            {
                                job.outputs.insert(output.key.clone(), parsed);
                            }
                        }
                    }
                }
                "env" => job.env = self.env(value, field_route),
                "defaults" => job.defaults = self.defaults(value, field_route),
                "steps" => {
                    if let Some(items) = self.sequence(value, "steps") {
                        if items.is_empty() {
                            self.error(value.pos, "\"steps\" section must not be empty");
                        }
                        job.steps = items
                            .iter()
                            .enumerate()
                            .filter_map(|(idx, item)| {
                                self.step(idx, item, field_route.index(idx))
                            })
                            .collect();
                    }
                }
                "timeout-minutes" => job.timeout_minutes = self.number_or_expr(value, field_route),
                "strategy" => job.strategy = self.strategy(value, field_route),
                "continue-on-error" => {
                    self.bool_or_expr(value, field_route);
                }
                "container" => job.container = self.container(value, field_route),
                "services" => {
                    if let Some(service_entries) = self.mapping(value, "services") {
                        for service in service_entries {
                            let Some(service_value) = service.value.as_ref() else {
                                continue;
                            };
                            if let Some(container) =
                                self.container(service_value, field_route.key(&service.key))
                            {
                                job.services.insert(service.key.clone(), container);
                            }
                        }
                    }
                }
                "uses" => call_uses = self.string(value, field_route),
                "with" => {
                    if let Some(with_entries) = self.mapping(value, "with") {
                        for with in with_entries {
                            let Some(with_value) = with.value.as_ref() else {
                                continue;
                            };
                            if let Some(parsed) =
                                self.string(with_value, field_route.key(&with.key))
                            {
                                call_with.insert(
                                    with.key.clone(),
                                    WorkflowCallArg {
                                        name_pos: with.key_pos,
                                        value: parsed,
                                    },
                                );
                            }
                        }
                    }
                }
                "secrets" => match &value.kind {
                    NodeKind::Scalar(scalar)
                        if matches!(&scalar.value, ScalarValue::Str(s) if s == "inherit") =>
                    {
                        call_inherit = true;
                    }
                    _ => {
                        if let Some(secret_entries) = self.mapping(value, "secrets") {
                            for secret in secret_entries {
                                let Some(secret_value) = secret.value.as_ref() else {
                                    continue;
                                };
                                if let Some(parsed) =
                                    self.string(secret_value, field_route.key(&secret.key))
                                {
                                    call_secrets.insert(
                                        secret.key.clone(),
                                        WorkflowCallArg {
                                            name_pos: secret.key_pos,
                                            value: parsed,
                                        },
                                    );
                                }
                            }
                        }
                    }
                },
                _ => {}
            }
        }

        match call_uses {
            Some(uses) => {
                if !job.steps.is_empty() {
                    self.error(
                        uses.pos,
                        format!(
                            "job \"{id}\" calls a reusable workflow and must not have \"steps\"",
                            id = job.id
                        ),
                    );
                }
                job.workflow_call = Some(WorkflowCall {
                    pos: uses.pos,
                    uses,
                    inputs: call_with,
                    secrets: call_secrets,
                    inherit_secrets: call_inherit,
                });
            }
            None => {
                if !call_with.is_empty() || !call_secrets.is_empty() || call_inherit {
                    self.error(
                        job.pos,
                        format!(
                            "job \"{id}\" has \"with\" or \"secrets\" but no reusable workflow \"uses\"",
                            id = job.id
                        ),
                    );
                }
                if job.runs_on.is_none() {
                    self.error(
                        job.pos,
                        format!("\"runs-on\" section is missing in job \"{id}\"", id = job.id),
                    );
                }
            }
        }

        Some(job)
    }

    fn runs_on(&mut self, node: &YamlNode, route: Route) -> Option<RunsOn> {
        match &node.kind {
            NodeKind::Scalar(_) => {
                let label = self.string(node, route)?;
                if label.contains_expression() {
                    Some(RunsOn::Expr(label))
                } else {
                    Some(RunsOn::Labels(vec![label]))
                }
            }
            NodeKind::Sequence(_) => Some(RunsOn::Labels(self.string_or_seq(node, &route))),
            NodeKind::Mapping(entries) => {
                self.check_keys(entries, &["group", "labels"], "runs-on");
                let mut group = None;
                let mut labels = vec![];
                for entry in entries {
                    let Some(value) = entry.value.as_ref() else {
                        continue;
                    };
                    let field_route = route.key(&entry.key);
                    match entry.key.as_str() {
                        "group" => group = self.string(value, field_route),
                        "labels" => labels = self.string_or_seq(value, &field_route),
                        _ => {}
                    }
                }
                Some(RunsOn::Group {
                    group,
                    labels,
                    pos: node.pos,
                })
            }
        }
    }

    fn strategy(&mut self, node: &YamlNode, route: Route) -> Option<Strategy> {
        let entries = self.mapping(node, "strategy")?;
        self.check_keys(entries, &["matrix", "fail-fast", "max-parallel"], "strategy");

        let mut strategy = Strategy {
            matrix: None,
            fail_fast: None,
            max_parallel: None,
            pos: node.pos,
        };

        for entry in entries {
            let Some(value) = entry.value.as_ref() else {
                continue;
            };
            let field_route = route.key(&entry.key);
            match entry.key.as_str() {
                "matrix" => strategy.matrix = self.matrix(value, field_route),
                "fail-fast" => strategy.fail_fast = self.bool_or_expr(value, field_route),
                "max-parallel" => strategy.max_parallel = self.number_or_expr(value, field_route),
                _ => {}
            }
        }

        Some(strategy)
    }

    fn matrix(&mut self, node: &YamlNode, route: Route) -> Option<Matrix> {
        // The whole matrix may be a single expression.
        if let NodeKind::Scalar(_) = &node.kind {
            let expr = self.string(node, route)?;
            if !expr.contains_expression() {
                self.error(expr.pos, "\"matrix\" section must be a mapping or an expression");
                return None;
            }
            return Some(Matrix {
                rows: IndexMap::new(),
                include: None,
                exclude: None,
                pos: expr.pos,
                expression: Some(expr),
            });
        }

        let entries = self.mapping(node, "matrix")?;
        let mut matrix = Matrix {
            rows: IndexMap::new(),
            include: None,
            exclude: None,
            expression: None,
            pos: node.pos,
        };

        for entry in entries {
            let Some(value) = entry.value.as_ref() else {
                continue;
            };
            let row_route = route.key(&entry.key);
            match entry.key.as_str() {
                "include" | "exclude" => {
                    let combos = self.matrix_combinations(value, &row_route);
                    if entry.key == "include" {
                        matrix.include = combos;
                    } else {
                        matrix.exclude = combos;
                    }
                }
                _ => {
                    let values = match &value.kind {
                        NodeKind::Scalar(scalar) => {
                            if matches!(&scalar.value, ScalarValue::Str(s) if s.contains("${{")) {
                                self.string(value, row_route.clone()).map(LoE::Expr)
                            } else {
                                self.error(
                                    value.pos,
                                    format!(
                                        "matrix row \"{name}\" must be a sequence or an expression",
                                        name = entry.key
                                    ),
                                );
                                None
                            }
                        }
                        NodeKind::Sequence(items) => {
                            if items.is_empty() {
                                self.error(
                                    value.pos,
                                    format!(
                                        "matrix row \"{name}\" must not be empty",
                                        name = entry.key
                                    ),
                                );
                            }
                            Some(LoE::Literal(
                                items.iter().map(|item| self.raw_value(item)).collect(),
                            ))
                        }
                        NodeKind::Mapping(_) => {
                            self.error(
                                value.pos,
                                format!(
                                    "matrix row \"{name}\" must be a sequence or an expression",
                                    name = entry.key
                                ),
                            );
                            None
                        }
                    };

                    if let Some(values) = values {
                        matrix.rows.insert(
                            entry.key.clone(),
                            MatrixRow {
                                name_pos: entry.key_pos,
                                values,
                            },
                        );
                    }
                }
            }
        }

        Some(matrix)
    }

    fn matrix_combinations(
        &mut self,
        node: &YamlNode,
        route: &Route,
    ) -> Option<LoE<Vec<MatrixCombination>>> {
        match &node.kind {
            NodeKind::Scalar(_) => {
                let expr = self.string(node, route.clone())?;
                if !expr.contains_expression() {
                    self.error(
                        expr.pos,
                        "matrix combinations must be a sequence or an expression",
                    );
                    return None;
                }
                Some(LoE::Expr(expr))
            }
            NodeKind::Sequence(items) => {
                let combos = items
                    .iter()
                    .filter_map(|item| {
                        let entries = self.mapping(item, "matrix combination")?;
                        let assigns = entries
                            .iter()
                            .filter_map(|entry| {
                                let value = entry.value.as_ref()?;
                                Some((entry.key.clone(), self.raw_value(value)))
                            })
                            .collect();
                        Some(MatrixCombination {
                            assigns,
                            pos: item.pos,
                        })
                    })
                    .collect();
                Some(LoE::Literal(combos))
            }
            NodeKind::Mapping(_) => {
                self.error(
                    node.pos,
                    "matrix combinations must be a sequence or an expression",
                );
                None
            }
        }
    }

    fn container(&mut self, node: &YamlNode, route: Route) -> Option<Container> {
        // `container: node:20` shorthand.
        if let NodeKind::Scalar(_) = &node.kind {
            let image = self.string(node, route.clone())?;
            return Some(Container {
                pos: image.pos,
                image: Some(image),
                credentials: None,
                env: None,
                ports: vec![],
                volumes: vec![],
                options: None,
                route,
            });
        }

        let entries = self.mapping(node, "container")?;
        self.check_keys(
            entries,
            &["image", "credentials", "env", "ports", "volumes", "options"],
            "container",
        );

        let mut container = Container {
            image: None,
            credentials: None,
            env: None,
            ports: vec![],
            volumes: vec![],
            options: None,
            pos: node.pos,
            route: route.clone(),
        };

        for entry in entries {
            let Some(value) = entry.value.as_ref() else {
                continue;
            };
            let field_route = route.key(&entry.key);
            match entry.key.as_str() {
                "image" => container.image = self.string(value, field_route),
                "credentials" => {
                    let Some(cred_entries) = self.mapping(value, "credentials") else {
                        continue;
                    };
                    self.check_keys(cred_entries, &["username", "password"], "credentials");
                    let mut credentials = Credentials {
                        username: None,
                        password: None,
                        pos: value.pos,
                    };
                    for cred in cred_entries {
                        let Some(cred_value) = cred.value.as_ref() else {
                            continue;
                        };
                        let cred_route = field_route.key(&cred.key);
                        match cred.key.as_str() {
                            "username" => {
                                credentials.username = self.string(cred_value, cred_route)
                            }
                            "password" => {
                                credentials.password = self.string(cred_value, cred_route)
                            }
                            _ => {}
                        }
                    }
                    container.credentials = Some(credentials);
                }
                "env" => container.env = self.env(value, field_route),
                "ports" => container.ports = self.string_or_seq(value, &field_route),
                "volumes" => container.volumes = self.string_or_seq(value, &field_route),
                "options" => container.options = self.string(value, field_route),
                _ => {}
            }
        }

        Some(container)
    }

    fn step(&mut self, index: usize, node: &YamlNode, route: Route) -> Option<Step> {
        let entries = self.mapping(node, "step")?;
        self.check_keys(
            entries,
            &[
                "id",
                "if",
                "name",
                "uses",
                "run",
                "with",
                "working-directory",
                "shell",
                "env",
                "continue-on-error",
                "timeout-minutes",
            ],
            "step",
        );

        let mut step = Step {
            index,
            id: None,
            cond: None,
            name: None,
            env: None,
            timeout_minutes: None,
            continue_on_error: None,
            exec: Exec::Run {
                script: SourceString {
                    value: String::new(),
                    quoted: false,
                    literal_block: false,
                    pos: node.pos,
                    route: route.clone(),
                },
                shell: None,
                working_dir: None,
            },
            pos: node.pos,
            route: route.clone(),
        };

        let mut uses = None;
        let mut with = IndexMap::new();
        let mut entrypoint = None;
        let mut args = None;
        let mut run = None;
        let mut shell = None;
        let mut working_dir = None;

        for field in entries {
            let Some(value) = field.value.as_ref() else {
                continue;
            };
            let field_route = route.key(&field.key);
            match field.key.as_str() {
                "id" => step.id = self.string(value, field_route),
                "if" => step.cond = self.string(value, field_route),
                "name" => step.name = self.string(value, field_route),
                "env" => step.env = self.env(value, field_route),
                "continue-on-error" => {
                    step.continue_on_error = self.bool_or_expr(value, field_route)
                }
                "timeout-minutes" => step.timeout_minutes = self.number_or_expr(value, field_route),
                "uses" => uses = self.string(value, field_route),
                "run" => run = self.string(value, field_route),
                "shell" => shell = self.string(value, field_route),
                "working-directory" => working_dir = self.string(value, field_route),
                "with" => {
                    if let Some(with_entries) = self.mapping(value, "with") {
                        for input in with_entries {
                            let Some(input_value) = input.value.as_ref() else {
                                continue;
                            };
                            let Some(parsed) =
                                self.string(input_value, field_route.key(&input.key))
                            else {
                                continue;
                            };
                            match input.key.as_str() {
                                "entrypoint" => entrypoint = Some(parsed),
                                "args" => args = Some(parsed),
                                _ => {
                                    with.insert(
                                        input.key.clone(),
                                        StepInput {
                                            name_pos: input.key_pos,
                                            value: parsed,
                                        },
                                    );
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let is_action = uses.is_some() || !with.is_empty() || entrypoint.is_some() || args.is_some();

        if is_action {
            for (present, key) in [
                (run.is_some(), "run"),
                (shell.is_some(), "shell"),
                (working_dir.is_some(), "working-directory"),
            ] {
                if present {
                    self.error(
                        node.pos,
                        format!("\"{key}\" is not allowed on a step that uses an action"),
                    );
                }
            }

            let Some(uses) = uses else {
                self.error(node.pos, "\"uses\" is required on a step with \"with\"");
                return None;
            };

            step.exec = Exec::Action {
                uses,
                inputs: with,
                entrypoint,
                args,
            };
        } else {
            let Some(script) = run else {
                self.error(
                    node.pos,
                    "step must have either \"run\" or \"uses\"",
                );
                return None;
            };

            step.exec = Exec::Run {
                script,
                shell,
                working_dir,
            };
        }

        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{Event, Exec, RunsOn};

    fn parse(source: &str) -> (Option<Workflow>, Vec<Diagnostic>) {
        let doc = Document::parse(source).unwrap();
        parse_workflow(&doc)
    }

    fn parse_ok(source: &str) -> Workflow {
        let (workflow, diags) = parse(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        workflow.unwrap()
    }

    #[test]
    fn test_parse_minimal() {
        let workflow = parse_ok(
            "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: make\n",
        );

        assert_eq!(workflow.on.len(), 1);
        assert!(matches!(&workflow.on[0], Event::Webhook(w) if w.name.value == "push"));

        let job = &workflow.jobs["build"];
        assert!(matches!(&job.runs_on, Some(RunsOn::Labels(labels)) if labels.len() == 1));
        assert_eq!(job.steps.len(), 1);
        assert!(matches!(&job.steps[0].exec, Exec::Run { script, .. } if script.value == "make"));
    }

    #[test]
    fn test_unknown_key_diagnostic() {
        let (_, diags) = parse(
            "on: push\nnonsense: true\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: make\n",
        );
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unexpected key \"nonsense\""));
        assert!(diags[0].message.contains("\"jobs\""));
        assert_eq!(diags[0].pos, Position::new(2, 1));
    }

    #[test]
    fn test_event_forms() {
        let workflow = parse_ok(
            "on: [push, pull_request]\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: t\n",
        );
        assert_eq!(workflow.on.len(), 2);

        let workflow = parse_ok(
            "on:\n  push:\n    branches: [main]\n  schedule:\n    - cron: '0 0 * * *'\n  workflow_dispatch:\n    inputs:\n      level:\n        type: choice\n        options: [debug, info]\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: t\n",
        );
        assert_eq!(workflow.on.len(), 3);
        let Event::Webhook(push) = &workflow.on[0] else {
            panic!("expected a webhook event");
        };
        assert_eq!(push.branches[0].value, "main");
        assert!(matches!(&workflow.on[1], Event::Schedule { crons, .. } if crons.len() == 1));
        let Event::WorkflowDispatch { inputs, .. } = &workflow.on[2] else {
            panic!("expected workflow_dispatch");
        };
        assert_eq!(inputs["level"].ty, DispatchInputType::Choice);
    }

    #[test]
    fn test_unknown_event() {
        let (_, diags) = parse(
            "on: pull_requests\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: t\n",
        );
        assert!(
            diags
                .iter()
                .any(|d| d.message.contains("unknown webhook event \"pull_requests\""))
        );
    }

    #[test]
    fn test_workflow_call_event() {
        let workflow = parse_ok(
            "on:\n  workflow_call:\n    inputs:\n      version:\n        type: string\n        required: true\n    secrets:\n      token:\n        required: true\n    outputs:\n      digest:\n        value: ${{ jobs.build.outputs.digest }}\njobs:\n  build:\n    runs-on: x\n    steps:\n      - run: t\n",
        );

        let call = workflow.workflow_call_event().unwrap();
        assert_eq!(call.inputs["version"].ty, CallInputType::String);
        assert!(matches!(
            call.inputs["version"].required,
            Some(LoE::Literal(true))
        ));
        assert!(call.secrets.contains_key("token"));
        assert!(call.outputs.contains_key("digest"));
    }

    #[test]
    fn test_workflow_call_input_requires_type() {
        let (_, diags) = parse(
            "on:\n  workflow_call:\n    inputs:\n      version:\n        required: true\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: t\n",
        );
        assert!(
            diags
                .iter()
                .any(|d| d.message.contains("must declare a \"type\""))
        );
    }

    #[test]
    fn test_step_exclusivity() {
        let (_, diags) = parse(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - uses: actions/checkout@v4\n        run: make\n",
        );
        assert!(
            diags
                .iter()
                .any(|d| d.message.contains("\"run\" is not allowed"))
        );

        let (_, diags) = parse(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - with:\n          foo: bar\n",
        );
        assert!(
            diags
                .iter()
                .any(|d| d.message.contains("\"uses\" is required"))
        );

        let (_, diags) = parse(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - name: empty\n",
        );
        assert!(
            diags
                .iter()
                .any(|d| d.message.contains("either \"run\" or \"uses\""))
        );
    }

    #[test]
    fn test_runs_on_forms() {
        let workflow = parse_ok(
            "on: push\njobs:\n  a:\n    runs-on: ${{ matrix.os }}\n    strategy:\n      matrix:\n        os: [ubuntu-latest]\n    steps:\n      - run: t\n",
        );
        assert!(matches!(
            workflow.jobs["a"].runs_on,
            Some(RunsOn::Expr(_))
        ));

        let workflow = parse_ok(
            "on: push\njobs:\n  a:\n    runs-on:\n      group: big-runners\n      labels: [xl]\n    steps:\n      - run: t\n",
        );
        let Some(RunsOn::Group { group, labels, .. }) = &workflow.jobs["a"].runs_on else {
            panic!("expected group form");
        };
        assert_eq!(group.as_ref().unwrap().value, "big-runners");
        assert_eq!(labels[0].value, "xl");
    }

    #[test]
    fn test_matrix() {
        let workflow = parse_ok(
            "on: push\njobs:\n  a:\n    runs-on: x\n    strategy:\n      matrix:\n        os: [linux, mac]\n        version: [1, 2]\n        include:\n          - os: linux\n            extra: true\n        exclude:\n          - os: mac\n            version: 1\n    steps:\n      - run: t\n",
        );

        let matrix = workflow.jobs["a"].strategy.as_ref().unwrap().matrix.as_ref().unwrap();
        assert_eq!(matrix.rows.len(), 2);
        let include = matrix.include.as_ref().unwrap().as_literal().unwrap();
        assert_eq!(include.len(), 1);
        assert!(include[0].assigns.contains_key("extra"));
    }

    #[test]
    fn test_matrix_row_expression() {
        let workflow = parse_ok(
            "on: push\njobs:\n  a:\n    runs-on: x\n    strategy:\n      matrix:\n        os: ${{ fromJSON(vars.OSES) }}\n    steps:\n      - run: t\n",
        );
        let matrix = workflow.jobs["a"].strategy.as_ref().unwrap().matrix.as_ref().unwrap();
        assert!(matches!(matrix.rows["os"].values, LoE::Expr(_)));
    }

    #[test]
    fn test_reusable_call_job() {
        let workflow = parse_ok(
            "on: push\njobs:\n  deploy:\n    uses: ./.github/workflows/deploy.yml\n    with:\n      environment: prod\n    secrets:\n      token: ${{ secrets.DEPLOY_TOKEN }}\n",
        );

        let call = workflow.jobs["deploy"].workflow_call.as_ref().unwrap();
        assert_eq!(call.uses.value, "./.github/workflows/deploy.yml");
        assert!(call.inputs.contains_key("environment"));
        assert!(call.secrets.contains_key("token"));
        assert!(!call.inherit_secrets);
    }

    #[test]
    fn test_secrets_inherit() {
        let workflow = parse_ok(
            "on: push\njobs:\n  deploy:\n    uses: ./.github/workflows/deploy.yml\n    secrets: inherit\n",
        );
        assert!(workflow.jobs["deploy"].workflow_call.as_ref().unwrap().inherit_secrets);
    }

    #[test]
    fn test_missing_runs_on() {
        let (_, diags) = parse("on: push\njobs:\n  a:\n    steps:\n      - run: t\n");
        assert!(
            diags
                .iter()
                .any(|d| d.message.contains("\"runs-on\" section is missing"))
        );
    }

    #[test]
    fn test_empty_jobs() {
        let (workflow, diags) = parse("on: push\njobs: {}\n");
        assert!(workflow.is_some());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("\"jobs\" section must not be empty"));
    }

    #[test]
    fn test_timeout_and_container() {
        let workflow = parse_ok(
            "on: push\njobs:\n  a:\n    runs-on: x\n    timeout-minutes: 10\n    container:\n      image: node:20\n      credentials:\n        username: admin\n        password: hunter2\n    steps:\n      - run: t\n        timeout-minutes: ${{ inputs.timeout }}\n",
        );

        let job = &workflow.jobs["a"];
        assert!(matches!(job.timeout_minutes, Some(LoE::Literal(t)) if t == 10.0));
        let container = job.container.as_ref().unwrap();
        assert_eq!(container.image.as_ref().unwrap().value, "node:20");
        assert_eq!(
            container.credentials.as_ref().unwrap().password.as_ref().unwrap().value,
            "hunter2"
        );
        assert!(matches!(job.steps[0].timeout_minutes, Some(LoE::Expr(_))));
    }

    #[test]
    fn test_env_expression_form() {
        let workflow = parse_ok(
            "on: push\njobs:\n  a:\n    runs-on: x\n    env: ${{ fromJSON(vars.ENV) }}\n    steps:\n      - run: t\n",
        );
        assert!(workflow.jobs["a"].env.as_ref().unwrap().expression.is_some());
    }

    #[test]
    fn test_permissions() {
        let workflow = parse_ok(
            "on: push\npermissions:\n  contents: read\n  id-token: write\njobs:\n  a:\n    runs-on: x\n    permissions: read-all\n    steps:\n      - run: t\n",
        );

        let permissions = workflow.permissions.as_ref().unwrap();
        assert_eq!(permissions.scopes["contents"].value.value, "read");
        assert!(
            workflow.jobs["a"].permissions.as_ref().unwrap().all.is_some()
        );

        let (_, diags) = parse(
            "on: push\npermissions: admin\njobs:\n  a:\n    runs-on: x\n    steps:\n      - run: t\n",
        );
        assert!(diags.iter().any(|d| d.message.contains("read-all")));
    }
}
