//! Comment- and style-preserving patch operations.
//!
//! Patches are symbolic: each one pairs a [`Route`] with an [`Op`], and
//! the route is resolved against the current document text at apply
//! time. The apply loop re-parses after every operation, so a sequence
//! of patches stays valid as long as the routes themselves keep
//! resolving, regardless of how earlier patches shifted byte offsets.
//!
//! All edits are textual splices against the original source, which is
//! what preserves comments, entry ordering, and the quoting/block style
//! of everything a patch doesn't touch.

use indexmap::IndexMap;

use crate::{Component, Document, Entry, Error, NodeKind, Route, YamlNode};

/// Controls where [`Op::AddEntry`] places the new entry within the
/// target mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// Before the mapping's first entry.
    Start,
    /// After the mapping's last entry.
    End,
    /// Immediately after the named entry.
    AfterKey(String),
    /// Immediately before whichever of the named entries appears
    /// first in the source; falls back to [`Anchor::End`] when none
    /// are present.
    BeforeAny(Vec<String>),
}

/// A single patch operation.
#[derive(Clone, Debug)]
pub enum Op {
    /// Replace the value at the route.
    ///
    /// Multi-line string replacements against a block scalar are
    /// re-emitted as a literal block; everything else is serialized in
    /// flow layout.
    Replace(serde_yaml::Value),
    /// Insert a new `key: value` entry into the mapping at the route.
    ///
    /// Fails if the key already exists, which keeps repeated
    /// applications of the same patch from corrupting the document.
    AddEntry {
        /// The new entry's key.
        key: String,
        /// The new entry's value.
        value: serde_yaml::Value,
        /// Where to place the entry.
        anchor: Anchor,
    },
    /// Remove the entry addressed by the route (whose final component
    /// must be a key), including its line(s).
    RemoveEntry,
    /// Replace the first occurrence of `from` within the value at the
    /// route with `to`, leaving the rest of the value untouched.
    RewriteFragment {
        /// The fragment to find.
        from: String,
        /// Its replacement.
        to: String,
    },
    /// Upsert entries into the mapping under `key` at the route,
    /// creating the mapping if it does not exist.
    MergeInto {
        /// The mapping entry to merge into (e.g. `env`).
        key: String,
        /// Entries to add or replace within it.
        entries: IndexMap<String, serde_yaml::Value>,
    },
}

/// A patch: an operation bound to a route.
#[derive(Clone, Debug)]
pub struct Patch {
    /// The route to the node the operation targets.
    pub route: Route,
    /// The operation.
    pub op: Op,
}

/// Applies `patches` in order, returning the patched document.
///
/// Operations are applied one at a time against the re-parsed result of
/// the previous operation. The first failing operation aborts with an
/// error; operations already applied are reflected in the error-free
/// prefix only, so callers that need partial application should apply
/// patches individually.
pub fn apply_patches(document: &Document, patches: &[Patch]) -> Result<Document, Error> {
    let mut patches = patches.iter();

    let Some(first) = patches.next() else {
        return Err(Error::InvalidPatch("no patches provided".into()));
    };

    let mut current = apply_patch(document, first)?;
    for patch in patches {
        current = apply_patch(&current, patch)?;
    }

    Ok(current)
}

/// Applies a single patch, returning the patched document.
pub fn apply_patch(document: &Document, patch: &Patch) -> Result<Document, Error> {
    let patched = match &patch.op {
        Op::Replace(value) => apply_replace(document, &patch.route, value)?,
        Op::AddEntry { key, value, anchor } => {
            apply_add_entry(document, &patch.route, key, value, anchor)?
        }
        Op::RemoveEntry => apply_remove_entry(document, &patch.route)?,
        Op::RewriteFragment { from, to } => {
            apply_rewrite_fragment(document, &patch.route, from, to)?
        }
        Op::MergeInto { key, entries } => {
            return apply_merge_into(document, &patch.route, key, entries);
        }
    };

    reparse(patched)
}

fn reparse(mut patched: String) -> Result<Document, Error> {
    if !patched.ends_with('\n') {
        patched.push('\n');
    }

    let document = Document::parse(patched)?;
    if !document.load_errors().is_empty() {
        return Err(Error::InvalidPatch(
            "patch produced structurally invalid YAML".into(),
        ));
    }

    Ok(document)
}

fn resolve<'doc>(document: &'doc Document, route: &Route) -> Result<&'doc YamlNode, Error> {
    document
        .resolve(route)
        .ok_or_else(|| Error::InvalidPatch(format!("no value at {route}")))
}

fn apply_replace(
    document: &Document,
    route: &Route,
    value: &serde_yaml::Value,
) -> Result<String, Error> {
    let node = resolve(document, route)?;
    let (start, end) = node.span;

    let replacement = match (node.as_scalar(), value) {
        (Some(scalar), serde_yaml::Value::String(new))
            if scalar.style.is_literal_block() || new.contains('\n') =>
        {
            // Re-emit as a literal block, indented relative to the line
            // that holds the scalar's header.
            let line = document.line_span(start);
            let line_text = &document.source()[line];
            let base_indent: String = line_text.chars().take_while(|c| *c == ' ').collect();
            let content_indent = format!("{base_indent}  ");

            let mut out = String::from("|");
            if !new.ends_with('\n') {
                out.push('-');
            }
            for content_line in new.lines() {
                out.push('\n');
                if !content_line.is_empty() {
                    out.push_str(&content_indent);
                    out.push_str(content_line);
                }
            }
            out
        }
        _ => serialize_flow(value)?,
    };

    let mut patched = document.source().to_string();
    patched.replace_range(start..end, &replacement);
    Ok(patched)
}

fn apply_rewrite_fragment(
    document: &Document,
    route: &Route,
    from: &str,
    to: &str,
) -> Result<String, Error> {
    let node = resolve(document, route)?;
    let (start, end) = node.span;
    let feature = document.extract((start, end));

    let Some(at) = feature.find(from) else {
        return Err(Error::InvalidPatch(format!(
            "no occurrence of \"{from}\" at {route}"
        )));
    };

    let mut patched = document.source().to_string();
    patched.replace_range(start + at..start + at + from.len(), to);
    Ok(patched)
}

fn apply_add_entry(
    document: &Document,
    route: &Route,
    key: &str,
    value: &serde_yaml::Value,
    anchor: &Anchor,
) -> Result<String, Error> {
    let node = resolve(document, route)?;
    let NodeKind::Mapping(entries) = &node.kind else {
        return Err(Error::InvalidPatch(format!(
            "add-entry target at {route} is a {kind}, not a mapping",
            kind = node.kind_name()
        )));
    };

    if entries.iter().any(|e| e.key == key) {
        return Err(Error::InvalidPatch(format!(
            "key \"{key}\" already exists at {route}"
        )));
    }

    if node.flow {
        return add_flow_entry(document, node, key, value, anchor);
    }

    // Entries in a block mapping share the first entry's indentation.
    let indent = " ".repeat(entries[0].key_pos.col - 1);
    let entry_text = render_block_entry(key, value, &indent)?;

    enum At<'e> {
        Offset(usize),
        Before(&'e Entry),
    }

    let insert_at = match anchor {
        Anchor::Start => At::Before(&entries[0]),
        Anchor::End => {
            let last = entries.last().expect("mapping has at least one entry");
            At::Offset(document.line_span(last.entry_span.1.saturating_sub(1)).end)
        }
        Anchor::AfterKey(after) => {
            let target = entries.iter().find(|e| e.key == *after).ok_or_else(|| {
                Error::InvalidPatch(format!("no key \"{after}\" to anchor after at {route}"))
            })?;
            At::Offset(
                document
                    .line_span(target.entry_span.1.saturating_sub(1))
                    .end,
            )
        }
        Anchor::BeforeAny(candidates) => {
            let target = entries
                .iter()
                .filter(|e| candidates.contains(&e.key))
                .min_by_key(|e| e.key_span.0);
            match target {
                Some(target) => At::Before(target),
                None => {
                    let last = entries.last().expect("mapping has at least one entry");
                    At::Offset(document.line_span(last.entry_span.1.saturating_sub(1)).end)
                }
            }
        }
    };

    let mut patched = document.source().to_string();

    match insert_at {
        At::Offset(offset) => {
            // An insertion point at the very end of a newline-less
            // final line needs its own separator first.
            if offset == patched.len() && !patched.ends_with('\n') {
                patched.push('\n');
            }
            patched.insert_str(offset.min(patched.len()), &entry_text);
        }
        At::Before(target) => {
            let line = document.line_span(target.key_span.0);
            let prefix = &document.source()[line.start..target.key_span.0];

            if prefix.trim().is_empty() {
                patched.insert_str(line.start, &entry_text);
            } else {
                // The displaced entry shares its line with a sequence
                // dash (`- key: value`): the new entry takes the key's
                // spot and the old key moves down, aligned with the
                // mapping's indentation.
                let stripped = entry_text
                    .strip_prefix(indent.as_str())
                    .unwrap_or(&entry_text);
                patched.insert_str(target.key_span.0, &format!("{stripped}{indent}"));
            }
        }
    }

    Ok(patched)
}

fn add_flow_entry(
    document: &Document,
    node: &YamlNode,
    key: &str,
    value: &serde_yaml::Value,
    anchor: &Anchor,
) -> Result<String, Error> {
    // Single-line flow mappings can't hold comments, so a
    // deserialize/reserialize round trip is lossless here.
    let feature = document.extract(node.span);
    let existing: serde_yaml::Mapping = serde_yaml::from_str(feature)?;

    let mut rebuilt = serde_yaml::Mapping::new();
    let mut inserted = false;
    for (idx, (k, v)) in existing.iter().enumerate() {
        let here = match anchor {
            Anchor::Start => idx == 0,
            Anchor::BeforeAny(candidates) => k
                .as_str()
                .is_some_and(|k| candidates.iter().any(|c| c == k)),
            _ => false,
        };
        if here && !inserted {
            rebuilt.insert(key.into(), value.clone());
            inserted = true;
        }
        rebuilt.insert(k.clone(), v.clone());
        if !inserted
            && matches!(anchor, Anchor::AfterKey(after) if k.as_str() == Some(after.as_str()))
        {
            rebuilt.insert(key.into(), value.clone());
            inserted = true;
        }
    }
    if !inserted {
        rebuilt.insert(key.into(), value.clone());
    }

    let replacement = serialize_flow(&serde_yaml::Value::Mapping(rebuilt))?;
    let mut patched = document.source().to_string();
    patched.replace_range(node.span.0..node.span.1, &replacement);
    Ok(patched)
}

fn apply_remove_entry(document: &Document, route: &Route) -> Result<String, Error> {
    let Some(Component::Key(_)) = route.components().last() else {
        return Err(Error::InvalidPatch(
            "remove-entry routes must end with a key".into(),
        ));
    };

    let entry = document
        .resolve_entry(route)
        .ok_or_else(|| Error::InvalidPatch(format!("no entry at {route}")))?;

    let parent_route = route.parent().expect("route has a final key component");
    let parent = resolve(document, &parent_route)?;

    if parent.flow {
        return remove_flow_entry(document, parent, entry);
    }

    let start = document.line_span(entry.key_span.0).start;
    let end = document
        .line_span(entry.entry_span.1.saturating_sub(1))
        .end;

    let mut patched = document.source().to_string();
    patched.replace_range(start..end, "");
    Ok(patched)
}

fn remove_flow_entry(
    document: &Document,
    parent: &YamlNode,
    entry: &Entry,
) -> Result<String, Error> {
    let feature = document.extract(parent.span);
    let existing: serde_yaml::Mapping = serde_yaml::from_str(feature)?;

    let mut rebuilt = existing.clone();
    rebuilt.remove(serde_yaml::Value::String(entry.key.clone()));

    let replacement = serialize_flow(&serde_yaml::Value::Mapping(rebuilt))?;
    let mut patched = document.source().to_string();
    patched.replace_range(parent.span.0..parent.span.1, &replacement);
    Ok(patched)
}

fn apply_merge_into(
    document: &Document,
    route: &Route,
    key: &str,
    entries: &IndexMap<String, serde_yaml::Value>,
) -> Result<Document, Error> {
    let target_route = route.key(key);

    match document.resolve(&target_route) {
        // The key exists and has a mapping body: upsert each entry.
        Some(existing) => {
            let NodeKind::Mapping(existing_entries) = &existing.kind else {
                return Err(Error::InvalidPatch(format!(
                    "cannot merge into non-mapping at {target_route}"
                )));
            };
            let existing_keys: Vec<String> =
                existing_entries.iter().map(|e| e.key.clone()).collect();

            let mut current = None;
            for (k, v) in entries {
                let patch = if existing_keys.iter().any(|existing_key| existing_key == k) {
                    Patch {
                        route: target_route.key(k),
                        op: Op::Replace(v.clone()),
                    }
                } else {
                    Patch {
                        route: target_route.clone(),
                        op: Op::AddEntry {
                            key: k.clone(),
                            value: v.clone(),
                            anchor: Anchor::End,
                        },
                    }
                };

                current = Some(match current {
                    None => apply_patch(document, &patch)?,
                    Some(doc) => apply_patch(&doc, &patch)?,
                });
            }

            current.ok_or_else(|| Error::InvalidPatch("no entries to merge".into()))
        }
        None => {
            let value = serde_yaml::Value::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.clone()))
                    .collect(),
            );

            // The key may exist with an empty body (`env:`), in which
            // case the bare line is rewritten into a populated block.
            if let Some(entry) = document.resolve_entry(&target_route)
                && entry.value.is_none()
            {
                let line = document.line_span(entry.key_span.0);
                let indent = " ".repeat(entry.key_pos.col - 1);
                let entry_text = render_block_entry(key, &value, &indent)?;

                let mut patched = document.source().to_string();
                patched.replace_range(line, &entry_text);
                return reparse(patched);
            }

            apply_patch(
                document,
                &Patch {
                    route: route.clone(),
                    op: Op::AddEntry {
                        key: key.to_string(),
                        value,
                        anchor: Anchor::End,
                    },
                },
            )
        }
    }
}

/// Renders a `key: value` block entry (with trailing newline), nesting
/// mappings as indented blocks and everything else in flow layout.
fn render_block_entry(
    key: &str,
    value: &serde_yaml::Value,
    indent: &str,
) -> Result<String, Error> {
    match value {
        serde_yaml::Value::Mapping(mapping) if !mapping.is_empty() => {
            let mut out = format!("{indent}{key}:\n");
            let nested = format!("{indent}  ");
            for (k, v) in mapping {
                let Some(k) = k.as_str() else {
                    return Err(Error::InvalidPatch(
                        "mapping keys must be strings".into(),
                    ));
                };
                out.push_str(&render_block_entry(k, v, &nested)?);
            }
            Ok(out)
        }
        _ => Ok(format!(
            "{indent}{key}: {value}\n",
            value = serialize_flow(value)?
        )),
    }
}

/// Serializes a [`serde_yaml::Value`] in single-line flow layout.
///
/// Only the restricted subset patches need is supported: no tags, and
/// mapping keys must be strings.
pub fn serialize_flow(value: &serde_yaml::Value) -> Result<String, Error> {
    fn inner(value: &serde_yaml::Value, buf: &mut String) -> Result<(), Error> {
        match value {
            serde_yaml::Value::Null => {
                buf.push_str("null");
                Ok(())
            }
            serde_yaml::Value::Bool(b) => {
                buf.push_str(if *b { "true" } else { "false" });
                Ok(())
            }
            serde_yaml::Value::Number(n) => {
                buf.push_str(&n.to_string());
                Ok(())
            }
            serde_yaml::Value::String(s) => {
                // Quote anything a YAML parser would resolve to a
                // non-string, plus anything outside the conservative
                // plain-scalar-safe character set.
                let ambiguous = matches!(
                    crate::resolve_plain(s),
                    crate::ScalarValue::Null
                        | crate::ScalarValue::Bool(_)
                        | crate::ScalarValue::Int(_)
                        | crate::ScalarValue::Float(_)
                );
                if !ambiguous
                    && s.chars().all(|c| {
                        c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '@')
                    })
                {
                    buf.push_str(s);
                } else {
                    // serde_json's string quoting happens to produce a
                    // valid single-line YAML double-quoted scalar.
                    buf.push_str(
                        &serde_json::to_string(s)
                            .map_err(|e| Error::InvalidPatch(e.to_string()))?,
                    );
                }
                Ok(())
            }
            serde_yaml::Value::Sequence(items) => {
                buf.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    inner(item, buf)?;
                }
                buf.push(']');
                Ok(())
            }
            serde_yaml::Value::Mapping(mapping) => {
                if mapping.is_empty() {
                    buf.push_str("{}");
                    return Ok(());
                }
                buf.push_str("{ ");
                for (i, (key, value)) in mapping.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    if !matches!(key, serde_yaml::Value::String(_)) {
                        return Err(Error::InvalidPatch(format!(
                            "mapping keys must be strings, found: {key:?}"
                        )));
                    }
                    inner(key, buf)?;
                    buf.push_str(": ");
                    inner(value, buf)?;
                }
                buf.push_str(" }");
                Ok(())
            }
            serde_yaml::Value::Tagged(tagged) => Err(Error::InvalidPatch(format!(
                "cannot serialize tagged value: {tagged:?}"
            ))),
        }
    }

    let mut buf = String::new();
    inner(value, &mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn doc(source: &str) -> Document {
        Document::parse(source).unwrap()
    }

    fn yaml(source: &str) -> serde_yaml::Value {
        serde_yaml::from_str(source).unwrap()
    }

    #[test]
    fn test_add_entry_after_key() {
        let document = doc("jobs:\n  build:\n    steps:\n      - uses: actions/checkout@v4\n");
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("jobs").key("build").key("steps").index(0),
                op: Op::AddEntry {
                    key: "with".into(),
                    value: yaml("persist-credentials: false"),
                    anchor: Anchor::AfterKey("uses".into()),
                },
            },
        )
        .unwrap();

        assert_eq!(
            patched.source(),
            "jobs:\n  build:\n    steps:\n      - uses: actions/checkout@v4\n        with:\n          persist-credentials: false\n"
        );
    }

    #[test]
    fn test_add_entry_before_any() {
        let document = doc(
            "jobs:\n  test:\n    runs-on: ubuntu-latest\n    steps:\n      - run: make test\n",
        );
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("jobs").key("test"),
                op: Op::AddEntry {
                    key: "timeout-minutes".into(),
                    value: yaml("5"),
                    anchor: Anchor::BeforeAny(vec!["steps".into(), "runs-on".into()]),
                },
            },
        )
        .unwrap();

        assert_eq!(
            patched.source(),
            "jobs:\n  test:\n    timeout-minutes: 5\n    runs-on: ubuntu-latest\n    steps:\n      - run: make test\n"
        );
    }

    #[test]
    fn test_add_entry_preserves_comments() {
        let document = doc("# top comment\nfoo: bar # trailing\nbaz: qux\n");
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new(),
                op: Op::AddEntry {
                    key: "new".into(),
                    value: yaml("1"),
                    anchor: Anchor::AfterKey("foo".into()),
                },
            },
        )
        .unwrap();

        assert_eq!(
            patched.source(),
            "# top comment\nfoo: bar # trailing\nnew: 1\nbaz: qux\n"
        );
    }

    #[test]
    fn test_add_entry_before_first_on_dash_line() {
        let document = doc("steps:\n  - run: make # build\n");
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("steps").index(0),
                op: Op::AddEntry {
                    key: "timeout-minutes".into(),
                    value: yaml("5"),
                    anchor: Anchor::BeforeAny(vec!["run".into(), "uses".into()]),
                },
            },
        )
        .unwrap();

        assert_eq!(
            patched.source(),
            "steps:\n  - timeout-minutes: 5\n    run: make # build\n"
        );
    }

    #[test]
    fn test_add_entry_rejects_duplicate() {
        let document = doc("foo: bar\n");
        let result = apply_patch(
            &document,
            &Patch {
                route: Route::new(),
                op: Op::AddEntry {
                    key: "foo".into(),
                    value: yaml("again"),
                    anchor: Anchor::End,
                },
            },
        );

        assert!(matches!(result, Err(Error::InvalidPatch(_))));
    }

    #[test]
    fn test_replace_scalar() {
        let document = doc("steps:\n  - uses: owner/repo/./sub/../sub@v1 # pinned?\n");
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("steps").index(0).key("uses"),
                op: Op::Replace(yaml("owner/repo/sub@v1")),
            },
        )
        .unwrap();

        assert_eq!(
            patched.source(),
            "steps:\n  - uses: owner/repo/sub@v1 # pinned?\n"
        );
    }

    #[test]
    fn test_rewrite_fragment_in_literal_block() {
        let document = doc(
            "steps:\n  - run: |\n      #!/bin/bash\n      echo \"${{ github.event.pull_request.title }}\"\n",
        );
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("steps").index(0).key("run"),
                op: Op::RewriteFragment {
                    from: "\"${{ github.event.pull_request.title }}\"".into(),
                    to: "\"$PR_TITLE\"".into(),
                },
            },
        )
        .unwrap();

        assert_eq!(
            patched.source(),
            "steps:\n  - run: |\n      #!/bin/bash\n      echo \"$PR_TITLE\"\n"
        );
    }

    #[test]
    fn test_remove_entry() {
        let document = doc("a: 1\nb: 2\nc: 3\n");
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("b"),
                op: Op::RemoveEntry,
            },
        )
        .unwrap();

        assert_eq!(patched.source(), "a: 1\nc: 3\n");
    }

    #[test]
    fn test_merge_into_existing_mapping() {
        let document = doc("step:\n  env:\n    FOO: bar\n");
        let mut entries = IndexMap::new();
        entries.insert("PR_TITLE".to_string(), yaml("'${{ x }}'"));
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("step"),
                op: Op::MergeInto {
                    key: "env".into(),
                    entries,
                },
            },
        )
        .unwrap();

        assert_eq!(
            patched.source(),
            "step:\n  env:\n    FOO: bar\n    PR_TITLE: \"${{ x }}\"\n"
        );
    }

    #[test]
    fn test_merge_into_creates_mapping() {
        let document = doc("step:\n  run: echo hi\n");
        let mut entries = IndexMap::new();
        entries.insert("NAME".to_string(), yaml("value"));
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("step"),
                op: Op::MergeInto {
                    key: "env".into(),
                    entries,
                },
            },
        )
        .unwrap();

        assert_eq!(
            patched.source(),
            "step:\n  run: echo hi\n  env:\n    NAME: value\n"
        );
    }

    #[test]
    fn test_add_entry_flow_mapping() {
        let document = doc("env: { A: 1 }\n");
        let patched = apply_patch(
            &document,
            &Patch {
                route: Route::new().key("env"),
                op: Op::AddEntry {
                    key: "B".into(),
                    value: yaml("2"),
                    anchor: Anchor::End,
                },
            },
        )
        .unwrap();

        assert_eq!(patched.source(), "env: { A: 1, B: 2 }\n");
    }

    #[test]
    fn test_serialize_flow() {
        for (value, expected) in [
            ("null", "null"),
            ("true", "true"),
            ("5", "5"),
            ("plain-string", "plain-string"),
            ("'has space'", "\"has space\""),
        ] {
            assert_eq!(serialize_flow(&yaml(value)).unwrap(), expected);
        }

        assert_eq!(serialize_flow(&yaml("[1, 2]")).unwrap(), "[1, 2]");
        assert_eq!(
            serialize_flow(&yaml("{a: 1, b: x}")).unwrap(),
            "{ a: 1, b: x }"
        );
    }

    #[test]
    fn test_apply_patches_sequence() {
        let document = doc("a: 1\nb: 2\n");
        let patched = apply_patches(
            &document,
            &[
                Patch {
                    route: Route::new().key("a"),
                    op: Op::Replace(yaml("10")),
                },
                Patch {
                    route: Route::new(),
                    op: Op::AddEntry {
                        key: "c".into(),
                        value: yaml("3"),
                        anchor: Anchor::End,
                    },
                },
            ],
        )
        .unwrap();

        assert_eq!(patched.source(), "a: 10\nb: 2\nc: 3\n");
    }
}
