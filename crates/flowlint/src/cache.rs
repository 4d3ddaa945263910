//! Concurrent memoized loaders for local action and reusable-workflow
//! metadata.
//!
//! Both caches share one shape: a per-key cell map where the map lock
//! is held only long enough to clone the cell, and the cell itself
//! (`OnceLock`) provides single-flight loading: concurrent readers of
//! the same key block on one loader invocation and then share its
//! result. Negative results ("does not exist") are cached the same way.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use crate::parse::parse_workflow;

/// An injected metadata loader: reads the resource at a
/// repository-relative path, yielding `None` when it does not exist.
pub type Loader<T> = Box<dyn Fn(&Utf8Path) -> anyhow::Result<Option<T>> + Send + Sync>;

/// A concurrent memoized loader keyed by normalized repository-relative
/// path.
pub struct MetadataCache<T> {
    entries: Mutex<HashMap<Utf8PathBuf, Arc<OnceLock<Option<Arc<T>>>>>>,
    loader: Loader<T>,
}

impl<T> MetadataCache<T> {
    /// Creates a cache around the given loader.
    pub fn new(loader: Loader<T>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            loader,
        }
    }

    /// Looks up metadata for `path`, invoking the loader at most once
    /// per key across all callers. Returns `None` for resources that
    /// do not exist or whose load failed.
    pub fn get(&self, path: &Utf8Path) -> Option<Arc<T>> {
        let key = normalize(path);

        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(key).or_default().clone()
        };

        cell.get_or_init(|| match (self.loader)(path) {
            Ok(value) => value.map(Arc::new),
            Err(err) => {
                // Load failures are reported at debug level; dependent
                // rules treat the result as unknown.
                tracing::debug!("metadata load failed for {path}: {err}");
                None
            }
        })
        .clone()
    }
}

/// Normalizes a repository-relative path: strips a leading `./` and
/// redundant separators.
fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let trimmed = path.as_str().trim_start_matches("./");
    trimmed
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

/// A single input declared by an action's metadata.
#[derive(Clone, Debug)]
pub struct ActionInput {
    /// Whether the input is required.
    pub required: bool,
    /// Whether the input declares a default.
    pub has_default: bool,
}

/// Metadata parsed from a local action's `action.yml`.
#[derive(Clone, Debug, Default)]
pub struct ActionMetadata {
    /// Declared inputs.
    pub inputs: IndexMap<String, ActionInput>,
    /// Declared output names.
    pub outputs: Vec<String>,
}

/// A single input declared by a reusable workflow.
#[derive(Clone, Debug)]
pub struct ReusableInput {
    /// Whether callers must provide the input.
    pub required: bool,
    /// Whether the input declares a default.
    pub has_default: bool,
}

/// Metadata parsed from a reusable workflow's `on.workflow_call`.
#[derive(Clone, Debug, Default)]
pub struct ReusableWorkflowMetadata {
    /// Declared inputs.
    pub inputs: IndexMap<String, ReusableInput>,
    /// Declared secrets and whether each is required.
    pub secrets: IndexMap<String, bool>,
    /// Declared output names.
    pub outputs: Vec<String>,
}

/// The shared caches for one analysis session. These outlive a single
/// workflow analysis and are the only mutable state shared across
/// concurrently analyzed workflows.
pub struct Caches {
    /// Local action metadata, keyed by action directory path.
    pub actions: MetadataCache<ActionMetadata>,
    /// Local reusable-workflow metadata, keyed by workflow path.
    pub workflows: MetadataCache<ReusableWorkflowMetadata>,
}

impl Caches {
    /// Caches with the given injected loaders.
    pub fn with_loaders(
        actions: Loader<ActionMetadata>,
        workflows: Loader<ReusableWorkflowMetadata>,
    ) -> Self {
        Self {
            actions: MetadataCache::new(actions),
            workflows: MetadataCache::new(workflows),
        }
    }

    /// Caches whose loaders read from the local filesystem, resolving
    /// repository-relative paths against `root`.
    pub fn local(root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        let action_root = root.clone();

        Self::with_loaders(
            Box::new(move |path| load_local_action(&action_root, path)),
            Box::new(move |path| load_local_workflow(&root, path)),
        )
    }
}

fn load_local_action(
    root: &Utf8Path,
    path: &Utf8Path,
) -> anyhow::Result<Option<ActionMetadata>> {
    let dir = root.join(path.as_str().trim_start_matches("./"));

    let candidates = [dir.join("action.yml"), dir.join("action.yaml")];
    let Some(contents) = candidates.iter().find_map(|candidate| {
        std::fs::read_to_string(candidate).ok()
    }) else {
        return Ok(None);
    };

    let doc = yamlgraft::Document::parse(contents)?;
    Ok(Some(parse_action_metadata(&doc)))
}

/// Parses the `inputs`/`outputs` sections of an action definition.
fn parse_action_metadata(doc: &yamlgraft::Document) -> ActionMetadata {
    let mut metadata = ActionMetadata::default();

    let Some(root) = doc.root() else {
        return metadata;
    };

    if let Some(inputs) = root.get("inputs").and_then(|e| e.value.as_ref())
        && let Some(entries) = inputs.as_mapping()
    {
        for entry in entries {
            let body = entry.value.as_ref().and_then(|v| v.as_mapping());
            let flag = |key: &str| {
                body.and_then(|fields| {
                    let field = fields.iter().find(|f| f.key == key)?;
                    field.value.as_ref()
                })
            };

            let required = flag("required")
                .and_then(|v| v.as_scalar())
                .is_some_and(|s| matches!(s.value, yamlgraft::ScalarValue::Bool(true)));
            let has_default = flag("default").is_some();

            metadata.inputs.insert(
                entry.key.clone(),
                ActionInput {
                    required,
                    has_default,
                },
            );
        }
    }

    if let Some(outputs) = root.get("outputs").and_then(|e| e.value.as_ref())
        && let Some(entries) = outputs.as_mapping()
    {
        metadata.outputs = entries.iter().map(|e| e.key.clone()).collect();
    }

    metadata
}

fn load_local_workflow(
    root: &Utf8Path,
    path: &Utf8Path,
) -> anyhow::Result<Option<ReusableWorkflowMetadata>> {
    let full = root.join(path.as_str().trim_start_matches("./"));

    let contents = match std::fs::read_to_string(&full) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let doc = yamlgraft::Document::parse(contents)?;
    let (workflow, _) = parse_workflow(&doc);

    Ok(workflow
        .as_ref()
        .and_then(|w| w.workflow_call_event())
        .map(workflow_call_metadata))
}

/// Converts a parsed `workflow_call` event into cacheable metadata.
pub fn workflow_call_metadata(
    event: &crate::models::WorkflowCallEvent,
) -> ReusableWorkflowMetadata {
    ReusableWorkflowMetadata {
        inputs: event
            .inputs
            .iter()
            .map(|(name, input)| {
                (
                    name.clone(),
                    ReusableInput {
                        required: matches!(
                            input.required,
                            Some(crate::models::LoE::Literal(true))
                        ),
                        has_default: input.default.is_some(),
                    },
                )
            })
            .collect(),
        secrets: event
            .secrets
            .iter()
            .map(|(name, secret)| {
                (
                    name.clone(),
                    matches!(secret.required, Some(crate::models::LoE::Literal(true))),
                )
            })
            .collect(),
        outputs: event.outputs.keys().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_loader_invoked_once_per_key() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();

        let cache: MetadataCache<String> = MetadataCache::new(Box::new(move |path| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(path.to_string()))
        }));

        for _ in 0..4 {
            assert_eq!(
                cache.get(Utf8Path::new("a/b")).as_deref(),
                Some(&"a/b".to_string())
            );
        }
        // Normalized aliases share the entry.
        cache.get(Utf8Path::new("./a/b"));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.get(Utf8Path::new("c"));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_loader_invoked_once_across_threads() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();

        let cache: Arc<MetadataCache<usize>> = Arc::new(MetadataCache::new(Box::new(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                // Widen the race window.
                std::thread::sleep(std::time::Duration::from_millis(10));
                Ok(Some(7))
            },
        )));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get(Utf8Path::new("shared")).map(|v| *v))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(7));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_negative_results_are_cached() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();

        let cache: MetadataCache<String> = MetadataCache::new(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }));

        assert!(cache.get(Utf8Path::new("missing")).is_none());
        assert!(cache.get(Utf8Path::new("missing")).is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loader_errors_become_absent() {
        let cache: MetadataCache<String> =
            MetadataCache::new(Box::new(|_| anyhow::bail!("disk on fire")));

        assert!(cache.get(Utf8Path::new("x")).is_none());
    }
}
