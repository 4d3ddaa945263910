//! Shared helpers for unit tests.

use std::sync::Arc;

use crate::{
    cache::Caches,
    config::Config,
    diagnostic::Diagnostic,
    engine::{AnalyzeOptions, analyze},
};

/// Caches whose loaders report everything as absent.
pub(crate) fn test_caches() -> Arc<Caches> {
    Arc::new(Caches::with_loaders(
        Box::new(|_| Ok(None)),
        Box::new(|_| Ok(None)),
    ))
}

/// Analyzes `source` with the default configuration and empty caches.
pub(crate) fn analyze_rules(source: &str) -> Vec<Diagnostic> {
    analyze(
        source,
        &Config::default(),
        &test_caches(),
        &AnalyzeOptions::default(),
    )
    .expect("analysis should not fail")
    .diagnostics
}

/// Analyzes `source` with the given configuration.
pub(crate) fn analyze_with_config(source: &str, config: Config) -> Vec<Diagnostic> {
    analyze(source, &config, &test_caches(), &AnalyzeOptions::default())
        .expect("analysis should not fail")
        .diagnostics
}

/// Analyzes `source` with the given caches.
pub(crate) fn analyze_with_caches(source: &str, caches: Caches) -> Vec<Diagnostic> {
    analyze(
        source,
        &Config::default(),
        &Arc::new(caches),
        &AnalyzeOptions::default(),
    )
    .expect("analysis should not fail")
    .diagnostics
}
