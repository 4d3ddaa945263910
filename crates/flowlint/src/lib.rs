//! Static analysis and autofixes for CI workflow files.
//!
//! The pipeline: [`yamlgraft`] parses the YAML into a position-carrying
//! document tree; [`parse`] builds the typed workflow AST with syntax
//! diagnostics; [`visitor`] drives every registered [`rules::Rule`]
//! over the AST in one pass; [`fix`] applies the queued autofixes back
//! onto the source text, preserving comments and formatting.

pub mod cache;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod fix;
pub mod models;
pub mod parse;
pub mod registry;
pub mod render;
pub mod rules;
pub mod state;
pub mod visitor;

#[cfg(test)]
pub(crate) mod testutil;

pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use engine::{Analysis, AnalyzeOptions, analyze};
pub use visitor::CancelToken;
