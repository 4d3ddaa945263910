//! State shared with rules at construction time.

use crate::{cache::Caches, config::Config};

/// Everything a rule may capture when it is constructed: the run's
/// configuration and the shared metadata caches.
pub struct AnalysisState<'a> {
    /// The run's configuration.
    pub config: &'a Config,
    /// The shared metadata caches.
    pub caches: &'a std::sync::Arc<Caches>,
}
