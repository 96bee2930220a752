//! Shared handles the ambient HTTP surface needs (§6). Deliberately thin:
//! the core's own contract is that generic routing/auth live outside this
//! crate, so `AppState` only carries what `health`/`metrics` touch.

use openlabels_core::database::DatabasePool;
use openlabels_core::metrics::MetricsService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabasePool,
    pub metrics: Arc<MetricsService>,
}
