use std::time::Duration;

use thiserror::Error;

/// A failed reconcile, carrying the requeue interval from the configuration
/// loaded this round so callers retry on the current setting rather than a
/// startup snapshot.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ReconcileError {
    #[source]
    pub source: ReconcileCause,
    pub requeue: Duration,
}

#[derive(Debug, Error)]
pub enum ReconcileCause {
    #[error("store error: {0}")]
    Store(#[from] warden_store::StoreError),

    #[error("engine error: {0}")]
    Engine(#[from] warden_engine::EngineError),
}
