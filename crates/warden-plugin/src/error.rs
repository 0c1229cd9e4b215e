use thiserror::Error;

use crate::expr::ExprError;

#[derive(Debug, Error)]
pub enum PluginError {
    /// Progress made, but the operation is not yet complete; the caller keeps
    /// the current state and retries on the next reconcile.
    #[error("not yet complete: {0}")]
    Retry(String),

    #[error("plugin failed: {0}")]
    Failed(String),

    #[error("invalid plugin config: {0}")]
    InvalidConfig(String),

    #[error("unknown {kind} plugin type '{plugin_type}'")]
    UnknownType {
        kind: &'static str,
        plugin_type: String,
    },

    #[error("chain references undeclared {kind} instance '{name}'")]
    Undeclared { kind: &'static str, name: String },

    #[error("check expression error: {0}")]
    Expr(#[from] ExprError),

    #[error("cluster error: {0}")]
    Store(#[from] warden_store::StoreError),
}

impl PluginError {
    pub fn is_retry(&self) -> bool {
        matches!(self, PluginError::Retry(_))
    }
}
