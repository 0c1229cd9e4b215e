use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Chain or instance resolution failed; a configuration-class error.
    #[error("profile compilation: {0}")]
    Compile(#[from] warden_plugin::PluginError),

    /// One or more profile applies failed hard this round; persisted data
    /// must not be patched.
    #[error("profile apply failed: {0}")]
    Apply(String),

    #[error("store error: {0}")]
    Store(#[from] warden_store::StoreError),
}
