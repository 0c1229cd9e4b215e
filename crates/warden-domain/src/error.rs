use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid maintenance state label: {0}")]
    InvalidStateLabel(String),

    #[error("invalid profile name: {0}")]
    InvalidProfileName(String),
}
