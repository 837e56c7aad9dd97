use crate::config::ConfigError;
use crate::store::StoreError;

/// Crate-level error for the binary and API wiring.
#[derive(Debug, thiserror::Error)]
pub enum HmsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
