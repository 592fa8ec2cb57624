use harvest_core::{ConfigError, EngineState};
use harvest_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Writing the persisted store failed; the run cannot continue safely.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine is {0}; stop it before clearing")]
    EngineBusy(EngineState),
}

pub type Result<T> = std::result::Result<T, ScanError>;
