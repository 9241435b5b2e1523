use thiserror::Error;

use crate::persistence::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown app type: {0}")]
    UnknownAppType(String),
    #[error("App {app_type} failed to start: {reason}")]
    AppInitFailed { app_type: String, reason: String },
    #[error("Invalid descriptor for {app_type}: {reason}")]
    InvalidDescriptor { app_type: String, reason: String },
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}
