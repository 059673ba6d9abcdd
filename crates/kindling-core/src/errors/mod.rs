//! Error types for every kindling subsystem.

mod engine_error;
mod store_error;

pub use engine_error::EngineError;
pub use store_error::StoreError;

/// Umbrella error for the whole system.
#[derive(Debug, thiserror::Error)]
pub enum KindlingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("configuration error: {message}")]
    Config { message: String },
}

/// Result alias used across the workspace.
pub type KindlingResult<T> = Result<T, KindlingError>;

/// Result alias for store-layer operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for engine-layer operations.
pub type EngineResult<T> = Result<T, EngineError>;
