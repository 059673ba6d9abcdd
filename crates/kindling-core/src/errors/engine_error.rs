use super::StoreError;

/// Recommendation-engine errors.
///
/// `StaleMatrix` and `StoreDiverged` are recoverable: the engine handles
/// them internally with a bounded rebuild/resync retry chain. Only
/// `ScoringFailed` and `InvalidRequest` reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("co-occurrence matrix is stale: {detail}")]
    StaleMatrix { detail: String },

    #[error("forward and reverse rating maps diverged: {detail}")]
    StoreDiverged { detail: String },

    #[error("reconciliation source '{id}' has no data")]
    MissingIdentity { id: String },

    #[error("scoring failed after rebuild and resync: {reason}")]
    ScoringFailed { reason: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
