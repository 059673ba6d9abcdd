/// Storage-layer errors, shared by every `RatingStore` backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("store lock poisoned: {message}")]
    LockPoisoned { message: String },
}

impl StoreError {
    pub fn sqlite(e: impl std::fmt::Display) -> Self {
        Self::Sqlite {
            message: e.to_string(),
        }
    }

    pub fn serialization(e: impl std::fmt::Display) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }

    pub fn poisoned(e: impl std::fmt::Display) -> Self {
        Self::LockPoisoned {
            message: e.to_string(),
        }
    }
}
