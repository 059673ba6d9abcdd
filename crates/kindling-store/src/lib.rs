//! # kindling-store
//!
//! The two `RatingStore` backends: `MemoryStore` (transient, RwLock'd
//! maps) and `SqliteStore` (persistent, document-style tables over
//! rusqlite). The engine runs identically against either; the contract
//! test suite in `tests/` is executed against both.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
