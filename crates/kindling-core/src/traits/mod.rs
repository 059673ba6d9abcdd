//! Traits at the seams: the store contract every backend implements.

pub mod store;

pub use store::RatingStore;
