//! Storage abstraction for cohort sync.
//!
//! Backend crates (e.g., cohort-store-memory, cohort-store-sqlite) implement the
//! [`Store`] trait so the sync engine doesn't depend on any specific database
//! engine or schema details.
//!
//! The store is modelled as a document store: one document per cohort with two
//! sub-collections (`messages` and `tasks`). Identifiers and timestamps for new
//! documents are always assigned by the store, never by the caller.

use thiserror::Error;

pub mod store;
pub mod types;

pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}
