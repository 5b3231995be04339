//! In-process vector store with named collections and file snapshots.

pub mod collection;
pub mod error;
pub mod snapshot;
pub mod store;

pub use collection::{Collection, QueryHit, StoredDocument};
pub use error::StoreError;
pub use store::VectorStore;

/// Collection holding the indexed reference document.
pub const DEFAULT_COLLECTION: &str = "docs";
