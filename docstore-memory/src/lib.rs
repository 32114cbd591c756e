//! In-memory document storage backend for docstore.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait together with a `StoreConnector` for it. It understands the same filter,
//! projection and pipeline documents as the server backend (for the supported subset),
//! which makes it the backend of choice for tests and offline runs.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Filters** - Equality, comparison, membership, existence and logical operators over dotted paths
//! - **Projections** - Inclusion and exclusion projections
//! - **Aggregation** - `$match`, `$project`, `$group`, `$sort`, `$limit`, `$skip`, `$count`, `$unwind`
//!
//! # Quick Start
//!
//! ```ignore
//! use docstore_core::{backend::{StoreBackend, StoreConnector}, config::ClientConfig, query::Pipeline};
//! use docstore_memory::InMemoryConnector;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryConnector::new()
//!         .connect(&ClientConfig::default())
//!         .await?;
//!
//!     backend.insert_documents(vec![doc! { "name": "A" }], "people").await?;
//!
//!     let counted = backend
//!         .aggregate(Pipeline::new().stage(doc! { "$count": "n" }), "people")
//!         .await?;
//!     assert_eq!(counted, vec![doc! { "n": 1 }]);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstore_memory;

pub mod store;
mod evaluator;
mod pipeline;

pub use store::{InMemoryConnector, InMemoryStore};
