//! Storage backend abstraction for the document store.
//!
//! This module defines the two seams between the client and a concrete store:
//!
//! - [`StoreBackend`]: a live, connected handle to one database of a store
//! - [`StoreConnector`]: a factory that opens a [`StoreBackend`] from a [`ClientConfig`]
//!
//! Filters, projections and pipelines cross this boundary as opaque documents; each
//! backend interprets them with its own engine.
//!
//! # Examples
//!
//! ```ignore
//! use docstore::backend::{StoreBackend, StoreConnector};
//! use bson::doc;
//!
//! let backend = connector.connect(&config).await?;
//! backend.insert_documents(vec![doc! { "name": "Alice" }], "users").await?;
//! assert_eq!(backend.count_documents(doc! {}, "users").await?, 1);
//! ```

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    config::ClientConfig,
    document::Document,
    error::DocumentStoreResult,
    query::{FindQuery, Pipeline},
};

/// Abstract interface for a connected document store, bound to one database.
///
/// # Concurrency
///
/// Implementations must be `Send + Sync`, but the client issues one request at a time and
/// awaits it to completion; no operation is retried.
///
/// # Error Handling
///
/// Rejected filters, projections and pipelines are reported as
/// [`DocumentStoreError::Query`](crate::error::DocumentStoreError::Query); write failures as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Name of the database this backend is bound to.
    fn database(&self) -> &str;

    /// Creates a new, empty collection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CollectionAlreadyExists`](crate::error::DocumentStoreError::CollectionAlreadyExists)
    /// if a collection with this name exists. Other failures (permissions, invalid names)
    /// surface as their own variants.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection, its documents and its indexes.
    ///
    /// Dropping a collection that does not exist succeeds.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the database.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Returns whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        Ok(self
            .list_collections()
            .await?
            .iter()
            .any(|existing| existing == name))
    }

    /// Inserts documents in one bulk call and returns how many were inserted.
    ///
    /// The collection is created implicitly if missing. Documents without an `_id`
    /// receive a generated one.
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Runs a filtered lookup and materializes the results in store order.
    ///
    /// A missing collection yields an empty result.
    async fn find_documents(
        &self,
        query: FindQuery,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Runs an aggregation pipeline and materializes its output.
    async fn aggregate(
        &self,
        pipeline: Pipeline,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Deletes every document matching `filter` and returns how many were removed.
    async fn delete_documents(&self, filter: Document, collection: &str) -> DocumentStoreResult<u64>;

    /// Counts documents matching `filter`.
    async fn count_documents(&self, filter: Document, collection: &str) -> DocumentStoreResult<u64>;

    /// Cleanly shuts down the backend, releasing the transport.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Opens connected [`StoreBackend`]s.
///
/// A connector is reusable: a client that disconnects can connect again through the
/// same connector.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Backend: StoreBackend;

    /// Establishes the transport and binds it to `config.database`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Connection`](crate::error::DocumentStoreError::Connection)
    /// when the store is unreachable or refuses the connection.
    async fn connect(&self, config: &ClientConfig) -> DocumentStoreResult<Self::Backend>;
}
