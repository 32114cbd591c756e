//! Collection handles.
//!
//! A [`CollectionHandle`] is a transient reference to a named collection on a connected
//! backend. Handles are cheap and hold no state of their own; they are re-resolved on every
//! client call.
//!
//! # Example
//!
//! ```ignore
//! let restaurants = CollectionHandle::resolve("restaurants", &backend).await?;
//! restaurants.insert_many(documents).await?;
//! let in_queens = restaurants
//!     .find(FindQuery::builder().filter(doc! { "borough": "Queens" }).build())
//!     .await?;
//! ```

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FindQuery, Pipeline},
};

/// A named collection on a borrowed backend.
#[derive(Debug)]
pub struct CollectionHandle<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> CollectionHandle<'a, B> {
    /// Creates a handle without touching the store. The collection may not exist yet.
    pub fn new(name: impl Into<String>, backend: &'a B) -> Self {
        Self { name: name.into(), backend }
    }

    /// Get-or-create: returns a handle to `name`, creating the collection first if it is missing.
    ///
    /// Existence is checked explicitly; creation is only attempted for a missing collection.
    /// If the collection appears between the check and the create (another client won the
    /// race), the existing collection is used. Any other creation failure is returned.
    ///
    /// # Errors
    ///
    /// Propagates listing and creation failures other than
    /// [`DocumentStoreError::CollectionAlreadyExists`].
    pub async fn resolve(name: &str, backend: &'a B) -> DocumentStoreResult<Self> {
        if backend.collection_exists(name).await? {
            debug!(collection = name, database = backend.database(), "using existing collection");
            return Ok(Self::new(name, backend));
        }

        match backend.create_collection(name).await {
            Ok(()) => {
                info!(collection = name, database = backend.database(), "created collection");
            }
            Err(DocumentStoreError::CollectionAlreadyExists(_)) => {
                debug!(collection = name, "collection created concurrently, using it");
            }
            Err(err) => return Err(err),
        }

        Ok(Self::new(name, backend))
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bulk-inserts documents and returns how many were inserted.
    pub async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<u64> {
        self.backend
            .insert_documents(documents, &self.name)
            .await
    }

    /// Runs a filtered lookup.
    pub async fn find(&self, query: FindQuery) -> DocumentStoreResult<Vec<Document>> {
        self.backend
            .find_documents(query, &self.name)
            .await
    }

    /// Runs a filtered lookup and decodes every result into `T`.
    pub async fn find_as<T: DeserializeOwned>(&self, query: FindQuery) -> DocumentStoreResult<Vec<T>> {
        self.find(query)
            .await?
            .iter()
            .map(DocumentExt::decode)
            .collect()
    }

    /// Runs an aggregation pipeline.
    pub async fn aggregate(&self, pipeline: Pipeline) -> DocumentStoreResult<Vec<Document>> {
        self.backend
            .aggregate(pipeline, &self.name)
            .await
    }

    /// Deletes every matching document and returns how many were removed.
    pub async fn delete_many(&self, filter: Document) -> DocumentStoreResult<u64> {
        self.backend
            .delete_documents(filter, &self.name)
            .await
    }

    /// Counts matching documents.
    pub async fn count(&self, filter: Document) -> DocumentStoreResult<u64> {
        self.backend
            .count_documents(filter, &self.name)
            .await
    }

    /// Drops the collection. The handle is consumed.
    pub async fn drop(self) -> DocumentStoreResult<()> {
        self.backend.drop_collection(&self.name).await
    }
}

impl<B: StoreBackend> Clone for CollectionHandle<'_, B> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), backend: self.backend }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bson::doc;
    use std::sync::Mutex;

    /// Scripted backend: reports `exists` on the listing and answers creation with `create_result`.
    #[derive(Debug)]
    struct ScriptedBackend {
        exists: bool,
        create_result: fn(&str) -> DocumentStoreResult<()>,
        creates: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(exists: bool, create_result: fn(&str) -> DocumentStoreResult<()>) -> Self {
            Self { exists, create_result, creates: Mutex::new(vec![]) }
        }

        fn creates(&self) -> Vec<String> {
            self.creates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StoreBackend for ScriptedBackend {
        fn database(&self) -> &str {
            "scripted"
        }

        async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
            self.creates.lock().unwrap().push(name.to_string());
            (self.create_result)(name)
        }

        async fn drop_collection(&self, _name: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
            Ok(if self.exists { vec!["t".to_string()] } else { vec![] })
        }

        async fn insert_documents(&self, documents: Vec<Document>, _collection: &str) -> DocumentStoreResult<u64> {
            Ok(documents.len() as u64)
        }

        async fn find_documents(&self, _query: FindQuery, _collection: &str) -> DocumentStoreResult<Vec<Document>> {
            Ok(vec![doc! { "name": "A" }])
        }

        async fn aggregate(&self, _pipeline: Pipeline, _collection: &str) -> DocumentStoreResult<Vec<Document>> {
            Ok(vec![])
        }

        async fn delete_documents(&self, _filter: Document, _collection: &str) -> DocumentStoreResult<u64> {
            Ok(0)
        }

        async fn count_documents(&self, _filter: Document, _collection: &str) -> DocumentStoreResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn existing_collection_is_not_recreated() {
        let backend = ScriptedBackend::new(true, |_| panic!("create must not be called"));
        let handle = CollectionHandle::resolve("t", &backend).await.unwrap();
        assert_eq!(handle.name(), "t");
        assert!(backend.creates().is_empty());
    }

    #[tokio::test]
    async fn missing_collection_is_created_once() {
        let backend = ScriptedBackend::new(false, |_| Ok(()));
        CollectionHandle::resolve("t", &backend).await.unwrap();
        assert_eq!(backend.creates(), vec!["t".to_string()]);
    }

    #[tokio::test]
    async fn lost_creation_race_falls_back_to_existing() {
        let backend = ScriptedBackend::new(false, |name| {
            Err(DocumentStoreError::CollectionAlreadyExists(name.to_string()))
        });
        let handle = CollectionHandle::resolve("t", &backend).await.unwrap();
        assert_eq!(handle.name(), "t");
    }

    #[tokio::test]
    async fn other_creation_failures_propagate() {
        let backend = ScriptedBackend::new(false, |_| {
            Err(DocumentStoreError::Backend("not authorized to create".to_string()))
        });
        let err = CollectionHandle::resolve("t", &backend).await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::Backend(ref msg) if msg.contains("not authorized")));
    }

    #[tokio::test]
    async fn typed_results_decode() {
        #[derive(serde::Deserialize)]
        struct Named {
            name: String,
        }

        let backend = ScriptedBackend::new(true, |_| Ok(()));
        let names: Vec<Named> = CollectionHandle::new("t", &backend)
            .find_as(FindQuery::new())
            .await
            .unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].name, "A");
    }
}
