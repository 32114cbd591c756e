//! In-memory storage implementation for document stores.
//!
//! Documents live in insertion order in per-collection vectors behind async-aware
//! read-write locks. Databases are kept by the [`InMemoryConnector`] so that a client
//! which disconnects and reconnects finds its data again.

use std::{collections::{BTreeMap, HashMap, HashSet}, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::debug;

use docstore_core::{
    backend::{StoreBackend, StoreConnector},
    config::ClientConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FindQuery, Pipeline},
};

use crate::{
    evaluator::{DocumentEvaluator, Projection, validate_filter},
    pipeline::run_pipeline,
};

type CollectionMap = BTreeMap<String, Vec<Document>>;
type DatabaseMap = HashMap<String, Arc<RwLock<CollectionMap>>>;


/// Thread-safe in-memory document storage backend bound to one database.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state; clones share
/// the same collections.
///
/// # Performance
///
/// Queries scan every document in a collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docstore_memory::InMemoryStore;
/// use docstore_core::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new("test");
/// store.insert_documents(vec![doc! { "name": "Alice" }], "users").await?;
/// assert_eq!(store.count_documents(doc! {}, "users").await?, 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    database: String,
    /// collection name -> documents in insertion order
    collections: Arc<RwLock<CollectionMap>>,
}

impl InMemoryStore {
    /// Creates a new, empty store for `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: Arc::new(RwLock::new(CollectionMap::new())),
        }
    }
}

fn validate_collection_name(name: &str) -> DocumentStoreResult<()> {
    if name.is_empty() || name.contains('$') || name.contains('\0') {
        return Err(DocumentStoreError::Backend(format!("invalid collection name: '{name}'")));
    }

    Ok(())
}

// Identity key for `_id` values; numeric widths compare equal as they do in the store.
fn id_key(id: &Bson) -> String {
    match id {
        Bson::Int32(n) => format!("number:{n}"),
        Bson::Int64(n) => format!("number:{n}"),
        Bson::Double(n) if n.fract() == 0.0 => format!("number:{}", *n as i64),
        other => format!("{other:?}"),
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        validate_collection_name(name)?;

        let mut collections = self.collections.write().await;

        if collections.contains_key(name) {
            return Err(DocumentStoreError::CollectionAlreadyExists(name.to_string()));
        }

        collections.insert(name.to_string(), Vec::new());

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        if self.collections.write().await.remove(name).is_none() {
            debug!(collection = name, database = %self.database, "drop of missing collection");
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(
            self.collections
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<u64> {
        validate_collection_name(collection)?;

        let mut collections = self.collections.write().await;
        let stored = collections
            .entry(collection.to_string())
            .or_default();

        let mut seen: HashSet<String> = stored
            .iter()
            .filter_map(|doc| doc.get("_id"))
            .map(id_key)
            .collect();

        // Validate the whole batch first so a duplicate leaves the collection untouched.
        let mut prepared = Vec::with_capacity(documents.len());
        for document in documents {
            let document = match document.get("_id") {
                Some(_) => document,
                None => {
                    let mut with_id = Document::new();
                    with_id.insert("_id", ObjectId::new());
                    for (key, value) in document {
                        with_id.insert(key, value);
                    }
                    with_id
                }
            };

            if let Some(id) = document.get("_id") {
                if !seen.insert(id_key(id)) {
                    return Err(DocumentStoreError::DocumentAlreadyExists(
                        id.to_string(),
                        collection.to_string(),
                    ));
                }
            }

            prepared.push(document);
        }

        let inserted = prepared.len() as u64;
        stored.extend(prepared);

        Ok(inserted)
    }

    async fn find_documents(&self, query: FindQuery, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        validate_filter(&query.filter)?;
        let projection = query
            .effective_projection()
            .map(Projection::parse)
            .transpose()?;

        let collections = self.collections.read().await;
        let stored = match collections.get(collection) {
            Some(stored) => stored,
            None => return Ok(vec![]),
        };

        let mut found = Vec::new();
        for document in stored {
            if let Some(limit) = query.effective_limit() {
                if found.len() >= limit {
                    break;
                }
            }

            if DocumentEvaluator::new(document).matches(&query.filter)? {
                found.push(match &projection {
                    Some(projection) => projection.apply(document),
                    None => document.clone(),
                });
            }
        }

        Ok(found)
    }

    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let documents = self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();

        run_pipeline(pipeline.stages(), documents)
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> DocumentStoreResult<u64> {
        validate_filter(&filter)?;

        let mut collections = self.collections.write().await;
        let stored = match collections.get_mut(collection) {
            Some(stored) => stored,
            None => return Ok(0),
        };

        // Evaluate everything before removing anything so a bad filter deletes nothing.
        let mut keep = Vec::with_capacity(stored.len());
        for document in stored.iter() {
            keep.push(!DocumentEvaluator::new(document).matches(&filter)?);
        }

        let before = stored.len();
        let mut flags = keep.into_iter();
        stored.retain(|_| flags.next().unwrap_or(true));

        Ok((before - stored.len()) as u64)
    }

    async fn count_documents(&self, filter: Document, collection: &str) -> DocumentStoreResult<u64> {
        validate_filter(&filter)?;

        let collections = self.collections.read().await;
        let stored = match collections.get(collection) {
            Some(stored) => stored,
            None => return Ok(0),
        };

        let mut count = 0;
        for document in stored {
            if DocumentEvaluator::new(document).matches(&filter)? {
                count += 1;
            }
        }

        Ok(count)
    }
}


/// Opens [`InMemoryStore`]s, one per database name.
///
/// Databases outlive the stores opened on them: connecting twice to the same database
/// (through this connector or a clone of it) yields stores that share collections.
///
/// # Example
///
/// ```ignore
/// use docstore_memory::InMemoryConnector;
/// use docstore_core::{backend::StoreConnector, config::ClientConfig};
///
/// let connector = InMemoryConnector::new();
/// let store = connector.connect(&ClientConfig::default()).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryConnector {
    databases: Arc<RwLock<DatabaseMap>>,
    unreachable: bool,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose every connection attempt fails, standing in for a store that is
    /// down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    type Backend = InMemoryStore;

    async fn connect(&self, config: &ClientConfig) -> DocumentStoreResult<Self::Backend> {
        if self.unreachable {
            return Err(DocumentStoreError::Connection(format!(
                "no store reachable at {}",
                config.address()
            )));
        }

        let collections = self.databases
            .write()
            .await
            .entry(config.database.clone())
            .or_insert_with(|| Arc::new(RwLock::new(CollectionMap::new())))
            .clone();

        Ok(InMemoryStore {
            database: config.database.clone(),
            collections,
        })
    }
}
