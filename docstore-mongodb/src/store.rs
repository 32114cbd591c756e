use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc};
use mongodb::{
    Client, Collection as MongoCollection, Database,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, Credential, FindOptions, ServerAddress},
};
use tracing::{debug, info};

use docstore_core::{
    backend::{StoreBackend, StoreConnector},
    config::ClientConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FindQuery, Pipeline},
};

/// Server error code for creating a collection that already exists.
const NAMESPACE_EXISTS: i32 = 48;


/// A connected MongoDB client bound to one database.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn connector() -> MongoDbConnector {
        MongoDbConnector
    }

    fn get_database(&self) -> Database {
        self.client.database(&self.database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.get_database().collection(collection_name)
    }
}

fn is_namespace_exists(error: &MongoError) -> bool {
    matches!(*error.kind, ErrorKind::Command(ref command) if command.code == NAMESPACE_EXISTS)
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_database()
            .create_collection(name)
            .await
            .map_err(|e| match is_namespace_exists(&e) {
                true => DocumentStoreError::CollectionAlreadyExists(name.to_string()),
                false => DocumentStoreError::Backend(e.to_string()),
            })
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.get_database()
            .list_collection_names()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        Ok(
            !self.get_database()
                .list_collection_names()
                .filter(doc! { "name": name })
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .is_empty()
        )
    }

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<u64> {
        // The driver refuses an empty batch.
        if documents.is_empty() {
            return Ok(0);
        }

        Ok(
            self.get_collection(collection)
                .insert_many(documents)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .inserted_ids
                .len() as u64
        )
    }

    async fn find_documents(&self, query: FindQuery, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.effective_limit() {
            options.limit = Some(limit as i64);
        }
        if let Some(projection) = query.effective_projection() {
            options.projection = Some(projection.clone());
        }

        self.get_collection(collection)
            .find(query.filter)
            .with_options(options)
            .await
            .map_err(|e| DocumentStoreError::Query(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocumentStoreError::Query(e.to_string()))
    }

    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline.into_stages())
            .await
            .map_err(|e| DocumentStoreError::Query(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocumentStoreError::Query(e.to_string()))
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(filter)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn count_documents(&self, filter: Document, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(|e| DocumentStoreError::Query(e.to_string()))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Translates a [`ClientConfig`] into driver options.
///
/// A configured `uri` is parsed as a connection string; otherwise a single TCP host is
/// used. Credentials, when present, authenticate against the server's default mechanism.
pub async fn client_options(config: &ClientConfig) -> DocumentStoreResult<ClientOptions> {
    let mut options = match &config.uri {
        Some(uri) => ClientOptions::parse(uri)
            .await
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?,
        None => ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: config.host.clone(),
                port: Some(config.port),
            }])
            .build(),
    };

    if let Some(app_name) = &config.app_name {
        options.app_name = Some(app_name.clone());
    }
    if let Some(timeout) = config.connect_timeout() {
        options.connect_timeout = Some(timeout);
    }
    if let Some(timeout) = config.server_selection_timeout() {
        options.server_selection_timeout = Some(timeout);
    }
    if let Some(credentials) = config.credentials() {
        let mut credential = Credential::default();
        credential.username = Some(credentials.username.clone());
        credential.password = Some(credentials.password.clone());
        options.credential = Some(credential);
    }

    Ok(options)
}

/// Opens [`MongoDbStore`]s.
///
/// The driver connects lazily, so [`connect`](StoreConnector::connect) pings the server
/// before handing the store out: an unreachable server fails here rather than on the
/// first operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDbConnector;

#[async_trait]
impl StoreConnector for MongoDbConnector {
    type Backend = MongoDbStore;

    async fn connect(&self, config: &ClientConfig) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(client_options(config).await?)
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?;
        debug!(address = %config.address(), "ping acknowledged");

        info!(address = %config.address(), database = %config.database, "connected to mongodb");

        Ok(MongoDbStore::new(client, config.database.clone()))
    }
}
