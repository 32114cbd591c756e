//! The document store client.
//!
//! [`StoreClient`] owns at most one connected backend and exposes the collection
//! lifecycle, JSON-Lines ingestion, queries, aggregation and chart rendering over it.
//! Every operation resolves its collection by name on each call; the client keeps no
//! per-collection state.

use std::{fmt, fs::File, io::Read, path::Path};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use docstore_chart::{BarChart, ChartRenderer, ChartSpec, PlottersRenderer};
use docstore_core::{
    backend::{StoreBackend, StoreConnector},
    collection::CollectionHandle,
    config::ClientConfig,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    ingest::JsonLines,
    query::{FindQuery, Pipeline},
};
use docstore_memory::InMemoryConnector;

/// A client bound to one database of one store.
///
/// The client starts disconnected. [`connect`](StoreClient::connect) opens the transport;
/// operations that need the store fail with [`DocumentStoreError::NotConnected`] until then.
///
/// # Example
///
/// ```ignore
/// use docstore::{prelude::*, memory::InMemoryConnector};
///
/// let mut client = StoreClient::new(InMemoryConnector::new(), ClientConfig::default());
/// client.connect().await?;
///
/// client.ingest("people", "{\"name\":\"A\"}\n{\"name\":\"B\"}".as_bytes(), false).await?;
/// assert_eq!(client.size("people").await?, 2);
///
/// client.disconnect().await?;
/// ```
pub struct StoreClient<C: StoreConnector> {
    config: ClientConfig,
    connector: C,
    backend: Option<C::Backend>,
    renderer: Box<dyn ChartRenderer>,
}

impl<C: StoreConnector> StoreClient<C> {
    /// Creates a disconnected client. Charts are drawn with [`PlottersRenderer`].
    pub fn new(connector: C, config: ClientConfig) -> Self {
        Self {
            config,
            connector,
            backend: None,
            renderer: Box::new(PlottersRenderer::default()),
        }
    }

    /// Replaces the chart renderer.
    pub fn with_renderer(mut self, renderer: impl ChartRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    /// The connected backend.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotConnected`] before `connect` or after `disconnect`.
    pub fn backend(&self) -> DocumentStoreResult<&C::Backend> {
        self.backend
            .as_ref()
            .ok_or(DocumentStoreError::NotConnected)
    }

    /// Opens the transport to the configured store.
    ///
    /// A failure is logged and returned; the client stays disconnected and can try again.
    /// Connecting an already connected client does nothing.
    pub async fn connect(&mut self) -> DocumentStoreResult<()> {
        if self.backend.is_some() {
            debug!(address = %self.config.address(), "already connected");
            return Ok(());
        }

        match self.connector.connect(&self.config).await {
            Ok(backend) => {
                info!(address = %self.config.address(), database = %self.config.database, "connected");
                self.backend = Some(backend);
                Ok(())
            }
            Err(err) => {
                error!(address = %self.config.address(), error = %err, "could not connect to the document store");
                Err(err)
            }
        }
    }

    /// Shuts the transport down.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotConnected`] if there is no connection to close.
    pub async fn disconnect(&mut self) -> DocumentStoreResult<()> {
        let backend = self.backend
            .take()
            .ok_or(DocumentStoreError::NotConnected)?;

        backend.shutdown().await?;
        info!(address = %self.config.address(), "disconnected");

        Ok(())
    }

    /// Get-or-create: returns a handle to `name`, creating the collection if it is missing.
    ///
    /// Calling this repeatedly with the same name is idempotent.
    pub async fn resolve_collection(&self, name: &str) -> DocumentStoreResult<CollectionHandle<'_, C::Backend>> {
        CollectionHandle::resolve(name, self.backend()?).await
    }

    /// Creates a collection, failing with [`DocumentStoreError::CollectionAlreadyExists`] if
    /// it is already there.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend()?
            .create_collection(name)
            .await?;
        info!(collection = name, "created collection");

        Ok(())
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend()?
            .list_collections()
            .await
    }

    /// Removes every document from `name`, keeping the collection. Returns how many were removed.
    pub async fn flush(&self, name: &str) -> DocumentStoreResult<u64> {
        let removed = CollectionHandle::new(name, self.backend()?)
            .delete_many(Document::new())
            .await?;
        info!(collection = name, removed, "flushed collection");

        Ok(removed)
    }

    /// Drops `name` with its documents and indexes. Dropping a missing collection succeeds.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        CollectionHandle::new(name, self.backend()?)
            .drop()
            .await?;
        info!(collection = name, "dropped collection");

        Ok(())
    }

    /// Number of documents in `name`; 0 for a missing collection.
    pub async fn size(&self, name: &str) -> DocumentStoreResult<u64> {
        CollectionHandle::new(name, self.backend()?)
            .count(Document::new())
            .await
    }

    /// Loads JSON-Lines records into `name` and returns how many were inserted.
    ///
    /// The whole source is parsed before the store is touched, so malformed input inserts
    /// nothing and, with `clear_first`, clears nothing. Otherwise the collection is resolved
    /// (created if missing), emptied when `clear_first` is set, and filled in one bulk insert.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Format`] for malformed input and
    /// [`DocumentStoreError::Io`] when the reader fails.
    pub async fn ingest(&self, name: &str, reader: impl Read, clear_first: bool) -> DocumentStoreResult<u64> {
        let backend = self.backend()?;
        let records = JsonLines::from_reader(reader)?;

        let collection = CollectionHandle::resolve(name, backend).await?;

        if clear_first {
            let removed = collection.delete_many(Document::new()).await?;
            info!(collection = name, removed, "cleared collection before ingest");
        }

        if records.is_empty() {
            info!(collection = name, "no records to ingest");
            return Ok(0);
        }

        let inserted = collection
            .insert_many(records.into_documents())
            .await?;
        info!(collection = name, inserted, "ingested records");

        Ok(inserted)
    }

    /// [`ingest`](StoreClient::ingest) from a UTF-8 file.
    pub async fn ingest_file(&self, name: &str, path: impl AsRef<Path>, clear_first: bool) -> DocumentStoreResult<u64> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DocumentStoreError::Io(format!("{}: {e}", path.display())))?;

        debug!(collection = name, path = %path.display(), "ingesting file");

        self.ingest(name, file, clear_first).await
    }

    /// Runs a filtered lookup on `name` and returns the results in store order.
    ///
    /// With `show` set, every result is also written to the log.
    pub async fn find(&self, name: &str, query: FindQuery, show: bool) -> DocumentStoreResult<Vec<Document>> {
        let collection = self.resolve_collection(name).await?;

        debug!(
            collection = name,
            filter = %query.filter,
            limit = ?query.effective_limit(),
            "running find"
        );

        let results = collection.find(query).await?;

        if show {
            show_results(name, &results);
        }

        Ok(results)
    }

    /// [`find`](StoreClient::find), decoding each result into `T`.
    pub async fn find_as<T: DeserializeOwned>(&self, name: &str, query: FindQuery) -> DocumentStoreResult<Vec<T>> {
        self.resolve_collection(name)
            .await?
            .find_as(query)
            .await
    }

    /// Runs an aggregation pipeline on `name` and returns its output.
    ///
    /// With `show` set, every output document is also written to the log.
    pub async fn aggregate(&self, name: &str, pipeline: Pipeline, show: bool) -> DocumentStoreResult<Vec<Document>> {
        let collection = self.resolve_collection(name).await?;

        debug!(collection = name, stages = ?pipeline.stage_names(), "running aggregation");

        let results = collection.aggregate(pipeline).await?;

        if show {
            show_results(name, &results);
        }

        Ok(results)
    }

    /// Draws `results` as a grouped bar chart, displays it, and saves it when
    /// `output` is given (format by extension). Needs no connection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Render`] for missing or mistyped chart fields, an
    /// unsupported image extension, or a drawing failure.
    pub fn render(&self, results: &[Document], spec: &ChartSpec, output: Option<&Path>) -> DocumentStoreResult<()> {
        let chart = BarChart::from_documents(results, spec)?;

        self.renderer.display(&chart)?;

        if let Some(path) = output {
            self.renderer.save(&chart, path)?;
            info!(path = %path.display(), "saved chart");
        }

        Ok(())
    }
}

fn show_results(name: &str, results: &[Document]) {
    for document in results {
        info!(collection = name, "{document}");
    }
}

impl StoreClient<InMemoryConnector> {
    /// A client over a fresh in-process store.
    pub fn in_memory(config: ClientConfig) -> Self {
        Self::new(InMemoryConnector::new(), config)
    }
}

#[cfg(feature = "mongodb")]
impl StoreClient<docstore_mongodb::MongoDbConnector> {
    /// A client for a MongoDB server. Credentials are taken from `MONGO_USER` /
    /// `MONGO_PASS` when both are set.
    pub fn mongodb(config: ClientConfig) -> Self {
        Self::new(docstore_mongodb::MongoDbConnector, config.with_env_credentials())
    }
}

impl<C: StoreConnector> fmt::Debug for StoreClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl<C: StoreConnector> Drop for StoreClient<C> {
    fn drop(&mut self) {
        if self.backend.is_some() {
            warn!(
                address = %self.config.address(),
                "client dropped while connected; call disconnect for a clean shutdown"
            );
        }
    }
}
