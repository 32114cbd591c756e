//! Main docstore crate: a thin client over JSON document stores.
//!
//! This crate is the entry point of the docstore workspace. It provides [`StoreClient`]
//! and re-exports the core types together with the available backends.
//!
//! # Features
//!
//! - **Idempotent collection bootstrap** - Collections are resolved by name and created on first use
//! - **JSON-Lines ingestion** - Bulk loads that are all-or-nothing on malformed input
//! - **Store-native queries** - Filters, projections and aggregation pipelines are passed through as documents
//! - **Charts** - Grouped bar charts from tabular results, saved as SVG or bitmap images
//! - **Multiple backends** - In-memory storage and MongoDB behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docstore::{prelude::*, memory::InMemoryConnector};
//! use bson::doc;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let mut client = StoreClient::new(InMemoryConnector::new(), ClientConfig::default());
//!     client.connect().await?;
//!
//!     client
//!         .ingest_file("restaurants", "data/restaurants.jsonl", false)
//!         .await?;
//!
//!     let per_borough = client
//!         .aggregate(
//!             "restaurants",
//!             Pipeline::new()
//!                 .stage(doc! { "$group": {
//!                     "_id": { "borough": "$borough", "cuisine": "$cuisine" },
//!                     "count": { "$sum": 1 },
//!                 } })
//!                 .stage(doc! { "$project": {
//!                     "borough": "$_id.borough",
//!                     "cuisine": "$_id.cuisine",
//!                     "count": "$count",
//!                     "_id": 0,
//!                 } }),
//!             false,
//!         )
//!         .await?;
//!
//!     client.render(
//!         &per_borough,
//!         &ChartSpec::new("borough", "count", "cuisine").with_title("Restaurants by cuisine"),
//!         Some(Path::new("restaurants.png")),
//!     )?;
//!
//!     client.disconnect().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-process storage for tests and offline runs
//! - [`mongodb`] - MongoDB server backend (requires the `mongodb` feature)

pub mod client;
pub mod prelude;

pub use client::StoreClient;
pub use docstore_core::{backend, collection, config, document, error, ingest, query};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use docstore_memory::{InMemoryConnector, InMemoryStore};
}

/// Bar chart model and renderers.
pub mod chart {
    pub use docstore_chart::{BarChart, ChartRenderer, ChartSpec, ImageFormat, PlottersRenderer, Series};
}

/// MongoDB storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docstore_mongodb::{MongoDbConnector, MongoDbStore, client_options};
}
