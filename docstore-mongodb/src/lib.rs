//! MongoDB backend implementation for docstore.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters, projections and pipelines are handed to the server unchanged.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docstore = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! [`MongoDbConnector`] builds driver options from a `ClientConfig` (host and port, or a
//! full connection string) and verifies the server with a `ping` before returning.
//! Credentials come from the config, normally filled from `MONGO_USER` / `MONGO_PASS`.
//!
//! # Example
//!
//! ```ignore
//! use docstore_core::{backend::StoreConnector, config::ClientConfig};
//! use docstore_mongodb::MongoDbConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("localhost", 27017, "restaurants").with_env_credentials();
//!     let store = MongoDbConnector.connect(&config).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstore_mongodb;

pub mod store;

pub use store::{MongoDbConnector, MongoDbStore, client_options};
