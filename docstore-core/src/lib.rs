//! Core of the docstore project: a thin client layer over JSON document stores.
//!
//! This crate provides:
//!
//! - **Documents** ([`document`]) - The schema-less document type and JSON/typed conversions
//! - **Store backend abstraction** ([`backend`]) - Traits a concrete store implements to plug in
//! - **Query descriptors** ([`query`]) - Find queries, aggregation pipelines and a filter builder
//! - **Collection handles** ([`collection`]) - Get-or-create resolution and per-collection operations
//! - **Configuration** ([`config`]) - Host, port, database and out-of-band credentials
//! - **Ingestion** ([`ingest`]) - JSON-Lines parsing for bulk loads
//! - **Error handling** ([`error`]) - The error taxonomy shared by every crate
//!
//! # Example
//!
//! ```ignore
//! use docstore_core::{collection::CollectionHandle, ingest::JsonLines, query::Pipeline};
//! use bson::doc;
//!
//! let records = JsonLines::parse("{\"name\":\"A\"}\n{\"name\":\"B\"}")?;
//! let people = CollectionHandle::resolve("people", &backend).await?;
//! people.insert_many(records.into_documents()).await?;
//!
//! let counted = people
//!     .aggregate(Pipeline::new().stage(doc! { "$count": "n" }))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstore_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod query;
