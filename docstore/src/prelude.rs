//! Convenient re-exports of commonly used types from docstore.
//!
//! ```ignore
//! use docstore::prelude::*;
//! ```

pub use docstore_chart::{ChartRenderer, ChartSpec};
pub use docstore_core::{
    backend::{StoreBackend, StoreConnector},
    collection::CollectionHandle,
    config::{ClientConfig, Credentials},
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    ingest::JsonLines,
    query::{Expr, FieldOp, Filter, FindQuery, Pipeline, QueryVisitor},
};

pub use crate::client::StoreClient;
