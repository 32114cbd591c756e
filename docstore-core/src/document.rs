//! Document representation and conversion helpers.
//!
//! Documents are schema-less, order-preserving key/value mappings. The crate uses
//! [`bson::Document`] directly so values carry the store's full type set (strings,
//! numbers, booleans, null, arrays, nested documents, object ids, dates) while still
//! converting losslessly to and from JSON objects.

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, to_value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A schema-less, order-preserving document.
pub type Document = bson::Document;

/// Extension trait for converting documents between formats.
///
/// Implemented for [`Document`].
pub trait DocumentExt: Sized {
    /// Builds a document from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the value is not a JSON object,
    /// or a serialization error if a value has no BSON representation (e.g. `u64::MAX`).
    fn from_json(value: Value) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Serializes any serde value into a document.
    fn from_serializable<T: Serialize>(value: &T) -> DocumentStoreResult<Self>;

    /// Decodes this document into a typed value.
    fn decode<T: DeserializeOwned>(&self) -> DocumentStoreResult<T>;

    /// Looks up a value by dotted path (`"address.city"`), descending through nested documents.
    fn get_path(&self, path: &str) -> Option<&Bson>;
}

impl DocumentExt for Document {
    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        if !value.is_object() {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        }

        Self::from_serializable(&value)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_serializable<T: Serialize>(value: &T) -> DocumentStoreResult<Self> {
        match serialize_to_bson(value)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a document, found {:?}",
                other.element_type()
            ))),
        }
    }

    fn decode<T: DeserializeOwned>(&self) -> DocumentStoreResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.clone()))?)
    }

    fn get_path(&self, path: &str) -> Option<&Bson> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;

        for segment in segments {
            current = current.as_document()?.get(segment)?;
        }

        Some(current)
    }
}

/// Human readable name of a JSON value's kind, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
