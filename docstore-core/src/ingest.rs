//! JSON-Lines parsing for bulk ingestion.
//!
//! A JSON-Lines source holds one JSON object per line rather than a single JSON array.
//! The parser splits the source on line breaks, drops blank lines, wraps the remaining
//! lines into one array and parses that array in a single pass. Parsing is all-or-nothing:
//! any malformed line fails the whole source, so nothing reaches the store.

use serde_json::Value;
use std::io::Read;

use crate::{
    document::{Document, DocumentExt, json_kind},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Parsed JSON-Lines records, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonLines {
    documents: Vec<Document>,
}

impl JsonLines {
    /// Parses a JSON-Lines source.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Format`] naming the first offending (1-based) line if a
    /// line is not valid JSON or is not a JSON object.
    pub fn parse(source: &str) -> DocumentStoreResult<Self> {
        let lines = non_blank_lines(source);

        if lines.is_empty() {
            return Ok(Self::default());
        }

        let wrapped = format!(
            "[{}]",
            lines
                .iter()
                .map(|(_, line)| *line)
                .collect::<Vec<_>>()
                .join(",")
        );

        let records = match serde_json::from_str::<Vec<Value>>(&wrapped) {
            Ok(records) if records.len() == lines.len() => records,
            // A line such as `1, 2` parses inside the array but shifts every record after it.
            Ok(_) | Err(_) => return Err(locate_error(&lines)),
        };

        let documents = records
            .into_iter()
            .zip(lines.iter())
            .map(|(record, (line_no, _))| match record {
                Value::Object(_) => Document::from_json(record)
                    .map_err(|err| DocumentStoreError::format(*line_no, err.to_string())),
                other => Err(DocumentStoreError::format(
                    *line_no,
                    format!("expected a JSON object, found {}", json_kind(&other)),
                )),
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(Self { documents })
    }

    /// Reads a UTF-8 source to the end and parses it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Io`] if reading fails (including invalid UTF-8), or
    /// [`DocumentStoreError::Format`] as for [`JsonLines::parse`].
    pub fn from_reader(mut reader: impl Read) -> DocumentStoreResult<Self> {
        let mut source = String::new();
        reader.read_to_string(&mut source)?;

        Self::parse(&source)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

impl IntoIterator for JsonLines {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

// (1-based line number, trimmed content) for every non-blank line.
fn non_blank_lines(source: &str) -> Vec<(usize, &str)> {
    source
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect()
}

// Re-parses line by line to name the first line that is not exactly one JSON value.
fn locate_error(lines: &[(usize, &str)]) -> DocumentStoreError {
    for (line_no, line) in lines {
        if let Err(err) = serde_json::from_str::<Value>(line) {
            return DocumentStoreError::format(*line_no, err.to_string());
        }
    }

    // Every line parses alone yet the array did not line up; only a stray separator does that.
    DocumentStoreError::format(
        lines.first().map(|(line_no, _)| *line_no).unwrap_or(1),
        "records must be separated by line breaks only",
    )
}
