//! Filter and projection evaluation for in-memory documents.
//!
//! Filters use the store's query document syntax: implicit equality, dotted paths, the
//! comparison operators (`$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`), membership (`$in`,
//! `$nin`), `$exists`, `$size`, field-level `$not`, and top-level `$and` / `$or` / `$nor`.

use std::cmp::Ordering;
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docstore_core::error::{DocumentStoreError, DocumentStoreResult};


/// Comparable view of a BSON value.
///
/// Numbers of every width normalize to `f64`. Documents compare field by field in order.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null, missing, and any type without a useful ordering
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the store's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
        }
    }

    /// Total order used for sorting: by type rank first, then by value.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Map(a), Comparable::Map(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.total_cmp(vb)))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self
                .rank()
                .cmp(&other.rank())
                .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal)),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Compares two possibly-missing values in sort order; missing sorts as null.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    left.total_cmp(&right)
}

/// Value equality with numeric widths folded together.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Truthiness of flag values such as projection switches and `$exists` operands.
pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Collects every value reachable at a dotted path, descending into arrays of documents.
/// An empty result means the field is missing.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut found = Vec::new();

    if let Some(value) = document.get(segments[0]) {
        collect_path(value, &segments[1..], &mut found);
    }

    found
}

fn collect_path<'a>(value: &'a Bson, segments: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((segment, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(next) = doc.get(*segment) {
                collect_path(next, rest, found);
            }
        }
        Bson::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(next) = items.get(index) {
                    collect_path(next, rest, found);
                }
            }
            Err(_) => {
                for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                    collect_path(item, segments, found);
                }
            }
        },
        _ => {}
    }
}

/// First value at a dotted path without array traversal; used by expressions and sorting.
pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(doc) => doc.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Writes `value` at a dotted path, creating intermediate documents.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

/// Removes the value at a dotted path, if present.
pub(crate) fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

/// Matches documents against a filter document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Query`] for unknown operators or malformed operands.
    pub fn matches(&self, filter: &Document) -> DocumentStoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in clauses(key, condition)? {
                        if !self.matches(clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => self.any_clause(key, condition)?,
                "$nor" => !self.any_clause(key, condition)?,
                operator if operator.starts_with('$') => {
                    return Err(DocumentStoreError::Query(format!(
                        "unknown top level operator: {operator}"
                    )));
                }
                path => matches_condition(&lookup(self.document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any_clause(&self, key: &str, condition: &Bson) -> DocumentStoreResult<bool> {
        for clause in clauses(key, condition)? {
            if self.matches(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Keeps the documents matching `filter`, preserving order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }
}

/// Checks every operator and operand shape in `filter` without matching a document, so a
/// malformed filter fails the same way on an empty collection as on a full one.
pub(crate) fn validate_filter(filter: &Document) -> DocumentStoreResult<()> {
    for (key, condition) in filter {
        match key.as_str() {
            "$and" | "$or" | "$nor" => {
                for clause in clauses(key, condition)? {
                    validate_filter(clause)?;
                }
            }
            operator if operator.starts_with('$') => {
                return Err(DocumentStoreError::Query(format!(
                    "unknown top level operator: {operator}"
                )));
            }
            _ => validate_condition(condition)?,
        }
    }

    Ok(())
}

fn validate_condition(condition: &Bson) -> DocumentStoreResult<()> {
    let Bson::Document(operators) = condition else {
        return Ok(());
    };
    if !is_operator_document(operators) {
        return Ok(());
    }

    for (operator, operand) in operators {
        apply_operator(&[], operator, operand)?;
        if operator == "$not" {
            validate_condition(operand)?;
        }
    }

    Ok(())
}

fn clauses<'b>(operator: &str, condition: &'b Bson) -> DocumentStoreResult<Vec<&'b Document>> {
    let invalid = || DocumentStoreError::Query(format!("{operator} must be a nonempty array of documents"));

    match condition {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| item.as_document().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn matches_condition(candidates: &[&Bson], condition: &Bson) -> DocumentStoreResult<bool> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (operator, operand) in operators {
                if !apply_operator(candidates, operator, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(equals_any(candidates, condition)),
    }
}

// A missing field equals null; an array field equals a value it contains.
fn equals_any(candidates: &[&Bson], operand: &Bson) -> bool {
    if candidates.is_empty() {
        return matches!(operand, Bson::Null);
    }

    candidates.iter().any(|value| {
        values_equal(value, operand)
            || matches!(value, Bson::Array(items) if items.iter().any(|item| values_equal(item, operand)))
    })
}

fn compares(value: &Bson, operator: &str, operand: &Bson) -> bool {
    if let Bson::Array(items) = value {
        if items.iter().any(|item| compares(item, operator, operand)) {
            return true;
        }
    }

    match Comparable::from(value).partial_cmp(&Comparable::from(operand)) {
        Some(ordering) => match operator {
            "$gt" => ordering == Ordering::Greater,
            "$gte" => ordering != Ordering::Less,
            "$lt" => ordering == Ordering::Less,
            "$lte" => ordering != Ordering::Greater,
            _ => false,
        },
        None => false,
    }
}

fn apply_operator(candidates: &[&Bson], operator: &str, operand: &Bson) -> DocumentStoreResult<bool> {
    match operator {
        "$eq" => Ok(equals_any(candidates, operand)),
        "$ne" => Ok(!equals_any(candidates, operand)),
        "$gt" | "$gte" | "$lt" | "$lte" => Ok(candidates
            .iter()
            .any(|value| compares(value, operator, operand))),
        "$in" => Ok(array_operand(operator, operand)?
            .iter()
            .any(|option| equals_any(candidates, option))),
        "$nin" => Ok(!array_operand(operator, operand)?
            .iter()
            .any(|option| equals_any(candidates, option))),
        "$exists" => Ok(!candidates.is_empty() == truthy(operand)),
        "$size" => {
            let size = match operand {
                Bson::Int32(n) if *n >= 0 => *n as usize,
                Bson::Int64(n) if *n >= 0 => *n as usize,
                _ => {
                    return Err(DocumentStoreError::Query(
                        "$size needs a non-negative integer".to_string(),
                    ));
                }
            };
            Ok(candidates
                .iter()
                .any(|value| matches!(value, Bson::Array(items) if items.len() == size)))
        }
        "$not" => match operand {
            Bson::Document(inner) if is_operator_document(inner) => {
                Ok(!matches_condition(candidates, operand)?)
            }
            _ => Err(DocumentStoreError::Query("$not needs an operator document".to_string())),
        },
        other => Err(DocumentStoreError::Query(format!("unknown operator: {other}"))),
    }
}

fn array_operand<'b>(operator: &str, operand: &'b Bson) -> DocumentStoreResult<&'b Vec<Bson>> {
    operand
        .as_array()
        .ok_or_else(|| DocumentStoreError::Query(format!("{operator} needs an array")))
}

/// A parsed inclusion or exclusion projection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    Include { id: bool, paths: Vec<String> },
    Exclude { paths: Vec<String> },
}

impl Projection {
    /// Parses a find projection, where every value is a `0/1/true/false` switch.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Query`] for non-switch values or when inclusion and
    /// exclusion are mixed (other than excluding `_id`).
    pub fn parse(spec: &Document) -> DocumentStoreResult<Self> {
        for (field, value) in spec {
            if !matches!(value, Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                return Err(DocumentStoreError::Query(format!(
                    "unsupported projection value for field '{field}'"
                )));
            }
        }

        Self::from_switches(
            spec.iter()
                .map(|(field, value)| (field.as_str(), truthy(value))),
        )
    }

    /// Builds a projection from `(path, included)` switches.
    pub fn from_switches<'s>(switches: impl IntoIterator<Item = (&'s str, bool)>) -> DocumentStoreResult<Self> {
        let mut id = true;
        let mut included = Vec::new();
        let mut excluded = Vec::new();

        for (path, include) in switches {
            match (path, include) {
                ("_id", flag) => id = flag,
                (path, true) => included.push(path.to_string()),
                (path, false) => excluded.push(path.to_string()),
            }
        }

        match (included.is_empty(), excluded.is_empty()) {
            (false, false) => Err(DocumentStoreError::Query(format!(
                "Cannot do exclusion on field {} in inclusion projection",
                excluded[0]
            ))),
            (false, true) => Ok(Projection::Include { id, paths: included }),
            (true, _) if !excluded.is_empty() || !id => {
                if !id {
                    excluded.push("_id".to_string());
                }
                Ok(Projection::Exclude { paths: excluded })
            }
            (true, _) => Ok(Projection::Include { id: true, paths: vec![] }),
        }
    }

    /// Applies the projection, keeping the source document's field order.
    pub fn apply(&self, document: &Document) -> Document {
        match self {
            Projection::Include { id, paths } => {
                let mut projected = include_paths(document, paths);
                if *id {
                    if let Some(value) = document.get("_id") {
                        let mut with_id = Document::new();
                        with_id.insert("_id", value.clone());
                        for (key, value) in projected {
                            with_id.insert(key, value);
                        }
                        projected = with_id;
                    }
                }
                projected
            }
            Projection::Exclude { paths } => {
                let mut projected = document.clone();
                for path in paths {
                    remove_path(&mut projected, path);
                }
                projected
            }
        }
    }
}

fn include_paths(document: &Document, paths: &[String]) -> Document {
    let mut projected = Document::new();

    for (key, value) in document {
        if key == "_id" {
            continue;
        }

        if paths.iter().any(|path| path == key) {
            projected.insert(key.clone(), value.clone());
            continue;
        }

        let prefix = format!("{key}.");
        let nested: Vec<String> = paths
            .iter()
            .filter_map(|path| path.strip_prefix(&prefix).map(str::to_string))
            .collect();

        if nested.is_empty() {
            continue;
        }

        match value {
            Bson::Document(child) => {
                projected.insert(key.clone(), include_paths(child, &nested));
            }
            Bson::Array(items) => {
                let narrowed: Vec<Bson> = items
                    .iter()
                    .filter_map(|item| item.as_document())
                    .map(|child| Bson::Document(include_paths(child, &nested)))
                    .collect();
                projected.insert(key.clone(), narrowed);
            }
            _ => {}
        }
    }

    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn restaurant() -> Document {
        doc! {
            "_id": 7,
            "name": "Morris Park Bake Shop",
            "borough": "Bronx",
            "cuisine": "Bakery",
            "stars": 4.5,
            "tags": ["bread", "cake"],
            "address": { "zipcode": "10462", "building": "1007" },
            "grades": [{ "grade": "A", "score": 2 }, { "grade": "B", "score": 14 }],
        }
    }

    fn matches(filter: Document) -> bool {
        DocumentEvaluator::new(&restaurant()).matches(&filter).unwrap()
    }

    #[test]
    fn implicit_equality_and_dotted_paths() {
        assert!(matches(doc! { "borough": "Bronx" }));
        assert!(!matches(doc! { "borough": "Queens" }));
        assert!(matches(doc! { "address.zipcode": "10462" }));
        assert!(matches(doc! { "grades.grade": "B" }));
        assert!(matches(doc! { "grades.0.score": 2 }));
        assert!(matches(doc! {}));
    }

    #[test]
    fn array_fields_match_on_elements() {
        assert!(matches(doc! { "tags": "cake" }));
        assert!(matches(doc! { "tags": ["bread", "cake"] }));
        assert!(!matches(doc! { "tags": "pie" }));
    }

    #[test]
    fn comparison_operators_fold_numeric_widths() {
        assert!(matches(doc! { "stars": { "$gt": 4_i64 } }));
        assert!(matches(doc! { "stars": { "$gte": 4.5, "$lt": 5 } }));
        assert!(!matches(doc! { "stars": { "$lte": 4 } }));
        assert!(matches(doc! { "grades.score": { "$gt": 10 } }));
        assert!(!matches(doc! { "name": { "$gt": 3 } }));
    }

    #[test]
    fn membership_and_existence() {
        assert!(matches(doc! { "cuisine": { "$in": ["Pizza", "Bakery"] } }));
        assert!(matches(doc! { "cuisine": { "$nin": ["Pizza"] } }));
        assert!(matches(doc! { "phone": { "$exists": false } }));
        assert!(matches(doc! { "phone": null }));
        assert!(matches(doc! { "phone": { "$ne": "555" } }));
        assert!(matches(doc! { "tags": { "$size": 2 } }));
        assert!(!matches(doc! { "name": { "$exists": 0 } }));
    }

    #[test]
    fn logical_operators() {
        assert!(matches(doc! { "$or": [{ "borough": "Queens" }, { "cuisine": "Bakery" }] }));
        assert!(!matches(doc! { "$and": [{ "borough": "Bronx" }, { "cuisine": "Pizza" }] }));
        assert!(matches(doc! { "$nor": [{ "borough": "Queens" }] }));
        assert!(matches(doc! { "stars": { "$not": { "$lt": 3 } } }));
    }

    #[test]
    fn malformed_filters_are_query_errors() {
        let document = restaurant();
        let evaluator = DocumentEvaluator::new(&document);

        for filter in [
            doc! { "name": { "$regexx": "x" } },
            doc! { "$where": "true" },
            doc! { "$or": [] },
            doc! { "cuisine": { "$in": "Bakery" } },
            doc! { "stars": { "$not": 4 } },
        ] {
            let err = evaluator.matches(&filter).unwrap_err();
            assert!(matches!(err, DocumentStoreError::Query(_)), "{filter}: {err:?}");
            assert!(validate_filter(&filter).is_err(), "{filter}");
        }
    }

    #[test]
    fn validation_reaches_clauses_matching_skips() {
        for filter in [
            doc! { "$and": [{ "borough": "Queens" }, { "stars": { "$bogus": 1 } }] },
            doc! { "$or": [{ "borough": "Bronx" }, { "stars": { "$size": -1 } }] },
            doc! { "stars": { "$gt": 100, "$near": 1 } },
            doc! { "stars": { "$not": { "$gt": 100, "$near": 1 } } },
        ] {
            assert!(validate_filter(&filter).is_err(), "{filter}");
        }

        assert!(validate_filter(&doc! { "address.zipcode": "10462", "stars": { "$gte": 3 } }).is_ok());
        assert!(validate_filter(&doc! { "address": { "zipcode": "10462" } }).is_ok());
    }

    #[test]
    fn inclusion_projection_keeps_id_and_source_order() {
        let projection = Projection::parse(&doc! { "cuisine": 1, "name": true }).unwrap();
        assert_eq!(
            projection.apply(&restaurant()),
            doc! { "_id": 7, "name": "Morris Park Bake Shop", "cuisine": "Bakery" }
        );
    }

    #[test]
    fn inclusion_projection_of_nested_fields() {
        let projection = Projection::parse(&doc! { "address.zipcode": 1, "grades.grade": 1, "_id": 0 }).unwrap();
        assert_eq!(
            projection.apply(&restaurant()),
            doc! {
                "address": { "zipcode": "10462" },
                "grades": [{ "grade": "A" }, { "grade": "B" }],
            }
        );
    }

    #[test]
    fn exclusion_projection() {
        let projection = Projection::parse(&doc! { "grades": 0, "address.building": 0, "_id": false }).unwrap();
        let projected = projection.apply(&restaurant());
        assert!(!projected.contains_key("_id"));
        assert!(!projected.contains_key("grades"));
        assert_eq!(projected.get("address"), Some(&Bson::Document(doc! { "zipcode": "10462" })));
        assert_eq!(projected.get("name"), Some(&Bson::String("Morris Park Bake Shop".into())));
    }

    #[test]
    fn mixed_projection_is_rejected() {
        let err = Projection::parse(&doc! { "name": 1, "grades": 0 }).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Query(ref msg) if msg.contains("grades")));

        let err = Projection::parse(&doc! { "name": "$name" }).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Query(_)));
    }

    #[test]
    fn sort_order_ranks_types() {
        let null = Bson::Null;
        let number = Bson::Int32(10);
        let string = Bson::String("a".into());
        assert_eq!(compare_values(None, Some(&number)), Ordering::Less);
        assert_eq!(compare_values(Some(&null), None), Ordering::Equal);
        assert_eq!(compare_values(Some(&number), Some(&string)), Ordering::Less);
        assert_eq!(
            compare_values(Some(&Bson::Double(2.5)), Some(&Bson::Int64(2))),
            Ordering::Greater
        );
    }

    #[test]
    fn set_and_remove_paths() {
        let mut document = doc! { "a": 1 };
        set_path(&mut document, "b.c", Bson::Int32(2));
        assert_eq!(document, doc! { "a": 1, "b": { "c": 2 } });
        remove_path(&mut document, "b.c");
        assert_eq!(document, doc! { "a": 1, "b": {} });
        assert_eq!(get_path(&restaurant(), "grades.1.score"), Some(&Bson::Int32(14)));
    }
}
