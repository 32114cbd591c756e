//! Aggregation pipeline execution over in-memory documents.
//!
//! Supported stages: `$match`, `$project`, `$addFields` (alias `$set`), `$group`, `$sort`,
//! `$limit`, `$skip`, `$count` and `$unwind`. Group accumulators: `$sum`, `$avg`, `$min`,
//! `$max`, `$first`, `$last`, `$push`, `$addToSet` and `$count`.

use std::cmp::Ordering;
use bson::{Bson, Document};

use docstore_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::evaluator::{
    DocumentEvaluator,
    Projection,
    compare_values,
    get_path,
    set_path,
    truthy,
    validate_filter,
    values_equal,
};


/// Runs `stages` in order over `documents`.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Query`] for unknown stages, malformed stage arguments and
/// invalid expressions. Stage arguments are validated even when no documents flow through.
pub(crate) fn run_pipeline(stages: &[Document], documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    stages
        .iter()
        .try_fold(documents, |documents, stage| run_stage(stage, documents))
}

fn run_stage(stage: &Document, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    let mut entries = stage.iter();
    let (name, spec) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(DocumentStoreError::Query(
                "a pipeline stage specification object must contain exactly one field".to_string(),
            ));
        }
    };

    match name.as_str() {
        "$match" => {
            let filter = spec_document(name, spec)?;
            validate_filter(filter)?;
            DocumentEvaluator::filter_documents(documents.iter(), filter)
        }
        "$project" => project(spec_document(name, spec)?, documents),
        "$addFields" | "$set" => add_fields(spec_document(name, spec)?, documents),
        "$group" => group(spec_document(name, spec)?, documents),
        "$sort" => sort(spec_document(name, spec)?, documents),
        "$limit" => {
            let limit = positive_integer(name, spec)?;
            Ok(documents.into_iter().take(limit).collect())
        }
        "$skip" => {
            let skip = non_negative_integer(name, spec)?;
            Ok(documents.into_iter().skip(skip).collect())
        }
        "$count" => count(spec, documents),
        "$unwind" => unwind(spec, documents),
        other => Err(DocumentStoreError::Query(format!(
            "Unrecognized pipeline stage name: '{other}'"
        ))),
    }
}

fn spec_document<'a>(stage: &str, spec: &'a Bson) -> DocumentStoreResult<&'a Document> {
    spec.as_document()
        .ok_or_else(|| DocumentStoreError::Query(format!("the {stage} stage specification must be an object")))
}

fn integer(spec: &Bson) -> Option<i64> {
    match spec {
        Bson::Int32(n) => Some(*n as i64),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

fn positive_integer(stage: &str, spec: &Bson) -> DocumentStoreResult<usize> {
    match integer(spec) {
        Some(n) if n > 0 => Ok(n as usize),
        _ => Err(DocumentStoreError::Query(format!("the {stage} must be a positive integer"))),
    }
}

fn non_negative_integer(stage: &str, spec: &Bson) -> DocumentStoreResult<usize> {
    match integer(spec) {
        Some(n) if n >= 0 => Ok(n as usize),
        _ => Err(DocumentStoreError::Query(format!("the {stage} must be a non-negative integer"))),
    }
}

fn field_path(stage: &str, spec: &Bson) -> DocumentStoreResult<String> {
    match spec.as_str().and_then(|path| path.strip_prefix('$')) {
        Some(path) if !path.is_empty() && !path.starts_with('$') => Ok(path.to_string()),
        _ => Err(DocumentStoreError::Query(format!(
            "{stage} field path references must be prefixed with a '$'"
        ))),
    }
}

/// Numeric value with the store's width promotion: int, then long, then double.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i32),
    Long(i64),
    Double(f64),
}

impl Number {
    fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::Int32(n) => Some(Number::Int(*n)),
            Bson::Int64(n) => Some(Number::Long(*n)),
            Bson::Double(n) => Some(Number::Double(*n)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Long(n) => n as f64,
            Number::Double(n) => n,
        }
    }

    fn as_i64(self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(n as i64),
            Number::Long(n) => Some(n),
            Number::Double(_) => None,
        }
    }

    fn combine(
        self,
        other: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match int_op(a as i64, b as i64) {
                Some(n) => i32::try_from(n)
                    .map(Number::Int)
                    .unwrap_or(Number::Long(n)),
                None => Number::Double(float_op(a as f64, b as f64)),
            },
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => int_op(x, y)
                    .map(Number::Long)
                    .unwrap_or_else(|| Number::Double(float_op(x as f64, y as f64))),
                _ => Number::Double(float_op(a.as_f64(), b.as_f64())),
            },
        }
    }

    fn add(self, other: Number) -> Number {
        self.combine(other, i64::checked_add, |a, b| a + b)
    }

    fn subtract(self, other: Number) -> Number {
        self.combine(other, i64::checked_sub, |a, b| a - b)
    }

    fn multiply(self, other: Number) -> Number {
        self.combine(other, i64::checked_mul, |a, b| a * b)
    }

    fn from_count(count: usize) -> Number {
        i32::try_from(count)
            .map(Number::Int)
            .unwrap_or(Number::Long(count as i64))
    }
}

impl From<Number> for Bson {
    fn from(number: Number) -> Self {
        match number {
            Number::Int(n) => Bson::Int32(n),
            Number::Long(n) => Bson::Int64(n),
            Number::Double(n) => Bson::Double(n),
        }
    }
}

/// Evaluates an aggregation expression against `document`. `None` means missing.
fn evaluate(expression: &Bson, document: &Document) -> DocumentStoreResult<Option<Bson>> {
    match expression {
        Bson::String(reference) if reference == "$$ROOT" => Ok(Some(Bson::Document(document.clone()))),
        Bson::String(reference) if reference.starts_with("$$") => Err(undefined_variable(reference)),
        Bson::String(reference) if reference.starts_with('$') => {
            Ok(get_path(document, &reference[1..]).cloned())
        }
        Bson::Document(spec) if spec.keys().next().is_some_and(|key| key.starts_with('$')) => {
            evaluate_operator(spec, document)
        }
        Bson::Document(spec) => {
            let mut evaluated = Document::new();
            for (field, inner) in spec {
                if let Some(value) = evaluate(inner, document)? {
                    evaluated.insert(field.clone(), value);
                }
            }
            Ok(Some(Bson::Document(evaluated)))
        }
        Bson::Array(items) => items
            .iter()
            .map(|item| evaluate(item, document).map(|value| value.unwrap_or(Bson::Null)))
            .collect::<DocumentStoreResult<Vec<_>>>()
            .map(|values| Some(Bson::Array(values))),
        literal => Ok(Some(literal.clone())),
    }
}

fn undefined_variable(reference: &str) -> DocumentStoreError {
    DocumentStoreError::Query(format!("Use of undefined variable: {}", &reference[2..]))
}

fn expression_operator(spec: &Document) -> DocumentStoreResult<(&String, &Bson)> {
    let mut entries = spec.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(DocumentStoreError::Query(
            "an expression specification must contain exactly one field".to_string(),
        )),
    }
}

/// Checks variables, operator names and arities in `expression` without a document to
/// evaluate it against.
fn validate_expression(expression: &Bson) -> DocumentStoreResult<()> {
    match expression {
        Bson::String(reference) if reference.starts_with("$$") && reference != "$$ROOT" => {
            Err(undefined_variable(reference))
        }
        Bson::Document(spec) if spec.keys().next().is_some_and(|key| key.starts_with('$')) => {
            let (operator, operand) = expression_operator(spec)?;
            match operator.as_str() {
                "$literal" => return Ok(()),
                "$add" | "$multiply" | "$concat" | "$ifNull" => {}
                "$subtract" | "$divide" => {
                    if !matches!(operand, Bson::Array(items) if items.len() == 2) {
                        return Err(DocumentStoreError::Query(format!(
                            "{operator} takes exactly 2 arguments"
                        )));
                    }
                }
                other => {
                    return Err(DocumentStoreError::Query(format!(
                        "Unrecognized expression '{other}'"
                    )));
                }
            }
            validate_expression(operand)
        }
        Bson::Document(spec) => spec.values().try_for_each(validate_expression),
        Bson::Array(items) => items.iter().try_for_each(validate_expression),
        _ => Ok(()),
    }
}

fn evaluate_operator(spec: &Document, document: &Document) -> DocumentStoreResult<Option<Bson>> {
    let (operator, operand) = expression_operator(spec)?;

    if operator == "$literal" {
        return Ok(Some(operand.clone()));
    }

    let arguments = match operand {
        Bson::Array(items) => items
            .iter()
            .map(|item| evaluate(item, document))
            .collect::<DocumentStoreResult<Vec<_>>>()?,
        single => vec![evaluate(single, document)?],
    };

    match operator.as_str() {
        "$add" => fold_numbers(operator, arguments, Number::add),
        "$multiply" => fold_numbers(operator, arguments, Number::multiply),
        "$subtract" | "$divide" => {
            let [left, right] = <[Option<Bson>; 2]>::try_from(arguments).map_err(|_| {
                DocumentStoreError::Query(format!("{operator} takes exactly 2 arguments"))
            })?;
            let (left, right) = match (left, right) {
                (Some(left), Some(right)) if left != Bson::Null && right != Bson::Null => (left, right),
                _ => return Ok(Some(Bson::Null)),
            };
            let (left, right) = match (Number::from_bson(&left), Number::from_bson(&right)) {
                (Some(left), Some(right)) => (left, right),
                _ => {
                    return Err(DocumentStoreError::Query(format!(
                        "{operator} only supports numeric types"
                    )));
                }
            };
            if operator == "$subtract" {
                Ok(Some(left.subtract(right).into()))
            } else if right.as_f64() == 0.0 {
                Err(DocumentStoreError::Query("can't $divide by zero".to_string()))
            } else {
                Ok(Some(Bson::Double(left.as_f64() / right.as_f64())))
            }
        }
        "$concat" => {
            let mut joined = String::new();
            for argument in arguments {
                match argument {
                    Some(Bson::String(part)) => joined.push_str(&part),
                    None | Some(Bson::Null) => return Ok(Some(Bson::Null)),
                    Some(_) => {
                        return Err(DocumentStoreError::Query(
                            "$concat only supports strings".to_string(),
                        ));
                    }
                }
            }
            Ok(Some(Bson::String(joined)))
        }
        "$ifNull" => Ok(arguments
            .into_iter()
            .flatten()
            .find(|value| *value != Bson::Null)
            .or(Some(Bson::Null))),
        other => Err(DocumentStoreError::Query(format!(
            "Unrecognized expression '{other}'"
        ))),
    }
}

fn fold_numbers(
    operator: &str,
    arguments: Vec<Option<Bson>>,
    op: fn(Number, Number) -> Number,
) -> DocumentStoreResult<Option<Bson>> {
    let mut total: Option<Number> = None;

    for argument in arguments {
        let value = match argument {
            None | Some(Bson::Null) => return Ok(Some(Bson::Null)),
            Some(value) => value,
        };
        let number = Number::from_bson(&value).ok_or_else(|| {
            DocumentStoreError::Query(format!("{operator} only supports numeric types"))
        })?;
        total = Some(match total {
            Some(acc) => op(acc, number),
            None => number,
        });
    }

    Ok(Some(total.map(Bson::from).unwrap_or(Bson::Int32(0))))
}

/// `$project` switch or computed field.
enum ProjectField<'a> {
    Switch(&'a str, bool),
    Computed(&'a str, &'a Bson),
}

fn project(spec: &Document, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    if spec.is_empty() {
        return Err(DocumentStoreError::Query(
            "$project requires at least one output field".to_string(),
        ));
    }

    let fields: Vec<ProjectField> = spec
        .iter()
        .map(|(field, value)| match value {
            Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
                ProjectField::Switch(field.as_str(), truthy(value))
            }
            other => ProjectField::Computed(field.as_str(), other),
        })
        .collect();

    let switches: Vec<(&str, bool)> = fields
        .iter()
        .filter_map(|field| match field {
            ProjectField::Switch(path, include) => Some((*path, *include)),
            ProjectField::Computed(..) => None,
        })
        .collect();
    let computed: Vec<(&str, &Bson)> = fields
        .iter()
        .filter_map(|field| match field {
            ProjectField::Computed(path, expression) => Some((*path, *expression)),
            ProjectField::Switch(..) => None,
        })
        .collect();

    let projection = match Projection::from_switches(switches)? {
        // `{_id: 0, x: "$y"}` includes computed fields; only `_id` may be excluded next to them.
        Projection::Exclude { paths } if !computed.is_empty() => {
            if paths.iter().any(|path| path != "_id") {
                return Err(DocumentStoreError::Query(format!(
                    "Invalid $project: cannot use expressions in an exclusion projection ({})",
                    computed[0].0
                )));
            }
            Projection::Include { id: false, paths: vec![] }
        }
        projection => projection,
    };

    for (_, expression) in &computed {
        validate_expression(expression)?;
    }

    documents
        .into_iter()
        .map(|document| {
            let mut projected = projection.apply(&document);
            for (path, expression) in &computed {
                if let Some(value) = evaluate(expression, &document)? {
                    set_path(&mut projected, path, value);
                }
            }
            Ok(projected)
        })
        .collect()
}

fn add_fields(spec: &Document, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    spec.values().try_for_each(validate_expression)?;

    documents
        .into_iter()
        .map(|document| {
            let mut extended = document.clone();
            for (path, expression) in spec {
                if let Some(value) = evaluate(expression, &document)? {
                    set_path(&mut extended, path, value);
                }
            }
            Ok(extended)
        })
        .collect()
}

/// Running state of one group accumulator.
#[derive(Debug, Clone)]
enum Accumulator {
    Sum(Number),
    Avg { total: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
    Last(Bson),
    Push(Vec<Bson>),
    AddToSet(Vec<Bson>),
    Count(usize),
}

impl Accumulator {
    fn parse(field: &str, spec: &Bson) -> DocumentStoreResult<(Self, Bson)> {
        let invalid = || DocumentStoreError::Query(format!("The field '{field}' must be an accumulator object"));
        let spec = spec.as_document().ok_or_else(invalid)?;
        let mut entries = spec.iter();
        let (operator, argument) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(invalid()),
        };

        let accumulator = match operator.as_str() {
            "$sum" => Accumulator::Sum(Number::Int(0)),
            "$avg" => Accumulator::Avg { total: 0.0, count: 0 },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$first" => Accumulator::First(None),
            "$last" => Accumulator::Last(Bson::Null),
            "$push" => Accumulator::Push(vec![]),
            "$addToSet" => Accumulator::AddToSet(vec![]),
            "$count" => Accumulator::Count(0),
            other => {
                return Err(DocumentStoreError::Query(format!(
                    "unknown group operator '{other}'"
                )));
            }
        };

        Ok((accumulator, argument.clone()))
    }

    fn accumulate(&mut self, value: Option<Bson>) {
        match self {
            Accumulator::Sum(total) => {
                if let Some(number) = value.as_ref().and_then(Number::from_bson) {
                    *total = total.add(number);
                }
            }
            Accumulator::Avg { total, count } => {
                if let Some(number) = value.as_ref().and_then(Number::from_bson) {
                    *total += number.as_f64();
                    *count += 1;
                }
            }
            Accumulator::Min(current) => keep_extreme(current, value, Ordering::Less),
            Accumulator::Max(current) => keep_extreme(current, value, Ordering::Greater),
            Accumulator::First(first) => {
                if first.is_none() {
                    *first = Some(value.unwrap_or(Bson::Null));
                }
            }
            Accumulator::Last(last) => *last = value.unwrap_or(Bson::Null),
            Accumulator::Push(values) => {
                if let Some(value) = value {
                    values.push(value);
                }
            }
            Accumulator::AddToSet(values) => {
                if let Some(value) = value {
                    if !values.iter().any(|existing| values_equal(existing, &value)) {
                        values.push(value);
                    }
                }
            }
            Accumulator::Count(count) => *count += 1,
        }
    }

    fn finish(self) -> Bson {
        match self {
            Accumulator::Sum(total) => total.into(),
            Accumulator::Avg { count: 0, .. } => Bson::Null,
            Accumulator::Avg { total, count } => Bson::Double(total / count as f64),
            Accumulator::Min(value) | Accumulator::Max(value) => value.unwrap_or(Bson::Null),
            Accumulator::First(value) => value.unwrap_or(Bson::Null),
            Accumulator::Last(value) => value,
            Accumulator::Push(values) | Accumulator::AddToSet(values) => Bson::Array(values),
            Accumulator::Count(count) => Number::from_count(count).into(),
        }
    }
}

// Null and missing values never win `$min` / `$max`.
fn keep_extreme(current: &mut Option<Bson>, value: Option<Bson>, wanted: Ordering) {
    let Some(value) = value.filter(|value| *value != Bson::Null) else {
        return;
    };

    let replace = current
        .as_ref()
        .is_none_or(|existing| compare_values(Some(&value), Some(existing)) == wanted);
    if replace {
        *current = Some(value);
    }
}

fn group(spec: &Document, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    let key_expression = spec.get("_id").ok_or_else(|| {
        DocumentStoreError::Query("a group specification must include an _id".to_string())
    })?;
    validate_expression(key_expression)?;

    let mut template = Vec::new();
    for (field, accumulator) in spec.iter().filter(|(field, _)| field.as_str() != "_id") {
        if field.contains('.') {
            return Err(DocumentStoreError::Query(format!(
                "the group aggregate field name '{field}' cannot contain '.'"
            )));
        }
        let (accumulator, argument) = Accumulator::parse(field, accumulator)?;
        validate_expression(&argument)?;
        template.push((field.clone(), accumulator, argument));
    }

    // Groups keep first-seen order.
    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();

    for document in &documents {
        let key = evaluate(key_expression, document)?.unwrap_or(Bson::Null);
        let index = match groups.iter().position(|(existing, _)| values_equal(existing, &key)) {
            Some(index) => index,
            None => {
                groups.push((key, template.iter().map(|(_, accumulator, _)| accumulator.clone()).collect()));
                groups.len() - 1
            }
        };

        for (accumulator, (_, _, argument)) in groups[index].1.iter_mut().zip(template.iter()) {
            accumulator.accumulate(evaluate(argument, document)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut output = Document::new();
            output.insert("_id", key);
            for (accumulator, (field, _, _)) in accumulators.into_iter().zip(template.iter()) {
                output.insert(field.clone(), accumulator.finish());
            }
            output
        })
        .collect())
}

fn sort(spec: &Document, mut documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    if spec.is_empty() {
        return Err(DocumentStoreError::Query(
            "$sort stage must have at least one sort key".to_string(),
        ));
    }

    let keys = spec
        .iter()
        .map(|(field, direction)| match integer(direction) {
            Some(1) => Ok((field.as_str(), false)),
            Some(-1) => Ok((field.as_str(), true)),
            _ => Err(DocumentStoreError::Query(
                "$sort key ordering must be 1 (for ascending) or -1 (for descending)".to_string(),
            )),
        })
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|(field, descending)| {
                let ordering = compare_values(get_path(a, field), get_path(b, field));
                if *descending { ordering.reverse() } else { ordering }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    Ok(documents)
}

fn count(spec: &Bson, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    let field = match spec.as_str() {
        Some(field) if !field.is_empty() && !field.starts_with('$') && !field.contains('.') => field,
        _ => {
            return Err(DocumentStoreError::Query(
                "the $count field must be a non-empty string without '$' or '.'".to_string(),
            ));
        }
    };

    if documents.is_empty() {
        return Ok(vec![]);
    }

    let mut counted = Document::new();
    counted.insert(field, Bson::from(Number::from_count(documents.len())));

    Ok(vec![counted])
}

fn unwind(spec: &Bson, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    let (path, preserve) = match spec {
        Bson::String(_) => (field_path("$unwind", spec)?, false),
        Bson::Document(options) => {
            let path = options.get("path").ok_or_else(|| {
                DocumentStoreError::Query("$unwind requires a path".to_string())
            })?;
            let preserve = options
                .get("preserveNullAndEmptyArrays")
                .is_some_and(truthy);
            (field_path("$unwind", path)?, preserve)
        }
        _ => {
            return Err(DocumentStoreError::Query(
                "$unwind expects a string or an object".to_string(),
            ));
        }
    };

    let mut unwound = Vec::new();

    for document in documents {
        match get_path(&document, &path).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = document.clone();
                    set_path(&mut copy, &path, item);
                    unwound.push(copy);
                }
            }
            Some(Bson::Array(_)) | Some(Bson::Null) | None => {
                if preserve {
                    unwound.push(document);
                }
            }
            Some(_) => unwound.push(document),
        }
    }

    Ok(unwound)
}
