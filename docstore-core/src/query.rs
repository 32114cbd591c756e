//! Query descriptors passed through to the store.
//!
//! Two shapes of query exist:
//!
//! - [`FindQuery`] - a filter document, an optional projection and a result cap, for point lookups
//! - [`Pipeline`] - an ordered list of aggregation stage documents
//!
//! Both are opaque payloads: nothing here validates operators or stage shapes, the store does.
//!
//! For callers that prefer not to spell filter documents by hand, [`Filter`] builds an [`Expr`]
//! tree that renders to an ordinary filter document:
//!
//! ```ignore
//! use docstore::query::{Filter, FindQuery};
//!
//! let query = FindQuery::builder()
//!     .filter(Filter::eq("borough", "Queens").and(Filter::gte("grade", 3)))
//!     .projection(doc! { "name": 1, "_id": 0 })
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, doc};
use serde_json::Value;

use crate::{
    document::{Document, DocumentExt, json_kind},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A filtered lookup: filter, optional projection and result cap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// Filter document; empty matches every document.
    pub filter: Document,
    /// Field projection; `None` or an empty document returns whole documents.
    pub projection: Option<Document>,
    /// Maximum number of documents to return. `None` and `Some(0)` both mean no cap.
    pub limit: Option<usize>,
}

impl FindQuery {
    /// Creates a query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> FindQueryBuilder {
        FindQueryBuilder::new()
    }

    /// The effective cap, with `0` folded into "no cap".
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }

    /// The projection, with an empty document folded into "no projection".
    pub fn effective_projection(&self) -> Option<&Document> {
        self.projection
            .as_ref()
            .filter(|projection| !projection.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindQueryBuilder {
    query: FindQuery,
}

impl FindQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter, either a raw document or an [`Expr`].
    pub fn filter(mut self, filter: impl Into<Document>) -> Self {
        self.query.filter = filter.into();
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.query.projection = Some(projection);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn build(self) -> FindQuery {
        self.query
    }
}

/// An ordered sequence of aggregation stages.
///
/// Stages are passed to the store verbatim; ordering of the result is whatever the final
/// stage produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Document>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    pub fn stage(mut self, stage: Document) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parses a JSON array of stage objects.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the value is not an array of objects.
    pub fn from_json(value: Value) -> DocumentStoreResult<Self> {
        match value {
            Value::Array(stages) => Ok(Self {
                stages: stages
                    .into_iter()
                    .map(Document::from_json)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            }),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "a pipeline must be a JSON array, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn stages(&self) -> &[Document] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Document> {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The leading key of each stage (`$match`, `$group`, ...), for logging.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .map(|stage| stage.keys().next().map(String::as_str).unwrap_or("<empty>"))
            .collect()
    }
}

impl From<Vec<Document>> for Pipeline {
    fn from(stages: Vec<Document>) -> Self {
        Self { stages }
    }
}

impl FromIterator<Document> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        Self { stages: iter.into_iter().collect() }
    }
}

/// Operators the typed builder can place on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
}

impl FieldOp {
    pub fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::In => "$in",
            FieldOp::Nin => "$nin",
            FieldOp::Exists => "$exists",
        }
    }
}

/// Typed shorthand for a filter document. It adds no semantics of its own: every node maps
/// to one `$`-operator of the store's filter syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Field { field: String, op: FieldOp, value: Bson },
}

impl Expr {
    pub fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Expr::Field { field: field.into(), op, value: value.into() }
    }

    /// Appends to an existing `And` rather than nesting one.
    pub fn and(self, other: Expr) -> Self {
        let mut clauses = match self {
            Expr::And(clauses) => clauses,
            single => vec![single],
        };
        clauses.push(other);
        Expr::And(clauses)
    }

    /// Appends to an existing `Or` rather than nesting one.
    pub fn or(self, other: Expr) -> Self {
        let mut clauses = match self {
            Expr::Or(clauses) => clauses,
            single => vec![single],
        };
        clauses.push(other);
        Expr::Or(clauses)
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

macro_rules! comparisons {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
                Expr::field(field, FieldOp::$op, value)
            }
        )*
    };
}

/// Entry points for [`Expr`].
pub struct Filter;

impl Filter {
    comparisons! {
        eq => Eq,
        ne => Ne,
        gt => Gt,
        gte => Gte,
        lt => Lt,
        lte => Lte,
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::field(field, FieldOp::Exists, true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::field(field, FieldOp::Exists, false)
    }

    /// Field equals one of `values` (`$in`).
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(field, FieldOp::In, values.into_iter().map(Into::into).collect::<Vec<Bson>>())
    }

    /// Field equals none of `values` (`$nin`).
    pub fn none_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(field, FieldOp::Nin, values.into_iter().map(Into::into).collect::<Vec<Bson>>())
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

/// Walks an [`Expr`] tree bottom-up.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    /// `operator` is `$and` or `$or`.
    fn visit_logical(&mut self, operator: &'static str, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_logical("$and", exprs),
            Expr::Or(exprs) => self.visit_logical("$or", exprs),
            Expr::Not(inner) => self.visit_not(inner),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

/// Renders an [`Expr`] tree into the store's filter document syntax.
pub struct FilterRenderer;

impl QueryVisitor for FilterRenderer {
    type Output = Document;
    type Error = std::convert::Infallible;

    fn visit_logical(&mut self, operator: &'static str, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        let clauses = exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(doc! { operator: clauses })
    }

    // `$not` only applies to field operators, so whole expressions negate through `$nor`.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        let inner = self.visit_expr(expr)?;

        Ok(doc! { "$nor": [inner] })
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! { field: { op.operator(): value.clone() } })
    }
}

impl From<Expr> for Document {
    fn from(expr: Expr) -> Self {
        match FilterRenderer.visit_expr(&expr) {
            Ok(document) => document,
            Err(never) => match never {},
        }
    }
}

impl From<std::convert::Infallible> for DocumentStoreError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}
