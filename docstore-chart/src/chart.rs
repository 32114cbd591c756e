//! Grouped bar chart model.
//!
//! A [`BarChart`] is built from tabular query results: one field names the x-axis
//! category, one the bar height and one the series (bar color). Categories and series
//! appear in the order they are first seen; repeated (category, series) pairs add up.

use bson::Bson;
use serde::{Deserialize, Serialize};

use docstore_core::{
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Which document fields feed which chart role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub x_field: String,
    pub y_field: String,
    pub color_field: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl ChartSpec {
    pub fn new(x_field: impl Into<String>, y_field: impl Into<String>, color_field: impl Into<String>) -> Self {
        Self {
            x_field: x_field.into(),
            y_field: y_field.into(),
            color_field: color_field.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The configured title, or one derived from the field names.
    pub fn resolved_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("{} by {} and {}", self.y_field, self.x_field, self.color_field))
    }
}

/// One colored series; `values[i]` is the bar for category `i`, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    values: Vec<Option<f64>>,
}

impl Series {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    title: String,
    x_label: String,
    y_label: String,
    categories: Vec<String>,
    series: Vec<Series>,
}

impl BarChart {
    /// Builds a chart from query results.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Render`] naming the record index and field when an x or
    /// color value is missing or not a scalar, or a y value is missing or not numeric.
    pub fn from_documents(documents: &[Document], spec: &ChartSpec) -> DocumentStoreResult<Self> {
        let mut chart = BarChart {
            title: spec.resolved_title(),
            x_label: spec.x_field.clone(),
            y_label: spec.y_field.clone(),
            categories: Vec::new(),
            series: Vec::new(),
        };

        for (index, document) in documents.iter().enumerate() {
            let category = label(document, index, &spec.x_field)?;
            let series = label(document, index, &spec.color_field)?;
            let value = number(document, index, &spec.y_field)?;

            chart.add(category, series, value);
        }

        Ok(chart)
    }

    fn add(&mut self, category: String, series: String, value: f64) {
        let category_index = match self.categories.iter().position(|existing| *existing == category) {
            Some(index) => index,
            None => {
                self.categories.push(category);
                for series in &mut self.series {
                    series.values.push(None);
                }
                self.categories.len() - 1
            }
        };

        let series_index = match self.series.iter().position(|existing| existing.name == series) {
            Some(index) => index,
            None => {
                self.series.push(Series {
                    name: series,
                    values: vec![None; self.categories.len()],
                });
                self.series.len() - 1
            }
        };

        let slot = &mut self.series[series_index].values[category_index];
        *slot = Some(slot.unwrap_or(0.0) + value);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn x_label(&self) -> &str {
        &self.x_label
    }

    pub fn y_label(&self) -> &str {
        &self.y_label
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Smallest and largest bar heights, or `None` for an empty chart.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.series
            .iter()
            .flat_map(|series| series.values.iter().flatten())
            .fold(None, |range, value| match range {
                None => Some((*value, *value)),
                Some((low, high)) => Some((low.min(*value), high.max(*value))),
            })
    }
}

fn label(document: &Document, index: usize, field: &str) -> DocumentStoreResult<String> {
    match document.get_path(field) {
        Some(Bson::String(value)) => Ok(value.clone()),
        Some(Bson::Int32(value)) => Ok(value.to_string()),
        Some(Bson::Int64(value)) => Ok(value.to_string()),
        Some(Bson::Double(value)) => Ok(value.to_string()),
        Some(Bson::Boolean(value)) => Ok(value.to_string()),
        Some(other) => Err(DocumentStoreError::Render(format!(
            "record {index}: field '{field}' must be a string, number or boolean, found {:?}",
            other.element_type()
        ))),
        None => Err(DocumentStoreError::Render(format!(
            "record {index}: missing field '{field}'"
        ))),
    }
}

fn number(document: &Document, index: usize, field: &str) -> DocumentStoreResult<f64> {
    match document.get_path(field) {
        Some(Bson::Int32(value)) => Ok(*value as f64),
        Some(Bson::Int64(value)) => Ok(*value as f64),
        Some(Bson::Double(value)) => Ok(*value),
        Some(other) => Err(DocumentStoreError::Render(format!(
            "record {index}: field '{field}' must be numeric, found {:?}",
            other.element_type()
        ))),
        None => Err(DocumentStoreError::Render(format!(
            "record {index}: missing field '{field}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn spec() -> ChartSpec {
        ChartSpec::new("borough", "count", "cuisine")
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let rows = vec![
            doc! { "borough": "Queens", "cuisine": "Pizza", "count": 3 },
            doc! { "borough": "Bronx", "cuisine": "Bakery", "count": 2_i64 },
            doc! { "borough": "Bronx", "cuisine": "Pizza", "count": 1.5 },
        ];

        let chart = BarChart::from_documents(&rows, &spec()).unwrap();
        assert_eq!(chart.categories(), ["Queens", "Bronx"]);
        assert_eq!(chart.series()[0].name(), "Pizza");
        assert_eq!(chart.series()[0].values(), [Some(3.0), Some(1.5)]);
        assert_eq!(chart.series()[1].name(), "Bakery");
        assert_eq!(chart.series()[1].values(), [None, Some(2.0)]);
        assert_eq!(chart.value_range(), Some((1.5, 3.0)));
        assert_eq!(chart.title(), "count by borough and cuisine");
    }

    #[test]
    fn duplicate_pairs_are_summed() {
        let rows = vec![
            doc! { "borough": "Bronx", "cuisine": "Bakery", "count": 2 },
            doc! { "borough": "Bronx", "cuisine": "Bakery", "count": 5 },
        ];

        let chart = BarChart::from_documents(&rows, &spec().with_title("Restaurants")).unwrap();
        assert_eq!(chart.series()[0].values(), [Some(7.0)]);
        assert_eq!(chart.title(), "Restaurants");
    }

    #[test]
    fn scalar_labels_and_nested_fields() {
        let rows = vec![doc! { "_id": { "year": 2024 }, "open": true, "total": 4 }];
        let chart = BarChart::from_documents(&rows, &ChartSpec::new("_id.year", "total", "open")).unwrap();
        assert_eq!(chart.categories(), ["2024"]);
        assert_eq!(chart.series()[0].name(), "true");
    }

    #[test]
    fn missing_field_names_record_and_field() {
        let rows = vec![
            doc! { "borough": "Bronx", "cuisine": "Bakery", "count": 2 },
            doc! { "borough": "Bronx", "count": 1 },
        ];

        let err = BarChart::from_documents(&rows, &spec()).unwrap_err();
        match err {
            DocumentStoreError::Render(message) => {
                assert!(message.contains("record 1"), "{message}");
                assert!(message.contains("cuisine"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_y_is_rejected() {
        let rows = vec![doc! { "borough": "Bronx", "cuisine": "Bakery", "count": "two" }];
        let err = BarChart::from_documents(&rows, &spec()).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Render(ref message) if message.contains("numeric")));
    }

    #[test]
    fn non_scalar_label_is_rejected() {
        let rows = vec![doc! { "borough": ["Bronx"], "cuisine": "Bakery", "count": 1 }];
        let err = BarChart::from_documents(&rows, &spec()).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Render(ref message) if message.contains("borough")));
    }

    #[test]
    fn empty_results_make_an_empty_chart() {
        let chart = BarChart::from_documents(&[], &spec()).unwrap();
        assert!(chart.is_empty());
        assert_eq!(chart.value_range(), None);
    }
}
