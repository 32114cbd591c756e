//! Grouped bar charts over query results.
//!
//! [`BarChart::from_documents`] turns tabular documents (for example the output of a
//! `$group` / `$project` pipeline) into a chart model; a [`ChartRenderer`] shows it or
//! writes it to an image file.
//!
//! ```ignore
//! use docstore_chart::{BarChart, ChartRenderer, ChartSpec, PlottersRenderer};
//!
//! let spec = ChartSpec::new("borough", "count", "cuisine").with_title("Restaurants per borough");
//! let chart = BarChart::from_documents(&rows, &spec)?;
//! PlottersRenderer::new().save(&chart, Path::new("restaurants.png"))?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstore_chart;

pub mod chart;
pub mod render;

pub use chart::{BarChart, ChartSpec, Series};
pub use render::{ChartRenderer, ImageFormat, PlottersRenderer};
