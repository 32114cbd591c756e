//! Chart output.

use std::{error::Error, ops::Range, path::Path, sync::OnceLock};
use plotters::{
    coord::Shift,
    prelude::*,
    style::{
        FontStyle,
        register_font,
        text_anchor::{HPos, Pos, VPos},
    },
};
use tracing::{debug, info};

use docstore_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::chart::BarChart;

const FONT_FAMILY: &str = "sans-serif";
static DEJAVU_SANS: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Registers the bundled face under [`FONT_FAMILY`]. Text layout needs it for every format,
/// and bitmap output cannot draw glyphs without it.
fn load_font() -> DocumentStoreResult<()> {
    static LOADED: OnceLock<Result<(), String>> = OnceLock::new();

    LOADED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, DEJAVU_SANS)
                .map_err(|_| "the bundled chart font could not be loaded".to_string())
        })
        .clone()
        .map_err(DocumentStoreError::Render)
}

/// Presents a [`BarChart`].
pub trait ChartRenderer: Send + Sync {
    /// Shows the chart to whoever watches the process.
    fn display(&self, chart: &BarChart) -> DocumentStoreResult<()>;

    /// Writes the chart as an image file.
    fn save(&self, chart: &BarChart, path: &Path) -> DocumentStoreResult<()>;
}

/// Image format picked from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Svg,
    Bitmap,
}

impl ImageFormat {
    /// `svg` for vector output; `png`, `bmp`, `jpg` and `jpeg` for bitmaps (case-insensitive).
    pub fn from_path(path: &Path) -> DocumentStoreResult<Self> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("svg") => Ok(ImageFormat::Svg),
            Some("png" | "bmp" | "jpg" | "jpeg") => Ok(ImageFormat::Bitmap),
            Some(other) => Err(DocumentStoreError::Render(format!("unsupported image format '.{other}'"))),
            None => Err(DocumentStoreError::Render(format!(
                "cannot infer an image format from '{}'",
                path.display()
            ))),
        }
    }
}

/// Renders grouped bar charts with `plotters`.
///
/// `display` writes the chart as a table to the log at `info` level; `save` draws it.
#[derive(Debug, Clone, Copy)]
pub struct PlottersRenderer {
    size: (u32, u32),
}

impl Default for PlottersRenderer {
    fn default() -> Self {
        Self { size: (1024, 640) }
    }
}

impl PlottersRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image size in pixels.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }
}

impl ChartRenderer for PlottersRenderer {
    fn display(&self, chart: &BarChart) -> DocumentStoreResult<()> {
        info!(
            title = chart.title(),
            categories = chart.categories().len(),
            series = chart.series().len(),
            "bar chart"
        );

        for (index, category) in chart.categories().iter().enumerate() {
            for series in chart.series() {
                if let Some(value) = series.values()[index] {
                    info!(
                        x = %category,
                        color = series.name(),
                        y = value,
                        "{} = {}", chart.y_label(), value
                    );
                }
            }
        }

        Ok(())
    }

    fn save(&self, chart: &BarChart, path: &Path) -> DocumentStoreResult<()> {
        let format = ImageFormat::from_path(path)?;

        if chart.is_empty() {
            return Err(DocumentStoreError::Render("chart has no bars to draw".to_string()));
        }

        load_font()?;

        match format {
            ImageFormat::Svg => draw(SVGBackend::new(path, self.size).into_drawing_area(), chart)
                .map_err(render_error)?,
            ImageFormat::Bitmap => draw(BitMapBackend::new(path, self.size).into_drawing_area(), chart)
                .map_err(render_error)?,
        }

        debug!(path = %path.display(), ?format, "chart saved");

        Ok(())
    }
}

fn render_error<E: Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> DocumentStoreError {
    DocumentStoreError::Render(err.to_string())
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    chart: &BarChart,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let categories = chart.categories();
    let axis = value_axis(chart);
    let low = axis.start;

    let mut context = ChartBuilder::on(&root)
        .caption(chart.title(), (FONT_FAMILY, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..categories.len() as f64, axis)?;

    context
        .configure_mesh()
        .disable_x_mesh()
        .label_style((FONT_FAMILY, 12))
        .x_label_formatter(&|_| String::new())
        .x_desc(chart.x_label())
        .y_desc(chart.y_label())
        .draw()?;

    // Bars of one category share 80% of its slot, side by side in series order.
    let width = 0.8 / chart.series().len().max(1) as f64;

    for (offset, series) in chart.series().iter().enumerate() {
        let color = Palette99::pick(offset).to_rgba();

        context
            .draw_series(
                series
                    .values()
                    .iter()
                    .enumerate()
                    .filter_map(|(index, value)| value.map(|value| (index, value)))
                    .map(move |(index, value)| {
                        let left = index as f64 + 0.1 + offset as f64 * width;
                        Rectangle::new([(left, 0.0), (left + width, value)], color.filled())
                    }),
            )?
            .label(series.name())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    context
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font((FONT_FAMILY, 12))
        .draw()?;

    let label_style = TextStyle::from((FONT_FAMILY, 14).into_font()).pos(Pos::new(HPos::Center, VPos::Top));

    for (index, category) in categories.iter().enumerate() {
        let (x, y) = context.backend_coord(&(index as f64 + 0.5, low));
        root.draw(&Text::new(category.clone(), (x, y + 6), label_style.clone()))?;
    }

    root.present()
}

/// Value axis covering every bar and the zero baseline bars grow from, with headroom on top.
fn value_axis(chart: &BarChart) -> Range<f64> {
    let (low, high) = chart.value_range().unwrap_or((0.0, 1.0));
    let (low, high) = (low.min(0.0), high.max(0.0));

    if high <= low {
        low..low + 1.0
    } else {
        low..high + (high - low) * 0.05
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartSpec;
    use bson::doc;

    fn chart() -> BarChart {
        let rows = vec![
            doc! { "borough": "Bronx", "cuisine": "Bakery", "count": 2 },
            doc! { "borough": "Queens", "cuisine": "Pizza", "count": 3 },
            doc! { "borough": "Queens", "cuisine": "Bakery", "count": 1 },
        ];
        BarChart::from_documents(&rows, &ChartSpec::new("borough", "count", "cuisine")).unwrap()
    }

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(ImageFormat::from_path(Path::new("out/chart.svg")).unwrap(), ImageFormat::Svg);
        assert_eq!(ImageFormat::from_path(Path::new("chart.PNG")).unwrap(), ImageFormat::Bitmap);
        assert_eq!(ImageFormat::from_path(Path::new("chart.jpeg")).unwrap(), ImageFormat::Bitmap);
        assert!(matches!(
            ImageFormat::from_path(Path::new("chart.pdf")),
            Err(DocumentStoreError::Render(_))
        ));
        assert!(matches!(
            ImageFormat::from_path(Path::new("chart")),
            Err(DocumentStoreError::Render(_))
        ));
    }

    #[test]
    fn saves_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restaurants.svg");

        PlottersRenderer::new().with_size(640, 480).save(&chart(), &path).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Queens"));
        assert!(svg.contains("Bakery"));
    }

    fn starts_with(path: &Path, signature: &[u8]) -> bool {
        std::fs::read(path).unwrap().starts_with(signature)
    }

    #[test]
    fn saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mongo_visualization.png");

        PlottersRenderer::new().with_size(640, 480).save(&chart(), &path).unwrap();

        assert!(starts_with(&path, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]));
    }

    #[test]
    fn saves_bmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restaurants.bmp");

        PlottersRenderer::new().with_size(320, 240).save(&chart(), &path).unwrap();

        assert!(starts_with(&path, b"BM"));
    }

    #[test]
    fn value_axis_keeps_the_baseline() {
        let rows = vec![doc! { "borough": "Bronx", "cuisine": "Bakery", "delta": -5 }];
        let negative = BarChart::from_documents(&rows, &ChartSpec::new("borough", "delta", "cuisine")).unwrap();

        let axis = value_axis(&negative);
        assert_eq!(axis.start, -5.0);
        assert!(axis.end > 0.0);

        let axis = value_axis(&chart());
        assert_eq!(axis.start, 0.0);
        assert!(axis.end > 3.0);

        let dir = tempfile::tempdir().unwrap();
        PlottersRenderer::new()
            .with_size(320, 240)
            .save(&negative, &dir.path().join("negative.png"))
            .unwrap();
    }

    #[test]
    fn unsupported_extension_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restaurants.gif");

        let err = PlottersRenderer::new().save(&chart(), &path).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Render(_)));
        assert!(!path.exists());
    }

    #[test]
    fn empty_chart_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let empty = BarChart::from_documents(&[], &ChartSpec::new("x", "y", "c")).unwrap();

        let err = PlottersRenderer::new().save(&empty, &dir.path().join("empty.svg")).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Render(_)));
    }

    #[test]
    fn display_logs_without_failing() {
        PlottersRenderer::new().display(&chart()).unwrap();
    }
}
