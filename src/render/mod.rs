//! Chart rendering: aggregate shapes in, RGB images out.
//!
//! ```text
//!   Chart + Layout ──► Renderer ──► RgbImage ──► ArtifactSet ──► *.png
//! ```
//!
//! The renderer receives the aggregates exactly as the transform layer
//! produced them; any layout decision (ordering, masking, colouring) is
//! made here, not upstream.

pub mod artifact;
pub mod png;

use chrono::NaiveDate;
use image::RgbImage;

use crate::data::model::Table;
use crate::error::Result;
use crate::transform::aggregate::{CorrelationMatrix, DualFit, Distributions, MonthlyMeans};

pub use artifact::ArtifactSet;
pub use png::PngRenderer;

/// What to draw, carrying a borrowed aggregate.
#[derive(Debug, Clone, Copy)]
pub enum Chart<'a> {
    /// Grouped bars of a tally table (`identity, variable, value, total`),
    /// one panel per identity value, one hue per value.
    CategoricalBars { tally: &'a Table, identity: &'a str },
    /// Lower-triangle heatmap of a correlation matrix.
    Heatmap(&'a CorrelationMatrix),
    /// Observations plus both regression lines.
    ScatterWithFits {
        points: &'a [(f64, f64)],
        fits: &'a DualFit,
    },
    /// Daily values joined by a line.
    TimeLine { points: &'a [(NaiveDate, f64)] },
    /// Mean per month, grouped by year.
    GroupedBars(&'a MonthlyMeans),
    /// Year-wise and month-wise box plots side by side.
    BoxPlots(&'a Distributions),
}

impl Chart<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Chart::CategoricalBars { .. } => "bar",
            Chart::Heatmap(_) => "heatmap",
            Chart::ScatterWithFits { .. } => "scatter",
            Chart::TimeLine { .. } => "line",
            Chart::GroupedBars(_) => "grouped-bar",
            Chart::BoxPlots(_) => "box",
        }
    }
}

/// Labels and pixel size of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

impl Layout {
    pub fn new(title: impl Into<String>) -> Self {
        Layout {
            title: title.into(),
            x_label: String::new(),
            y_label: String::new(),
            width: 1200,
            height: 600,
        }
    }

    pub fn labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = x.into();
        self.y_label = y.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Turns a chart into pixels. Implementations must not touch the
/// filesystem; writing is left to [`ArtifactSet`].
pub trait Renderer {
    fn render(&self, chart: &Chart<'_>, layout: &Layout) -> Result<RgbImage>;
}
