use std::path::{Path, PathBuf};

use log::info;

use crate::config::PageViewSettings;
use crate::data::filter::{apply_rules, RowRule};
use crate::data::model::Table;
use crate::error::Result;
use crate::render::{ArtifactSet, Chart, Layout, Renderer};
use crate::transform::aggregate::{dated_values, distributions, monthly_means};

pub const LINE_FILE: &str = "line_plot.png";
pub const BAR_FILE: &str = "bar_plot.png";
pub const BOX_FILE: &str = "box_plot.png";

pub const DATE_COLUMN: &str = "date";
pub const VALUE_COLUMN: &str = "value";

/// Drop the extreme page-view days, then render the daily line, the
/// monthly-mean bars and the year / month box plots.
pub fn run(
    table: &Table,
    settings: &PageViewSettings,
    renderer: &dyn Renderer,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    table.require(&[DATE_COLUMN, VALUE_COLUMN])?;
    let (lower_q, upper_q) = settings.trim_quantiles;
    let trimmed = apply_rules(table, &[RowRule::quantile_band(VALUE_COLUMN, lower_q, upper_q)])?;
    info!("kept {} of {} days after trimming", trimmed.len(), table.len());

    let daily = dated_values(&trimmed, DATE_COLUMN, VALUE_COLUMN)?;
    let means = monthly_means(&trimmed, DATE_COLUMN, VALUE_COLUMN)?;
    let spread = distributions(&trimmed, DATE_COLUMN, VALUE_COLUMN)?;

    let mut artifacts = ArtifactSet::new(out_dir);
    artifacts.add(
        LINE_FILE,
        renderer.render(
            &Chart::TimeLine { points: &daily },
            &Layout::new("Daily freeCodeCamp Forum Page Views 5/2016-12/2019")
                .labels("Date", "Page Views")
                .size(1500, 500),
        )?,
    );
    artifacts.add(
        BAR_FILE,
        renderer.render(
            &Chart::GroupedBars(&means),
            &Layout::new("Average Daily Page Views per Month")
                .labels("Years", "Average Page Views")
                .size(1000, 800),
        )?,
    );
    artifacts.add(
        BOX_FILE,
        renderer.render(
            &Chart::BoxPlots(&spread),
            &Layout::new("Page View Distribution")
                .labels("", "Page Views")
                .size(1600, 600),
        )?,
    );
    artifacts.write()
}
