use std::path::{Path, PathBuf};

use log::info;

use crate::config::SeaLevelSettings;
use crate::data::detect::{resolve, SEA_LEVEL_RULES};
use crate::data::model::Table;
use crate::error::Result;
use crate::render::{ArtifactSet, Chart, Layout, Renderer};
use crate::transform::aggregate::{dual_fit, observations};

pub const PLOT_FILE: &str = "sea_level_plot.png";

/// Detect the year and measurement columns, fit both trend lines and
/// render them over the observations.
pub fn run(
    table: &Table,
    settings: &SeaLevelSettings,
    renderer: &dyn Renderer,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mapping = resolve(table, &SEA_LEVEL_RULES)?;
    let year = mapping.get("year")?;
    let measurement = mapping.get("measurement")?;
    info!("sea level columns: year = {year:?}, measurement = {measurement:?}");

    let points = observations(table, year, measurement)?;
    let fits = dual_fit(&points, settings.cutoff_year, settings.forecast_end)?;
    info!(
        "slope {:.4} in/yr overall (r = {:.3}), {:.4} in/yr since {} (r = {:.3})",
        fits.all.slope, fits.all.r_value, fits.recent.slope, fits.cutoff, fits.recent.r_value
    );

    let mut artifacts = ArtifactSet::new(out_dir);
    artifacts.add(
        PLOT_FILE,
        renderer.render(
            &Chart::ScatterWithFits {
                points: &points,
                fits: &fits,
            },
            &Layout::new("Rise in Sea Level").labels("Year", "Sea Level (inches)"),
        )?,
    );
    artifacts.write()
}
