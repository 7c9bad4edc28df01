use std::path::{Path, PathBuf};

use log::info;

use crate::config::MedicalSettings;
use crate::data::model::Table;
use crate::error::Result;
use crate::render::{ArtifactSet, Chart, Layout, Renderer};
use crate::transform::aggregate::{medical_heat_rules, tally, trimmed_correlation};
use crate::transform::clean::normalize_medical;

pub const CATPLOT_FILE: &str = "catplot.png";
pub const HEATMAP_FILE: &str = "heatmap.png";

/// Panel identity of the categorical plot.
pub const IDENTITY: &str = "cardio";
/// Variables of the categorical plot, in display order.
pub const TALLY_VARIABLES: [&str; 6] = ["cholesterol", "gluc", "smoke", "alco", "active", "overweight"];

/// Normalize the survey, then render the categorical tally and the
/// trimmed correlation heatmap.
pub fn run(
    table: &Table,
    settings: &MedicalSettings,
    renderer: &dyn Renderer,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let normalized = normalize_medical(table)?;

    let counts = tally(&normalized, IDENTITY, &TALLY_VARIABLES)?;
    info!("tally has {} (cardio, variable, value) groups", counts.len());

    let (lower_q, upper_q) = settings.trim_quantiles;
    let matrix = trimmed_correlation(&normalized, &medical_heat_rules(lower_q, upper_q))?;
    info!("correlation matrix over {} columns", matrix.len());

    let mut artifacts = ArtifactSet::new(out_dir);
    artifacts.add(
        CATPLOT_FILE,
        renderer.render(
            &Chart::CategoricalBars {
                tally: &counts,
                identity: IDENTITY,
            },
            &Layout::new("Categorical Counts by Cardio").labels("variable", "total"),
        )?,
    );
    artifacts.add(
        HEATMAP_FILE,
        renderer.render(
            &Chart::Heatmap(&matrix),
            &Layout::new("Correlation Matrix").size(1200, 1000),
        )?,
    );
    artifacts.write()
}
