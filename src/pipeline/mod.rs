//! The three chart pipelines.
//!
//! ```text
//!   Loader ──► Table ──► clean / filter ──► aggregate ──► Renderer ──► ArtifactSet
//! ```
//!
//! Each `run` function takes an already loaded table and renders every
//! chart before anything touches the disk, so a failing stage leaves the
//! output directory as it was.

pub mod medical;
pub mod page_views;
pub mod sea_level;

use log::info;

use crate::config::InputConfig;
use crate::data::loader::load_with_fallback;
use crate::data::model::Table;
use crate::data::synthetic::SyntheticDataset;
use crate::error::Result;

/// Load the table for one pipeline from its configured source, falling
/// back when the primary source is unavailable.
pub fn load_input(input: &InputConfig, dataset: SyntheticDataset) -> Result<Table> {
    let primary = input.source.loader(dataset);
    let fallback = input.fallback.as_ref().map(|f| f.loader(dataset));
    let table = load_with_fallback(&*primary, fallback.as_deref())?;
    info!(
        "loaded {} rows x {} columns for {}",
        table.len(),
        table.columns().len(),
        dataset.file_stem()
    );
    Ok(table)
}
