use std::path::PathBuf;

use anyhow::Context;
use log::info;

use crate::config::{Config, PipelineKind};
use crate::data::synthetic::SyntheticDataset;
use crate::pipeline::{self, medical, page_views, sea_level};
use crate::render::{PngRenderer, Renderer};

// ---------------------------------------------------------------------------
// Batch runner
// ---------------------------------------------------------------------------

pub struct RustyChartsApp {
    pub config: Config,
    renderer: Box<dyn Renderer>,
}

impl RustyChartsApp {
    pub fn new(config: Config) -> Self {
        Self::with_renderer(config, Box::new(PngRenderer))
    }

    pub fn with_renderer(config: Config, renderer: Box<dyn Renderer>) -> Self {
        Self { config, renderer }
    }

    /// Run the configured pipelines in order, stopping at the first
    /// failure. Returns every file written.
    pub fn run(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for &kind in &self.config.pipelines {
            let files = self
                .run_one(kind)
                .with_context(|| format!("{} pipeline failed", kind.name()))?;
            info!("{} pipeline wrote {} file(s)", kind.name(), files.len());
            written.extend(files);
        }
        Ok(written)
    }

    fn run_one(&self, kind: PipelineKind) -> anyhow::Result<Vec<PathBuf>> {
        let out = self.config.output_dir.as_path();
        let renderer = &*self.renderer;
        match kind {
            PipelineKind::Medical => {
                let settings = &self.config.medical;
                let table = pipeline::load_input(&settings.input, SyntheticDataset::Medical)
                    .context("loading medical examination data")?;
                medical::run(&table, settings, renderer, out).context("rendering medical charts")
            }
            PipelineKind::SeaLevel => {
                let settings = &self.config.sea_level;
                let table = pipeline::load_input(&settings.input, SyntheticDataset::SeaLevel)
                    .context("loading sea level data")?;
                sea_level::run(&table, settings, renderer, out).context("rendering sea level chart")
            }
            PipelineKind::PageViews => {
                let settings = &self.config.page_views;
                let table = pipeline::load_input(&settings.input, SyntheticDataset::PageViews)
                    .context("loading page view data")?;
                page_views::run(&table, settings, renderer, out).context("rendering page view charts")
            }
        }
    }
}
