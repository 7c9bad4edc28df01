use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::data::loader::{FileSource, InteractiveSource, Loader, SyntheticSource};
use crate::data::synthetic::SyntheticDataset;
use crate::error::{Result, VizError};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "RUSTY_CHARTS_CONFIG";
/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "rusty-charts.json";

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where a pipeline gets its table from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum SourceConfig {
    File {
        path: PathBuf,
    },
    Interactive {
        #[serde(default)]
        title: Option<String>,
    },
    Synthetic {
        #[serde(default)]
        rows: Option<usize>,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl SourceConfig {
    /// Build the loader; `dataset` fills in synthetic and dialog defaults.
    pub fn loader(&self, dataset: SyntheticDataset) -> Box<dyn Loader> {
        match self {
            SourceConfig::File { path } => Box::new(FileSource::new(path)),
            SourceConfig::Interactive { title } => Box::new(InteractiveSource {
                title: title
                    .clone()
                    .unwrap_or_else(|| format!("Open {}.csv", dataset.file_stem())),
            }),
            SourceConfig::Synthetic { rows, seed } => Box::new(SyntheticSource {
                dataset,
                rows: rows.unwrap_or_else(|| dataset.default_rows()),
                seed: seed.unwrap_or(42),
            }),
        }
    }
}

/// Primary source plus an optional fallback used when the primary is
/// unavailable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub fallback: Option<SourceConfig>,
}

impl InputConfig {
    fn file(name: &str) -> Self {
        InputConfig {
            source: SourceConfig::File {
                path: PathBuf::from(name),
            },
            fallback: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-pipeline settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Medical,
    SeaLevel,
    PageViews,
}

impl PipelineKind {
    pub fn name(self) -> &'static str {
        match self {
            PipelineKind::Medical => "medical",
            PipelineKind::SeaLevel => "sea_level",
            PipelineKind::PageViews => "page_views",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MedicalSettings {
    pub input: InputConfig,
    /// Quantile band applied to height and weight before correlating.
    pub trim_quantiles: (f64, f64),
}

impl Default for MedicalSettings {
    fn default() -> Self {
        MedicalSettings {
            input: InputConfig::file("medical_examination.csv"),
            trim_quantiles: (0.025, 0.975),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeaLevelSettings {
    pub input: InputConfig,
    /// First year of the recent-trend window (inclusive).
    pub cutoff_year: i32,
    /// Last year both fit lines are extrapolated to (inclusive).
    pub forecast_end: i32,
}

impl Default for SeaLevelSettings {
    fn default() -> Self {
        SeaLevelSettings {
            input: InputConfig::file("epa-sea-level.csv"),
            cutoff_year: 2000,
            forecast_end: 2050,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageViewSettings {
    pub input: InputConfig,
    pub trim_quantiles: (f64, f64),
}

impl Default for PageViewSettings {
    fn default() -> Self {
        PageViewSettings {
            input: InputConfig::file("fcc-forum-pageviews.csv"),
            trim_quantiles: (0.025, 0.975),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory the PNG files are written to.
    pub output_dir: PathBuf,
    /// Pipelines to run, in order.
    pub pipelines: Vec<PipelineKind>,
    pub medical: MedicalSettings,
    pub sea_level: SeaLevelSettings,
    pub page_views: PageViewSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_dir: PathBuf::from("."),
            pipelines: vec![
                PipelineKind::Medical,
                PipelineKind::SeaLevel,
                PipelineKind::PageViews,
            ],
            medical: MedicalSettings::default(),
            sea_level: SeaLevelSettings::default(),
            page_views: PageViewSettings::default(),
        }
    }
}

fn check_band(name: &str, (lo, hi): (f64, f64)) -> Result<()> {
    if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo >= hi {
        return Err(VizError::Config(format!(
            "{name}.trim_quantiles ({lo}, {hi}) must satisfy 0 <= lower < upper <= 1"
        )));
    }
    Ok(())
}

impl Config {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| VizError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| VizError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// The file named by `RUSTY_CHARTS_CONFIG`, else `rusty-charts.json`
    /// in the working directory if it exists, else the defaults.
    pub fn discover() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            info!("configuration from {}", path.display());
            return Self::from_file(&path);
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            info!("configuration from {DEFAULT_CONFIG_FILE}");
            return Self::from_file(local);
        }
        info!("no configuration file, using defaults");
        Ok(Config::default())
    }

    pub fn validate(&self) -> Result<()> {
        check_band("medical", self.medical.trim_quantiles)?;
        check_band("page_views", self.page_views.trim_quantiles)?;
        if self.sea_level.cutoff_year >= self.sea_level.forecast_end {
            return Err(VizError::Config(format!(
                "sea_level.cutoff_year {} must be before forecast_end {}",
                self.sea_level.cutoff_year, self.sea_level.forecast_end
            )));
        }
        if self.pipelines.is_empty() {
            return Err(VizError::Config("no pipelines selected".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn parses_sources_and_overrides() {
        let cfg = Config::from_json(
            r#"{
                "output_dir": "out",
                "pipelines": ["sea_level"],
                "sea_level": {
                    "input": {
                        "source": {"kind": "interactive"},
                        "fallback": {"kind": "synthetic", "rows": 50}
                    },
                    "cutoff_year": 1990
                }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.pipelines, vec![PipelineKind::SeaLevel]);
        assert_eq!(cfg.sea_level.cutoff_year, 1990);
        assert_eq!(cfg.sea_level.forecast_end, 2050);
        assert_eq!(
            cfg.sea_level.input.source,
            SourceConfig::Interactive { title: None }
        );
        assert_eq!(
            cfg.sea_level.input.fallback,
            Some(SourceConfig::Synthetic {
                rows: Some(50),
                seed: None
            })
        );
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            Config::from_json(r#"{"colour": "red"}"#),
            Err(VizError::Config(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"medical": {"trim_quantiles": [0.9, 0.1]}}"#),
            Err(VizError::Config(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"sea_level": {"cutoff_year": 2060}}"#),
            Err(VizError::Config(_))
        ));
    }

    #[test]
    fn synthetic_source_uses_dataset_defaults() {
        let src = SourceConfig::Synthetic {
            rows: None,
            seed: None,
        };
        let table = src.loader(SyntheticDataset::SeaLevel).load().unwrap();
        assert_eq!(table.len(), SyntheticDataset::SeaLevel.default_rows());
    }
}
