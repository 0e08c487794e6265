//! Configuration handling for the GeoPrint CLI
//!
//! Supports loading configuration from geoprint.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use geoprint_core::PrintSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliError;

pub const DEFAULT_CONFIG_FILE: &str = "geoprint.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub print: PrintConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub legend: LegendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Worker threads for legend fetches and probes (0 = one per core)
    #[serde(default)]
    pub threads: usize,

    /// Milliseconds to wait for the map to finish a frame before compositing
    #[serde(default = "default_render_wait_ms")]
    pub render_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintConfig {
    /// Default output resolution (72, 96, 150 or 300)
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Default paper size
    #[serde(default = "default_paper")]
    pub paper: String,

    /// Default orientation
    #[serde(default = "default_orientation")]
    pub orientation: String,

    /// Page margin in millimetres
    #[serde(default = "default_margin_mm")]
    pub margin_mm: f32,

    /// Lowest accepted output scale factor
    #[serde(default = "default_min_output_scale")]
    pub min_output_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// WMS base URL used when the print job does not name one
    #[serde(default)]
    pub legend_service_base_url: String,

    /// Timeout for one GetLegendGraphic request
    #[serde(default = "default_legend_timeout_ms")]
    pub legend_timeout_ms: u64,

    /// Timeout for one GetFeatureInfo probe
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegendConfig {
    /// Include the legend unless the job says otherwise
    #[serde(default = "default_true")]
    pub include: bool,

    /// Drop layers with nothing inside the selection
    #[serde(default = "default_true")]
    pub filter_by_content: bool,

    /// Probe points per server-rendered layer (1-5)
    #[serde(default = "default_probe_samples")]
    pub probe_samples: usize,

    /// Panel width from which the legend uses two columns
    #[serde(default = "default_two_column_min_width_mm")]
    pub two_column_min_width_mm: f32,

    /// Tallest a legend image may be printed
    #[serde(default = "default_max_image_height_mm")]
    pub max_image_height_mm: f32,
}

// Default value functions
fn default_render_wait_ms() -> u64 { 1200 }
fn default_dpi() -> u32 { 150 }
fn default_paper() -> String { "a4".to_string() }
fn default_orientation() -> String { "portrait".to_string() }
fn default_margin_mm() -> f32 { 10.0 }
fn default_min_output_scale() -> f64 { 0.5 }
fn default_legend_timeout_ms() -> u64 { 5000 }
fn default_probe_timeout_ms() -> u64 { 1200 }
fn default_true() -> bool { true }
fn default_probe_samples() -> usize { 5 }
fn default_two_column_min_width_mm() -> f32 { 78.0 }
fn default_max_image_height_mm() -> f32 { 60.0 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { threads: 0, render_wait_ms: default_render_wait_ms() }
    }
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            paper: default_paper(),
            orientation: default_orientation(),
            margin_mm: default_margin_mm(),
            min_output_scale: default_min_output_scale(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            legend_service_base_url: String::new(),
            legend_timeout_ms: default_legend_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            include: true,
            filter_by_content: true,
            probe_samples: default_probe_samples(),
            two_column_min_width_mm: default_two_column_min_width_mm(),
            max_image_height_mm: default_max_image_height_mm(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::file_not_found(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }

    /// Library tunables for one print.
    pub fn print_settings(&self) -> PrintSettings {
        PrintSettings {
            render_wait_ms: self.general.render_wait_ms,
            probe_timeout_ms: self.network.probe_timeout_ms,
            legend_timeout_ms: self.network.legend_timeout_ms,
            probe_samples: self.legend.probe_samples.clamp(1, 5),
            min_output_scale: self.print.min_output_scale,
            two_column_min_width_mm: self.legend.two_column_min_width_mm,
            filter_legend_by_content: self.legend.filter_by_content,
            margin_mm: self.print.margin_mm,
            max_legend_image_height_mm: self.legend.max_image_height_mm,
        }
    }
}
