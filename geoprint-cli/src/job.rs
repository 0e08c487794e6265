//! Print-job files: a JSON description of the map view, its rendered layer
//! canvases, the selection and the layer tree.

use anyhow::{Context, Result};
use geoprint_core::{Coordinate, DragPoints, Dpi, Extent, LayerId, LayerTree, Orientation, Paper, PrintRequest, VisibilityState};
use geoprint_export::{Affine, CanvasKind, LayerCanvas, StaticMapView};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::CliError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub view: ViewSpec,
    #[serde(default)]
    pub canvases: Vec<CanvasSpec>,
    /// Client-side feature positions per WFS layer id, map CRS.
    #[serde(default)]
    pub features: HashMap<String, Vec<[f64; 2]>>,
    pub selection: SelectionSpec,
    #[serde(default)]
    pub options: JobOptions,
    pub layer_tree: TreeSource,
    #[serde(default)]
    pub visibility: VisibilityState,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSpec {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f64,
    pub center: [f64; 2],
    /// Map units per CSS pixel.
    pub resolution: f64,
    #[serde(default)]
    pub zoom: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSpec {
    /// `basemap`, `overlay`, `layer` or any other name.
    pub kind: String,
    #[serde(default)]
    pub layer: Option<String>,
    pub image: PathBuf,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub transform: Option<Affine>,
    #[serde(default)]
    pub tainted: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSpec {
    pub extent: Extent,
    #[serde(default)]
    pub points: Option<DragPoints>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    pub title: Option<String>,
    pub dpi: Option<u32>,
    pub paper: Option<String>,
    pub orientation: Option<String>,
    pub include_legends: Option<bool>,
    pub legend_service_base_url: Option<String>,
}

/// The layer tree, inline or in its own file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeSource {
    Inline(LayerTree),
    Path(PathBuf),
}

fn default_pixel_ratio() -> f64 { 1.0 }
fn default_opacity() -> f32 { 1.0 }
fn default_visible() -> bool { true }

/// Command-line overrides applied on top of the job and the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dpi: Option<u32>,
    pub paper: Option<String>,
    pub orientation: Option<String>,
    pub title: Option<String>,
    pub no_legend: bool,
}

/// A parsed job together with the directory its relative paths refer to.
#[derive(Debug, Clone)]
pub struct LoadedJob {
    pub job: PrintJob,
    pub base_dir: PathBuf,
}

impl LoadedJob {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::file_not_found(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read print job: {}", path.display()))?;
        let job: PrintJob = serde_json::from_str(&content)
            .map_err(|e| CliError::invalid_job(path.display().to_string(), e.to_string()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        log::info!("Loaded print job {} ({} canvases)", path.display(), job.canvases.len());
        Ok(Self { job, base_dir })
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn layer_tree(&self) -> Result<LayerTree> {
        match &self.job.layer_tree {
            TreeSource::Inline(tree) => Ok(tree.clone()),
            TreeSource::Path(p) => {
                let path = self.resolve(p);
                if !path.exists() {
                    return Err(CliError::file_not_found(path).into());
                }
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read layer tree: {}", path.display()))?;
                LayerTree::from_json(&content)
                    .map_err(|e| CliError::invalid_job(path.display().to_string(), e.to_string()).into())
            }
        }
    }

    /// Build the in-memory map view from the canvas images on disk.
    pub fn map_view(&self) -> Result<StaticMapView> {
        let v = &self.job.view;
        let mut view = StaticMapView::new((v.width, v.height), Coordinate::from(v.center), v.resolution)
            .with_pixel_ratio(v.pixel_ratio)
            .with_zoom(v.zoom);
        for spec in &self.job.canvases {
            let path = self.resolve(&spec.image);
            if !path.exists() {
                return Err(CliError::file_not_found(path).into());
            }
            let image = image::open(&path)
                .with_context(|| format!("Failed to decode canvas image: {}", path.display()))?
                .to_rgba8();
            let kind = match (spec.kind.as_str(), &spec.layer) {
                ("basemap", _) => CanvasKind::Basemap,
                ("overlay", _) | ("selection", _) => CanvasKind::SelectionOverlay,
                ("layer", Some(id)) => CanvasKind::Layer(LayerId::from(id.as_str())),
                (other, _) => CanvasKind::Other(other.to_string()),
            };
            let mut canvas = LayerCanvas::new(kind, image).with_opacity(spec.opacity);
            if let Some(t) = spec.transform {
                canvas = canvas.with_transform(t);
            }
            if spec.tainted {
                canvas = canvas.tainted();
            }
            canvas.visible = spec.visible;
            view.push_canvas(canvas);
        }
        for (layer, points) in &self.job.features {
            let points = points.iter().copied().map(Coordinate::from).collect();
            view = view.with_features(LayerId::from(layer.as_str()), points);
        }
        Ok(view)
    }

    /// Merge job options, config defaults and command-line overrides.
    pub fn print_request(&self, config: &Config, overrides: &Overrides) -> Result<PrintRequest> {
        let opts = &self.job.options;
        let mut request = PrintRequest::new(self.job.selection.extent, self.layer_tree()?);
        request.selection_points = self.job.selection.points;
        request.visibility = self.job.visibility.clone();

        let dpi = overrides.dpi.or(opts.dpi).unwrap_or(config.print.dpi);
        request.dpi = Dpi::try_from(dpi)?;
        let paper = overrides.paper.as_deref().or(opts.paper.as_deref()).unwrap_or(&config.print.paper);
        request.paper = paper.parse::<Paper>()?;
        let orientation =
            overrides.orientation.as_deref().or(opts.orientation.as_deref()).unwrap_or(&config.print.orientation);
        request.orientation = orientation.parse::<Orientation>()?;
        request.title = overrides.title.clone().or_else(|| opts.title.clone()).unwrap_or_default();
        request.include_legends = !overrides.no_legend && opts.include_legends.unwrap_or(config.legend.include);
        request.legend_service_base_url = opts
            .legend_service_base_url
            .clone()
            .unwrap_or_else(|| config.network.legend_service_base_url.clone());
        Ok(request)
    }
}
