use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PrintError;
use crate::tree::{LayerTree, VisibilityState};

/// A position in some CRS's units (x = easting/longitude, y = northing/latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(v: [f64; 2]) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// Axis-aligned bounding box `[minX, minY, maxX, maxY]`.
///
/// Values built from raw selection drags may be inverted; call
/// [`Extent::normalized`] before using one as a box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl From<[f64; 4]> for Extent {
    fn from(v: [f64; 4]) -> Self {
        Self { min_x: v[0], min_y: v[1], max_x: v[2], max_y: v[3] }
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        [e.min_x, e.min_y, e.max_x, e.max_y]
    }
}

/// Normalize a raw `[a, b, c, d]` tuple into `[min(a,c), min(b,d), max(a,c), max(b,d)]`.
pub fn normalize_extent(raw: [f64; 4]) -> [f64; 4] {
    let [a, b, c, d] = raw;
    [a.min(c), b.min(d), a.max(c), b.max(d)]
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn from_corners(a: Coordinate, b: Coordinate) -> Self {
        Self::new(a.x, a.y, b.x, b.y).normalized()
    }

    pub fn normalized(&self) -> Self {
        normalize_extent((*self).into()).into()
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new((self.min_x + self.max_x) * 0.5, (self.min_y + self.max_y) * 0.5)
    }

    pub fn south_west(&self) -> Coordinate {
        Coordinate::new(self.min_x, self.min_y)
    }

    pub fn south_east(&self) -> Coordinate {
        Coordinate::new(self.max_x, self.min_y)
    }

    pub fn north_west(&self) -> Coordinate {
        Coordinate::new(self.min_x, self.max_y)
    }

    pub fn north_east(&self) -> Coordinate {
        Coordinate::new(self.max_x, self.max_y)
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite() && self.min_y.is_finite() && self.max_x.is_finite() && self.max_y.is_finite()
    }

    /// Both extents must already be normalized.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Raw drag gesture in map CRS, kept for the directional coordinate readout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragPoints {
    pub start: Coordinate,
    pub end: Coordinate,
}

/// Output resolution. Only the four values offered by the print dialog are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Dpi {
    D72,
    D96,
    #[default]
    D150,
    D300,
}

impl Dpi {
    pub fn value(self) -> u32 {
        match self {
            Dpi::D72 => 72,
            Dpi::D96 => 96,
            Dpi::D150 => 150,
            Dpi::D300 => 300,
        }
    }
}

impl TryFrom<u32> for Dpi {
    type Error = PrintError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            72 => Ok(Dpi::D72),
            96 => Ok(Dpi::D96),
            150 => Ok(Dpi::D150),
            300 => Ok(Dpi::D300),
            other => Err(PrintError::invalid_request(format!(
                "unsupported dpi {} (expected 72, 96, 150 or 300)",
                other
            ))),
        }
    }
}

impl From<Dpi> for u32 {
    fn from(d: Dpi) -> Self {
        d.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl std::str::FromStr for Orientation {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(PrintError::invalid_request(format!("unknown orientation: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Paper {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
}

impl Paper {
    /// Portrait (width, height) in millimetres.
    pub fn size_mm(self) -> (f32, f32) {
        match self {
            Paper::A4 => (210.0, 297.0),
            Paper::A3 => (297.0, 420.0),
            Paper::Letter => (215.9, 279.4),
            Paper::Legal => (215.9, 355.6),
        }
    }
}

impl std::str::FromStr for Paper {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(Paper::A4),
            "a3" => Ok(Paper::A3),
            "letter" => Ok(Paper::Letter),
            "legal" => Ok(Paper::Legal),
            other => Err(PrintError::invalid_request(format!("unknown paper size: {}", other))),
        }
    }
}

/// Everything one print invocation needs besides the live map handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRequest {
    pub selection_extent: Extent,
    #[serde(default)]
    pub selection_points: Option<DragPoints>,
    #[serde(default = "default_true")]
    pub include_legends: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub dpi: Dpi,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub paper: Paper,
    #[serde(default)]
    pub layer_tree: LayerTree,
    #[serde(default)]
    pub visibility: VisibilityState,
    #[serde(default)]
    pub legend_service_base_url: String,
}

fn default_true() -> bool {
    true
}

impl PrintRequest {
    pub fn new(selection_extent: Extent, layer_tree: LayerTree) -> Self {
        Self {
            selection_extent,
            selection_points: None,
            include_legends: true,
            title: String::new(),
            dpi: Dpi::default(),
            orientation: Orientation::default(),
            paper: Paper::default(),
            layer_tree,
            visibility: VisibilityState::default(),
            legend_service_base_url: String::new(),
        }
    }

    /// Scale factor between CSS pixels and output pixels, never below 0.5.
    pub fn output_scale(&self, min_scale: f64) -> f64 {
        (self.dpi.value() as f64 / 96.0).max(min_scale)
    }
}

/// Tunables for one compositor instance. The defaults are the values the
/// print dialog has always used; none of them is load-bearing.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintSettings {
    pub render_wait_ms: u64,
    pub probe_timeout_ms: u64,
    pub legend_timeout_ms: u64,
    pub probe_samples: usize,
    pub min_output_scale: f64,
    pub two_column_min_width_mm: f32,
    pub filter_legend_by_content: bool,
    pub margin_mm: f32,
    pub max_legend_image_height_mm: f32,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            render_wait_ms: 1200,
            probe_timeout_ms: 1200,
            legend_timeout_ms: 5000,
            probe_samples: 5,
            min_output_scale: 0.5,
            two_column_min_width_mm: 78.0,
            filter_legend_by_content: true,
            margin_mm: 10.0,
            max_legend_image_height_mm: 60.0,
        }
    }
}
