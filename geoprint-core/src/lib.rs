//! GeoPrint Core Library
//!
//! Layer tree and visibility model, CRS transforms, scale-bar math,
//! coordinate readout and legend/page layout planning for map prints.

pub mod types;
pub mod error;
pub mod tree;
pub mod crs;
pub mod scale;
pub mod coords;
pub mod layout;
pub mod legend;

// Re-export commonly used types and functions
pub use types::{normalize_extent, Coordinate, DragPoints, Dpi, Extent, Orientation, Paper, PrintRequest, PrintSettings};
pub use error::{CrsError, PrintError, PrintResult};
pub use tree::{collect_visible_legend_items, Layer, LayerId, LayerTree, ServiceType, VisibilityState, VisibleLegendItem};
pub use crs::{CrsCode, CrsRegistry, Projection, EPSG_GEOGRAPHIC, EPSG_LOCAL_TM, EPSG_WEB_MERCATOR, MAP_CRS};
pub use scale::{choose_nice_distance, format_distance, ScaleBar};
pub use legend::{ContentCheck, LegendEntry, LegendGraphic, LegendPlan, Swatch};

/// Version information for the GeoPrint core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
