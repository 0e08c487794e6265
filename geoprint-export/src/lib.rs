/*!
# GeoPrint Export

Turns a live map view into a printable PDF.

## Pipeline

1. **Snapshot**: hide the selection overlay, wait for a render, flatten the
   layer canvases into one raster (refusing cross-origin tainted canvases)
2. **Crop**: cut the selection rectangle out and resample it to the print DPI
3. **Legend**: collect visible layers, optionally drop those with nothing in
   the selection, fetch WMS legend images or build WFS swatches
4. **PDF**: header, map, scale bar, coordinate readout and paginated legend

Remote calls go through [`LegendGraphicSource`] and [`FeatureInfoProbe`] so
the pipeline runs without a network in tests.
*/

pub mod view;
pub mod snapshot;
pub mod crop;
pub mod remote;
pub mod filter;
pub mod legend_graphics;
pub mod pdf;
pub mod compositor;

pub use compositor::{PrintCompositor, PrintOutput, PrintSummary};
pub use remote::{AbortSignal, FeatureInfoProbe, LegendGraphicSource, RemoteError, WmsClient};
pub use snapshot::{capture, composite, Snapshot};
pub use view::{Affine, CanvasKind, LayerCanvas, MapView, StaticMapView};

pub use geoprint_core::{PrintError, PrintRequest, PrintResult, PrintSettings};
