/*!
# Map View

The print pipeline never talks to a map engine directly. It sees a
[`MapView`]: a stack of already-rendered layer canvases, the view transform,
a render trigger and the selection overlay toggle. [`StaticMapView`] is the
in-memory implementation used by the CLI and the tests.
*/

use geoprint_core::tree::LayerId;
use geoprint_core::{Coordinate, Extent};
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};

/// 2D affine transform in CSS `matrix(a, b, c, d, e, f)` order, mapping
/// canvas pixels to device pixels of the composite:
/// `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
pub type Affine = [f64; 6];

pub const IDENTITY: Affine = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasKind {
    Basemap,
    SelectionOverlay,
    Layer(LayerId),
    Other(String),
}

impl CanvasKind {
    pub fn label(&self) -> String {
        match self {
            CanvasKind::Basemap => "basemap".to_string(),
            CanvasKind::SelectionOverlay => "selection overlay".to_string(),
            CanvasKind::Layer(id) => id.to_string(),
            CanvasKind::Other(name) => name.clone(),
        }
    }
}

/// One rendered layer as the map engine left it.
#[derive(Debug, Clone)]
pub struct LayerCanvas {
    pub kind: CanvasKind,
    pub image: RgbaImage,
    pub transform: Option<Affine>,
    pub opacity: f32,
    pub visible: bool,
    /// Pixels came from another origin without CORS approval; reading them
    /// back is forbidden.
    pub cross_origin_tainted: bool,
}

impl LayerCanvas {
    pub fn new(kind: CanvasKind, image: RgbaImage) -> Self {
        Self { kind, image, transform: None, opacity: 1.0, visible: true, cross_origin_tainted: false }
    }

    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn tainted(mut self) -> Self {
        self.cross_origin_tainted = true;
        self
    }
}

/// Read-mostly handle on a live map.
pub trait MapView {
    /// Viewport size in CSS pixels.
    fn viewport_size(&self) -> (u32, u32);

    fn pixel_ratio(&self) -> f64;

    fn zoom(&self) -> f64;

    /// Map CRS coordinate to CSS pixel, origin top-left.
    fn coordinate_to_pixel(&self, coordinate: Coordinate) -> Option<(f64, f64)>;

    /// Request a synchronous render. The receiver yields once the frame is
    /// complete; it may never yield.
    fn render_sync(&mut self) -> Receiver<()>;

    /// Canvases in z-order, bottom first.
    fn canvases(&self) -> &[LayerCanvas];

    /// Show or hide the selection outline; returns the previous state.
    fn set_selection_overlay_visible(&mut self, visible: bool) -> bool;

    /// Number of loaded vector features of `layer` intersecting `extent`,
    /// when the view keeps them in memory.
    fn features_in_extent(&self, _layer: &LayerId, _extent: &Extent) -> Option<usize> {
        None
    }
}

/// A map view over pre-rendered rasters.
#[derive(Debug)]
pub struct StaticMapView {
    size: (u32, u32),
    pixel_ratio: f64,
    center: Coordinate,
    resolution: f64,
    zoom: f64,
    canvases: Vec<LayerCanvas>,
    features: HashMap<LayerId, Vec<Coordinate>>,
    overlay_visible: bool,
    completes_render: bool,
    pending_renders: Vec<Sender<()>>,
    render_requests: usize,
}

impl StaticMapView {
    /// `resolution` is map units per CSS pixel.
    pub fn new(size: (u32, u32), center: Coordinate, resolution: f64) -> Self {
        Self {
            size,
            pixel_ratio: 1.0,
            center,
            resolution,
            zoom: 0.0,
            canvases: Vec::new(),
            features: HashMap::new(),
            overlay_visible: true,
            completes_render: true,
            pending_renders: Vec::new(),
            render_requests: 0,
        }
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.pixel_ratio = if ratio > 0.0 && ratio.is_finite() { ratio } else { 1.0 };
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_canvas(mut self, canvas: LayerCanvas) -> Self {
        self.push_canvas(canvas);
        self
    }

    pub fn push_canvas(&mut self, mut canvas: LayerCanvas) {
        if canvas.kind == CanvasKind::SelectionOverlay {
            canvas.visible = self.overlay_visible;
        }
        self.canvases.push(canvas);
    }

    pub fn with_features(mut self, layer: LayerId, points: Vec<Coordinate>) -> Self {
        self.features.insert(layer, points);
        self
    }

    /// Keep render requests pending forever.
    pub fn never_completes_render(mut self) -> Self {
        self.completes_render = false;
        self
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn render_requests(&self) -> usize {
        self.render_requests
    }

    /// Extent covered by the viewport.
    pub fn extent(&self) -> Extent {
        let half_w = self.size.0 as f64 * self.resolution * 0.5;
        let half_h = self.size.1 as f64 * self.resolution * 0.5;
        Extent::new(self.center.x - half_w, self.center.y - half_h, self.center.x + half_w, self.center.y + half_h)
    }
}

impl MapView for StaticMapView {
    fn viewport_size(&self) -> (u32, u32) {
        self.size
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn coordinate_to_pixel(&self, c: Coordinate) -> Option<(f64, f64)> {
        if !(self.resolution > 0.0) || !c.is_finite() {
            return None;
        }
        let x = (c.x - self.center.x) / self.resolution + self.size.0 as f64 * 0.5;
        let y = (self.center.y - c.y) / self.resolution + self.size.1 as f64 * 0.5;
        Some((x, y))
    }

    fn render_sync(&mut self) -> Receiver<()> {
        self.render_requests += 1;
        let (tx, rx) = channel();
        if self.completes_render {
            let _ = tx.send(());
        } else {
            self.pending_renders.push(tx);
        }
        rx
    }

    fn canvases(&self) -> &[LayerCanvas] {
        &self.canvases
    }

    fn set_selection_overlay_visible(&mut self, visible: bool) -> bool {
        let previous = self.overlay_visible;
        self.overlay_visible = visible;
        for canvas in self.canvases.iter_mut().filter(|c| c.kind == CanvasKind::SelectionOverlay) {
            canvas.visible = visible;
        }
        previous
    }

    fn features_in_extent(&self, layer: &LayerId, extent: &Extent) -> Option<usize> {
        let e = extent.normalized();
        self.features.get(layer).map(|points| {
            points
                .iter()
                .filter(|p| p.x >= e.min_x && p.x <= e.max_x && p.y >= e.min_y && p.y <= e.max_y)
                .count()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> StaticMapView {
        StaticMapView::new((200, 100), Coordinate::new(1000.0, 500.0), 2.0)
    }

    #[test]
    fn projects_centre_to_viewport_middle() {
        let v = view();
        assert_eq!(v.coordinate_to_pixel(Coordinate::new(1000.0, 500.0)), Some((100.0, 50.0)));
        // north is up
        assert_eq!(v.coordinate_to_pixel(Coordinate::new(800.0, 600.0)), Some((0.0, 0.0)));
        assert_eq!(v.extent(), Extent::new(800.0, 400.0, 1200.0, 600.0));
    }

    #[test]
    fn overlay_toggle_reports_previous_state() {
        let mut v = view().with_canvas(LayerCanvas::new(CanvasKind::SelectionOverlay, RgbaImage::new(2, 2)));
        assert!(v.set_selection_overlay_visible(false));
        assert!(!v.canvases()[0].visible);
        assert!(!v.set_selection_overlay_visible(true));
        assert!(v.canvases()[0].visible);
    }

    #[test]
    fn pending_render_never_signals() {
        let mut v = view().never_completes_render();
        let rx = v.render_sync();
        assert!(rx.try_recv().is_err());
        let mut done = view();
        assert!(done.render_sync().try_recv().is_ok());
        assert_eq!(done.render_requests(), 1);
    }

    #[test]
    fn counts_features_inside_extent() {
        let id = LayerId::from("pop");
        let v = view().with_features(id.clone(), vec![Coordinate::new(0.0, 0.0), Coordinate::new(10.0, 10.0)]);
        assert_eq!(v.features_in_extent(&id, &Extent::new(5.0, 5.0, 20.0, 20.0)), Some(1));
        assert_eq!(v.features_in_extent(&id, &Extent::new(50.0, 50.0, 60.0, 60.0)), Some(0));
        assert_eq!(v.features_in_extent(&LayerId::from("other"), &Extent::new(0.0, 0.0, 1.0, 1.0)), None);
    }
}
