//! Render snapshot: hide the selection outline, force a frame, and flatten
//! the layer canvases into one raster.

use geoprint_core::{PrintError, PrintResult};
use image::{Rgba, RgbaImage};
use std::ops::{Deref, DerefMut};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::view::{Affine, LayerCanvas, MapView, IDENTITY};

/// Hides the selection overlay for as long as it lives.
pub struct OverlayGuard<'a, V: MapView + ?Sized> {
    view: &'a mut V,
    previous: bool,
}

impl<'a, V: MapView + ?Sized> OverlayGuard<'a, V> {
    pub fn hide(view: &'a mut V) -> Self {
        let previous = view.set_selection_overlay_visible(false);
        Self { view, previous }
    }
}

impl<V: MapView + ?Sized> Deref for OverlayGuard<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.view
    }
}

impl<V: MapView + ?Sized> DerefMut for OverlayGuard<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        self.view
    }
}

impl<V: MapView + ?Sized> Drop for OverlayGuard<'_, V> {
    fn drop(&mut self) {
        self.view.set_selection_overlay_visible(self.previous);
    }
}

/// Trigger a render and block until it completes or `timeout` elapses.
/// Returns whether completion was observed.
pub fn wait_for_render<V: MapView + ?Sized>(view: &mut V, timeout: Duration) -> bool {
    let done = view.render_sync();
    match done.recv_timeout(timeout) {
        Ok(()) => true,
        Err(RecvTimeoutError::Timeout) => {
            log::debug!("render did not complete within {:?}; compositing current canvases", timeout);
            false
        }
        Err(RecvTimeoutError::Disconnected) => {
            log::debug!("render signal dropped; compositing current canvases");
            false
        }
    }
}

/// A flattened view. Pixels are only handed out if no cross-origin canvas
/// contributed to them.
#[derive(Debug, Clone)]
pub struct Snapshot {
    image: RgbaImage,
    tainted_by: Option<String>,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted_by.is_some()
    }

    pub fn export(self) -> PrintResult<RgbaImage> {
        match self.tainted_by {
            Some(layer) => Err(PrintError::tainted(layer)),
            None => Ok(self.image),
        }
    }
}

/// Largest raster side a composite may have, in device pixels.
pub const MAX_RASTER_SIDE: u32 = 16_384;

/// Hide the overlay, wait for a frame and composite at device resolution.
/// The overlay is restored before this returns, whatever happens.
pub fn capture<V: MapView + ?Sized>(view: &mut V, render_wait: Duration) -> PrintResult<Snapshot> {
    let mut guard = OverlayGuard::hide(view);
    wait_for_render(&mut *guard, render_wait);
    let (w, h) = guard.viewport_size();
    let ratio = guard.pixel_ratio();
    if w == 0 || h == 0 {
        return Err(PrintError::rendering(format!("map viewport is empty ({}x{} px)", w, h)));
    }
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(PrintError::rendering(format!("invalid device pixel ratio {}", ratio)));
    }
    let width = (w as f64 * ratio).round();
    let height = (h as f64 * ratio).round();
    if width > MAX_RASTER_SIDE as f64 || height > MAX_RASTER_SIDE as f64 {
        return Err(PrintError::rendering(format!(
            "composite of {}x{} px exceeds the {} px limit",
            width, height, MAX_RASTER_SIDE
        )));
    }
    Ok(composite(guard.canvases(), (width as u32).max(1), (height as u32).max(1)))
}

/// Source-over composite of `canvases` (bottom first) onto a transparent
/// `width × height` raster.
pub fn composite(canvases: &[LayerCanvas], width: u32, height: u32) -> Snapshot {
    let mut out = RgbaImage::new(width.max(1), height.max(1));
    let mut tainted_by = None;
    for canvas in canvases {
        if !canvas.visible || canvas.opacity <= 0.0 {
            continue;
        }
        if canvas.image.width() == 0 || canvas.image.height() == 0 {
            continue;
        }
        if canvas.cross_origin_tainted && tainted_by.is_none() {
            log::warn!("canvas '{}' is cross-origin tainted", canvas.kind.label());
            tainted_by = Some(canvas.kind.label());
        }
        let transform = canvas.transform.unwrap_or(IDENTITY);
        if !draw_canvas(&mut out, &canvas.image, transform, canvas.opacity) {
            log::debug!("skipping canvas '{}' with singular transform", canvas.kind.label());
        }
    }
    Snapshot { image: out, tainted_by }
}

fn invert(m: Affine) -> Option<Affine> {
    let [a, b, c, d, e, f] = m;
    let det = a * d - b * c;
    if det.abs() < 1e-12 || !det.is_finite() {
        return None;
    }
    let ia = d / det;
    let ib = -b / det;
    let ic = -c / det;
    let id = a / det;
    Some([ia, ib, ic, id, -(ia * e + ic * f), -(ib * e + id * f)])
}

fn apply(m: &Affine, x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Nearest-neighbour inverse mapping over the transformed canvas bounds.
fn draw_canvas(dst: &mut RgbaImage, src: &RgbaImage, transform: Affine, opacity: f32) -> bool {
    let Some(inverse) = invert(transform) else { return false };
    let (sw, sh) = (src.width() as f64, src.height() as f64);
    let corners = [apply(&transform, 0.0, 0.0), apply(&transform, sw, 0.0), apply(&transform, 0.0, sh), apply(&transform, sw, sh)];
    let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min).floor().max(0.0);
    let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).floor().max(0.0);
    let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max).ceil().min(dst.width() as f64);
    let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil().min(dst.height() as f64);
    if !(min_x < max_x && min_y < max_y) {
        return true;
    }
    for y in min_y as u32..max_y as u32 {
        for x in min_x as u32..max_x as u32 {
            let (u, v) = apply(&inverse, x as f64 + 0.5, y as f64 + 0.5);
            if u < 0.0 || v < 0.0 || u >= sw || v >= sh {
                continue;
            }
            let s = *src.get_pixel(u as u32, v as u32);
            let d = dst.get_pixel_mut(x, y);
            *d = blend_over(*d, s, opacity);
        }
    }
    true
}

fn blend_over(dst: Rgba<u8>, src: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0 * opacity;
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let channel = |i: usize| {
        let v = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([channel(0), channel(1), channel(2), (out_a * 255.0).round().clamp(0.0, 255.0) as u8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{CanvasKind, StaticMapView};
    use geoprint_core::Coordinate;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn opaque_layer_covers_basemap() {
        let canvases = vec![
            LayerCanvas::new(CanvasKind::Basemap, solid(4, 4, [0, 0, 255, 255])),
            LayerCanvas::new(CanvasKind::Other("top".into()), solid(2, 2, [255, 0, 0, 255])),
        ];
        let img = composite(&canvases, 4, 4).export().unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(3, 3), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn opacity_blends() {
        let canvases = vec![
            LayerCanvas::new(CanvasKind::Basemap, solid(1, 1, [0, 0, 0, 255])),
            LayerCanvas::new(CanvasKind::Other("half".into()), solid(1, 1, [255, 255, 255, 255])).with_opacity(0.5),
        ];
        let img = composite(&canvases, 1, 1).export().unwrap();
        let p = img.get_pixel(0, 0);
        assert!((p[0] as i32 - 128).abs() <= 1);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn transform_scales_and_offsets() {
        // 2x2 canvas scaled by 2 and shifted right by 2 device pixels
        let canvases = vec![LayerCanvas::new(CanvasKind::Basemap, solid(2, 2, [9, 9, 9, 255]))
            .with_transform([2.0, 0.0, 0.0, 2.0, 2.0, 0.0])];
        let img = composite(&canvases, 8, 8).export().unwrap();
        assert_eq!(img.get_pixel(1, 1)[3], 0);
        assert_eq!(img.get_pixel(2, 0), &Rgba([9, 9, 9, 255]));
        assert_eq!(img.get_pixel(5, 3), &Rgba([9, 9, 9, 255]));
        assert_eq!(img.get_pixel(6, 4)[3], 0);
    }

    #[test]
    fn zero_sized_and_singular_canvases_are_skipped() {
        let canvases = vec![
            LayerCanvas::new(CanvasKind::Basemap, RgbaImage::new(0, 0)),
            LayerCanvas::new(CanvasKind::Other("flat".into()), solid(2, 2, [1, 2, 3, 255]))
                .with_transform([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ];
        let img = composite(&canvases, 2, 2).export().unwrap();
        assert!(img.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn tainted_canvas_blocks_export() {
        let canvases = vec![LayerCanvas::new(CanvasKind::Basemap, solid(2, 2, [1, 1, 1, 255])).tainted()];
        let snap = composite(&canvases, 2, 2);
        assert!(snap.is_tainted());
        match snap.export() {
            Err(PrintError::TaintedCanvas { layer }) => assert_eq!(layer, "basemap"),
            other => panic!("expected tainted error, got {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn capture_hides_overlay_and_restores_it() {
        let mut view = StaticMapView::new((4, 4), Coordinate::new(0.0, 0.0), 1.0)
            .with_pixel_ratio(2.0)
            .with_canvas(LayerCanvas::new(CanvasKind::Basemap, solid(8, 8, [0, 255, 0, 255])))
            .with_canvas(LayerCanvas::new(CanvasKind::SelectionOverlay, solid(8, 8, [255, 0, 255, 255])));
        let snap = capture(&mut view, Duration::from_millis(10)).unwrap();
        assert_eq!((snap.width(), snap.height()), (8, 8));
        let img = snap.export().unwrap();
        assert_eq!(img.get_pixel(3, 3), &Rgba([0, 255, 0, 255]));
        assert!(view.overlay_visible());
    }

    #[test]
    fn render_timeout_still_composites() {
        let mut view = StaticMapView::new((2, 2), Coordinate::new(0.0, 0.0), 1.0)
            .never_completes_render()
            .with_canvas(LayerCanvas::new(CanvasKind::Basemap, solid(2, 2, [7, 7, 7, 255])));
        let started = std::time::Instant::now();
        let img = capture(&mut view, Duration::from_millis(30)).unwrap().export().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(img.get_pixel(1, 1), &Rgba([7, 7, 7, 255]));
    }

    #[test]
    fn oversized_or_empty_viewport_is_a_rendering_error() {
        let mut huge = StaticMapView::new((12_000, 8_000), Coordinate::new(0.0, 0.0), 1.0).with_pixel_ratio(2.0);
        let err = capture(&mut huge, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, PrintError::Rendering { .. }), "got {:?}", err);
        assert!(huge.overlay_visible());

        let mut empty = StaticMapView::new((0, 300), Coordinate::new(0.0, 0.0), 1.0);
        let err = capture(&mut empty, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, PrintError::Rendering { .. }), "got {:?}", err);
    }
}
