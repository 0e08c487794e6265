//! Crop the composite to the selection rectangle.

use geoprint_core::Extent;
use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::view::MapView;

/// Pixel rectangle inside the composite raster (device pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Project the selection corners to device pixels and clamp them to the
/// raster. Never returns an empty rectangle, even for selections entirely
/// outside the viewport.
pub fn selection_rect<V: MapView + ?Sized>(view: &V, extent: &Extent, raster_w: u32, raster_h: u32) -> CropRect {
    let raster_w = raster_w.max(1);
    let raster_h = raster_h.max(1);
    let e = extent.normalized();
    let ratio = view.pixel_ratio();
    let projected = view
        .coordinate_to_pixel(e.north_west())
        .zip(view.coordinate_to_pixel(e.south_east()));
    let Some(((x0, y0), (x1, y1))) = projected else {
        log::debug!("selection corners could not be projected; using the full raster");
        return CropRect { x: 0, y: 0, width: raster_w, height: raster_h };
    };
    let clamp_x = |v: f64| if v.is_finite() { v.clamp(0.0, raster_w as f64) } else { 0.0 };
    let clamp_y = |v: f64| if v.is_finite() { v.clamp(0.0, raster_h as f64) } else { 0.0 };
    let left = clamp_x(x0.min(x1) * ratio).floor() as u32;
    let right = clamp_x(x0.max(x1) * ratio).ceil() as u32;
    let top = clamp_y(y0.min(y1) * ratio).floor() as u32;
    let bottom = clamp_y(y0.max(y1) * ratio).ceil() as u32;

    let x = left.min(raster_w - 1);
    let y = top.min(raster_h - 1);
    let width = right.saturating_sub(x).clamp(1, raster_w - x);
    let height = bottom.saturating_sub(y).clamp(1, raster_h - y);
    CropRect { x, y, width, height }
}

/// Output size for a crop: its CSS size times the print scale, at least 1×1.
pub fn output_size(rect: CropRect, pixel_ratio: f64, scale: f64) -> (u32, u32) {
    let ratio = if pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
    let w = (rect.width as f64 / ratio * scale).round().max(1.0) as u32;
    let h = (rect.height as f64 / ratio * scale).round().max(1.0) as u32;
    (w, h)
}

/// Cut `rect` out of `raster` and resample it to the print resolution.
pub fn crop_to_selection(raster: &RgbaImage, rect: CropRect, pixel_ratio: f64, scale: f64) -> RgbaImage {
    let region = imageops::crop_imm(raster, rect.x, rect.y, rect.width, rect.height).to_image();
    let (w, h) = output_size(rect, pixel_ratio, scale);
    if (w, h) == region.dimensions() {
        return region;
    }
    imageops::resize(&region, w, h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::StaticMapView;
    use geoprint_core::Coordinate;

    fn view() -> StaticMapView {
        // 100x50 CSS px, 1 unit per px, ratio 2 → 200x100 device px
        StaticMapView::new((100, 50), Coordinate::new(0.0, 0.0), 1.0).with_pixel_ratio(2.0)
    }

    #[test]
    fn inner_selection_maps_to_device_pixels() {
        let r = selection_rect(&view(), &Extent::new(-10.0, -5.0, 10.0, 5.0), 200, 100);
        assert_eq!(r, CropRect { x: 80, y: 40, width: 40, height: 20 });
        assert_eq!(output_size(r, 2.0, 300.0 / 96.0), (63, 31));
    }

    #[test]
    fn inverted_drag_gives_same_rect() {
        let a = selection_rect(&view(), &Extent::new(10.0, 5.0, -10.0, -5.0), 200, 100);
        let b = selection_rect(&view(), &Extent::new(-10.0, -5.0, 10.0, 5.0), 200, 100);
        assert_eq!(a, b);
    }

    #[test]
    fn partly_outside_is_clamped() {
        let r = selection_rect(&view(), &Extent::new(30.0, -100.0, 500.0, 0.0), 200, 100);
        assert_eq!(r, CropRect { x: 160, y: 50, width: 40, height: 50 });
    }

    #[test]
    fn fully_outside_is_never_empty() {
        let v = view();
        let r = selection_rect(&v, &Extent::new(1000.0, 1000.0, 2000.0, 2000.0), 200, 100);
        assert!(r.width >= 1 && r.height >= 1);
        assert!(r.x + r.width <= 200 && r.y + r.height <= 100);
        let raster = RgbaImage::new(200, 100);
        let out = crop_to_selection(&raster, r, 2.0, 0.5);
        assert!(out.width() >= 1 && out.height() >= 1);
    }

    #[test]
    fn crop_resamples_to_target_size() {
        let raster = RgbaImage::from_pixel(200, 100, image::Rgba([10, 20, 30, 255]));
        let r = CropRect { x: 0, y: 0, width: 200, height: 100 };
        let out = crop_to_selection(&raster, r, 2.0, 1.5625);
        assert_eq!(out.dimensions(), (156, 78));
        let p = out.get_pixel(10, 10);
        for (got, want) in p.0.iter().zip([10u8, 20, 30, 255]) {
            assert!((*got as i32 - want as i32).abs() <= 1);
        }
    }
}
