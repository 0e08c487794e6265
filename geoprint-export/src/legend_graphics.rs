//! Resolve a graphic for every legend item: fetched images for WMS layers,
//! style swatches for WFS layers.

use geoprint_core::legend::{LegendEntry, LegendGraphic, Swatch};
use geoprint_core::tree::{ServiceType, VisibleLegendItem};
use geoprint_core::PrintResult;
use image::RgbaImage;
use rayon::prelude::*;

use crate::remote::{AbortSignal, LegendGraphicSource, RemoteError};

/// Entries in legend order, with the decoded image for each entry whose
/// graphic is an image.
#[derive(Debug, Clone, Default)]
pub struct ResolvedLegend {
    pub entries: Vec<LegendEntry>,
    pub images: Vec<Option<RgbaImage>>,
}

impl ResolvedLegend {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unavailable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.graphic == LegendGraphic::Unavailable).count()
    }
}

fn fetch_image(
    source: &dyn LegendGraphicSource,
    base_url: &str,
    item: &VisibleLegendItem<'_>,
    abort: &AbortSignal,
) -> Option<RgbaImage> {
    if base_url.is_empty() {
        log::warn!("no legend service configured; {} has no legend image", item.layer.id);
        return None;
    }
    let bytes = match source.fetch_legend(base_url, item.layer, abort) {
        Ok(bytes) => bytes,
        Err(RemoteError::Aborted) => {
            log::debug!("legend fetch for {} aborted", item.layer.id);
            return None;
        }
        Err(err) => {
            log::warn!("legend for {} unavailable: {}", item.layer.id, err);
            return None;
        }
    };
    match image::load_from_memory(&bytes) {
        Ok(img) => Some(img.to_rgba8()),
        Err(err) => {
            log::warn!("legend for {} could not be decoded: {}", item.layer.id, err);
            None
        }
    }
}

/// Fetch all WMS legend images concurrently. A failed fetch degrades that
/// entry to [`LegendGraphic::Unavailable`]; only an abort fails the call.
pub fn resolve_legend(
    items: &[VisibleLegendItem<'_>],
    source: &dyn LegendGraphicSource,
    base_url: &str,
    abort: &AbortSignal,
) -> PrintResult<ResolvedLegend> {
    abort.check()?;
    let resolved: Vec<(LegendEntry, Option<RgbaImage>)> = items
        .par_iter()
        .map(|item| match item.layer.service_type {
            ServiceType::Wfs => {
                let swatch = Swatch::for_layer(item.layer);
                (LegendEntry::new(item, LegendGraphic::Swatch(swatch)), None)
            }
            ServiceType::Wms => match fetch_image(source, base_url, item, abort) {
                Some(img) => {
                    let graphic = LegendGraphic::Image { width_px: img.width(), height_px: img.height() };
                    (LegendEntry::new(item, graphic), Some(img))
                }
                None => (LegendEntry::new(item, LegendGraphic::Unavailable), None),
            },
        })
        .collect();
    abort.check()?;

    let (entries, images): (Vec<_>, Vec<_>) = resolved.into_iter().unzip();
    let legend = ResolvedLegend { entries, images };
    log::debug!("resolved {} legend entries, {} unavailable", legend.len(), legend.unavailable_count());
    Ok(legend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoprint_core::tree::{collect_visible_legend_items, Layer, LayerTree, VisibilityState};
    use std::io::Cursor;

    struct PngSource;

    impl LegendGraphicSource for PngSource {
        fn fetch_legend(&self, _: &str, layer: &Layer, _: &AbortSignal) -> Result<Vec<u8>, RemoteError> {
            if layer.layer_name.contains("broken") {
                return Err(RemoteError::Http { status: 404, url: "http://x/wms".into() });
            }
            let img = RgbaImage::from_pixel(20, 12, image::Rgba([200, 0, 0, 255]));
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, image::ImageFormat::Png).map_err(|e| RemoteError::Decode(e.to_string()))?;
            Ok(buf.into_inner())
        }
    }

    fn tree() -> LayerTree {
        LayerTree::from_json(
            r#"[{"id":"r1","title":"Base","serviceType":"WMS","workspace":"ws","layers":[
                {"id":"a","title":"Roads","layerName":"roads","workspace":"ws","serviceType":"WMS"},
                {"id":"b","title":"Broken","layerName":"broken","workspace":"ws","serviceType":"WMS"}]},
               {"id":"r2","title":"Points","serviceType":"WFS","workspace":"ws","layers":[
                {"id":"c","title":"Schools","layerName":"schools","workspace":"ws","serviceType":"WFS","geometryType":"Point"}]}]"#,
        )
        .unwrap()
    }

    #[test]
    fn mixes_images_swatches_and_failures() {
        let tree = tree();
        let items = collect_visible_legend_items(&tree, &VisibilityState::default());
        let legend = resolve_legend(&items, &PngSource, "http://x", &AbortSignal::new()).unwrap();
        assert_eq!(legend.len(), 3);
        assert_eq!(legend.entries[0].graphic, LegendGraphic::Image { width_px: 20, height_px: 12 });
        assert!(legend.images[0].is_some());
        assert_eq!(legend.entries[1].graphic, LegendGraphic::Unavailable);
        assert!(matches!(legend.entries[2].graphic, LegendGraphic::Swatch(_)));
        assert_eq!(legend.unavailable_count(), 1);
    }

    #[test]
    fn missing_base_url_degrades_wms_entries() {
        let tree = tree();
        let items = collect_visible_legend_items(&tree, &VisibilityState::default());
        let legend = resolve_legend(&items, &PngSource, "", &AbortSignal::new()).unwrap();
        assert_eq!(legend.unavailable_count(), 2);
    }

    #[test]
    fn abort_is_reported() {
        let tree = tree();
        let items = collect_visible_legend_items(&tree, &VisibilityState::default());
        let abort = AbortSignal::new();
        abort.abort();
        assert!(resolve_legend(&items, &PngSource, "http://x", &abort).unwrap_err().is_aborted());
    }
}
