use std::sync::Arc;

use geoprint_core::legend::{LEGEND_UNAVAILABLE, NO_VISIBLE_LAYERS};
use geoprint_core::tree::Layer;
use geoprint_core::{Coordinate, Extent, LayerTree, PrintError, PrintRequest, PrintSettings};
use geoprint_export::remote::{ProbeRequest, ProbeResponse};
use geoprint_export::{
    AbortSignal, CanvasKind, FeatureInfoProbe, LayerCanvas, LegendGraphicSource, PrintCompositor, RemoteError,
    StaticMapView,
};
use image::{Rgba, RgbaImage};
use tempfile::NamedTempFile;

struct Offline;

impl LegendGraphicSource for Offline {
    fn fetch_legend(&self, _: &str, _: &Layer, _: &AbortSignal) -> Result<Vec<u8>, RemoteError> {
        Err(RemoteError::Transport("offline".into()))
    }
}

impl FeatureInfoProbe for Offline {
    fn probe(&self, _: &str, _: &ProbeRequest, _: &AbortSignal) -> Result<ProbeResponse, RemoteError> {
        Err(RemoteError::Transport("offline".into()))
    }
}

fn settings() -> PrintSettings {
    PrintSettings { render_wait_ms: 20, filter_legend_by_content: false, ..Default::default() }
}

fn compositor(settings: PrintSettings) -> PrintCompositor {
    let offline = Arc::new(Offline);
    PrintCompositor::with_services(settings, offline.clone(), offline)
}

/// 200x150 px at 10 m/px around central Porto Alegre (Web Mercator).
fn view() -> StaticMapView {
    StaticMapView::new((200, 150), Coordinate::new(-5_702_000.0, -3_509_000.0), 10.0)
        .with_zoom(14.0)
        .with_canvas(LayerCanvas::new(CanvasKind::Basemap, RgbaImage::from_pixel(200, 150, Rgba([230, 230, 220, 255]))))
        .with_canvas(LayerCanvas::new(CanvasKind::SelectionOverlay, RgbaImage::from_pixel(200, 150, Rgba([0, 0, 255, 80]))))
}

fn selection() -> Extent {
    Extent::new(-5_702_500.0, -3_509_400.0, -5_701_500.0, -3_508_600.0)
}

fn tree_with(layers: &[(&str, &str)]) -> LayerTree {
    let layers: Vec<String> = layers
        .iter()
        .map(|(id, service)| {
            format!(
                r#"{{"id":"{id}","title":"Layer {id}","layerName":"{id}","workspace":"ws","serviceType":"{service}"}}"#
            )
        })
        .collect();
    LayerTree::from_json(&format!(
        r#"[{{"id":"root","title":"Infrastructure","serviceType":"WFS","workspace":"ws","layers":[{}]}}]"#,
        layers.join(",")
    ))
    .expect("valid tree json")
}

#[test]
fn print_without_legend_is_one_page() {
    let mut request = PrintRequest::new(selection(), LayerTree::default());
    request.include_legends = false;
    request.title = "Centro".into();
    let mut view = view();
    let output = compositor(settings()).print(&mut view, request, &AbortSignal::new()).expect("print");

    assert!(output.pdf.starts_with(b"%PDF"));
    assert_eq!(output.summary.page_count, 1);
    assert_eq!(output.summary.legend_entries, 0);
    assert!(output.summary.scale.is_some());
    assert!(output.text.iter().any(|t| t == "Centro"));
    assert!(!output.text.iter().any(|t| t == "Legend"));
    // 100x80 CSS px at 150 dpi
    assert_eq!((output.summary.map_width_px, output.summary.map_height_px), (156, 125));
    assert!(view.overlay_visible());

    let file = NamedTempFile::new().expect("tmp pdf");
    output.write_to_file(file.path()).expect("write pdf");
    assert_eq!(std::fs::metadata(file.path()).unwrap().len() as usize, output.pdf.len());
}

#[test]
fn empty_legend_still_prints() {
    let mut request = PrintRequest::new(selection(), tree_with(&[("a", "WFS")]));
    request.visibility.set_root("root", false);
    let output = compositor(settings()).print(&mut view(), request, &AbortSignal::new()).expect("print");
    assert_eq!(output.summary.page_count, 1);
    assert_eq!(output.summary.legend_entries, 0);
    assert!(output.text.iter().any(|t| t == NO_VISIBLE_LAYERS), "text: {:?}", output.text);
}

#[test]
fn failed_legend_fetch_degrades_entry() {
    let mut request = PrintRequest::new(selection(), tree_with(&[("roads", "WMS"), ("schools", "WFS")]));
    request.legend_service_base_url = "http://geoserver.invalid/geoserver".into();
    let output = compositor(settings()).print(&mut view(), request, &AbortSignal::new()).expect("print");
    assert_eq!(output.summary.legend_entries, 2);
    assert_eq!(output.summary.unavailable_legends, 1);
    assert_eq!(output.text.iter().filter(|t| *t == LEGEND_UNAVAILABLE).count(), 1);
    assert!(output.text.iter().any(|t| t == "Layer roads"));
    assert!(output.text.iter().any(|t| t == "Layer schools"));
    assert!(!output.text.iter().any(|t| t == NO_VISIBLE_LAYERS));
}

#[test]
fn content_filter_fails_open_when_probes_fail() {
    let mut request = PrintRequest::new(selection(), tree_with(&[("roads", "WMS")]));
    request.legend_service_base_url = "http://geoserver.invalid/geoserver".into();
    let settings = PrintSettings { filter_legend_by_content: true, ..settings() };
    let output = compositor(settings).print(&mut view(), request, &AbortSignal::new()).expect("print");
    assert_eq!(output.summary.legend_entries, 1);
}

#[test]
fn long_legend_continues_on_extra_pages() {
    let ids: Vec<String> = (0..60).map(|i| format!("l{:02}", i)).collect();
    let layers: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "WFS")).collect();
    let request = PrintRequest::new(selection(), tree_with(&layers));
    let output = compositor(settings()).print(&mut view(), request, &AbortSignal::new()).expect("print");
    assert_eq!(output.summary.legend_entries, 60);
    assert!(output.summary.page_count >= 2, "got {} pages", output.summary.page_count);
}

#[test]
fn selection_outside_viewport_still_prints() {
    let far = Extent::new(-5_600_000.0, -3_400_000.0, -5_599_000.0, -3_399_000.0);
    let mut request = PrintRequest::new(far, LayerTree::default());
    request.include_legends = false;
    let output = compositor(settings()).print(&mut view(), request, &AbortSignal::new()).expect("print");
    assert!(output.summary.map_width_px >= 1 && output.summary.map_height_px >= 1);
}

#[test]
fn tainted_canvas_fails_and_restores_overlay() {
    let mut view = view().with_canvas(
        LayerCanvas::new(CanvasKind::Other("osm".into()), RgbaImage::from_pixel(200, 150, Rgba([1, 2, 3, 255]))).tainted(),
    );
    let request = PrintRequest::new(selection(), LayerTree::default());
    let err = compositor(settings()).print(&mut view, request, &AbortSignal::new()).unwrap_err();
    assert!(matches!(err, PrintError::TaintedCanvas { ref layer } if layer == "osm"));
    assert!(view.overlay_visible());
}

#[test]
fn slow_render_still_prints() {
    let mut view = view().never_completes_render();
    let mut request = PrintRequest::new(selection(), LayerTree::default());
    request.include_legends = false;
    let output = compositor(settings()).print(&mut view, request, &AbortSignal::new()).expect("print");
    assert_eq!(output.summary.page_count, 1);
}

#[test]
fn abort_and_invalid_extent_are_reported() {
    let request = PrintRequest::new(selection(), LayerTree::default());
    let abort = AbortSignal::new();
    abort.abort();
    let err = compositor(settings()).print(&mut view(), request, &abort).unwrap_err();
    assert!(err.is_aborted());

    let bad = PrintRequest::new(Extent::new(f64::NAN, 0.0, 1.0, 1.0), LayerTree::default());
    let err = compositor(settings()).print(&mut view(), bad, &AbortSignal::new()).unwrap_err();
    assert!(matches!(err, PrintError::InvalidRequest { .. }));
}

#[test]
fn unrasterisable_view_fails_and_restores_overlay() {
    let mut view = StaticMapView::new((0, 150), Coordinate::new(-5_702_000.0, -3_509_000.0), 10.0)
        .with_canvas(LayerCanvas::new(CanvasKind::SelectionOverlay, RgbaImage::from_pixel(1, 1, Rgba([0, 0, 255, 80]))));
    let request = PrintRequest::new(selection(), LayerTree::default());
    let err = compositor(settings()).print(&mut view, request, &AbortSignal::new()).unwrap_err();
    assert!(matches!(err, PrintError::Rendering { .. }), "got {:?}", err);
    assert!(view.overlay_visible());
}
