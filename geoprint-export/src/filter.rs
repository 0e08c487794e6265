//! Drop legend items whose layers show nothing inside the print extent.

use geoprint_core::crs::{CrsCode, CrsRegistry, EPSG_GEOGRAPHIC, MAP_CRS};
use geoprint_core::legend::ContentCheck;
use geoprint_core::tree::{Layer, ServiceType, VisibleLegendItem};
use geoprint_core::{Extent, PrintResult, PrintSettings};
use rayon::prelude::*;

use crate::remote::{classify_feature_info, combine_probe_outcomes, probe_requests, AbortSignal, FeatureInfoProbe, ProbeOutcome};
use crate::view::MapView;

/// Zoom range gate.
pub fn check_zoom(layer: &Layer, zoom: f64) -> ContentCheck {
    if layer.zoom_in_range(zoom) {
        ContentCheck::Included
    } else {
        ContentCheck::Excluded
    }
}

/// Compare the print extent with the layer's declared bounds, geographic
/// bounds preferred.
pub fn check_bounds(registry: &CrsRegistry, layer: &Layer, extent: &Extent) -> ContentCheck {
    let Some(bounds) = layer.bbox.as_ref() else { return ContentCheck::Unknown };
    let declared = bounds
        .lat_lon
        .as_ref()
        .map(|b| (b, b.crs.as_deref().and_then(CrsCode::extract).unwrap_or(EPSG_GEOGRAPHIC)))
        .or_else(|| {
            bounds.native.as_ref().and_then(|b| {
                b.crs
                    .as_deref()
                    .or(layer.native_crs.as_deref())
                    .and_then(CrsCode::extract)
                    .map(|code| (b, code))
            })
        });
    let Some((bbox, code)) = declared else { return ContentCheck::Unknown };
    match registry.transform_extent(extent, MAP_CRS, code) {
        Ok(print_extent) if print_extent.intersects(&bbox.extent.normalized()) => ContentCheck::Included,
        Ok(_) => ContentCheck::Excluded,
        Err(err) => {
            log::debug!("bounds check for {} skipped: {}", layer.id, err);
            ContentCheck::Unknown
        }
    }
}

/// In-memory vector feature count.
pub fn check_vector_features<V: MapView + ?Sized>(view: &V, layer: &Layer, extent: &Extent) -> ContentCheck {
    match view.features_in_extent(&layer.id, extent) {
        Some(0) => ContentCheck::Excluded,
        Some(_) => ContentCheck::Included,
        None => ContentCheck::Unknown,
    }
}

/// GetFeatureInfo sampling for a server-rendered layer.
pub fn check_raster_probes(
    probe: &dyn FeatureInfoProbe,
    base_url: &str,
    layer: &Layer,
    extent: &Extent,
    samples: usize,
    abort: &AbortSignal,
) -> ContentCheck {
    let outcomes = probe_requests(layer, extent, samples).into_iter().map(|req| {
        match probe.probe(base_url, &req, abort) {
            Ok(response) => classify_feature_info(&response),
            Err(err) => {
                log::debug!("probe of {} at ({}, {}) failed: {}", layer.id, req.x, req.y, err);
                ProbeOutcome::Ambiguous
            }
        }
    });
    combine_probe_outcomes(outcomes)
}

/// Keep the items whose layers have (or may have) content in `extent`.
///
/// Cheap local checks run first; remote probes for the remaining WMS layers
/// run in parallel. Order is preserved.
#[allow(clippy::too_many_arguments)]
pub fn filter_by_content<'a, V: MapView + ?Sized>(
    items: Vec<VisibleLegendItem<'a>>,
    view: &V,
    registry: &CrsRegistry,
    probe: &dyn FeatureInfoProbe,
    base_url: &str,
    extent: &Extent,
    settings: &PrintSettings,
    abort: &AbortSignal,
) -> PrintResult<Vec<VisibleLegendItem<'a>>> {
    let zoom = view.zoom();
    let local: Vec<ContentCheck> = items
        .iter()
        .map(|item| {
            let layer = item.layer;
            if check_zoom(layer, zoom) == ContentCheck::Excluded {
                log::debug!("{} is outside its zoom range at zoom {}", layer.id, zoom);
                return ContentCheck::Excluded;
            }
            if check_bounds(registry, layer, extent) == ContentCheck::Excluded {
                log::debug!("{} bounds do not touch the print extent", layer.id);
                return ContentCheck::Excluded;
            }
            match layer.service_type {
                ServiceType::Wfs => check_vector_features(view, layer, extent),
                ServiceType::Wms => ContentCheck::Unknown,
            }
        })
        .collect();

    abort.check()?;
    let checks: Vec<ContentCheck> = items
        .par_iter()
        .zip(local.par_iter())
        .map(|(item, &local)| {
            let needs_probe = local == ContentCheck::Unknown && item.layer.service_type == ServiceType::Wms;
            if needs_probe && !base_url.is_empty() {
                check_raster_probes(probe, base_url, item.layer, extent, settings.probe_samples, abort)
            } else {
                local
            }
        })
        .collect();
    abort.check()?;

    let before = items.len();
    let kept: Vec<_> = items
        .into_iter()
        .zip(checks)
        .filter(|(_, check)| check.is_included())
        .map(|(item, _)| item)
        .collect();
    log::info!("legend content filter kept {} of {} layers", kept.len(), before);
    Ok(kept)
}
