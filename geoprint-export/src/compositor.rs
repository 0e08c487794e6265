//! The print pipeline: snapshot, crop, legend and PDF in one call.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use geoprint_core::coords::coordinate_blocks;
use geoprint_core::layout::PageSpec;
use geoprint_core::legend::LegendMetrics;
use geoprint_core::scale::ground_width_m;
use geoprint_core::{collect_visible_legend_items, CrsRegistry, PrintError, PrintRequest, PrintResult, PrintSettings};
use serde::Serialize;

use crate::crop::{crop_to_selection, selection_rect};
use crate::filter::filter_by_content;
use crate::legend_graphics::{resolve_legend, ResolvedLegend};
use crate::pdf::{render_document, DocumentContent, LegendContent};
use crate::remote::{AbortSignal, FeatureInfoProbe, LegendGraphicSource, WmsClient};
use crate::snapshot::capture;
use crate::view::MapView;

/// What a finished print produced.
#[derive(Debug, Clone)]
pub struct PrintOutput {
    pub pdf: Vec<u8>,
    pub summary: PrintSummary,
    /// Text runs drawn on the pages, in drawing order.
    pub text: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintSummary {
    pub page_count: usize,
    pub map_width_px: u32,
    pub map_height_px: u32,
    pub legend_entries: usize,
    pub unavailable_legends: usize,
    pub scale: Option<String>,
    pub elapsed_ms: u128,
}

impl PrintOutput {
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&self.pdf)?;
        file.flush()
    }
}

/// Print compositor bound to one set of settings and remote services.
pub struct PrintCompositor {
    settings: PrintSettings,
    registry: CrsRegistry,
    legend_source: Arc<dyn LegendGraphicSource>,
    probe: Arc<dyn FeatureInfoProbe>,
}

impl PrintCompositor {
    /// Compositor talking to the WMS endpoint given in each request.
    pub fn new(settings: PrintSettings) -> Self {
        let client = Arc::new(WmsClient::from_settings(&settings));
        Self::with_services(settings, client.clone(), client)
    }

    pub fn with_services(
        settings: PrintSettings,
        legend_source: Arc<dyn LegendGraphicSource>,
        probe: Arc<dyn FeatureInfoProbe>,
    ) -> Self {
        Self { settings, registry: CrsRegistry::default(), legend_source, probe }
    }

    pub fn with_registry(mut self, registry: CrsRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &PrintSettings {
        &self.settings
    }

    /// Produce the PDF for `request` from the current state of `view`.
    ///
    /// Fails only on an invalid request, a view that cannot be rasterised, a
    /// tainted canvas, an abort or a PDF serialization error. Missing legends, failed probes and failed
    /// coordinate transforms degrade the output instead.
    pub fn print<V: MapView + ?Sized>(
        &self,
        view: &mut V,
        request: PrintRequest,
        abort: &AbortSignal,
    ) -> PrintResult<PrintOutput> {
        let started = Instant::now();
        abort.check()?;
        if !request.selection_extent.is_finite() {
            return Err(PrintError::invalid_request(format!(
                "selection extent {} is not finite",
                request.selection_extent
            )));
        }
        let extent = request.selection_extent.normalized();
        log::info!(
            "printing {} on {:?} {:?} at {} dpi",
            extent,
            request.paper,
            request.orientation,
            request.dpi.value()
        );

        let snapshot = capture(view, Duration::from_millis(self.settings.render_wait_ms))?;
        let raster = snapshot.export()?;
        abort.check()?;
        log::info!("snapshot captured: {}x{} px", raster.width(), raster.height());

        let rect = selection_rect(view, &extent, raster.width(), raster.height());
        let scale = request.output_scale(self.settings.min_output_scale);
        let map_image = crop_to_selection(&raster, rect, view.pixel_ratio(), scale);
        drop(raster);
        log::info!("map cropped to {}x{} px (scale {:.3})", map_image.width(), map_image.height(), scale);

        let ground_width = ground_width_m(&self.registry, &extent);
        let coordinates = coordinate_blocks(&self.registry, &extent, request.selection_points.as_ref());

        let legend = if request.include_legends {
            Some(self.build_legend(&*view, &request, &extent, abort)?)
        } else {
            None
        };
        abort.check()?;

        let metrics = LegendMetrics { max_image_height_mm: self.settings.max_legend_image_height_mm, ..Default::default() };
        let page = PageSpec::new(request.paper, request.orientation);
        let timestamp = format!("Printed {}", chrono::Local::now().format("%Y-%m-%d %H:%M"));
        let content = DocumentContent {
            title: &request.title,
            timestamp,
            page,
            margin_mm: self.settings.margin_mm,
            map_image: &map_image,
            ground_width_m: ground_width,
            coordinates: &coordinates,
            legend: legend.as_ref().map(|l| LegendContent {
                entries: &l.entries,
                images: &l.images,
                metrics,
                two_column_min_width_mm: self.settings.two_column_min_width_mm,
            }),
        };
        let document = render_document(&content)?;

        let summary = PrintSummary {
            page_count: document.page_count,
            map_width_px: map_image.width(),
            map_height_px: map_image.height(),
            legend_entries: legend.as_ref().map_or(0, ResolvedLegend::len),
            unavailable_legends: legend.as_ref().map_or(0, ResolvedLegend::unavailable_count),
            scale: document.scale.clone(),
            elapsed_ms: started.elapsed().as_millis(),
        };
        log::info!(
            "print finished: {} page(s), {} bytes in {} ms",
            summary.page_count,
            document.bytes.len(),
            summary.elapsed_ms
        );
        Ok(PrintOutput { pdf: document.bytes, summary, text: document.text })
    }

    fn build_legend<V: MapView + ?Sized>(
        &self,
        view: &V,
        request: &PrintRequest,
        extent: &geoprint_core::Extent,
        abort: &AbortSignal,
    ) -> PrintResult<ResolvedLegend> {
        let mut items = collect_visible_legend_items(&request.layer_tree, &request.visibility);
        log::info!("{} visible layers eligible for the legend", items.len());
        if self.settings.filter_legend_by_content && !items.is_empty() {
            items = filter_by_content(
                items,
                view,
                &self.registry,
                self.probe.as_ref(),
                &request.legend_service_base_url,
                extent,
                &self.settings,
                abort,
            )?;
        }
        resolve_legend(&items, self.legend_source.as_ref(), &request.legend_service_base_url, abort)
    }
}
