/*!
# PDF Export

Draws the print: header, cropped map image, footer (scale bar, approximate
scale, coordinate readout) and the legend pages. Layout decisions come from
`geoprint_core::layout` and `geoprint_core::legend`; this module only paints.
*/

use geoprint_core::coords::CoordinateBlock;
use geoprint_core::layout::{
    continuation_area, fit_preserving_aspect, legend_columns, line_height_mm, page_one_layout, wrap_text, PageSpec,
    Rect, CONTINUATION_HEADER_MM, SCALE_COLUMN_MM,
};
use geoprint_core::legend::{
    plan_legend, LegendArea, LegendEntry, LegendGraphic, LegendMetrics, LegendPlacement, LegendRow, Swatch,
    LEGEND_UNAVAILABLE,
};
use geoprint_core::scale::{format_scale, scale_denominator, ScaleBar};
use geoprint_core::tree::{Color, GeometryType};
use geoprint_core::{PrintError, PrintResult};
use image::RgbaImage;
use std::cell::RefCell;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Polygon, Px, Rgb,
};

const IMAGE_DPI: f32 = 300.0;
const FOOTER_PT: f32 = 7.0;
const TEXT: Color = Color::rgb(0.1, 0.1, 0.1);
const MUTED: Color = Color::rgb(0.45, 0.45, 0.45);
const RULE: Color = Color::rgb(0.6, 0.6, 0.6);
const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

/// Flatten a colour with alpha onto white paper.
fn pdf_color(c: Color) -> printpdf::Color {
    let a = c.a.clamp(0.0, 1.0);
    let mix = |v: f32| v * a + (1.0 - a);
    printpdf::Color::Rgb(Rgb::new(mix(c.r), mix(c.g), mix(c.b), None))
}

/// Thin wrapper over a printpdf document with builtin Helvetica fonts.
pub struct PdfBuilder {
    doc: PdfDocumentReference,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    page: PageSpec,
    runs: RefCell<Vec<String>>,
}

impl PdfBuilder {
    pub fn new(title: &str, page: PageSpec) -> PrintResult<Self> {
        let (doc, first_page, first_layer) =
            PdfDocument::new(title, Mm(page.width_mm), Mm(page.height_mm), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| PrintError::pdf(format!("loading Helvetica: {}", e)))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| PrintError::pdf(format!("loading Helvetica-Bold: {}", e)))?;
        Ok(Self { doc, pages: vec![(first_page, first_layer)], regular, bold, page, runs: RefCell::default() })
    }

    pub fn add_page(&mut self) -> usize {
        let (page, layer) = self.doc.add_page(Mm(self.page.width_mm), Mm(self.page.height_mm), "Layer 1");
        self.pages.push((page, layer));
        self.pages.len() - 1
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn layer(&self, page: usize) -> PdfLayerReference {
        let (p, l) = self.pages.get(page).copied().unwrap_or(self.pages[0]);
        self.doc.get_page(p).get_layer(l)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn text(&self, page: usize, x: f32, y: f32, size_pt: f32, bold: bool, color: Color, text: &str) {
        let layer = self.layer(page);
        layer.set_fill_color(pdf_color(color));
        let font = if bold { &self.bold } else { &self.regular };
        layer.use_text(text, size_pt, Mm(x), Mm(y), font);
        self.runs.borrow_mut().push(text.to_string());
    }

    /// Every text run drawn so far, in drawing order.
    pub fn text_runs(&self) -> Vec<String> {
        self.runs.borrow().clone()
    }

    /// Wrap `text` into `width` and draw it downwards from `top`; returns the
    /// height used.
    #[allow(clippy::too_many_arguments)]
    pub fn text_block(&self, page: usize, x: f32, top: f32, width: f32, size_pt: f32, bold: bool, color: Color, text: &str) -> f32 {
        let lh = line_height_mm(size_pt);
        let lines = wrap_text(text, size_pt, width);
        for (i, line) in lines.iter().enumerate() {
            let baseline = top - lh * (i as f32) - lh * 0.78;
            self.text(page, x, baseline, size_pt, bold, color, line);
        }
        lh * lines.len() as f32
    }

    pub fn line(&self, page: usize, from: (f32, f32), to: (f32, f32), thickness_pt: f32, color: Color) {
        let layer = self.layer(page);
        layer.set_outline_color(pdf_color(color));
        layer.set_outline_thickness(thickness_pt);
        layer.add_line(Line {
            points: vec![(Point::new(Mm(from.0), Mm(from.1)), false), (Point::new(Mm(to.0), Mm(to.1)), false)],
            is_closed: false,
        });
    }

    fn shape(&self, page: usize, points: Vec<(Point, bool)>, fill: Option<Color>, stroke: Option<(Color, f32)>) {
        let layer = self.layer(page);
        if let Some(color) = fill {
            layer.set_fill_color(pdf_color(color));
        }
        if let Some((color, width)) = stroke {
            layer.set_outline_color(pdf_color(color));
            layer.set_outline_thickness(width);
        }
        let mode = match (fill.is_some(), stroke.is_some()) {
            (true, true) => PaintMode::FillStroke,
            (true, false) => PaintMode::Fill,
            (false, true) => PaintMode::Stroke,
            (false, false) => return,
        };
        layer.add_polygon(Polygon { rings: vec![points], mode, winding_order: WindingOrder::NonZero });
    }

    pub fn rect(&self, page: usize, r: Rect, fill: Option<Color>, stroke: Option<(Color, f32)>) {
        let points = vec![
            (Point::new(Mm(r.x), Mm(r.y)), false),
            (Point::new(Mm(r.right()), Mm(r.y)), false),
            (Point::new(Mm(r.right()), Mm(r.top())), false),
            (Point::new(Mm(r.x), Mm(r.top())), false),
        ];
        self.shape(page, points, fill, stroke);
    }

    pub fn circle(&self, page: usize, cx: f32, cy: f32, radius: f32, fill: Option<Color>, stroke: Option<(Color, f32)>) {
        let segments = 24;
        let points = (0..segments)
            .map(|i| {
                let angle = 2.0 * std::f32::consts::PI * i as f32 / segments as f32;
                (Point::new(Mm(cx + radius * angle.cos()), Mm(cy + radius * angle.sin())), false)
            })
            .collect();
        self.shape(page, points, fill, stroke);
    }

    /// Place an RGBA raster (flattened onto white) into `target`.
    pub fn image(&self, page: usize, raster: &RgbaImage, target: Rect) {
        let (w, h) = raster.dimensions();
        if w == 0 || h == 0 || target.width <= 0.0 || target.height <= 0.0 {
            return;
        }
        let mut rgb = Vec::with_capacity((w * h * 3) as usize);
        for px in raster.pixels() {
            let a = px[3] as f32 / 255.0;
            for c in 0..3 {
                rgb.push((px[c] as f32 * a + 255.0 * (1.0 - a)).round() as u8);
            }
        }
        let image = Image::from(ImageXObject {
            width: Px(w as usize),
            height: Px(h as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: rgb,
            image_filter: None,
            clipping_bbox: None,
            smask: None,
        });
        let natural_w = w as f32 / IMAGE_DPI * 25.4;
        let natural_h = h as f32 / IMAGE_DPI * 25.4;
        image.add_to_layer(
            self.layer(page),
            ImageTransform {
                translate_x: Some(Mm(target.x)),
                translate_y: Some(Mm(target.y)),
                scale_x: Some(target.width / natural_w),
                scale_y: Some(target.height / natural_h),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
    }

    pub fn finish(self) -> PrintResult<Vec<u8>> {
        self.doc.save_to_bytes().map_err(|e| PrintError::pdf(e.to_string()))
    }
}

/// Legend data handed to the renderer. `images[i]` holds the decoded image
/// for `entries[i]` when its graphic is [`LegendGraphic::Image`].
pub struct LegendContent<'a> {
    pub entries: &'a [LegendEntry],
    pub images: &'a [Option<RgbaImage>],
    pub metrics: LegendMetrics,
    pub two_column_min_width_mm: f32,
}

pub struct DocumentContent<'a> {
    pub title: &'a str,
    pub timestamp: String,
    pub page: PageSpec,
    pub margin_mm: f32,
    pub map_image: &'a RgbaImage,
    pub ground_width_m: Option<f64>,
    pub coordinates: &'a [CoordinateBlock],
    pub legend: Option<LegendContent<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Approximate scale as printed, e.g. `1:22 000`.
    pub scale: Option<String>,
    /// Text runs in drawing order.
    pub text: Vec<String>,
}

struct FooterText {
    heading: String,
    lines: Vec<String>,
}

fn wrap_coordinates(blocks: &[CoordinateBlock], width: f32) -> Vec<FooterText> {
    blocks
        .iter()
        .map(|b| FooterText {
            heading: b.heading.clone(),
            lines: b.lines.iter().flat_map(|l| wrap_text(l, FOOTER_PT, width)).collect(),
        })
        .collect()
}

fn footer_text_height(blocks: &[FooterText]) -> f32 {
    let lh = line_height_mm(FOOTER_PT);
    blocks.iter().map(|b| lh * (1 + b.lines.len()) as f32 + 1.0).sum()
}

pub fn render_document(content: &DocumentContent<'_>) -> PrintResult<RenderedDocument> {
    let title = if content.title.trim().is_empty() { "Map print" } else { content.title };
    let mut pdf = PdfBuilder::new(title, content.page)?;
    let margin = content.margin_mm;
    let content_width = content.page.width_mm - 2.0 * margin;

    let coord_width = (content_width - SCALE_COLUMN_MM - 4.0).max(20.0);
    let footer_blocks = wrap_coordinates(content.coordinates, coord_width);
    let footer_height = footer_text_height(&footer_blocks).max(16.0) + 3.0;
    let layout = page_one_layout(content.page, margin, footer_height, content.legend.is_some());

    // Header
    pdf.text(0, layout.header.x, layout.header.top() - 6.0, 14.0, true, TEXT, title);
    pdf.text(0, layout.header.x, layout.header.top() - 11.5, 8.0, false, MUTED, &content.timestamp);
    pdf.line(0, (layout.header.x, layout.header.y), (layout.header.right(), layout.header.y), 0.5, RULE);

    // Map
    let (img_w, img_h) = content.map_image.dimensions();
    let image_rect = fit_preserving_aspect(layout.map_box, img_w, img_h);
    pdf.image(0, content.map_image, image_rect);
    pdf.rect(0, image_rect, None, Some((RULE, 0.5)));

    // Footer
    let footer = layout.footer;
    pdf.line(0, (footer.x, footer.top()), (footer.right(), footer.top()), 0.5, RULE);
    let column_top = footer.top() - 3.0;
    let scale = content
        .ground_width_m
        .and_then(|ground| scale_denominator(ground, image_rect.width))
        .map(format_scale);
    if let Some(ground) = content.ground_width_m {
        draw_scale(&pdf, footer.x, column_top, ground, image_rect.width, scale.as_deref());
    }
    let lh = line_height_mm(FOOTER_PT);
    let mut y = column_top;
    let text_x = footer.x + SCALE_COLUMN_MM;
    for block in &footer_blocks {
        pdf.text(0, text_x, y - lh * 0.78, FOOTER_PT, true, TEXT, &block.heading);
        y -= lh;
        for line in &block.lines {
            pdf.text(0, text_x, y - lh * 0.78, FOOTER_PT, false, TEXT, line);
            y -= lh;
        }
        y -= 1.0;
    }

    // Legend
    if let (Some(legend), Some(panel)) = (content.legend.as_ref(), layout.legend_panel) {
        let title_height = line_height_mm(legend.metrics.title_pt) + 2.0;
        pdf.text(0, panel.x, panel.top() - line_height_mm(legend.metrics.title_pt) * 0.78, legend.metrics.title_pt, true, TEXT, "Legend");
        let first_rect = Rect::new(panel.x, panel.y, panel.width, (panel.height - title_height).max(1.0));
        let first = LegendArea { rect: first_rect, columns: legend_columns(panel.width, legend.two_column_min_width_mm) };
        let continuation = LegendArea { rect: continuation_area(content.page, margin), columns: 2 };
        let plan = plan_legend(legend.entries, first, continuation, &legend.metrics);
        for n in 0..plan.continuation_pages {
            let page = pdf.add_page();
            let top = content.page.height_mm - margin;
            let label = format!("Legend (continued, {}/{})", n + 1, plan.continuation_pages);
            pdf.text(page, margin, top - 6.0, 11.0, true, TEXT, &label);
            pdf.line(page, (margin, top - CONTINUATION_HEADER_MM + 1.0), (margin + content_width, top - CONTINUATION_HEADER_MM + 1.0), 0.5, RULE);
        }
        for placement in &plan.placements {
            draw_legend_row(&pdf, placement, legend);
        }
        log::info!(
            "legend: {} entries on {} page(s)",
            legend.entries.len(),
            plan.continuation_pages + 1
        );
    }

    let page_count = pdf.page_count();
    let text = pdf.text_runs();
    let bytes = pdf.finish()?;
    Ok(RenderedDocument { bytes, page_count, scale, text })
}

/// Alternating two-segment bar with end labels and the `1:N` line below.
fn draw_scale(pdf: &PdfBuilder, x: f32, top: f32, ground_width_m: f64, image_width_mm: f32, scale: Option<&str>) {
    let Some(bar) = ScaleBar::compute(ground_width_m, image_width_mm, SCALE_COLUMN_MM - 8.0) else {
        log::debug!("scale bar not computable for ground width {}", ground_width_m);
        return;
    };
    let bar_y = top - 7.0;
    let half = bar.length_mm / 2.0;
    pdf.rect(0, Rect::new(x, bar_y, half, 1.6), Some(TEXT), Some((TEXT, 0.4)));
    pdf.rect(0, Rect::new(x + half, bar_y, half, 1.6), Some(WHITE), Some((TEXT, 0.4)));
    pdf.text(0, x, bar_y + 2.6, FOOTER_PT, false, TEXT, "0");
    pdf.text(0, x + bar.length_mm - 2.0, bar_y + 2.6, FOOTER_PT, false, TEXT, &bar.label);
    if let Some(scale) = scale {
        pdf.text(0, x, bar_y - 4.5, FOOTER_PT, false, MUTED, &format!("Approx. scale {}", scale));
    }
}

fn draw_legend_row(pdf: &PdfBuilder, placement: &LegendPlacement, legend: &LegendContent<'_>) {
    let m = &legend.metrics;
    let (page, x, top, width) = (placement.page, placement.x_mm, placement.top_mm, placement.width_mm);
    match &placement.row {
        LegendRow::RootHeader(title) => {
            pdf.text_block(page, x, top, width, m.root_header_pt, true, TEXT, title);
        }
        LegendRow::ThematicHeader(title) => {
            pdf.text_block(page, x + 1.0, top, width - 1.0, m.thematic_header_pt, true, MUTED, title);
        }
        LegendRow::Message(text) => {
            pdf.text_block(page, x, top, width, m.entry_pt, false, MUTED, text);
        }
        LegendRow::Entry(idx) => {
            let Some(entry) = legend.entries.get(*idx) else { return };
            match &entry.graphic {
                LegendGraphic::Swatch(swatch) => {
                    let cell = Rect::new(x, top - m.swatch_mm, m.swatch_mm, m.swatch_mm);
                    draw_swatch(pdf, page, swatch, cell);
                    let text_x = x + m.swatch_mm + 2.0;
                    pdf.text_block(page, text_x, top, m.swatch_text_width(width), m.entry_pt, false, TEXT, &entry.title);
                }
                LegendGraphic::Image { width_px, height_px } => {
                    let used = pdf.text_block(page, x, top, width, m.entry_pt, false, TEXT, &entry.title);
                    let (w, h) = m.image_size_mm(*width_px, *height_px, width);
                    match legend.images.get(*idx).and_then(Option::as_ref) {
                        Some(raster) => pdf.image(page, raster, Rect::new(x, top - used - h, w, h)),
                        None => {
                            pdf.text_block(page, x, top - used, width, m.entry_pt, false, MUTED, LEGEND_UNAVAILABLE);
                        }
                    }
                }
                LegendGraphic::Unavailable => {
                    let used = pdf.text_block(page, x, top, width, m.entry_pt, false, TEXT, &entry.title);
                    pdf.text_block(page, x, top - used, width, m.entry_pt, false, MUTED, LEGEND_UNAVAILABLE);
                }
            }
        }
    }
}

fn draw_swatch(pdf: &PdfBuilder, page: usize, swatch: &Swatch, cell: Rect) {
    let stroke = Some((swatch.stroke, swatch.stroke_width_pt));
    match swatch.geometry {
        GeometryType::Point => {
            let (cx, cy) = (cell.x + cell.width / 2.0, cell.y + cell.height / 2.0);
            pdf.circle(page, cx, cy, swatch.radius_mm, Some(swatch.fill), stroke);
        }
        GeometryType::LineString => {
            let y = cell.y + cell.height / 2.0;
            pdf.line(page, (cell.x + 0.3, y), (cell.right() - 0.3, y), swatch.stroke_width_pt.max(0.75), swatch.stroke);
        }
        GeometryType::Polygon => {
            let inset = Rect::new(cell.x + 0.5, cell.y + 0.5, cell.width - 1.0, cell.height - 1.0);
            pdf.rect(page, inset, Some(swatch.fill), stroke);
        }
    }
}
