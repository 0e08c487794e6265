//! Legend model and pagination.
//!
//! The export crate resolves a [`LegendGraphic`] for every visible layer;
//! this module turns the resulting entries into header/entry rows and lays
//! them out over the page-one panel and any continuation pages.

use crate::layout::{line_height_mm, wrap_text, Rect, LEGEND_GUTTER_MM, PX_TO_MM};
use crate::tree::{Color, GeometryType, Layer, LayerId, RootGroupId, ThematicGroupId, VisibleLegendItem};

pub const LEGEND_UNAVAILABLE: &str = "(legend unavailable)";
pub const NO_VISIBLE_LAYERS: &str = "No layers visible for legend";

/// Outcome of checking whether a layer has content inside the print extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCheck {
    Included,
    Excluded,
    /// The check could not decide; treated as included.
    Unknown,
}

impl ContentCheck {
    pub fn is_included(self) -> bool {
        !matches!(self, ContentCheck::Excluded)
    }
}

/// Vector symbol drawn for WFS layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swatch {
    pub geometry: GeometryType,
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width_pt: f32,
    pub radius_mm: f32,
}

const DEFAULT_FILL: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 0.4 };
const DEFAULT_STROKE: Color = Color::rgb(0.2, 0.6, 0.8);

impl Swatch {
    pub fn for_layer(layer: &Layer) -> Self {
        let style = layer.style_config.clone().unwrap_or_default();
        let geometry = style.geometry.unwrap_or(layer.geometry_type);
        let radius_px = style.radius.unwrap_or(5.0);
        Self {
            geometry,
            fill: style.fill().unwrap_or(DEFAULT_FILL),
            stroke: style.stroke().unwrap_or(DEFAULT_STROKE),
            stroke_width_pt: style.stroke_width.unwrap_or(1.25).clamp(0.25, 4.0),
            radius_mm: (radius_px * PX_TO_MM).clamp(0.8, 2.4),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegendGraphic {
    /// A decoded legend image with its natural pixel size.
    Image { width_px: u32, height_px: u32 },
    Swatch(Swatch),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub layer_id: LayerId,
    pub title: String,
    pub root_group_id: RootGroupId,
    pub root_title: String,
    pub thematic: Option<(ThematicGroupId, String)>,
    pub graphic: LegendGraphic,
}

impl LegendEntry {
    pub fn new(item: &VisibleLegendItem<'_>, graphic: LegendGraphic) -> Self {
        Self {
            layer_id: item.layer.id.clone(),
            title: item.layer.title.clone(),
            root_group_id: item.root_group_id.clone(),
            root_title: item.root_group_title.to_string(),
            thematic: item.thematic_group.map(|(id, title)| (id.clone(), title.to_string())),
            graphic,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegendRow {
    RootHeader(String),
    ThematicHeader(String),
    /// Index into the entry slice the rows were built from.
    Entry(usize),
    Message(String),
}

impl LegendRow {
    pub fn is_header(&self) -> bool {
        matches!(self, LegendRow::RootHeader(_) | LegendRow::ThematicHeader(_))
    }
}

/// Interleave group headers with entries. A header is emitted when its group
/// differs from the last one seen, so consecutive layers of one group share
/// a single header.
pub fn legend_rows(entries: &[LegendEntry]) -> Vec<LegendRow> {
    if entries.is_empty() {
        return vec![LegendRow::Message(NO_VISIBLE_LAYERS.to_string())];
    }
    let mut rows = Vec::with_capacity(entries.len() * 2);
    let mut last_root: Option<&RootGroupId> = None;
    let mut last_thematic: Option<&ThematicGroupId> = None;
    for (idx, entry) in entries.iter().enumerate() {
        if last_root != Some(&entry.root_group_id) {
            rows.push(LegendRow::RootHeader(entry.root_title.clone()));
            last_root = Some(&entry.root_group_id);
            last_thematic = None;
        }
        match &entry.thematic {
            Some((id, title)) if last_thematic != Some(id) => {
                rows.push(LegendRow::ThematicHeader(title.clone()));
                last_thematic = Some(id);
            }
            Some(_) => {}
            None => last_thematic = None,
        }
        rows.push(LegendRow::Entry(idx));
    }
    rows
}

/// Typography and spacing of the legend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegendMetrics {
    pub title_pt: f32,
    pub root_header_pt: f32,
    pub thematic_header_pt: f32,
    pub entry_pt: f32,
    pub swatch_mm: f32,
    pub row_gap_mm: f32,
    pub max_image_height_mm: f32,
}

impl Default for LegendMetrics {
    fn default() -> Self {
        Self {
            title_pt: 11.0,
            root_header_pt: 9.5,
            thematic_header_pt: 8.5,
            entry_pt: 8.0,
            swatch_mm: 5.0,
            row_gap_mm: 1.5,
            max_image_height_mm: 60.0,
        }
    }
}

impl LegendMetrics {
    /// Printed size of a legend image: natural size at 96 dpi, shrunk to fit
    /// the column and the height cap.
    pub fn image_size_mm(&self, width_px: u32, height_px: u32, column_width_mm: f32) -> (f32, f32) {
        let (w, h) = (width_px as f32 * PX_TO_MM, height_px as f32 * PX_TO_MM);
        if w <= 0.0 || h <= 0.0 {
            return (0.0, 0.0);
        }
        let scale = (column_width_mm / w).min(self.max_image_height_mm / h).min(1.0);
        (w * scale, h * scale)
    }

    /// Width left for an entry title when a swatch sits to its left.
    pub fn swatch_text_width(&self, column_width_mm: f32) -> f32 {
        (column_width_mm - self.swatch_mm - 2.0).max(1.0)
    }

    pub fn row_height(&self, row: &LegendRow, entries: &[LegendEntry], column_width_mm: f32) -> f32 {
        let text_h = |text: &str, pt: f32, width: f32| wrap_text(text, pt, width).len() as f32 * line_height_mm(pt);
        match row {
            LegendRow::RootHeader(t) => text_h(t, self.root_header_pt, column_width_mm) + self.row_gap_mm,
            LegendRow::ThematicHeader(t) => text_h(t, self.thematic_header_pt, column_width_mm) + self.row_gap_mm,
            LegendRow::Message(t) => text_h(t, self.entry_pt, column_width_mm) + self.row_gap_mm,
            LegendRow::Entry(idx) => {
                let Some(entry) = entries.get(*idx) else { return 0.0 };
                let body = match &entry.graphic {
                    LegendGraphic::Swatch(_) => {
                        let title = text_h(&entry.title, self.entry_pt, self.swatch_text_width(column_width_mm));
                        title.max(self.swatch_mm)
                    }
                    LegendGraphic::Image { width_px, height_px } => {
                        let (_, h) = self.image_size_mm(*width_px, *height_px, column_width_mm);
                        text_h(&entry.title, self.entry_pt, column_width_mm) + h
                    }
                    LegendGraphic::Unavailable => {
                        text_h(&entry.title, self.entry_pt, column_width_mm) + line_height_mm(self.entry_pt)
                    }
                };
                body + self.row_gap_mm
            }
        }
    }
}

/// A region legend rows flow through, column by column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegendArea {
    pub rect: Rect,
    pub columns: usize,
}

impl LegendArea {
    pub fn column_width(&self) -> f32 {
        let cols = self.columns.max(1) as f32;
        ((self.rect.width - LEGEND_GUTTER_MM * (cols - 1.0)) / cols).max(1.0)
    }

    fn column_x(&self, column: usize) -> f32 {
        self.rect.x + column as f32 * (self.column_width() + LEGEND_GUTTER_MM)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendPlacement {
    /// 0 is the page-one panel; continuation pages count up from 1.
    pub page: usize,
    pub x_mm: f32,
    pub top_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    pub row: LegendRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendPlan {
    pub placements: Vec<LegendPlacement>,
    /// Continuation pages needed after page one.
    pub continuation_pages: usize,
}

/// Height of `rows[0]`; for a header, up to and including the first row it
/// introduces.
fn keep_together_height(rows: &[LegendRow], entries: &[LegendEntry], metrics: &LegendMetrics, width: f32) -> f32 {
    let mut total = 0.0;
    for row in rows {
        total += metrics.row_height(row, entries, width);
        if !row.is_header() {
            break;
        }
    }
    total
}

/// Flow rows down the columns of `first`, then across as many
/// `continuation` pages as needed. Headers never end a column. A row taller
/// than a whole column is placed at the top of a fresh column and allowed to
/// overflow it.
pub fn plan_legend(
    entries: &[LegendEntry],
    first: LegendArea,
    continuation: LegendArea,
    metrics: &LegendMetrics,
) -> LegendPlan {
    let rows = legend_rows(entries);
    let mut placements = Vec::with_capacity(rows.len());
    let mut page = 0usize;
    let mut area = first;
    let mut column = 0usize;
    let mut cursor = area.rect.top();
    let mut column_empty = true;

    for (i, row) in rows.iter().enumerate() {
        let needed = keep_together_height(&rows[i..], entries, metrics, area.column_width());
        if cursor - needed < area.rect.y && !column_empty {
            column += 1;
            if column >= area.columns.max(1) {
                page += 1;
                area = continuation;
                column = 0;
                log::debug!("legend continues on page {}", page + 1);
            }
            cursor = area.rect.top();
        }
        let height = metrics.row_height(row, entries, area.column_width());
        placements.push(LegendPlacement {
            page,
            x_mm: area.column_x(column),
            top_mm: cursor,
            width_mm: area.column_width(),
            height_mm: height,
            row: row.clone(),
        });
        cursor -= height;
        column_empty = false;
    }
    LegendPlan { placements, continuation_pages: page }
}
