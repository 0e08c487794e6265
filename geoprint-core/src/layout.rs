//! Page geometry for the printed PDF.
//!
//! All rectangles are in millimetres with the PDF origin at the bottom-left
//! corner of the page.

use crate::types::{Orientation, Paper};

pub const PT_TO_MM: f32 = 0.352_778;
pub const PX_TO_MM: f32 = 0.264_583;
pub const LINE_SPACING: f32 = 1.3;

pub const HEADER_HEIGHT_MM: f32 = 16.0;
pub const CONTINUATION_HEADER_MM: f32 = 10.0;
pub const LEGEND_GUTTER_MM: f32 = 5.0;
pub const SCALE_COLUMN_MM: f32 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpec {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageSpec {
    pub fn new(paper: Paper, orientation: Orientation) -> Self {
        let (w, h) = paper.size_mm();
        match orientation {
            Orientation::Portrait => Self { width_mm: w, height_mm: h },
            Orientation::Landscape => Self { width_mm: h, height_mm: w },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// 30% of the page width, kept within 55..=95 mm.
pub fn legend_panel_width(page_width_mm: f32) -> f32 {
    (page_width_mm * 0.30).clamp(55.0, 95.0)
}

pub fn legend_columns(width_mm: f32, two_column_min_width_mm: f32) -> usize {
    if width_mm >= two_column_min_width_mm {
        2
    } else {
        1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageOneLayout {
    pub header: Rect,
    pub map_box: Rect,
    pub footer: Rect,
    pub legend_panel: Option<Rect>,
}

/// Split page one into header, map box, footer and (optionally) the legend
/// panel at the right edge. The footer spans the full content width.
pub fn page_one_layout(page: PageSpec, margin_mm: f32, footer_height_mm: f32, with_legend: bool) -> PageOneLayout {
    let content_w = (page.width_mm - 2.0 * margin_mm).max(1.0);
    let content_top = page.height_mm - margin_mm;
    let header = Rect::new(margin_mm, content_top - HEADER_HEIGHT_MM, content_w, HEADER_HEIGHT_MM);
    let footer = Rect::new(margin_mm, margin_mm, content_w, footer_height_mm);

    let body_bottom = footer.top() + 2.0;
    let body_height = (header.y - 2.0 - body_bottom).max(1.0);
    let (map_width, legend_panel) = if with_legend {
        let panel_w = legend_panel_width(page.width_mm).min(content_w * 0.5);
        let panel = Rect::new(margin_mm + content_w - panel_w, body_bottom, panel_w, body_height);
        ((content_w - panel_w - LEGEND_GUTTER_MM).max(1.0), Some(panel))
    } else {
        (content_w, None)
    };
    let map_box = Rect::new(margin_mm, body_bottom, map_width, body_height);
    PageOneLayout { header, map_box, footer, legend_panel }
}

/// Content area of a legend continuation page (below its small header).
pub fn continuation_area(page: PageSpec, margin_mm: f32) -> Rect {
    let content_w = (page.width_mm - 2.0 * margin_mm).max(1.0);
    let height = (page.height_mm - 2.0 * margin_mm - CONTINUATION_HEADER_MM).max(1.0);
    Rect::new(margin_mm, margin_mm, content_w, height)
}

/// Largest rectangle with the image's aspect ratio that fits in `frame`,
/// centred in it.
pub fn fit_preserving_aspect(frame: Rect, image_w: u32, image_h: u32) -> Rect {
    if image_w == 0 || image_h == 0 {
        return Rect::new(frame.x, frame.y, 0.0, 0.0);
    }
    let scale = (frame.width / image_w as f32).min(frame.height / image_h as f32);
    let (w, h) = (image_w as f32 * scale, image_h as f32 * scale);
    Rect::new(frame.x + (frame.width - w) * 0.5, frame.y + (frame.height - h) * 0.5, w, h)
}

pub fn line_height_mm(font_size_pt: f32) -> f32 {
    font_size_pt * PT_TO_MM * LINE_SPACING
}

/// Approximate advance width of Helvetica glyphs, in ems.
fn glyph_em(ch: char) -> f32 {
    match ch {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' | 'I' => 0.25,
        ' ' | 'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '-' | '/' => 0.33,
        'm' | 'w' | 'M' | 'W' => 0.83,
        '0'..='9' => 0.556,
        c if c.is_uppercase() => 0.68,
        _ => 0.53,
    }
}

pub fn text_width_mm(text: &str, font_size_pt: f32) -> f32 {
    text.chars().map(glyph_em).sum::<f32>() * font_size_pt * PT_TO_MM
}

/// Greedy word wrap. Words wider than the line are split by characters.
pub fn wrap_text(text: &str, font_size_pt: f32, max_width_mm: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() { word.to_string() } else { format!("{} {}", current, word) };
        if text_width_mm(&candidate, font_size_pt) <= max_width_mm {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if text_width_mm(word, font_size_pt) <= max_width_mm {
            current = word.to_string();
        } else {
            for ch in word.chars() {
                current.push(ch);
                if text_width_mm(&current, font_size_pt) > max_width_mm && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_swaps_axes() {
        let p = PageSpec::new(Paper::A4, Orientation::Landscape);
        assert_eq!((p.width_mm, p.height_mm), (297.0, 210.0));
        let l = PageSpec::new(Paper::Legal, Orientation::Portrait);
        assert_eq!((l.width_mm, l.height_mm), (215.9, 355.6));
    }

    #[test]
    fn panel_width_is_clamped() {
        assert!((legend_panel_width(210.0) - 63.0).abs() < 1e-4);
        assert_eq!(legend_panel_width(100.0), 55.0);
        assert_eq!(legend_panel_width(420.0), 95.0);
        assert_eq!(legend_columns(63.0, 78.0), 1);
        assert_eq!(legend_columns(89.1, 78.0), 2);
    }

    #[test]
    fn map_box_leaves_room_for_legend() {
        let page = PageSpec::new(Paper::A4, Orientation::Portrait);
        let with = page_one_layout(page, 10.0, 30.0, true);
        let without = page_one_layout(page, 10.0, 30.0, false);
        assert!(without.legend_panel.is_none());
        assert_eq!(without.map_box.width, 190.0);
        let panel = with.legend_panel.unwrap();
        assert!((with.map_box.width - (190.0 - 63.0 - LEGEND_GUTTER_MM)).abs() < 1e-4);
        assert!((panel.right() - 200.0).abs() < 1e-4);
        assert!(with.map_box.y > with.footer.top());
        assert!(with.map_box.top() < with.header.y);
    }

    #[test]
    fn fit_centres_image() {
        let r = fit_preserving_aspect(Rect::new(0.0, 0.0, 100.0, 100.0), 200, 100);
        assert_eq!(r, Rect::new(0.0, 25.0, 100.0, 50.0));
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("SW: -51.231234, -30.041234   SE: -51.203456, -30.041234", 7.0, 40.0);
        assert!(lines.len() > 1);
        for l in &lines {
            assert!(text_width_mm(l, 7.0) <= 40.0, "{} too wide", l);
        }
        assert_eq!(wrap_text("", 7.0, 40.0), vec![String::new()]);
    }

    #[test]
    fn overlong_word_is_split() {
        let lines = wrap_text(&"W".repeat(60), 10.0, 20.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 60);
    }
}
