//! Scale bar and approximate scale computation

use crate::crs::{haversine_m, CrsRegistry, EPSG_GEOGRAPHIC, MAP_CRS};
use crate::types::{Coordinate, Extent};

const LADDER: [f64; 4] = [1.0, 2.0, 5.0, 10.0];
const LADDER_TOLERANCE: f64 = 1e-9;

/// Smallest `{1, 2, 5} × 10^n` that is not below `target`.
///
/// Non-positive or non-finite targets yield `1.0`.
pub fn choose_nice_distance(target: f64) -> f64 {
    if !(target > 0.0) || !target.is_finite() {
        return 1.0;
    }
    let base = 10f64.powf(target.log10().floor());
    for m in LADDER {
        let candidate = m * base;
        if candidate >= target * (1.0 - LADDER_TOLERANCE) {
            return candidate;
        }
    }
    10.0 * base
}

/// The ladder value immediately below `value` (500 → 200, 200 → 100, 100 → 50).
pub fn step_down(value: f64) -> f64 {
    let base = 10f64.powf(value.log10().floor());
    let mant = (value / base).round();
    if mant >= 5.0 {
        2.0 * base
    } else if mant >= 2.0 {
        base
    } else {
        0.5 * base
    }
}

/// Metres below 1 km, then km with one decimal below 10 km. Rounding happens
/// before the unit is picked.
pub fn format_distance(metres: f64) -> String {
    let metres = metres.round();
    if metres < 1000.0 {
        return format!("{:.0} m", metres);
    }
    let tenths_km = (metres / 100.0).round() / 10.0;
    if tenths_km >= 10.0 {
        format!("{:.0} km", (metres / 1000.0).round())
    } else {
        format!("{:.1} km", tenths_km)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleBar {
    pub distance_m: f64,
    pub length_mm: f32,
    pub label: String,
}

impl ScaleBar {
    /// Aim for a fifth of the printed image width; step down the ladder while
    /// the bar would overflow `max_length_mm`.
    pub fn compute(ground_width_m: f64, image_width_mm: f32, max_length_mm: f32) -> Option<ScaleBar> {
        if !(ground_width_m > 0.0) || !ground_width_m.is_finite() || !(image_width_mm > 0.0) {
            return None;
        }
        let metres_per_mm = ground_width_m / image_width_mm as f64;
        let mut distance = choose_nice_distance(ground_width_m / 5.0);
        let mut length = distance / metres_per_mm;
        while length > max_length_mm as f64 && distance > 1e-6 {
            distance = step_down(distance);
            length = distance / metres_per_mm;
        }
        if !length.is_finite() || length <= 0.0 {
            return None;
        }
        Some(ScaleBar { distance_m: distance, length_mm: length as f32, label: format_distance(distance) })
    }
}

/// Geodesic width of the selection along its horizontal mid-line.
pub fn ground_width_m(registry: &CrsRegistry, extent: &Extent) -> Option<f64> {
    let e = extent.normalized();
    let mid_y = e.center().y;
    let west = registry.transform(Coordinate::new(e.min_x, mid_y), MAP_CRS, EPSG_GEOGRAPHIC).ok()?;
    let east = registry.transform(Coordinate::new(e.max_x, mid_y), MAP_CRS, EPSG_GEOGRAPHIC).ok()?;
    let d = haversine_m(west, east);
    (d.is_finite() && d > 0.0).then_some(d)
}

/// Ground metres per printed metre, rounded to two significant figures.
pub fn scale_denominator(ground_width_m: f64, printed_width_mm: f32) -> Option<u64> {
    if !(printed_width_mm > 0.0) || !(ground_width_m > 0.0) || !ground_width_m.is_finite() {
        return None;
    }
    let raw = ground_width_m / (printed_width_mm as f64 / 1000.0);
    let magnitude = 10f64.powf(raw.log10().floor() - 1.0);
    let rounded = (raw / magnitude).round() * magnitude;
    Some(rounded.max(1.0) as u64)
}

pub fn format_scale(denominator: u64) -> String {
    let digits = denominator.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("1:{}", grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nice_distance_rounds_up_to_ladder() {
        assert_eq!(choose_nice_distance(430.0), 500.0);
        assert_eq!(choose_nice_distance(34.0), 50.0);
        assert_eq!(choose_nice_distance(100.0), 100.0);
        assert_eq!(choose_nice_distance(1.5), 2.0);
        assert_eq!(choose_nice_distance(0.0), 1.0);
    }

    #[test]
    fn step_down_walks_ladder() {
        assert_eq!(step_down(500.0), 200.0);
        assert_eq!(step_down(200.0), 100.0);
        assert_eq!(step_down(100.0), 50.0);
    }

    #[test]
    fn distance_labels() {
        assert_eq!(format_distance(1500.0), "1.5 km");
        assert_eq!(format_distance(15000.0), "15 km");
        assert_eq!(format_distance(850.0), "850 m");
        assert_eq!(format_distance(1000.0), "1.0 km");
        assert_eq!(format_distance(999.6), "1.0 km");
        assert_eq!(format_distance(999.4), "999 m");
        assert_eq!(format_distance(9999.0), "10 km");
        assert_eq!(format_distance(9949.0), "9.9 km");
    }

    #[test]
    fn scale_bar_fits_available_width() {
        // 2150 m across 100 mm: target 430 m → 500 m = 23.3 mm
        let bar = ScaleBar::compute(2150.0, 100.0, 50.0).unwrap();
        assert_eq!(bar.distance_m, 500.0);
        assert_eq!(bar.label, "500 m");
        assert!((bar.length_mm - 23.255).abs() < 0.01);

        let tight = ScaleBar::compute(2150.0, 100.0, 20.0).unwrap();
        assert_eq!(tight.distance_m, 200.0);
        assert!(tight.length_mm <= 20.0);
    }

    #[test]
    fn degenerate_selection_has_no_scale_bar() {
        assert!(ScaleBar::compute(0.0, 100.0, 50.0).is_none());
        assert!(ScaleBar::compute(f64::NAN, 100.0, 50.0).is_none());
        assert!(ScaleBar::compute(1000.0, 0.0, 50.0).is_none());
    }

    #[test]
    fn scale_line() {
        assert_eq!(scale_denominator(2150.0, 100.0), Some(22_000));
        assert_eq!(format_scale(22_000), "1:22 000");
        assert_eq!(format_scale(500), "1:500");
        assert_eq!(format_scale(1_200_000), "1:1 200 000");
    }

    #[test]
    fn ground_width_of_equatorial_degree() {
        let reg = CrsRegistry::default();
        let r = 6_378_137.0_f64;
        let one_deg = r * 1f64.to_radians();
        let w = ground_width_m(&reg, &Extent::new(0.0, -10.0, one_deg, 10.0)).unwrap();
        assert!((w - 111_195.0).abs() < 1.0, "w = {}", w);
        assert!(ground_width_m(&reg, &Extent::new(5.0, 0.0, 5.0, 1.0)).is_none());
    }
}
