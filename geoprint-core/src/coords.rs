//! Coordinate readout printed in the page footer.

use crate::crs::{CrsCode, CrsRegistry, EPSG_GEOGRAPHIC, EPSG_LOCAL_TM, MAP_CRS};
use crate::types::{Coordinate, DragPoints, Extent};

pub const NOT_AVAILABLE: &str = "(not available)";

/// An output CRS for the readout and the precision its values print with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadoutCrs {
    pub code: CrsCode,
    pub label: &'static str,
    pub decimals: usize,
}

pub const READOUT_CRS: [ReadoutCrs; 2] = [
    ReadoutCrs { code: EPSG_GEOGRAPHIC, label: "WGS 84 (EPSG:4326)", decimals: 6 },
    ReadoutCrs { code: EPSG_LOCAL_TM, label: "SIRGAS 2000 / Porto Alegre TM (EPSG:10665)", decimals: 2 },
];

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateBlock {
    pub heading: String,
    pub lines: Vec<String>,
}

/// Build one block per readout CRS: the drag line (when present) followed by
/// SW/SE and NW/NE corner lines. Each line is transformed on its own, so one
/// failing point only blanks its own line.
pub fn coordinate_blocks(
    registry: &CrsRegistry,
    extent: &Extent,
    drag: Option<&DragPoints>,
) -> Vec<CoordinateBlock> {
    let e = extent.normalized();
    READOUT_CRS
        .iter()
        .map(|target| {
            let mut lines = Vec::with_capacity(3);
            if let Some(d) = drag {
                lines.push(pair_line(registry, target, ("Start", d.start), ("End", d.end)));
            }
            lines.push(pair_line(registry, target, ("SW", e.south_west()), ("SE", e.south_east())));
            lines.push(pair_line(registry, target, ("NW", e.north_west()), ("NE", e.north_east())));
            CoordinateBlock { heading: target.label.to_string(), lines }
        })
        .collect()
}

fn pair_line(
    registry: &CrsRegistry,
    target: &ReadoutCrs,
    (label_a, a): (&str, Coordinate),
    (label_b, b): (&str, Coordinate),
) -> String {
    let project = |c: Coordinate| registry.transform(c, MAP_CRS, target.code);
    match (project(a), project(b)) {
        (Ok(pa), Ok(pb)) => format!(
            "{}: {:.prec$}, {:.prec$}   {}: {:.prec$}, {:.prec$}",
            label_a,
            pa.x,
            pa.y,
            label_b,
            pb.x,
            pb.y,
            prec = target.decimals
        ),
        (Err(err), _) | (_, Err(err)) => {
            log::debug!("readout {}/{} in {}: {}", label_a, label_b, target.code, err);
            format!("{}/{}: {}", label_a, label_b, NOT_AVAILABLE)
        }
    }
}
