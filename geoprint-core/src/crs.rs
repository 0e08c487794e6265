//! Coordinate reference systems and the transforms between them.
//!
//! The map works in spherical Web Mercator (EPSG:3857). Printed readouts go
//! out in geographic lon/lat (EPSG:4326) and in the municipal Transverse
//! Mercator grid (EPSG:10665). Every transform goes through geographic
//! coordinates; SIRGAS 2000 and WGS 84 are treated as coincident.

use regex::Regex;
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fmt;
use std::sync::OnceLock;

use crate::error::CrsError;
use crate::types::{Coordinate, Extent};

pub const EPSG_WEB_MERCATOR: CrsCode = CrsCode(3857);
pub const EPSG_GEOGRAPHIC: CrsCode = CrsCode(4326);
pub const EPSG_LOCAL_TM: CrsCode = CrsCode(10665);

/// Map working projection.
pub const MAP_CRS: CrsCode = EPSG_WEB_MERCATOR;

const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrsCode(pub u32);

impl CrsCode {
    /// Find an EPSG code in any of the spellings GeoServer emits:
    /// `EPSG:31982`, `urn:ogc:def:crs:EPSG::31982`, `.../epsg/31982`,
    /// `http://www.opengis.net/def/crs/EPSG/0/31982`.
    pub fn extract(value: &str) -> Option<CrsCode> {
        static EPSG_RE: OnceLock<Regex> = OnceLock::new();
        let re = EPSG_RE.get_or_init(|| {
            Regex::new(r"(?i)(?:EPSG(?::|::)|epsg/|EPSG/0/)(\d{3,6})").expect("static regex")
        });
        re.captures(value)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .map(CrsCode)
    }

    pub fn parse(value: &str) -> Result<CrsCode, CrsError> {
        Self::extract(value).ok_or_else(|| CrsError::Unparseable(value.to_string()))
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Ellipsoid by semi-major axis and inverse flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub a: f64,
    pub inv_f: f64,
}

impl Ellipsoid {
    pub const GRS80: Ellipsoid = Ellipsoid { a: 6_378_137.0, inv_f: 298.257_222_101 };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    pub ellipsoid: Ellipsoid,
    pub lat0_deg: f64,
    pub lon0_deg: f64,
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl TransverseMercator {
    /// SIRGAS 2000 / Porto Alegre TM.
    pub const PORTO_ALEGRE: TransverseMercator = TransverseMercator {
        ellipsoid: Ellipsoid::GRS80,
        lat0_deg: 0.0,
        lon0_deg: -51.0,
        k0: 0.999_995,
        false_easting: 300_000.0,
        false_northing: 5_000_000.0,
    };

    fn series(&self) -> KruegerSeries {
        KruegerSeries::new(self.ellipsoid)
    }

    fn forward(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let s = self.series();
        let phi = lat_deg.to_radians();
        let dlam = (lon_deg - self.lon0_deg).to_radians();
        let t = (phi.sin().atanh() - s.e * (s.e * phi.sin()).atanh()).sinh();
        let xi_p = t.atan2(dlam.cos());
        let eta_p = (dlam.sin() / (1.0 + t * t).sqrt()).atanh();
        if !eta_p.is_finite() {
            return None;
        }
        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in s.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }
        let m0 = self.meridian_offset(&s);
        let easting = self.false_easting + self.k0 * s.big_a * eta;
        let northing = self.false_northing + self.k0 * (s.big_a * xi - m0);
        Some((easting, northing))
    }

    fn inverse(&self, easting: f64, northing: f64) -> Option<(f64, f64)> {
        let s = self.series();
        let m0 = self.meridian_offset(&s);
        let xi = ((northing - self.false_northing) / self.k0 + m0) / s.big_a;
        let eta = (easting - self.false_easting) / (self.k0 * s.big_a);
        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in s.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }
        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, d) in s.delta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            phi += d * (k * chi).sin();
        }
        let lam = eta_p.sinh().atan2(xi_p.cos());
        let (lon, lat) = (self.lon0_deg + lam.to_degrees(), phi.to_degrees());
        (lon.is_finite() && lat.is_finite()).then_some((lon, lat))
    }

    /// Scaled-meridian distance of the latitude of origin (zero on the equator).
    fn meridian_offset(&self, s: &KruegerSeries) -> f64 {
        if self.lat0_deg == 0.0 {
            return 0.0;
        }
        let phi = self.lat0_deg.to_radians();
        let t = (phi.sin().atanh() - s.e * (s.e * phi.sin()).atanh()).sinh();
        let xi_p = t.atan2(1.0);
        let mut xi = xi_p;
        for (j, a) in s.alpha.iter().enumerate() {
            xi += a * (2.0 * (j as f64 + 1.0) * xi_p).sin();
        }
        s.big_a * xi
    }
}

/// Krüger n-series coefficients to fourth order.
struct KruegerSeries {
    e: f64,
    big_a: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
    delta: [f64; 4],
}

impl KruegerSeries {
    fn new(ell: Ellipsoid) -> Self {
        let f = 1.0 / ell.inv_f;
        let n = f / (2.0 - f);
        let (n2, n3, n4) = (n * n, n * n * n, n * n * n * n);
        let e = (f * (2.0 - f)).sqrt();
        let big_a = ell.a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);
        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
            49561.0 * n4 / 161280.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
            4397.0 * n4 / 161280.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
            56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
            4279.0 * n4 / 630.0,
        ];
        Self { e, big_a, alpha, beta, delta }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Geographic,
    WebMercator,
    TransverseMercator(TransverseMercator),
}

impl Projection {
    /// Projected → (lon, lat) degrees.
    fn to_geographic(&self, c: Coordinate) -> Option<Coordinate> {
        match self {
            Projection::Geographic => Some(c),
            Projection::WebMercator => {
                let lon = (c.x / WEB_MERCATOR_RADIUS).to_degrees();
                let lat = (2.0 * (c.y / WEB_MERCATOR_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
                Some(Coordinate::new(lon, lat))
            }
            Projection::TransverseMercator(tm) => {
                tm.inverse(c.x, c.y).map(|(lon, lat)| Coordinate::new(lon, lat))
            }
        }
    }

    /// (lon, lat) degrees → projected.
    fn from_geographic(&self, c: Coordinate) -> Option<Coordinate> {
        if !(-90.0..=90.0).contains(&c.y) {
            return None;
        }
        match self {
            Projection::Geographic => Some(c),
            Projection::WebMercator => {
                let lat = c.y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
                let x = WEB_MERCATOR_RADIUS * c.x.to_radians();
                let y = WEB_MERCATOR_RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln();
                Some(Coordinate::new(x, y))
            }
            Projection::TransverseMercator(tm) => {
                tm.forward(c.x, c.y).map(|(x, y)| Coordinate::new(x, y))
            }
        }
    }
}

/// Projection lookup by EPSG code.
#[derive(Debug, Clone)]
pub struct CrsRegistry {
    projections: HashMap<CrsCode, Projection>,
}

impl Default for CrsRegistry {
    fn default() -> Self {
        let mut reg = Self::empty();
        reg.register(EPSG_GEOGRAPHIC, Projection::Geographic);
        reg.register(EPSG_WEB_MERCATOR, Projection::WebMercator);
        reg.register(EPSG_LOCAL_TM, Projection::TransverseMercator(TransverseMercator::PORTO_ALEGRE));
        reg
    }
}

impl CrsRegistry {
    pub fn empty() -> Self {
        Self { projections: HashMap::new() }
    }

    pub fn register(&mut self, code: CrsCode, projection: Projection) {
        self.projections.insert(code, projection);
    }

    pub fn contains(&self, code: CrsCode) -> bool {
        self.projections.contains_key(&code)
    }

    fn get(&self, code: CrsCode) -> Result<&Projection, CrsError> {
        self.projections.get(&code).ok_or_else(|| CrsError::Unsupported(code.to_string()))
    }

    pub fn transform(&self, c: Coordinate, from: CrsCode, to: CrsCode) -> Result<Coordinate, CrsError> {
        let out_of_domain = || CrsError::OutOfDomain {
            x: c.x,
            y: c.y,
            from: from.to_string(),
            to: to.to_string(),
        };
        let src = self.get(from)?;
        let dst = self.get(to)?;
        if from == to {
            return Ok(c);
        }
        if !c.is_finite() {
            return Err(out_of_domain());
        }
        let geo = src.to_geographic(c).ok_or_else(out_of_domain)?;
        let out = dst.from_geographic(geo).ok_or_else(out_of_domain)?;
        if out.is_finite() {
            Ok(out)
        } else {
            Err(out_of_domain())
        }
    }

    /// Transform all four corners and take their bounding box.
    pub fn transform_extent(&self, e: &Extent, from: CrsCode, to: CrsCode) -> Result<Extent, CrsError> {
        let e = e.normalized();
        let corners = [e.south_west(), e.south_east(), e.north_west(), e.north_east()];
        let mut out = Extent::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for corner in corners {
            let p = self.transform(corner, from, to)?;
            out.min_x = out.min_x.min(p.x);
            out.min_y = out.min_y.min(p.y);
            out.max_x = out.max_x.max(p.x);
            out.max_y = out.max_y.max(p.y);
        }
        Ok(out)
    }
}

/// Great-circle distance in metres between two lon/lat points.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;
    let (phi1, phi2) = (a.y.to_radians(), b.y.to_radians());
    let dphi = phi2 - phi1;
    let dlam = (b.x - a.x).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlam / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS * h.sqrt().min(1.0).asin()
}
