use geoprint_core::{
    choose_nice_distance, normalize_extent, Coordinate, CrsRegistry, EPSG_GEOGRAPHIC, EPSG_LOCAL_TM,
    EPSG_WEB_MERCATOR,
};
use proptest::prelude::*;

fn is_ladder_value(v: f64) -> bool {
    let base = 10f64.powf(v.log10().floor());
    let mant = v / base;
    [1.0, 2.0, 5.0, 10.0].iter().any(|m| (mant - m).abs() < 1e-9)
}

proptest! {
    #[test]
    fn normalize_orders_each_axis(a in -1e7f64..1e7, b in -1e7f64..1e7, c in -1e7f64..1e7, d in -1e7f64..1e7) {
        let n = normalize_extent([a, b, c, d]);
        prop_assert_eq!(n, [a.min(c), b.min(d), a.max(c), b.max(d)]);
        prop_assert!(n[0] <= n[2] && n[1] <= n[3]);
    }

    #[test]
    fn nice_distance_is_smallest_ladder_value_above(target in 1e-3f64..1e7) {
        let nice = choose_nice_distance(target);
        prop_assert!(is_ladder_value(nice), "{} is not 1/2/5 x 10^n", nice);
        prop_assert!(nice >= target * (1.0 - 1e-9));
        prop_assert!(nice < target * 2.5 + 1e-9);
    }

    #[test]
    fn geographic_web_mercator_round_trip(lon in -180.0f64..180.0, lat in -85.0f64..85.0) {
        let reg = CrsRegistry::default();
        let p = reg.transform(Coordinate::new(lon, lat), EPSG_GEOGRAPHIC, EPSG_WEB_MERCATOR).unwrap();
        let back = reg.transform(p, EPSG_WEB_MERCATOR, EPSG_GEOGRAPHIC).unwrap();
        prop_assert!((back.x - lon).abs() <= 1e-6 && (back.y - lat).abs() <= 1e-6);
    }

    #[test]
    fn geographic_local_tm_round_trip(lon in -54.0f64..-48.0, lat in -33.0f64..-27.0) {
        let reg = CrsRegistry::default();
        let p = reg.transform(Coordinate::new(lon, lat), EPSG_GEOGRAPHIC, EPSG_LOCAL_TM).unwrap();
        let back = reg.transform(p, EPSG_LOCAL_TM, EPSG_GEOGRAPHIC).unwrap();
        prop_assert!((back.x - lon).abs() <= 1e-6 && (back.y - lat).abs() <= 1e-6);
    }

    #[test]
    fn local_tm_web_mercator_round_trip(e in 250_000.0f64..350_000.0, n in 1_600_000.0f64..1_750_000.0) {
        let reg = CrsRegistry::default();
        let p = reg.transform(Coordinate::new(e, n), EPSG_LOCAL_TM, EPSG_WEB_MERCATOR).unwrap();
        let back = reg.transform(p, EPSG_WEB_MERCATOR, EPSG_LOCAL_TM).unwrap();
        prop_assert!((back.x - e).abs() <= 1e-2 && (back.y - n).abs() <= 1e-2);
    }
}

#[test]
fn porto_alegre_city_hall_in_local_grid() {
    // Paço Municipal, roughly 51.2277°W 30.0277°S.
    let reg = CrsRegistry::default();
    let p = reg
        .transform(Coordinate::new(-51.2277, -30.0277), EPSG_GEOGRAPHIC, EPSG_LOCAL_TM)
        .unwrap();
    assert!((p.x - 278_000.0).abs() < 1_000.0, "E = {}", p.x);
    assert!((p.y - 1_677_000.0).abs() < 2_000.0, "N = {}", p.y);
}
