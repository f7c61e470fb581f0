//! WGS84 ↔ spherical Mercator (EPSG:3857) conversions.
//!
//! Buffering happens in projected meters; everything emitted to clients is
//! converted back to lon/lat first.

use std::f64::consts::PI;

use super::Vec2;

/// Equatorial radius of the WGS84 spheroid in meters, as used by the
/// spherical Mercator projection.
pub const EARTH_RADIUS_M: f64 = 6_378_137.;

#[inline]
pub fn to_mercator(lon: f64, lat: f64) -> Vec2 {
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (PI / 4. + lat.to_radians() / 2.).tan().ln();
    Vec2::new(x, y)
}

#[inline]
pub fn to_wgs84(p: Vec2) -> (f64, f64) {
    let lon = (p.x / EARTH_RADIUS_M).to_degrees();
    let lat = (2. * (p.y / EARTH_RADIUS_M).exp().atan() - PI / 2.).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_x_scale() {
        let p = to_mercator(180., 0.);
        assert!((p.x - 20_037_508.342789244).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
    }

    #[test]
    fn test_round_trip() {
        for &(lon, lat) in &[(37.6176, 55.7558), (-73.9857, 40.7484), (0., 0.), (151.2, -33.86)] {
            let (lon2, lat2) = to_wgs84(to_mercator(lon, lat));
            assert!((lon - lon2).abs() < 1e-9, "{lon} vs {lon2}");
            assert!((lat - lat2).abs() < 1e-9, "{lat} vs {lat2}");
        }
    }

    #[test]
    fn test_meter_scale_at_equator() {
        // one degree of longitude at the equator is ~111.3km in 3857
        let a = to_mercator(0., 0.);
        let b = to_mercator(1., 0.);
        assert!(((b.x - a.x) - 111_319.49).abs() < 1.);
    }
}
