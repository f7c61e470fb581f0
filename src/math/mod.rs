pub mod mercator;
pub mod polygon;

use std::f64::consts::TAU;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Mean Earth radius in kilometres, matching the haversine convention used
/// for clustering thresholds.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A plain 2D vector. Used both for planar meters (after projection) and for
/// lon/lat degrees where the caller knows the distortion is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3D cross product.
    #[inline]
    pub fn cross(self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    #[inline]
    pub fn distance_to(self, other: Vec2) -> f64 {
        (self - other).length()
    }

    /// Rotation by 90° counter-clockwise.
    #[inline]
    pub fn perpendicular(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}
impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}
impl Neg for Vec2 {
    type Output = Vec2;
    #[inline]
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}
impl Mul<f64> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}
impl Mul<Vec2> for f64 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: Vec2) -> Vec2 {
        rhs * self
    }
}
impl Div<f64> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

/// Great-circle distance in kilometres between two lon/lat points.
#[inline]
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.).sin().powi(2);
    let c = 2. * a.sqrt().atan2((1. - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Samples a circle into an unclosed ring of `segments` vertices,
/// counter-clockwise. Callers close the ring when building polygons.
pub fn circle(center: Vec2, radius: f64, segments: usize) -> Vec<Vec2> {
    (0..segments)
        .map(|i| {
            let ang = TAU * i as f64 / segments as f64;
            center + Vec2::new(ang.cos(), ang.sin()) * radius
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_algebra() {
        let a = Vec2::new(3., 4.);
        let b = Vec2::new(-1., 2.);

        assert_eq!(a + b, Vec2::new(2., 6.));
        assert_eq!(a - b, Vec2::new(4., 2.));
        assert_eq!(2. * b, Vec2::new(-2., 4.));
        assert_eq!(a / 2., Vec2::new(1.5, 2.));
        assert_eq!(a.dot(b), 5.);
        assert_eq!(a.cross(b), 10.);
        assert_eq!(a.length_squared(), 25.);
        assert_eq!(a.length(), 5.);
        assert_eq!(a.perpendicular(), Vec2::new(-4., 3.));
    }

    #[test]
    fn test_haversine_symmetry() {
        let (lon1, lat1) = (37.6176, 55.7558);
        let (lon2, lat2) = (37.7, 55.8);
        let forward = haversine_km(lon1, lat1, lon2, lat2);
        let backward = haversine_km(lon2, lat2, lon1, lat1);
        assert!((forward - backward).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_identity() {
        assert_eq!(haversine_km(37.6176, 55.7558, 37.6176, 55.7558), 0.);
    }

    #[test]
    fn test_haversine_calibration() {
        // ~0.009° of latitude near Moscow is about a kilometre
        let dist = haversine_km(37.6176, 55.7558, 37.6176, 55.7648);
        assert!((dist - 1.0).abs() < 0.1, "got {dist}km");
    }

    #[test]
    fn test_circle_radius() {
        let center = Vec2::new(10., -3.);
        let ring = circle(center, 2.5, 32);
        assert_eq!(ring.len(), 32);
        for v in ring {
            assert!((v.distance_to(center) - 2.5).abs() < 1e-12);
        }
    }
}
