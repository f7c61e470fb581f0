//! Point-in-polygon tests.
//!
//! [`FanPolygon`] anchors a fan of triangles at a known interior point and
//! tests candidates with precomputed barycentric denominators. It is only
//! correct for rings that are star-shaped with respect to the anchor;
//! [`ray_cast_contains`] is the fallback for arbitrary rings.

use super::Vec2;

const BARY_EPS: f64 = 1e-10;

/// One triangle of the fan, stored relative to the anchor.
struct Triangle {
    v0: Vec2,
    v1: Vec2,
    dot00: f64,
    dot11: f64,
    dot01: f64,
    denom: f64,
}

impl Triangle {
    fn new(center: Vec2, a: Vec2, b: Vec2) -> Self {
        let v0 = a - center;
        let v1 = b - center;
        let dot00 = v0.length_squared();
        let dot11 = v1.length_squared();
        let dot01 = v0.dot(v1);
        Self {
            v0,
            v1,
            dot00,
            dot11,
            dot01,
            denom: dot00 * dot11 - dot01 * dot01,
        }
    }

    /// `v2` is the query point relative to the anchor. The barycentric
    /// coordinates are left unnormalized, so the third inequality compares
    /// against `denom` rather than 1.
    fn contains(&self, v2: Vec2) -> bool {
        let dot02 = self.v0.dot(v2);
        let dot12 = self.v1.dot(v2);

        let u = self.dot11 * dot02 - self.dot01 * dot12;
        let v = self.dot00 * dot12 - self.dot01 * dot02;

        u >= -BARY_EPS && v >= -BARY_EPS && u + v <= self.denom + BARY_EPS
    }
}

/// A polygon ring decomposed into a triangle fan around an anchor point.
pub struct FanPolygon {
    center: Vec2,
    triangles: Vec<Triangle>,
}

impl FanPolygon {
    /// `ring` is the ordered outer ring; a closing duplicate vertex is
    /// harmless. The anchor must see the whole interior for the test to be
    /// exact.
    pub fn new(center: Vec2, ring: &[Vec2]) -> Self {
        let mut triangles: Vec<Triangle> = (1..ring.len())
            .map(|i| Triangle::new(center, ring[i - 1], ring[i]))
            .collect();
        if let (Some(&first), Some(&last)) = (ring.first(), ring.last()) {
            triangles.push(Triangle::new(center, first, last));
        }
        Self { center, triangles }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        let v2 = p - self.center;
        self.triangles.iter().any(|t| t.contains(v2))
    }
}

/// Even-odd ray casting for arbitrary simple rings.
pub fn ray_cast_contains(ring: &[Vec2], p: Vec2) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
