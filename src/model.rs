use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::hotspots::FxIndexSet;

/// Raw `road_nodes` row as it leaves the store. Coordinates stay as text
/// until the graph loader parses them; bad values drop the row.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRecord {
    pub node_id: u64,
    pub longitude: Option<CompactString>,
    pub latitude: Option<CompactString>,
}

/// Raw `road_ribs` row. Lengths are meters as text.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeRecord {
    pub start_node_id: Option<u64>,
    pub end_node_id: Option<u64>,
    pub length: Option<CompactString>,
}

/// A `builds` row. The upstream table stores coordinates as strings,
/// sometimes with comma decimal separators.
#[derive(Debug, Clone, Deserialize)]
pub struct Build {
    pub id: u64,
    pub name: Option<CompactString>,
    pub category: Option<CompactString>,
    pub longitude: Option<CompactString>,
    pub latitude: Option<CompactString>,
}

/// A `criteries` row: a point of interest with a scoring category. Rows
/// flagged `is_antiattractive` still score, but never seed interest buffers.
#[derive(Debug, Clone, Deserialize)]
pub struct CriteriaRow {
    pub id: u64,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub category: Option<CompactString>,
    pub is_antiattractive: Option<bool>,
}

/// Parses a coordinate that may use a comma as the decimal separator.
pub fn parse_coord(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse().ok()
}

/// GeoJSON geometry in WGS84 lon/lat order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
}

impl Geometry {
    /// Outer ring of a single polygon; `None` for multi-polygons.
    pub fn outer_ring(&self) -> Option<&[[f64; 2]]> {
        match self {
            Geometry::Polygon { coordinates } => coordinates.first().map(Vec::as_slice),
            Geometry::MultiPolygon { .. } => None,
        }
    }
}

/// A reachability envelope for one time budget.
#[derive(Debug, Clone, Serialize)]
pub struct Isochrone {
    pub minutes: u32,
    pub polygon: Geometry,
}

/// An input ring for the intersection aggregator: ordered `[lon, lat]`
/// vertices, closed or closeable.
pub type BufferRing = Vec<[f64; 2]>;

/// A dense overlap zone produced by the aggregator.
#[derive(Debug, Clone)]
pub struct HotspotCandidate {
    pub lon: f64,
    pub lat: f64,
    /// Number of distinct buffers meeting at this point; always
    /// `== buffer_ids.len()`.
    pub weight: u32,
    pub buffer_ids: FxIndexSet<u32>,
    /// How many pre-cluster candidates were merged into this one.
    pub clustered_count: u32,
}

/// A scored candidate as emitted to clients.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoredPoint {
    pub rank: u32,
    pub lon: f64,
    pub lat: f64,
    pub score: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coord_tolerates_commas() {
        assert_eq!(parse_coord("37.6176"), Some(37.6176));
        assert_eq!(parse_coord("37,6176"), Some(37.6176));
        assert_eq!(parse_coord("  55,7558 "), Some(55.7558));
        assert_eq!(parse_coord("n/a"), None);
        assert_eq!(parse_coord(""), None);
    }

    #[test]
    fn test_geometry_geojson_shape() {
        let geom = Geometry::Polygon {
            coordinates: vec![vec![[0., 0.], [1., 0.], [1., 1.], [0., 0.]]],
        };
        let json = serde_json::to_value(&geom).unwrap();
        assert_eq!(json["type"], "Polygon");
        assert_eq!(json["coordinates"][0][1][0], 1.0);

        let back: Geometry = serde_json::from_value(json).unwrap();
        assert_eq!(back, geom);
    }

    #[test]
    fn test_outer_ring() {
        let geom = Geometry::Polygon {
            coordinates: vec![vec![[0., 0.], [1., 0.], [1., 1.]]],
        };
        assert_eq!(geom.outer_ring().unwrap().len(), 3);

        let multi = Geometry::MultiPolygon { coordinates: vec![] };
        assert!(multi.outer_ring().is_none());
    }
}
