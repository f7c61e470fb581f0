//! Isochrone construction: bounded multi-source Dijkstra over the road
//! graph, then a buffered union of the reachable edges.

use std::{cmp, collections::BinaryHeap, f64::consts::PI};

use geo::{Area, LineString, MultiPolygon, Polygon, unary_union};
use tracing::debug;

use crate::{
    error::Error,
    graph::{NodeIdx, RoadGraph},
    math::{self, Vec2, mercator},
    model::{Geometry, Isochrone},
};

/// Upper bound on the time budget, in minutes.
pub const MAX_MINUTES: u32 = 15;

/// Half-width of the corridor drawn around each reachable road edge.
pub const EDGE_BUFFER_M: f64 = 50.0;

/// Disk radius (degrees) for start nodes with no incident edges.
const ISOLATED_NODE_RADIUS_DEG: f64 = 0.0005;

const CAP_SEGMENTS: usize = 16;
const DISK_SEGMENTS: usize = 32;

struct WeightedNode {
    idx: NodeIdx,
    time: f64,
}

impl Ord for WeightedNode {
    #[inline]
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        // intentionally inverted to make the BinaryHeap a min-heap
        other.time.total_cmp(&self.time)
    }
}
impl PartialOrd for WeightedNode {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for WeightedNode {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}
impl Eq for WeightedNode {}

/// Multi-source Dijkstra over edge times, seeded at distance zero from every
/// source. Expansion halts once the whole frontier exceeds `limit_min`;
/// unvisited nodes keep `f64::INFINITY`.
pub fn walk_times(graph: &RoadGraph, sources: &[NodeIdx], limit_min: f64) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; graph.node_count()];
    let mut heap = BinaryHeap::with_capacity(sources.len());

    for &s in sources {
        if dist[s as usize] > 0. {
            dist[s as usize] = 0.;
            heap.push(WeightedNode { idx: s, time: 0. });
        }
    }

    while let Some(WeightedNode { idx, time }) = heap.pop() {
        if time > limit_min {
            break;
        }
        if time > dist[idx as usize] {
            // a confirmed cheaper way to this node is already known
            continue;
        }
        for (neighbor, edge_min) in graph.neighbors(idx) {
            let tentative = time + edge_min;
            if tentative < dist[neighbor as usize] {
                dist[neighbor as usize] = tentative;
                heap.push(WeightedNode {
                    idx: neighbor,
                    time: tentative,
                });
            }
        }
    }

    dist
}

/// Builds the walking-time envelope for one or more start coordinates.
///
/// Starts snap to their nearest road nodes and deduplicate; the reachable
/// subgraph's edges are buffered by [`EDGE_BUFFER_M`] in EPSG:3857 and
/// unioned. A multi-polygon union reduces to its largest-area part.
pub async fn build_isochrone(
    graph: &RoadGraph,
    starts: &[(f64, f64)],
    minutes: u32,
) -> Result<Isochrone, Error> {
    if minutes == 0 || minutes > MAX_MINUTES {
        return Err(Error::BadTime(minutes as i64));
    }

    let mut sources: Vec<NodeIdx> = starts
        .iter()
        .filter_map(|&(lon, lat)| graph.nearest_node(lon, lat))
        .collect();
    sources.sort_unstable();
    sources.dedup();
    if sources.is_empty() {
        return Err(Error::NoStartNodes);
    }

    let limit = minutes as f64;
    let dist = walk_times(graph, &sources, limit);
    let reached = |n: NodeIdx| dist[n as usize] <= limit;

    // stage boundary: lets an abandoned request die before the geometry work
    tokio::task::yield_now().await;

    let capsules: Vec<Polygon<f64>> = graph
        .segments()
        .iter()
        .filter(|&&(a, b)| reached(a) || reached(b))
        .map(|&(a, b)| {
            let [lon_a, lat_a] = graph.coord(a);
            let [lon_b, lat_b] = graph.coord(b);
            capsule(
                mercator::to_mercator(lon_a, lat_a),
                mercator::to_mercator(lon_b, lat_b),
                EDGE_BUFFER_M,
            )
        })
        .collect();

    if capsules.is_empty() {
        // isolated start nodes: a union of small disks, already in degrees
        let disks: Vec<Polygon<f64>> = (0..graph.node_count() as NodeIdx)
            .filter(|&n| reached(n))
            .map(|n| {
                let [lon, lat] = graph.coord(n);
                let ring = math::circle(Vec2::new(lon, lat), ISOLATED_NODE_RADIUS_DEG, DISK_SEGMENTS);
                ring_polygon(&ring)
            })
            .collect();
        debug!("degenerate isochrone: {} isolated nodes", disks.len());
        let largest = largest_polygon(unary_union(&disks));
        return Ok(Isochrone {
            minutes,
            polygon: polygon_to_geometry(&largest, |v| (v.x, v.y)),
        });
    }

    debug!("buffering {} reachable edges", capsules.len());
    let unioned: MultiPolygon<f64> = unary_union(&capsules);

    tokio::task::yield_now().await;

    let largest = largest_polygon(unioned);
    Ok(Isochrone {
        minutes,
        polygon: polygon_to_geometry(&largest, |v| mercator::to_wgs84(v)),
    })
}

/// A line segment dilated by `radius`: two semicircular caps joined by the
/// corridor sides.
fn capsule(a: Vec2, b: Vec2, radius: f64) -> Polygon<f64> {
    let axis = b - a;
    let len2 = axis.length_squared();
    if len2 == 0. {
        return ring_polygon(&math::circle(a, radius, DISK_SEGMENTS));
    }

    let heading = axis.y.atan2(axis.x);
    let mut ring = Vec::with_capacity(2 * CAP_SEGMENTS + 2);
    for i in 0..=CAP_SEGMENTS {
        let ang = heading - PI / 2. + PI * i as f64 / CAP_SEGMENTS as f64;
        ring.push(b + Vec2::new(ang.cos(), ang.sin()) * radius);
    }
    for i in 0..=CAP_SEGMENTS {
        let ang = heading + PI / 2. + PI * i as f64 / CAP_SEGMENTS as f64;
        ring.push(a + Vec2::new(ang.cos(), ang.sin()) * radius);
    }
    ring_polygon(&ring)
}

fn ring_polygon(ring: &[Vec2]) -> Polygon<f64> {
    let coords: Vec<(f64, f64)> = ring.iter().map(|v| (v.x, v.y)).collect();
    Polygon::new(LineString::from(coords), vec![])
}

fn largest_polygon(multi: MultiPolygon<f64>) -> Polygon<f64> {
    multi
        .into_iter()
        .max_by(|p, q| p.unsigned_area().total_cmp(&q.unsigned_area()))
        .unwrap_or_else(|| Polygon::new(LineString::new(vec![]), vec![]))
}

fn polygon_to_geometry(polygon: &Polygon<f64>, back: impl Fn(Vec2) -> (f64, f64)) -> Geometry {
    let convert = |ring: &LineString<f64>| -> Vec<[f64; 2]> {
        ring.coords()
            .map(|c| {
                let (lon, lat) = back(Vec2::new(c.x, c.y));
                [lon, lat]
            })
            .collect()
    };

    let mut coordinates = vec![convert(polygon.exterior())];
    coordinates.extend(polygon.interiors().iter().map(convert));
    Geometry::Polygon { coordinates }
}
