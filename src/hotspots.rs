//! Buffer-overlap hotspot detection.
//!
//! Takes N buffer rings, finds where many of them stack on top of each
//! other, and emits the densest overlap centers. An R-tree over bounding
//! boxes prunes the pairwise intersection scan; pair centroids are quantized
//! to 6 decimal degrees so co-located intersections collide into one group.

use std::hash::BuildHasherDefault;

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Intersects, LineString, MultiPolygon, Polygon, Rect,
    Validation,
};
use indexmap::{IndexMap, IndexSet};
use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHasher;
use tracing::{debug, warn};

use crate::{
    math,
    model::{BufferRing, HotspotCandidate},
};

pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

pub const DEFAULT_MAX_POINTS: usize = 30;

/// Candidates closer than this (great-circle, kilometres) merge into one
/// cluster.
pub const CLUSTER_DISTANCE_KM: f64 = 0.05;

/// Quantization scale: 6 decimal degrees.
const CENTROID_SCALE: f64 = 1e6;

/// A ring tagged with its 1-based id, before geometry validation.
#[derive(Debug, Clone, Copy)]
pub struct TaggedRing<'a> {
    pub id: u32,
    pub points_count: usize,
    pub ring: &'a BufferRing,
}

/// A validated polygon ready for indexing.
pub struct IndexedPolygon {
    pub id: u32,
    pub polygon: Polygon<f64>,
    pub bbox: Rect<f64>,
    pub area: f64,
}

struct BoxEntry {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoxEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope.clone()
    }
}

/// Finds overlap centers where at least `min_intersections` buffers meet.
///
/// `min_intersections` clamps to ≥ 2; `max_points` of zero falls back to
/// [`DEFAULT_MAX_POINTS`]. Output is sorted by weight descending (ties keep
/// their discovery order) and truncated to `max_points`.
pub fn find_intersection_centers(
    rings: &[BufferRing],
    min_intersections: u32,
    max_points: usize,
) -> Vec<HotspotCandidate> {
    let min_intersections = min_intersections.max(2);
    let max_points = if max_points == 0 {
        DEFAULT_MAX_POINTS
    } else {
        max_points
    };

    if rings.len() < 2 {
        return Vec::new();
    }

    let tagged = assign_ids(rings);
    let polygons = build_polygons(&tagged);
    if polygons.is_empty() {
        return Vec::new();
    }

    let index = build_spatial_index(&polygons);
    let pairs = pairwise_intersections(&polygons, &index);
    if pairs.is_empty() {
        return Vec::new();
    }

    let groups = group_centroids(&pairs);
    let candidates = filter_by_multiplicity(groups, min_intersections);
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut clustered = cluster(candidates, max_points);
    clustered.sort_by(|a, b| b.weight.cmp(&a.weight));
    clustered.truncate(max_points);
    clustered
}

/// Tags each ring with its 1-based insertion id and vertex count.
pub fn assign_ids(rings: &[BufferRing]) -> Vec<TaggedRing<'_>> {
    rings
        .iter()
        .enumerate()
        .map(|(i, ring)| TaggedRing {
            id: i as u32 + 1,
            points_count: ring.len(),
            ring,
        })
        .collect()
}

/// Converts tagged rings into validated polygons, discarding degenerate or
/// self-intersecting rings with a count.
pub fn build_polygons(tagged: &[TaggedRing<'_>]) -> Vec<IndexedPolygon> {
    let mut out = Vec::with_capacity(tagged.len());
    let mut invalid = 0usize;

    for t in tagged {
        if t.ring.len() < 3 {
            invalid += 1;
            continue;
        }
        let coords: Vec<(f64, f64)> = t.ring.iter().map(|&[x, y]| (x, y)).collect();
        let polygon = Polygon::new(LineString::from(coords), vec![]);
        let Some(bbox) = polygon.bounding_rect() else {
            invalid += 1;
            continue;
        };
        if !polygon.is_valid() {
            invalid += 1;
            continue;
        }
        out.push(IndexedPolygon {
            id: t.id,
            area: polygon.unsigned_area(),
            polygon,
            bbox,
        });
    }

    if invalid > 0 {
        warn!("discarded {invalid} invalid buffer rings");
    }
    out
}

fn build_spatial_index(polygons: &[IndexedPolygon]) -> RTree<BoxEntry> {
    let entries = polygons
        .iter()
        .enumerate()
        .map(|(slot, p)| BoxEntry {
            slot,
            envelope: AABB::from_corners(
                [p.bbox.min().x, p.bbox.min().y],
                [p.bbox.max().x, p.bbox.max().y],
            ),
        })
        .collect();
    RTree::bulk_load(entries)
}

/// Intersects every bbox-overlapping pair `(i, j)` with `j > i`, keyed by
/// the polygons' assigned ids.
fn pairwise_intersections(
    polygons: &[IndexedPolygon],
    index: &RTree<BoxEntry>,
) -> FxIndexMap<(u32, u32), MultiPolygon<f64>> {
    let mut intersections = FxIndexMap::default();
    let mut checked = 0usize;

    for (i, cur) in polygons.iter().enumerate() {
        let query = AABB::from_corners(
            [cur.bbox.min().x, cur.bbox.min().y],
            [cur.bbox.max().x, cur.bbox.max().y],
        );
        let mut candidates: Vec<usize> = index
            .locate_in_envelope_intersecting(&query)
            .map(|e| e.slot)
            .filter(|&j| j > i)
            .collect();
        candidates.sort_unstable();

        for j in candidates {
            let other = &polygons[j];
            checked += 1;
            if cur.polygon.intersects(&other.polygon) {
                let overlap = cur.polygon.intersection(&other.polygon);
                if !overlap.0.is_empty() {
                    intersections.insert((cur.id, other.id), overlap);
                }
            }
        }
    }

    debug!(
        "checked {checked} candidate pairs, {} real intersections",
        intersections.len()
    );
    intersections
}

/// Groups pair ids by the quantized centroid of their intersection.
fn group_centroids(
    intersections: &FxIndexMap<(u32, u32), MultiPolygon<f64>>,
) -> FxIndexMap<(i64, i64), FxIndexSet<u32>> {
    let mut groups: FxIndexMap<(i64, i64), FxIndexSet<u32>> = FxIndexMap::default();

    for (&(id1, id2), overlap) in intersections {
        let Some(centroid) = overlap.centroid() else {
            continue;
        };
        let key = (
            (centroid.x() * CENTROID_SCALE).round() as i64,
            (centroid.y() * CENTROID_SCALE).round() as i64,
        );
        let group = groups.entry(key).or_default();
        group.insert(id1);
        group.insert(id2);
    }

    groups
}

fn filter_by_multiplicity(
    groups: FxIndexMap<(i64, i64), FxIndexSet<u32>>,
    min_intersections: u32,
) -> Vec<HotspotCandidate> {
    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() >= min_intersections as usize)
        .map(|((x, y), ids)| HotspotCandidate {
            lon: x as f64 / CENTROID_SCALE,
            lat: y as f64 / CENTROID_SCALE,
            weight: ids.len() as u32,
            buffer_ids: ids,
            clustered_count: 1,
        })
        .collect()
}

/// Greedy clustering, heaviest first: each unused candidate absorbs every
/// later unused candidate within [`CLUSTER_DISTANCE_KM`], keeping its own
/// coordinates and unioning buffer id sets.
fn cluster(mut candidates: Vec<HotspotCandidate>, max_points: usize) -> Vec<HotspotCandidate> {
    candidates.sort_by(|a, b| b.weight.cmp(&a.weight));

    let mut used = vec![false; candidates.len()];
    let mut clustered = Vec::new();

    for i in 0..candidates.len() {
        if used[i] {
            continue;
        }
        if clustered.len() >= max_points {
            break;
        }
        used[i] = true;

        let mut buffer_ids = candidates[i].buffer_ids.clone();
        let mut merged = 1u32;
        for j in i + 1..candidates.len() {
            if used[j] {
                continue;
            }
            let distance = math::haversine_km(
                candidates[i].lon,
                candidates[i].lat,
                candidates[j].lon,
                candidates[j].lat,
            );
            if distance <= CLUSTER_DISTANCE_KM {
                used[j] = true;
                merged += 1;
                buffer_ids.extend(candidates[j].buffer_ids.iter().copied());
            }
        }

        clustered.push(HotspotCandidate {
            lon: candidates[i].lon,
            lat: candidates[i].lat,
            weight: buffer_ids.len() as u32,
            buffer_ids,
            clustered_count: merged,
        });
    }

    clustered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> BufferRing {
        vec![
            [x, y],
            [x + size, y],
            [x + size, y + size],
            [x, y + size],
            [x, y],
        ]
    }

    #[test]
    fn test_assign_ids_monotonic() {
        let rings = vec![
            square(0., 0., 1.),
            vec![[2., 2.], [3., 2.], [3., 3.]],
            square(4., 4., 2.),
        ];
        let tagged = assign_ids(&rings);
        assert_eq!(tagged.len(), 3);
        for (i, t) in tagged.iter().enumerate() {
            assert_eq!(t.id, i as u32 + 1);
            assert_eq!(t.points_count, rings[i].len());
        }
    }

    #[test]
    fn test_build_polygons_discards_invalid() {
        let bowtie = vec![[0., 0.], [1., 1.], [1., 0.], [0., 1.], [0., 0.]];
        let rings = vec![square(0., 0., 1.), vec![[0., 0.], [1., 1.]], bowtie];
        let tagged = assign_ids(&rings);
        let polys = build_polygons(&tagged);

        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].id, 1);
        assert!((polys[0].area - 1.).abs() < 1e-12);
        assert_eq!(polys[0].bbox.min().x, 0.);
        assert_eq!(polys[0].bbox.max().y, 1.);
    }

    #[test]
    fn test_three_overlapping_squares() {
        let rings = vec![
            square(0., 0., 2.),
            square(1., 1., 2.),
            square(0.5, 0.5, 2.),
        ];
        let centers = find_intersection_centers(&rings, 2, 10);

        assert!(!centers.is_empty());
        for c in &centers {
            assert!(c.weight >= 2);
            assert_eq!(c.weight as usize, c.buffer_ids.len());
            assert!(c.buffer_ids.iter().all(|&id| (1..=3).contains(&id)));
        }
        // weight descending
        for pair in centers.windows(2) {
            assert!(pair[0].weight >= pair[1].weight);
        }
    }

    #[test]
    fn test_disjoint_squares_empty() {
        let rings = vec![square(0., 0., 1.), square(10., 10., 1.)];
        assert!(find_intersection_centers(&rings, 2, 10).is_empty());
    }

    #[test]
    fn test_single_ring_empty() {
        let rings = vec![square(0., 0., 1.)];
        assert!(find_intersection_centers(&rings, 2, 10).is_empty());
        assert!(find_intersection_centers(&[], 2, 10).is_empty());
    }

    #[test]
    fn test_staircase_respects_max_points() {
        let rings: Vec<BufferRing> = (0..10).map(|i| square(i as f64, i as f64, 1.)).collect();
        let centers = find_intersection_centers(&rings, 2, 5);
        assert!(centers.len() <= 5);
    }

    #[test]
    fn test_overlapping_staircase_truncates() {
        // 1.5-sized squares overlap both neighbors, giving many pair centers
        let rings: Vec<BufferRing> = (0..10).map(|i| square(i as f64, i as f64, 1.5)).collect();
        let centers = find_intersection_centers(&rings, 2, 3);
        assert!(!centers.is_empty());
        assert!(centers.len() <= 3);
        for pair in centers.windows(2) {
            assert!(pair[0].weight >= pair[1].weight);
        }
    }

    #[test]
    fn test_identical_squares_collapse_to_one_candidate() {
        // all pairwise centroids coincide, so one group carries every id
        let rings: Vec<BufferRing> = (0..4).map(|_| square(0., 0., 1.)).collect();
        let centers = find_intersection_centers(&rings, 2, 10);
        assert_eq!(centers.len(), 1);
        assert_eq!(centers[0].weight, 4);
    }

    fn candidate(lon: f64, lat: f64, ids: &[u32]) -> HotspotCandidate {
        let buffer_ids: FxIndexSet<u32> = ids.iter().copied().collect();
        HotspotCandidate {
            lon,
            lat,
            weight: buffer_ids.len() as u32,
            buffer_ids,
            clustered_count: 1,
        }
    }

    #[test]
    fn test_cluster_collapses_dense_wedge() {
        // ~11m apart near Moscow: all within the 50m cluster radius
        let candidates = vec![
            candidate(37.6176, 55.7558, &[1, 2]),
            candidate(37.6177, 55.7558, &[2, 3]),
            candidate(37.6178, 55.7559, &[4, 5]),
            candidate(37.6176, 55.7559, &[1, 5]),
        ];
        let clustered = cluster(candidates, 30);

        assert_eq!(clustered.len(), 1);
        assert_eq!(clustered[0].weight, 5);
        assert_eq!(clustered[0].clustered_count, 4);
        let mut ids: Vec<u32> = clustered[0].buffer_ids.iter().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cluster_keeps_distant_candidates_apart() {
        let candidates = vec![
            candidate(37.6176, 55.7558, &[1, 2, 3]),
            candidate(37.70, 55.80, &[4, 5]),
        ];
        let clustered = cluster(candidates, 30);
        assert_eq!(clustered.len(), 2);
        // heaviest seed first
        assert_eq!(clustered[0].weight, 3);
        assert_eq!(clustered[1].weight, 2);
    }
}
