//! Road graph store: loaded once from the node/edge snapshot, immutable for
//! the rest of the process lifetime.
//!
//! Layout is three parallel arrays indexed by a dense [`NodeIdx`]: external
//! ids, coordinates, and CSR adjacency. The external `node_id` space lives in
//! a side map. An R-tree over lon/lat serves nearest-node snapping.

use std::sync::Arc;

use rstar::{AABB, PointDistance, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{
    error::Error,
    model::{EdgeRecord, NodeRecord, parse_coord},
};

/// Pedestrian speed used to derive edge traversal times from lengths.
pub const WALKING_SPEED_M_PER_MIN: f64 = 80.0;

/// Dense node index into the graph's parallel arrays.
pub type NodeIdx = u32;

struct NodeEntry {
    point: [f64; 2], // [lon, lat]
    idx: NodeIdx,
    node_id: u64,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared Euclidean distance in degree space. Good enough for snapping
    /// within one city.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlon = self.point[0] - point[0];
        let dlat = self.point[1] - point[1];
        dlon * dlon + dlat * dlat
    }
}

pub struct RoadGraph {
    node_ids: Vec<u64>,
    coords: Vec<[f64; 2]>,
    index_of: FxHashMap<u64, NodeIdx>,
    /// CSR row pointer; the neighbors of node `n` occupy
    /// `adjacency[out_start[n] .. out_start[n + 1]]`.
    out_start: Vec<u32>,
    /// `(neighbor, time_min)`, both directions of every admitted edge.
    adjacency: Vec<(NodeIdx, f64)>,
    /// Each undirected edge exactly once.
    segments: Vec<(NodeIdx, NodeIdx)>,
    spatial: RTree<NodeEntry>,
}

impl RoadGraph {
    /// One-shot construction from raw snapshot rows. Nodes with unparseable
    /// coordinates and edges with unparseable lengths or missing endpoints
    /// are skipped; a summary warning reports the counts.
    pub fn load(
        nodes: impl IntoIterator<Item = NodeRecord>,
        edges: impl IntoIterator<Item = EdgeRecord>,
    ) -> Self {
        let mut node_ids = Vec::new();
        let mut coords: Vec<[f64; 2]> = Vec::new();
        let mut index_of = FxHashMap::default();
        let mut skipped_nodes = 0usize;

        for rec in nodes {
            let parsed = rec
                .longitude
                .as_deref()
                .and_then(parse_coord)
                .zip(rec.latitude.as_deref().and_then(parse_coord));
            let Some((lon, lat)) = parsed else {
                skipped_nodes += 1;
                continue;
            };
            let idx = node_ids.len() as NodeIdx;
            node_ids.push(rec.node_id);
            coords.push([lon, lat]);
            index_of.insert(rec.node_id, idx);
        }

        let mut segments: Vec<(NodeIdx, NodeIdx)> = Vec::new();
        let mut times: Vec<f64> = Vec::new();
        let mut skipped_edges = 0usize;

        for rec in edges {
            let length = rec.length.as_deref().and_then(parse_coord);
            let endpoints = rec
                .start_node_id
                .and_then(|id| index_of.get(&id))
                .zip(rec.end_node_id.and_then(|id| index_of.get(&id)));
            let (Some(length), Some((&a, &b))) = (length, endpoints) else {
                skipped_edges += 1;
                continue;
            };
            segments.push((a, b));
            times.push(length / WALKING_SPEED_M_PER_MIN);
        }

        // CSR over both directions
        let node_count = node_ids.len();
        let mut out_start = vec![0u32; node_count + 1];
        for &(a, b) in &segments {
            out_start[a as usize + 1] += 1;
            out_start[b as usize + 1] += 1;
        }
        for i in 1..=node_count {
            out_start[i] += out_start[i - 1];
        }
        let mut cursor = out_start.clone();
        let mut adjacency = vec![(0 as NodeIdx, 0.0f64); segments.len() * 2];
        for (&(a, b), &time_min) in segments.iter().zip(&times) {
            adjacency[cursor[a as usize] as usize] = (b, time_min);
            cursor[a as usize] += 1;
            adjacency[cursor[b as usize] as usize] = (a, time_min);
            cursor[b as usize] += 1;
        }

        let entries: Vec<NodeEntry> = coords
            .iter()
            .enumerate()
            .map(|(i, &point)| NodeEntry {
                point,
                idx: i as NodeIdx,
                node_id: node_ids[i],
            })
            .collect();
        let spatial = RTree::bulk_load(entries);

        if skipped_nodes > 0 || skipped_edges > 0 {
            warn!(
                "road graph load skipped {skipped_nodes} malformed nodes and \
                 {skipped_edges} malformed or orphan edges"
            );
        }
        info!(
            "road graph loaded: {} nodes, {} edges",
            node_count,
            segments.len()
        );

        Self {
            node_ids,
            coords,
            index_of,
            out_start,
            adjacency,
            segments,
            spatial,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    #[inline]
    pub fn coord(&self, n: NodeIdx) -> [f64; 2] {
        self.coords[n as usize]
    }

    #[inline]
    pub fn node_id(&self, n: NodeIdx) -> u64 {
        self.node_ids[n as usize]
    }

    pub fn index_of(&self, node_id: u64) -> Option<NodeIdx> {
        self.index_of.get(&node_id).copied()
    }

    /// Nearest node to the given coordinate; `None` only for an empty graph.
    /// Distance ties resolve to the smallest external node id.
    pub fn nearest_node(&self, lon: f64, lat: f64) -> Option<NodeIdx> {
        let mut iter = self
            .spatial
            .nearest_neighbor_iter_with_distance_2(&[lon, lat]);
        let (first, best_d2) = iter.next()?;
        let mut best = first;
        for (entry, d2) in iter {
            if d2 > best_d2 {
                break;
            }
            if entry.node_id < best.node_id {
                best = entry;
            }
        }
        Some(best.idx)
    }

    /// Neighbors of `n` with edge traversal times in minutes.
    #[inline]
    pub fn neighbors(&self, n: NodeIdx) -> impl Iterator<Item = (NodeIdx, f64)> + '_ {
        let start = self.out_start[n as usize] as usize;
        let end = self.out_start[n as usize + 1] as usize;
        self.adjacency[start..end].iter().copied()
    }

    /// Every undirected edge exactly once.
    pub fn segments(&self) -> &[(NodeIdx, NodeIdx)] {
        &self.segments
    }
}

// ── init harness ─────────────────────────────────────────────────────────────

/// Process-wide road graph handle.
///
/// Uninit → Initializing → Ready. The first `initialize` call performs the
/// load; concurrent callers await the same in-flight future. `get` before
/// Ready fails with [`Error::NotInitialized`]; after Ready it is a lock-free
/// read of an immutable graph.
pub struct GraphHandle {
    cell: OnceCell<Arc<RoadGraph>>,
}

impl GraphHandle {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    pub async fn initialize<F, Fut>(&self, load: F) -> eyre::Result<Arc<RoadGraph>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = eyre::Result<RoadGraph>>,
    {
        self.cell
            .get_or_try_init(|| async { load().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn get(&self) -> Result<Arc<RoadGraph>, Error> {
        self.cell.get().cloned().ok_or(Error::NotInitialized)
    }
}

impl Default for GraphHandle {
    fn default() -> Self {
        Self::new()
    }
}

pub static GRAPH: GraphHandle = GraphHandle::new();
