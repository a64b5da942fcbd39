//! Compressed node-based graph construction
//!
//! Builds the street graph from parser output, then folds degree-2
//! through-chains into single segments whose geometry keeps the intermediate
//! points (see `compression`). Collapsed nodes stay addressable but carry no
//! incident segments.

pub mod compression;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::coord::{bearing_deg, haversine_m, Coordinate};
use crate::osm::ExtractionInput;
use crate::profile::{RoadClass, TravelMode};
use crate::{NameId, NodeId, SegmentId, Weight, INVALID_NAME};

/// Total traversal cost of one segment direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDir {
    pub weight: Weight,
    pub duration: Weight,
}

/// One compressed street segment. Geometry runs `from` -> `to`; the reverse
/// traversal reads it backwards.
#[derive(Debug, Clone)]
pub struct Segment {
    pub from: NodeId,
    pub to: NodeId,
    /// km/h along geometry orientation; 0.0 = not traversable that way.
    pub speed_fwd: f64,
    pub speed_rev: f64,
    pub class: RoadClass,
    pub name: NameId,
    pub mode: TravelMode,
    pub roundabout: bool,
    pub oneway_tagged: bool,
    pub access_restricted: bool,
    pub geometry: Vec<Coordinate>,
    /// Cumulative per-leg weight along geometry orientation (forward speed
    /// basis), length `geometry.len() - 1`. Filled by `finalize`.
    pub cum_weights: Vec<Weight>,
    pub cum_durations: Vec<Weight>,
    pub total_fwd: Option<SegmentDir>,
    pub total_rev: Option<SegmentDir>,
}

impl Segment {
    pub fn is_loop(&self) -> bool {
        self.from == self.to
    }

    fn leg_cost(dist_m: f64, speed_kmh: f64) -> Weight {
        let speed_mps = speed_kmh / 3.6;
        ((dist_m / speed_mps) * 10.0).round().max(1.0) as Weight
    }

    /// Compute cumulative arrays and per-direction totals from geometry.
    pub fn finalize(&mut self) {
        let n_legs = self.geometry.len().saturating_sub(1);
        self.cum_weights = Vec::with_capacity(n_legs);
        self.cum_durations = Vec::with_capacity(n_legs);

        let basis = if self.speed_fwd > 0.0 {
            self.speed_fwd
        } else {
            self.speed_rev
        };

        let mut acc_w: Weight = 0;
        let mut rev_w: Weight = 0;
        for i in 0..n_legs {
            let d = haversine_m(self.geometry[i], self.geometry[i + 1]);
            acc_w += Self::leg_cost(d, basis);
            self.cum_weights.push(acc_w);
            self.cum_durations.push(acc_w);
            if self.speed_rev > 0.0 {
                rev_w += Self::leg_cost(d, self.speed_rev);
            }
        }

        // When the forward direction exists it is the cumulative basis
        self.total_fwd = (self.speed_fwd > 0.0).then_some(SegmentDir {
            weight: acc_w,
            duration: acc_w,
        });
        self.total_rev = (self.speed_rev > 0.0).then(|| SegmentDir {
            weight: rev_w,
            duration: rev_w,
        });
    }

    /// Geometric length in meters.
    pub fn length_m(&self) -> f64 {
        self.geometry
            .windows(2)
            .map(|w| haversine_m(w[0], w[1]))
            .sum()
    }
}

/// A directed view of a segment; the identity of an edge-expanded node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectedSegment {
    pub segment: SegmentId,
    /// True when travelling along geometry orientation (`from` -> `to`).
    pub forward: bool,
}

impl DirectedSegment {
    pub fn new(segment: SegmentId, forward: bool) -> Self {
        Self { segment, forward }
    }

    pub fn reversed(self) -> Self {
        Self {
            segment: self.segment,
            forward: !self.forward,
        }
    }
}

/// Interned street names.
#[derive(Debug, Default)]
pub struct NameTable {
    names: Vec<String>,
    index: FxHashMap<String, NameId>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i as NameId))
            .collect();
        Self { names, index }
    }

    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len() as NameId;
        self.names.push(name.to_owned());
        self.index.insert(name.to_owned(), id);
        id
    }

    pub fn get(&self, id: NameId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The compressed node-based graph.
#[derive(Debug)]
pub struct NodeBasedGraph {
    pub coords: Vec<Coordinate>,
    /// Folded into a chain; invisible to later stages.
    pub removed: Vec<bool>,
    pub traffic_signal: Vec<bool>,
    pub segments: Vec<Segment>,
    /// Per node: incident segment ids (either endpoint).
    pub incident: Vec<Vec<SegmentId>>,
    pub names: NameTable,
}

impl NodeBasedGraph {
    pub fn node_count(&self) -> usize {
        self.coords.len()
    }

    pub fn source(&self, ds: DirectedSegment) -> NodeId {
        let s = &self.segments[ds.segment as usize];
        if ds.forward {
            s.from
        } else {
            s.to
        }
    }

    pub fn get_target(&self, ds: DirectedSegment) -> NodeId {
        let s = &self.segments[ds.segment as usize];
        if ds.forward {
            s.to
        } else {
            s.from
        }
    }

    pub fn dir_cost(&self, ds: DirectedSegment) -> Option<SegmentDir> {
        let s = &self.segments[ds.segment as usize];
        if ds.forward {
            s.total_fwd
        } else {
            s.total_rev
        }
    }

    pub fn is_traversable(&self, ds: DirectedSegment) -> bool {
        self.dir_cost(ds).is_some()
    }

    /// Outgoing directed segments at `node`.
    pub fn adjacent_edges(&self, node: NodeId) -> impl Iterator<Item = DirectedSegment> + '_ {
        self.incident[node as usize].iter().filter_map(move |&sid| {
            let s = &self.segments[sid as usize];
            let forward = s.from == node;
            // Loops leave in the forward orientation only
            let ds = DirectedSegment::new(sid, forward);
            self.is_traversable(ds).then_some(ds)
        })
    }

    /// Incoming directed segments at `node`.
    pub fn incoming_edges(&self, node: NodeId) -> impl Iterator<Item = DirectedSegment> + '_ {
        self.incident[node as usize].iter().filter_map(move |&sid| {
            let s = &self.segments[sid as usize];
            let forward = s.to == node;
            let ds = DirectedSegment::new(sid, forward);
            self.is_traversable(ds).then_some(ds)
        })
    }

    /// Reconstruct the polyline of a directed segment, traversal order.
    pub fn expand_geometry(&self, ds: DirectedSegment) -> Vec<Coordinate> {
        let s = &self.segments[ds.segment as usize];
        if ds.forward {
            s.geometry.clone()
        } else {
            let mut g = s.geometry.clone();
            g.reverse();
            g
        }
    }

    /// Bearing of the last leg arriving at the target of `ds`.
    pub fn entry_bearing(&self, ds: DirectedSegment) -> f64 {
        let s = &self.segments[ds.segment as usize];
        let g = &s.geometry;
        if ds.forward {
            bearing_deg(g[g.len() - 2], g[g.len() - 1])
        } else {
            bearing_deg(g[1], g[0])
        }
    }

    /// Bearing of the first leg leaving the source of `ds`.
    pub fn exit_bearing(&self, ds: DirectedSegment) -> f64 {
        let s = &self.segments[ds.segment as usize];
        let g = &s.geometry;
        if ds.forward {
            bearing_deg(g[0], g[1])
        } else {
            bearing_deg(g[g.len() - 1], g[g.len() - 2])
        }
    }
}

/// Mapping from OSM node ids to compact ids, kept for restriction resolution.
#[derive(Debug, Default)]
pub struct NodeIdMap {
    map: FxHashMap<i64, NodeId>,
}

impl NodeIdMap {
    pub fn get(&self, osm_id: i64) -> Option<NodeId> {
        self.map.get(&osm_id).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Output of graph construction, before the edge-expansion stage.
pub struct NbgBuild {
    pub graph: NodeBasedGraph,
    pub node_map: NodeIdMap,
    /// Nodes carrying any barrier tag (passable or not).
    pub barrier_nodes: Vec<NodeId>,
}

/// Build the node-based graph from parser output.
///
/// `no_compress` lists compact node ids that must survive compression
/// (restriction members); barrier and signal nodes are excluded implicitly.
pub fn build_graph(
    input: &ExtractionInput,
    node_map: NodeIdMap,
    no_compress: &rustc_hash::FxHashSet<NodeId>,
) -> NbgBuild {
    let n_nodes = node_map.len();
    let mut coords = vec![Coordinate::new(0, 0); n_nodes];
    let mut has_coord = vec![false; n_nodes];
    let mut traffic_signal = vec![false; n_nodes];
    let mut barrier_nodes = Vec::new();
    for raw in &input.nodes {
        if let Some(id) = node_map.get(raw.id) {
            coords[id as usize] = raw.coord;
            has_coord[id as usize] = true;
            traffic_signal[id as usize] = raw.traffic_signal;
            if raw.barrier.is_some() {
                barrier_nodes.push(id);
            }
        }
    }

    let mut names = NameTable::new();
    let mut segments = Vec::new();
    let mut dropped_ways = 0usize;

    for way in &input.ways {
        let compact: Option<Vec<NodeId>> = way
            .nodes
            .iter()
            .map(|&n| node_map.get(n).filter(|&id| has_coord[id as usize]))
            .collect();
        let Some(compact) = compact else {
            dropped_ways += 1;
            continue;
        };
        if compact.len() < 2 {
            dropped_ways += 1;
            continue;
        }

        let name = way
            .way
            .name
            .as_deref()
            .map(|n| names.intern(n))
            .unwrap_or(INVALID_NAME);

        for pair in compact.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let ca = coords[a as usize];
            let cb = coords[b as usize];
            if a == b || ca == cb {
                continue;
            }
            segments.push(Segment {
                from: a,
                to: b,
                speed_fwd: way.way.speed_forward_kmh,
                speed_rev: way.way.speed_backward_kmh,
                class: way.way.class,
                name,
                mode: way.way.mode,
                roundabout: way.way.roundabout,
                oneway_tagged: way.way.oneway() != crate::profile::Oneway::No,
                access_restricted: way.way.access_restricted,
                geometry: vec![ca, cb],
                cum_weights: Vec::new(),
                cum_durations: Vec::new(),
                total_fwd: None,
                total_rev: None,
            });
        }
    }

    if dropped_ways > 0 {
        warn!(dropped_ways, "ways referenced missing nodes and were dropped");
    }

    let mut graph = NodeBasedGraph {
        incident: build_incident(n_nodes, &segments),
        coords,
        removed: vec![false; n_nodes],
        traffic_signal,
        segments,
        names,
    };

    let folded = compression::compress(&mut graph, no_compress, &barrier_nodes);
    debug!(
        folded,
        segments = graph.segments.len(),
        nodes = graph.node_count(),
        "node-based graph compressed"
    );

    for seg in &mut graph.segments {
        seg.finalize();
    }

    NbgBuild {
        graph,
        node_map,
        barrier_nodes,
    }
}

/// Assign compact ids to every node referenced by an accepted way,
/// in ascending OSM id order.
pub fn assign_node_ids(input: &ExtractionInput) -> NodeIdMap {
    let mut used: Vec<i64> = input.ways.iter().flat_map(|w| w.nodes.iter().copied()).collect();
    used.sort_unstable();
    used.dedup();
    let map = used
        .into_iter()
        .enumerate()
        .map(|(i, osm)| (osm, i as NodeId))
        .collect();
    NodeIdMap { map }
}

pub(crate) fn build_incident(n_nodes: usize, segments: &[Segment]) -> Vec<Vec<SegmentId>> {
    let mut incident: Vec<Vec<SegmentId>> = vec![Vec::new(); n_nodes];
    for (sid, seg) in segments.iter().enumerate() {
        incident[seg.from as usize].push(sid as SegmentId);
        if seg.to != seg.from {
            incident[seg.to as usize].push(sid as SegmentId);
        }
    }
    incident
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::{RawNode, RawWay};
    use crate::profile::WayProfile;

    pub(crate) fn test_way_profile(speed: f64, oneway: bool) -> WayProfile {
        WayProfile {
            class: RoadClass::Residential,
            mode: TravelMode::Driving,
            speed_forward_kmh: speed,
            speed_backward_kmh: if oneway { 0.0 } else { speed },
            roundabout: false,
            access_restricted: false,
            name: None,
        }
    }

    fn line_input(n: usize, spacing_deg: f64) -> ExtractionInput {
        let mut input = ExtractionInput::new();
        for i in 0..n {
            input.nodes.push(RawNode::plain(
                i as i64 + 1,
                Coordinate::from_degrees(spacing_deg * i as f64, 0.0),
            ));
        }
        input.ways.push(RawWay {
            id: 100,
            nodes: (1..=n as i64).collect(),
            way: test_way_profile(36.0, false),
        });
        input
    }

    #[test]
    fn chain_compresses_to_single_segment() {
        let input = line_input(5, 0.0003);
        let node_map = assign_node_ids(&input);
        let build = build_graph(&input, node_map, &Default::default());
        let g = &build.graph;

        assert_eq!(g.segments.len(), 1);
        let seg = &g.segments[0];
        assert_eq!(seg.geometry.len(), 5);
        assert!(g.removed[1] && g.removed[2] && g.removed[3]);
        assert!(!g.removed[0] && !g.removed[4]);
        // ~33.4m per leg at 10 m/s = ~33ds each
        let total = seg.total_fwd.unwrap().weight;
        assert_eq!(total, *seg.cum_weights.last().unwrap());
        assert!((120..150).contains(&total), "total {total}");
    }

    #[test]
    fn endpoints_keep_adjacency() {
        let input = line_input(3, 0.0003);
        let node_map = assign_node_ids(&input);
        let build = build_graph(&input, node_map, &Default::default());
        let g = &build.graph;

        let out: Vec<_> = g.adjacent_edges(0).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(g.get_target(out[0]), 2);
        let incoming: Vec<_> = g.incoming_edges(0).collect();
        assert_eq!(incoming.len(), 1);
        assert_eq!(g.source(incoming[0]), 2);
    }

    #[test]
    fn geometry_expansion_respects_direction(){
        let input = line_input(3, 0.0003);
        let node_map = assign_node_ids(&input);
        let build = build_graph(&input, node_map, &Default::default());
        let g = &build.graph;
        let ds = g.adjacent_edges(0).next().unwrap();
        let fwd = g.expand_geometry(ds);
        let rev = g.expand_geometry(ds.reversed());
        assert_eq!(fwd.len(), 3);
        assert_eq!(fwd.first(), rev.last());
        assert_eq!(fwd.last(), rev.first());
    }
}
