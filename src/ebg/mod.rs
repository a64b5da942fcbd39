//! Edge-expanded graph construction
//!
//! Every traversable directed segment becomes one node; every admissible turn
//! becomes one edge whose weight is the out-segment's traversal cost plus the
//! turn penalty. Via-way restrictions are enforced exactly by shadowing the
//! via segments with duplicate nodes whose outgoing turns are filtered.

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::coord::Coordinate;
use crate::intersection::IntersectionAnalysis;
use crate::nbg::{DirectedSegment, NodeBasedGraph};
use crate::osm::RestrictionKind;
use crate::restrictions::RestrictionIndex;
use crate::spatial::LeafRecord;
use crate::{EegNodeId, GeometryId, NodeId, SegmentId, Weight, INVALID_EEG_NODE};

/// One node of the edge-expanded graph: a directed segment traversal.
#[derive(Debug, Clone)]
pub struct EegNode {
    pub segment: SegmentId,
    pub forward: bool,
    pub weight: Weight,
    pub duration: Weight,
    /// Set on shadow nodes created for via-way restrictions.
    pub duplicate_of: Option<EegNodeId>,
}

/// One admissible turn.
#[derive(Debug, Clone, Copy)]
pub struct EegEdge {
    pub source: EegNodeId,
    pub target: EegNodeId,
    pub weight: Weight,
    pub duration: Weight,
    /// The intersection node the turn crosses.
    pub via: NodeId,
}

/// Packed polylines with cumulative per-leg costs, one entry per segment.
#[derive(Debug, Default)]
pub struct GeometryTable {
    offsets: Vec<u32>, // len = entries + 1
    coords: Vec<Coordinate>,
    cum_weights: Vec<Weight>,
    cum_durations: Vec<Weight>,
}

impl GeometryTable {
    pub fn from_graph(graph: &NodeBasedGraph) -> Self {
        let mut table = GeometryTable {
            offsets: Vec::with_capacity(graph.segments.len() + 1),
            ..Default::default()
        };
        table.offsets.push(0);
        for seg in &graph.segments {
            table.coords.extend_from_slice(&seg.geometry);
            table.cum_weights.extend_from_slice(&seg.cum_weights);
            table.cum_durations.extend_from_slice(&seg.cum_durations);
            table.offsets.push(table.coords.len() as u32);
        }
        table
    }

    pub fn from_parts(
        offsets: Vec<u32>,
        coords: Vec<Coordinate>,
        cum_weights: Vec<Weight>,
        cum_durations: Vec<Weight>,
    ) -> Self {
        Self {
            offsets,
            coords,
            cum_weights,
            cum_durations,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn polyline(&self, id: GeometryId) -> &[Coordinate] {
        let (a, b) = self.range(id);
        &self.coords[a..b]
    }

    /// Cumulative weights along the stored orientation, one per leg.
    pub fn cumulative_weights(&self, id: GeometryId) -> &[Weight] {
        let (a, b) = self.range(id);
        &self.cum_weights[a - id as usize..b - id as usize - 1]
    }

    pub fn cumulative_durations(&self, id: GeometryId) -> &[Weight] {
        let (a, b) = self.range(id);
        &self.cum_durations[a - id as usize..b - id as usize - 1]
    }

    pub fn parts(&self) -> (&[u32], &[Coordinate], &[Weight], &[Weight]) {
        (
            &self.offsets,
            &self.coords,
            &self.cum_weights,
            &self.cum_durations,
        )
    }

    fn range(&self, id: GeometryId) -> (usize, usize) {
        (
            self.offsets[id as usize] as usize,
            self.offsets[id as usize + 1] as usize,
        )
    }
}

/// Query-time view of the edge-expanded node table, assembled from
/// `.ebg_nodes` and `.enw`.
#[derive(Debug, Default)]
pub struct EegNodeStore {
    pub segments: Vec<GeometryId>,
    pub forward: Vec<bool>,
    pub weights: Vec<Weight>,
    pub durations: Vec<Weight>,
}

impl EegNodeStore {
    pub fn from_build(build: &EegBuild) -> Self {
        Self {
            segments: build.nodes.iter().map(|n| n.segment).collect(),
            forward: build.nodes.iter().map(|n| n.forward).collect(),
            weights: build.nodes.iter().map(|n| n.weight).collect(),
            durations: build.nodes.iter().map(|n| n.duration).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, id: EegNodeId) -> GeometryId {
        self.segments[id as usize]
    }

    pub fn is_forward(&self, id: EegNodeId) -> bool {
        self.forward[id as usize]
    }

    pub fn weight(&self, id: EegNodeId) -> Weight {
        self.weights[id as usize]
    }

    pub fn duration(&self, id: EegNodeId) -> Weight {
        self.durations[id as usize]
    }
}

/// Result of edge expansion.
pub struct EegBuild {
    pub nodes: Vec<EegNode>,
    /// Sorted by (source, target).
    pub edges: Vec<EegEdge>,
    pub geometry: GeometryTable,
    pub leaves: Vec<LeafRecord>,
    /// Per node: belongs to a strongly-connected component smaller than the
    /// configured threshold.
    pub tiny_component: Vec<bool>,
}

impl EegBuild {
    /// Edge-expanded node of a directed segment, if traversable.
    pub fn node_id(&self, ds: DirectedSegment) -> Option<EegNodeId> {
        // Original nodes come in segment order, at most two per segment
        self.nodes
            .iter()
            .take_while(|n| n.duplicate_of.is_none())
            .position(|n| n.segment == ds.segment && n.forward == ds.forward)
            .map(|i| i as EegNodeId)
    }
}

/// Build the edge-expanded graph.
///
/// Node ids are assigned in one deterministic pass over segments before any
/// parallel work: forward direction first, then reverse. Intersections are
/// analysed independently per node, then assembled in node order.
pub fn build_eeg(
    graph: &NodeBasedGraph,
    restrictions: &RestrictionIndex,
    analysis: &IntersectionAnalysis<'_>,
    small_component_size: u32,
) -> EegBuild {
    // 1. Nodes
    let mut node_of: FxHashMap<DirectedSegment, EegNodeId> = FxHashMap::default();
    let mut nodes: Vec<EegNode> = Vec::new();
    for (sid, _) in graph.segments.iter().enumerate() {
        for forward in [true, false] {
            let ds = DirectedSegment::new(sid as SegmentId, forward);
            if let Some(cost) = graph.dir_cost(ds) {
                node_of.insert(ds, nodes.len() as EegNodeId);
                nodes.push(EegNode {
                    segment: sid as SegmentId,
                    forward,
                    weight: cost.weight,
                    duration: cost.duration,
                    duplicate_of: None,
                });
            }
        }
    }

    // 2. Turn edges. Intersections are analysed in parallel (each node is
    // written by exactly one worker); assembly stays in node order so edge
    // ids do not depend on scheduling.
    use rayon::prelude::*;
    let turns_by_node: Vec<Vec<crate::intersection::Turn>> = (0..graph.node_count() as NodeId)
        .into_par_iter()
        .map(|via| analysis.analyze(via))
        .collect();

    let mut edges: Vec<EegEdge> = Vec::new();
    for turns in &turns_by_node {
        for turn in turns {
            if !turn.valid {
                continue;
            }
            let (Some(&src), Some(&dst)) = (node_of.get(&turn.from), node_of.get(&turn.to))
            else {
                continue;
            };
            let out = &nodes[dst as usize];
            edges.push(EegEdge {
                source: src,
                target: dst,
                weight: out.weight.saturating_add(turn.cost.weight),
                duration: out.duration.saturating_add(turn.cost.duration),
                via: turn.via,
            });
        }
    }

    // 3. Via-way restriction shadows
    let shadowed = instantiate_via_way(graph, restrictions, &node_of, &mut nodes, &mut edges);
    if shadowed > 0 {
        debug!(shadowed, "via-way restriction shadow nodes instantiated");
    }

    edges.sort_by_key(|e| (e.source, e.target));

    // 4. Component analysis
    let tiny_component = mark_tiny_components(&nodes, &edges, small_component_size);

    // 5. Spatial leaves, one per segment
    let mut leaves = Vec::with_capacity(graph.segments.len());
    for (sid, seg) in graph.segments.iter().enumerate() {
        let fwd = node_of
            .get(&DirectedSegment::new(sid as SegmentId, true))
            .copied()
            .unwrap_or(INVALID_EEG_NODE);
        let rev = node_of
            .get(&DirectedSegment::new(sid as SegmentId, false))
            .copied()
            .unwrap_or(INVALID_EEG_NODE);

        let mut bbox = [i32::MAX, i32::MAX, i32::MIN, i32::MIN];
        for c in &seg.geometry {
            bbox[0] = bbox[0].min(c.lon);
            bbox[1] = bbox[1].min(c.lat);
            bbox[2] = bbox[2].max(c.lon);
            bbox[3] = bbox[3].max(c.lat);
        }

        let node_tiny = |id: EegNodeId| id == INVALID_EEG_NODE || tiny_component[id as usize];
        leaves.push(LeafRecord {
            bbox,
            segment: sid as SegmentId,
            forward_node: fwd,
            reverse_node: rev,
            tiny: node_tiny(fwd) && node_tiny(rev),
        });
    }

    info!(
        nodes = nodes.len(),
        edges = edges.len(),
        segments = graph.segments.len(),
        "edge-expanded graph built"
    );

    EegBuild {
        nodes,
        edges,
        geometry: GeometryTable::from_graph(graph),
        leaves,
        tiny_component,
    }
}

/// Instantiate shadow nodes enforcing via-way restrictions.
///
/// Entering the restriction path diverts onto a shadow of the via segment;
/// leaving the path anywhere rejoins the original nodes; completing it has the
/// final turn filtered. Returns the number of shadow nodes created.
fn instantiate_via_way(
    graph: &NodeBasedGraph,
    restrictions: &RestrictionIndex,
    node_of: &FxHashMap<DirectedSegment, EegNodeId>,
    nodes: &mut Vec<EegNode>,
    edges: &mut Vec<EegEdge>,
) -> usize {
    let trie = &restrictions.via_way;
    if trie.is_empty() {
        return 0;
    }

    // Outgoing edge index over the pre-shadow graph
    let mut out_edges: FxHashMap<EegNodeId, Vec<usize>> = FxHashMap::default();
    for (i, e) in edges.iter().enumerate() {
        out_edges.entry(e.source).or_default().push(i);
    }

    let ds_of_original: Vec<DirectedSegment> = nodes
        .iter()
        .map(|n| DirectedSegment::new(n.segment, n.forward))
        .collect();

    let mut roots: Vec<(DirectedSegment, DirectedSegment, u32)> = trie
        .roots()
        .map(|(&(from, via), &state)| (from, via, state))
        .collect();
    roots.sort_by_key(|&(from, via, _)| (from.segment, from.forward, via.segment, via.forward));

    let mut shadow_of_state: FxHashMap<u32, EegNodeId> = FxHashMap::default();
    let mut created = 0usize;

    for (from, first_via, state) in roots {
        let (Some(&from_id), Some(&via_id)) = (node_of.get(&from), node_of.get(&first_via))
        else {
            continue;
        };
        // The entry turn may already be forbidden outright
        let Some(entry_idx) = out_edges
            .get(&from_id)
            .and_then(|es| es.iter().copied().find(|&i| edges[i].target == via_id))
        else {
            continue;
        };

        let shadow = instantiate_state(
            graph,
            trie,
            state,
            node_of,
            &ds_of_original,
            &out_edges,
            nodes,
            edges,
            &mut shadow_of_state,
            &mut created,
        );
        edges[entry_idx].target = shadow;
    }

    created
}

#[allow(clippy::too_many_arguments)]
fn instantiate_state(
    graph: &NodeBasedGraph,
    trie: &crate::restrictions::ViaWayTrie,
    state: u32,
    node_of: &FxHashMap<DirectedSegment, EegNodeId>,
    ds_of_original: &[DirectedSegment],
    out_edges: &FxHashMap<EegNodeId, Vec<usize>>,
    nodes: &mut Vec<EegNode>,
    edges: &mut Vec<EegEdge>,
    shadow_of_state: &mut FxHashMap<u32, EegNodeId>,
    created: &mut usize,
) -> EegNodeId {
    if let Some(&id) = shadow_of_state.get(&state) {
        return id;
    }

    let trie_node = trie.node(state);
    let original = node_of[&trie_node.via_edge];
    let shadow = nodes.len() as EegNodeId;
    let mut cloned = nodes[original as usize].clone();
    cloned.duplicate_of = Some(original);
    nodes.push(cloned);
    shadow_of_state.insert(state, shadow);
    *created += 1;

    let original_out: Vec<usize> = out_edges.get(&original).cloned().unwrap_or_default();
    for edge_idx in original_out {
        let template = edges[edge_idx];
        let to_ds = ds_of_original[template.target as usize];
        let to_node = graph.get_target(to_ds);

        // Terminal restrictions filter the final turn of the via path
        let blocked = trie_node.leaves.iter().any(|leaf| match leaf.kind {
            RestrictionKind::No => to_node == leaf.to_node,
            RestrictionKind::Only => to_node != leaf.to_node,
        });
        if blocked {
            continue;
        }

        // Deeper via edges continue into the next shadow
        let target = match trie.step(state, to_ds) {
            Some(child) => instantiate_state(
                graph,
                trie,
                child,
                node_of,
                ds_of_original,
                out_edges,
                nodes,
                edges,
                shadow_of_state,
                created,
            ),
            None => template.target,
        };

        edges.push(EegEdge {
            source: shadow,
            target,
            weight: template.weight,
            duration: template.duration,
            via: template.via,
        });
    }

    shadow
}

/// Tarjan's strongly-connected components, iterative, over the turn graph.
/// Marks nodes in components smaller than `threshold`.
fn mark_tiny_components(nodes: &[EegNode], edges: &[EegEdge], threshold: u32) -> Vec<bool> {
    let n = nodes.len();
    let mut first: Vec<u32> = vec![0; n + 1];
    for e in edges {
        first[e.source as usize + 1] += 1;
    }
    for i in 0..n {
        first[i + 1] += first[i];
    }
    let mut targets = vec![0u32; edges.len()];
    let mut cursor = first.clone();
    for e in edges {
        targets[cursor[e.source as usize] as usize] = e.target;
        cursor[e.source as usize] += 1;
    }

    const UNVISITED: u32 = u32::MAX;
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0u32; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<u32> = Vec::new();
    let mut next_index = 0u32;
    let mut tiny = vec![false; n];

    // (node, next child offset)
    let mut call_stack: Vec<(u32, u32)> = Vec::new();

    for root in 0..n as u32 {
        if index[root as usize] != UNVISITED {
            continue;
        }
        call_stack.push((root, first[root as usize]));
        index[root as usize] = next_index;
        lowlink[root as usize] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root as usize] = true;

        while let Some(frame) = call_stack.last_mut() {
            let v = frame.0;
            let next_child = if frame.1 < first[v as usize + 1] {
                let w = targets[frame.1 as usize];
                frame.1 += 1;
                Some(w)
            } else {
                None
            };

            match next_child {
                Some(w) if index[w as usize] == UNVISITED => {
                    index[w as usize] = next_index;
                    lowlink[w as usize] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w as usize] = true;
                    call_stack.push((w, first[w as usize]));
                }
                Some(w) => {
                    if on_stack[w as usize] {
                        lowlink[v as usize] = lowlink[v as usize].min(index[w as usize]);
                    }
                }
                None => {
                    call_stack.pop();
                    if let Some(parent) = call_stack.last() {
                        let p = parent.0 as usize;
                        lowlink[p] = lowlink[p].min(lowlink[v as usize]);
                    }
                    if lowlink[v as usize] == index[v as usize] {
                        // Root of a component: pop it and size-check
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().expect("tarjan stack invariant");
                            on_stack[w as usize] = false;
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        if (component.len() as u32) < threshold {
                            for w in component {
                                tiny[w as usize] = true;
                            }
                        }
                    }
                }
            }
        }
    }

    tiny
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coordinate;
    use crate::nbg::{assign_node_ids, build_graph};
    use crate::osm::{ExtractionInput, RawNode, RawRestriction, RawWay, RestrictionVia};
    use crate::profile::{CarProfile, RoadClass, TravelMode, WayProfile};

    fn wp() -> WayProfile {
        WayProfile {
            class: RoadClass::Residential,
            mode: TravelMode::Driving,
            speed_forward_kmh: 36.0,
            speed_backward_kmh: 36.0,
            roundabout: false,
            access_restricted: false,
            name: None,
        }
    }

    fn build_all(input: &ExtractionInput) -> (crate::nbg::NbgBuild, RestrictionIndex, EegBuild) {
        let node_map = assign_node_ids(input);
        let resolved = crate::restrictions::resolve(input, &node_map);
        let build = build_graph(input, node_map, &resolved.referenced_nodes);
        let index = RestrictionIndex::build(&build.graph, &resolved.restrictions, Default::default());
        let profile = CarProfile::new();
        let analysis = IntersectionAnalysis::new(&build.graph, &index, &profile);
        let eeg = build_eeg(&build.graph, &index, &analysis, 0);
        (build, index, eeg)
    }

    /// Two bidirectional segments in a row: a - b - c with distinct classes
    fn two_segment_input() -> ExtractionInput {
        let mut input = ExtractionInput::new();
        input.nodes.push(RawNode::plain(1, Coordinate::from_degrees(0.0, 0.0)));
        input.nodes.push(RawNode::plain(2, Coordinate::from_degrees(0.001, 0.0)));
        input.nodes.push(RawNode::plain(3, Coordinate::from_degrees(0.002, 0.0)));
        input.ways.push(RawWay { id: 1, nodes: vec![1, 2], way: wp() });
        input.ways.push(RawWay {
            id: 2,
            nodes: vec![2, 3],
            way: WayProfile {
                class: RoadClass::Primary,
                speed_forward_kmh: 36.0,
                speed_backward_kmh: 36.0,
                ..wp()
            },
        });
        input
    }

    #[test]
    fn nodes_per_traversable_direction() {
        let (_, _, eeg) = build_all(&two_segment_input());
        // 2 segments x 2 directions
        assert_eq!(eeg.nodes.len(), 4);
        // continuations both ways plus dead-end U-turns at both ends
        assert_eq!(eeg.edges.len(), 4);
    }

    #[test]
    fn edge_weight_is_target_segment_plus_turn() {
        let (build, _, eeg) = build_all(&two_segment_input());
        for e in &eeg.edges {
            let target = &eeg.nodes[e.target as usize];
            let seg_cost = build
                .graph
                .dir_cost(DirectedSegment::new(target.segment, target.forward))
                .unwrap();
            assert!(e.weight >= seg_cost.weight);
            assert_eq!(e.weight - seg_cost.weight, e.duration - seg_cost.duration);
        }
    }

    #[test]
    fn terminal_without_outgoing_turns_is_kept() {
        let mut input = ExtractionInput::new();
        input.nodes.push(RawNode::plain(1, Coordinate::from_degrees(0.0, 0.0)));
        input.nodes.push(RawNode::plain(2, Coordinate::from_degrees(0.001, 0.0)));
        input.ways.push(RawWay {
            id: 1,
            nodes: vec![1, 2],
            way: WayProfile {
                speed_backward_kmh: 0.0,
                ..wp()
            },
        });
        let (_, _, eeg) = build_all(&input);
        // One-way into a dead end: a single node, no edges
        assert_eq!(eeg.nodes.len(), 1);
        assert!(eeg.edges.is_empty());
    }

    #[test]
    fn via_way_restriction_shadows_the_via_segment() {
        // Square detour net:
        //   1 -- 2 -- 3  with 2--5 and 3--6 stubs; restriction
        //   no (1->2) via [2->3] to 6 must still allow 5->2->3->6
        let mut input = ExtractionInput::new();
        input.nodes.push(RawNode::plain(1, Coordinate::from_degrees(0.0, 0.0)));
        input.nodes.push(RawNode::plain(2, Coordinate::from_degrees(0.001, 0.0)));
        input.nodes.push(RawNode::plain(3, Coordinate::from_degrees(0.002, 0.0)));
        input.nodes.push(RawNode::plain(5, Coordinate::from_degrees(0.001, -0.001)));
        input.nodes.push(RawNode::plain(6, Coordinate::from_degrees(0.002, 0.001)));
        input.ways.push(RawWay { id: 1, nodes: vec![1, 2], way: wp() });
        input.ways.push(RawWay { id: 2, nodes: vec![2, 3], way: wp() });
        input.ways.push(RawWay { id: 3, nodes: vec![5, 2], way: wp() });
        input.ways.push(RawWay { id: 4, nodes: vec![3, 6], way: wp() });
        input.restrictions.push(RawRestriction {
            kind: crate::osm::RestrictionKind::No,
            from_way: 1,
            via: RestrictionVia::Ways(vec![2]),
            to_way: 4,
        });

        let (build, _, eeg) = build_all(&input);
        let shadows: Vec<_> = eeg
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.duplicate_of.is_some())
            .collect();
        assert_eq!(shadows.len(), 1);
        let (shadow_id, shadow) = shadows[0];
        let original = shadow.duplicate_of.unwrap();

        let node6 = build.node_map.get(6).unwrap();
        let targets_node = |eid: EegNodeId| {
            let n = &eeg.nodes[eid as usize];
            build
                .graph
                .get_target(DirectedSegment::new(n.segment, n.forward))
                == node6
        };

        // The shadow must not reach node 6, the original must
        let shadow_reaches = eeg
            .edges
            .iter()
            .any(|e| e.source == shadow_id as EegNodeId && targets_node(e.target));
        let original_reaches = eeg
            .edges
            .iter()
            .any(|e| e.source == original && targets_node(e.target));
        assert!(!shadow_reaches, "restricted continuation must be filtered");
        assert!(original_reaches, "other approaches keep the turn");

        // Exactly one entry edge was diverted onto the shadow
        let into_shadow: Vec<_> = eeg
            .edges
            .iter()
            .filter(|e| e.target == shadow_id as EegNodeId)
            .collect();
        assert_eq!(into_shadow.len(), 1);
        let entry_source = &eeg.nodes[into_shadow[0].source as usize];
        let src_ds = DirectedSegment::new(entry_source.segment, entry_source.forward);
        assert_eq!(build.graph.source(src_ds), build.node_map.get(1).unwrap());
    }

    #[test]
    fn tiny_components_are_flagged() {
        // Two disconnected islands: a 2-node one-way loop cannot exist here,
        // so use two bidirectional segments far apart, one per island.
        let mut input = ExtractionInput::new();
        input.nodes.push(RawNode::plain(1, Coordinate::from_degrees(0.0, 0.0)));
        input.nodes.push(RawNode::plain(2, Coordinate::from_degrees(0.001, 0.0)));
        input.nodes.push(RawNode::plain(3, Coordinate::from_degrees(1.0, 1.0)));
        input.nodes.push(RawNode::plain(4, Coordinate::from_degrees(1.001, 1.0)));
        input.nodes.push(RawNode::plain(5, Coordinate::from_degrees(1.002, 1.0)));
        input.ways.push(RawWay { id: 1, nodes: vec![1, 2], way: wp() });
        input.ways.push(RawWay {
            id: 2,
            nodes: vec![3, 4],
            way: WayProfile { class: RoadClass::Primary, ..wp() },
        });
        input.ways.push(RawWay { id: 3, nodes: vec![4, 5], way: wp() });

        let node_map = assign_node_ids(&input);
        let build = build_graph(&input, node_map, &Default::default());
        let index = RestrictionIndex::build(&build.graph, &[], Default::default());
        let profile = CarProfile::new();
        let analysis = IntersectionAnalysis::new(&build.graph, &index, &profile);
        // threshold 3: the 2-node island is tiny, the 4-node one is not
        let eeg = build_eeg(&build.graph, &index, &analysis, 3);

        let tiny_count = eeg.tiny_component.iter().filter(|&&t| t).count();
        assert_eq!(tiny_count, 2);
        let tiny_leaves = eeg.leaves.iter().filter(|l| l.tiny).count();
        assert_eq!(tiny_leaves, 1);
    }
}
