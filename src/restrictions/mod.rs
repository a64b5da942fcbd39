//! Restriction and barrier index
//!
//! Way-level turn restrictions are resolved to node-level triples before graph
//! construction (the member nodes are then exempt from chain folding), and
//! indexed against directed segments afterwards. Via-way restrictions become a
//! prefix trie so the edge-expansion stage can thread a restriction state
//! through consecutive turns in O(1) per step.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::nbg::{DirectedSegment, NodeBasedGraph};
use crate::osm::{ExtractionInput, RawRestriction, RestrictionKind, RestrictionVia};
use crate::NodeId;

/// A restriction after way-to-node resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRestriction {
    pub kind: RestrictionKind,
    /// Node the movement approaches the first via node from.
    pub from_node: NodeId,
    /// One entry for a via-node restriction, two or more for via-way paths.
    pub via: Vec<NodeId>,
    pub to_node: NodeId,
}

/// Outcome of resolving the raw restriction set.
#[derive(Debug, Default)]
pub struct ResolvedRestrictions {
    pub restrictions: Vec<ResolvedRestriction>,
    /// Every node a restriction touches; these must survive compression.
    pub referenced_nodes: FxHashSet<NodeId>,
    pub dropped: usize,
}

/// Resolve way-level restrictions to node-level ones.
///
/// Ill-formed restrictions (dangling way ids, via nodes not shared between
/// members, cyclic via paths) are dropped with a diagnostic; extraction
/// continues.
pub fn resolve(
    input: &ExtractionInput,
    node_of: &crate::nbg::NodeIdMap,
) -> ResolvedRestrictions {
    let way_nodes: FxHashMap<i64, &[i64]> = input
        .ways
        .iter()
        .map(|w| (w.id, w.nodes.as_slice()))
        .collect();

    let mut out = ResolvedRestrictions::default();

    'next: for raw in &input.restrictions {
        let Some(resolved) = resolve_one(raw, &way_nodes, node_of) else {
            out.dropped += 1;
            continue;
        };

        // cyclic via path
        let mut seen = FxHashSet::default();
        for &v in &resolved.via {
            if !seen.insert(v) {
                out.dropped += 1;
                continue 'next;
            }
        }

        out.referenced_nodes.insert(resolved.from_node);
        out.referenced_nodes.extend(resolved.via.iter().copied());
        out.referenced_nodes.insert(resolved.to_node);
        out.restrictions.push(resolved);
    }

    if out.dropped > 0 {
        warn!(dropped = out.dropped, "ill-formed turn restrictions dropped");
    }
    out
}

fn resolve_one(
    raw: &RawRestriction,
    way_nodes: &FxHashMap<i64, &[i64]>,
    node_of: &crate::nbg::NodeIdMap,
) -> Option<ResolvedRestriction> {
    let from = way_nodes.get(&raw.from_way)?;
    let to = way_nodes.get(&raw.to_way)?;

    let (via_osm, from_osm, to_osm) = match &raw.via {
        RestrictionVia::Node(via) => {
            let from_neighbor = endpoint_neighbor(from, *via)?;
            let to_neighbor = endpoint_neighbor(to, *via)?;
            (vec![*via], from_neighbor, to_neighbor)
        }
        RestrictionVia::Ways(via_ways) => {
            if via_ways.is_empty() {
                return None;
            }
            let mut junctions = Vec::with_capacity(via_ways.len() + 1);
            let mut prev: &[i64] = from;
            for way_id in via_ways {
                let via = way_nodes.get(way_id)?;
                junctions.push(shared_endpoint(prev, via)?);
                prev = via;
            }
            junctions.push(shared_endpoint(prev, to)?);

            let from_neighbor = endpoint_neighbor(from, junctions[0])?;
            let to_neighbor = endpoint_neighbor(to, *junctions.last().unwrap())?;
            (junctions, from_neighbor, to_neighbor)
        }
    };

    Some(ResolvedRestriction {
        kind: raw.kind,
        from_node: node_of.get(from_osm)?,
        via: via_osm
            .iter()
            .map(|&v| node_of.get(v))
            .collect::<Option<Vec<_>>>()?,
        to_node: node_of.get(to_osm)?,
    })
}

/// The node adjacent to `via` when `via` is an endpoint of the way.
fn endpoint_neighbor(way: &[i64], via: i64) -> Option<i64> {
    if way.len() < 2 {
        return None;
    }
    if *way.first().unwrap() == via {
        Some(way[1])
    } else if *way.last().unwrap() == via {
        Some(way[way.len() - 2])
    } else {
        // via in the way interior is ambiguous
        None
    }
}

/// Endpoint shared between two ways.
fn shared_endpoint(a: &[i64], b: &[i64]) -> Option<i64> {
    let b_first = *b.first()?;
    let b_last = *b.last()?;
    if *a.first()? == b_first || *a.last()? == b_first {
        Some(b_first)
    } else if *a.first()? == b_last || *a.last()? == b_last {
        Some(b_last)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Via-way trie
// ---------------------------------------------------------------------------

/// Restriction completing at the end of a via path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieLeaf {
    pub kind: RestrictionKind,
    pub to_node: NodeId,
}

#[derive(Debug, Clone)]
pub struct TrieNode {
    /// The via edge this state sits on.
    pub via_edge: DirectedSegment,
    pub children: Vec<u32>,
    /// Restrictions whose via path ends here.
    pub leaves: Vec<TrieLeaf>,
}

/// Prefix trie over via-edge paths.
#[derive(Debug, Default)]
pub struct ViaWayTrie {
    /// (from edge, first via edge) -> trie state
    roots: FxHashMap<(DirectedSegment, DirectedSegment), u32>,
    nodes: Vec<TrieNode>,
}

impl ViaWayTrie {
    pub fn from_parts(
        roots: FxHashMap<(DirectedSegment, DirectedSegment), u32>,
        nodes: Vec<TrieNode>,
    ) -> Self {
        Self { roots, nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node(&self, id: u32) -> &TrieNode {
        &self.nodes[id as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> impl Iterator<Item = (&(DirectedSegment, DirectedSegment), &u32)> {
        self.roots.iter()
    }

    /// Root state entered by turning from `from` onto `first_via`.
    pub fn enter(&self, from: DirectedSegment, first_via: DirectedSegment) -> Option<u32> {
        self.roots.get(&(from, first_via)).copied()
    }

    /// Extend the active state along `next`; O(children).
    pub fn step(&self, state: u32, next: DirectedSegment) -> Option<u32> {
        self.nodes[state as usize]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c as usize].via_edge == next)
    }

    fn insert_path(
        &mut self,
        from: DirectedSegment,
        via_edges: &[DirectedSegment],
        leaf: TrieLeaf,
    ) {
        let root_key = (from, via_edges[0]);
        let mut state = match self.roots.get(&root_key) {
            Some(&s) => s,
            None => {
                let id = self.push_node(via_edges[0]);
                self.roots.insert(root_key, id);
                id
            }
        };
        for &edge in &via_edges[1..] {
            state = match self.step(state, edge) {
                Some(next) => next,
                None => {
                    let id = self.push_node(edge);
                    self.nodes[state as usize].children.push(id);
                    id
                }
            };
        }
        self.nodes[state as usize].leaves.push(leaf);
    }

    fn push_node(&mut self, via_edge: DirectedSegment) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(TrieNode {
            via_edge,
            children: Vec::new(),
            leaves: Vec::new(),
        });
        id
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Fast lookups for turn admissibility.
#[derive(Debug, Default)]
pub struct RestrictionIndex {
    /// (arriving edge, via node) -> forbidden target nodes
    no_turns: FxHashMap<(DirectedSegment, NodeId), FxHashSet<NodeId>>,
    /// (arriving edge, via node) -> the only admissible target node
    only_turns: FxHashMap<(DirectedSegment, NodeId), NodeId>,
    pub via_way: ViaWayTrie,
    /// Barrier nodes -> whether the profile lets traffic through.
    barriers: FxHashMap<NodeId, bool>,
    pub dropped: usize,
}

impl RestrictionIndex {
    /// Index resolved restrictions against the compressed graph.
    pub fn build(
        graph: &NodeBasedGraph,
        resolved: &[ResolvedRestriction],
        barriers: FxHashMap<NodeId, bool>,
    ) -> Self {
        let mut index = RestrictionIndex {
            barriers,
            ..Default::default()
        };

        for r in resolved {
            let Some(from_edge) = connecting_edge(graph, r.from_node, r.via[0]) else {
                index.dropped += 1;
                continue;
            };

            if r.via.len() == 1 {
                let key = (from_edge, r.via[0]);
                match r.kind {
                    RestrictionKind::No => {
                        index.no_turns.entry(key).or_default().insert(r.to_node);
                    }
                    RestrictionKind::Only => {
                        index.only_turns.insert(key, r.to_node);
                    }
                }
            } else {
                let via_edges: Option<Vec<DirectedSegment>> = r
                    .via
                    .windows(2)
                    .map(|w| connecting_edge(graph, w[0], w[1]))
                    .collect();
                let Some(via_edges) = via_edges else {
                    index.dropped += 1;
                    continue;
                };
                index.via_way.insert_path(
                    from_edge,
                    &via_edges,
                    TrieLeaf {
                        kind: r.kind,
                        to_node: r.to_node,
                    },
                );
            }
        }

        if index.dropped > 0 {
            warn!(
                dropped = index.dropped,
                "restrictions referenced unroutable segments and were dropped"
            );
        }
        index
    }

    /// Rebuild from deserialized parts.
    pub fn from_parts(
        no_turns: FxHashMap<(DirectedSegment, NodeId), FxHashSet<NodeId>>,
        only_turns: FxHashMap<(DirectedSegment, NodeId), NodeId>,
        via_way: ViaWayTrie,
        barriers: FxHashMap<NodeId, bool>,
    ) -> Self {
        Self {
            no_turns,
            only_turns,
            via_way,
            barriers,
            dropped: 0,
        }
    }

    /// Is the turn from `from` through `via` toward `to_node` forbidden by a
    /// via-node restriction?
    pub fn forbids_turn(&self, from: DirectedSegment, via: NodeId, to_node: NodeId) -> bool {
        if let Some(set) = self.no_turns.get(&(from, via)) {
            if set.contains(&to_node) {
                return true;
            }
        }
        if let Some(&required) = self.only_turns.get(&(from, via)) {
            if required != to_node {
                return true;
            }
        }
        false
    }

    /// Barrier predicate: can traffic pass through this node?
    pub fn can_traverse_through(&self, node: NodeId) -> bool {
        self.barriers.get(&node).copied().unwrap_or(true)
    }

    pub fn is_barrier(&self, node: NodeId) -> bool {
        self.barriers.contains_key(&node)
    }

    pub fn node_restriction_parts(
        &self,
    ) -> (
        &FxHashMap<(DirectedSegment, NodeId), FxHashSet<NodeId>>,
        &FxHashMap<(DirectedSegment, NodeId), NodeId>,
        &FxHashMap<NodeId, bool>,
    ) {
        (&self.no_turns, &self.only_turns, &self.barriers)
    }
}

/// The traversable directed segment running `from` -> `to` directly.
fn connecting_edge(
    graph: &NodeBasedGraph,
    from: NodeId,
    to: NodeId,
) -> Option<DirectedSegment> {
    graph
        .adjacent_edges(from)
        .find(|&ds| graph.get_target(ds) == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coordinate;
    use crate::nbg::{assign_node_ids, build_graph};
    use crate::osm::{RawNode, RawWay};
    use crate::profile::{RoadClass, TravelMode, WayProfile};

    fn way_profile() -> WayProfile {
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

    /// A cross: ways 1 (west-center), 2 (center-east), 3 (center-north)
    fn cross_input() -> ExtractionInput {
        let mut input = ExtractionInput::new();
        input.nodes.push(RawNode::plain(1, Coordinate::from_degrees(-0.001, 0.0)));
        input.nodes.push(RawNode::plain(2, Coordinate::from_degrees(0.0, 0.0)));
        input.nodes.push(RawNode::plain(3, Coordinate::from_degrees(0.001, 0.0)));
        input.nodes.push(RawNode::plain(4, Coordinate::from_degrees(0.0, 0.001)));
        for (id, nodes) in [(1i64, vec![1i64, 2]), (2, vec![2, 3]), (3, vec![2, 4])] {
            input.ways.push(RawWay {
                id,
                nodes,
                way: way_profile(),
            });
        }
        input
    }

    #[test]
    fn via_node_restriction_resolves() {
        let mut input = cross_input();
        input.restrictions.push(RawRestriction {
            kind: RestrictionKind::No,
            from_way: 1,
            via: RestrictionVia::Node(2),
            to_way: 3,
        });

        let node_map = assign_node_ids(&input);
        let resolved = resolve(&input, &node_map);
        assert_eq!(resolved.dropped, 0);
        assert_eq!(resolved.restrictions.len(), 1);
        let r = &resolved.restrictions[0];
        assert_eq!(r.via, vec![node_map.get(2).unwrap()]);
        assert_eq!(r.from_node, node_map.get(1).unwrap());
        assert_eq!(r.to_node, node_map.get(4).unwrap());

        let build = build_graph(&input, node_map, &resolved.referenced_nodes);
        let index = RestrictionIndex::build(&build.graph, &resolved.restrictions, Default::default());

        let via = build.node_map.get(2).unwrap();
        let from_edge = connecting_edge(&build.graph, build.node_map.get(1).unwrap(), via).unwrap();
        assert!(index.forbids_turn(from_edge, via, build.node_map.get(4).unwrap()));
        assert!(!index.forbids_turn(from_edge, via, build.node_map.get(3).unwrap()));
    }

    #[test]
    fn only_restriction_forbids_everything_else() {
        let mut input = cross_input();
        input.restrictions.push(RawRestriction {
            kind: RestrictionKind::Only,
            from_way: 1,
            via: RestrictionVia::Node(2),
            to_way: 2,
        });

        let node_map = assign_node_ids(&input);
        let resolved = resolve(&input, &node_map);
        let build = build_graph(&input, node_map, &resolved.referenced_nodes);
        let index = RestrictionIndex::build(&build.graph, &resolved.restrictions, Default::default());

        let via = build.node_map.get(2).unwrap();
        let from_edge = connecting_edge(&build.graph, build.node_map.get(1).unwrap(), via).unwrap();
        assert!(index.forbids_turn(from_edge, via, build.node_map.get(4).unwrap()));
        assert!(!index.forbids_turn(from_edge, via, build.node_map.get(3).unwrap()));
    }

    #[test]
    fn dangling_way_is_dropped() {
        let mut input = cross_input();
        input.restrictions.push(RawRestriction {
            kind: RestrictionKind::No,
            from_way: 99, // does not exist
            via: RestrictionVia::Node(2),
            to_way: 2,
        });
        let node_map = assign_node_ids(&input);
        let resolved = resolve(&input, &node_map);
        assert_eq!(resolved.dropped, 1);
        assert!(resolved.restrictions.is_empty());
    }

    #[test]
    fn interior_via_is_ambiguous() {
        let mut input = ExtractionInput::new();
        for (id, lon) in [(1i64, 0.0), (2, 0.001), (3, 0.002)] {
            input.nodes.push(RawNode::plain(id, Coordinate::from_degrees(lon, 0.0)));
        }
        input.ways.push(RawWay {
            id: 1,
            nodes: vec![1, 2, 3],
            way: way_profile(),
        });
        input.ways.push(RawWay {
            id: 2,
            nodes: vec![2, 1],
            way: way_profile(),
        });
        input.restrictions.push(RawRestriction {
            kind: RestrictionKind::No,
            from_way: 1,
            via: RestrictionVia::Node(2),
            to_way: 1,
        });
        // via=2 is interior to way 1 when approached from way 1
        let node_map = assign_node_ids(&input);
        let resolved = resolve(&input, &node_map);
        assert_eq!(resolved.dropped, 1);
    }

    #[test]
    fn trie_paths_share_prefixes() {
        let mut trie = ViaWayTrie::default();
        let from = DirectedSegment::new(0, true);
        let e1 = DirectedSegment::new(1, true);
        let e2 = DirectedSegment::new(2, true);
        let e3 = DirectedSegment::new(3, false);

        trie.insert_path(from, &[e1, e2], TrieLeaf { kind: RestrictionKind::No, to_node: 7 });
        trie.insert_path(from, &[e1, e3], TrieLeaf { kind: RestrictionKind::No, to_node: 8 });

        let root = trie.enter(from, e1).unwrap();
        assert!(trie.node(root).leaves.is_empty());
        let s2 = trie.step(root, e2).unwrap();
        assert_eq!(trie.node(s2).leaves, vec![TrieLeaf { kind: RestrictionKind::No, to_node: 7 }]);
        let s3 = trie.step(root, e3).unwrap();
        assert_eq!(trie.node(s3).leaves.len(), 1);
        assert_eq!(trie.node_count(), 3);
    }

    #[test]
    fn barrier_predicate() {
        let mut barriers = FxHashMap::default();
        barriers.insert(5u32, false);
        barriers.insert(6u32, true);
        let index = RestrictionIndex::from_parts(
            Default::default(),
            Default::default(),
            ViaWayTrie::default(),
            barriers,
        );
        assert!(!index.can_traverse_through(5));
        assert!(index.can_traverse_through(6));
        assert!(index.can_traverse_through(7));
        assert!(index.is_barrier(5));
        assert!(!index.is_barrier(7));
    }
}
