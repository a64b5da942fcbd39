//! Hierarchy self-checks
//!
//! Samples random node pairs and compares the bidirectional hierarchy search
//! against a plain Dijkstra over the original edge-expanded edges. Any
//! disagreement means the contraction broke shortest-path equivalence.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::ebg::EegNodeStore;
use crate::formats::ebg::EdgeRecord;
use crate::query::{QueryGraph, QueryScratch};
use crate::{EegNodeId, Weight, INVALID_WEIGHT};

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub sampled: usize,
    pub mismatches: usize,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Compare `samples` random pairs. Costs are node-to-node: the source node's
/// own traversal counts, matching the search seeding convention.
pub fn validate_hierarchy(
    graph: &QueryGraph,
    nodes: &EegNodeStore,
    records: &[EdgeRecord],
    samples: usize,
    seed: u64,
) -> ValidationReport {
    let n = graph.node_count();
    let mut report = ValidationReport::default();
    if n == 0 {
        return report;
    }

    let mut adjacency: Vec<Vec<(EegNodeId, Weight)>> = vec![Vec::new(); n];
    for r in records {
        adjacency[r.source as usize].push((r.target, r.weight));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut scratch = QueryScratch::new(n);
    let mut dist = vec![INVALID_WEIGHT; n];

    for _ in 0..samples {
        let s = rng.random_range(0..n) as EegNodeId;
        let t = rng.random_range(0..n) as EegNodeId;

        let reference = plain_dijkstra(&adjacency, nodes, s, t, &mut dist);
        let hierarchy = hierarchy_query(graph, nodes, s, t, &mut scratch);

        report.sampled += 1;
        if reference != hierarchy {
            report.mismatches += 1;
            warn!(
                source = s,
                target = t,
                reference = ?reference,
                hierarchy = ?hierarchy,
                "hierarchy disagrees with plain search"
            );
        }
    }
    report
}

fn plain_dijkstra(
    adjacency: &[Vec<(EegNodeId, Weight)>],
    nodes: &EegNodeStore,
    source: EegNodeId,
    target: EegNodeId,
    dist: &mut [Weight],
) -> Option<Weight> {
    dist.fill(INVALID_WEIGHT);
    let mut heap: BinaryHeap<Reverse<(Weight, EegNodeId)>> = BinaryHeap::new();
    dist[source as usize] = nodes.weight(source);
    heap.push(Reverse((dist[source as usize], source)));

    while let Some(Reverse((d, u))) = heap.pop() {
        if u == target {
            return Some(d);
        }
        if d > dist[u as usize] {
            continue;
        }
        for &(v, w) in &adjacency[u as usize] {
            let nd = d.saturating_add(w);
            if nd < dist[v as usize] {
                dist[v as usize] = nd;
                heap.push(Reverse((nd, v)));
            }
        }
    }
    None
}

/// Node-to-node query over the hierarchy, same cost convention.
pub fn hierarchy_query(
    graph: &QueryGraph,
    nodes: &EegNodeStore,
    source: EegNodeId,
    target: EegNodeId,
    scratch: &mut QueryScratch,
) -> Option<Weight> {
    let fwd = &mut scratch.forward;
    let bwd = &mut scratch.backward;
    fwd.begin();
    bwd.begin();

    fwd.improve(source, nodes.weight(source), nodes.duration(source), None);
    fwd.heap.push(Reverse((nodes.weight(source), source)));
    bwd.improve(target, 0, 0, None);
    bwd.heap.push(Reverse((0, target)));

    let mut best: Option<Weight> = None;

    loop {
        let bound = best.unwrap_or(INVALID_WEIGHT);
        let fwd_min = fwd.min_key().unwrap_or(INVALID_WEIGHT);
        let bwd_min = bwd.min_key().unwrap_or(INVALID_WEIGHT);
        if fwd_min >= bound && bwd_min >= bound {
            break;
        }

        let forward_turn = fwd_min <= bwd_min;
        let (this, other) = if forward_turn { (&mut *fwd, &*bwd) } else { (&mut *bwd, &*fwd) };

        let Some(Reverse((d, u))) = this.heap.pop() else {
            continue;
        };
        if this.distance(u) != Some(d) {
            continue;
        }
        if let Some(od) = other.distance(u) {
            let total = d.saturating_add(od);
            if best.map_or(true, |b| total < b) {
                best = Some(total);
            }
        }
        if d >= bound {
            continue;
        }
        for i in graph.edge_range(u) {
            let e = *graph.edge(i);
            let usable = if forward_turn { e.forward } else { e.backward };
            if !usable || !graph.expansion_allowed(u, e.target) {
                continue;
            }
            let nd = d.saturating_add(e.weight);
            if nd < INVALID_WEIGHT && this.improve(e.target, nd, 0, Some((u, i as u32))) {
                this.heap.push(Reverse((nd, e.target)));
            }
        }
    }

    best
}
