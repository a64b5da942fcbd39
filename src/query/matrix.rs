//! Many-to-many tables via bucket joins
//!
//! One backward search per target fills buckets keyed by hierarchy node; one
//! forward search per source then probes the buckets, finding the cheapest
//! path to every target simultaneously instead of |S| x |T| full searches.

use std::cmp::Reverse;

use rustc_hash::FxHashMap;

use crate::query::{QueryScratch, RoutingEngine, SearchSpace};
use crate::spatial::PhantomNode;
use crate::{EegNodeId, Weight, INVALID_WEIGHT};

#[derive(Clone, Copy)]
struct BucketItem {
    target_idx: u32,
    cost: Weight,
    /// Label is an untouched seed of the target phantom.
    seeded: bool,
}

/// Row-major |sources| x |targets| weight matrix; unreachable pairs hold
/// `INVALID_WEIGHT`.
pub fn many_to_many(
    engine: &RoutingEngine<'_>,
    sources: &[PhantomNode],
    targets: &[PhantomNode],
    scratch: &mut QueryScratch,
) -> Vec<Weight> {
    let n_sources = sources.len();
    let n_targets = targets.len();
    let mut matrix = vec![INVALID_WEIGHT; n_sources * n_targets];
    if n_sources == 0 || n_targets == 0 {
        return matrix;
    }

    // Backward phase: collect (node -> target costs) buckets
    let mut buckets: FxHashMap<EegNodeId, Vec<BucketItem>> = FxHashMap::default();
    for (t_idx, target) in targets.iter().enumerate() {
        let space = &mut scratch.backward;
        space.begin();
        seed_backward(engine, target, space);
        run_to_exhaustion(engine, space, false);

        for &node in space.touched() {
            let Some(cost) = space.distance(node) else {
                continue;
            };
            buckets.entry(node).or_default().push(BucketItem {
                target_idx: t_idx as u32,
                cost,
                seeded: space.parent(node).is_none(),
            });
        }
    }

    // Forward phase: probe buckets from every source
    for (s_idx, source) in sources.iter().enumerate() {
        let space = &mut scratch.forward;
        space.begin();
        seed_forward(engine, source, space);
        run_to_exhaustion(engine, space, true);

        let row = &mut matrix[s_idx * n_targets..(s_idx + 1) * n_targets];
        for &node in space.touched() {
            let Some(d) = space.distance(node) else {
                continue;
            };
            let Some(items) = buckets.get(&node) else {
                continue;
            };
            let fwd_seeded = space.parent(node).is_none();
            for item in items {
                // Two untouched seed labels on one segment would count a
                // backwards traversal; the direct pass below covers that
                // segment exactly.
                if fwd_seeded
                    && item.seeded
                    && source.segment == targets[item.target_idx as usize].segment
                {
                    continue;
                }
                let total = d.saturating_add(item.cost);
                let cell = &mut row[item.target_idx as usize];
                if total < *cell {
                    *cell = total;
                }
            }
        }

        // Same-segment pairs in traversal order short-circuit the graph
        for (t_idx, target) in targets.iter().enumerate() {
            if let Some(direct) = engine.direct_route(source, target) {
                let cell = &mut row[t_idx];
                if direct.weight < *cell {
                    *cell = direct.weight;
                }
            }
        }
    }

    matrix
}

fn seed_forward(engine: &RoutingEngine<'_>, phantom: &PhantomNode, space: &mut SearchSpace) {
    if phantom.has_forward() {
        let n = phantom.forward_node;
        let d = engine.nodes.weight(n) - phantom.forward_offset_weight;
        let dur = engine.nodes.duration(n) - phantom.forward_offset_duration;
        space.improve(n, d, dur, None);
        space.heap.push(Reverse((d, n)));
    }
    if phantom.has_reverse() {
        let n = phantom.reverse_node;
        let d = engine.nodes.weight(n) - phantom.reverse_offset_weight;
        let dur = engine.nodes.duration(n) - phantom.reverse_offset_duration;
        space.improve(n, d, dur, None);
        space.heap.push(Reverse((d, n)));
    }
}

fn seed_backward(engine: &RoutingEngine<'_>, phantom: &PhantomNode, space: &mut SearchSpace) {
    if phantom.has_forward() {
        let n = phantom.forward_node;
        let d = phantom.forward_offset_weight - engine.nodes.weight(n);
        let dur = phantom.forward_offset_duration - engine.nodes.duration(n);
        space.improve(n, d, dur, None);
        space.heap.push(Reverse((d, n)));
    }
    if phantom.has_reverse() {
        let n = phantom.reverse_node;
        let d = phantom.reverse_offset_weight - engine.nodes.weight(n);
        let dur = phantom.reverse_offset_duration - engine.nodes.duration(n);
        space.improve(n, d, dur, None);
        space.heap.push(Reverse((d, n)));
    }
}

/// Settle the whole upward search space (hierarchy spaces are small).
fn run_to_exhaustion(engine: &RoutingEngine<'_>, space: &mut SearchSpace, forward: bool) {
    while let Some(Reverse((d, u))) = space.heap.pop() {
        if space.distance(u) != Some(d) {
            continue;
        }
        for i in engine.graph.edge_range(u) {
            let e = *engine.graph.edge(i);
            let usable = if forward { e.forward } else { e.backward };
            if !usable || !engine.graph.expansion_allowed(u, e.target) {
                continue;
            }
            let nd = d.saturating_add(e.weight);
            if nd >= INVALID_WEIGHT {
                continue;
            }
            let ndur = space.duration_of(u).unwrap_or(0).saturating_add(e.duration);
            if space.improve(e.target, nd, ndur, Some((u, i as u32))) {
                space.heap.push(Reverse((nd, e.target)));
            }
        }
    }
}
