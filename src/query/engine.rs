//! Bidirectional point-to-point search
//!
//! The forward space measures cost from the origin to the *end* of each
//! settled node's segment; the backward space measures cost from the *end* of
//! a node's segment to the destination (seeded with the phantom offset minus
//! the node cost, which may be negative). Their sum at any node is the full
//! path cost, so the searches meet without node-weight corrections.

use serde::Serialize;

use crate::coord::{haversine_m, Coordinate};
use crate::ebg::{EegNodeStore, GeometryTable};
use crate::query::{scratch::SearchSpace, unpack, QueryGraph, QueryScratch};
use crate::spatial::PhantomNode;
use crate::{EegNodeId, Weight, INVALID_WEIGHT};

/// A finished route.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub weight: Weight,
    pub duration: Weight,
    pub distance_m: f64,
    /// Original edge-expanded nodes, in travel order.
    pub nodes: Vec<EegNodeId>,
    pub geometry: Vec<Coordinate>,
}

/// Outcome of one bidirectional search.
pub(crate) struct SearchOutcome {
    /// Candidate meeting nodes with their path totals, unordered.
    pub meetings: Vec<(EegNodeId, Weight)>,
    pub best: Option<(EegNodeId, Weight)>,
}

pub struct RoutingEngine<'a> {
    pub graph: &'a QueryGraph,
    pub nodes: &'a EegNodeStore,
    pub geometry: &'a GeometryTable,
}

impl<'a> RoutingEngine<'a> {
    pub fn new(
        graph: &'a QueryGraph,
        nodes: &'a EegNodeStore,
        geometry: &'a GeometryTable,
    ) -> Self {
        Self {
            graph,
            nodes,
            geometry,
        }
    }

    /// Shortest route between two phantom nodes. `None` when disconnected.
    pub fn route(
        &self,
        source: &PhantomNode,
        target: &PhantomNode,
        scratch: &mut QueryScratch,
    ) -> Option<Route> {
        if let Some(direct) = self.direct_route(source, target) {
            return Some(direct);
        }

        let outcome = self.bidirectional_search(source, target, scratch, 0.0);
        let (meeting, weight) = outcome.best?;
        let duration = scratch.forward.duration_of(meeting).unwrap_or(0)
            + scratch.backward.duration_of(meeting).unwrap_or(0);
        let nodes = self.path_nodes(scratch, meeting);
        Some(self.assemble(source, target, weight, duration, nodes))
    }

    /// Both phantoms on one segment, in traversal order: the path is the
    /// piece of that segment, and any detour through intersections would
    /// only add cost.
    pub(crate) fn direct_route(
        &self,
        source: &PhantomNode,
        target: &PhantomNode,
    ) -> Option<Route> {
        if source.segment != target.segment {
            return None;
        }
        if source.has_forward()
            && target.has_forward()
            && source.fraction <= target.fraction
        {
            let weight = target.forward_offset_weight - source.forward_offset_weight;
            let duration = target.forward_offset_duration - source.forward_offset_duration;
            let node = source.forward_node;
            let geometry = self.partial_between(node, source, target);
            let distance_m = polyline_length(&geometry);
            return Some(Route {
                weight,
                duration,
                distance_m,
                nodes: vec![node],
                geometry,
            });
        }
        if source.has_reverse() && target.has_reverse() && source.fraction >= target.fraction {
            let weight = target.reverse_offset_weight - source.reverse_offset_weight;
            let duration = target.reverse_offset_duration - source.reverse_offset_duration;
            let node = source.reverse_node;
            let geometry = self.partial_between(node, source, target);
            let distance_m = polyline_length(&geometry);
            return Some(Route {
                weight,
                duration,
                distance_m,
                nodes: vec![node],
                geometry,
            });
        }
        None
    }

    /// Run the bidirectional upward search. `slack` widens the termination
    /// bound (0.25 keeps meetings within 25% of the optimum, for
    /// alternatives).
    pub(crate) fn bidirectional_search(
        &self,
        source: &PhantomNode,
        target: &PhantomNode,
        scratch: &mut QueryScratch,
        slack: f64,
    ) -> SearchOutcome {
        let fwd = &mut scratch.forward;
        let bwd = &mut scratch.backward;
        fwd.begin();
        bwd.begin();

        if source.has_forward() {
            let n = source.forward_node;
            let d = self.nodes.weight(n) - source.forward_offset_weight;
            let dur = self.nodes.duration(n) - source.forward_offset_duration;
            fwd.improve(n, d, dur, None);
            fwd.heap.push(std::cmp::Reverse((d, n)));
        }
        if source.has_reverse() {
            let n = source.reverse_node;
            let d = self.nodes.weight(n) - source.reverse_offset_weight;
            let dur = self.nodes.duration(n) - source.reverse_offset_duration;
            fwd.improve(n, d, dur, None);
            fwd.heap.push(std::cmp::Reverse((d, n)));
        }
        if target.has_forward() {
            let n = target.forward_node;
            let d = target.forward_offset_weight - self.nodes.weight(n);
            let dur = target.forward_offset_duration - self.nodes.duration(n);
            bwd.improve(n, d, dur, None);
            bwd.heap.push(std::cmp::Reverse((d, n)));
        }
        if target.has_reverse() {
            let n = target.reverse_node;
            let d = target.reverse_offset_weight - self.nodes.weight(n);
            let dur = target.reverse_offset_duration - self.nodes.duration(n);
            bwd.improve(n, d, dur, None);
            bwd.heap.push(std::cmp::Reverse((d, n)));
        }

        let mut meetings: Vec<(EegNodeId, Weight)> = Vec::new();
        let mut best: Option<(EegNodeId, Weight)> = None;

        loop {
            let bound = match best {
                Some((_, w)) if w >= 0 => {
                    w.saturating_add((w as f64 * slack).ceil() as Weight)
                }
                Some((_, w)) => w,
                None => INVALID_WEIGHT,
            };
            let fwd_min = fwd.min_key().unwrap_or(INVALID_WEIGHT);
            let bwd_min = bwd.min_key().unwrap_or(INVALID_WEIGHT);
            if fwd_min >= bound && bwd_min >= bound {
                break;
            }

            if fwd_min <= bwd_min {
                Self::step(self.graph, fwd, bwd, true, bound, &mut meetings, &mut best);
            } else {
                Self::step(self.graph, bwd, fwd, false, bound, &mut meetings, &mut best);
            }
        }

        SearchOutcome { meetings, best }
    }

    /// One settle step of either search direction.
    #[allow(clippy::too_many_arguments)]
    fn step(
        graph: &QueryGraph,
        this: &mut SearchSpace,
        other: &SearchSpace,
        forward: bool,
        bound: Weight,
        meetings: &mut Vec<(EegNodeId, Weight)>,
        best: &mut Option<(EegNodeId, Weight)>,
    ) {
        let Some(std::cmp::Reverse((d, u))) = this.heap.pop() else {
            return;
        };
        if this.distance(u) != Some(d) {
            return; // stale entry
        }

        if let Some(od) = other.distance(u) {
            // A meeting of two untouched seed labels on one segment would
            // teleport backwards along it; a real path must loop around.
            let seeded_twice = this.parent(u).is_none() && other.parent(u).is_none();
            if !seeded_twice {
                let total = d.saturating_add(od);
                meetings.push((u, total));
                if best.map_or(true, |(_, b)| total < b) {
                    *best = Some((u, total));
                }
            }
        }

        if d >= bound {
            return;
        }

        for i in graph.edge_range(u) {
            let e = *graph.edge(i);
            let usable = if forward { e.forward } else { e.backward };
            if !usable || !graph.expansion_allowed(u, e.target) {
                continue;
            }
            let nd = d.saturating_add(e.weight);
            if nd >= INVALID_WEIGHT {
                continue;
            }
            let ndur = this
                .duration_of(u)
                .unwrap_or(0)
                .saturating_add(e.duration);
            if this.improve(e.target, nd, ndur, Some((u, i as u32))) {
                this.heap.push(std::cmp::Reverse((nd, e.target)));
            }
        }
    }

    /// Reconstruct and unpack the original node sequence through `meeting`.
    pub(crate) fn path_nodes(
        &self,
        scratch: &QueryScratch,
        meeting: EegNodeId,
    ) -> Vec<EegNodeId> {
        // Forward half: meeting back to the source seed
        let mut hops: Vec<(EegNodeId, usize, EegNodeId)> = Vec::new();
        let mut cur = meeting;
        while let Some((prev, edge_idx)) = scratch.forward.parent(cur) {
            hops.push((prev, edge_idx as usize, cur));
            cur = prev;
        }
        let start = cur;
        hops.reverse();
        let mut nodes = unpack::expand_chain(self.graph, start, &hops);

        // Backward half: meeting onward to the target seed
        let mut cur = meeting;
        while let Some((next, edge_idx)) = scratch.backward.parent(cur) {
            // The backward entry at `next` describes the original edge
            // cur -> next.
            let edge = *self.graph.edge(edge_idx as usize);
            unpack::expand(self.graph, cur, next, &edge, &mut nodes);
            cur = next;
        }
        nodes
    }

    /// Stitch phantom partials and full segment polylines into a route.
    pub(crate) fn assemble(
        &self,
        source: &PhantomNode,
        target: &PhantomNode,
        weight: Weight,
        duration: Weight,
        nodes: Vec<EegNodeId>,
    ) -> Route {
        let mut geometry: Vec<Coordinate> = Vec::new();
        let last = nodes.len() - 1;
        for (i, &node) in nodes.iter().enumerate() {
            let part = if i == 0 {
                self.partial_from(node, source)
            } else if i == last {
                self.partial_to(node, target)
            } else {
                self.oriented_polyline(node)
            };
            for c in part {
                if geometry.last() != Some(&c) {
                    geometry.push(c);
                }
            }
        }
        let distance_m = polyline_length(&geometry);
        Route {
            weight,
            duration,
            distance_m,
            nodes,
            geometry,
        }
    }

    fn oriented_polyline(&self, node: EegNodeId) -> Vec<Coordinate> {
        let poly = self.geometry.polyline(self.nodes.segment(node));
        if self.nodes.is_forward(node) {
            poly.to_vec()
        } else {
            let mut v = poly.to_vec();
            v.reverse();
            v
        }
    }

    /// Leg index where a stored-orientation cost fraction falls.
    fn cut_leg(&self, node: EegNodeId, fraction: f64) -> usize {
        let cums = self.geometry.cumulative_weights(self.nodes.segment(node));
        if cums.is_empty() {
            return 0;
        }
        let total = *cums.last().unwrap_or(&1) as f64;
        let offset = fraction * total;
        cums.iter()
            .position(|&c| c as f64 >= offset - 1e-9)
            .unwrap_or(cums.len() - 1)
    }

    /// Geometry from a phantom position to the end of its node's traversal.
    fn partial_from(&self, node: EegNodeId, phantom: &PhantomNode) -> Vec<Coordinate> {
        let poly = self.geometry.polyline(self.nodes.segment(node));
        let leg = self.cut_leg(node, phantom.fraction);
        let mut out = vec![phantom.snapped];
        if self.nodes.is_forward(node) {
            out.extend_from_slice(&poly[leg + 1..]);
        } else {
            out.extend(poly[..=leg].iter().rev());
        }
        out
    }

    /// Geometry from the start of a node's traversal to a phantom position.
    fn partial_to(&self, node: EegNodeId, phantom: &PhantomNode) -> Vec<Coordinate> {
        let poly = self.geometry.polyline(self.nodes.segment(node));
        let leg = self.cut_leg(node, phantom.fraction);
        let mut out: Vec<Coordinate> = if self.nodes.is_forward(node) {
            poly[..=leg].to_vec()
        } else {
            poly[leg + 1..].iter().rev().copied().collect()
        };
        out.push(phantom.snapped);
        out
    }

    /// Geometry between two phantoms on the same node.
    fn partial_between(
        &self,
        node: EegNodeId,
        source: &PhantomNode,
        target: &PhantomNode,
    ) -> Vec<Coordinate> {
        let poly = self.geometry.polyline(self.nodes.segment(node));
        let (lo, hi) = if source.fraction <= target.fraction {
            (source, target)
        } else {
            (target, source)
        };
        let leg_lo = self.cut_leg(node, lo.fraction);
        let leg_hi = self.cut_leg(node, hi.fraction);
        let mut out = vec![lo.snapped];
        if leg_hi > leg_lo {
            out.extend_from_slice(&poly[leg_lo + 1..=leg_hi]);
        }
        out.push(hi.snapped);
        if !self.nodes.is_forward(node) {
            out.reverse();
        }
        out
    }
}

pub(crate) fn polyline_length(geometry: &[Coordinate]) -> f64 {
    geometry.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}
