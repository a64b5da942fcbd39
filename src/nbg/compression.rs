//! Degree-2 chain folding
//!
//! A through-traffic node with exactly two compatible incident segments is
//! folded away; the surviving segment keeps the intermediate coordinate so the
//! original polyline can be reconstructed. Nodes referenced by restrictions,
//! barriers and traffic signals are never folded. Candidates are visited in
//! ascending node-id order, which fixes the outcome when chains meet.

use rustc_hash::FxHashSet;

use crate::nbg::{NodeBasedGraph, Segment};
use crate::{NodeId, SegmentId};

/// Fold eligible degree-2 nodes in place. Returns the number of folded nodes.
pub fn compress(
    graph: &mut NodeBasedGraph,
    no_compress: &FxHashSet<NodeId>,
    barrier_nodes: &[NodeId],
) -> usize {
    let mut blocked: FxHashSet<NodeId> = no_compress.clone();
    blocked.extend(barrier_nodes.iter().copied());

    let mut alive = vec![true; graph.segments.len()];
    let mut folded = 0usize;

    for node in 0..graph.node_count() as NodeId {
        if blocked.contains(&node) || graph.traffic_signal[node as usize] {
            continue;
        }

        let incident: Vec<SegmentId> = graph.incident[node as usize]
            .iter()
            .copied()
            .filter(|&sid| alive[sid as usize])
            .collect();
        if incident.len() != 2 {
            continue;
        }
        let (first, second) = (incident[0], incident[1]);
        if first == second {
            // parallel pair or loop through this node
            continue;
        }
        if graph.segments[first as usize].is_loop() || graph.segments[second as usize].is_loop() {
            continue;
        }

        // Orient `first` to end at the node and `second` to start there
        let into_fwd = graph.segments[first as usize].to == node;
        let out_fwd = graph.segments[second as usize].from == node;

        if !compatible(
            &graph.segments[first as usize],
            into_fwd,
            &graph.segments[second as usize],
            out_fwd,
        ) {
            continue;
        }

        let merged = merge(
            &graph.segments[first as usize],
            into_fwd,
            &graph.segments[second as usize],
            out_fwd,
        );
        let other_end = merged.to;

        // `first` becomes the merged segment, `second` dies
        graph.segments[first as usize] = merged;
        alive[second as usize] = false;

        // The far endpoint of `second` now touches `first`
        let far = &mut graph.incident[other_end as usize];
        if let Some(slot) = far.iter_mut().find(|s| **s == second) {
            *slot = first;
        }
        graph.incident[node as usize].clear();
        graph.removed[node as usize] = true;
        folded += 1;
    }

    // Drop dead segments and renumber
    let old = std::mem::take(&mut graph.segments);
    graph.segments = old
        .into_iter()
        .enumerate()
        .filter_map(|(sid, seg)| alive[sid].then_some(seg))
        .collect();
    graph.incident = super::build_incident(graph.node_count(), &graph.segments);

    folded
}

/// Two oriented segments can fold into one when class, name, mode, flags and
/// per-direction speeds all line up. A one-way segment folds only with a
/// one-way continuation pointing the same way.
fn compatible(into: &Segment, into_fwd: bool, out: &Segment, out_fwd: bool) -> bool {
    if into.class != out.class
        || into.name != out.name
        || into.mode != out.mode
        || into.roundabout != out.roundabout
        || into.access_restricted != out.access_restricted
    {
        return false;
    }

    let (into_speed_on, into_speed_back) = oriented_speeds(into, into_fwd);
    let (out_speed_on, out_speed_back) = oriented_speeds(out, out_fwd);
    into_speed_on == out_speed_on && into_speed_back == out_speed_back
}

fn oriented_speeds(seg: &Segment, forward: bool) -> (f64, f64) {
    if forward {
        (seg.speed_fwd, seg.speed_rev)
    } else {
        (seg.speed_rev, seg.speed_fwd)
    }
}

fn merge(into: &Segment, into_fwd: bool, out: &Segment, out_fwd: bool) -> Segment {
    let mut geometry = oriented_geometry(into, into_fwd);
    let tail = oriented_geometry(out, out_fwd);
    geometry.extend_from_slice(&tail[1..]);

    let (speed_fwd, speed_rev) = oriented_speeds(into, into_fwd);
    Segment {
        from: if into_fwd { into.from } else { into.to },
        to: if out_fwd { out.to } else { out.from },
        speed_fwd,
        speed_rev,
        class: into.class,
        name: into.name,
        mode: into.mode,
        roundabout: into.roundabout,
        oneway_tagged: into.oneway_tagged || out.oneway_tagged,
        access_restricted: into.access_restricted,
        geometry,
        cum_weights: Vec::new(),
        cum_durations: Vec::new(),
        total_fwd: None,
        total_rev: None,
    }
}

fn oriented_geometry(seg: &Segment, forward: bool) -> Vec<crate::coord::Coordinate> {
    if forward {
        seg.geometry.clone()
    } else {
        let mut g = seg.geometry.clone();
        g.reverse();
        g
    }
}
