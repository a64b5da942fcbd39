//! Shortcut unpacking
//!
//! A shortcut stands for a two-edge path through its contracted middle node;
//! unpacking substitutes recursively until only original turns remain.

use tracing::warn;

use crate::formats::hsgr::HsgrEdge;
use crate::query::QueryGraph;
use crate::EegNodeId;

/// Append the nodes after `from` along the expansion of `edge` (from -> to).
/// `from` itself is not appended.
pub fn expand(
    graph: &QueryGraph,
    from: EegNodeId,
    to: EegNodeId,
    edge: &HsgrEdge,
    out: &mut Vec<EegNodeId>,
) {
    if !edge.shortcut {
        out.push(to);
        return;
    }
    let middle = edge.middle;

    match graph.find_forward_edge(from, middle) {
        Some(first) => {
            let first = *first;
            expand(graph, from, middle, &first, out);
        }
        None => {
            warn!(from, middle, "missing first half of shortcut");
            out.push(middle);
        }
    }
    match graph.find_forward_edge(middle, to) {
        Some(second) => {
            let second = *second;
            expand(graph, middle, to, &second, out);
        }
        None => {
            warn!(middle, to, "missing second half of shortcut");
            out.push(to);
        }
    }
}

/// Fully expand a parent chain of (from, edge index, to) hops into the
/// original node sequence, starting with `start`.
pub fn expand_chain(
    graph: &QueryGraph,
    start: EegNodeId,
    hops: &[(EegNodeId, usize, EegNodeId)],
) -> Vec<EegNodeId> {
    let mut out = vec![start];
    for &(from, edge_idx, to) in hops {
        let edge = *graph.edge(edge_idx);
        expand(graph, from, to, &edge, &mut out);
    }
    out
}
