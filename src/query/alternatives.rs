//! Alternative routes
//!
//! Meeting nodes within a bounded stretch of the optimum become alternative
//! candidates; a candidate survives when its path shares at most an overlap
//! threshold of its weight with every already-selected path.

use rustc_hash::FxHashSet;

use crate::query::{QueryScratch, Route, RoutingEngine};
use crate::spatial::PhantomNode;
use crate::{EegNodeId, Weight};

/// Extra weight tolerated over the optimum.
pub const STRETCH: f64 = 0.25;
/// Maximum tolerated shared-weight fraction between two returned paths.
pub const OVERLAP: f64 = 0.75;

/// Best route plus up to `max_alternatives` sufficiently distinct ones.
pub fn alternative_routes(
    engine: &RoutingEngine<'_>,
    source: &PhantomNode,
    target: &PhantomNode,
    scratch: &mut QueryScratch,
    max_alternatives: usize,
) -> Vec<Route> {
    if let Some(direct) = engine.direct_route(source, target) {
        return vec![direct];
    }

    let outcome = engine.bidirectional_search(source, target, scratch, STRETCH);
    let Some((_, best_weight)) = outcome.best else {
        return Vec::new();
    };
    let limit = best_weight.saturating_add((best_weight.max(0) as f64 * STRETCH).ceil() as Weight);

    // Cheapest total per meeting node
    let mut candidates: Vec<(EegNodeId, Weight)> = Vec::new();
    let mut seen: FxHashSet<EegNodeId> = FxHashSet::default();
    let mut sorted = outcome.meetings;
    sorted.sort_by_key(|&(node, total)| (total, node));
    for (node, total) in sorted {
        if total > limit {
            break;
        }
        if seen.insert(node) {
            candidates.push((node, total));
        }
    }

    let mut selected: Vec<(Route, FxHashSet<(EegNodeId, EegNodeId)>)> = Vec::new();
    for (meeting, weight) in candidates {
        if selected.len() > max_alternatives {
            break;
        }
        let nodes = engine.path_nodes(scratch, meeting);
        let hops: FxHashSet<(EegNodeId, EegNodeId)> =
            nodes.windows(2).map(|w| (w[0], w[1])).collect();

        let distinct = selected.iter().all(|(route, their_hops)| {
            overlap_ratio(engine, &hops, their_hops) <= OVERLAP && route.nodes != nodes
        });
        if !distinct {
            continue;
        }

        let duration = scratch.forward.duration_of(meeting).unwrap_or(0)
            + scratch.backward.duration_of(meeting).unwrap_or(0);
        let route = engine.assemble(source, target, weight, duration, nodes);
        selected.push((route, hops));
    }

    selected.into_iter().map(|(route, _)| route).collect()
}

/// Shared-hop weight as a fraction of the smaller path's hop weight.
fn overlap_ratio(
    engine: &RoutingEngine<'_>,
    a: &FxHashSet<(EegNodeId, EegNodeId)>,
    b: &FxHashSet<(EegNodeId, EegNodeId)>,
) -> f64 {
    let hop_weight =
        |set: &FxHashSet<(EegNodeId, EegNodeId)>| -> i64 {
            set.iter()
                .map(|&(_, to)| engine.nodes.weight(to) as i64)
                .sum()
        };
    let shared: i64 = a
        .intersection(b)
        .map(|&(_, to)| engine.nodes.weight(to) as i64)
        .sum();
    let denom = hop_weight(a).min(hop_weight(b)).max(1);
    shared as f64 / denom as f64
}
