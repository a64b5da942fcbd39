//! Chain folding scenario: geometry survives, phantom partials split the
//! folded cost.

mod support;

use support::*;
use waymark::osm::ExtractionInput;

/// a - b - c - d - e, all through nodes, each leg ~30 m (cost 3).
fn chain_input() -> ExtractionInput {
    let mut input = ExtractionInput::new();
    let spacing = 0.00027;
    for i in 0..5 {
        input.nodes.push(node(i + 1, spacing * i as f64, 0.0));
    }
    input.ways.push(way(
        1,
        vec![1, 2, 3, 4, 5],
        way_profile(360.0, Some("chain")),
    ));
    input
}

#[test]
fn chain_folds_into_one_segment_of_summed_weight() {
    let (_dir, dataset) = build_dataset(&chain_input(), &ZeroTurnProfile, 1.0);

    assert_eq!(dataset.geometry.len(), 1, "the chain must fold to one segment");
    assert_eq!(dataset.geometry.polyline(0).len(), 5);
    assert_eq!(dataset.geometry.cumulative_weights(0), &[3, 6, 9, 12]);

    // Two directed nodes, each carrying the folded total
    assert_eq!(dataset.nodes.len(), 2);
    assert_eq!(dataset.nodes.weight(0), 12);
    assert_eq!(dataset.nodes.weight(1), 12);
}

#[test]
fn phantom_at_the_chain_middle_splits_the_cost() {
    let (_dir, dataset) = build_dataset(&chain_input(), &ZeroTurnProfile, 1.0);

    // Node c sits exactly halfway
    let phantom = snap(&dataset, 0.00054, 0.0);
    assert_eq!(phantom.forward_offset_weight, 6);
    assert_eq!(phantom.reverse_offset_weight, 6);
    assert!((phantom.fraction - 0.5).abs() < 1e-9);
}

#[test]
fn end_to_end_route_over_the_folded_chain() {
    let (_dir, dataset) = build_dataset(&chain_input(), &ZeroTurnProfile, 1.0);

    let source = snap(&dataset, 0.0, 0.0);
    let target = snap(&dataset, 0.00108, 0.0);
    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let route = engine.route(&source, &target, &mut scratch).expect("route");

    assert_eq!(route.weight, 12);
    assert_eq!(route.nodes.len(), 1, "one segment end to end");
    // The folded polyline is reconstructed in full
    assert_eq!(route.geometry.len(), 5);
}

#[test]
fn partial_route_reads_cumulative_costs() {
    let (_dir, dataset) = build_dataset(&chain_input(), &ZeroTurnProfile, 1.0);

    // From b to d: middle two legs only
    let source = snap(&dataset, 0.00027, 0.0);
    let target = snap(&dataset, 0.00081, 0.0);
    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let route = engine.route(&source, &target, &mut scratch).expect("route");

    assert_eq!(route.weight, 6);
    // And the reverse direction costs the same on a symmetric chain
    let back = engine.route(&target, &source, &mut scratch).expect("route");
    assert_eq!(back.weight, 6);
}
