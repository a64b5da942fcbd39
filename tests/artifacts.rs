//! Round-trip properties of the on-disk artifacts.

mod support;

use support::*;
use waymark::formats::{self, artifact_path, suffix};
use waymark::query::unpack;
use waymark::{EegNodeId, INVALID_WEIGHT};

#[test]
fn every_edge_weight_is_target_cost_plus_turn_penalty() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);
    let records =
        formats::ebg::read(&artifact_path(&dataset.base, suffix::EBG)).expect("read edges");

    assert!(!records.is_empty());
    for rec in &records {
        // Zero-turn profile: the edge weight is exactly the target segment
        assert_eq!(rec.weight, dataset.nodes.weight(rec.target));
        assert_eq!(rec.duration, dataset.nodes.duration(rec.target));
    }
}

#[test]
fn unpacking_shortcuts_gives_simple_exact_paths() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);
    let graph = &dataset.graph;

    let mut shortcuts = 0;
    for source in 0..graph.node_count() as EegNodeId {
        for i in graph.edge_range(source) {
            let edge = *graph.edge(i);
            if !edge.forward || !edge.shortcut {
                continue;
            }
            shortcuts += 1;

            let mut nodes = vec![source];
            unpack::expand(graph, source, edge.target, &edge, &mut nodes);

            // Simple path: no node repeats
            let mut seen = nodes.clone();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), nodes.len(), "unpacked path revisits a node");

            // Exact: original edge weights sum to the shortcut weight
            let mut total = 0;
            for pair in nodes.windows(2) {
                let original = graph
                    .find_forward_edge(pair[0], pair[1])
                    .expect("unpacked hop must exist");
                assert!(!original.shortcut, "unpacking must reach original edges");
                total += original.weight;
            }
            assert_eq!(total, edge.weight, "shortcut weight must be the sum");
        }
    }
    assert!(shortcuts > 0, "a 10x10 lattice contraction creates shortcuts");
}

#[test]
fn hierarchy_levels_are_a_total_order_below_shortcuts() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);
    let graph = &dataset.graph;

    for source in 0..graph.node_count() as EegNodeId {
        for i in graph.edge_range(source) {
            let edge = graph.edge(i);
            if edge.forward && edge.shortcut {
                let lm = graph.levels[edge.middle as usize];
                assert!(lm < graph.levels[source as usize]);
                assert!(lm < graph.levels[edge.target as usize]);
            }
        }
    }
}

#[test]
fn foreign_hierarchy_is_rejected_at_load() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);

    // Re-stamp the hierarchy as if it came from another extraction
    let hsgr_path = artifact_path(&dataset.base, suffix::HSGR);
    let mut hsgr = formats::hsgr::read(&hsgr_path).expect("read hsgr");
    hsgr.checksum ^= 0xdead_beef;
    formats::hsgr::write(&hsgr_path, &hsgr).expect("rewrite hsgr");

    let err = match waymark::Dataset::load(&dataset.base, false) {
        Ok(_) => panic!("a hierarchy from a different extraction must not load"),
        Err(e) => e,
    };
    assert!(
        matches!(err, waymark::ArtifactError::Corrupt { .. }),
        "expected a corrupt-dataset error, got {err:?}"
    );
}

#[test]
fn tampered_artifact_fails_its_checksum() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);

    let enw_path = artifact_path(&dataset.base, suffix::ENW);
    let mut raw = std::fs::read(&enw_path).expect("read enw");
    let middle = raw.len() / 2;
    raw[middle] ^= 0xff;
    std::fs::write(&enw_path, &raw).expect("tamper enw");

    let err = formats::enw::read(&enw_path).expect_err("tampered file");
    assert!(
        matches!(err, waymark::ArtifactError::Corrupt { .. }),
        "expected a checksum failure, got {err:?}"
    );
}

#[test]
fn node_costs_are_finite_and_positive() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);
    for n in 0..dataset.nodes.len() as EegNodeId {
        let w = dataset.nodes.weight(n);
        assert!(w > 0 && w < INVALID_WEIGHT);
    }
}
