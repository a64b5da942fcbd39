//! Map-matching scenarios: clean traces, broken traces, compression
//! partials.

mod support;

use support::*;
use waymark::coord::Coordinate;
use waymark::matching::{MatchConfig, Matcher};
use waymark::osm::ExtractionInput;

/// One straight 300 m road along the equator, nodes every ~30 m.
fn straight_road() -> ExtractionInput {
    let mut input = ExtractionInput::new();
    let spacing = 0.00027; // ~30 m
    for i in 0..11 {
        input.nodes.push(node(i + 1, spacing * i as f64, 0.0));
    }
    input.ways.push(way(
        1,
        (1..=11).collect(),
        way_profile(360.0, Some("straight")),
    ));
    input
}

/// Same road plus a twin ~100 km north.
fn two_distant_roads() -> ExtractionInput {
    let mut input = straight_road();
    let spacing = 0.00027;
    for i in 0..11 {
        input.nodes.push(node(100 + i, spacing * i as f64, 0.9));
    }
    input.ways.push(way(
        2,
        (100..111).collect(),
        way_profile(360.0, Some("twin")),
    ));
    input
}

fn trace_on_road(lat: f64, start_m: f64, step_m: f64, count: usize) -> Vec<Coordinate> {
    (0..count)
        .map(|i| Coordinate::from_degrees((start_m + step_m * i as f64) * DEG_PER_M, lat))
        .collect()
}

#[test]
fn clean_trace_matches_in_one_piece() {
    let input = straight_road();
    let (_dir, dataset) = build_dataset(&input, &ZeroTurnProfile, 1.0);

    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let matcher = Matcher::new(&engine, &dataset.spatial, MatchConfig::default());

    let trace = trace_on_road(0.0, 50.0, 10.0, 5);
    let matchings = matcher.match_trace(&trace, None, &mut scratch);

    assert_eq!(matchings.len(), 1, "a clean trace must not split");
    let m = &matchings[0];
    assert_eq!(m.indices, vec![0, 1, 2, 3, 4]);
    assert!(
        m.confidence >= 0.9,
        "clean trace confidence {} below 0.9",
        m.confidence
    );
    // 4 hops of ~10 m
    assert!(
        (30.0..50.0).contains(&m.length_m),
        "length {} off for a 40 m trace",
        m.length_m
    );
}

#[test]
fn noisy_trace_on_a_single_road_stays_whole() {
    let input = straight_road();
    let (_dir, dataset) = build_dataset(&input, &ZeroTurnProfile, 1.0);

    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let matcher = Matcher::new(&engine, &dataset.spatial, MatchConfig::default());

    // Lateral noise below sigma, alternating sides
    let trace: Vec<Coordinate> = (0..8)
        .map(|i| {
            let off = if i % 2 == 0 { 2.0 } else { -2.0 };
            Coordinate::from_degrees((40.0 + 12.0 * i as f64) * DEG_PER_M, off * DEG_PER_M)
        })
        .collect();
    let matchings = matcher.match_trace(&trace, None, &mut scratch);

    assert_eq!(matchings.len(), 1);
    assert_eq!(matchings[0].indices.len(), 8);
    assert!(matchings[0].confidence > 0.5);
}

#[test]
fn teleporting_trace_splits_into_two_matchings() {
    let input = two_distant_roads();
    let (_dir, dataset) = build_dataset(&input, &ZeroTurnProfile, 1.0);

    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let matcher = Matcher::new(&engine, &dataset.spatial, MatchConfig::default());

    let mut trace = trace_on_road(0.0, 50.0, 10.0, 5);
    trace.extend(trace_on_road(0.9, 50.0, 10.0, 5));
    let matchings = matcher.match_trace(&trace, None, &mut scratch);

    assert_eq!(matchings.len(), 2, "the teleport must split the trace");
    assert_eq!(matchings[0].indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(matchings[1].indices, vec![5, 6, 7, 8, 9]);
}

#[test]
fn unmatchable_trace_yields_nothing() {
    let input = straight_road();
    let (_dir, dataset) = build_dataset(&input, &ZeroTurnProfile, 1.0);

    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let matcher = Matcher::new(&engine, &dataset.spatial, MatchConfig::default());

    // Far out at sea relative to the road
    let trace = trace_on_road(0.5, 0.0, 10.0, 4);
    let matchings = matcher.match_trace(&trace, None, &mut scratch);
    assert!(matchings.is_empty());
}
