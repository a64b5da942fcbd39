//! Round-trip scenarios over the lattice.

mod support;

use support::*;

#[test]
fn round_trip_visits_every_stop_and_closes() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);

    let stops = [
        grid_coord(0, 0),
        grid_coord(9, 0),
        grid_coord(9, 9),
        grid_coord(0, 9),
    ];
    let phantoms: Vec<_> = stops.iter().map(|&(x, y)| snap(&dataset, x, y)).collect();

    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let trip = waymark::trip::round_trip(&engine, &phantoms, &mut scratch).expect("trip");

    assert_eq!(trip.order.len(), 4);
    assert_eq!(trip.order[0], 0, "tour starts at the first input");
    let mut sorted = trip.order.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![0, 1, 2, 3], "every stop appears exactly once");
    assert_eq!(trip.legs.len(), 4, "closed tour has one leg per stop");

    // Perimeter tour: 4 sides of 9 edges each
    assert_eq!(trip.weight, 36);
}

#[test]
fn round_trip_is_stable_across_runs() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);
    let stops = [
        grid_coord(2, 1),
        grid_coord(8, 3),
        grid_coord(5, 9),
        grid_coord(0, 6),
        grid_coord(4, 4),
    ];
    let phantoms: Vec<_> = stops.iter().map(|&(x, y)| snap(&dataset, x, y)).collect();

    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let first = waymark::trip::round_trip(&engine, &phantoms, &mut scratch).expect("trip");
    let second = waymark::trip::round_trip(&engine, &phantoms, &mut scratch).expect("trip");

    assert_eq!(first.order, second.order);
    assert_eq!(first.weight, second.weight);
}

#[test]
fn single_stop_trip_is_trivial() {
    let (_dir, dataset) = build_dataset(&grid_input(), &ZeroTurnProfile, 1.0);
    let phantom = snap(&dataset, 0.0, 0.0);

    let engine = dataset.engine();
    let mut scratch = dataset.scratch();
    let trip = waymark::trip::round_trip(&engine, &[phantom], &mut scratch).expect("trip");
    assert_eq!(trip.order, vec![0]);
    assert!(trip.legs.is_empty());
    assert_eq!(trip.weight, 0);
}
