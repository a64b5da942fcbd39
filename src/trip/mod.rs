//! Round trips
//!
//! Orders a set of snapped locations into a closed tour over the
//! many-to-many matrix: farthest insertion while the instance is small,
//! nearest neighbour beyond that. Legs are routed independently; the tour
//! closes back on the first input location.

use crate::query::{matrix::many_to_many, QueryScratch, Route, RoutingEngine};
use crate::spatial::PhantomNode;
use crate::{Weight, INVALID_WEIGHT};

/// Largest instance solved with farthest insertion.
pub const FARTHEST_INSERTION_MAX: usize = 10;

#[derive(Debug)]
pub struct Trip {
    /// Visiting order over the input indices, starting at 0.
    pub order: Vec<usize>,
    /// One leg per tour edge, closing back to the start.
    pub legs: Vec<Route>,
    pub weight: Weight,
    pub duration: Weight,
}

/// Solve the round trip. `None` when any pair of locations is disconnected.
pub fn round_trip(
    engine: &RoutingEngine<'_>,
    phantoms: &[PhantomNode],
    scratch: &mut QueryScratch,
) -> Option<Trip> {
    let n = phantoms.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(Trip {
            order: vec![0],
            legs: Vec::new(),
            weight: 0,
            duration: 0,
        });
    }

    let matrix = many_to_many(engine, phantoms, phantoms, scratch);
    let at = |i: usize, j: usize| matrix[i * n + j];
    if (0..n).any(|i| (0..n).any(|j| i != j && at(i, j) == INVALID_WEIGHT)) {
        return None;
    }

    let mut order = if n <= FARTHEST_INSERTION_MAX {
        farthest_insertion(n, &at)
    } else {
        nearest_neighbour(n, &at)
    };
    rotate_to_start(&mut order, 0);

    let mut legs = Vec::with_capacity(n);
    let mut weight: Weight = 0;
    let mut duration: Weight = 0;
    for i in 0..n {
        let from = order[i];
        let to = order[(i + 1) % n];
        let leg = engine.route(&phantoms[from], &phantoms[to], scratch)?;
        weight = weight.saturating_add(leg.weight);
        duration = duration.saturating_add(leg.duration);
        legs.push(leg);
    }

    Some(Trip {
        order,
        legs,
        weight,
        duration,
    })
}

/// Repeatedly insert the location farthest from the tour at the position
/// that lengthens the tour least.
fn farthest_insertion(n: usize, at: &dyn Fn(usize, usize) -> Weight) -> Vec<usize> {
    // Seed with the most distant pair
    let (mut a, mut b, mut best) = (0, 1, -1i64);
    for i in 0..n {
        for j in 0..n {
            if i != j {
                let d = at(i, j) as i64 + at(j, i) as i64;
                if d > best {
                    best = d;
                    a = i;
                    b = j;
                }
            }
        }
    }
    let mut tour = vec![a, b];
    let mut remaining: Vec<usize> = (0..n).filter(|&i| i != a && i != b).collect();

    while !remaining.is_empty() {
        // Farthest from the tour: maximize the minimum round distance
        let (pos, _) = remaining
            .iter()
            .enumerate()
            .map(|(pos, &cand)| {
                let d = tour
                    .iter()
                    .map(|&t| at(t, cand) as i64 + at(cand, t) as i64)
                    .min()
                    .unwrap_or(0);
                (pos, d)
            })
            .max_by_key(|&(_, d)| d)
            .unwrap_or((0, 0));
        let cand = remaining.swap_remove(pos);

        // Cheapest insertion point
        let m = tour.len();
        let (insert_at, _) = (0..m)
            .map(|i| {
                let from = tour[i];
                let to = tour[(i + 1) % m];
                let increase =
                    at(from, cand) as i64 + at(cand, to) as i64 - at(from, to) as i64;
                (i + 1, increase)
            })
            .min_by_key(|&(_, inc)| inc)
            .unwrap_or((1, 0));
        tour.insert(insert_at, cand);
    }
    tour
}

fn nearest_neighbour(n: usize, at: &dyn Fn(usize, usize) -> Weight) -> Vec<usize> {
    let mut tour = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    let mut current = 0usize;
    visited[0] = true;
    tour.push(0);
    for _ in 1..n {
        let next = (0..n)
            .filter(|&j| !visited[j])
            .min_by_key(|&j| (at(current, j), j));
        let Some(next) = next else { break };
        visited[next] = true;
        tour.push(next);
        current = next;
    }
    tour
}

fn rotate_to_start(order: &mut [usize], start: usize) {
    if let Some(pos) = order.iter().position(|&i| i == start) {
        order.rotate_left(pos);
    }
}
