//! Intersection analysis
//!
//! For one intersection, enumerate every (in-edge, out-edge) pair with its
//! turn angle, direction bucket, intersection kind, validity and profile
//! penalty. Turn angles follow the convention 0 = U-turn, 180 = straight,
//! angles above 180 bend right.

use crate::nbg::{DirectedSegment, NodeBasedGraph};
use crate::profile::{
    DirectionBucket, IntersectionKind, Profile, TurnContext, TurnCost,
};
use crate::restrictions::RestrictionIndex;
use crate::{NodeId, INVALID_NAME};

/// Angular deviation from straight below which branches count as forks.
const NARROW_TURN_ANGLE: f64 = 35.0;
/// Deviation beyond which a turn is bucketed as a U-turn.
const UTURN_ANGLE: f64 = 170.0;

/// One analysed turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub from: DirectedSegment,
    pub to: DirectedSegment,
    pub via: NodeId,
    /// Degrees, 0 = U-turn, 180 = straight, > 180 bends right.
    pub angle: f64,
    pub bucket: DirectionBucket,
    pub kind: IntersectionKind,
    pub cost: TurnCost,
    pub valid: bool,
}

/// Classify a turn angle into its coarse direction bucket.
pub fn direction_bucket(angle: f64, is_uturn: bool) -> DirectionBucket {
    let deviation = angle - 180.0;
    let abs = deviation.abs();
    if is_uturn || abs > UTURN_ANGLE {
        DirectionBucket::UTurn
    } else if abs <= 25.0 {
        DirectionBucket::Straight
    } else if abs <= 60.0 {
        if deviation > 0.0 {
            DirectionBucket::SlightRight
        } else {
            DirectionBucket::SlightLeft
        }
    } else if abs <= 140.0 {
        if deviation > 0.0 {
            DirectionBucket::Right
        } else {
            DirectionBucket::Left
        }
    } else if deviation > 0.0 {
        DirectionBucket::SharpRight
    } else {
        DirectionBucket::SharpLeft
    }
}

/// Turn angle between an arriving and a departing edge.
pub fn turn_angle(entry_bearing: f64, exit_bearing: f64) -> f64 {
    (exit_bearing - entry_bearing + 540.0) % 360.0
}

pub struct IntersectionAnalysis<'a> {
    graph: &'a NodeBasedGraph,
    restrictions: &'a RestrictionIndex,
    profile: &'a dyn Profile,
    hop_limit: u32,
}

impl<'a> IntersectionAnalysis<'a> {
    pub fn new(
        graph: &'a NodeBasedGraph,
        restrictions: &'a RestrictionIndex,
        profile: &'a dyn Profile,
    ) -> Self {
        let hop_limit = profile.properties().continuation_hop_limit;
        Self {
            graph,
            restrictions,
            profile,
            hop_limit,
        }
    }

    /// Analyse every turn pair at `via`. Incoming and outgoing edges are
    /// visited in bearing order, so the output order is deterministic.
    pub fn analyze(&self, via: NodeId) -> Vec<Turn> {
        let graph = self.graph;
        if graph.removed[via as usize] {
            return Vec::new();
        }

        let mut incoming: Vec<(DirectedSegment, f64)> = graph
            .incoming_edges(via)
            .map(|ds| (ds, graph.entry_bearing(ds)))
            .collect();
        let mut outgoing: Vec<(DirectedSegment, f64)> = graph
            .adjacent_edges(via)
            .map(|ds| (ds, graph.exit_bearing(ds)))
            .collect();
        incoming.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.segment.cmp(&b.0.segment)));
        outgoing.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.segment.cmp(&b.0.segment)));

        if incoming.is_empty() || outgoing.is_empty() {
            return Vec::new();
        }

        let barrier_blocked =
            self.restrictions.is_barrier(via) && !self.restrictions.can_traverse_through(via);
        let has_signal = graph.traffic_signal[via as usize];

        let mut turns = Vec::with_capacity(incoming.len() * outgoing.len());
        for &(from, entry) in &incoming {
            let base_valid = |to: DirectedSegment| -> bool {
                let from_seg = &graph.segments[from.segment as usize];
                let to_seg = &graph.segments[to.segment as usize];
                if from_seg.mode != to_seg.mode {
                    return false;
                }
                if barrier_blocked {
                    return false;
                }
                !self
                    .restrictions
                    .forbids_turn(from, via, graph.get_target(to))
            };

            // Admissible non-U-turn continuations decide dead ends and
            // obviousness before costs are assigned.
            let continuations: Vec<DirectedSegment> = outgoing
                .iter()
                .map(|&(to, _)| to)
                .filter(|&to| to != from.reversed() && base_valid(to))
                .collect();
            let is_dead_end = continuations.is_empty();

            for &(to, exit) in &outgoing {
                let is_uturn = to == from.reversed();
                let angle = turn_angle(entry, exit);
                let bucket = direction_bucket(angle, is_uturn);
                let kind = self.intersection_kind(from, to, &incoming, &outgoing);

                let mut valid = base_valid(to);
                if is_uturn {
                    // U-turns only where the road ends
                    valid = valid && is_dead_end;
                }

                let is_obvious = !is_uturn
                    && valid
                    && self.is_obvious_continuation(from, to, &continuations);

                let cost = if valid {
                    self.profile.turn_cost(&TurnContext {
                        angle,
                        bucket,
                        kind,
                        is_uturn,
                        is_dead_end,
                        is_obvious_continuation: is_obvious,
                        has_traffic_signal: has_signal,
                    })
                } else {
                    TurnCost::ZERO
                };

                turns.push(Turn {
                    from,
                    to,
                    via,
                    angle,
                    bucket,
                    kind,
                    cost,
                    valid,
                });
            }
        }
        turns
    }

    fn intersection_kind(
        &self,
        from: DirectedSegment,
        to: DirectedSegment,
        incoming: &[(DirectedSegment, f64)],
        outgoing: &[(DirectedSegment, f64)],
    ) -> IntersectionKind {
        let graph = self.graph;
        if graph.segments[from.segment as usize].roundabout
            || graph.segments[to.segment as usize].roundabout
        {
            return IntersectionKind::Roundabout;
        }

        let entry = graph.entry_bearing(from);
        // Fork: at least two departing branches close to straight ahead
        let near_straight_out = outgoing
            .iter()
            .filter(|&&(o, exit)| {
                o != from.reversed()
                    && (turn_angle(entry, exit) - 180.0).abs() < NARROW_TURN_ANGLE
            })
            .count();
        if near_straight_out >= 2 {
            return IntersectionKind::Fork;
        }

        // Merge: at least two arrivals feed the out edge near straight
        let exit = graph.exit_bearing(to);
        let near_straight_in = incoming
            .iter()
            .filter(|&&(i, entry_b)| {
                i != to.reversed()
                    && (turn_angle(entry_b, exit) - 180.0).abs() < NARROW_TURN_ANGLE
            })
            .count();
        if near_straight_in >= 2 {
            return IntersectionKind::Merge;
        }

        IntersectionKind::Simple
    }

    /// A turn is an obvious continuation when it is the only way on, or when
    /// it is the unique near-straight branch carrying the same road.
    fn is_obvious_continuation(
        &self,
        from: DirectedSegment,
        to: DirectedSegment,
        continuations: &[DirectedSegment],
    ) -> bool {
        if continuations.len() == 1 {
            return continuations[0] == to;
        }

        let graph = self.graph;
        let entry = graph.entry_bearing(from);
        let deviation =
            |ds: DirectedSegment| (turn_angle(entry, graph.exit_bearing(ds)) - 180.0).abs();

        if deviation(to) >= NARROW_TURN_ANGLE {
            return false;
        }
        // Unique near-straight branch
        if continuations
            .iter()
            .any(|&c| c != to && deviation(c) < NARROW_TURN_ANGLE)
        {
            return false;
        }

        let from_name = graph.segments[from.segment as usize].name;
        let to_name = self.effective_name(to);
        let same_road = from_name != INVALID_NAME && from_name == to_name;
        let same_class = graph.segments[from.segment as usize].class
            == graph.segments[to.segment as usize].class;
        same_road || same_class
    }

    /// Name of the road `ds` leads onto, skipping through unnamed degree-2
    /// virtual intersections (signal splits) up to the hop limit. The walk
    /// stops at the first true branch.
    fn effective_name(&self, ds: DirectedSegment) -> crate::NameId {
        let graph = self.graph;
        let mut current = ds;
        for _ in 0..=self.hop_limit {
            let name = graph.segments[current.segment as usize].name;
            if name != INVALID_NAME {
                return name;
            }
            let next_node = graph.get_target(current);
            let mut onward = graph
                .adjacent_edges(next_node)
                .filter(|&o| o != current.reversed());
            let (Some(next), None) = (onward.next(), onward.next()) else {
                break; // true branch or dead end
            };
            current = next;
        }
        INVALID_NAME
    }
}
