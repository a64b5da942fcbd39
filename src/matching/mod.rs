//! Map matching
//!
//! Fits a GPS trace to the network with a hidden Markov model: candidates
//! from the spatial index emit with Gaussian noise, transitions weigh the gap
//! between network distance and straight-line distance, and Viterbi decoding
//! picks the best candidate chain. Unmatchable stretches split the trace into
//! sub-matchings instead of failing it.

pub mod classifier;
pub mod hmm;

use tracing::debug;

use crate::coord::{haversine_m, Coordinate};
use crate::query::{QueryScratch, RoutingEngine};
use crate::spatial::{PhantomCandidate, PhantomNode, SpatialIndex};

use classifier::BayesClassifier;
use hmm::{
    EmissionLogProbability, HiddenMarkovModel, TransitionLogProbability, INVALID_STATE,
};

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// GPS noise standard deviation in meters.
    pub gps_sigma_m: f64,
    /// Transition scale in meters.
    pub transition_beta_m: f64,
    pub max_candidates: usize,
    /// Consecutive broken columns tolerated before a forced split.
    pub max_broken_states: usize,
    pub max_speed_mps: f64,
    /// Detour discrepancy flagging a transition as suspicious.
    pub suspicious_delta_m: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            gps_sigma_m: 5.0,
            transition_beta_m: 5.0,
            max_candidates: 10,
            max_broken_states: 10,
            max_speed_mps: 180.0 / 3.6,
            suspicious_delta_m: 100.0,
        }
    }
}

/// A contiguous run of trace points matched to the network.
#[derive(Debug)]
pub struct SubMatching {
    pub phantoms: Vec<PhantomNode>,
    /// Consumed trace indices, ascending.
    pub indices: Vec<usize>,
    /// Matched network length in meters.
    pub length_m: f64,
    pub confidence: f64,
}

pub struct Matcher<'a> {
    engine: &'a RoutingEngine<'a>,
    spatial: &'a SpatialIndex,
    config: MatchConfig,
}

impl<'a> Matcher<'a> {
    pub fn new(
        engine: &'a RoutingEngine<'a>,
        spatial: &'a SpatialIndex,
        config: MatchConfig,
    ) -> Self {
        Self {
            engine,
            spatial,
            config,
        }
    }

    /// Match a trace. An empty result means nothing could be placed.
    pub fn match_trace(
        &self,
        coords: &[Coordinate],
        timestamps: Option<&[u32]>,
        scratch: &mut QueryScratch,
    ) -> Vec<SubMatching> {
        let n = coords.len();
        if n < 2 {
            return Vec::new();
        }

        let candidates = self.candidates(coords);
        let emission = EmissionLogProbability::new(self.config.gps_sigma_m);
        let transition = TransitionLogProbability::new(self.config.transition_beta_m);
        let emissions: Vec<Vec<f64>> = candidates
            .iter()
            .map(|cands| cands.iter().map(|c| emission.evaluate(c.distance_m)).collect())
            .collect();

        let counts: Vec<usize> = candidates.iter().map(Vec::len).collect();
        let mut model = HiddenMarkovModel::new(&counts);

        let initial = model.initialize(0, &emissions);
        if initial == INVALID_STATE {
            return Vec::new();
        }

        let use_timestamps = timestamps.is_some_and(|ts| ts.len() == n);
        let median_interval = if use_timestamps {
            median_sample_interval(timestamps.unwrap_or(&[])).max(1)
        } else {
            1
        };
        let max_broken_time = median_interval as usize * self.config.max_broken_states;
        let max_delta = if use_timestamps {
            median_interval as f64 * self.config.max_speed_mps
        } else {
            f64::INFINITY
        };

        let mut split_points: Vec<usize> = Vec::new();
        let mut prev_unbroken: Vec<usize> = vec![initial];

        let mut t = initial + 1;
        while t < n {
            // Temporal force-split: too much time since the last placed point
            let trace_split = match prev_unbroken.last() {
                None => true,
                Some(&back) => {
                    if use_timestamps {
                        let ts = timestamps.unwrap_or(&[]);
                        (ts[t].saturating_sub(ts[back])) as usize > max_broken_time
                    } else {
                        t - back > self.config.max_broken_states
                    }
                }
            };

            if trace_split {
                if let Some(next) = self.restart(
                    &mut model,
                    &emissions,
                    &mut split_points,
                    &mut prev_unbroken,
                    t,
                ) {
                    t = next;
                    continue;
                }
                break;
            }

            let prev_t = *prev_unbroken.last().expect("checked non-empty");
            let gc_distance = haversine_m(coords[prev_t], coords[t]);

            for s in 0..candidates[prev_t].len() {
                if model.pruned[prev_t][s] {
                    continue;
                }
                for s_prime in 0..candidates[t].len() {
                    let mut new_value = model.viterbi[prev_t][s] + emissions[t][s_prime];
                    if model.viterbi[t][s_prime] > new_value {
                        continue;
                    }

                    let Some(network_distance) = self.network_distance(
                        &candidates[prev_t][s].phantom,
                        &candidates[t][s_prime].phantom,
                        scratch,
                    ) else {
                        continue;
                    };
                    let d_t = (network_distance - gc_distance).abs();
                    if d_t >= max_delta {
                        continue;
                    }
                    new_value += transition.evaluate(d_t);

                    if new_value > model.viterbi[t][s_prime] {
                        model.viterbi[t][s_prime] = new_value;
                        model.parents[t][s_prime] = (prev_t, s);
                        model.path_distances[t][s_prime] = network_distance;
                        model.deltas[t][s_prime] = d_t;
                        model.pruned[t][s_prime] = false;
                        model.suspicious[t][s_prime] = d_t > self.config.suspicious_delta_m;
                        model.breakage[t] = false;
                    }
                }
            }

            if model.breakage[t] {
                // No viable cell in the column: declare a break, emit the
                // prefix later, and restart where candidates pick up again.
                if let Some(next) = self.restart(
                    &mut model,
                    &emissions,
                    &mut split_points,
                    &mut prev_unbroken,
                    t,
                ) {
                    t = next;
                    continue;
                }
                break;
            }
            prev_unbroken.push(t);
            t += 1;
        }

        if let Some(&last) = prev_unbroken.last() {
            split_points.push(last + 1);
        }

        let matchings = self.extract(&model, &candidates, coords, initial, &split_points);
        debug!(
            trace = n,
            sub_matchings = matchings.len(),
            "map matching finished"
        );
        matchings
    }

    /// Split at `at`, reseed the lattice there and hand back the next column
    /// to process. `None` ends the matching (no viable column remains).
    fn restart(
        &self,
        model: &mut HiddenMarkovModel,
        emissions: &[Vec<f64>],
        split_points: &mut Vec<usize>,
        prev_unbroken: &mut Vec<usize>,
        at: usize,
    ) -> Option<usize> {
        split_points.push(at);
        model.clear(at);
        let new_start = model.initialize(at, emissions);
        if new_start == INVALID_STATE {
            prev_unbroken.clear();
            return None;
        }
        *prev_unbroken = vec![new_start];
        Some(new_start + 1)
    }

    fn candidates(&self, coords: &[Coordinate]) -> Vec<Vec<PhantomCandidate>> {
        let radius = 3.0 * self.config.gps_sigma_m;
        coords
            .iter()
            .map(|&c| {
                let mut found = self.spatial.within_radius(
                    c,
                    radius,
                    self.engine.geometry,
                    self.engine.nodes,
                );
                found.truncate(self.config.max_candidates);
                found
            })
            .collect()
    }

    fn network_distance(
        &self,
        from: &PhantomNode,
        to: &PhantomNode,
        scratch: &mut QueryScratch,
    ) -> Option<f64> {
        self.engine.route(from, to, scratch).map(|r| r.distance_m)
    }

    fn extract(
        &self,
        model: &HiddenMarkovModel,
        candidates: &[Vec<PhantomCandidate>],
        coords: &[Coordinate],
        initial: usize,
        split_points: &[usize],
    ) -> Vec<SubMatching> {
        let classifier = BayesClassifier::matching_confidence();
        let mut result = Vec::new();
        let mut sub_begin = initial;

        for &split_end in split_points {
            let mut parent_t = split_end.saturating_sub(1);
            while parent_t > sub_begin && model.breakage[parent_t] {
                parent_t -= 1;
            }
            while sub_begin < split_end && model.breakage[sub_begin] {
                sub_begin += 1;
            }
            if parent_t < sub_begin + 1 || model.breakage[parent_t] {
                sub_begin = split_end;
                continue;
            }

            let Some(best_candidate) = model.viterbi[parent_t]
                .iter()
                .enumerate()
                .filter(|(s, _)| !model.pruned[parent_t][*s])
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(s, _)| s)
            else {
                sub_begin = split_end;
                continue;
            };

            // Backtrack to the column seed (its parent is itself)
            let mut chain: Vec<(usize, usize)> = Vec::new();
            let (mut ct, mut cs) = (parent_t, best_candidate);
            loop {
                chain.push((ct, cs));
                let (pt, ps) = model.parents[ct][cs];
                if (pt, ps) == (ct, cs) {
                    break;
                }
                ct = pt;
                cs = ps;
            }
            chain.reverse();
            sub_begin = split_end;
            if chain.len() < 2 {
                continue;
            }

            let phantoms: Vec<PhantomNode> = chain
                .iter()
                .map(|&(t, s)| candidates[t][s].phantom.clone())
                .collect();
            let indices: Vec<usize> = chain.iter().map(|&(t, _)| t).collect();
            let length_m: f64 = chain[1..]
                .iter()
                .map(|&(t, s)| model.path_distances[t][s])
                .sum();

            let steps = (chain.len() - 1) as f64;
            let mean_delta: f64 = chain[1..]
                .iter()
                .map(|&(t, s)| model.deltas[t][s])
                .sum::<f64>()
                / steps;
            let mean_step: f64 = indices
                .windows(2)
                .map(|w| haversine_m(coords[w[0]], coords[w[1]]))
                .sum::<f64>()
                / steps;
            let feature = if mean_step > 0.0 {
                mean_delta / mean_step
            } else {
                mean_delta
            };
            let confidence = classifier.positive_probability(feature);

            result.push(SubMatching {
                phantoms,
                indices,
                length_m,
                confidence,
            });
        }

        result
    }
}

/// Median of adjacent timestamp differences.
fn median_sample_interval(timestamps: &[u32]) -> u32 {
    if timestamps.len() < 2 {
        return 1;
    }
    let mut diffs: Vec<u32> = timestamps
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]))
        .collect();
    diffs.sort_unstable();
    diffs[diffs.len() / 2]
}
