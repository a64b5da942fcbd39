//! Hidden Markov lattice for map matching
//!
//! Holds per-(trace point, candidate) Viterbi log-probabilities, parents,
//! accumulated path distances and pruning flags. Lives for one matching call.

pub const IMPOSSIBLE_LOG_PROB: f64 = f64::NEG_INFINITY;
pub const MINIMAL_LOG_PROB: f64 = f64::MIN;
pub const INVALID_STATE: usize = usize::MAX;

const LOG_2_PI: f64 = 1.837_877_066_409_345_4;

/// Log-normal GPS noise model.
#[derive(Debug, Clone, Copy)]
pub struct EmissionLogProbability {
    sigma: f64,
    log_sigma: f64,
}

impl EmissionLogProbability {
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            log_sigma: sigma.ln(),
        }
    }

    pub fn evaluate(&self, distance: f64) -> f64 {
        -0.5 * (LOG_2_PI + (distance / self.sigma) * (distance / self.sigma)) - self.log_sigma
    }
}

/// Exponential model over the detour discrepancy.
#[derive(Debug, Clone, Copy)]
pub struct TransitionLogProbability {
    beta: f64,
    log_beta: f64,
}

impl TransitionLogProbability {
    pub fn new(beta: f64) -> Self {
        Self {
            beta,
            log_beta: beta.ln(),
        }
    }

    pub fn evaluate(&self, d_t: f64) -> f64 {
        -self.log_beta - d_t / self.beta
    }
}

/// The T-column lattice.
pub struct HiddenMarkovModel {
    pub viterbi: Vec<Vec<f64>>,
    /// (trace index, candidate index) of the best predecessor; a cell whose
    /// parent is itself is a column seed.
    pub parents: Vec<Vec<(usize, usize)>>,
    /// Network distance of the chosen transition into the cell, meters.
    pub path_distances: Vec<Vec<f64>>,
    /// Detour discrepancy of the chosen transition, meters.
    pub deltas: Vec<Vec<f64>>,
    pub pruned: Vec<Vec<bool>>,
    pub suspicious: Vec<Vec<bool>>,
    /// True while no viable candidate exists in the column.
    pub breakage: Vec<bool>,
}

impl HiddenMarkovModel {
    pub fn new(candidate_counts: &[usize]) -> Self {
        let n = candidate_counts.len();
        let mut model = Self {
            viterbi: Vec::with_capacity(n),
            parents: Vec::with_capacity(n),
            path_distances: Vec::with_capacity(n),
            deltas: Vec::with_capacity(n),
            pruned: Vec::with_capacity(n),
            suspicious: Vec::with_capacity(n),
            breakage: vec![true; n],
        };
        for &c in candidate_counts {
            model.viterbi.push(vec![IMPOSSIBLE_LOG_PROB; c]);
            model.parents.push(vec![(0, 0); c]);
            model.path_distances.push(vec![0.0; c]);
            model.deltas.push(vec![0.0; c]);
            model.pruned.push(vec![true; c]);
            model.suspicious.push(vec![false; c]);
        }
        model
    }

    /// Reset every column from `from` on.
    pub fn clear(&mut self, from: usize) {
        for t in from..self.viterbi.len() {
            self.viterbi[t].fill(IMPOSSIBLE_LOG_PROB);
            self.parents[t].fill((0, 0));
            self.path_distances[t].fill(0.0);
            self.deltas[t].fill(0.0);
            self.pruned[t].fill(true);
            self.suspicious[t].fill(false);
            self.breakage[t] = true;
        }
    }

    /// Seed the first viable column at or after `start` with pure emission
    /// probabilities. Returns its index, or `INVALID_STATE` when every
    /// remaining column is empty.
    pub fn initialize(&mut self, start: usize, emissions: &[Vec<f64>]) -> usize {
        let n = self.viterbi.len();
        let mut t = start;
        while t < n {
            for s in 0..self.viterbi[t].len() {
                self.viterbi[t][s] = emissions[t][s];
                self.parents[t][s] = (t, s);
                self.pruned[t][s] = self.viterbi[t][s] < MINIMAL_LOG_PROB;
                if !self.pruned[t][s] {
                    self.breakage[t] = false;
                }
            }
            if !self.breakage[t] {
                return t;
            }
            t += 1;
        }
        INVALID_STATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emission_prefers_close_candidates() {
        let e = EmissionLogProbability::new(5.0);
        assert!(e.evaluate(1.0) > e.evaluate(10.0));
        // log p = -0.5 ln(2 pi) - ln sigma - (d / sigma)^2 / 2
        let expected = -0.5 * LOG_2_PI - 5.0_f64.ln() - 0.5;
        assert!((e.evaluate(5.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn transition_penalizes_detour_discrepancy() {
        let t = TransitionLogProbability::new(5.0);
        assert!((t.evaluate(0.0) + 5.0_f64.ln()).abs() < 1e-12);
        assert!(t.evaluate(0.0) > t.evaluate(50.0));
    }

    #[test]
    fn initialize_skips_empty_columns() {
        let mut model = HiddenMarkovModel::new(&[0, 0, 2]);
        let emissions = vec![vec![], vec![], vec![-0.5, -1.0]];
        let start = model.initialize(0, &emissions);
        assert_eq!(start, 2);
        assert!(!model.breakage[2]);
        assert_eq!(model.parents[2][0], (2, 0));
    }

    #[test]
    fn initialize_reports_dead_lattice() {
        let mut model = HiddenMarkovModel::new(&[0, 0]);
        let emissions = vec![vec![], vec![]];
        assert_eq!(model.initialize(0, &emissions), INVALID_STATE);
    }
}
