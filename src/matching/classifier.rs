//! Two-class Bayes classifier scoring sub-matching quality
//!
//! Pretrained on manually labelled traces: the positive (good-match) class
//! and the negative class are both Laplace-distributed over the normalized
//! mean detour discrepancy of a sub-matching.

#[derive(Debug, Clone, Copy)]
pub struct LaplaceDistribution {
    pub location: f64,
    pub scale: f64,
}

impl LaplaceDistribution {
    pub fn density(&self, value: f64) -> f64 {
        let x = (value - self.location).abs();
        1.0 / (2.0 * self.scale) * (-x / self.scale).exp()
    }
}

/// Binary classifier returning the posterior of the winning class.
#[derive(Debug, Clone, Copy)]
pub struct BayesClassifier {
    positive: LaplaceDistribution,
    negative: LaplaceDistribution,
    positive_prior: f64,
}

impl BayesClassifier {
    pub fn new(
        positive: LaplaceDistribution,
        negative: LaplaceDistribution,
        positive_prior: f64,
    ) -> Self {
        Self {
            positive,
            negative,
            positive_prior,
        }
    }

    /// Fitted constants for the matching confidence feature.
    pub fn matching_confidence() -> Self {
        Self::new(
            LaplaceDistribution {
                location: 0.005986,
                scale: 0.016646,
            },
            LaplaceDistribution {
                location: 0.054385,
                scale: 0.458432,
            },
            0.696774,
        )
    }

    /// (is_positive, posterior probability of the winning class).
    pub fn classify(&self, value: f64) -> (bool, f64) {
        let positive_posterior = self.positive_prior * self.positive.density(value);
        let negative_posterior = (1.0 - self.positive_prior) * self.negative.density(value);
        let norm = positive_posterior + negative_posterior;
        if norm <= 0.0 {
            return (false, 0.0);
        }
        if positive_posterior > negative_posterior {
            (true, positive_posterior / norm)
        } else {
            (false, negative_posterior / norm)
        }
    }

    /// Probability that the value belongs to the positive class.
    pub fn positive_probability(&self, value: f64) -> f64 {
        let (positive, p) = self.classify(value);
        if positive {
            p
        } else {
            1.0 - p
        }
    }
}
