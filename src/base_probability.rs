//! Nucleotide probability distributions derived from Phred-type scores, and
//! their combination with Bayes' theorem.
//!
//! A call `b` with score `s` has error probability `e = 10^(s / -10)`. Its
//! distribution puts `1 - e` on `b` and `e / 3` on each other base. Two calls
//! for the same column are combined by treating the first distribution as the
//! prior and the second as the likelihood:
//!
//! ```text
//! P(x | calls) = L(x) * prior(x) / sum_y L(y) * prior(y)
//! ```

/// Order in which bases are examined; the first of equally probable bases wins.
pub const BASES: [u8; 4] = [b'A', b'T', b'G', b'C'];

/// Added to computed scores so that a value that should equal a threshold
/// exactly is not pushed just below it by rounding.
pub const SCORE_EPSILON: f64 = 0.000001;

#[inline(always)]
pub fn phred_to_error_probability(score: f64) -> f64 {
    10.0_f64.powf(score / -10.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseDistribution([f64; 4]);

impl BaseDistribution {
    /// Returns None for anything other than A, T, G or C.
    pub fn from_call(base: u8, score: f64) -> Option<Self> {
        let called = Self::base_index(base)?;
        let error = phred_to_error_probability(score);
        let mut probs = [error / 3.0; 4];
        probs[called] = 1.0 - error;
        Some(Self(probs))
    }

    #[inline(always)]
    fn base_index(base: u8) -> Option<usize> {
        BASES.iter().position(|&b| b == base.to_ascii_uppercase())
    }

    #[inline(always)]
    pub fn probability(&self, base: u8) -> f64 {
        Self::base_index(base).map_or(0.0, |i| self.0[i])
    }

    pub fn posterior(prior: &Self, likelihood: &Self) -> Self {
        let mut probs = [0.0; 4];
        for (i, p) in probs.iter_mut().enumerate() {
            *p = likelihood.0[i] * prior.0[i];
        }
        let denom: f64 = probs.iter().sum();
        probs.iter_mut().for_each(|p| *p /= denom);
        Self(probs)
    }

    /// Most probable base and its Phred-type quality score.
    pub fn most_probable(&self) -> (u8, f64) {
        let mut best = 0;
        for i in 1..BASES.len() {
            if self.0[i] > self.0[best] {
                best = i;
            }
        }
        let p = self.0[best];
        let score = if p > 0.0 {
            -10.0 * (1.0 - p).log10()
        } else {
            0.0
        };
        (BASES[best], score + SCORE_EPSILON)
    }
}

/// Combines two usable calls for one column into a consensus call and score.
pub fn combine_calls(base1: u8, score1: f64, base2: u8, score2: f64) -> Option<(u8, f64)> {
    let prior = BaseDistribution::from_call(base1, score1)?;
    let likelihood = BaseDistribution::from_call(base2, score2)?;
    Some(BaseDistribution::posterior(&prior, &likelihood).most_probable())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_call() {
        let dist = BaseDistribution::from_call(b'G', 20.0).unwrap();
        assert!((dist.probability(b'G') - 0.99).abs() < 1e-12);
        assert!((dist.probability(b'A') - 0.01 / 3.0).abs() < 1e-12);
        assert!(BaseDistribution::from_call(b'N', 20.0).is_none());
    }

    #[test]
    fn test_epsilon_keeps_exact_threshold() {
        let dist = BaseDistribution::from_call(b'A', 30.0).unwrap();
        let (base, score) = dist.most_probable();
        assert_eq!(base, b'A');
        assert!(score >= 30.0);
        assert!(score < 30.001);
    }

    #[test]
    fn test_concordant_calls_reinforce() {
        for s in [10.0, 20.0, 30.0, 45.0] {
            let (base, score) = combine_calls(b'C', s, b'C', s).unwrap();
            assert_eq!(base, b'C');
            assert!(score > s, "{score} should exceed {s}");
        }
    }

    #[test]
    fn test_discordant_calls() {
        let (base, score) = combine_calls(b'A', 40.0, b'C', 20.0).unwrap();
        assert_eq!(base, b'A');
        assert!(score > 19.5 && score < 20.5, "score was {score}");
    }

    #[test]
    fn test_tie_prefers_a_then_t_then_g() {
        let (base, _) = combine_calls(b'A', 20.0, b'T', 20.0).unwrap();
        assert_eq!(base, b'A');
        let (base, _) = combine_calls(b'C', 20.0, b'T', 20.0).unwrap();
        assert_eq!(base, b'T');
        let (base, _) = combine_calls(b'C', 20.0, b'G', 20.0).unwrap();
        assert_eq!(base, b'G');
    }
}
