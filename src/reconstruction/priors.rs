/// Prior belief over where the MRCA rank falls, used by the estimators.
///
/// Intervals are half-open rank ranges `[begin, end)`.
pub trait Prior: Send + Sync {
    /// Unnormalized weight proportional to the prior probability that the
    /// MRCA lies in `[begin, end)`.
    fn calc_interval_probability_proxy(&self, begin: u64, end: u64) -> f64;

    /// Natural log of [`Prior::calc_interval_probability_proxy`], finite for
    /// deep ranks where the proxy itself would overflow.
    fn calc_interval_log_probability_proxy(&self, begin: u64, end: u64) -> f64 {
        self.calc_interval_probability_proxy(begin, end).ln()
    }

    /// Expected MRCA rank conditioned on it lying in `[begin, end)`.
    fn calc_interval_conditioned_mean(&self, begin: u64, end: u64) -> f64;
}

fn midpoint(begin: u64, end: u64) -> f64 {
    (begin as f64 + end as f64 - 1.0) / 2.0
}

/// `ln(1 - e^-x)` for `x > 0`.
fn ln_one_minus_exp_neg(x: f64) -> f64 {
    (-(-x).exp_m1()).ln()
}

/// Non-informative prior: every interval weighs the same.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArbitraryPrior;

impl Prior for ArbitraryPrior {
    fn calc_interval_probability_proxy(&self, _begin: u64, _end: u64) -> f64 {
        1.0
    }

    fn calc_interval_conditioned_mean(&self, begin: u64, end: u64) -> f64 {
        midpoint(begin, end)
    }
}

/// Every rank equally likely, so intervals weigh by their width.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UniformPrior;

impl Prior for UniformPrior {
    fn calc_interval_probability_proxy(&self, begin: u64, end: u64) -> f64 {
        (end - begin) as f64
    }

    fn calc_interval_conditioned_mean(&self, begin: u64, end: u64) -> f64 {
        midpoint(begin, end)
    }
}

/// Continuous density proportional to `growth_factor^rank`.
///
/// A growth factor above one favours recent ranks, as in a growing
/// population; one degenerates to [`UniformPrior`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialPrior {
    growth_factor: f64,
}

impl ExponentialPrior {
    pub fn new(growth_factor: f64) -> Self {
        assert!(
            growth_factor.is_finite() && growth_factor > 0.0,
            "growth_factor must be positive, got {growth_factor}"
        );
        Self { growth_factor }
    }

    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    fn rate(&self) -> Option<f64> {
        let rate = self.growth_factor.ln();
        (rate.abs() > f64::EPSILON).then_some(rate)
    }
}

impl Prior for ExponentialPrior {
    fn calc_interval_probability_proxy(&self, begin: u64, end: u64) -> f64 {
        self.calc_interval_log_probability_proxy(begin, end).exp()
    }

    fn calc_interval_log_probability_proxy(&self, begin: u64, end: u64) -> f64 {
        let Some(rate) = self.rate() else {
            return ((end - begin) as f64).ln();
        };
        // factor out the density at the heavier end of the interval
        let anchor = if rate > 0.0 { end } else { begin };
        let decay = rate.abs();
        anchor as f64 * rate + ln_one_minus_exp_neg(decay * (end - begin) as f64) - decay.ln()
    }

    fn calc_interval_conditioned_mean(&self, begin: u64, end: u64) -> f64 {
        let Some(rate) = self.rate() else {
            return midpoint(begin, end);
        };
        let (b, len) = (begin as f64, (end - begin) as f64);
        // mean of a truncated exponential on [b, b + len), shifted onto ranks
        let mean = b + len / -(-rate * len).exp_m1() - rate.recip() - 0.5;
        mean.clamp(b, end as f64 - 1.0)
    }
}

/// Discrete weights proportional to `growth_factor^rank`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricPrior {
    growth_factor: f64,
}

impl GeometricPrior {
    pub fn new(growth_factor: f64) -> Self {
        assert!(
            growth_factor.is_finite() && growth_factor > 0.0,
            "growth_factor must be positive, got {growth_factor}"
        );
        Self { growth_factor }
    }

    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }
}

/// Mean offset of `j` in `0..len` under weights `q^j`, for `q < 1`.
fn geometric_offset_mean(q: f64, len: u64) -> f64 {
    let len_f = len as f64;
    let q_len = q.powf(len_f);
    q / (1.0 - q) - len_f * q_len / (1.0 - q_len)
}

impl Prior for GeometricPrior {
    fn calc_interval_probability_proxy(&self, begin: u64, end: u64) -> f64 {
        self.calc_interval_log_probability_proxy(begin, end).exp()
    }

    fn calc_interval_log_probability_proxy(&self, begin: u64, end: u64) -> f64 {
        let g = self.growth_factor;
        if g == 1.0 {
            return ((end - begin) as f64).ln();
        }
        let rate = g.ln();
        let anchor = if rate > 0.0 { end - 1 } else { begin };
        let decay = rate.abs();
        anchor as f64 * rate + ln_one_minus_exp_neg(decay * (end - begin) as f64)
            - ln_one_minus_exp_neg(decay)
    }

    fn calc_interval_conditioned_mean(&self, begin: u64, end: u64) -> f64 {
        let g = self.growth_factor;
        let len = end - begin;
        if g == 1.0 || len <= 1 {
            return midpoint(begin, end);
        }
        let (b, last) = (begin as f64, end as f64 - 1.0);
        let mean = if g < 1.0 {
            b + geometric_offset_mean(g, len)
        } else {
            last - geometric_offset_mean(g.recip(), len)
        };
        mean.clamp(b, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn arbitrary_prior() {
        let p = ArbitraryPrior;
        assert_eq!(p.calc_interval_probability_proxy(0, 100), 1.0);
        assert_eq!(p.calc_interval_probability_proxy(50, 51), 1.0);
        assert!((p.calc_interval_conditioned_mean(0, 10) - 4.5).abs() < EPS);
        assert!((p.calc_interval_conditioned_mean(5, 6) - 5.0).abs() < EPS);
    }

    #[test]
    fn uniform_prior_proxy_is_width() {
        let p = UniformPrior;
        assert_eq!(p.calc_interval_probability_proxy(0, 10), 10.0);
        assert_eq!(p.calc_interval_probability_proxy(3, 7), 4.0);
    }

    #[test]
    fn unit_growth_is_uniform() {
        let uni = UniformPrior;
        let priors: [&dyn Prior; 2] = [&ExponentialPrior::new(1.0), &GeometricPrior::new(1.0)];
        for prior in priors {
            for (b, e) in [(0u64, 10u64), (5, 20), (100, 200)] {
                let (pp, up) = (
                    prior.calc_interval_probability_proxy(b, e),
                    uni.calc_interval_probability_proxy(b, e),
                );
                assert!((pp - up).abs() < 1e-8, "proxy at ({b},{e}): {pp} vs {up}");
                let (pm, um) = (
                    prior.calc_interval_conditioned_mean(b, e),
                    uni.calc_interval_conditioned_mean(b, e),
                );
                assert!((pm - um).abs() < 1e-8, "mean at ({b},{e}): {pm} vs {um}");
            }
        }
    }

    #[test]
    fn exponential_near_unit_growth_approaches_midpoint() {
        let exp = ExponentialPrior::new(1.0 + 1e-9);
        assert!((exp.calc_interval_conditioned_mean(0, 10) - 4.5).abs() < 1e-3);
    }

    #[test]
    fn exponential_proxy() {
        let exp = ExponentialPrior::new(std::f64::consts::E);
        assert!((exp.calc_interval_probability_proxy(0, 1) - (std::f64::consts::E - 1.0)).abs() < EPS);
        assert!(ExponentialPrior::new(0.5).calc_interval_probability_proxy(5, 6) > 0.0);
    }

    #[test]
    fn exponential_mean_skews_with_growth() {
        let growing = ExponentialPrior::new(2.0).calc_interval_conditioned_mean(0, 100);
        let shrinking = ExponentialPrior::new(0.5).calc_interval_conditioned_mean(0, 100);
        assert!(growing > 49.5 && growing <= 99.0, "{growing}");
        assert!(shrinking < 49.5 && shrinking >= 0.0, "{shrinking}");
    }

    #[test]
    fn geometric_matches_direct_sums() {
        for g in [0.5, 0.9, 1.3, 2.0] {
            let prior = GeometricPrior::new(g);
            for (b, e) in [(0u64, 2u64), (3, 9), (10, 11)] {
                let weights: Vec<(f64, f64)> =
                    (b..e).map(|r| (r as f64, g.powf(r as f64))).collect();
                let total: f64 = weights.iter().map(|(_, w)| w).sum();
                let mean = weights.iter().map(|(r, w)| r * w).sum::<f64>() / total;
                let proxy = prior.calc_interval_probability_proxy(b, e);
                assert!((proxy - total).abs() < 1e-6 * total, "g={g} [{b},{e})");
                let got = prior.calc_interval_conditioned_mean(b, e);
                assert!((got - mean).abs() < 1e-6, "g={g} [{b},{e}): {got} vs {mean}");
            }
        }
    }

    #[test]
    fn geometric_small_interval_closed_forms() {
        let half = GeometricPrior::new(0.5);
        assert!((half.calc_interval_conditioned_mean(0, 2) - 1.0 / 3.0).abs() < EPS);
        assert!((half.calc_interval_probability_proxy(0, 2) - 1.5).abs() < EPS);
        let double = GeometricPrior::new(2.0);
        assert!((double.calc_interval_conditioned_mean(0, 2) - 2.0 / 3.0).abs() < EPS);
        assert!((double.calc_interval_probability_proxy(0, 2) - 3.0).abs() < EPS);
    }

    #[test]
    fn log_proxy_stays_finite_on_deep_ranks() {
        let priors: [&dyn Prior; 6] = [
            &UniformPrior,
            &ArbitraryPrior,
            &ExponentialPrior::new(1.1),
            &ExponentialPrior::new(0.9),
            &GeometricPrior::new(1.1),
            &GeometricPrior::new(0.9),
        ];
        for prior in priors {
            let newer = prior.calc_interval_log_probability_proxy(9000, 9001);
            let older = prior.calc_interval_log_probability_proxy(8990, 9000);
            assert!(newer.is_finite() && older.is_finite(), "{newer} {older}");
        }
        // one rank apart under growth 1.1 differs by ln(1.1)
        let exp = ExponentialPrior::new(1.1);
        let step = exp.calc_interval_log_probability_proxy(20_001, 20_002)
            - exp.calc_interval_log_probability_proxy(20_000, 20_001);
        assert!((step - 1.1f64.ln()).abs() < 1e-9, "{step}");
        let geo = GeometricPrior::new(1.1);
        let step = geo.calc_interval_log_probability_proxy(20_001, 20_002)
            - geo.calc_interval_log_probability_proxy(20_000, 20_001);
        assert!((step - 1.1f64.ln()).abs() < 1e-9, "{step}");
    }

    #[test]
    #[should_panic(expected = "growth_factor")]
    fn rejects_nonpositive_growth() {
        GeometricPrior::new(0.0);
    }
}
