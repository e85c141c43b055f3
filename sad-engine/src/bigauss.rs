//! Two-component Gaussian model of frame energies
//!
//! Component 0 models silence (low energy), component 1 models speech.
//! There are no mixture weights: each frame simply belongs to the component
//! under which it is most likely, and the fit re-estimates both components
//! from these hard assignments.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{SadError, SadResult};

/// Index of the low-energy (silence) component.
pub const SILENCE_COMPONENT: usize = 0;
/// Index of the high-energy (speech) component.
pub const SPEECH_COMPONENT: usize = 1;

/// Smallest per-frame variance a component may be re-estimated with.
pub const MIN_VARIANCE: f64 = 1e-6;

/// 1-D Gaussian stored as mean, inverse variance and the cached constant
/// `0.5 * (ln(inv_var) - mean^2 * inv_var)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gaussian {
    pub mean: f64,
    pub inv_var: f64,
    pub log_const: f64,
}

impl Gaussian {
    pub fn new(mean: f64, inv_var: f64) -> Self {
        Self {
            mean,
            inv_var,
            log_const: 0.5 * (inv_var.ln() - mean * mean * inv_var),
        }
    }

    /// Unnormalized log-likelihood of `x`.
    pub fn log_likelihood(&self, x: f64) -> f64 {
        self.inv_var * self.mean * x - 0.5 * self.inv_var * x * x + self.log_const
    }

    pub fn variance(&self) -> f64 {
        1.0 / self.inv_var
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Outcome of [`BiGaussian::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitReport {
    /// Passes made over the profile.
    pub iterations: usize,
    /// Stopped on the relative log-likelihood test rather than the cap.
    pub converged: bool,
    /// Total log-likelihood of the last pass.
    pub log_likelihood: f64,
}

/// Per-component sufficient statistics for one pass.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl Accumulator {
    fn add(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    fn estimate(&self, component: usize) -> SadResult<Gaussian> {
        if self.count == 0 {
            return Err(SadError::DegenerateModel { component });
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let spread = (self.sum_sq - mean * self.sum).max(n * MIN_VARIANCE);
        Ok(Gaussian::new(mean, n / spread))
    }
}

/// Silence/speech pair of Gaussians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BiGaussian {
    pub components: [Gaussian; 2],
}

impl BiGaussian {
    /// Place the means an eighth of the range inside `[min, max]`, with unit
    /// variances.
    pub fn init(min: f64, max: f64) -> Self {
        let d = (max - min) / 8.0;
        Self {
            components: [Gaussian::new(min + d, 1.0), Gaussian::new(max - d, 1.0)],
        }
    }

    pub fn silence(&self) -> &Gaussian {
        &self.components[SILENCE_COMPONENT]
    }

    pub fn speech(&self) -> &Gaussian {
        &self.components[SPEECH_COMPONENT]
    }

    /// Most likely component for `x` and its log-likelihood. Ties go to
    /// component 0.
    pub fn assign(&self, x: f64) -> (usize, f64) {
        let l0 = self.components[0].log_likelihood(x);
        let l1 = self.components[1].log_likelihood(x);
        if l0 >= l1 {
            (0, l0)
        } else {
            (1, l1)
        }
    }

    /// Hard-assignment re-estimation over `samples`.
    ///
    /// Makes at most `max_iterations` passes. After the first pass, stops as
    /// soon as `(previous - current) / previous < epsilon` for the total
    /// log-likelihood (previous nonzero), before re-estimating.
    ///
    /// Fails with [`SadError::DegenerateModel`] if a component has no frame
    /// to re-estimate from. An empty profile is left unfitted.
    pub fn fit(
        &mut self,
        samples: &[f64],
        max_iterations: usize,
        epsilon: f64,
    ) -> SadResult<FitReport> {
        let mut report = FitReport {
            iterations: 0,
            converged: false,
            log_likelihood: 0.0,
        };
        if samples.is_empty() {
            return Ok(report);
        }

        let mut previous = 0.0;
        for iteration in 0..max_iterations {
            let mut acc = [Accumulator::default(); 2];
            let mut total = 0.0;

            for &x in samples {
                let (component, llk) = self.assign(x);
                acc[component].add(x);
                total += llk;
            }

            report.iterations = iteration + 1;
            report.log_likelihood = total;
            debug!(
                "fit: pass {} llk={:.4} n=({}, {})",
                iteration + 1,
                total,
                acc[0].count,
                acc[1].count
            );

            if iteration > 0 && previous != 0.0 && (previous - total) / previous < epsilon {
                report.converged = true;
                break;
            }

            self.components = [acc[0].estimate(0)?, acc[1].estimate(1)?];
            previous = total;
        }

        info!(
            "Bi-gaussian fit: {} passes (converged={}), silence mean={:.3} sd={:.3}, speech mean={:.3} sd={:.3}",
            report.iterations,
            report.converged,
            self.silence().mean,
            self.silence().std_dev(),
            self.speech().mean,
            self.speech().std_dev()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_profile() -> Vec<f64> {
        let mut v = vec![1.0; 40];
        v.extend(vec![10.0; 60]);
        v
    }

    #[test]
    fn test_init_positions_means() {
        let bg = BiGaussian::init(1.0, 9.0);
        assert_eq!(bg.silence().mean, 2.0);
        assert_eq!(bg.speech().mean, 8.0);
        assert_eq!(bg.silence().inv_var, 1.0);
        assert_eq!(bg.silence().log_const, -2.0);
        assert_eq!(bg.speech().log_const, -32.0);
    }

    #[test]
    fn test_log_likelihood_closed_form() {
        let g = Gaussian::new(2.0, 4.0);
        let x = 1.5;
        // -0.5 * inv_var * (x - m)^2 + 0.5 * ln(inv_var)
        let direct = -0.5 * 4.0 * (x - 2.0f64).powi(2) + 0.5 * 4.0f64.ln();
        assert!((g.log_likelihood(x) - direct).abs() < 1e-12);
    }

    #[test]
    fn test_assign_ties_favor_component_zero() {
        let bg = BiGaussian::init(0.0, 8.0);
        // means 1 and 7, equal variances: 4 is equidistant
        assert_eq!(bg.assign(4.0).0, 0);
        assert_eq!(bg.assign(4.1).0, 1);
    }

    #[test]
    fn test_fit_separates_two_levels() {
        let samples = step_profile();
        let mut bg = BiGaussian::init(1.0, 10.0);
        let report = bg.fit(&samples, 20, 0.0001).unwrap();

        assert!(report.converged);
        assert_eq!(report.iterations, 3);
        assert!((bg.silence().mean - 1.0).abs() < 1e-9);
        assert!((bg.speech().mean - 10.0).abs() < 1e-9);
        assert!(bg.silence().inv_var.is_finite());
        assert!(samples[..40].iter().all(|&x| bg.assign(x).0 == 0));
        assert!(samples[40..].iter().all(|&x| bg.assign(x).0 == 1));
    }

    #[test]
    fn test_fit_on_noisy_levels() {
        let samples: Vec<f64> = (0..200)
            .map(|i| {
                let jitter = ((i * 37) % 11) as f64 / 10.0 - 0.5;
                if i % 3 == 0 { 2.0 + jitter } else { 8.0 + jitter }
            })
            .collect();
        let mut bg = BiGaussian::init(1.5, 8.5);
        bg.fit(&samples, 20, 0.0001).unwrap();
        assert!((bg.silence().mean - 2.0).abs() < 0.2);
        assert!((bg.speech().mean - 8.0).abs() < 0.2);
        assert!(bg.speech().variance() < 1.0);
    }

    #[test]
    fn test_fit_never_exceeds_iteration_cap() {
        let samples = step_profile();
        for cap in 0..5 {
            let mut bg = BiGaussian::init(1.0, 10.0);
            // epsilon below any possible ratio: never converges early
            let report = bg.fit(&samples, cap, f64::NEG_INFINITY).unwrap();
            assert_eq!(report.iterations, cap);
            assert!(!report.converged);
        }
    }

    #[test]
    fn test_fit_empty_profile_is_noop() {
        let mut bg = BiGaussian::init(0.0, 8.0);
        let before = bg;
        let report = bg.fit(&[], 20, 0.0001).unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(bg, before);
    }

    #[test]
    fn test_fit_reports_empty_component() {
        // constant profile: everything ties onto component 0
        let samples = vec![3.0; 50];
        let mut bg = BiGaussian::init(3.0, 3.0);
        match bg.fit(&samples, 20, 0.0001) {
            Err(SadError::DegenerateModel { component }) => assert_eq!(component, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
