//! Configuration of the estimation pipeline
//!
//! [Settings] carries every tunable of the fit and forecast. Defaults reproduce the reference
//! behaviour: a 5.8 day latent period, a 0.01 day sampling grid, a stall threshold of 1000
//! susceptible counts and a forecast six times as long as the observed window.

use serde::{Deserialize, Serialize};

use crate::estimate::NonPositivePolicy;
use crate::SeirError;

/// Complete estimation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Average latent period in days (default: 5.8)
    pub latent_period: f64,

    /// Configured mortality rate (default: 0.02)
    ///
    /// Kept for compatibility only. The rate derived from the series always takes precedence,
    /// so this value does not influence any result.
    pub default_mortality_rate: f64,

    /// Consecutive non-improving susceptible counts tolerated before the scan stops (default: 1000)
    pub stall_threshold: u64,

    /// Forecast horizon as a multiple of the observed window (default: 6)
    pub forecast_multiplier: usize,

    /// Spacing of the sampling grid of dense trajectories in days (default: 0.01)
    ///
    /// The reciprocal must be a whole number of grid points per day. Fits always sample once
    /// per day.
    pub step: f64,

    /// Relative tolerance of the BDF integrator (default: 1e-10)
    pub rtol: f64,

    /// Absolute tolerance of the BDF integrator, in persons (default: 1e-10)
    pub atol: f64,

    /// Starting transmission rate of every inner optimization (default: 0.001)
    pub initial_beta: f64,

    /// Upper edge of the transmission rate box (default: 100.0)
    pub max_beta: f64,

    /// Handling of non-positive infectious estimates in the objective (default: clamp to 1e-10)
    pub non_positive: NonPositivePolicy,

    /// Number of susceptible counts fitted together before the stall rule is applied (default: 256)
    pub block_size: usize,

    /// Fit each block in parallel (default: true)
    pub parallel: bool,

    /// Optional cap on the number of susceptible counts scanned (None = no cap)
    pub max_scan: Option<u64>,

    /// Inner optimizer options
    pub optimizer: OptimizerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            latent_period: 5.8,
            default_mortality_rate: 0.02,
            stall_threshold: 1000,
            forecast_multiplier: 6,
            step: 0.01,
            rtol: 1e-10,
            atol: 1e-10,
            initial_beta: 0.001,
            max_beta: 100.0,
            non_positive: NonPositivePolicy::default(),
            block_size: 256,
            parallel: true,
            max_scan: None,
            optimizer: OptimizerSettings::default(),
        }
    }
}

impl Settings {
    pub fn with_latent_period(mut self, days: f64) -> Self {
        self.latent_period = days;
        self
    }

    pub fn with_stall_threshold(mut self, threshold: u64) -> Self {
        self.stall_threshold = threshold;
        self
    }

    pub fn with_forecast_multiplier(mut self, multiplier: usize) -> Self {
        self.forecast_multiplier = multiplier;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    pub fn with_initial_beta(mut self, beta: f64) -> Self {
        self.initial_beta = beta;
        self
    }

    pub fn with_max_beta(mut self, beta: f64) -> Self {
        self.max_beta = beta;
        self
    }

    pub fn with_non_positive(mut self, policy: NonPositivePolicy) -> Self {
        self.non_positive = policy;
        self
    }

    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_scan(mut self, limit: u64) -> Self {
        self.max_scan = Some(limit);
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerSettings) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Number of grid points per day implied by [Settings::step]
    pub fn steps_per_day(&self) -> usize {
        (1.0 / self.step).round() as usize
    }

    /// Check every field against its admissible range
    pub fn validate(&self) -> Result<(), SeirError> {
        if !(self.latent_period > 0.0 && self.latent_period.is_finite()) {
            return Err(SeirError::invalid_setting(
                "latent_period",
                self.latent_period,
                "must be positive and finite",
            ));
        }
        if !(self.step > 0.0 && self.step <= 1.0) {
            return Err(SeirError::invalid_setting(
                "step",
                self.step,
                "must be in (0, 1] days",
            ));
        }
        let per_day = 1.0 / self.step;
        if (per_day - per_day.round()).abs() > 1e-9 * per_day {
            return Err(SeirError::invalid_setting(
                "step",
                self.step,
                "must divide one day into a whole number of grid points",
            ));
        }
        for (name, tolerance) in [("rtol", self.rtol), ("atol", self.atol)] {
            if !(tolerance > 0.0 && tolerance.is_finite()) {
                return Err(SeirError::invalid_setting(
                    name,
                    tolerance,
                    "must be positive and finite",
                ));
            }
        }
        if self.forecast_multiplier == 0 {
            return Err(SeirError::invalid_setting(
                "forecast_multiplier",
                self.forecast_multiplier,
                "must be at least 1",
            ));
        }
        if self.block_size == 0 {
            return Err(SeirError::invalid_setting(
                "block_size",
                self.block_size,
                "must be at least 1",
            ));
        }
        if self.max_scan == Some(0) {
            return Err(SeirError::invalid_setting(
                "max_scan",
                0,
                "must allow at least one susceptible count",
            ));
        }
        if !(self.max_beta > 0.0 && self.max_beta.is_finite()) {
            return Err(SeirError::invalid_setting(
                "max_beta",
                self.max_beta,
                "must be positive and finite",
            ));
        }
        if !(self.initial_beta > 0.0 && self.initial_beta <= self.max_beta) {
            return Err(SeirError::invalid_setting(
                "initial_beta",
                self.initial_beta,
                "must lie in (0, max_beta]",
            ));
        }
        if let NonPositivePolicy::Clamp(epsilon) = self.non_positive {
            if !(epsilon > 0.0 && epsilon.is_finite()) {
                return Err(SeirError::invalid_setting(
                    "non_positive",
                    epsilon,
                    "clamp floor must be positive and finite",
                ));
            }
        }
        self.optimizer.validate()
    }
}

/// Options of the inner L-BFGS run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Maximum L-BFGS iterations per susceptible count (default: 100)
    pub max_iters: u64,
    /// Number of correction pairs kept by L-BFGS (default: 7)
    pub lbfgs_memory: usize,
    /// Gradient norm below which the fit is converged (default: 1e-6)
    pub tolerance_grad: f64,
    /// Cost change below which the fit is converged (default: 1e-12)
    pub tolerance_cost: f64,
    /// Central-difference step on `ln(beta)` (default: 1e-5)
    pub gradient_step: f64,
    /// Largest gradient of the scaled cost accepted at a reported optimum (default: 1e-4)
    pub stationarity: f64,
    /// Number of log-spaced betas in `[initial_beta, max_beta]` tried before L-BFGS starts
    /// from the best of them (default: 16)
    pub start_grid: usize,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iters: 100,
            lbfgs_memory: 7,
            tolerance_grad: 1e-6,
            tolerance_cost: 1e-12,
            gradient_step: 1e-5,
            stationarity: 1e-4,
            start_grid: 16,
        }
    }
}

impl OptimizerSettings {
    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_stationarity(mut self, stationarity: f64) -> Self {
        self.stationarity = stationarity;
        self
    }

    pub fn with_start_grid(mut self, points: usize) -> Self {
        self.start_grid = points;
        self
    }

    fn validate(&self) -> Result<(), SeirError> {
        if self.lbfgs_memory == 0 {
            return Err(SeirError::invalid_setting(
                "optimizer.lbfgs_memory",
                self.lbfgs_memory,
                "must be at least 1",
            ));
        }
        if !(self.gradient_step > 0.0) {
            return Err(SeirError::invalid_setting(
                "optimizer.gradient_step",
                self.gradient_step,
                "must be positive",
            ));
        }
        if !(self.stationarity > 0.0) {
            return Err(SeirError::invalid_setting(
                "optimizer.stationarity",
                self.stationarity,
                "must be positive",
            ));
        }
        if self.start_grid == 0 {
            return Err(SeirError::invalid_setting(
                "optimizer.start_grid",
                self.start_grid,
                "must be at least 1",
            ));
        }
        if !(self.tolerance_grad >= 0.0 && self.tolerance_cost >= 0.0) {
            return Err(SeirError::invalid_setting(
                "optimizer.tolerance",
                format!("{}/{}", self.tolerance_grad, self.tolerance_cost),
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.steps_per_day(), 100);
    }

    #[test]
    fn step_must_split_days_evenly() {
        assert!(Settings::default().with_step(0.25).validate().is_ok());
        assert!(Settings::default().with_step(0.1).validate().is_ok());

        let err = Settings::default().with_step(0.3).validate().unwrap_err();
        assert!(matches!(
            err,
            SeirError::InvalidSettings { name: "step", .. }
        ));
        assert!(Settings::default().with_step(0.0).validate().is_err());
    }

    #[test]
    fn tolerances_must_be_positive() {
        let err = Settings::default()
            .with_tolerances(0.0, 1e-8)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SeirError::InvalidSettings { name: "rtol", .. }));

        let grid = OptimizerSettings::default().with_start_grid(0);
        assert!(Settings::default().with_optimizer(grid).validate().is_err());
    }

    #[test]
    fn initial_beta_must_sit_inside_the_box() {
        let err = Settings::default()
            .with_max_beta(1.0)
            .with_initial_beta(2.0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            SeirError::InvalidSettings {
                name: "initial_beta",
                ..
            }
        ));
    }

    #[test]
    fn round_trips_through_json() {
        let settings = Settings::default()
            .with_stall_threshold(10)
            .with_tolerances(1e-8, 1e-6)
            .with_non_positive(NonPositivePolicy::Infeasible);
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
