use std::ops::RangeInclusive;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::RegionSeries;
use crate::estimate::inner::fit_beta;
use crate::estimate::{Objective, Observer, TracingObserver};
use crate::model::{initial_state, RateConstants, State};
use crate::simulator::Integrator;
use crate::{SeirError, Settings};

/// Result of fitting beta for one initial susceptible count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Initial susceptible count
    pub susceptible: u64,
    /// Fitted transmission rate
    pub beta: f64,
    /// Maximization score, the negated objective. `-inf` when the fit failed
    pub score: f64,
    /// Whether the inner optimizer reported success
    pub converged: bool,
}

/// Best parameter set found by a completed scan
///
/// Immutable once returned; consumed by [crate::forecast] and [crate::report].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    region: String,
    susceptible: u64,
    beta: f64,
    score: f64,
    rates: RateConstants,
    initial: State,
    scanned: u64,
    stopped_early: bool,
}

impl Estimate {
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Best initial susceptible count `S0*`
    pub fn susceptible(&self) -> u64 {
        self.susceptible
    }

    /// Best transmission rate `beta*`
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Best score, the negated Poisson deviance
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn rates(&self) -> &RateConstants {
        &self.rates
    }

    /// Initial state the best fit was integrated from
    pub fn initial(&self) -> &State {
        &self.initial
    }

    /// Number of susceptible counts evaluated
    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// True when the stall rule ended the scan before the population was reached
    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }
}

/// Two-level search over the initial susceptible count and the transmission rate
///
/// The outer scan walks `S0` upward from the last confirmed count to the population. Each `S0`
/// fixes the initial state `(S0, 0, min confirmed, 0, 0)` and an inner L-BFGS fit finds the
/// best beta for it. The scan stops once more than `stall_threshold` consecutive counts fail to
/// improve on the best score. Counts are fitted in blocks of `block_size`, in parallel when
/// enabled, and the stall rule is then applied to each block in ascending order, so the result
/// is identical to a sequential scan.
#[derive(Debug, Clone)]
pub struct Estimator<'a> {
    series: &'a RegionSeries,
    rates: RateConstants,
    settings: Settings,
    solver: Integrator,
    observed: Vec<f64>,
}

impl<'a> Estimator<'a> {
    /// Derive the rate constants from `series` and prepare a scan
    pub fn new(series: &'a RegionSeries, settings: &Settings) -> Result<Self, SeirError> {
        let rates = RateConstants::derive(series, settings.latent_period)?;
        Self::with_constants(series, rates, settings)
    }

    /// Prepare a scan with externally supplied rate constants
    pub fn with_constants(
        series: &'a RegionSeries,
        rates: RateConstants,
        settings: &Settings,
    ) -> Result<Self, SeirError> {
        let solver = Integrator::from_settings(settings)?;
        Ok(Self {
            series,
            rates,
            settings: settings.clone(),
            solver,
            observed: series.infected(),
        })
    }

    pub fn series(&self) -> &RegionSeries {
        self.series
    }

    pub fn rates(&self) -> &RateConstants {
        &self.rates
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Susceptible counts the scan may visit, after applying `max_scan`
    pub fn scan_range(&self) -> RangeInclusive<u64> {
        let from = self.series.last_confirmed();
        let mut to = self.series.population();
        if let Some(limit) = self.settings.max_scan {
            to = to.min(from.saturating_add(limit.saturating_sub(1)));
        }
        from..=to
    }

    pub fn initial_state(&self, susceptible: u64) -> State {
        initial_state(susceptible as f64, self.series.min_confirmed() as f64)
    }

    pub fn objective(&self, susceptible: u64) -> Objective<'_> {
        Objective::new(
            self.rates,
            self.initial_state(susceptible),
            &self.observed,
            self.solver,
            self.settings.non_positive,
        )
    }

    /// Fit beta for a single initial susceptible count
    pub fn fit_susceptible(&self, susceptible: u64) -> Candidate {
        let objective = self.objective(susceptible);
        match fit_beta(
            &objective,
            self.settings.initial_beta,
            self.settings.max_beta,
            &self.settings.optimizer,
        ) {
            Ok(fit) => {
                tracing::debug!(
                    "S0 = {}: beta = {:.6}, cost = {:.6}, converged = {}, iterations = {}",
                    susceptible,
                    fit.beta,
                    fit.cost,
                    fit.converged,
                    fit.iterations
                );
                Candidate {
                    susceptible,
                    beta: fit.beta,
                    score: -fit.cost,
                    converged: fit.converged,
                }
            }
            Err(e) => {
                tracing::warn!("Inner fit failed for S0 = {}: {}", susceptible, e);
                Candidate {
                    susceptible,
                    beta: f64::NAN,
                    score: f64::NEG_INFINITY,
                    converged: false,
                }
            }
        }
    }

    /// Run the scan, reporting progress to a [TracingObserver]
    pub fn run(&self) -> Result<Estimate, SeirError> {
        self.run_with(&mut TracingObserver::new(self.series.name()))
    }

    /// Run the scan, reporting every candidate and every new best to `observer`
    pub fn run_with<O: Observer + ?Sized>(&self, observer: &mut O) -> Result<Estimate, SeirError> {
        let range = self.scan_range();
        let (from, to) = (*range.start(), *range.end());
        let block = self.settings.block_size as u64;
        let threshold = self.settings.stall_threshold;

        let mut best: Option<Candidate> = None;
        let mut stall = 0u64;
        let mut scanned = 0u64;
        let mut stopped_early = false;
        let mut next = from;

        'scan: while next <= to {
            let last = to.min(next.saturating_add(block - 1));
            let counts: Vec<u64> = (next..=last).collect();
            let candidates: Vec<Candidate> = if self.settings.parallel {
                counts
                    .par_iter()
                    .map(|&s0| self.fit_susceptible(s0))
                    .collect()
            } else {
                counts.iter().map(|&s0| self.fit_susceptible(s0)).collect()
            };

            for candidate in &candidates {
                scanned += 1;
                observer.on_candidate(candidate);

                let improves = candidate.converged
                    && candidate.score > best.map_or(f64::NEG_INFINITY, |b| b.score);
                if improves {
                    best = Some(*candidate);
                    stall = 0;
                    observer.on_improvement(candidate);
                } else {
                    stall += 1;
                }

                if stall > threshold {
                    stopped_early = candidate.susceptible < to;
                    break 'scan;
                }
            }

            match last.checked_add(1) {
                Some(n) => next = n,
                None => break,
            }
        }

        let best = best.ok_or(SeirError::NoConvergence { from, to })?;
        let estimate = Estimate {
            region: self.series.name().to_string(),
            susceptible: best.susceptible,
            beta: best.beta,
            score: best.score,
            rates: self.rates,
            initial: self.initial_state(best.susceptible),
            scanned,
            stopped_early,
        };
        observer.on_finish(&estimate);
        Ok(estimate)
    }
}
