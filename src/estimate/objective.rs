use serde::{Deserialize, Serialize};

use crate::model::{Compartment, RateConstants, Seird, State};
use crate::simulator::{Horizon, Integrator};
use crate::SeirError;

/// What the objective does with an infectious estimate that is not strictly positive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NonPositivePolicy {
    /// Replace the estimate by `max(estimate, floor)` before taking the logarithm
    Clamp(f64),
    /// Fail with [SeirError::NumericalFault], making the candidate beta infeasible
    Infeasible,
}

impl Default for NonPositivePolicy {
    fn default() -> Self {
        NonPositivePolicy::Clamp(1e-10)
    }
}

/// Poisson-deviance negative log-likelihood of a transmission rate
///
/// For a fixed initial state, the model is integrated over the observed window and the
/// infectious compartment is sampled once per day:
///
/// ```text
/// cost(beta) = sum_d ( I_est(d) - I_obs(d) * ln I_est(d) )
/// ```
///
/// Lower is better. A non-finite trajectory is always a [SeirError::NumericalFault]; a
/// non-positive estimate is handled according to the [NonPositivePolicy].
#[derive(Debug, Clone)]
pub struct Objective<'a> {
    rates: RateConstants,
    initial: State,
    observed: &'a [f64],
    solver: Integrator,
    policy: NonPositivePolicy,
}

impl<'a> Objective<'a> {
    pub fn new(
        rates: RateConstants,
        initial: State,
        observed: &'a [f64],
        solver: Integrator,
        policy: NonPositivePolicy,
    ) -> Self {
        Self {
            rates,
            initial,
            observed,
            solver,
            policy,
        }
    }

    pub fn initial(&self) -> &State {
        &self.initial
    }

    pub fn observed(&self) -> &[f64] {
        self.observed
    }

    /// Daily infectious estimates over the observed window
    pub fn predicted(&self, beta: f64) -> Result<Vec<f64>, SeirError> {
        let model = Seird::new(beta, self.rates);
        let days = Horizon::Observed.days(self.observed.len());
        Ok(self
            .solver
            .solve_daily(&model, self.initial, days)?
            .iter()
            .map(|x| x[Compartment::Infectious.index()])
            .collect())
    }

    pub fn evaluate(&self, beta: f64) -> Result<f64, SeirError> {
        let mut total = 0.0;
        for (day, (estimate, &observed)) in self
            .predicted(beta)?
            .into_iter()
            .zip(self.observed)
            .enumerate()
        {
            let fault = SeirError::NumericalFault {
                beta,
                day,
                value: estimate,
            };
            if !estimate.is_finite() {
                return Err(fault);
            }
            let estimate = match self.policy {
                NonPositivePolicy::Clamp(floor) => estimate.max(floor),
                NonPositivePolicy::Infeasible if estimate <= 0.0 => return Err(fault),
                NonPositivePolicy::Infeasible => estimate,
            };
            total += estimate - observed * estimate.ln();
        }
        if !total.is_finite() {
            return Err(SeirError::NumericalFault {
                beta,
                day: self.observed.len(),
                value: total,
            });
        }
        Ok(total)
    }

    /// Positive normalizer `sum(max(|I_obs|, 1))`, used to keep optimizer steps well scaled
    pub fn scale(&self) -> f64 {
        self.observed.iter().map(|o| o.abs().max(1.0)).sum::<f64>().max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::initial_state;
    use approx::assert_relative_eq;

    fn solver() -> Integrator {
        Integrator::new(1, 1e-10, 1e-10).unwrap()
    }

    #[test]
    fn matches_hand_computed_deviance() {
        let rates = RateConstants::new(1.0 / 5.8, 0.1, 0.0);
        let observed = [10.0, 9.0, 8.0];
        let objective = Objective::new(
            rates,
            initial_state(500.0, 10.0),
            &observed,
            solver(),
            NonPositivePolicy::default(),
        );

        let predicted = objective.predicted(0.0).unwrap();
        let expected: f64 = predicted
            .iter()
            .zip(observed.iter())
            .map(|(i, o)| i - o * i.ln())
            .sum();
        assert_relative_eq!(objective.evaluate(0.0).unwrap(), expected);
        assert_eq!(predicted.len(), 3);
        assert_relative_eq!(predicted[2], 10.0 * (-0.2_f64).exp(), max_relative = 1e-7);
    }

    #[test]
    fn truth_scores_better_than_neighbours() {
        let rates = RateConstants::new(1.0 / 5.8, 0.1, 0.01);
        let window = [0.0; 20];
        let observed = Objective::new(
            rates,
            initial_state(1000.0, 10.0),
            &window,
            solver(),
            NonPositivePolicy::default(),
        )
        .predicted(0.4)
        .unwrap();

        let objective = Objective::new(
            rates,
            initial_state(1000.0, 10.0),
            &observed,
            solver(),
            NonPositivePolicy::default(),
        );
        let at_truth = objective.evaluate(0.4).unwrap();
        assert!(at_truth < objective.evaluate(0.35).unwrap());
        assert!(at_truth < objective.evaluate(0.45).unwrap());
    }

    #[test]
    fn zero_infectious_is_clamped_or_rejected() {
        let rates = RateConstants::new(1.0 / 5.8, 0.1, 0.0);
        let observed = [0.0, 2.0];

        let clamped = Objective::new(
            rates,
            initial_state(100.0, 0.0),
            &observed,
            solver(),
            NonPositivePolicy::Clamp(1e-10),
        );
        let cost = clamped.evaluate(0.3).unwrap();
        assert_relative_eq!(cost, 2.0 * 1e-10 - 2.0 * 1e-10_f64.ln());

        let strict = Objective::new(
            rates,
            initial_state(100.0, 0.0),
            &observed,
            solver(),
            NonPositivePolicy::Infeasible,
        );
        assert_eq!(
            strict.evaluate(0.3).unwrap_err(),
            SeirError::NumericalFault {
                beta: 0.3,
                day: 0,
                value: 0.0
            }
        );
    }

    #[test]
    fn scale_is_positive() {
        let rates = RateConstants::new(1.0 / 5.8, 0.1, 0.0);
        let observed = [0.0, -3.0, 10.0];
        let objective = Objective::new(
            rates,
            initial_state(100.0, 1.0),
            &observed,
            solver(),
            NonPositivePolicy::default(),
        );
        assert_eq!(objective.scale(), 14.0);
    }
}
