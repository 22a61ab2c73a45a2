use argmin::{
    core::{CostFunction, Error, Executor, Gradient, TerminationReason, TerminationStatus},
    solver::{linesearch::MoreThuenteLineSearch, quasinewton::LBFGS},
};

use crate::estimate::Objective;
use crate::settings::OptimizerSettings;
use crate::SeirError;

/// One-dimensional problem handed to L-BFGS
///
/// The optimizer works on the unconstrained `v = ln(beta)`, so every trial beta is positive
/// and line-search steps are scale-free. The cost is the objective divided by
/// [Objective::scale]; the gradient is a central difference in `v`.
#[derive(Clone, Copy)]
struct BetaProblem<'o, 'a> {
    objective: &'o Objective<'a>,
    scale: f64,
    gradient_step: f64,
}

impl BetaProblem<'_, '_> {
    fn scaled(&self, v: f64) -> Result<f64, SeirError> {
        Ok(self.objective.evaluate(v.exp())? / self.scale)
    }

    fn slope(&self, v: f64) -> Result<f64, SeirError> {
        let h = self.gradient_step;
        Ok((self.scaled(v + h)? - self.scaled(v - h)?) / (2.0 * h))
    }

    /// Best point of a log-spaced grid over `[lower, upper]`, skipping faulted betas
    fn start(&self, lower: f64, upper: f64, points: usize) -> Option<f64> {
        let (lo, hi) = (lower.ln(), upper.ln());
        let span = if points > 1 { points - 1 } else { 1 };
        (0..points)
            .map(|k| lo + (hi - lo) * k as f64 / span as f64)
            .filter_map(|v| self.scaled(v).ok().map(|cost| (v, cost)))
            .fold(None, |best: Option<(f64, f64)>, (v, cost)| match best {
                Some((_, c)) if c <= cost => best,
                _ => Some((v, cost)),
            })
            .map(|(v, _)| v)
    }
}

impl CostFunction for BetaProblem<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, v: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.scaled(v[0])?)
    }
}

impl Gradient for BetaProblem<'_, '_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, v: &Self::Param) -> Result<Self::Gradient, Error> {
        Ok(vec![self.slope(v[0])?])
    }
}

/// Outcome of one inner optimization
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct InnerFit {
    pub beta: f64,
    /// Unscaled objective at `beta`, `+inf` when the fit failed
    pub cost: f64,
    pub converged: bool,
    pub iterations: u64,
}

impl InnerFit {
    fn failed(beta: f64, iterations: u64) -> Self {
        Self {
            beta,
            cost: f64::INFINITY,
            converged: false,
            iterations,
        }
    }
}

/// Minimize the objective over beta in `(0, max_beta]`
///
/// L-BFGS starts from the best of `options.start_grid` log-spaced betas between
/// `initial_beta` and `max_beta`. A fit converges only when the solver itself reports
/// success, the optimum lies inside the box and the gradient there is below
/// `options.stationarity`. Running out of iterations, or any error raised while evaluating
/// the objective, makes the fit a failure.
pub(crate) fn fit_beta(
    objective: &Objective,
    initial_beta: f64,
    max_beta: f64,
    options: &OptimizerSettings,
) -> Result<InnerFit, SeirError> {
    let problem = BetaProblem {
        objective,
        scale: objective.scale(),
        gradient_step: options.gradient_step,
    };
    let start = match problem.start(initial_beta, max_beta, options.start_grid) {
        Some(v) => v,
        None => {
            tracing::debug!("Objective faulted on every starting beta");
            return Ok(InnerFit::failed(initial_beta, 0));
        }
    };

    let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, options.lbfgs_memory)
        .with_tolerance_grad(options.tolerance_grad)
        .and_then(|s| s.with_tolerance_cost(options.tolerance_cost))
        .map_err(|e| SeirError::Optimizer(e.to_string()))?;

    let result = Executor::new(problem, solver)
        .configure(|state| state.param(vec![start]).max_iters(options.max_iters))
        .run();

    let res = match result {
        Ok(res) => res,
        Err(e) => {
            tracing::debug!("Inner optimization aborted: {}", e);
            return Ok(InnerFit::failed(start.exp(), 0));
        }
    };

    let iterations = res.state.iter;
    let reported = matches!(
        res.state.termination_status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    );
    let v = match res.state.best_param.as_ref().or(res.state.param.as_ref()) {
        Some(v) => v[0],
        None => return Ok(InnerFit::failed(start.exp(), iterations)),
    };
    let beta = v.exp();

    let cost = match objective.evaluate(beta) {
        Ok(cost) => cost,
        Err(e) => {
            tracing::debug!("Objective failed at the optimum: {}", e);
            return Ok(InnerFit::failed(beta, iterations));
        }
    };

    let slope = problem.slope(v).unwrap_or(f64::INFINITY);
    let converged = reported && beta <= max_beta && slope.abs() <= options.stationarity;
    if reported && !converged {
        tracing::debug!(
            "Rejected optimum beta = {:.6} (max {}), gradient {:.3e}",
            beta,
            max_beta,
            slope
        );
    }

    Ok(InnerFit {
        beta,
        cost,
        converged,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::NonPositivePolicy;
    use crate::model::{initial_state, RateConstants};
    use crate::simulator::Integrator;
    use approx::assert_relative_eq;

    fn objective_for(observed: &[f64]) -> Objective<'_> {
        Objective::new(
            RateConstants::new(1.0 / 5.8, 0.1, 0.01),
            initial_state(1000.0, 10.0),
            observed,
            Integrator::new(1, 1e-10, 1e-10).unwrap(),
            NonPositivePolicy::default(),
        )
    }

    fn exact_curve(beta: f64) -> Vec<f64> {
        let window = [0.0; 40];
        objective_for(&window).predicted(beta).unwrap()
    }

    #[test]
    fn recovers_transmission_rate_from_exact_curve() {
        let observed = exact_curve(0.35);
        let objective = objective_for(&observed);

        let fit = fit_beta(&objective, 0.001, 10.0, &OptimizerSettings::default()).unwrap();
        assert!(fit.converged);
        assert_relative_eq!(fit.beta, 0.35, max_relative = 1e-3);
        assert_relative_eq!(fit.cost, objective.evaluate(fit.beta).unwrap());
    }

    #[test]
    fn converged_fit_beats_the_rest_of_the_box() {
        // Growth from 10 to 34 in five days, with the default box
        let observed = [10.0, 13.0, 16.0, 21.0, 27.0];
        let objective = objective_for(&observed);

        let fit = fit_beta(&objective, 0.001, 100.0, &OptimizerSettings::default()).unwrap();
        assert!(fit.converged);
        assert!(fit.beta > 0.0 && fit.beta < 100.0);
        for beta in [0.001, 0.01, 0.1, 0.35, 1.0, 10.0, 100.0] {
            assert!(fit.cost <= objective.evaluate(beta).unwrap() + 1e-9);
        }
    }

    #[test]
    fn optimum_beyond_the_box_is_not_converged() {
        let observed = exact_curve(0.35);
        let objective = objective_for(&observed);

        let fit = fit_beta(&objective, 0.001, 0.2, &OptimizerSettings::default()).unwrap();
        assert!(!fit.converged);
    }

    #[test]
    fn exhausted_iterations_do_not_count_as_convergence() {
        let observed = exact_curve(0.35);
        let objective = objective_for(&observed);

        let options = OptimizerSettings::default()
            .with_max_iters(1)
            .with_start_grid(1);
        let fit = fit_beta(&objective, 0.001, 10.0, &options).unwrap();
        assert!(!fit.converged);
    }
}
