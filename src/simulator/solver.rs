use diffsol::{
    error::{DiffsolError, OdeSolverError},
    ode_solver::method::OdeSolverMethod,
    Bdf, ConstantOp, LinearOp, NewtonNonlinearSolver, NonLinearOp, NonLinearOpJacobian,
    OdeBuilder, OdeEquations, OdeEquationsRef, OdeSolverStopReason, Op,
};

use crate::model::{Compartment, State};
use crate::simulator::OdeSystem;
use crate::{SeirError, Settings};

type T = f64;
type V = nalgebra::DVector<f64>;
type M = nalgebra::DMatrix<f64>;

const NSTATES: usize = 5;
const H0: f64 = 1e-3;

/// Right-hand side of an [OdeSystem], borrowed for one solver call
struct SystemRhs<'a, S: OdeSystem> {
    system: &'a S,
}

impl<S: OdeSystem> Op for SystemRhs<'_, S> {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        NSTATES
    }
    fn nout(&self) -> usize {
        NSTATES
    }
    fn nparams(&self) -> usize {
        0
    }
}

impl<S: OdeSystem> NonLinearOp for SystemRhs<'_, S> {
    fn call_inplace(&self, x: &Self::V, t: Self::T, y: &mut Self::V) {
        let dx = self.system.rhs(&State::from_column_slice(x.as_slice()), t);
        y.as_mut_slice().copy_from_slice(dx.as_slice());
    }
}

impl<S: OdeSystem> NonLinearOpJacobian for SystemRhs<'_, S> {
    fn jac_mul_inplace(&self, x: &Self::V, t: Self::T, v: &Self::V, y: &mut Self::V) {
        let jv = self.system.jac_mul(
            &State::from_column_slice(x.as_slice()),
            t,
            &State::from_column_slice(v.as_slice()),
        );
        y.as_mut_slice().copy_from_slice(jv.as_slice());
    }
}

/// Fixed initial state
struct SystemInit {
    x0: State,
}

impl Op for SystemInit {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        NSTATES
    }
    fn nout(&self) -> usize {
        NSTATES
    }
    fn nparams(&self) -> usize {
        0
    }
}

impl ConstantOp for SystemInit {
    fn call_inplace(&self, _t: Self::T, y: &mut Self::V) {
        y.as_mut_slice().copy_from_slice(self.x0.as_slice());
    }
}

/// Identity mass; never handed to the solver
struct SystemMass;

impl Op for SystemMass {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        NSTATES
    }
    fn nout(&self) -> usize {
        NSTATES
    }
    fn nparams(&self) -> usize {
        0
    }
}

impl LinearOp for SystemMass {
    fn gemv_inplace(&self, _x: &Self::V, _t: Self::T, _beta: Self::T, _y: &mut Self::V) {}
}

/// No root or output functions are used
struct SystemUnused;

impl Op for SystemUnused {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        NSTATES
    }
    fn nout(&self) -> usize {
        0
    }
    fn nparams(&self) -> usize {
        0
    }
}

impl NonLinearOp for SystemUnused {
    fn call_inplace(&self, _x: &Self::V, _t: Self::T, _y: &mut Self::V) {}
}

/// An [OdeSystem] and its initial state as a diffsol problem
struct SystemProblem<S: OdeSystem> {
    system: S,
    x0: State,
}

impl<S: OdeSystem> Op for SystemProblem<S> {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        NSTATES
    }
    fn nout(&self) -> usize {
        NSTATES
    }
    fn nparams(&self) -> usize {
        0
    }
}

impl<'b, S: OdeSystem> OdeEquationsRef<'b> for SystemProblem<S> {
    type Rhs = SystemRhs<'b, S>;
    type Mass = SystemMass;
    type Init = SystemInit;
    type Root = SystemUnused;
    type Out = SystemUnused;
}

impl<S: OdeSystem> OdeEquations for SystemProblem<S> {
    fn rhs(&self) -> SystemRhs<'_, S> {
        SystemRhs {
            system: &self.system,
        }
    }

    fn mass(&self) -> Option<SystemMass> {
        None
    }

    fn init(&self) -> SystemInit {
        SystemInit { x0: self.x0 }
    }

    fn get_params(&self, _p: &mut V) {}

    fn root(&self) -> Option<SystemUnused> {
        None
    }

    fn out(&self) -> Option<SystemUnused> {
        None
    }

    fn set_params(&mut self, _p: &V) {}
}

/// Adaptive BDF integrator sampled on a uniform grid
///
/// The grid for a horizon of `days` holds `days * steps_per_day` points starting at `t = 0`,
/// spaced `1 / steps_per_day` apart. The solver stops exactly on every grid point it reports.
/// Non-physical values (negative compartments) are returned untouched; consumers decide how
/// to treat them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    steps_per_day: usize,
    rtol: f64,
    atol: f64,
}

impl Integrator {
    pub fn new(steps_per_day: usize, rtol: f64, atol: f64) -> Result<Self, SeirError> {
        if steps_per_day == 0 {
            return Err(SeirError::invalid_setting(
                "steps_per_day",
                steps_per_day,
                "must be at least 1",
            ));
        }
        if !(rtol > 0.0 && atol > 0.0) {
            return Err(SeirError::invalid_setting(
                "tolerance",
                format!("{}/{}", rtol, atol),
                "must be positive",
            ));
        }
        Ok(Self {
            steps_per_day,
            rtol,
            atol,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SeirError> {
        settings.validate()?;
        Self::new(settings.steps_per_day(), settings.rtol, settings.atol)
    }

    pub fn step(&self) -> f64 {
        1.0 / self.steps_per_day as f64
    }

    pub fn steps_per_day(&self) -> usize {
        self.steps_per_day
    }

    /// Integrate `system` from `x0` over `days` days and keep every grid point
    pub fn solve<S: OdeSystem>(
        &self,
        system: &S,
        x0: State,
        days: usize,
    ) -> Result<Trajectory, SeirError> {
        let spd = self.steps_per_day;
        let times = (0..days * spd).map(|k| (k / spd) as f64 + (k % spd) as f64 / spd as f64);
        let states = self.integrate(system, x0, times)?;
        Ok(Trajectory {
            steps_per_day: spd,
            states,
        })
    }

    /// Integrate and keep one state per whole day, `days` states in total
    pub fn solve_daily<S: OdeSystem>(
        &self,
        system: &S,
        x0: State,
        days: usize,
    ) -> Result<Vec<State>, SeirError> {
        self.integrate(system, x0, (0..days).map(|d| d as f64))
    }

    fn integrate<S, I>(&self, system: &S, x0: State, times: I) -> Result<Vec<State>, SeirError>
    where
        S: OdeSystem,
        I: ExactSizeIterator<Item = f64>,
    {
        let mut states = Vec::with_capacity(times.len());
        if times.len() == 0 {
            return Ok(states);
        }

        let problem = OdeBuilder::<M>::new()
            .atol(vec![self.atol; NSTATES])
            .rtol(self.rtol)
            .t0(0.0)
            .h0(H0)
            .build_from_eqn(SystemProblem {
                system: system.clone(),
                x0,
            })?;
        let mut solver: Bdf<
            '_,
            SystemProblem<S>,
            NewtonNonlinearSolver<M, diffsol::NalgebraLU<f64>>,
        > = problem.bdf::<diffsol::NalgebraLU<f64>>()?;

        for t in times {
            if t > 0.0 {
                match solver.set_stop_time(t) {
                    Ok(_) => loop {
                        match solver.step() {
                            Ok(OdeSolverStopReason::InternalTimestep) => continue,
                            Ok(OdeSolverStopReason::TstopReached) => break,
                            Err(DiffsolError::OdeSolverError(
                                OdeSolverError::StepSizeTooSmall { .. },
                            )) => {
                                return Err(SeirError::Solver(format!(
                                    "step size went to zero before t = {}",
                                    t
                                )));
                            }
                            Err(e) => return Err(e.into()),
                            Ok(reason) => {
                                return Err(SeirError::Solver(format!(
                                    "unexpected stop at t = {}: {:?}",
                                    t, reason
                                )));
                            }
                        }
                    },
                    Err(DiffsolError::OdeSolverError(OdeSolverError::StopTimeAtCurrentTime)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            states.push(State::from_column_slice(solver.state().y.as_slice()));
        }
        Ok(states)
    }
}

/// Dense solution on the sampling grid
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    steps_per_day: usize,
    states: Vec<State>,
}

impl Trajectory {
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Grid times in days
    pub fn times(&self) -> Vec<f64> {
        let dt = 1.0 / self.steps_per_day as f64;
        (0..self.states.len()).map(|k| k as f64 * dt).collect()
    }

    /// One state per whole day
    pub fn daily(&self) -> Vec<State> {
        self.states
            .iter()
            .step_by(self.steps_per_day)
            .copied()
            .collect()
    }

    /// Daily values of a single compartment
    pub fn daily_compartment(&self, compartment: Compartment) -> Vec<f64> {
        self.states
            .iter()
            .step_by(self.steps_per_day)
            .map(|x| x[compartment.index()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// dx = -x in every component
    #[derive(Clone)]
    struct Decay;

    impl OdeSystem for Decay {
        fn rhs(&self, x: &State, _t: f64) -> State {
            -x
        }

        fn jac_mul(&self, _x: &State, _t: f64, v: &State) -> State {
            -v
        }
    }

    fn integrator(steps_per_day: usize) -> Integrator {
        Integrator::new(steps_per_day, 1e-10, 1e-12).unwrap()
    }

    #[test]
    fn grid_matches_horizon() {
        let trajectory = integrator(100).solve(&Decay, State::repeat(1.0), 3).unwrap();

        assert_eq!(trajectory.len(), 300);
        assert_eq!(trajectory.daily().len(), 3);
        assert_relative_eq!(trajectory.times()[299], 2.99, epsilon = 1e-12);
        assert_eq!(trajectory.states()[0], State::repeat(1.0));
    }

    #[test]
    fn bdf_tracks_exponential_decay() {
        let daily = integrator(10).solve(&Decay, State::repeat(1.0), 6).unwrap().daily();

        for (day, x) in daily.iter().enumerate() {
            assert_relative_eq!(x[0], (-(day as f64)).exp(), max_relative = 1e-6);
        }
    }

    #[test]
    fn stops_on_sub_day_grid_points() {
        let trajectory = integrator(4).solve(&Decay, State::repeat(1.0), 2).unwrap();
        for (t, x) in trajectory.times().iter().zip(trajectory.states()) {
            assert_relative_eq!(x[3], (-t).exp(), max_relative = 1e-6);
        }
    }

    #[test]
    fn daily_sampling_agrees_with_dense_grid() {
        let dense = integrator(20).solve(&Decay, State::repeat(2.0), 4).unwrap();
        let daily = integrator(20).solve_daily(&Decay, State::repeat(2.0), 4).unwrap();

        assert_eq!(daily.len(), 4);
        for (a, b) in dense.daily().iter().zip(&daily) {
            assert_relative_eq!(a[0], b[0], max_relative = 1e-6);
        }
        assert_eq!(dense.daily_compartment(Compartment::Recovered).len(), 4);
    }

    #[test]
    fn empty_horizon_needs_no_solver() {
        assert!(integrator(10).solve_daily(&Decay, State::repeat(1.0), 0).unwrap().is_empty());
        assert!(integrator(10).solve(&Decay, State::repeat(1.0), 0).unwrap().is_empty());
    }

    #[test]
    fn invalid_grids_and_tolerances_are_rejected() {
        assert!(Integrator::new(0, 1e-8, 1e-8).is_err());
        assert!(Integrator::new(10, 0.0, 1e-8).is_err());
        assert!(Integrator::new(10, 1e-8, -1.0).is_err());
    }
}
