//! Numerical integration of the compartmental model
//!
//! Integration is delegated to the BDF solver of `diffsol`, stopped on every sampling point.
//! The integrator is used in two modes, see [Horizon]: over the observed window while
//! fitting, and over a multiple of it while forecasting.

mod solver;

pub use solver::{Integrator, Trajectory};

use crate::model::State;

/// A time-invariant or time-dependent first-order system `dx/dt = f(x, t)`
///
/// Implementations must be free of side effects: the solver calls [OdeSystem::rhs] several
/// times per step and expects identical inputs to give identical outputs.
pub trait OdeSystem: Clone + 'static {
    fn rhs(&self, x: &State, t: f64) -> State;

    /// Jacobian of [OdeSystem::rhs] at `x` applied to `v`
    fn jac_mul(&self, x: &State, t: f64, v: &State) -> State;
}

/// Integration span relative to the observed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Exactly the observed number of days
    Observed,
    /// The observed number of days times the given multiplier
    Extended(usize),
}

impl Horizon {
    pub fn days(self, observed: usize) -> usize {
        match self {
            Horizon::Observed => observed,
            Horizon::Extended(multiplier) => observed * multiplier,
        }
    }
}
