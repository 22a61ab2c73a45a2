use serde::{Deserialize, Serialize};

use crate::model::RateConstants;
use crate::simulator::OdeSystem;

/// Compartment values `(S, E, I, R, D)`
pub type State = nalgebra::SVector<f64, 5>;

/// The five compartments of the model, in state-vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compartment {
    Susceptible,
    Exposed,
    Infectious,
    Recovered,
    Deceased,
}

impl Compartment {
    pub const ALL: [Compartment; 5] = [
        Compartment::Susceptible,
        Compartment::Exposed,
        Compartment::Infectious,
        Compartment::Recovered,
        Compartment::Deceased,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            Compartment::Susceptible => 0,
            Compartment::Exposed => 1,
            Compartment::Infectious => 2,
            Compartment::Recovered => 3,
            Compartment::Deceased => 4,
        }
    }
}

/// Initial state used by the fit: `(S0, 0, I0, 0, 0)`
pub fn initial_state(susceptible: f64, infectious: f64) -> State {
    State::new(susceptible, 0.0, infectious, 0.0, 0.0)
}

/// Susceptible-Exposed-Infectious-Recovered-Deceased model for a fixed transmission rate
///
/// ```text
/// dS = -beta*S*I/N
/// dE =  beta*S*I/N - kappa*E
/// dI =  kappa*E - gamma*I - tau*I
/// dR =  gamma*I
/// dD =  tau*I
/// ```
///
/// with `N = S+E+I+R+D`. The derivative components sum to zero, so `N` is conserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seird {
    beta: f64,
    rates: RateConstants,
}

impl Seird {
    pub fn new(beta: f64, rates: RateConstants) -> Self {
        Self { beta, rates }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn rates(&self) -> &RateConstants {
        &self.rates
    }
}

impl OdeSystem for Seird {
    #[inline(always)]
    fn rhs(&self, x: &State, _t: f64) -> State {
        let (s, e, i) = (x[0], x[1], x[2]);
        let n = x.sum();
        let RateConstants { kappa, gamma, tau } = self.rates;

        let infection = if n != 0.0 { self.beta * s * i / n } else { 0.0 };
        let onset = kappa * e;
        let recovery = gamma * i;
        let death = tau * i;

        State::new(
            -infection,
            infection - onset,
            onset - recovery - death,
            recovery,
            death,
        )
    }

    #[inline(always)]
    fn jac_mul(&self, x: &State, _t: f64, v: &State) -> State {
        let (s, i) = (x[0], x[2]);
        let n = x.sum();
        let RateConstants { kappa, gamma, tau } = self.rates;

        // Directional derivative of beta*S*I/N
        let infection = if n != 0.0 {
            self.beta * ((i * v[0] + s * v[2]) / n - s * i * v.sum() / (n * n))
        } else {
            0.0
        };
        let onset = kappa * v[1];

        State::new(
            -infection,
            infection - onset,
            onset - (gamma + tau) * v[2],
            gamma * v[2],
            tau * v[2],
        )
    }
}
