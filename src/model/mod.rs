//! The compartmental model and its fixed rate constants

mod constants;
mod seird;

pub use constants::RateConstants;
pub use seird::{initial_state, Compartment, Seird, State};
