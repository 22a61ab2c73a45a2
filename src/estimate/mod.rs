//! Two-level maximum-likelihood fit of the initial susceptible count and the transmission rate
//!
//! [Objective] scores a single beta for a fixed initial state. The inner fit minimizes it with
//! L-BFGS over `ln(beta)`, and [Estimator] scans the initial susceptible count
//! around it with a stall-based early stop. Progress is reported through an [Observer].

mod batch;
mod engine;
mod inner;
mod objective;
mod observer;

pub use batch::{estimate_region, estimate_regions, RegionOutcome};
pub use engine::{Candidate, Estimate, Estimator};
pub use objective::{NonPositivePolicy, Objective};
pub use observer::{Observer, ProgressBarObserver, TracingObserver};
