pub mod data;
pub mod error;
pub mod estimate;
pub mod forecast;
pub mod model;
pub mod report;
pub mod settings;
pub mod simulator;

pub use crate::data::{CaseData, DailyRecord, RegionSeries, SeriesBuilder};
pub use crate::estimate::{Candidate, Estimate, Estimator, NonPositivePolicy, Observer};
pub use crate::forecast::{Curve, Forecast, ForecastPoint};
pub use crate::model::{Compartment, RateConstants};
pub use crate::report::Report;
pub use crate::settings::{OptimizerSettings, Settings};
pub use error::SeirError;

pub mod prelude {
    pub mod data {
        pub use crate::data::{
            ingest::{parse_case_csv, read_case_csv},
            CaseData, DailyRecord, RegionSeries, SeriesBuilder,
        };
    }
    pub mod simulator {
        pub use crate::simulator::{Horizon, Integrator, OdeSystem, Trajectory};
    }
    pub mod estimate {
        pub use crate::estimate::{
            estimate_region, estimate_regions, Candidate, Estimate, Estimator,
            ProgressBarObserver, RegionOutcome, TracingObserver,
        };
    }

    pub use crate::data::*;
    pub use crate::estimate::{NonPositivePolicy, Observer};
    pub use crate::forecast::{Curve, Forecast, ForecastPoint};
    pub use crate::model::{initial_state, Compartment, RateConstants, Seird, State};
    pub use crate::report::{round_half_up, Report};
    pub use crate::settings::{OptimizerSettings, Settings};
    pub use crate::SeirError;
}
