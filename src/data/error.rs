//! Data validation errors

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while building or deriving constants from a [`crate::RegionSeries`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The series contains no observations
    #[error("Series for {region} is empty")]
    EmptySeries { region: String },

    /// Total confirmed count is zero, so per-day rates are undefined
    #[error("Series for {region} has zero total confirmed cases")]
    ZeroConfirmed { region: String },

    /// An observation is dated before its predecessor
    #[error("Series for {region} is not in ascending date order at {date}")]
    UnorderedDates { region: String, date: NaiveDate },

    /// Two observations share the same date
    #[error("Series for {region} has more than one observation on {date}")]
    DuplicateDate { region: String, date: NaiveDate },

    /// A calendar day is missing between two observations
    #[error("Series for {region} has no observation between {after} and {before}")]
    MissingDay {
        region: String,
        after: NaiveDate,
        before: NaiveDate,
    },

    /// The population must be strictly positive
    #[error("Population for {region} must be positive")]
    InvalidPopulation { region: String },

    /// The susceptible scan range `[last confirmed, population]` would be empty
    #[error("Population {population} for {region} is below the last confirmed count {confirmed}")]
    PopulationBelowConfirmed {
        region: String,
        population: u64,
        confirmed: u64,
    },
}
