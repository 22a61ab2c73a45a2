//! Projection of a fitted model beyond the observed window
//!
//! The best `(S0*, beta*)` is integrated over the forecast horizon, sampled once per day and
//! split into infectious, recovered and deceased curves. A curve ends with its first negative
//! value: that value is emitted and everything after it is cut off.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::RegionSeries;
use crate::estimate::Estimate;
use crate::model::{Compartment, Seird, State};
use crate::simulator::{Horizon, Integrator};
use crate::{SeirError, Settings};

/// One daily value of a forecast curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Days since the first observation
    pub day: usize,
    pub date: NaiveDate,
    pub value: f64,
}

/// Daily values of one compartment, ending at the first negative value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    compartment: Compartment,
    points: Vec<ForecastPoint>,
}

impl Curve {
    /// Build a curve from daily values, up to and including the first negative value
    ///
    /// NaN is not negative, so it does not end a curve.
    pub fn truncated(compartment: Compartment, values: &[f64], start: NaiveDate) -> Self {
        let mut points = Vec::with_capacity(values.len());
        for (day, &value) in values.iter().enumerate() {
            points.push(ForecastPoint {
                day,
                date: date_after(start, day),
                value,
            });
            if value < 0.0 {
                break;
            }
        }
        Self {
            compartment,
            points,
        }
    }

    pub fn compartment(&self) -> Compartment {
        self.compartment
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point with the largest value; the earliest one on ties
    pub fn peak(&self) -> Option<ForecastPoint> {
        self.points.iter().fold(None, |best, p| match best {
            Some(b) if b.value >= p.value => Some(b),
            _ => Some(*p),
        })
    }

    /// Apply the truncation rule again; a curve that was already truncated is unchanged
    pub fn retruncate(&self) -> Self {
        let start = match self.points.first() {
            Some(p) => p.date,
            None => return self.clone(),
        };
        Curve::truncated(self.compartment, &self.values(), start)
    }
}

fn date_after(start: NaiveDate, day: usize) -> NaiveDate {
    start
        .checked_add_days(Days::new(day as u64))
        .unwrap_or(NaiveDate::MAX)
}

/// Forecast of a fitted region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    horizon: usize,
    infectious: Curve,
    recovered: Curve,
    deceased: Curve,
    peak: Option<ForecastPoint>,
}

impl Forecast {
    /// Integrate the best fit of `estimate` over `forecast_multiplier` times the observed window
    pub fn new(
        estimate: &Estimate,
        series: &RegionSeries,
        settings: &Settings,
    ) -> Result<Self, SeirError> {
        Self::with_horizon(
            estimate,
            series.start_date(),
            Horizon::Extended(settings.forecast_multiplier).days(series.len()),
            settings,
        )
    }

    /// Integrate the best fit of `estimate` over `days` days starting at `start`
    pub fn with_horizon(
        estimate: &Estimate,
        start: NaiveDate,
        days: usize,
        settings: &Settings,
    ) -> Result<Self, SeirError> {
        let model = Seird::new(estimate.beta(), *estimate.rates());
        let forecast = Self::project(&model, *estimate.initial(), start, days, settings)?;
        match forecast.peak {
            Some(p) => tracing::debug!(
                "{}: infections peak on {} at {:.1}",
                estimate.region(),
                p.date,
                p.value
            ),
            None => tracing::warn!("{}: forecast has no infectious points", estimate.region()),
        }
        Ok(forecast)
    }

    /// Integrate `model` from `initial` over `days` days and end each curve at its first
    /// negative value
    pub fn project(
        model: &Seird,
        initial: State,
        start: NaiveDate,
        days: usize,
        settings: &Settings,
    ) -> Result<Self, SeirError> {
        let solver = Integrator::from_settings(settings)?;
        let trajectory = solver.solve(model, initial, days)?;

        let curve = |compartment| {
            Curve::truncated(
                compartment,
                &trajectory.daily_compartment(compartment),
                start,
            )
        };
        let infectious = curve(Compartment::Infectious);
        let recovered = curve(Compartment::Recovered);
        let deceased = curve(Compartment::Deceased);
        let peak = infectious.peak();

        Ok(Self {
            horizon: days,
            infectious,
            recovered,
            deceased,
            peak,
        })
    }

    /// Requested horizon in days; every curve has at most this many points
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn infectious(&self) -> &Curve {
        &self.infectious
    }

    pub fn recovered(&self) -> &Curve {
        &self.recovered
    }

    pub fn deceased(&self) -> &Curve {
        &self.deceased
    }

    pub fn curve(&self, compartment: Compartment) -> Option<&Curve> {
        match compartment {
            Compartment::Infectious => Some(&self.infectious),
            Compartment::Recovered => Some(&self.recovered),
            Compartment::Deceased => Some(&self.deceased),
            Compartment::Susceptible | Compartment::Exposed => None,
        }
    }

    /// Day and value of the largest infectious count, if any point was emitted
    pub fn peak(&self) -> Option<ForecastPoint> {
        self.peak
    }
}
