use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::DataError;

/// Cumulative case counts reported for one calendar day
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRecord {
    date: NaiveDate,
    confirmed: u64,
    deaths: u64,
    recovered: u64,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, confirmed: u64, deaths: u64, recovered: u64) -> Self {
        Self {
            date,
            confirmed,
            deaths,
            recovered,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn confirmed(&self) -> u64 {
        self.confirmed
    }

    pub fn deaths(&self) -> u64 {
        self.deaths
    }

    pub fn recovered(&self) -> u64 {
        self.recovered
    }

    /// Currently infected cases, `confirmed - deaths - recovered`
    ///
    /// Inconsistent source data can make this negative. The value is not clamped.
    pub fn infected(&self) -> i64 {
        self.confirmed as i64 - self.deaths as i64 - self.recovered as i64
    }
}

/// Validated daily time series for one region
///
/// A [RegionSeries] is immutable once built. It guarantees at least one observation,
/// strictly consecutive calendar days, and a population large enough to contain the last
/// confirmed count.
///
/// # Examples
///
/// ```
/// use seirfit::RegionSeries;
///
/// let series = RegionSeries::builder("Atlantis", 1000)
///     .observation(10, 0, 0)
///     .observation(20, 0, 5)
///     .build()
///     .unwrap();
///
/// assert_eq!(series.len(), 2);
/// assert_eq!(series.infected(), vec![10.0, 15.0]);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawSeries")]
pub struct RegionSeries {
    name: String,
    population: u64,
    records: Vec<DailyRecord>,
}

/// Unvalidated wire form; deserialization goes through [RegionSeries::new]
#[derive(Deserialize)]
struct RawSeries {
    name: String,
    population: u64,
    records: Vec<DailyRecord>,
}

impl TryFrom<RawSeries> for RegionSeries {
    type Error = DataError;

    fn try_from(raw: RawSeries) -> Result<Self, Self::Error> {
        RegionSeries::new(raw.name, raw.population, raw.records)
    }
}

impl RegionSeries {
    /// Validate and wrap a list of daily records
    pub fn new(
        name: impl Into<String>,
        population: u64,
        records: Vec<DailyRecord>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        if records.is_empty() {
            return Err(DataError::EmptySeries { region: name });
        }
        if population == 0 {
            return Err(DataError::InvalidPopulation { region: name });
        }
        for pair in records.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if next == prev {
                return Err(DataError::DuplicateDate {
                    region: name,
                    date: next,
                });
            }
            if next < prev {
                return Err(DataError::UnorderedDates {
                    region: name,
                    date: next,
                });
            }
            if prev.checked_add_days(Days::new(1)) != Some(next) {
                return Err(DataError::MissingDay {
                    region: name,
                    after: prev,
                    before: next,
                });
            }
        }
        let last = records[records.len() - 1].confirmed;
        if population < last {
            return Err(DataError::PopulationBelowConfirmed {
                region: name,
                population,
                confirmed: last,
            });
        }
        Ok(Self {
            name,
            population,
            records,
        })
    }

    /// Start building a series of consecutive days
    pub fn builder(name: impl Into<String>, population: u64) -> SeriesBuilder {
        SeriesBuilder {
            name: name.into(),
            population,
            start: NaiveDate::default(),
            records: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn population(&self) -> u64 {
        self.population
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    /// Number of observed days
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false for a validated series, present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.records[0].date
    }

    /// Calendar date `day` days after the first observation
    pub fn date_at(&self, day: usize) -> Option<NaiveDate> {
        self.start_date().checked_add_days(Days::new(day as u64))
    }

    pub fn last_confirmed(&self) -> u64 {
        self.records[self.records.len() - 1].confirmed
    }

    pub fn min_confirmed(&self) -> u64 {
        self.records
            .iter()
            .map(|r| r.confirmed)
            .min()
            .unwrap_or_default()
    }

    pub fn total_confirmed(&self) -> u64 {
        self.records.iter().map(|r| r.confirmed).sum()
    }

    pub fn total_deaths(&self) -> u64 {
        self.records.iter().map(|r| r.deaths).sum()
    }

    pub fn total_recovered(&self) -> u64 {
        self.records.iter().map(|r| r.recovered).sum()
    }

    /// Observed infected counts as floats, one per day
    pub fn infected(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.infected() as f64).collect()
    }

    /// Per-day `(date, infected, recovered, deaths)` for stacked bar rendering
    pub fn stacked(&self) -> Vec<(NaiveDate, i64, u64, u64)> {
        self.records
            .iter()
            .map(|r| (r.date, r.infected(), r.recovered, r.deaths))
            .collect()
    }
}

/// Builder for a [RegionSeries] over consecutive days
pub struct SeriesBuilder {
    name: String,
    population: u64,
    start: NaiveDate,
    records: Vec<DailyRecord>,
}

impl SeriesBuilder {
    /// Date of the first observation added with [SeriesBuilder::observation]
    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.start = date;
        self
    }

    /// Append a record with an explicit date
    pub fn record(mut self, record: DailyRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Append the counts for the day after the previous observation
    pub fn observation(self, confirmed: u64, deaths: u64, recovered: u64) -> Self {
        let date = match self.records.last() {
            Some(last) => last.date.checked_add_days(Days::new(1)).unwrap_or(last.date),
            None => self.start,
        };
        self.record(DailyRecord::new(date, confirmed, deaths, recovered))
    }

    pub fn build(self) -> Result<RegionSeries, DataError> {
        RegionSeries::new(self.name, self.population, self.records)
    }
}
