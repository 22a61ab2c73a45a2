//! Ingestion of the multi-country case file
//!
//! The file lists cumulative counts per province and date. Rows are aggregated per
//! `Country/Region` and date, and each country can then be turned into a [RegionSeries].
//!
//! Recognized columns are `ObservationDate`, `Country/Region`, `Confirmed`, `Deaths` and
//! `Recovered`; any other column is ignored. Dates are `MM/DD/YYYY`, with two-digit years
//! (`MM/DD/YY`) read as `20YY`.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{Days, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

use crate::data::{DailyRecord, RegionSeries};
use crate::SeirError;

/// Errors raised while reading or normalizing a case file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Error encountered when reading CSV data
    #[error("CSV error: {0}")]
    CSVError(String),
    /// The observation date is neither `MM/DD/YYYY` nor `MM/DD/YY`
    #[error("Invalid observation date {raw:?} on line {line}")]
    InvalidDate { raw: String, line: u64 },
    /// A count column does not hold a non-negative number
    #[error("Invalid {column} count {raw:?} on line {line}")]
    InvalidCount {
        column: &'static str,
        raw: String,
        line: u64,
    },
    /// The requested region is not present in the file
    #[error("Region {0} is not present in the case data")]
    UnknownRegion(String),
}

#[derive(Deserialize, Debug)]
struct Row {
    #[serde(rename = "ObservationDate")]
    date: String,
    #[serde(rename = "Country/Region")]
    country: String,
    #[serde(rename = "Confirmed", default)]
    confirmed: String,
    #[serde(rename = "Deaths", default)]
    deaths: String,
    #[serde(rename = "Recovered", default)]
    recovered: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Counts {
    confirmed: f64,
    deaths: f64,
    recovered: f64,
}

/// Case counts aggregated by country and date
#[derive(Debug, Clone, Default)]
pub struct CaseData {
    regions: BTreeMap<String, BTreeMap<NaiveDate, Counts>>,
}

/// Read a case file from disk
pub fn read_case_csv(path: impl AsRef<Path>) -> Result<CaseData, IngestError> {
    let file =
        std::fs::File::open(path.as_ref()).map_err(|e| IngestError::CSVError(e.to_string()))?;
    parse_case_csv(file)
}

/// Parse case data from any reader
pub fn parse_case_csv<R: Read>(reader: R) -> Result<CaseData, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut data = CaseData::default();
    for (index, result) in reader.deserialize::<Row>().enumerate() {
        let row = result.map_err(|e| IngestError::CSVError(e.to_string()))?;
        // Header is line 1
        let line = index as u64 + 2;
        let date = normalize_date(&row.date).ok_or_else(|| IngestError::InvalidDate {
            raw: row.date.clone(),
            line,
        })?;
        let counts = Counts {
            confirmed: parse_count("Confirmed", &row.confirmed, line)?,
            deaths: parse_count("Deaths", &row.deaths, line)?,
            recovered: parse_count("Recovered", &row.recovered, line)?,
        };
        data.add(row.country, date, counts);
    }
    Ok(data)
}

impl CaseData {
    fn add(&mut self, region: String, date: NaiveDate, counts: Counts) {
        let entry = self
            .regions
            .entry(region)
            .or_default()
            .entry(date)
            .or_default();
        entry.confirmed += counts.confirmed;
        entry.deaths += counts.deaths;
        entry.recovered += counts.recovered;
    }

    /// Names of every region present in the file, sorted
    pub fn regions(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }

    /// Build a validated series for one region
    ///
    /// Calendar days missing between the first and last reported date are filled with the
    /// previous day's cumulative counts.
    pub fn series(&self, region: &str, population: u64) -> Result<RegionSeries, SeirError> {
        let dates = self
            .regions
            .get(region)
            .ok_or_else(|| IngestError::UnknownRegion(region.to_string()))?;

        let mut records: Vec<DailyRecord> = Vec::with_capacity(dates.len());
        for (&date, counts) in dates {
            if let Some(prev) = records.last().copied() {
                let mut day = prev.date();
                while let Some(next) = day.checked_add_days(Days::new(1)) {
                    if next >= date {
                        break;
                    }
                    records.push(DailyRecord::new(
                        next,
                        prev.confirmed(),
                        prev.deaths(),
                        prev.recovered(),
                    ));
                    day = next;
                }
            }
            records.push(DailyRecord::new(
                date,
                to_count(counts.confirmed),
                to_count(counts.deaths),
                to_count(counts.recovered),
            ));
        }

        Ok(RegionSeries::new(region, population, records)?)
    }
}

fn to_count(value: f64) -> u64 {
    value.round().max(0.0) as u64
}

fn parse_count(column: &'static str, raw: &str, line: u64) -> Result<f64, IngestError> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(IngestError::InvalidCount {
            column,
            raw: raw.to_string(),
            line,
        }),
    }
}

/// Parse `MM/DD/YYYY`, correcting a two-digit year to `20YY`
pub(crate) fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.split('/');
    let (month, day, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let year = match year.len() {
        2 => format!("20{year}"),
        4 => year.to_string(),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
SNo,ObservationDate,Province/State,Country/Region,Last Update,Confirmed,Deaths,Recovered
1,01/22/2020,Hubei,Mainland China,1/22/2020 17:00,444.0,17.0,28.0
2,01/22/2020,Beijing,Mainland China,1/22/2020 17:00,14.0,0.0,0.0
3,01/22/2020,,Japan,1/22/2020 17:00,2.0,0.0,0.0
4,01/23/20,Hubei,Mainland China,1/23/20 17:00,444.0,17.0,28.0
5,01/23/20,Beijing,Mainland China,1/23/20 17:00,22.0,0.0,0.0
6,01/25/2020,,Japan,1/25/2020 17:00,3.0,0.0,1.0
";

    #[test]
    fn two_digit_years_are_corrected() {
        assert_eq!(
            normalize_date("01/23/20"),
            NaiveDate::from_ymd_opt(2020, 1, 23)
        );
        assert_eq!(
            normalize_date("12/31/2020"),
            NaiveDate::from_ymd_opt(2020, 12, 31)
        );
        assert_eq!(normalize_date("2020-01-23"), None);
        assert_eq!(normalize_date("13/01/2020"), None);
    }

    #[test]
    fn rows_are_aggregated_by_country() {
        let data = parse_case_csv(CSV.as_bytes()).unwrap();
        assert_eq!(data.regions(), vec!["Japan", "Mainland China"]);

        let china = data.series("Mainland China", 1_400_000_000).unwrap();
        assert_eq!(china.len(), 2);
        assert_eq!(china.records()[0].confirmed(), 458);
        assert_eq!(china.records()[1].confirmed(), 466);
        assert_eq!(china.records()[1].deaths(), 17);
    }

    #[test]
    fn gaps_are_forward_filled() {
        let data = parse_case_csv(CSV.as_bytes()).unwrap();
        let japan = data.series("Japan", 120_000_000).unwrap();

        let confirmed: Vec<u64> = japan.records().iter().map(|r| r.confirmed()).collect();
        assert_eq!(confirmed, vec![2, 2, 2, 3]);
        assert_eq!(japan.records()[3].recovered(), 1);
    }

    #[test]
    fn unknown_region_is_reported() {
        let data = parse_case_csv(CSV.as_bytes()).unwrap();
        let err = data.series("Atlantis", 10).unwrap_err();
        assert_eq!(
            err,
            SeirError::Ingest(IngestError::UnknownRegion("Atlantis".to_string()))
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_date = "ObservationDate,Country/Region,Confirmed,Deaths,Recovered\n2020-01-01,X,1,0,0\n";
        assert!(matches!(
            parse_case_csv(bad_date.as_bytes()),
            Err(IngestError::InvalidDate { line: 2, .. })
        ));

        let bad_count = "ObservationDate,Country/Region,Confirmed,Deaths,Recovered\n01/01/2020,X,-1,0,0\n";
        assert!(matches!(
            parse_case_csv(bad_count.as_bytes()),
            Err(IngestError::InvalidCount {
                column: "Confirmed",
                ..
            })
        ));
    }
}
