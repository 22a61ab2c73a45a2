//! Observed case data for a region
//!
//! [RegionSeries] is the input of the estimation pipeline. It is produced either directly
//! through [RegionSeries::builder] or from a case file through [ingest::read_case_csv].

mod error;
pub mod ingest;
pub mod series;

pub use error::DataError;
pub use ingest::{parse_case_csv, read_case_csv, CaseData, IngestError};
pub use series::{DailyRecord, RegionSeries, SeriesBuilder};
