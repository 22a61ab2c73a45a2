use rayon::prelude::*;

use crate::data::RegionSeries;
use crate::estimate::{Estimate, Estimator};
use crate::forecast::Forecast;
use crate::{SeirError, Settings};

/// Estimate and forecast of one region in a batch
#[derive(Debug, Clone)]
pub struct RegionOutcome {
    pub region: String,
    pub result: Result<(Estimate, Forecast), SeirError>,
}

impl RegionOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fit and forecast a single region
pub fn estimate_region(
    series: &RegionSeries,
    settings: &Settings,
) -> Result<(Estimate, Forecast), SeirError> {
    let estimate = Estimator::new(series, settings)?.run()?;
    let forecast = Forecast::new(&estimate, series, settings)?;
    Ok((estimate, forecast))
}

/// Fit and forecast every region in parallel
///
/// Regions are independent: a failure is recorded in that region's outcome and the rest of
/// the batch continues. Outcomes keep the order of `regions`.
pub fn estimate_regions(regions: &[RegionSeries], settings: &Settings) -> Vec<RegionOutcome> {
    regions
        .par_iter()
        .map(|series| {
            let result = estimate_region(series, settings);
            if let Err(e) = &result {
                tracing::warn!("Estimation failed for {}: {}", series.name(), e);
            }
            RegionOutcome {
                region: series.name().to_string(),
                result,
            }
        })
        .collect()
}
