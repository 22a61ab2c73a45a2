use serde::{Deserialize, Serialize};

use crate::data::{DataError, RegionSeries};

/// Fixed epidemiological rates of a region
///
/// `kappa` is the exposed-to-infectious transition rate, `gamma` the recovery rate and `tau`
/// the mortality rate, all per day. They are computed once per region and held fixed while
/// the transmission rate is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateConstants {
    pub kappa: f64,
    pub gamma: f64,
    pub tau: f64,
}

impl RateConstants {
    pub fn new(kappa: f64, gamma: f64, tau: f64) -> Self {
        Self { kappa, gamma, tau }
    }

    /// Derive the rates from a whole observed series
    ///
    /// ```text
    /// kappa = 1 / latent_period
    /// gamma = sum(recovered) / sum(confirmed) / n
    /// tau   = sum(deaths)    / sum(confirmed) / n
    /// ```
    ///
    /// These are crude averages over the observed window, not per-step estimates.
    pub fn derive(series: &RegionSeries, latent_period: f64) -> Result<Self, DataError> {
        let confirmed = series.total_confirmed();
        if confirmed == 0 {
            return Err(DataError::ZeroConfirmed {
                region: series.name().to_string(),
            });
        }
        let confirmed = confirmed as f64;
        let n = series.len() as f64;
        Ok(Self {
            kappa: 1.0 / latent_period,
            gamma: series.total_recovered() as f64 / confirmed / n,
            tau: series.total_deaths() as f64 / confirmed / n,
        })
    }
}
