//! Plain-text summary of an estimation run
//!
//! ```text
//! <<Japan>>
//! Beta: 0.412345
//! Kappa: 0.172414
//! Gamma: 0.008123
//! Tau: 0.000412
//! S0: 12345
//! Score: 31234.567890
//! Peak: 2020-04-12 (day 48) 812
//! ```

use std::fmt;

use crate::estimate::Estimate;
use crate::forecast::Forecast;

/// Decimal places used for every reported rate
pub const REPORT_PLACES: u32 = 6;

/// Format `value` with `places` decimals, rounding ties away from zero
///
/// Rounding is decided on the exact binary value, so `0.5` rounds up while `2.675` (stored as
/// `2.67499999...`) rounds down.
pub fn round_half_up(value: f64, places: u32) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    // Far beyond the last significant digit of any double in a sensible range
    let exact = format!("{:.*}", places as usize + 400, value.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let kept = &frac_part[..places as usize];
    let round_up = frac_part
        .as_bytes()
        .get(places as usize)
        .is_some_and(|d| *d >= b'5');

    let mut digits: Vec<u8> = int_part.bytes().chain(kept.bytes()).collect();
    if round_up {
        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
    }

    let split = digits.len() - places as usize;
    let (int_digits, frac_digits) = digits.split_at(split);
    let is_zero = digits.iter().all(|d| *d == b'0');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    let int_digits = String::from_utf8_lossy(int_digits);
    if places == 0 {
        format!("{sign}{int_digits}")
    } else {
        format!("{sign}{int_digits}.{}", String::from_utf8_lossy(frac_digits))
    }
}

/// Text report of an [Estimate], optionally with its [Forecast]
pub struct Report<'a> {
    estimate: &'a Estimate,
    forecast: Option<&'a Forecast>,
}

impl<'a> Report<'a> {
    pub fn new(estimate: &'a Estimate) -> Self {
        Self {
            estimate,
            forecast: None,
        }
    }

    pub fn with_forecast(mut self, forecast: &'a Forecast) -> Self {
        self.forecast = Some(forecast);
        self
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let estimate = self.estimate;
        let rates = estimate.rates();
        writeln!(f, "<<{}>>", estimate.region())?;
        writeln!(f, "Beta: {}", round_half_up(estimate.beta(), REPORT_PLACES))?;
        writeln!(f, "Kappa: {}", round_half_up(rates.kappa, REPORT_PLACES))?;
        writeln!(f, "Gamma: {}", round_half_up(rates.gamma, REPORT_PLACES))?;
        writeln!(f, "Tau: {}", round_half_up(rates.tau, REPORT_PLACES))?;
        writeln!(f, "S0: {}", estimate.susceptible())?;
        write!(f, "Score: {}", round_half_up(estimate.score(), REPORT_PLACES))?;
        if let Some(peak) = self.forecast.and_then(|forecast| forecast.peak()) {
            write!(
                f,
                "\nPeak: {} (day {}) {}",
                peak.date,
                peak.day,
                round_half_up(peak.value, 0)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_round_away_from_zero() {
        assert_eq!(round_half_up(0.5, 0), "1");
        assert_eq!(round_half_up(-0.5, 0), "-1");
        assert_eq!(round_half_up(0.125, 2), "0.13");
        assert_eq!(round_half_up(0.25, 1), "0.3");
    }

    #[test]
    fn uses_the_exact_binary_value() {
        // 2.675 is stored slightly below the tie
        assert_eq!(round_half_up(2.675, 2), "2.67");
        assert_eq!(round_half_up(1.0 / 5.8, 6), "0.172414");
        assert_eq!(round_half_up(5.0 / 30.0 / 2.0, 6), "0.083333");
    }

    #[test]
    fn carries_through_nines() {
        assert_eq!(round_half_up(9.9999996, 6), "10.000000");
        assert_eq!(round_half_up(-0.0000001, 6), "0.000000");
        assert_eq!(round_half_up(12.0, 6), "12.000000");
    }

    #[test]
    fn non_finite_values_pass_through() {
        assert_eq!(round_half_up(f64::NEG_INFINITY, 6), "-inf");
        assert_eq!(round_half_up(f64::NAN, 6), "NaN");
    }
}
