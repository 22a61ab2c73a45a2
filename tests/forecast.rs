use approx::assert_relative_eq;
use chrono::NaiveDate;
use seirfit::model::{initial_state, Seird, State};
use seirfit::*;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 22).unwrap()
}

fn fitted() -> (RegionSeries, Estimate, Settings) {
    let series = RegionSeries::builder("Fitted", 2000)
        .starting(start())
        .observation(10, 0, 0)
        .observation(14, 0, 1)
        .observation(19, 0, 2)
        .observation(26, 1, 4)
        .observation(34, 1, 6)
        .build()
        .unwrap();
    let settings = Settings::default()
        .with_step(0.1)
        .with_stall_threshold(50);
    let estimate = Estimator::new(&series, &settings).unwrap().run().unwrap();
    (series, estimate, settings)
}

#[test]
fn horizon_is_a_multiple_of_the_observed_window() {
    let (series, estimate, settings) = fitted();
    let forecast = Forecast::new(&estimate, &series, &settings).unwrap();

    assert_eq!(forecast.horizon(), 30);
    for compartment in [
        Compartment::Infectious,
        Compartment::Recovered,
        Compartment::Deceased,
    ] {
        let curve = forecast.curve(compartment).unwrap();
        assert!(curve.len() <= forecast.horizon());
        let values = curve.values();
        if let Some((_, body)) = values.split_last() {
            assert!(body.iter().all(|v| *v >= 0.0));
        }
        assert_eq!(&curve.retruncate(), curve);
    }
    assert!(forecast.curve(Compartment::Exposed).is_none());
}

#[test]
fn forecast_starts_from_the_fitted_initial_state() {
    let (series, estimate, settings) = fitted();
    let forecast = Forecast::new(&estimate, &series, &settings).unwrap();

    let first = forecast.infectious().points()[0];
    assert_eq!(first.day, 0);
    assert_eq!(first.date, start());
    assert_relative_eq!(first.value, 10.0);
    assert_eq!(forecast.recovered().points()[0].value, 0.0);
}

#[test]
fn peak_is_the_largest_infectious_point() {
    let (series, estimate, settings) = fitted();
    let forecast = Forecast::new(&estimate, &series, &settings).unwrap();

    let peak = forecast.peak().unwrap();
    let values = forecast.infectious().values();
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(peak.value, max);
    assert_eq!(values[peak.day], max);
    assert_eq!(
        peak.date,
        start() + chrono::Days::new(peak.day as u64)
    );
}

#[test]
fn curve_keeps_its_first_negative_value() {
    let curve = Curve::truncated(Compartment::Infectious, &[10.0, -5.0, 3.0, -1.0], start());
    assert_eq!(curve.values(), vec![10.0, -5.0]);
    assert_eq!(curve.points()[1].date, start() + chrono::Days::new(1));
    assert_eq!(curve.peak().map(|p| (p.day, p.value)), Some((0, 10.0)));
}

#[test]
fn divergent_curve_is_cut_at_first_negative_value() {
    // With a negative onset rate E feeds I negatively: I(t) = 20 - 10 exp(t / 2),
    // which crosses zero between day one and day two
    let model = Seird::new(0.0, RateConstants::new(-0.5, 0.0, 0.0));
    let initial = State::new(100.0, 10.0, 10.0, 0.0, 0.0);
    let settings = Settings::default().with_step(0.5);

    let forecast = Forecast::project(&model, initial, start(), 8, &settings).unwrap();

    let infectious = forecast.infectious().values();
    assert_eq!(infectious.len(), 3);
    assert_relative_eq!(infectious[0], 10.0);
    assert_relative_eq!(infectious[1], 20.0 - 10.0 * 0.5_f64.exp(), max_relative = 1e-6);
    assert_relative_eq!(infectious[2], 20.0 - 10.0 * 1.0_f64.exp(), max_relative = 1e-6);
    assert!(infectious[2] < 0.0);
    assert_eq!(forecast.recovered().len(), 8);
    assert_eq!(forecast.deceased().len(), 8);
    let peak = forecast.peak().unwrap();
    assert_eq!((peak.day, peak.value), (0, 10.0));
}

#[test]
fn repeated_forecasts_are_identical() {
    let (series, estimate, settings) = fitted();
    let first = Forecast::new(&estimate, &series, &settings).unwrap();
    let second = Forecast::new(&estimate, &series, &settings).unwrap();
    assert_eq!(first, second);
}

#[test]
fn growth_fit_stays_inside_the_default_box() {
    let (series, estimate, settings) = fitted();
    assert_eq!(settings.max_beta, Settings::default().max_beta);
    assert!(estimate.beta() > 0.0);
    assert!(estimate.beta() < settings.max_beta);
    assert!(estimate.score().is_finite());

    // The chosen beta is no worse than a sweep over the box for the same S0
    let estimator = Estimator::new(&series, &settings).unwrap();
    let objective = estimator.objective(estimate.susceptible());
    let cost = -estimate.score();
    for beta in [0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0] {
        assert!(cost <= objective.evaluate(beta).unwrap() + 1e-9);
    }
}

#[test]
fn zero_horizon_has_no_peak() {
    let model = Seird::new(0.3, RateConstants::new(0.2, 0.1, 0.0));
    let forecast =
        Forecast::project(&model, initial_state(100.0, 1.0), start(), 0, &Settings::default())
            .unwrap();

    assert!(forecast.infectious().is_empty());
    assert_eq!(forecast.peak(), None);
}
