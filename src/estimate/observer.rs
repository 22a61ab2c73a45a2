use indicatif::{ProgressBar, ProgressStyle};

use crate::estimate::{Candidate, Estimate, Estimator};

/// Progress hook of the outer scan
///
/// [Observer::on_improvement] is called every time a new best candidate is found; the other
/// hooks are optional. Any `FnMut(&Candidate)` closure is an observer of improvements.
pub trait Observer {
    /// Called for every scanned susceptible count, in ascending order
    fn on_candidate(&mut self, _candidate: &Candidate) {}

    /// Called when `best` improves on every earlier candidate
    fn on_improvement(&mut self, best: &Candidate);

    /// Called once with the final estimate
    fn on_finish(&mut self, _estimate: &Estimate) {}
}

impl<F> Observer for F
where
    F: FnMut(&Candidate),
{
    fn on_improvement(&mut self, best: &Candidate) {
        self(best)
    }
}

/// Logs improvements and the final estimate through `tracing`
#[derive(Debug, Clone)]
pub struct TracingObserver {
    region: String,
}

impl TracingObserver {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl Observer for TracingObserver {
    fn on_improvement(&mut self, best: &Candidate) {
        tracing::info!(
            "{}: new best S0 = {}, beta = {:.6}, score = {:.6}",
            self.region,
            best.susceptible,
            best.beta,
            best.score
        );
    }

    fn on_finish(&mut self, estimate: &Estimate) {
        tracing::info!(
            "{}: scanned {} initial susceptible counts{}, best S0 = {}, beta = {:.6}",
            self.region,
            estimate.scanned(),
            if estimate.stopped_early() {
                " (stopped early)"
            } else {
                ""
            },
            estimate.susceptible(),
            estimate.beta()
        );
    }
}

/// Terminal progress bar over the susceptible range
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new(len: u64) -> Self {
        let bar = ProgressBar::new(len);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            bar.set_style(style);
        }
        Self { bar }
    }

    /// A bar sized to the scan range of `estimator`
    pub fn for_estimator(estimator: &Estimator) -> Self {
        let range = estimator.scan_range();
        Self::new((range.end() - range.start()).saturating_add(1))
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

impl Observer for ProgressBarObserver {
    fn on_candidate(&mut self, _candidate: &Candidate) {
        self.bar.inc(1);
    }

    fn on_improvement(&mut self, best: &Candidate) {
        self.bar
            .set_message(format!("S0 {} beta {:.6}", best.susceptible, best.beta));
    }

    fn on_finish(&mut self, estimate: &Estimate) {
        self.bar.finish_with_message(format!(
            "S0 {} beta {:.6} score {:.6}",
            estimate.susceptible(),
            estimate.beta(),
            estimate.score()
        ));
    }
}
