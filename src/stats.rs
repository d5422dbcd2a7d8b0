//! Statistics collectors: `Tally`, `Accumulate` and `Histogram`.
//!
//! `Tally` collects time-independent observations, `Accumulate` collects
//! time-weighted (piecewise-constant) signals, and `Histogram` is a `Tally`
//! with equal-width bins plus an underflow and an overflow bin. The design
//! follows the SIMULA report conventions: each collector renders a single
//! report row, and `heading()` / `ending()` frame a block of rows.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{Result, SimError};

const REPORT_WIDTH: usize = 120;

/// Snapshot of a collector, exportable by clients.
#[derive(Debug, Clone, Serialize)]
pub struct StatSummary {
    pub title: String,
    pub reset_at: f64,
    pub obs: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Half-length of the 95% confidence interval.
    pub confidence95: f64,
}

fn heading_line() -> String {
    "-".repeat(REPORT_WIDTH)
}

/// Report block header shared by all collectors.
pub fn heading() -> String {
    let mut s = String::new();
    let _ = writeln!(s, "{}", heading_line());
    let _ = writeln!(
        s,
        "{:<20}{:<10}{:<10}{:<16}{:<16}{:<16}{:<16}{:<16}",
        "TITLE", "(RE)SET", "OBS.", "MEAN", "STDEV", "MINIMUM", "MAXIMUM", "CONFIDENCE%95"
    );
    let _ = writeln!(s, "{}", heading_line());
    s
}

/// Report block footer.
pub fn ending() -> String {
    format!("{}\n", heading_line())
}

fn report_row(s: &StatSummary) -> String {
    format!(
        "{:<20}{:<10.3}{:<10}{:<16.3}{:<16.3}{:<16.3}{:<16.3}{:<16.3}\n",
        s.title, s.reset_at, s.obs, s.mean, s.std_dev, s.min, s.max, s.confidence95
    )
}

/// Upper p-quantile of Student's t distribution with `df` degrees of
/// freedom, after Dirk Grunwald's approximation. Returns infinity when the
/// quantile is undefined (p ≤ 0 or df = 0).
pub fn t_value(p: f64, df: u64) -> f64 {
    let p = if p >= 0.5 { 1.0 - p } else { p };
    if p <= 0.0 || df == 0 {
        return f64::INFINITY;
    }
    if p == 0.5 {
        return 0.0;
    }
    let t = if df == 1 {
        1.0 / ((p + p) * 1.570_796_33).tan()
    } else if df == 2 {
        (1.0 / ((p + p) * (1.0 - p)) - 2.0).sqrt()
    } else {
        let df = df as f64;
        let mut a = (1.0 / (p * p)).ln().sqrt();
        let aa = a * a;
        a -= (2.515517 + (0.802853 * a) + (0.010328 * aa))
            / (1.0 + (1.432788 * a) + (0.189269 * aa) + (0.001308 * aa * a));
        let t = df - 0.666666667 + 1.0 / (10.0 * df);
        (df * ((a * a * (df - 0.833333333) / (t * t)).exp() - 1.0)).sqrt()
    };
    t.abs()
}

fn confidence_half_length(level: f64, obs: u64, std_dev: f64) -> f64 {
    if obs <= 1 {
        return f64::INFINITY;
    }
    let df = obs - 1;
    let t = t_value((1.0 - level) / 2.0, df);
    if t.is_infinite() {
        return t;
    }
    (t * std_dev) / (df as f64).sqrt()
}

// ─── Tally ────────────────────────────────────────────────────

/// Time-independent sample collector.
#[derive(Debug, Clone)]
pub struct Tally {
    title: String,
    obs: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
    reset_at: f64,
}

impl Tally {
    pub fn new(title: impl Into<String>) -> Self {
        Tally {
            title: title.into(),
            obs: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: 0.0,
            max: 0.0,
            reset_at: 0.0,
        }
    }

    /// Discard all samples and restart the collection at `time`.
    pub fn reset(&mut self, time: f64) {
        self.obs = 0;
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.min = 0.0;
        self.max = 0.0;
        self.reset_at = time;
    }

    /// Record one observation. The time argument is accepted for interface
    /// symmetry with [`Accumulate`] and does not enter the statistics.
    pub fn update(&mut self, v: f64, _time: f64) {
        self.obs += 1;
        self.sum += v;
        self.sum_sq += v * v;
        if self.obs == 1 {
            self.min = v;
            self.max = v;
        } else if v < self.min {
            self.min = v;
        } else if v > self.max {
            self.max = v;
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn obs(&self) -> u64 {
        self.obs
    }

    pub fn reset_at(&self) -> f64 {
        self.reset_at
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        if self.obs == 0 {
            return 0.0;
        }
        self.sum / self.obs as f64
    }

    pub fn variance(&self) -> f64 {
        if self.obs == 0 {
            return 0.0;
        }
        let n = self.obs as f64;
        ((self.sum_sq - self.sum * self.sum / n) / n).abs()
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Half-length of the confidence interval at the given level.
    pub fn confidence(&self, level: f64) -> f64 {
        confidence_half_length(level, self.obs, self.std_dev())
    }

    pub fn summary(&self) -> StatSummary {
        StatSummary {
            title: self.title.clone(),
            reset_at: self.reset_at,
            obs: self.obs,
            mean: self.mean(),
            std_dev: self.std_dev(),
            min: self.min,
            max: self.max,
            confidence95: self.confidence(0.95),
        }
    }

    /// One formatted report row.
    pub fn report(&self) -> String {
        report_row(&self.summary())
    }
}

// ─── Accumulate ───────────────────────────────────────────────

/// Time-weighted sample collector. The recorded signal is treated as
/// piecewise constant: each `update(v, t)` closes the segment held at the
/// previous value and starts a new one at `v`.
#[derive(Debug, Clone)]
pub struct Accumulate {
    title: String,
    obs: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
    reset_at: f64,
    last_time: f64,
    last_v: f64,
}

impl Accumulate {
    pub fn new(title: impl Into<String>) -> Self {
        Accumulate {
            title: title.into(),
            obs: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: 0.0,
            max: 0.0,
            reset_at: 0.0,
            last_time: 0.0,
            last_v: 0.0,
        }
    }

    pub fn reset(&mut self, time: f64) {
        self.obs = 0;
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.min = 0.0;
        self.max = 0.0;
        self.reset_at = time;
        self.last_time = time;
        self.last_v = 0.0;
    }

    pub fn update(&mut self, v: f64, time: f64) {
        self.obs += 1;
        let span = time - self.last_time;
        self.sum += self.last_v * span;
        self.sum_sq += v * v * span;
        self.last_time = time;
        self.last_v = v;
        if self.obs == 1 {
            self.min = v;
            self.max = v;
        } else if v < self.min {
            self.min = v;
        } else if v > self.max {
            self.max = v;
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn obs(&self) -> u64 {
        self.obs
    }

    pub fn reset_at(&self) -> f64 {
        self.reset_at
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn last_value(&self) -> f64 {
        self.last_v
    }

    /// Time-weighted mean over the span observed so far; 0 over an empty
    /// span.
    pub fn mean(&self) -> f64 {
        let span = self.last_time - self.reset_at;
        if span == 0.0 {
            return 0.0;
        }
        self.sum / span
    }

    pub fn variance(&self) -> f64 {
        let span = self.last_time - self.reset_at;
        if span == 0.0 {
            return 0.0;
        }
        (self.sum_sq / span - self.mean().powi(2)).abs()
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn confidence(&self, level: f64) -> f64 {
        confidence_half_length(level, self.obs, self.std_dev())
    }

    pub fn summary(&self) -> StatSummary {
        StatSummary {
            title: self.title.clone(),
            reset_at: self.reset_at,
            obs: self.obs,
            mean: self.mean(),
            std_dev: self.std_dev(),
            min: self.min,
            max: self.max,
            confidence95: self.confidence(0.95),
        }
    }

    pub fn report(&self) -> String {
        report_row(&self.summary())
    }
}

// ─── Histogram ────────────────────────────────────────────────

/// A `Tally` with equal-width cells. Cell 0 counts samples below `lower`,
/// cell `n_cells + 1` counts samples at or above `upper`.
#[derive(Debug, Clone)]
pub struct Histogram {
    tally: Tally,
    lower: f64,
    upper: f64,
    width: f64,
    n_cells: usize,
    table: Vec<u64>,
}

impl Histogram {
    pub fn new(title: impl Into<String>, lower: f64, upper: f64, n_cells: usize) -> Result<Self> {
        if lower >= upper {
            return Err(SimError::config("histogram: lower >= upper"));
        }
        if n_cells < 1 {
            return Err(SimError::config("histogram: fewer than one cell"));
        }
        Ok(Histogram {
            tally: Tally::new(title),
            lower,
            upper,
            width: (upper - lower) / n_cells as f64,
            n_cells,
            table: vec![0; n_cells + 2],
        })
    }

    pub fn reset(&mut self, time: f64) {
        self.tally.reset(time);
        self.table.iter_mut().for_each(|c| *c = 0);
    }

    pub fn update(&mut self, v: f64, time: f64) {
        self.tally.update(v, time);
        let limit = self.n_cells + 1;
        let offset = v - self.lower;
        let cell = if offset < 0.0 {
            0
        } else {
            ((offset / self.width).round() as usize + 1).min(limit)
        };
        self.table[cell] += 1;
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn cell_count(&self, cell: usize) -> u64 {
        self.table[cell]
    }

    pub fn summary(&self) -> StatSummary {
        self.tally.summary()
    }

    /// The tally row followed by a star-bar chart, the largest cell scaled
    /// to 40 stars.
    pub fn report(&self) -> String {
        let mut s = self.tally.report();
        s.push_str(&ending());
        let _ = writeln!(
            s,
            "{:>10}{:>10}{:>10}{:>10}{:>10}",
            "CELLs", "LOWER", "COUNT", "FREQUENCY", "CUM %"
        );
        s.push('\n');
        let limit = self.n_cells + 1;
        let largest = self.table.iter().copied().max().unwrap_or(0);
        let scale = if largest > 0 { 40.0 / largest as f64 } else { 0.0 };
        let obs = self.tally.obs();
        let mut cum = 0.0;
        for cell in 0..=limit {
            let count = self.table[cell];
            let freq = if obs > 0 { count as f64 / obs as f64 } else { 0.0 };
            cum += freq * 100.0;
            let lower_label = if cell == 0 {
                "-infinity".to_string()
            } else {
                format!("{:.3}", self.lower + (cell - 1) as f64 * self.width)
            };
            let bar = "*".repeat((scale * count as f64).round() as usize);
            let _ = writeln!(
                s,
                "{cell:>10}{lower_label:>10}{count:>10}{freq:>10.2}{cum:>10.2}  |{bar}"
            );
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_moments() {
        let mut t = Tally::new("response");
        for v in [2.0, 4.0, 6.0] {
            t.update(v, 0.0);
        }
        assert_eq!(t.obs(), 3);
        assert!((t.mean() - 4.0).abs() < 1e-12);
        // population variance of {2, 4, 6}
        assert!((t.variance() - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(t.min(), 2.0);
        assert_eq!(t.max(), 6.0);
    }

    #[test]
    fn tally_empty_mean_is_zero() {
        let t = Tally::new("empty");
        assert_eq!(t.mean(), 0.0);
        assert_eq!(t.variance(), 0.0);
    }

    #[test]
    fn accumulate_constant_signal_means_the_constant() {
        let mut a = Accumulate::new("queue");
        a.update(3.0, 0.0);
        a.update(3.0, 7.5);
        a.update(3.0, 42.0);
        assert!((a.mean() - 3.0).abs() < 1e-12);
        assert!(a.variance().abs() < 1e-9);
    }

    #[test]
    fn accumulate_integrates_steps() {
        let mut a = Accumulate::new("n");
        a.update(0.0, 0.0);
        a.update(2.0, 10.0); // held 0 over [0,10]
        a.update(2.0, 20.0); // held 2 over [10,20]
        assert!((a.mean() - 1.0).abs() < 1e-12);
        assert_eq!(a.max(), 2.0);
        assert_eq!(a.min(), 0.0);
    }

    #[test]
    fn accumulate_zero_span_mean_is_zero() {
        let mut a = Accumulate::new("point");
        a.update(5.0, 0.0);
        assert_eq!(a.mean(), 0.0);
    }

    #[test]
    fn histogram_rejects_bad_bounds() {
        assert!(Histogram::new("h", 10.0, 10.0, 4).is_err());
        assert!(Histogram::new("h", 0.0, 10.0, 0).is_err());
    }

    #[test]
    fn histogram_binning_with_overflow_cells() {
        let mut h = Histogram::new("h", 0.0, 10.0, 5).unwrap();
        h.update(-1.0, 0.0); // underflow
        h.update(0.4, 0.0); // cell 1 (round(0.2) = 0)
        h.update(3.0, 0.0); // round(1.5) = 2 -> cell 3
        h.update(25.0, 0.0); // clamped to overflow cell 6
        assert_eq!(h.cell_count(0), 1);
        assert_eq!(h.cell_count(1), 1);
        assert_eq!(h.cell_count(3), 1);
        assert_eq!(h.cell_count(6), 1);
        assert_eq!(h.tally().obs(), 4);
    }

    #[test]
    fn t_quantiles_match_tables() {
        // two-sided 95% quantiles: t(0.025, df)
        assert!((t_value(0.025, 1) - 12.706).abs() < 0.05);
        assert!((t_value(0.025, 2) - 4.303).abs() < 0.01);
        assert!((t_value(0.025, 10) - 2.228).abs() < 0.02);
        assert!((t_value(0.025, 120) - 1.980).abs() < 0.02);
        assert_eq!(t_value(0.5, 10), 0.0);
        assert!(t_value(0.025, 0).is_infinite());
    }

    #[test]
    fn confidence_undefined_below_two_obs() {
        let mut t = Tally::new("one");
        t.update(1.0, 0.0);
        assert!(t.confidence(0.95).is_infinite());
    }

    #[test]
    fn summaries_serialize_for_export() {
        let mut t = Tally::new("response");
        t.update(2.0, 0.0);
        t.update(6.0, 0.0);
        let json = serde_json::to_string(&t.summary()).unwrap();
        assert!(json.contains("\"mean\":4.0"));
        assert!(json.contains("\"obs\":2"));
    }

    #[test]
    fn report_rows_render() {
        let mut t = Tally::new("Thru times");
        for v in [4.612, 18.379, 38.664] {
            t.update(v, 0.0);
        }
        let block = format!("{}{}{}", heading(), t.report(), ending());
        assert!(block.contains("Thru times"));
        assert!(block.contains("TITLE"));
    }
}
