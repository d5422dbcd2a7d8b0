//! Empirical distribution tables.
//!
//! `CdfTable` encodes a piecewise-linear continuous CDF as parallel arrays
//! of breakpoints and cumulative probabilities; `CdfDiscreteTable` encodes a
//! step CDF over integer values. Builders validate monotonicity and that
//! the cumulative mass reaches 1, so sampling can assume a well-formed
//! table.

use crate::error::{Result, SimError};

const PROB_EPS: f64 = 1e-6;

/// Piecewise-linear continuous CDF.
///
/// `xs` holds `n` breakpoints delimiting `n - 1` segments; `ys[i]` is the
/// cumulative probability at the right edge of segment `i`, so the last
/// meaningful entry (`ys[n - 2]`) must be 1.
#[derive(Debug, Clone)]
pub struct CdfTable {
    xs: Vec<f64>,
    ys: Vec<f64>,
    segments: usize,
}

impl CdfTable {
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() < 2 || xs.len() != ys.len() {
            return Err(SimError::config(
                "cdf table: need parallel arrays with at least two entries",
            ));
        }
        let n = xs.len();
        for i in 1..n {
            if ys[i] < ys[i - 1] {
                return Err(SimError::config(
                    "cdf table: y values must be non-decreasing",
                ));
            }
            if xs[i] < xs[i - 1] {
                return Err(SimError::config("cdf table: x values must be increasing"));
            }
        }
        if ys.iter().any(|y| !(0.0..=1.0 + PROB_EPS).contains(y)) {
            return Err(SimError::config(
                "cdf table: y values must be in the range 0 to 1",
            ));
        }
        if (ys[n - 2] - 1.0).abs() > PROB_EPS {
            return Err(SimError::config(
                "cdf table: cumulative probability must reach 1",
            ));
        }
        Ok(CdfTable {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            segments: n - 1,
        })
    }

    /// Invert the CDF at probability `p` by linear interpolation.
    pub(crate) fn invert(&self, p: f64) -> f64 {
        let mut i = self.segments - 1;
        for j in 0..self.segments {
            if p <= self.ys[j] {
                i = j;
                break;
            }
        }
        let x1 = self.xs[i];
        let x2 = self.xs[i + 1];
        let y1 = if i == 0 { 0.0 } else { self.ys[i - 1] };
        let y2 = self.ys[i];
        if y2 == y1 {
            return x1;
        }
        let grad = (x2 - x1) / (y2 - y1);
        x1 + (p - y1) * grad
    }
}

/// Step CDF over integer values, built from individual probabilities.
#[derive(Debug, Clone)]
pub struct CdfDiscreteTable {
    values: Vec<i64>,
    cumulative: Vec<f64>,
}

impl CdfDiscreteTable {
    pub fn new(values: &[i64], probs: &[f64]) -> Result<Self> {
        if values.is_empty() || values.len() != probs.len() {
            return Err(SimError::config(
                "discrete cdf table: need parallel non-empty arrays",
            ));
        }
        if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(SimError::config(
                "discrete cdf table: probabilities must be in the range 0 to 1",
            ));
        }
        let mut cumulative = Vec::with_capacity(probs.len());
        let mut total = 0.0;
        for p in probs {
            total += p;
            cumulative.push(total);
        }
        if (total - 1.0).abs() > PROB_EPS {
            return Err(SimError::config(
                "discrete cdf table: cumulative probability must equal 1",
            ));
        }
        Ok(CdfDiscreteTable {
            values: values.to_vec(),
            cumulative,
        })
    }

    pub(crate) fn invert(&self, u: f64) -> i64 {
        for (i, c) in self.cumulative.iter().enumerate() {
            if u <= *c {
                return self.values[i];
            }
        }
        self.values[self.values.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_requires_monotone_axes() {
        assert!(CdfTable::new(&[0.0, 1.0, 0.5], &[0.5, 1.0, 1.0]).is_err());
        assert!(CdfTable::new(&[0.0, 1.0, 2.0], &[0.8, 0.5, 1.0]).is_err());
    }

    #[test]
    fn continuous_requires_full_mass() {
        assert!(CdfTable::new(&[0.0, 1.0, 2.0], &[0.5, 0.9, 0.9]).is_err());
        assert!(CdfTable::new(&[0.0, 1.0, 2.0], &[0.5, 1.0, 1.0]).is_ok());
    }

    #[test]
    fn continuous_interpolates() {
        // uniform over [0, 2]: two segments of mass 0.5 each
        let t = CdfTable::new(&[0.0, 1.0, 2.0], &[0.5, 1.0, 1.0]).unwrap();
        assert!((t.invert(0.25) - 0.5).abs() < 1e-12);
        assert!((t.invert(0.5) - 1.0).abs() < 1e-12);
        assert!((t.invert(0.75) - 1.5).abs() < 1e-12);
        assert!((t.invert(1.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn discrete_requires_unit_mass() {
        assert!(CdfDiscreteTable::new(&[1, 2], &[0.5, 0.4]).is_err());
        assert!(CdfDiscreteTable::new(&[], &[]).is_err());
        assert!(CdfDiscreteTable::new(&[1, 2], &[0.5, 0.5]).is_ok());
    }

    #[test]
    fn discrete_tolerates_rounding() {
        // thirds do not sum to 1 exactly in binary; must stay inside 1e-6
        let t = CdfDiscreteTable::new(&[1, 2, 3], &[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]).unwrap();
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn discrete_inverts_steps() {
        let t = CdfDiscreteTable::new(&[5, 10, 15], &[0.3, 0.5, 0.2]).unwrap();
        assert_eq!(t.invert(0.0), 5);
        assert_eq!(t.invert(0.3), 5);
        assert_eq!(t.invert(0.31), 10);
        assert_eq!(t.invert(0.8), 10);
        assert_eq!(t.invert(0.99), 15);
        assert_eq!(t.invert(1.0), 15);
    }
}
