//! Random variate generation.
//!
//! A [`Random`] owns a seeded [`Mt19937_64`] engine and derives every
//! supported distribution from its uniform output (or from the Polar-method
//! normal base). With a fixed seed, two runs that execute the same sequence
//! of sampler calls produce identical results.
//!
//! Algorithm choices follow the classical simulation literature: Polar
//! rejection for normals (no trigonometry, bounded rejection rate),
//! Marsaglia & Tsang (2000) for gamma with the `U^{1/α}` transform below
//! α = 1, direct event counting for Poisson up to λ = 30 and Atkinson's
//! acceptance-rejection beyond, inverse-CDF for the triangular.

mod mt;
mod table;

pub use mt::Mt19937_64;
pub use table::{CdfDiscreteTable, CdfTable};

use crate::error::{Result, SimError};

/// Seeded random variate generator.
#[derive(Debug, Clone)]
pub struct Random {
    engine: Mt19937_64,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Random {
            engine: Mt19937_64::new(seed),
        }
    }

    /// Direct access to the underlying engine, e.g. for `rand`
    /// distributions.
    pub fn engine_mut(&mut self) -> &mut Mt19937_64 {
        &mut self.engine
    }

    /// Uniform real in [0, 1).
    pub fn next_double(&mut self) -> f64 {
        self.engine.next_f64()
    }

    /// Uniform real in [0, 1), excluding 0. Used where a logarithm of the
    /// sample is taken.
    fn next_positive(&mut self) -> f64 {
        loop {
            let u = self.next_double();
            if u > 0.0 {
                return u;
            }
        }
    }

    /// Uniform integer in [lower, upper).
    pub fn next_integer(&mut self, lower: i64, upper: i64) -> Result<i64> {
        if upper < lower {
            return Err(SimError::config(
                "uniform distribution: upper limit below lower limit",
            ));
        }
        Ok((self.next_double() * (upper - lower) as f64) as i64 + lower)
    }

    /// Uniform real in [lower, upper).
    pub fn next_uniform(&mut self, lower: f64, upper: f64) -> Result<f64> {
        if upper < lower {
            return Err(SimError::config(
                "uniform distribution: upper limit below lower limit",
            ));
        }
        Ok(self.next_double() * (upper - lower) + lower)
    }

    /// Exponential variate with the given mean.
    pub fn next_exponential(&mut self, mean: f64) -> f64 {
        -mean * self.next_positive().ln()
    }

    /// Standard normal via Box–Muller.
    pub fn next_unit_normal_bm(&mut self) -> f64 {
        let u = self.next_positive();
        let v = self.next_double();
        (-2.0 * u.ln()).sqrt() * (std::f64::consts::PI * 2.0 * v).cos()
    }

    /// Normal via Box–Muller.
    pub fn next_normal_bm(&mut self, mean: f64, std_dev: f64) -> f64 {
        mean + std_dev * self.next_unit_normal_bm()
    }

    /// Normal via the Polar rejection method.
    pub fn next_normal(&mut self, mean: f64, std_dev: f64) -> Result<f64> {
        if mean < 0.0 {
            return Err(SimError::config("normal distribution: negative mean"));
        }
        if std_dev < 0.0 {
            return Err(SimError::config(
                "normal distribution: negative standard deviation",
            ));
        }
        Ok(mean + self.polar_unit_normal() * std_dev)
    }

    fn polar_unit_normal(&mut self) -> f64 {
        loop {
            let v1 = 2.0 * self.next_double() - 1.0;
            let v2 = 2.0 * self.next_double() - 1.0;
            let s = v1 * v1 + v2 * v2;
            if s < 1.0 && s != 0.0 {
                return v1 * ((-2.0 * s.ln()) / s).sqrt();
            }
        }
    }

    /// Normal rejected below zero; resamples until non-negative.
    pub fn next_trunc_normal(&mut self, mean: f64, std_dev: f64) -> Result<f64> {
        loop {
            let x = self.next_normal(mean, std_dev)?;
            if x >= 0.0 {
                return Ok(x);
            }
        }
    }

    /// Log-normal: exp of a normal with the given (log-scale) parameters.
    pub fn next_log_normal(&mut self, mean: f64, std_dev: f64) -> Result<f64> {
        if mean < 0.0 {
            return Err(SimError::config("log-normal distribution: negative mean"));
        }
        if std_dev < 0.0 {
            return Err(SimError::config(
                "log-normal distribution: negative standard deviation",
            ));
        }
        Ok(self.next_normal(mean, std_dev)?.exp())
    }

    /// Erlang variate of order `k` with mean `m`.
    ///
    /// Small orders multiply k uniforms and take one logarithm; larger
    /// orders sample the equivalent Gamma(k, m/k).
    pub fn next_erlang(&mut self, k: u32, m: f64) -> Result<f64> {
        if k == 0 {
            return Err(SimError::config("erlang distribution: order must be positive"));
        }
        if k < 7 {
            let mut u = 1.0;
            for _ in 0..k {
                u *= self.next_positive();
            }
            Ok(-(m / k as f64) * u.ln())
        } else {
            self.next_gamma(k as f64, m / k as f64)
        }
    }

    /// Gamma variate with shape `alpha` and scale `beta`, both > 0.
    pub fn next_gamma(&mut self, alpha: f64, beta: f64) -> Result<f64> {
        if alpha <= 0.0 || beta <= 0.0 {
            return Err(SimError::config(
                "gamma distribution: alpha and beta must be positive",
            ));
        }
        if (alpha - 1.0).abs() <= f64::EPSILON {
            Ok(self.next_exponential(beta))
        } else if alpha < 1.0 {
            Ok(beta * self.gamma_marsaglia_transform(alpha))
        } else {
            Ok(beta * self.gamma_marsaglia2000(alpha))
        }
    }

    /// Marsaglia & Tsang (2000), valid for alpha > 1.
    fn gamma_marsaglia2000(&mut self, alpha: f64) -> f64 {
        let d = alpha - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let (x, v) = loop {
                let x = self.next_unit_normal_bm();
                let v = 1.0 + c * x;
                if v > 0.0 {
                    break (x, v);
                }
            };
            let v = v * v * v;
            let u = self.next_positive();
            if u < 1.0 - 0.0331 * (x * x) * (x * x) {
                return d * v;
            }
            if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
    }

    /// Shape transform for alpha < 1 (note at the end of section 6 of the
    /// Marsaglia & Tsang paper).
    fn gamma_marsaglia_transform(&mut self, alpha: f64) -> f64 {
        self.gamma_marsaglia2000(1.0 + alpha) * self.next_positive().powf(1.0 / alpha)
    }

    /// Beta variate from a ratio of gammas.
    pub fn next_beta(&mut self, alpha: f64, beta: f64) -> Result<f64> {
        if beta == 0.0 {
            return Err(SimError::config("beta distribution: beta equal to zero"));
        }
        let z = self.next_gamma(alpha, 1.0)?;
        Ok(z / (z + self.next_gamma(beta, 1.0)?))
    }

    /// Chi-square with `n` degrees of freedom.
    pub fn next_chi_square(&mut self, n: u32) -> Result<f64> {
        self.next_gamma(0.5 * n as f64, 2.0)
    }

    /// Student-t with `n` degrees of freedom.
    pub fn next_student_t(&mut self, n: u32) -> Result<f64> {
        let z = self.next_normal(0.0, 1.0)?;
        Ok(z / (self.next_chi_square(n)? / n as f64).sqrt())
    }

    /// F distribution with `n1` and `n2` degrees of freedom.
    pub fn next_f(&mut self, n1: u32, n2: u32) -> Result<f64> {
        Ok((n2 as f64 * self.next_chi_square(n1)?) / (n1 as f64 * self.next_chi_square(n2)?))
    }

    /// Poisson variate with mean `lambda`.
    ///
    /// Counts exponential inter-arrivals for small lambda; Atkinson's
    /// acceptance-rejection (Banks, p. 166) beyond 30.
    pub fn next_poisson(&mut self, lambda: f64) -> Result<f64> {
        if lambda <= 0.0 {
            return Err(SimError::config("poisson distribution: lambda must be positive"));
        }
        if lambda <= 30.0 {
            let a = (-lambda).exp();
            let mut p = 1.0;
            let mut x: i64 = -1;
            while p > a {
                p *= self.next_double();
                x += 1;
            }
            return Ok(x as f64);
        }
        let a = std::f64::consts::PI * (lambda / 3.0).sqrt();
        let b = a / lambda;
        let c = 0.767 - 3.36 / lambda;
        let d = c.ln() - b.ln() - lambda;
        loop {
            let y = loop {
                let u = self.next_positive();
                let y = (a - ((1.0 - u) / u).ln()) / b;
                if y > -0.5 {
                    break y;
                }
            };
            let x = (y + 0.5).floor();
            let v = self.next_positive();
            let lhs = a - b * y + (v / (1.0 + (a - b * y).exp()).powi(2)).ln();
            let rhs = d + x * lambda.ln() - ln_factorial(x as u64);
            if lhs <= rhs {
                return Ok(x);
            }
        }
    }

    /// Geometric variate (number of failures before the first success).
    pub fn next_geometric(&mut self, p: f64) -> Result<f64> {
        if p <= 0.0 || p >= 1.0 {
            return Err(SimError::config(
                "geometric distribution: probability must be strictly between 0 and 1",
            ));
        }
        let a = 1.0 / (1.0 - p).ln();
        Ok((a * self.next_positive().ln()).floor())
    }

    /// Weibull variate with shape `alpha` and scale `beta`.
    pub fn next_weibull(&mut self, alpha: f64, beta: f64) -> Result<f64> {
        if alpha <= 0.0 || beta <= 0.0 {
            return Err(SimError::config(
                "weibull distribution: alpha and beta must be positive",
            ));
        }
        Ok(beta * (-self.next_positive().ln()).powf(1.0 / alpha))
    }

    /// Binomial variate: successes in `n` Bernoulli trials.
    pub fn next_binomial(&mut self, p: f64, n: u32) -> Result<f64> {
        if !(0.0..=1.0).contains(&p) {
            return Err(SimError::config(
                "binomial distribution: probability must be in the range 0 to 1",
            ));
        }
        let mut x = 0u32;
        for _ in 0..n {
            if p > self.next_double() {
                x += 1;
            }
        }
        Ok(x as f64)
    }

    /// Negative binomial variate: sum of `r` geometrics.
    pub fn next_neg_binomial(&mut self, p: f64, r: u32) -> Result<f64> {
        if p <= 0.0 || p >= 1.0 {
            return Err(SimError::config(
                "negative binomial distribution: probability must be strictly between 0 and 1",
            ));
        }
        let mut x = 0.0;
        for _ in 0..r {
            x += self.next_geometric(p)?;
        }
        Ok(x)
    }

    /// Triangular variate over [a, c] with mode `b`, by inverse CDF on the
    /// modal parameter (b - a) / (c - a).
    pub fn next_triangular(&mut self, a: f64, b: f64, c: f64) -> Result<f64> {
        if b < a || c < b || a == c {
            return Err(SimError::config("triangular distribution: mode out of range"));
        }
        let u = self.next_double();
        let beta = (b - a) / (c - a);
        let t = if u < beta {
            (beta * u).sqrt()
        } else {
            1.0 - ((1.0 - beta) * (1.0 - u)).sqrt()
        };
        Ok(a + (c - a) * t)
    }

    /// Bernoulli trial: does an event with probability `p` occur?
    pub fn probability(&mut self, p: f64) -> Result<bool> {
        if !(0.0..=1.0).contains(&p) {
            return Err(SimError::config(
                "probability values must be in the range 0 to 1",
            ));
        }
        Ok(p >= self.next_double())
    }

    /// Continuous empirical variate from a piecewise-linear CDF table.
    pub fn next_continuous(&mut self, table: &CdfTable) -> f64 {
        let p = self.next_double();
        table.invert(p)
    }

    /// Like [`Self::next_continuous`] but inverting at a caller-supplied
    /// probability (common-random-number and antithetic experiments).
    pub fn continuous_at(&self, table: &CdfTable, p: f64) -> f64 {
        table.invert(p)
    }

    /// Discrete empirical variate from a step CDF table.
    pub fn next_discrete(&mut self, table: &CdfDiscreteTable) -> i64 {
        let u = self.next_double();
        table.invert(u)
    }

    /// Like [`Self::next_discrete`] at a caller-supplied probability.
    pub fn discrete_at(&self, table: &CdfDiscreteTable, u: f64) -> i64 {
        table.invert(u)
    }
}

/// ln(n!): exact summation for small n, Stirling series beyond.
fn ln_factorial(n: u64) -> f64 {
    if n < 2 {
        return 0.0;
    }
    if n <= 20 {
        return (2..=n).map(|i| (i as f64).ln()).sum();
    }
    let x = n as f64;
    let x2 = x * x;
    x * x.ln() - x + 0.5 * (2.0 * std::f64::consts::PI * x).ln() + 1.0 / (12.0 * x)
        - 1.0 / (360.0 * x * x2)
}
