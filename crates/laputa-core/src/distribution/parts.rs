//! The five component families a [`Distribution`](super::Distribution) mixes.
//!
//! Every family lives on [0, 1]; the parent distribution rescales samples
//! into its own `[min, max]` range.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;

use super::special::{abnormal_beta, beta_cdf, beta_pdf, gaussian_cdf, gaussian_pdf};
use crate::context::round_half_up;

/// Height reported for a point mass at its own location.
pub const POINT_PDF_HEIGHT: f64 = 99999.9;

/// Bucket bounds around `x` for discrete CDF interpolation.
///
/// When `x` sits exactly on a boundary the bucket is widened toward the
/// middle of the range, so the interpolation never divides by zero.
pub(crate) fn bucket(x: f64, parts: u32) -> (f64, f64) {
    let p = parts as f64;
    let mut x0 = (x * p).floor() / p;
    let mut x1 = (x * p).ceil() / p;
    if x1 <= x0 {
        if x0 < 0.5 {
            x1 += 1.0 / p;
        } else {
            x0 -= 1.0 / p;
        }
    }
    (x0, x1)
}

fn interpolate_cdf(x: f64, parts: u32, cdf: impl Fn(f64) -> f64) -> f64 {
    let (x0, x1) = bucket(x, parts);
    let y0 = cdf(x0.clamp(0.0, 1.0));
    let y1 = cdf(x1.clamp(0.0, 1.0));
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Point mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointDistribution {
    pub value: f64,
}

impl Default for PointDistribution {
    fn default() -> Self {
        Self { value: 0.5 }
    }
}

impl PointDistribution {
    pub fn pdf(&self, x: f64) -> f64 {
        if x == self.value {
            POINT_PDF_HEIGHT
        } else {
            0.0
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x < self.value {
            0.0
        } else {
            1.0
        }
    }

    pub fn cdf_discrete(&self, x: f64, parts: u32) -> f64 {
        interpolate_cdf(x, parts, |t| self.cdf(t))
    }

    /// Samples at `i / n` for `i` in `0..=n`, scaled so the trapezoid mass is `n`.
    pub fn render(&self, n: usize) -> Vec<f64> {
        let mut vals = vec![0.0; n + 1];
        let k = (round_half_up(self.value * n as f64).max(0) as usize).min(n);
        vals[k] = if k == 0 || k == n {
            2.0 * n as f64
        } else {
            n as f64
        };
        vals
    }
}

/// Uniform interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalDistribution {
    pub lower: f64,
    pub upper: f64,
}

impl Default for IntervalDistribution {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }
}

impl IntervalDistribution {
    pub fn pdf(&self, x: f64) -> f64 {
        if x >= self.lower && x <= self.upper && self.upper > self.lower {
            1.0 / (self.upper - self.lower)
        } else {
            0.0
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x < self.lower {
            0.0
        } else if x > self.upper || self.upper <= self.lower {
            1.0
        } else {
            (x - self.lower) / (self.upper - self.lower)
        }
    }

    pub fn cdf_discrete(&self, x: f64, parts: u32) -> f64 {
        interpolate_cdf(x, parts, |t| self.cdf(t))
    }

    pub fn render(&self, n: usize) -> Vec<f64> {
        let mut vals = vec![0.0; n + 1];
        let l = (round_half_up(self.lower * n as f64).max(0) as usize).min(n);
        let r = (round_half_up(self.upper * n as f64).max(0) as usize).min(n);
        if r <= l {
            // collapsed to a single sample
            vals[l] = n as f64;
            return vals;
        }
        let v = n as f64 / (r - l) as f64;
        for val in vals.iter_mut().take(r + 1).skip(l) {
            *val = v;
        }
        vals
    }
}

/// Normal distribution truncated to [0, 1] and renormalised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalDistribution {
    pub midpt: f64,
    pub stddev: f64,
}

impl Default for NormalDistribution {
    fn default() -> Self {
        Self {
            midpt: 0.5,
            stddev: 0.1,
        }
    }
}

impl NormalDistribution {
    fn truncated_mass(&self) -> f64 {
        gaussian_cdf(1.0 - self.midpt, self.stddev) - gaussian_cdf(-self.midpt, self.stddev)
    }

    pub fn pdf(&self, x: f64) -> f64 {
        let tot = self.truncated_mass();
        if tot <= 0.0 {
            return 0.0;
        }
        gaussian_pdf(x - self.midpt, self.stddev) / tot
    }

    pub fn cdf(&self, x: f64) -> f64 {
        let tot = self.truncated_mass();
        if tot <= 0.0 {
            return if x < self.midpt { 0.0 } else { 1.0 };
        }
        (gaussian_cdf(x - self.midpt, self.stddev) - gaussian_cdf(-self.midpt, self.stddev)) / tot
    }

    pub fn cdf_discrete(&self, x: f64, parts: u32) -> f64 {
        interpolate_cdf(x, parts, |t| self.cdf(t))
    }

    pub fn render(&self, n: usize) -> Vec<f64> {
        (0..=n).map(|i| self.pdf(i as f64 / n as f64)).collect()
    }
}

/// Beta distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaDistribution {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for BetaDistribution {
    fn default() -> Self {
        Self {
            alpha: 2.0,
            beta: 2.0,
        }
    }
}

impl BetaDistribution {
    pub fn pdf(&self, x: f64) -> f64 {
        beta_pdf(x, self.alpha, self.beta)
    }

    pub fn cdf(&self, x: f64) -> f64 {
        beta_cdf(x, self.alpha, self.beta)
    }

    pub fn cdf_discrete(&self, x: f64, parts: u32) -> f64 {
        interpolate_cdf(x, parts, |t| self.cdf(t))
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Sets alpha and beta to match a mean and standard deviation.
    pub fn set_from_mean_dev(&mut self, mean: f64, stddev: f64) {
        let v = mean * (1.0 - mean) / (stddev * stddev) - 1.0;
        self.alpha = mean * v;
        self.beta = (1.0 - mean) * v;
    }

    /// Samples the unnormalised kernel, pulled in slightly at the ends so
    /// exponents below one stay finite, then rescaled to trapezoid mass `n`.
    pub fn render(&self, n: usize) -> Vec<f64> {
        let mut vals = vec![0.0; n + 1];
        vals[0] = abnormal_beta(0.000_001, self.alpha, self.beta);
        let mut total = vals[0] * 0.5;
        for (i, val) in vals.iter_mut().enumerate().take(n).skip(1) {
            *val = abnormal_beta(i as f64 / n as f64, self.alpha, self.beta);
            total += *val;
        }
        vals[n] = abnormal_beta(0.999_999, self.alpha, self.beta);
        total += vals[n] * 0.5;
        if total > 0.0 && total.is_finite() {
            let scale = n as f64 / total;
            vals.iter_mut().for_each(|v| *v *= scale);
        } else {
            vals.iter_mut().for_each(|v| *v = 1.0);
        }
        vals
    }
}

/// Piecewise-linear density given by equally spaced samples on [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeformDistribution {
    values: Vec<f64>,
    /// cdf[i] is the integral from 0 to sample i, extended on demand
    #[serde(skip)]
    cdf: RefCell<Vec<f64>>,
}

impl PartialEq for FreeformDistribution {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Default for FreeformDistribution {
    fn default() -> Self {
        Self::uniform(super::distribution_constants::DEFAULT_RESOLUTION)
    }
}

impl FreeformDistribution {
    pub fn uniform(n: usize) -> Self {
        Self::from_values(vec![1.0; n.max(2)])
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values,
            cdf: RefCell::new(Vec::new()),
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replaces the samples and drops the cumulative cache.
    pub fn set_values(&mut self, values: Vec<f64>) {
        self.values = values;
        self.changed();
    }

    pub fn changed(&mut self) {
        self.cdf.get_mut().clear();
    }

    pub fn pdf(&self, x: f64) -> f64 {
        let n = self.values.len();
        match n {
            0 => return 1.0,
            1 => return self.values[0],
            _ => {}
        }
        let segs = n - 1;
        let pos = x * segs as f64;
        let i = pos.floor().max(0.0) as usize;
        if i < segs {
            let over = pos - i as f64;
            self.values[i] * (1.0 - over) + self.values[i + 1] * over
        } else {
            self.values[segs]
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return x.clamp(0.0, 1.0);
        }
        let segs = n - 1;
        let w = 0.5 / segs as f64;
        let i = ((x * segs as f64).floor().max(0.0) as usize).min(segs);

        let mut cache = self.cdf.borrow_mut();
        if cache.is_empty() {
            cache.push(0.0);
        }
        while cache.len() <= i {
            let j = cache.len() - 1;
            let next = cache[j] + (self.values[j] + self.values[j + 1]) * w;
            cache.push(next);
        }
        let mut v = cache[i];

        if i < segs {
            let x0 = i as f64 / segs as f64;
            let k = (self.values[i + 1] - self.values[i]) * segs as f64;
            let m = self.values[i] - k * x0;
            v += 0.5 * k * (x * x - x0 * x0) + m * (x - x0);
        }
        v
    }

    /// CDF treating each sample as the mass of one of `parts` buckets.
    pub fn cdf_discrete(&self, x: f64, parts: u32) -> f64 {
        let p = parts as f64;
        let i = (x * p).floor().max(0.0) as usize;
        let mut v0: f64 = self.values.iter().take(i).sum();
        v0 /= p;
        if i < parts as usize {
            let here = self.values.get(i).copied().unwrap_or(0.0);
            let x0 = i as f64 / p;
            v0 += here * (x - x0);
        }
        v0
    }

    /// Samples at `i / n` for `i` in `0..=n`.
    pub fn render(&self, n: usize) -> Vec<f64> {
        if self.values.len() == n + 1 {
            self.values.clone()
        } else {
            (0..=n).map(|i| self.pdf(i as f64 / n as f64)).collect()
        }
    }

    /// Clamps negatives and scales so the trapezoid mass is `len - 1`.
    pub fn normalise(&mut self) {
        let n = self.values.len();
        if n < 2 {
            self.values = vec![1.0; 2];
            self.changed();
            return;
        }
        self.values.iter_mut().for_each(|v| *v = v.max(0.0));
        let mut amt = (self.values[0] + self.values[n - 1]) * 0.5;
        amt += self.values[1..n - 1].iter().sum::<f64>();
        if amt > 0.0 {
            let scale = (n - 1) as f64 / amt;
            self.values.iter_mut().for_each(|v| *v *= scale);
        } else {
            tracing::debug!("freeform distribution has no mass, resetting to uniform");
            self.values.iter_mut().for_each(|v| *v = 1.0);
        }
        self.changed();
    }

    /// Clamps negatives and scales so the plain sum is `len`.
    pub fn normalise_as_discrete(&mut self) {
        let n = self.values.len();
        self.values.iter_mut().for_each(|v| *v = v.max(0.0));
        let amt: f64 = self.values.iter().sum();
        if amt > 0.0 {
            let scale = n as f64 / amt;
            self.values.iter_mut().for_each(|v| *v *= scale);
        } else {
            self.values.iter_mut().for_each(|v| *v = 1.0);
        }
        self.changed();
    }

    /// Rotates the samples by `d` places.
    pub fn nudge(&mut self, d: isize) {
        let n = self.values.len() as isize;
        if n == 0 {
            return;
        }
        self.values.rotate_right(d.rem_euclid(n) as usize);
        self.changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_widens_on_boundary() {
        let (x0, x1) = bucket(0.25, 4);
        assert!((x0 - 0.25).abs() < 1e-12);
        assert!((x1 - 0.5).abs() < 1e-12);
        let (x0, x1) = bucket(0.75, 4);
        assert!((x0 - 0.5).abs() < 1e-12);
        assert!((x1 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_interval_render_mass() {
        let d = IntervalDistribution {
            lower: 0.5,
            upper: 1.0,
        };
        let vals = d.render(48);
        assert_eq!(vals[23], 0.0);
        assert!((vals[24] - 2.0).abs() < 1e-12);
        assert!((vals[48] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_render() {
        let vals = PointDistribution { value: 0.0 }.render(48);
        assert_eq!(vals[0], 96.0);
        let vals = PointDistribution { value: 0.5 }.render(48);
        assert_eq!(vals[24], 48.0);
    }

    #[test]
    fn test_normal_cdf_endpoints() {
        let d = NormalDistribution::default();
        assert!(d.cdf(0.0).abs() < 1e-9);
        assert!((d.cdf(1.0) - 1.0).abs() < 1e-9);
        assert!((d.cdf(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_beta_render_normalised() {
        let vals = BetaDistribution::default().render(48);
        let trap = (vals[0] + vals[48]) * 0.5 + vals[1..48].iter().sum::<f64>();
        assert!((trap - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_freeform_uniform_cdf() {
        let f = FreeformDistribution::uniform(65);
        for i in 0..=20 {
            let x = i as f64 / 20.0;
            assert!((f.cdf(x) - x).abs() < 1e-9, "cdf({}) = {}", x, f.cdf(x));
        }
    }

    #[test]
    fn test_freeform_cdf_cache_consistent() {
        let mut f = FreeformDistribution::from_values(vec![0.0, 1.0, 2.0, 1.0, 0.0]);
        f.normalise();
        // query high first to fill the cache, then low
        let hi = f.cdf(0.9);
        let lo = f.cdf(0.3);
        let mut g = f.clone();
        g.changed();
        assert!((g.cdf(0.3) - lo).abs() < 1e-12);
        assert!((g.cdf(0.9) - hi).abs() < 1e-12);
        assert!((f.cdf(1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_freeform_normalise_fallback() {
        let mut f = FreeformDistribution::from_values(vec![-1.0, 0.0, -2.0]);
        f.normalise();
        assert_eq!(f.values(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_freeform_discrete_cdf() {
        let f = FreeformDistribution::from_values(vec![1.0; 4]);
        assert!((f.cdf_discrete(0.5, 4) - 0.5).abs() < 1e-12);
        assert!((f.cdf_discrete(1.0, 4) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nudge_rotates() {
        let mut f = FreeformDistribution::from_values(vec![1.0, 2.0, 3.0]);
        f.nudge(1);
        assert_eq!(f.values(), &[3.0, 1.0, 2.0]);
    }
}
