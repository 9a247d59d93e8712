//! Distributions
//!
//! A [`Distribution`] is a weighted mixture of five families on [0, 1]
//! (point, interval, truncated normal, beta, freeform) rescaled onto
//! `[min, max]`. It can be made discrete, in which case samples snap to
//! `discrete_parts` equal buckets. Random values come from bisecting the
//! CDF, so every family only needs a CDF, not a sampler.

mod parts;
mod presets;
pub mod special;

pub use parts::{
    BetaDistribution, FreeformDistribution, IntervalDistribution, NormalDistribution,
    PointDistribution, POINT_PDF_HEIGHT,
};
pub use presets::DefaultDistribution;

use serde::{Deserialize, Serialize};

use crate::context::{round_half_up, SimContext};
use crate::trust::{TrustFunction, TRUST_RESOLUTION};

/// Constants for distribution evaluation
pub mod distribution_constants {
    /// Default number of freeform samples
    pub const DEFAULT_RESOLUTION: usize = 65;
    /// Bisection steps used by inverse CDF lookups
    pub const INVERSE_CDF_STEPS: u32 = 64;
    /// Integration samples for mean and standard deviation
    pub const MEAN_VALUE_ACCURACY: usize = 16384;
}

use distribution_constants::*;

/// The component families of a mixed distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    Point,
    Interval,
    Normal,
    Beta,
    Freeform,
}

impl DistributionKind {
    pub const ALL: [DistributionKind; 5] = [
        DistributionKind::Point,
        DistributionKind::Interval,
        DistributionKind::Normal,
        DistributionKind::Beta,
        DistributionKind::Freeform,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            DistributionKind::Point => "Point",
            DistributionKind::Interval => "Interval",
            DistributionKind::Normal => "Normal",
            DistributionKind::Beta => "Beta",
            DistributionKind::Freeform => "Freeform",
        }
    }
}

/// A mixture of the five families over `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Distribution {
    pub min: f64,
    pub max: f64,
    /// Number of buckets in discrete mode, 0 for continuous
    pub discrete_parts: u32,
    pub point: PointDistribution,
    pub interval: IntervalDistribution,
    pub normal: NormalDistribution,
    pub beta: BetaDistribution,
    pub freeform: FreeformDistribution,
    weights: [f64; 5],
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            discrete_parts: 0,
            point: PointDistribution::default(),
            interval: IntervalDistribution::default(),
            normal: NormalDistribution::default(),
            beta: BetaDistribution::default(),
            freeform: FreeformDistribution::default(),
            weights: [0.0, 1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Distribution {
    /// A pure distribution of one family with default parameters.
    pub fn pure(kind: DistributionKind) -> Self {
        let mut d = Self::default();
        d.weights = [0.0; 5];
        d.weights[kind.index()] = 1.0;
        d
    }

    /// Always `value`, scaled into `[min, max]` when drawn.
    pub fn point(value: f64) -> Self {
        let mut d = Self::pure(DistributionKind::Point);
        d.point = PointDistribution { value };
        d
    }

    /// Always the integer `n`.
    pub fn fixed(n: i64) -> Self {
        let mut d = Self::point(0.5);
        d.set_discrete_range(n, n);
        d
    }

    /// A freeform distribution copying the samples of a trust function.
    pub fn from_trust_function(tf: &TrustFunction) -> Self {
        let mut d = Self::pure(DistributionKind::Freeform);
        d.freeform = FreeformDistribution::from_values(
            tf.values().iter().map(|&v| v as f64).collect(),
        );
        d
    }

    pub fn weight(&self, kind: DistributionKind) -> f64 {
        self.weights[kind.index()]
    }

    pub fn weights(&self) -> &[f64; 5] {
        &self.weights
    }

    /// Sets one weight and rescales the others proportionally, so the
    /// weights keep summing to one.
    pub fn set_weight(&mut self, kind: DistributionKind, v: f64) {
        let w = kind.index();
        let v = v.clamp(0.0, 1.0);
        let diff = v - self.weights[w];
        let p_tot = 1.0 - self.weights[w];
        let others = (self.weights.len() - 1) as f64;
        let mut wg = [0.0; 5];
        let mut tot = 0.0;
        for (i, slot) in wg.iter_mut().enumerate() {
            *slot = if i == w {
                v
            } else if p_tot > 0.0 {
                self.weights[i] - diff * self.weights[i] / p_tot
            } else {
                // everything was on `kind`: spread the remainder evenly
                (1.0 - v) / others
            };
            *slot = slot.clamp(0.0, 1.0);
            tot += *slot;
        }
        if tot > 0.0 {
            for (dst, src) in self.weights.iter_mut().zip(wg.iter()) {
                *dst = src / tot;
            }
        }
    }

    /// Snaps `x` to the middle of its bucket in discrete mode.
    fn snap(&self, x: f64) -> f64 {
        if self.discrete_parts == 0 {
            return x;
        }
        let parts = self.discrete_parts as usize;
        let i = ((x * parts as f64).max(0.0) as usize).min(parts - 1);
        (i as f64 + 0.5) / parts as f64
    }

    /// Density at `x` in [0, 1].
    pub fn pdf(&self, x: f64) -> f64 {
        let x = self.snap(x);
        let mut v = 0.0;
        for kind in DistributionKind::ALL {
            let w = self.weight(kind);
            if w <= 0.0 {
                continue;
            }
            v += w * match kind {
                DistributionKind::Point => self.point.pdf(x),
                DistributionKind::Interval => self.interval.pdf(x),
                DistributionKind::Normal => self.normal.pdf(x),
                DistributionKind::Beta => self.beta.pdf(x),
                DistributionKind::Freeform => self.freeform.pdf(x),
            };
        }
        v
    }

    /// Cumulative probability at `x` in [0, 1].
    pub fn cdf(&self, x: f64) -> f64 {
        debug_assert!((0.0..=1.0).contains(&x), "cdf argument {} out of range", x);
        let x = x.clamp(0.0, 1.0);
        let parts = self.discrete_parts;
        let mut v = 0.0;
        for kind in DistributionKind::ALL {
            let w = self.weight(kind);
            if w <= 0.0 {
                continue;
            }
            v += w * if parts > 0 {
                match kind {
                    DistributionKind::Point => self.point.cdf_discrete(x, parts),
                    DistributionKind::Interval => self.interval.cdf_discrete(x, parts),
                    DistributionKind::Normal => self.normal.cdf_discrete(x, parts),
                    DistributionKind::Beta => self.beta.cdf_discrete(x, parts),
                    DistributionKind::Freeform => self.freeform.cdf_discrete(x, parts),
                }
            } else {
                match kind {
                    DistributionKind::Point => self.point.cdf(x),
                    DistributionKind::Interval => self.interval.cdf(x),
                    DistributionKind::Normal => self.normal.cdf(x),
                    DistributionKind::Beta => self.beta.cdf(x),
                    DistributionKind::Freeform => self.freeform.cdf(x),
                }
            };
        }
        v
    }

    /// Inverts the CDF by bisection over [0, 1].
    pub fn inverse_cdf(&self, v: f64, steps: u32) -> f64 {
        let (mut lower, mut upper) = (0.0, 1.0);
        for _ in 0..steps {
            let pos = (upper + lower) * 0.5;
            let val = self.cdf(pos);
            if val < v {
                lower = pos;
            } else if val > v {
                upper = pos;
            } else {
                return pos;
            }
        }
        (upper + lower) * 0.5
    }

    /// Draws a value in `[min, max]`.
    pub fn random_value(&self, ctx: &mut SimContext) -> f64 {
        let u = ctx.uniform();
        let v = self.inverse_cdf(u, INVERSE_CDF_STEPS);
        debug_assert!((0.0..=1.0).contains(&v));
        v * (self.max - self.min) + self.min
    }

    /// Integral of the CDF over [0, 1] weighted by `f`, by the midpoint rule.
    fn cdf_integral(&self, f: impl Fn(f64) -> f64) -> f64 {
        let n = MEAN_VALUE_ACCURACY as f64;
        let mut integral = 0.5 * f(1.0);
        for i in 1..MEAN_VALUE_ACCURACY {
            let t = i as f64 / n;
            integral += self.cdf(t) * f(t);
        }
        integral / n
    }

    /// Mean in `[min, max]`.
    pub fn mean(&self) -> f64 {
        let integral = self.cdf_integral(|_| 1.0);
        (1.0 - integral) * (self.max - self.min) + self.min
    }

    /// Standard deviation in units of `[min, max]`.
    pub fn stddev(&self) -> f64 {
        let integral = self.cdf_integral(|t| t);
        let range = self.max - self.min;
        let m = if range != 0.0 {
            (self.mean() - self.min) / range
        } else {
            0.0
        };
        ((1.0 - 2.0 * integral) - m * m).max(0.0).sqrt() * range
    }

    /// Blends every field of two distributions; `d = 0` gives `l`.
    pub fn interpolate(l: &Distribution, r: &Distribution, d: f64) -> Distribution {
        let mix = |a: f64, b: f64| a * (1.0 - d) + b * d;
        let mut out = Distribution {
            min: mix(l.min, r.min),
            max: mix(l.max, r.max),
            discrete_parts: round_half_up(mix(l.discrete_parts as f64, r.discrete_parts as f64))
                .max(0) as u32,
            point: PointDistribution {
                value: mix(l.point.value, r.point.value),
            },
            interval: IntervalDistribution {
                lower: mix(l.interval.lower, r.interval.lower),
                upper: mix(l.interval.upper, r.interval.upper),
            },
            normal: NormalDistribution {
                midpt: mix(l.normal.midpt, r.normal.midpt),
                stddev: mix(l.normal.stddev, r.normal.stddev),
            },
            beta: BetaDistribution {
                alpha: mix(l.beta.alpha, r.beta.alpha),
                beta: mix(l.beta.beta, r.beta.beta),
            },
            freeform: FreeformDistribution::default(),
            weights: [0.0; 5],
        };

        let (lv, rv) = (l.freeform.values(), r.freeform.values());
        let values = if lv.len() == rv.len() {
            lv.iter().zip(rv.iter()).map(|(&a, &b)| mix(a, b)).collect()
        } else {
            let sz = (round_half_up(mix(lv.len() as f64, rv.len() as f64)).max(2)) as usize;
            (0..sz)
                .map(|i| {
                    let x = i as f64 / (sz - 1) as f64;
                    mix(l.freeform.pdf(x), r.freeform.pdf(x))
                })
                .collect()
        };
        out.freeform = FreeformDistribution::from_values(values);

        for (i, w) in out.weights.iter_mut().enumerate() {
            *w = mix(l.weights[i], r.weights[i]);
        }
        out
    }

    /// Resamples the freeform part onto `n` points.
    pub fn set_resolution(&mut self, n: usize) {
        debug_assert!(self.discrete_parts == 0);
        let n = n.max(2);
        let old = self.freeform.clone();
        let values = (0..n)
            .map(|i| old.pdf(i as f64 / (n - 1) as f64))
            .collect();
        self.freeform.set_values(values);
        self.freeform.normalise();
    }

    /// Makes the distribution discrete over the integers `minimum..=maximum`.
    ///
    /// The buckets are scaled so their plain sum is the bucket count, keeping
    /// the discrete CDF at 1 for any shape. An empty range turns discrete mode
    /// off again.
    pub fn set_discrete_range(&mut self, minimum: i64, maximum: i64) {
        if maximum >= minimum {
            let parts = (maximum - minimum + 1) as usize;
            self.discrete_parts = parts as u32;
            self.min = minimum as f64;
            self.max = maximum as f64;
            let old = self.freeform.clone();
            let values = (0..parts)
                .map(|i| old.pdf(i as f64 / parts as f64))
                .collect();
            self.freeform.set_values(values);
            self.freeform.normalise_as_discrete();
        } else {
            self.discrete_parts = 0;
            self.set_resolution(DEFAULT_RESOLUTION);
        }
    }

    /// Restores the freeform histogram's mass after it was edited or read
    /// from a file.
    pub fn renormalise(&mut self) {
        if self.discrete_parts > 0 {
            self.freeform.normalise_as_discrete();
        } else {
            self.freeform.normalise();
        }
    }

    /// Renders the mixture onto the 49 trust samples.
    pub fn to_trust_function(&self) -> TrustFunction {
        let mut values = [0.0f32; TRUST_RESOLUTION + 1];
        for kind in DistributionKind::ALL {
            let w = self.weight(kind);
            if w <= 0.0 {
                continue;
            }
            let samples = match kind {
                DistributionKind::Point => self.point.render(TRUST_RESOLUTION),
                DistributionKind::Interval => self.interval.render(TRUST_RESOLUTION),
                DistributionKind::Normal => self.normal.render(TRUST_RESOLUTION),
                DistributionKind::Beta => self.beta.render(TRUST_RESOLUTION),
                DistributionKind::Freeform => self.freeform.render(TRUST_RESOLUTION),
            };
            for (dst, src) in values.iter_mut().zip(samples) {
                *dst += (src * w) as f32;
            }
        }
        TrustFunction::from_values(values)
    }

    /// Blends this distribution's rendering into `tf` with weight `w`.
    pub fn merge_trust_function_with(&self, tf: &mut TrustFunction, w: f64) {
        let other = self.to_trust_function();
        tf.blend_with(&other, w as f32);
    }

    /// Display name: pure, impure or mixed with the dominant family.
    pub fn name(&self) -> String {
        if let Some(kind) = DistributionKind::ALL
            .iter()
            .find(|k| self.weight(**k) == 1.0)
        {
            return format!("{} distribution", kind.label());
        }
        if let Some(kind) = DistributionKind::ALL
            .iter()
            .find(|k| self.weight(**k) > 0.5)
        {
            return format!("Impure {} distribution", kind.label());
        }
        "Mixed distribution".to_string()
    }

    pub fn description(&self) -> String {
        format!(
            "{} (mean = {}, stdev = {})",
            self.name(),
            format_value(self.mean()),
            format_value(self.stddev())
        )
    }
}

/// Short decimal rendering with trailing zeros trimmed.
pub(crate) fn format_value(v: f64) -> String {
    let s = format!("{:.4}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_uniform() {
        let d = Distribution::default();
        assert!((d.cdf(0.3) - 0.3).abs() < 1e-12);
        assert!((d.mean() - 0.5).abs() < 1e-3);
        assert_eq!(d.name(), "Interval distribution");
    }

    #[test]
    fn test_inverse_cdf_round_trip() {
        let mut d = Distribution::pure(DistributionKind::Beta);
        d.beta = BetaDistribution {
            alpha: 4.0,
            beta: 2.0,
        };
        for i in 1..10 {
            let x = i as f64 / 10.0;
            let back = d.inverse_cdf(d.cdf(x), 64);
            assert!((back - x).abs() < 1e-6, "{} -> {}", x, back);
        }
    }

    #[test]
    fn test_inverse_cdf_mixture() {
        let mut d = Distribution::default();
        d.set_weight(DistributionKind::Normal, 0.5);
        for i in 1..10 {
            let x = i as f64 / 10.0;
            let back = d.inverse_cdf(d.cdf(x), 64);
            assert!((back - x).abs() < 1e-5);
        }
        assert_eq!(d.name(), "Mixed distribution");
    }

    #[test]
    fn test_set_weight_keeps_sum() {
        let mut d = Distribution::default();
        d.set_weight(DistributionKind::Beta, 0.7);
        let total: f64 = d.weights().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((d.weight(DistributionKind::Beta) - 0.7).abs() < 1e-12);
        assert_eq!(d.name(), "Impure Beta distribution");
    }

    #[test]
    fn test_set_weight_from_pure() {
        let mut d = Distribution::pure(DistributionKind::Point);
        d.set_weight(DistributionKind::Point, 0.6);
        let total: f64 = d.weights().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((d.weight(DistributionKind::Interval) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_random_value_in_range() {
        let mut ctx = SimContext::from_seed(9);
        let mut d = Distribution::default();
        d.min = 2.0;
        d.max = 5.0;
        for _ in 0..100 {
            let v = d.random_value(&mut ctx);
            assert!((2.0..=5.0).contains(&v));
        }
    }

    #[test]
    fn test_discrete_range() {
        let mut d = Distribution::default();
        d.set_discrete_range(2, 20);
        assert_eq!(d.discrete_parts, 19);
        assert_eq!(d.min, 2.0);
        assert_eq!(d.max, 20.0);
        assert_eq!(d.freeform.len(), 19);
        assert!((d.cdf(1.0) - 1.0).abs() < 1e-9);
        assert!((d.mean() - 11.0).abs() < 0.01);

        d.set_discrete_range(5, 1);
        assert_eq!(d.discrete_parts, 0);
        assert_eq!(d.freeform.len(), DEFAULT_RESOLUTION);
    }

    #[test]
    fn test_discrete_range_skewed_shape_keeps_unit_mass() {
        let mut d = Distribution::pure(DistributionKind::Freeform);
        d.freeform.set_values(vec![1.0, 2.0, 3.0, 4.0]);
        d.set_discrete_range(1, 4);
        let values = d.freeform.values().to_vec();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert!((values.iter().sum::<f64>() - 4.0).abs() < 1e-12);
        assert!((d.cdf(1.0) - 1.0).abs() < 1e-12);

        let scaled = values.iter().map(|v| v * 3.0).collect();
        d.freeform.set_values(scaled);
        d.renormalise();
        assert!((d.cdf(1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_pdf_snaps_to_bucket() {
        let mut d = Distribution::pure(DistributionKind::Freeform);
        d.set_discrete_range(0, 3);
        assert_eq!(d.pdf(0.01), d.pdf(0.24));
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = DefaultDistribution::BetaLower.build();
        let b = DefaultDistribution::IntervalUpper.build();
        assert_eq!(Distribution::interpolate(&a, &b, 0.0), a);
        assert_eq!(Distribution::interpolate(&a, &b, 1.0), b);
        let mid = Distribution::interpolate(&a, &b, 0.5);
        assert!((mid.weight(DistributionKind::Beta) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_resamples_freeform() {
        let a = Distribution::default();
        let mut b = Distribution::default();
        b.set_resolution(49);
        let mid = Distribution::interpolate(&a, &b, 0.5);
        assert_eq!(mid.freeform.len(), 57);
    }

    #[test]
    fn test_beta_stddev() {
        let d = Distribution::pure(DistributionKind::Beta);
        // Beta(2,2): variance 1/20
        assert!((d.stddev() - (0.05f64).sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_description_format() {
        let d = Distribution::default();
        let desc = d.description();
        assert!(desc.starts_with("Interval distribution (mean = 0.5"), "{}", desc);
    }

    #[test]
    fn test_to_trust_function_uniform() {
        let tf = Distribution::default().to_trust_function();
        assert!(tf.values().iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!((tf.expectation() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(2.0), "2");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(0.123456), "0.1235");
    }
}
