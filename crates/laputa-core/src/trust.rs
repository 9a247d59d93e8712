//! Trust Functions
//!
//! A trust function is a density over a source's reliability r in [0, 1],
//! sampled at 49 evenly spaced points and treated as piecewise linear.
//! Inquirers hold one for their own inquiry and one per incoming link.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

use crate::distribution::special::abnormal_beta;

/// Number of intervals between trust samples.
pub const TRUST_RESOLUTION: usize = 48;

const RESOLUTION_INV: f32 = 1.0 / TRUST_RESOLUTION as f32;

/// Named trust levels, each a (value, sharpness) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPreset {
    Unknown,
    None,
    VeryLow,
    Low,
    Average,
    High,
    VeryHigh,
    Full,
}

impl TrustPreset {
    /// The (value, sharpness) pair for this preset.
    pub fn value_sharpness(self) -> (f32, f32) {
        match self {
            TrustPreset::Unknown => (0.5, 0.0),
            TrustPreset::None => (0.0, 0.5),
            TrustPreset::VeryLow => (0.05, 0.5),
            TrustPreset::Low => (0.25, 0.5),
            TrustPreset::Average => (0.5, 0.5),
            TrustPreset::High => (0.75, 0.5),
            TrustPreset::VeryHigh => (0.95, 0.5),
            TrustPreset::Full => (1.0, 0.5),
        }
    }
}

/// Reliability density over 49 samples with a cached expectation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "Vec<f32>", try_from = "Vec<f32>")]
pub struct TrustFunction {
    values: [f32; TRUST_RESOLUTION + 1],
    expectation: Cell<Option<f32>>,
}

impl Default for TrustFunction {
    fn default() -> Self {
        Self::uniform()
    }
}

impl PartialEq for TrustFunction {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl From<TrustFunction> for Vec<f32> {
    fn from(tf: TrustFunction) -> Vec<f32> {
        tf.values.to_vec()
    }
}

impl TryFrom<Vec<f32>> for TrustFunction {
    type Error = String;

    fn try_from(v: Vec<f32>) -> Result<Self, Self::Error> {
        let values: [f32; TRUST_RESOLUTION + 1] = v.try_into().map_err(|v: Vec<f32>| {
            format!(
                "trust function needs {} samples, got {}",
                TRUST_RESOLUTION + 1,
                v.len()
            )
        })?;
        Ok(Self::from_values(values))
    }
}

impl TrustFunction {
    /// Flat density, expectation 0.5.
    pub fn uniform() -> Self {
        Self::from_values([1.0; TRUST_RESOLUTION + 1])
    }

    /// Wraps raw samples without normalising them.
    pub fn from_values(values: [f32; TRUST_RESOLUTION + 1]) -> Self {
        Self {
            values,
            expectation: Cell::new(None),
        }
    }

    pub fn from_preset(preset: TrustPreset) -> Self {
        let mut tf = Self::uniform();
        tf.set_from_preset(preset);
        tf
    }

    pub fn values(&self) -> &[f32; TRUST_RESOLUTION + 1] {
        &self.values
    }

    /// Replaces the samples and normalises them.
    pub fn set_values(&mut self, values: [f32; TRUST_RESOLUTION + 1]) {
        self.values = values;
        self.normalise();
    }

    pub fn set_from_preset(&mut self, preset: TrustPreset) {
        let (v, s) = preset.value_sharpness();
        self.set_value_sharpness(v, s);
    }

    /// Fills the samples from a beta kernel with
    /// `alpha = (0.1 + 99.9 val)^s` and `beta = (0.1 + 99.9 (1 - val))^s`.
    pub fn set_value_sharpness(&mut self, val: f32, sharpness: f32) {
        let alpha = (0.1 + val as f64 * 99.9).powf(sharpness as f64);
        let beta = (0.1 + (1.0 - val as f64) * 99.9).powf(sharpness as f64);
        for (i, v) in self.values.iter_mut().enumerate() {
            let x = i as f64 / TRUST_RESOLUTION as f64 * 0.998 + 0.001;
            *v = abnormal_beta(x, alpha, beta) as f32;
        }
        self.normalise();
    }

    fn trapezoid_total(&self) -> f32 {
        let last = TRUST_RESOLUTION;
        let inner: f32 = self.values[1..last].iter().sum();
        (self.values[0] + self.values[last]) * 0.5 + inner
    }

    fn rescale(&mut self, total: f32) {
        if total > 0.0 && total.is_finite() {
            let scale = TRUST_RESOLUTION as f32 / total;
            self.values.iter_mut().for_each(|v| *v *= scale);
        } else {
            tracing::debug!("trust function lost its mass, resetting to uniform");
            self.values = [1.0; TRUST_RESOLUTION + 1];
        }
        self.invalidate();
    }

    /// Scales the samples so the density integrates to one over [0, 1].
    pub fn normalise(&mut self) {
        let total = self.trapezoid_total();
        self.rescale(total);
    }

    pub fn invalidate(&self) {
        self.expectation.set(None);
    }

    /// Density at `pos`, linear between samples.
    pub fn value_at(&self, pos: f32) -> f32 {
        let scaled = pos.clamp(0.0, 1.0) * TRUST_RESOLUTION as f32;
        let i = (scaled as usize).min(TRUST_RESOLUTION);
        let dx = scaled - i as f32;
        let slope = if i < TRUST_RESOLUTION {
            self.values[i + 1] - self.values[i]
        } else {
            0.0
        };
        self.values[i] + dx * slope
    }

    /// Expected reliability, the exact integral of r f(r) for the
    /// piecewise-linear density. Cached until the samples change.
    pub fn expectation(&self) -> f32 {
        if let Some(e) = self.expectation.get() {
            return e;
        }
        let mut val = 0.0f32;
        let mut r0 = 0.0f32;
        for i in 0..TRUST_RESOLUTION {
            let f0 = self.values[i];
            let fs = self.values[i + 1] - f0;
            val += r0 * f0 + (r0 * fs + f0 * RESOLUTION_INV) * 0.5 + fs * RESOLUTION_INV / 3.0;
            r0 += RESOLUTION_INV;
        }
        let e = val * RESOLUTION_INV;
        self.expectation.set(Some(e));
        e
    }

    /// Reweights each sample at reliability r by `r b + (1 - r)(1 - b)`.
    ///
    /// With `p_true` r runs from 0 to 1 across the samples, otherwise from
    /// 1 to 0. The result is renormalised.
    pub fn update(&mut self, belief: f32, p_true: bool) {
        let neg = 1.0 - belief;
        let (mut r, dr) = if p_true {
            (0.0f32, RESOLUTION_INV)
        } else {
            (1.0f32, -RESOLUTION_INV)
        };
        for v in self.values.iter_mut() {
            *v *= r * belief + (1.0 - r) * neg;
            r += dr;
        }
        let total = self.trapezoid_total();
        self.rescale(total);
    }

    /// Replaces the samples by `self (1 - w) + other w`.
    pub fn blend_with(&mut self, other: &TrustFunction, w: f32) {
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a = *a * (1.0 - w) + *b * w;
        }
        self.invalidate();
    }

    /// Averages several trust functions sample by sample.
    pub fn average<'a>(tfs: impl IntoIterator<Item = &'a TrustFunction>) -> Option<TrustFunction> {
        let mut sum = [0.0f32; TRUST_RESOLUTION + 1];
        let mut n = 0usize;
        for tf in tfs {
            for (s, v) in sum.iter_mut().zip(tf.values.iter()) {
                *s += v;
            }
            n += 1;
        }
        if n == 0 {
            return None;
        }
        sum.iter_mut().for_each(|s| *s /= n as f32);
        Some(TrustFunction::from_values(sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integral(tf: &TrustFunction) -> f32 {
        tf.trapezoid_total() / TRUST_RESOLUTION as f32
    }

    #[test]
    fn test_uniform_expectation() {
        let tf = TrustFunction::uniform();
        assert!((tf.expectation() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_normalise_positive_input() {
        let mut vals = [0.0f32; TRUST_RESOLUTION + 1];
        for (i, v) in vals.iter_mut().enumerate() {
            *v = (i as f32 + 1.0) * 3.0;
        }
        let mut tf = TrustFunction::from_values(vals);
        tf.normalise();
        assert!((integral(&tf) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalise_zero_mass_falls_back() {
        let mut tf = TrustFunction::from_values([0.0; TRUST_RESOLUTION + 1]);
        tf.normalise();
        assert!(tf.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_presets_order_expectations() {
        let low = TrustFunction::from_preset(TrustPreset::Low).expectation();
        let avg = TrustFunction::from_preset(TrustPreset::Average).expectation();
        let high = TrustFunction::from_preset(TrustPreset::High).expectation();
        assert!(low < avg && avg < high);
        assert!((avg - 0.5).abs() < 1e-3);
        let unknown = TrustFunction::from_preset(TrustPreset::Unknown);
        assert!((unknown.expectation() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_update_moves_expectation() {
        let mut tf = TrustFunction::uniform();
        tf.update(0.9, true);
        assert!(tf.expectation() > 0.5);
        assert!((integral(&tf) - 1.0).abs() < 1e-5);

        let mut tf = TrustFunction::uniform();
        tf.update(0.9, false);
        assert!(tf.expectation() < 0.5);
    }

    #[test]
    fn test_update_with_neutral_belief_is_flat() {
        let mut tf = TrustFunction::uniform();
        tf.update(0.5, true);
        assert!(tf.values().iter().all(|&v| (v - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_expectation_cache_invalidated() {
        let mut tf = TrustFunction::uniform();
        let before = tf.expectation();
        tf.update(1.0, true);
        assert!(tf.expectation() > before);
    }

    #[test]
    fn test_value_at_interpolates() {
        let mut vals = [0.0f32; TRUST_RESOLUTION + 1];
        vals[1] = 2.0;
        let tf = TrustFunction::from_values(vals);
        let half = 0.5 / TRUST_RESOLUTION as f32;
        assert!((tf.value_at(half) - 1.0).abs() < 1e-5);
        assert_eq!(tf.value_at(1.0), 0.0);
    }

    #[test]
    fn test_serde_round_trip() {
        let tf = TrustFunction::from_preset(TrustPreset::High);
        let json = serde_json::to_string(&tf).unwrap();
        let back: TrustFunction = serde_json::from_str(&json).unwrap();
        assert_eq!(tf, back);
        assert!(serde_json::from_str::<TrustFunction>("[1.0, 2.0]").is_err());
    }

    #[test]
    fn test_average() {
        let a = TrustFunction::from_preset(TrustPreset::Low);
        let b = TrustFunction::from_preset(TrustPreset::High);
        let avg = TrustFunction::average([&a, &b]).unwrap();
        assert!((avg.expectation() - 0.5).abs() < 0.01);
        assert!(TrustFunction::average(std::iter::empty()).is_none());
    }
}
