//! Meta-distributions
//!
//! A distribution over distributions: `zero` and `one` are the endpoints of
//! a family, and `mixture` says where in between a random member falls.
//! Used to give every inquirer or link its own trust function.

use serde::{Deserialize, Serialize};

use crate::context::SimContext;
use crate::distribution::{DefaultDistribution, Distribution};
use crate::trust::{TrustFunction, TRUST_RESOLUTION};

const ROW: usize = TRUST_RESOLUTION + 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaDistribution {
    pub zero: Distribution,
    pub one: Distribution,
    pub mixture: Distribution,
    /// Row j holds the density of the member at j/48, sampled at i/48
    #[serde(skip)]
    precalc: Option<Vec<f32>>,
}

impl Default for MetaDistribution {
    fn default() -> Self {
        Self {
            zero: DefaultDistribution::BetaLower.build(),
            one: DefaultDistribution::BetaUpper.build(),
            mixture: DefaultDistribution::IntervalWhole.build(),
            precalc: None,
        }
    }
}

impl PartialEq for MetaDistribution {
    fn eq(&self, other: &Self) -> bool {
        self.zero == other.zero && self.one == other.one && self.mixture == other.mixture
    }
}

impl MetaDistribution {
    pub fn new(zero: Distribution, one: Distribution, mixture: Distribution) -> Self {
        Self {
            zero,
            one,
            mixture,
            precalc: None,
        }
    }

    pub fn renormalise(&mut self) {
        self.zero.renormalise();
        self.one.renormalise();
        self.mixture.renormalise();
        self.precalc = None;
    }

    /// The default family with both endpoints resampled for trust use.
    pub fn for_trust() -> Self {
        let mut m = Self::default();
        m.zero.set_resolution(ROW);
        m.one.set_resolution(ROW);
        m
    }

    /// Member of the family at `weight`.
    pub fn distribution(&self, weight: f64) -> Distribution {
        Distribution::interpolate(&self.zero, &self.one, weight)
    }

    pub fn random_distribution(&self, ctx: &mut SimContext) -> Distribution {
        let w = self.mixture.random_value(ctx);
        self.distribution(w)
    }

    /// Blends two meta-distributions field by field. The table is not kept.
    pub fn interpolate(l: &MetaDistribution, r: &MetaDistribution, v: f64) -> MetaDistribution {
        MetaDistribution::new(
            Distribution::interpolate(&l.zero, &r.zero, v),
            Distribution::interpolate(&l.one, &r.one, v),
            Distribution::interpolate(&l.mixture, &r.mixture, v),
        )
    }

    /// Builds the 49x49 density table used by the trust setters.
    pub fn precalculate_for_trust(&mut self) {
        let mut table = Vec::with_capacity(ROW * ROW);
        for j in 0..ROW {
            let d = self.distribution(j as f64 / TRUST_RESOLUTION as f64);
            for i in 0..ROW {
                table.push(d.pdf(i as f64 / TRUST_RESOLUTION as f64) as f32);
            }
        }
        self.precalc = Some(table);
    }

    pub fn is_precalculated(&self) -> bool {
        self.precalc.is_some()
    }

    pub fn clear_precalculation(&mut self) {
        self.precalc = None;
    }

    /// Interpolated table row for member weight `v`.
    fn table_row(table: &[f32], v: f64) -> [f32; ROW] {
        let scaled = v.clamp(0.0, 1.0) * TRUST_RESOLUTION as f64;
        let k = (scaled.floor() as usize).min(TRUST_RESOLUTION - 1);
        let over = (scaled - k as f64) as f32;
        let lo = &table[k * ROW..(k + 1) * ROW];
        let hi = &table[(k + 1) * ROW..(k + 2) * ROW];
        let mut row = [0.0f32; ROW];
        for (i, slot) in row.iter_mut().enumerate() {
            *slot = lo[i] * (1.0 - over) + hi[i] * over;
        }
        row
    }

    /// Sets `tf` to the member at weight `v`.
    pub fn set_trust_function(&self, tf: &mut TrustFunction, v: f64) {
        match &self.precalc {
            Some(table) => *tf = TrustFunction::from_values(Self::table_row(table, v)),
            None => *tf = self.distribution(v).to_trust_function(),
        }
    }

    /// Blends the member at weight `v` into `tf` with weight `amt`.
    pub fn merge_trust_function_with(&self, tf: &mut TrustFunction, v: f64, amt: f64) {
        match &self.precalc {
            Some(table) => {
                let row = TrustFunction::from_values(Self::table_row(table, v));
                tf.blend_with(&row, amt as f32);
            }
            None => self.distribution(v).merge_trust_function_with(tf, amt),
        }
    }

    pub fn set_trust_function_to_random(&self, tf: &mut TrustFunction, ctx: &mut SimContext) {
        let v = self.mixture.random_value(ctx);
        self.set_trust_function(tf, v);
    }

    pub fn random_trust_function(&self, ctx: &mut SimContext) -> TrustFunction {
        let mut tf = TrustFunction::uniform();
        self.set_trust_function_to_random(&mut tf, ctx);
        tf
    }

    pub fn merge_trust_function_with_random(
        &self,
        tf: &mut TrustFunction,
        amt: f64,
        ctx: &mut SimContext,
    ) {
        let v = self.mixture.random_value(ctx);
        self.merge_trust_function_with(tf, v, amt);
    }

    pub fn description(&self) -> String {
        format!(
            "[Lower = {}; Upper = {}; Mixture = {}]",
            self.zero.description(),
            self.one.description(),
            self.mixture.description()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_endpoints() {
        let m = MetaDistribution::default();
        assert_eq!(m.distribution(0.0), m.zero);
        assert_eq!(m.distribution(1.0), m.one);
    }

    #[test]
    fn test_precalculated_matches_direct_pdf() {
        let mut m = MetaDistribution::for_trust();
        m.precalculate_for_trust();
        let mut tf = TrustFunction::uniform();
        m.set_trust_function(&mut tf, 0.5);
        let d = m.distribution(0.5);
        for i in [0usize, 12, 24, 36, 48] {
            let direct = d.pdf(i as f64 / 48.0) as f32;
            assert!((tf.values()[i] - direct).abs() < 1e-4);
        }
    }

    #[test]
    fn test_table_row_at_one_uses_last_row() {
        let mut m = MetaDistribution::default();
        m.precalculate_for_trust();
        let mut tf = TrustFunction::uniform();
        m.set_trust_function(&mut tf, 1.0);
        // Beta(4,2) leans high
        assert!(tf.expectation() > 0.6);
    }

    #[test]
    fn test_slow_path_without_table() {
        let m = MetaDistribution::default();
        let mut tf = TrustFunction::uniform();
        m.set_trust_function(&mut tf, 0.0);
        assert!(tf.expectation() < 0.4);
    }

    #[test]
    fn test_merge_with_zero_amount_keeps_function() {
        let m = MetaDistribution::default();
        let mut tf = TrustFunction::uniform();
        m.merge_trust_function_with(&mut tf, 1.0, 0.0);
        assert_eq!(tf, TrustFunction::uniform());
    }

    #[test]
    fn test_random_trust_is_deterministic() {
        let mut m = MetaDistribution::default();
        m.precalculate_for_trust();
        let a = m.random_trust_function(&mut SimContext::from_seed(5));
        let b = m.random_trust_function(&mut SimContext::from_seed(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_description() {
        let desc = MetaDistribution::default().description();
        assert!(desc.starts_with("[Lower = Beta distribution"));
        assert!(desc.contains("Mixture = Interval distribution"));
    }
}
