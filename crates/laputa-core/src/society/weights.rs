//! Source weights for link generation.
//!
//! Each inquirer carries a weight that decides how likely it is to be picked
//! as the source of the next link. Adjustments are queued and undone in one
//! pass by `recalculate`, so picking a source stays linear in the population.

use crate::context::SimContext;
use crate::setup::LinkWeights;

#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    weights: Vec<f64>,
    /// Sum of the positive weights
    total: f64,
    dirty: Vec<usize>,
    is_dirty: Vec<bool>,
}

/// Applies `v` to `w` and returns the new running total of positive weights.
fn add_weight(w: &mut f64, v: f64, total: f64) -> f64 {
    let mut total = total;
    if *w > 0.0 {
        if *w + v < 0.0 {
            total -= *w;
        } else {
            total += v;
        }
    } else if *w + v > 0.0 {
        total += v + *w;
    }
    *w += v;
    total
}

impl WeightTable {
    /// Resets every inquirer to the base weight.
    pub fn reset(&mut self, n: usize, base: f64) {
        self.weights = vec![base; n];
        self.total = base * n as f64;
        self.dirty.clear();
        self.is_dirty = vec![false; n];
    }

    /// Adds one inquirer with the base weight.
    pub fn push(&mut self, base: f64) {
        self.weights.push(base);
        self.is_dirty.push(false);
        self.total += base;
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Changes a weight permanently, without queueing it for recalculation.
    pub fn add(&mut self, i: usize, v: f64) {
        self.total = add_weight(&mut self.weights[i], v, self.total);
    }

    /// Changes a weight until the next `recalculate`.
    pub fn adjust(&mut self, i: usize, v: f64) {
        self.total = add_weight(&mut self.weights[i], v, self.total);
        if !self.is_dirty[i] {
            self.is_dirty[i] = true;
            self.dirty.push(i);
        }
    }

    /// Removes all weight from `i` until the next `recalculate`.
    pub fn exclude(&mut self, i: usize) {
        let w = self.weights[i];
        self.adjust(i, -w);
    }

    /// Resets every adjusted inquirer to `base + clustering * listeners`.
    pub fn recalculate(&mut self, lw: &LinkWeights, listeners: impl Fn(usize) -> usize) {
        for i in self.dirty.drain(..) {
            let w = &mut self.weights[i];
            if *w > 0.0 {
                self.total -= *w;
            }
            *w = lw.base + lw.clustering * listeners(i) as f64;
            if *w > 0.0 {
                self.total += *w;
            }
            self.is_dirty[i] = false;
        }
    }

    /// Picks an inquirer with probability proportional to its weight.
    ///
    /// Returns `None` when no inquirer has positive weight.
    pub fn pick(&self, ctx: &mut SimContext) -> Option<usize> {
        if self.total <= 0.0 {
            return None;
        }
        let mut v = ctx.uniform() * self.total;
        let mut last = None;
        for (i, &w) in self.weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            if v <= w {
                return Some(i);
            }
            v -= w;
            last = Some(i);
        }
        // rounding left a sliver past the last positive weight
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive_sum(t: &WeightTable) -> f64 {
        t.weights.iter().filter(|w| **w > 0.0).sum()
    }

    #[test]
    fn test_total_tracks_positive_weights() {
        let mut t = WeightTable::default();
        t.reset(4, 1.0);
        t.adjust(0, 2.0);
        t.exclude(1);
        t.adjust(2, -3.0);
        t.adjust(2, 1.5);
        t.add(3, 0.25);
        assert!((t.total() - positive_sum(&t)).abs() < 1e-12);
    }

    #[test]
    fn test_recalculate_restores_adjusted() {
        let mut t = WeightTable::default();
        t.reset(3, 1.0);
        t.adjust(0, 5.0);
        t.adjust(0, 1.0);
        t.exclude(2);
        assert_eq!(t.dirty.len(), 2);
        let lw = LinkWeights {
            clustering: 0.5,
            ..LinkWeights::default()
        };
        t.recalculate(&lw, |i| i);
        assert_eq!(t.weight(0), 1.0);
        assert_eq!(t.weight(1), 1.0);
        assert_eq!(t.weight(2), 2.0);
        assert!((t.total() - 4.0).abs() < 1e-12);
        assert!(t.dirty.is_empty());
    }

    #[test]
    fn test_pick_never_returns_zero_weight() {
        let mut t = WeightTable::default();
        t.reset(5, 1.0);
        t.exclude(0);
        t.exclude(3);
        let mut ctx = SimContext::from_seed(3);
        for _ in 0..500 {
            let i = t.pick(&mut ctx).unwrap();
            assert!(i != 0 && i != 3);
        }
    }

    #[test]
    fn test_pick_empty_total() {
        let mut t = WeightTable::default();
        t.reset(2, 0.0);
        assert_eq!(t.pick(&mut SimContext::from_seed(1)), None);
    }

    #[test]
    fn test_pick_is_uniform_for_equal_weights() {
        let n = 5;
        let draws = 50_000;
        let mut t = WeightTable::default();
        t.reset(n, 1.0);
        let mut counts = vec![0usize; n];
        let mut ctx = SimContext::from_seed(99);
        for _ in 0..draws {
            counts[t.pick(&mut ctx).unwrap()] += 1;
        }
        let expected = draws as f64 / n as f64;
        for c in counts {
            assert!((c as f64 - expected).abs() < expected * 0.05);
        }
    }
}
