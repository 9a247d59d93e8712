//! Amount
//!
//! A probability stored twice: once directly and once as its complement.
//! Operations pick whichever encoding keeps precision, so values very close
//! to 0 or 1 survive long chains of Bayesian updates.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

/// A probability in [0, 1] with a separately tracked complement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Amount {
    value: f64,
    inverse: f64,
}

impl Default for Amount {
    fn default() -> Self {
        Self {
            value: 0.5,
            inverse: 0.5,
        }
    }
}

fn in_range(x: f64) -> bool {
    (-1e-9..=1.0 + 1e-9).contains(&x)
}

impl Amount {
    /// Creates an amount for probability `p`.
    ///
    /// `p` must lie in [0, 1]. Debug builds assert; release builds clamp.
    pub fn new(p: f64) -> Self {
        debug_assert!(in_range(p), "probability {} out of range", p);
        let p = p.clamp(0.0, 1.0);
        Self {
            value: p,
            inverse: 1.0 - p,
        }
    }

    /// The probability this amount represents.
    pub fn v(&self) -> f64 {
        0.5 + 0.5 * (self.value - self.inverse)
    }

    /// The complementary amount, 1 - p.
    pub fn inverted(&self) -> Self {
        Self {
            value: self.inverse,
            inverse: self.value,
        }
    }

    /// True unless the amount is exactly zero, however small its value.
    pub fn is_positive(&self) -> bool {
        self.value > 0.0
    }

    /// Computes `self / (self + other)` choosing the stable encoding.
    pub fn divided_by_added(&self, other: Amount) -> Amount {
        let mut amt = Amount::default();
        if self.inverse + other.inverse < 1.0 {
            // both near 1: work on the complements
            amt.inverse = (1.0 - other.inverse) / (2.0 - self.inverse - other.inverse);
            amt.value = 1.0 - amt.inverse;
        } else {
            amt.value = self.value / (self.value + other.value);
            amt.inverse = 1.0 - amt.value;
        }
        amt.check();
        amt
    }

    fn check(&mut self) {
        debug_assert!(
            in_range(self.value) && in_range(self.inverse),
            "amount left range: value {} inverse {}",
            self.value,
            self.inverse
        );
        self.value = self.value.clamp(0.0, 1.0);
        self.inverse = self.inverse.clamp(0.0, 1.0);
    }
}

impl From<Amount> for f64 {
    fn from(a: Amount) -> f64 {
        a.v()
    }
}

impl From<f64> for Amount {
    fn from(p: f64) -> Amount {
        Amount::new(p)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.v())
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, o: Amount) {
        self.value += o.value;
        self.inverse += o.inverse - 1.0;
        self.check();
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, o: Amount) {
        self.value -= o.value;
        self.inverse -= o.inverse - 1.0;
        self.check();
    }
}

impl MulAssign for Amount {
    fn mul_assign(&mut self, o: Amount) {
        self.value *= o.value;
        self.inverse = self.inverse + o.inverse - self.inverse * o.inverse;
        self.check();
    }
}

impl DivAssign for Amount {
    fn div_assign(&mut self, o: Amount) {
        debug_assert!(o.value > 0.0, "division by a zero amount");
        if o.inverse >= 1.0 {
            return;
        }
        if o.value > 0.5 {
            self.value /= o.value;
            self.inverse = (self.inverse - o.inverse) / (1.0 - o.inverse);
        } else {
            self.inverse = (self.inverse - o.inverse) / (1.0 - o.inverse);
            self.value = 1.0 - self.inverse;
        }
        self.check();
    }
}

macro_rules! by_value_op {
    ($tr:ident, $method:ident, $assign:ident) => {
        impl $tr for Amount {
            type Output = Amount;
            fn $method(mut self, o: Amount) -> Amount {
                self.$assign(o);
                self
            }
        }
    };
}

by_value_op!(Add, add, add_assign);
by_value_op!(Sub, sub, sub_assign);
by_value_op!(Mul, mul, mul_assign);
by_value_op!(Div, div, div_assign);

impl PartialEq for Amount {
    fn eq(&self, o: &Amount) -> bool {
        self.value - self.inverse == o.value - o.inverse
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, o: &Amount) -> Option<Ordering> {
        (self.value - self.inverse).partial_cmp(&(o.value - o.inverse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_round_trip() {
        for i in 0..=100 {
            let p = i as f64 / 100.0;
            assert!((Amount::new(p).v() - p).abs() < EPS);
            assert!((Amount::new(p).inverted().v() - (1.0 - p)).abs() < EPS);
        }
    }

    #[test]
    fn test_addition() {
        let sum = Amount::new(0.3) + Amount::new(0.45);
        assert!((sum.v() - 0.75).abs() < EPS);
        let diff = Amount::new(0.8) - Amount::new(0.3);
        assert!((diff.v() - 0.5).abs() < EPS);
    }

    #[test]
    fn test_multiplication() {
        let prod = Amount::new(0.5) * Amount::new(0.4);
        assert!((prod.v() - 0.2).abs() < EPS);
    }

    #[test]
    fn test_division_both_branches() {
        let a = Amount::new(0.2) / Amount::new(0.8);
        assert!((a.v() - 0.25).abs() < EPS);
        let b = Amount::new(0.1) / Amount::new(0.4);
        assert!((b.v() - 0.25).abs() < EPS);
    }

    #[test]
    fn test_divided_by_added() {
        let r = Amount::new(0.3).divided_by_added(Amount::new(0.1));
        assert!((r.v() - 0.75).abs() < EPS);
    }

    #[test]
    fn test_divided_by_added_tiny() {
        let p = 1e-9;
        let q = 3e-9;
        let r = Amount::new(p).divided_by_added(Amount::new(q));
        assert!((r.v() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_divided_by_added_near_one() {
        let p = Amount::new(1.0 - 1e-9);
        let q = Amount::new(1.0 - 3e-9);
        let r = p.divided_by_added(q);
        let expected = (1.0 - 1e-9) / ((1.0 - 1e-9) + (1.0 - 3e-9));
        assert!((r.v() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_likelihood_chain_keeps_precision() {
        // repeated strong evidence for p from a belief of 0.5
        let mut lhs = Amount::new(0.5);
        let mut rhs = Amount::new(0.5);
        for _ in 0..10 {
            lhs *= Amount::new(0.9);
            rhs *= Amount::new(0.1);
        }
        let b = lhs.divided_by_added(rhs);
        let expected = 0.9f64.powi(10) / (0.9f64.powi(10) + 0.1f64.powi(10));
        assert!((b.v() - expected).abs() < 1e-9);
        assert!(b.inverted().v() > 0.0);
    }

    #[test]
    fn test_is_positive_on_tiny_values() {
        let mut a = Amount::new(1e-150);
        a *= Amount::new(1e-150);
        assert!(a.is_positive());
        assert!(!Amount::new(0.0).is_positive());
    }

    #[test]
    fn test_ordering() {
        assert!(Amount::new(0.7) > Amount::new(0.3));
        assert_eq!(Amount::new(0.5), Amount::default());
    }
}
