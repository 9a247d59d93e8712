//! Named default distributions used by parameter defaults.

use serde::{Deserialize, Serialize};

use super::{BetaDistribution, Distribution, DistributionKind, IntervalDistribution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultDistribution {
    /// Uniform on [0, 1]
    IntervalWhole,
    /// Uniform on [0.5, 1]
    IntervalUpper,
    /// Uniform on [0, 0.5]
    IntervalLower,
    /// Beta(2, 2)
    BetaNeutral,
    /// Beta(4, 2), leaning high
    BetaUpper,
    /// Beta(2, 4), leaning low
    BetaLower,
}

impl DefaultDistribution {
    pub fn build(self) -> Distribution {
        match self {
            DefaultDistribution::IntervalWhole => interval(0.0, 1.0),
            DefaultDistribution::IntervalUpper => interval(0.5, 1.0),
            DefaultDistribution::IntervalLower => interval(0.0, 0.5),
            DefaultDistribution::BetaNeutral => beta(2.0, 2.0),
            DefaultDistribution::BetaUpper => beta(4.0, 2.0),
            DefaultDistribution::BetaLower => beta(2.0, 4.0),
        }
    }
}

fn interval(lower: f64, upper: f64) -> Distribution {
    let mut d = Distribution::pure(DistributionKind::Interval);
    d.interval = IntervalDistribution { lower, upper };
    d
}

fn beta(alpha: f64, beta: f64) -> Distribution {
    let mut d = Distribution::pure(DistributionKind::Beta);
    d.beta = BetaDistribution { alpha, beta };
    d
}
