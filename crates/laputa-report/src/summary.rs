//! Summary Types
//!
//! Aggregated batch and grid results, serializable for output files.

use serde::{Deserialize, Serialize};

/// Mean and standard deviation of a per-trial statistic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanStddev {
    pub mean: f64,
    pub stddev: f64,
}

impl MeanStddev {
    /// Builds from accumulated sums over `n` samples.
    ///
    /// The variance is clamped at zero before the square root to absorb
    /// rounding when all samples are equal.
    pub fn from_sums(sum: f64, sum_sq: f64, n: u32) -> Self {
        if n == 0 {
            return Self::default();
        }
        let n = n as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        Self {
            mean,
            stddev: variance.sqrt(),
        }
    }
}

/// Bandwagon effect averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandwagonSummary {
    /// Average chance that testimony pushed a belief further toward p than inquiry did
    pub towards_p_probability: f64,
    /// Average size of that push
    pub towards_p_effect: f64,
    pub towards_not_p_probability: f64,
    pub towards_not_p_effect: f64,
}

/// Final statistics of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub trials: u32,
    pub total_steps: u32,
    pub e_value: MeanStddev,
    pub e_value_delta: MeanStddev,
    pub polarisation: MeanStddev,
    pub polarisation_delta: MeanStddev,
    pub avg_messages: f64,
    pub avg_messages_per_inquirer: f64,
    pub avg_inquiry_results: f64,
    pub avg_inquiry_results_per_inquirer: f64,
    #[serde(default)]
    pub bandwagon: BandwagonSummary,
    /// Average in-degree histogram
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_degrees: Vec<f64>,
    /// Average out-degree histogram
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub out_degrees: Vec<f64>,
    /// Average total-degree histogram
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub total_degrees: Vec<f64>,
    #[serde(default)]
    pub description: String,
}

/// Results of a grid of interpolated batches.
///
/// Values are stored row-major with `x` varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub width: u32,
    pub height: u32,
    pub e_value: Vec<f64>,
    pub e_value_delta: Vec<f64>,
    pub polarisation: Vec<f64>,
    pub polarisation_delta: Vec<f64>,
    pub titles: Vec<String>,
}

impl GridSummary {
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }
}
