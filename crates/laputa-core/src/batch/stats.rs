//! Batch statistics
//!
//! Running sums collected at the end of every trial, turned into means and
//! standard deviations once the batch finishes.

use laputa_report::{BandwagonSummary, BatchSummary, MeanStddev, NetworkTopology};

use crate::simulation::Simulation;
use crate::society::{DegreeDirection, Society};
use crate::statistics_block::StatisticsBlock;

/// Sum and sum of squares of a per-trial value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    pub sum: f64,
    pub sum_sq: f64,
}

impl Accumulator {
    pub fn record(&mut self, v: f64) {
        self.sum += v;
        self.sum_sq += v * v;
    }

    pub fn mean_stddev(&self, n: u32) -> MeanStddev {
        MeanStddev::from_sums(self.sum, self.sum_sq, n)
    }
}

const DIRECTIONS: [DegreeDirection; 3] = [
    DegreeDirection::In,
    DegreeDirection::Out,
    DegreeDirection::Total,
];

#[derive(Debug, Clone)]
pub struct BatchStatistics {
    pub e_value: Accumulator,
    pub e_value_delta: Accumulator,
    pub polarisation: Accumulator,
    pub polarisation_delta: Accumulator,
    pub messages: f64,
    pub messages_per_inquirer: f64,
    pub inquiry_results: f64,
    pub inquiry_results_per_inquirer: f64,
    pub bandwagon: BandwagonSummary,
    /// Summed degree histograms, indexed in, out, total
    pub degrees: [Vec<f64>; 3],
    pub trials_recorded: u32,

    pub record_e_value_stats: bool,
    /// Steps between samples of the e-value block
    pub time_per_e_value: usize,
    /// Trials between samples of the e-value block
    pub societies_per_e_value: u32,
    /// Per inquirer, time slot and sampled trial
    pub e_values_over_time: StatisticsBlock,

    pub record_topologies: bool,
    pub societies_per_topology: u32,
    pub topologies: Vec<NetworkTopology>,
}

impl Default for BatchStatistics {
    fn default() -> Self {
        Self {
            e_value: Accumulator::default(),
            e_value_delta: Accumulator::default(),
            polarisation: Accumulator::default(),
            polarisation_delta: Accumulator::default(),
            messages: 0.0,
            messages_per_inquirer: 0.0,
            inquiry_results: 0.0,
            inquiry_results_per_inquirer: 0.0,
            bandwagon: BandwagonSummary::default(),
            degrees: Default::default(),
            trials_recorded: 0,
            record_e_value_stats: false,
            time_per_e_value: 1,
            societies_per_e_value: 1,
            e_values_over_time: StatisticsBlock::default(),
            record_topologies: false,
            societies_per_topology: 1,
            topologies: Vec::new(),
        }
    }
}

impl BatchStatistics {
    /// Zeroes every accumulator, keeping the recording options.
    pub fn reset(&mut self) {
        *self = Self {
            record_e_value_stats: self.record_e_value_stats,
            time_per_e_value: self.time_per_e_value.max(1),
            societies_per_e_value: self.societies_per_e_value.max(1),
            e_values_over_time: std::mem::take(&mut self.e_values_over_time),
            record_topologies: self.record_topologies,
            societies_per_topology: self.societies_per_topology.max(1),
            ..Self::default()
        };
    }

    /// Adds the outcome of one finished trial.
    pub fn record_trial_end(
        &mut self,
        sim: &Simulation,
        soc: &Society,
        total_steps: u32,
        record_details: bool,
    ) {
        self.trials_recorded += 1;
        self.e_value.record(sim.e_value);
        self.e_value_delta.record(sim.e_value_delta);
        let p = sim.instant_polarisation(soc, sim.e_value);
        self.polarisation.record(p);
        self.polarisation_delta.record(p - sim.start_polarisation);

        let people = soc.len().max(1) as f64;
        self.messages += sim.messages_sent as f64;
        self.messages_per_inquirer += sim.messages_sent as f64 / people;
        self.inquiry_results += sim.inquiry_results as f64;
        self.inquiry_results_per_inquirer += sim.inquiry_results as f64 / people;

        if sim.inquiry_results > 0 {
            let norm = people * total_steps.max(1) as f64;
            let bw = &sim.bandwagon;
            self.bandwagon.towards_p_probability += bw.overridden_towards_p as f64 / norm;
            self.bandwagon.towards_p_effect += bw.towards_p / norm;
            self.bandwagon.towards_not_p_probability += bw.overridden_towards_not_p as f64 / norm;
            self.bandwagon.towards_not_p_effect += bw.towards_not_p / norm;
        }

        if record_details {
            for (sum, dir) in self.degrees.iter_mut().zip(DIRECTIONS) {
                let hist = soc.degrees(dir);
                if hist.len() > sum.len() {
                    sum.resize(hist.len(), 0.0);
                }
                for (s, h) in sum.iter_mut().zip(hist) {
                    *s += h as f64;
                }
            }
        }
    }

    /// Means and standard deviations over the trials recorded so far.
    pub fn summary(&self, total_steps: u32, description: String) -> BatchSummary {
        let n = self.trials_recorded;
        let avg = |v: f64| if n == 0 { 0.0 } else { v / n as f64 };
        let avg_hist = |h: &Vec<f64>| h.iter().map(|&v| avg(v)).collect::<Vec<f64>>();
        BatchSummary {
            trials: n,
            total_steps,
            e_value: self.e_value.mean_stddev(n),
            e_value_delta: self.e_value_delta.mean_stddev(n),
            polarisation: self.polarisation.mean_stddev(n),
            polarisation_delta: self.polarisation_delta.mean_stddev(n),
            avg_messages: avg(self.messages),
            avg_messages_per_inquirer: avg(self.messages_per_inquirer),
            avg_inquiry_results: avg(self.inquiry_results),
            avg_inquiry_results_per_inquirer: avg(self.inquiry_results_per_inquirer),
            bandwagon: BandwagonSummary {
                towards_p_probability: avg(self.bandwagon.towards_p_probability),
                towards_p_effect: avg(self.bandwagon.towards_p_effect),
                towards_not_p_probability: avg(self.bandwagon.towards_not_p_probability),
                towards_not_p_effect: avg(self.bandwagon.towards_not_p_effect),
            },
            in_degrees: avg_hist(&self.degrees[0]),
            out_degrees: avg_hist(&self.degrees[1]),
            total_degrees: avg_hist(&self.degrees[2]),
            description,
        }
    }
}
