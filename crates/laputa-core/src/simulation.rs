//! Simulation
//!
//! Drives one society through time and scores it. The epistemic value
//! (e-value) of a society measures how close its beliefs are to the truth,
//! which in every run is p. Polarisation is the spread of individual
//! e-values around that score.

use serde::{Deserialize, Serialize};

use crate::context::SimContext;
use crate::distribution::format_value;
use crate::error::Result;
use crate::parameters::Message;
use crate::society::Society;
use crate::statistics_block::StatisticsBlock;

/// How individual beliefs combine into one e-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Application {
    /// Average of the individual e-values
    #[default]
    Individually,
    /// E-value of the average belief
    ToAverage,
    /// Fixed e-value depending on which side holds a majority
    ToMajority,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationMethod {
    pub application: Application,
    /// E-values for believing not-p, either, and p
    pub e_values: [f64; 3],
    pub exponent: f64,
    /// Share of inquirers that makes a majority
    pub majority_amount: f64,
    /// Belief above which an inquirer votes p
    pub p_certainty: f64,
    /// Belief below which an inquirer votes not-p
    pub not_p_certainty: f64,
    pub amount_strictly_greater: bool,
    pub p_strictly_greater: bool,
    pub not_p_strictly_less: bool,
}

impl Default for ValuationMethod {
    fn default() -> Self {
        Self {
            application: Application::Individually,
            e_values: [0.0, 0.5, 1.0],
            exponent: 1.0,
            majority_amount: 0.5,
            p_certainty: 0.5,
            not_p_certainty: 0.5,
            amount_strictly_greater: true,
            p_strictly_greater: true,
            not_p_strictly_less: true,
        }
    }
}

const NOT_P: usize = 0;
const EITHER: usize = 1;
const P: usize = 2;

impl ValuationMethod {
    pub fn interpolate(l: &Self, r: &Self, v: f64) -> Self {
        let mix = |a: f64, b: f64| a * (1.0 - v) + b * v;
        let side = if v >= 0.5 { r } else { l };
        Self {
            application: side.application,
            e_values: [
                mix(l.e_values[0], r.e_values[0]),
                mix(l.e_values[1], r.e_values[1]),
                mix(l.e_values[2], r.e_values[2]),
            ],
            exponent: mix(l.exponent, r.exponent),
            majority_amount: mix(l.majority_amount, r.majority_amount),
            p_certainty: mix(l.p_certainty, r.p_certainty),
            not_p_certainty: mix(l.not_p_certainty, r.not_p_certainty),
            amount_strictly_greater: side.amount_strictly_greater,
            p_strictly_greater: side.p_strictly_greater,
            not_p_strictly_less: side.not_p_strictly_less,
        }
    }

    /// E-value of a single belief, piecewise linear through the three
    /// anchor values and raised to the exponent.
    pub fn individual_e_value(&self, belief: f64) -> f64 {
        let ev = &self.e_values;
        let base = if belief >= 0.5 {
            (ev[P] - ev[EITHER]) * (belief - 0.5) * 2.0 + ev[EITHER]
        } else {
            (ev[EITHER] - ev[NOT_P]) * belief * 2.0 + ev[NOT_P]
        };
        base.powf(self.exponent)
    }

    fn votes_p(&self, b: f64) -> bool {
        if self.p_strictly_greater {
            b > self.p_certainty
        } else {
            b >= self.p_certainty
        }
    }

    fn votes_not_p(&self, b: f64) -> bool {
        if self.not_p_strictly_less {
            b < self.not_p_certainty
        } else {
            b <= self.not_p_certainty
        }
    }

    /// E-value of a set of beliefs under the chosen application.
    /// An empty set scores as undecided.
    pub fn e_value_of(&self, beliefs: impl Iterator<Item = f64>) -> f64 {
        let undecided = self.e_values[EITHER].powf(self.exponent);
        match self.application {
            Application::Individually => {
                let (sum, n) = beliefs.fold((0.0, 0usize), |(s, n), b| {
                    (s + self.individual_e_value(b), n + 1)
                });
                if n == 0 {
                    undecided
                } else {
                    sum / n as f64
                }
            }
            Application::ToAverage => {
                let (sum, n) = beliefs.fold((0.0, 0usize), |(s, n), b| (s + b, n + 1));
                if n == 0 {
                    undecided
                } else {
                    self.individual_e_value(sum / n as f64)
                }
            }
            Application::ToMajority => {
                let (mut p, mut not_p, mut n) = (0usize, 0usize, 0usize);
                for b in beliefs {
                    n += 1;
                    if b > 0.5 {
                        if self.votes_p(b) {
                            p += 1;
                        }
                    } else if self.votes_not_p(b) {
                        not_p += 1;
                    }
                }
                let quota = n as f64 * self.majority_amount;
                let wins = |votes: usize| {
                    if self.amount_strictly_greater {
                        votes as f64 > quota
                    } else {
                        votes as f64 >= quota
                    }
                };
                let idx = if wins(p) {
                    P
                } else if wins(not_p) {
                    NOT_P
                } else {
                    EITHER
                };
                self.e_values[idx].powf(self.exponent)
            }
        }
    }

    pub fn description(&self) -> String {
        let mut s = String::from("E-value application method: ");
        match self.application {
            Application::ToMajority => {
                s += &format!("to majority (> {:.1}%)\r\n", self.majority_amount * 100.0);
                s += &format!(
                    "Certainty required for voting p: {}\r\n",
                    format_value(self.p_certainty)
                );
                s += &format!(
                    "Certainty required for voting not-p: {}\r\n",
                    format_value(self.not_p_certainty)
                );
            }
            Application::ToAverage => s += "to average belief\r\n",
            Application::Individually => s += "to individual beliefs\r\n",
        }
        s += &format!(
            "E-values: [p = {}, p V -p = {}, -p = {}, Exponent = {}]\r\n",
            format_value(self.e_values[P]),
            format_value(self.e_values[EITHER]),
            format_value(self.e_values[NOT_P]),
            format_value(self.exponent)
        );
        s
    }
}

/// How much of a run is narrated through `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    #[default]
    None,
    /// One line per step
    Summary,
    /// Every message and inquiry
    Standard,
    /// Trust changes as well
    Detailed,
}

/// Counts of inquiry results overridden by testimony.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandwagonCounters {
    /// Total belief shift towards p beyond what inquiry alone gave
    pub towards_p: f64,
    pub towards_not_p: f64,
    pub overridden_towards_p: u64,
    pub overridden_towards_not_p: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub valuation: ValuationMethod,
    pub log_level: LogLevel,
    #[serde(skip)]
    pub cur_step: i64,
    #[serde(skip)]
    pub e_value: f64,
    #[serde(skip)]
    pub e_value_delta: f64,
    #[serde(skip)]
    pub start_e_value: f64,
    #[serde(skip)]
    pub polarisation: f64,
    #[serde(skip)]
    pub polarisation_delta: f64,
    #[serde(skip)]
    pub start_polarisation: f64,
    #[serde(skip)]
    pub messages_sent: u64,
    #[serde(skip)]
    pub inquiry_results: u64,
    #[serde(skip)]
    pub bandwagon: BandwagonCounters,
    /// Per-inquirer e-values over time, shared with the owning batch
    #[serde(skip)]
    pub e_values_over_time: StatisticsBlock,
    #[serde(skip)]
    pub time_per_e_value: usize,
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            time_per_e_value: 1,
            ..Self::default()
        }
    }

    /// Valuation blended from two simulations; run state starts fresh.
    pub fn interpolate(l: &Simulation, r: &Simulation, v: f64) -> Simulation {
        Simulation {
            valuation: ValuationMethod::interpolate(&l.valuation, &r.valuation, v),
            log_level: l.log_level,
            ..Simulation::new()
        }
    }

    pub fn description(&self) -> String {
        self.valuation.description()
    }

    pub fn individual_e_value(&self, belief: f64) -> f64 {
        self.valuation.individual_e_value(belief)
    }

    /// Society e-value over the inquirers included in statistics.
    pub fn instant_e_value(&self, soc: &Society) -> f64 {
        self.valuation.e_value_of(
            soc.people
                .iter()
                .filter(|p| p.include_in_statistics)
                .map(|p| p.belief.v()),
        )
    }

    /// Root mean square distance of every inquirer's e-value from `ev`.
    pub fn instant_polarisation(&self, soc: &Society, ev: f64) -> f64 {
        if soc.people.is_empty() {
            return 0.0;
        }
        let sum: f64 = soc
            .people
            .iter()
            .map(|p| {
                let d = self.individual_e_value(p.belief.v()) - ev;
                d * d
            })
            .sum();
        (sum / soc.people.len() as f64).sqrt()
    }

    /// Prepares `soc` for a fresh run and records the starting scores.
    ///
    /// Evidence bookkeeping is cleared, and links that wait for evidence
    /// start out passing on their source's current leaning.
    pub fn reset(&mut self, soc: &mut Society) {
        for p in soc.people.iter_mut() {
            p.last_inquiry_result = -1;
        }
        let beliefs: Vec<f64> = soc.people.iter().map(|p| p.belief.v()).collect();
        for link in soc.links.values_mut() {
            link.last_used = -1;
            if link.evidence_policy.requires_evidence() {
                let b = beliefs[link.source];
                link.message = if b > 0.5 && b > link.threshold {
                    Message::P
                } else if b < 0.5 && b < 1.0 - link.threshold {
                    Message::NotP
                } else {
                    Message::Nothing
                };
            }
        }
        self.cur_step = 0;
        self.start_e_value = self.instant_e_value(soc);
        self.e_value = self.start_e_value;
        self.e_value_delta = 0.0;
        self.start_polarisation = self.instant_polarisation(soc, self.e_value);
        self.polarisation = self.start_polarisation;
        self.polarisation_delta = 0.0;
        self.messages_sent = 0;
        self.inquiry_results = 0;
        self.bandwagon = BandwagonCounters::default();
        tracing::debug!(
            e_value = self.e_value,
            polarisation = self.polarisation,
            inquirers = soc.people.len(),
            "simulation reset"
        );
    }

    /// Runs `n` steps of `soc`.
    pub fn step(&mut self, soc: &mut Society, ctx: &mut SimContext, n: u64) -> Result<()> {
        for _ in 0..n {
            if self.log_level >= LogLevel::Standard {
                tracing::debug!(time = self.cur_step + 1, "step");
            }
            soc.evolve(self, ctx);
            self.polarisation = self.instant_polarisation(soc, self.e_value);
            self.polarisation_delta = self.polarisation - self.start_polarisation;
            if self.log_level > LogLevel::None {
                tracing::info!(
                    time = self.cur_step + 1,
                    e_value = format!("{:.3}", self.e_value),
                    e_value_delta = format!("{:.3}", self.e_value_delta),
                    "step complete"
                );
            }
            self.cur_step += 1;
            self.record_e_values(soc)?;
        }
        Ok(())
    }

    /// Writes each inquirer's e-value into the attached block at the
    /// current time slot. Every step of a slot overwrites it, so a slot
    /// holds the e-values of its last step.
    pub fn record_e_values(&self, soc: &Society) -> Result<()> {
        let block = &self.e_values_over_time;
        let per = self.time_per_e_value.max(1);
        if !block.is_valid() || self.cur_step < 0 {
            return Ok(());
        }
        let t = self.cur_step as usize / per;
        if t + block.offset()[1] >= block.height() {
            return Ok(());
        }
        for (i, p) in soc.people.iter().enumerate().take(block.width()) {
            block.set(i, t, 0, self.individual_e_value(p.belief.v()) as f32)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::society::Inquirer;

    fn society_with(beliefs: &[f64]) -> Society {
        let mut soc = Society::new();
        for &b in beliefs {
            let mut inq = Inquirer::blank(0.0, 0.0);
            inq.belief = Amount::new(b);
            soc.push_inquirer(inq);
        }
        soc
    }

    #[test]
    fn test_individual_e_value_anchors() {
        let v = ValuationMethod::default();
        assert_eq!(v.individual_e_value(1.0), 1.0);
        assert_eq!(v.individual_e_value(0.5), 0.5);
        assert_eq!(v.individual_e_value(0.0), 0.0);
        assert!((v.individual_e_value(0.75) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_exponent_applies_to_every_method() {
        let mut v = ValuationMethod {
            exponent: 2.0,
            ..ValuationMethod::default()
        };
        assert!((v.individual_e_value(0.5) - 0.25).abs() < 1e-12);
        v.application = Application::ToMajority;
        let ev = v.e_value_of([0.5, 0.5].into_iter());
        assert!((ev - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_majority_strictness() {
        let mut v = ValuationMethod {
            application: Application::ToMajority,
            ..ValuationMethod::default()
        };
        // two of four believe p: not a strict majority
        let beliefs = [0.9, 0.8, 0.2, 0.5];
        assert_eq!(v.e_value_of(beliefs.into_iter()), 0.5);
        v.amount_strictly_greater = false;
        assert_eq!(v.e_value_of(beliefs.into_iter()), 1.0);
    }

    #[test]
    fn test_majority_certainty_threshold() {
        let v = ValuationMethod {
            application: Application::ToMajority,
            p_certainty: 0.85,
            ..ValuationMethod::default()
        };
        assert_eq!(v.e_value_of([0.9, 0.8, 0.2].into_iter()), 0.5);
        assert_eq!(v.e_value_of([0.9, 0.95, 0.2].into_iter()), 1.0);
    }

    #[test]
    fn test_to_average() {
        let v = ValuationMethod {
            application: Application::ToAverage,
            exponent: 2.0,
            ..ValuationMethod::default()
        };
        assert!((v.e_value_of([0.2, 0.8].into_iter()) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_instant_values_respect_statistics_flag() {
        let mut soc = society_with(&[1.0, 0.0]);
        let sim = Simulation::new();
        assert!((sim.instant_e_value(&soc) - 0.5).abs() < 1e-12);
        assert!((sim.instant_polarisation(&soc, 0.5) - 0.5).abs() < 1e-12);
        soc.people[1].include_in_statistics = false;
        assert_eq!(sim.instant_e_value(&soc), 1.0);
    }

    #[test]
    fn test_interpolate_picks_discrete_side() {
        let a = Simulation::new();
        let mut b = Simulation::new();
        b.valuation.application = Application::ToMajority;
        b.valuation.e_values = [0.0, 0.0, 1.0];
        let mid = Simulation::interpolate(&a, &b, 0.5);
        assert_eq!(mid.valuation.application, Application::ToMajority);
        assert_eq!(mid.valuation.e_values[1], 0.25);
        let low = Simulation::interpolate(&a, &b, 0.0);
        assert_eq!(low.valuation, a.valuation);
    }

    #[test]
    fn test_description() {
        let mut sim = Simulation::new();
        assert!(sim
            .description()
            .starts_with("E-value application method: to individual beliefs\r\n"));
        sim.valuation.application = Application::ToMajority;
        assert!(sim.description().contains("to majority (> 50.0%)"));
    }

    #[test]
    fn test_step_writes_attached_block() {
        let mut soc = society_with(&[0.25, 0.75]);
        let mut sim = Simulation::new();
        let block = StatisticsBlock::allocate(2, 3, 1).unwrap();
        block.clear();
        sim.e_values_over_time = block.clone();
        sim.reset(&mut soc);
        let mut ctx = SimContext::from_seed(1);
        sim.step(&mut soc, &mut ctx, 2).unwrap();
        assert_eq!(sim.cur_step, 2);
        assert_eq!(block.get(1, 2, 0).unwrap(), 0.75);
        assert!(block.get(0, 0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_slot_holds_last_step_of_window() {
        let mut soc = society_with(&[0.1, 0.9]);
        let mut sim = Simulation::new();
        sim.time_per_e_value = 3;
        let block = StatisticsBlock::allocate(2, 2, 1).unwrap();
        block.clear();
        sim.e_values_over_time = block.clone();

        for (step, beliefs) in [[0.1, 0.9], [0.2, 0.8], [0.3, 0.7]].iter().enumerate() {
            for (p, &b) in soc.people.iter_mut().zip(beliefs) {
                p.belief = Amount::new(b);
            }
            sim.cur_step = step as i64;
            sim.record_e_values(&soc).unwrap();
        }
        assert!((block.get(0, 0, 0).unwrap() - 0.3).abs() < 1e-6);
        assert!((block.get(1, 0, 0).unwrap() - 0.7).abs() < 1e-6);
        assert!(block.get(0, 1, 0).unwrap().is_nan());

        sim.cur_step = 3;
        sim.record_e_values(&soc).unwrap();
        assert!((block.get(1, 1, 0).unwrap() - 0.7).abs() < 1e-6);
    }
}
