//! Batch simulation
//!
//! Runs many trials of a simulation, each built from up to four stage setups
//! and an optional template society, and collects summary statistics. The
//! work is resumable: [`BatchSimulation::advance`] runs a bounded slice and
//! reports where it stopped.

pub mod stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use laputa_report::{BatchSummary, Progress, StepCursor};
use serde::{Deserialize, Serialize};

use crate::context::{round_half_up, SimContext};
use crate::error::{LaputaError, Result};
use crate::setup::SocietySetup;
use crate::simulation::Simulation;
use crate::society::Society;
use crate::statistics_block::StatisticsBlock;

pub use stats::{Accumulator, BatchStatistics};

/// Batch limits and defaults
pub mod batch_constants {
    /// Most stages a trial can have
    pub const MAX_STAGES: usize = 4;
    pub const DEFAULT_TRIALS: u32 = 1000;
    pub const DEFAULT_STEPS: u32 = 15;
    /// Simulation steps per slice when a driver has no preference
    pub const STEPS_PER_SLICE: u64 = 1500;
    /// Where organised topologies are centred
    pub const LAYOUT_CENTRE: (f64, f64) = (300.0, 300.0);
}

use batch_constants::*;

/// How much work one call to `advance` may do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budget {
    pub max_steps: u64,
    pub deadline: Option<Instant>,
}

impl Budget {
    pub fn steps(max_steps: u64) -> Self {
        Self {
            max_steps,
            deadline: None,
        }
    }

    pub fn unlimited() -> Self {
        Self::steps(u64::MAX)
    }

    pub fn until(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::steps(STEPS_PER_SLICE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSimulation {
    pub trials: u32,
    pub stages: u32,
    pub steps: [u32; MAX_STAGES],
    pub setups: [SocietySetup; MAX_STAGES],
    pub simulation: Simulation,

    /// Society every trial starts from
    #[serde(skip)]
    pub template: Option<Society>,
    /// Society of the running trial
    #[serde(skip)]
    pub society: Society,
    #[serde(skip)]
    pub stats: BatchStatistics,
    #[serde(skip)]
    pub cur_trial: u32,
    #[serde(skip)]
    pub cur_stage: u32,
    /// Collect degree histograms and the e-value block
    #[serde(skip)]
    pub record_details: bool,
    #[serde(skip)]
    cancel: Arc<AtomicBool>,
}

impl Default for BatchSimulation {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            stages: 1,
            steps: [DEFAULT_STEPS; MAX_STAGES],
            setups: Default::default(),
            simulation: Simulation::new(),
            template: None,
            society: Society::new(),
            stats: BatchStatistics::default(),
            cur_trial: 0,
            cur_stage: 0,
            record_details: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl BatchSimulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch with every property pinned to the template between trials.
    pub fn with_template(template: Society) -> Self {
        let mut batch = Self::default();
        for setup in batch.setups.iter_mut() {
            setup.pin_variation();
        }
        batch.template = Some(template);
        batch
    }

    /// Blends two batch configurations. Counts are rounded, stage setups
    /// beyond the blended stage count stay with `l`, and recording options
    /// are switched off.
    pub fn interpolate(l: &Self, r: &Self, v: f64) -> Self {
        let mix = |a: u32, b: u32| round_half_up(a as f64 * (1.0 - v) + b as f64 * v).max(0) as u32;
        let mut out = l.clone();
        out.cancel = Arc::new(AtomicBool::new(false));
        out.stages = mix(l.stages, r.stages);
        out.trials = mix(l.trials, r.trials);
        out.simulation = Simulation::interpolate(&l.simulation, &r.simulation, v);
        let n = (out.stages as usize).min(MAX_STAGES);
        for i in 0..n {
            out.steps[i] = mix(l.steps[i], r.steps[i]);
            out.setups[i] = SocietySetup::interpolate(&l.setups[i], &r.setups[i], v);
        }
        out.stats = BatchStatistics::default();
        out.cur_trial = 0;
        out.cur_stage = 0;
        out.simulation.cur_step = 0;
        out
    }

    pub fn description(&self) -> String {
        let mut s = String::from("GENERAL PARAMETERS\r\n");
        s += &format!("Trials: {}\r\n", self.trials);
        s += &format!("Stages: {}\r\n", self.stages);
        s += "SIMULATION VARIABLES\r\n";
        s += &self.simulation.description();
        s += "\r\n";
        for i in 0..(self.stages as usize).min(MAX_STAGES) {
            s += "--------------------------\r\n";
            s += &format!("STAGE {}\r\n", i + 1);
            s += &format!("Steps: {}\r\n", self.steps[i]);
            s += &self.setups[i].description();
            s += "\r\n";
        }
        s
    }

    fn active_stages(&self) -> &[u32] {
        &self.steps[..(self.stages as usize).min(MAX_STAGES)]
    }

    /// Steps in one trial, over all stages.
    pub fn total_steps(&self) -> u32 {
        self.active_stages().iter().sum()
    }

    /// Step at which the current stage ends.
    fn stage_end_step(&self) -> i64 {
        self.steps[..=self.cur_stage as usize]
            .iter()
            .map(|&s| s as i64)
            .sum()
    }

    /// Largest population any trial can reach.
    pub fn max_inquirers(&self) -> usize {
        let mut max = if self.setups[0].vary_population {
            0
        } else {
            self.template.as_ref().map_or(0, Society::len)
        };
        for setup in &self.setups[..(self.stages as usize).min(MAX_STAGES)] {
            if setup.vary_population {
                max = max.max(setup.population.max.ceil().max(0.0) as usize);
            }
        }
        max
    }

    /// Handle for stopping the batch from another thread.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.cur_trial >= self.trials
    }

    /// Rewinds to the first trial, keeping configuration and template.
    pub fn restart(&mut self) {
        self.cur_trial = 0;
        self.cur_stage = 0;
        self.simulation.cur_step = 0;
        self.cancel.store(false, Ordering::Relaxed);
    }

    /// Zeroes the statistics, allocates the e-value block when detailed
    /// results are wanted and builds the trust tables of every stage.
    ///
    /// A block too large to allocate is dropped with a warning; the batch
    /// carries on with summary statistics only.
    pub fn setup_trials(&mut self) {
        self.stats.reset();
        self.stats.e_values_over_time = StatisticsBlock::default();
        if self.record_details && self.stats.record_e_value_stats {
            let tpe = self.stats.time_per_e_value.max(1);
            let spe = self.stats.societies_per_e_value.max(1) as usize;
            let width = self.max_inquirers();
            let height = (self.total_steps() as usize + 1) / tpe;
            let depth = self.trials as usize / spe;
            match StatisticsBlock::allocate(width, height, depth) {
                Ok(block) => self.stats.e_values_over_time = block,
                Err(e) => tracing::warn!(
                    error = %e,
                    "insufficient memory for detailed batch results, recording summary statistics only"
                ),
            }
        }
        for setup in self.setups.iter_mut() {
            setup.precalculate();
        }
    }

    /// Runs at most one budget's worth of steps.
    ///
    /// Trials and stages are entered and left at step boundaries, so the
    /// batch can be resumed by calling `advance` again. The cancel flag is
    /// only read between slices.
    pub fn advance(&mut self, budget: Budget, ctx: &mut SimContext) -> Result<Progress> {
        if self.stages == 0 || self.stages as usize > MAX_STAGES {
            return Err(LaputaError::StageCount(self.stages));
        }
        if self.template.is_none() && !self.setups[0].vary_population {
            return Err(LaputaError::MissingTemplate);
        }
        if self.cancel.load(Ordering::Relaxed) {
            return Ok(Progress::Cancelled);
        }
        if self.is_finished() {
            return Ok(Progress::Finished);
        }

        let mut taken: u64 = 0;
        while taken < budget.max_steps && !budget.expired() {
            if self.cur_stage == 0 && self.simulation.cur_step == 0 {
                self.begin_trial(ctx)?;
            }
            let remaining = (self.stage_end_step() - self.simulation.cur_step).max(0) as u64;
            let n = remaining.min(budget.max_steps - taken);
            self.simulation.step(&mut self.society, ctx, n)?;
            taken += n;

            if self.simulation.cur_step >= self.stage_end_step() {
                self.cur_stage += 1;
                if self.cur_stage < self.stages {
                    self.begin_stage(ctx)?;
                    continue;
                }
                let total_steps = self.total_steps();
                self.stats.record_trial_end(
                    &self.simulation,
                    &self.society,
                    total_steps,
                    self.record_details,
                );
                self.cur_trial += 1;
                if self.is_finished() {
                    self.finish();
                    return Ok(Progress::Finished);
                }
                self.cur_stage = 0;
                self.simulation.cur_step = 0;
            }
        }
        Ok(self.progress())
    }

    /// Loops `advance` until the batch finishes or is cancelled.
    pub fn run_to_completion(&mut self, ctx: &mut SimContext) -> Result<Progress> {
        loop {
            match self.advance(Budget::default(), ctx)? {
                Progress::Running { .. } => continue,
                done => return Ok(done),
            }
        }
    }

    pub fn progress(&self) -> Progress {
        if self.is_finished() {
            return Progress::Finished;
        }
        Progress::Running {
            cursor: StepCursor {
                trial: self.cur_trial,
                stage: self.cur_stage,
                step: self.simulation.cur_step.max(0) as u32,
            },
            fraction: self.cur_trial as f64 / self.trials.max(1) as f64,
        }
    }

    /// Means and spreads over the trials finished so far.
    pub fn summary(&self) -> BatchSummary {
        self.stats.summary(self.total_steps(), self.description())
    }

    fn begin_trial(&mut self, ctx: &mut SimContext) -> Result<()> {
        if self.cur_trial == 0 {
            self.setup_trials();
        }
        self.society = Society::from_setup(&self.setups[0], self.template.as_ref(), ctx);
        self.simulation.reset(&mut self.society);

        self.simulation.e_values_over_time = StatisticsBlock::default();
        let spe = self.stats.societies_per_e_value.max(1);
        let block = &self.stats.e_values_over_time;
        if self.stats.record_e_value_stats && block.is_valid() && self.cur_trial % spe == 0 {
            let z = (self.cur_trial / spe) as usize;
            if z < block.depth() {
                let mut attached = block.clone();
                attached.set_offset(0, 0, z);
                self.simulation.e_values_over_time = attached;
                self.simulation.time_per_e_value = self.stats.time_per_e_value.max(1);
                self.simulation.record_e_values(&self.society)?;
            }
        }

        let spt = self.stats.societies_per_topology.max(1);
        if self.stats.record_topologies && self.cur_trial % spt == 0 {
            let (x, y) = LAYOUT_CENTRE;
            self.society.organise(x, y, ctx);
            self.stats.topologies.push(self.society.topology());
        }
        tracing::debug!(trial = self.cur_trial, inquirers = self.society.len(), "trial started");
        Ok(())
    }

    /// Rebuilds the society from the next stage's setup, the current one
    /// serving as template.
    fn begin_stage(&mut self, ctx: &mut SimContext) -> Result<()> {
        let setup = &self.setups[self.cur_stage as usize];
        self.society = Society::from_setup(setup, Some(&self.society), ctx);
        tracing::debug!(
            trial = self.cur_trial,
            stage = self.cur_stage,
            inquirers = self.society.len(),
            "stage started"
        );
        // Values may have changed with the rebuild
        self.simulation.record_e_values(&self.society)
    }

    fn finish(&mut self) {
        if let Some(t) = &self.template {
            self.society = t.clone();
        }
        self.simulation.e_values_over_time = StatisticsBlock::default();
        let summary = self.summary();
        tracing::info!(
            trials = self.trials,
            e_value = format!("{:.4}", summary.e_value.mean),
            e_value_delta = format!("{:.4}", summary.e_value_delta.mean),
            polarisation = format!("{:.4}", summary.polarisation.mean),
            "batch finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Distribution, DistributionKind};

    fn small_batch(trials: u32) -> BatchSimulation {
        let mut batch = BatchSimulation::new();
        batch.trials = trials;
        batch.steps[0] = 5;
        let setup = &mut batch.setups[0];
        setup.vary_population = true;
        setup.population = Distribution::fixed(4);
        batch
    }

    #[test]
    fn test_total_steps_counts_active_stages() {
        let mut batch = BatchSimulation::new();
        batch.steps = [3, 4, 5, 6];
        assert_eq!(batch.total_steps(), 3);
        batch.stages = 3;
        assert_eq!(batch.total_steps(), 12);
    }

    #[test]
    fn test_stage_count_is_checked() {
        let mut batch = small_batch(1);
        batch.stages = 5;
        let err = batch.advance(Budget::unlimited(), &mut SimContext::from_seed(1));
        assert!(matches!(err, Err(LaputaError::StageCount(5))));
    }

    #[test]
    fn test_constant_population_needs_template() {
        let mut batch = BatchSimulation::new();
        let err = batch.advance(Budget::unlimited(), &mut SimContext::from_seed(1));
        assert!(matches!(err, Err(LaputaError::MissingTemplate)));
    }

    #[test]
    fn test_runs_every_trial() {
        let mut batch = small_batch(6);
        let done = batch.run_to_completion(&mut SimContext::from_seed(2)).unwrap();
        assert_eq!(done, Progress::Finished);
        let s = batch.summary();
        assert_eq!(s.trials, 6);
        assert_eq!(s.total_steps, 5);
    }

    #[test]
    fn test_advance_respects_budget() {
        let mut batch = small_batch(4);
        let mut ctx = SimContext::from_seed(3);
        let p = batch.advance(Budget::steps(7), &mut ctx).unwrap();
        match p {
            Progress::Running { cursor, .. } => {
                assert_eq!(cursor.trial, 1);
                assert_eq!(cursor.step, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        let p = batch.run_to_completion(&mut ctx).unwrap();
        assert!(p.is_finished());
        assert_eq!(batch.stats.trials_recorded, 4);
    }

    #[test]
    fn test_slicing_does_not_change_results() {
        let mut a = small_batch(5);
        a.run_to_completion(&mut SimContext::from_seed(4)).unwrap();
        let mut b = small_batch(5);
        let mut ctx = SimContext::from_seed(4);
        while !b.advance(Budget::steps(3), &mut ctx).unwrap().is_finished() {}
        assert_eq!(a.stats.e_value, b.stats.e_value);
    }

    #[test]
    fn test_cancel_between_slices() {
        let mut batch = small_batch(100);
        let mut ctx = SimContext::from_seed(5);
        batch.advance(Budget::steps(1), &mut ctx).unwrap();
        batch.cancel_handle().store(true, Ordering::Relaxed);
        assert_eq!(batch.advance(Budget::steps(1), &mut ctx).unwrap(), Progress::Cancelled);
        assert!(batch.stats.trials_recorded < 100);
    }

    #[test]
    fn test_stages_rebuild_from_current_society() {
        let mut batch = small_batch(2);
        batch.stages = 2;
        batch.steps[1] = 3;
        batch.setups[1].pin_variation();
        let done = batch.run_to_completion(&mut SimContext::from_seed(6)).unwrap();
        assert!(done.is_finished());
        assert_eq!(batch.summary().total_steps, 8);
    }

    #[test]
    fn test_max_inquirers() {
        let mut batch = BatchSimulation::with_template(Society::generate(
            &SocietySetup {
                population: Distribution::fixed(3),
                ..SocietySetup::default()
            },
            &mut SimContext::from_seed(7),
        ));
        assert_eq!(batch.max_inquirers(), 3);
        batch.stages = 2;
        batch.setups[1].vary_population = true;
        batch.setups[1].population.max = 50.0;
        assert_eq!(batch.max_inquirers(), 50);
    }

    #[test]
    fn test_e_value_block_is_filled() {
        let mut batch = small_batch(4);
        batch.record_details = true;
        batch.stats.record_e_value_stats = true;
        batch.stats.societies_per_e_value = 2;
        batch.run_to_completion(&mut SimContext::from_seed(8)).unwrap();
        let block = &batch.stats.e_values_over_time;
        assert_eq!((block.width(), block.height(), block.depth()), (4, 6, 2));
        // every sampled trial has a full row for its first inquirer
        for z in 0..2 {
            for t in 0..6 {
                assert!(block.get(0, t, z).unwrap().is_finite());
            }
        }
        assert!(!batch.summary().in_degrees.is_empty());
    }

    #[test]
    fn test_topologies_recorded() {
        let mut batch = small_batch(4);
        batch.stats.record_topologies = true;
        batch.stats.societies_per_topology = 2;
        batch.run_to_completion(&mut SimContext::from_seed(9)).unwrap();
        assert_eq!(batch.stats.topologies.len(), 2);
        assert_eq!(batch.stats.topologies[0].nodes.len(), 4);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let mut a = small_batch(10);
        a.steps[0] = 4;
        let mut b = small_batch(20);
        b.steps[0] = 8;
        let lo = BatchSimulation::interpolate(&a, &b, 0.0);
        let mid = BatchSimulation::interpolate(&a, &b, 0.5);
        let hi = BatchSimulation::interpolate(&a, &b, 1.0);
        assert_eq!((lo.trials, lo.steps[0]), (10, 4));
        assert_eq!((mid.trials, mid.steps[0]), (15, 6));
        assert_eq!((hi.trials, hi.steps[0]), (20, 8));
        assert_eq!(hi.setups[0].population.weight(DistributionKind::Point), 1.0);
    }

    #[test]
    fn test_description_lists_stages() {
        let mut batch = small_batch(3);
        batch.stages = 2;
        let d = batch.description();
        assert!(d.starts_with("GENERAL PARAMETERS\r\nTrials: 3\r\nStages: 2\r\n"));
        assert!(d.contains("STAGE 2\r\nSteps: 15\r\n"));
    }
}
