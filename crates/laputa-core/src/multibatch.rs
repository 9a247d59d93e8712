//! Grids of interpolated batches
//!
//! Four corner batches span a grid. Moving along x blends A into B (and C
//! into D); moving along y blends the A/B result into the C/D result. Each
//! cell's batch runs to completion and contributes one value per metric.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use laputa_report::{Cell, GridSummary, Progress, Sheet, Workbook};
use serde::{Deserialize, Serialize};

use crate::batch::{BatchSimulation, Budget};
use crate::context::SimContext;
use crate::error::Result;
use crate::society::Society;

/// Grid defaults and export names
pub mod multibatch_constants {
    pub const DEFAULT_GRID_STEPS: u32 = 10;
    /// Sheet names of the results workbook, metrics first
    pub const SHEET_NAMES: [&str; 5] = [
        "E-value",
        "E-value delta",
        "Polarisation",
        "Polarisation delta",
        "Parameters",
    ];
}

use multibatch_constants::*;

/// Corner of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    A,
    B,
    C,
    D,
}

impl Corner {
    pub fn index(self) -> usize {
        match self {
            Corner::A => 0,
            Corner::B => 1,
            Corner::C => 2,
            Corner::D => 3,
        }
    }
}

/// Position of grid step `step` out of `steps` along one axis, in [0, 1].
pub fn grid_coordinate(step: u32, steps: u32) -> f64 {
    if steps <= 1 {
        0.0
    } else {
        step as f64 / (steps - 1) as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiBatch {
    pub steps_a_to_b: u32,
    pub steps_a_to_c: u32,
    pub batches: [BatchSimulation; 4],

    #[serde(skip)]
    pub template: Option<Society>,
    /// Batch of the cell being run
    #[serde(skip)]
    pub current: BatchSimulation,
    #[serde(skip)]
    pub x_step: u32,
    #[serde(skip)]
    pub y_step: u32,
    #[serde(skip)]
    pub results: GridSummary,
    #[serde(skip)]
    started: bool,
    #[serde(skip)]
    finished: bool,
    #[serde(skip)]
    cancel: Arc<AtomicBool>,
}

impl Default for MultiBatch {
    fn default() -> Self {
        Self {
            steps_a_to_b: DEFAULT_GRID_STEPS,
            steps_a_to_c: DEFAULT_GRID_STEPS,
            batches: Default::default(),
            template: None,
            current: BatchSimulation::default(),
            x_step: 0,
            y_step: 0,
            results: GridSummary::default(),
            started: false,
            finished: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl MultiBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A grid whose corners keep every property of `template` between trials.
    pub fn with_template(template: Society) -> Self {
        let mut mb = Self::default();
        for batch in mb.batches.iter_mut() {
            for setup in batch.setups.iter_mut() {
                setup.pin_variation();
            }
        }
        mb.template = Some(template);
        mb
    }

    pub fn corner(&self, c: Corner) -> &BatchSimulation {
        &self.batches[c.index()]
    }

    pub fn corner_mut(&mut self, c: Corner) -> &mut BatchSimulation {
        &mut self.batches[c.index()]
    }

    pub fn cells(&self) -> u32 {
        self.steps_a_to_b.max(1) * self.steps_a_to_c.max(1)
    }

    /// Builds the batch at grid position `(x, y)`, both in [0, 1].
    ///
    /// With a single step along y only corners A and B take part.
    pub fn generate_batch(&self, x: f64, y: f64) -> BatchSimulation {
        let [a, b, c, d] = &self.batches;
        let ab = BatchSimulation::interpolate(a, b, x);
        let mut batch = if self.steps_a_to_c > 1 {
            let cd = BatchSimulation::interpolate(c, d, x);
            BatchSimulation::interpolate(&ab, &cd, y)
        } else {
            ab
        };
        batch.template = self.template.clone();
        batch.restart();
        batch
    }

    /// Clears the results grid and builds the first cell's batch.
    pub fn start(&mut self) {
        let (w, h) = (self.steps_a_to_b.max(1), self.steps_a_to_c.max(1));
        let n = (w * h) as usize;
        self.results = GridSummary {
            width: w,
            height: h,
            e_value: vec![0.0; n],
            e_value_delta: vec![0.0; n],
            polarisation: vec![0.0; n],
            polarisation_delta: vec![0.0; n],
            titles: vec![String::new(); n],
        };
        self.x_step = 0;
        self.y_step = 0;
        self.current = self.generate_batch(0.0, 0.0);
        self.started = true;
        self.finished = false;
        self.cancel.store(false, Ordering::Relaxed);
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Runs one slice of the current cell's batch, moving on to the next
    /// cell when it finishes.
    pub fn advance(&mut self, budget: Budget, ctx: &mut SimContext) -> Result<Progress> {
        if self.cancel.load(Ordering::Relaxed) {
            return Ok(Progress::Cancelled);
        }
        if self.finished {
            return Ok(Progress::Finished);
        }
        if !self.started {
            self.start();
        }

        match self.current.advance(budget, ctx)? {
            Progress::Finished => {
                self.record_batch_statistics();
                tracing::info!(
                    cell = self.cell_index() + 1,
                    cells = self.cells(),
                    "grid cell finished"
                );
                self.x_step += 1;
                if self.x_step >= self.results.width {
                    self.x_step = 0;
                    self.y_step += 1;
                    if self.y_step >= self.results.height {
                        self.finished = true;
                        return Ok(Progress::Finished);
                    }
                }
                self.current = self.generate_batch(
                    grid_coordinate(self.x_step, self.steps_a_to_b),
                    grid_coordinate(self.y_step, self.steps_a_to_c),
                );
                Ok(self.progress())
            }
            Progress::Cancelled => Ok(Progress::Cancelled),
            Progress::Running { .. } => Ok(self.progress()),
        }
    }

    pub fn run_to_completion(&mut self, ctx: &mut SimContext) -> Result<Progress> {
        loop {
            match self.advance(Budget::default(), ctx)? {
                Progress::Running { .. } => continue,
                done => return Ok(done),
            }
        }
    }

    fn cell_index(&self) -> usize {
        self.results.index(self.x_step, self.y_step)
    }

    /// Cell progress with the current batch's cursor.
    pub fn progress(&self) -> Progress {
        if self.finished {
            return Progress::Finished;
        }
        match self.current.progress() {
            Progress::Running { cursor, fraction } => Progress::Running {
                cursor,
                fraction: (self.cell_index() as f64 + fraction) / self.cells() as f64,
            },
            _ => Progress::Running {
                cursor: Default::default(),
                fraction: (self.cell_index() + 1) as f64 / self.cells() as f64,
            },
        }
    }

    fn record_batch_statistics(&mut self) {
        let i = self.cell_index();
        let s = self.current.summary();
        self.results.e_value[i] = s.e_value.mean;
        self.results.e_value_delta[i] = s.e_value_delta.mean;
        self.results.polarisation[i] = s.polarisation.mean;
        self.results.polarisation_delta[i] = s.polarisation_delta.mean;
        self.results.titles[i] = s.description;
    }

    /// The results grid as one sheet per metric plus the cell parameters.
    pub fn workbook(&self) -> Workbook {
        let r = &self.results;
        let (w, h) = (r.width as usize, r.height as usize);
        let mut book = Workbook::new();
        let metrics = [
            &r.e_value,
            &r.e_value_delta,
            &r.polarisation,
            &r.polarisation_delta,
        ];
        for (name, values) in SHEET_NAMES.iter().zip(metrics) {
            let mut sheet = Sheet::new(*name, w, h);
            for (i, &v) in values.iter().enumerate() {
                sheet.set(i % w, i / w, v);
            }
            book.push(sheet);
        }
        let mut params = Sheet::new(SHEET_NAMES[4], w, h);
        for (i, title) in r.titles.iter().enumerate() {
            params.set(i % w, i / w, Cell::Text(title.clone()));
        }
        book.push(params);
        book
    }
}
