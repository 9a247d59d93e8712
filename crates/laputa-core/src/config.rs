//! Run configuration
//!
//! Everything the `laputa` binary needs for a run is read from one TOML
//! file. Every section and field is optional; missing values take their
//! defaults.

use std::path::{Path, PathBuf};

use laputa_report::EdgeWeighting;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::batch_constants::{DEFAULT_STEPS, DEFAULT_TRIALS, MAX_STAGES, STEPS_PER_SLICE};
use crate::batch::BatchSimulation;
use crate::context::SimContext;
use crate::error::{LaputaError, Result};
use crate::multibatch::multibatch_constants::DEFAULT_GRID_STEPS;
use crate::multibatch::{Corner, MultiBatch};
use crate::persistence;
use crate::setup::SocietySetup;
use crate::simulation::{LogLevel, ValuationMethod};
use crate::society::Society;

/// Complete run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub batch: BatchSettings,
    /// One setup per stage, in order
    #[serde(default, rename = "stage")]
    pub stages: Vec<SocietySetup>,
    #[serde(default)]
    pub template: TemplateSettings,
    /// Present for grid runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multibatch: Option<MultiBatchSettings>,
}

/// Driver and output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Overrides the command line seed
    pub seed: Option<u64>,
    /// Simulation steps per progress report
    pub slice_steps: u64,
    pub output_dir: PathBuf,
    pub log_level: LogLevel,
    /// Collect degree histograms and the e-value block
    pub record_details: bool,
    pub time_per_e_value: usize,
    pub societies_per_e_value: u32,
    /// Write one Pajek file per recorded topology
    pub export_topologies: bool,
    pub societies_per_topology: u32,
    /// Links listened to less often than this are left out of Pajek files
    pub min_listen: f64,
    pub edge_weighting: EdgeWeighting,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            seed: None,
            slice_steps: STEPS_PER_SLICE,
            output_dir: PathBuf::from("output"),
            log_level: LogLevel::None,
            record_details: true,
            time_per_e_value: 1,
            societies_per_e_value: 1,
            export_topologies: false,
            societies_per_topology: 1,
            min_listen: 0.0,
            edge_weighting: EdgeWeighting::None,
        }
    }
}

/// Trial and stage counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub trials: u32,
    /// Steps per stage; its length is the number of stages
    pub steps: Vec<u32>,
    pub valuation: ValuationMethod,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            steps: vec![DEFAULT_STEPS],
            valuation: ValuationMethod::default(),
        }
    }
}

/// Where the template society comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// A saved society document; generated from `setup` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,
    pub setup: SocietySetup,
}

/// Grid settings. Corners without a document use the `[batch]` and
/// `[[stage]]` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiBatchSettings {
    pub steps_a_to_b: u32,
    pub steps_a_to_c: u32,
    /// A saved grid document, replacing the corners below
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<PathBuf>,
}

impl Default for MultiBatchSettings {
    fn default() -> Self {
        Self {
            steps_a_to_b: DEFAULT_GRID_STEPS,
            steps_a_to_c: DEFAULT_GRID_STEPS,
            document: None,
            a: None,
            b: None,
            c: None,
            d: None,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

impl RunConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> std::result::Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> std::result::Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Seed from the file, falling back to `cli_seed`.
    pub fn seed(&self, cli_seed: u64) -> u64 {
        self.run.seed.unwrap_or(cli_seed)
    }

    /// The batch described by `[batch]` and `[[stage]]`.
    pub fn build_batch(&self) -> Result<BatchSimulation> {
        let stages = self.batch.steps.len();
        if stages == 0 || stages > MAX_STAGES {
            return Err(LaputaError::StageCount(stages as u32));
        }
        let mut batch = BatchSimulation::new();
        batch.trials = self.batch.trials;
        batch.stages = stages as u32;
        batch.steps[..stages].copy_from_slice(&self.batch.steps);
        for (slot, setup) in batch.setups.iter_mut().zip(&self.stages) {
            *slot = setup.clone();
        }
        batch.simulation.valuation = self.batch.valuation;
        self.apply_run_settings(&mut batch);
        Ok(batch)
    }

    fn apply_run_settings(&self, batch: &mut BatchSimulation) {
        let run = &self.run;
        batch.simulation.log_level = run.log_level;
        batch.record_details = run.record_details;
        batch.stats.record_e_value_stats = run.record_details;
        batch.stats.time_per_e_value = run.time_per_e_value.max(1);
        batch.stats.societies_per_e_value = run.societies_per_e_value.max(1);
        batch.stats.record_topologies = run.export_topologies;
        batch.stats.societies_per_topology = run.societies_per_topology.max(1);
    }

    /// The template society: loaded when a document is named, generated
    /// from `[template.setup]` otherwise.
    pub fn build_template(&self, ctx: &mut SimContext) -> Result<Society> {
        match &self.template.document {
            Some(path) => Ok(persistence::load(path)?),
            None => {
                let mut setup = self.template.setup.clone();
                setup.precalculate();
                Ok(Society::generate(&setup, ctx))
            }
        }
    }

    /// The grid, when `[multibatch]` is present.
    pub fn build_multibatch(&self, template: Society) -> Result<Option<MultiBatch>> {
        let Some(settings) = &self.multibatch else {
            return Ok(None);
        };
        let mut mb = match &settings.document {
            Some(path) => persistence::load::<MultiBatch>(path)?,
            None => {
                let fallback = self.build_batch()?;
                let mut mb = MultiBatch::new();
                mb.steps_a_to_b = settings.steps_a_to_b;
                mb.steps_a_to_c = settings.steps_a_to_c;
                let corners = [
                    (Corner::A, &settings.a),
                    (Corner::B, &settings.b),
                    (Corner::C, &settings.c),
                    (Corner::D, &settings.d),
                ];
                for (corner, path) in corners {
                    *mb.corner_mut(corner) = match path {
                        Some(p) => persistence::load(p)?,
                        None => fallback.clone(),
                    };
                }
                mb
            }
        };
        mb.template = Some(template);
        for batch in mb.batches.iter_mut() {
            batch.simulation.log_level = self.run.log_level;
        }
        Ok(Some(mb))
    }
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Laputa run configuration

[run]
slice_steps = 1500
output_dir = "output"
log_level = "none"
record_details = true
time_per_e_value = 1
societies_per_e_value = 1
export_topologies = false
societies_per_topology = 1
min_listen = 0.0
edge_weighting = "none"

[batch]
trials = 1000
steps = [15]

[batch.valuation]
application = "individually"
e_values = [0.0, 0.5, 1.0]
exponent = 1.0

[template.setup]
initial_population_part = 1.0
growth_balance = 0.5
evidence_policy = "none"

[template.setup.link_weights]
base = 1.0
symmetry = 0.0
transitivity = 0.0
clustering = 0.0

# One [[stage]] per entry in batch.steps; missing stages use defaults.
[[stage]]
vary_population = false
vary_links = false

[stage.inquirer_parameters]
vary_start_belief = "constant"
vary_inquiry_chance = "constant"
vary_inquiry_accuracy = "constant"
vary_inquiry_trust = "constant"

[stage.link_parameters]
vary_listen_chance = "constant"
vary_threshold = "constant"
vary_trust = "constant"

# Uncomment for a grid of interpolated batches.
# [multibatch]
# steps_a_to_b = 10
# steps_a_to_c = 1
# b = "corner-b.json"
"#
    .to_string()
}
