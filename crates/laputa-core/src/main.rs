//! Laputa
//!
//! Runs batches and grids of social-epistemology simulations from a TOML
//! configuration and writes their summaries, workbooks and topologies.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use laputa_core::batch::{BatchSimulation, Budget};
use laputa_core::config::{default_config_toml, RunConfig};
use laputa_core::export::{self, BlockExport};
use laputa_core::multibatch::MultiBatch;
use laputa_core::{persistence, Result, SimContext, Society, SocietySetup};
use laputa_report::Progress;
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "laputa")]
#[command(about = "Simulates networks of Bayesian inquirers exchanging testimony")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the batch or grid described by a configuration file
    Run {
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Print a default configuration
    DefaultConfig,
    /// Generate a society and save it as a document
    Generate {
        /// Configuration whose [template.setup] is used; defaults otherwise
        #[arg(long, short)]
        config: Option<PathBuf>,
        #[arg(long, short, default_value = "society.json")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let result = match args.command {
        Command::Run { config } => run(&config, args.seed),
        Command::DefaultConfig => {
            print!("{}", default_config_toml());
            Ok(())
        }
        Command::Generate { config, output } => generate(config.as_deref(), &output, args.seed),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "laputa failed");
            ExitCode::FAILURE
        }
    }
}

fn generate(config: Option<&Path>, output: &Path, seed: u64) -> Result<()> {
    let config = match config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    let mut ctx = SimContext::from_seed(config.seed(seed));
    let mut setup: SocietySetup = config.template.setup.clone();
    setup.precalculate();
    let soc = Society::generate(&setup, &mut ctx);
    persistence::save(output, &soc)?;
    tracing::info!(
        inquirers = soc.len(),
        links = soc.links.len(),
        path = %output.display(),
        "society generated"
    );
    Ok(())
}

fn run(path: &Path, cli_seed: u64) -> Result<()> {
    let config = RunConfig::from_file(path)?;
    let seed = config.seed(cli_seed);
    let mut ctx = SimContext::from_seed(seed);
    let out = config.run.output_dir.clone();
    std::fs::create_dir_all(&out)?;
    tracing::info!(config = %path.display(), seed, output = %out.display(), "starting run");

    let template = config.build_template(&mut ctx)?;
    tracing::info!(inquirers = template.len(), links = template.links.len(), "template ready");

    match config.build_multibatch(template.clone())? {
        Some(mb) => run_multibatch(mb, &config, &out, &mut ctx),
        None => {
            let mut batch = config.build_batch()?;
            batch.template = Some(template);
            run_batch(batch, &config, &out, &mut ctx)
        }
    }
}

fn run_batch(
    mut batch: BatchSimulation,
    config: &RunConfig,
    out: &Path,
    ctx: &mut SimContext,
) -> Result<()> {
    let budget = Budget::steps(config.run.slice_steps.max(1));
    let mut last_trial = u32::MAX;
    loop {
        match batch.advance(budget, ctx)? {
            Progress::Running { cursor, fraction } => {
                if cursor.trial != last_trial && cursor.trial % report_every(batch.trials) == 0 {
                    tracing::info!(
                        trial = cursor.trial + 1,
                        trials = batch.trials,
                        percent = %format!("{:.1}", fraction * 100.0),
                        "batch progress"
                    );
                }
                last_trial = cursor.trial;
            }
            Progress::Finished => break,
            Progress::Cancelled => {
                tracing::warn!("batch cancelled");
                return Ok(());
            }
        }
    }

    let summary = batch.summary();
    tracing::info!(
        e_value = summary.e_value.mean,
        e_value_delta = summary.e_value_delta.mean,
        polarisation = summary.polarisation.mean,
        "batch finished"
    );
    export::write_json(&summary, out.join("summary.json"))?;
    persistence::save(out.join("batch.json"), &batch)?;

    let block = &batch.stats.e_values_over_time;
    if block.is_valid() {
        let book = export::e_value_workbook(block, &BlockExport::default())?;
        export::write_workbook(&book, out, "e-values")?;
    }
    if config.run.export_topologies {
        let files = export::write_topologies(
            &batch.stats.topologies,
            out.join("topologies"),
            config.run.min_listen,
            config.run.edge_weighting,
        )?;
        tracing::info!(files = files.len(), "topologies written");
    }
    Ok(())
}

fn run_multibatch(
    mut mb: MultiBatch,
    config: &RunConfig,
    out: &Path,
    ctx: &mut SimContext,
) -> Result<()> {
    let budget = Budget::steps(config.run.slice_steps.max(1));
    let cells = mb.cells();
    tracing::info!(cells, "starting grid");
    loop {
        match mb.advance(budget, ctx)? {
            Progress::Running { .. } => {}
            Progress::Finished => break,
            Progress::Cancelled => {
                tracing::warn!("grid cancelled");
                return Ok(());
            }
        }
    }
    export::write_json(&mb.results, out.join("grid.json"))?;
    export::write_workbook(&mb.workbook(), out, "grid")?;
    persistence::save(out.join("multibatch.json"), &mb)?;
    Ok(())
}

/// Trials between progress lines, about twenty per batch.
fn report_every(trials: u32) -> u32 {
    (trials / 20).max(1)
}
