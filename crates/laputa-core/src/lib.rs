//! Core engine of the Laputa simulator: Bayesian inquirers exchanging
//! testimony over a trust network, single runs, batches and batch grids.

pub mod amount;
pub mod batch;
pub mod config;
pub mod context;
pub mod distribution;
pub mod error;
pub mod export;
pub mod meta_distribution;
pub mod multibatch;
pub mod parameters;
pub mod persistence;
pub mod setup;
pub mod simulation;
pub mod society;
pub mod statistics_block;
pub mod trust;

// Re-export value types
pub use amount::Amount;
pub use context::SimContext;
pub use distribution::{Distribution, DistributionKind};
pub use meta_distribution::MetaDistribution;
pub use trust::{TrustFunction, TrustPreset};

// Re-export society types
pub use parameters::{EvidencePolicy, InquirerParameters, LinkParameters, VariationPolicy};
pub use setup::SocietySetup;
pub use society::{Inquirer, Link, Society};

// Re-export run types
pub use batch::{BatchSimulation, Budget};
pub use multibatch::{Corner, MultiBatch};
pub use simulation::{LogLevel, Simulation, ValuationMethod};
pub use statistics_block::{Axis, StatisticsBlock};

pub use config::RunConfig;
pub use error::{LaputaError, Result};
