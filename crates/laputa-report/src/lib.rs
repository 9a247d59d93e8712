//! Shared report types and serialization for the Laputa simulator.
//!
//! This crate contains pure data structures with no simulation logic.
//! The engine fills them in; renderers, exporters and the CLI read them.

pub mod document;
pub mod progress;
pub mod summary;
pub mod topology;
pub mod workbook;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export document envelope types
pub use document::{
    DocumentKind, Envelope, CURRENT_DOCUMENT_VERSION, MINIMUM_DOCUMENT_VERSION,
};

// Re-export progress types
pub use progress::{Progress, StepCursor};

// Re-export summary types
pub use summary::{BandwagonSummary, BatchSummary, GridSummary, MeanStddev};

// Re-export topology types
pub use topology::{EdgeWeighting, NetworkTopology, TopologyEdge, TopologyNode};

// Re-export workbook types
pub use workbook::{Cell, Sheet, Workbook};
