//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // laputa-report = { path = "../laputa-report", features = ["test-fixtures"] }
//!
//! use laputa_report::fixtures;
//!
//! let topology = fixtures::sample_topology();
//! ```

use crate::{BatchSummary, MeanStddev, NetworkTopology, Sheet, Workbook};

/// A four-node ring with one chord.
///
/// Nodes sit on the corners of a unit square. Edges run 1→2→3→4→1 with
/// listen chance 0.5, plus a silent 1→3 chord.
pub fn sample_topology() -> NetworkTopology {
    let mut topo = NetworkTopology::new();
    topo.add_node(0.0, 0.0);
    topo.add_node(1.0, 0.0);
    topo.add_node(1.0, 1.0);
    topo.add_node(0.0, 1.0);
    for i in 0..4 {
        topo.add_edge(i, (i + 1) % 4, 0.5, 0.6);
    }
    topo.add_edge(0, 2, 0.0, 0.5);
    topo
}

/// A summary of a ten-trial batch with fixed values.
pub fn sample_summary() -> BatchSummary {
    BatchSummary {
        trials: 10,
        total_steps: 15,
        e_value: MeanStddev {
            mean: 0.62,
            stddev: 0.08,
        },
        e_value_delta: MeanStddev {
            mean: 0.12,
            stddev: 0.05,
        },
        polarisation: MeanStddev {
            mean: 0.3,
            stddev: 0.04,
        },
        polarisation_delta: MeanStddev {
            mean: -0.02,
            stddev: 0.01,
        },
        avg_messages: 42.0,
        avg_messages_per_inquirer: 4.2,
        avg_inquiry_results: 30.0,
        avg_inquiry_results_per_inquirer: 3.0,
        description: "GENERAL PARAMETERS".to_string(),
        ..Default::default()
    }
}

/// A one-sheet workbook with a header row.
pub fn sample_workbook() -> Workbook {
    let mut sheet = Sheet::new("E-value", 3, 2);
    sheet.set(1, 0, "0");
    sheet.set(2, 0, "1");
    sheet.set(0, 1, "0");
    sheet.set(1, 1, 0.5);
    sheet.set(2, 1, 0.75);
    let mut book = Workbook::new();
    book.push(sheet);
    book
}
