//! Integration tests for the file writers.
//!
//! These use the report fixtures to check what lands on disk.

use std::fs;

use laputa_core::export;
use laputa_report::fixtures::{sample_summary, sample_topology, sample_workbook};
use laputa_report::{BatchSummary, EdgeWeighting};
use tempfile::tempdir;

/// Test that a summary written as JSON reads back unchanged.
#[test]
fn test_summary_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("summary.json");
    let summary = sample_summary();

    export::write_json(&summary, &path).unwrap();
    let back: BatchSummary = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(back, summary);
}

/// Test that silent links are left out of Pajek files.
#[test]
fn test_topologies_skip_silent_links() {
    let dir = tempdir().unwrap();
    let topologies = vec![sample_topology(), sample_topology()];

    let files = export::write_topologies(
        &topologies,
        dir.path().join("net"),
        0.0,
        EdgeWeighting::ListenChance,
    )
    .unwrap();

    assert_eq!(files.len(), 2);
    assert!(files[1].ends_with("topology-0002.net"));
    let text = fs::read_to_string(&files[0]).unwrap();
    assert!(text.starts_with("*Vertices 4\r\n"));
    assert!(text.contains("*Arcs 4\r\n"));
    assert!(text.contains("1 2 0.5000\r\n"));
    assert!(!text.contains("1 3 "));
}

/// Test that each sheet becomes one CSV file.
#[test]
fn test_workbook_csv() {
    let dir = tempdir().unwrap();
    let files = export::write_workbook(&sample_workbook(), dir.path(), "grid").unwrap();

    assert_eq!(files.len(), 2);
    let csv = fs::read_to_string(dir.path().join("grid-e-value.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec![",0,1", "0,0.5,0.75"]);
}
