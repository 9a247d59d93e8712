//! Export
//!
//! Turns batch results into workbooks and writes them out: one CSV file per
//! sheet plus a JSON dump, Pajek files for topologies and JSON summaries.

use std::fs;
use std::path::{Path, PathBuf};

use laputa_report::{Cell, EdgeWeighting, NetworkTopology, Sheet, Workbook};
use serde::Serialize;

use crate::error::Result;
use crate::statistics_block::{Axis, StatisticsBlock};

/// How to lay a three-dimensional e-value block out as sheets.
///
/// Output axis 0 runs along sheet columns, 1 along rows and 2 across
/// sheets. Each names the block axis it shows: inquirers (X), time (Y) or
/// trials (Z).
#[derive(Debug, Clone, PartialEq)]
pub struct BlockExport {
    pub axes: [Axis; 3],
    /// Range `[from, to)` of each output axis, the whole axis when `None`
    pub ranges: [Option<(usize, usize)>; 3],
    /// Collapse an output axis: time keeps its final value, the others are
    /// averaged
    pub collapse: [bool; 3],
}

impl Default for BlockExport {
    fn default() -> Self {
        Self {
            axes: [Axis::X, Axis::Y, Axis::Z],
            ranges: [None; 3],
            collapse: [false, false, true],
        }
    }
}

fn axis_label(axis: Axis, index: usize) -> String {
    match axis {
        Axis::X => format!("Inquirer {}", index + 1),
        Axis::Y => format!("t = {}", index),
        Axis::Z => format!("Trial {}", index + 1),
    }
}

fn collapsed_label(axis: Axis) -> &'static str {
    if axis == Axis::Y {
        "Final E-value"
    } else {
        "Average E-value"
    }
}

/// Builds a workbook from an e-value block.
pub fn e_value_workbook(block: &StatisticsBlock, export: &BlockExport) -> Result<Workbook> {
    let [ax, ay, az] = export.axes;
    let permuted = block.permute3(ax, ay, az)?;
    let sizes = [permuted.width(), permuted.height(), permuted.depth()];
    let mut ranges = [(0, 0); 3];
    for (i, r) in ranges.iter_mut().enumerate() {
        *r = export.ranges[i].unwrap_or((0, sizes[i]));
    }
    let part = permuted.extract(ranges[0], ranges[1], ranges[2])?;
    let (w, h, d) = (part.width(), part.height(), part.depth());
    let data = part.to_vec();
    let at = |x: usize, y: usize, z: usize| data[(z * h + y) * w + x];

    // indices each output cell draws from, per axis
    let pick = |i: usize, len: usize| -> Vec<Vec<usize>> {
        if !export.collapse[i] {
            (0..len).map(|k| vec![k]).collect()
        } else if export.axes[i] == Axis::Y {
            vec![vec![len - 1]]
        } else {
            vec![(0..len).collect()]
        }
    };
    let (xs, ys, zs) = (pick(0, w), pick(1, h), pick(2, d));

    let mut book = Workbook::new();
    for (k, zset) in zs.iter().enumerate() {
        let name = if export.collapse[2] {
            collapsed_label(az).to_string()
        } else {
            axis_label(az, ranges[2].0 + k)
        };
        let mut sheet = Sheet::new(name, xs.len() + 1, ys.len() + 1);
        if export.collapse[0] {
            sheet.set(1, 0, collapsed_label(ax));
        } else {
            for i in 0..xs.len() {
                sheet.set(i + 1, 0, axis_label(ax, ranges[0].0 + i));
            }
        }
        if export.collapse[1] {
            sheet.set(0, 1, collapsed_label(ay));
        } else {
            for j in 0..ys.len() {
                sheet.set(0, j + 1, axis_label(ay, ranges[1].0 + j));
            }
        }
        for (j, yset) in ys.iter().enumerate() {
            for (i, xset) in xs.iter().enumerate() {
                let (mut sum, mut n) = (0.0f64, 0usize);
                for &z in zset {
                    for &y in yset {
                        for &x in xset {
                            let v = at(x, y, z);
                            if v.is_finite() {
                                sum += v as f64;
                                n += 1;
                            }
                        }
                    }
                }
                if n > 0 {
                    sheet.set(i + 1, j + 1, sum / n as f64);
                }
            }
        }
        book.push(sheet);
    }
    Ok(book)
}

/// File-system friendly version of a sheet name.
fn slug(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    s.split('-').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("-")
}

/// Writes one sheet as CSV.
pub fn write_sheet_csv(sheet: &Sheet, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in sheet.rows() {
        writer.write_record(row.iter().map(Cell::render))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `<stem>-<sheet>.csv` per sheet and `<stem>.json` into `dir`.
pub fn write_workbook(book: &Workbook, dir: impl AsRef<Path>, stem: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(book.sheets.len() + 1);
    for sheet in &book.sheets {
        let path = dir.join(format!("{}-{}.csv", stem, slug(&sheet.name)));
        write_sheet_csv(sheet, &path)?;
        written.push(path);
    }
    let json = dir.join(format!("{}.json", stem));
    fs::write(&json, book.to_json()?)?;
    written.push(json);
    tracing::info!(dir = %dir.display(), files = written.len(), "workbook written");
    Ok(written)
}

/// Writes any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Writes one Pajek file per topology, numbered from 1.
pub fn write_topologies(
    topologies: &[NetworkTopology],
    dir: impl AsRef<Path>,
    min_listen: f64,
    weighting: EdgeWeighting,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(topologies.len());
    for (i, t) in topologies.iter().enumerate() {
        let path = dir.join(format!("topology-{:04}.net", i + 1));
        fs::write(&path, t.pajek(min_listen, weighting))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2 inquirers, 3 time slots, 2 trials; value = inquirer + 10 * t + 100 * trial
    fn block() -> StatisticsBlock {
        let b = StatisticsBlock::allocate(2, 3, 2).unwrap();
        for z in 0..2 {
            for y in 0..3 {
                for x in 0..2 {
                    b.set(x, y, z, (x + 10 * y + 100 * z) as f32).unwrap();
                }
            }
        }
        b
    }

    fn double(sheet: &Sheet, x: usize, y: usize) -> f64 {
        match sheet.get(x, y) {
            Some(Cell::Double(v)) => *v,
            other => panic!("expected a number at ({}, {}), got {:?}", x, y, other),
        }
    }

    #[test]
    fn test_default_export_averages_trials() {
        let book = e_value_workbook(&block(), &BlockExport::default()).unwrap();
        assert_eq!(book.sheets.len(), 1);
        let sheet = &book.sheets[0];
        assert_eq!(sheet.name, "Average E-value");
        assert_eq!((sheet.width, sheet.height), (3, 4));
        assert_eq!(sheet.get(1, 0), Some(&Cell::Text("Inquirer 1".into())));
        assert_eq!(sheet.get(0, 3), Some(&Cell::Text("t = 2".into())));
        assert_eq!(double(sheet, 2, 3), 1.0 + 20.0 + 50.0);
    }

    #[test]
    fn test_time_collapses_to_final_value() {
        let export = BlockExport {
            axes: [Axis::X, Axis::Z, Axis::Y],
            ranges: [None; 3],
            collapse: [false, false, true],
        };
        let book = e_value_workbook(&block(), &export).unwrap();
        let sheet = &book.sheets[0];
        assert_eq!(sheet.name, "Final E-value");
        assert_eq!(sheet.get(0, 2), Some(&Cell::Text("Trial 2".into())));
        assert_eq!(double(sheet, 1, 2), 0.0 + 20.0 + 100.0);
    }

    #[test]
    fn test_sheets_per_trial_with_range() {
        let export = BlockExport {
            ranges: [Some((1, 2)), None, None],
            collapse: [false, false, false],
            ..BlockExport::default()
        };
        let book = e_value_workbook(&block(), &export).unwrap();
        let names: Vec<&str> = book.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Trial 1", "Trial 2"]);
        let sheet = &book.sheets[1];
        assert_eq!(sheet.width, 2);
        assert_eq!(sheet.get(1, 0), Some(&Cell::Text("Inquirer 2".into())));
        assert_eq!(double(sheet, 1, 1), 101.0);
    }

    #[test]
    fn test_missing_samples_stay_empty() {
        let b = StatisticsBlock::allocate(1, 1, 1).unwrap();
        let export = BlockExport {
            collapse: [false; 3],
            ..BlockExport::default()
        };
        let book = e_value_workbook(&b, &export).unwrap();
        assert_eq!(book.sheets[0].get(1, 1), Some(&Cell::Empty));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("E-value delta"), "e-value-delta");
        assert_eq!(slug("t = 3"), "t-3");
    }

    #[test]
    fn test_write_workbook_files() {
        let dir = tempfile::tempdir().unwrap();
        let book = e_value_workbook(&block(), &BlockExport::default()).unwrap();
        let files = write_workbook(&book, dir.path(), "evalues").unwrap();
        assert_eq!(files.len(), 2);
        let csv = fs::read_to_string(dir.path().join("evalues-average-e-value.csv")).unwrap();
        let first = csv.lines().next().unwrap();
        assert_eq!(first, ",Inquirer 1,Inquirer 2");
        assert!(dir.path().join("evalues.json").exists());
    }
}
