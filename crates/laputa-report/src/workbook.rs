//! Workbook Types
//!
//! A tagged-cell grid that exporters turn into spreadsheets or CSV files.

use serde::{Deserialize, Serialize};

/// A single spreadsheet cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Int(i64),
    Double(f64),
    Text(String),
    #[default]
    Empty,
}

impl Cell {
    /// Text rendering used by CSV output. Non-finite doubles render empty.
    pub fn render(&self) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Double(v) if v.is_finite() => v.to_string(),
            Cell::Double(_) => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Empty => String::new(),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Double(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

/// A named, rectangular sheet stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            cells: vec![Cell::Empty; width * height],
        }
    }

    /// Sets a cell. Writes outside the sheet are ignored.
    pub fn set(&mut self, x: usize, y: usize, cell: impl Into<Cell>) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell.into();
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&Cell> {
        if x < self.width && y < self.height {
            self.cells.get(y * self.width + x)
        } else {
            None
        }
    }

    /// Iterates rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.width.max(1))
    }
}

/// An ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_set_and_get() {
        let mut sheet = Sheet::new("E-value", 3, 2);
        sheet.set(1, 0, "t = 1");
        sheet.set(2, 1, 0.5);
        sheet.set(0, 1, 7i64);
        sheet.set(9, 9, 1.0);

        assert_eq!(sheet.get(1, 0), Some(&Cell::Text("t = 1".into())));
        assert_eq!(sheet.get(2, 1), Some(&Cell::Double(0.5)));
        assert_eq!(sheet.get(0, 1), Some(&Cell::Int(7)));
        assert_eq!(sheet.get(0, 0), Some(&Cell::Empty));
        assert_eq!(sheet.get(3, 0), None);
    }

    #[test]
    fn test_rows_chunking() {
        let sheet = Sheet::new("s", 2, 3);
        assert_eq!(sheet.rows().count(), 3);
        assert!(sheet.rows().all(|r| r.len() == 2));
    }

    #[test]
    fn test_render_nan_is_empty() {
        assert_eq!(Cell::Double(f64::NAN).render(), "");
        assert_eq!(Cell::Double(0.25).render(), "0.25");
        assert_eq!(Cell::Int(-3).render(), "-3");
    }

    #[test]
    fn test_workbook_lookup() {
        let mut book = Workbook::new();
        book.push(Sheet::new("Polarisation", 1, 1));
        assert!(book.sheet("Polarisation").is_some());
        assert!(book.sheet("Parameters").is_none());
        assert!(book.to_json().unwrap().contains("Polarisation"));
    }
}
