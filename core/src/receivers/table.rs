use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use std::collections::HashMap;
use std::io::Cursor;

use crate::prelude::{PpvError, PpvResult};

/// A single spreadsheet cell, reduced to what the receiver table needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::Int(number) => Cell::Number(*number as f64),
            Data::Float(number) => Cell::Number(*number),
            Data::String(text) => Cell::Text(text.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Source of named sub-tables, each a grid of rows. Row 0 is the header row
/// and cell positions are absolute spreadsheet columns.
pub trait TableSource {
    fn rows(&mut self, sheet: &str) -> PpvResult<Vec<Vec<Cell>>>;
}

/// Converts a spreadsheet column letter (`A`, `E`, `AA`) to a zero-based index.
pub fn column_index(letters: &str) -> PpvResult<usize> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PpvError::InvalidArgument(format!(
            "invalid column selector: {:?}",
            letters
        )));
    }
    let index = letters.chars().try_fold(0usize, |acc, c| {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        acc.checked_mul(26)?.checked_add(digit)
    });
    index.map(|index| index - 1).ok_or_else(|| {
        PpvError::InvalidArgument(format!("column selector out of range: {:?}", letters))
    })
}

/// Workbook read from uploaded `.xlsx` bytes.
pub struct XlsxTable {
    workbook: Xlsx<Cursor<Vec<u8>>>,
}

impl XlsxTable {
    pub fn from_bytes(bytes: &[u8]) -> PpvResult<Self> {
        let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|err: calamine::XlsxError| PpvError::Table(err.to_string()))?;
        Ok(Self { workbook })
    }
}

impl TableSource for XlsxTable {
    fn rows(&mut self, sheet: &str) -> PpvResult<Vec<Vec<Cell>>> {
        if !self.workbook.sheet_names().iter().any(|name| name == sheet) {
            return Err(PpvError::SheetNotFound(sheet.to_string()));
        }
        let range = self
            .workbook
            .worksheet_range(sheet)
            .map_err(|err| PpvError::Table(err.to_string()))?;
        // Ranges start at the first used cell; pad back to absolute columns.
        let offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);
        Ok(range
            .rows()
            .map(|row| {
                std::iter::repeat(Cell::Empty)
                    .take(offset)
                    .chain(row.iter().map(Cell::from))
                    .collect()
            })
            .collect())
    }
}

/// In-memory sub-tables, for callers that already hold parsed sheets.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    sheets: HashMap<String, Vec<Vec<Cell>>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        self.sheets.insert(name.into(), rows);
        self
    }
}

impl TableSource for MemoryTable {
    fn rows(&mut self, sheet: &str) -> PpvResult<Vec<Vec<Cell>>> {
        self.sheets
            .get(sheet)
            .cloned()
            .ok_or_else(|| PpvError::SheetNotFound(sheet.to_string()))
    }
}
