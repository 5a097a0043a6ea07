use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::ingest::UploadedFile;
use crate::prelude::{PpvError, PpvResult};
use crate::receivers::table::{column_index, Cell, TableSource, XlsxTable};
use crate::records::Period;
use crate::telemetry::LogManager;

/// Where the receiver table lives inside the uploaded workbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub day_sheet: String,
    pub night_sheet: String,
    pub name_column: String,
    pub number_column: String,
    pub table_extension: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            day_sheet: "VIBRACIÓN - Diurno".to_string(),
            night_sheet: "VIBRACIÓN - Nocturno".to_string(),
            name_column: "A".to_string(),
            number_column: "E".to_string(),
            table_extension: ".xlsx".to_string(),
        }
    }
}

/// A monitoring location and the file numbers recorded there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverEntry {
    pub name: String,
    pub day: String,
    /// Absent when the workbook has no night measurements at all.
    pub night: Option<String>,
}

impl ReceiverEntry {
    pub fn file_number(&self, period: Period) -> Option<&str> {
        match period {
            Period::Day => Some(self.day.as_str()),
            Period::Night => self.night.as_deref(),
        }
    }

    fn matches(&self, file_number: &str) -> bool {
        self.day == file_number || self.night.as_deref() == Some(file_number)
    }
}

/// Picks the receiver workbook out of an uploaded set.
pub fn locate_receiver_table<'a>(
    uploads: &'a [UploadedFile],
    extension: &str,
) -> PpvResult<&'a UploadedFile> {
    if uploads.is_empty() {
        return Err(PpvError::NoFiles);
    }
    uploads
        .iter()
        .find(|upload| upload.has_extension(extension))
        .ok_or_else(|| PpvError::TableNotFound(extension.to_string()))
}

/// Zero-pads a non-negative whole-number cell to a 4-character file number.
fn normalize_file_number(cell: &Cell) -> Option<String> {
    let number = match cell {
        Cell::Number(value) => *value,
        Cell::Text(text) => text.trim().parse::<f64>().ok()?,
        Cell::Empty => return None,
    };
    if !number.is_finite() || number.fract() != 0.0 || number < 0.0 {
        return None;
    }
    Some(format!("{:04}", number as i64))
}

fn normalize_name(cell: &Cell) -> Option<String> {
    let name = match cell {
        Cell::Text(text) => text.trim().to_string(),
        Cell::Number(value) if value.fract() == 0.0 => format!("{}", *value as i64),
        Cell::Number(value) => value.to_string(),
        Cell::Empty => return None,
    };
    (!name.is_empty()).then_some(name)
}

/// Receiver name to file number lookup built from the day and night sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverDirectory {
    entries: Vec<ReceiverEntry>,
}

impl ReceiverDirectory {
    /// Locates the workbook among `uploads` and loads it.
    pub fn from_uploads(uploads: &[UploadedFile], config: &DirectoryConfig) -> PpvResult<Self> {
        let upload = locate_receiver_table(uploads, &config.table_extension)?;
        let mut table = XlsxTable::from_bytes(upload.contents())?;
        Self::load(&mut table, config)
    }

    pub fn load(source: &mut dyn TableSource, config: &DirectoryConfig) -> PpvResult<Self> {
        let logger = LogManager::new("receivers");
        let name_col = column_index(&config.name_column)?;
        let number_col = column_index(&config.number_column)?;

        let day = read_sheet(source, &config.day_sheet, name_col, number_col, &logger)?;
        let night = read_sheet(source, &config.night_sheet, name_col, number_col, &logger)?;

        let entries: Vec<ReceiverEntry> = if night.is_empty() {
            day.into_iter()
                .map(|(name, day)| ReceiverEntry {
                    name,
                    day,
                    night: None,
                })
                .collect()
        } else {
            let night_numbers: HashMap<String, String> = night.into_iter().rev().collect();
            day.into_iter()
                .filter_map(|(name, day)| match night_numbers.get(&name) {
                    Some(night) => Some(ReceiverEntry {
                        night: Some(night.clone()),
                        name,
                        day,
                    }),
                    None => {
                        logger.skip(&format!("receiver {} has no night file number", name));
                        None
                    }
                })
                .collect()
        };

        let directory = Self::from_entries(entries);
        logger.record(&format!("loaded {} receivers", directory.len()));
        Ok(directory)
    }

    /// Builds a directory from entries; names are trimmed and the first
    /// occurrence of a name wins.
    pub fn from_entries(entries: impl IntoIterator<Item = ReceiverEntry>) -> Self {
        let mut unique: Vec<ReceiverEntry> = Vec::new();
        for mut entry in entries {
            entry.name = entry.name.trim().to_string();
            if unique.iter().any(|existing| existing.name == entry.name) {
                LogManager::new("receivers").skip(&format!("duplicate receiver {}", entry.name));
                continue;
            }
            unique.push(entry);
        }
        Self { entries: unique }
    }

    pub fn entries(&self) -> &[ReceiverEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ReceiverEntry> {
        let name = name.trim();
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// First receiver whose day or night file number equals `file_number`.
    pub fn find_receiver_by_file_number(&self, file_number: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.matches(file_number))
            .map(|entry| entry.name.as_str())
    }

    pub fn day_numbers(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|entry| (entry.name.clone(), entry.day.clone()))
            .collect()
    }

    pub fn night_numbers(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|entry| Some((entry.name.clone(), entry.night.clone()?)))
            .collect()
    }
}

/// Reads `(name, file number)` pairs below the header row, dropping rows
/// without a usable name or number.
fn read_sheet(
    source: &mut dyn TableSource,
    sheet: &str,
    name_col: usize,
    number_col: usize,
    logger: &LogManager,
) -> PpvResult<Vec<(String, String)>> {
    let rows = source.rows(sheet)?;
    let mut pairs = Vec::new();
    for (line, row) in rows.iter().enumerate().skip(1) {
        let name = row.get(name_col).and_then(normalize_name);
        let number = row.get(number_col).and_then(normalize_file_number);
        match (name, number) {
            (Some(name), Some(number)) => pairs.push((name, number)),
            (None, None) => {}
            _ => logger.detail(&format!("{} row {} dropped: missing receiver or file number", sheet, line + 1)),
        }
    }
    Ok(pairs)
}
