use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::ingest::UploadedFile;
use crate::prelude::{PpvResult, ProcessingConfig, SampleSource};
use crate::processing::measurement::{MeasurementFile, OutlierMode};
use crate::receivers::ReceiverDirectory;
use crate::telemetry::{LogManager, MetricsRecorder};

/// Receiver column of a summary row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverAnnotation {
    Resolved(String),
    NotFound,
}

impl fmt::Display for ReceiverAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverAnnotation::Resolved(name) => write!(f, "{}", name),
            ReceiverAnnotation::NotFound => write!(f, "Not found"),
        }
    }
}

impl Serialize for ReceiverAnnotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Peak-PVS window of one measurement file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "File")]
    pub file_number: String,
    #[serde(rename = "Measurement Time")]
    pub measurement_time: NaiveDateTime,
    #[serde(rename = "X_PPV")]
    pub x_ppv: f64,
    #[serde(rename = "Y_PPV")]
    pub y_ppv: f64,
    #[serde(rename = "Z_PPV")]
    pub z_ppv: f64,
    #[serde(rename = "PVS")]
    pub pvs: f64,
    /// `None` when no receiver directory was supplied.
    #[serde(rename = "Receiver", skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ReceiverAnnotation>,
}

/// A file left out of a batch and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// One summary row per processed file, ordered by file number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    mode: OutlierMode,
    rows: Vec<SummaryRow>,
    skipped: Vec<SkippedFile>,
}

impl SummaryTable {
    pub fn mode(&self) -> OutlierMode {
        self.mode
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, file_number: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|row| row.file_number == file_number)
    }

    /// Writes the table as a single CSV sheet.
    pub fn write_csv<W: Write>(&self, writer: W) -> PpvResult<()> {
        let mut out = csv::Writer::from_writer(writer);
        let with_receivers = self.rows.iter().any(|row| row.receiver.is_some());
        let mut header = vec!["File", "Measurement Time", "X_PPV", "Y_PPV", "Z_PPV", "PVS"];
        if with_receivers {
            header.push("Receiver");
        }
        out.write_record(&header)?;
        for row in &self.rows {
            let mut record = vec![
                row.file_number.clone(),
                row.measurement_time.to_string(),
                row.x_ppv.to_string(),
                row.y_ppv.to_string(),
                row.z_ppv.to_string(),
                row.pvs.to_string(),
            ];
            if with_receivers {
                record.push(
                    row.receiver
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                );
            }
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Files of one upload set, each parsed exactly once.
pub struct MeasurementBatch {
    files: Vec<MeasurementFile>,
    skipped: Vec<SkippedFile>,
}

impl MeasurementBatch {
    /// Parses every upload the vendor `source` accepts. Per-file failures are
    /// recorded as skipped files and never abort the batch; invalid
    /// settings fail it before anything is parsed.
    pub fn ingest(
        uploads: &[UploadedFile],
        source: &dyn SampleSource,
        directory: Option<Arc<ReceiverDirectory>>,
        config: &ProcessingConfig,
        metrics: &Arc<MetricsRecorder>,
    ) -> PpvResult<Self> {
        let analyzer = config.outlier_analyzer()?;
        let logger = LogManager::new("ingest");
        let candidates: Vec<&UploadedFile> = uploads
            .iter()
            .filter(|upload| {
                let accepted = source.accepts(upload.name());
                if !accepted {
                    logger.detail(&format!("ignoring {}", upload.name()));
                }
                accepted
            })
            .collect();

        let open = |upload: &&UploadedFile| {
            MeasurementFile::open_with(upload, source, directory.clone(), config, analyzer)
                .map(|file| file.with_metrics(metrics.clone()))
                .map_err(|err| SkippedFile {
                    name: upload.name().to_string(),
                    reason: err.to_string(),
                })
        };

        #[cfg(feature = "parallel")]
        let opened: Vec<Result<MeasurementFile, SkippedFile>> = candidates.par_iter().map(open).collect();
        #[cfg(not(feature = "parallel"))]
        let opened: Vec<Result<MeasurementFile, SkippedFile>> = candidates.iter().map(open).collect();

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for result in opened {
            match result {
                Ok(file) => {
                    metrics.record_parsed();
                    files.push(file);
                }
                Err(skip) => {
                    metrics.record_skipped();
                    logger.skip(&format!("skipping {}: {}", skip.name, skip.reason));
                    skipped.push(skip);
                }
            }
        }
        logger.record(&format!(
            "{} {} files parsed, {} skipped",
            files.len(),
            source.vendor(),
            skipped.len()
        ));
        Ok(Self { files, skipped })
    }

    pub fn files(&self) -> &[MeasurementFile] {
        &self.files
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn get(&self, file_number: &str) -> Option<&MeasurementFile> {
        self.files
            .iter()
            .rev()
            .find(|file| file.file_number() == file_number)
    }
}

/// Assembles summary tables from parsed measurement files.
#[derive(Clone, Default)]
pub struct SummaryBuilder {
    directory: Option<Arc<ReceiverDirectory>>,
}

impl SummaryBuilder {
    pub fn new(directory: Option<Arc<ReceiverDirectory>>) -> Self {
        Self { directory }
    }

    pub fn build_batch(&self, batch: &MeasurementBatch, mode: OutlierMode) -> SummaryTable {
        let mut table = self.build(batch.files(), mode);
        let mut skipped = batch.skipped().to_vec();
        skipped.append(&mut table.skipped);
        table.skipped = skipped;
        table
    }

    pub fn build(&self, files: &[MeasurementFile], mode: OutlierMode) -> SummaryTable {
        let logger = LogManager::new("summary");

        let peak = |file: &MeasurementFile| match file.max_pvs(mode) {
            Some(record) => Ok(SummaryRow {
                file_number: file.file_number().to_string(),
                measurement_time: record.time,
                x_ppv: record.x_ppv,
                y_ppv: record.y_ppv,
                z_ppv: record.z_ppv,
                pvs: record.pvs,
                receiver: None,
            }),
            None => Err(SkippedFile {
                name: file.name().to_string(),
                reason: "no finite PVS value".to_string(),
            }),
        };

        #[cfg(feature = "parallel")]
        let peaks: Vec<Result<SummaryRow, SkippedFile>> = files.par_iter().map(peak).collect();
        #[cfg(not(feature = "parallel"))]
        let peaks: Vec<Result<SummaryRow, SkippedFile>> = files.iter().map(peak).collect();

        let mut rows: BTreeMap<String, SummaryRow> = BTreeMap::new();
        let mut skipped = Vec::new();
        for result in peaks {
            match result {
                Ok(row) => {
                    if rows.contains_key(&row.file_number) {
                        logger.skip(&format!("file number {} appears twice, keeping the later file", row.file_number));
                    }
                    rows.insert(row.file_number.clone(), row);
                }
                Err(skip) => {
                    logger.skip(&format!("skipping {}: {}", skip.name, skip.reason));
                    skipped.push(skip);
                }
            }
        }

        if let Some(directory) = &self.directory {
            let processed: HashSet<&str> = rows.keys().map(String::as_str).collect();
            let receivers = receivers_by_file_number(directory, &processed);
            for row in rows.values_mut() {
                row.receiver = Some(match receivers.get(row.file_number.as_str()) {
                    Some(name) => ReceiverAnnotation::Resolved((*name).to_string()),
                    None => ReceiverAnnotation::NotFound,
                });
            }
        }

        logger.record(&format!("{:?} summary with {} rows", mode, rows.len()));
        SummaryTable {
            mode,
            rows: rows.into_values().collect(),
            skipped,
        }
    }
}

/// Maps every directory file number present in `processed` to its receiver;
/// the first entry wins when numbers collide.
fn receivers_by_file_number<'a>(
    directory: &'a ReceiverDirectory,
    processed: &HashSet<&str>,
) -> HashMap<&'a str, &'a str> {
    let mut receivers = HashMap::new();
    for entry in directory.entries() {
        let numbers = std::iter::once(entry.day.as_str()).chain(entry.night.as_deref());
        for number in numbers {
            if processed.contains(number) {
                receivers.entry(number).or_insert(entry.name.as_str());
            }
        }
    }
    receivers
}
