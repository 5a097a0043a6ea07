use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::ingest::UploadedFile;
use crate::math::{Description, OutlierAnalyzer, StatsHelper};
use crate::prelude::{PpvError, PpvResult, ProcessingConfig, SampleSource};
use crate::processing::window::aggregate;
use crate::receivers::ReceiverDirectory;
use crate::records::{Period, PpvColumn, PpvRecord, Sample};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Which view of the aggregated series is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMode {
    #[default]
    Raw,
    /// Outliers of every column replaced by that column's median.
    Corrected,
}

impl From<bool> for OutlierMode {
    fn from(replace_outliers: bool) -> Self {
        if replace_outliers {
            OutlierMode::Corrected
        } else {
            OutlierMode::Raw
        }
    }
}

/// One parsed measurement file with lazily computed raw and corrected views.
///
/// Each view lives in its own slot and is computed at most once, so
/// switching the mode never returns data from the other view.
pub struct MeasurementFile {
    name: String,
    file_number: String,
    samples: Vec<Sample>,
    directory: Option<Arc<ReceiverDirectory>>,
    config: ProcessingConfig,
    analyzer: OutlierAnalyzer,
    mode: OutlierMode,
    raw: OnceLock<Vec<PpvRecord>>,
    corrected: OnceLock<Vec<PpvRecord>>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl MeasurementFile {
    /// Parses an uploaded file with the vendor `source`.
    pub fn open(
        upload: &UploadedFile,
        source: &dyn SampleSource,
        directory: Option<Arc<ReceiverDirectory>>,
        config: &ProcessingConfig,
    ) -> PpvResult<Self> {
        Self::open_with(upload, source, directory, config, config.outlier_analyzer()?)
    }

    /// Like [`MeasurementFile::open`], with an analyzer already validated
    /// for the whole batch.
    pub fn open_with(
        upload: &UploadedFile,
        source: &dyn SampleSource,
        directory: Option<Arc<ReceiverDirectory>>,
        config: &ProcessingConfig,
        analyzer: OutlierAnalyzer,
    ) -> PpvResult<Self> {
        let file_number = source.file_identifier(upload.name())?;
        let samples = source.load_samples(&mut upload.reader())?;
        Self::assemble(upload.name(), file_number, samples, directory, config, analyzer)
    }

    pub fn from_samples(
        name: impl Into<String>,
        file_number: impl Into<String>,
        samples: Vec<Sample>,
        directory: Option<Arc<ReceiverDirectory>>,
        config: &ProcessingConfig,
    ) -> PpvResult<Self> {
        let analyzer = config.outlier_analyzer()?;
        Self::assemble(name, file_number, samples, directory, config, analyzer)
    }

    fn assemble(
        name: impl Into<String>,
        file_number: impl Into<String>,
        samples: Vec<Sample>,
        directory: Option<Arc<ReceiverDirectory>>,
        config: &ProcessingConfig,
        analyzer: OutlierAnalyzer,
    ) -> PpvResult<Self> {
        let name = name.into();
        if samples.is_empty() {
            return Err(PpvError::EmptyMeasurement(name));
        }
        Ok(Self {
            name,
            file_number: file_number.into(),
            samples,
            directory,
            config: config.clone(),
            analyzer,
            mode: OutlierMode::Raw,
            raw: OnceLock::new(),
            corrected: OnceLock::new(),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_number(&self) -> &str {
        &self.file_number
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn receiver(&self) -> Option<&str> {
        self.directory
            .as_ref()?
            .find_receiver_by_file_number(&self.file_number)
    }

    /// Fresh window aggregation, bypassing the cached views.
    pub fn aggregate(&self) -> Vec<PpvRecord> {
        aggregate(&self.samples, &self.config)
    }

    pub fn outlier_mode(&self) -> OutlierMode {
        self.mode
    }

    pub fn set_outlier_mode(&mut self, enabled: bool) {
        self.mode = OutlierMode::from(enabled);
    }

    /// The view selected by the current outlier mode.
    pub fn data(&self) -> &[PpvRecord] {
        self.view(self.mode)
    }

    pub fn view(&self, mode: OutlierMode) -> &[PpvRecord] {
        match mode {
            OutlierMode::Raw => self.raw.get_or_init(|| {
                self.record_aggregation();
                self.aggregate()
            }),
            OutlierMode::Corrected => self.corrected.get_or_init(|| {
                self.record_aggregation();
                self.correct(self.view(OutlierMode::Raw))
            }),
        }
    }

    fn correct(&self, raw: &[PpvRecord]) -> Vec<PpvRecord> {
        let mut corrected = raw.to_vec();
        for column in PpvColumn::ALL {
            let series = column.extract(raw);
            let replaced = self.analyzer.replace_outliers(series.view());
            for (record, value) in corrected.iter_mut().zip(replaced.iter()) {
                column.set(record, *value);
            }
        }
        corrected
    }

    fn record_aggregation(&self) {
        LogManager::new("measurement").detail(&format!("aggregating {}", self.name));
        if let Some(metrics) = &self.metrics {
            metrics.record_aggregation();
        }
    }

    /// Earliest window time of the raw view.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.view(OutlierMode::Raw).iter().map(|record| record.time).min()
    }

    pub fn period(&self) -> Option<Period> {
        self.start_time().map(|time| {
            Period::classify(&time, self.config.day_start_hour, self.config.day_end_hour)
        })
    }

    /// First record holding the largest PVS of the requested view.
    pub fn max_pvs(&self, mode: OutlierMode) -> Option<&PpvRecord> {
        self.view(mode)
            .iter()
            .filter(|record| !record.pvs.is_nan())
            .fold(None, |best: Option<&PpvRecord>, record| match best {
                Some(current) if current.pvs >= record.pvs => Some(current),
                _ => Some(record),
            })
    }

    pub fn describe(&self, mode: OutlierMode) -> Option<Description> {
        let pvs = PpvColumn::Pvs.extract(self.view(mode));
        StatsHelper::describe(&pvs.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RionSource;
    use crate::receivers::ReceiverEntry;

    fn rion_file(rows: &[(&str, i64, f64, f64, f64)]) -> Vec<u8> {
        let mut text = String::from("RION VM-56\nStart Time,Address,X_AP,Y_AP,Z_AP\n");
        for (time, address, x, y, z) in rows {
            text.push_str(&format!("{},{},{},{},{}\n", time, address, x, y, z));
        }
        text.into_bytes()
    }

    /// Twelve windows with a spike in window 11.
    fn spiky_upload() -> UploadedFile {
        let mut rows = Vec::new();
        for window in 0..12i64 {
            let peak = if window == 11 { 50.0 } else { 1.0 + window as f64 * 0.01 };
            rows.push((window * 10 + 1, peak));
        }
        let times: Vec<String> = (0..12)
            .map(|minute| format!("2024/03/15 22:{:02}:00", minute))
            .collect();
        let rows: Vec<(&str, i64, f64, f64, f64)> = rows
            .iter()
            .zip(times.iter())
            .map(|((address, peak), time)| (time.as_str(), *address, *peak, *peak, *peak))
            .collect();
        UploadedFile::new("Auto_Inst/VM_001_OCT_Inst_0055_0001.rnd", rion_file(&rows))
    }

    fn open(upload: &UploadedFile, directory: Option<Arc<ReceiverDirectory>>) -> MeasurementFile {
        MeasurementFile::open(upload, &RionSource::default(), directory, &ProcessingConfig::default())
            .unwrap()
    }

    #[test]
    fn opening_extracts_number_and_samples() {
        let file = open(&spiky_upload(), None);
        assert_eq!(file.file_number(), "0055");
        assert_eq!(file.samples().len(), 12);
        assert_eq!(file.data().len(), 12);
        assert_eq!(file.receiver(), None);
    }

    #[test]
    fn corrected_view_replaces_spike_with_median() {
        let mut file = open(&spiky_upload(), None);
        assert_eq!(file.data()[11].x_ppv, 50.0);
        file.set_outlier_mode(true);
        let corrected = file.data();
        let raw_x = PpvColumn::X.extract(file.view(OutlierMode::Raw));
        let median = StatsHelper::median(&raw_x.to_vec()).unwrap();
        assert_eq!(corrected[11].x_ppv, median);
        assert_eq!(corrected[11].pvs, StatsHelper::median(&PpvColumn::Pvs.extract(file.view(OutlierMode::Raw)).to_vec()).unwrap());
        assert_eq!(corrected[0], file.view(OutlierMode::Raw)[0]);
    }

    #[test]
    fn mode_switches_never_mix_views() {
        let mut file = open(&spiky_upload(), None);
        file.set_outlier_mode(true);
        let corrected_peak = file.data()[11].x_ppv;
        file.set_outlier_mode(false);
        assert_eq!(file.data()[11].x_ppv, 50.0);
        file.set_outlier_mode(true);
        assert_eq!(file.data()[11].x_ppv, corrected_peak);
        assert_eq!(file.view(OutlierMode::Raw), file.aggregate().as_slice());
    }

    #[test]
    fn views_are_computed_once() {
        let metrics = Arc::new(MetricsRecorder::new());
        let file = open(&spiky_upload(), None).with_metrics(metrics.clone());
        let first = file.view(OutlierMode::Raw).as_ptr();
        let second = file.view(OutlierMode::Raw).as_ptr();
        assert!(std::ptr::eq(first, second));
        file.view(OutlierMode::Corrected);
        file.view(OutlierMode::Corrected);
        assert_eq!(metrics.snapshot().aggregations, 2);
    }

    #[test]
    fn start_time_and_period_come_from_windows() {
        let file = open(&spiky_upload(), None);
        assert_eq!(
            file.start_time().unwrap().to_string(),
            "2024-03-15 22:00:00"
        );
        assert_eq!(file.period(), Some(Period::Night));
    }

    #[test]
    fn max_pvs_picks_spike_window() {
        let file = open(&spiky_upload(), None);
        assert_eq!(file.max_pvs(OutlierMode::Raw).unwrap().window, 11);
        let corrected = file.max_pvs(OutlierMode::Corrected).unwrap();
        assert!(corrected.pvs < 50.0);
    }

    #[test]
    fn describe_counts_every_window() {
        let file = open(&spiky_upload(), None);
        let description = file.describe(OutlierMode::Raw).unwrap();
        assert_eq!(description.count, 12);
        assert!((description.max - (3.0f64 * 2500.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn receiver_resolves_through_directory() {
        let directory = Arc::new(ReceiverDirectory::from_entries(vec![ReceiverEntry {
            name: "Receiver A".into(),
            day: "0055".into(),
            night: None,
        }]));
        let file = open(&spiky_upload(), Some(directory));
        assert_eq!(file.receiver(), Some("Receiver A"));
    }

    #[test]
    fn malformed_name_and_empty_file_are_errors() {
        let upload = UploadedFile::new("VM_Inst_55.rnd", rion_file(&[]));
        let result = MeasurementFile::open(&upload, &RionSource::default(), None, &ProcessingConfig::default());
        assert!(matches!(result, Err(PpvError::MalformedFilename(_))));

        let upload = UploadedFile::new("VM_Inst_0055_1.rnd", rion_file(&[]));
        let result = MeasurementFile::open(&upload, &RionSource::default(), None, &ProcessingConfig::default());
        assert!(matches!(result, Err(PpvError::EmptyMeasurement(_))));
    }
}
