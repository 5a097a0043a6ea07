use serde::{Deserialize, Serialize};
use std::io::BufRead;

use crate::math::OutlierAnalyzer;
use crate::records::Sample;

/// Which sample timestamp represents a window in the aggregated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowTime {
    /// Earliest timestamp in the window.
    First,
    /// Latest timestamp in the window (group-max semantics).
    #[default]
    Last,
}

/// Shared configuration for the aggregation and outlier steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub window_size: u32,
    pub k_factor: f64,
    pub window_time: WindowTime,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            k_factor: 1.5,
            window_time: WindowTime::Last,
            day_start_hour: 7,
            day_end_hour: 21,
        }
    }
}

impl ProcessingConfig {
    /// Checks the session-wide settings and builds the analyzer they describe.
    pub fn outlier_analyzer(&self) -> PpvResult<OutlierAnalyzer> {
        if self.window_size == 0 {
            return Err(PpvError::InvalidArgument(
                "window size must be at least 1".to_string(),
            ));
        }
        if self.day_start_hour >= self.day_end_hour || self.day_end_hour > 24 {
            return Err(PpvError::InvalidArgument(format!(
                "day hours must satisfy start < end <= 24, got {}..{}",
                self.day_start_hour, self.day_end_hour
            )));
        }
        OutlierAnalyzer::new(self.k_factor)
    }
}

/// Common error type for the measurement pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PpvError {
    #[error("no files were uploaded")]
    NoFiles,
    #[error("file with extension \"{0}\" cannot be found")]
    TableNotFound(String),
    #[error("no 4-digit file number in file name: {0}")]
    MalformedFilename(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("measurement {0} contains no samples")]
    EmptyMeasurement(String),
    #[error("unparseable timestamp: {0}")]
    Timestamp(String),
    #[error("sheet not found: {0}")]
    SheetNotFound(String),
    #[error("receiver table error: {0}")]
    Table(String),
    #[error("file name pattern error: {0}")]
    Pattern(#[from] regex::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PpvResult<T> = Result<T, PpvError>;

/// Capability interface for a vendor's raw sample format.
///
/// Each supported instrument provides one implementation; nothing is
/// inherited between vendors.
pub trait SampleSource: Send + Sync {
    /// Short vendor label used in log output.
    fn vendor(&self) -> &'static str;

    /// Whether an uploaded file name belongs to this vendor's sample files.
    fn accepts(&self, _file_name: &str) -> bool {
        true
    }

    /// Extracts the file number that links a measurement to a receiver.
    fn file_identifier(&self, file_name: &str) -> PpvResult<String>;

    /// Parses every sample from the raw file contents.
    fn load_samples(&self, reader: &mut dyn BufRead) -> PpvResult<Vec<Sample>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_build_an_analyzer() {
        let analyzer = ProcessingConfig::default().outlier_analyzer().unwrap();
        assert_eq!(analyzer.k_factor(), 1.5);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            ProcessingConfig {
                k_factor: -1.0,
                ..Default::default()
            },
            ProcessingConfig {
                window_size: 0,
                ..Default::default()
            },
            ProcessingConfig {
                day_start_hour: 21,
                day_end_hour: 7,
                ..Default::default()
            },
            ProcessingConfig {
                day_end_hour: 25,
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(matches!(
                config.outlier_analyzer(),
                Err(PpvError::InvalidArgument(_))
            ));
        }
    }
}
