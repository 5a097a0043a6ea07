use chrono::{NaiveDateTime, Timelike};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Peak particle velocity of one address window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpvRecord {
    #[serde(rename = "Window")]
    pub window: i64,
    #[serde(rename = "Start Time")]
    pub time: NaiveDateTime,
    #[serde(rename = "X_PPV")]
    pub x_ppv: f64,
    #[serde(rename = "Y_PPV")]
    pub y_ppv: f64,
    #[serde(rename = "Z_PPV")]
    pub z_ppv: f64,
    #[serde(rename = "PVS")]
    pub pvs: f64,
}

impl PpvRecord {
    /// Builds a record from the three axis peaks; PVS is their vector norm.
    pub fn from_peaks(window: i64, time: NaiveDateTime, x_ppv: f64, y_ppv: f64, z_ppv: f64) -> Self {
        Self {
            window,
            time,
            x_ppv,
            y_ppv,
            z_ppv,
            pvs: (x_ppv * x_ppv + y_ppv * y_ppv + z_ppv * z_ppv).sqrt(),
        }
    }
}

/// Numeric columns of an aggregated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PpvColumn {
    X,
    Y,
    Z,
    Pvs,
}

impl PpvColumn {
    pub const ALL: [PpvColumn; 4] = [PpvColumn::X, PpvColumn::Y, PpvColumn::Z, PpvColumn::Pvs];

    pub fn label(self) -> &'static str {
        match self {
            PpvColumn::X => "X_PPV",
            PpvColumn::Y => "Y_PPV",
            PpvColumn::Z => "Z_PPV",
            PpvColumn::Pvs => "PVS",
        }
    }

    pub fn get(self, record: &PpvRecord) -> f64 {
        match self {
            PpvColumn::X => record.x_ppv,
            PpvColumn::Y => record.y_ppv,
            PpvColumn::Z => record.z_ppv,
            PpvColumn::Pvs => record.pvs,
        }
    }

    pub fn set(self, record: &mut PpvRecord, value: f64) {
        match self {
            PpvColumn::X => record.x_ppv = value,
            PpvColumn::Y => record.y_ppv = value,
            PpvColumn::Z => record.z_ppv = value,
            PpvColumn::Pvs => record.pvs = value,
        }
    }

    /// Copies this column out of a record sequence.
    pub fn extract(self, records: &[PpvRecord]) -> Array1<f64> {
        records.iter().map(|record| self.get(record)).collect()
    }
}

/// Time-of-day class of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Day,
    Night,
}

impl Period {
    /// Day when `start < hour < end`, night otherwise.
    pub fn classify(time: &NaiveDateTime, start: u32, end: u32) -> Self {
        let hour = time.hour();
        if start < hour && hour < end {
            Period::Day
        } else {
            Period::Night
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day => write!(f, "Day"),
            Period::Night => write!(f, "Night"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at_hour(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(hour, 30, 0))
            .unwrap()
    }

    #[test]
    fn pvs_is_norm_of_axis_peaks() {
        let record = PpvRecord::from_peaks(0, at_hour(10), 3.0, 4.0, 12.0);
        assert!((record.pvs - 13.0).abs() < 1e-12);
    }

    #[test]
    fn period_bounds_are_exclusive() {
        assert_eq!(Period::classify(&at_hour(8), 7, 21), Period::Day);
        assert_eq!(Period::classify(&at_hour(20), 7, 21), Period::Day);
        assert_eq!(Period::classify(&at_hour(21), 7, 21), Period::Night);
        assert_eq!(Period::classify(&at_hour(7), 7, 21), Period::Night);
        assert_eq!(Period::classify(&at_hour(0), 7, 21), Period::Night);
    }

    #[test]
    fn column_round_trips_through_record() {
        let mut record = PpvRecord::from_peaks(2, at_hour(9), 1.0, 2.0, 2.0);
        PpvColumn::Y.set(&mut record, 7.5);
        assert_eq!(PpvColumn::Y.get(&record), 7.5);
        assert_eq!(PpvColumn::Pvs.get(&record), 3.0);
        assert_eq!(PpvColumn::Pvs.label(), "PVS");
    }
}
