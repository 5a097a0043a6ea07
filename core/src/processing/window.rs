use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::prelude::{ProcessingConfig, WindowTime};
use crate::records::{PpvRecord, Sample};

struct WindowPeaks {
    first: NaiveDateTime,
    last: NaiveDateTime,
    x: f64,
    y: f64,
    z: f64,
}

impl WindowPeaks {
    fn start(sample: &Sample) -> Self {
        Self {
            first: sample.time,
            last: sample.time,
            x: sample.x,
            y: sample.y,
            z: sample.z,
        }
    }

    // f64::max drops NaN, so a window is NaN only if every sample is.
    fn absorb(&mut self, sample: &Sample) {
        self.first = self.first.min(sample.time);
        self.last = self.last.max(sample.time);
        self.x = self.x.max(sample.x);
        self.y = self.y.max(sample.y);
        self.z = self.z.max(sample.z);
    }
}

/// Groups samples into address windows and reduces each window to its
/// per-axis peaks. Each axis maximum is taken independently, so the three
/// peaks may come from different samples. Output is ordered by window index.
pub fn aggregate(samples: &[Sample], config: &ProcessingConfig) -> Vec<PpvRecord> {
    let mut windows: BTreeMap<i64, WindowPeaks> = BTreeMap::new();
    for sample in samples {
        windows
            .entry(sample.window_index(config.window_size))
            .and_modify(|peaks| peaks.absorb(sample))
            .or_insert_with(|| WindowPeaks::start(sample));
    }

    windows
        .into_iter()
        .map(|(index, peaks)| {
            let time = match config.window_time {
                WindowTime::First => peaks.first,
                WindowTime::Last => peaks.last,
            };
            PpvRecord::from_peaks(index, time, peaks.x, peaks.y, peaks.z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn sample(second: i64, address: i64, x: f64, y: f64, z: f64) -> Sample {
        let base = NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(22, 0, 0))
            .unwrap();
        Sample::new(base + Duration::seconds(second), address, x, y, z)
    }

    #[test]
    fn addresses_split_into_two_windows() {
        let samples = vec![
            sample(0, 1, 0.1, 0.5, 0.2),
            sample(1, 5, 0.4, 0.1, 0.2),
            sample(2, 10, 0.2, 0.2, 0.9),
            sample(3, 11, 0.3, 0.0, 0.0),
            sample(4, 15, 0.0, 0.6, 0.1),
        ];
        let records = aggregate(&samples, &ProcessingConfig::default());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].window, 0);
        assert_eq!((records[0].x_ppv, records[0].y_ppv, records[0].z_ppv), (0.4, 0.5, 0.9));
        assert_eq!(records[1].window, 1);
        assert_eq!((records[1].x_ppv, records[1].y_ppv, records[1].z_ppv), (0.3, 0.6, 0.1));
    }

    #[test]
    fn pvs_matches_norm_of_peaks() {
        let samples = vec![sample(0, 1, 0.3, 0.0, 0.0), sample(1, 2, 0.0, 0.4, 1.2)];
        let records = aggregate(&samples, &ProcessingConfig::default());
        let expected = (0.3f64 * 0.3 + 0.4 * 0.4 + 1.2 * 1.2).sqrt();
        assert!((records[0].pvs - expected).abs() < 1e-12);
    }

    #[test]
    fn window_time_follows_configuration() {
        let samples = vec![sample(5, 3, 0.0, 0.0, 0.0), sample(2, 1, 0.0, 0.0, 0.0)];
        let last = aggregate(&samples, &ProcessingConfig::default());
        assert_eq!(last[0].time, samples[0].time);
        let config = ProcessingConfig {
            window_time: WindowTime::First,
            ..Default::default()
        };
        let first = aggregate(&samples, &config);
        assert_eq!(first[0].time, samples[1].time);
    }

    #[test]
    fn output_is_ordered_by_window_even_with_gaps() {
        let samples = vec![
            sample(0, 45, 1.0, 1.0, 1.0),
            sample(1, 2, 1.0, 1.0, 1.0),
            sample(2, 21, 1.0, 1.0, 1.0),
        ];
        let windows: Vec<i64> = aggregate(&samples, &ProcessingConfig::default())
            .iter()
            .map(|record| record.window)
            .collect();
        assert_eq!(windows, vec![0, 2, 4]);
    }

    #[test]
    fn nan_amplitudes_do_not_hide_peaks() {
        let samples = vec![sample(0, 1, f64::NAN, 0.2, 0.2), sample(1, 2, 0.7, 0.2, 0.2)];
        let records = aggregate(&samples, &ProcessingConfig::default());
        assert_eq!(records[0].x_ppv, 0.7);
    }
}
