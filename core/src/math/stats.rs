use serde::{Deserialize, Serialize};

/// Summary statistics of a numeric column, in the usual describe layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` below two values.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

pub struct StatsHelper;

impl StatsHelper {
    /// Finite values in ascending order. NaN and infinities are ignored by
    /// every statistic below.
    pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    /// Linear-interpolated percentile for `q` in `[0, 1]` over sorted input.
    pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
        if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
            return None;
        }
        let position = (sorted.len() - 1) as f64 * q;
        let lower = position.floor() as usize;
        let upper = position.ceil() as usize;
        let fraction = position - lower as f64;
        Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
    }

    pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
        Self::percentile_sorted(&Self::sorted_finite(values), q)
    }

    pub fn median(values: &[f64]) -> Option<f64> {
        Self::percentile(values, 0.5)
    }

    pub fn mean(values: &[f64]) -> Option<f64> {
        let finite = Self::sorted_finite(values);
        if finite.is_empty() {
            return None;
        }
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }

    /// Sample standard deviation (n - 1 denominator).
    pub fn std(values: &[f64]) -> Option<f64> {
        let finite = Self::sorted_finite(values);
        if finite.len() < 2 {
            return None;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let sum_sq: f64 = finite.iter().map(|v| (v - mean) * (v - mean)).sum();
        Some((sum_sq / (finite.len() - 1) as f64).sqrt())
    }

    pub fn describe(values: &[f64]) -> Option<Description> {
        let sorted = Self::sorted_finite(values);
        let count = sorted.len();
        if count == 0 {
            return None;
        }
        Some(Description {
            count,
            mean: Self::mean(&sorted)?,
            std: Self::std(&sorted),
            min: sorted[0],
            q25: Self::percentile_sorted(&sorted, 0.25)?,
            median: Self::percentile_sorted(&sorted, 0.5)?,
            q75: Self::percentile_sorted(&sorted, 0.75)?,
            max: sorted[count - 1],
        })
    }
}
