use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::math::stats::StatsHelper;
use crate::prelude::{PpvError, PpvResult};

/// Tukey fences derived from the interquartile range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn contains(&self, value: f64) -> bool {
        !(value < self.lower || value > self.upper)
    }
}

/// Positions and values of a series lying strictly outside the fences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outliers {
    pub bounds: Option<OutlierBounds>,
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl Outliers {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Boolean mask over a series of `len` values.
    pub fn mask(&self, len: usize) -> Vec<bool> {
        let mut mask = vec![false; len];
        for &index in &self.indices {
            if let Some(slot) = mask.get_mut(index) {
                *slot = true;
            }
        }
        mask
    }

    pub fn selection(&self) -> OutlierSelection<'_> {
        OutlierSelection::Indices(&self.indices)
    }
}

/// Caller-supplied choice of values to replace.
#[derive(Debug, Clone, Copy)]
pub enum OutlierSelection<'a> {
    /// One flag per series position.
    Mask(&'a [bool]),
    /// Positions into the series.
    Indices(&'a [usize]),
}

impl OutlierSelection<'_> {
    fn to_mask(self, len: usize) -> PpvResult<Vec<bool>> {
        match self {
            OutlierSelection::Mask(mask) => {
                if mask.len() != len {
                    return Err(PpvError::InvalidArgument(format!(
                        "outlier mask has {} entries for a series of {}",
                        mask.len(),
                        len
                    )));
                }
                Ok(mask.to_vec())
            }
            OutlierSelection::Indices(indices) => {
                let mut mask = vec![false; len];
                for &index in indices {
                    let slot = mask.get_mut(index).ok_or_else(|| {
                        PpvError::InvalidArgument(format!(
                            "outlier index {} outside a series of {}",
                            index, len
                        ))
                    })?;
                    *slot = true;
                }
                Ok(mask)
            }
        }
    }
}

/// IQR outlier detection and median replacement over one numeric series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierAnalyzer {
    k_factor: f64,
}

impl Default for OutlierAnalyzer {
    fn default() -> Self {
        Self { k_factor: 1.5 }
    }
}

impl OutlierAnalyzer {
    pub fn new(k_factor: f64) -> PpvResult<Self> {
        if !k_factor.is_finite() || k_factor < 0.0 {
            return Err(PpvError::InvalidArgument(format!(
                "k factor must be finite and non-negative, got {}",
                k_factor
            )));
        }
        Ok(Self { k_factor })
    }

    pub fn k_factor(&self) -> f64 {
        self.k_factor
    }

    /// Fences `[Q1 - k·IQR, Q3 + k·IQR]`, or `None` when the series has no
    /// finite values.
    pub fn bounds(&self, series: ArrayView1<f64>) -> Option<OutlierBounds> {
        let sorted = StatsHelper::sorted_finite(&series.to_vec());
        let q1 = StatsHelper::percentile_sorted(&sorted, 0.25)?;
        let q3 = StatsHelper::percentile_sorted(&sorted, 0.75)?;
        let iqr = q3 - q1;
        Some(OutlierBounds {
            q1,
            q3,
            lower: q1 - self.k_factor * iqr,
            upper: q3 + self.k_factor * iqr,
        })
    }

    pub fn detect(&self, series: ArrayView1<f64>) -> Outliers {
        let Some(bounds) = self.bounds(series) else {
            return Outliers::default();
        };
        let (indices, values): (Vec<usize>, Vec<f64>) = series
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_finite() && !bounds.contains(**value))
            .map(|(index, value)| (index, *value))
            .unzip();
        Outliers {
            bounds: Some(bounds),
            indices,
            values,
        }
    }

    /// Returns a copy of `series` with the selected positions set to the
    /// median of the original series. Without a selection the outliers are
    /// detected with this analyzer's k factor.
    pub fn replace_with_median(
        &self,
        series: ArrayView1<f64>,
        selection: Option<OutlierSelection<'_>>,
    ) -> PpvResult<Array1<f64>> {
        match selection {
            Some(selection) => {
                let mask = selection.to_mask(series.len())?;
                Ok(apply_median(series, &mask))
            }
            None => Ok(self.replace_outliers(series)),
        }
    }

    /// Detects and replaces in one step.
    pub fn replace_outliers(&self, series: ArrayView1<f64>) -> Array1<f64> {
        let mask = self.detect(series).mask(series.len());
        apply_median(series, &mask)
    }
}

fn apply_median(series: ArrayView1<f64>, mask: &[bool]) -> Array1<f64> {
    let mut replaced = series.to_owned();
    let Some(median) = StatsHelper::median(&series.to_vec()) else {
        return replaced;
    };
    for (value, flagged) in replaced.iter_mut().zip(mask) {
        if *flagged {
            *value = median;
        }
    }
    replaced
}
