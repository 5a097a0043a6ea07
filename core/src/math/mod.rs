pub mod outliers;
pub mod stats;

pub use outliers::{OutlierAnalyzer, OutlierBounds, OutlierSelection, Outliers};
pub use stats::{Description, StatsHelper};
