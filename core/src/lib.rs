//! Measurement-processing core for vibration-compliance analysis.
//!
//! Raw instantaneous samples are reduced to Peak Particle Velocity windows,
//! optionally cleaned of IQR outliers, matched to named receivers and
//! assembled into per-file summary tables.

pub mod ingest;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod receivers;
pub mod records;
pub mod telemetry;

pub use ingest::{RionSource, UploadedFile};
pub use prelude::{PpvError, PpvResult, ProcessingConfig, SampleSource, WindowTime};
pub use processing::{MeasurementFile, OutlierMode, SummaryBuilder, SummaryCache, SummaryTable};
pub use receivers::ReceiverDirectory;
