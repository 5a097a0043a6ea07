pub mod cache;
pub mod measurement;
pub mod summary;
pub mod window;

pub use cache::{SessionConfig, SessionSummary, SummaryCache};
pub use measurement::{MeasurementFile, OutlierMode};
pub use summary::{
    MeasurementBatch, ReceiverAnnotation, SkippedFile, SummaryBuilder, SummaryRow, SummaryTable,
};
pub use window::aggregate;
