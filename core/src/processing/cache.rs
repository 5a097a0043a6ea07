use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ingest::{BatchKey, UploadedFile};
use crate::prelude::{PpvError, PpvResult, ProcessingConfig, SampleSource};
use crate::processing::measurement::OutlierMode;
use crate::processing::summary::{MeasurementBatch, SummaryBuilder, SummaryTable};
use crate::receivers::{locate_receiver_table, DirectoryConfig, ReceiverDirectory};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Settings for one analysis session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub processing: ProcessingConfig,
    pub receivers: DirectoryConfig,
    /// When set, an upload set without a receiver workbook is rejected.
    pub require_receivers: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            receivers: DirectoryConfig::default(),
            require_receivers: true,
        }
    }
}

/// Everything derived from one upload set.
pub struct SessionSummary {
    pub directory: Option<Arc<ReceiverDirectory>>,
    pub batch: MeasurementBatch,
    pub raw: SummaryTable,
    pub corrected: SummaryTable,
}

impl SessionSummary {
    pub fn table(&self, mode: OutlierMode) -> &SummaryTable {
        match mode {
            OutlierMode::Raw => &self.raw,
            OutlierMode::Corrected => &self.corrected,
        }
    }
}

/// Memoizes the summaries of the last upload set, keyed by its identity,
/// so presenting the same set again parses nothing.
pub struct SummaryCache {
    source: Box<dyn SampleSource>,
    config: SessionConfig,
    metrics: Arc<MetricsRecorder>,
    cached: Option<(BatchKey, Arc<SessionSummary>)>,
    logger: LogManager,
}

impl SummaryCache {
    pub fn new(source: Box<dyn SampleSource>, config: SessionConfig) -> Self {
        Self {
            source,
            config,
            metrics: Arc::new(MetricsRecorder::new()),
            cached: None,
            logger: LogManager::new("session"),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn summaries(&mut self, uploads: &[UploadedFile]) -> PpvResult<Arc<SessionSummary>> {
        let key = BatchKey::of(uploads);
        if let Some((cached_key, summary)) = &self.cached {
            if *cached_key == key {
                self.logger.detail("upload set unchanged, reusing summaries");
                return Ok(summary.clone());
            }
        }

        let summary = Arc::new(self.compute(uploads)?);
        self.cached = Some((key, summary.clone()));
        Ok(summary)
    }

    /// Drops the cached session.
    pub fn reset(&mut self) {
        self.cached = None;
    }

    fn compute(&self, uploads: &[UploadedFile]) -> PpvResult<SessionSummary> {
        let directory = self.load_directory(uploads)?.map(Arc::new);
        let batch = MeasurementBatch::ingest(
            uploads,
            self.source.as_ref(),
            directory.clone(),
            &self.config.processing,
            &self.metrics,
        )?;
        let builder = SummaryBuilder::new(directory.clone());
        let raw = builder.build_batch(&batch, OutlierMode::Raw);
        let corrected = builder.build_batch(&batch, OutlierMode::Corrected);
        self.logger.record(&format!(
            "session summaries ready: {} rows, {} skipped",
            raw.len(),
            raw.skipped().len()
        ));
        Ok(SessionSummary {
            directory,
            batch,
            raw,
            corrected,
        })
    }

    fn load_directory(&self, uploads: &[UploadedFile]) -> PpvResult<Option<ReceiverDirectory>> {
        let receivers = &self.config.receivers;
        if self.config.require_receivers {
            return ReceiverDirectory::from_uploads(uploads, receivers).map(Some);
        }
        match locate_receiver_table(uploads, &receivers.table_extension) {
            Ok(_) => ReceiverDirectory::from_uploads(uploads, receivers).map(Some),
            Err(PpvError::NoFiles) | Err(PpvError::TableNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RionSource;

    fn upload(name: &str, peak: f64) -> UploadedFile {
        let text = format!(
            "RION VM-56\nStart Time,Address,X_AP,Y_AP,Z_AP\n2024/03/15 12:00:00,1,{peak},{peak},{peak}\n"
        );
        UploadedFile::new(name, text.into_bytes())
    }

    fn cache(require_receivers: bool) -> SummaryCache {
        SummaryCache::new(
            Box::new(RionSource::default()),
            SessionConfig {
                require_receivers,
                ..Default::default()
            },
        )
    }

    #[test]
    fn same_upload_set_is_not_reparsed() {
        let mut cache = cache(false);
        let uploads = vec![
            upload("VM_Inst_0055_0001.rnd", 1.0),
            upload("VM_Inst_0070_0001.rnd", 2.0),
        ];
        let first = cache.summaries(&uploads).unwrap();
        let second = cache.summaries(&uploads).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.metrics().snapshot().parsed, 2);
        assert_eq!(first.table(OutlierMode::Raw).len(), 2);
        assert_eq!(first.table(OutlierMode::Corrected).len(), 2);
        assert!(first.directory.is_none());
    }

    #[test]
    fn changed_upload_set_is_recomputed() {
        let mut cache = cache(false);
        cache.summaries(&[upload("VM_Inst_0055_0001.rnd", 1.0)]).unwrap();
        let summary = cache.summaries(&[upload("VM_Inst_0055_0001.rnd", 3.0)]).unwrap();
        assert_eq!(summary.raw.get("0055").unwrap().x_ppv, 3.0);
        assert_eq!(cache.metrics().snapshot().parsed, 2);
        cache.reset();
        cache.summaries(&[upload("VM_Inst_0055_0001.rnd", 3.0)]).unwrap();
        assert_eq!(cache.metrics().snapshot().parsed, 3);
    }

    #[test]
    fn required_receiver_table_errors_abort() {
        let mut cache = cache(true);
        assert!(matches!(cache.summaries(&[]), Err(PpvError::NoFiles)));
        let uploads = vec![upload("VM_Inst_0055_0001.rnd", 1.0)];
        assert!(matches!(
            cache.summaries(&uploads),
            Err(PpvError::TableNotFound(_))
        ));
        assert_eq!(cache.metrics().snapshot().parsed, 0);
    }

    #[test]
    fn invalid_k_factor_fails_the_session_before_parsing() {
        let mut cache = SummaryCache::new(
            Box::new(RionSource::default()),
            SessionConfig {
                require_receivers: false,
                processing: ProcessingConfig {
                    k_factor: -1.0,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let result = cache.summaries(&[upload("VM_Inst_0055_0001.rnd", 1.0)]);
        assert!(matches!(result, Err(PpvError::InvalidArgument(_))));
        let snapshot = cache.metrics().snapshot();
        assert_eq!(snapshot.parsed, 0);
        assert_eq!(snapshot.skipped, 0);
    }

    #[test]
    fn optional_receiver_table_allows_empty_set() {
        let mut cache = cache(false);
        let summary = cache.summaries(&[]).unwrap();
        assert!(summary.raw.is_empty());
    }
}
