use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use ppvcore::processing::SessionSummary;
use ppvcore::telemetry::MetricsSnapshot;
use ppvcore::{SummaryCache, UploadedFile};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Runner {
    cache: SummaryCache,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        let cache = SummaryCache::new(Box::new(config.source()), config.to_session_config());
        Self { cache }
    }

    pub fn execute(&mut self, uploads: &[UploadedFile]) -> anyhow::Result<Arc<SessionSummary>> {
        self.cache
            .summaries(uploads)
            .context("building summary tables")
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.cache.metrics().snapshot()
    }
}

/// Reads every file below `paths`, the way a dropped folder is uploaded.
/// Names keep their folder components relative to each input root.
pub fn collect_uploads(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadedFile>> {
    let mut uploads = Vec::new();
    for path in paths {
        let root = path.parent().unwrap_or_else(|| Path::new(""));
        collect_into(path, root, &mut uploads)?;
    }
    Ok(uploads)
}

fn collect_into(path: &Path, root: &Path, uploads: &mut Vec<UploadedFile>) -> anyhow::Result<()> {
    if path.is_dir() {
        let mut children: Vec<PathBuf> = fs::read_dir(path)
            .with_context(|| format!("listing {}", path.display()))?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<_, _>>()
            .with_context(|| format!("listing {}", path.display()))?;
        children.sort();
        for child in children {
            collect_into(&child, root, uploads)?;
        }
        return Ok(());
    }

    let contents = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");
    uploads.push(UploadedFile::new(name, contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{write_dataset, GeneratorConfig};
    use ppvcore::OutlierMode;

    #[test]
    fn runner_summarizes_generated_folder() {
        let dir = tempfile::tempdir().unwrap();
        let generator = GeneratorConfig {
            files: 3,
            windows: 40,
            ..Default::default()
        };
        write_dataset(&generator, dir.path()).unwrap();

        let uploads = collect_uploads(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(uploads.len(), 3);
        assert!(uploads[0].name().contains("Auto_Inst/"));

        let mut cfg = WorkflowConfig::default();
        cfg.require_receivers = false;
        let mut runner = Runner::new(cfg);
        let summary = runner.execute(&uploads).unwrap();
        let numbers: Vec<&str> = summary
            .table(OutlierMode::Raw)
            .rows()
            .iter()
            .map(|row| row.file_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["0055", "0056", "0057"]);
        assert_eq!(summary.table(OutlierMode::Corrected).len(), 3);

        runner.execute(&uploads).unwrap();
        assert_eq!(runner.metrics().parsed, 3);
    }

    #[test]
    fn runner_requires_receiver_workbook_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(&GeneratorConfig::default(), dir.path()).unwrap();
        let uploads = collect_uploads(&[dir.path().to_path_buf()]).unwrap();
        let mut runner = Runner::new(WorkflowConfig::default());
        let err = runner.execute(&uploads).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ppvcore::PpvError>(),
            Some(ppvcore::PpvError::TableNotFound(_))
        ));
    }
}
