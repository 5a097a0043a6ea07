use ppvcore::math::Description;
use ppvcore::processing::{SessionSummary, SkippedFile, SummaryRow};
use ppvcore::records::{Period, PpvRecord};
use ppvcore::OutlierMode;
use serde::Serialize;
use std::collections::BTreeMap;

/// Both views of one measurement, as served to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct FileDetail {
    pub file_number: String,
    pub name: String,
    pub receiver: Option<String>,
    pub period: Option<Period>,
    pub raw: Vec<PpvRecord>,
    pub corrected: Vec<PpvRecord>,
    pub raw_description: Option<Description>,
    pub corrected_description: Option<Description>,
}

/// One view of a measurement.
#[derive(Debug, Serialize)]
pub struct FileView<'a> {
    pub file_number: &'a str,
    pub name: &'a str,
    pub receiver: Option<&'a str>,
    pub period: Option<Period>,
    pub mode: OutlierMode,
    pub records: &'a [PpvRecord],
    pub description: Option<&'a Description>,
}

impl FileDetail {
    pub fn view(&self, mode: OutlierMode) -> FileView<'_> {
        let (records, description) = match mode {
            OutlierMode::Raw => (&self.raw, &self.raw_description),
            OutlierMode::Corrected => (&self.corrected, &self.corrected_description),
        };
        FileView {
            file_number: &self.file_number,
            name: &self.name,
            receiver: self.receiver.as_deref(),
            period: self.period,
            mode,
            records,
            description: description.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ReportModel {
    pub raw: Vec<SummaryRow>,
    pub corrected: Vec<SummaryRow>,
    pub skipped: Vec<SkippedFile>,
    pub files: BTreeMap<String, FileDetail>,
}

impl ReportModel {
    pub fn from_summary(summary: &SessionSummary) -> Self {
        let files = summary
            .batch
            .files()
            .iter()
            .map(|file| {
                let detail = FileDetail {
                    file_number: file.file_number().to_string(),
                    name: file.name().to_string(),
                    receiver: file.receiver().map(str::to_string),
                    period: file.period(),
                    raw: file.view(OutlierMode::Raw).to_vec(),
                    corrected: file.view(OutlierMode::Corrected).to_vec(),
                    raw_description: file.describe(OutlierMode::Raw),
                    corrected_description: file.describe(OutlierMode::Corrected),
                };
                (detail.file_number.clone(), detail)
            })
            .collect();

        Self {
            raw: summary.raw.rows().to_vec(),
            corrected: summary.corrected.rows().to_vec(),
            skipped: summary.raw.skipped().to_vec(),
            files,
        }
    }
}
