use chrono::NaiveDateTime;
use regex::Regex;
use serde::Deserialize;
use std::io::BufRead;
use std::sync::OnceLock;

use crate::ingest::upload::base_name;
use crate::prelude::{PpvError, PpvResult, SampleSource};
use crate::records::Sample;

/// Year-first layouts seen in instantaneous exports.
const TIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
];

fn file_number_pattern() -> PpvResult<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"_(\d{4})_"))
        .as_ref()
        .map_err(|err| PpvError::Pattern(err.clone()))
}

pub fn parse_timestamp(value: &str) -> PpvResult<NaiveDateTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| PpvError::Timestamp(value.to_string()))
}

#[derive(Debug, Deserialize)]
struct RionRow {
    #[serde(rename = "Start Time")]
    start_time: String,
    #[serde(rename = "Address")]
    address: i64,
    #[serde(rename = "X_AP")]
    x_ap: f64,
    #[serde(rename = "Y_AP")]
    y_ap: f64,
    #[serde(rename = "Z_AP")]
    z_ap: f64,
}

/// Instantaneous-sample files from RION vibration level meters.
#[derive(Debug, Clone)]
pub struct RionSource {
    instant_tag: Option<String>,
}

impl Default for RionSource {
    fn default() -> Self {
        Self {
            instant_tag: Some("Inst".to_string()),
        }
    }
}

impl RionSource {
    /// `instant_tag` restricts accepted files to names with that
    /// underscore-separated segment; `None` accepts every name.
    pub fn new(instant_tag: Option<String>) -> Self {
        Self { instant_tag }
    }
}

impl SampleSource for RionSource {
    fn vendor(&self) -> &'static str {
        "RION"
    }

    fn accepts(&self, file_name: &str) -> bool {
        match &self.instant_tag {
            Some(tag) => base_name(file_name).split('_').any(|segment| segment == tag),
            None => true,
        }
    }

    fn file_identifier(&self, file_name: &str) -> PpvResult<String> {
        file_number_pattern()?
            .captures(base_name(file_name))
            .and_then(|captures| captures.get(1))
            .map(|number| number.as_str().to_string())
            .ok_or_else(|| PpvError::MalformedFilename(file_name.to_string()))
    }

    fn load_samples(&self, reader: &mut dyn BufRead) -> PpvResult<Vec<Sample>> {
        // First line is the instrument banner, the column header follows.
        let mut banner = String::new();
        reader.read_line(&mut banner)?;

        let mut rows = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut samples = Vec::new();
        for row in rows.deserialize::<RionRow>() {
            let row = row?;
            samples.push(Sample::new(
                parse_timestamp(&row.start_time)?,
                row.address,
                row.x_ap,
                row.y_ap,
                row.z_ap,
            ));
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const FILE: &str = "RION VM-56 Instantaneous\n\
Start Time,Address,X_AP,Y_AP,Z_AP,Unit\n\
2024/03/15 10:20:30,1,0.10,0.20,0.30,mm/s\n\
2024/03/15 10:20:31, 2 ,0.40,0.10,0.05,mm/s\n";

    #[test]
    fn loads_samples_after_banner() {
        let samples = RionSource::default()
            .load_samples(&mut Cursor::new(FILE.as_bytes()))
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].address, 2);
        assert_eq!(samples[1].x, 0.40);
        assert_eq!(samples[0].time.to_string(), "2024-03-15 10:20:30");
    }

    #[test]
    fn rejects_bad_timestamp() {
        let file = "banner\nStart Time,Address,X_AP,Y_AP,Z_AP\nyesterday,1,0,0,0\n";
        let result = RionSource::default().load_samples(&mut Cursor::new(file.as_bytes()));
        assert!(matches!(result, Err(PpvError::Timestamp(_))));
    }

    #[test]
    fn missing_column_is_a_csv_error() {
        let file = "banner\nStart Time,Address,X_AP,Y_AP\n2024/03/15 10:20:30,1,0,0\n";
        let result = RionSource::default().load_samples(&mut Cursor::new(file.as_bytes()));
        assert!(matches!(result, Err(PpvError::Csv(_))));
    }

    #[test]
    fn accepts_several_timestamp_layouts() {
        for value in [
            "2024/03/15 10:20:30.250",
            "2024-03-15 10:20:30",
            "2024-03-15T10:20:30",
            "2024/03/15 10:20",
        ] {
            assert!(parse_timestamp(value).is_ok(), "{value}");
        }
    }

    #[test]
    fn extracts_four_digit_file_number() {
        let source = RionSource::default();
        assert_eq!(
            source
                .file_identifier("Vibrations/Auto_0055/Auto_Inst/VM_001_OCT_Inst_0055_0001.rnd")
                .unwrap(),
            "0055"
        );
        assert!(matches!(
            source.file_identifier("VM_001_OCT_Inst.rnd"),
            Err(PpvError::MalformedFilename(_))
        ));
    }

    #[test]
    fn file_number_pattern_is_shared() {
        let first = file_number_pattern().unwrap();
        let second = file_number_pattern().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(first.is_match("VM_Inst_0070_0001.rnd"));
    }

    #[test]
    fn only_instantaneous_files_are_accepted() {
        let source = RionSource::default();
        assert!(source.accepts("Auto_Inst/VM_001_OCT_Inst_0055_0001.rnd"));
        assert!(!source.accepts("Auto_Calc/VM_001_OCT_Calc_0055_0001.rnd"));
        assert!(!source.accepts("receivers.xlsx"));
        assert!(RionSource::new(None).accepts("receivers.xlsx"));
    }
}
