use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for generating synthetic instantaneous measurement files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub files: usize,
    pub first_file_number: u32,
    pub windows: usize,
    pub samples_per_window: usize,
    pub base_level: f64,
    pub noise: f64,
    pub spike_probability: f64,
    pub spike_level: f64,
    pub start_hour: u32,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            files: 2,
            first_file_number: 55,
            windows: 360,
            samples_per_window: 10,
            base_level: 0.05,
            noise: 0.02,
            spike_probability: 0.01,
            spike_level: 2.0,
            start_hour: 22,
            seed: 0,
        }
    }
}

fn start_time(config: &GeneratorConfig) -> anyhow::Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .and_then(|date| date.and_hms_opt(config.start_hour, 0, 0))
        .with_context(|| format!("invalid start hour {}", config.start_hour))
}

fn amplitude(rng: &mut StdRng, config: &GeneratorConfig) -> f64 {
    let jitter = if config.noise > 0.0 {
        rng.gen_range(-config.noise..config.noise)
    } else {
        0.0
    };
    let spike = if rng.gen_bool(config.spike_probability.clamp(0.0, 1.0)) {
        config.spike_level
    } else {
        0.0
    };
    (config.base_level + jitter).abs() + spike
}

/// Builds the text of one instantaneous file, one sample per second.
pub fn build_instant_file(config: &GeneratorConfig, file_index: usize) -> anyhow::Result<String> {
    let start = start_time(config)?;
    let sample_count = config
        .windows
        .checked_mul(config.samples_per_window.max(1))
        .context("overflow computing sample count for generator")?;

    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(file_index as u64));
    let mut text = String::from("RION VM-56 Instantaneous Data\nStart Time,Address,X_AP,Y_AP,Z_AP\n");
    for index in 0..sample_count {
        let time = start + Duration::seconds(index as i64);
        let x = amplitude(&mut rng, config);
        let y = amplitude(&mut rng, config);
        let z = amplitude(&mut rng, config);
        writeln!(
            text,
            "{},{},{:.4},{:.4},{:.4}",
            time.format("%Y/%m/%d %H:%M:%S"),
            index + 1,
            x,
            y,
            z
        )?;
    }
    Ok(text)
}

/// Writes a folder laid out like an instrument export:
/// `Auto_NNNN/Auto_Inst/VM_001_OCT_Inst_NNNN_0001.rnd`.
pub fn write_dataset(config: &GeneratorConfig, root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(config.files);
    for file_index in 0..config.files {
        let number = config.first_file_number as usize + file_index;
        let folder = root.join(format!("Auto_{:04}", number)).join("Auto_Inst");
        fs::create_dir_all(&folder)
            .with_context(|| format!("creating {}", folder.display()))?;
        let path = folder.join(format!("VM_001_OCT_Inst_{:04}_0001.rnd", number));
        let text = build_instant_file(config, file_index)?;
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
