use anyhow::Context;
use bridge::bridge::ReportBridge;
use bridge::model::ReportModel;
use clap::Parser;
use generator::profile::{write_dataset, GeneratorConfig};
use log::info;
use ppvcore::processing::SummaryTable;
use ppvcore::{OutlierMode, PpvError};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::{collect_uploads, Runner};

mod bridge;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Peak particle velocity summaries for vibration measurement folders")]
struct Args {
    /// Measurement folders or files, including the receiver workbook
    input: Vec<PathBuf>,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 10)]
    window_size: u32,
    #[arg(long, default_value_t = 1.5)]
    k_factor: f64,
    /// Print the outlier-corrected table instead of the raw one
    #[arg(long, default_value_t = false)]
    outliers: bool,
    /// Process measurements without a receiver workbook
    #[arg(long, default_value_t = false)]
    without_receivers: bool,
    /// Export both summary tables as CSV; the corrected one gets a `_corrected` suffix
    #[arg(long)]
    output: Option<PathBuf>,
    /// Print the full report model as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Write a synthetic measurement folder here before processing
    #[arg(long)]
    synthesize: Option<PathBuf>,
    #[arg(long, default_value_t = 2)]
    synthetic_files: usize,
    /// Keep the JSON bridge alive for the dashboard
    #[arg(long, default_value_t = false)]
    serve: bool,
}

/// Messages for the failures a user can fix by changing the upload.
fn user_message(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<PpvError>()? {
        PpvError::NoFiles => Some("No files were found. Pass a measurement folder."),
        PpvError::TableNotFound(_) => Some(
            "No receiver workbook (.xlsx) found among the inputs. Add it or pass --without-receivers.",
        ),
        PpvError::SheetNotFound(_) => Some("The receiver workbook lacks the configured day/night sheets."),
        _ => None,
    }
}

fn print_table(table: &SummaryTable) {
    println!(
        "{:<6} {:<20} {:>10} {:>10} {:>10} {:>10}  Receiver",
        "File", "Measurement Time", "X_PPV", "Y_PPV", "Z_PPV", "PVS"
    );
    for row in table.rows() {
        println!(
            "{:<6} {:<20} {:>10.4} {:>10.4} {:>10.4} {:>10.4}  {}",
            row.file_number,
            row.measurement_time.to_string(),
            row.x_ppv,
            row.y_ppv,
            row.z_ppv,
            row.pvs,
            row.receiver
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string())
        );
    }
    for skipped in table.skipped() {
        println!("skipped {}: {}", skipped.name, skipped.reason);
    }
}

fn corrected_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "summary".to_string());
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    path.with_file_name(format!("{}_corrected.{}", stem, extension))
}

fn export(table: &SummaryTable, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    table
        .write_csv(file)
        .with_context(|| format!("writing {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.window_size, args.k_factor)
    };
    if args.without_receivers {
        workflow_config.require_receivers = false;
    }

    let mut inputs = args.input.clone();
    if let Some(dir) = &args.synthesize {
        let generator = GeneratorConfig {
            files: args.synthetic_files,
            ..Default::default()
        };
        let written = write_dataset(&generator, dir)?;
        println!("Synthesized {} measurement files in {}", written.len(), dir.display());
        if inputs.is_empty() {
            inputs.push(dir.clone());
        }
    }

    let uploads = collect_uploads(&inputs)?;
    let mut runner = Runner::new(workflow_config.clone());
    let summary = match runner.execute(&uploads) {
        Ok(summary) => summary,
        Err(err) => {
            if let Some(message) = user_message(&err) {
                eprintln!("{}", message);
            }
            return Err(err);
        }
    };

    let metrics = runner.metrics();
    info!(
        "files parsed {}, skipped {}, views computed {}",
        metrics.parsed, metrics.skipped, metrics.aggregations
    );
    print_table(summary.table(OutlierMode::from(args.outliers)));

    if let Some(path) = &args.output {
        export(&summary.raw, path)?;
        let corrected = corrected_path(path);
        export(&summary.corrected, &corrected)?;
        println!("Exported {} and {}", path.display(), corrected.display());
    }

    let model = ReportModel::from_summary(&summary);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&model).context("serializing report model")?
        );
    }

    if args.serve {
        let bridge = ReportBridge::new();
        bridge.publish(model);
        let bound = bridge.serve(workflow_config.bind)?;
        bridge.publish_status(&format!("HTTP bridge on http://{} (Ctrl+C to stop)...", bound));
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
