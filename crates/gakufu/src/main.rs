//! gakufu: CLI front end for the sheet recognition pipeline.
//!
//! Reads a scanned sheet image, drives it through the step catalog up
//! to a target step, and prints a per-system recognition summary.
//! The export document can be written to a file with `--export`.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin gakufu -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gakufu_pipeline::{
    Sheet, StageConfig, Step, StepDriver, StepEvent, StepParam, StepRegistry, StepSink,
};

/// Sheet recognition from scanned images.
///
/// Runs the staged recognition pipeline on a sheet image and reports
/// the systems, measures, and symbols it found.
#[derive(Parser)]
#[command(name = "gakufu", version)]
struct Cli {
    /// Path to the sheet image (PNG, JPEG, BMP, WebP).
    #[arg(required_unless_present = "list_steps")]
    image_path: Option<PathBuf>,

    /// Target step to reach.
    #[arg(long, default_value_t = Step::Score)]
    until: Step,

    /// Write the export document to this file (implies `--until export`).
    #[arg(long)]
    export: Option<PathBuf>,

    /// Fixed binarization threshold (0-255); by default one is picked
    /// per sheet with Otsu's method.
    #[arg(long)]
    threshold: Option<u8>,

    /// Full stage config as a JSON string.
    ///
    /// When provided, the other stage parameter flags are ignored. The
    /// JSON must be a valid `StageConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Suppress per-step progress output.
    #[arg(long, short)]
    quiet: bool,

    /// List the step catalog and exit.
    #[arg(long)]
    list_steps: bool,
}

/// Prints step progress to stderr as the driver works.
struct ConsoleSink;

impl StepSink for ConsoleSink {
    fn on_event(&self, sheet: &str, event: StepEvent) {
        match event {
            StepEvent::Started { step } => eprintln!("[{sheet}] {step}..."),
            StepEvent::Completed { step, elapsed } => {
                eprintln!("[{sheet}] {step} done in {elapsed:.2?}");
            }
            StepEvent::Failed { step, message } => {
                eprintln!("[{sheet}] {step} FAILED: {message}");
            }
            StepEvent::Message(text) => eprintln!("[{sheet}] {text}"),
            StepEvent::Requested { .. } => {}
        }
    }
}

/// Build a [`StageConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<StageConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(StageConfig {
        binarization_threshold: cli.threshold,
        ..StageConfig::default()
    })
}

fn print_step_catalog() {
    for step in Step::ALL {
        let kind = if step.is_mandatory() {
            "mandatory"
        } else {
            "optional "
        };
        println!("{:<12} {kind}  {}", step.name(), step.description());
    }
}

fn print_summary(sheet: &Sheet) {
    let body = sheet.lock();
    let Some(summary) = body.summary.as_ref() else {
        return;
    };
    if let Some(scale) = body.scale {
        println!(
            "interline {:.1} px, line thickness {:.1} px",
            scale.interline(),
            scale.line_thickness(),
        );
    }
    for system in &summary.systems {
        println!(
            "system {}: {} staves, {} measures, {} glyphs ({} clefs, {} dots, {} stems)",
            system.system,
            system.staves,
            system.measures,
            system.glyphs,
            system.clefs,
            system.dots,
            system.stems,
        );
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list_steps {
        print_step_catalog();
        return ExitCode::SUCCESS;
    }
    let Some(ref image_path) = cli.image_path else {
        eprintln!("Error: an image path is required");
        return ExitCode::FAILURE;
    };

    let config = match config_from_cli(&cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let name = image_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("sheet")
        .to_owned();
    let sheet = Sheet::new(name, image_bytes);

    let registry = StepRegistry::standard(config);
    let console = ConsoleSink;
    let null = gakufu_pipeline::NullSink;
    let sink: &dyn StepSink = if cli.quiet { &null } else { &console };
    let driver = StepDriver::new(&registry, sink);

    let target = if cli.export.is_some() {
        Step::Export
    } else {
        cli.until
    };
    let param = cli
        .export
        .clone()
        .map_or(StepParam::None, StepParam::ExportPath);

    if let Err(error) = driver.perform_until(&sheet, target, &param) {
        eprintln!("Error: {error}");
        return ExitCode::FAILURE;
    }

    print_summary(&sheet);

    if let Some(ref export_path) = cli.export {
        let body = sheet.lock();
        let Some(document) = body.export.as_deref() else {
            eprintln!("Error: no export document was produced");
            return ExitCode::FAILURE;
        };
        if let Err(e) = std::fs::write(export_path, document) {
            eprintln!("Error writing {}: {e}", export_path.display());
            return ExitCode::FAILURE;
        }
        eprintln!("Export written to {}", export_path.display());
    }

    ExitCode::SUCCESS
}
