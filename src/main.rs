//! texbridge CLI
//!
//! Converts a glTF/GLB asset, writing its textures to a `textures/` directory
//! next to the output and embedding them in the exported file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use texbridge::{ConversionDriver, ConversionReport, DriverConfig};
use texbridge_gltf::GltfEngine;
use texbridge_textures::MaterializationOutcome;

/// texbridge - asset conversion with texture normalization
#[derive(Parser)]
#[command(name = "texbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input asset (.glb or .gltf)
    input: PathBuf,

    /// Output asset (.glb or .gltf)
    output: PathBuf,

    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON driver configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the texture directory created next to the output
    #[arg(long)]
    texture_dir: Option<String>,

    /// Skip packing resources before export
    #[arg(long)]
    no_pack: bool,

    /// Report format printed on success
    #[arg(long, default_value = "text")]
    report: ReportFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .with_thread_ids(verbosity >= 3)
        .with_file(verbosity >= 3)
        .with_line_number(verbosity >= 3)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<texbridge::Error>().and_then(texbridge::Error::kind) {
                Some(kind) => eprintln!("error: {}: {:#}", kind, err),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => DriverConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DriverConfig::default(),
    };
    if let Some(name) = cli.texture_dir {
        config.texture_dir_name = name;
    }
    if cli.no_pack {
        config.pack_resources = false;
    }

    let mut driver = ConversionDriver::with_config(GltfEngine::new(), config);
    let report = driver.run(&cli.input, &cli.output)?;

    match cli.report {
        ReportFormat::Text => print_text_report(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn print_text_report(report: &ConversionReport) {
    println!("Output: {}", report.output.display());
    println!(
        "Textures: {} of {} written to {}",
        report.written(),
        report.records.len(),
        report.texture_dir.display()
    );

    for record in &report.records {
        match &record.outcome {
            MaterializationOutcome::Succeeded => {
                println!("  {:<32} {} ({})", record.file_name, record.encoding, record.image_name);
            }
            MaterializationOutcome::SkippedInvalid { reason } => {
                println!("  {:<32} skipped: {}", record.file_name, reason);
            }
            MaterializationOutcome::Failed { reason } => {
                println!("  {:<32} failed: {}", record.file_name, reason);
            }
        }
    }

    if report.has_warnings() {
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }
}
