// crates/noisecc/src/main.rs

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use noisecc_core::config::{load_catalog, PipelineConfig};
use noisecc_core::pipelines::PipelineRunner;
use noisecc_core::report::{RunReport, StageReport};

/// Ambient-noise cross-correlation pipeline.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration (TOML).
    #[arg(short, long, default_value = "pipeline.toml")]
    config: PathBuf,

    /// Station and event catalog (TOML).
    #[arg(long, default_value = "catalog.toml")]
    catalog: PathBuf,

    /// Write a JSON run report to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Merge raw segmented recordings into canonical per-event traces.
    Normalize,
    /// Apply the conditioning operator list to every canonical trace.
    Condition,
    /// Apply the processing operator list to every canonical trace.
    Process,
    /// Correlate every station pair in every event.
    Correlate,
    /// Stack per-event correlation products across events.
    Stack,
    /// The full chain: normalize, condition, process, correlate, stack.
    Run,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(failures) => {
            if failures > 0 {
                println!("⚠️  finished with {failures} file-level failure(s)");
            } else {
                println!("✅ finished cleanly");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("ERROR: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<usize> {
    let cli = Cli::parse();

    let config = PipelineConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let catalog = load_catalog(&cli.catalog)
        .with_context(|| format!("loading {}", cli.catalog.display()))?;
    let runner = PipelineRunner::new(config, catalog);

    let mut report = RunReport::new();
    match cli.command {
        Commands::Normalize => report.push(runner.run_normalize()?),
        Commands::Condition => report.push(runner.run_conditioning()?),
        Commands::Process => report.push(runner.run_processing()?),
        Commands::Correlate => report.push(runner.run_correlate()?),
        Commands::Stack => report.push(runner.run_stack()?),
        Commands::Run => report = runner.run_all()?,
    }
    report.finish();

    for stage in &report.stages {
        print_stage(stage);
    }

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("report written to {}", path.display());
    }

    Ok(report.total_failures())
}

fn print_stage(stage: &StageReport) {
    println!(
        "[{}] processed: {}, skipped: {}, failures: {}",
        stage.stage,
        stage.processed,
        stage.skipped,
        stage.failures.len()
    );
    for failure in &stage.failures {
        println!("  ⚠️  {}: {}", failure.subject, failure.error);
    }
    for (tag, count) in &stage.counters {
        println!("  {tag}: {count} event(s)");
    }
}
