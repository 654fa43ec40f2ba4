use anyhow::Context;
use clap::Parser;
use std::process;
use trip_kpi_processor::cli::{Args, setup_logging};
use trip_kpi_processor::error::TripError;
use trip_kpi_processor::processor::{PipelineRun, TripPipeline};

async fn run(args: Args) -> anyhow::Result<PipelineRun> {
    let input_dir = args.resolve_input_dir()?;
    let output_dir = args.resolve_output_dir(&input_dir);

    let pipeline = TripPipeline::new(input_dir, output_dir, args.to_config())
        .context("Invalid configuration")?;
    let run = pipeline
        .run()
        .await
        .with_context(|| format!("Processing {} failed", pipeline.input_dir().display()))?;
    Ok(run)
}

fn main() {
    let args = Args::parse();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    // Create async runtime and run the pipeline with signal handling
    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let discovery_only = args.discovery_only;
    let result = runtime.block_on(async {
        tokio::select! {
            result = run(args) => result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(TripError::processing_interrupted("Processing interrupted by user").into())
            }
        }
    });

    match result {
        Ok(run) if discovery_only || run.stats.has_output() => process::exit(0),
        Ok(_) => {
            eprintln!("Error: no batch was processed successfully");
            process::exit(1);
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
