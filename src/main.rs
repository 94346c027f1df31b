//! Interactive console front end for the batch pipeline

use anyhow::{anyhow, Result};
use batch_pipeline::{
    ConsoleSink, ConsoleSource, PipelineBuilder, PipelineConfig, DEFAULT_BUFFER_SIZE,
    DEFAULT_SENTINEL,
};
use clap::Parser;
use std::io::{self, BufReader};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filters integers read from stdin and batches the survivors through a ring buffer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ring-buffer capacity
    #[arg(long, env = "PIPELINE_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Flush timer period in milliseconds
    #[arg(long, env = "PIPELINE_FLUSH_INTERVAL_MS", default_value_t = 30_000)]
    flush_interval_ms: u64,

    /// Token that ends input (case-insensitive)
    #[arg(long, default_value = DEFAULT_SENTINEL)]
    sentinel: String,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn config(&self) -> PipelineConfig {
        PipelineConfig::new(
            self.buffer_size,
            Duration::from_millis(self.flush_interval_ms),
        )
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("batch_pipeline={}", args.log_level))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = args.config();
    let mut pipeline = PipelineBuilder::new().config(config).build()?;

    println!("=== INTEGER BATCH PIPELINE ===");
    println!(
        "Settings: buffer size={}, flush interval={:?}",
        config.buffer_size, config.flush_interval
    );
    println!("Stages:");
    println!("1. Reject negative numbers");
    println!("2. Reject numbers that are zero or not multiples of 3");
    println!("3. Ring-buffer batching with periodic flush");
    println!("==============================\n");
    info!(version = batch_pipeline::VERSION, "starting pipeline");

    let (source, source_handle) = ConsoleSource::new(BufReader::new(io::stdin()), io::stdout())
        .with_sentinel(args.sentinel.as_str())
        .spawn()?;
    let running = pipeline.start(source)?;

    let mut sink = ConsoleSink::new(io::stdout());
    sink.consume(&running.output())?;

    let summary = running.metrics_summary();
    running.wait()?;
    let report = source_handle
        .join()
        .map_err(|_| anyhow!("console source panicked"))??;

    info!(
        accepted = report.accepted,
        invalid = report.invalid,
        "console source report"
    );
    info!("{}", summary.trim_end());
    println!("Program finished!");
    Ok(())
}
