//! Drives the batch pipeline from a fixed console transcript
//!
//! Pipeline:
//! 1. Source: parses the scripted lines, skipping anything that is not an integer
//! 2. Filter: drops negative numbers
//! 3. Filter: drops zero and numbers that are not multiples of 3
//! 4. Buffer: batches survivors in a ring buffer of 3, flushing every 500ms
//!
//! Usage: cargo run --example batch_console --release

use batch_pipeline::{ConsoleSink, ConsoleSource, PipelineBuilder};
use std::io::{self, Cursor};
use std::time::{Duration, Instant};

const TRANSCRIPT: &str = "5\n-2\n9\n0\n12\nabc\n6\n15\n-30\n18\n21\nexit\n";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Batch Pipeline Demo");
    println!("===================");
    println!();

    let start = Instant::now();

    let mut pipeline = PipelineBuilder::new()
        .buffer_size(3)
        .flush_interval(Duration::from_millis(500))
        .build()?;

    // Discard the source's prompts so only pipeline output is shown.
    let (source, source_handle) = ConsoleSource::new(Cursor::new(TRANSCRIPT), io::sink()).spawn()?;
    let running = pipeline.start(source)?;

    let mut sink = ConsoleSink::new(io::stdout());
    let received = sink.consume(&running.output())?;

    let summary = running.metrics_summary();
    running.wait()?;
    let report = source_handle
        .join()
        .map_err(|_| "console source panicked")??;

    println!("\n=== Final Results ===");
    println!("Lines accepted: {}, rejected: {}", report.accepted, report.invalid);
    println!("Values received: {received}");
    print!("{summary}");
    println!("Pipeline execution time: {:.3}s", start.elapsed().as_secs_f64());

    Ok(())
}
