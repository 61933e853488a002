//! Console front end: reads integers from stdin until `Exit`.

use std::io::{self, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ring_pipeline::{ConsoleSource, LogSink, PipelineBuilder, PipelineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PipelineConfig::from_env()?;
    info!(
        buffer_capacity = config.batch.size,
        flush_interval_secs = config.batch.interval.as_secs(),
        version = ring_pipeline::VERSION,
        "starting pipeline, type integers or `exit`"
    );

    let pipeline = PipelineBuilder::console(&config).build()?;
    let source = ConsoleSource::new(BufReader::new(io::stdin()));
    let report = pipeline.run(source, LogSink::new())?;

    info!("{}", report.summary().trim_end());
    Ok(())
}
