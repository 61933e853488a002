//! A staged integer pipeline fed from the console.
//!
//! Tokens flow through a chain of stages, each on its own thread, linked by
//! zero-capacity channels so every handoff is synchronous. The stock console
//! pipeline drops non-positive values, keeps multiples of three and batches
//! the survivors in a ring buffer that is flushed on a fixed window.
//!
//! # Features
//!
//! - Ring buffer that evicts its oldest entry on overflow and drains atomically
//! - Generic predicate stages and a time-windowed batching stage
//! - One write-once cancellation signal observed at every blocking point
//! - Per-stage counters: received, forwarded, dropped, evicted, discarded
//!
//! # Example
//!
//! ```no_run
//! use crossbeam::channel::unbounded;
//! use ring_pipeline::{LogSink, PipelineBuilder, PipelineConfig};
//! use std::{thread, time::Duration};
//!
//! let (tx, rx) = unbounded();
//! let pipeline = PipelineBuilder::console(&PipelineConfig::default()).build()?;
//! let running = pipeline.start(rx)?;
//!
//! for v in [5, -3, 9, 2, 12] {
//!     tx.send(v).unwrap();
//! }
//!
//! // The source stays open, so 9 and 12 are logged when the 30s window
//! // closes. A finite source would cancel on exhaustion and the buffered
//! // values would be discarded instead.
//! let stop = running.signal();
//! thread::spawn(move || {
//!     thread::sleep(Duration::from_secs(31));
//!     stop.cancel();
//! });
//!
//! let report = running.run_sink(LogSink::new())?;
//! println!("{}", report.summary());
//! # Ok::<(), ring_pipeline::PipelineError>(())
//! ```

pub mod batch;
pub mod buffer;
pub mod config;
pub mod console;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod signal;
pub mod stage;

// Re-exports for convenience
pub use batch::BatchStage;
pub use buffer::RingBuffer;
pub use config::{BatchConfig, PipelineConfig};
pub use console::{parse_line, ConsoleSource, Line, LogSink, Sink};
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineReport, RunningPipeline};
pub use signal::CancellationSignal;
pub use stage::{multiple_of_filter, positive_filter, FilterStage, Stage, StageContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
