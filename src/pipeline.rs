use crate::batch::BatchStage;
use crate::config::{BatchConfig, PipelineConfig};
use crate::console::Sink;
use crate::error::{PipelineError, Result};
use crate::metrics::{MetricsSnapshot, StageMetrics};
use crate::signal::CancellationSignal;
use crate::stage::{multiple_of_filter, positive_filter, FilterStage, Stage, StageContext};
use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::select;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builder holding the ordered list of stages to wire together
pub struct PipelineBuilder<T> {
    stages: Vec<Box<dyn Stage<T>>>,
    invalid: Option<PipelineError>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            invalid: None,
        }
    }

    /// Append any stage implementation
    pub fn stage(mut self, stage: impl Stage<T>) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append a stage that forwards only tokens matching `predicate`
    pub fn filter<F>(self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + 'static,
    {
        self.stage(FilterStage::new(name, predicate))
    }

    /// Append a ring-buffered batching stage
    pub fn batch(mut self, name: impl Into<String>, config: BatchConfig) -> Self {
        if let Err(e) = config.validate() {
            self.invalid = self.invalid.or(Some(e));
        }
        self.stage(BatchStage::new(name, config))
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline<T>> {
        if let Some(e) = self.invalid {
            return Err(e);
        }
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }

        let metrics = self.stages.iter().map(|_| StageMetrics::new()).collect();
        Ok(Pipeline {
            stages: self.stages,
            metrics,
        })
    }
}

impl PipelineBuilder<i64> {
    /// Positive filter, multiple-of-three filter, then the batcher
    pub fn console(config: &PipelineConfig) -> Self {
        Self::new()
            .stage(positive_filter())
            .stage(multiple_of_filter(3))
            .batch("batch", config.batch)
    }
}

impl<T: Send + 'static> Default for PipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A processing pipeline that chains stages together
pub struct Pipeline<T> {
    stages: Vec<Box<dyn Stage<T>>>,
    metrics: Vec<StageMetrics>,
}

impl<T: Send + 'static> Pipeline<T> {
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Get metrics for a specific stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Wire every channel, then spawn the stages and a thread feeding `source`
    /// into the first stage.
    ///
    /// Exhausting the source fires the cancellation signal.
    pub fn start<I>(self, source: I) -> Result<RunningPipeline<T>>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let cancel = CancellationSignal::new();

        let (source_tx, mut upstream) = bounded::<T>(0);
        let mut links = Vec::with_capacity(self.stages.len());
        for _ in &self.stages {
            let (tx, rx) = bounded(0);
            links.push((upstream, tx));
            upstream = rx;
        }

        let (done_tx, done_rx) = bounded(1);
        let mut running = RunningPipeline {
            output: upstream,
            cancel: cancel.clone(),
            workers: Vec::with_capacity(self.stages.len()),
            source: None,
            source_done: done_rx,
            metrics: Vec::with_capacity(self.stages.len()),
        };

        for ((stage, (input, output)), metrics) in
            self.stages.into_iter().zip(links).zip(self.metrics)
        {
            let name = stage.name().to_string();
            let ctx = StageContext::new(input, output, cancel.clone(), metrics.clone());
            // On error `running` is dropped, which cancels the threads already started.
            let handle = thread::Builder::new()
                .name(format!("stage-{name}"))
                .spawn(move || stage.run(ctx))
                .map_err(|e| PipelineError::ThreadError(e.to_string()))?;
            running.workers.push((name.clone(), handle));
            running.metrics.push((name, metrics));
        }

        let source = source.into_iter();
        let handle = thread::Builder::new()
            .name("source".into())
            .spawn(move || feed(source, source_tx, cancel, done_tx))
            .map_err(|e| PipelineError::ThreadError(e.to_string()))?;
        running.source = Some(handle);

        info!(stages = running.workers.len(), "pipeline started");
        Ok(running)
    }

    /// Start the pipeline and consume its output until shutdown
    pub fn run<I, S>(self, source: I, sink: S) -> Result<PipelineReport>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        S: Sink<T>,
    {
        self.start(source)?.run_sink(sink)
    }
}

/// How long `run_sink` waits for the source to report before detaching it
const SOURCE_JOIN_GRACE: Duration = Duration::from_millis(100);

/// Forward `source` into the first stage, then fire cancellation.
///
/// The produced count is published on `done` before cancelling so the
/// orchestrator knows the thread is about to return.
fn feed<T>(
    source: impl Iterator<Item = T>,
    output: Sender<T>,
    cancel: CancellationSignal,
    done: Sender<u64>,
) {
    let mut produced = 0;
    for value in source {
        if cancel.is_cancelled() {
            break;
        }
        let delivered = select! {
            send(output, value) -> res => res.is_ok(),
            recv(cancel.receiver()) -> _ => false,
        };
        if !delivered {
            break;
        }
        produced += 1;
    }
    debug!(produced, "source finished");
    let _ = done.send(produced);
    cancel.cancel();
}

/// A running pipeline that can be drained, cancelled and joined
pub struct RunningPipeline<T> {
    output: Receiver<T>,
    cancel: CancellationSignal,
    workers: Vec<(String, JoinHandle<()>)>,
    source: Option<JoinHandle<()>>,
    source_done: Receiver<u64>,
    metrics: Vec<(String, StageMetrics)>,
}

impl<T> RunningPipeline<T> {
    /// Fire the shared cancellation signal
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle to the shared cancellation signal
    pub fn signal(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    /// Get metrics for a stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index).map(|(_, m)| m)
    }

    /// Hand every token leaving the last stage to `sink` until cancellation,
    /// then join the workers.
    pub fn run_sink(mut self, mut sink: impl Sink<T>) -> Result<PipelineReport> {
        let mut delivered = 0;
        loop {
            select! {
                recv(self.output) -> msg => match msg {
                    Ok(value) => {
                        sink.consume(value);
                        delivered += 1;
                    }
                    Err(_) => break,
                },
                recv(self.cancel.receiver()) -> _ => break,
            }
        }

        self.cancel.cancel();
        info!(delivered, "pipeline shutting down");

        let mut failure = None;
        for (name, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!(stage = %name, "stage thread panicked");
                failure = failure.or(Some(PipelineError::ThreadError(format!(
                    "stage {name} panicked"
                ))));
            }
        }

        // A source that has not reported within the grace period is still
        // blocked on input (e.g. a console read) and is detached.
        let produced = match (
            self.source_done.recv_timeout(SOURCE_JOIN_GRACE),
            self.source.take(),
        ) {
            (Ok(produced), Some(handle)) => {
                if handle.join().is_err() {
                    failure = failure.or(Some(PipelineError::ThreadError("source panicked".into())));
                }
                Some(produced)
            }
            (Ok(produced), None) => Some(produced),
            (Err(_), _) => {
                debug!("source still running, detaching");
                None
            }
        };

        if let Some(e) = failure {
            return Err(e);
        }

        Ok(PipelineReport {
            produced,
            delivered,
            stages: self
                .metrics
                .iter()
                .map(|(name, m)| (name.clone(), m.snapshot()))
                .collect(),
        })
    }
}

impl<T> Drop for RunningPipeline<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Outcome of a finished pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Tokens the source handed to the first stage, or `None` if the source
    /// was still blocked on input at shutdown and had to be detached
    pub produced: Option<u64>,
    /// Tokens consumed by the sink
    pub delivered: u64,
    pub stages: Vec<(String, MetricsSnapshot)>,
}

impl PipelineReport {
    /// Get a summary of all metrics
    pub fn summary(&self) -> String {
        let mut summary = format!("Pipeline delivered {} value(s)\n", self.delivered);
        for (i, (name, snapshot)) in self.stages.iter().enumerate() {
            summary.push_str(&format!("  Stage {i} ({name}): {}\n", snapshot.format()));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Never reads its input, exits once cancelled
    struct Stalled;

    impl Stage<i64> for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        fn run(self: Box<Self>, ctx: StageContext<i64>) {
            let _ = ctx.cancel().receiver().recv();
        }
    }

    #[test]
    fn test_pipeline_builder() {
        let pipeline = PipelineBuilder::<i64>::new()
            .filter("even", |v| v % 2 == 0)
            .batch("batch", BatchConfig::new(4, Duration::from_millis(10)))
            .build()
            .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["even", "batch"]);
        assert!(pipeline.stage_metrics(1).is_some());
        assert!(pipeline.stage_metrics(2).is_none());
    }

    #[test]
    fn test_no_stages_error() {
        let result = PipelineBuilder::<i64>::new().build();
        assert!(matches!(result, Err(PipelineError::NoStages)));
    }

    #[test]
    fn test_invalid_batch_config_error() {
        let result = PipelineBuilder::<i64>::new()
            .batch("batch", BatchConfig::new(0, Duration::from_secs(1)))
            .build();
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_console_topology() {
        let pipeline = PipelineBuilder::console(&PipelineConfig::default())
            .build()
            .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["positive", "multiple_of_3", "batch"]);
    }

    #[test]
    fn test_filters_only_pipeline_delivers_directly() {
        let pipeline = PipelineBuilder::<i64>::new()
            .stage(positive_filter())
            .build()
            .unwrap();

        let running = pipeline.start(Vec::<i64>::new()).unwrap();
        let report = running.run_sink(|_: i64| {}).unwrap();
        assert_eq!(report.delivered, 0);
    }

    #[test]
    fn test_dropping_running_pipeline_cancels() {
        let pipeline = PipelineBuilder::<i64>::new()
            .batch("batch", BatchConfig::new(4, Duration::from_secs(3600)))
            .build()
            .unwrap();
        let (_tx, rx) = crossbeam::channel::unbounded::<i64>();
        let running = pipeline.start(rx.into_iter()).unwrap();
        let signal = running.signal();
        drop(running);
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_source_blocked_on_send_is_joined_after_cancel() {
        let pipeline = PipelineBuilder::<i64>::new().stage(Stalled).build().unwrap();
        let running = pipeline.start(0i64..).unwrap();
        running.cancel();

        let report = running.run_sink(|_: i64| {}).unwrap();
        assert_eq!(report.produced, Some(0));
        assert_eq!(report.delivered, 0);
    }

    #[test]
    fn test_report_summary() {
        let report = PipelineReport {
            produced: Some(3),
            delivered: 2,
            stages: vec![("batch".into(), StageMetrics::new().snapshot())],
        };
        let summary = report.summary();
        assert!(summary.starts_with("Pipeline delivered 2 value(s)"));
        assert!(summary.contains("Stage 0 (batch)"));
    }
}
