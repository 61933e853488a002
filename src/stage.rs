use crate::metrics::StageMetrics;
use crate::signal::CancellationSignal;
use crossbeam::channel::{Receiver, Sender};
use crossbeam::select;
use std::ops::ControlFlow;
use tracing::debug;

/// A processing stage in the pipeline.
///
/// Each stage runs on its own thread and owns its loop: it pulls tokens from
/// `ctx`, pushes results back through `ctx`, and returns once cancellation is
/// observed or upstream disconnects.
pub trait Stage<T>: Send + 'static {
    /// Get a human-readable name for this stage
    fn name(&self) -> &str;

    /// Run the stage until shutdown
    fn run(self: Box<Self>, ctx: StageContext<T>);
}

/// Channels, cancellation and metrics handed to a running stage
pub struct StageContext<T> {
    input: Receiver<T>,
    output: Sender<T>,
    cancel: CancellationSignal,
    metrics: StageMetrics,
}

impl<T> StageContext<T> {
    pub fn new(
        input: Receiver<T>,
        output: Sender<T>,
        cancel: CancellationSignal,
        metrics: StageMetrics,
    ) -> Self {
        Self {
            input,
            output,
            cancel,
            metrics,
        }
    }

    pub fn input(&self) -> &Receiver<T> {
        &self.input
    }

    pub fn cancel(&self) -> &CancellationSignal {
        &self.cancel
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Wait for the next upstream token.
    ///
    /// Returns `None` once cancellation fires or every upstream sender is gone.
    pub fn recv(&self) -> Option<T> {
        select! {
            recv(self.input) -> msg => match msg {
                Ok(value) => {
                    self.metrics.record_received();
                    Some(value)
                }
                Err(_) => None,
            },
            recv(self.cancel.receiver()) -> _ => None,
        }
    }

    /// Hand a token downstream, suspending until the next stage takes it.
    ///
    /// Breaks if cancellation fires first or downstream has gone away.
    pub fn send(&self, value: T) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        select! {
            send(self.output, value) -> res => match res {
                Ok(()) => {
                    self.metrics.record_forwarded();
                    ControlFlow::Continue(())
                }
                Err(_) => ControlFlow::Break(()),
            },
            recv(self.cancel.receiver()) -> _ => ControlFlow::Break(()),
        }
    }
}

/// A filtering stage that passes through items matching a predicate
#[derive(Debug)]
pub struct FilterStage<T, F>
where
    F: Fn(&T) -> bool + Send + 'static,
{
    name: String,
    predicate: F,
    _token: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> FilterStage<T, F>
where
    F: Fn(&T) -> bool + Send + 'static,
{
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
            _token: std::marker::PhantomData,
        }
    }

    /// Check a single token against the predicate
    pub fn accepts(&self, value: &T) -> bool {
        (self.predicate)(value)
    }
}

impl<T, F> Stage<T> for FilterStage<T, F>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, ctx: StageContext<T>) {
        debug!(stage = %self.name, "filter stage started");
        while let Some(value) = ctx.recv() {
            if !self.accepts(&value) {
                ctx.metrics().record_dropped();
                continue;
            }
            if ctx.send(value).is_break() {
                break;
            }
        }
        debug!(stage = %self.name, "filter stage stopped");
    }
}

/// Keeps strictly positive values; zero and negatives are dropped
pub fn positive_filter() -> FilterStage<i64, impl Fn(&i64) -> bool + Send + 'static> {
    FilterStage::new("positive", |v: &i64| *v > 0)
}

/// Keeps exact multiples of `divisor`; a zero divisor keeps nothing
pub fn multiple_of_filter(
    divisor: i64,
) -> FilterStage<i64, impl Fn(&i64) -> bool + Send + 'static> {
    FilterStage::new(format!("multiple_of_{divisor}"), move |v: &i64| {
        v.checked_rem(divisor) == Some(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{bounded, unbounded};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_positive_filter() {
        let stage = positive_filter();
        assert!(stage.accepts(&1));
        assert!(stage.accepts(&i64::MAX));
        assert!(!stage.accepts(&0));
        assert!(!stage.accepts(&-3));
        assert!(!stage.accepts(&i64::MIN));
    }

    #[test]
    fn test_multiple_of_three_filter() {
        let stage = multiple_of_filter(3);
        assert_eq!(stage.name(), "multiple_of_3");
        for v in -12..=12 {
            assert_eq!(stage.accepts(&v), v % 3 == 0, "value {v}");
        }
    }

    #[test]
    fn test_zero_divisor_keeps_nothing() {
        let stage = multiple_of_filter(0);
        assert!(!stage.accepts(&0));
        assert!(!stage.accepts(&9));
    }

    #[test]
    fn test_filter_stage_forwards_in_order() {
        let (in_tx, in_rx) = bounded(0);
        let (out_tx, out_rx) = bounded(0);
        let cancel = CancellationSignal::new();
        let metrics = StageMetrics::new();
        let ctx = StageContext::new(in_rx, out_tx, cancel.clone(), metrics.clone());

        let worker = thread::spawn(move || Box::new(positive_filter()).run(ctx));

        let feeder = thread::spawn(move || {
            for v in [5, -3, 9, 0, 2, 12] {
                in_tx.send(v).unwrap();
            }
        });

        let forwarded: Vec<i64> = (0..4).map(|_| out_rx.recv().unwrap()).collect();
        assert_eq!(forwarded, vec![5, 9, 2, 12]);

        feeder.join().unwrap();
        cancel.cancel();
        worker.join().unwrap();

        assert_eq!(metrics.total_received(), 6);
        assert_eq!(metrics.total_forwarded(), 4);
        assert_eq!(metrics.total_dropped(), 2);
    }

    #[test]
    fn test_filter_stage_stops_while_blocked_on_send() {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = bounded::<i64>(0);
        let cancel = CancellationSignal::new();
        let ctx = StageContext::new(in_rx, out_tx, cancel.clone(), StageMetrics::new());

        in_tx.send(3).unwrap();
        let worker = thread::spawn(move || Box::new(positive_filter()).run(ctx));

        // Nobody reads `out_rx`, so the stage is parked on its send.
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
        worker.join().unwrap();
        assert!(out_rx.try_recv().is_err());
    }

    #[test]
    fn test_filter_stage_stops_on_upstream_disconnect() {
        let (in_tx, in_rx) = bounded::<i64>(0);
        let (out_tx, _out_rx) = bounded(0);
        let ctx = StageContext::new(in_rx, out_tx, CancellationSignal::new(), StageMetrics::new());

        let worker = thread::spawn(move || Box::new(multiple_of_filter(3)).run(ctx));
        drop(in_tx);
        worker.join().unwrap();
    }
}
