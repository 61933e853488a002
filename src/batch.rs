//! Time-windowed batching on top of [`RingBuffer`].

use crate::buffer::RingBuffer;
use crate::config::BatchConfig;
use crate::stage::{Stage, StageContext};
use crossbeam::channel;
use crossbeam::select;
use std::ops::ControlFlow;
use tracing::{debug, warn};

/// Buffers upstream tokens and forwards them in bursts.
///
/// Every loop iteration races three events: an upstream token (pushed into
/// the ring, evicting the oldest on overflow), the flush window elapsing
/// (the ring is drained and forwarded in arrival order) and cancellation.
/// The window timer is created fresh on every iteration, so a token arrival
/// or a slow downstream pushes the next flush back.
///
/// On cancellation the stage exits without flushing; whatever is still
/// buffered is counted as discarded.
pub struct BatchStage<T> {
    name: String,
    config: BatchConfig,
    buffer: RingBuffer<T>,
}

impl<T> BatchStage<T> {
    pub fn new(name: impl Into<String>, config: BatchConfig) -> Self {
        Self {
            name: name.into(),
            config,
            buffer: RingBuffer::new(config.size),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Shared handle to the stage's ring buffer
    pub fn buffer(&self) -> RingBuffer<T> {
        self.buffer.clone()
    }

    fn flush(&self, ctx: &StageContext<T>) -> ControlFlow<()> {
        let Some(batch) = self.buffer.drain() else {
            return ControlFlow::Continue(());
        };

        debug!(stage = %self.name, count = batch.len(), "flushing buffered values");
        ctx.metrics().record_flush();

        let total = batch.len();
        for (sent, value) in batch.into_iter().enumerate() {
            if ctx.send(value).is_break() {
                let lost = (total - sent) as u64;
                warn!(stage = %self.name, lost, "flush interrupted by shutdown");
                ctx.metrics().record_discarded(lost);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn discard_pending(&self, ctx: &StageContext<T>) {
        let pending = self.buffer.len();
        if pending > 0 {
            warn!(stage = %self.name, pending, "discarding buffered values on shutdown");
            ctx.metrics().record_discarded(pending as u64);
        }
    }
}

impl<T: Send + 'static> Stage<T> for BatchStage<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, ctx: StageContext<T>) {
        debug!(
            stage = %self.name,
            size = self.config.size,
            interval_ms = self.config.interval.as_millis() as u64,
            "batch stage started"
        );

        loop {
            let window = channel::after(self.config.interval);
            select! {
                recv(ctx.input()) -> msg => match msg {
                    Ok(value) => {
                        self.buffer.push(value);
                        ctx.metrics().set_evicted(self.buffer.evicted_count());
                        ctx.metrics().record_received();
                    }
                    Err(_) => {
                        self.discard_pending(&ctx);
                        break;
                    }
                },
                recv(window) -> _ => {
                    if self.flush(&ctx).is_break() {
                        break;
                    }
                },
                recv(ctx.cancel().receiver()) -> _ => {
                    self.discard_pending(&ctx);
                    break;
                },
            }
        }

        debug!(stage = %self.name, "batch stage stopped");
    }
}
