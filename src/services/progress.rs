use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};

/// Receives coarse percentage updates while a story is being generated.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, percent: u8) {
        self(percent)
    }
}

/// Forwards checkpoints to an optional sink, clamped to 100 and never moving backwards.
pub(crate) struct Checkpoints<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last: u8,
}

impl<'a> Checkpoints<'a> {
    pub(crate) fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink, last: 0 }
    }

    pub(crate) fn reach(&mut self, percent: u8) {
        let percent = percent.min(100).max(self.last);
        self.last = percent;
        tracing::debug!(percent, "generation progress");
        if let Some(sink) = self.sink {
            sink.report(percent);
        }
    }
}

/// Caller-side progress value. Returns to 0 once a tracked generation finishes,
/// however it finishes, so the next run starts clean.
#[derive(Debug, Default)]
pub struct ProgressGauge {
    value: AtomicU8,
}

impl ProgressGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }

    pub async fn track<F: Future>(&self, fut: F) -> F::Output {
        let _reset = ResetOnDrop(&self.value);
        fut.await
    }
}

impl ProgressSink for ProgressGauge {
    fn report(&self, percent: u8) {
        self.value.store(percent, Ordering::Relaxed);
    }
}

struct ResetOnDrop<'a>(&'a AtomicU8);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(0, Ordering::Relaxed);
    }
}
