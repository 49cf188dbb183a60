//! Bounded FIFO hand-off between a sample source and the pipeline driver.
//!
//! Backpressure policy: **block**. When the channel holds `capacity` samples,
//! [`SampleSender::push`] waits and [`SampleSender::blocking_push`] parks the
//! producer thread until the consumer frees a slot. [`SampleSender::try_push`]
//! never waits and hands the sample back instead.
//!
//! Closure policy: **drain-on-close**. Once the channel is closed no new sample
//! is accepted, but samples already queued are still delivered in order before
//! [`SampleReceiver::pop`] reports closure with `None`.
//!
//! The channel is built on `tokio::sync::mpsc`, which does not depend on a
//! particular executor.

use crate::error::PushError;
use crate::types::Sample;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Create an ingestion channel buffering at most `capacity` samples.
///
/// A zero capacity is raised to one.
///
/// # Example
/// ```
/// use fusion_trail::{Sample, ingest};
///
/// let (tx, mut rx) = ingest::channel(4);
/// tx.try_push(Sample::new(0, [0.0, 0.0, 1.0], [0.0; 3])).unwrap();
/// drop(tx);
///
/// assert_eq!(rx.blocking_pop().map(|s| s.timestamp), Some(0));
/// assert!(rx.blocking_pop().is_none());
/// ```
pub fn channel(capacity: usize) -> (SampleSender, SampleReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (SampleSender { tx }, SampleReceiver { rx })
}

/// Producer side of the ingestion channel. Cloning adds a producer; the channel
/// closes when every producer is dropped or the receiver closes it.
#[derive(Debug, Clone)]
pub struct SampleSender {
    tx: mpsc::Sender<Sample>,
}

impl SampleSender {
    /// Queue a sample, waiting for capacity when the channel is full
    pub async fn push(&self, sample: Sample) -> Result<(), PushError> {
        self.tx
            .send(sample)
            .await
            .map_err(|rejected| PushError::Closed(rejected.0))
    }

    /// Queue a sample from a synchronous producer thread, parking while full.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context; use
    /// [`push`](Self::push) there.
    pub fn blocking_push(&self, sample: Sample) -> Result<(), PushError> {
        self.tx
            .blocking_send(sample)
            .map_err(|rejected| PushError::Closed(rejected.0))
    }

    /// Queue a sample only if a slot is free right now
    pub fn try_push(&self, sample: Sample) -> Result<(), PushError> {
        self.tx.try_send(sample).map_err(|err| match err {
            TrySendError::Full(sample) => PushError::Full(sample),
            TrySendError::Closed(sample) => PushError::Closed(sample),
        })
    }

    /// Close this producer's end. The channel closes once every clone is closed.
    pub fn close(self) {
        drop(self);
    }

    /// Whether the consumer has closed or dropped its end
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free slots at this moment
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer side of the ingestion channel, owned by the pipeline driver
#[derive(Debug)]
pub struct SampleReceiver {
    rx: mpsc::Receiver<Sample>,
}

impl SampleReceiver {
    /// Wait for the next sample. `None` once the channel is closed and drained.
    pub async fn pop(&mut self) -> Option<Sample> {
        self.rx.recv().await
    }

    /// Blocking variant of [`pop`](Self::pop) for a consumer running on its own thread
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_pop(&mut self) -> Option<Sample> {
        self.rx.blocking_recv()
    }

    /// Refuse further samples. Queued samples can still be popped.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
