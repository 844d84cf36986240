//! Fixed-size async worker pool over a bounded job channel
//!
//! Both crawler pools are instances of this: `workers` tokio tasks share one
//! receiver and loop until the channel closes or the shutdown signal fires.
//! Jobs still queued when the last worker exits are dropped with the
//! receiver. Each job runs in its own task, so a panicking job is logged
//! and the worker moves on to the next one.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

pub(crate) struct WorkerPool<J> {
    name: &'static str,
    sender: Mutex<Option<mpsc::Sender<J>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Spawns `workers` tasks that feed every received job to `handler`
    ///
    /// Must be called from inside a tokio runtime.
    pub(crate) fn spawn<F, Fut>(
        name: &'static str,
        workers: usize,
        capacity: usize,
        shutdown: watch::Receiver<bool>,
        handler: F,
    ) -> Self
    where
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let handler = Arc::new(handler);

        let handles = (0..workers)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let handler = Arc::clone(&handler);
                let mut shutdown = shutdown.clone();

                tokio::spawn(async move {
                    tracing::trace!("{} worker {} started", name, id);

                    loop {
                        let job = tokio::select! {
                            biased;
                            _ = shutdown.changed() => break,
                            job = async { receiver.lock().await.recv().await } => job,
                        };

                        let Some(job) = job else { break };
                        if let Err(e) = AbortOnDrop::spawn((*handler)(job)).join().await {
                            if e.is_panic() {
                                tracing::error!("{} worker {}: job panicked", name, id);
                            }
                        }
                    }

                    tracing::trace!("{} worker {} stopped", name, id);
                })
            })
            .collect();

        Self {
            name,
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
        }
    }

    /// Queues a job, waiting for room in the channel
    ///
    /// Returns the job back if the pool no longer accepts work.
    pub(crate) async fn submit(&self, job: J) -> Result<(), J> {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            return Err(job);
        };

        sender.send(job).await.map_err(|e| e.0)
    }

    /// Stops accepting jobs; workers exit once the queue drains
    pub(crate) fn close_queue(&self) {
        self.sender.lock().take();
    }

    /// Waits for the workers until `deadline`, aborting any still running
    ///
    /// Returns the number of workers that had to be aborted.
    pub(crate) async fn join(&self, deadline: Instant) -> usize {
        let handles = std::mem::take(&mut *self.handles.lock());
        let mut aborted = 0;

        for mut handle in handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                aborted += 1;
            }
        }

        if aborted > 0 {
            tracing::warn!("{} pool: aborted {} unresponsive workers", self.name, aborted);
        }

        aborted
    }

    /// Aborts every worker without waiting
    pub(crate) fn abort(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

/// A spawned task that is aborted when its handle is dropped
///
/// Aborting a worker therefore also stops the job it was waiting on.
pub(crate) struct AbortOnDrop<T>(JoinHandle<T>);

impl<T: Send + 'static> AbortOnDrop<T> {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }

    pub(crate) async fn join(mut self) -> Result<T, JoinError> {
        (&mut self.0).await
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
