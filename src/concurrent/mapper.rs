//! Fixed-size thread pool that maps a function over a batch
//!
//! Workers pull tasks from one FIFO queue guarded by a mutex and condition
//! variable. Each `map` call allocates one result slot per input and blocks
//! until every slot is filled; results come back in input order no matter
//! which worker ran which task.

use crate::{MapperError, MapperResult};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    tasks: VecDeque<Task>,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// Thread pool for order-preserving parallel maps
pub struct ParallelMapper {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl ParallelMapper {
    /// Starts `threads` worker threads
    ///
    /// # Returns
    ///
    /// * `Ok(ParallelMapper)` - Workers are running
    /// * `Err(MapperError::NoWorkers)` - `threads` was zero
    /// * `Err(MapperError::Spawn)` - The OS refused to start a thread
    pub fn new(threads: usize) -> MapperResult<Self> {
        if threads == 0 {
            return Err(MapperError::NoWorkers);
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        });

        let mapper = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(threads)),
            size: threads,
        };

        for id in 0..threads {
            let shared = Arc::clone(&mapper.shared);
            let handle = thread::Builder::new()
                .name(format!("mapper-worker-{}", id))
                .spawn(move || worker_loop(&shared))
                .map_err(MapperError::Spawn)?;
            mapper.workers.lock().push(handle);
        }

        tracing::debug!("Parallel mapper started with {} workers", threads);
        Ok(mapper)
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.size
    }

    /// Applies `f` to every input in parallel, preserving positions
    ///
    /// Blocks until the whole batch is done. If any application panics, the
    /// rest of the batch is skipped and the first failure (by index) is
    /// returned.
    ///
    /// # Example
    ///
    /// ```
    /// use phased_crawler::ParallelMapper;
    ///
    /// let mapper = ParallelMapper::new(4).unwrap();
    /// let squares = mapper.map(|x: u64| x * x, vec![1, 2, 3]).unwrap();
    /// assert_eq!(squares, vec![1, 4, 9]);
    /// ```
    pub fn map<T, R, F>(&self, f: F, inputs: Vec<T>) -> MapperResult<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let batch = Arc::new(Batch::new(inputs.len()));
        let f = Arc::new(f);

        {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                return Err(MapperError::Closed);
            }

            for (index, input) in inputs.into_iter().enumerate() {
                let slot = SlotWriter {
                    batch: Arc::clone(&batch),
                    index,
                };
                let f = Arc::clone(&f);

                queue.tasks.push_back(Box::new(move || slot.run(|| (*f)(input))));
            }
        }
        self.shared.available.notify_all();

        batch.wait();
        batch.collect()
    }

    /// Stops the workers and waits for them to exit
    ///
    /// Tasks still queued are abandoned; their batches fail with
    /// [`MapperError::Closed`]. Tasks already running finish first. Later
    /// `map` calls are rejected.
    pub fn close(&self) {
        let abandoned = {
            let mut queue = self.shared.queue.lock();
            queue.closed = true;
            std::mem::take(&mut queue.tasks)
        };
        self.shared.available.notify_all();

        if !abandoned.is_empty() {
            tracing::debug!("Abandoning {} queued mapper tasks", abandoned.len());
        }
        drop(abandoned);

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                tracing::warn!("Parallel mapper worker exited with a panic");
            }
        }
    }

    /// Returns true once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }
}

impl Drop for ParallelMapper {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.closed {
                    return;
                }
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                shared.available.wait(&mut queue);
            }
        };

        task();
    }
}

/// Per-call result slots plus the count of unfinished tasks
struct Batch<R> {
    slots: Vec<Mutex<Option<Result<R, MapperError>>>>,
    remaining: Mutex<usize>,
    done: Condvar,
    failed: AtomicBool,
}

impl<R> Batch<R> {
    fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| Mutex::new(None)).collect(),
            remaining: Mutex::new(size),
            done: Condvar::new(),
            failed: AtomicBool::new(false),
        }
    }

    fn arrive(&self) {
        let mut remaining = self.remaining.lock();
        *remaining -= 1;
        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.done.wait(&mut remaining);
        }
    }

    /// Takes every slot in input order
    ///
    /// A panic anywhere in the batch wins over slots skipped or abandoned
    /// because of it.
    fn collect(&self) -> Result<Vec<R>, MapperError> {
        let mut results = Vec::with_capacity(self.slots.len());
        let mut panicked = None;
        let mut closed = false;

        for slot in &self.slots {
            match slot.lock().take() {
                Some(Ok(value)) => results.push(value),
                Some(Err(e @ MapperError::TaskPanicked { .. })) => {
                    panicked.get_or_insert(e);
                }
                Some(Err(_)) | None => closed = true,
            }
        }

        match panicked {
            Some(e) => Err(e),
            None if closed => Err(MapperError::Closed),
            None => Ok(results),
        }
    }
}

/// Writes exactly one slot of a batch; arrives on drop
///
/// A task dropped without running (pool closed) marks its slot as closed, so
/// the submitter is always released.
struct SlotWriter<R> {
    batch: Arc<Batch<R>>,
    index: usize,
}

impl<R> SlotWriter<R> {
    fn run(self, compute: impl FnOnce() -> R) {
        if self.batch.failed.load(Ordering::Acquire) {
            return;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(compute)).map_err(|payload| {
            self.batch.failed.store(true, Ordering::Release);
            MapperError::TaskPanicked {
                index: self.index,
                message: panic_message(payload.as_ref()),
            }
        });

        *self.batch.slots[self.index].lock() = Some(result);
    }
}

impl<R> Drop for SlotWriter<R> {
    fn drop(&mut self) {
        self.batch.slots[self.index]
            .lock()
            .get_or_insert(Err(MapperError::Closed));
        self.batch.arrive();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
