//! Chunked parallel reductions
//!
//! The input is cut into contiguous chunks, each chunk is reduced on its own
//! worker, and the partial results are combined on the calling thread with the
//! same reducer.

use crate::concurrent::mapper::{panic_message, ParallelMapper};
use crate::MapperError;
use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;
use std::thread;

/// Parallel reductions over a slice
///
/// Built with [`new`](Self::new), every call spawns one scoped thread per
/// chunk. Built with [`with_mapper`](Self::with_mapper), chunks are handed to
/// a shared [`ParallelMapper`] instead and no threads are created per call.
///
/// A `threads` argument of zero runs the reduction sequentially on the
/// calling thread.
#[derive(Clone, Default)]
pub struct IterativeParallelism {
    mapper: Option<Arc<ParallelMapper>>,
}

impl IterativeParallelism {
    /// Reductions backed by scoped threads
    pub fn new() -> Self {
        Self { mapper: None }
    }

    /// Reductions backed by an existing mapper
    pub fn with_mapper(mapper: Arc<ParallelMapper>) -> Self {
        Self {
            mapper: Some(mapper),
        }
    }

    /// Returns the greatest value according to `comparator`
    ///
    /// `None` for empty input.
    ///
    /// # Example
    ///
    /// ```
    /// use phased_crawler::IterativeParallelism;
    ///
    /// let values = vec![3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5];
    /// let max = IterativeParallelism::new()
    ///     .maximum(3, &values, |a: &i32, b: &i32| a.cmp(b))
    ///     .unwrap();
    /// assert_eq!(max, Some(9));
    /// ```
    pub fn maximum<T, F>(
        &self,
        threads: usize,
        values: &[T],
        comparator: F,
    ) -> Result<Option<T>, MapperError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let comparator = Arc::new(comparator);
        let local = Arc::clone(&comparator);

        let partials = self.parallel(threads, values, move |chunk: &[T]| {
            chunk.iter().max_by(|a, b| (*local)(*a, *b)).cloned()
        })?;

        Ok(partials
            .into_iter()
            .flatten()
            .max_by(|a, b| (*comparator)(a, b)))
    }

    /// Returns the least value according to `comparator`
    ///
    /// `None` for empty input.
    pub fn minimum<T, F>(
        &self,
        threads: usize,
        values: &[T],
        comparator: F,
    ) -> Result<Option<T>, MapperError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.maximum(threads, values, move |a, b| comparator(a, b).reverse())
    }

    /// Returns true if every value satisfies `predicate` (true for empty input)
    pub fn all<T, P>(&self, threads: usize, values: &[T], predicate: P) -> Result<bool, MapperError>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let partials =
            self.parallel(threads, values, move |chunk: &[T]| chunk.iter().all(&predicate))?;
        Ok(partials.into_iter().all(|ok| ok))
    }

    /// Returns true if any value satisfies `predicate` (false for empty input)
    pub fn any<T, P>(&self, threads: usize, values: &[T], predicate: P) -> Result<bool, MapperError>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let negated = self.all(threads, values, move |value| !predicate(value))?;
        Ok(!negated)
    }

    /// Counts the values that satisfy `predicate`
    pub fn count<T, P>(&self, threads: usize, values: &[T], predicate: P) -> Result<usize, MapperError>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let partials = self.parallel(threads, values, move |chunk: &[T]| {
            chunk.iter().filter(|&value| predicate(value)).count()
        })?;
        Ok(partials.into_iter().sum())
    }

    /// Reduces every chunk with `reduce_chunk` and returns the partials in
    /// chunk order
    fn parallel<T, R, F>(
        &self,
        threads: usize,
        values: &[T],
        reduce_chunk: F,
    ) -> Result<Vec<R>, MapperError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(&[T]) -> R + Send + Sync + 'static,
    {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        if threads == 0 {
            return Ok(vec![reduce_chunk(values)]);
        }

        let chunks = split_chunks(values.len(), threads);
        tracing::trace!(
            "Reducing {} values in {} chunks",
            values.len(),
            chunks.len()
        );

        match &self.mapper {
            Some(mapper) => {
                let inputs: Vec<Vec<T>> =
                    chunks.into_iter().map(|range| values[range].to_vec()).collect();
                mapper.map(move |chunk: Vec<T>| reduce_chunk(chunk.as_slice()), inputs)
            }
            None => scoped(values, chunks, &reduce_chunk),
        }
    }
}

fn scoped<T, R, F>(values: &[T], chunks: Vec<Range<usize>>, reduce_chunk: &F) -> Result<Vec<R>, MapperError>
where
    T: Sync,
    R: Send,
    F: Fn(&[T]) -> R + Sync,
{
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(chunks.len());
        for (index, range) in chunks.into_iter().enumerate() {
            let chunk = &values[range];
            let handle = thread::Builder::new()
                .name(format!("reduce-{}", index))
                .spawn_scoped(scope, move || reduce_chunk(chunk))
                .map_err(MapperError::Spawn)?;
            handles.push(handle);
        }

        // Join everything before reporting so no thread outlives a failure
        let joined: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();

        joined
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                result.map_err(|payload| MapperError::TaskPanicked {
                    index,
                    message: panic_message(payload.as_ref()),
                })
            })
            .collect()
    })
}

/// Splits `len` items into at most `parts` contiguous ranges
///
/// Sizes differ by at most one and the leading ranges take the remainder.
/// Empty ranges are never returned, so there are fewer than `parts` ranges
/// when `len < parts`.
///
/// # Example
///
/// ```
/// use phased_crawler::concurrent::split_chunks;
///
/// assert_eq!(split_chunks(11, 3), vec![0..4, 4..8, 8..11]);
/// assert_eq!(split_chunks(2, 4), vec![0..1, 1..2]);
/// ```
pub fn split_chunks(len: usize, parts: usize) -> Vec<Range<usize>> {
    if len == 0 || parts == 0 {
        return Vec::new();
    }

    let parts = parts.min(len);
    let base = len / parts;
    let remainder = len % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < remainder);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}
