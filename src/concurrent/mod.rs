//! General-purpose parallelism outside the crawler
//!
//! - [`ParallelMapper`]: a fixed-size thread pool with an order-preserving `map`
//! - [`IterativeParallelism`]: chunked reductions (max, min, all, any, count)
//!   that run either on a shared mapper or on scoped threads

mod iterative;
mod mapper;

pub use iterative::{split_chunks, IterativeParallelism};
pub use mapper::ParallelMapper;

pub(crate) use mapper::panic_message;
