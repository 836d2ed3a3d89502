//! Lock-free object pools for records and format buffers.
//!
//! Pools start empty and fill as objects are returned, so steady-state
//! size follows the number of concurrent users rather than a guess made
//! at construction. `get` never blocks: an empty pool allocates a fresh
//! object. `put` drops the object if the pool is full or the object has
//! grown past what is worth keeping.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Buffers that grew beyond this are not kept, so one oversized record
/// cannot inflate steady-state memory.
pub const MAX_POOLED_BUFFER: usize = 64 * 1024;

/// Initial capacity of a freshly allocated format buffer.
pub const INITIAL_BUFFER_CAPACITY: usize = 256;

const GLOBAL_BUFFER_POOL_SIZE: usize = 256;

/// An object that can be cleared and handed out again.
pub trait Reusable: Send {
    /// Allocate a new, empty object.
    fn fresh() -> Self;

    /// Clear contents while retaining allocated capacity.
    fn reset(&mut self);

    /// Whether the object is small enough to keep.
    fn reusable(&self) -> bool {
        true
    }
}

impl Reusable for Vec<u8> {
    fn fresh() -> Self {
        Vec::with_capacity(INITIAL_BUFFER_CAPACITY)
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn reusable(&self) -> bool {
        self.capacity() <= MAX_POOLED_BUFFER
    }
}

#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub returns: AtomicU64,
    /// Objects not kept, because the pool was full or the object too large.
    pub discards: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub returns: u64,
    pub discards: u64,
}

impl PoolMetrics {
    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
        }
    }
}

pub struct Pool<T> {
    queue: ArrayQueue<Box<T>>,
    metrics: PoolMetrics,
}

impl<T: Reusable> Pool<T> {
    /// Create a pool that keeps at most `capacity` idle objects.
    pub fn new(capacity: usize) -> Self {
        Pool {
            queue: ArrayQueue::new(capacity.max(1)),
            metrics: PoolMetrics::default(),
        }
    }

    /// Take an empty object, allocating one if the pool has none idle.
    #[inline]
    pub fn get(&self) -> Box<T> {
        match self.queue.pop() {
            Some(item) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                item
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                Box::new(T::fresh())
            }
        }
    }

    /// Clear `item` and keep it for reuse if it qualifies.
    #[inline]
    pub fn put(&self, mut item: Box<T>) {
        if !item.reusable() {
            self.metrics.discards.fetch_add(1, Ordering::Relaxed);
            return;
        }
        item.reset();
        match self.queue.push(item) {
            Ok(()) => {
                self.metrics.returns.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.discards.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn available(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }
}

pub type BufferPool = Pool<Vec<u8>>;

/// Process-wide pool of format buffers.
pub fn buffers() -> &'static BufferPool {
    static POOL: OnceLock<BufferPool> = OnceLock::new();
    POOL.get_or_init(|| Pool::new(GLOBAL_BUFFER_POOL_SIZE))
}

/// Shrink a long-lived buffer back to the pooling ceiling after an
/// oversized record went through it.
#[inline]
pub(crate) fn trim_buffer(buf: &mut Vec<u8>) {
    if buf.capacity() > MAX_POOLED_BUFFER {
        buf.clear();
        buf.shrink_to(MAX_POOLED_BUFFER);
    }
}
