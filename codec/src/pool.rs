//! Pooled byte buffers with copy-clear-return growth.
//!
//! # Size Classes
//!
//! Buffers are organized into power-of-two size classes from `min_size` to `max_size`. For
//! example, with `min_size = 256` and `max_size = 1024`:
//! - Class 0: 256 bytes
//! - Class 1: 512 bytes
//! - Class 2: 1024 bytes
//!
//! Requests are rounded up to the next size class. Requests larger than `max_size` are served
//! by an untracked allocation that is never returned to the pool.
//!
//! # Ownership
//!
//! A [PooledBuf] is owned by exactly one holder. [PooledBuf::grow] rents a larger buffer,
//! copies the old contents into it, zero-fills the newly added tail, clears the old buffer
//! and only then returns the old buffer to the pool. Returned buffers are cleared up to a
//! caller-chosen extent (usually the number of bytes actually written), so the pool never
//! hands out data written by a previous holder within that extent.
//!
//! # Thread Safety
//!
//! [BufferPool] is `Send + Sync` and cheap to clone. Free lists are lock-free
//! ([crossbeam_queue::ArrayQueue]).

use crossbeam_queue::ArrayQueue;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::{
    num::NonZeroUsize,
    ops::{Deref, DerefMut},
    sync::{Arc, Weak},
};
use tracing::trace;

/// Configuration for a [BufferPool].
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Minimum buffer size. Must be a power of two.
    pub min_size: NonZeroUsize,
    /// Maximum pooled buffer size. Must be a power of two and >= `min_size`.
    pub max_size: NonZeroUsize,
    /// Maximum number of idle buffers kept per size class.
    pub max_per_class: NonZeroUsize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            min_size: NonZeroUsize::new(256).expect("non-zero"),
            max_size: NonZeroUsize::new(1024 * 1024).expect("non-zero"),
            max_per_class: NonZeroUsize::new(64).expect("non-zero"),
        }
    }
}

impl BufferPoolConfig {
    /// Validates the configuration, panicking on invalid values.
    ///
    /// # Panics
    ///
    /// - `min_size` is not a power of two
    /// - `max_size` is not a power of two
    /// - `max_size < min_size`
    fn validate(&self) {
        assert!(
            self.min_size.is_power_of_two(),
            "min_size must be a power of two"
        );
        assert!(
            self.max_size.is_power_of_two(),
            "max_size must be a power of two"
        );
        assert!(
            self.max_size >= self.min_size,
            "max_size must be >= min_size"
        );
    }

    /// Returns the number of size classes.
    fn num_classes(&self) -> usize {
        // Classes are: min_size, min_size*2, min_size*4, ..., max_size
        (self.max_size.get() / self.min_size.get()).trailing_zeros() as usize + 1
    }

    /// Returns the size class index for a given size.
    /// Returns None if size > max_size.
    fn class_index(&self, size: usize) -> Option<usize> {
        if size > self.max_size.get() {
            return None;
        }
        if size <= self.min_size.get() {
            return Some(0);
        }
        let size_class = size.next_power_of_two();
        let index = (size_class / self.min_size.get()).trailing_zeros() as usize;
        (index < self.num_classes()).then_some(index)
    }

    /// Returns the buffer size for a given class index.
    const fn class_size(&self, index: usize) -> usize {
        self.min_size.get() << index
    }
}

/// Label for buffer pool metrics, identifying the size class.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SizeClassLabel {
    size_class: u64,
}

/// Metrics for the buffer pool.
#[derive(Default)]
struct PoolMetrics {
    /// Number of idle buffers available per size class.
    available: Family<SizeClassLabel, Gauge>,
    /// Total number of rent requests.
    rented_total: Counter,
    /// Total number of rent requests served from a free list.
    reused_total: Counter,
    /// Total number of grow operations.
    grown_total: Counter,
    /// Total number of requests exceeding the maximum pooled size.
    oversized_total: Counter,
}

impl PoolMetrics {
    fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "buffer_pool_available",
            "Number of idle buffers available in the pool",
            metrics.available.clone(),
        );
        registry.register(
            "buffer_pool_rented",
            "Total number of buffers rented from the pool",
            metrics.rented_total.clone(),
        );
        registry.register(
            "buffer_pool_reused",
            "Total number of rented buffers served from a free list",
            metrics.reused_total.clone(),
        );
        registry.register(
            "buffer_pool_grown",
            "Total number of buffer growth operations",
            metrics.grown_total.clone(),
        );
        registry.register(
            "buffer_pool_oversized",
            "Total number of requests exceeding the maximum pooled size",
            metrics.oversized_total.clone(),
        );
        metrics
    }
}

/// Per-size-class state.
struct SizeClass {
    size: usize,
    freelist: ArrayQueue<Vec<u8>>,
}

/// Internal state of the buffer pool.
struct BufferPoolInner {
    config: BufferPoolConfig,
    classes: Vec<SizeClass>,
    metrics: PoolMetrics,
}

impl BufferPoolInner {
    fn label(size: usize) -> SizeClassLabel {
        SizeClassLabel {
            size_class: size as u64,
        }
    }

    /// Rents a buffer of at least `min_len` bytes. Returns the buffer and whether it is
    /// eligible to be returned to a free list.
    fn rent(&self, min_len: usize) -> (Vec<u8>, bool) {
        self.metrics.rented_total.inc();
        let Some(index) = self.config.class_index(min_len) else {
            self.metrics.oversized_total.inc();
            trace!(min_len, "oversized rent");
            return (vec![0; min_len], false);
        };
        let class = &self.classes[index];
        match class.freelist.pop() {
            Some(buffer) => {
                self.metrics.reused_total.inc();
                self.metrics
                    .available
                    .get_or_create(&Self::label(class.size))
                    .dec();
                (buffer, true)
            }
            None => (vec![0; class.size], true),
        }
    }

    /// Clears the first `clear` bytes of `buffer` and returns it to its free list.
    fn give_back(&self, mut buffer: Vec<u8>, clear: usize) {
        let clear = clear.min(buffer.len());
        buffer[..clear].fill(0);
        let Some(index) = self.config.class_index(buffer.len()) else {
            return;
        };
        let class = &self.classes[index];
        if class.size != buffer.len() {
            return;
        }
        if class.freelist.push(buffer).is_ok() {
            self.metrics
                .available
                .get_or_create(&Self::label(class.size))
                .inc();
        }
        // Free list full: the buffer is dropped and deallocated
    }
}

/// A pool of reusable byte buffers.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.inner.config)
            .field("num_classes", &self.inner.classes.len())
            .finish()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(BufferPoolConfig::default())
    }
}

impl BufferPool {
    /// Creates a pool whose metrics are not registered anywhere.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: BufferPoolConfig) -> Self {
        Self::build(config, PoolMetrics::default())
    }

    /// Creates a pool and registers its metrics with `registry`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn with_metrics(config: BufferPoolConfig, registry: &mut Registry) -> Self {
        Self::build(config, PoolMetrics::new(registry))
    }

    fn build(config: BufferPoolConfig, metrics: PoolMetrics) -> Self {
        config.validate();
        let classes = (0..config.num_classes())
            .map(|index| SizeClass {
                size: config.class_size(index),
                freelist: ArrayQueue::new(config.max_per_class.get()),
            })
            .collect();
        Self {
            inner: Arc::new(BufferPoolInner {
                config,
                classes,
                metrics,
            }),
        }
    }

    /// Returns the pool configuration.
    pub fn config(&self) -> &BufferPoolConfig {
        &self.inner.config
    }

    /// Rents a buffer whose length is at least `min_len`.
    ///
    /// Bytes past any extent cleared by a previous holder may contain stale data; callers
    /// must write before they read.
    pub fn rent(&self, min_len: usize) -> PooledBuf {
        let (buffer, pooled) = self.inner.rent(min_len);
        trace!(min_len, len = buffer.len(), pooled, "rented buffer");
        PooledBuf {
            buffer,
            pool: if pooled {
                Arc::downgrade(&self.inner)
            } else {
                Weak::new()
            },
        }
    }

    /// Returns the number of idle buffers across all size classes.
    pub fn available(&self) -> usize {
        self.inner.classes.iter().map(|c| c.freelist.len()).sum()
    }
}

/// A buffer leased from a [BufferPool].
///
/// Dropping the buffer returns it to the pool after clearing its entire contents. Use
/// [PooledBuf::release] to clear only the prefix that was actually written.
pub struct PooledBuf {
    buffer: Vec<u8>,
    pool: Weak<BufferPoolInner>,
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("len", &self.buffer.len())
            .field("pooled", &(self.pool.strong_count() > 0))
            .finish()
    }
}

impl PooledBuf {
    /// Grows the buffer to at least `min_len` bytes.
    ///
    /// All existing bytes are preserved and the added tail is zero-filled. The previous
    /// buffer has its first `clear` bytes zeroed before it is returned to the pool.
    pub fn grow(&mut self, min_len: usize, clear: usize) {
        let len = self.buffer.len();
        if min_len <= len {
            return;
        }
        let target = min_len.max(len.saturating_mul(2));
        let pool = self.pool.upgrade();
        let (mut grown, pooled) = match &pool {
            Some(inner) => {
                inner.metrics.grown_total.inc();
                inner.rent(target)
            }
            None => (vec![0; target], false),
        };
        grown[..len].copy_from_slice(&self.buffer);
        grown[len..].fill(0);

        let old = std::mem::replace(&mut self.buffer, grown);
        match &pool {
            Some(inner) => inner.give_back(old, clear),
            None => drop(old),
        }
        self.pool = match (pool, pooled) {
            (Some(inner), true) => Arc::downgrade(&inner),
            _ => Weak::new(),
        };
        trace!(from = len, to = self.buffer.len(), clear, "grew buffer");
    }

    /// Returns the buffer to its pool after zeroing its first `clear` bytes.
    pub fn release(mut self, clear: usize) {
        self.give_back(clear);
    }

    fn give_back(&mut self, clear: usize) {
        let buffer = std::mem::take(&mut self.buffer);
        if let Some(inner) = self.pool.upgrade() {
            trace!(len = buffer.len(), clear, "returned buffer");
            inner.give_back(buffer, clear);
        }
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            let len = self.buffer.len();
            self.give_back(len);
        }
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buffer
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pool() -> BufferPool {
        BufferPool::new(BufferPoolConfig {
            min_size: NonZeroUsize::new(16).unwrap(),
            max_size: NonZeroUsize::new(128).unwrap(),
            max_per_class: NonZeroUsize::new(4).unwrap(),
        })
    }

    #[test]
    fn test_class_index() {
        let config = small_pool().config().clone();
        assert_eq!(config.num_classes(), 4);
        assert_eq!(config.class_index(0), Some(0));
        assert_eq!(config.class_index(16), Some(0));
        assert_eq!(config.class_index(17), Some(1));
        assert_eq!(config.class_index(128), Some(3));
        assert_eq!(config.class_index(129), None);
    }

    #[test]
    fn test_rent_minimum_length() {
        let pool = small_pool();
        for n in [0, 1, 16, 17, 100, 128, 500] {
            let buf = pool.rent(n);
            assert!(buf.len() >= n);
        }
    }

    #[test]
    fn test_grow_preserves_and_zero_fills() {
        let pool = small_pool();
        let mut buf = pool.rent(16);
        buf.fill(0xAB);
        buf.grow(40, 16);
        assert!(buf.len() >= 40);
        assert!(buf[..16].iter().all(|b| *b == 0xAB));
        assert!(buf[16..].iter().all(|b| *b == 0));

        // The old buffer was cleared and returned.
        assert_eq!(pool.available(), 1);
        let old = pool.rent(16);
        assert!(old.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_partial_clear_on_release() {
        let pool = small_pool();
        let mut buf = pool.rent(32);
        buf.fill(0xFF);
        buf.release(8);
        assert_eq!(pool.available(), 1);

        let reused = pool.rent(32);
        assert!(reused[..8].iter().all(|b| *b == 0));
        assert!(reused[8..].iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn test_drop_clears_everything() {
        let pool = small_pool();
        {
            let mut buf = pool.rent(16);
            buf.fill(0x11);
        }
        let reused = pool.rent(16);
        assert!(reused.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_oversized_not_pooled() {
        let pool = small_pool();
        let buf = pool.rent(1000);
        assert_eq!(buf.len(), 1000);
        drop(buf);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_free_list_bounded() {
        let pool = small_pool();
        let bufs: Vec<_> = (0..6).map(|_| pool.rent(16)).collect();
        drop(bufs);
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn test_metrics_registered() {
        let mut registry = Registry::default();
        let pool = BufferPool::with_metrics(BufferPoolConfig::default(), &mut registry);
        let mut buf = pool.rent(10);
        buf.grow(1000, 0);
        drop(buf);

        let mut encoded = String::new();
        prometheus_client::encoding::text::encode(&mut encoded, &registry).unwrap();
        assert!(encoded.contains("buffer_pool_rented_total 2"));
        assert!(encoded.contains("buffer_pool_grown_total 1"));
    }
}
