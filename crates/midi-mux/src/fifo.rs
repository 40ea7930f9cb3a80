//! Bounded byte FIFOs between interrupt handlers and the task loop
//!
//! Each physical port owns one FIFO per direction. The interrupt side and the
//! task loop side each touch one end only, so the queue is a
//! single-producer/single-consumer ring with atomic indices. When the ring is
//! full, newly offered bytes are dropped and counted; nothing already queued
//! is overwritten.

use std::sync::atomic::{AtomicUsize, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};

/// Default ring size for port FIFOs
pub const DEFAULT_FIFO_SIZE: usize = 128;

/// Fixed-capacity SPSC byte queue with drop-newest overflow
pub struct ByteFifo<const N: usize = DEFAULT_FIFO_SIZE> {
    queue: Queue<u8, N>,
    dropped: AtomicUsize,
}

impl<const N: usize> ByteFifo<N> {
    /// Create an empty FIFO
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Maximum number of bytes the FIFO can hold
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of queued bytes
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no bytes are queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Room left before bytes start being dropped
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Total bytes dropped on overflow since creation
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueue as many bytes as fit, dropping the rest
    ///
    /// Returns the number of bytes accepted.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in bytes {
            if self.queue.enqueue(byte).is_err() {
                break;
            }
            accepted += 1;
        }
        *self.dropped.get_mut() += bytes.len() - accepted;
        accepted
    }

    /// Dequeue one byte
    pub fn pop(&mut self) -> Option<u8> {
        self.queue.dequeue()
    }

    /// Dequeue up to `out.len()` bytes, returning how many were written
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in out.iter_mut() {
            match self.queue.dequeue() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Split into the interrupt-side producer and the loop-side consumer
    ///
    /// Overflow on the producer is counted in [`ByteFifo::dropped`].
    pub fn split(&mut self) -> (FifoProducer<'_, N>, Consumer<'_, u8, N>) {
        let Self { queue, dropped } = self;
        let (inner, consumer) = queue.split();
        (
            FifoProducer {
                inner,
                dropped: &*dropped,
            },
            consumer,
        )
    }
}

/// Interrupt-side end of a split [`ByteFifo`]
pub struct FifoProducer<'a, const N: usize> {
    inner: Producer<'a, u8, N>,
    dropped: &'a AtomicUsize,
}

impl<const N: usize> FifoProducer<'_, N> {
    /// Enqueue one byte, counting it as dropped when the ring is full
    pub fn push(&mut self, byte: u8) -> bool {
        if self.inner.enqueue(byte).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Enqueue as many bytes as fit, dropping the rest
    ///
    /// Returns the number of bytes accepted.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes
            .iter()
            .position(|&byte| self.inner.enqueue(byte).is_err())
            .unwrap_or(bytes.len());
        let lost = bytes.len() - accepted;
        if lost > 0 {
            self.dropped.fetch_add(lost, Ordering::Relaxed);
        }
        accepted
    }

    /// Whether another byte fits
    pub fn ready(&self) -> bool {
        self.inner.ready()
    }
}

impl<const N: usize> std::fmt::Debug for FifoProducer<'_, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoProducer")
            .field("ready", &self.ready())
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}

impl<const N: usize> Default for ByteFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> std::fmt::Debug for ByteFifo<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteFifo")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("dropped", &self.dropped())
            .finish()
    }
}
