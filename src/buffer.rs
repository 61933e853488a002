use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Shared<T> {
    slots: Mutex<Vec<T>>,
    capacity: usize,
    /// Mirror of `slots.len()`, readable without the lock
    len: AtomicUsize,
    evicted: AtomicU64,
}

/// A fixed-capacity buffer that evicts its oldest entry when full.
///
/// Pushes and drains may come from different threads. Each push (including
/// the shift that makes room on overflow) and each drain-and-reset happens
/// under one lock, so a drain always sees a consistent snapshot.
#[derive(Debug)]
pub struct RingBuffer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for RingBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer holding at most `capacity` values
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(Vec::new()),
                capacity,
                len: AtomicUsize::new(0),
                evicted: AtomicU64::new(0),
            }),
        }
    }

    /// Append a value, shifting out the oldest one if the buffer is full
    pub fn push(&self, value: T) {
        let mut slots = self.shared.slots.lock();
        if slots.len() == self.shared.capacity {
            slots.remove(0);
            self.shared.evicted.fetch_add(1, Ordering::Relaxed);
        }
        slots.push(value);
        self.shared.len.store(slots.len(), Ordering::Release);
    }

    /// Take every buffered value, oldest first, leaving the buffer empty.
    ///
    /// Returns `None` when there is nothing to take.
    pub fn drain(&self) -> Option<Vec<T>> {
        if self.shared.len.load(Ordering::Acquire) == 0 {
            return None;
        }

        let mut slots = self.shared.slots.lock();
        if slots.is_empty() {
            return None;
        }
        let drained = std::mem::take(&mut *slots);
        self.shared.len.store(0, Ordering::Release);
        Some(drained)
    }

    /// Get the current number of buffered values
    pub fn len(&self) -> usize {
        self.shared.len.load(Ordering::Acquire)
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Get the utilization of the buffer as a percentage (0-100)
    pub fn utilization(&self) -> u32 {
        ((self.len() * 100) / self.capacity()).min(100) as u32
    }

    /// Number of values evicted to make room for newer ones
    pub fn evicted_count(&self) -> u64 {
        self.shared.evicted.load(Ordering::Relaxed)
    }
}
